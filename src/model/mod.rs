//! Data types shared by the stores, the voting service and the API.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
