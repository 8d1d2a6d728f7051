//! API-friendly types: request bodies and response descriptions.

pub mod auth;
pub mod pagination;
pub mod question;
pub mod vote;
