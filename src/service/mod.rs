//! The polling rules: when a question accepts votes, and how a vote is recorded.

pub mod eligibility;
pub mod voting;
