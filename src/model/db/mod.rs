//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - Object IDs and datetimes are serialised in MongoDB's own format.
//! - Each `FooCore` is the record without its ID, and doubles as `NewFoo`
//!   for insertion.

pub mod choice;
pub mod question;
pub mod vote;

pub use choice::{Choice, ChoiceCore, NewChoice};
pub use question::{NewQuestion, Question, QuestionCore};
pub use vote::{NewVote, Vote, VoteCore};
