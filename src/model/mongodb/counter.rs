use log::debug;
use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{collection::Coll, errors::is_duplicate_key_error};

/// ID of the counter allocating question IDs.
pub const QUESTION_ID_COUNTER_ID: &str = "question_id";
/// ID of the counter allocating choice IDs.
pub const CHOICE_ID_COUNTER_ID: &str = "choice_id";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Create a new `Counter` with the given ID, starting at the given value.
    pub fn new(id: impl Into<String>, start: u32) -> Self {
        Self {
            id: id.into(),
            next: start,
        }
    }

    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<u32> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| Error::Internal(format!("Failed to find counter with ID {id}")))?;
        Ok(counter.next)
    }
}

/// Ensure the question and choice ID counters exist, starting them at 1 if not.
///
/// This operation is idempotent.
pub async fn ensure_id_counters_exist(counters: &Coll<Counter>) -> std::result::Result<(), DbError> {
    for id in [QUESTION_ID_COUNTER_ID, CHOICE_ID_COUNTER_ID] {
        match counters.insert_one(Counter::new(id, 1), None).await {
            Ok(_) => debug!("Created ID counter {id}"),
            Err(e) if is_duplicate_key_error(&e) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
