use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{Choice, Question, Vote};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Question {
    const NAME: &'static str = "questions";
}

impl MongoCollection for Choice {
    const NAME: &'static str = "choices";
}

impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

impl MongoCollection for Counter {
    const NAME: &'static str = "counters";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    // Question collection: the index listing is newest first.
    let question_index = IndexModel::builder().keys(doc! {"pub_date": -1}).build();
    Coll::<Question>::from_db(db)
        .create_index(question_index, None)
        .await?;

    // Choice collection.
    let choice_index = IndexModel::builder().keys(doc! {"question_id": 1}).build();
    Coll::<Choice>::from_db(db)
        .create_index(choice_index, None)
        .await?;

    // Vote collection: one vote per voter per question.
    let unique = IndexOptions::builder().unique(true).build();
    let vote_index = IndexModel::builder()
        .keys(doc! {"question_id": 1, "voter_id": 1})
        .options(unique)
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    Ok(())
}
