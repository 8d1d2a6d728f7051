use chrono::{DateTime, Utc};
use log::debug;
use mongodb::{
    bson::{doc, to_bson, DateTime as BsonDateTime},
    error::Error as DbError,
    options::{FindOptions, UpdateOptions},
    Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    common::{ChoiceId, QuestionId},
    db::{Choice, NewChoice, NewQuestion, NewVote, Question, Vote},
    mongodb::{
        ensure_id_counters_exist, ensure_indexes_exist, is_duplicate_key_error, u32_id_filter,
        Coll, Counter, CHOICE_ID_COUNTER_ID, QUESTION_ID_COUNTER_ID,
    },
};

use super::{QuestionStore, VoteStore};

/// A store backed by a MongoDB database.
#[derive(Clone)]
pub struct MongoStore {
    questions: Coll<Question>,
    choices: Coll<Choice>,
    votes: Coll<Vote>,
    counters: Coll<Counter>,
}

impl MongoStore {
    /// Wrap the given database, ensuring the required indexes and ID counters exist.
    pub async fn new(db: &Database) -> std::result::Result<Self, DbError> {
        ensure_indexes_exist(db).await?;
        let counters = Coll::from_db(db);
        ensure_id_counters_exist(&counters).await?;
        Ok(Self {
            questions: Coll::from_db(db),
            choices: Coll::from_db(db),
            votes: Coll::from_db(db),
            counters,
        })
    }
}

/// Filter matching questions published at or before `now`.
fn published_filter(now: DateTime<Utc>) -> mongodb::bson::Document {
    doc! {
        "pub_date": { "$lte": BsonDateTime::from_chrono(now) },
    }
}

#[rocket::async_trait]
impl QuestionStore for MongoStore {
    async fn question(&self, id: QuestionId) -> Result<Option<Question>> {
        Ok(self.questions.find_one(u32_id_filter(id), None).await?)
    }

    async fn choice(&self, question_id: QuestionId, choice_id: ChoiceId) -> Result<Option<Choice>> {
        let filter = doc! {
            "_id": choice_id,
            "question_id": question_id,
        };
        Ok(self.choices.find_one(filter, None).await?)
    }

    async fn choices(&self, question_id: QuestionId) -> Result<Vec<Choice>> {
        let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
        let choices = self
            .choices
            .find(doc! {"question_id": question_id}, options)
            .await?
            .try_collect::<Vec<_>>()
            .await?;
        Ok(choices)
    }

    async fn published_questions(
        &self,
        now: DateTime<Utc>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Question>> {
        let options = FindOptions::builder()
            .sort(doc! {"pub_date": -1, "_id": -1})
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();
        let questions = self
            .questions
            .find(published_filter(now), options)
            .await?
            .try_collect::<Vec<_>>()
            .await?;
        Ok(questions)
    }

    async fn count_published(&self, now: DateTime<Utc>) -> Result<u64> {
        Ok(self
            .questions
            .count_documents(published_filter(now), None)
            .await?)
    }

    async fn insert_question(&self, question: NewQuestion) -> Result<Question> {
        let id = Counter::next(&self.counters, QUESTION_ID_COUNTER_ID).await?;
        let question = Question { id, question };
        self.questions.insert_one(&question, None).await?;
        debug!("Inserted question {id}");
        Ok(question)
    }

    async fn insert_choice(&self, choice: NewChoice) -> Result<Choice> {
        if self.question(choice.question_id).await?.is_none() {
            return Err(Error::not_found(format!(
                "Question with ID '{}'",
                choice.question_id
            )));
        }
        let id = Counter::next(&self.counters, CHOICE_ID_COUNTER_ID).await?;
        let choice = Choice { id, choice };
        self.choices.insert_one(&choice, None).await?;
        Ok(choice)
    }

    async fn set_choice_votes(&self, choice_id: ChoiceId, votes: u64) -> Result<()> {
        let update = doc! {
            "$set": { "votes": to_bson(&votes)? },
        };
        let result = self
            .choices
            .update_one(u32_id_filter(choice_id), update, None)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::not_found(format!("Choice with ID '{choice_id}'")));
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl VoteStore for MongoStore {
    async fn upsert_vote(&self, vote: NewVote) -> Result<bool> {
        let filter = doc! {
            "question_id": vote.question_id,
            "voter_id": vote.voter_id.as_str(),
        };
        let update = doc! {
            "$set": { "choice_id": vote.choice_id },
        };
        let upsert = UpdateOptions::builder().upsert(true).build();

        let result = match self
            .votes
            .update_one(filter.clone(), update.clone(), upsert)
            .await
        {
            Ok(result) => result,
            // A concurrent upsert for the same voter inserted first; overwrite its choice.
            Err(e) if is_duplicate_key_error(&e) => {
                debug!(
                    "Concurrent vote by {} on question {}, retrying as update",
                    vote.voter_id, vote.question_id
                );
                self.votes.update_one(filter, update, None).await?
            }
            Err(e) => return Err(e.into()),
        };

        Ok(result.upserted_id.is_some())
    }

    async fn count_votes(&self, question_id: QuestionId, choice_id: ChoiceId) -> Result<u64> {
        let filter = doc! {
            "question_id": question_id,
            "choice_id": choice_id,
        };
        Ok(self.votes.count_documents(filter, None).await?)
    }

    async fn vote(&self, question_id: QuestionId, voter_id: &str) -> Result<Option<Vote>> {
        let filter = doc! {
            "question_id": question_id,
            "voter_id": voter_id,
        };
        Ok(self.votes.find_one(filter, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::db::{ChoiceCore, QuestionCore, VoteCore};

    #[backend_test(mongodb)]
    async fn insert_and_find_question(store: MongoStore) {
        let question = store
            .insert_question(QuestionCore::open_example())
            .await
            .unwrap();
        let choice = store
            .insert_choice(ChoiceCore::new(question.id, "Not much"))
            .await
            .unwrap();

        let found = store.question(question.id).await.unwrap().unwrap();
        assert_eq!(found.text, question.text);
        assert_eq!(
            found.pub_date.timestamp_millis(),
            question.pub_date.timestamp_millis()
        );

        let choices = store.choices(question.id).await.unwrap();
        assert_eq!(choices, vec![choice.clone()]);
        assert!(store.choice(question.id + 1, choice.id).await.unwrap().is_none());
    }

    #[backend_test(mongodb)]
    async fn published_questions_exclude_future(store: MongoStore) {
        let old = store
            .insert_question(QuestionCore::example("old", -5, 30))
            .await
            .unwrap();
        store
            .insert_question(QuestionCore::future_example())
            .await
            .unwrap();
        let new = store
            .insert_question(QuestionCore::example("new", -1, 30))
            .await
            .unwrap();

        let now = Utc::now();
        let ids = store
            .published_questions(now, 0, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![new.id, old.id]);
        assert_eq!(store.count_published(now).await.unwrap(), 2);
    }

    #[backend_test(mongodb)]
    async fn upsert_keeps_one_vote_per_voter(store: MongoStore, votes: Coll<Vote>) {
        let vote = |choice_id| VoteCore {
            question_id: 1,
            voter_id: "alice".to_string(),
            choice_id,
        };

        assert!(store.upsert_vote(vote(1)).await.unwrap());
        assert!(!store.upsert_vote(vote(2)).await.unwrap());

        assert_eq!(votes.count_documents(doc! {}, None).await.unwrap(), 1);
        assert_eq!(store.count_votes(1, 1).await.unwrap(), 0);
        assert_eq!(store.count_votes(1, 2).await.unwrap(), 1);
        let current = store.vote(1, "alice").await.unwrap().unwrap();
        assert_eq!(current.choice_id, 2);
    }

    #[backend_test(mongodb)]
    async fn concurrent_upserts_by_one_voter(store: MongoStore, votes: Coll<Vote>) {
        const RACERS: u32 = 8;

        // Every upsert races to insert the same (question, voter) record; losers
        // hit the unique index and must fall back to updating the winner's vote.
        let upserts = (1..=RACERS).map(|choice_id| {
            let store = store.clone();
            rocket::tokio::spawn(async move {
                store
                    .upsert_vote(VoteCore {
                        question_id: 1,
                        voter_id: "alice".to_string(),
                        choice_id,
                    })
                    .await
            })
        });
        let results = rocket::futures::future::join_all(upserts).await;

        let created = results
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .filter(|&created| created)
            .count();
        assert_eq!(created, 1);

        assert_eq!(votes.count_documents(doc! {}, None).await.unwrap(), 1);
        let current = store.vote(1, "alice").await.unwrap().unwrap();
        assert!((1..=RACERS).contains(&current.choice_id));
        assert_eq!(store.count_votes(1, current.choice_id).await.unwrap(), 1);
    }

    #[backend_test(mongodb)]
    async fn cached_counter_is_overwritten(store: MongoStore) {
        let question = store
            .insert_question(QuestionCore::open_example())
            .await
            .unwrap();
        let choice = store
            .insert_choice(ChoiceCore::new(question.id, "A"))
            .await
            .unwrap();

        store.set_choice_votes(choice.id, 4).await.unwrap();
        let choice = store.choice(question.id, choice.id).await.unwrap().unwrap();
        assert_eq!(choice.votes, 4);

        assert!(matches!(
            store.set_choice_votes(choice.id + 100, 1).await,
            Err(Error::NotFound(_))
        ));
    }
}
