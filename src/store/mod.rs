//! Persistence contracts for polls and votes, with their adapters.
//!
//! The voting service only sees [`QuestionStore`] and [`VoteStore`]; which
//! backend sits behind them is decided at launch by the store fairing.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    common::{ChoiceId, QuestionId},
    db::{Choice, NewChoice, NewQuestion, NewVote, Question, Vote},
};
use crate::service::voting::VotingService;

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Storage of questions and their choices.
#[rocket::async_trait]
pub trait QuestionStore: Send + Sync {
    /// Look up a question by ID.
    async fn question(&self, id: QuestionId) -> Result<Option<Question>>;

    /// Look up a choice by ID, only if it belongs to the given question.
    async fn choice(&self, question_id: QuestionId, choice_id: ChoiceId) -> Result<Option<Choice>>;

    /// All choices of a question, in ID order.
    async fn choices(&self, question_id: QuestionId) -> Result<Vec<Choice>>;

    /// Questions published at or before `now`, newest first, skipping the first `skip`
    /// and returning at most `limit`.
    async fn published_questions(
        &self,
        now: DateTime<Utc>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Question>>;

    /// Number of questions published at or before `now`.
    async fn count_published(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Insert a question, allocating its ID.
    async fn insert_question(&self, question: NewQuestion) -> Result<Question>;

    /// Insert a choice, allocating its ID.
    async fn insert_choice(&self, choice: NewChoice) -> Result<Choice>;

    /// Overwrite the cached vote counter of a choice.
    async fn set_choice_votes(&self, choice_id: ChoiceId, votes: u64) -> Result<()>;
}

/// The vote ledger: at most one vote per question per voter.
#[rocket::async_trait]
pub trait VoteStore: Send + Sync {
    /// Record the voter's choice, replacing any earlier vote of theirs on the same question.
    ///
    /// Returns true if a new vote was created, false if an existing one was replaced.
    async fn upsert_vote(&self, vote: NewVote) -> Result<bool>;

    /// Number of votes for the given choice of the given question.
    async fn count_votes(&self, question_id: QuestionId, choice_id: ChoiceId) -> Result<u64>;

    /// The voter's current vote on a question, if any.
    async fn vote(&self, question_id: QuestionId, voter_id: &str) -> Result<Option<Vote>>;
}

/// Handles on the stores, placed into managed state.
#[derive(Clone)]
pub struct Stores {
    pub questions: Arc<dyn QuestionStore>,
    pub votes: Arc<dyn VoteStore>,
}

impl Stores {
    /// Use a single backend for both questions and votes.
    pub fn new<S>(store: S) -> Self
    where
        S: QuestionStore + VoteStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            questions: store.clone(),
            votes: store,
        }
    }

    /// The voting service over these stores.
    pub fn voting(&self) -> VotingService<'_> {
        VotingService::new(self.questions.as_ref(), self.votes.as_ref())
    }
}
