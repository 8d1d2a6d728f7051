use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    common::{ChoiceId, QuestionId},
    db::NewVote,
};
use crate::store::{QuestionStore, VoteStore};

use super::eligibility;

/// The result of a successful vote.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    pub question_id: QuestionId,
    pub choice_id: ChoiceId,
    /// True if this was the voter's first vote on the question,
    /// false if it replaced an earlier one.
    pub created: bool,
}

/// Records votes against the question and vote stores.
pub struct VotingService<'a> {
    questions: &'a dyn QuestionStore,
    votes: &'a dyn VoteStore,
}

impl<'a> VotingService<'a> {
    pub fn new(questions: &'a dyn QuestionStore, votes: &'a dyn VoteStore) -> Self {
        Self { questions, votes }
    }

    /// Cast (or replace) `voter_id`'s vote on a question.
    ///
    /// Fails with [`Error::NotFound`] if the question doesn't exist,
    /// [`Error::Forbidden`] if it isn't accepting votes at `now`, and
    /// [`Error::InvalidChoice`] if the choice isn't one of its choices.
    /// The ledger is untouched on failure.
    pub async fn cast_vote(
        &self,
        question_id: QuestionId,
        voter_id: &str,
        choice_id: ChoiceId,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome> {
        let result = self.try_cast_vote(question_id, voter_id, choice_id, now).await;
        match &result {
            Ok(outcome) if outcome.created => {
                info!("Voter {voter_id} voted for choice {choice_id} on question {question_id}")
            }
            Ok(_) => info!(
                "Voter {voter_id} replaced their vote with choice {choice_id} on question {question_id}"
            ),
            Err(err) => info!("Voter {voter_id} failed to vote on question {question_id}: {err}"),
        }
        result
    }

    async fn try_cast_vote(
        &self,
        question_id: QuestionId,
        voter_id: &str,
        choice_id: ChoiceId,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome> {
        let question = self
            .questions
            .question(question_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Question with ID '{question_id}'")))?;

        if !eligibility::can_vote(&question, now) {
            return Err(Error::Forbidden(format!(
                "Question '{question_id}' is not open for voting"
            )));
        }

        if self.questions.choice(question_id, choice_id).await?.is_none() {
            return Err(Error::InvalidChoice(format!(
                "Choice '{choice_id}' is not a choice of question '{question_id}'"
            )));
        }

        let vote = NewVote {
            question_id,
            voter_id: voter_id.to_string(),
            choice_id,
        };
        let created = self.votes.upsert_vote(vote).await?;

        self.recount(question_id).await?;

        Ok(VoteOutcome {
            question_id,
            choice_id,
            created,
        })
    }

    /// Recompute the cached counter of every choice of the question from the ledger.
    ///
    /// Not atomic with the vote itself: concurrent voters may briefly leave stale counts.
    pub async fn recount(&self, question_id: QuestionId) -> Result<()> {
        for choice in self.questions.choices(question_id).await? {
            let votes = self.votes.count_votes(question_id, choice.id).await?;
            if votes != choice.votes {
                self.questions.set_choice_votes(choice.id, votes).await?;
            }
        }
        debug!("Recounted votes for question {question_id}");
        Ok(())
    }
}
