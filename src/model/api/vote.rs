use serde::{Deserialize, Serialize};

use crate::model::{
    common::{ChoiceId, QuestionId},
    db::Vote,
};
use crate::service::voting::VoteOutcome;

/// A vote submitted by a voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    /// The selected choice. Absent if the voter submitted without selecting one.
    pub choice: Option<ChoiceId>,
}

/// Acknowledgement of a successful vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub question_id: QuestionId,
    pub choice_id: ChoiceId,
    /// True if this was the voter's first vote on the question,
    /// false if it replaced an earlier one.
    pub created: bool,
    pub message: String,
}

impl From<VoteOutcome> for VoteReceipt {
    fn from(outcome: VoteOutcome) -> Self {
        let message = if outcome.created {
            "Successfully voted!"
        } else {
            "Replaced your previous vote."
        };
        Self {
            question_id: outcome.question_id,
            choice_id: outcome.choice_id,
            created: outcome.created,
            message: message.to_string(),
        }
    }
}

/// A voter's current choice for a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentVote {
    pub question_id: QuestionId,
    pub choice_id: ChoiceId,
}

impl From<Vote> for CurrentVote {
    fn from(vote: Vote) -> Self {
        Self {
            question_id: vote.question_id,
            choice_id: vote.choice_id,
        }
    }
}
