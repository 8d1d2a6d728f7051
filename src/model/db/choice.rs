use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::common::{ChoiceId, QuestionId};

/// Core choice data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ChoiceCore {
    /// The question this choice answers.
    pub question_id: QuestionId,
    /// Choice text.
    pub text: String,
    /// Cached number of votes for this choice.
    ///
    /// Recomputed from the vote ledger after every vote; the ledger is authoritative.
    pub votes: u64,
}

impl ChoiceCore {
    /// Create a new choice with no votes.
    pub fn new(question_id: QuestionId, text: impl Into<String>) -> Self {
        Self {
            question_id,
            text: text.into(),
            votes: 0,
        }
    }
}

/// A choice without an ID.
pub type NewChoice = ChoiceCore;

/// A choice from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Choice {
    #[serde(rename = "_id")]
    pub id: ChoiceId,
    #[serde(flatten)]
    pub choice: ChoiceCore,
}

impl Deref for Choice {
    type Target = ChoiceCore;

    fn deref(&self) -> &Self::Target {
        &self.choice
    }
}

impl DerefMut for Choice {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.choice
    }
}
