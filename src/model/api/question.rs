use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{ChoiceId, QuestionId},
    db::{Choice, NewQuestion, Question},
};
use crate::service::eligibility;

/// A question specification, as submitted by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSpec {
    /// Question text.
    pub text: String,
    /// Publication time.
    pub pub_date: DateTime<Utc>,
    /// Closing time; must be after `pub_date`.
    pub end_date: DateTime<Utc>,
    /// Text of each choice, in display order.
    pub choices: Vec<String>,
}

impl QuestionSpec {
    /// Split this spec into the question and its choice texts, checking
    /// that the voting window is non-empty.
    pub fn into_question(self) -> Result<(NewQuestion, Vec<String>)> {
        if self.end_date <= self.pub_date {
            return Err(Error::BadRequest(format!(
                "Question closes at {} but is published at {}",
                self.end_date, self.pub_date
            )));
        }
        let question = NewQuestion {
            text: self.text,
            pub_date: self.pub_date,
            end_date: self.end_date,
        };
        Ok((question, self.choices))
    }
}

/// A question as listed on the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub id: QuestionId,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Published within the last day.
    pub published_recently: bool,
    /// Currently accepting votes.
    pub can_vote: bool,
}

impl QuestionSummary {
    pub fn new(question: Question, now: DateTime<Utc>) -> Self {
        Self {
            published_recently: eligibility::was_published_recently(&question, now),
            can_vote: eligibility::can_vote(&question, now),
            id: question.id,
            text: question.question.text,
            pub_date: question.question.pub_date,
            end_date: question.question.end_date,
        }
    }
}

/// A selectable choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceDescription {
    pub id: ChoiceId,
    pub text: String,
}

impl From<Choice> for ChoiceDescription {
    fn from(choice: Choice) -> Self {
        Self {
            id: choice.id,
            text: choice.choice.text,
        }
    }
}

/// A question with its choices, as shown on the voting form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDescription {
    pub id: QuestionId,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub choices: Vec<ChoiceDescription>,
}

impl QuestionDescription {
    pub fn new(question: Question, choices: Vec<Choice>) -> Self {
        Self {
            id: question.id,
            text: question.question.text,
            pub_date: question.question.pub_date,
            end_date: question.question.end_date,
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }
}

/// A choice with its tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceResult {
    pub id: ChoiceId,
    pub text: String,
    pub votes: u64,
}

impl From<Choice> for ChoiceResult {
    fn from(choice: Choice) -> Self {
        Self {
            id: choice.id,
            votes: choice.votes,
            text: choice.choice.text,
        }
    }
}

/// The tallied results of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResults {
    pub id: QuestionId,
    pub text: String,
    pub choices: Vec<ChoiceResult>,
    pub total_votes: u64,
}

impl QuestionResults {
    pub fn new(question: Question, choices: Vec<Choice>) -> Self {
        let choices = choices
            .into_iter()
            .map(ChoiceResult::from)
            .collect::<Vec<_>>();
        Self {
            id: question.id,
            text: question.question.text,
            total_votes: choices.iter().map(|c| c.votes).sum(),
            choices,
        }
    }
}
