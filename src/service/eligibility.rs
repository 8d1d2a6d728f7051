//! Publication and voting-window predicates.
//!
//! All of these are pure functions of the question's dates and the supplied instant.

use chrono::{DateTime, Duration, Utc};

use crate::model::db::QuestionCore;

/// Has the question been published?
pub fn is_published(question: &QuestionCore, now: DateTime<Utc>) -> bool {
    now >= question.pub_date
}

/// Was the question published within the last day (inclusive at both ends)?
/// Questions published in the future were not.
pub fn was_published_recently(question: &QuestionCore, now: DateTime<Utc>) -> bool {
    now - Duration::days(1) <= question.pub_date && question.pub_date <= now
}

/// Is the question currently accepting votes?
///
/// Voting opens at `pub_date` and closes at `end_date`, exclusive.
pub fn can_vote(question: &QuestionCore, now: DateTime<Utc>) -> bool {
    is_published(question, now) && now < question.end_date
}
