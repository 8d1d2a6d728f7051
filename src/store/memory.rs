use std::collections::{hash_map::Entry, BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocket::tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{
    common::{ChoiceId, QuestionId, VoterId},
    db::{Choice, NewChoice, NewQuestion, NewVote, Question, Vote},
    mongodb::Id,
};

use super::{QuestionStore, VoteStore};

/// An in-process store. Cloning it yields another handle on the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    questions: BTreeMap<QuestionId, Question>,
    choices: BTreeMap<ChoiceId, Choice>,
    votes: HashMap<(QuestionId, VoterId), Vote>,
    last_question_id: QuestionId,
    last_choice_id: ChoiceId,
}

#[rocket::async_trait]
impl QuestionStore for MemoryStore {
    async fn question(&self, id: QuestionId) -> Result<Option<Question>> {
        Ok(self.state.lock().await.questions.get(&id).cloned())
    }

    async fn choice(&self, question_id: QuestionId, choice_id: ChoiceId) -> Result<Option<Choice>> {
        let state = self.state.lock().await;
        Ok(state
            .choices
            .get(&choice_id)
            .filter(|choice| choice.question_id == question_id)
            .cloned())
    }

    async fn choices(&self, question_id: QuestionId) -> Result<Vec<Choice>> {
        let state = self.state.lock().await;
        Ok(state
            .choices
            .values()
            .filter(|choice| choice.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn published_questions(
        &self,
        now: DateTime<Utc>,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Question>> {
        let state = self.state.lock().await;
        let mut published = state
            .questions
            .values()
            .filter(|question| question.pub_date <= now)
            .cloned()
            .collect::<Vec<_>>();
        published.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        Ok(published
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    async fn count_published(&self, now: DateTime<Utc>) -> Result<u64> {
        let state = self.state.lock().await;
        let count = state
            .questions
            .values()
            .filter(|question| question.pub_date <= now)
            .count();
        Ok(count as u64)
    }

    async fn insert_question(&self, question: NewQuestion) -> Result<Question> {
        let mut state = self.state.lock().await;
        state.last_question_id += 1;
        let question = Question {
            id: state.last_question_id,
            question,
        };
        state.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn insert_choice(&self, choice: NewChoice) -> Result<Choice> {
        let mut state = self.state.lock().await;
        if !state.questions.contains_key(&choice.question_id) {
            return Err(Error::not_found(format!(
                "Question with ID '{}'",
                choice.question_id
            )));
        }
        state.last_choice_id += 1;
        let choice = Choice {
            id: state.last_choice_id,
            choice,
        };
        state.choices.insert(choice.id, choice.clone());
        Ok(choice)
    }

    async fn set_choice_votes(&self, choice_id: ChoiceId, votes: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        let choice = state
            .choices
            .get_mut(&choice_id)
            .ok_or_else(|| Error::not_found(format!("Choice with ID '{choice_id}'")))?;
        choice.votes = votes;
        Ok(())
    }
}

#[rocket::async_trait]
impl VoteStore for MemoryStore {
    async fn upsert_vote(&self, vote: NewVote) -> Result<bool> {
        let mut state = self.state.lock().await;
        let key = (vote.question_id, vote.voter_id.clone());
        match state.votes.entry(key) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().choice_id = vote.choice_id;
                Ok(false)
            }
            Entry::Vacant(slot) => {
                slot.insert(Vote { id: Id::new(), vote });
                Ok(true)
            }
        }
    }

    async fn count_votes(&self, question_id: QuestionId, choice_id: ChoiceId) -> Result<u64> {
        let state = self.state.lock().await;
        let count = state
            .votes
            .values()
            .filter(|vote| vote.question_id == question_id && vote.choice_id == choice_id)
            .count();
        Ok(count as u64)
    }

    async fn vote(&self, question_id: QuestionId, voter_id: &str) -> Result<Option<Vote>> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .get(&(question_id, voter_id.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    use crate::model::db::{ChoiceCore, QuestionCore, VoteCore};

    #[rocket::async_test]
    async fn ids_are_allocated_in_order() {
        let store = MemoryStore::default();
        let q1 = store
            .insert_question(QuestionCore::open_example())
            .await
            .unwrap();
        let q2 = store
            .insert_question(QuestionCore::closed_example())
            .await
            .unwrap();
        assert_eq!((q1.id, q2.id), (1, 2));

        let c1 = store.insert_choice(ChoiceCore::new(q1.id, "A")).await.unwrap();
        let c2 = store.insert_choice(ChoiceCore::new(q2.id, "B")).await.unwrap();
        assert_eq!((c1.id, c2.id), (1, 2));
        assert_eq!(c1.votes, 0);
    }

    #[rocket::async_test]
    async fn choice_of_orphan_question_is_rejected() {
        let store = MemoryStore::default();
        let result = store.insert_choice(ChoiceCore::new(42, "A")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[rocket::async_test]
    async fn choice_lookup_is_scoped_to_question() {
        let store = MemoryStore::default();
        let q1 = store
            .insert_question(QuestionCore::open_example())
            .await
            .unwrap();
        let q2 = store
            .insert_question(QuestionCore::open_example())
            .await
            .unwrap();
        let choice = store.insert_choice(ChoiceCore::new(q1.id, "A")).await.unwrap();

        assert!(store.choice(q1.id, choice.id).await.unwrap().is_some());
        assert!(store.choice(q2.id, choice.id).await.unwrap().is_none());
        assert!(store.choices(q2.id).await.unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn published_questions_are_newest_first() {
        let store = MemoryStore::default();
        let old = store
            .insert_question(QuestionCore::example("old", -5, 30))
            .await
            .unwrap();
        let future = store
            .insert_question(QuestionCore::example("future", 5, 30))
            .await
            .unwrap();
        let new = store
            .insert_question(QuestionCore::example("new", -1, 30))
            .await
            .unwrap();

        let now = Utc::now();
        let published = store.published_questions(now, 0, 10).await.unwrap();
        let ids = published.iter().map(|q| q.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![new.id, old.id]);
        assert!(!ids.contains(&future.id));
        assert_eq!(store.count_published(now).await.unwrap(), 2);

        let second_page = store.published_questions(now, 1, 1).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].id, old.id);

        // Once the future question's time comes, it is listed first.
        let later = now + Duration::days(6);
        let published = store.published_questions(later, 0, 10).await.unwrap();
        assert_eq!(published[0].id, future.id);
    }

    #[rocket::async_test]
    async fn upsert_replaces_existing_vote() {
        let store = MemoryStore::default();
        let vote = |choice_id| VoteCore {
            question_id: 1,
            voter_id: "alice".to_string(),
            choice_id,
        };

        assert!(store.upsert_vote(vote(1)).await.unwrap());
        let first = store.vote(1, "alice").await.unwrap().unwrap();

        assert!(!store.upsert_vote(vote(2)).await.unwrap());
        let second = store.vote(1, "alice").await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.choice_id, 2);
        assert_eq!(store.count_votes(1, 1).await.unwrap(), 0);
        assert_eq!(store.count_votes(1, 2).await.unwrap(), 1);
        assert!(store.vote(1, "bob").await.unwrap().is_none());
    }
}
