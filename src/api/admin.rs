use log::{error, info};
use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{Admin, AuthToken},
        question::{QuestionDescription, QuestionSpec},
    },
    db::ChoiceCore,
};
use crate::store::Stores;

pub fn routes() -> Vec<Route> {
    routes![create_question, create_question_unauthenticated]
}

/// Create a question and its choices.
///
/// Not atomic: if storage fails part-way, the question is left with the
/// choices inserted so far.
#[post("/admin/questions", data = "<spec>", format = "json", rank = 1)]
async fn create_question(
    token: AuthToken<Admin>,
    spec: Json<QuestionSpec>,
    stores: &State<Stores>,
) -> Result<Json<QuestionDescription>> {
    let (question, choice_texts) = spec.into_inner().into_question()?;

    let question = stores.questions.insert_question(question).await?;
    let wanted = choice_texts.len();
    let mut choices = Vec::with_capacity(wanted);
    for text in choice_texts {
        match stores
            .questions
            .insert_choice(ChoiceCore::new(question.id, text))
            .await
        {
            Ok(choice) => choices.push(choice),
            Err(e) => {
                error!(
                    "Question {} left with {} of {wanted} choices: {e}",
                    question.id,
                    choices.len()
                );
                return Err(e);
            }
        }
    }

    info!(
        "Admin {} created question {} with {} choices",
        token.id,
        question.id,
        choices.len()
    );
    Ok(Json(QuestionDescription::new(question, choices)))
}

#[post("/admin/questions", rank = 2)]
fn create_question_unauthenticated() -> Error {
    Error::Unauthenticated("Log in as an administrator to create questions".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use chrono::{DateTime, Duration, Utc};
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use crate::clock::SystemClock;
    use crate::model::{
        common::{ChoiceId, QuestionId},
        db::{Choice, NewChoice, NewQuestion, Question},
    };
    use crate::store::{MemoryStore, QuestionStore};
    use crate::{test_cookies, Config};

    use super::*;

    /// Question storage that stops accepting choices after a fixed number.
    struct ChoiceQuota {
        inner: MemoryStore,
        remaining: AtomicUsize,
    }

    #[rocket::async_trait]
    impl QuestionStore for ChoiceQuota {
        async fn question(&self, id: QuestionId) -> Result<Option<Question>> {
            self.inner.question(id).await
        }

        async fn choice(
            &self,
            question_id: QuestionId,
            choice_id: ChoiceId,
        ) -> Result<Option<Choice>> {
            self.inner.choice(question_id, choice_id).await
        }

        async fn choices(&self, question_id: QuestionId) -> Result<Vec<Choice>> {
            self.inner.choices(question_id).await
        }

        async fn published_questions(
            &self,
            now: DateTime<Utc>,
            skip: u64,
            limit: u64,
        ) -> Result<Vec<Question>> {
            self.inner.published_questions(now, skip, limit).await
        }

        async fn count_published(&self, now: DateTime<Utc>) -> Result<u64> {
            self.inner.count_published(now).await
        }

        async fn insert_question(&self, question: NewQuestion) -> Result<Question> {
            self.inner.insert_question(question).await
        }

        async fn insert_choice(&self, choice: NewChoice) -> Result<Choice> {
            self.remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .map_err(|_| Error::Internal("choice quota exhausted".to_string()))?;
            self.inner.insert_choice(choice).await
        }

        async fn set_choice_votes(&self, choice_id: ChoiceId, votes: u64) -> Result<()> {
            self.inner.set_choice_votes(choice_id, votes).await
        }
    }

    #[backend_test]
    async fn create_question_with_choices(client: Client, store: MemoryStore) {
        let spec = QuestionSpec::example();
        let response = client
            .post(uri!(create_question))
            .header(ContentType::JSON)
            .cookie(test_cookies::admin("admin"))
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let description = response.into_json::<QuestionDescription>().await.unwrap();
        assert_eq!(description.text, spec.text);
        let texts = description
            .choices
            .iter()
            .map(|c| c.text.clone())
            .collect::<Vec<_>>();
        assert_eq!(texts, spec.choices);

        // The question is stored, and its choices start with no votes.
        let question = store.question(description.id).await.unwrap().unwrap();
        assert_eq!(question.text, spec.text);
        let choices = store.choices(description.id).await.unwrap();
        assert_eq!(choices.len(), 2);
        assert!(choices.iter().all(|c| c.votes == 0));
    }

    #[backend_test]
    async fn empty_voting_window_is_rejected(client: Client, store: MemoryStore) {
        let mut spec = QuestionSpec::example();
        spec.end_date = spec.pub_date - Duration::seconds(1);
        let response = client
            .post(uri!(create_question))
            .header(ContentType::JSON)
            .cookie(test_cookies::admin("admin"))
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(store.count_published(spec.pub_date).await.unwrap(), 0);
    }

    #[backend_test]
    async fn voters_cannot_create_questions(client: Client, store: MemoryStore) {
        let body = serde_json::to_string(&QuestionSpec::example()).unwrap();

        let response = client
            .post(uri!(create_question))
            .header(ContentType::JSON)
            .cookie(test_cookies::voter("User1"))
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client
            .post(uri!(create_question))
            .header(ContentType::JSON)
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        assert!(store.question(1).await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn storage_failure_midway_is_reported() {
        let store = MemoryStore::default();
        let stores = Stores {
            questions: Arc::new(ChoiceQuota {
                inner: store.clone(),
                remaining: AtomicUsize::new(1),
            }),
            votes: Arc::new(store.clone()),
        };
        let rocket = crate::rocket_with_state(Config::example(), stores, Arc::new(SystemClock));
        let client = Client::tracked(rocket).await.unwrap();

        let response = client
            .post(uri!(create_question))
            .header(ContentType::JSON)
            .cookie(test_cookies::admin("admin"))
            .body(serde_json::to_string(&QuestionSpec::example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::InternalServerError, response.status());

        // The question stays behind with the one choice stored before the failure.
        let question = store.question(1).await.unwrap().unwrap();
        let choices = store.choices(question.id).await.unwrap();
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].text, "Vim");
    }
}
