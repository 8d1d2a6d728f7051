use rocket::{serde::json::Json, Route, State};

use crate::clock::SharedClock;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{AuthToken, Voter},
        vote::{CurrentVote, VoteReceipt, VoteRequest},
    },
    common::QuestionId,
};
use crate::store::Stores;

pub fn routes() -> Vec<Route> {
    routes![
        cast_vote,
        cast_vote_unauthenticated,
        current_vote,
        current_vote_unauthenticated,
    ]
}

#[post(
    "/questions/<question_id>/vote",
    data = "<vote>",
    format = "json",
    rank = 1
)]
async fn cast_vote(
    token: AuthToken<Voter>,
    question_id: QuestionId,
    vote: Json<VoteRequest>,
    stores: &State<Stores>,
    clock: &State<SharedClock>,
) -> Result<Json<VoteReceipt>> {
    let choice_id = vote
        .choice
        .ok_or_else(|| Error::InvalidChoice("You didn't select a choice".to_string()))?;
    let outcome = stores
        .voting()
        .cast_vote(question_id, &token.id, choice_id, clock.now())
        .await?;
    Ok(Json(outcome.into()))
}

#[post("/questions/<_>/vote", rank = 2)]
fn cast_vote_unauthenticated() -> Error {
    Error::Unauthenticated("Log in as a voter to vote".to_string())
}

#[get("/voter/questions/<question_id>/vote", rank = 1)]
async fn current_vote(
    token: AuthToken<Voter>,
    question_id: QuestionId,
    stores: &State<Stores>,
) -> Result<Json<CurrentVote>> {
    let vote = stores
        .votes
        .vote(question_id, &token.id)
        .await?
        .ok_or_else(|| {
            Error::not_found(format!(
                "Vote by '{}' on question '{question_id}'",
                token.id
            ))
        })?;
    Ok(Json(vote.into()))
}

#[get("/voter/questions/<_>/vote", rank = 2)]
fn current_vote_unauthenticated() -> Error {
    Error::Unauthenticated("Log in as a voter to see your vote".to_string())
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json,
    };

    use crate::model::{
        common::ChoiceId,
        db::{Choice, ChoiceCore, Question, QuestionCore},
    };
    use crate::store::{MemoryStore, QuestionStore, VoteStore};
    use crate::test_cookies;

    use super::*;

    async fn question_with_choices(
        store: &MemoryStore,
        question: QuestionCore,
    ) -> (Question, Choice, Choice) {
        let question = store.insert_question(question).await.unwrap();
        let yes = store
            .insert_choice(ChoiceCore::new(question.id, "Yes"))
            .await
            .unwrap();
        let no = store
            .insert_choice(ChoiceCore::new(question.id, "No"))
            .await
            .unwrap();
        (question, yes, no)
    }

    async fn vote<'c>(
        client: &'c Client,
        voter: &str,
        question_id: QuestionId,
        choice_id: Option<ChoiceId>,
    ) -> LocalResponse<'c> {
        let body = serde_json::to_string(&VoteRequest { choice: choice_id }).unwrap();
        client
            .post(uri!(cast_vote(question_id)))
            .header(ContentType::JSON)
            .cookie(test_cookies::voter(voter))
            .body(body)
            .dispatch()
            .await
    }

    #[backend_test]
    async fn vote_then_change_mind(client: Client, store: MemoryStore) {
        let (question, yes, no) = question_with_choices(&store, QuestionCore::open_example()).await;

        let response = vote(&client, "User1", question.id, Some(yes.id)).await;
        assert_eq!(Status::Ok, response.status());
        let receipt = response.into_json::<VoteReceipt>().await.unwrap();
        assert!(receipt.created);
        assert_eq!(receipt.message, "Successfully voted!");

        let response = vote(&client, "User1", question.id, Some(no.id)).await;
        assert_eq!(Status::Ok, response.status());
        let receipt = response.into_json::<VoteReceipt>().await.unwrap();
        assert!(!receipt.created);
        assert_eq!(receipt.message, "Replaced your previous vote.");

        // Only the latest choice counts.
        let counts = store
            .choices(question.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.votes)
            .collect::<Vec<_>>();
        assert_eq!(counts, vec![0, 1]);

        let response = client
            .get(uri!(current_vote(question.id)))
            .cookie(test_cookies::voter("User1"))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let current = response.into_json::<CurrentVote>().await.unwrap();
        assert_eq!(current.choice_id, no.id);
    }

    #[backend_test]
    async fn vote_requires_voter_token(client: Client, store: MemoryStore) {
        let (question, yes, _) = question_with_choices(&store, QuestionCore::open_example()).await;
        let body = serde_json::to_string(&VoteRequest {
            choice: Some(yes.id),
        })
        .unwrap();

        // No cookie at all.
        let response = client
            .post(uri!(cast_vote(question.id)))
            .header(ContentType::JSON)
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        // An admin is not a voter.
        let response = client
            .post(uri!(cast_vote(question.id)))
            .header(ContentType::JSON)
            .cookie(test_cookies::admin("admin"))
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        assert_eq!(store.count_votes(question.id, yes.id).await.unwrap(), 0);
    }

    #[backend_test]
    async fn vote_rejections(client: Client, store: MemoryStore) {
        let (open, yes, _) = question_with_choices(&store, QuestionCore::open_example()).await;
        let (closed, closed_yes, _) =
            question_with_choices(&store, QuestionCore::closed_example()).await;
        let (future, future_yes, _) =
            question_with_choices(&store, QuestionCore::future_example()).await;

        let response = vote(&client, "User1", closed.id, Some(closed_yes.id)).await;
        assert_eq!(Status::Forbidden, response.status());

        let response = vote(&client, "User1", future.id, Some(future_yes.id)).await;
        assert_eq!(Status::Forbidden, response.status());

        let response = vote(&client, "User1", 999, Some(yes.id)).await;
        assert_eq!(Status::NotFound, response.status());

        // A choice belonging to another question.
        let response = vote(&client, "User1", open.id, Some(closed_yes.id)).await;
        assert_eq!(Status::BadRequest, response.status());

        // No choice selected.
        let response = vote(&client, "User1", open.id, None).await;
        assert_eq!(Status::BadRequest, response.status());

        for question_id in [open.id, closed.id, future.id] {
            assert!(store.vote(question_id, "User1").await.unwrap().is_none());
        }
    }

    #[backend_test]
    async fn no_current_vote(client: Client, store: MemoryStore) {
        let (question, _, _) = question_with_choices(&store, QuestionCore::open_example()).await;

        let response = client
            .get(uri!(current_vote(question.id)))
            .cookie(test_cookies::voter("User1"))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let response = client
            .get(uri!(current_vote(question.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}
