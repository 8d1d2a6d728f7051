use rocket::{serde::json::Json, Route, State};

use crate::clock::SharedClock;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        pagination::{Paginated, Pagination},
        question::{QuestionDescription, QuestionResults, QuestionSummary},
    },
    common::QuestionId,
    db::Question,
};
use crate::service::eligibility;
use crate::store::Stores;

pub fn routes() -> Vec<Route> {
    routes![questions, question, question_results]
}

/// Published questions, newest first.
#[get("/questions")]
async fn questions(
    pagination: Pagination,
    stores: &State<Stores>,
    clock: &State<SharedClock>,
) -> Result<Json<Paginated<QuestionSummary>>> {
    let now = clock.now();
    let total = stores.questions.count_published(now).await?;
    let page = stores
        .questions
        .published_questions(now, pagination.skip(), pagination.limit())
        .await?
        .into_iter()
        .map(|question| QuestionSummary::new(question, now))
        .collect();
    Ok(Json(pagination.paginate(total, page)))
}

/// A question and its choices, only while it is open for voting.
#[get("/questions/<question_id>")]
async fn question(
    question_id: QuestionId,
    stores: &State<Stores>,
    clock: &State<SharedClock>,
) -> Result<Json<QuestionDescription>> {
    let question = find_question(stores, question_id).await?;
    if !eligibility::can_vote(&question, clock.now()) {
        return Err(Error::Forbidden(format!(
            "Question '{question_id}' is not open for voting"
        )));
    }
    let choices = stores.questions.choices(question_id).await?;
    Ok(Json(QuestionDescription::new(question, choices)))
}

#[get("/questions/<question_id>/results")]
async fn question_results(
    question_id: QuestionId,
    stores: &State<Stores>,
) -> Result<Json<QuestionResults>> {
    let question = find_question(stores, question_id).await?;
    let choices = stores.questions.choices(question_id).await?;
    Ok(Json(QuestionResults::new(question, choices)))
}

async fn find_question(stores: &Stores, question_id: QuestionId) -> Result<Question> {
    stores
        .questions
        .question(question_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Question with ID '{question_id}'")))
}
