//! Survey questions, answers and statistics

use axum::{
    Json,
    extract::{Path, State},
};
use common::{
    context::RequestContext,
    proto::{
        Empty, PageType,
        survey::{
            ADD_ANSWER, AddAnswerRequest, GET_QUESTIONS, GET_STATS, QuestionList,
            QuestionsRequest, StatsList,
        },
    },
    rpc::RpcJson,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::CurrentUser,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct AnswerForm {
    pub question_id: Uuid,
    pub value: u32,
}

pub async fn questions(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(page): Path<String>,
) -> ApiResult<Json<QuestionList>> {
    let page = page.parse::<PageType>().map_err(|e| ApiError::Service(e.into()))?;
    let questions = state
        .clients
        .survey
        .call(&ctx, GET_QUESTIONS, &QuestionsRequest { page })
        .await?;
    Ok(Json(questions))
}

pub async fn stats(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> ApiResult<Json<StatsList>> {
    let stats = state
        .clients
        .survey
        .call(&ctx, GET_STATS, &Empty {})
        .await?;
    Ok(Json(stats))
}

pub async fn answer(
    State(state): State<AppState>,
    ctx: RequestContext,
    user: CurrentUser,
    RpcJson(form): RpcJson<AnswerForm>,
) -> ApiResult<Json<Empty>> {
    let done = state
        .clients
        .survey
        .call(
            &ctx,
            ADD_ANSWER,
            &AddAnswerRequest {
                user_id: user.user_id,
                question_id: form.question_id,
                value: form.value,
            },
        )
        .await?;
    Ok(Json(done))
}
