//! Survey service routes

use axum::{Json, Router, extract::State, routing::post};
use common::{
    error::ServiceError,
    metrics::Metrics,
    proto::{
        Empty, PING,
        survey::{
            ADD_ANSWER, AddAnswerRequest, GET_QUESTIONS, GET_STATS, QuestionList,
            QuestionsRequest, SERVICE, StatsList,
        },
    },
    rpc::{RpcJson, health_router, rpc_path, with_common_layers},
};
use std::sync::Arc;
use tracing::info;

use crate::{repositories::SurveyRepository, stats};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub survey: Arc<dyn SurveyRepository>,
}

/// Create the router for the survey service
pub fn create_router(state: AppState, metrics: Arc<Metrics>) -> Router {
    let rpc = Router::new()
        .route(&rpc_path(SERVICE, ADD_ANSWER), post(add_answer))
        .route(&rpc_path(SERVICE, GET_QUESTIONS), post(get_questions))
        .route(&rpc_path(SERVICE, GET_STATS), post(get_stats))
        .route(&rpc_path(SERVICE, PING), post(ping))
        .with_state(state);

    with_common_layers(rpc.merge(health_router(SERVICE)), metrics)
}

pub async fn add_answer(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<AddAnswerRequest>,
) -> Result<Json<Empty>, ServiceError> {
    state.survey.add_answer(&payload).await?;
    info!(question_id = %payload.question_id, "Answer recorded");
    Ok(Json(Empty {}))
}

pub async fn get_questions(
    State(state): State<AppState>,
    RpcJson(payload): RpcJson<QuestionsRequest>,
) -> Result<Json<QuestionList>, ServiceError> {
    let questions = state.survey.questions(payload.page).await?;
    Ok(Json(QuestionList { questions }))
}

pub async fn get_stats(
    State(state): State<AppState>,
    RpcJson(_): RpcJson<Empty>,
) -> Result<Json<StatsList>, ServiceError> {
    let questions = state.survey.all_questions().await?;
    let counts = state.survey.answer_counts().await?;
    Ok(Json(StatsList {
        stats: stats::aggregate(&questions, &counts),
    }))
}

pub async fn ping(State(state): State<AppState>) -> Result<Json<Empty>, ServiceError> {
    state.survey.ping().await?;
    Ok(Json(Empty {}))
}
