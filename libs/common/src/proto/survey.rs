//! Survey service surface

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::PageType;

pub const SERVICE: &str = "survey";

pub const ADD_ANSWER: &str = "AddAnswer";
pub const GET_QUESTIONS: &str = "GetQuestions";
pub const GET_STATS: &str = "GetStats";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: Uuid,
    pub page: PageType,
    pub text: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddAnswerRequest {
    pub user_id: Uuid,
    pub question_id: Uuid,
    pub value: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionsRequest {
    pub page: PageType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionList {
    pub questions: Vec<Question>,
}

/// Aggregate of every answer given to one question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionStats {
    pub question_id: Uuid,
    pub page: PageType,
    pub text: String,
    pub answers: u64,
    pub average: f64,
    pub distribution: BTreeMap<u32, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsList {
    pub stats: Vec<QuestionStats>,
}
