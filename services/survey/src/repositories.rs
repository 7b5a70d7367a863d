//! Question and answer storage

use async_trait::async_trait;
use common::{
    database::{decode, with_timeout},
    error::DatabaseError,
    proto::{
        PageType,
        survey::{AddAnswerRequest, Question},
    },
};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::time::Duration;
use uuid::Uuid;

use crate::{error::SurveyError, stats::AnswerCount};

#[async_trait]
pub trait SurveyRepository: Send + Sync {
    async fn add_answer(&self, answer: &AddAnswerRequest) -> Result<(), SurveyError>;

    /// Questions of one page ordered by position
    async fn questions(&self, page: PageType) -> Result<Vec<Question>, SurveyError>;

    /// Every question ordered by page and position
    async fn all_questions(&self) -> Result<Vec<Question>, SurveyError>;

    async fn answer_counts(&self) -> Result<Vec<AnswerCount>, SurveyError>;

    async fn ping(&self) -> Result<(), SurveyError>;
}

fn question_from_row(row: &PgRow) -> Result<Question, SurveyError> {
    Ok(Question {
        id: row.get("id"),
        page: decode(row.get::<&str, _>("page"))?,
        text: row.get("text"),
        position: row.get("position"),
    })
}

#[derive(Clone)]
pub struct PgSurveyRepository {
    pool: PgPool,
    call_timeout: Duration,
}

impl PgSurveyRepository {
    pub fn new(pool: PgPool, call_timeout: Duration) -> Self {
        Self { pool, call_timeout }
    }
}

#[async_trait]
impl SurveyRepository for PgSurveyRepository {
    async fn add_answer(&self, answer: &AddAnswerRequest) -> Result<(), SurveyError> {
        with_timeout(self.call_timeout, async {
            let result = sqlx::query(
                r#"
                INSERT INTO answers (id, question_id, user_id, value)
                SELECT $1, q.id, $3, $4 FROM questions q WHERE q.id = $2
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(answer.question_id)
            .bind(answer.user_id)
            .bind(i64::from(answer.value))
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

            if result.rows_affected() == 0 {
                return Err(SurveyError::QuestionNotFound(answer.question_id));
            }
            Ok(())
        })
        .await
    }

    async fn questions(&self, page: PageType) -> Result<Vec<Question>, SurveyError> {
        with_timeout(self.call_timeout, async {
            let rows = sqlx::query(
                "SELECT id, page, text, position FROM questions WHERE page = $1 ORDER BY position",
            )
            .bind(page.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

            rows.iter().map(question_from_row).collect()
        })
        .await
    }

    async fn all_questions(&self) -> Result<Vec<Question>, SurveyError> {
        with_timeout(self.call_timeout, async {
            let rows = sqlx::query(
                "SELECT id, page, text, position FROM questions ORDER BY page, position",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

            rows.iter().map(question_from_row).collect()
        })
        .await
    }

    async fn answer_counts(&self) -> Result<Vec<AnswerCount>, SurveyError> {
        with_timeout(self.call_timeout, async {
            let rows = sqlx::query(
                r#"
                SELECT question_id, value, COUNT(*) AS count
                FROM answers
                GROUP BY question_id, value
                "#,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

            rows.iter()
                .map(|row| -> Result<AnswerCount, SurveyError> {
                    let value: i64 = row.get("value");
                    let count: i64 = row.get("count");
                    Ok(AnswerCount {
                        question_id: row.get("question_id"),
                        value: u32::try_from(value).map_err(|_| {
                            DatabaseError::Decode(format!("answer value out of range: {}", value))
                        })?,
                        count: count as u64,
                    })
                })
                .collect()
        })
        .await
    }

    async fn ping(&self) -> Result<(), SurveyError> {
        with_timeout(self.call_timeout, async {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(DatabaseError::Query)?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct State {
        questions: Vec<Question>,
        answers: Vec<AddAnswerRequest>,
    }

    #[derive(Clone, Default)]
    pub struct MemorySurveyRepository {
        state: Arc<RwLock<State>>,
    }

    impl MemorySurveyRepository {
        pub async fn seed_question(&self, page: PageType, position: i32, text: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.state.write().await.questions.push(Question {
                id,
                page,
                text: text.to_string(),
                position,
            });
            id
        }
    }

    #[async_trait]
    impl SurveyRepository for MemorySurveyRepository {
        async fn add_answer(&self, answer: &AddAnswerRequest) -> Result<(), SurveyError> {
            let mut state = self.state.write().await;
            if !state.questions.iter().any(|q| q.id == answer.question_id) {
                return Err(SurveyError::QuestionNotFound(answer.question_id));
            }
            state.answers.push(answer.clone());
            Ok(())
        }

        async fn questions(&self, page: PageType) -> Result<Vec<Question>, SurveyError> {
            let mut questions: Vec<Question> = self
                .state
                .read()
                .await
                .questions
                .iter()
                .filter(|q| q.page == page)
                .cloned()
                .collect();
            questions.sort_by_key(|q| q.position);
            Ok(questions)
        }

        async fn all_questions(&self) -> Result<Vec<Question>, SurveyError> {
            let mut questions = self.state.read().await.questions.clone();
            questions.sort_by(|a, b| {
                a.page
                    .as_str()
                    .cmp(b.page.as_str())
                    .then(a.position.cmp(&b.position))
            });
            Ok(questions)
        }

        async fn answer_counts(&self) -> Result<Vec<AnswerCount>, SurveyError> {
            let state = self.state.read().await;
            let mut counts: Vec<AnswerCount> = Vec::new();
            for answer in &state.answers {
                match counts
                    .iter_mut()
                    .find(|c| c.question_id == answer.question_id && c.value == answer.value)
                {
                    Some(c) => c.count += 1,
                    None => counts.push(AnswerCount {
                        question_id: answer.question_id,
                        value: answer.value,
                        count: 1,
                    }),
                }
            }
            Ok(counts)
        }

        async fn ping(&self) -> Result<(), SurveyError> {
            Ok(())
        }
    }
}
