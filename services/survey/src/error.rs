use common::error::{DatabaseError, ServiceError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SurveyError {
    #[error("question {0} not found")]
    QuestionNotFound(Uuid),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<SurveyError> for ServiceError {
    fn from(err: SurveyError) -> Self {
        match err {
            SurveyError::QuestionNotFound(_) => ServiceError::NotFound(err.to_string()),
            SurveyError::Database(e) => e.into(),
        }
    }
}
