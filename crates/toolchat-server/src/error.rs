use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use toolchat_core::{AgentError, HistoryError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("session '{0}' is busy with another prompt")]
    SessionBusy(String),

    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<HistoryError> for ApiError {
    fn from(error: HistoryError) -> Self {
        ApiError::Agent(error.into())
    }
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "InvalidRequest",
            ApiError::SessionBusy(_) => "SessionBusy",
            ApiError::SessionNotFound(_) => "SessionNotFound",
            ApiError::Agent(error) => error.code(),
            ApiError::Internal(_) => "InternalError",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::SessionBusy(_) => true,
            ApiError::Agent(error) => error.is_retryable(),
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    retryable: bool,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SessionBusy(_) => StatusCode::CONFLICT,
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Agent(error) => match error {
                AgentError::ToolLoopExceeded(_) => StatusCode::UNPROCESSABLE_ENTITY,
                AgentError::PartialResponse(_) => StatusCode::SERVICE_UNAVAILABLE,
                AgentError::LLM(_) => StatusCode::BAD_GATEWAY,
                AgentError::Cancelled => StatusCode::CONFLICT,
                AgentError::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorEnvelope {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
                retryable: self.is_retryable(),
            },
        })
    }
}
