use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::db::StoreError;
use crate::services::tools::ToolError;
use crate::services::travel_service::TravelError;

/// Errors surfaced to HTTP callers. The body mirrors `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    Store(#[from] StoreError),
}

impl From<TravelError> for ApiError {
    fn from(error: TravelError) -> Self {
        match error {
            TravelError::PlanNotFound(_) => ApiError::NotFound("旅行规划不存在".to_string()),
            TravelError::InvalidDateRange => ApiError::Validation(error.to_string()),
            TravelError::Store(e) => ApiError::Store(e),
            TravelError::Llm(e) => ApiError::Upstream(e.to_string()),
            TravelError::Task(_) | TravelError::Disconnected => ApiError::Internal(error.to_string()),
        }
    }
}

impl From<ToolError> for ApiError {
    fn from(error: ToolError) -> Self {
        match error {
            ToolError::UnknownFunction(_) => ApiError::NotFound(error.to_string()),
            ToolError::Execution { .. } => ApiError::Upstream(error.to_string()),
            _ => ApiError::Validation(error.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Store(StoreError::InvalidId(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            log::error!("Request failed: {}", self);
        }
        let detail = self.to_string();
        HttpResponse::build(self.status_code()).json(ErrorBody { detail: &detail })
    }
}
