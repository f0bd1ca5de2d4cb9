pub mod coins_handler;
pub mod portfolio_handler;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::domain::errors::{MarketDataError, PortfolioError, ValidationError};
use crate::persistence::session::DbSession;
use crate::persistence::DatabaseError;

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Plain `{"detail": ...}` acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct DetailResponse {
    pub detail: String,
}

impl DetailResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Failure of an API request, rendered as `{"detail": ...}` with a matching status
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Validation(String),
    Upstream(String),
    Internal,
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ApiError::NotFound(detail) | ApiError::Validation(detail) | ApiError::Upstream(detail) => {
                detail
            }
            ApiError::Internal => "Internal server error".to_string(),
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}

impl From<MarketDataError> for ApiError {
    fn from(e: MarketDataError) -> Self {
        match e {
            MarketDataError::CoinNotFound(_) => ApiError::NotFound(e.to_string()),
            MarketDataError::Validation(_) => ApiError::Validation(e.to_string()),
            MarketDataError::Transport(_)
            | MarketDataError::Upstream { .. }
            | MarketDataError::RateLimit(_) => {
                error!("Market data request failed: {}", e);
                ApiError::Upstream("Market data provider unavailable".to_string())
            }
            MarketDataError::Cache(_) | MarketDataError::InvalidUrl(_) => {
                error!("Market data layer failure: {}", e);
                ApiError::Internal
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        error!("Database failure: {}", e);
        ApiError::Internal
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<PortfolioError> for ApiError {
    fn from(e: PortfolioError) -> Self {
        match e {
            PortfolioError::MarketData(e) => e.into(),
            PortfolioError::Database(e) => e.into(),
            PortfolioError::Validation(e) => e.into(),
            PortfolioError::EntryVanished(_) => {
                error!("{}", e);
                ApiError::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Commit `session` when `result` succeeded, roll it back otherwise.
pub(crate) async fn finish<T, E>(session: DbSession, result: Result<T, E>) -> Result<T, ApiError>
where
    E: Into<ApiError>,
{
    match result {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_error) = session.rollback().await {
                warn!("Failed to roll back session: {}", rollback_error);
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found: ApiError = MarketDataError::CoinNotFound("x".into()).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let invalid: ApiError = ValidationError::NonPositiveAmount.into();
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let upstream: ApiError = MarketDataError::Upstream {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);

        let db: ApiError = PortfolioError::from(DatabaseError::QueryError("x".into())).into();
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upstream_detail_hides_internals() {
        let err: ApiError = MarketDataError::Upstream {
            status: 500,
            message: "secret stack trace".into(),
        }
        .into();

        match err {
            ApiError::Upstream(detail) => assert!(!detail.contains("secret")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
