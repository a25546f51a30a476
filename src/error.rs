use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ports::RepositoryError;
use crate::services::{CallbackError, EngineError, ServiceError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => AppError::NotFound(format!("Transaction {} not found", id)),
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(e) => AppError::Validation(e.to_string()),
            e @ ServiceError::RouteNotFound { .. } => AppError::NotFound(e.to_string()),
            ServiceError::Registry(e) => AppError::Internal(e.to_string()),
            ServiceError::Engine(EngineError::Repository(e)) | ServiceError::Repository(e) => {
                AppError::from(e)
            }
            ServiceError::Engine(e @ EngineError::NotPending { .. })
            | ServiceError::Engine(e @ EngineError::Unsupported { .. }) => {
                AppError::Conflict(e.to_string())
            }
        }
    }
}

impl From<CallbackError> for AppError {
    fn from(err: CallbackError) -> Self {
        match err {
            CallbackError::Repository(e) => AppError::Database(e.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RouteError;
    use crate::validation::ValidationError;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_route_not_found_is_404() {
        let error = AppError::from(ServiceError::RouteNotFound {
            txn_id: 7,
            source: RouteError::GatewayNotFound("gw".to_string()),
        });
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_repository_failure_is_500() {
        let error = AppError::from(ServiceError::Repository(RepositoryError::Database(
            sqlx::Error::PoolTimedOut,
        )));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_missing_transaction_is_404() {
        let error = AppError::from(RepositoryError::NotFound("42".to_string()));
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_finalize_of_settled_transaction_conflicts() {
        let error = AppError::from(ServiceError::Engine(EngineError::NotPending {
            txn_id: 1,
            status: crate::domain::TxnStatus::Reconciled,
        }));
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_finalize_without_status_endpoint_conflicts() {
        let error = AppError::from(ServiceError::Engine(EngineError::Unsupported {
            txn_id: 1,
            adapter: "alpex".to_string(),
        }));
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_callback_errors_map_to_400_or_500() {
        let unknown = AppError::from(CallbackError::UnknownProvider("x".to_string()));
        assert_eq!(unknown.status_code(), StatusCode::BAD_REQUEST);

        let db = AppError::from(CallbackError::Repository(RepositoryError::Database(
            sqlx::Error::PoolClosed,
        )));
        assert_eq!(db.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_validation_error_response() {
        let error = AppError::from(ServiceError::Validation(ValidationError::new(
            "gtw_name",
            "must not be empty",
        )));
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
