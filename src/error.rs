use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::provision::batch::BatchError;
use crate::provision::rows::ExtractError;
use crate::services::{CatalogError, ExportError, RegistryError};

/// Request-level failures. Row-level problems never get here; they end up as
/// diagnostics in the batch log.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Error reading file: {0}")]
    Upload(String),

    #[error("Error storing upload: {0}")]
    Storage(#[source] std::io::Error),

    #[error("Error opening sheet: {0}")]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Upload(_) | AppError::Extract(_) | AppError::Catalog(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Registry(
                RegistryError::InvalidAddress(_) | RegistryError::MissingField(_) | RegistryError::MultiLineSecret,
            ) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) | AppError::Registry(RegistryError::UnknownHost(_)) => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::Registry(_) | AppError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BatchError> for AppError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::UnknownHost(_) => AppError::NotFound("Server not found".to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            // Internal details stay in the log.
            return (status, "Internal Server Error").into_response();
        }
        tracing::warn!(error = %self, %status, "Request rejected");
        (status, self.to_string()).into_response()
    }
}
