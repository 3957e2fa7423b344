use axum::http::StatusCode;
use thiserror::Error;

/// Failure of a single removal strategy.
#[derive(Debug, Error)]
pub enum RemovalError {
    #[error("removal service answered with HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("removal request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("could not decode or encode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("segmentation model failed: {0}")]
    Model(String),

    #[error("removal task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Outcome of a failed `POST /remove-bg`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Rejected before anything was written.
    #[error("{0}")]
    InvalidUpload(String),

    #[error("Error processing image: {0:#}")]
    Processing(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            AppError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RemovalError> for AppError {
    fn from(err: RemovalError) -> Self {
        AppError::Processing(err.into())
    }
}
