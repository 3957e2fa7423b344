use crate::upload::{ArtifactNames, ORIGINAL_PREFIX, RESULT_PREFIX};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Original,
    Result,
    Other,
}

impl ArtifactKind {
    pub fn classify(file_name: &str) -> Self {
        if file_name.starts_with(ORIGINAL_PREFIX) {
            ArtifactKind::Original
        } else if file_name.starts_with(RESULT_PREFIX) {
            ArtifactKind::Result
        } else {
            ArtifactKind::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Original => "original",
            ArtifactKind::Result => "result",
            ArtifactKind::Other => "other",
        }
    }
}

/// A file in the upload directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub file_name: String,
    pub kind: ArtifactKind,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

/// Body of a successful JSON-mode `POST /remove-bg`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalResponse {
    pub filename: String,
    pub original_image: String,
    pub result_image: String,
    pub download_url: String,
}

impl RemovalResponse {
    pub fn new(names: &ArtifactNames) -> Self {
        Self {
            filename: names.core().to_string(),
            original_image: format!("/uploads/{}", names.original()),
            result_image: format!("/uploads/{}", names.result()),
            download_url: format!("/download/{}", names.core()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
