//! Upload validation and artifact naming.

use chrono::Utc;
use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "bmp"];

pub const ORIGINAL_PREFIX: &str = "original_";
pub const RESULT_PREFIX: &str = "result_";
pub const DOWNLOAD_PREFIX: &str = "no-bg_";

/// Lowercased suffix after the last `.`, if there is one.
pub fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
}

pub fn allowed_file(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// The generated core name shared by an original artifact and its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    core: String,
}

impl ArtifactNames {
    /// Builds `image_<timestamp>_<8 hex>.<ext>` for an already validated filename.
    pub fn generate(original_filename: &str) -> Option<Self> {
        let ext = extension_of(original_filename)?;
        let unique_id = Uuid::new_v4().simple().to_string();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        Some(Self {
            core: format!("image_{}_{}.{}", timestamp, &unique_id[..8], ext),
        })
    }

    pub fn from_core(core: impl Into<String>) -> Self {
        Self { core: core.into() }
    }

    pub fn from_original(file_name: &str) -> Option<Self> {
        file_name
            .strip_prefix(ORIGINAL_PREFIX)
            .filter(|core| !core.is_empty())
            .map(Self::from_core)
    }

    pub fn core(&self) -> &str {
        &self.core
    }

    pub fn original(&self) -> String {
        format!("{}{}", ORIGINAL_PREFIX, self.core)
    }

    pub fn result(&self) -> String {
        format!("{}{}", RESULT_PREFIX, self.core)
    }

    pub fn download_name(&self) -> String {
        format!("{}{}", DOWNLOAD_PREFIX, self.core)
    }
}
