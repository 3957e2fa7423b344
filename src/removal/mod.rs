//! Background removal strategies.
//!
//! [`RemoteRemover`] calls the hosted API and [`LocalRemover`] runs a
//! segmentation model in-process (`model` feature). [`ColorKeyRemover`] keys
//! out the border colour and answers when no model can be loaded.
//! [`FallbackRemover`] chains them so any failure drops down a level.

mod fallback;
mod keying;
#[cfg(feature = "model")]
mod local;
mod remote;

pub use fallback::FallbackRemover;
pub use keying::{key_out_background, ColorKeyRemover, KeyingOptions};
#[cfg(feature = "model")]
pub use local::{fetch_model, model_spec, LocalRemover};
pub use remote::{RemoteRemover, SIZE_HINT};

use crate::config::{Config, LocalModelConfig};
use crate::error::RemovalError;
use async_trait::async_trait;
use image::DynamicImage;
use std::sync::Arc;

#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    async fn remove(&self, image: &DynamicImage) -> Result<DynamicImage, RemovalError>;
}

#[async_trait]
impl<T: BackgroundRemover + ?Sized> BackgroundRemover for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn remove(&self, image: &DynamicImage) -> Result<DynamicImage, RemovalError> {
        (**self).remove(image).await
    }
}

/// Remote first when an API key is configured, then the local chain.
pub fn from_config(config: &Config) -> Result<Arc<dyn BackgroundRemover>, RemovalError> {
    let local = local_chain(&config.local_model)?;
    match &config.remote {
        Some(remote) => {
            let primary = RemoteRemover::new(&remote.endpoint, &remote.api_key, remote.timeout)?;
            tracing::info!(endpoint = %remote.endpoint, "Remote background removal enabled");
            Ok(Arc::new(FallbackRemover::new(primary, local)))
        }
        None => {
            tracing::warn!("REM_BG_API_KEY is not set, using local background removal only");
            Ok(local)
        }
    }
}

#[cfg(feature = "model")]
fn local_chain(model: &LocalModelConfig) -> Result<Arc<dyn BackgroundRemover>, RemovalError> {
    let segmentation = LocalRemover::new(model)?;
    tracing::info!(model = %model.model, "Local segmentation enabled");
    Ok(Arc::new(FallbackRemover::new(segmentation, ColorKeyRemover::default())))
}

#[cfg(not(feature = "model"))]
fn local_chain(_model: &LocalModelConfig) -> Result<Arc<dyn BackgroundRemover>, RemovalError> {
    tracing::warn!("Built without the `model` feature, local removal uses colour keying");
    Ok(Arc::new(ColorKeyRemover::default()))
}

/// Fetches the configured model repository, pointing `model` at the cached copy.
/// A failed download is logged and removal falls back as usual.
#[cfg(feature = "model")]
pub async fn prepare_local_model(model: &mut LocalModelConfig) {
    let Some(url) = model.download_url.clone() else {
        return;
    };
    match fetch_model(&url).await {
        Ok(id) => {
            tracing::info!(%url, model = %id, "Segmentation model ready");
            model.model = id;
        }
        Err(err) => tracing::warn!(error = %err, %url, "Could not fetch segmentation model"),
    }
}

#[cfg(not(feature = "model"))]
pub async fn prepare_local_model(model: &mut LocalModelConfig) {
    if model.download_url.is_some() {
        tracing::warn!("LOCAL_MODEL_URL is set but the `model` feature is disabled");
    }
}
