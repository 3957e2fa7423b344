use super::BackgroundRemover;
use crate::error::RemovalError;
use async_trait::async_trait;
use image::DynamicImage;

/// Tries `primary` and answers with `fallback` on any primary failure.
pub struct FallbackRemover<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackRemover<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<P, F> BackgroundRemover for FallbackRemover<P, F>
where
    P: BackgroundRemover,
    F: BackgroundRemover,
{
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn remove(&self, image: &DynamicImage) -> Result<DynamicImage, RemovalError> {
        match self.primary.remove(image).await {
            Ok(output) => Ok(output),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    "Primary background removal failed, falling back"
                );
                self.fallback.remove(image).await
            }
        }
    }
}
