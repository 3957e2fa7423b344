use super::BackgroundRemover;
use crate::codec;
use crate::error::RemovalError;
use async_trait::async_trait;
use image::DynamicImage;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Output size requested from the hosted API.
pub const SIZE_HINT: &str = "preview";

pub struct RemoteRemover {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl RemoteRemover {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, RemovalError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl BackgroundRemover for RemoteRemover {
    fn name(&self) -> &'static str {
        "remote"
    }

    #[tracing::instrument(skip(self, image), fields(endpoint = %self.endpoint))]
    async fn remove(&self, image: &DynamicImage) -> Result<DynamicImage, RemovalError> {
        let input = image.clone();
        let png = tokio::task::spawn_blocking(move || codec::encode_png(&input)).await??;

        let form = Form::new()
            .part(
                "image",
                Part::bytes(png)
                    .file_name("image.png")
                    .mime_str("image/png")?,
            )
            .text("size", SIZE_HINT);

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-Key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(RemovalError::Status(response.status()));
        }

        let body = response.bytes().await?;
        tracing::debug!(bytes = body.len(), "Remote removal succeeded");
        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&body)).await??;
        Ok(decoded)
    }
}
