//! In-process segmentation through `imgly_bgremove` on its pure-Rust tract backend.
//!
//! The processor owns a backend that is not `Send`, so it lives on a single
//! worker thread and requests reach it over a channel. The model is loaded on
//! the first request and loading is retried on the next one if it fails.

use super::BackgroundRemover;
use crate::config::LocalModelConfig;
use crate::error::RemovalError;
use async_trait::async_trait;
use image::DynamicImage;
use imgly_bgremove::{
    BackendFactory, BackendType, BackgroundRemovalProcessor, BgRemovalError, ExecutionProvider,
    InferenceBackend, ModelDownloader, ModelManager, ModelSource, ModelSpec, OutputFormat,
    ProcessorConfig, ProcessorConfigBuilder, TractBackend,
};
use std::path::Path;
use std::sync::mpsc;
use tokio::sync::oneshot;

type Reply = oneshot::Sender<Result<DynamicImage, RemovalError>>;

/// Hands out tract backends only; the ONNX runtime is not linked.
struct TractFactory;

impl BackendFactory for TractFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> imgly_bgremove::Result<Box<dyn InferenceBackend>> {
        match backend_type {
            BackendType::Tract => Ok(Box::new(TractBackend::with_model_manager(model_manager))),
            BackendType::Onnx => Err(BgRemovalError::invalid_config(
                "only the tract backend is available",
            )),
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Tract]
    }
}

/// Background removal with a segmentation model (ISNet by default).
pub struct LocalRemover {
    jobs: mpsc::Sender<(DynamicImage, Reply)>,
}

impl LocalRemover {
    pub fn new(config: &LocalModelConfig) -> Result<Self, RemovalError> {
        let processor_config = ProcessorConfigBuilder::new()
            .model_spec(model_spec(config))
            .backend_type(BackendType::Tract)
            .execution_provider(ExecutionProvider::Cpu)
            .output_format(OutputFormat::Png)
            .build()
            .map_err(model_error)?;

        let (jobs, queue) = mpsc::channel();
        std::thread::Builder::new()
            .name("segmentation".to_string())
            .spawn(move || run_worker(processor_config, queue))
            .map_err(|e| RemovalError::Model(format!("could not start segmentation worker: {}", e)))?;

        Ok(Self { jobs })
    }
}

#[async_trait]
impl BackgroundRemover for LocalRemover {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn remove(&self, image: &DynamicImage) -> Result<DynamicImage, RemovalError> {
        let (reply, outcome) = oneshot::channel();
        self.jobs
            .send((image.clone(), reply))
            .map_err(|_| worker_stopped())?;
        outcome.await.map_err(|_| worker_stopped())?
    }
}

/// An existing directory is used as an external model, anything else as a cache id.
pub fn model_spec(config: &LocalModelConfig) -> ModelSpec {
    let path = Path::new(&config.model);
    let source = if path.is_dir() {
        ModelSource::External(path.to_path_buf())
    } else {
        ModelSource::Downloaded(config.model.clone())
    };
    ModelSpec {
        source,
        variant: config.variant.clone(),
    }
}

/// Downloads a model repository into the imgly cache and returns its id.
pub async fn fetch_model(url: &str) -> Result<String, RemovalError> {
    let downloader = ModelDownloader::new().map_err(model_error)?;
    downloader.download_model(url, false).await.map_err(model_error)
}

fn run_worker(config: ProcessorConfig, queue: mpsc::Receiver<(DynamicImage, Reply)>) {
    let mut loaded: Option<BackgroundRemovalProcessor> = None;

    for (image, reply) in queue {
        let outcome = segment(&config, &mut loaded, &image);
        // the caller may have gone away
        let _ = reply.send(outcome);
    }
}

fn segment(
    config: &ProcessorConfig,
    loaded: &mut Option<BackgroundRemovalProcessor>,
    image: &DynamicImage,
) -> Result<DynamicImage, RemovalError> {
    let mut processor = match loaded.take() {
        Some(processor) => processor,
        None => load(config)?,
    };
    let outcome = processor
        .process_image(image)
        .map(|result| result.image)
        .map_err(model_error);
    *loaded = Some(processor);
    outcome
}

fn load(config: &ProcessorConfig) -> Result<BackgroundRemovalProcessor, RemovalError> {
    let mut processor =
        BackgroundRemovalProcessor::with_factory(config.clone(), Box::new(TractFactory)).map_err(model_error)?;
    processor.initialize().map_err(model_error)?;
    tracing::info!(model = %config.model_spec.source.display_name(), "Segmentation model loaded");
    Ok(processor)
}

fn model_error(err: BgRemovalError) -> RemovalError {
    RemovalError::Model(err.to_string())
}

fn worker_stopped() -> RemovalError {
    RemovalError::Model("segmentation worker stopped".to_string())
}
