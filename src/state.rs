use crate::config::Config;
use crate::removal::BackgroundRemover;
use crate::storage::ArtifactStorage;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<ArtifactStorage>,
    pub remover: Arc<dyn BackgroundRemover>,
    flash_key: Key,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<ArtifactStorage>, remover: Arc<dyn BackgroundRemover>) -> Self {
        // Key needs 64 bytes of material; SECRET_KEY may be any length.
        let flash_key = Key::from(Sha512::digest(config.secret_key.as_bytes()).as_slice());
        Self {
            config: Arc::new(config),
            storage,
            remover,
            flash_key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.flash_key.clone()
    }
}
