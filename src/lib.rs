pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod removal;
pub mod render;
pub mod routes;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod upload;

pub use config::Config;
pub use state::AppState;
pub use storage::ArtifactStorage;
