use anyhow::{Context, Result};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_REMOTE_ENDPOINT: &str = "https://api.rembg.ai/remove";
pub const DEFAULT_SECRET_KEY: &str = "dev-secret-key";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_LOCAL_MODEL: &str = "imgly--isnet-general-onnx";

/// Segmentation model used for in-process removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalModelConfig {
    /// Cached model id, or a path to a model directory when one exists there.
    pub model: String,
    /// `None` lets the model pick its preferred variant.
    pub variant: Option<String>,
    /// Repository fetched into the model cache at start-up when set.
    pub download_url: Option<String>,
}

/// Settings for the hosted removal API. Absent when no API key is configured.
#[derive(Clone)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Process-wide configuration, built once at start-up.
#[derive(Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub secret_key: String,
    pub remote: Option<RemoteConfig>,
    pub local_model: LocalModelConfig,
    pub max_upload_bytes: usize,
    pub retention: Duration,
    /// `None` disables the periodic sweep; the per-request sweep still runs.
    pub sweep_interval: Option<Duration>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("upload_dir", &self.upload_dir)
            .field("secret_key", &"<redacted>")
            .field("remote", &self.remote)
            .field("local_model", &self.local_model)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("retention", &self.retention)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = parse_or(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 5000)))?;
        let upload_dir = get("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("static/uploads"));

        let secret_key = match get("SECRET_KEY") {
            Some(key) => key,
            None => {
                tracing::warn!("SECRET_KEY is not set, flash cookies are signed with a development key");
                DEFAULT_SECRET_KEY.to_string()
            }
        };

        let timeout = Duration::from_secs(parse_or(&get, "REMOTE_TIMEOUT_SECS", 30u64)?);
        let remote = get("REM_BG_API_KEY").map(|api_key| RemoteConfig {
            endpoint: get("REM_BG_API_URL").unwrap_or_else(|| DEFAULT_REMOTE_ENDPOINT.to_string()),
            api_key,
            timeout,
        });

        let local_model = LocalModelConfig {
            model: get("LOCAL_MODEL").unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string()),
            variant: get("LOCAL_MODEL_VARIANT"),
            download_url: get("LOCAL_MODEL_URL"),
        };

        let max_upload_bytes = parse_or(&get, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let retention = Duration::from_secs(parse_or(&get, "RETENTION_SECS", 3600u64)?);
        let sweep_interval = match parse_or(&get, "SWEEP_INTERVAL_SECS", 600u64)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            bind_addr,
            upload_dir,
            secret_key,
            remote,
            local_model,
            max_upload_bytes,
            retention,
            sweep_interval,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 5000);
        assert_eq!(config.upload_dir, PathBuf::from("static/uploads"));
        assert_eq!(config.secret_key, DEFAULT_SECRET_KEY);
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.retention, Duration::from_secs(3600));
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(600)));
        assert!(config.remote.is_none());
        assert_eq!(config.local_model.model, DEFAULT_LOCAL_MODEL);
        assert!(config.local_model.variant.is_none());
        assert!(config.local_model.download_url.is_none());
    }

    #[test]
    fn local_model_settings_are_read() {
        let config = config_from(&[
            ("LOCAL_MODEL", "/models/birefnet"),
            ("LOCAL_MODEL_VARIANT", "fp16"),
            ("LOCAL_MODEL_URL", "https://huggingface.co/imgly/isnet-general-onnx"),
        ])
        .unwrap();
        assert_eq!(config.local_model.model, "/models/birefnet");
        assert_eq!(config.local_model.variant.as_deref(), Some("fp16"));
        assert!(config.local_model.download_url.is_some());
    }

    #[test]
    fn api_key_enables_remote_removal() {
        let config = config_from(&[("REM_BG_API_KEY", "k-123"), ("REMOTE_TIMEOUT_SECS", "5")]).unwrap();
        let remote = config.remote.unwrap();
        assert_eq!(remote.api_key, "k-123");
        assert_eq!(remote.endpoint, DEFAULT_REMOTE_ENDPOINT);
        assert_eq!(remote.timeout, Duration::from_secs(5));
    }

    #[test]
    fn blank_api_key_is_ignored() {
        let config = config_from(&[("REM_BG_API_KEY", "  ")]).unwrap();
        assert!(config.remote.is_none());
    }

    #[test]
    fn zero_interval_disables_periodic_sweep() {
        let config = config_from(&[("SWEEP_INTERVAL_SECS", "0")]).unwrap();
        assert!(config.sweep_interval.is_none());
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = config_from(&[("MAX_UPLOAD_BYTES", "lots")]).unwrap_err();
        assert!(err.to_string().contains("MAX_UPLOAD_BYTES"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = config_from(&[("SECRET_KEY", "hunter2"), ("REM_BG_API_KEY", "abc")]).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("abc"));
    }
}
