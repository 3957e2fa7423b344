use crate::models::{Artifact, ArtifactKind};
use crate::upload::RESULT_PREFIX;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::RwLock;

/// Counters from one sweep of the upload directory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Flat directory of artifacts plus a record of when this process wrote each one.
pub struct ArtifactStorage {
    dir: PathBuf,
    retention: chrono::Duration,
    created: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl ArtifactStorage {
    /// Creates the directory when it is missing.
    pub async fn new(dir: impl Into<PathBuf>, retention: Duration) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", dir.display()))?;
        Self::open(dir, retention).await
    }

    /// Like [`ArtifactStorage::new`], but fails instead of creating the directory.
    pub async fn open(dir: impl Into<PathBuf>, retention: Duration) -> Result<Self> {
        let dir = dir.into();
        let metadata = fs::metadata(&dir)
            .await
            .with_context(|| format!("Upload directory {} is not accessible", dir.display()))?;
        if !metadata.is_dir() {
            bail!("{} is not a directory", dir.display());
        }
        let retention = chrono::Duration::from_std(retention).context("Retention period is too large")?;

        Ok(Self {
            dir,
            retention,
            created: RwLock::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn store(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        if !is_safe_name(file_name) {
            bail!("Refusing to store artifact with unsafe name {:?}", file_name);
        }
        let path = self.dir.join(file_name);
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        self.created.write().await.insert(file_name.to_string(), Utc::now());
        tracing::debug!(file = %file_name, bytes = bytes.len(), "Stored artifact");
        Ok(path)
    }

    /// Opens `result_<core>` for streaming.
    pub async fn open_result(&self, core: &str) -> Result<fs::File> {
        if !is_safe_name(core) {
            bail!("Invalid artifact name {:?}", core);
        }
        let path = self.dir.join(format!("{}{}", RESULT_PREFIX, core));
        fs::File::open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))
    }

    pub async fn list(&self) -> Result<Vec<Artifact>> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to read {}", self.dir.display()))?;
        let created = self.created.read().await;

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await.context("Failed to read directory entry")? {
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(created_at) = created.get(&file_name).copied().or_else(|| filesystem_time(&metadata)) else {
                continue;
            };
            artifacts.push(Artifact {
                kind: ArtifactKind::classify(&file_name),
                file_name,
                size: metadata.len(),
                created_at,
            });
        }

        artifacts.sort_by(|a, b| (a.created_at, &a.file_name).cmp(&(b.created_at, &b.file_name)));
        Ok(artifacts)
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Deletes every regular file older than the retention as of `now`.
    ///
    /// Never fails: unreadable entries and failed deletions are logged and
    /// counted, and a file that disappeared in the meantime counts as removed.
    /// Records of files no longer in the directory are dropped once a full
    /// listing has been read.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let started = Utc::now();
        let mut listed = HashSet::new();
        let mut complete = true;

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, dir = %self.dir.display(), "Cleanup could not read upload directory");
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Cleanup stopped on unreadable directory entry");
                    report.failed += 1;
                    complete = false;
                    break;
                }
            };

            let file_name = entry.file_name().to_string_lossy().into_owned();
            listed.insert(file_name.clone());
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(error = %e, file = %file_name, "Cleanup could not stat file");
                    report.failed += 1;
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            report.scanned += 1;

            let recorded = self.created.read().await.get(&file_name).copied();
            let Some(created_at) = recorded.or_else(|| filesystem_time(&metadata)) else {
                tracing::warn!(file = %file_name, "Cleanup could not determine file age");
                report.failed += 1;
                continue;
            };
            if now - created_at <= self.retention {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    tracing::info!(file = %file_name, "Removed expired artifact");
                    report.removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(file = %file_name, "Expired artifact already removed");
                    report.removed += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, file = %file_name, "Failed to remove expired artifact");
                    report.failed += 1;
                    continue;
                }
            }
            self.created.write().await.remove(&file_name);
        }

        if complete {
            // entries written while the listing ran may be missing from it
            self.created
                .write()
                .await
                .retain(|name, created_at| listed.contains(name) || *created_at >= started);
        }

        if report.removed > 0 || report.failed > 0 {
            tracing::info!(
                scanned = report.scanned,
                removed = report.removed,
                failed = report.failed,
                "Cleanup completed"
            );
        }
        report
    }
}

/// A single path component that cannot escape the directory or break a header.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.chars().any(|c| matches!(c, '/' | '\\' | '"') || c.is_control())
}

fn filesystem_time(metadata: &Metadata) -> Option<DateTime<Utc>> {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    async fn storage() -> (TempDir, ArtifactStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = ArtifactStorage::new(dir.path().join("uploads"), HOUR).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn creates_missing_directory() {
        let (_dir, storage) = storage().await;
        assert!(storage.dir().is_dir());
    }

    #[tokio::test]
    async fn sweep_respects_retention_boundary() {
        let (_dir, storage) = storage().await;
        storage.store("original_old.png", b"a").await.unwrap();
        let written = Utc::now();

        let kept = storage.sweep_at(written + chrono::Duration::seconds(3599)).await;
        assert_eq!(kept.removed, 0);
        assert!(storage.dir().join("original_old.png").exists());

        let swept = storage.sweep_at(written + chrono::Duration::seconds(3601)).await;
        assert_eq!(swept.removed, 1);
        assert!(!storage.dir().join("original_old.png").exists());
    }

    #[tokio::test]
    async fn records_of_externally_removed_files_are_dropped() {
        let (_dir, storage) = storage().await;
        storage.store("original_gone.png", b"a").await.unwrap();
        storage.store("original_kept.png", b"b").await.unwrap();
        std::fs::remove_file(storage.dir().join("original_gone.png")).unwrap();

        let report = storage.sweep().await;

        assert_eq!(report.removed, 0);
        let created = storage.created.read().await;
        assert!(!created.contains_key("original_gone.png"));
        assert!(created.contains_key("original_kept.png"));
    }

    #[tokio::test]
    async fn sweeping_twice_is_harmless() {
        let (_dir, storage) = storage().await;
        storage.store("result_a.png", b"a").await.unwrap();
        let later = Utc::now() + chrono::Duration::hours(2);

        let first = storage.sweep_at(later).await;
        let second = storage.sweep_at(later).await;

        assert_eq!(first.removed, 1);
        assert_eq!(second, SweepReport::default());
    }

    #[tokio::test]
    async fn untracked_files_use_filesystem_time() {
        let (_dir, storage) = storage().await;
        std::fs::write(storage.dir().join("stray.png"), b"x").unwrap();

        assert_eq!(storage.sweep().await.removed, 0);
        let report = storage.sweep_at(Utc::now() + chrono::Duration::hours(2)).await;
        assert_eq!(report.removed, 1);
    }

    #[tokio::test]
    async fn subdirectories_are_left_alone() {
        let (_dir, storage) = storage().await;
        std::fs::create_dir(storage.dir().join("nested")).unwrap();

        let report = storage.sweep_at(Utc::now() + chrono::Duration::days(1)).await;
        assert_eq!(report.scanned, 0);
        assert!(storage.dir().join("nested").is_dir());
    }

    #[tokio::test]
    async fn open_does_not_create_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("uploads");

        assert!(ArtifactStorage::open(&missing, HOUR).await.is_err());
        assert!(!missing.exists());

        std::fs::write(&missing, b"file").unwrap();
        assert!(ArtifactStorage::open(&missing, HOUR).await.is_err());
    }

    #[tokio::test]
    async fn open_reads_an_existing_directory() {
        let (_dir, storage) = storage().await;
        storage.store("result_a.png", b"a").await.unwrap();

        let reopened = ArtifactStorage::open(storage.dir(), HOUR).await.unwrap();
        assert_eq!(reopened.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_directory_is_not_an_error() {
        let (_dir, storage) = storage().await;
        std::fs::remove_dir(storage.dir()).unwrap();
        assert_eq!(storage.sweep().await, SweepReport::default());
    }

    #[tokio::test]
    async fn open_result_maps_core_name() {
        let (_dir, storage) = storage().await;
        storage.store("result_x.png", b"bytes").await.unwrap();

        assert!(storage.open_result("x.png").await.is_ok());
        assert!(storage.open_result("missing.png").await.is_err());
        assert!(storage.open_result("../x.png").await.is_err());
    }

    #[tokio::test]
    async fn list_classifies_and_orders() {
        let (_dir, storage) = storage().await;
        storage.store("original_a.png", b"12").await.unwrap();
        storage.store("result_a.png", b"1234").await.unwrap();

        let artifacts = storage.list().await.unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].kind, ArtifactKind::Original);
        assert_eq!(artifacts[1].kind, ArtifactKind::Result);
        assert_eq!(artifacts[1].size, 4);
    }

    #[test]
    fn rejects_path_like_names() {
        for bad in ["", ".", "..", "a/b.png", "..\\x", "a\"b.png", "line\nbreak.png"] {
            assert!(!is_safe_name(bad), "{bad:?}");
        }
        assert!(is_safe_name("image_20240101_120000_abcdef12.png"));
    }
}
