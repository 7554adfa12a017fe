// Run directory storage
// Append-only JSON artifacts with content hashes for provenance linking

use crate::canonical::{sha256_hex, to_canonical_bytes};
use crate::error::StoreError;
use crate::snapshotter::{SharedSnapshots, Snapshotter};
use chrono::{DateTime, Utc};
use common::{PublishThreadResult, RunArtifacts, SnapshotInfo};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Name of the canonical run artifact read by the publish stage
pub const RUN_ARTIFACT: &str = "run";

const INPUTS_FILE: &str = "inputs.json";
const REPORT_FILE: &str = "report.json";
const PUBLISH_FILE: &str = "publish.json";
const PUBLISH_LOCK_FILE: &str = "publish.lock";
const RAW_DIR: &str = "raw";
const ARTIFACTS_DIR: &str = "artifacts";

/// How `write_json` treats an existing file at the target path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Replace,
    CreateNew,
}

/// What a new run is created from
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Generated when absent
    pub run_id: Option<String>,
    /// Recorded verbatim in `inputs.json`
    pub inputs: Value,
}

/// Well-known locations inside one run directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub root: PathBuf,
    pub inputs: PathBuf,
    pub report: PathBuf,
    pub publish: PathBuf,
    pub publish_lock: PathBuf,
    pub raw_dir: PathBuf,
    pub artifacts_dir: PathBuf,
}

impl RunPaths {
    fn new(root: PathBuf) -> Self {
        Self {
            inputs: root.join(INPUTS_FILE),
            report: root.join(REPORT_FILE),
            publish: root.join(PUBLISH_FILE),
            publish_lock: root.join(PUBLISH_LOCK_FILE),
            raw_dir: root.join(RAW_DIR),
            artifacts_dir: root.join(ARTIFACTS_DIR),
            root,
        }
    }
}

/// Returned by [`ArtifactStore::create_run`]
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub paths: RunPaths,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputsRecord {
    run_id: String,
    started_at: DateTime<Utc>,
    inputs: Value,
}

/// Proof that this process owns the publish step for a run.
///
/// The lock file is intentionally left on disk when this value is dropped.
#[derive(Debug, Clone)]
pub struct PublishLock {
    pub run_id: String,
    pub path: PathBuf,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LockRecord<'a> {
    run_id: &'a str,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Time-ordered run id with a random suffix, e.g. `20250110T153000Z-0a1b2c3d`
pub fn generate_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%SZ"), &suffix[..8])
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// Filesystem-backed store rooted at a `runs/` directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_paths(&self, run_id: &str) -> Result<RunPaths, StoreError> {
        validate_name(run_id)?;
        Ok(RunPaths::new(self.root.join(run_id)))
    }

    /// Create the run scaffold and write `inputs.json` exactly once
    pub async fn create_run(&self, context: RunContext) -> Result<RunHandle, StoreError> {
        let run_id = context.run_id.unwrap_or_else(generate_run_id);
        let paths = self.run_paths(&run_id)?;
        let started_at = Utc::now();

        for dir in [&paths.raw_dir, &paths.artifacts_dir] {
            fs::create_dir_all(dir).await.map_err(|e| StoreError::io(dir, e))?;
        }

        let record = InputsRecord {
            run_id: run_id.clone(),
            started_at,
            inputs: context.inputs,
        };
        let bytes = to_canonical_bytes(&record)?;

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&paths.inputs)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(run_id = %run_id, "Refusing to recreate existing run");
                return Err(StoreError::RunExists(run_id));
            }
            Err(e) => return Err(StoreError::io(&paths.inputs, e)),
        };
        file.write_all(&bytes).await.map_err(|e| StoreError::io(&paths.inputs, e))?;
        file.sync_all().await.map_err(|e| StoreError::io(&paths.inputs, e))?;

        info!(run_id = %run_id, path = %paths.root.display(), "Created run");

        Ok(RunHandle {
            run_id,
            started_at,
            paths,
        })
    }

    /// Write `artifacts/<name>.json` once; a second write gets `ArtifactExists`
    pub async fn write_artifact<T: Serialize + ?Sized>(
        &self,
        run_id: &str,
        name: &str,
        payload: &T,
    ) -> Result<SnapshotInfo, StoreError> {
        validate_name(name)?;
        let path = self.run_paths(run_id)?.artifacts_dir.join(format!("{}.json", name));
        self.write_json(&path, payload, WriteMode::CreateNew).await
    }

    /// Write `report.json`
    pub async fn write_report<T: Serialize + ?Sized>(&self, run_id: &str, payload: &T) -> Result<SnapshotInfo, StoreError> {
        let path = self.run_paths(run_id)?.report;
        self.write_json(&path, payload, WriteMode::Replace).await
    }

    /// Write `raw/<name>.json`
    pub async fn write_raw_snapshot<T: Serialize + ?Sized>(
        &self,
        run_id: &str,
        name: &str,
        payload: &T,
    ) -> Result<SnapshotInfo, StoreError> {
        validate_name(name)?;
        let path = self.run_paths(run_id)?.raw_dir.join(format!("{}.json", name));
        self.write_json(&path, payload, WriteMode::Replace).await
    }

    /// Write `publish.json`
    pub async fn write_publish_result(&self, result: &PublishThreadResult) -> Result<SnapshotInfo, StoreError> {
        let path = self.run_paths(&result.run_id)?.publish;
        self.write_json(&path, result, WriteMode::Replace).await
    }

    /// Snapshot writer that records every capture into `shared`
    pub fn snapshotter(&self, run_id: impl Into<String>, shared: SharedSnapshots) -> Snapshotter {
        Snapshotter::new(self.clone(), run_id.into(), shared)
    }

    /// Read `artifacts/run.json`
    pub async fn load_run_artifacts(&self, run_id: &str) -> Result<RunArtifacts, StoreError> {
        let path = self
            .run_paths(run_id)?
            .artifacts_dir
            .join(format!("{}.json", RUN_ARTIFACT));
        self.read_json(&path).await
    }

    /// Read `publish.json` if a previous attempt recorded one
    pub async fn load_publish_result(&self, run_id: &str) -> Result<Option<PublishThreadResult>, StoreError> {
        let path = self.run_paths(run_id)?.publish;
        match self.read_json(&path).await {
            Ok(result) => Ok(Some(result)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Exclusive-create `publish.lock`; a second caller gets `LockHeld`
    pub async fn acquire_publish_lock(&self, run_id: &str) -> Result<PublishLock, StoreError> {
        let path = self.run_paths(run_id)?.publish_lock;
        let acquired_at = Utc::now();

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::LockHeld(run_id.to_string()));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(path)),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let record = LockRecord {
            run_id,
            pid: std::process::id(),
            acquired_at,
        };
        let bytes = to_canonical_bytes(&record)?;
        file.write_all(&bytes).await.map_err(|e| StoreError::io(&path, e))?;
        file.sync_all().await.map_err(|e| StoreError::io(&path, e))?;

        info!(run_id = %run_id, "Acquired publish lock");

        Ok(PublishLock {
            run_id: run_id.to_string(),
            path,
            acquired_at,
        })
    }

    /// Re-hash a snapshot on disk and compare with its recorded digest
    pub async fn verify_snapshot(&self, snapshot: &SnapshotInfo) -> Result<bool, StoreError> {
        let path = PathBuf::from(&snapshot.path);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(path)),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        Ok(sha256_hex(&bytes) == snapshot.sha256)
    }

    /// Write through a synced temp file so readers never see a torn file
    async fn write_json<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        payload: &T,
        mode: WriteMode,
    ) -> Result<SnapshotInfo, StoreError> {
        let bytes = to_canonical_bytes(payload)?;
        let sha256 = sha256_hex(&bytes);

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

        if let Err(e) = write_synced(&tmp, &bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::io(&tmp, e));
        }

        let published = match mode {
            WriteMode::Replace => fs::rename(&tmp, path).await,
            // hard_link fails with AlreadyExists instead of replacing the target
            WriteMode::CreateNew => fs::hard_link(&tmp, path).await,
        };
        if mode == WriteMode::CreateNew || published.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        match published {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(path = %path.display(), "Refusing to overwrite write-once artifact");
                return Err(StoreError::ArtifactExists(path.to_path_buf()));
            }
            Err(e) => return Err(StoreError::io(path, e)),
        }

        debug!(path = %path.display(), sha256 = %sha256, bytes = bytes.len(), "Wrote artifact");

        Ok(SnapshotInfo {
            path: path.to_string_lossy().into_owned(),
            sha256,
        })
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StoreError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(path.to_path_buf())),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{EventType, ThreadPayload};
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_run_writes_scaffold() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let handle = store
            .create_run(RunContext {
                run_id: None,
                inputs: json!({"symbol": "AAPL", "postType": "options_sweep"}),
            })
            .await
            .unwrap();

        assert!(handle.paths.raw_dir.is_dir());
        assert!(handle.paths.artifacts_dir.is_dir());

        let inputs: Value = serde_json::from_slice(&std::fs::read(&handle.paths.inputs).unwrap()).unwrap();
        assert_eq!(inputs["runId"], handle.run_id.as_str());
        assert_eq!(inputs["inputs"]["symbol"], "AAPL");
    }

    #[tokio::test]
    async fn test_create_run_refuses_existing_id() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let context = RunContext {
            run_id: Some("run-1".to_string()),
            inputs: json!({}),
        };

        store.create_run(context.clone()).await.unwrap();
        match store.create_run(context).await {
            Err(StoreError::RunExists(id)) => assert_eq!(id, "run-1"),
            other => panic!("expected RunExists, got {:?}", other),
        }
    }

    #[test]
    fn test_generated_run_ids() {
        let id = generate_run_id();
        let (stamp, suffix) = id.split_once('-').unwrap();
        assert_eq!(stamp.len(), "20250110T153000Z".len());
        assert!(stamp.ends_with('Z'));
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_run_id(), id);
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        assert!(matches!(
            store.write_artifact("run-1", "../escape", &json!({})).await,
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            store.create_run(RunContext { run_id: Some("../x".to_string()), inputs: json!({}) }).await,
            Err(StoreError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_hash_matches_written_bytes() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let handle = store.create_run(RunContext::default()).await.unwrap();

        let info = store
            .write_raw_snapshot(&handle.run_id, "quote", &json!({"last": 150.25, "bid": 150.2}))
            .await
            .unwrap();

        let bytes = std::fs::read(&info.path).unwrap();
        assert_eq!(sha256_hex(&bytes), info.sha256);
        assert!(store.verify_snapshot(&info).await.unwrap());

        std::fs::write(&info.path, b"{\"last\": 1}\n").unwrap();
        assert!(!store.verify_snapshot(&info).await.unwrap());
    }

    #[tokio::test]
    async fn test_run_artifacts_round_trip() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let handle = store.create_run(RunContext::default()).await.unwrap();

        let mut run = RunArtifacts::new(&handle.run_id, "AAPL", EventType::DarkPool, handle.started_at);
        run.generated_thread = vec!["$AAPL print".to_string()];
        store.write_artifact(&handle.run_id, RUN_ARTIFACT, &run).await.unwrap();

        let loaded = store.load_run_artifacts(&handle.run_id).await.unwrap();
        assert_eq!(loaded, run);

        assert!(matches!(
            store.load_run_artifacts("missing-run").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_artifacts_are_write_once() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let handle = store.create_run(RunContext::default()).await.unwrap();

        let mut run = RunArtifacts::new(&handle.run_id, "AAPL", EventType::OptionsSweep, handle.started_at);
        run.generated_thread = vec!["$AAPL sweep".to_string()];
        let first = store.write_artifact(&handle.run_id, RUN_ARTIFACT, &run).await.unwrap();

        run.generated_thread = vec!["rewritten".to_string()];
        assert!(matches!(
            store.write_artifact(&handle.run_id, RUN_ARTIFACT, &run).await,
            Err(StoreError::ArtifactExists(_))
        ));

        let loaded = store.load_run_artifacts(&handle.run_id).await.unwrap();
        assert_eq!(loaded.generated_thread, vec!["$AAPL sweep"]);
        assert!(store.verify_snapshot(&first).await.unwrap());

        // No temp files are left behind by either write
        let leftovers: Vec<_> = std::fs::read_dir(&handle.paths.artifacts_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_publish_result_and_lock() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let handle = store.create_run(RunContext::default()).await.unwrap();

        assert!(store.load_publish_result(&handle.run_id).await.unwrap().is_none());

        let payload = ThreadPayload {
            parts: vec!["one".to_string()],
        };
        let result = PublishThreadResult::dry_run(&handle.run_id, payload);
        store.write_publish_result(&result).await.unwrap();
        assert_eq!(store.load_publish_result(&handle.run_id).await.unwrap(), Some(result));

        let lock = store.acquire_publish_lock(&handle.run_id).await.unwrap();
        assert!(lock.path.exists());
        assert!(matches!(
            store.acquire_publish_lock(&handle.run_id).await,
            Err(StoreError::LockHeld(_))
        ));
    }
}
