use crate::error::StoreError;
use crate::store::ArtifactStore;
use common::SnapshotInfo;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Caller-owned record of every raw payload captured during a run
pub type SharedSnapshots = Arc<Mutex<BTreeMap<String, SnapshotInfo>>>;

/// Captures raw upstream payloads for one run.
///
/// Cheap to clone, so concurrent fetches can each hold one.
#[derive(Debug, Clone)]
pub struct Snapshotter {
    store: ArtifactStore,
    run_id: String,
    captured: SharedSnapshots,
}

impl Snapshotter {
    pub(crate) fn new(store: ArtifactStore, run_id: String, captured: SharedSnapshots) -> Self {
        Self {
            store,
            run_id,
            captured,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Write `raw/<name>.json` and record it under `name`
    pub async fn capture<T: Serialize + ?Sized>(&self, name: &str, payload: &T) -> Result<SnapshotInfo, StoreError> {
        let info = self.store.write_raw_snapshot(&self.run_id, name, payload).await?;
        self.captured.lock().await.insert(name.to_string(), info.clone());
        debug!(run_id = %self.run_id, name = %name, "Captured raw payload");
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RunContext;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_captures_are_recorded_in_shared_map() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let handle = store.create_run(RunContext::default()).await.unwrap();

        let shared = SharedSnapshots::default();
        let snapshotter = store.snapshotter(&handle.run_id, shared.clone());

        let event_payload = json!({"symbol": "AAPL"});
        let chain_payload = json!({"strikes": [145, 150, 155]});
        let (event, chain) = tokio::join!(
            snapshotter.capture("event", &event_payload),
            snapshotter.capture("options_chain", &chain_payload),
        );
        let event = event.unwrap();
        chain.unwrap();

        let captured = shared.lock().await;
        assert_eq!(captured.len(), 2);
        assert_eq!(captured.get("event"), Some(&event));
        assert!(captured["options_chain"].path.ends_with("options_chain.json"));
    }
}
