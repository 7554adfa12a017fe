//! Filesystem artifact store for generation runs
//!
//! Each run owns a directory:
//!
//! ```text
//! runs/<runId>/inputs.json
//! runs/<runId>/report.json
//! runs/<runId>/publish.json
//! runs/<runId>/publish.lock
//! runs/<runId>/raw/<name>.json
//! runs/<runId>/artifacts/<name>.json
//! ```
//!
//! Every write is canonical JSON, atomic (temp file + rename) and returns the
//! sha256 of the exact bytes on disk.

pub mod canonical;
pub mod error;
pub mod snapshotter;
pub mod store;

pub use canonical::{sha256_hex, to_canonical_bytes};
pub use error::StoreError;
pub use snapshotter::{SharedSnapshots, Snapshotter};
pub use store::{generate_run_id, ArtifactStore, PublishLock, RunContext, RunHandle, RunPaths, RUN_ARTIFACT};
