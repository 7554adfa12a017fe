//! Shared data model for the thread quality gate and publish pipeline.
//!
//! Every type here is part of the JSON interchange contract between the
//! generation stage, the artifact store and the publisher, so field names are
//! serialized in camelCase and must round-trip unchanged.

pub mod event;
pub mod publish;
pub mod run;
pub mod validation;

pub use event::{EventMetrics, EventType, GammaSign, Sentiment, SkewDirection};
pub use publish::{PublishStatus, PublishThreadResult, ThreadPayload};
pub use run::{ChartSpec, ProvenanceEntry, RunArtifacts, SnapshotInfo};
pub use validation::{Severity, ValidationGateResult, ValidationResult};

// Re-exported so downstream crates agree on the timestamp type.
pub use chrono::{DateTime, Utc};
