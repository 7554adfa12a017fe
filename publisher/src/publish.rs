// Idempotent thread publishing
// Loads a persisted run, re-gates it and posts it at most once

use crate::client::ThreadPoster;
use crate::error::PublishError;
use anyhow::{Context, Result};
use artifact_store::{ArtifactStore, StoreError};
use common::{PublishStatus, PublishThreadResult, RunArtifacts, ThreadPayload, ValidationResult};
use quality_gate::{codes, validate_for_publish};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub run_id: String,
    pub dry_run: bool,
}

pub struct Publisher {
    store: ArtifactStore,
    poster: Option<Arc<dyn ThreadPoster>>,
    cancel: CancellationToken,
}

impl Publisher {
    /// Publisher that can only block or dry-run until a poster is attached
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            poster: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_poster(mut self, poster: Arc<dyn ThreadPoster>) -> Self {
        self.poster = Some(poster);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Publish a run's thread.
    ///
    /// A run that already recorded posted ids is returned as is. Blocked and
    /// dry-run outcomes are persisted without touching the network. A
    /// mid-thread failure is persisted as `failed` and then returned as an error.
    /// That record is never overwritten: every later call, dry runs included,
    /// fails with `PartiallyPublished` until an operator resolves the run.
    pub async fn publish_thread(&self, request: PublishRequest) -> Result<PublishThreadResult> {
        let run_id = request.run_id.as_str();

        let artifacts = self
            .store
            .load_run_artifacts(run_id)
            .await
            .with_context(|| format!("Failed to load artifacts for run {}", run_id))?;

        if let Some(existing) = self.store.load_publish_result(run_id).await? {
            if existing.is_complete() {
                info!(run_id = %run_id, posts = existing.posted_ids.len(), "Run already published, returning recorded result");
                return Ok(existing);
            }
            if existing.status == PublishStatus::Failed {
                warn!(
                    run_id = %run_id,
                    partial_ids = ?existing.partial_ids,
                    "Run has a failed publish on record, leaving it untouched"
                );
                return Err(PublishError::PartiallyPublished {
                    run_id: run_id.to_string(),
                    partial_ids: existing.partial_ids,
                }
                .into());
            }
        }

        let mut gate = validate_for_publish(&artifacts);
        gate.extend_errors(self.verify_raw_payloads(&artifacts).await?);

        if !gate.is_publishable() {
            let result = PublishThreadResult::blocked(run_id, gate.into_errors());
            self.store.write_publish_result(&result).await?;
            warn!(
                run_id = %run_id,
                errors = result.errors.len(),
                "Publish blocked by second-stage gate"
            );
            return Ok(result);
        }

        let payload = ThreadPayload {
            parts: artifacts.generated_thread.clone(),
        };

        if request.dry_run {
            let result = PublishThreadResult::dry_run(run_id, payload);
            self.store.write_publish_result(&result).await?;
            info!(run_id = %run_id, parts = result.payload.as_ref().map(|p| p.len()).unwrap_or(0), "Dry run recorded");
            return Ok(result);
        }

        let poster = self
            .poster
            .as_ref()
            .ok_or_else(|| PublishError::MissingCredentials("no platform poster configured".to_string()))?;

        match self.store.acquire_publish_lock(run_id).await {
            Ok(_lock) => {}
            Err(StoreError::LockHeld(id)) => return Err(PublishError::AlreadyInProgress(id).into()),
            Err(e) => return Err(e).context("Failed to acquire publish lock"),
        }

        info!(run_id = %run_id, parts = payload.len(), "Publishing thread");

        match poster.post_thread(&payload.parts, &self.cancel).await {
            Ok(ids) => {
                let result = PublishThreadResult::published(run_id, payload, ids);
                if let Err(e) = self.store.write_publish_result(&result).await {
                    error!(
                        run_id = %run_id,
                        posted_ids = ?result.posted_ids,
                        error = %e,
                        "Thread posted but the result could not be recorded"
                    );
                    return Err(anyhow::Error::new(e).context(format!(
                        "Run {} was posted as [{}] but publish.json could not be written",
                        run_id,
                        result.posted_ids.join(", ")
                    )));
                }
                info!(run_id = %run_id, posts = result.posted_ids.len(), "Thread published");
                Ok(result)
            }
            Err(err) => {
                let result = PublishThreadResult::failed(run_id, payload, err.posted.clone(), err.to_string());
                self.store.write_publish_result(&result).await?;
                error!(
                    run_id = %run_id,
                    partial = result.partial_ids.len(),
                    error = %err,
                    "Thread publish failed, partial result recorded"
                );
                Err(anyhow::Error::new(err).context(format!("Publishing run {} failed", run_id)))
            }
        }
    }

    /// Re-hash every raw payload the run claims to have retained
    async fn verify_raw_payloads(&self, artifacts: &RunArtifacts) -> Result<Vec<ValidationResult>> {
        let mut findings = Vec::new();

        for (name, snapshot) in &artifacts.raw_payloads {
            let problem = match self.store.verify_snapshot(snapshot).await {
                Ok(true) => None,
                Ok(false) => Some(format!("raw payload {} no longer matches its recorded sha256", name)),
                Err(StoreError::NotFound(_)) => Some(format!("raw payload {} is missing from disk", name)),
                Err(e) => return Err(e).with_context(|| format!("Failed to verify raw payload {}", name)),
            };

            if let Some(message) = problem {
                findings.push(
                    ValidationResult::error(codes::RAW_PAYLOAD_HASH_MISMATCH, message)
                        .with_field(format!("rawPayloads.{}", name))
                        .with_value(snapshot.sha256.clone()),
                );
            }
        }

        Ok(findings)
    }
}
