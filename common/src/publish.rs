use crate::validation::ValidationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal state recorded in `publish.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Blocked,
    DryRun,
    Published,
    Failed,
}

/// The ordered text parts that will be posted as a reply chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadPayload {
    pub parts: Vec<String>,
}

impl ThreadPayload {
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Outcome of one publish attempt for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishThreadResult {
    pub run_id: String,
    pub status: PublishStatus,
    pub is_publishable: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub errors: Vec<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ThreadPayload>,
    /// Ids of a fully posted thread, in reply-chain order
    #[serde(default)]
    pub posted_ids: Vec<String>,
    /// Ids posted before a mid-thread failure
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl PublishThreadResult {
    pub fn blocked(run_id: impl Into<String>, errors: Vec<ValidationResult>) -> Self {
        Self {
            run_id: run_id.into(),
            status: PublishStatus::Blocked,
            is_publishable: false,
            dry_run: false,
            errors,
            payload: None,
            posted_ids: Vec::new(),
            partial_ids: Vec::new(),
            error: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn dry_run(run_id: impl Into<String>, payload: ThreadPayload) -> Self {
        Self {
            run_id: run_id.into(),
            status: PublishStatus::DryRun,
            is_publishable: true,
            dry_run: true,
            errors: Vec::new(),
            payload: Some(payload),
            posted_ids: Vec::new(),
            partial_ids: Vec::new(),
            error: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn published(run_id: impl Into<String>, payload: ThreadPayload, posted_ids: Vec<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: PublishStatus::Published,
            is_publishable: true,
            dry_run: false,
            errors: Vec::new(),
            payload: Some(payload),
            posted_ids,
            partial_ids: Vec::new(),
            error: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn failed(run_id: impl Into<String>, payload: ThreadPayload, partial_ids: Vec<String>, error: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: PublishStatus::Failed,
            is_publishable: true,
            dry_run: false,
            errors: Vec::new(),
            payload: Some(payload),
            posted_ids: Vec::new(),
            partial_ids,
            error: Some(error.into()),
            recorded_at: Utc::now(),
        }
    }

    /// A completed publish that must short-circuit any repeat call
    pub fn is_complete(&self) -> bool {
        !self.posted_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_published_results_are_complete() {
        let payload = ThreadPayload { parts: vec!["a".to_string()] };
        assert!(!PublishThreadResult::dry_run("r1", payload.clone()).is_complete());
        assert!(!PublishThreadResult::failed("r1", payload.clone(), vec!["1".to_string()], "boom").is_complete());
        assert!(PublishThreadResult::published("r1", payload, vec!["1".to_string()]).is_complete());
    }

    #[test]
    fn test_status_serialization() {
        let result = PublishThreadResult::blocked("r1", vec![]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "blocked");
        assert_eq!(value["isPublishable"], false);
        assert!(value.get("partialIds").is_none());
    }
}
