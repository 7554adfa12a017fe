//! Second-stage publish gate
//!
//! Re-derives publishability from a persisted run right before the
//! irreversible publish step, independently of the in-process gate verdict.

use crate::codes;
use common::{ProvenanceEntry, RunArtifacts, ValidationResult};
use serde::Serialize;
use std::collections::BTreeMap;

/// Verdict of the second-stage gate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishGateResult {
    is_publishable: bool,
    errors: Vec<ValidationResult>,
    provenance: BTreeMap<String, ProvenanceEntry>,
}

impl PublishGateResult {
    fn new(errors: Vec<ValidationResult>, provenance: BTreeMap<String, ProvenanceEntry>) -> Self {
        Self {
            is_publishable: errors.is_empty(),
            errors,
            provenance,
        }
    }

    pub fn is_publishable(&self) -> bool {
        self.is_publishable
    }

    pub fn errors(&self) -> &[ValidationResult] {
        &self.errors
    }

    pub fn provenance(&self) -> &BTreeMap<String, ProvenanceEntry> {
        &self.provenance
    }

    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// Add findings discovered outside the artifact document (e.g. on-disk hash checks)
    pub fn extend_errors(&mut self, errors: impl IntoIterator<Item = ValidationResult>) {
        self.errors.extend(errors);
        self.is_publishable = self.errors.is_empty();
    }

    pub fn into_errors(self) -> Vec<ValidationResult> {
        self.errors
    }
}

/// Error code for a `missingFields` key; unknown keys map to the generic code
pub fn missing_field_code(field: &str) -> &'static str {
    match field {
        "OPTIONS_CHAIN" => codes::MISSING_OPTIONS_CHAIN,
        "QUOTE" => codes::MISSING_QUOTE,
        "IV_DATA" => codes::MISSING_IV_DATA,
        "OPEN_INTEREST" => codes::MISSING_OPEN_INTEREST,
        "DARK_POOL_PRINTS" => codes::MISSING_DARK_POOL_PRINTS,
        "PEER_DATA" => codes::MISSING_PEER_DATA,
        _ => codes::MISSING_REQUIRED_FIELD,
    }
}

/// Re-check a persisted run before publishing
pub fn validate_for_publish(run: &RunArtifacts) -> PublishGateResult {
    let mut errors = Vec::new();

    if run.used_fallback {
        errors.push(
            ValidationResult::error(codes::MOCK_DATA_USED, "run used mock or fallback data").with_field("usedFallback"),
        );
    }

    for field in &run.missing_fields {
        errors.push(
            ValidationResult::error(missing_field_code(field), format!("upstream data missing: {}", field))
                .with_field("missingFields")
                .with_value(field.clone()),
        );
    }

    if run.generated_thread.iter().all(|part| part.trim().is_empty()) {
        errors.push(ValidationResult::error(codes::EMPTY_THREAD, "generated thread is empty").with_field("generatedThread"));
    }

    if !run.provenance.values().any(ProvenanceEntry::has_raw_evidence) {
        errors.push(
            ValidationResult::error(
                codes::MISSING_RAW_PAYLOADS,
                "no provenance entry links to a persisted raw payload",
            )
            .with_field("provenance"),
        );
    }

    for (key, entry) in &run.provenance {
        let Some(hash) = entry.payload_hash.as_deref() else {
            continue;
        };
        let persisted = run.raw_payloads.values().any(|snapshot| {
            snapshot.sha256 == hash
                && entry
                    .payload_path
                    .as_deref()
                    .map(|path| path == snapshot.path)
                    .unwrap_or(true)
        });
        if !persisted {
            errors.push(
                ValidationResult::error(
                    codes::PROVENANCE_MISMATCH,
                    format!("provenance {} references a payload not persisted in this run", key),
                )
                .with_field(format!("provenance.{}", key))
                .with_value(hash.to_string()),
            );
        }
    }

    if let Some(validation) = &run.validation {
        if !validation.is_publishable() {
            errors.push(
                ValidationResult::error(codes::VALIDATION_GATE_FAILED, validation.summary().to_string())
                    .with_field("validation")
                    .with_value(validation.error_codes().join(",")),
            );
        }
    }

    PublishGateResult::new(errors, run.provenance.clone())
}
