use crate::event::EventType;
use crate::validation::{ValidationGateResult, ValidationResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Content fingerprint of a persisted JSON payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub path: String,
    /// Hex sha256 over the exact bytes written to disk
    pub sha256: String,
}

/// Links a derived fact back to the raw payload(s) it came from
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceEntry {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ProvenanceEntry {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Entry backed by a persisted raw snapshot
    pub fn from_snapshot(source: impl Into<String>, snapshot: &SnapshotInfo) -> Self {
        Self {
            source: source.into(),
            payload_path: Some(snapshot.path.clone()),
            payload_hash: Some(snapshot.sha256.clone()),
            ..Default::default()
        }
    }

    pub fn derived_from(mut self, names: Vec<String>) -> Self {
        self.derived_from = Some(names);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// True when the entry carries both halves of a raw-evidence link
    pub fn has_raw_evidence(&self) -> bool {
        self.payload_path.is_some() && self.payload_hash.is_some()
    }
}

/// A rendered chart and the verdict on its own markup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub chart_type: String,
    pub svg: String,
    pub validation: ValidationResult,
}

impl ChartSpec {
    /// Summarise the chart's findings into a single result
    pub fn new(chart_type: impl Into<String>, svg: impl Into<String>, findings: &[ValidationResult]) -> Self {
        let chart_type = chart_type.into();
        let errors: Vec<&ValidationResult> = findings.iter().filter(|f| f.is_error()).collect();

        let validation = match errors.first() {
            None => ValidationResult::ok("CHART_VALID", format!("{} passed markup checks", chart_type)),
            Some(first) => {
                let codes: Vec<&str> = errors.iter().map(|e| e.code.as_str()).collect();
                ValidationResult::error(first.code.clone(), format!("{}: {}", chart_type, codes.join(", ")))
                    .with_field(chart_type.clone())
            }
        };

        Self {
            chart_type,
            svg: svg.into(),
            validation,
        }
    }
}

/// Everything one generation attempt produced.
///
/// Written once by the orchestrator as `artifacts/run.json`; later stages
/// only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunArtifacts {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub symbol: String,
    pub post_type: EventType,
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub sources_used: BTreeMap<String, bool>,
    #[serde(default)]
    pub used_fallback: bool,
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(default)]
    pub provenance: BTreeMap<String, ProvenanceEntry>,
    #[serde(default)]
    pub raw_payloads: BTreeMap<String, SnapshotInfo>,
    #[serde(default)]
    pub generated_thread: Vec<String>,
    #[serde(default)]
    pub charts: BTreeMap<String, ChartSpec>,
    #[serde(default)]
    pub validation: Option<ValidationGateResult>,
}

impl RunArtifacts {
    pub fn new(run_id: impl Into<String>, symbol: impl Into<String>, post_type: EventType, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at,
            completed_at: None,
            symbol: symbol.into(),
            post_type,
            inputs: Value::Null,
            sources_used: BTreeMap::new(),
            used_fallback: false,
            missing_fields: Vec::new(),
            provenance: BTreeMap::new(),
            raw_payloads: BTreeMap::new(),
            generated_thread: Vec::new(),
            charts: BTreeMap::new(),
            validation: None,
        }
    }

    /// Record a missing upstream field once
    pub fn mark_missing(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.missing_fields.contains(&field) {
            self.missing_fields.push(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_run() -> RunArtifacts {
        let started = "2025-01-10T15:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut run = RunArtifacts::new("20250110T153000Z-ab12cd34", "AAPL", EventType::OptionsSweep, started);
        let snapshot = SnapshotInfo {
            path: "runs/x/raw/quote.json".to_string(),
            sha256: "ab".repeat(32),
        };
        run.inputs = serde_json::json!({"symbol": "AAPL"});
        run.sources_used.insert("quote".to_string(), true);
        run.raw_payloads.insert("quote".to_string(), snapshot.clone());
        run.provenance.insert("quote".to_string(), ProvenanceEntry::from_snapshot("market-data", &snapshot));
        run.generated_thread = vec!["part one".to_string(), "part two".to_string()];
        run.charts.insert(
            "open_interest".to_string(),
            ChartSpec::new("open_interest", "<svg></svg>", &[]),
        );
        run
    }

    #[test]
    fn test_run_artifacts_round_trip() {
        let run = sample_run();
        let json = serde_json::to_string(&run).unwrap();
        let back: RunArtifacts = serde_json::from_str(&json).unwrap();
        assert_eq!(run, back);
    }

    #[test]
    fn test_run_artifacts_field_names() {
        let value = serde_json::to_value(sample_run()).unwrap();
        for key in [
            "runId",
            "startedAt",
            "postType",
            "sourcesUsed",
            "usedFallback",
            "missingFields",
            "rawPayloads",
            "generatedThread",
        ] {
            assert!(value.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(value["postType"], "options_sweep");
        assert_eq!(value["provenance"]["quote"]["payloadHash"], "ab".repeat(32));
    }

    #[test]
    fn test_chart_spec_summarises_errors() {
        let findings = vec![
            ValidationResult::error("SVG_NAN_ATTRIBUTE", "bad x"),
            ValidationResult::warning("STYLE", "minor"),
        ];
        let chart = ChartSpec::new("gamma_exposure", "<svg/>", &findings);
        assert!(!chart.validation.is_valid);
        assert_eq!(chart.validation.code, "SVG_NAN_ATTRIBUTE");

        let clean = ChartSpec::new("gamma_exposure", "<svg/>", &findings[1..]);
        assert!(clean.validation.is_valid);
    }

    #[test]
    fn test_mark_missing_is_deduplicated() {
        let mut run = sample_run();
        run.mark_missing("OPTIONS_CHAIN");
        run.mark_missing("OPTIONS_CHAIN");
        assert_eq!(run.missing_fields, vec!["OPTIONS_CHAIN".to_string()]);
    }
}
