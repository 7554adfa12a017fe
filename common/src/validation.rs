use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a single validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Atomic unit of gate output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub severity: Severity,
    /// Stable machine readable code (e.g. `BREAKEVEN_IMPLAUSIBLE`)
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ValidationResult {
    fn new(is_valid: bool, severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            is_valid,
            severity,
            code: code.into(),
            message: message.into(),
            field: None,
            value: None,
        }
    }

    /// A blocking finding
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(false, Severity::Error, code, message)
    }

    /// A non-blocking finding
    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(false, Severity::Warning, code, message)
    }

    /// A passing check
    pub fn ok(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(true, Severity::Info, code, message)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn is_error(&self) -> bool {
        !self.is_valid && self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        !self.is_valid && self.severity == Severity::Warning
    }
}

/// Aggregated verdict of one gate invocation.
///
/// Only constructible from a list of findings, so `is_publishable` always
/// equals `errors.is_empty()` and `summary` is derived. Deserialization
/// re-derives both from the persisted lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "GateResultRepr")]
pub struct ValidationGateResult {
    is_publishable: bool,
    errors: Vec<ValidationResult>,
    warnings: Vec<ValidationResult>,
    summary: String,
}

#[derive(Deserialize)]
struct GateResultRepr {
    #[serde(default)]
    errors: Vec<ValidationResult>,
    #[serde(default)]
    warnings: Vec<ValidationResult>,
}

impl From<GateResultRepr> for ValidationGateResult {
    fn from(repr: GateResultRepr) -> Self {
        Self::from_parts(repr.errors, repr.warnings)
    }
}

impl ValidationGateResult {
    /// Split findings into errors and warnings; passing and info results are dropped
    pub fn from_results(results: impl IntoIterator<Item = ValidationResult>) -> Self {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for result in results {
            if result.is_error() {
                errors.push(result);
            } else if result.is_warning() {
                warnings.push(result);
            }
        }

        Self::from_parts(errors, warnings)
    }

    fn from_parts(errors: Vec<ValidationResult>, warnings: Vec<ValidationResult>) -> Self {
        let summary = summarize(&errors, &warnings);
        Self {
            is_publishable: errors.is_empty(),
            errors,
            warnings,
            summary,
        }
    }

    pub fn is_publishable(&self) -> bool {
        self.is_publishable
    }

    pub fn errors(&self) -> &[ValidationResult] {
        &self.errors
    }

    pub fn warnings(&self) -> &[ValidationResult] {
        &self.warnings
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Distinct error codes in first-seen order
    pub fn error_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = Vec::new();
        for error in &self.errors {
            if !codes.contains(&error.code.as_str()) {
                codes.push(error.code.as_str());
            }
        }
        codes
    }

    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

fn summarize(errors: &[ValidationResult], warnings: &[ValidationResult]) -> String {
    if errors.is_empty() && warnings.is_empty() {
        return "All validation checks passed".to_string();
    }

    let mut codes: Vec<&str> = Vec::new();
    for error in errors {
        if !codes.contains(&error.code.as_str()) {
            codes.push(error.code.as_str());
        }
    }

    if errors.is_empty() {
        format!("Publishable with {} warning(s)", warnings.len())
    } else {
        format!(
            "Blocked: {} error(s), {} warning(s) [{}]",
            errors.len(),
            warnings.len(),
            codes.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_never_block() {
        let result = ValidationGateResult::from_results(vec![
            ValidationResult::warning("LOW_VOLUME", "thin print"),
            ValidationResult::ok("CHECKED", "fine"),
        ]);

        assert!(result.is_publishable());
        assert!(result.errors().is_empty());
        assert_eq!(result.warnings().len(), 1);
    }

    #[test]
    fn test_errors_block_and_summary_lists_codes() {
        let result = ValidationGateResult::from_results(vec![
            ValidationResult::error("BREAKEVEN_IMPLAUSIBLE", "too far").with_field("breakeven"),
            ValidationResult::error("BREAKEVEN_IMPLAUSIBLE", "again"),
            ValidationResult::error("WRONG_COPY_LOGIC", "copy"),
        ]);

        assert!(!result.is_publishable());
        assert_eq!(result.error_codes(), vec!["BREAKEVEN_IMPLAUSIBLE", "WRONG_COPY_LOGIC"]);
        assert!(result.summary().contains("3 error(s)"));
    }

    #[test]
    fn test_deserialization_rederives_publishability() {
        // A tampered document claiming publishable while carrying errors
        let json = serde_json::json!({
            "isPublishable": true,
            "errors": [{
                "isValid": false,
                "severity": "error",
                "code": "MOCK_DATA_USED",
                "message": "fallback"
            }],
            "warnings": [],
            "summary": "All validation checks passed"
        });

        let result: ValidationGateResult = serde_json::from_value(json).unwrap();
        assert!(!result.is_publishable());
        assert!(result.summary().starts_with("Blocked"));
    }
}
