//! Quality gate for generated trading threads
//!
//! This crate decides whether a generated thread may be published:
//! - Unit normalization for implied volatility inputs
//! - The multi-rule validation gate run over metrics, thread text and chart SVGs
//! - The second-stage gate re-checking a persisted run before the irreversible publish
//!
//! Every rule reports findings as `ValidationResult` values instead of
//! failing fast, so one invocation lists every problem.

pub mod catalog;
pub mod codes;
pub mod config;
pub mod gate;
pub mod publish_gate;
pub mod rules;
pub mod svg;
pub mod units;

pub use catalog::{CopyRule, Matcher, RuleCatalog, TextRule};
pub use config::GateConfig;
pub use gate::{run_validation_gate, ChartQualityReport, GateInput, ValidationGate};
pub use publish_gate::{missing_field_code, validate_for_publish, PublishGateResult};
pub use rules::{validate_breakeven, validate_spot_in_range, validate_strike_coverage};
pub use units::{
    build_normalized_smile_points, classify_scale, normalize_iv, require_normalized_iv, IvNormalizationError,
    IvScale, IvSide, SmileDataError, SmileInput, SmilePoint,
};
