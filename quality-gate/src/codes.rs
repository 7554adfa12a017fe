// Stable finding codes. `MISSING_*` marks absent upstream data; everything
// else is a data-quality violation.

pub const INVALID_NUMBER: &str = "INVALID_NUMBER";
pub const PERCENTILE_OUT_OF_RANGE: &str = "PERCENTILE_OUT_OF_RANGE";
pub const INVALID_STRIKE_ARRAY: &str = "INVALID_STRIKE_ARRAY";
pub const INVALID_OI_ARRAY: &str = "INVALID_OI_ARRAY";

pub const MISSING_REQUIRED_FIELD: &str = "MISSING_REQUIRED_FIELD";
pub const MISSING_REQUIRED_CHART: &str = "MISSING_REQUIRED_CHART";
pub const MISSING_RAW_PAYLOADS: &str = "MISSING_RAW_PAYLOADS";
pub const MISSING_OPTIONS_CHAIN: &str = "MISSING_OPTIONS_CHAIN";
pub const MISSING_QUOTE: &str = "MISSING_QUOTE";
pub const MISSING_IV_DATA: &str = "MISSING_IV_DATA";
pub const MISSING_OPEN_INTEREST: &str = "MISSING_OPEN_INTEREST";
pub const MISSING_DARK_POOL_PRINTS: &str = "MISSING_DARK_POOL_PRINTS";
pub const MISSING_PEER_DATA: &str = "MISSING_PEER_DATA";

pub const BREAKEVEN_IMPLAUSIBLE: &str = "BREAKEVEN_IMPLAUSIBLE";
pub const BREAKEVEN_UNANCHORED: &str = "BREAKEVEN_UNANCHORED";

pub const SUSPICIOUS_TEXT: &str = "SUSPICIOUS_TEXT";
pub const PLACEHOLDER_TEXT: &str = "PLACEHOLDER_TEXT";
pub const GARBLED_LABEL: &str = "GARBLED_LABEL";
pub const WRONG_COPY_LOGIC: &str = "WRONG_COPY_LOGIC";
pub const GAMMA_SIGN_MISMATCH: &str = "GAMMA_SIGN_MISMATCH";
pub const GAMMA_SIGN_UNVERIFIED: &str = "GAMMA_SIGN_UNVERIFIED";
pub const DIRECTION_OVERCLAIM: &str = "DIRECTION_OVERCLAIM";
pub const EMPTY_THREAD: &str = "EMPTY_THREAD";
pub const SYMBOL_NOT_MENTIONED: &str = "SYMBOL_NOT_MENTIONED";

pub const EMPTY_CHART: &str = "EMPTY_CHART";
pub const SVG_NAN_ATTRIBUTE: &str = "SVG_NAN_ATTRIBUTE";
pub const SVG_SUSPICIOUS_CONTENT: &str = "SVG_SUSPICIOUS_CONTENT";
pub const IV_UNIT_SCALE: &str = "IV_UNIT_SCALE";

pub const EXPIRY_MISMATCH: &str = "EXPIRY_MISMATCH";
pub const STALE_CHART_DATA: &str = "STALE_CHART_DATA";

pub const CHART_FALLBACK_DATA: &str = "CHART_FALLBACK_DATA";
pub const CHART_MISSING_FIELDS: &str = "CHART_MISSING_FIELDS";
pub const CHART_IV_IMPLAUSIBLE: &str = "CHART_IV_IMPLAUSIBLE";
pub const INSUFFICIENT_STRIKE_COVERAGE: &str = "INSUFFICIENT_STRIKE_COVERAGE";
pub const DUPLICATE_PEER_SYMBOLS: &str = "DUPLICATE_PEER_SYMBOLS";
pub const SPOT_OUT_OF_RANGE: &str = "SPOT_OUT_OF_RANGE";

pub const MOCK_DATA_USED: &str = "MOCK_DATA_USED";
pub const PROVENANCE_MISMATCH: &str = "PROVENANCE_MISMATCH";
pub const VALIDATION_GATE_FAILED: &str = "VALIDATION_GATE_FAILED";
pub const RAW_PAYLOAD_HASH_MISMATCH: &str = "RAW_PAYLOAD_HASH_MISMATCH";
