//! Implied volatility unit normalization
//!
//! Upstream feeds mix percent-scaled (`45`) and decimal-scaled (`0.45`)
//! volatility. Anything above 3 is read as a percentage; the canonical
//! decimal must land in (0, 3].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Largest decimal IV accepted (300%)
pub const MAX_DECIMAL_IV: f64 = 3.0;

/// Minimum surviving points for a usable smile
pub const DEFAULT_MIN_SMILE_POINTS: usize = 5;

/// Scale a raw IV value was assumed to be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IvScale {
    Percent,
    Decimal,
}

impl fmt::Display for IvScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IvScale::Percent => write!(f, "percent"),
            IvScale::Decimal => write!(f, "decimal"),
        }
    }
}

/// Raised when a caller needs a hard failure instead of a soft `None`
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{context}: implied volatility {value} is invalid on the assumed {scale} scale")]
pub struct IvNormalizationError {
    pub value: f64,
    pub scale: IvScale,
    pub context: String,
}

/// Which side of the chain a smile point's IV came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IvSide {
    Call,
    Put,
}

/// Raw smile input as delivered by the options-chain aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmileInput {
    pub strike: f64,
    #[serde(default, rename = "callIV")]
    pub call_iv: Option<f64>,
    #[serde(default, rename = "putIV")]
    pub put_iv: Option<f64>,
}

/// A normalized smile point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmilePoint {
    pub strike: f64,
    pub iv: f64,
    pub side: IvSide,
}

/// Batch-level smile failures; there is nothing partial to report
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SmileDataError {
    #[error("strike {strike}: {side:?} IV {value} is invalid on the assumed {scale} scale")]
    InvalidIv {
        strike: f64,
        side: IvSide,
        value: f64,
        scale: IvScale,
    },
    #[error("smile needs at least {required} valid points, got {actual}")]
    InsufficientPoints { required: usize, actual: usize },
}

/// Scale a raw value is read in before normalization
pub fn classify_scale(raw: f64) -> IvScale {
    if raw > MAX_DECIMAL_IV {
        IvScale::Percent
    } else {
        IvScale::Decimal
    }
}

/// Normalize a possibly percent-scaled IV to a decimal in (0, 3].
///
/// Returns `None` for missing, non-finite or out-of-range input. Never panics.
pub fn normalize_iv(raw: impl Into<Option<f64>>) -> Option<f64> {
    let raw = raw.into()?;
    if !raw.is_finite() {
        return None;
    }

    let value = match classify_scale(raw) {
        IvScale::Percent => raw / 100.0,
        IvScale::Decimal => raw,
    };

    if value > 0.0 && value <= MAX_DECIMAL_IV {
        Some(value)
    } else {
        None
    }
}

/// Hard-failure variant of [`normalize_iv`]
pub fn require_normalized_iv(value: f64, context: &str) -> Result<f64, IvNormalizationError> {
    normalize_iv(value).ok_or_else(|| IvNormalizationError {
        value,
        scale: classify_scale(value),
        context: context.to_string(),
    })
}

/// Normalize a batch of smile inputs, all-or-nothing.
///
/// Any present but invalid IV fails the whole batch. Call IV is preferred
/// over put IV; points with neither are skipped. Fewer than `min_points`
/// survivors is also a batch failure.
pub fn build_normalized_smile_points(
    points: &[SmileInput],
    min_points: usize,
) -> Result<Vec<SmilePoint>, SmileDataError> {
    let mut normalized = Vec::with_capacity(points.len());

    for point in points {
        let call = normalize_side(point.strike, IvSide::Call, point.call_iv)?;
        let put = normalize_side(point.strike, IvSide::Put, point.put_iv)?;

        let chosen = match (call, put) {
            (Some(iv), _) => Some((iv, IvSide::Call)),
            (None, Some(iv)) => Some((iv, IvSide::Put)),
            (None, None) => None,
        };

        if let Some((iv, side)) = chosen {
            normalized.push(SmilePoint {
                strike: point.strike,
                iv,
                side,
            });
        }
    }

    if normalized.len() < min_points {
        return Err(SmileDataError::InsufficientPoints {
            required: min_points,
            actual: normalized.len(),
        });
    }

    Ok(normalized)
}

fn normalize_side(strike: f64, side: IvSide, raw: Option<f64>) -> Result<Option<f64>, SmileDataError> {
    match raw {
        None => Ok(None),
        Some(value) => normalize_iv(value).map(Some).ok_or(SmileDataError::InvalidIv {
            strike,
            side,
            value,
            scale: classify_scale(value),
        }),
    }
}
