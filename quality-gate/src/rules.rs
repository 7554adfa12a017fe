//! Individual validation rules
//!
//! Each rule yields zero or one finding per checked item and never returns
//! early on the first problem; the gate concatenates everything.

use crate::codes;
use crate::config::GateConfig;
use crate::units::normalize_iv;
use chrono::NaiveDate;
use common::{EventMetrics, EventType, ValidationResult};
use serde_json::json;
use std::collections::BTreeSet;

/// Finite-number and range checks over the event metrics
pub fn numeric_sanity(metrics: &EventMetrics) -> Vec<ValidationResult> {
    let mut results = Vec::new();

    let required = [
        ("size", Some(metrics.size)),
        ("price", Some(metrics.price)),
        ("notionalValue", Some(metrics.notional_value)),
        ("percentile", Some(metrics.percentile)),
        ("contracts", metrics.contracts),
        ("shares", metrics.shares),
        ("strike", metrics.strike),
        ("breakeven", metrics.breakeven),
    ];

    for (field, value) in required {
        if let Some(v) = value {
            if !v.is_finite() {
                results.push(
                    ValidationResult::error(codes::INVALID_NUMBER, format!("{} must be a finite number, got {}", field, v))
                        .with_field(field)
                        .with_value(v.to_string()),
                );
            }
        }
    }

    if metrics.percentile.is_finite() && !(0.0..=100.0).contains(&metrics.percentile) {
        results.push(
            ValidationResult::error(
                codes::PERCENTILE_OUT_OF_RANGE,
                format!("percentile must lie in [0, 100], got {}", metrics.percentile),
            )
            .with_field("percentile")
            .with_value(metrics.percentile),
        );
    }

    results
}

/// Strikes must be finite and strictly positive
pub fn strike_array(field: &str, strikes: &[f64]) -> Option<ValidationResult> {
    let bad: Vec<String> = strikes
        .iter()
        .filter(|s| !s.is_finite() || **s <= 0.0)
        .map(|s| s.to_string())
        .collect();

    if bad.is_empty() {
        return None;
    }

    Some(
        ValidationResult::error(
            codes::INVALID_STRIKE_ARRAY,
            format!("{} contains {} non-finite or non-positive strike(s)", field, bad.len()),
        )
        .with_field(field)
        .with_value(json!(bad)),
    )
}

/// Open interest must be finite and non-negative, one value per strike
pub fn oi_array(strikes: &[f64], values: &[f64]) -> Option<ValidationResult> {
    if values.is_empty() {
        return None;
    }

    if values.len() != strikes.len() {
        return Some(
            ValidationResult::error(
                codes::INVALID_OI_ARRAY,
                format!("{} open interest values for {} strikes", values.len(), strikes.len()),
            )
            .with_field("oiValues"),
        );
    }

    let bad = values.iter().filter(|v| !v.is_finite() || **v < 0.0).count();
    if bad == 0 {
        return None;
    }

    Some(
        ValidationResult::error(
            codes::INVALID_OI_ARRAY,
            format!("oiValues contains {} non-finite or negative value(s)", bad),
        )
        .with_field("oiValues"),
    )
}

/// Event-type specific required fields
pub fn required_fields(event_type: EventType, metrics: &EventMetrics) -> Vec<ValidationResult> {
    let missing: Vec<&str> = match event_type {
        EventType::OptionsSweep => {
            let mut missing = Vec::new();
            if metrics.strike.is_none() {
                missing.push("strike");
            }
            if metrics.expiry.as_deref().map(str::trim).unwrap_or("").is_empty() {
                missing.push("expiry");
            }
            if metrics.contracts.is_none() {
                missing.push("contracts");
            }
            if metrics.breakeven.is_none() {
                missing.push("breakeven");
            }
            missing
        }
        EventType::DarkPool => {
            let mut missing = Vec::new();
            if metrics.shares.is_none() {
                missing.push("shares");
            }
            if !(metrics.price.is_finite() && metrics.price > 0.0) {
                missing.push("price");
            }
            missing
        }
    };

    missing
        .into_iter()
        .map(|field| {
            ValidationResult::error(
                codes::MISSING_REQUIRED_FIELD,
                format!("{} events require {}", event_type, field),
            )
            .with_field(field)
        })
        .collect()
}

/// Breakeven must be positive, finite and near the strike or spot
pub fn validate_breakeven(breakeven: f64, strike: Option<f64>, spot: Option<f64>, max_deviation: f64) -> ValidationResult {
    if !breakeven.is_finite() || breakeven <= 0.0 {
        return ValidationResult::error(
            codes::BREAKEVEN_IMPLAUSIBLE,
            format!("breakeven must be positive and finite, got {}", breakeven),
        )
        .with_field("breakeven")
        .with_value(breakeven.to_string());
    }

    let anchors: Vec<(&str, f64)> = [("strike", strike), ("spot", spot)]
        .into_iter()
        .filter_map(|(name, v)| v.filter(|a| a.is_finite() && *a > 0.0).map(|a| (name, a)))
        .collect();

    if anchors.is_empty() {
        return ValidationResult::warning(
            codes::BREAKEVEN_UNANCHORED,
            "breakeven could not be checked: no strike or spot available",
        )
        .with_field("breakeven");
    }

    let nearest = anchors
        .iter()
        .map(|(name, anchor)| (*name, (breakeven - anchor).abs() / anchor))
        .fold(None, |best: Option<(&str, f64)>, (name, dev)| match best {
            Some((_, best_dev)) if best_dev <= dev => best,
            _ => Some((name, dev)),
        });

    match nearest {
        Some((_, deviation)) if deviation <= max_deviation => {
            ValidationResult::ok(codes::BREAKEVEN_IMPLAUSIBLE, "breakeven within range")
        }
        Some((anchor, deviation)) => ValidationResult::error(
            codes::BREAKEVEN_IMPLAUSIBLE,
            format!(
                "breakeven {} is {:.0}% from the nearest anchor ({}), limit {:.0}%",
                breakeven,
                deviation * 100.0,
                anchor,
                max_deviation * 100.0
            ),
        )
        .with_field("breakeven")
        .with_value(breakeven),
        None => ValidationResult::ok(codes::BREAKEVEN_IMPLAUSIBLE, "breakeven within range"),
    }
}

/// Spot must fall inside the strike range, widened by 10% each side
pub fn validate_spot_in_range(spot: f64, strikes: &[f64]) -> ValidationResult {
    validate_spot_in_range_with(spot, strikes, GateConfig::default().spot_range_tolerance)
}

pub fn validate_spot_in_range_with(spot: f64, strikes: &[f64], tolerance: f64) -> ValidationResult {
    let finite: Vec<f64> = strikes.iter().copied().filter(|s| s.is_finite()).collect();
    if finite.is_empty() || !spot.is_finite() {
        return ValidationResult::error(codes::SPOT_OUT_OF_RANGE, "no strike range to compare spot against")
            .with_field("spot");
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let low = min * (1.0 - tolerance);
    let high = max * (1.0 + tolerance);

    if spot >= low && spot <= high {
        ValidationResult::ok(codes::SPOT_OUT_OF_RANGE, format!("spot {} within [{}, {}]", spot, min, max))
    } else {
        ValidationResult::error(
            codes::SPOT_OUT_OF_RANGE,
            format!(
                "spot {} is outside strike range [{}, {}] (tolerance {:.0}%)",
                spot,
                min,
                max,
                tolerance * 100.0
            ),
        )
        .with_field("spot")
        .with_value(spot)
    }
}

/// At least `min_strikes` strikes within `window` of spot
pub fn validate_strike_coverage(spot: f64, strikes: &[f64], window: f64, min_strikes: usize) -> ValidationResult {
    let near = strikes
        .iter()
        .filter(|s| s.is_finite() && spot.is_finite() && spot > 0.0 && ((*s - spot).abs() / spot) <= window)
        .count();

    if near >= min_strikes {
        ValidationResult::ok(codes::INSUFFICIENT_STRIKE_COVERAGE, format!("{} strikes near spot", near))
    } else {
        ValidationResult::error(
            codes::INSUFFICIENT_STRIKE_COVERAGE,
            format!(
                "only {} strike(s) within ±{:.0}% of spot {}, need {}",
                near,
                window * 100.0,
                spot,
                min_strikes
            ),
        )
        .with_field("ivStrikes")
        .with_value(near as u64)
    }
}

/// Event expiry and chart-declared expiry must agree
pub fn expiry_consistency(chart_type: &str, event_expiry: &str, chart_expiry: &str) -> Option<ValidationResult> {
    let event = event_expiry.trim();
    let chart = chart_expiry.trim();

    let (event_date, chart_date) = (parse_date(event), parse_date(chart));
    let same = match (event_date, chart_date) {
        (Some(e), Some(c)) => e == c,
        _ => event == chart,
    };
    if same {
        return None;
    }

    let stale = matches!((event_date, chart_date), (Some(e), Some(c)) if c < e);
    let result = if stale {
        ValidationResult::error(
            codes::STALE_CHART_DATA,
            format!(
                "{} shows expiry {} which is earlier than the event expiry {}; chart data is stale",
                chart_type, chart, event
            ),
        )
    } else {
        ValidationResult::error(
            codes::EXPIRY_MISMATCH,
            format!("{} shows expiry {} but the event expires {}", chart_type, chart, event),
        )
    };

    Some(result.with_field(format!("chart:{}", chart_type)).with_value(chart.to_string()))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Implausible IV (above 300% or not a volatility at all)
pub fn iv_plausibility(chart_type: &str, max_iv: f64) -> Option<ValidationResult> {
    if normalize_iv(max_iv).is_some() {
        return None;
    }
    Some(
        ValidationResult::error(
            codes::CHART_IV_IMPLAUSIBLE,
            format!("{} reports implied volatility {} which is outside (0%, 300%]", chart_type, max_iv),
        )
        .with_field(format!("chart:{}", chart_type))
        .with_value(max_iv.to_string()),
    )
}

/// Peer symbols in a correlation matrix must be unique (case-insensitive)
pub fn duplicate_peers(chart_type: &str, peers: &[String]) -> Option<ValidationResult> {
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for peer in peers {
        let key = peer.trim().to_ascii_uppercase();
        if !seen.insert(key.clone()) {
            duplicates.insert(key);
        }
    }

    if duplicates.is_empty() {
        return None;
    }

    let duplicates: Vec<String> = duplicates.into_iter().collect();
    Some(
        ValidationResult::error(
            codes::DUPLICATE_PEER_SYMBOLS,
            format!("{} lists duplicate peers: {}", chart_type, duplicates.join(", ")),
        )
        .with_field(format!("chart:{}", chart_type))
        .with_value(json!(duplicates)),
    )
}
