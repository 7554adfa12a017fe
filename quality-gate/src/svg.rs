//! SVG markup inspection helpers
//!
//! Charts arrive as opaque markup strings. Text rules run over text nodes
//! only (attribute names and embedded data would false-positive), while
//! attribute values get their own numeric leak check.

use crate::units::{classify_scale, normalize_iv, IvScale};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TEXT_NODE: Regex = Regex::new(r">([^<>]+)<").expect("text node pattern");
    static ref ATTRIBUTE: Regex = Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute pattern");
    static ref LEAKED_ATTRIBUTE_VALUE: Regex =
        Regex::new(r"\b(NaN|Infinity|undefined|null)\b|\[object Object\]").expect("leak pattern");
    static ref IV_NUMBER: Regex = Regex::new(r"(-?\d+(?:\.\d+)?)\s*(%)?").expect("number pattern");
}

/// Non-empty text node contents in document order
pub fn text_nodes(svg: &str) -> Vec<&str> {
    TEXT_NODE
        .captures_iter(svg)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `(name, value)` of every attribute whose value leaks a non-number token
pub fn leaked_attributes(svg: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(svg)
        .filter_map(|c| {
            let name = c.get(1)?.as_str();
            let value = c.get(2).or_else(|| c.get(3))?.as_str();
            if LEAKED_ATTRIBUTE_VALUE.is_match(value) {
                Some((name.to_string(), value.to_string()))
            } else {
                None
            }
        })
        .collect()
}

/// A number found in a volatility chart that does not normalize
#[derive(Debug, Clone, PartialEq)]
pub struct BadIvLabel {
    pub raw: String,
    pub value: f64,
    pub scale: IvScale,
}

/// Scan volatility chart labels for values the unit normalizer rejects.
///
/// Percent-suffixed numbers are always checked. Bare numbers are checked
/// only in the single-digit decimal form (`0.45`, `2.10`) so strike and
/// date labels on the same chart are left alone.
pub fn unnormalizable_iv_labels(svg: &str) -> Vec<BadIvLabel> {
    let mut bad = Vec::new();

    for node in text_nodes(svg) {
        for caps in IV_NUMBER.captures_iter(node) {
            let Some(number) = caps.get(1) else { continue };
            let is_percent = caps.get(2).is_some();
            let text = number.as_str();

            if !is_percent && !is_bare_decimal(text) {
                continue;
            }
            // A hyphen glued to a preceding character is a separator, not a sign
            if text.starts_with('-') && number.start() > 0 {
                let prior = node[..number.start()].chars().last();
                if prior.map(|c| c.is_alphanumeric()).unwrap_or(false) {
                    continue;
                }
            }

            let Ok(value) = text.parse::<f64>() else { continue };
            if normalize_iv(value).is_none() {
                bad.push(BadIvLabel {
                    raw: caps.get(0).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
                    value,
                    scale: classify_scale(value),
                });
            }
        }
    }

    bad
}

fn is_bare_decimal(text: &str) -> bool {
    let digits = text.trim_start_matches('-');
    match digits.split_once('.') {
        Some((whole, frac)) => whole.len() == 1 && !frac.is_empty(),
        None => false,
    }
}

/// Markup that cannot be a rendered chart
pub fn is_blank_chart(svg: &str) -> bool {
    let trimmed = svg.trim();
    trimmed.is_empty() || !trimmed.contains("<svg")
}
