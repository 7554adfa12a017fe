//! Gate thresholds

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Thresholds and the required chart set used by the validation gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Max relative distance between breakeven and its nearest anchor (0.60 = 60%)
    #[serde(default = "default_breakeven_max_deviation")]
    pub breakeven_max_deviation: f64,

    /// Window around spot used for strike coverage (0.15 = ±15%)
    #[serde(default = "default_coverage_window")]
    pub coverage_window: f64,

    /// Strikes required inside the coverage window
    #[serde(default = "default_min_strikes_near_spot")]
    pub min_strikes_near_spot: usize,

    /// How far outside the strike range spot may sit (0.10 = 10%)
    #[serde(default = "default_spot_range_tolerance")]
    pub spot_range_tolerance: f64,

    /// Chart kinds that must all be present
    #[serde(default = "default_required_charts")]
    pub required_charts: Vec<String>,

    /// Alternate chart keys accepted in place of a required one
    #[serde(default = "default_chart_aliases")]
    pub chart_aliases: BTreeMap<String, String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            breakeven_max_deviation: default_breakeven_max_deviation(),
            coverage_window: default_coverage_window(),
            min_strikes_near_spot: default_min_strikes_near_spot(),
            spot_range_tolerance: default_spot_range_tolerance(),
            required_charts: default_required_charts(),
            chart_aliases: default_chart_aliases(),
        }
    }
}

impl GateConfig {
    /// Whether a chart keyed `key` satisfies the required kind `required`
    pub fn satisfies(&self, key: &str, required: &str) -> bool {
        key == required || self.chart_aliases.get(key).map(|c| c == required).unwrap_or(false)
    }
}

fn default_breakeven_max_deviation() -> f64 {
    0.60
}

fn default_coverage_window() -> f64 {
    0.15
}

fn default_min_strikes_near_spot() -> usize {
    5
}

fn default_spot_range_tolerance() -> f64 {
    0.10
}

fn default_required_charts() -> Vec<String> {
    [
        "volatility_smile",
        "open_interest",
        "gamma_exposure",
        "price_history",
        "correlation_matrix",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_chart_aliases() -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    // Older generators keyed the smile chart by its short name
    aliases.insert("iv_smile".to_string(), "volatility_smile".to_string());
    aliases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GateConfig::default();
        assert_eq!(config.breakeven_max_deviation, 0.60);
        assert_eq!(config.required_charts.len(), 5);
        assert!(config.satisfies("iv_smile", "volatility_smile"));
        assert!(!config.satisfies("iv_smile", "open_interest"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: GateConfig = toml::from_str("min_strikes_near_spot = 7").unwrap();
        assert_eq!(config.min_strikes_near_spot, 7);
        assert_eq!(config.coverage_window, 0.15);
        assert_eq!(config.chart_aliases.len(), 1);
    }
}
