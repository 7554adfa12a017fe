//! Validation gate
//!
//! Evaluates one batch of generated artifacts against the rule catalog and
//! returns a verdict listing every finding. Pure and deterministic: no I/O,
//! no clock, no randomness.

use crate::catalog::RuleCatalog;
use crate::codes;
use crate::config::GateConfig;
use crate::rules;
use crate::svg;
use common::{EventMetrics, EventType, GammaSign, SkewDirection, ValidationGateResult, ValidationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Data-quality facts a chart builder reports about its own inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartQualityReport {
    /// Chart was drawn from mock or fallback data
    pub used_fallback: bool,
    pub missing_fields: Vec<String>,
    /// Largest IV plotted, in whatever scale the builder received
    pub max_iv: Option<f64>,
    pub strikes_near_spot: Option<usize>,
    /// Correlation-matrix peers
    pub peer_symbols: Vec<String>,
}

/// Everything the gate looks at for one run
#[derive(Debug, Clone)]
pub struct GateInput {
    pub symbol: String,
    pub event_type: EventType,
    pub metrics: EventMetrics,
    pub thread_parts: Vec<String>,
    pub chart_svgs: BTreeMap<String, String>,
    pub skew_direction: Option<SkewDirection>,
    pub iv_strikes: Vec<f64>,
    pub oi_strikes: Vec<f64>,
    pub oi_values: Vec<f64>,
    pub spot: Option<f64>,
    pub chart_expiries: BTreeMap<String, String>,
    pub chart_quality: BTreeMap<String, ChartQualityReport>,
    pub modeled_gamma: Option<GammaSign>,
}

impl GateInput {
    pub fn new(symbol: impl Into<String>, event_type: EventType, metrics: EventMetrics) -> Self {
        Self {
            symbol: symbol.into(),
            event_type,
            metrics,
            thread_parts: Vec::new(),
            chart_svgs: BTreeMap::new(),
            skew_direction: None,
            iv_strikes: Vec::new(),
            oi_strikes: Vec::new(),
            oi_values: Vec::new(),
            spot: None,
            chart_expiries: BTreeMap::new(),
            chart_quality: BTreeMap::new(),
            modeled_gamma: None,
        }
    }
}

/// Rule engine that must pass before a generated thread is publishable
#[derive(Debug, Clone, Default)]
pub struct ValidationGate {
    catalog: RuleCatalog,
    config: GateConfig,
}

impl ValidationGate {
    pub fn new(catalog: RuleCatalog, config: GateConfig) -> Self {
        Self { catalog, config }
    }

    pub fn with_catalog(mut self, catalog: RuleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Run every rule and aggregate the findings
    pub fn run(&self, input: &GateInput) -> ValidationGateResult {
        let mut results = Vec::new();

        results.extend(self.check_numbers(input));
        results.extend(rules::required_fields(input.event_type, &input.metrics));

        if let Some(breakeven) = input.metrics.breakeven {
            results.push(rules::validate_breakeven(
                breakeven,
                input.metrics.strike,
                input.spot,
                self.config.breakeven_max_deviation,
            ));
        }

        results.extend(self.check_thread(input));

        for (chart_type, markup) in &input.chart_svgs {
            results.extend(self.validate_svg_content(chart_type, markup));
        }

        results.extend(self.check_expiries(input));
        results.extend(self.check_chart_quality(input));
        results.extend(self.check_coverage(input));
        results.extend(self.check_completeness(input));

        let verdict = ValidationGateResult::from_results(results);
        debug!(
            symbol = %input.symbol,
            event_type = %input.event_type,
            errors = verdict.errors().len(),
            warnings = verdict.warnings().len(),
            "Validation gate evaluated"
        );
        verdict
    }

    /// Suspicious, placeholder and garbled-label scan over free text
    pub fn scan_text(&self, text: &str, field: &str) -> Vec<ValidationResult> {
        self.catalog
            .suspicious
            .iter()
            .chain(self.catalog.garbled.iter())
            .filter_map(|rule| {
                rule.matcher.find(text).map(|hit| {
                    ValidationResult::error(
                        rule.code.clone(),
                        format!("{} contains {} ({:?})", field, rule.label, hit),
                    )
                    .with_field(field)
                    .with_value(hit)
                })
            })
            .collect()
    }

    /// Structural and textual checks over one chart's markup
    pub fn validate_svg_content(&self, chart_type: &str, markup: &str) -> Vec<ValidationResult> {
        let field = format!("chart:{}", chart_type);

        if svg::is_blank_chart(markup) {
            return vec![ValidationResult::error(
                codes::EMPTY_CHART,
                format!("{} has no renderable svg markup", chart_type),
            )
            .with_field(field)];
        }

        let mut results = Vec::new();

        let text = svg::text_nodes(markup).join("\n");
        for mut finding in self.scan_text(&text, &field) {
            if finding.code == codes::SUSPICIOUS_TEXT {
                finding.code = codes::SVG_SUSPICIOUS_CONTENT.to_string();
            }
            results.push(finding);
        }

        for (name, value) in svg::leaked_attributes(markup) {
            results.push(
                ValidationResult::error(
                    codes::SVG_NAN_ATTRIBUTE,
                    format!("{} attribute {}=\"{}\" is not a number", chart_type, name, value),
                )
                .with_field(field.clone())
                .with_value(format!("{}={}", name, value)),
            );
        }

        if self.is_volatility_chart(chart_type) {
            for label in svg::unnormalizable_iv_labels(markup) {
                results.push(
                    ValidationResult::error(
                        codes::IV_UNIT_SCALE,
                        format!(
                            "{} shows IV {:?} which does not normalize on the assumed {} scale",
                            chart_type, label.raw, label.scale
                        ),
                    )
                    .with_field(field.clone())
                    .with_value(label.raw),
                );
            }
        }

        results
    }

    fn is_volatility_chart(&self, chart_type: &str) -> bool {
        chart_type.contains("volatility") || self.config.satisfies(chart_type, "volatility_smile")
    }

    fn check_numbers(&self, input: &GateInput) -> Vec<ValidationResult> {
        let mut results = rules::numeric_sanity(&input.metrics);

        results.extend(rules::strike_array("ivStrikes", &input.iv_strikes));
        results.extend(rules::strike_array("oiStrikes", &input.oi_strikes));
        results.extend(rules::oi_array(&input.oi_strikes, &input.oi_values));

        if let Some(spot) = input.spot {
            if !spot.is_finite() || spot <= 0.0 {
                results.push(
                    ValidationResult::error(codes::INVALID_NUMBER, format!("spot must be positive and finite, got {}", spot))
                        .with_field("spot")
                        .with_value(spot.to_string()),
                );
            }
        }

        results
    }

    fn check_thread(&self, input: &GateInput) -> Vec<ValidationResult> {
        if input.thread_parts.is_empty() {
            return vec![ValidationResult::error(codes::EMPTY_THREAD, "generated thread has no parts")
                .with_field("generatedThread")];
        }

        let mut results = Vec::new();

        for (index, part) in input.thread_parts.iter().enumerate() {
            let field = format!("thread[{}]", index);

            results.extend(self.scan_text(part, &field));

            if let Some(direction) = input.skew_direction {
                for rule in self.catalog.copy_rules_for(direction) {
                    if rule.pattern.is_match(part) {
                        results.push(
                            ValidationResult::error(
                                codes::WRONG_COPY_LOGIC,
                                format!("\"{}\" contradicts {} skew", rule.phrase, direction),
                            )
                            .with_field(field.clone())
                            .with_value(rule.phrase.clone()),
                        );
                    }
                }
            }

            results.extend(self.check_gamma_claim(part, &field, input.modeled_gamma));

            if input.event_type == EventType::DarkPool {
                for rule in &self.catalog.overclaim {
                    if let Some(hit) = rule.matcher.find(part) {
                        results.push(
                            ValidationResult::error(
                                rule.code.clone(),
                                format!("dark pool prints do not encode trade side; {} ({:?})", rule.label, hit),
                            )
                            .with_field(field.clone())
                            .with_value(hit),
                        );
                    }
                }
            }
        }

        let symbol = input.symbol.to_ascii_uppercase();
        if !symbol.is_empty()
            && !input
                .thread_parts
                .iter()
                .any(|p| p.to_ascii_uppercase().contains(&symbol))
        {
            results.push(
                ValidationResult::warning(
                    codes::SYMBOL_NOT_MENTIONED,
                    format!("thread never mentions {}", input.symbol),
                )
                .with_field("generatedThread"),
            );
        }

        results
    }

    fn check_gamma_claim(&self, text: &str, field: &str, modeled: Option<GammaSign>) -> Option<ValidationResult> {
        let claimed = self
            .catalog
            .gamma_claim
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| {
                if m.as_str().eq_ignore_ascii_case("long") {
                    GammaSign::Long
                } else {
                    GammaSign::Short
                }
            })
            .collect::<Vec<_>>();

        if claimed.is_empty() {
            return None;
        }

        match modeled {
            None => Some(
                ValidationResult::warning(
                    codes::GAMMA_SIGN_UNVERIFIED,
                    format!("text claims {} gamma but no modeled sign was supplied", claimed[0]),
                )
                .with_field(field),
            ),
            Some(sign) => claimed.into_iter().find(|c| *c != sign).map(|wrong| {
                ValidationResult::error(
                    codes::GAMMA_SIGN_MISMATCH,
                    format!("text claims {} gamma but chart data models {} gamma", wrong, sign),
                )
                .with_field(field)
                .with_value(wrong.to_string())
            }),
        }
    }

    fn check_expiries(&self, input: &GateInput) -> Vec<ValidationResult> {
        let Some(event_expiry) = input.metrics.expiry.as_deref() else {
            return Vec::new();
        };
        if event_expiry.trim().is_empty() {
            return Vec::new();
        }

        input
            .chart_expiries
            .iter()
            .filter_map(|(chart_type, chart_expiry)| rules::expiry_consistency(chart_type, event_expiry, chart_expiry))
            .collect()
    }

    fn check_chart_quality(&self, input: &GateInput) -> Vec<ValidationResult> {
        let mut results = Vec::new();

        for (chart_type, report) in &input.chart_quality {
            let field = format!("chart:{}", chart_type);

            if report.used_fallback {
                results.push(
                    ValidationResult::error(
                        codes::CHART_FALLBACK_DATA,
                        format!("{} was rendered from fallback data", chart_type),
                    )
                    .with_field(field.clone()),
                );
            }

            if !report.missing_fields.is_empty() {
                results.push(
                    ValidationResult::error(
                        codes::CHART_MISSING_FIELDS,
                        format!("{} is missing {}", chart_type, report.missing_fields.join(", ")),
                    )
                    .with_field(field.clone())
                    .with_value(report.missing_fields.clone()),
                );
            }

            if let Some(max_iv) = report.max_iv {
                results.extend(rules::iv_plausibility(chart_type, max_iv));
            }

            if let Some(near) = report.strikes_near_spot {
                if near < self.config.min_strikes_near_spot {
                    results.push(
                        ValidationResult::error(
                            codes::INSUFFICIENT_STRIKE_COVERAGE,
                            format!(
                                "{} has {} strike(s) near spot, need {}",
                                chart_type, near, self.config.min_strikes_near_spot
                            ),
                        )
                        .with_field(field.clone())
                        .with_value(near as u64),
                    );
                }
            }

            results.extend(rules::duplicate_peers(chart_type, &report.peer_symbols));
        }

        results
    }

    fn check_coverage(&self, input: &GateInput) -> Vec<ValidationResult> {
        let Some(spot) = input.spot.filter(|s| s.is_finite() && *s > 0.0) else {
            return Vec::new();
        };

        let mut results = Vec::new();

        if !input.iv_strikes.is_empty() {
            results.push(rules::validate_strike_coverage(
                spot,
                &input.iv_strikes,
                self.config.coverage_window,
                self.config.min_strikes_near_spot,
            ));
            results.push(rules::validate_spot_in_range_with(
                spot,
                &input.iv_strikes,
                self.config.spot_range_tolerance,
            ));
        }

        if !input.oi_strikes.is_empty() {
            results.push(
                rules::validate_spot_in_range_with(spot, &input.oi_strikes, self.config.spot_range_tolerance)
                    .with_field("oiStrikes"),
            );
        }

        results
    }

    fn check_completeness(&self, input: &GateInput) -> Vec<ValidationResult> {
        self.config
            .required_charts
            .iter()
            .filter(|required| {
                !input
                    .chart_svgs
                    .iter()
                    .any(|(key, markup)| self.config.satisfies(key, required) && !markup.trim().is_empty())
            })
            .map(|required| {
                ValidationResult::error(
                    codes::MISSING_REQUIRED_CHART,
                    format!("required chart {} is missing", required),
                )
                .with_field(format!("chart:{}", required))
            })
            .collect()
    }
}

/// Run the gate with the standard catalog and default thresholds
pub fn run_validation_gate(input: &GateInput) -> ValidationGateResult {
    ValidationGate::default().run(input)
}
