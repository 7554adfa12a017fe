//! Generation orchestrator
//!
//! Drives one run end to end:
//! - Creates the run directory and records the request
//! - Fetches the event and the (cached) options chain concurrently
//! - Captures every upstream payload and links it through provenance
//! - Asks the content generator for thread parts and charts
//! - Runs the validation gate and persists the run artifacts and report
//!
//! Missing data never aborts a run; it surfaces as gate errors so the
//! blocked run is still fully persisted and inspectable.

use crate::cache::TtlCache;
use crate::sources::{ContentGenerator, GeneratedContent, MarketDataSource, MarketEvent, OptionsChain};
use anyhow::{bail, Context, Result};
use artifact_store::{ArtifactStore, RunContext, SharedSnapshots, Snapshotter, RUN_ARTIFACT};
use chrono::{DateTime, Utc};
use common::{ChartSpec, EventType, ProvenanceEntry, RunArtifacts, ValidationGateResult, ValidationResult};
use quality_gate::units::DEFAULT_MIN_SMILE_POINTS;
use quality_gate::{build_normalized_smile_points, codes, missing_field_code, GateInput, SmileDataError, ValidationGate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

const EVENT_PAYLOAD: &str = "event";
const OPTIONS_CHAIN_PAYLOAD: &str = "options_chain";
const CONTENT_SOURCE: &str = "content";

const MARKET_DATA_SOURCE: &str = "market-data";
const GENERATOR_SOURCE: &str = "content-generator";

/// Options chains keyed by upper-case symbol
pub type ChainCache = TtlCache<String, Arc<OptionsChain>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub post_type: EventType,
}

/// Summary written to `report.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub run_id: String,
    pub symbol: String,
    pub post_type: EventType,
    pub is_publishable: bool,
    pub used_fallback: bool,
    pub sources_used: BTreeMap<String, bool>,
    pub missing_fields: Vec<String>,
    pub validation: ValidationGateResult,
    pub artifact_path: PathBuf,
    pub report_path: PathBuf,
    pub completed_at: DateTime<Utc>,
}

/// Coordinates fetch, generation, gating and persistence for a run
pub struct GenerationOrchestrator {
    store: ArtifactStore,
    market_data: Arc<dyn MarketDataSource>,
    generator: Arc<dyn ContentGenerator>,
    chain_cache: Arc<ChainCache>,
    gate: ValidationGate,
}

impl GenerationOrchestrator {
    pub fn new(
        store: ArtifactStore,
        market_data: Arc<dyn MarketDataSource>,
        generator: Arc<dyn ContentGenerator>,
        chain_cache: Arc<ChainCache>,
    ) -> Self {
        Self {
            store,
            market_data,
            generator,
            chain_cache,
            gate: ValidationGate::default(),
        }
    }

    pub fn with_gate(mut self, gate: ValidationGate) -> Self {
        self.gate = gate;
        self
    }

    /// Generate, gate and persist one run
    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerationReport> {
        let symbol = request.symbol.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            bail!("Symbol must not be empty");
        }

        let inputs = serde_json::to_value(&request).context("Failed to record request inputs")?;
        let handle = self
            .store
            .create_run(RunContext {
                run_id: request.run_id.clone(),
                inputs: inputs.clone(),
            })
            .await
            .with_context(|| format!("Failed to create run for {}", symbol))?;
        let run_id = handle.run_id.clone();

        info!(run_id = %run_id, symbol = %symbol, post_type = %request.post_type, "Starting generation run");

        let mut run = RunArtifacts::new(&run_id, &symbol, request.post_type, handle.started_at);
        run.inputs = inputs;

        let captured = SharedSnapshots::default();
        let snapshotter = self.store.snapshotter(&run_id, captured.clone());

        let (event, chain) = tokio::join!(
            self.market_data.fetch_event(&symbol, request.post_type),
            self.fetch_chain(&symbol),
        );

        let event = self.record_event(&mut run, &snapshotter, event).await?;
        let chain = self.record_chain(&mut run, &snapshotter, chain).await?;

        let mut extra: Vec<ValidationResult> = Vec::new();

        let verdict = match &event {
            Some(event) => {
                let content = self.generate_content(&mut run, event, chain.as_deref()).await;
                let input = self.gate_input(event, chain.as_deref(), &content, &mut extra);

                for (chart_type, chart) in &content.charts {
                    let findings = self.gate.validate_svg_content(chart_type, &chart.svg);
                    run.charts
                        .insert(chart_type.clone(), ChartSpec::new(chart_type.clone(), chart.svg.clone(), &findings));
                }
                run.generated_thread = content.thread_parts;

                self.gate.run(&input)
            }
            // No metrics to gate; the missing quote below is the verdict
            None => ValidationGateResult::from_results(Vec::new()),
        };

        for field in &run.missing_fields {
            extra.push(
                ValidationResult::error(missing_field_code(field), format!("upstream data missing: {}", field))
                    .with_field("missingFields")
                    .with_value(field.clone()),
            );
        }
        if run.used_fallback {
            extra.push(
                ValidationResult::error(codes::MOCK_DATA_USED, "run used mock or fallback data")
                    .with_field("usedFallback"),
            );
        }

        let verdict = merge(verdict, extra);

        run.raw_payloads = captured.lock().await.clone();
        run.validation = Some(verdict.clone());
        let completed_at = Utc::now();
        run.completed_at = Some(completed_at);

        let artifact = self
            .store
            .write_artifact(&run_id, RUN_ARTIFACT, &run)
            .await
            .context("Failed to persist run artifacts")?;

        let report = GenerationReport {
            run_id: run_id.clone(),
            symbol,
            post_type: request.post_type,
            is_publishable: verdict.is_publishable(),
            used_fallback: run.used_fallback,
            sources_used: run.sources_used.clone(),
            missing_fields: run.missing_fields.clone(),
            validation: verdict,
            artifact_path: PathBuf::from(artifact.path),
            report_path: handle.paths.report.clone(),
            completed_at,
        };
        self.store
            .write_report(&run_id, &report)
            .await
            .context("Failed to persist run report")?;

        if report.is_publishable {
            info!(run_id = %run_id, warnings = report.validation.warnings().len(), "Run is publishable");
        } else {
            warn!(
                run_id = %run_id,
                errors = ?report.validation.error_codes(),
                "Run blocked by validation gate"
            );
        }

        Ok(report)
    }

    async fn fetch_chain(&self, symbol: &str) -> Result<Arc<OptionsChain>> {
        let source = self.market_data.clone();
        let key = symbol.to_string();
        self.chain_cache
            .get_or_try_insert_with(key.clone(), || async move {
                debug!(symbol = %key, "Options chain cache miss");
                source.fetch_options_chain(&key).await.map(Arc::new)
            })
            .await
    }

    async fn record_event(
        &self,
        run: &mut RunArtifacts,
        snapshotter: &Snapshotter,
        fetched: Result<MarketEvent>,
    ) -> Result<Option<MarketEvent>> {
        match fetched {
            Ok(event) => {
                let snapshot = snapshotter.capture(EVENT_PAYLOAD, &event).await?;
                run.provenance.insert(
                    EVENT_PAYLOAD.to_string(),
                    ProvenanceEntry::from_snapshot(MARKET_DATA_SOURCE, &snapshot),
                );
                run.sources_used.insert(EVENT_PAYLOAD.to_string(), true);
                if event.used_fallback {
                    warn!(run_id = %run.run_id, "Event came from fallback data");
                    run.used_fallback = true;
                }
                Ok(Some(event))
            }
            Err(e) => {
                warn!(run_id = %run.run_id, error = %e, "Event fetch failed");
                run.sources_used.insert(EVENT_PAYLOAD.to_string(), false);
                run.mark_missing("QUOTE");
                Ok(None)
            }
        }
    }

    async fn record_chain(
        &self,
        run: &mut RunArtifacts,
        snapshotter: &Snapshotter,
        fetched: Result<Arc<OptionsChain>>,
    ) -> Result<Option<Arc<OptionsChain>>> {
        match fetched {
            Ok(chain) => {
                let snapshot = snapshotter.capture(OPTIONS_CHAIN_PAYLOAD, chain.as_ref()).await?;
                run.provenance.insert(
                    OPTIONS_CHAIN_PAYLOAD.to_string(),
                    ProvenanceEntry::from_snapshot(MARKET_DATA_SOURCE, &snapshot),
                );
                run.sources_used.insert(OPTIONS_CHAIN_PAYLOAD.to_string(), true);

                if chain.used_fallback {
                    warn!(run_id = %run.run_id, "Options chain came from fallback data");
                    run.used_fallback = true;
                }
                if chain.smile.is_empty() {
                    run.mark_missing("IV_DATA");
                }
                if chain.open_interest.is_empty() {
                    run.mark_missing("OPEN_INTEREST");
                }
                Ok(Some(chain))
            }
            Err(e) => {
                warn!(run_id = %run.run_id, error = %e, "Options chain fetch failed");
                run.sources_used.insert(OPTIONS_CHAIN_PAYLOAD.to_string(), false);
                run.mark_missing("OPTIONS_CHAIN");
                Ok(None)
            }
        }
    }

    /// A generator failure leaves the thread and charts empty for the gate to reject
    async fn generate_content(
        &self,
        run: &mut RunArtifacts,
        event: &MarketEvent,
        chain: Option<&OptionsChain>,
    ) -> GeneratedContent {
        match self.generator.generate(event, chain).await {
            Ok(content) => {
                run.sources_used.insert(CONTENT_SOURCE.to_string(), true);

                let inputs = captured_inputs(run);
                run.provenance.insert(
                    "thread".to_string(),
                    ProvenanceEntry::new(GENERATOR_SOURCE).derived_from(inputs.clone()),
                );
                for (chart_type, chart) in &content.charts {
                    let mut entry = ProvenanceEntry::new(GENERATOR_SOURCE).derived_from(inputs.clone());
                    if let Some(quality) = &chart.quality {
                        if quality.used_fallback {
                            run.used_fallback = true;
                            entry = entry.with_notes("rendered from fallback data");
                        }
                    }
                    run.provenance.insert(format!("chart:{}", chart_type), entry);
                }

                debug!(
                    run_id = %run.run_id,
                    parts = content.thread_parts.len(),
                    charts = content.charts.len(),
                    "Content generated"
                );
                content
            }
            Err(e) => {
                warn!(run_id = %run.run_id, error = %e, "Content generation failed");
                run.sources_used.insert(CONTENT_SOURCE.to_string(), false);
                GeneratedContent::default()
            }
        }
    }

    fn gate_input(
        &self,
        event: &MarketEvent,
        chain: Option<&OptionsChain>,
        content: &GeneratedContent,
        extra: &mut Vec<ValidationResult>,
    ) -> GateInput {
        let mut input = GateInput::new(&event.symbol, event.event_type, event.metrics.clone());
        input.spot = event.spot;
        input.thread_parts = content.thread_parts.clone();
        input.skew_direction = content.skew_direction;
        input.modeled_gamma = content.modeled_gamma;

        for (chart_type, chart) in &content.charts {
            input.chart_svgs.insert(chart_type.clone(), chart.svg.clone());
            if let Some(expiry) = &chart.expiry {
                input.chart_expiries.insert(chart_type.clone(), expiry.clone());
            }
            if let Some(quality) = &chart.quality {
                input.chart_quality.insert(chart_type.clone(), quality.clone());
            }
        }

        if let Some(chain) = chain {
            if !chain.open_interest.is_empty() {
                input.oi_strikes = chain.strikes.clone();
                input.oi_values = chain.open_interest.clone();
            }

            if !chain.smile.is_empty() {
                match build_normalized_smile_points(&chain.smile, DEFAULT_MIN_SMILE_POINTS) {
                    Ok(points) => input.iv_strikes = points.iter().map(|p| p.strike).collect(),
                    Err(e) => extra.push(smile_finding(&e)),
                }
            }
        }

        input
    }
}

/// Gate finding for a smile batch that could not be normalized
fn smile_finding(err: &SmileDataError) -> ValidationResult {
    match err {
        SmileDataError::InvalidIv { value, .. } => ValidationResult::error(codes::IV_UNIT_SCALE, err.to_string())
            .with_field("optionsChain.smile")
            .with_value(*value),
        SmileDataError::InsufficientPoints { actual, .. } => {
            ValidationResult::error(codes::INSUFFICIENT_STRIKE_COVERAGE, err.to_string())
                .with_field("optionsChain.smile")
                .with_value(*actual as u64)
        }
    }
}

fn merge(verdict: ValidationGateResult, extra: Vec<ValidationResult>) -> ValidationGateResult {
    if extra.is_empty() {
        return verdict;
    }
    ValidationGateResult::from_results(
        verdict
            .errors()
            .iter()
            .chain(verdict.warnings())
            .cloned()
            .chain(extra),
    )
}

/// Provenance keys backed by a captured raw payload
fn captured_inputs(run: &RunArtifacts) -> Vec<String> {
    run.provenance
        .iter()
        .filter(|(_, entry)| entry.has_raw_evidence())
        .map(|(name, _)| name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::RenderedChart;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use common::{EventMetrics, Sentiment, SkewDirection};
    use quality_gate::{ChartQualityReport, SmileInput};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    const CHARTS: [&str; 5] = [
        "volatility_smile",
        "open_interest",
        "gamma_exposure",
        "price_history",
        "correlation_matrix",
    ];

    fn event() -> MarketEvent {
        MarketEvent {
            symbol: "AAPL".to_string(),
            event_type: EventType::OptionsSweep,
            metrics: EventMetrics {
                size: 100.0,
                contracts: Some(100.0),
                shares: None,
                strike: Some(150.0),
                expiry: Some("2025-01-17".to_string()),
                breakeven: Some(155.0),
                timestamp: Utc.with_ymd_and_hms(2025, 1, 10, 15, 30, 0).unwrap(),
                percentile: 85.0,
                sentiment: Sentiment::Bullish,
                price: 150.0,
                notional_value: 1_500_000.0,
            },
            spot: Some(150.0),
            used_fallback: false,
        }
    }

    fn chain() -> OptionsChain {
        let strikes: Vec<f64> = (0..9).map(|i| 130.0 + 5.0 * i as f64).collect();
        OptionsChain {
            symbol: "AAPL".to_string(),
            expiry: Some("2025-01-17".to_string()),
            smile: strikes
                .iter()
                .map(|&strike| SmileInput {
                    strike,
                    call_iv: Some(32.0),
                    put_iv: Some(0.35),
                })
                .collect(),
            open_interest: vec![1200.0, 900.0, 1500.0, 4000.0, 8000.0, 3000.0, 1100.0, 600.0, 250.0],
            strikes,
            used_fallback: false,
        }
    }

    fn content() -> GeneratedContent {
        let charts = CHARTS
            .iter()
            .map(|name| {
                let svg = format!(
                    r#"<svg xmlns="http://www.w3.org/2000/svg" width="600" height="400"><title>AAPL {}</title><text x="12" y="390">Strike 150</text><text x="520" y="20">IV 32%</text></svg>"#,
                    name
                );
                let chart = RenderedChart {
                    svg,
                    expiry: Some("2025-01-17".to_string()),
                    quality: None,
                };
                (name.to_string(), chart)
            })
            .collect();

        GeneratedContent {
            thread_parts: vec![
                "$AAPL options sweep: 100 contracts at the 150 strike expiring 2025-01-17.".to_string(),
                "Call skew is rich, consistent with traders seeking upside exposure.".to_string(),
            ],
            charts,
            skew_direction: Some(SkewDirection::Call),
            modeled_gamma: None,
        }
    }

    struct FakeMarketData {
        event: Option<MarketEvent>,
        chain: Option<OptionsChain>,
        chain_calls: AtomicU32,
    }

    impl FakeMarketData {
        fn new(event: Option<MarketEvent>, chain: Option<OptionsChain>) -> Self {
            Self {
                event,
                chain,
                chain_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl MarketDataSource for FakeMarketData {
        async fn fetch_event(&self, _symbol: &str, _post_type: EventType) -> Result<MarketEvent> {
            self.event.clone().ok_or_else(|| anyhow::anyhow!("quote feed unavailable"))
        }

        async fn fetch_options_chain(&self, _symbol: &str) -> Result<OptionsChain> {
            self.chain_calls.fetch_add(1, Ordering::SeqCst);
            self.chain.clone().ok_or_else(|| anyhow::anyhow!("chain feed unavailable"))
        }
    }

    struct FakeGenerator(GeneratedContent);

    #[async_trait]
    impl ContentGenerator for FakeGenerator {
        async fn generate(&self, _event: &MarketEvent, _chain: Option<&OptionsChain>) -> Result<GeneratedContent> {
            Ok(self.0.clone())
        }
    }

    struct Harness {
        _dir: TempDir,
        store: ArtifactStore,
        market_data: Arc<FakeMarketData>,
        orchestrator: GenerationOrchestrator,
    }

    fn harness(market_data: FakeMarketData, generated: GeneratedContent) -> Harness {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let market_data = Arc::new(market_data);
        let orchestrator = GenerationOrchestrator::new(
            store.clone(),
            market_data.clone(),
            Arc::new(FakeGenerator(generated)),
            Arc::new(ChainCache::new(Duration::from_secs(60))),
        );
        Harness {
            _dir: dir,
            store,
            market_data,
            orchestrator,
        }
    }

    fn request() -> GenerateRequest {
        GenerateRequest {
            symbol: "aapl".to_string(),
            run_id: None,
            post_type: EventType::OptionsSweep,
        }
    }

    #[tokio::test]
    async fn test_clean_run_is_publishable_and_persisted() {
        let h = harness(FakeMarketData::new(Some(event()), Some(chain())), content());

        let report = h.orchestrator.generate(request()).await.unwrap();
        assert!(report.is_publishable, "unexpected errors: {:?}", report.validation.errors());
        assert_eq!(report.symbol, "AAPL");
        assert!(report.report_path.exists());

        let run = h.store.load_run_artifacts(&report.run_id).await.unwrap();
        assert_eq!(run.generated_thread.len(), 2);
        assert_eq!(run.charts.len(), 5);
        assert!(run.charts.values().all(|c| c.validation.is_valid));
        assert_eq!(run.raw_payloads.len(), 2);
        assert_eq!(run.sources_used.get("event"), Some(&true));
        assert_eq!(
            run.provenance["thread"].derived_from.as_deref(),
            Some(&["event".to_string(), "options_chain".to_string()][..])
        );
        assert!(run.validation.unwrap().is_publishable());

        // Every captured payload still matches its recorded hash
        for snapshot in run.raw_payloads.values() {
            assert!(h.store.verify_snapshot(snapshot).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_chain_failure_blocks_but_persists() {
        let h = harness(FakeMarketData::new(Some(event()), None), content());

        let report = h.orchestrator.generate(request()).await.unwrap();
        assert!(!report.is_publishable);
        assert!(report.validation.has_error(codes::MISSING_OPTIONS_CHAIN));
        assert_eq!(report.sources_used.get("options_chain"), Some(&false));
        assert_eq!(report.missing_fields, vec!["OPTIONS_CHAIN".to_string()]);

        let run = h.store.load_run_artifacts(&report.run_id).await.unwrap();
        assert_eq!(run.raw_payloads.len(), 1);
        assert!(!run.generated_thread.is_empty());
    }

    #[tokio::test]
    async fn test_event_failure_skips_generation() {
        let h = harness(FakeMarketData::new(None, Some(chain())), content());

        let report = h.orchestrator.generate(request()).await.unwrap();
        assert!(report.validation.has_error(codes::MISSING_QUOTE));

        let run = h.store.load_run_artifacts(&report.run_id).await.unwrap();
        assert!(run.generated_thread.is_empty());
        assert!(run.charts.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_data_is_flagged() {
        let mut fallback_event = event();
        fallback_event.used_fallback = true;
        let h = harness(FakeMarketData::new(Some(fallback_event), Some(chain())), content());

        let report = h.orchestrator.generate(request()).await.unwrap();
        assert!(report.used_fallback);
        assert!(report.validation.has_error(codes::MOCK_DATA_USED));

        let mut generated = content();
        if let Some(chart) = generated.charts.get_mut("gamma_exposure") {
            chart.quality = Some(ChartQualityReport {
                used_fallback: true,
                ..Default::default()
            });
        }
        let h = harness(FakeMarketData::new(Some(event()), Some(chain())), generated);

        let report = h.orchestrator.generate(request()).await.unwrap();
        assert!(report.validation.has_error(codes::CHART_FALLBACK_DATA));
        assert!(report.validation.has_error(codes::MOCK_DATA_USED));
    }

    #[tokio::test]
    async fn test_chain_is_cached_across_runs() {
        let h = harness(FakeMarketData::new(Some(event()), Some(chain())), content());

        let first = h.orchestrator.generate(request()).await.unwrap();
        let second = h.orchestrator.generate(request()).await.unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(h.market_data.chain_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_explicit_run_id_is_not_reused() {
        let h = harness(FakeMarketData::new(Some(event()), Some(chain())), content());
        let mut req = request();
        req.run_id = Some("aapl-manual-1".to_string());

        let report = h.orchestrator.generate(req.clone()).await.unwrap();
        assert_eq!(report.run_id, "aapl-manual-1");
        assert!(h.orchestrator.generate(req).await.is_err());
    }

    #[tokio::test]
    async fn test_bad_smile_units_block() {
        let mut bad_chain = chain();
        bad_chain.smile[4].call_iv = Some(450.0);
        let h = harness(FakeMarketData::new(Some(event()), Some(bad_chain)), content());

        let report = h.orchestrator.generate(request()).await.unwrap();
        assert!(report.validation.has_error(codes::IV_UNIT_SCALE));

        let mut thin_chain = chain();
        thin_chain.smile.truncate(3);
        let h = harness(FakeMarketData::new(Some(event()), Some(thin_chain)), content());

        let report = h.orchestrator.generate(request()).await.unwrap();
        assert!(report.validation.has_error(codes::INSUFFICIENT_STRIKE_COVERAGE));
    }

    #[tokio::test]
    async fn test_empty_symbol_is_rejected() {
        let h = harness(FakeMarketData::new(Some(event()), Some(chain())), content());
        let mut req = request();
        req.symbol = "  ".to_string();
        assert!(h.orchestrator.generate(req).await.is_err());
    }
}
