// Upstream collaborators
// Market data and content generation sit behind traits; the file-backed
// implementations read a per-symbol inbox so the CLI runs end to end.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use common::{EventMetrics, EventType, GammaSign, SkewDirection};
use quality_gate::{ChartQualityReport, SmileInput};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const EVENT_FILE: &str = "event.json";
pub const OPTIONS_CHAIN_FILE: &str = "options_chain.json";
pub const CONTENT_FILE: &str = "content.json";

/// A detected event plus the quote it was detected against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketEvent {
    pub symbol: String,
    pub event_type: EventType,
    pub metrics: EventMetrics,
    #[serde(default)]
    pub spot: Option<f64>,
    /// Set when the source served mock or cached-fallback data
    #[serde(default)]
    pub used_fallback: bool,
}

/// Options chain aggregate for one expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsChain {
    pub symbol: String,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub strikes: Vec<f64>,
    /// Parallel to `strikes`
    #[serde(default)]
    pub open_interest: Vec<f64>,
    #[serde(default)]
    pub smile: Vec<SmileInput>,
    #[serde(default)]
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedChart {
    pub svg: String,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub quality: Option<ChartQualityReport>,
}

/// Thread copy and charts produced for one event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    #[serde(default)]
    pub thread_parts: Vec<String>,
    #[serde(default)]
    pub charts: BTreeMap<String, RenderedChart>,
    #[serde(default)]
    pub skew_direction: Option<SkewDirection>,
    #[serde(default)]
    pub modeled_gamma: Option<GammaSign>,
}

/// Trait for market data backends
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Latest event of `post_type` for `symbol`
    async fn fetch_event(&self, symbol: &str, post_type: EventType) -> Result<MarketEvent>;

    async fn fetch_options_chain(&self, symbol: &str) -> Result<OptionsChain>;
}

/// Trait for thread and chart generators
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, event: &MarketEvent, chain: Option<&OptionsChain>) -> Result<GeneratedContent>;
}

/// Directory of `<SYMBOL>/{event,options_chain,content}.json`
#[derive(Debug, Clone)]
pub struct Inbox {
    root: PathBuf,
}

impl Inbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, symbol: &str, file: &str) -> Result<PathBuf> {
        let valid = !symbol.is_empty()
            && symbol
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
            && !symbol.starts_with('.');
        if !valid {
            bail!("Invalid symbol for inbox lookup: {:?}", symbol);
        }
        Ok(self.root.join(symbol.to_ascii_uppercase()).join(file))
    }

    async fn read<T: DeserializeOwned>(&self, symbol: &str, file: &str) -> Result<T> {
        let path = self.path_for(symbol, file)?;
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        debug!(path = %path.display(), bytes = raw.len(), "Read inbox file");
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Market data read from the inbox
#[derive(Debug, Clone)]
pub struct FileMarketData {
    inbox: Inbox,
}

impl FileMarketData {
    pub fn new(inbox: Inbox) -> Self {
        Self { inbox }
    }
}

#[async_trait]
impl MarketDataSource for FileMarketData {
    async fn fetch_event(&self, symbol: &str, post_type: EventType) -> Result<MarketEvent> {
        let event: MarketEvent = self.inbox.read(symbol, EVENT_FILE).await?;
        if event.event_type != post_type {
            bail!(
                "{} for {} describes a {} event, requested {}",
                EVENT_FILE,
                symbol,
                event.event_type,
                post_type
            );
        }
        if !event.symbol.eq_ignore_ascii_case(symbol) {
            bail!("{} for {} is about {}", EVENT_FILE, symbol, event.symbol);
        }
        Ok(event)
    }

    async fn fetch_options_chain(&self, symbol: &str) -> Result<OptionsChain> {
        self.inbox.read(symbol, OPTIONS_CHAIN_FILE).await
    }
}

/// Pre-rendered content read from the inbox
#[derive(Debug, Clone)]
pub struct FileContentGenerator {
    inbox: Inbox,
}

impl FileContentGenerator {
    pub fn new(inbox: Inbox) -> Self {
        Self { inbox }
    }
}

#[async_trait]
impl ContentGenerator for FileContentGenerator {
    async fn generate(&self, event: &MarketEvent, _chain: Option<&OptionsChain>) -> Result<GeneratedContent> {
        self.inbox.read(&event.symbol, CONTENT_FILE).await
    }
}
