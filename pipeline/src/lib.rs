//! Generation pipeline and `threadgate` CLI support
//!
//! Wires the market-data and content collaborators, the options-chain cache,
//! the artifact store and the validation gate into one run.

pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod sources;

pub use cache::TtlCache;
pub use config::{load_config, AppConfig, PublishConfig};
pub use orchestrator::{ChainCache, GenerateRequest, GenerationOrchestrator, GenerationReport};
pub use sources::{
    ContentGenerator, FileContentGenerator, FileMarketData, GeneratedContent, Inbox, MarketDataSource, MarketEvent,
    OptionsChain, RenderedChart,
};
