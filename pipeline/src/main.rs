use anyhow::{Context, Result};
use artifact_store::ArtifactStore;
use clap::{Args, Parser, Subcommand};
use common::{EventType, PublishStatus};
use pipeline::{
    load_config, AppConfig, ChainCache, FileContentGenerator, FileMarketData, GenerateRequest, GenerationOrchestrator,
    Inbox,
};
use publisher::{OAuthCredentials, PublishRequest, Publisher, ReqwestTransport, TwitterClient};
use quality_gate::ValidationGate;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::fmt;

#[derive(Parser, Debug)]
#[command(name = "threadgate", about = "Quality-gated generation and publishing of trading threads")]
struct Cli {
    /// TOML configuration file (defaults to ./threadgate.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, generate, gate and persist one run
    Generate(GenerateArgs),
    /// Publish a persisted run as a thread
    Publish(PublishArgs),
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(long)]
    symbol: String,

    /// Explicit run id; generated when omitted
    #[arg(long = "runId", alias = "run-id")]
    run_id: Option<String>,

    /// options_sweep or dark_pool
    #[arg(long = "postType", alias = "post-type")]
    post_type: EventType,
}

#[derive(Args, Debug)]
struct PublishArgs {
    #[arg(long = "runId", alias = "run-id")]
    run_id: String,

    /// Record the payload without posting
    #[arg(long = "dryRun", alias = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    fmt().with_max_level(level).init();

    let config = load_config(cli.config.as_deref())?;
    debug!(runs_dir = %config.runs_dir.display(), inbox_dir = %config.inbox_dir.display(), "Configuration loaded");

    match cli.command {
        Command::Generate(args) => generate(&config, args).await,
        Command::Publish(args) => publish(&config, args).await,
        Command::ShowConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn generate(config: &AppConfig, args: GenerateArgs) -> Result<()> {
    let store = ArtifactStore::new(&config.runs_dir);
    let inbox = Inbox::new(&config.inbox_dir);

    let orchestrator = GenerationOrchestrator::new(
        store,
        Arc::new(FileMarketData::new(inbox.clone())),
        Arc::new(FileContentGenerator::new(inbox)),
        Arc::new(ChainCache::new(config.cache_ttl())),
    )
    .with_gate(ValidationGate::default().with_config(config.gate.clone()));

    let report = orchestrator
        .generate(GenerateRequest {
            symbol: args.symbol,
            run_id: args.run_id,
            post_type: args.post_type,
        })
        .await?;

    println!("runId: {}", report.run_id);
    println!("publishable: {}", report.is_publishable);
    println!("report: {}", report.report_path.display());
    for error in report.validation.errors() {
        println!("  [{}] {}", error.code, error.message);
    }
    for warning in report.validation.warnings() {
        println!("  (warning) [{}] {}", warning.code, warning.message);
    }

    Ok(())
}

async fn publish(config: &AppConfig, args: PublishArgs) -> Result<()> {
    let store = ArtifactStore::new(&config.runs_dir);
    let publish_path = store.run_paths(&args.run_id)?.publish;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling publish");
            on_signal.cancel();
        }
    });

    let mut publisher = Publisher::new(store).with_cancellation(cancel);

    if !args.dry_run {
        // Blocked runs are still reported without credentials
        match OAuthCredentials::from_env() {
            Ok(credentials) => {
                let transport = ReqwestTransport::new(config.publish.request_timeout())
                    .context("Failed to build HTTP client")?;
                let client = TwitterClient::new(Arc::new(transport), credentials)
                    .with_endpoint(config.publish.endpoint.clone())
                    .with_retry_policy(config.publish.retry_policy());
                publisher = publisher.with_poster(Arc::new(client));
            }
            Err(e) => warn!(error = %e, "Platform credentials unavailable"),
        }
    }

    let result = publisher
        .publish_thread(PublishRequest {
            run_id: args.run_id,
            dry_run: args.dry_run,
        })
        .await?;

    println!("runId: {}", result.run_id);
    println!("publishable: {}", result.is_publishable);
    match result.status {
        PublishStatus::Blocked => {
            for error in &result.errors {
                println!("  [{}] {}", error.code, error.message);
            }
        }
        PublishStatus::DryRun => println!("payload: {}", publish_path.display()),
        PublishStatus::Published | PublishStatus::Failed => {
            println!("posted: {}", result.posted_ids.join(", "));
        }
    }

    Ok(())
}
