//! Sentinel CLI.
//!
//! One invocation runs one flow: `sentinel sensor` for a change-detection
//! cycle, `sentinel starter` for a configuration review and demonstration
//! query. Scheduling is the external orchestrator's job.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentinel_core::{FlowConfig, FlowQuery};
use sentinel_flows::{
    CycleOutcome, HttpRunHistory, LogEventSink, MemoryRunHistory, NatsEventSink, SensorFlow,
    StarterFlow,
};

#[derive(Parser)]
#[command(name = "sentinel", about = "Polling sensors that turn data changes into events")]
struct Cli {
    /// Path to the flow configuration file.
    #[arg(long, global = true, default_value = "sentinel.toml", env = "SENTINEL_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sensor cycle.
    Sensor {
        /// Ignore the previous value and decide trigger regardless.
        #[arg(long)]
        force_trigger: bool,

        /// Use in-memory history and log events instead of publishing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Review the configuration and run the query once.
    Starter,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sentinel_flows=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = FlowConfig::load(&cli.config)?;
    tracing::info!(
        project = %config.project_name,
        storage_type = %config.data.storage_type,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Sensor {
            force_trigger,
            dry_run,
        } => {
            let outcome = run_sensor(config, force_trigger, dry_run).await?;
            if outcome == CycleOutcome::SkipTrigger {
                tracing::info!(
                    "Not an error - failing this run on purpose to avoid triggering flows downstream"
                );
                std::process::exit(outcome.exit_code());
            }
        }
        Commands::Starter => {
            let source = FlowQuery::new(config.clone());
            StarterFlow::new(config, Box::new(source)).run().await?;
        }
    }

    Ok(())
}

async fn run_sensor(config: FlowConfig, force: bool, dry_run: bool) -> Result<CycleOutcome> {
    let source = Box::new(FlowQuery::new(config.clone()));

    let flow = if dry_run {
        SensorFlow::new(
            config,
            source,
            Box::new(MemoryRunHistory::new()),
            Box::new(LogEventSink),
        )
    } else {
        let history = Box::new(HttpRunHistory::new(&config.runtime.server_url));
        // Only connect to the event bus when an event will be published
        let events: Box<dyn sentinel_flows::EventSink> = match config.event_name() {
            Some(_) => Box::new(NatsEventSink::connect(&config.runtime.nats_url).await?),
            None => Box::new(LogEventSink),
        };
        SensorFlow::new(config, source, history, events)
    };

    let outcome = flow.run(force).await?;
    Ok(outcome)
}
