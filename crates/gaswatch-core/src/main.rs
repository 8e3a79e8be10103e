//! GasWatch CLI
//!
//! Command-line interface for the GasWatch alert engine.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gaswatch::alerting::{
    AlertScheduler, CooldownGate, CycleOutcome, EligibilityFilter, NotificationDispatcher,
    StatsAggregator,
};
use gaswatch::api::{AppState, HttpServer};
use gaswatch::db::{
    AlertRecordStore, MemoryAlertRecordStore, MemoryRecipientStore, PgAlertRecordStore,
    PgRecipientStore, PostgresPool, RecipientStore,
};
use gaswatch::models::PriceQuote;
use gaswatch::notify::{CommandHandler, NotificationSink, TelegramPoller, TelegramSink};
use gaswatch::oracle::{EtherscanClient, PriceOracle};
use gaswatch::ratelimit::IngressRateLimiter;
use gaswatch::registration::RegistrationService;
use gaswatch::Config;
use tracing::{info, warn};

/// GasWatch - Gas price alerts over Telegram
#[derive(Parser)]
#[command(name = "gaswatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "GASWATCH_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API, the alert scheduler and the Telegram bot
    Serve {
        /// HTTP API port (overrides server.http_port)
        #[arg(long, env = "GASWATCH_HTTP_PORT")]
        http_port: Option<u16>,

        /// Keep recipients and alerts in memory instead of PostgreSQL
        #[arg(long)]
        in_memory: bool,
    },

    /// Run a single alert cycle and exit
    Check,

    /// Fetch and print the current gas price
    Price,

    /// Print alert statistics for the last 24 hours
    Stats,

    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Serve {
            http_port,
            in_memory,
        } => run_serve(config, http_port, in_memory).await,
        Commands::Check => run_check(config, cli.format).await,
        Commands::Price => run_price(config, cli.format).await,
        Commands::Stats => run_stats(config, cli.format).await,
        Commands::Db { command } => run_db(config, command).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

struct Stores {
    recipients: Arc<dyn RecipientStore>,
    records: Arc<dyn AlertRecordStore>,
}

async fn open_stores(config: &Config, in_memory: bool) -> anyhow::Result<Stores> {
    if in_memory {
        warn!("Using in-memory storage; data is lost on exit");
        return Ok(Stores {
            recipients: Arc::new(MemoryRecipientStore::new()),
            records: Arc::new(MemoryAlertRecordStore::new()),
        });
    }

    let pool = PostgresPool::new(&config.database)
        .await
        .context("failed to connect to PostgreSQL")?;
    pool.migrate().await.context("failed to run migrations")?;

    Ok(Stores {
        recipients: Arc::new(PgRecipientStore::new(&pool)),
        records: Arc::new(PgAlertRecordStore::new(&pool)),
    })
}

fn build_scheduler(
    config: &Config,
    stores: &Stores,
    oracle: Arc<dyn PriceOracle>,
    sink: Arc<dyn NotificationSink>,
) -> AlertScheduler {
    AlertScheduler::new(
        oracle,
        EligibilityFilter::new(stores.recipients.clone()),
        CooldownGate::new(config.alerting.notification_cooldown),
        NotificationDispatcher::new(sink, stores.recipients.clone(), stores.records.clone()),
        config.alerting.check_interval,
    )
}

fn install_metrics_exporter(config: &Config) -> anyhow::Result<()> {
    let Some(port) = config.server.metrics_port else {
        return Ok(());
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, port)
        .parse()
        .context("invalid metrics listen address")?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus exporter")?;

    info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}

async fn run_serve(config: Config, http_port: Option<u16>, in_memory: bool) -> anyhow::Result<()> {
    install_metrics_exporter(&config)?;

    let stores = open_stores(&config, in_memory).await?;
    let oracle: Arc<dyn PriceOracle> = Arc::new(EtherscanClient::new(&config.oracle)?);
    let sink: Arc<dyn NotificationSink> = Arc::new(TelegramSink::new(&config.telegram)?);

    if config.oracle.api_key.is_empty() {
        warn!("oracle.api_key is not set; Etherscan may reject requests");
    }

    // Alert cycles
    let scheduler = Arc::new(build_scheduler(&config, &stores, oracle.clone(), sink.clone()));
    tokio::spawn(scheduler.start());

    // Bot commands
    if config.telegram.bot_token.is_empty() {
        warn!("telegram.bot_token is not set; bot commands are disabled and alerts will fail");
    } else {
        let handler = Arc::new(CommandHandler::new(stores.recipients.clone(), sink));
        let poller = TelegramPoller::new(&config.telegram, handler)?;
        tokio::spawn(async move { poller.run().await });
    }

    // HTTP API
    let state = AppState {
        registration: RegistrationService::new(
            stores.recipients.clone(),
            config.telegram.bot_username.clone(),
        ),
        limiter: Arc::new(IngressRateLimiter::from_config(&config.rate_limit)),
        oracle,
        stats: StatsAggregator::new(stores.recipients.clone(), stores.records.clone()),
    };
    let addr = format!(
        "{}:{}",
        config.server.host,
        http_port.unwrap_or(config.server.http_port)
    );

    info!("Starting GasWatch on {}", addr);

    tokio::select! {
        result = HttpServer::new(state).serve(&addr) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}

async fn run_check(config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let stores = open_stores(&config, false).await?;
    let oracle = Arc::new(EtherscanClient::new(&config.oracle)?);
    let sink = Arc::new(TelegramSink::new(&config.telegram)?);

    let scheduler = build_scheduler(&config, &stores, oracle, sink);
    let outcome = scheduler.run_cycle().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => match outcome {
            CycleOutcome::Completed(report) => {
                println!("Gas price:    {} Gwei", report.price);
                println!("Eligible:     {}", report.eligible);
                println!("Cooling down: {}", report.cooling_down);
                println!("Delivered:    {}", report.delivered);
                println!("Failed:       {}", report.failed);
                println!("Skipped:      {}", report.skipped);
                println!("Errors:       {}", report.errors);
            }
            CycleOutcome::NoPrice => println!("No gas price available; nothing was sent"),
            CycleOutcome::Overlapped => println!("Another cycle is running"),
        },
    }
    Ok(())
}

async fn run_price(config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let oracle = EtherscanClient::new(&config.oracle)?;

    let price = oracle
        .fetch_current_price()
        .await
        .context("gas price is unavailable")?;
    let quote = PriceQuote::new(price, chrono::Utc::now());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&quote)?),
        OutputFormat::Text => println!("{} {}", quote.gas_price, quote.unit),
    }
    Ok(())
}

async fn run_stats(config: Config, format: OutputFormat) -> anyhow::Result<()> {
    let stores = open_stores(&config, false).await?;
    let stats = StatsAggregator::new(stores.recipients, stores.records)
        .current_stats()
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("Active users:          {}", stats.active_users);
            println!("Alerts (24h):          {}", stats.total_alerts_24h);
            println!("Successful alerts (24h): {}", stats.successful_alerts_24h);
        }
    }
    Ok(())
}

async fn run_db(config: Config, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Migrate => {
            let pool = PostgresPool::new(&config.database)
                .await
                .context("failed to connect to PostgreSQL")?;
            pool.migrate().await?;
            println!("Migrations applied");
        }
    }
    Ok(())
}
