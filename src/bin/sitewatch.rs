use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use sitewatch::{
    Config, Scheduler,
    dispatch::{AlertDispatcher, TelegramSink},
    probe::ProbeExecutor,
    monitors::status::Thresholds,
    scheduler::EngineContext,
    storage::{SqliteStore, Storage, TargetInsert},
};
use tracing::{debug, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(about = "HTTP target monitoring engine")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Monitor all active targets until interrupted
    Run,

    /// Register a new target
    Add {
        name: String,
        url: String,

        /// Check interval in seconds (defaults to DEFAULT_INTERVAL)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// List all targets
    List,

    /// Stop scheduling a target (history is kept)
    Disable {
        id: i64,
    },

    /// Uptime percentage over a recent window
    Uptime {
        id: i64,

        /// Window size in hours
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![("sitewatch", LevelFilter::DEBUG)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init();

    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = Config::from_env();
    let storage = SqliteStore::new(&config.database_url).await?;

    match args.command {
        Command::Run => return run(config, storage).await,
        Command::Add {
            name,
            url,
            interval,
        } => {
            let interval = interval.unwrap_or(config.default_interval_secs);
            match storage.add_target(&name, &url, interval).await? {
                TargetInsert::Created(target) => {
                    println!("added target {} ({}) id {}", target.name, target.url, target.id);
                }
                TargetInsert::Duplicate => {
                    println!("{url} is already tracked, nothing added");
                }
            }
        }
        Command::List => {
            for target in storage.list_targets(false).await? {
                let status = match (target.active, target.state.is_up) {
                    (false, _) => "disabled",
                    (true, true) => "up",
                    (true, false) => "down",
                };
                println!(
                    "{:>4}  {:<24} {:<40} every {}s  [{}]",
                    target.id, target.name, target.url, target.check_interval_secs, status
                );
            }
        }
        Command::Disable { id } => {
            if storage.set_target_active(id, false).await? {
                println!("target {id} disabled");
            } else {
                println!("no target with id {id}");
            }
        }
        Command::Uptime { id, hours } => {
            let since = Utc::now() - Duration::hours(hours);
            let stats = storage.uptime_since(id, since).await?;
            println!(
                "target {id}: {:.2}% uptime over the last {hours}h ({}/{} checks up)",
                stats.uptime_percent, stats.up_checks, stats.total_checks
            );
        }
    }

    storage.close().await?;

    Ok(())
}

async fn run(config: Config, storage: SqliteStore) -> Result<()> {
    let sink = match (&config.notify_token, &config.notify_channel) {
        (Some(token), Some(channel)) => {
            debug!("notification sink configured");
            Some(Arc::new(TelegramSink::new(token, channel)) as Arc<dyn sitewatch::dispatch::NotificationSink>)
        }
        _ => {
            info!("no notification sink configured, alerts will be logged locally");
            None
        }
    };

    let storage = Arc::new(storage);
    let ctx = EngineContext {
        probe: ProbeExecutor::new(config.request_timeout(), &config.user_agent)?,
        storage: storage.clone(),
        dispatcher: Arc::new(AlertDispatcher::new(sink)),
        thresholds: Thresholds {
            failure_limit: config.failure_threshold,
            slow_response_secs: config.max_response_time,
        },
    };

    let targets = storage.list_targets(true).await?;
    info!("monitoring {} active targets", targets.len());

    let mut scheduler = Scheduler::new(ctx);
    for target in targets {
        scheduler.add_target(target).await;
    }

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");

    scheduler.shutdown().await;
    storage.close().await?;

    Ok(())
}
