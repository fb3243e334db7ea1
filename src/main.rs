use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentinel::config::Config;
use sentinel::services::notifier::{self, poll_commands};
use sentinel::services::{open_recorder, shutdown, Collector, FundManager, Scheduler};
use sentinel::sources::build_fetcher;
use sentinel::types::TriggerType;
use sentinel::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentinel=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().context("invalid configuration")?;
    config.validate().context("invalid configuration")?;
    let config = Arc::new(config);
    info!(
        "Starting Sentinel for {} via {} on {}",
        config.symbol,
        config.data_source,
        config.bind_addr()
    );

    let fund = Arc::new(
        FundManager::open(&config.fund_state_file, config.monthly_budget)
            .with_context(|| format!("failed to open fund state {}", config.fund_state_file.display()))?,
    );
    let recorder = open_recorder(config.sqlite_path.as_deref());
    let fetcher = build_fetcher(&config).context("failed to build data source")?;
    let (notifier, telegram) =
        notifier::build_notifier(&config).context("failed to build notifier")?;

    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    let scheduler = Arc::new(
        Scheduler::new(
            Collector::new(fetcher, config.symbol.clone()),
            fund.clone(),
            notifier,
            recorder.clone(),
            shutdown_rx.clone(),
        )
        .with_schedule(config.schedule.clone())
        .with_notify_retries(config.notify_max_retries),
    );

    let mut tasks = scheduler.spawn().context("invalid schedule")?;
    info!("Started {} scheduled tasks", tasks.len());

    if let Some(telegram) = telegram {
        tasks.push(tokio::spawn(poll_commands(
            telegram,
            scheduler.clone(),
            shutdown_rx.clone(),
        )));
    }

    if config.run_on_start {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            info!("RUN_ON_START set, running weekly evaluation now");
            if let Err(e) = scheduler.run_weekly(TriggerType::Manual).await {
                warn!("Startup evaluation failed: {}", e);
            }
        });
    }

    let state = AppState {
        config: config.clone(),
        fund,
        recorder,
        scheduler,
    };

    // Start the server
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!("Sentinel listening on {}", config.bind_addr());

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    for task in tasks {
        if let Err(e) = task.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }

    info!("Sentinel stopped");
    Ok(())
}
