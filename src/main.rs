use candela::application::liquidation::liquidate_all;
use candela::application::services::market_gateway::RateLimitedGateway;
use candela::application::tasks::{
    crossover, discovery, manual_watch, monitor, reconciliation, replenish, spike,
};
use candela::application::TradingDeps;
use candela::config::{SharedConfig, TradingConfig};
use candela::control::controls;
use candela::domain::repositories::Notifier;
use candela::domain::services::registry::{EntryThrottle, ExclusionList, SymbolRegistry};
use candela::infrastructure::binance::BinanceClient;
use candela::infrastructure::telegram::{LogNotifier, TelegramNotifier};
use candela::persistence::{init_database, sale_ledger::SqliteSaleLedger};
use candela::supervisor::spawn_loop;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "candela=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = TradingConfig::from_env();
    if cfg.dry_run {
        info!("dry-run mode: orders are simulated");
    } else if cfg.api_key.is_empty() || cfg.api_secret.is_empty() {
        warn!("live trading requested but API credentials are missing");
    }
    let config = SharedConfig::new(cfg.clone());

    let pool = init_database(&cfg.database_url).await?;
    let ledger = Arc::new(SqliteSaleLedger::new(pool));

    let exchange = Arc::new(BinanceClient::new(
        &cfg.rest_base,
        &cfg.api_key,
        &cfg.api_secret,
        cfg.dry_run,
    ));
    let gateway = Arc::new(RateLimitedGateway::new(
        exchange,
        cfg.call_permits,
        cfg.universe_ttl,
        cfg.klines_ttl,
    ));

    let notifier: Arc<dyn Notifier> = match (&cfg.telegram_token, &cfg.telegram_chat_id) {
        (Some(token), Some(chat_id)) => Arc::new(TelegramNotifier::new(token, chat_id)),
        _ => {
            info!("telegram not configured, notifications go to the log");
            Arc::new(LogNotifier)
        }
    };

    let (handle, ctrl) = controls();
    let (replenish_tx, replenish_rx) = tokio::sync::mpsc::unbounded_channel();

    let deps = TradingDeps {
        gateway,
        registry: Arc::new(SymbolRegistry::new()),
        exclusions: Arc::new(ExclusionList::new()),
        entry_throttle: Arc::new(EntryThrottle::new()),
        notifier,
        ledger,
        config,
        replenish: replenish_tx,
    };

    if let Err(e) = deps.notifier.send("🕯️ candela started").await {
        warn!(error = %e, "startup notification dropped");
    }

    let mut tasks = Vec::new();

    {
        let d = deps.clone();
        tasks.push(spawn_loop(
            "breakout",
            cfg.breakout_scan_every,
            Duration::ZERO,
            ctrl.clone(),
            move || {
                let d = d.clone();
                async move { discovery::breakout_pass(&d).await }
            },
        ));
    }
    {
        let d = deps.clone();
        tasks.push(spawn_loop(
            "pre-cross",
            cfg.pre_cross_scan_every,
            Duration::ZERO,
            ctrl.clone(),
            move || {
                let d = d.clone();
                async move { crossover::pre_cross_pass(&d).await }
            },
        ));
    }
    {
        let d = deps.clone();
        tasks.push(spawn_loop(
            "cross-confirm",
            cfg.confirm_scan_every,
            Duration::ZERO,
            ctrl.clone(),
            move || {
                let d = d.clone();
                async move { crossover::confirm_pass(&d).await }
            },
        ));
    }
    {
        let d = deps.clone();
        let recent_triggers = Arc::new(ExclusionList::new());
        tasks.push(spawn_loop(
            "buy-spike",
            cfg.spike_scan_every,
            Duration::ZERO,
            ctrl.clone(),
            move || {
                let d = d.clone();
                let triggers = recent_triggers.clone();
                async move { spike::spike_pass(&d, &triggers).await }
            },
        ));
    }
    {
        let d = deps.clone();
        tasks.push(spawn_loop(
            "monitor",
            cfg.monitor_every,
            Duration::ZERO,
            ctrl.clone(),
            move || {
                let d = d.clone();
                async move { monitor::monitor_pass(&d).await }
            },
        ));
    }
    {
        // Delayed so discovery and monitor warm the caches first.
        let d = deps.clone();
        tasks.push(spawn_loop(
            "reconcile",
            cfg.reconcile_every,
            cfg.reconcile_start_delay,
            ctrl.clone(),
            move || {
                let d = d.clone();
                async move { reconciliation::reconcile_pass(&d).await }
            },
        ));
    }
    {
        let d = deps.clone();
        tasks.push(spawn_loop(
            "heartbeat",
            cfg.heartbeat_every,
            cfg.heartbeat_every,
            ctrl.clone(),
            move || {
                let d = d.clone();
                async move { reconciliation::heartbeat_pass(&d).await }
            },
        ));
    }
    {
        let d = deps.clone();
        let state = Arc::new(manual_watch::ManualWatchState::default());
        tasks.push(spawn_loop(
            "manual-watch",
            cfg.manual_watch_every,
            Duration::ZERO,
            ctrl.clone(),
            move || {
                let d = d.clone();
                let state = state.clone();
                async move { manual_watch::manual_watch_pass(&d, &state).await }
            },
        ));
    }
    tasks.push(replenish::spawn(deps.clone(), replenish_rx, ctrl.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, finishing current passes");
    handle.shutdown();
    for task in tasks {
        let _ = task.await;
    }

    liquidate_all(&deps).await;
    if let Err(e) = deps.notifier.send("🕯️ candela stopped").await {
        warn!(error = %e, "shutdown notification dropped");
    }
    info!("shutdown complete");
    Ok(())
}
