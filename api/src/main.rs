use anyhow::{Context, Result};
use monitoring::{
    AlertNotifier, EmailChannel, LogChannel, MonitorConfig, NotificationChannel, NotifierConfig,
    PgFatalAlertStore, RuleEngine, ValidationMonitor,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn, Level};
use validation::{
    InMemoryReliabilityStore, PgReliabilityStore, ReliabilityStore, ValidationOrchestrator,
};

mod config;
mod routes;

use config::AppConfig;
use routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("🚀 Starting Veritas validation service");

    let app_config = AppConfig::from_env().unwrap_or_else(|e| {
        warn!("Falling back to default configuration: {}", e);
        AppConfig::default()
    });

    if !app_config.validation_enabled {
        warn!("Validation layer is DISABLED; requests pass through unvalidated");
    }

    // Persisted stores attach only when a database is configured.
    let db_pool = match &app_config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .context("Failed to connect to Postgres")?;
            Some(Arc::new(pool))
        }
        None => {
            info!("No DATABASE_URL; reliability and review stores run in-memory");
            None
        }
    };

    let reliability: Arc<dyn ReliabilityStore> = match &db_pool {
        Some(pool) => {
            let store = PgReliabilityStore::new(pool.clone());
            store.initialize().await?;
            Arc::new(store)
        }
        None => Arc::new(InMemoryReliabilityStore::new()),
    };

    let channel: Arc<dyn NotificationChannel> = match &app_config.email {
        Some(email) => Arc::new(EmailChannel::new(email).context("Invalid email configuration")?),
        None => {
            info!("No SMTP configuration; alerts go to the log only");
            Arc::new(LogChannel)
        }
    };

    let mut notifier = AlertNotifier::new(NotifierConfig::default(), channel);
    if let Some(pool) = &db_pool {
        let review = PgFatalAlertStore::new(pool.clone());
        review.initialize().await?;
        notifier = notifier.with_review_store(Arc::new(review));
    }

    let monitor = ValidationMonitor::new(MonitorConfig::default())?;
    let orchestrator = ValidationOrchestrator::new(app_config.validation.clone(), reliability)
        .with_alert_sink(notifier.spawn())
        .with_metrics_sink(monitor.sink());

    let state = Arc::new(AppState {
        orchestrator,
        monitor,
        rules: RuleEngine::new(Default::default()),
        notifier,
    });

    spawn_rule_evaluation(state.clone(), app_config.rule_interval_secs);

    let app = routes::router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&app_config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", app_config.listen_addr))?;
    info!("Listening on {}", app_config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("👋 Shutting down gracefully...");
        })
        .await
        .context("Server error")?;

    Ok(())
}

/// Periodically evaluate the operational rules and route breaches to the
/// notifier. Operational findings, not per-symbol alerts.
fn spawn_rule_evaluation(state: Arc<AppState>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        // The first tick fires immediately; skip it so an empty window
        // is not evaluated at startup.
        interval.tick().await;
        loop {
            interval.tick().await;
            let aggregated = state.monitor.aggregate(state.rules.window()).await;
            for finding in state.rules.evaluate(&aggregated) {
                state.notifier.notify_finding(&finding);
            }
        }
    });
}
