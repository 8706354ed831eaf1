use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use bizbooks_api::app::{build_app, services::seed_demo_data, AppServices};
use bizbooks_api::config::AppConfig;
use bizbooks_infra::{repair, ActivityLogger, InMemoryStore, LedgerContext, PostgresStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bizbooks_observability::init();

    let config = AppConfig::from_env().context("reading configuration")?;

    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresStore::connect(&url, config.max_connections).await?;
            serve(Arc::new(store), config).await
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory store");
            serve(Arc::new(InMemoryStore::new()), config).await
        }
    }
}

async fn serve<S: Store>(store: Arc<S>, config: AppConfig) -> anyhow::Result<()> {
    let (activity, writer) = ActivityLogger::spawn(store.clone(), config.activity);
    let ctx = LedgerContext::new(store, config.ledger.clone()).with_activity(activity.clone());
    let services = Arc::new(AppServices::new(ctx));

    if config.seed_demo_data {
        seed_demo_data(&services).await.context("seeding demo data")?;
    }
    if config.repair_on_startup {
        let report = repair(&services.ctx).await.context("startup repair")?;
        info!(
            clean = report.is_clean(),
            writes = report.total_writes(),
            "startup repair finished"
        );
    }

    let app = build_app(services);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "could not listen for shutdown signal");
            }
        })
        .await
        .context("serving http")?;

    activity.flush().await;
    drop(activity);
    if let Some(writer) = writer {
        let _ = writer.await;
    }
    info!("shut down");
    Ok(())
}
