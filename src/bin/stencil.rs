//! stencil server executable

use anyhow::Result;
use std::process::ExitCode;
use std::sync::Arc;
use stencil::config::{DatabaseDialect, Settings};
use stencil::core::store::Store;
use stencil::server::AppBuilder;
use stencil::storage::InMemoryStore;
use stencil::tasks::{Scheduler, TaskRegistry, default_jobs};
use stencil::telemetry;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ExitCode {
    // Logging is not up yet, so these two go to stderr.
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("stencil: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = telemetry::init(&settings.log) {
        eprintln!("stencil: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "stencil stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn open_store(settings: &Settings) -> Result<Arc<dyn Store>> {
    match settings.database.dialect {
        DatabaseDialect::Memory => Ok(Arc::new(InMemoryStore::new())),

        #[cfg(feature = "postgres")]
        DatabaseDialect::Postgres => {
            let store = stencil::storage::PostgresStore::connect(
                &settings.database.url(),
                settings.database.max_connections,
            )
            .await?;
            store.migrate().await?;
            tracing::info!(host = %settings.database.host, db = %settings.database.name, "database ready");
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "postgres"))]
        DatabaseDialect::Postgres => Err(stencil::core::ConfigError::InvalidValue {
            field: "DATABASE_DIALECT".into(),
            value: "postgres".into(),
            message: "this build lacks the 'postgres' feature".into(),
        }
        .into()),
    }
}

async fn run(settings: Settings) -> Result<()> {
    tracing::info!(environment = ?settings.environment, "starting stencil");

    let store = open_store(&settings).await?;
    let tasks = Arc::new(TaskRegistry::with_builtin());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let jobs = if settings.scheduler.enabled {
        Scheduler::new(Arc::clone(&tasks))
            .jobs(default_jobs())
            .start(shutdown_rx)
    } else {
        Vec::new()
    };

    let addr = settings.server.bind_addr();
    let served = AppBuilder::new()
        .with_settings(settings)
        .with_shared_store(store)
        .with_tasks(tasks)
        .serve(&addr)
        .await;

    if shutdown_tx.send(true).is_err() {
        tracing::debug!("scheduler already stopped");
    }
    futures::future::join_all(jobs).await;
    served
}
