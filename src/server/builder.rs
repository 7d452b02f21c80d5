//! AppBuilder for fluent API to build the HTTP server

use super::context::AppContext;
use super::router::build_router;
use crate::auth::{InMemoryBlocklist, TokenBlocklist};
use crate::config::Settings;
use crate::core::store::Store;
use crate::storage::InMemoryStore;
use crate::tasks::TaskRegistry;
use anyhow::{Result, anyhow};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder wiring settings, storage and credentials into a router
///
/// Storage defaults to [`InMemoryStore`], the blocklist to
/// [`InMemoryBlocklist`] and tasks to the built-in registry.
///
/// # Example
///
/// ```ignore
/// AppBuilder::new()
///     .with_settings(Settings::load()?)
///     .with_store(PostgresStore::connect(&url, 10).await?)
///     .serve("0.0.0.0:5000")
///     .await?;
/// ```
#[derive(Default)]
pub struct AppBuilder {
    settings: Option<Settings>,
    store: Option<Arc<dyn Store>>,
    blocklist: Option<Arc<dyn TokenBlocklist>>,
    tasks: Option<Arc<TaskRegistry>>,
    custom_routes: Vec<Router>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the settings (required)
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_store(mut self, store: impl Store + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn with_shared_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_blocklist(mut self, blocklist: impl TokenBlocklist + 'static) -> Self {
        self.blocklist = Some(Arc::new(blocklist));
        self
    }

    /// Share a task registry, typically with the scheduler
    pub fn with_tasks(mut self, tasks: Arc<TaskRegistry>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    /// Add routes next to the built-in ones
    ///
    /// ```ignore
    /// let extra = Router::new().route("/ping", get(|| async { "pong" }));
    /// AppBuilder::new().with_settings(settings).with_custom_routes(extra).build()?;
    /// ```
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the context handlers run against
    pub fn build_context(&mut self) -> Result<AppContext> {
        let settings = self
            .settings
            .take()
            .ok_or_else(|| anyhow!("Settings are required. Call .with_settings()"))?;
        settings.ensure_valid()?;

        let store = self
            .store
            .take()
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let blocklist = self
            .blocklist
            .take()
            .unwrap_or_else(|| Arc::new(InMemoryBlocklist::new()));
        let tasks = self
            .tasks
            .take()
            .unwrap_or_else(|| Arc::new(TaskRegistry::with_builtin()));

        Ok(AppContext::new(settings, store, blocklist, tasks)?)
    }

    /// Build the final router
    pub fn build(mut self) -> Result<Router> {
        let ctx = self.build_context()?;
        tracing::debug!(?ctx, "application context ready");
        Ok(build_router(ctx, std::mem::take(&mut self.custom_routes)))
    }

    /// Serve the application until Ctrl+C or SIGTERM
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
