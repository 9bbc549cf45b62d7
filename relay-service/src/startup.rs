//! Application startup and lifecycle management.
//!
//! Clients for the object store and the inference API are built once here and
//! handed to every handler through [`AppState`].

use crate::config::RelayConfig;
use crate::handlers;
use crate::services::{DashScopeProvider, LocalFiles, ObjectStorage, Storage, VideoProvider};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Headroom for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: RelayConfig,
    pub storage: Arc<dyn Storage>,
    pub provider: Arc<dyn VideoProvider>,
    pub local_files: LocalFiles,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with OSS storage and the DashScope provider.
    pub async fn build(config: RelayConfig) -> Result<Self, AppError> {
        let storage = ObjectStorage::oss(&config.object_store).map_err(|e| {
            tracing::error!("Failed to initialize object storage: {}", e);
            AppError::ConfigError(anyhow::Error::new(e))
        })?;
        tracing::info!(
            bucket = %storage.bucket(),
            endpoint = %config.object_store.endpoint,
            "Initialized object storage"
        );

        let provider = DashScopeProvider::new(config.inference.clone()).map_err(|e| {
            tracing::error!("Failed to initialize inference provider: {}", e);
            AppError::ConfigError(anyhow::Error::new(e))
        })?;
        tracing::info!(
            model = %config.inference.model,
            timeout_secs = config.inference.timeout_secs,
            "Initialized DashScope provider"
        );

        Self::build_with(config, Arc::new(storage), Arc::new(provider)).await
    }

    /// Build the application around already constructed collaborators.
    pub async fn build_with(
        config: RelayConfig,
        storage: Arc<dyn Storage>,
        provider: Arc<dyn VideoProvider>,
    ) -> Result<Self, AppError> {
        let local_files = LocalFiles::new(&config.upload.local_dir)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to initialize local directory at {}: {}",
                    config.upload.local_dir,
                    e
                );
                e
            })?;

        let state = AppState {
            config: config.clone(),
            storage,
            provider,
            local_files,
        };

        let router = router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, letting in-flight requests finish.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state
        .config
        .upload
        .max_file_size
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/upload", post(handlers::upload_file))
        .route("/files/:filename", get(handlers::get_file))
        .route("/generate", post(handlers::generate_video))
        .route("/status/:task_id", get(handlers::check_status))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
