//! Scheduler service server
//!
//! Wires the registry, ticker, executor, metadata client and loader
//! together and exposes the inbound CRUD API over HTTP.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::loader::ScheduleLoader;
use crate::metadata::{MetadataClient, MetadataConfig};
use crate::scheduler::{EventExecutor, ScheduleRegistry, Ticker};

use api::create_router;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The schedule registry
    pub registry: Arc<ScheduleRegistry>,

    /// Boot/reload loader
    pub loader: Arc<ScheduleLoader>,

    /// Server start time
    pub start_time: Instant,

    /// Configuration
    pub config: Arc<Config>,
}

// ============================================================================
// Scheduler Server
// ============================================================================

/// Main scheduler server
pub struct SchedulerServer {
    config: Arc<Config>,
    state: AppState,
    ticker: Arc<Ticker>,
}

impl SchedulerServer {
    /// Create a new scheduler server
    pub fn new(config: Config) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::ConfigError(e.to_string()))?;
        let config = Arc::new(config);

        let registry = Arc::new(ScheduleRegistry::new());

        let executor = Arc::new(
            EventExecutor::new(config.service_timeout())
                .map_err(|e| ServerError::InitError(e.to_string()))?,
        );

        let ticker = Arc::new(Ticker::new(
            registry.clone(),
            executor,
            config.tick_interval(),
        ));

        let metadata = Arc::new(
            MetadataClient::new(
                MetadataConfig::new(config.clients.metadata.url())
                    .with_timeout(config.service_timeout()),
            )
            .map_err(|e| ServerError::InitError(e.to_string()))?,
        );

        let loader = Arc::new(ScheduleLoader::new(
            registry.clone(),
            metadata,
            config.clone(),
        ));

        let state = AppState {
            registry,
            loader,
            start_time: Instant::now(),
            config: config.clone(),
        };

        Ok(Self {
            config,
            state,
            ticker,
        })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Get the tick engine
    pub fn ticker(&self) -> Arc<Ticker> {
        self.ticker.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.service.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.service.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Boot and serve until the process dies.
    ///
    /// The initial load runs first and a metadata pull failure fails the
    /// boot; then the ticker starts and the HTTP listener comes up.
    pub async fn start(&self) -> Result<(), ServerError> {
        self.serve(std::future::pending::<()>()).await
    }

    /// Boot and serve until `shutdown_signal` resolves, then stop ticking.
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        self.serve(shutdown_signal).await
    }

    async fn serve(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let summary = self
            .state
            .loader
            .load_all()
            .await
            .map_err(|e| ServerError::BootError(e.to_string()))?;
        tracing::info!(
            schedules = summary.schedules_added,
            events = summary.events_added,
            "initial load complete"
        );

        self.ticker.start();

        let addr = self.config.bind_address();
        let router = self.build_router();
        tracing::info!("starting scheduler server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(e.to_string()))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()))?;

        self.ticker.stop().await;
        tracing::info!("scheduler server shutdown complete");

        Ok(())
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            bind_address: self.config.bind_address(),
            tick_interval_millis: self.config.service.tick_interval_millis,
            timeout_millis: self.config.service.timeout_millis,
            cors_enabled: self.config.service.enable_cors,
            request_logging_enabled: self.config.service.enable_request_logging,
        }
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub tick_interval_millis: u64,
    pub timeout_millis: u64,
    pub cors_enabled: bool,
    pub request_logging_enabled: bool,
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, Clone)]
pub enum ServerError {
    /// Configuration error
    ConfigError(String),

    /// Initialization error
    InitError(String),

    /// Initial load failed
    BootError(String),

    /// Failed to bind to address
    BindError(String),

    /// Server error
    ServeError(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::InitError(msg) => write!(f, "Initialization error: {}", msg),
            Self::BootError(msg) => write!(f, "Boot failed: {}", msg),
            Self::BindError(msg) => write!(f, "Failed to bind: {}", msg),
            Self::ServeError(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_creation() {
        let server = SchedulerServer::new(Config::default());
        assert!(server.is_ok());
    }

    #[test]
    fn test_server_info() {
        let server = SchedulerServer::new(Config::default()).unwrap();
        let info = server.info();

        assert_eq!(info.tick_interval_millis, 500);
        assert_eq!(info.timeout_millis, 5000);
        assert!(info.cors_enabled);
    }

    #[test]
    fn test_server_rejects_invalid_config() {
        let mut config = Config::default();
        config.service.tick_interval_millis = 0;
        assert!(SchedulerServer::new(config).is_err());
    }

    #[tokio::test]
    async fn test_app_state_components() {
        let server = SchedulerServer::new(Config::default()).unwrap();
        let state = server.state();

        let stats = state.registry.stats().await;
        assert_eq!(stats.schedules, 0);
        assert_eq!(stats.queue_length, 0);
        assert!(!server.ticker().is_running());
    }
}
