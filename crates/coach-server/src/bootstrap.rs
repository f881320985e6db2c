//! Server bootstrap — the composition root.
//!
//! This module is the only place where the process-wide services (config,
//! metrics, hint service) are constructed. Handlers receive them through
//! [`crate::state::AppState`] and never reach for the environment directly.

use std::sync::Arc;

use anyhow::Result;
use coach_core::hint::{build_hint_service, HintService};
use coach_core::{config::AppConfig, Metrics};

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the WebSocket/health listener binds to.
    pub port: u16,
    /// CORS configuration.
    pub cors: CorsConfig,
}

impl ServerConfig {
    /// Default configuration: port 8080, permissive CORS.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            port: 8080,
            cors: CorsConfig::default(),
        }
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }

    /// Override the listen port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Process-wide services shared by every session.
pub struct AppContext {
    /// Environment-derived configuration, read once at startup.
    pub config: AppConfig,
    /// Shared metrics sink.
    pub metrics: Arc<Metrics>,
    /// Shared hint service — stateless, safe to reuse across sessions.
    pub hint_service: Arc<dyn HintService>,
}

/// Bootstrap the process-wide services.
pub async fn bootstrap() -> Result<AppContext> {
    let config = AppConfig::from_env();
    let metrics = Metrics::new();
    metrics.spawn_logger(std::time::Duration::from_secs(30));
    let hint_service = build_hint_service(&config);

    tracing::info!(
        asr_provider = ?config.asr_provider,
        asr_pcm_buffer = config.asr_pcm_buffer,
        "coach-server bootstrap complete"
    );

    Ok(AppContext {
        config,
        metrics,
        hint_service,
    })
}

/// Start the web server on `config.port`, serving `/ws` and `/healthz`.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    use tokio::net::TcpListener;
    use tracing::info;

    let ctx = bootstrap().await?;
    let app = crate::routes::create_router(ctx, &config.cors);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("coach-server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
