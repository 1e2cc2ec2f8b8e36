//! # HTTP Server
//!
//! Main HTTP server combining all endpoint routers.

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::class_routes::{class_routes, ApiState, CLASS_PIN_HEADER};
use super::config::HttpServerConfig;
use super::observability_routes::{health_routes, observability_routes};

/// HTTP Server for the ClassSense API
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server over an in-memory store with default configuration
    pub fn new() -> Self {
        Self::with_state(HttpServerConfig::default(), ApiState::in_memory())
    }

    /// Create a new HTTP server with custom configuration and shared state
    pub fn with_state(config: HttpServerConfig, state: ApiState) -> Self {
        let router = build_router(&config, Arc::new(state));
        Self { config, router }
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until Ctrl-C.
    ///
    /// Binds the main port and, when configured on a different port, a second
    /// API listener. Both stop together on shutdown.
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!(addr = %addr, "ClassSense HTTP server listening");

        let shutdown = shutdown_channel();

        match self.config.api_socket_addr() {
            Some(api_addr) => {
                let api_listener = TcpListener::bind(&api_addr).await?;
                info!(addr = %api_addr, "API-only listener ready");

                tokio::try_join!(
                    serve_until(listener, self.router.clone(), shutdown.clone()),
                    serve_until(api_listener, self.router, shutdown),
                )?;
            }
            None => serve_until(listener, self.router, shutdown).await?,
        }

        info!("HTTP server stopped");
        Ok(())
    }
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the combined router with all endpoints
pub fn build_router(config: &HttpServerConfig, state: Arc<ApiState>) -> Router {
    Router::new()
        .merge(health_routes(state.clone()))
        .merge(class_routes(state.clone()))
        .nest("/observability", observability_routes(state))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &HttpServerConfig) -> CorsLayer {
    let origin = if config.cors_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "ignoring unusable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(CLASS_PIN_HEADER),
        ])
}

/// Receiver flips to `true` once Ctrl-C arrives
fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = tx.send(true);
            }
            Err(e) => {
                // Keep the sender alive so listeners are not torn down
                warn!(error = %e, "cannot listen for Ctrl-C; graceful shutdown disabled");
                std::future::pending::<()>().await;
            }
        }
    });

    rx
}

async fn serve_until(
    listener: TcpListener,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}
