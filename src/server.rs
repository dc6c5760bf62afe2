use crate::config::Config;
use crate::handlers::{
    get_apod_for_date, get_apod_today, health_check, not_found, root, AppState, SharedState,
};
use crate::middleware::{rate_limit, request_context};
use crate::rate_limiter::RateLimiter;
use crate::upstream::{ApodSource, HttpApodClient};
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the router with all middleware around the given state.
pub fn create_app(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors_origin);

    Router::new()
        .route("/", get(root).fallback(not_found))
        .route("/health", get(health_check).fallback(not_found))
        .route("/api/apod", get(get_apod_today).fallback(not_found))
        .route("/api/apod/", get(get_apod_today).fallback(not_found))
        .route("/api/apod/:date", get(get_apod_for_date).fallback(not_found))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn_with_state(state.clone(), request_context))
                .layer(middleware::from_fn_with_state(state.clone(), rate_limit)),
        )
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = if origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origin
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
}

pub struct Server {
    state: SharedState,
}

impl Server {
    /// Create a server that talks to the real APOD API.
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let client = HttpApodClient::new(
            config.apod_base_url.clone(),
            config.api_key(),
            config.upstream_timeout(),
        )?;
        Ok(Self::with_source(config, Arc::new(client)))
    }

    pub fn with_source(config: Config, apod: Arc<dyn ApodSource>) -> Self {
        Self {
            state: Arc::new(AppState::new(config, apod)),
        }
    }

    pub async fn run(self) -> std::io::Result<()> {
        let port = self.state.config.port;
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;

        tracing::info!("APOD proxy listening on port {}", port);
        tracing::info!("Health check available at /health");
        tracing::info!("APOD endpoint available at /api/apod/:date");

        let purge = tokio::spawn(purge_expired_windows(
            self.state.rate_limiter.clone(),
            self.state.config.rate_limit_purge_interval(),
        ));

        let app = create_app(self.state);
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        purge.abort();
        tracing::info!("Server stopped");
        result
    }
}

async fn purge_expired_windows(rate_limiter: RateLimiter, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match rate_limiter.purge_expired(Instant::now()) {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "Purged expired rate limit windows"),
            Err(err) => tracing::error!(error = %err, "Failed to purge rate limit windows"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
