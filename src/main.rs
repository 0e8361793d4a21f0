mod auth;
mod config;
mod error;
mod generation;
mod handlers;
mod metrics;
mod models;
mod prompt;
mod rate_limit;
mod retry;
mod state;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info};

use crate::auth::AuthClient;
use crate::config::{Args, Config};
use crate::generation::GenerationClient;
use crate::handlers::{analyze_handler, chat_handler, health_handler, metrics_handler};
use crate::rate_limit::{RateLimiter, SWEEP_INTERVAL, sweep_loop};
use crate::state::AppState;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Credentials and limiter bounds are checked before anything serves
    let config = match Config::try_from(args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let limiter = RateLimiter::new(config.rate_window, config.rate_limit);

    // Background sweep of expired rate limit windows
    tokio::spawn(sweep_loop(limiter.clone(), SWEEP_INTERVAL));

    // Creating shared state
    let state = Arc::new(AppState {
        generation: GenerationClient::new(&config),
        auth: AuthClient::new(&config),
        limiter,
    });

    // Creating the router with routes
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/analyze", post(analyze_handler))
        .layer(cors_layer(&config))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    info!("Gateway running on http://localhost:{}", config.port);
    info!("Forwarding to generation service at {}", config.generation_url);
    info!(
        "Rate limit: {} requests per {} seconds",
        config.rate_limit,
        config.rate_window.as_secs()
    );
    axum::serve(listener, app).await.unwrap();
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86400))
}
