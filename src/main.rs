use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod error;
mod models;
mod services;

use config::Config;
use constants::{API_VERSION, SESSION_STORE_MAX_ENTRIES};
use services::{
    BalanceResolver, BindpayClient, DisconnectedWallet, EthersChainReader, EthersWalletSession,
    PaymentProvider, SessionStore, WalletSession,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paylink_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting Paylink Checkout Backend");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    // Composition root: every external collaborator is built exactly once
    // and handed to the API layer.
    let provider: Arc<dyn PaymentProvider> = Arc::new(BindpayClient::from_config(&config));
    let balances = Arc::new(BalanceResolver::new(Arc::new(
        EthersChainReader::from_config(&config),
    )));
    let wallet: Arc<dyn WalletSession> = match EthersWalletSession::from_config(&config)? {
        Some(session) => Arc::new(session),
        None => Arc::new(DisconnectedWallet),
    };

    let app_state = api::AppState {
        config: config.clone(),
        provider,
        balances,
        wallet,
        sessions: Arc::new(SessionStore::new(SESSION_STORE_MAX_ENTRIES)),
        flows: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
    };

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid address");

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Merchant onboarding
        .route(
            "/api/v1/merchant/create",
            post(api::merchant::create_merchant),
        )
        .route(
            "/api/v1/merchant/payment-link",
            post(api::merchant::create_payment_link),
        )
        // Payer wallet
        .route("/api/v1/wallet/balances", post(api::wallet::get_balances))
        // Checkout flow
        .route(
            "/api/v1/checkout/{session_id}",
            get(api::checkout::get_session),
        )
        .route(
            "/api/v1/checkout/{session_id}/quote",
            post(api::checkout::request_quote),
        )
        .route(
            "/api/v1/checkout/{session_id}/confirm",
            post(api::checkout::confirm_payment),
        )
        .route(
            "/api/v1/checkout/{session_id}/cancel",
            post(api::checkout::cancel_payment),
        )
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
