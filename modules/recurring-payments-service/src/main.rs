//! Recurring Payments Service: standalone binary that sets up and executes
//! recurring Open Payments transfers.
//!
//! Hosts both the JSON API and a payment page on the same port.
//! Default: http://127.0.0.1:3000/

mod client;
mod config;
mod dashboard;
mod error;
mod grants;
mod recurring;
mod routes;
mod setup;
mod signer;
#[cfg(test)]
mod testing;

use client::AuthenticatedClient;
use config::ServiceConfig;
use routes::AppState;
use std::sync::Arc;
use std::time::Duration;

pub fn build_router(state: Arc<AppState>) -> axum::Router {
    let cors = tower_http::cors::CorsLayer::permissive();

    axum::Router::new()
        .route("/", axum::routing::get(dashboard::dashboard))
        .route(
            "/create-payment",
            axum::routing::post(routes::create_payment),
        )
        .route(
            "/finish-payment",
            axum::routing::post(routes::finish_payment),
        )
        .route("/status", axum::routing::get(routes::status))
        .with_state(state)
        .layer(cors)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("Loading private key from: {}", config.private_key_path.display());
    let key = match config::load_signing_key(&config.private_key_path) {
        Ok(key) => key,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let client = match AuthenticatedClient::new(
        config.identity.clone(),
        key,
        Duration::from_secs(config.http_timeout_secs),
    ) {
        Ok(client) => client,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    log::info!(
        "Recurring schedule: {} additional payments, interval {}",
        config.schedule.additional_payments,
        config.schedule.interval.to_iso8601()
    );

    let state = Arc::new(AppState::new(
        Arc::new(client),
        config.identity.wallet_address_url.clone(),
        config.schedule.clone(),
    ));

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    log::info!("Recurring Payments Service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server error");
}
