use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use slotbook::config::AppConfig;
use slotbook::db;
use slotbook::routes;
use slotbook::services::clock::SystemClock;
use slotbook::services::payments::stripe::StripePaymentProvider;
use slotbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if config.payment_api_key.is_empty() {
        tracing::warn!("PAYMENT_API_KEY not set, payment status will be reported as unknown");
    } else {
        tracing::info!("using payment provider at {}", config.payment_api_url);
    }
    let payments = StripePaymentProvider::new(
        config.payment_api_url.clone(),
        config.payment_api_key.clone(),
    );

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        payments: Box::new(payments),
        clock: Box::new(SystemClock),
    });

    let app = routes::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
