use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub payment_api_url: String,
    /// Empty disables payment lookups; every lookup then reports unknown.
    pub payment_api_key: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "slotbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            payment_api_url: env::var("PAYMENT_API_URL")
                .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string()),
            payment_api_key: env::var("PAYMENT_API_KEY").unwrap_or_default(),
        }
    }
}
