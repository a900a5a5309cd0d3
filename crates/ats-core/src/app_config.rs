use std::path::PathBuf;

use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    /// Origin of the product API, e.g. `http://127.0.0.1:5001`.
    pub api_url: String,
    pub log_level: String,
    /// Directory backing the local key-value store (cart, filters, history).
    pub data_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_secs: u64,
    pub category_cache_ttl_secs: u64,
    pub tax_rate: Decimal,
    pub free_shipping_threshold: Decimal,
    pub shipping_cost: Decimal,
    pub max_quantity_per_item: u32,
}
