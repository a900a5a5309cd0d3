use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";
const DEFAULT_USER_AGENT: &str = "liquor-ats/0.1 (storefront-client)";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is set to a value that cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is set to a value that cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable is optional; the defaults mirror the storefront's
/// production settings (16% IVA, free shipping from 1500, 150 flat shipping).
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_money = |var: &str, default: &str| -> Result<Decimal, ConfigError> {
        let value = Decimal::from_str(or_default(var, default).trim())
            .map_err(|e| invalid(var, e.to_string()))?;
        if value.is_sign_negative() {
            return Err(invalid(var, "must not be negative".to_string()));
        }
        Ok(value)
    };

    let env = parse_environment(&or_default("ATS_ENV", "development"))?;

    let api_url = or_default("ATS_API_URL", DEFAULT_API_URL)
        .trim_end_matches('/')
        .to_string();
    if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
        return Err(invalid(
            "ATS_API_URL",
            format!("\"{api_url}\" must start with http:// or https://"),
        ));
    }

    let log_level = or_default("ATS_LOG_LEVEL", "info");
    let data_dir = PathBuf::from(or_default("ATS_DATA_DIR", "./.ats"));

    let request_timeout_secs = parse_u64("ATS_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("ATS_USER_AGENT", DEFAULT_USER_AGENT);
    let max_retries = parse_u32("ATS_MAX_RETRIES", "3")?;
    let retry_backoff_base_secs = parse_u64("ATS_RETRY_BACKOFF_BASE_SECS", "1")?;
    let category_cache_ttl_secs = parse_u64("ATS_CATEGORY_CACHE_TTL_SECS", "1800")?;

    let tax_rate = parse_money("ATS_TAX_RATE", "0.16")?;
    if tax_rate > Decimal::ONE {
        return Err(invalid(
            "ATS_TAX_RATE",
            format!("{tax_rate} is not a fraction between 0 and 1"),
        ));
    }
    let free_shipping_threshold = parse_money("ATS_FREE_SHIPPING_THRESHOLD", "1500")?;
    let shipping_cost = parse_money("ATS_SHIPPING_COST", "150")?;

    let max_quantity_per_item = parse_u32("ATS_MAX_QTY_PER_ITEM", "50")?;
    if max_quantity_per_item == 0 {
        return Err(invalid(
            "ATS_MAX_QTY_PER_ITEM",
            "must be at least 1".to_string(),
        ));
    }

    Ok(AppConfig {
        env,
        api_url,
        log_level,
        data_dir,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_secs,
        category_cache_ttl_secs,
        tax_rate,
        free_shipping_threshold,
        shipping_cost,
        max_quantity_per_item,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "ATS_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
