use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn parse_environment_development() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
}

#[test]
fn parse_environment_test() {
    assert_eq!(parse_environment("test").unwrap(), Environment::Test);
}

#[test]
fn parse_environment_production() {
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "ATS_ENV"));
}

#[test]
fn build_app_config_uses_defaults_when_env_is_empty() {
    let map = HashMap::new();
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();

    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.api_url, "http://127.0.0.1:5001");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.data_dir, PathBuf::from("./.ats"));
    assert_eq!(cfg.request_timeout_secs, 30);
    assert_eq!(cfg.user_agent, "liquor-ats/0.1 (storefront-client)");
    assert_eq!(cfg.max_retries, 3);
    assert_eq!(cfg.retry_backoff_base_secs, 1);
    assert_eq!(cfg.category_cache_ttl_secs, 1800);
    assert_eq!(cfg.tax_rate, Decimal::new(16, 2));
    assert_eq!(cfg.free_shipping_threshold, Decimal::from(1500));
    assert_eq!(cfg.shipping_cost, Decimal::from(150));
    assert_eq!(cfg.max_quantity_per_item, 50);
}

#[test]
fn build_app_config_strips_trailing_slash_from_api_url() {
    let mut map = HashMap::new();
    map.insert("ATS_API_URL", "https://api.licoreria-ats.pe/");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.api_url, "https://api.licoreria-ats.pe");
}

#[test]
fn build_app_config_rejects_api_url_without_scheme() {
    let mut map = HashMap::new();
    map.insert("ATS_API_URL", "api.licoreria-ats.pe");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "ATS_API_URL"),
        "expected InvalidEnvVar(ATS_API_URL), got: {result:?}"
    );
}

#[test]
fn build_app_config_max_retries_override() {
    let mut map = HashMap::new();
    map.insert("ATS_MAX_RETRIES", "5");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.max_retries, 5);
}

#[test]
fn build_app_config_max_retries_invalid() {
    let mut map = HashMap::new();
    map.insert("ATS_MAX_RETRIES", "not-a-number");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "ATS_MAX_RETRIES"),
        "expected InvalidEnvVar(ATS_MAX_RETRIES), got: {result:?}"
    );
}

#[test]
fn build_app_config_request_timeout_invalid() {
    let mut map = HashMap::new();
    map.insert("ATS_REQUEST_TIMEOUT_SECS", "-1");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "ATS_REQUEST_TIMEOUT_SECS"),
        "expected InvalidEnvVar(ATS_REQUEST_TIMEOUT_SECS), got: {result:?}"
    );
}

#[test]
fn build_app_config_tax_rate_override() {
    let mut map = HashMap::new();
    map.insert("ATS_TAX_RATE", "0.18");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.tax_rate, Decimal::new(18, 2));
}

#[test]
fn build_app_config_tax_rate_above_one_fails() {
    let mut map = HashMap::new();
    map.insert("ATS_TAX_RATE", "16");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "ATS_TAX_RATE"),
        "expected InvalidEnvVar(ATS_TAX_RATE), got: {result:?}"
    );
}

#[test]
fn build_app_config_negative_shipping_cost_fails() {
    let mut map = HashMap::new();
    map.insert("ATS_SHIPPING_COST", "-10");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "ATS_SHIPPING_COST"),
        "expected InvalidEnvVar(ATS_SHIPPING_COST), got: {result:?}"
    );
}

#[test]
fn build_app_config_zero_max_quantity_fails() {
    let mut map = HashMap::new();
    map.insert("ATS_MAX_QTY_PER_ITEM", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "ATS_MAX_QTY_PER_ITEM"),
        "expected InvalidEnvVar(ATS_MAX_QTY_PER_ITEM), got: {result:?}"
    );
}

#[test]
fn build_app_config_data_dir_override() {
    let mut map = HashMap::new();
    map.insert("ATS_DATA_DIR", "/var/lib/ats");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/ats"));
}
