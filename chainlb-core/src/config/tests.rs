use crate::config::loader::load_config_from_str;
use crate::config::model::*;
use std::collections::BTreeMap;
use std::time::Duration;

fn create_test_config() -> Config {
    let mut url = BTreeMap::new();
    url.insert(
        "1".to_string(),
        "https://node-a.example.com, https://node-b.example.com".to_string(),
    );
    url.insert("137".to_string(), "http://polygon.example.com".to_string());

    Config {
        nodes: NodeSettings {
            url,
            ..NodeSettings::default()
        },
        contracts: ContractCacheSettings::default(),
        synchronisation: SynchronisationSettings::default(),
    }
}

#[test]
fn test_config_validation_success() {
    let config = create_test_config();
    assert!(config.validate().is_ok());
}

#[test]
fn test_endpoints_split_and_sorted() {
    let config = create_test_config();
    let endpoints = config.nodes.endpoints().unwrap();

    assert_eq!(endpoints.len(), 3);
    assert_eq!(endpoints[0].chain_id, 1);
    assert_eq!(endpoints[0].url.as_str(), "https://node-a.example.com/");
    assert_eq!(endpoints[1].url.as_str(), "https://node-b.example.com/");
    assert_eq!(endpoints[2].chain_id, 137);
}

#[test]
fn test_endpoints_tolerate_missing_space_and_trailing_comma() {
    let mut config = create_test_config();
    config.nodes.url.insert(
        "56".to_string(),
        "https://bsc-a.example.com,https://bsc-b.example.com,".to_string(),
    );

    let endpoints = config.nodes.endpoints().unwrap();
    let bsc: Vec<_> = endpoints.iter().filter(|e| e.chain_id == 56).collect();
    assert_eq!(bsc.len(), 2);
}

#[test]
fn test_invalid_chain_id_rejected() {
    let mut config = create_test_config();
    config
        .nodes
        .url
        .insert("mainnet".to_string(), "https://x.example.com".to_string());

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("Invalid chain id"));
}

#[test]
fn test_empty_url_list_rejected() {
    let mut config = create_test_config();
    config.nodes.url.insert("10".to_string(), " , ".to_string());

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("empty url list"));
}

#[test]
fn test_non_http_url_rejected() {
    let mut config = create_test_config();
    config
        .nodes
        .url
        .insert("10".to_string(), "ws://node.example.com".to_string());

    assert!(config.validate().is_err());
}

#[test]
fn test_zero_threads_rejected() {
    let mut config = create_test_config();
    config.nodes.health.threads = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_disabled_sections_skip_validation() {
    let mut config = create_test_config();
    config.nodes.health.threads = 0;
    config.nodes.disabled = true;
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_private_key_rejected() {
    let mut config = create_test_config();
    config.contracts.pk = Some("0x1234".to_string());
    assert!(config.validate().is_err());

    config.contracts.pk = Some(format!("0x{}", "ab".repeat(32)));
    assert!(config.validate().is_ok());
}

#[test]
fn test_defaults() {
    let config = Config::default();

    assert_eq!(config.nodes.balancer_timeout(), Duration::from_secs(10));
    assert_eq!(config.nodes.balancer_sleep(), Duration::from_millis(3000));
    assert_eq!(config.nodes.health.refresh_timeout(), Duration::from_secs(10));
    assert_eq!(config.nodes.health.check_delay(), Duration::from_secs(60));
    assert_eq!(config.nodes.health.first_delay(), Duration::from_secs(1));
    assert_eq!(config.nodes.health.threads, 20);
    assert_eq!(config.contracts.lifetime(), Duration::from_secs(600));
    assert_eq!(config.contracts.clear_delay(), Duration::from_secs(2));
    assert_eq!(config.synchronisation.lock_lifetime(), Duration::from_secs(600));
    assert_eq!(config.synchronisation.clear_delay(), Duration::from_secs(60));
}

#[test]
fn test_load_from_toml() {
    let toml = r#"
[nodes]
balancer_timeout_ms = 5000

[nodes.url]
"1" = "https://node-a.example.com, https://node-b.example.com"

[nodes.health]
logging_level = "info"
threads = 4

[synchronisation]
lock_timeout_seconds = 30
"#;

    let config = load_config_from_str(toml).unwrap();
    assert_eq!(config.nodes.balancer_timeout_ms, 5000);
    assert_eq!(config.nodes.health.threads, 4);
    assert_eq!(config.nodes.health.logging_level, crate::LogLevel::Info);
    assert_eq!(config.nodes.endpoints().unwrap().len(), 2);
    assert_eq!(config.synchronisation.lock_timeout_seconds, 30);
    // 未出现的段落使用默认值
    assert_eq!(config.contracts.lifetime_seconds, 600);
}

#[test]
fn test_oversized_periods_rejected() {
    let toml = r#"
[contracts]
lifetime_seconds = 9223372036854775807
"#;
    let err = load_config_from_str(toml).unwrap_err();
    assert!(err.to_string().contains("contracts.lifetime_seconds"));

    let mut config = create_test_config();
    config.synchronisation.lock_timeout_seconds = u64::MAX;
    assert!(config.validate().is_err());

    let mut config = create_test_config();
    config.nodes.health.refresh_timeout_ms = u64::MAX;
    assert!(config.validate().is_err());

    let mut config = create_test_config();
    config.contracts.lifetime_seconds = 365 * 24 * 60 * 60;
    assert!(config.validate().is_ok());
}
