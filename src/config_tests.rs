use crate::config::Config;
use std::collections::HashMap;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn test_config_defaults_without_environment() {
    let config = Config::from_lookup(lookup(&[])).unwrap();

    assert_eq!(config.database.url, "sqlite://propval.db");
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.model.min_samples, 30);
    assert_eq!(config.model.rounding_unit, 1000);
}

#[test]
fn test_config_composes_sub_configs() {
    let config = Config::from_lookup(lookup(&[
        ("DATABASE_URL", "sqlite://tmp/test.db"),
        ("PROPVAL_LOG_LEVEL", "debug"),
        ("PROPVAL_MODEL_DIR", "/var/lib/propval"),
        ("PROPVAL_LEARNING_RATE", "0.05"),
    ]))
    .unwrap();

    assert_eq!(config.database.url, "sqlite://tmp/test.db");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.model.model_dir.to_str(), Some("/var/lib/propval"));
    assert_eq!(config.model.boosting_parameters().learning_rate, 0.05);
}

#[test]
fn test_invalid_model_value_fails_whole_config() {
    let err = Config::from_lookup(lookup(&[("PROPVAL_MIN_SAMPLES", "-3")])).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("model config"));
    assert!(message.contains("PROPVAL_MIN_SAMPLES"));
}
