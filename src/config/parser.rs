use std::path::Path;

use tracing::{info, warn};

use super::schema::CONFIG_SCHEMA;
use super::types::ApexConfig;
use crate::errors::ApexError;

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<ApexConfig, ApexError> {
    if !path.exists() {
        return Err(ApexError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(ApexError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

/// Parse configuration text; an empty document yields the defaults.
pub fn parse_config_str(content: &str) -> Result<ApexConfig, ApexError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    let yaml = match yaml {
        serde_yaml::Value::Null => serde_yaml::Value::Mapping(Default::default()),
        other => other,
    };

    validate_schema(&yaml)?;

    let mut config: ApexConfig = serde_yaml::from_value(yaml)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    validate_conflicts(&config)?;

    Ok(config)
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), ApexError> {
    let json_value: serde_json::Value = serde_json::to_value(yaml)
        .map_err(|e| ApexError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| ApexError::Config(format!("Schema compilation error: {}", e)))?;

    let result = compiled.validate(&json_value);
    if let Err(errors) = result {
        // Advisory only; typed parsing and validate_conflicts are authoritative.
        for e in errors {
            warn!(validation_error = %e, path = %e.instance_path, "Config schema warning");
        }
    }

    Ok(())
}

/// Apply `APEX_*` environment overrides on top of the file values.
pub(crate) fn apply_env_overrides<F>(config: &mut ApexConfig, lookup: F) -> Result<(), ApexError>
where
    F: Fn(&str) -> Option<String>,
{
    fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ApexError> {
        raw.trim()
            .parse()
            .map_err(|_| ApexError::Config(format!("{} has invalid value '{}'", key, raw)))
    }

    if let Some(raw) = lookup("APEX_MAX_RETRIES") {
        config.retry.max_retries = parse("APEX_MAX_RETRIES", &raw)?;
        info!(max_retries = config.retry.max_retries, "Override from APEX_MAX_RETRIES");
    }
    if let Some(raw) = lookup("APEX_AGENT_TIMEOUT_SECONDS") {
        config.scheduler.default_timeout_secs = Some(parse("APEX_AGENT_TIMEOUT_SECONDS", &raw)?);
        info!(timeout_secs = ?config.scheduler.default_timeout_secs, "Override from APEX_AGENT_TIMEOUT_SECONDS");
    }
    if let Some(raw) = lookup("APEX_MAX_CONCURRENCY") {
        config.scheduler.default_max_concurrency = parse("APEX_MAX_CONCURRENCY", &raw)?;
        info!(
            max_concurrency = config.scheduler.default_max_concurrency,
            "Override from APEX_MAX_CONCURRENCY"
        );
    }
    Ok(())
}

/// Detect semantic conflicts in the parsed configuration.
pub(crate) fn validate_conflicts(config: &ApexConfig) -> Result<(), ApexError> {
    let retry = &config.retry;
    if retry.max_retries > retry.max_retries_ceiling {
        return Err(ApexError::Config(format!(
            "retry.max_retries ({}) exceeds retry.max_retries_ceiling ({})",
            retry.max_retries, retry.max_retries_ceiling
        )));
    }
    if !retry.backoff_base_secs.is_finite() || !retry.backoff_cap_secs.is_finite() {
        return Err(ApexError::Config("retry backoff values must be finite".into()));
    }
    if retry.backoff_base_secs < 0.0 || retry.backoff_cap_secs < retry.backoff_base_secs {
        return Err(ApexError::Config(
            "retry.backoff_cap_secs must be at least retry.backoff_base_secs".into(),
        ));
    }

    if config.scheduler.default_max_concurrency == 0 {
        return Err(ApexError::Config("scheduler.default_max_concurrency must be positive".into()));
    }
    if config.scheduler.default_timeout_secs == Some(0) {
        return Err(ApexError::Config("scheduler.default_timeout_secs must be positive".into()));
    }
    for (role, role_cfg) in &config.roles {
        if role_cfg.slots == Some(0) {
            return Err(ApexError::Config(format!("roles.{}.slots must be positive", role)));
        }
        if role_cfg.timeout_secs == Some(0) {
            return Err(ApexError::Config(format!("roles.{}.timeout_secs must be positive", role)));
        }
    }

    let consensus = &config.consensus;
    if !(consensus.accept_threshold > 0.0) {
        return Err(ApexError::Config("consensus.accept_threshold must be positive".into()));
    }
    if consensus.quorum == 0 {
        return Err(ApexError::Config("consensus.quorum must be at least 1".into()));
    }
    if consensus.accept_threshold > consensus.quorum as f64 {
        warn!(
            threshold = consensus.accept_threshold,
            quorum = consensus.quorum,
            "Accept threshold exceeds quorum; more voters than the quorum will be needed"
        );
    }

    if config.events.buffer_size == 0 || config.events.broadcast_capacity == 0 {
        return Err(ApexError::Config("events buffer sizes must be positive".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_document_is_default() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config.consensus.quorum, 2);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_validate_conflicts_retry_ceiling() {
        let mut config = ApexConfig::default();
        config.retry.max_retries = 20;
        assert!(validate_conflicts(&config).is_err());
    }

    #[test]
    fn test_validate_conflicts_zero_quorum() {
        let mut config = ApexConfig::default();
        config.consensus.quorum = 0;
        assert!(validate_conflicts(&config).is_err());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let err = parse_config_str("roles:\n  fuzz-agent:\n    timeout_secs: 0\n").unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));

        let err = parse_config_str("scheduler:\n  default_timeout_secs: 0\n").unwrap_err();
        assert!(matches!(err, ApexError::Config(_)));

        let mut config = ApexConfig::default();
        apply_env_overrides(&mut config, |k| (k == "APEX_AGENT_TIMEOUT_SECONDS").then(|| "0".to_string())).unwrap();
        assert!(validate_conflicts(&config).is_err());
    }

    #[test]
    fn test_infinite_backoff_cap_rejected() {
        let err = parse_config_str("retry:\n  backoff_cap_secs: .inf\n").unwrap_err();
        assert!(matches!(err, ApexError::Config(_)));
    }

    #[test]
    fn test_validate_conflicts_default_ok() {
        assert!(validate_conflicts(&ApexConfig::default()).is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("APEX_MAX_RETRIES", "5"),
            ("APEX_AGENT_TIMEOUT_SECONDS", "90"),
            ("APEX_MAX_CONCURRENCY", "2"),
        ]
        .into_iter()
        .collect();
        let mut config = ApexConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.scheduler.default_timeout_secs, Some(90));
        assert_eq!(config.scheduler.default_max_concurrency, 2);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = ApexConfig::default();
        let err = apply_env_overrides(&mut config, |k| {
            (k == "APEX_MAX_RETRIES").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ApexError::Config(_)));
    }

    #[tokio::test]
    async fn test_parse_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apex.yaml");
        std::fs::write(&path, "retry:\n  backoff_base_secs: 1\n  backoff_cap_secs: 8\nserver:\n  port: 9000\n").unwrap();
        let config = parse_config(&path).await.unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.retry.backoff_cap_secs, 8.0);
    }

    #[tokio::test]
    async fn test_parse_config_missing_file() {
        let err = parse_config(Path::new("/nonexistent/apex.yaml")).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
