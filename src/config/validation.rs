use crate::config::types::{Config, EngineConfig, InputConfig, TransportConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on the concurrency budget
const MAX_CONCURRENCY: usize = 1000;

/// Shortest accepted wave poll interval
const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Upper bound on how often the URL list may be repeated
const MAX_REPEAT: usize = 10_000;

/// Upper bound on the number of requests in one run after repetition
const MAX_EXPANDED_URLS: usize = 1_000_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_engine_config(&config.engine)?;
    validate_transport_config(&config.transport)?;
    validate_input_config(&config.input)?;
    Ok(())
}

/// Validates engine configuration
pub(crate) fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency
        )));
    }

    if config.poll_interval_ms < MIN_POLL_INTERVAL_MS {
        return Err(ConfigError::Validation(format!(
            "poll_interval_ms must be >= {}ms, got {}ms",
            MIN_POLL_INTERVAL_MS, config.poll_interval_ms
        )));
    }

    Ok(())
}

/// Validates transport configuration
pub fn validate_transport_config(config: &TransportConfig) -> Result<(), ConfigError> {
    if config.max_connections < 1 {
        return Err(ConfigError::Validation(format!(
            "max_connections must be >= 1, got {}",
            config.max_connections
        )));
    }

    if config.max_connections_per_host < 1 {
        return Err(ConfigError::Validation(format!(
            "max_connections_per_host must be >= 1, got {}",
            config.max_connections_per_host
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be > 0".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be > 0".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the URL list
///
/// An empty list is accepted: a run over zero URLs completes immediately.
pub(crate) fn validate_input_config(config: &InputConfig) -> Result<(), ConfigError> {
    if config.repeat < 1 || config.repeat > MAX_REPEAT {
        return Err(ConfigError::Validation(format!(
            "repeat must be between 1 and {}, got {}",
            MAX_REPEAT, config.repeat
        )));
    }

    match config.urls.len().checked_mul(config.repeat) {
        Some(total) if total <= MAX_EXPANDED_URLS => {}
        _ => {
            return Err(ConfigError::Validation(format!(
                "{} URLs repeated {} times exceeds the limit of {} requests per run",
                config.urls.len(),
                config.repeat,
                MAX_EXPANDED_URLS
            )))
        }
    }

    for raw in &config.urls {
        validate_url(raw)?;
    }

    Ok(())
}

/// Checks that a URL is absolute and uses http or https
pub fn validate_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid URL '{}': {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "URL '{}' must use http or https, got '{}'",
            raw,
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "URL '{}' has no host",
            raw
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/").is_ok());
        assert!(validate_url("http://127.0.0.1:8080/?count=1").is_ok());

        assert!(validate_url("").is_err());
        assert!(validate_url("example.com").is_err());
        assert!(validate_url("ftp://example.com/file").is_err());
        assert!(validate_url("mailto:admin@example.com").is_err());
    }

    #[test]
    fn test_validate_engine_bounds() {
        let mut engine = EngineConfig::default();
        assert!(validate_engine_config(&engine).is_ok());

        engine.concurrency = 0;
        assert!(validate_engine_config(&engine).is_err());

        engine.concurrency = MAX_CONCURRENCY + 1;
        assert!(validate_engine_config(&engine).is_err());

        engine.concurrency = 1;
        engine.poll_interval_ms = 5;
        assert!(validate_engine_config(&engine).is_err());
    }

    #[test]
    fn test_validate_transport_limits() {
        let mut transport = TransportConfig::default();
        assert!(validate_transport_config(&transport).is_ok());

        transport.max_connections_per_host = 0;
        assert!(validate_transport_config(&transport).is_err());

        transport = TransportConfig::default();
        transport.max_connections = 0;
        assert!(validate_transport_config(&transport).is_err());

        transport = TransportConfig::default();
        transport.user_agent = "  ".to_string();
        assert!(validate_transport_config(&transport).is_err());
    }

    #[test]
    fn test_validate_input() {
        let mut input = InputConfig::default();
        assert!(validate_input_config(&input).is_ok());

        input.urls = vec!["https://example.com/".to_string(), "nope".to_string()];
        assert!(matches!(
            validate_input_config(&input),
            Err(ConfigError::InvalidUrl(_))
        ));

        input.urls = vec!["https://example.com/".to_string()];
        input.repeat = 0;
        assert!(matches!(
            validate_input_config(&input),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_huge_repeat_rejected_before_expansion() {
        let content = r#"
[input]
urls = ["https://a.example.com/", "https://b.example.com/", "https://c.example.com/"]
repeat = 9223372036854775807
"#;
        assert!(matches!(
            crate::config::parse_config(content),
            Err(ConfigError::Validation(_))
        ));

        let mut input = InputConfig {
            urls: vec!["https://example.com/".to_string(); 3],
            repeat: usize::MAX,
        };
        assert!(matches!(
            validate_input_config(&input),
            Err(ConfigError::Validation(_))
        ));

        // Within the repeat bound but over the per-run request limit
        input.urls = vec!["https://example.com/".to_string(); 200];
        input.repeat = MAX_REPEAT;
        assert!(matches!(
            validate_input_config(&input),
            Err(ConfigError::Validation(_))
        ));

        input.urls = vec!["https://example.com/".to_string(); 3];
        input.repeat = MAX_REPEAT;
        assert!(validate_input_config(&input).is_ok());
        assert_eq!(input.expanded_urls().len(), 3 * MAX_REPEAT);
    }

    #[test]
    fn test_expanding_empty_list_is_immediate() {
        let input = InputConfig {
            urls: Vec::new(),
            repeat: usize::MAX,
        };
        assert!(input.expanded_urls().is_empty());
    }
}
