use crate::config::types::{ExchangeConfig, NodeConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates a node configuration
pub fn validate_node(config: &NodeConfig) -> Result<(), ConfigError> {
    if config.crawl.courtesy_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "courtesy-delay-ms must be at least 1".to_string(),
        ));
    }

    if config.crawl.outbound_capacity == 0 {
        return Err(ConfigError::Validation(
            "outbound-capacity must be at least 1".to_string(),
        ));
    }

    if config.fetch.max_redirects == 0 {
        return Err(ConfigError::Validation(
            "max-redirects must be at least 1".to_string(),
        ));
    }

    if config.fetch.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be at least 1".to_string(),
        ));
    }

    validate_user_agent(&config.user_agent)?;

    if config.store.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates an exchange configuration
pub fn validate_exchange(config: &ExchangeConfig) -> Result<(), ConfigError> {
    if config.vnodes == 0 {
        return Err(ConfigError::Validation(
            "vnodes must be at least 1".to_string(),
        ));
    }

    if config.vnodes > 1024 {
        return Err(ConfigError::Validation(format!(
            "vnodes must be at most 1024, got {}",
            config.vnodes
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if !config.contact_url.is_empty() {
        Url::parse(&config.contact_url).map_err(|e| {
            ConfigError::Validation(format!("invalid contact-url: {}", e))
        })?;
    }

    if !config.contact_email.is_empty() && !config.contact_email.contains('@') {
        return Err(ConfigError::Validation(format!(
            "invalid contact-email: '{}'",
            config.contact_email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_node_config_is_valid() {
        assert!(validate_node(&NodeConfig::default()).is_ok());
    }

    #[test]
    fn test_default_exchange_config_is_valid() {
        assert!(validate_exchange(&ExchangeConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_courtesy_rejected() {
        let mut config = NodeConfig::default();
        config.crawl.courtesy_delay_ms = 0;
        assert!(validate_node(&config).is_err());
    }

    #[test]
    fn test_bad_crawler_name_rejected() {
        let mut config = NodeConfig::default();
        config.user_agent.crawler_name = "has spaces".to_string();
        assert!(validate_node(&config).is_err());
    }

    #[test]
    fn test_bad_contact_url_rejected() {
        let mut config = NodeConfig::default();
        config.user_agent.contact_url = "not a url".to_string();
        assert!(validate_node(&config).is_err());
    }

    #[test]
    fn test_excessive_vnodes_rejected() {
        let config = ExchangeConfig {
            vnodes: 4096,
            ..Default::default()
        };
        assert!(validate_exchange(&config).is_err());
    }
}
