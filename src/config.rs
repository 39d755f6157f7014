use crate::record::Level;
use std::str::FromStr;
use thiserror::Error;

/// What to do with a new record when the async queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowAction {
    /// Drop the incoming record, keeping already-queued ones.
    Discard,
    /// Park the producer until the drain worker frees a slot. The
    /// default when unconfigured, trading latency for no loss.
    #[default]
    Block,
}

impl FromStr for OverflowAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discard" => Ok(OverflowAction::Discard),
            "block" => Ok(OverflowAction::Block),
            other => Err(ConfigError::InvalidOverflowAction(other.to_string())),
        }
    }
}

/// Security and credential parameters, passed through to the broker
/// client unvalidated. This crate treats them as opaque.
#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    pub security_protocol: Option<String>,
    pub ssl_truststore_location: Option<String>,
    pub ssl_truststore_password: Option<String>,
    pub ssl_keystore_type: Option<String>,
    pub ssl_keystore_location: Option<String>,
    pub ssl_keystore_password: Option<String>,
    pub sasl_kerberos_service_name: Option<String>,
    pub client_jaas_conf_path: Option<String>,
    pub kerb5_conf_path: Option<String>,
}

/// Process-wide delivery configuration. Resolved once at startup and
/// immutable thereafter; the handler, publisher and async wrapper are
/// all built from it.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Master switch. When `false` no handler is constructed at all.
    pub enabled: bool,
    /// Broker endpoints, required when enabled.
    pub broker_list: Vec<String>,
    /// Destination topic, required when enabled.
    pub topic: String,
    /// Minimum severity shipped; records below it are filtered out
    /// before formatting.
    pub level: Level,
    /// Route records through the bounded-queue async wrapper.
    pub async_mode: bool,
    /// Async queue capacity; bounded default applies when unset.
    pub async_queue_length: Option<usize>,
    /// Overflow policy for the async queue; blocks when unset.
    pub overflow_action: Option<OverflowAction>,
    /// chrono pattern for `@timestamp`; built-in default when unset.
    pub timestamp_pattern: Option<String>,
    /// Block the producer until the broker acknowledges each event.
    pub sync_send: bool,
    /// Swallow delivery failures after a one-line warning instead of
    /// surfacing them to the caller.
    pub ignore_exceptions: bool,
    pub retries: Option<i32>,
    pub required_num_acks: Option<i32>,
    pub delivery_timeout_ms: Option<u64>,
    pub max_block_ms: Option<u64>,
    pub compression_type: Option<String>,
    pub security: SecurityConfig,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        DeliveryConfig {
            enabled: false,
            broker_list: Vec::new(),
            topic: String::new(),
            level: Level::Info,
            async_mode: false,
            async_queue_length: None,
            overflow_action: None,
            timestamp_pattern: None,
            sync_send: false,
            ignore_exceptions: true,
            retries: None,
            required_num_acks: None,
            delivery_timeout_ms: None,
            max_block_ms: None,
            compression_type: None,
            security: SecurityConfig::default(),
        }
    }
}

/// Errors raised while building the pipeline from configuration. All of
/// them are fatal at startup; none can occur per record.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("broker-list is required when kafka logging is enabled")]
    MissingBrokerList,
    #[error("topic is required when kafka logging is enabled")]
    MissingTopic,
    #[error("invalid overflow action '{0}', expected 'discard' or 'block'")]
    InvalidOverflowAction(String),
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),
    #[error("invalid numeric value for {key}")]
    InvalidNumber { key: String },
    #[error("the kafka feature is not enabled")]
    KafkaFeatureDisabled,
    #[error("failed to create the broker client: {0}")]
    Client(String),
}

impl DeliveryConfig {
    /// Check the required fields. A disabled config is always valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.broker_list.iter().all(|endpoint| endpoint.is_empty()) {
            return Err(ConfigError::MissingBrokerList);
        }
        if self.topic.is_empty() {
            return Err(ConfigError::MissingTopic);
        }
        Ok(())
    }

    /// Load the configuration from `KAFKA_LOG_*` environment variables,
    /// starting from [`DeliveryConfig::default`]. Unset variables keep
    /// their defaults; malformed levels, overflow actions and numbers
    /// are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = DeliveryConfig::default();

        config.enabled = env_flag(KAFKA_LOG_ENABLED_ENV, config.enabled);
        if let Ok(list) = std::env::var(KAFKA_LOG_BROKER_LIST_ENV) {
            config.broker_list = list
                .split(',')
                .map(|endpoint| endpoint.trim().to_string())
                .filter(|endpoint| !endpoint.is_empty())
                .collect();
        }
        if let Ok(topic) = std::env::var(KAFKA_LOG_TOPIC_ENV) {
            config.topic = topic;
        }
        if let Ok(level) = std::env::var(KAFKA_LOG_LEVEL_ENV) {
            config.level = level
                .parse()
                .map_err(|_| ConfigError::InvalidLevel(level.clone()))?;
        }
        config.async_mode = env_flag(KAFKA_LOG_ASYNC_ENV, config.async_mode);
        config.async_queue_length = env_number(KAFKA_LOG_ASYNC_QUEUE_LENGTH_ENV)?;
        if let Ok(action) = std::env::var(KAFKA_LOG_ASYNC_OVERFLOW_ACTION_ENV) {
            config.overflow_action = Some(action.parse()?);
        }
        config.timestamp_pattern = std::env::var(KAFKA_LOG_TIMESTAMP_PATTERN_ENV).ok();
        config.sync_send = env_flag(KAFKA_LOG_SYNC_SEND_ENV, config.sync_send);
        config.ignore_exceptions = env_flag(KAFKA_LOG_IGNORE_EXCEPTIONS_ENV, config.ignore_exceptions);
        config.retries = env_number(KAFKA_LOG_RETRIES_ENV)?;
        config.required_num_acks = env_number(KAFKA_LOG_REQUIRED_NUM_ACKS_ENV)?;
        config.delivery_timeout_ms = env_number(KAFKA_LOG_DELIVERY_TIMEOUT_MS_ENV)?;
        config.max_block_ms = env_number(KAFKA_LOG_MAX_BLOCK_MS_ENV)?;
        config.compression_type = std::env::var(KAFKA_LOG_COMPRESSION_TYPE_ENV).ok();

        config.security = SecurityConfig {
            security_protocol: std::env::var(KAFKA_LOG_SECURITY_PROTOCOL_ENV).ok(),
            ssl_truststore_location: std::env::var(KAFKA_LOG_SSL_TRUSTSTORE_LOCATION_ENV).ok(),
            ssl_truststore_password: std::env::var(KAFKA_LOG_SSL_TRUSTSTORE_PASSWORD_ENV).ok(),
            ssl_keystore_type: std::env::var(KAFKA_LOG_SSL_KEYSTORE_TYPE_ENV).ok(),
            ssl_keystore_location: std::env::var(KAFKA_LOG_SSL_KEYSTORE_LOCATION_ENV).ok(),
            ssl_keystore_password: std::env::var(KAFKA_LOG_SSL_KEYSTORE_PASSWORD_ENV).ok(),
            sasl_kerberos_service_name: std::env::var(KAFKA_LOG_SASL_KERBEROS_SERVICE_NAME_ENV).ok(),
            client_jaas_conf_path: std::env::var(KAFKA_LOG_CLIENT_JAAS_CONF_PATH_ENV).ok(),
            kerb5_conf_path: std::env::var(KAFKA_LOG_KERB5_CONF_PATH_ENV).ok(),
        };

        Ok(config)
    }
}

/// Environment variable names recognized by [`DeliveryConfig::from_env`].
pub const KAFKA_LOG_ENABLED_ENV: &str = "KAFKA_LOG_ENABLED";
pub const KAFKA_LOG_BROKER_LIST_ENV: &str = "KAFKA_LOG_BROKER_LIST";
pub const KAFKA_LOG_TOPIC_ENV: &str = "KAFKA_LOG_TOPIC";
pub const KAFKA_LOG_LEVEL_ENV: &str = "KAFKA_LOG_LEVEL";
pub const KAFKA_LOG_ASYNC_ENV: &str = "KAFKA_LOG_ASYNC";
pub const KAFKA_LOG_ASYNC_QUEUE_LENGTH_ENV: &str = "KAFKA_LOG_ASYNC_QUEUE_LENGTH";
pub const KAFKA_LOG_ASYNC_OVERFLOW_ACTION_ENV: &str = "KAFKA_LOG_ASYNC_OVERFLOW_ACTION";
pub const KAFKA_LOG_TIMESTAMP_PATTERN_ENV: &str = "KAFKA_LOG_TIMESTAMP_PATTERN";
pub const KAFKA_LOG_SYNC_SEND_ENV: &str = "KAFKA_LOG_SYNC_SEND";
pub const KAFKA_LOG_IGNORE_EXCEPTIONS_ENV: &str = "KAFKA_LOG_IGNORE_EXCEPTIONS";
pub const KAFKA_LOG_RETRIES_ENV: &str = "KAFKA_LOG_RETRIES";
pub const KAFKA_LOG_REQUIRED_NUM_ACKS_ENV: &str = "KAFKA_LOG_REQUIRED_NUM_ACKS";
pub const KAFKA_LOG_DELIVERY_TIMEOUT_MS_ENV: &str = "KAFKA_LOG_DELIVERY_TIMEOUT_MS";
pub const KAFKA_LOG_MAX_BLOCK_MS_ENV: &str = "KAFKA_LOG_MAX_BLOCK_MS";
pub const KAFKA_LOG_COMPRESSION_TYPE_ENV: &str = "KAFKA_LOG_COMPRESSION_TYPE";
pub const KAFKA_LOG_SECURITY_PROTOCOL_ENV: &str = "KAFKA_LOG_SECURITY_PROTOCOL";
pub const KAFKA_LOG_SSL_TRUSTSTORE_LOCATION_ENV: &str = "KAFKA_LOG_SSL_TRUSTSTORE_LOCATION";
pub const KAFKA_LOG_SSL_TRUSTSTORE_PASSWORD_ENV: &str = "KAFKA_LOG_SSL_TRUSTSTORE_PASSWORD";
pub const KAFKA_LOG_SSL_KEYSTORE_TYPE_ENV: &str = "KAFKA_LOG_SSL_KEYSTORE_TYPE";
pub const KAFKA_LOG_SSL_KEYSTORE_LOCATION_ENV: &str = "KAFKA_LOG_SSL_KEYSTORE_LOCATION";
pub const KAFKA_LOG_SSL_KEYSTORE_PASSWORD_ENV: &str = "KAFKA_LOG_SSL_KEYSTORE_PASSWORD";
pub const KAFKA_LOG_SASL_KERBEROS_SERVICE_NAME_ENV: &str = "KAFKA_LOG_SASL_KERBEROS_SERVICE_NAME";
pub const KAFKA_LOG_CLIENT_JAAS_CONF_PATH_ENV: &str = "KAFKA_LOG_CLIENT_JAAS_CONF_PATH";
pub const KAFKA_LOG_KERB5_CONF_PATH_ENV: &str = "KAFKA_LOG_KERB5_CONF_PATH";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        ),
        Err(_) => default,
    }
}

fn env_number<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber {
                key: key.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_config_is_always_valid() {
        assert!(DeliveryConfig::default().validate().is_ok());
    }

    #[test]
    fn enabled_config_requires_broker_list() {
        let config = DeliveryConfig {
            enabled: true,
            topic: "mylog".to_string(),
            ..DeliveryConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingBrokerList)
        ));
    }

    #[test]
    fn enabled_config_requires_topic() {
        let config = DeliveryConfig {
            enabled: true,
            broker_list: vec!["localhost:9092".to_string()],
            ..DeliveryConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MissingTopic)));
    }

    #[test]
    fn complete_config_validates() {
        let config = DeliveryConfig {
            enabled: true,
            broker_list: vec!["localhost:9092".to_string()],
            topic: "mylog".to_string(),
            ..DeliveryConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overflow_action_parses() {
        assert_eq!(
            " Discard ".parse::<OverflowAction>().unwrap(),
            OverflowAction::Discard
        );
        assert_eq!(
            "BLOCK".parse::<OverflowAction>().unwrap(),
            OverflowAction::Block
        );
        assert!("spill".parse::<OverflowAction>().is_err());
    }

    #[test]
    fn overflow_action_defaults_to_block() {
        assert_eq!(OverflowAction::default(), OverflowAction::Block);
    }

    #[test]
    fn defaults_are_conservative() {
        let config = DeliveryConfig::default();
        assert!(!config.enabled);
        assert!(config.ignore_exceptions);
        assert!(!config.sync_send);
        assert_eq!(config.level, Level::Info);
    }

    #[test]
    fn env_or_falls_back() {
        assert_eq!(env_or("KAFKA_LOG_TEST_UNSET_VAR", "fallback"), "fallback");
    }

    #[test]
    fn from_env_reads_the_main_knobs() {
        std::env::set_var(KAFKA_LOG_ENABLED_ENV, "true");
        std::env::set_var(KAFKA_LOG_BROKER_LIST_ENV, "b1:9092, b2:9092");
        std::env::set_var(KAFKA_LOG_TOPIC_ENV, "applog");
        std::env::set_var(KAFKA_LOG_LEVEL_ENV, "warn");
        std::env::set_var(KAFKA_LOG_ASYNC_ENV, "1");
        std::env::set_var(KAFKA_LOG_ASYNC_QUEUE_LENGTH_ENV, "256");
        std::env::set_var(KAFKA_LOG_ASYNC_OVERFLOW_ACTION_ENV, "discard");

        let config = DeliveryConfig::from_env().unwrap();
        assert!(config.enabled);
        assert_eq!(config.broker_list, vec!["b1:9092", "b2:9092"]);
        assert_eq!(config.topic, "applog");
        assert_eq!(config.level, Level::Warn);
        assert!(config.async_mode);
        assert_eq!(config.async_queue_length, Some(256));
        assert_eq!(config.overflow_action, Some(OverflowAction::Discard));

        for key in [
            KAFKA_LOG_ENABLED_ENV,
            KAFKA_LOG_BROKER_LIST_ENV,
            KAFKA_LOG_TOPIC_ENV,
            KAFKA_LOG_LEVEL_ENV,
            KAFKA_LOG_ASYNC_ENV,
            KAFKA_LOG_ASYNC_QUEUE_LENGTH_ENV,
            KAFKA_LOG_ASYNC_OVERFLOW_ACTION_ENV,
        ] {
            std::env::remove_var(key);
        }

        // Same test so the env mutations cannot race a parallel run.
        std::env::set_var(KAFKA_LOG_RETRIES_ENV, "many");
        let result = DeliveryConfig::from_env();
        std::env::remove_var(KAFKA_LOG_RETRIES_ENV);
        assert!(matches!(result, Err(ConfigError::InvalidNumber { .. })));
    }
}
