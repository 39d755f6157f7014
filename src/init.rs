use crate::config::{ConfigError, DeliveryConfig};
use crate::format::{FormatOverrides, FormatStrategy};
use crate::handler::{DirectHandler, LogHandler};
use crate::layer::KafkaLogLayer;
use crate::overflow::AsyncHandler;
use crate::publisher::{BrokerClient, BrokerPublisher};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Build the pipeline handler from configuration.
///
/// **Returns**
/// - `Ok(None)` when `enabled = false`: no handler exists at all, the
///   caller installs nothing.
/// - `Ok(Some(handler))` with the direct handler, wrapped in the
///   bounded-queue async decorator when `async = true`.
/// - `Err(..)` when a required field is missing or the broker client
///   cannot be built.
pub fn build_handler(
    config: &DeliveryConfig,
    overrides: FormatOverrides,
) -> Result<Option<LogHandler>, ConfigError> {
    if !config.enabled {
        return Ok(None);
    }
    config.validate()?;
    let client = make_client(config)?;
    build_handler_with_client(config, overrides, client)
}

/// Same as [`build_handler`] but with an injected broker capability.
/// This is the seam tests use to observe the publish path.
pub fn build_handler_with_client(
    config: &DeliveryConfig,
    overrides: FormatOverrides,
    client: Arc<dyn BrokerClient>,
) -> Result<Option<LogHandler>, ConfigError> {
    if !config.enabled {
        return Ok(None);
    }
    config.validate()?;

    let publisher = BrokerPublisher::new(client, config);
    let strategy = FormatStrategy::resolve(overrides, config.timestamp_pattern.as_deref());
    let direct = DirectHandler::new(
        strategy,
        publisher,
        config.level,
        config.sync_send,
        config.ignore_exceptions,
    );

    let handler = if config.async_mode {
        LogHandler::Async(AsyncHandler::new(
            direct,
            config.async_queue_length,
            config.overflow_action.unwrap_or_default(),
        ))
    } else {
        LogHandler::Direct(direct)
    };

    Ok(Some(handler))
}

fn make_client(config: &DeliveryConfig) -> Result<Arc<dyn BrokerClient>, ConfigError> {
    #[cfg(feature = "kafka")]
    {
        Ok(Arc::new(crate::kafka::KafkaClient::from_config(config)?))
    }

    #[cfg(not(feature = "kafka"))]
    {
        let _ = config;
        Err(ConfigError::KafkaFeatureDisabled)
    }
}

/// Build the handler and install it as a [`KafkaLogLayer`] in the
/// global tracing subscriber.
///
/// With `enable_stdout = true` a `fmt` layer is stacked on top so
/// events remain visible on the console. Returns `Ok(false)` without
/// installing anything when the config is disabled. Records still
/// queued at process exit are delivered best-effort only.
pub fn init_pipeline(
    config: &DeliveryConfig,
    overrides: FormatOverrides,
    enable_stdout: bool,
) -> Result<bool, ConfigError> {
    let Some(handler) = build_handler(config, overrides)? else {
        return Ok(false);
    };

    let layer = KafkaLogLayer::new(handler);
    if enable_stdout {
        let subscriber = Registry::default()
            .with(layer)
            .with(tracing_subscriber::fmt::layer());
        tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
    }
    Ok(true)
}
