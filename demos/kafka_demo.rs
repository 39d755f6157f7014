use kafka_log_pipe::config::DeliveryConfig;
use kafka_log_pipe::format::FormatOverrides;
use kafka_log_pipe::init::init_pipeline;
use std::time::Duration;
use tracing::{error, info, warn};

/// End-to-end wiring demo against a real broker.
///
/// Example environment:
///   KAFKA_LOG_ENABLED=true KAFKA_LOG_BROKER_LIST=localhost:9092 \
///   KAFKA_LOG_TOPIC=mylog KAFKA_LOG_ASYNC=true cargo run --example kafka_demo
fn main() {
    let config = DeliveryConfig::from_env().expect("invalid KAFKA_LOG_* configuration");

    let installed =
        init_pipeline(&config, FormatOverrides::default(), true).expect("build kafka log pipeline");
    if !installed {
        eprintln!("kafka logging is disabled, set KAFKA_LOG_ENABLED=true");
        return;
    }

    info!(service = "kafka-demo", "pipeline installed");
    warn!(request_id = "r-1", "something looks off");
    error!(request_id = "r-1", "simulated failure shipped to the broker");

    // Give the drain worker time to flush before the process exits.
    std::thread::sleep(Duration::from_secs(2));
}
