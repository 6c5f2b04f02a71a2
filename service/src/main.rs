mod control;
mod kafka;
mod pipeline;

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use image_toggle_common::config::Config;
use image_toggle_common::mode::ModeState;
use pipeline::{FrameProcessor, ProcessError};
use rdkafka::consumer::StreamConsumer;
use rdkafka::message::Message;
use rdkafka::producer::FutureProducer;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    let control_addr = config.control.addr();
    info!(
        brokers = config.kafka.brokers,
        input_topic = config.kafka.input_topic,
        output_topic = config.kafka.output_topic,
        group_id = config.kafka.group_id,
        control_addr,
        "starting image toggle service"
    );

    let mode = Arc::new(ModeState::new());

    let listener = match tokio::net::TcpListener::bind(&control_addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind control server to {control_addr}: {e}");
            std::process::exit(1);
        }
    };
    let control_state = Arc::clone(&mode);
    tokio::spawn(async move {
        if let Err(e) = control::serve(listener, control_state).await {
            error!(error = %e, "control server stopped");
        }
    });
    info!(addr = control_addr, "control server listening");

    let consumer = match kafka::create_consumer(&config.kafka) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to set up Kafka consumer");
            std::process::exit(1);
        }
    };
    let producer = match kafka::create_producer(&config.kafka.brokers, &config.kafka.compression)
    {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to create Kafka producer");
            std::process::exit(1);
        }
    };

    info!(topic = config.kafka.input_topic, "entering frame loop");
    run_frame_loop(consumer, producer, &config.kafka.output_topic, mode).await;
}

/// Consume frames one at a time, convert for the current mode and publish.
/// Frames that fail to decode or convert are dropped; the loop keeps going.
async fn run_frame_loop(
    consumer: StreamConsumer,
    producer: FutureProducer,
    output_topic: &str,
    mode: Arc<ModeState>,
) {
    let mut stream = consumer.stream();
    let mut processor = FrameProcessor::new();

    while let Some(result) = stream.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "Kafka consume error");
                continue;
            }
        };
        let Some(payload) = msg.payload() else {
            debug!("empty Kafka message, skipping");
            continue;
        };

        let frame = match processor.process(payload, mode.get()) {
            Ok(f) => f,
            Err(e @ ProcessError::Decode(_)) => {
                warn!(error = %e, offset = msg.offset(), "dropping undecodable frame");
                continue;
            }
            Err(e @ ProcessError::Convert(_)) => {
                error!(error = %e, offset = msg.offset(), "dropping frame");
                continue;
            }
        };

        match kafka::publish(&producer, output_topic, &frame).await {
            Ok(()) => processor.record_published(),
            Err(e) => warn!(error = %e, "failed to publish converted frame"),
        }

        let stats = processor.stats();
        if stats.received % 100 == 0 {
            debug!(
                received = stats.received,
                published = stats.published,
                decode_failures = stats.decode_failures,
                unsupported = stats.unsupported,
                "frames processed"
            );
        }
    }
}
