mod mjpeg;
mod raster;

use image_toggle_common::config::Config;
use image_toggle_common::frame::FrameError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum FeederError {
    #[error("failed to create Kafka producer: {0}")]
    KafkaCreate(rdkafka::error::KafkaError),
    #[error("HTTP connection failed: {0}")]
    HttpConnect(reqwest::Error),
    #[error("HTTP stream error: {0}")]
    HttpStream(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("failed to decode camera image: {0}")]
    Decode(image::ImageError),
    #[error("cannot publish camera frames as {0:?}")]
    UnsupportedEncoding(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

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

    let Some(stream) = config.stream.as_ref() else {
        error!("config has no [stream] section, nothing to feed");
        std::process::exit(1);
    };
    if !raster::supports(&stream.encoding) {
        error!(
            encoding = stream.encoding,
            supported = ?raster::SUPPORTED,
            "unsupported stream encoding"
        );
        std::process::exit(1);
    }
    if !(stream.fps > 0.0 && stream.fps.is_finite()) {
        error!(fps = stream.fps, "stream fps must be positive");
        std::process::exit(1);
    }

    info!(
        brokers = config.kafka.brokers,
        topic = config.kafka.input_topic,
        mode = stream.mode,
        encoding = stream.encoding,
        frame_id = stream.frame_id,
        "starting camera feeder"
    );

    let producer = match mjpeg::create_producer(&config.kafka.brokers, &config.kafka.compression) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to create Kafka producer");
            std::process::exit(1);
        }
    };

    let sink = mjpeg::Sink {
        producer: &producer,
        topic: &config.kafka.input_topic,
        encoding: &stream.encoding,
        frame_id: &stream.frame_id,
    };

    match stream.mode.as_str() {
        "mjpeg" => {
            let url = format!(
                "{}?quality={}&fps={}",
                stream.url, stream.quality, stream.fps
            );
            mjpeg::run_mjpeg_feeder(&url, &sink).await;
        }
        "polling" => {
            let url = format!(
                "{}?quality={}",
                stream.url.replace("/stream", "/frame"),
                stream.quality
            );
            let interval = Duration::from_secs_f64(1.0 / stream.fps);
            mjpeg::run_polling_feeder(&url, &sink, interval).await;
        }
        other => {
            error!(mode = other, "unknown stream mode, expected 'mjpeg' or 'polling'");
            std::process::exit(1);
        }
    }
}
