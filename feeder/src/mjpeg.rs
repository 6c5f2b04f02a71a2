use bytes::{Buf, Bytes, BytesMut};
use chrono::Utc;
use futures_util::StreamExt;
use image_toggle_common::frame::FrameHeader;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::raster::rasterize;
use crate::FeederError;

static SEQ_COUNTER: AtomicU64 = AtomicU64::new(0);

const BOUNDARY: &[u8] = b"--frame\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Where decoded frames go and how they are labelled.
pub struct Sink<'a> {
    pub producer: &'a FutureProducer,
    pub topic: &'a str,
    pub encoding: &'a str,
    pub frame_id: &'a str,
}

pub fn create_producer(brokers: &str, compression: &str) -> Result<FutureProducer, FeederError> {
    ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("message.max.bytes", "10485760")
        .set("compression.type", compression)
        .set("linger.ms", "5")
        .set("batch.num.messages", "10")
        .set("queue.buffering.max.messages", "1000")
        .set("request.timeout.ms", "5000")
        .create()
        .map_err(FeederError::KafkaCreate)
}

/// Parse state for the MJPEG multipart stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Looking for the boundary marker `--frame\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of part headers.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental splitter for `multipart/x-mixed-replace` camera streams.
///
/// A part is emitted once the boundary that follows it has arrived, so the
/// last part of a stream that ends without a trailing boundary is dropped.
pub struct MjpegParser {
    buffer: BytesMut,
    state: ParseState,
    /// Offset into `buffer` already searched for the next boundary.
    scanned: usize,
}

impl Default for MjpegParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MjpegParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            scanned: 0,
        }
    }

    /// Feed one network chunk and return every JPEG completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);
        let mut parts = Vec::new();

        loop {
            match self.state {
                ParseState::SeekingBoundary => match find(&self.buffer, BOUNDARY) {
                    Some(pos) => {
                        self.buffer.advance(pos + BOUNDARY.len());
                        self.state = ParseState::SeekingHeaderEnd;
                    }
                    None => {
                        // Keep a tail in case the boundary spans chunks.
                        let keep = BOUNDARY.len() - 1;
                        if self.buffer.len() > keep {
                            self.buffer.advance(self.buffer.len() - keep);
                        }
                        break;
                    }
                },
                ParseState::SeekingHeaderEnd => match find(&self.buffer, HEADER_END) {
                    Some(pos) => {
                        self.buffer.advance(pos + HEADER_END.len());
                        self.scanned = 0;
                        self.state = ParseState::CollectingJpeg;
                    }
                    None => break,
                },
                ParseState::CollectingJpeg => {
                    let Some(pos) = find(&self.buffer[self.scanned..], BOUNDARY) else {
                        self.scanned = self.buffer.len().saturating_sub(BOUNDARY.len() - 1);
                        break;
                    };
                    let boundary_at = self.scanned + pos;
                    let end = if self.buffer[..boundary_at].ends_with(b"\r\n") {
                        boundary_at - 2
                    } else {
                        boundary_at
                    };
                    let jpeg = self.buffer.split_to(end).freeze();
                    self.buffer.advance(boundary_at - end + BOUNDARY.len());
                    if !jpeg.is_empty() {
                        parts.push(jpeg);
                    }
                    self.state = ParseState::SeekingHeaderEnd;
                }
            }
        }
        parts
    }
}

/// Consume the MJPEG stream and publish every frame as a raw image.
/// Reconnects with exponential backoff on failure.
pub async fn run_mjpeg_feeder(stream_url: &str, sink: &Sink<'_>) {
    let mut backoff = Duration::from_secs(2);
    let max_backoff = Duration::from_secs(30);

    loop {
        info!(url = stream_url, "connecting to MJPEG stream");
        match consume_stream(stream_url, sink).await {
            Ok(()) => {
                info!("stream ended cleanly, reconnecting");
                backoff = Duration::from_secs(2);
            }
            Err(e) => {
                error!(error = %e, "stream error, reconnecting in {:?}", backoff);
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(max_backoff);
    }
}

async fn consume_stream(url: &str, sink: &Sink<'_>) -> Result<(), FeederError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(FeederError::HttpConnect)?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(FeederError::HttpConnect)?;

    if !response.status().is_success() {
        return Err(FeederError::HttpStatus(response.status().as_u16()));
    }

    info!(status = %response.status(), "connected to MJPEG stream");

    let mut byte_stream = response.bytes_stream();
    let mut parser = MjpegParser::new();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(FeederError::HttpStream)?;
        for jpeg in parser.push(&chunk) {
            publish_jpeg(&jpeg, sink).await;
        }
    }

    Ok(())
}

/// Polling fallback: periodically fetch single snapshots.
pub async fn run_polling_feeder(frame_url: &str, sink: &Sink<'_>, interval: Duration) {
    let client = reqwest::Client::new();
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        match client.get(frame_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(jpeg) => publish_jpeg(&jpeg, sink).await,
                Err(e) => warn!(error = %e, "failed to read camera frame body"),
            },
            Ok(resp) => {
                warn!(status = %resp.status(), "non-success response from camera");
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch camera frame");
            }
        }
    }
}

/// Decode one JPEG into the configured layout and send it. Failures are
/// logged and the frame is skipped.
async fn publish_jpeg(jpeg: &[u8], sink: &Sink<'_>) {
    let seq = SEQ_COUNTER.fetch_add(1, Ordering::Relaxed);
    let header = FrameHeader {
        seq,
        captured_at_ms: Utc::now().timestamp_millis(),
        frame_id: sink.frame_id.to_string(),
    };

    let frame = match rasterize(jpeg, sink.encoding, header) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, seq, "failed to rasterize camera frame, skipping");
            return;
        }
    };

    let payload = frame.serialize();
    let key = frame.message_key();
    debug!(seq, bytes = payload.len(), "producing frame to Kafka");

    let record = FutureRecord::to(sink.topic).key(&key).payload(&payload);
    if let Err((e, _)) = sink.producer.send(record, Duration::from_secs(5)).await {
        warn!(error = %e, seq, "failed to produce frame to Kafka");
    }
}

/// Find the position of `needle` in `haystack`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
