use image_toggle_common::convert::{convert, ConvertError};
use image_toggle_common::frame::{Frame, FrameError};
use image_toggle_common::mode::Mode;

/// Why an inbound frame was dropped instead of published.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to decode frame: {0}")]
    Decode(#[from] FrameError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

/// Running totals for the frame loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessorStats {
    pub received: u64,
    pub converted: u64,
    pub published: u64,
    pub decode_failures: u64,
    pub unsupported: u64,
}

/// Decodes inbound payloads and converts them for the current mode.
///
/// Holds no per-frame state besides counters; each payload is handled
/// independently.
#[derive(Debug, Default)]
pub struct FrameProcessor {
    stats: ProcessorStats,
}

impl FrameProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, payload: &[u8], mode: Mode) -> Result<Frame, ProcessError> {
        self.stats.received += 1;
        let result = Frame::deserialize(payload)
            .map_err(ProcessError::from)
            .and_then(|frame| convert(&frame, mode).map_err(ProcessError::from));
        match &result {
            Ok(_) => self.stats.converted += 1,
            Err(ProcessError::Decode(_)) => self.stats.decode_failures += 1,
            Err(ProcessError::Convert(_)) => self.stats.unsupported += 1,
        }
        result
    }

    pub fn record_published(&mut self) {
        self.stats.published += 1;
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }
}
