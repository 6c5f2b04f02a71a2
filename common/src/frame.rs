use bytes::Bytes;

use crate::encoding::{self, Lookup};

/// Per-frame metadata carried through conversion untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameHeader {
    pub seq: u64,
    pub captured_at_ms: i64,
    /// Name of the camera or coordinate frame the image came from.
    pub frame_id: String,
}

/// One raw image: interleaved 8-bit samples, rows tightly packed.
///
/// A `Frame` is immutable once built. Every constructor checks that
/// `data.len() == width * height * channels`.
///
/// Binary wire format (Kafka message payload, all integers big-endian):
///
///   [0]        version = 0x01
///   [1..9]     captured_at_ms  (i64)
///   [9..17]    seq             (u64)
///   [17..21]   width           (u32)
///   [21..25]   height          (u32)
///   [25..29]   step            (u32, bytes per row incl. padding)
///   [29..31]   encoding_len    (u16)
///   [..]       encoding        (UTF-8)
///   [..+2]     frame_id_len    (u16)
///   [..]       frame_id        (UTF-8)
///   [..]       pixel rows      (height * step bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    width: u32,
    height: u32,
    channels: usize,
    encoding: String,
    data: Bytes,
}

const WIRE_VERSION: u8 = 0x01;
const FIXED_HEADER_SIZE: usize = 29; // 1 version + 8 ts + 8 seq + 4 width + 4 height + 4 step

impl Frame {
    /// Build a frame whose channel count is implied by `encoding`.
    pub fn new(
        header: FrameHeader,
        width: u32,
        height: u32,
        encoding: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Result<Self, FrameError> {
        let encoding = encoding.into();
        let channels = match encoding::lookup(&encoding) {
            Lookup::Channels(n) => n,
            Lookup::UnsupportedDepth => return Err(FrameError::UnsupportedDepth(encoding)),
            Lookup::Unknown => return Err(FrameError::UnknownEncoding(encoding)),
        };
        Self::with_channels(header, width, height, channels, encoding, data)
    }

    /// Build a frame with an explicit channel count, bypassing the tag table.
    pub fn with_channels(
        header: FrameHeader,
        width: u32,
        height: u32,
        channels: usize,
        encoding: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Result<Self, FrameError> {
        let encoding = encoding.into();
        let data = data.into();
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyImage { width, height });
        }
        check_field("encoding", &encoding)?;
        check_field("frame_id", &header.frame_id)?;
        let expected = packed_len(width, height, channels);
        if expected != Some(data.len()) {
            return Err(FrameError::SizeMismatch {
                got: data.len() as u64,
                expected: expected.map_or(u64::MAX, |n| n as u64),
            });
        }
        Ok(Self {
            header,
            width,
            height,
            channels,
            encoding,
            data,
        })
    }

    /// A converted frame with the same header and dimensions. `data` must
    /// already be packed for `channels`.
    pub(crate) fn derive(&self, channels: usize, encoding: &str, data: Bytes) -> Self {
        debug_assert_eq!(data.len(), self.pixel_count() * channels);
        Self {
            header: self.header.clone(),
            width: self.width,
            height: self.height,
            channels,
            encoding: encoding.to_owned(),
            data,
        }
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Interleaved pixel samples, `channels` bytes per pixel.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes in one packed row.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.channels
    }

    /// Kafka message key: `{frame_id}:{captured_at_ms}`.
    pub fn message_key(&self) -> String {
        format!("{}:{}", self.header.frame_id, self.header.captured_at_ms)
    }

    // -- Serialization ----------------------------------------------------------

    /// Serialize to the binary wire format. Rows are written without padding.
    pub fn serialize(&self) -> Vec<u8> {
        let encoding = self.encoding.as_bytes();
        let frame_id = self.header.frame_id.as_bytes();
        let mut buf = Vec::with_capacity(
            FIXED_HEADER_SIZE + 4 + encoding.len() + frame_id.len() + self.data.len(),
        );
        buf.push(WIRE_VERSION);
        buf.extend_from_slice(&self.header.captured_at_ms.to_be_bytes());
        buf.extend_from_slice(&self.header.seq.to_be_bytes());
        buf.extend_from_slice(&self.width.to_be_bytes());
        buf.extend_from_slice(&self.height.to_be_bytes());
        buf.extend_from_slice(&(self.row_len() as u32).to_be_bytes());
        // Field lengths are bounded by check_field at construction.
        buf.extend_from_slice(&(encoding.len() as u16).to_be_bytes());
        buf.extend_from_slice(encoding);
        buf.extend_from_slice(&(frame_id.len() as u16).to_be_bytes());
        buf.extend_from_slice(frame_id);
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Deserialize a wire payload into a packed frame.
    ///
    /// Row padding (`step > width * channels`) is stripped. Any payload that
    /// cannot be read as pixels in its declared format is a `FrameError`.
    pub fn deserialize(data: &[u8]) -> Result<Self, FrameError> {
        let mut reader = Reader::new(data);
        let version = reader.u8()?;
        if version != WIRE_VERSION {
            return Err(FrameError::BadVersion(version));
        }
        let captured_at_ms = i64::from_be_bytes(reader.array()?);
        let seq = u64::from_be_bytes(reader.array()?);
        let width = u32::from_be_bytes(reader.array()?);
        let height = u32::from_be_bytes(reader.array()?);
        let step = u32::from_be_bytes(reader.array()?) as usize;
        let encoding = reader.string("encoding")?;
        let frame_id = reader.string("frame_id")?;
        let pixels = reader.rest();

        let channels = match encoding::lookup(&encoding) {
            Lookup::Channels(n) => n,
            Lookup::UnsupportedDepth => return Err(FrameError::UnsupportedDepth(encoding)),
            Lookup::Unknown => return Err(FrameError::UnknownEncoding(encoding)),
        };
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyImage { width, height });
        }

        let row = (width as usize)
            .checked_mul(channels)
            .ok_or(FrameError::SizeMismatch {
                got: pixels.len() as u64,
                expected: u64::MAX,
            })?;
        if step < row {
            return Err(FrameError::StepTooSmall { step, row });
        }
        let expected = step as u64 * height as u64;
        if pixels.len() as u64 != expected {
            return Err(FrameError::SizeMismatch {
                got: pixels.len() as u64,
                expected,
            });
        }

        let packed = if step == row {
            Bytes::copy_from_slice(pixels)
        } else {
            let mut packed = Vec::with_capacity(row * height as usize);
            for line in pixels.chunks_exact(step) {
                packed.extend_from_slice(&line[..row]);
            }
            Bytes::from(packed)
        };

        let header = FrameHeader {
            seq,
            captured_at_ms,
            frame_id,
        };
        Self::with_channels(header, width, height, channels, encoding, packed)
    }
}

fn packed_len(width: u32, height: u32, channels: usize) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(channels)
}

fn check_field(field: &'static str, value: &str) -> Result<(), FrameError> {
    if value.len() > u16::MAX as usize {
        return Err(FrameError::FieldTooLong {
            field,
            len: value.len(),
        });
    }
    Ok(())
}

/// Cursor over a wire payload that reports how much it needed on underrun.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FrameError> {
        let end = self.pos + n;
        if self.data.len() < end {
            return Err(FrameError::TooShort {
                got: self.data.len(),
                expected: end,
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, FrameError> {
        Ok(self.take(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FrameError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn string(&mut self, field: &'static str) -> Result<String, FrameError> {
        let len = u16::from_be_bytes(self.array()?) as usize;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| FrameError::InvalidUtf8(field))
    }

    fn rest(self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame payload too short: got {got} bytes, expected at least {expected}")]
    TooShort { got: usize, expected: usize },
    #[error("unsupported wire version {0:#04x}")]
    BadVersion(u8),
    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),
    #[error("{field} is {len} bytes, longer than the wire format allows")]
    FieldTooLong { field: &'static str, len: usize },
    #[error("unknown encoding {0:?}")]
    UnknownEncoding(String),
    #[error("encoding {0:?} is not 8 bits per sample")]
    UnsupportedDepth(String),
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("row step {step} is smaller than a packed row of {row} bytes")]
    StepTooSmall { step: usize, row: usize },
    #[error("pixel buffer is {got} bytes, expected {expected}")]
    SizeMismatch { got: u64, expected: u64 },
}
