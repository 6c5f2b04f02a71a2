//! Frame-format conversion between color and grayscale.
//!
//! [`convert`] looks up the transform for `(mode, channel count)` in an
//! explicit table and applies it, producing a re-tagged frame:
//!
//! | mode      | 1 ch          | 2 ch            | 3 ch          | 4 ch          |
//! |-----------|---------------|-----------------|---------------|---------------|
//! | grayscale | identity      | first channel   | BT.601 luma   | luma, no alpha|
//! | color     | replicate     | zero-chroma YUV | identity      | drop alpha    |
//!
//! Grayscale output is always `mono8`, color output always `bgr8`. Three and
//! four channel input is read positionally as B, G, R (, A).

use bytes::Bytes;
use tracing::debug;

use crate::encoding::{BGR8, MONO8};
use crate::frame::Frame;
use crate::mode::Mode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("unsupported number of channels: {0}")]
    UnsupportedChannelCount(usize),
}

/// The four channel-count classes the dispatcher knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelClass {
    Mono,
    /// Luminance plus one combined chroma channel.
    TwoChannel,
    Color,
    ColorAlpha,
}

impl ChannelClass {
    pub fn of(channels: usize) -> Result<Self, ConvertError> {
        match channels {
            1 => Ok(ChannelClass::Mono),
            2 => Ok(ChannelClass::TwoChannel),
            3 => Ok(ChannelClass::Color),
            4 => Ok(ChannelClass::ColorAlpha),
            n => Err(ConvertError::UnsupportedChannelCount(n)),
        }
    }
}

/// A per-pixel transformation selected by the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Output aliases the input buffer.
    Identity,
    /// Keep channel 0 of a two-channel frame.
    FirstChannel,
    /// Weighted BT.601 sum of the first three channels.
    Luma,
    /// Copy the single channel into B, G and R.
    ReplicateLuma,
    /// Treat channel 0 as Y with both chroma channels set to zero, then
    /// convert YUV to BGR. Lossy placeholder for two-channel input, not a
    /// colorimetric conversion.
    ZeroChromaYuv,
    /// Keep the first three channels.
    DropAlpha,
}

/// Dispatch table: which transform and output tag apply to a frame.
pub fn plan(mode: Mode, class: ChannelClass) -> (Transform, &'static str) {
    use ChannelClass::*;
    match (mode, class) {
        (Mode::Grayscale, Mono) => (Transform::Identity, MONO8),
        (Mode::Grayscale, TwoChannel) => (Transform::FirstChannel, MONO8),
        (Mode::Grayscale, Color) => (Transform::Luma, MONO8),
        (Mode::Grayscale, ColorAlpha) => (Transform::Luma, MONO8),
        (Mode::Color, Mono) => (Transform::ReplicateLuma, BGR8),
        (Mode::Color, TwoChannel) => (Transform::ZeroChromaYuv, BGR8),
        (Mode::Color, Color) => (Transform::Identity, BGR8),
        (Mode::Color, ColorAlpha) => (Transform::DropAlpha, BGR8),
    }
}

/// Convert `frame` for the given mode.
///
/// Fails only when the channel count is outside 1..=4, in which case no
/// work is done.
pub fn convert(frame: &Frame, mode: Mode) -> Result<Frame, ConvertError> {
    let class = ChannelClass::of(frame.channels())?;
    let (transform, tag) = plan(mode, class);
    let src = frame.data();
    let stride = frame.channels();

    let (channels, data): (usize, Bytes) = match transform {
        Transform::Identity => {
            if mode.is_grayscale() {
                debug!(seq = frame.header().seq, "image is already grayscale");
            }
            (stride, src.clone())
        }
        Transform::FirstChannel => {
            debug!(seq = frame.header().seq, "processing 2-channel image for grayscale");
            let out: Vec<u8> = src.chunks_exact(stride).map(|px| px[0]).collect();
            (1, out.into())
        }
        Transform::Luma => {
            let out: Vec<u8> = src
                .chunks_exact(stride)
                .map(|px| luma(px[0], px[1], px[2]))
                .collect();
            (1, out.into())
        }
        Transform::ReplicateLuma => {
            let out: Vec<u8> = src.iter().flat_map(|&y| [y, y, y]).collect();
            (3, out.into())
        }
        Transform::ZeroChromaYuv => {
            debug!(seq = frame.header().seq, "processing 2-channel image for color");
            let out: Vec<u8> = src
                .chunks_exact(stride)
                .flat_map(|px| yuv_to_bgr(px[0], 0, 0))
                .collect();
            (3, out.into())
        }
        Transform::DropAlpha => {
            let out: Vec<u8> = src
                .chunks_exact(stride)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            (3, out.into())
        }
    };

    Ok(frame.derive(channels, tag, data))
}

const SHIFT: u32 = 14;
const ROUND: i32 = 1 << (SHIFT - 1);

// BT.601 luma weights scaled by 2^14.
const B2Y: i32 = 1868;
const G2Y: i32 = 9617;
const R2Y: i32 = 4899;

// YUV -> RGB coefficients scaled by 2^14 (2.032, -0.395, -0.581, 1.140).
const U2B: i32 = 33292;
const U2G: i32 = -6472;
const V2G: i32 = -9519;
const V2R: i32 = 18678;
const CHROMA_OFFSET: i32 = 128;

/// 8-bit luma of one B, G, R pixel.
pub fn luma(b: u8, g: u8, r: u8) -> u8 {
    let y = (b as i32 * B2Y + g as i32 * G2Y + r as i32 * R2Y + ROUND) >> SHIFT;
    saturate(y)
}

/// Convert one Y, U, V sample triple to B, G, R. Chroma is offset by 128,
/// so `u = v = 0` is not neutral gray.
pub fn yuv_to_bgr(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as i32;
    let u = u as i32 - CHROMA_OFFSET;
    let v = v as i32 - CHROMA_OFFSET;
    let descale = |x: i32| (x + ROUND) >> SHIFT;
    [
        saturate(y + descale(u * U2B)),
        saturate(y + descale(u * U2G + v * V2G)),
        saturate(y + descale(v * V2R)),
    ]
}

fn saturate(x: i32) -> u8 {
    x.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameHeader;
    use crate::mode::ModeState;
    use std::sync::Arc;

    fn frame(width: u32, height: u32, channels: usize, tag: &str, data: Vec<u8>) -> Frame {
        let header = FrameHeader {
            seq: 1,
            captured_at_ms: 1708300000000,
            frame_id: "camera".into(),
        };
        Frame::with_channels(header, width, height, channels, tag, data).unwrap()
    }

    fn sample(channels: usize) -> Frame {
        let data = (0..4 * channels).map(|i| (i * 37 % 256) as u8).collect();
        let tag = match channels {
            1 => "mono8",
            2 => "yuv-2ch",
            3 => "bgr8",
            4 => "bgra8",
            _ => "8UC5",
        };
        frame(2, 2, channels, tag, data)
    }

    #[test]
    fn output_shape_and_tag_for_every_class() {
        for channels in 1..=4 {
            let input = sample(channels);

            let gray = convert(&input, Mode::Grayscale).unwrap();
            assert_eq!(gray.encoding(), "mono8", "{channels} channels -> gray");
            assert_eq!(gray.channels(), 1);
            assert_eq!(gray.data().len(), 4);

            let color = convert(&input, Mode::Color).unwrap();
            assert_eq!(color.encoding(), "bgr8", "{channels} channels -> color");
            assert_eq!(color.channels(), 3);
            assert_eq!(color.data().len(), 12);

            assert_eq!(gray.width(), 2);
            assert_eq!(color.height(), 2);
            assert_eq!(color.header(), input.header());
        }
    }

    #[test]
    fn already_in_target_format_is_unchanged() {
        let mono = sample(1);
        let out = convert(&mono, Mode::Grayscale).unwrap();
        assert_eq!(out.data(), mono.data());

        let bgr = sample(3);
        let out = convert(&bgr, Mode::Color).unwrap();
        assert_eq!(out.data(), bgr.data());
    }

    #[test]
    fn identity_relabels_tag() {
        let rgb = frame(1, 1, 3, "rgb8", vec![1, 2, 3]);
        let out = convert(&rgb, Mode::Color).unwrap();
        assert_eq!(out.encoding(), "bgr8");
        assert_eq!(&out.data()[..], &[1, 2, 3]);

        let mono = frame(1, 1, 1, "8UC1", vec![9]);
        assert_eq!(convert(&mono, Mode::Grayscale).unwrap().encoding(), "mono8");
    }

    #[test]
    fn white_bgr_to_gray() {
        let white = frame(2, 2, 3, "bgr8", vec![255; 12]);
        let out = convert(&white, Mode::Grayscale).unwrap();
        assert_eq!(out.encoding(), "mono8");
        assert_eq!(out.channels(), 1);
        assert_eq!((out.width(), out.height()), (2, 2));
        assert_eq!(&out.data()[..], &[255; 4]);
    }

    #[test]
    fn luma_uses_bt601_weights() {
        assert_eq!(luma(255, 0, 0), 29);
        assert_eq!(luma(0, 255, 0), 150);
        assert_eq!(luma(0, 0, 255), 76);
        assert_eq!(luma(0, 0, 0), 0);
    }

    #[test]
    fn bgra_to_gray_ignores_alpha() {
        let opaque = frame(1, 1, 4, "bgra8", vec![10, 20, 30, 255]);
        let clear = frame(1, 1, 4, "bgra8", vec![10, 20, 30, 0]);
        let a = convert(&opaque, Mode::Grayscale).unwrap();
        let b = convert(&clear, Mode::Grayscale).unwrap();
        assert_eq!(a.data(), b.data());
        assert_eq!(&a.data()[..], &[luma(10, 20, 30)]);
    }

    #[test]
    fn mono_to_bgr_replicates() {
        let mono = frame(2, 2, 1, "mono8", vec![0, 128, 255, 64]);
        let out = convert(&mono, Mode::Color).unwrap();
        assert_eq!(out.encoding(), "bgr8");
        assert_eq!(out.channels(), 3);
        assert_eq!((out.width(), out.height()), (2, 2));
        assert_eq!(
            &out.data()[..],
            &[0, 0, 0, 128, 128, 128, 255, 255, 255, 64, 64, 64]
        );
    }

    #[test]
    fn bgra_to_bgr_drops_alpha() {
        let bgra = frame(2, 1, 4, "bgra8", vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let out = convert(&bgra, Mode::Color).unwrap();
        assert_eq!(&out.data()[..], &[1, 2, 3, 5, 6, 7]);
    }

    #[test]
    fn two_channel_gray_keeps_luminance() {
        let yuv = frame(2, 1, 2, "yuv-2ch", vec![40, 200, 90, 17]);
        let out = convert(&yuv, Mode::Grayscale).unwrap();
        assert_eq!(&out.data()[..], &[40, 90]);
    }

    #[test]
    fn two_channel_color_is_zero_chroma_reconstruction() {
        // Same luminance, different second channel: chroma input is discarded.
        let yuv = frame(3, 1, 2, "yuv-2ch", vec![200, 0, 200, 255, 100, 7]);
        let out = convert(&yuv, Mode::Color).unwrap();
        let px: Vec<&[u8]> = out.data().chunks_exact(3).collect();
        assert_eq!(px[0], px[1]);

        // Each pixel is the YUV->BGR mapping of (Y, 0, 0).
        assert_eq!(px[0], &yuv_to_bgr(200, 0, 0));
        assert_eq!(px[2], &yuv_to_bgr(100, 0, 0));
    }

    #[test]
    fn zero_chroma_mapping_values() {
        // Zero chroma sits 128 below neutral: blue saturates to 0, green
        // is lifted by 125 and red lowered by 146.
        assert_eq!(yuv_to_bgr(0, 0, 0), [0, 125, 0]);
        assert_eq!(yuv_to_bgr(100, 0, 0), [0, 225, 0]);
        assert_eq!(yuv_to_bgr(200, 0, 0), [0, 255, 54]);
        assert_eq!(yuv_to_bgr(255, 0, 0), [0, 255, 109]);
        // Neutral chroma leaves luminance untouched.
        assert_eq!(yuv_to_bgr(77, 128, 128), [77, 77, 77]);
    }

    #[test]
    fn color_gray_color_keeps_shape_only() {
        let bgr = frame(2, 2, 3, "bgr8", (0u8..12).map(|v| v * 20).collect());
        let gray = convert(&bgr, Mode::Grayscale).unwrap();
        let back = convert(&gray, Mode::Color).unwrap();
        assert_eq!(back.encoding(), "bgr8");
        assert_eq!(back.channels(), 3);
        assert_eq!(back.data().len(), bgr.data().len());
    }

    #[test]
    fn five_channels_unsupported() {
        let five = sample(5);
        for mode in [Mode::Grayscale, Mode::Color] {
            assert_eq!(
                convert(&five, mode),
                Err(ConvertError::UnsupportedChannelCount(5))
            );
        }
    }

    #[test]
    fn plan_table() {
        assert_eq!(
            plan(Mode::Grayscale, ChannelClass::ColorAlpha),
            (Transform::Luma, "mono8")
        );
        assert_eq!(
            plan(Mode::Color, ChannelClass::TwoChannel),
            (Transform::ZeroChromaYuv, "bgr8")
        );
        assert_eq!(ChannelClass::of(0), Err(ConvertError::UnsupportedChannelCount(0)));
    }

    #[test]
    fn mode_switch_visible_while_converting() {
        let state = Arc::new(ModeState::new());
        let worker = {
            let state = Arc::clone(&state);
            std::thread::spawn(move || {
                let input = sample(3);
                for _ in 0..1_000 {
                    let out = convert(&input, state.get()).unwrap();
                    assert!(out.encoding() == "mono8" || out.encoding() == "bgr8");
                }
            })
        };
        state.set(Mode::Grayscale);
        assert_eq!(state.get(), Mode::Grayscale);
        worker.join().unwrap();
        assert_eq!(state.get(), Mode::Grayscale);
    }
}
