use std::io::Cursor;

use image::{DynamicImage, ImageReader};
use image_toggle_common::encoding::{BGR8, BGRA8, MONO8, RGB8, RGBA8};
use image_toggle_common::frame::{Frame, FrameHeader};

use crate::FeederError;

/// Layouts a decoded camera image can be published in.
pub const SUPPORTED: &[&str] = &[BGR8, RGB8, BGRA8, RGBA8, MONO8];

pub fn supports(encoding: &str) -> bool {
    SUPPORTED.iter().any(|s| *s == encoding)
}

/// Decode a compressed camera image (JPEG, or any format `image` can
/// sniff) into a raw frame laid out as `encoding`.
pub fn rasterize(encoded: &[u8], encoding: &str, header: FrameHeader) -> Result<Frame, FeederError> {
    let img = ImageReader::new(Cursor::new(encoded))
        .with_guessed_format()
        .map_err(|e| FeederError::Decode(image::ImageError::IoError(e)))?
        .decode()
        .map_err(FeederError::Decode)?;

    let (width, height) = (img.width(), img.height());
    let data = layout(&img, encoding)?;
    Ok(Frame::new(header, width, height, encoding, data)?)
}

fn layout(img: &DynamicImage, encoding: &str) -> Result<Vec<u8>, FeederError> {
    let data = match encoding {
        MONO8 => img.to_luma8().into_raw(),
        RGB8 => img.to_rgb8().into_raw(),
        RGBA8 => img.to_rgba8().into_raw(),
        BGR8 => swap_red_blue(img.to_rgb8().into_raw(), 3),
        BGRA8 => swap_red_blue(img.to_rgba8().into_raw(), 4),
        other => return Err(FeederError::UnsupportedEncoding(other.to_string())),
    };
    Ok(data)
}

fn swap_red_blue(mut data: Vec<u8>, channels: usize) -> Vec<u8> {
    for px in data.chunks_exact_mut(channels) {
        px.swap(0, 2);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn header() -> FrameHeader {
        FrameHeader {
            seq: 5,
            captured_at_ms: 1708300000000,
            frame_id: "camera".into(),
        }
    }

    #[test]
    fn bgr8_swaps_red_and_blue() {
        let frame = rasterize(&png(2, 2, [250, 10, 20, 255]), "bgr8", header()).unwrap();
        assert_eq!(frame.channels(), 3);
        assert_eq!((frame.width(), frame.height()), (2, 2));
        assert_eq!(&frame.data()[..3], &[20, 10, 250]);
    }

    #[test]
    fn rgba8_keeps_alpha() {
        let frame = rasterize(&png(1, 1, [1, 2, 3, 128]), "rgba8", header()).unwrap();
        assert_eq!(&frame.data()[..], &[1, 2, 3, 128]);
        assert_eq!(frame.header().seq, 5);
    }

    #[test]
    fn mono8_is_single_channel() {
        let frame = rasterize(&png(3, 2, [255, 255, 255, 255]), "mono8", header()).unwrap();
        assert_eq!(frame.channels(), 1);
        assert_eq!(&frame.data()[..], &[255; 6]);
    }

    #[test]
    fn supported_layouts() {
        assert!(supports("bgr8"));
        assert!(supports("mono8"));
        assert!(!supports("8UC3"));
    }

    #[test]
    fn unsupported_encoding() {
        let err = rasterize(&png(1, 1, [0, 0, 0, 255]), "yuv-2ch", header()).unwrap_err();
        assert!(matches!(err, FeederError::UnsupportedEncoding(_)));
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = rasterize(b"not an image", "bgr8", header()).unwrap_err();
        assert!(matches!(err, FeederError::Decode(_)));
    }
}
