/// Pixel layout tags understood by the pipeline.
///
/// Every supported tag describes interleaved 8-bit samples. The channel
/// count is all the dispatcher needs; channel order is positional.
pub const MONO8: &str = "mono8";
pub const BGR8: &str = "bgr8";
pub const RGB8: &str = "rgb8";
pub const BGRA8: &str = "bgra8";
pub const RGBA8: &str = "rgba8";
pub const YUV_2CH: &str = "yuv-2ch";

const NAMED: &[(&str, usize)] = &[
    (MONO8, 1),
    (YUV_2CH, 2),
    ("yuv422", 2),
    ("yuv422_yuy2", 2),
    ("uyvy", 2),
    ("yuyv", 2),
    (BGR8, 3),
    (RGB8, 3),
    (BGRA8, 4),
    (RGBA8, 4),
];

/// Tags with samples wider than one byte. Recognised so that they fail
/// with a depth error instead of an unknown-tag error.
const WIDE: &[&str] = &[
    "mono16", "bgr16", "rgb16", "bgra16", "rgba16", "16UC", "16SC", "32SC", "32FC", "64FC",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// 8-bit samples with this many channels.
    Channels(usize),
    /// Known tag, but not 8 bits per sample.
    UnsupportedDepth,
    Unknown,
}

/// Resolve a format tag to its channel count.
///
/// Besides the named tags, the generic `8UC<n>` form is accepted for any
/// `n >= 1`, which is how frames with unusual channel counts reach the
/// dispatcher.
pub fn lookup(tag: &str) -> Lookup {
    if let Some((_, channels)) = NAMED.iter().find(|(name, _)| *name == tag) {
        return Lookup::Channels(*channels);
    }
    if let Some(n) = tag.strip_prefix("8UC") {
        return match n.parse::<usize>() {
            Ok(channels) if channels >= 1 => Lookup::Channels(channels),
            _ => Lookup::Unknown,
        };
    }
    if WIDE.iter().any(|prefix| tag.starts_with(prefix)) {
        return Lookup::UnsupportedDepth;
    }
    Lookup::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_tags() {
        assert_eq!(lookup("mono8"), Lookup::Channels(1));
        assert_eq!(lookup("yuv-2ch"), Lookup::Channels(2));
        assert_eq!(lookup("rgb8"), Lookup::Channels(3));
        assert_eq!(lookup("rgba8"), Lookup::Channels(4));
    }

    #[test]
    fn generic_8uc() {
        assert_eq!(lookup("8UC1"), Lookup::Channels(1));
        assert_eq!(lookup("8UC5"), Lookup::Channels(5));
        assert_eq!(lookup("8UC0"), Lookup::Unknown);
        assert_eq!(lookup("8UCx"), Lookup::Unknown);
    }

    #[test]
    fn wide_samples_rejected_by_depth() {
        assert_eq!(lookup("mono16"), Lookup::UnsupportedDepth);
        assert_eq!(lookup("32FC1"), Lookup::UnsupportedDepth);
        assert_eq!(lookup("16UC3"), Lookup::UnsupportedDepth);
    }

    #[test]
    fn unknown_tag() {
        assert_eq!(lookup("jpeg"), Lookup::Unknown);
        assert_eq!(lookup(""), Lookup::Unknown);
    }
}
