use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

/// Output color policy applied to every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Color,
    Grayscale,
}

impl Mode {
    /// Map the control call's boolean: `true` selects grayscale.
    pub fn from_grayscale(enabled: bool) -> Self {
        if enabled {
            Mode::Grayscale
        } else {
            Mode::Color
        }
    }

    pub fn is_grayscale(self) -> bool {
        self == Mode::Grayscale
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Color => f.write_str("color"),
            Mode::Grayscale => f.write_str("grayscale"),
        }
    }
}

/// Acknowledgement returned by [`ModeState::set`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeAck {
    pub success: bool,
    pub message: String,
}

/// The single piece of shared state: whether frames are converted to
/// grayscale. Shared by `Arc` between the control surface and the frame loop.
#[derive(Debug, Default)]
pub struct ModeState {
    grayscale: AtomicBool,
}

impl ModeState {
    /// Starts in [`Mode::Color`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Mode {
        Mode::from_grayscale(self.grayscale.load(Ordering::Acquire))
    }

    /// Switch modes. Setting the current mode again changes nothing.
    pub fn set(&self, mode: Mode) -> ModeAck {
        self.grayscale.store(mode.is_grayscale(), Ordering::Release);
        let message = match mode {
            Mode::Grayscale => "Switched to grayscale mode.",
            Mode::Color => "Switched to color mode.",
        };
        ModeAck {
            success: true,
            message: message.into(),
        }
    }
}
