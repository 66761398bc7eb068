use serde::{Deserialize, Serialize};

/// Configuration for a capture session and its display window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfiguration {
    /// Requested sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Frames the hardware delivers per callback period (default: 512).
    pub frames_per_period: u32,

    /// Length of the rolling display window in milliseconds (default: 500).
    pub display_window_ms: u32,

    /// Time between vertical grid lines in milliseconds, display only
    /// (default: 200).
    pub grid_interval_ms: u32,

    /// Specific input device name, or None for the system default.
    pub device_name: Option<String>,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.frames_per_period == 0 {
            return Err("frames per period must be positive".into());
        }
        if self.grid_interval_ms == 0 {
            return Err("grid interval must be positive".into());
        }
        Ok(())
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            frames_per_period: 512,
            display_window_ms: 500,
            grid_interval_ms: 200,
            device_name: None,
        }
    }
}
