//! # waveform-capture-cpal
//!
//! Cross-platform cpal microphone backend for waveform-capture.
//!
//! Provides:
//! - `CpalMicCapture` — mono input capture implementing `CaptureProvider`
//! - `devices` — input device enumeration
//!
//! ## Usage
//! ```ignore
//! use waveform_capture_core::{CaptureConfiguration, CaptureSession};
//! use waveform_capture_cpal::CpalMicCapture;
//!
//! let mut session =
//!     CaptureSession::new(CpalMicCapture::default_device(), CaptureConfiguration::default());
//! let chunks = session.subscribe();
//! session.start()?;
//! # Ok::<(), waveform_capture_core::CaptureError>(())
//! ```

pub mod devices;
pub mod mic_capture;

pub use devices::list_input_devices;
pub use mic_capture::CpalMicCapture;
