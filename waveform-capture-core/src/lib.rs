//! # waveform-capture-core
//!
//! Platform-agnostic live waveform capture core.
//!
//! Buffers a live sample stream in a fixed-duration rolling window and fans
//! each captured chunk out to independent consumers: a display sink redrawn
//! at a fixed cadence, a speech detector, or anything else that subscribes.
//! Platform backends (cpal, or a bespoke driver) implement the
//! `CaptureProvider` trait and plug into the generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! waveform-capture-core (this crate)
//! ├── traits/       ← CaptureProvider, SessionObserver
//! ├── models/       ← CaptureError, CaptureState, CaptureConfiguration, InputDevice
//! ├── processing/   ← RollingSampleBuffer, window capacity math
//! ├── dispatch/     ← ChunkFanOut (ordered per-consumer delivery)
//! ├── session/      ← CaptureSession (lifecycle + control loop)
//! └── display/      ← WaveformSink, DisplayLoop, grid geometry
//! ```
//!
//! Data flow: hardware callback → owned chunk → fan-out → per-consumer
//! queues → rolling window → periodic redraw.

pub mod dispatch;
pub mod display;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use dispatch::fan_out::{ChunkFanOut, SampleChunk};
pub use display::poll::{DisplayLoop, DEFAULT_REDRAW_INTERVAL};
pub use display::sink::{grid_positions, WaveformSink};
pub use models::config::CaptureConfiguration;
pub use models::device::InputDevice;
pub use models::error::CaptureError;
pub use models::state::CaptureState;
pub use processing::rolling_buffer::{window_capacity, RollingSampleBuffer};
pub use session::capture::CaptureSession;
pub use traits::capture_provider::{CaptureProvider, ChunkCallback};
pub use traits::session_observer::SessionObserver;
