use crate::dispatch::fan_out::SampleChunk;
use crate::models::config::CaptureConfiguration;
use crate::models::device::InputDevice;
use crate::models::error::CaptureError;

/// Callback invoked whenever a period of audio is ready.
///
/// Fires on the backend's real-time context. It must copy what it needs and
/// return promptly: no unbounded locking, no error propagation back across
/// the real-time boundary. A period for which no input was available arrives
/// as an empty chunk.
pub type ChunkCallback = Box<dyn FnMut(SampleChunk) + Send + 'static>;

/// Interface for platform-specific audio input backends.
///
/// An implementation owns at most one open hardware stream at a time and
/// delivers mono, normalized f32 chunks via the registered [`ChunkCallback`].
pub trait CaptureProvider: Send {
    /// Whether an input device is currently available at all.
    fn is_available(&self) -> bool;

    /// Select the input device, request mono at the configured sample rate
    /// and period size, and register the chunk callback. Does not start
    /// delivery yet.
    fn open(
        &mut self,
        config: &CaptureConfiguration,
        on_chunk: ChunkCallback,
    ) -> Result<(), CaptureError>;

    /// Begin delivering callbacks for an opened stream.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop callbacks and release the stream. Idempotent: closing an
    /// already-closed provider is a no-op, not a fault.
    fn close(&mut self) -> Result<(), CaptureError>;

    /// Whether the stream is still delivering callbacks.
    fn is_active(&self) -> bool;

    /// The device backing this provider, when one has been resolved.
    fn device_info(&self) -> Option<InputDevice>;
}
