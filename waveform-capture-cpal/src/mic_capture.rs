//! cpal microphone capture provider.
//!
//! Opens the default (or named) input device in mono at the configured
//! sample rate and period size, and hands owned sample chunks out of the
//! driver callback. cpal stream handles are not `Send`, so the stream lives
//! on a dedicated capture thread for its whole lifetime; `open` and `start`
//! exchange results with that thread over a handshake channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use waveform_capture_core::models::config::CaptureConfiguration;
use waveform_capture_core::models::device::InputDevice;
use waveform_capture_core::models::error::CaptureError;
use waveform_capture_core::traits::capture_provider::{CaptureProvider, ChunkCallback};
use waveform_capture_core::SampleChunk;

use crate::devices;

/// How long the capture thread sleeps between liveness checks while the
/// stream runs.
const STREAM_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long `open`/`start` wait for the capture thread to report back.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

enum StreamCommand {
    Start,
    Shutdown,
}

struct CaptureThread {
    commands: Sender<StreamCommand>,
    results: Receiver<Result<(), CaptureError>>,
    handle: thread::JoinHandle<()>,
}

/// Microphone capture via cpal.
///
/// Owns exactly one open input stream at a time, confined to a background
/// capture thread.
pub struct CpalMicCapture {
    device_name: Option<String>,
    running: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    thread: Option<CaptureThread>,
}

impl CpalMicCapture {
    /// Capture from the system default microphone.
    pub fn default_device() -> Self {
        Self::new(None)
    }

    /// Capture from a specific microphone by device name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self::new(Some(name.into()))
    }

    fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            running: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl CaptureProvider for CpalMicCapture {
    fn is_available(&self) -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    fn open(
        &mut self,
        config: &CaptureConfiguration,
        on_chunk: ChunkCallback,
    ) -> Result<(), CaptureError> {
        if self.thread.is_some() {
            return Err(CaptureError::StreamOpenFailed(
                "input stream already open".into(),
            ));
        }

        let device_name = config
            .device_name
            .clone()
            .or_else(|| self.device_name.clone());
        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: BufferSize::Fixed(config.frames_per_period),
        };

        self.running.store(true, Ordering::Release);
        self.active.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let active = Arc::clone(&self.active);
        let (command_tx, command_rx) = unbounded();
        let (result_tx, result_rx) = bounded(1);
        let thread_device_name = device_name.clone();

        let handle = match thread::Builder::new().name("mic-capture".into()).spawn(move || {
            capture_thread_main(
                thread_device_name,
                stream_config,
                on_chunk,
                running,
                command_rx,
                result_tx,
            );
            active.store(false, Ordering::Release);
        }) {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                self.active.store(false, Ordering::Release);
                return Err(CaptureError::Unknown(format!(
                    "failed to spawn capture thread: {e}"
                )));
            }
        };

        let link = CaptureThread {
            commands: command_tx,
            results: result_rx,
            handle,
        };
        match link.results.recv_timeout(HANDSHAKE_TIMEOUT) {
            Ok(Ok(())) => {
                self.device_name = device_name;
                self.thread = Some(link);
                Ok(())
            }
            Ok(Err(err)) => {
                self.running.store(false, Ordering::Release);
                let _ = link.handle.join();
                Err(err)
            }
            Err(_) => {
                // Dropping the link closes both channels; the stuck thread
                // shuts itself down whenever it comes back.
                self.running.store(false, Ordering::Release);
                Err(CaptureError::DeviceInitFailed(
                    "timed out waiting for the capture thread".into(),
                ))
            }
        }
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let Some(link) = self.thread.as_ref() else {
            return Err(CaptureError::StreamStartFailed(
                "input stream not open".into(),
            ));
        };
        link.commands.send(StreamCommand::Start).map_err(|_| {
            CaptureError::StreamStartFailed("capture thread exited before start".into())
        })?;
        match link.results.recv_timeout(HANDSHAKE_TIMEOUT) {
            Ok(result) => result,
            Err(_) => Err(CaptureError::StreamStartFailed(
                "timed out waiting for stream start".into(),
            )),
        }
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        let Some(link) = self.thread.take() else {
            return Ok(());
        };
        self.running.store(false, Ordering::Release);
        let _ = link.commands.send(StreamCommand::Shutdown);
        link.handle
            .join()
            .map_err(|_| CaptureError::CloseFailed("capture thread panicked".into()))
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn device_info(&self) -> Option<InputDevice> {
        let host = cpal::default_host();
        match &self.device_name {
            Some(name) => devices::find_input_device(&host, name)
                .ok()
                .and_then(|d| d.name().ok())
                .map(|name| InputDevice {
                    name,
                    is_default: false,
                }),
            None => host
                .default_input_device()
                .and_then(|d| d.name().ok())
                .map(|name| InputDevice {
                    name,
                    is_default: true,
                }),
        }
    }
}

impl Drop for CpalMicCapture {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("failed to close input stream on drop: {err}");
        }
    }
}

/// Body of the capture thread. The stream is created, started, and dropped
/// here so the handle never has to leave the thread.
fn capture_thread_main(
    device_name: Option<String>,
    stream_config: StreamConfig,
    on_chunk: ChunkCallback,
    running: Arc<AtomicBool>,
    commands: Receiver<StreamCommand>,
    results: Sender<Result<(), CaptureError>>,
) {
    let stream = match open_stream(device_name.as_deref(), &stream_config, on_chunk) {
        Ok(stream) => {
            let _ = results.send(Ok(()));
            stream
        }
        Err(err) => {
            let _ = results.send(Err(err));
            return;
        }
    };

    match commands.recv() {
        Ok(StreamCommand::Start) => {
            if let Err(err) = stream.play() {
                let _ = results.send(Err(CaptureError::StreamStartFailed(err.to_string())));
                return;
            }
            let _ = results.send(Ok(()));
        }
        // Opened but never started: drop the stream and leave.
        Ok(StreamCommand::Shutdown) | Err(_) => return,
    }

    // The stream delivers callbacks until this thread drops it.
    while running.load(Ordering::Acquire) {
        thread::sleep(STREAM_POLL_INTERVAL);
    }
}

fn open_stream(
    device_name: Option<&str>,
    config: &StreamConfig,
    on_chunk: ChunkCallback,
) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => devices::find_input_device(&host, name)?,
        None => host
            .default_input_device()
            .ok_or(CaptureError::DeviceUnavailable)?,
    };
    let sample_format = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceInitFailed(e.to_string()))?
        .sample_format();

    // Convert every supported sample type to normalized f32 on the way in so
    // consumers stay format-agnostic.
    match sample_format {
        SampleFormat::F32 => build_stream(&device, config, on_chunk, |sample: f32| sample),
        SampleFormat::I16 => build_stream(&device, config, on_chunk, |sample: i16| {
            f32::from(sample) / 32_768.0
        }),
        SampleFormat::U16 => build_stream(&device, config, on_chunk, |sample: u16| {
            (f32::from(sample) - 32_768.0) / 32_768.0
        }),
        other => Err(CaptureError::StreamOpenFailed(format!(
            "unsupported sample format: {other:?}"
        ))),
    }
}

fn build_stream<T, F>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut on_chunk: ChunkCallback,
    mut convert: F,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::SizedSample,
    F: FnMut(T) -> f32 + Send + 'static,
{
    let mut scratch: Vec<f32> = Vec::new();
    let err_fn = |err| log::warn!("input stream error: {err}");
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Copy out of driver-owned memory before handing the chunk
                // on; an absent period arrives as an empty slice and goes
                // out as an empty chunk.
                scratch.clear();
                scratch.extend(data.iter().copied().map(&mut convert));
                on_chunk(SampleChunk::from(scratch.as_slice()));
            },
            err_fn,
            None,
        )
        .map_err(|e| CaptureError::StreamOpenFailed(e.to_string()))
}
