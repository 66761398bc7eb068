//! Live microphone waveform in the terminal.
//!
//! Captures the default microphone (or a named one, passed as the first
//! argument) and redraws the rolling window as a row of amplitude glyphs at
//! the display cadence. A second subscriber receives the same ordered chunk
//! stream the way a speech detector would.

use std::io::Write;
use std::thread;
use std::time::Duration;

use waveform_capture_core::{
    grid_positions, CaptureConfiguration, CaptureProvider, CaptureSession, DisplayLoop,
    WaveformSink, DEFAULT_REDRAW_INTERVAL,
};
use waveform_capture_cpal::{list_input_devices, CpalMicCapture};

/// Width of the rendered window, in terminal columns.
const COLUMNS: usize = 64;

const LEVELS: &[u8] = b" .:-=+*#%@";

/// One column per slice of the window, darkest glyph at the slice peak.
fn render_row(sink: &WaveformSink) -> String {
    let len = sink.len();
    let mut row = String::with_capacity(COLUMNS);
    for column in 0..COLUMNS {
        let start = column * len / COLUMNS;
        let end = (column + 1) * len / COLUMNS;
        let peak = (start..end).fold(0.0f32, |max, i| max.max(sink.get(i).abs()));
        let level = ((peak * (LEVELS.len() - 1) as f32) as usize).min(LEVELS.len() - 1);
        row.push(LEVELS[level] as char);
    }
    row
}

fn render_ruler(window_ms: u32, grid_interval_ms: u32) -> String {
    let mut ruler = vec![b' '; COLUMNS];
    for x in grid_positions(window_ms, grid_interval_ms) {
        let column = ((x * (COLUMNS - 1) as f32) as usize).min(COLUMNS - 1);
        ruler[column] = b'|';
    }
    String::from_utf8(ruler).unwrap()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    for device in list_input_devices()? {
        let marker = if device.is_default { " (default)" } else { "" };
        println!("input device: {}{marker}", device.name);
    }

    let provider = match std::env::args().nth(1) {
        Some(name) => CpalMicCapture::with_device(name),
        None => CpalMicCapture::default_device(),
    };
    if !provider.is_available() {
        eprintln!("no input device available");
        return Ok(());
    }
    if let Some(device) = provider.device_info() {
        println!("capturing from: {}", device.name);
    }

    let config = CaptureConfiguration::default();
    let mut session = CaptureSession::new(provider, config.clone());

    // The display queue is drained every redraw, so a small bound suffices;
    // the detector keeps everything.
    let display_chunks = session.subscribe_bounded(256);
    let detector_chunks = session.subscribe();

    let detector = thread::spawn(move || {
        let mut total = 0usize;
        while let Ok(chunk) = detector_chunks.recv() {
            total += chunk.len();
            log::debug!("detector received {} samples ({total} total)", chunk.len());
        }
        total
    });

    println!(
        "{}  ({} ms window, {} ms grid)",
        render_ruler(config.display_window_ms, config.grid_interval_ms),
        config.display_window_ms,
        config.grid_interval_ms,
    );

    println!("capturing for 5 seconds...");
    let sink = WaveformSink::new(config.sample_rate, config.display_window_ms);
    let display = DisplayLoop::spawn(
        sink,
        display_chunks,
        DEFAULT_REDRAW_INTERVAL,
        |sink: &WaveformSink| {
            print!("\r{}", render_row(sink));
            let _ = std::io::stdout().flush();
        },
    );

    session.start()?;
    thread::sleep(Duration::from_secs(5));
    session.stop();

    let dropped = session.dropped_chunks();

    // Dropping the session joins its control loop and releases the stream,
    // which disconnects both subscribers.
    drop(session);
    display.stop();
    let total = detector.join().unwrap_or(0);
    println!("\ndetector saw {total} samples, {dropped} chunks dropped");
    Ok(())
}
