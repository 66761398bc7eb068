use crate::processing::rolling_buffer::{window_capacity, RollingSampleBuffer};

/// Consumer-side rolling window sized for a display duration.
///
/// Owns a [`RollingSampleBuffer`] whose capacity is derived from the sample
/// rate and window length. All methods take `&mut self` or `&self` without
/// internal locking: in the intended design the redraw timer and
/// `push_chunk` run on the same thread (see [`super::poll::DisplayLoop`]),
/// which rules out data races by construction.
pub struct WaveformSink {
    buffer: RollingSampleBuffer,
    sample_rate: u32,
    window_ms: u32,
}

impl WaveformSink {
    pub fn new(sample_rate: u32, window_ms: u32) -> Self {
        Self {
            buffer: RollingSampleBuffer::new(window_capacity(sample_rate, window_ms)),
            sample_rate,
            window_ms,
        }
    }

    /// Append a chunk to the window.
    pub fn push_chunk(&mut self, chunk: &[f32]) {
        self.buffer.append(chunk);
    }

    /// Valid samples currently in the window.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// The `index`-th sample from the oldest in the window.
    pub fn get(&self, index: usize) -> f32 {
        self.buffer.get(index)
    }

    /// Iterate the window oldest-to-newest, for rendering.
    pub fn samples(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.buffer.len()).map(|i| self.buffer.get(i))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn window_ms(&self) -> u32 {
        self.window_ms
    }

    /// Change the sample rate. When the resolved capacity changes, the
    /// window is resized and its history discarded: a rate change
    /// invalidates the old window rather than reinterpolating it.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.apply_window();
    }

    /// Change the display duration; same discard semantics as
    /// [`set_sample_rate`](Self::set_sample_rate).
    pub fn set_window_ms(&mut self, window_ms: u32) {
        self.window_ms = window_ms;
        self.apply_window();
    }

    fn apply_window(&mut self) {
        let capacity = window_capacity(self.sample_rate, self.window_ms);
        if capacity != self.buffer.capacity() {
            self.buffer.resize(capacity);
        }
    }
}

/// Normalized x positions of the vertical grid lines for a display window,
/// in `[0, 1]`. A grid interval wider than the window yields no lines.
pub fn grid_positions(window_ms: u32, grid_interval_ms: u32) -> Vec<f32> {
    if grid_interval_ms == 0 || window_ms < grid_interval_ms {
        return Vec::new();
    }
    let sections = window_ms / grid_interval_ms;
    (0..=sections)
        .map(|i| i as f32 / sections as f32)
        .collect()
}
