use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};

use super::sink::WaveformSink;
use crate::dispatch::fan_out::SampleChunk;

/// Default redraw cadence.
pub const DEFAULT_REDRAW_INTERVAL: Duration = Duration::from_millis(50);

/// Drives a [`WaveformSink`] at a fixed redraw cadence.
///
/// A dedicated thread owns the sink: every interval it drains the pending
/// chunks into the window, then invokes the redraw callback with the sink.
/// Draining and redrawing share one thread, so the sink needs no locking.
///
/// The loop exits when [`stop`](Self::stop) is called or when the producer
/// side of the chunk queue disconnects (after a final drain and redraw).
pub struct DisplayLoop {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DisplayLoop {
    pub fn spawn<F>(
        mut sink: WaveformSink,
        chunks: Receiver<SampleChunk>,
        interval: Duration,
        mut on_redraw: F,
    ) -> Self
    where
        F: FnMut(&WaveformSink) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let loop_running = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("waveform-display".into())
            .spawn(move || {
                while loop_running.load(Ordering::Relaxed) {
                    let mut producer_gone = false;
                    loop {
                        match chunks.try_recv() {
                            Ok(chunk) => sink.push_chunk(&chunk),
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => {
                                producer_gone = true;
                                break;
                            }
                        }
                    }
                    on_redraw(&sink);
                    if producer_gone {
                        break;
                    }
                    thread::sleep(interval);
                }
            })
            .expect("failed to spawn waveform display thread");

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stop the loop and wait for the display thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DisplayLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use parking_lot::Mutex;

    #[test]
    fn drains_chunks_and_redraws() {
        let (sender, receiver) = unbounded();
        let sizes: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let observed = Arc::clone(&sizes);

        let sink = WaveformSink::new(1_000, 1_000); // capacity 1000
        let display = DisplayLoop::spawn(
            sink,
            receiver,
            Duration::from_millis(10),
            move |sink: &WaveformSink| {
                observed.lock().push(sink.len());
            },
        );

        for _ in 0..3 {
            sender.send(SampleChunk::from(&[0.25; 100][..])).unwrap();
        }
        thread::sleep(Duration::from_millis(100));
        display.stop();

        let sizes = sizes.lock();
        assert!(sizes.len() >= 2, "expected repeated redraws");
        assert_eq!(*sizes.last().unwrap(), 300);
    }

    #[test]
    fn exits_when_producer_disconnects() {
        let (sender, receiver) = unbounded();
        let redraws = Arc::new(AtomicBool::new(false));
        let observed = Arc::clone(&redraws);

        let sink = WaveformSink::new(1_000, 1_000);
        let display = DisplayLoop::spawn(
            sink,
            receiver,
            Duration::from_millis(10),
            move |_sink: &WaveformSink| {
                observed.store(true, Ordering::Relaxed);
            },
        );

        sender.send(SampleChunk::from(&[0.5][..])).unwrap();
        drop(sender);
        thread::sleep(Duration::from_millis(100));

        // The thread is already gone; stop() just reaps it.
        display.stop();
        assert!(redraws.load(Ordering::Relaxed));
    }
}
