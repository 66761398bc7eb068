use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::dispatch::fan_out::{ChunkFanOut, SampleChunk};
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::traits::capture_provider::{CaptureProvider, ChunkCallback};
use crate::traits::session_observer::SessionObserver;

/// How often the control loop re-checks the stream-active status.
const CONTROL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bridges the backend's real-time callback world to ordinary application
/// control.
///
/// Owns the provider, the chunk fan-out, and the single liveness flag shared
/// with the real-time callback. Sample data itself crosses the thread
/// boundary only as owned chunks, never as shared mutable memory.
///
/// `stop()` is cooperative: it clears the liveness flag, the callback goes
/// quiet on its next invocation, and a background control loop closes the
/// stream once it reports inactive, settling the session in `Closed`.
pub struct CaptureSession<P: CaptureProvider + 'static> {
    provider: Arc<Mutex<P>>,
    config: CaptureConfiguration,
    fan_out: Arc<Mutex<ChunkFanOut>>,
    live: Arc<AtomicBool>,
    state: Arc<Mutex<CaptureState>>,
    observer: Option<Arc<dyn SessionObserver>>,
    contended_chunks: Arc<AtomicUsize>,
    control_handle: Option<thread::JoinHandle<()>>,
}

impl<P: CaptureProvider + 'static> CaptureSession<P> {
    pub fn new(provider: P, config: CaptureConfiguration) -> Self {
        Self {
            provider: Arc::new(Mutex::new(provider)),
            config,
            fan_out: Arc::new(Mutex::new(ChunkFanOut::new())),
            live: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(CaptureState::Idle)),
            observer: None,
            contended_chunks: Arc::new(AtomicUsize::new(0)),
            control_handle: None,
        }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    /// Register a consumer for the captured chunk stream (unbounded queue).
    pub fn subscribe(&self) -> Receiver<SampleChunk> {
        self.fan_out.lock().subscribe()
    }

    /// Register a consumer with a bounded queue; see
    /// [`ChunkFanOut::subscribe_bounded`].
    pub fn subscribe_bounded(&self, capacity: usize) -> Receiver<SampleChunk> {
        self.fan_out.lock().subscribe_bounded(capacity)
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock()
    }

    /// Reflects the most recent `start`/`stop`; callable from any thread.
    pub fn is_running(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Chunks that never reached consumers: bounded-queue overflow plus
    /// periods where the callback found the fan-out contended.
    pub fn dropped_chunks(&self) -> usize {
        self.fan_out.lock().dropped() + self.contended_chunks.load(Ordering::Relaxed)
    }

    /// Open and start the input stream. `Idle → Running`.
    ///
    /// On failure the session stays `Idle` and the error is returned to the
    /// caller; there is no automatic retry. Calling `start()` on a session
    /// that is already running is a no-op returning `Ok`.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        {
            let state = self.state.lock();
            match *state {
                CaptureState::Idle => {}
                CaptureState::Running => return Ok(()),
                CaptureState::Stopping | CaptureState::Closed => {
                    return Err(CaptureError::SessionClosed)
                }
            }
        }

        self.config.validate().map_err(CaptureError::InvalidConfig)?;

        let live = Arc::clone(&self.live);
        let fan_out = Arc::clone(&self.fan_out);
        let contended = Arc::clone(&self.contended_chunks);
        let on_chunk: ChunkCallback = Box::new(move |chunk: SampleChunk| {
            // Real-time context. Once shutdown has been requested the
            // callback goes quiet and leaves teardown to the control loop.
            if !live.load(Ordering::Acquire) {
                return;
            }
            // Never wait on the control side from here; a contended period
            // is dropped and counted instead.
            match fan_out.try_lock() {
                Some(mut fan_out) => fan_out.publish(chunk),
                None => {
                    contended.fetch_add(1, Ordering::Relaxed);
                }
            }
        });

        // Raise the liveness flag before the stream exists: some backends
        // begin delivering callbacks as soon as the stream is created, and
        // those first periods must not be gated off.
        self.live.store(true, Ordering::Release);
        {
            let mut provider = self.provider.lock();
            if let Err(err) = provider.open(&self.config, on_chunk) {
                self.live.store(false, Ordering::Release);
                return Err(err);
            }
            if let Err(err) = provider.start() {
                self.live.store(false, Ordering::Release);
                if let Err(close_err) = provider.close() {
                    log::warn!("failed to close input stream after start error: {close_err}");
                }
                return Err(err);
            }
        }

        self.transition(CaptureState::Running);
        self.spawn_control_loop();
        Ok(())
    }

    /// Request shutdown. `Running → Stopping`; the control loop completes
    /// the transition to `Closed`. No-op unless the session is running, so
    /// double-stop and stop-before-start are safe.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if !state.is_running() {
            return;
        }
        self.live.store(false, Ordering::Release);
        *state = CaptureState::Stopping;
        drop(state);
        self.notify_state(CaptureState::Stopping);
    }

    fn transition(&self, new_state: CaptureState) {
        *self.state.lock() = new_state;
        self.notify_state(new_state);
    }

    fn notify_state(&self, state: CaptureState) {
        if let Some(observer) = &self.observer {
            observer.on_state_changed(state);
        }
    }

    fn spawn_control_loop(&mut self) {
        let live = Arc::clone(&self.live);
        let provider = Arc::clone(&self.provider);
        let state = Arc::clone(&self.state);
        let observer = self.observer.clone();

        let handle = thread::Builder::new()
            .name("capture-control".into())
            .spawn(move || {
                loop {
                    let stream_active = provider.lock().is_active();
                    if !stream_active || !live.load(Ordering::Acquire) {
                        break;
                    }
                    thread::sleep(CONTROL_POLL_INTERVAL);
                }

                // A requested stop and a stream dying on its own land here
                // alike: release the stream once and settle in Closed.
                live.store(false, Ordering::Release);
                if let Err(err) = provider.lock().close() {
                    log::warn!("failed to close input stream: {err}");
                    if let Some(observer) = &observer {
                        observer.on_error(&err);
                    }
                }
                *state.lock() = CaptureState::Closed;
                if let Some(observer) = &observer {
                    observer.on_state_changed(CaptureState::Closed);
                    observer.on_finished();
                }
            })
            .expect("failed to spawn capture control thread");

        self.control_handle = Some(handle);
    }
}

impl<P: CaptureProvider + 'static> Drop for CaptureSession<P> {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.control_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device::InputDevice;

    /// Test double standing in for a platform backend. Shared handles let a
    /// test drive the registered callback the way a hardware thread would.
    struct FakeProvider {
        fail_open: Option<CaptureError>,
        fail_start: Option<CaptureError>,
        fail_close: bool,
        active: Arc<AtomicBool>,
        callback: Arc<Mutex<Option<ChunkCallback>>>,
        close_count: Arc<AtomicUsize>,
    }

    struct FakeHandles {
        active: Arc<AtomicBool>,
        callback: Arc<Mutex<Option<ChunkCallback>>>,
        close_count: Arc<AtomicUsize>,
    }

    impl FakeHandles {
        fn emit(&self, samples: &[f32]) {
            let mut callback = self.callback.lock();
            if let Some(on_chunk) = callback.as_mut() {
                on_chunk(SampleChunk::from(samples));
            }
        }
    }

    impl FakeProvider {
        fn new() -> (Self, FakeHandles) {
            let active = Arc::new(AtomicBool::new(false));
            let callback = Arc::new(Mutex::new(None));
            let close_count = Arc::new(AtomicUsize::new(0));
            let handles = FakeHandles {
                active: Arc::clone(&active),
                callback: Arc::clone(&callback),
                close_count: Arc::clone(&close_count),
            };
            let provider = Self {
                fail_open: None,
                fail_start: None,
                fail_close: false,
                active,
                callback,
                close_count,
            };
            (provider, handles)
        }
    }

    impl CaptureProvider for FakeProvider {
        fn is_available(&self) -> bool {
            true
        }

        fn open(
            &mut self,
            _config: &CaptureConfiguration,
            on_chunk: ChunkCallback,
        ) -> Result<(), CaptureError> {
            if let Some(err) = self.fail_open.take() {
                return Err(err);
            }
            *self.callback.lock() = Some(on_chunk);
            Ok(())
        }

        fn start(&mut self) -> Result<(), CaptureError> {
            if let Some(err) = self.fail_start.take() {
                return Err(err);
            }
            self.active.store(true, Ordering::Release);
            Ok(())
        }

        fn close(&mut self) -> Result<(), CaptureError> {
            self.active.store(false, Ordering::Release);
            self.close_count.fetch_add(1, Ordering::Relaxed);
            if self.fail_close {
                return Err(CaptureError::CloseFailed("stream stuck".into()));
            }
            Ok(())
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::Acquire)
        }

        fn device_info(&self) -> Option<InputDevice> {
            Some(InputDevice {
                name: "fake input".into(),
                is_default: true,
            })
        }
    }

    struct RecordingObserver {
        states: Mutex<Vec<CaptureState>>,
        finished: AtomicUsize,
        errors: Mutex<Vec<CaptureError>>,
    }

    impl RecordingObserver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                states: Mutex::new(Vec::new()),
                finished: AtomicUsize::new(0),
                errors: Mutex::new(Vec::new()),
            })
        }
    }

    impl SessionObserver for RecordingObserver {
        fn on_state_changed(&self, state: CaptureState) {
            self.states.lock().push(state);
        }

        fn on_finished(&self) {
            self.finished.fetch_add(1, Ordering::Relaxed);
        }

        fn on_error(&self, error: &CaptureError) {
            self.errors.lock().push(error.clone());
        }
    }

    fn wait_for_closed(session: &CaptureSession<FakeProvider>) {
        for _ in 0..100 {
            if session.state() == CaptureState::Closed {
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
        panic!("session never reached Closed");
    }

    #[test]
    fn start_transitions_idle_to_running() {
        let (provider, _handles) = FakeProvider::new();
        let mut session = CaptureSession::new(provider, CaptureConfiguration::default());

        session.start().unwrap();

        assert_eq!(session.state(), CaptureState::Running);
        assert!(session.is_running());
    }

    #[test]
    fn start_while_running_is_a_noop() {
        let (provider, handles) = FakeProvider::new();
        let mut session = CaptureSession::new(provider, CaptureConfiguration::default());

        session.start().unwrap();
        session.start().unwrap();

        assert_eq!(session.state(), CaptureState::Running);
        assert_eq!(handles.close_count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn open_failure_leaves_session_idle() {
        let (mut provider, _handles) = FakeProvider::new();
        provider.fail_open = Some(CaptureError::DeviceUnavailable);
        let mut session = CaptureSession::new(provider, CaptureConfiguration::default());

        let err = session.start().unwrap_err();

        assert_eq!(err, CaptureError::DeviceUnavailable);
        assert_eq!(session.state(), CaptureState::Idle);
        assert!(!session.is_running());
    }

    #[test]
    fn start_failure_closes_stream_and_leaves_idle() {
        let (mut provider, handles) = FakeProvider::new();
        provider.fail_start = Some(CaptureError::StreamStartFailed("refused".into()));
        let mut session = CaptureSession::new(provider, CaptureConfiguration::default());

        let err = session.start().unwrap_err();

        assert!(matches!(err, CaptureError::StreamStartFailed(_)));
        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(handles.close_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn invalid_config_is_rejected_before_opening() {
        let (provider, handles) = FakeProvider::new();
        let config = CaptureConfiguration {
            sample_rate: 0,
            ..Default::default()
        };
        let mut session = CaptureSession::new(provider, config);

        assert!(matches!(
            session.start(),
            Err(CaptureError::InvalidConfig(_))
        ));
        assert!(handles.callback.lock().is_none());
    }

    #[test]
    fn chunks_flow_to_subscribers_in_order() {
        let (provider, handles) = FakeProvider::new();
        let mut session = CaptureSession::new(provider, CaptureConfiguration::default());
        let chunks = session.subscribe();

        session.start().unwrap();
        handles.emit(&[1.0]);
        handles.emit(&[2.0, 3.0]);
        handles.emit(&[]);

        let received: Vec<Vec<f32>> = chunks.try_iter().map(|c| c.to_vec()).collect();
        assert_eq!(received, vec![vec![1.0], vec![2.0, 3.0], vec![]]);
    }

    #[test]
    fn contended_fan_out_counts_a_dropped_period() {
        let (provider, handles) = FakeProvider::new();
        let mut session = CaptureSession::new(provider, CaptureConfiguration::default());
        let chunks = session.subscribe();

        session.start().unwrap();
        {
            // Hold the fan-out the way a subscribing thread would; the
            // callback must not wait for it.
            let _guard = session.fan_out.lock();
            handles.emit(&[1.0]);
        }
        handles.emit(&[2.0]);

        assert_eq!(session.dropped_chunks(), 1);
        let received: Vec<f32> = chunks.try_iter().map(|c| c[0]).collect();
        assert_eq!(received, vec![2.0]);
    }

    #[test]
    fn callback_goes_quiet_after_stop() {
        let (provider, handles) = FakeProvider::new();
        let mut session = CaptureSession::new(provider, CaptureConfiguration::default());
        let chunks = session.subscribe();

        session.start().unwrap();
        handles.emit(&[1.0]);
        session.stop();
        // The stream has not been torn down yet, but the liveness flag gates
        // the callback.
        handles.emit(&[2.0]);

        let received: Vec<f32> = chunks.try_iter().map(|c| c[0]).collect();
        assert_eq!(received, vec![1.0]);
    }

    #[test]
    fn stop_reaches_closed_and_notifies_once() {
        let (provider, handles) = FakeProvider::new();
        let mut session = CaptureSession::new(provider, CaptureConfiguration::default());
        let observer = RecordingObserver::new();
        session.set_observer(observer.clone());

        session.start().unwrap();
        session.stop();
        wait_for_closed(&session);

        assert!(!session.is_running());
        assert_eq!(handles.close_count.load(Ordering::Relaxed), 1);
        assert_eq!(observer.finished.load(Ordering::Relaxed), 1);
        assert_eq!(
            *observer.states.lock(),
            vec![
                CaptureState::Running,
                CaptureState::Stopping,
                CaptureState::Closed
            ]
        );
    }

    #[test]
    fn double_stop_is_a_noop() {
        let (provider, handles) = FakeProvider::new();
        let mut session = CaptureSession::new(provider, CaptureConfiguration::default());

        session.start().unwrap();
        session.stop();
        session.stop();
        wait_for_closed(&session);
        session.stop();

        assert_eq!(session.state(), CaptureState::Closed);
        assert_eq!(handles.close_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn stop_before_start_is_a_noop() {
        let (provider, _handles) = FakeProvider::new();
        let session = CaptureSession::new(provider, CaptureConfiguration::default());

        session.stop();

        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[test]
    fn start_after_closed_is_rejected() {
        let (provider, _handles) = FakeProvider::new();
        let mut session = CaptureSession::new(provider, CaptureConfiguration::default());

        session.start().unwrap();
        session.stop();
        wait_for_closed(&session);

        assert_eq!(session.start(), Err(CaptureError::SessionClosed));
    }

    #[test]
    fn stream_death_reaches_closed_on_its_own() {
        let (provider, handles) = FakeProvider::new();
        let mut session = CaptureSession::new(provider, CaptureConfiguration::default());
        let observer = RecordingObserver::new();
        session.set_observer(observer.clone());

        session.start().unwrap();
        handles.active.store(false, Ordering::Release);
        wait_for_closed(&session);

        assert!(!session.is_running());
        assert_eq!(observer.finished.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn close_failure_still_reaches_closed() {
        let (mut provider, _handles) = FakeProvider::new();
        provider.fail_close = true;
        let mut session = CaptureSession::new(provider, CaptureConfiguration::default());
        let observer = RecordingObserver::new();
        session.set_observer(observer.clone());

        session.start().unwrap();
        session.stop();
        wait_for_closed(&session);

        assert_eq!(session.state(), CaptureState::Closed);
        assert!(matches!(
            observer.errors.lock().as_slice(),
            [CaptureError::CloseFailed(_)]
        ));
        assert_eq!(observer.finished.load(Ordering::Relaxed), 1);
    }
}
