/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → running → stopping → closed
/// ```
///
/// `Closed` is terminal: the stream handle is released exactly once on the
/// way in, and a session that reached it cannot be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Running,
    Stopping,
    Closed,
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
