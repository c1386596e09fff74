/// Capture session state machine.
///
/// State transitions:
/// ```text
/// unopened → opened → started ⇄ stopped
///               ↓        ↓         ↓
///               └──────→ closed ←──┘
/// ```
/// `Unopened` is never observed on a live session: construction either
/// completes in `Opened` or fails without leaving a session behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Opened,
    Started,
    Stopped,
    Closed,
}

impl SessionState {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether `start` may be attempted from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Opened | Self::Stopped)
    }
}
