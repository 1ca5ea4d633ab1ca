//! Outbound application events.
//!
//! [`WakeCycle`](super::service::WakeCycle) and
//! [`ServiceWindow`](super::window::ServiceWindow) emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them; the firmware logs them to the console.

use crate::app::ports::{StorageError, StorageUsage, WakeCause};
use crate::app::service::SleepPlan;
use crate::app::window::WindowOutcome;
use crate::fsm::SessionState;
use crate::record::LogRecord;

/// Why no sample was taken this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The start time is still in the future.
    NotStarted { start_epoch: u32 },
    EndReached,
    /// The log volume could not be mounted.
    StorageUnavailable,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A wake cycle began.
    WakeStarted {
        cause: WakeCause,
        epoch: u32,
        first_log_pending: bool,
    },

    /// Host presence held; a service window is opening.
    WindowOpened,

    WindowClosed(WindowOutcome),

    /// The session moved between states.
    SessionChanged { from: SessionState, to: SessionState },

    RecordAppended(LogRecord),

    AppendFailed(StorageError),

    LoggingSkipped(SkipReason),

    /// Result of the post-append storage check.  `usage` is `None` when the
    /// volume was not mounted.
    StorageChecked {
        usage: Option<StorageUsage>,
        near_full: bool,
    },

    /// Exactly one wake source is armed; sleep follows.
    SleepArmed(SleepPlan),
}
