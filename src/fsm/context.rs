//! Shared mutable context threaded through every session state handler.
//!
//! Handlers never touch the link.  They read the link snapshot the window
//! refreshes before each tick, and write [`LinkRequests`] that the window
//! applies after it.

use crate::protocol::Line;

/// Link actions requested by state handlers during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkRequests {
    pub open: bool,
    pub greet: bool,
    pub close: bool,
}

impl LinkRequests {
    pub fn is_empty(&self) -> bool {
        !(self.open || self.greet || self.close)
    }
}

/// The context passed to every session state handler.
#[derive(Debug, Default)]
pub struct SessionContext {
    // -- Timing --
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,
    pub total_ticks: u64,

    // -- Link snapshot (written by the window before each tick) --
    pub link_configured: bool,

    // -- Input --
    /// Single-slot line queue.  A newer line replaces an unconsumed one.
    pub pending_line: Option<Line>,
    /// Set after a QUIT reply went out.
    pub quit_requested: bool,

    // -- Output --
    pub requests: LinkRequests,
    /// Line handed to the dispatcher this tick.
    pub line_to_dispatch: Option<Line>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything from a previous session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
