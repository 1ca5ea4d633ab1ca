//! Function-pointer finite state machine engine, driving the host session.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                       │
//! │  ┌──────────────────┬──────────┬──────────┬───────────────────┐   │
//! │  │ SessionState     │ on_enter │ on_exit  │ on_update         │   │
//! │  ├──────────────────┼──────────┼──────────┼───────────────────┤   │
//! │  │ Idle             │ -        │ -        │ fn(ctx)->Option<> │   │
//! │  │ Init             │ fn(ctx)  │ -        │ fn(ctx)->Option<> │   │
//! │  │ Ready            │ -        │ -        │ fn(ctx)->Option<> │   │
//! │  │ ReceivingCommand │ -        │ fn(ctx)  │ fn(ctx)->Option<> │   │
//! │  │ Exit             │ fn(ctx)  │ -        │ fn(ctx)->Option<> │   │
//! │  └──────────────────┴──────────┴──────────┴───────────────────┘   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  All functions receive `&mut SessionContext`.
//!
//! [`Session`] wraps the engine with the operations the service window
//! needs: start, stop, post a line, tick, and collect what the handlers
//! asked for.

pub mod context;
pub mod states;

use context::{LinkRequests, SessionContext};
use log::{info, warn};

use crate::protocol::Line;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Host session states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Init = 1,
    Ready = 2,
    ReceivingCommand = 3,
    Exit = 4,
}

impl SessionState {
    pub const COUNT: usize = 5;

    /// Convert an index back to `SessionState`.  Panics on out-of-range in
    /// debug builds; returns `Exit` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Init,
            2 => Self::Ready,
            3 => Self::ReceivingCommand,
            4 => Self::Exit,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Exit
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut SessionContext);

/// Per-tick update handler.  Returns `Some(next)` to transition.
pub type StateUpdateFn = fn(&mut SessionContext) -> Option<SessionState>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single state.
pub struct StateDescriptor {
    pub id: SessionState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `SessionState as usize`.
    table: [StateDescriptor; SessionState::COUNT],
    current: usize,
    /// Monotonically increasing tick counter.
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; SessionState::COUNT], initial: SessionState) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    pub fn start(&mut self, ctx: &mut SessionContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance by one tick: `on_update`, then the transition it asked for.
    pub fn tick(&mut self, ctx: &mut SessionContext) {
        self.tick_count += 1;
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;
        ctx.total_ticks = self.tick_count;

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Jump to `next` regardless of what `on_update` would return.
    pub fn force_transition(&mut self, next: SessionState, ctx: &mut SessionContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> SessionState {
        SessionState::from_index(self.current)
    }

    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    fn transition(&mut self, next_id: SessionState, ctx: &mut SessionContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One host session: the engine plus its context.
pub struct Session {
    fsm: Fsm,
    ctx: SessionContext,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let mut session = Self {
            fsm: Fsm::new(states::build_state_table(), SessionState::Idle),
            ctx: SessionContext::new(),
        };
        session.fsm.start(&mut session.ctx);
        session
    }

    /// Begin a session.  Ignored while one is already running.
    pub fn start(&mut self) {
        if self.is_active() {
            warn!("Session already running");
            return;
        }
        self.ctx.reset();
        self.fsm.force_transition(SessionState::Init, &mut self.ctx);
    }

    /// End the session from outside (host lost, enumeration timeout).
    pub fn stop(&mut self) {
        if self.is_active() {
            self.fsm.force_transition(SessionState::Exit, &mut self.ctx);
        }
    }

    /// Queue a received line.  Only one line is held between ticks; a newer
    /// one replaces it.
    pub fn post_line(&mut self, line: Line) {
        if self.ctx.pending_line.replace(line).is_some() {
            warn!("Session: unconsumed line overwritten");
        }
    }

    /// Tick with the current link state.
    pub fn tick(&mut self, link_configured: bool) {
        self.ctx.link_configured = link_configured;
        self.fsm.tick(&mut self.ctx);
    }

    /// Link actions requested since the last call.
    pub fn take_requests(&mut self) -> LinkRequests {
        core::mem::take(&mut self.ctx.requests)
    }

    /// The line the current state wants dispatched, if any.
    pub fn take_line(&mut self) -> Option<Line> {
        self.ctx.line_to_dispatch.take()
    }

    /// The dispatcher handled QUIT; leave on the next tick.
    pub fn request_quit(&mut self) {
        self.ctx.quit_requested = true;
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state(), SessionState::Idle | SessionState::Exit)
    }

    pub fn state(&self) -> SessionState {
        self.fsm.current_state()
    }
}
