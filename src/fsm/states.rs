//! Session state handlers and table builder.
//!
//! ```text
//!  IDLE ──[start]──▶ INIT ──[link configured / greet]──▶ READY
//!                                                          │
//!                                                          ▼
//!  EXIT ◀──────────────[quit]──────────────── RECEIVING_COMMAND ─┐
//!    ▲                                               ▲           │
//!    └───────────[stop: host lost / timeout]         └─[line]────┘
//! ```

use super::context::SessionContext;
use super::{SessionState, StateDescriptor};
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.
pub fn build_state_table() -> [StateDescriptor; SessionState::COUNT] {
    [
        StateDescriptor {
            id: SessionState::Idle,
            name: "Idle",
            on_enter: None,
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: SessionState::Init,
            name: "Init",
            on_enter: Some(init_enter),
            on_exit: None,
            on_update: init_update,
        },
        StateDescriptor {
            id: SessionState::Ready,
            name: "Ready",
            on_enter: None,
            on_exit: None,
            on_update: ready_update,
        },
        StateDescriptor {
            id: SessionState::ReceivingCommand,
            name: "ReceivingCommand",
            on_enter: None,
            on_exit: Some(receiving_exit),
            on_update: receiving_update,
        },
        StateDescriptor {
            id: SessionState::Exit,
            name: "Exit",
            on_enter: Some(exit_enter),
            on_exit: None,
            on_update: exit_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE: no service window
// ═══════════════════════════════════════════════════════════════════════════

fn idle_update(_ctx: &mut SessionContext) -> Option<SessionState> {
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  INIT: bring the link up, greet once the host has enumerated
// ═══════════════════════════════════════════════════════════════════════════

fn init_enter(ctx: &mut SessionContext) {
    ctx.requests.open = true;
    info!("SESSION: opening host link");
}

fn init_update(ctx: &mut SessionContext) -> Option<SessionState> {
    if !ctx.link_configured {
        return None;
    }
    info!(
        "SESSION: link configured after {} ticks, greeting host",
        ctx.ticks_in_state
    );
    ctx.requests.greet = true;
    Some(SessionState::Ready)
}

// ═══════════════════════════════════════════════════════════════════════════
//  READY: one tick, then take commands
// ═══════════════════════════════════════════════════════════════════════════

fn ready_update(_ctx: &mut SessionContext) -> Option<SessionState> {
    Some(SessionState::ReceivingCommand)
}

// ═══════════════════════════════════════════════════════════════════════════
//  RECEIVING_COMMAND: hand at most one line per tick to the dispatcher
// ═══════════════════════════════════════════════════════════════════════════

fn receiving_update(ctx: &mut SessionContext) -> Option<SessionState> {
    if ctx.quit_requested {
        return Some(SessionState::Exit);
    }
    if let Some(line) = ctx.pending_line.take() {
        debug!("SESSION: dispatching {} byte line", line.len());
        ctx.line_to_dispatch = Some(line);
    }
    None
}

fn receiving_exit(ctx: &mut SessionContext) {
    ctx.pending_line = None;
    ctx.line_to_dispatch = None;
}

// ═══════════════════════════════════════════════════════════════════════════
//  EXIT: terminal; ask for the link to be torn down
// ═══════════════════════════════════════════════════════════════════════════

fn exit_enter(ctx: &mut SessionContext) {
    ctx.requests.close = true;
    info!("SESSION: closed");
}

fn exit_update(_ctx: &mut SessionContext) -> Option<SessionState> {
    None
}
