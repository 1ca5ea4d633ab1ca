//! Service window: a bounded host session run inside one wake cycle.
//!
//! ```text
//!  presence stable? ──no──▶ NoHost
//!        │yes
//!        ▼
//!  session.start ─▶ open link ─▶ tick/5ms until configured ──timeout──▶ EnumerationTimeout
//!        │
//!        ▼
//!  tick/1ms: rx bytes ─▶ LineCollector ─▶ Session ─▶ dispatch
//!        │ quit / host lost / link lost
//!        ▼
//!  session.stop ─▶ close link
//! ```
//!
//! The session only asks for link actions; this module performs them.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{Board, EventSink, RetainedRegisters, WallClock};
use crate::config::LoggerConfig;
use crate::fsm::{Session, SessionState};
use crate::poll::{poll_until, wait_stable};
use crate::protocol::stream::send_reply;
use crate::protocol::{CommandEnv, Flow, LineCollector, dispatch};
use crate::schedule::ScheduleStore;

pub const GREETING: &str = "Ready. Type HELP for commands.\r\n";

/// Tick period while waiting for the host to enumerate.
const ENUMERATION_TICK_MS: u32 = 5;
/// Tick period of the command loop.
const SESSION_TICK_MS: u32 = 1;
/// Sampling step for presence debouncing.
const PRESENCE_STEP_MS: u32 = 1;

const RX_CHUNK: usize = 64;

/// Why a service window ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    /// The host sent QUIT.
    Quit,
    /// Host presence dropped during the session.
    HostLost,
    /// The link stopped being configured, or could not be opened.
    LinkLost,
    /// The host never enumerated.
    EnumerationTimeout,
    /// Presence did not hold long enough to open a window.
    NoHost,
}

pub struct ServiceWindow<'c> {
    config: &'c LoggerConfig,
    collector: LineCollector,
}

impl<'c> ServiceWindow<'c> {
    pub fn new(config: &'c LoggerConfig) -> Self {
        Self {
            config,
            collector: LineCollector::new(),
        }
    }

    /// Run one window to completion.
    pub fn run<R: RetainedRegisters, C: WallClock>(
        &mut self,
        store: &mut ScheduleStore<R, C>,
        board: &mut Board<'_>,
        sink: &mut dyn EventSink,
    ) -> WindowOutcome {
        let cfg = self.config;

        let link = &*board.link;
        if !wait_stable(
            board.timebase,
            true,
            cfg.presence_stable_ms,
            cfg.presence_timeout_ms,
            PRESENCE_STEP_MS,
            || link.host_present(),
        ) {
            info!("Service window: host presence not stable");
            return WindowOutcome::NoHost;
        }

        sink.emit(&AppEvent::WindowOpened);
        self.collector.reset();
        let mut session = Session::new();

        let before = session.state();
        session.start();
        report_change(&session, before, sink);

        let outcome = match self.enumerate(&mut session, board, sink) {
            Some(outcome) => outcome,
            None => self.serve(&mut session, store, board, sink),
        };

        let before = session.state();
        session.stop();
        report_change(&session, before, sink);
        apply_requests(&mut session, board, cfg);

        info!("Service window closed: {:?}", outcome);
        sink.emit(&AppEvent::WindowClosed(outcome));
        outcome
    }

    /// Open the link and wait for the host to configure it.  `Some` ends
    /// the window early.
    fn enumerate(
        &mut self,
        session: &mut Session,
        board: &mut Board<'_>,
        sink: &mut dyn EventSink,
    ) -> Option<WindowOutcome> {
        let cfg = self.config;
        if !apply_requests(session, board, cfg) {
            return Some(WindowOutcome::LinkLost);
        }

        let link = &*board.link;
        let configured = poll_until(
            board.timebase,
            cfg.enumeration_timeout_ms,
            ENUMERATION_TICK_MS,
            |_| {
                if !link.host_present() {
                    return true;
                }
                let before = session.state();
                session.tick(link.is_configured());
                report_change(session, before, sink);
                link.is_configured()
            },
        );

        if !board.link.host_present() {
            return Some(WindowOutcome::HostLost);
        }
        if !configured {
            warn!(
                "Service window: host did not enumerate within {} ms",
                cfg.enumeration_timeout_ms
            );
            return Some(WindowOutcome::EnumerationTimeout);
        }

        // Bytes received before enumeration finished are not commands.
        let mut scratch = [0u8; RX_CHUNK];
        while board.link.read(&mut scratch) > 0 {}
        self.collector.reset();

        apply_requests(session, board, cfg);
        None
    }

    /// Command loop.
    fn serve<R: RetainedRegisters, C: WallClock>(
        &mut self,
        session: &mut Session,
        store: &mut ScheduleStore<R, C>,
        board: &mut Board<'_>,
        sink: &mut dyn EventSink,
    ) -> WindowOutcome {
        let cfg = self.config;
        let mut rx = [0u8; RX_CHUNK];

        loop {
            if !session.is_active() {
                return WindowOutcome::Quit;
            }
            if !board.link.host_present() {
                return WindowOutcome::HostLost;
            }
            if !board.link.is_configured() {
                return WindowOutcome::LinkLost;
            }

            loop {
                let n = board.link.read(&mut rx);
                if n == 0 {
                    break;
                }
                self.collector.feed(&rx[..n], |line| session.post_line(line));
            }

            let before = session.state();
            session.tick(board.link.is_configured());
            report_change(session, before, sink);

            if let Some(line) = session.take_line() {
                let mut env = CommandEnv {
                    store: &mut *store,
                    board: &mut *board,
                    config: cfg,
                };
                if dispatch(&mut env, &line) == Flow::Quit {
                    session.request_quit();
                }
            }

            apply_requests(session, board, cfg);
            board.timebase.delay_ms(SESSION_TICK_MS);
        }
    }
}

/// Wait for the host-presence signal to go low and settle.  Returns
/// `false` if it was still present at the timeout.
pub fn wait_for_release(board: &mut Board<'_>, cfg: &LoggerConfig) -> bool {
    let link = &*board.link;
    let released = wait_stable(
        board.timebase,
        false,
        cfg.release_stable_ms,
        cfg.release_timeout_ms,
        PRESENCE_STEP_MS,
        || link.host_present(),
    );
    if !released {
        warn!("Host still present after {} ms", cfg.release_timeout_ms);
    }
    released
}

/// Perform what the session asked for.  `false` if the link failed to open.
fn apply_requests(session: &mut Session, board: &mut Board<'_>, cfg: &LoggerConfig) -> bool {
    let req = session.take_requests();
    let mut ok = true;
    if req.open {
        if let Err(e) = board.link.open() {
            warn!("Host link open failed: {}", e);
            ok = false;
        }
    }
    if req.greet
        && !send_reply(
            board.link,
            board.timebase,
            GREETING.as_bytes(),
            cfg.reply_timeout_ms,
        )
    {
        warn!("Greeting not delivered");
    }
    if req.close {
        board.link.close();
    }
    ok
}

fn report_change(session: &Session, before: SessionState, sink: &mut dyn EventSink) {
    let after = session.state();
    if after != before {
        sink.emit(&AppEvent::SessionChanged {
            from: before,
            to: after,
        });
    }
}
