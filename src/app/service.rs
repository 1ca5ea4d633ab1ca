//! Wake cycle: the whole life of the firmware between two sleeps.
//!
//! [`WakeCycle`] owns no state of its own.  Every input is re-read from
//! the [`ScheduleStore`] and the board each time the device wakes, and the
//! cycle ends by arming exactly one wake source.
//!
//! ```text
//!  wake ─▶ [window if woken by host] ─▶ mount ─▶ sample+append ─▶ usage
//!       ─▶ unmount ─▶ [window if host present] ─▶ decide ─▶ arm one source
//! ```

use log::{info, warn};

use crate::app::events::{AppEvent, SkipReason};
use crate::app::ports::{Board, EventSink, RetainedRegisters, WakeCause, WallClock};
use crate::app::window::{self, ServiceWindow, WindowOutcome};
use crate::config::LoggerConfig;
use crate::record::LogRecord;
use crate::schedule::ScheduleStore;

/// Why no timer wake was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceReason {
    StorageNearFull,
    EndReached,
}

/// The single wake source armed at the end of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepPlan {
    /// Timer wake after `seconds`.
    Scheduled { seconds: u32 },
    /// Host-presence wake only; no more scheduled logging.
    ServiceOnly { reason: ServiceReason },
}

/// Choose the next sleep.  A near-full volume wins over the end time; an
/// end time closer than one interval shortens the sleep to reach it.
pub fn decide_sleep(now: u32, end_epoch: Option<u32>, interval: u32, near_full: bool) -> SleepPlan {
    if near_full {
        return SleepPlan::ServiceOnly {
            reason: ServiceReason::StorageNearFull,
        };
    }
    match end_epoch {
        Some(end) if now >= end => SleepPlan::ServiceOnly {
            reason: ServiceReason::EndReached,
        },
        Some(end) => SleepPlan::Scheduled {
            seconds: interval.min(end - now),
        },
        None => SleepPlan::Scheduled { seconds: interval },
    }
}

pub struct WakeCycle<'c> {
    config: &'c LoggerConfig,
}

impl<'c> WakeCycle<'c> {
    pub fn new(config: &'c LoggerConfig) -> Self {
        Self { config }
    }

    /// Run one cycle and arm the next wake.  The caller enters sleep.
    pub fn run<R: RetainedRegisters, C: WallClock>(
        &self,
        store: &mut ScheduleStore<R, C>,
        board: &mut Board<'_>,
        sink: &mut dyn EventSink,
    ) -> SleepPlan {
        let cause = board.wake.wake_cause();
        let first_log_pending = !store.first_log_done();
        sink.emit(&AppEvent::WakeStarted {
            cause,
            epoch: store.now(),
            first_log_pending,
        });
        if first_log_pending {
            board.indicator.set(true);
        }

        if cause == WakeCause::HostPresence && board.link.host_present() {
            self.service(store, board, sink);
        }

        let near_full = self.log_and_check(store, board, sink);

        if board.link.host_present() {
            self.service(store, board, sink);
        }

        let plan = decide_sleep(store.now(), store.end_epoch(), store.interval(), near_full);
        board.wake.disarm_all();
        match plan {
            SleepPlan::Scheduled { seconds } => board.wake.arm_timer(seconds),
            SleepPlan::ServiceOnly { .. } if board.link.host_present() => {
                info!("Host still present, waking on removal");
                board.wake.arm_host_release();
            }
            SleepPlan::ServiceOnly { .. } => board.wake.arm_host_presence(),
        }
        sink.emit(&AppEvent::SleepArmed(plan));
        plan
    }

    /// Mount, sample if the schedule allows, check usage, unmount.
    /// Returns the near-full verdict; an unmountable volume counts as full.
    fn log_and_check<R: RetainedRegisters, C: WallClock>(
        &self,
        store: &mut ScheduleStore<R, C>,
        board: &mut Board<'_>,
        sink: &mut dyn EventSink,
    ) -> bool {
        if let Err(e) = board.log.mount_or_format() {
            warn!("Log volume unavailable: {}", e);
            sink.emit(&AppEvent::LoggingSkipped(SkipReason::StorageUnavailable));
            sink.emit(&AppEvent::StorageChecked {
                usage: None,
                near_full: true,
            });
            return true;
        }

        let now = store.now();
        if let Some(start_epoch) = store.start_epoch().filter(|_| !store.should_log_now()) {
            sink.emit(&AppEvent::LoggingSkipped(SkipReason::NotStarted { start_epoch }));
        } else if store.end_reached(now) {
            sink.emit(&AppEvent::LoggingSkipped(SkipReason::EndReached));
        } else {
            self.sample(store, board, sink, now);
        }

        let usage = match board.log.usage() {
            Ok(u) => Some(u),
            Err(e) => {
                warn!("Log volume usage unknown: {}", e);
                None
            }
        };
        let near_full = usage.is_some_and(|u| u.is_near_full(self.config.reserve_blocks));
        sink.emit(&AppEvent::StorageChecked { usage, near_full });
        board.log.unmount();
        near_full
    }

    fn sample<R: RetainedRegisters, C: WallClock>(
        &self,
        store: &mut ScheduleStore<R, C>,
        board: &mut Board<'_>,
        sink: &mut dyn EventSink,
        now: u32,
    ) {
        let reading = board.sensor.read();
        if let Err(e) = &reading {
            warn!("Sensor read failed: {}", e);
        }
        let record = LogRecord::from_reading(now, reading);
        match board.log.append(&record.to_bytes()) {
            Ok(()) => sink.emit(&AppEvent::RecordAppended(record)),
            Err(e) => sink.emit(&AppEvent::AppendFailed(e)),
        }

        if !store.first_log_done() {
            info!("First log attempt done");
            store.mark_first_log_done();
            board.indicator.set(false);
        }
    }

    fn service<R: RetainedRegisters, C: WallClock>(
        &self,
        store: &mut ScheduleStore<R, C>,
        board: &mut Board<'_>,
        sink: &mut dyn EventSink,
    ) {
        let outcome = ServiceWindow::new(self.config).run(store, board, sink);
        if outcome != WindowOutcome::NoHost {
            window::wait_for_release(board, self.config);
        }
    }
}
