//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (console UART in production, stderr on the host).

use log::{info, warn};

use crate::app::events::{AppEvent, SkipReason};
use crate::app::ports::EventSink;
use crate::app::service::SleepPlan;
use crate::calendar;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::WakeStarted {
                cause,
                epoch,
                first_log_pending,
            } => {
                info!(
                    "WAKE  | cause={:?} | time={} | first_log_pending={}",
                    cause,
                    calendar::to_calendar(*epoch),
                    first_log_pending
                );
            }
            AppEvent::WindowOpened => info!("HOST  | service window open"),
            AppEvent::WindowClosed(outcome) => {
                info!("HOST  | service window closed: {:?}", outcome);
            }
            AppEvent::SessionChanged { from, to } => {
                info!("SESS  | {:?} -> {:?}", from, to);
            }
            AppEvent::RecordAppended(rec) => {
                if rec.is_sensor_failure() {
                    warn!("LOG   | epoch={} | sensor failed, sentinel record", rec.epoch);
                } else {
                    info!(
                        "LOG   | epoch={} | T={:.2}\u{00b0}C | RH={:.2}%",
                        rec.epoch,
                        f32::from(rec.temp_x100) / 100.0,
                        f32::from(rec.rh_x100) / 100.0,
                    );
                }
            }
            AppEvent::AppendFailed(err) => warn!("LOG   | append failed: {}", err),
            AppEvent::LoggingSkipped(reason) => match reason {
                SkipReason::NotStarted { start_epoch } => {
                    info!("LOG   | waiting for start {}", calendar::to_calendar(*start_epoch));
                }
                SkipReason::EndReached => info!("LOG   | end time reached"),
                SkipReason::StorageUnavailable => warn!("LOG   | log volume unavailable"),
            },
            AppEvent::StorageChecked { usage, near_full } => match usage {
                Some(u) => info!(
                    "FS    | used={}/{} blocks | near_full={}",
                    u.used_blocks, u.total_blocks, near_full
                ),
                None => warn!("FS    | usage unknown | near_full={}", near_full),
            },
            AppEvent::SleepArmed(plan) => match plan {
                SleepPlan::Scheduled { seconds } => {
                    info!("SLEEP | timer wake in {} s", seconds);
                }
                SleepPlan::ServiceOnly { reason } => {
                    info!("SLEEP | host-presence wake only ({:?})", reason);
                }
            },
        }
    }
}
