//! Whole wake cycles: sample, storage check, service windows, sleep plan.

use crate::mock_hw::{Rig, ScriptedLink, WakeOp};

use wakelogger::app::events::{AppEvent, SkipReason};
use wakelogger::app::ports::{HostLink, SensorError, WakeCause};
use wakelogger::app::service::{ServiceReason, SleepPlan};
use wakelogger::app::window::WindowOutcome;
use wakelogger::record::LogRecord;
use wakelogger::schedule::{FIRST_LOG_MAGIC, Register};

const EPOCH: u32 = 757_382_400;

fn records(rig: &Rig) -> Vec<LogRecord> {
    rig.log
        .data
        .chunks_exact(LogRecord::SIZE)
        .map(|c| {
            let mut b = [0u8; LogRecord::SIZE];
            b.copy_from_slice(c);
            LogRecord::from_bytes(&b)
        })
        .collect()
}

fn position(rig: &Rig, pred: impl Fn(&AppEvent) -> bool) -> Option<usize> {
    rig.events().iter().position(pred)
}

// ── Scheduling ────────────────────────────────────────────────

#[test]
fn timer_wake_logs_and_arms_interval() {
    let mut rig = Rig::new(EPOCH);

    assert_eq!(rig.run_cycle(), SleepPlan::Scheduled { seconds: 30 });
    assert_eq!(rig.wake.ops, vec![WakeOp::DisarmAll, WakeOp::Timer(30)]);

    let recs = records(&rig);
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].epoch, EPOCH);
    assert_eq!(recs[0].temp_x100, 2150);
    assert_eq!(recs[0].rh_x100, 4025);
    assert!(!rig.log.mounted, "volume is unmounted before sleep");
    assert_eq!(
        rig.events().last(),
        Some(&AppEvent::SleepArmed(SleepPlan::Scheduled { seconds: 30 }))
    );
}

#[test]
fn approaching_end_shortens_sleep() {
    let mut rig = Rig::new(EPOCH);
    rig.store.set_end_epoch(EPOCH + 10);
    assert_eq!(rig.run_cycle(), SleepPlan::Scheduled { seconds: 10 });
    assert_eq!(rig.wake.armed(), vec![WakeOp::Timer(10)]);
}

#[test]
fn reached_end_leaves_only_presence_wake() {
    let mut rig = Rig::new(EPOCH);
    rig.store.set_end_epoch(EPOCH);

    assert_eq!(
        rig.run_cycle(),
        SleepPlan::ServiceOnly {
            reason: ServiceReason::EndReached
        }
    );
    assert_eq!(rig.wake.ops, vec![WakeOp::DisarmAll, WakeOp::HostPresence]);
    assert!(records(&rig).is_empty());
    assert_eq!(rig.sensor.reads, 0);
    assert!(rig.events().contains(&AppEvent::LoggingSkipped(SkipReason::EndReached)));
}

#[test]
fn future_start_skips_sample_but_keeps_schedule() {
    let mut rig = Rig::new(EPOCH);
    rig.store.set_start_epoch(EPOCH + 100);

    assert_eq!(rig.run_cycle(), SleepPlan::Scheduled { seconds: 30 });
    assert!(records(&rig).is_empty());
    assert!(rig.events().contains(&AppEvent::LoggingSkipped(SkipReason::NotStarted {
        start_epoch: EPOCH + 100
    })));
}

#[test]
fn reached_start_samples() {
    let mut rig = Rig::new(EPOCH);
    rig.store.set_start_epoch(EPOCH);
    rig.run_cycle();
    assert_eq!(records(&rig).len(), 1);
}

#[test]
fn cycles_walk_up_to_the_end() {
    let mut rig = Rig::new(EPOCH);
    rig.store.set_end_epoch(EPOCH + 45);

    assert_eq!(rig.run_cycle(), SleepPlan::Scheduled { seconds: 30 });
    rig.sleep_and_wake(30, WakeCause::Timer);
    assert_eq!(rig.run_cycle(), SleepPlan::Scheduled { seconds: 15 });
    rig.sleep_and_wake(15, WakeCause::Timer);
    assert_eq!(
        rig.run_cycle(),
        SleepPlan::ServiceOnly {
            reason: ServiceReason::EndReached
        }
    );

    let epochs: Vec<u32> = records(&rig).iter().map(|r| r.epoch).collect();
    assert_eq!(epochs, vec![EPOCH, EPOCH + 30]);
}

// ── Storage ───────────────────────────────────────────────────

#[test]
fn near_full_threshold_is_total_minus_reserve() {
    let mut rig = Rig::new(EPOCH);
    rig.log.total_blocks = 4096;

    rig.log.used_blocks = Some(4093);
    assert_eq!(rig.run_cycle(), SleepPlan::Scheduled { seconds: 30 });

    rig.sleep_and_wake(30, WakeCause::Timer);
    rig.log.used_blocks = Some(4094);
    assert_eq!(
        rig.run_cycle(),
        SleepPlan::ServiceOnly {
            reason: ServiceReason::StorageNearFull
        }
    );
    assert_eq!(rig.wake.armed(), vec![WakeOp::HostPresence]);
}

#[test]
fn unmountable_volume_counts_as_full() {
    let mut rig = Rig::new(EPOCH);
    rig.log.mount_fails = true;

    assert_eq!(
        rig.run_cycle(),
        SleepPlan::ServiceOnly {
            reason: ServiceReason::StorageNearFull
        }
    );
    assert_eq!(rig.sensor.reads, 0);
    assert!(
        rig.events()
            .contains(&AppEvent::LoggingSkipped(SkipReason::StorageUnavailable))
    );
}

#[test]
fn unmountable_volume_is_formatted_once() {
    let mut rig = Rig::new(EPOCH);
    rig.log.mount_fails = true;
    rig.run_cycle();
    assert_eq!(rig.log.formats, 1);
}

#[test]
fn failed_append_is_reported_and_cycle_continues() {
    let mut rig = Rig::new(EPOCH);
    rig.log.append_fails = true;
    assert_eq!(rig.run_cycle(), SleepPlan::Scheduled { seconds: 30 });
    assert!(
        rig.events()
            .iter()
            .any(|e| matches!(e, AppEvent::AppendFailed(_)))
    );
}

// ── Sensor and first-log indicator ────────────────────────────

#[test]
fn sensor_failure_still_appends_sentinel_record() {
    let mut rig = Rig::new(EPOCH);
    rig.sensor.result = Err(SensorError::Crc);
    rig.run_cycle();

    let recs = records(&rig);
    assert_eq!(recs.len(), 1);
    assert!(recs[0].is_sensor_failure());
}

#[test]
fn first_log_lights_indicator_once() {
    let mut rig = Rig::new(EPOCH);
    rig.run_cycle();
    assert_eq!(rig.led.history, vec![true, false]);
    assert_eq!(
        rig.store.registers().words[Register::FirstLog.index()],
        FIRST_LOG_MAGIC
    );

    rig.sleep_and_wake(30, WakeCause::Timer);
    rig.run_cycle();
    assert!(rig.led.history.is_empty());
}

#[test]
fn first_log_marker_set_even_when_sensor_fails() {
    let mut rig = Rig::new(EPOCH);
    rig.sensor.result = Err(SensorError::Bus);
    rig.run_cycle();
    assert!(rig.store.first_log_done());
    assert!(!rig.led.on);
}

#[test]
fn first_log_stays_pending_while_not_started() {
    let mut rig = Rig::new(EPOCH);
    rig.store.set_start_epoch(EPOCH + 1000);
    rig.run_cycle();
    assert!(!rig.store.first_log_done());
    assert!(rig.led.on, "indicator stays lit until the first sample");
}

// ── Host presence ─────────────────────────────────────────────

#[test]
fn presence_wake_serves_host_before_sampling() {
    let mut rig = Rig::new(EPOCH);
    rig.wake = crate::mock_hw::MockWake::new(WakeCause::HostPresence);
    rig.link = ScriptedLink::host(rig.ms.clone(), 2_000, 20);
    rig.link.send_line_at(200, "SETINTERVAL 60");
    rig.link.send_line_at(300, "QUIT");

    assert_eq!(rig.run_cycle(), SleepPlan::Scheduled { seconds: 60 });

    let opened = position(&rig, |e| *e == AppEvent::WindowOpened).unwrap();
    let appended = position(&rig, |e| matches!(e, AppEvent::RecordAppended(_))).unwrap();
    assert!(opened < appended);
    assert_eq!(rig.link.opens, 1, "host gone before the second offer");
    assert!(
        rig.now_ms() >= 2_000 + u64::from(rig.config.release_stable_ms),
        "waited for the host to release"
    );
}

#[test]
fn presence_wake_without_host_just_logs() {
    let mut rig = Rig::new(EPOCH);
    rig.wake = crate::mock_hw::MockWake::new(WakeCause::HostPresence);

    assert_eq!(rig.run_cycle(), SleepPlan::Scheduled { seconds: 30 });
    assert_eq!(rig.link.opens, 0);
    assert_eq!(records(&rig).len(), 1);
}

#[test]
fn host_present_after_logging_can_fetch_fresh_record() {
    let mut rig = Rig::new(EPOCH);
    rig.link = ScriptedLink::host(rig.ms.clone(), 3_000, 20);
    rig.link.send_line_at(200, "GETLOG");
    rig.link.send_line_at(400, "QUIT");

    rig.run_cycle();

    let appended = position(&rig, |e| matches!(e, AppEvent::RecordAppended(_))).unwrap();
    let opened = position(&rig, |e| *e == AppEvent::WindowOpened).unwrap();
    assert!(appended < opened);

    let record_bytes = records(&rig)[0].to_bytes();
    let streamed: Vec<u8> = rig.link.tx.iter().flatten().copied().collect();
    assert!(
        streamed
            .windows(LogRecord::SIZE)
            .any(|w| w == record_bytes.as_slice())
    );
    assert!(
        rig.events()
            .contains(&AppEvent::WindowClosed(WindowOutcome::Quit))
    );
}

#[test]
fn stop_in_service_only_mode_reaches_presence_wake() {
    let mut rig = Rig::new(EPOCH);
    rig.store.set_end_epoch(EPOCH);
    rig.run_cycle();

    rig.sleep_and_wake(600, WakeCause::HostPresence);
    rig.link = ScriptedLink::host(rig.ms.clone(), rig.now_ms() + 2_000, 20);
    let t0 = rig.now_ms();
    rig.link.send_line_at(t0 + 200, "STOPLOG");
    rig.link.send_line_at(t0 + 300, "QUIT");

    assert_eq!(rig.run_cycle(), SleepPlan::Scheduled { seconds: 30 });
    assert_eq!(rig.store.end_epoch(), None);
    assert_eq!(records(&rig).len(), 1);
}

#[test]
fn host_still_present_at_sleep_arms_release_then_presence() {
    let mut rig = Rig::new(EPOCH);
    rig.store.set_end_epoch(EPOCH);
    // A charger: VBUS high forever, never enumerates.
    rig.link = ScriptedLink::host(rig.ms.clone(), u64::MAX, 0);
    rig.link.enumerate_after_ms = None;

    assert_eq!(
        rig.run_cycle(),
        SleepPlan::ServiceOnly {
            reason: ServiceReason::EndReached
        }
    );
    assert!(rig.link.host_present(), "presence held through the release wait");
    assert_eq!(rig.wake.ops, vec![WakeOp::DisarmAll, WakeOp::HostRelease]);

    // Unplugged: the release wake fires once, then insertion is armed.
    rig.sleep_and_wake(600, WakeCause::HostPresence);
    rig.link.present_until = rig.now_ms();
    rig.run_cycle();
    assert_eq!(rig.wake.ops, vec![WakeOp::DisarmAll, WakeOp::HostPresence]);
    assert!(!rig.events().contains(&AppEvent::WindowOpened));
}

#[test]
fn near_full_with_charger_does_not_rearm_presence() {
    let mut rig = Rig::new(EPOCH);
    rig.log.used_blocks = Some(rig.log.total_blocks);
    rig.link = ScriptedLink::host(rig.ms.clone(), u64::MAX, 0);
    rig.link.enumerate_after_ms = None;

    rig.run_cycle();
    assert_eq!(rig.wake.armed(), vec![WakeOp::HostRelease]);
}
