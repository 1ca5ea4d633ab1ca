//! Service window: presence debounce, enumeration, command loop, teardown.

use crate::mock_hw::{Rig, ScriptedLink};

use wakelogger::app::events::AppEvent;
use wakelogger::app::window::{GREETING, WindowOutcome};
use wakelogger::fsm::SessionState;

const EPOCH: u32 = 757_382_400;

fn rig_with_host(until_ms: u64, enumerate_ms: u64) -> Rig {
    let mut rig = Rig::new(EPOCH);
    rig.link = ScriptedLink::host(rig.ms.clone(), until_ms, enumerate_ms);
    rig
}

fn session_changes(rig: &Rig) -> Vec<(SessionState, SessionState)> {
    rig.events()
        .iter()
        .filter_map(|e| match e {
            AppEvent::SessionChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

#[test]
fn no_host_skips_window() {
    let mut rig = Rig::new(EPOCH);
    assert_eq!(rig.run_window(), WindowOutcome::NoHost);
    assert_eq!(rig.link.opens, 0);
    assert!(rig.events().is_empty());
    assert!(rig.now_ms() >= u64::from(rig.config.presence_timeout_ms));
}

#[test]
fn presence_glitch_is_not_a_host() {
    let mut rig = rig_with_host(10, 0);
    assert_eq!(rig.run_window(), WindowOutcome::NoHost);
    assert_eq!(rig.link.opens, 0);
}

#[test]
fn quit_ends_window_after_greeting() {
    let mut rig = rig_with_host(10_000, 50);
    rig.link.send_line_at(200, "STATUS");
    rig.link.send_line_at(300, "QUIT");

    assert_eq!(rig.run_window(), WindowOutcome::Quit);

    let text = rig.link.tx_text();
    assert!(text.starts_with(GREETING), "got {text:?}");
    assert!(text.contains("interval=30"));
    assert!(text.ends_with("OK bye\r\n"));
    assert_eq!(rig.link.opens, 1);
    assert_eq!(rig.link.closes, 1);

    assert_eq!(
        session_changes(&rig),
        vec![
            (SessionState::Idle, SessionState::Init),
            (SessionState::Init, SessionState::Ready),
            (SessionState::Ready, SessionState::ReceivingCommand),
            (SessionState::ReceivingCommand, SessionState::Exit),
        ]
    );
    assert_eq!(rig.events().first(), Some(&AppEvent::WindowOpened));
    assert_eq!(
        rig.events().last(),
        Some(&AppEvent::WindowClosed(WindowOutcome::Quit))
    );
}

#[test]
fn enumeration_timeout_tears_down() {
    let mut rig = rig_with_host(u64::MAX, 0);
    rig.link.enumerate_after_ms = None;

    assert_eq!(rig.run_window(), WindowOutcome::EnumerationTimeout);
    assert!(rig.now_ms() >= u64::from(rig.config.enumeration_timeout_ms));
    assert_eq!(rig.link.closes, 1);
    assert!(rig.link.tx.is_empty(), "no greeting without enumeration");
    assert_eq!(
        session_changes(&rig).last(),
        Some(&(SessionState::Init, SessionState::Exit))
    );
}

#[test]
fn unplug_during_enumeration_is_host_lost() {
    let mut rig = rig_with_host(500, 0);
    rig.link.enumerate_after_ms = None;

    assert_eq!(rig.run_window(), WindowOutcome::HostLost);
    assert!(rig.now_ms() < 1_000, "must not wait for the full timeout");
    assert_eq!(rig.link.closes, 1);
}

#[test]
fn unplug_during_session_is_host_lost() {
    let mut rig = rig_with_host(400, 10);
    assert_eq!(rig.run_window(), WindowOutcome::HostLost);
    assert_eq!(rig.link.closes, 1);
}

#[test]
fn deconfigured_link_is_link_lost() {
    let mut rig = rig_with_host(u64::MAX, 10);
    rig.link.unconfigure_at = 250;
    assert_eq!(rig.run_window(), WindowOutcome::LinkLost);
}

#[test]
fn bytes_before_enumeration_are_not_commands() {
    let mut rig = rig_with_host(10_000, 100);
    rig.link.send_line_at(0, "SETINTERVAL 60");
    rig.link.send_line_at(400, "QUIT");

    assert_eq!(rig.run_window(), WindowOutcome::Quit);
    assert_eq!(rig.store.interval(), 30);
    assert!(!rig.link.tx_text().contains("INTERVAL"));
}

#[test]
fn line_split_across_reads_is_reassembled() {
    let mut rig = rig_with_host(10_000, 10);
    rig.link.rx_script.push_back((200, b"SETINT".to_vec()));
    rig.link.rx_script.push_back((210, b"ERVAL 45\r".to_vec()));
    rig.link.rx_script.push_back((220, b"\n".to_vec()));
    rig.link.send_line_at(300, "QUIT");

    assert_eq!(rig.run_window(), WindowOutcome::Quit);
    assert_eq!(rig.store.interval(), 45);
    assert_eq!(rig.link.tx_text().matches("OK INTERVAL set").count(), 1);
}

#[test]
fn second_line_in_one_read_overwrites_first() {
    let mut rig = rig_with_host(10_000, 10);
    rig.link
        .rx_script
        .push_back((200, b"SETINTERVAL 10\r\nSETINTERVAL 20\r\n".to_vec()));
    rig.link.send_line_at(300, "QUIT");

    assert_eq!(rig.run_window(), WindowOutcome::Quit);
    assert_eq!(rig.store.interval(), 20);
    assert_eq!(rig.link.tx_text().matches("OK INTERVAL set").count(), 1);
}

#[test]
fn settime_in_session_provisions() {
    let mut rig = rig_with_host(10_000, 10);
    rig.link.send_line_at(100, "SETTIME epoch=1000000");
    rig.link.send_line_at(200, "quit");

    assert_eq!(rig.run_window(), WindowOutcome::Quit);
    assert!(rig.store.is_provisioned());
    let now = rig.store.now();
    assert!((1_000_000..1_000_002).contains(&now));
}
