//! Bounded busy-wait helpers.
//!
//! Every wait in the firmware is a readiness predicate polled against a
//! deadline on a [`Timebase`]; there is no scheduler to yield to.

use crate::app::ports::Timebase;

/// Poll `ready` every `step_ms` until it returns `true` or `timeout_ms`
/// elapses.  The predicate receives the current `now_ms` and is always
/// evaluated at least once.
pub fn poll_until(
    tb: &mut dyn Timebase,
    timeout_ms: u32,
    step_ms: u32,
    mut ready: impl FnMut(u64) -> bool,
) -> bool {
    let start = tb.now_ms();
    loop {
        let now = tb.now_ms();
        if ready(now) {
            return true;
        }
        if now.saturating_sub(start) >= u64::from(timeout_ms) {
            return false;
        }
        tb.delay_ms(step_ms.max(1));
    }
}

/// Wait until `sample()` reads `want` and has not changed for `stable_ms`,
/// giving up after `timeout_ms`.
pub fn wait_stable(
    tb: &mut dyn Timebase,
    want: bool,
    stable_ms: u32,
    timeout_ms: u32,
    step_ms: u32,
    mut sample: impl FnMut() -> bool,
) -> bool {
    let mut last = sample();
    let mut since = tb.now_ms();
    poll_until(tb, timeout_ms, step_ms, |now| {
        let level = sample();
        if level != last {
            last = level;
            since = now;
        }
        level == want && now.saturating_sub(since) >= u64::from(stable_ms)
    })
}
