//! Persistent schedule store.
//!
//! Typed accessors over the retained register bank.  All schedule state
//! that must outlive a sleep lives here; nothing else in the firmware keeps
//! state across a wake cycle.
//!
//! ```text
//!  idx │ register     │ content
//! ─────┼──────────────┼───────────────────────────────
//!   0  │ Provisioned  │ 0xA5A5 once the clock was set
//!   1  │ StartLo      │ start epoch bits 0..16
//!   2  │ StartHi      │ start epoch bits 16..32
//!   3  │ StartMagic   │ 0x5A5A while a start is set
//!   4  │ EndLo        │ end epoch bits 0..16
//!   5  │ EndHi        │ end epoch bits 16..32
//!   6  │ EndMagic     │ 0xE0E0 while an end is set
//!   7  │ Interval     │ seconds (0 reads as the default)
//!   8  │ FirstLog     │ 0x1ED0 after the first append attempt
//! ```
//!
//! Halves are not self-describing: an epoch is present only while its magic
//! register holds the expected value.  Setters write both halves and then
//! the magic; clearers drop the magic first.  Neither ordering is atomic
//! across a power loss.

use core::fmt::Write;

use log::info;

use crate::app::ports::{RetainedRegisters, StorageUsage, WallClock};
use crate::calendar::{self, CalendarError, DateTime};
use crate::config::{DEFAULT_INTERVAL_SECS, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS};

/// Retained register slots used by the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    Provisioned = 0,
    StartLo = 1,
    StartHi = 2,
    StartMagic = 3,
    EndLo = 4,
    EndHi = 5,
    EndMagic = 6,
    Interval = 7,
    FirstLog = 8,
}

impl Register {
    /// Number of registers the schedule occupies.
    pub const COUNT: usize = 9;

    pub const ALL: [Register; Self::COUNT] = [
        Self::Provisioned,
        Self::StartLo,
        Self::StartHi,
        Self::StartMagic,
        Self::EndLo,
        Self::EndHi,
        Self::EndMagic,
        Self::Interval,
        Self::FirstLog,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

pub const PROVISIONED_MAGIC: u32 = 0xA5A5;
pub const START_MAGIC: u32 = 0x5A5A;
pub const END_MAGIC: u32 = 0xE0E0;
pub const FIRST_LOG_MAGIC: u32 = 0x1ED0;

/// Rendered status text, one line with trailing CRLF.
pub type StatusLine = heapless::String<192>;

/// An optional epoch stored as two halves plus a validity magic.
struct EpochSlot {
    lo: Register,
    hi: Register,
    magic_reg: Register,
    magic: u32,
}

const START_SLOT: EpochSlot = EpochSlot {
    lo: Register::StartLo,
    hi: Register::StartHi,
    magic_reg: Register::StartMagic,
    magic: START_MAGIC,
};

const END_SLOT: EpochSlot = EpochSlot {
    lo: Register::EndLo,
    hi: Register::EndHi,
    magic_reg: Register::EndMagic,
    magic: END_MAGIC,
};

/// Snapshot of everything the schedule persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    pub provisioned: bool,
    pub start_epoch: Option<u32>,
    pub end_epoch: Option<u32>,
    pub interval_seconds: u32,
}

/// Clamp a requested interval to the accepted range.
pub fn clamp_interval(seconds: u32) -> u32 {
    seconds.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS)
}

// ---------------------------------------------------------------------------
// ScheduleStore
// ---------------------------------------------------------------------------

/// The process-wide schedule handle: retained registers plus wall clock.
///
/// Created once at boot and lent by reference to the orchestrator and the
/// command dispatcher.
pub struct ScheduleStore<R, C> {
    regs: R,
    clock: C,
}

impl<R: RetainedRegisters, C: WallClock> ScheduleStore<R, C> {
    pub fn new(regs: R, clock: C) -> Self {
        Self { regs, clock }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    // ── Provisioning ──────────────────────────────────────────

    pub fn is_provisioned(&self) -> bool {
        self.regs.read(Register::Provisioned) == PROVISIONED_MAGIC
    }

    pub fn mark_provisioned(&mut self) {
        self.regs.write(Register::Provisioned, PROVISIONED_MAGIC);
    }

    pub fn clear_provisioned(&mut self) {
        self.regs.write(Register::Provisioned, 0);
    }

    // ── Wall clock ────────────────────────────────────────────

    pub fn now(&self) -> u32 {
        self.clock.now()
    }

    pub fn now_calendar(&self) -> DateTime {
        calendar::to_calendar(self.clock.now())
    }

    pub fn set_wall_clock(&mut self, epoch: u32) {
        self.clock.set(epoch);
        info!("Schedule: clock set to {}", calendar::to_calendar(epoch));
    }

    /// Set the clock from ISO-8601 text.  The clock is untouched on error.
    pub fn set_wall_clock_from_iso8601(&mut self, text: &str) -> Result<u32, CalendarError> {
        let epoch = calendar::parse_iso8601(text)?.epoch();
        self.set_wall_clock(epoch);
        Ok(epoch)
    }

    // ── Start / end epochs ────────────────────────────────────

    pub fn set_start_epoch(&mut self, epoch: u32) {
        self.write_slot(&START_SLOT, epoch);
    }

    pub fn start_epoch(&self) -> Option<u32> {
        self.read_slot(&START_SLOT)
    }

    pub fn clear_start_epoch(&mut self) {
        self.clear_slot(&START_SLOT);
    }

    pub fn set_end_epoch(&mut self, epoch: u32) {
        self.write_slot(&END_SLOT, epoch);
    }

    pub fn end_epoch(&self) -> Option<u32> {
        self.read_slot(&END_SLOT)
    }

    pub fn clear_end_epoch(&mut self) {
        self.clear_slot(&END_SLOT);
    }

    // ── Interval ──────────────────────────────────────────────

    /// Store `seconds`, clamped to the accepted range.
    pub fn set_interval(&mut self, seconds: u32) {
        self.regs.write(Register::Interval, clamp_interval(seconds));
    }

    /// Logging interval; a never-written register reads as the default.
    pub fn interval(&self) -> u32 {
        match self.regs.read(Register::Interval) {
            0 => DEFAULT_INTERVAL_SECS,
            v => clamp_interval(v),
        }
    }

    // ── First-log marker ──────────────────────────────────────

    pub fn first_log_done(&self) -> bool {
        self.regs.read(Register::FirstLog) == FIRST_LOG_MAGIC
    }

    pub fn mark_first_log_done(&mut self) {
        self.regs.write(Register::FirstLog, FIRST_LOG_MAGIC);
    }

    // ── Decisions ─────────────────────────────────────────────

    /// True when no start is set or the clock has reached it.
    pub fn should_log_now(&self) -> bool {
        self.start_epoch().is_none_or(|start| self.now() >= start)
    }

    /// True when an end is set and `now` has reached it.
    pub fn end_reached(&self, now: u32) -> bool {
        self.end_epoch().is_some_and(|end| now >= end)
    }

    pub fn snapshot(&self) -> ScheduleState {
        ScheduleState {
            provisioned: self.is_provisioned(),
            start_epoch: self.start_epoch(),
            end_epoch: self.end_epoch(),
            interval_seconds: self.interval(),
        }
    }

    // ── Status text ───────────────────────────────────────────

    /// `time=… provisioned=… start=<calendar|none> end=<calendar|none> interval=…`
    pub fn build_status(&self) -> StatusLine {
        let s = self.snapshot();
        let mut out = StatusLine::new();
        let _ = write!(
            out,
            "time={} provisioned={} start=",
            self.now_calendar(),
            u8::from(s.provisioned)
        );
        push_calendar_or_none(&mut out, s.start_epoch);
        let _ = out.push_str(" end=");
        push_calendar_or_none(&mut out, s.end_epoch);
        let _ = write!(out, " interval={}\r\n", s.interval_seconds);
        out
    }

    /// Status line for the STATUS verb: raw epochs plus storage figures.
    ///
    /// `usage` is `None` when the log volume could not be mounted, which
    /// renders as zeros.
    pub fn build_rich_status(&self, usage: Option<StorageUsage>, reserve_blocks: u32) -> StatusLine {
        let s = self.snapshot();
        let usage = usage.unwrap_or_default();
        let mut out = StatusLine::new();
        let _ = write!(
            out,
            "time={} provisioned={} start={}({}) end={}({}) interval={} \
             fs_used={} fs_total={} full={}\r\n",
            self.now_calendar(),
            u8::from(s.provisioned),
            set_or_none(s.start_epoch),
            s.start_epoch.unwrap_or(0),
            set_or_none(s.end_epoch),
            s.end_epoch.unwrap_or(0),
            s.interval_seconds,
            usage.used_blocks,
            usage.total_blocks,
            u8::from(usage.is_near_full(reserve_blocks)),
        );
        out
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn write_slot(&mut self, slot: &EpochSlot, epoch: u32) {
        self.regs.write(slot.lo, epoch & 0xFFFF);
        self.regs.write(slot.hi, epoch >> 16);
        self.regs.write(slot.magic_reg, slot.magic);
    }

    fn read_slot(&self, slot: &EpochSlot) -> Option<u32> {
        if self.regs.read(slot.magic_reg) != slot.magic {
            return None;
        }
        let lo = self.regs.read(slot.lo) & 0xFFFF;
        let hi = self.regs.read(slot.hi) & 0xFFFF;
        Some((hi << 16) | lo)
    }

    fn clear_slot(&mut self, slot: &EpochSlot) {
        self.regs.write(slot.magic_reg, 0);
        self.regs.write(slot.lo, 0);
        self.regs.write(slot.hi, 0);
    }
}

fn set_or_none(epoch: Option<u32>) -> &'static str {
    if epoch.is_some() { "set" } else { "none" }
}

fn push_calendar_or_none(out: &mut StatusLine, epoch: Option<u32>) {
    match epoch {
        Some(e) => {
            let _ = write!(out, "{}", calendar::to_calendar(e));
        }
        None => {
            let _ = out.push_str("none");
        }
    }
}
