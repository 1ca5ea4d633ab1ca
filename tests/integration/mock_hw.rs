//! Mock hardware for integration tests.
//!
//! Every adapter shares one virtual millisecond counter, so waits and
//! timeouts run instantly and deterministically.  The host link is
//! scripted against that counter: presence window, enumeration delay, and
//! RX bytes that arrive at fixed times.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use wakelogger::app::events::AppEvent;
use wakelogger::app::ports::{
    Board, EventSink, HostLink, HumiditySensor, Indicator, LinkError, LogStore, Reading,
    RetainedRegisters, SensorError, StorageError, StorageUsage, Timebase, WakeCause, WakeControl,
    WallClock,
};
use wakelogger::app::service::{SleepPlan, WakeCycle};
use wakelogger::app::window::{ServiceWindow, WindowOutcome};
use wakelogger::config::LoggerConfig;
use wakelogger::protocol::{CommandEnv, Flow, dispatch};
use wakelogger::schedule::{Register, ScheduleStore};

pub type SharedMs = Rc<Cell<u64>>;

// ── Time ──────────────────────────────────────────────────────

pub struct VirtualTimebase {
    ms: SharedMs,
}

impl Timebase for VirtualTimebase {
    fn now_ms(&self) -> u64 {
        self.ms.get()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.ms.set(self.ms.get() + u64::from(ms));
    }
}

/// Wall clock that advances with the virtual millisecond counter.
pub struct MockWallClock {
    base: u32,
    ms: SharedMs,
}

impl WallClock for MockWallClock {
    fn now(&self) -> u32 {
        self.base + (self.ms.get() / 1000) as u32
    }

    fn set(&mut self, epoch: u32) {
        self.base = epoch.saturating_sub((self.ms.get() / 1000) as u32);
    }
}

// ── Registers ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MemRegisters {
    pub words: [u32; 16],
}

impl RetainedRegisters for MemRegisters {
    fn read(&self, reg: Register) -> u32 {
        self.words[reg.index()]
    }

    fn write(&mut self, reg: Register, value: u32) {
        self.words[reg.index()] = value;
    }
}

// ── Log store ─────────────────────────────────────────────────

pub struct MemLogStore {
    pub data: Vec<u8>,
    pub exists: bool,
    pub mounted: bool,
    pub mount_fails: bool,
    pub format_fails: bool,
    pub append_fails: bool,
    pub total_blocks: u32,
    /// Overrides the used-block figure derived from `data`.
    pub used_blocks: Option<u32>,
    pub mounts: u32,
    pub formats: u32,
}

pub const MOCK_BLOCK_SIZE: usize = 4096;

impl Default for MemLogStore {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            exists: false,
            mounted: false,
            mount_fails: false,
            format_fails: false,
            append_fails: false,
            total_blocks: 64,
            used_blocks: None,
            mounts: 0,
            formats: 0,
        }
    }
}

#[allow(dead_code)]
impl MemLogStore {
    pub fn with_log(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            exists: true,
            ..Default::default()
        }
    }

    fn require_mounted(&self) -> Result<(), StorageError> {
        if self.mounted { Ok(()) } else { Err(StorageError::Mount) }
    }

    fn require_file(&self) -> Result<(), StorageError> {
        self.require_mounted()?;
        if self.exists { Ok(()) } else { Err(StorageError::NotFound) }
    }
}

impl LogStore for MemLogStore {
    fn mount(&mut self) -> Result<(), StorageError> {
        if self.mount_fails {
            return Err(StorageError::Mount);
        }
        self.mounts += 1;
        self.mounted = true;
        Ok(())
    }

    fn format(&mut self) -> Result<(), StorageError> {
        self.mounted = false;
        if self.format_fails {
            return Err(StorageError::Io);
        }
        self.formats += 1;
        self.data.clear();
        self.exists = false;
        Ok(())
    }

    fn unmount(&mut self) {
        self.mounted = false;
    }

    fn append(&mut self, data: &[u8]) -> Result<(), StorageError> {
        self.require_mounted()?;
        if self.append_fails {
            return Err(StorageError::Full);
        }
        self.exists = true;
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn log_size(&mut self) -> Result<u64, StorageError> {
        self.require_file()?;
        Ok(self.data.len() as u64)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.require_file()?;
        let start = (offset as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        self.require_file()?;
        self.exists = false;
        self.data.clear();
        Ok(())
    }

    fn usage(&mut self) -> Result<StorageUsage, StorageError> {
        self.require_mounted()?;
        Ok(StorageUsage {
            used_blocks: self
                .used_blocks
                .unwrap_or(self.data.len().div_ceil(MOCK_BLOCK_SIZE) as u32),
            total_blocks: self.total_blocks,
        })
    }
}

// ── Sensor ────────────────────────────────────────────────────

pub struct MockSensor {
    pub result: Result<Reading, SensorError>,
    pub reads: u32,
}

impl Default for MockSensor {
    fn default() -> Self {
        Self {
            result: Ok(Reading {
                temperature_c: 21.5,
                humidity_pct: 40.25,
            }),
            reads: 0,
        }
    }
}

impl HumiditySensor for MockSensor {
    fn read(&mut self) -> Result<Reading, SensorError> {
        self.reads += 1;
        self.result
    }
}

// ── Host link ─────────────────────────────────────────────────

/// Host link driven by a script on the virtual clock.
pub struct ScriptedLink {
    ms: SharedMs,
    /// Presence holds on `[present_from, present_until)`.
    pub present_from: u64,
    pub present_until: u64,
    /// Milliseconds after `open` until the host has enumerated; `None`
    /// never enumerates.
    pub enumerate_after_ms: Option<u64>,
    /// The host drops the configuration (but stays plugged in) from here on.
    pub unconfigure_at: u64,
    /// RX bytes and the virtual time they become readable.
    pub rx_script: VecDeque<(u64, Vec<u8>)>,
    rx: VecDeque<u8>,
    /// Next `begin_packet` calls to reject as busy.
    pub busy_for: u32,
    pub opened_at: Option<u64>,
    pub opens: u32,
    pub closes: u32,
    /// One entry per accepted packet, including empty ones.
    pub tx: Vec<Vec<u8>>,
}

#[allow(dead_code)]
impl ScriptedLink {
    /// A host that is never there.
    pub fn absent(ms: SharedMs) -> Self {
        Self {
            ms,
            present_from: u64::MAX,
            present_until: u64::MAX,
            enumerate_after_ms: Some(0),
            unconfigure_at: u64::MAX,
            rx_script: VecDeque::new(),
            rx: VecDeque::new(),
            busy_for: 0,
            opened_at: None,
            opens: 0,
            closes: 0,
            tx: Vec::new(),
        }
    }

    /// Present from now until `until_ms`, enumerating `enumerate_ms` after open.
    pub fn host(ms: SharedMs, until_ms: u64, enumerate_ms: u64) -> Self {
        let now = ms.get();
        Self {
            present_from: now,
            present_until: until_ms,
            enumerate_after_ms: Some(enumerate_ms),
            ..Self::absent(ms)
        }
    }

    /// Already open and configured, present forever.
    pub fn attached(ms: SharedMs) -> Self {
        let now = ms.get();
        Self {
            present_from: now,
            opened_at: Some(now),
            ..Self::absent(ms)
        }
    }

    /// Queue `line` plus CRLF to arrive at `at_ms`.
    pub fn send_line_at(&mut self, at_ms: u64, line: &str) {
        self.rx_script
            .push_back((at_ms, format!("{line}\r\n").into_bytes()));
    }

    pub fn tx_text(&self) -> String {
        String::from_utf8_lossy(&self.tx.concat()).into_owned()
    }

    pub fn tx_lens(&self) -> Vec<usize> {
        self.tx.iter().map(Vec::len).collect()
    }

    fn now(&self) -> u64 {
        self.ms.get()
    }
}

impl HostLink for ScriptedLink {
    fn host_present(&self) -> bool {
        let now = self.now();
        now >= self.present_from && now < self.present_until
    }

    fn open(&mut self) -> Result<(), LinkError> {
        self.opens += 1;
        self.opened_at = Some(self.now());
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
        self.opened_at = None;
        self.rx.clear();
    }

    fn is_configured(&self) -> bool {
        match (self.opened_at, self.enumerate_after_ms) {
            (Some(at), Some(after)) => {
                let now = self.now();
                self.host_present() && now >= at + after && now < self.unconfigure_at
            }
            _ => false,
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        if self.opened_at.is_none() {
            return 0;
        }
        let now = self.now();
        while self.rx_script.front().is_some_and(|(at, _)| *at <= now) {
            if let Some((_, bytes)) = self.rx_script.pop_front() {
                self.rx.extend(bytes);
            }
        }
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn begin_packet(&mut self, packet: &[u8]) -> Result<(), LinkError> {
        if !self.is_configured() {
            return Err(LinkError::NotConfigured);
        }
        if self.busy_for > 0 {
            self.busy_for -= 1;
            return Err(LinkError::Busy);
        }
        self.tx.push(packet.to_vec());
        Ok(())
    }

    fn packet_done(&mut self) -> bool {
        true
    }
}

// ── Wake control ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOp {
    DisarmAll,
    Timer(u32),
    HostPresence,
    HostRelease,
}

pub struct MockWake {
    pub cause: WakeCause,
    pub ops: Vec<WakeOp>,
}

#[allow(dead_code)]
impl MockWake {
    pub fn new(cause: WakeCause) -> Self {
        Self {
            cause,
            ops: Vec::new(),
        }
    }

    /// Sources left armed after the last disarm.
    pub fn armed(&self) -> Vec<WakeOp> {
        let from = self
            .ops
            .iter()
            .rposition(|op| *op == WakeOp::DisarmAll)
            .map_or(0, |i| i + 1);
        self.ops[from..].to_vec()
    }
}

impl WakeControl for MockWake {
    fn wake_cause(&self) -> WakeCause {
        self.cause
    }

    fn disarm_all(&mut self) {
        self.ops.push(WakeOp::DisarmAll);
    }

    fn arm_timer(&mut self, seconds: u32) {
        self.ops.push(WakeOp::Timer(seconds));
    }

    fn arm_host_presence(&mut self) {
        self.ops.push(WakeOp::HostPresence);
    }

    fn arm_host_release(&mut self) {
        self.ops.push(WakeOp::HostRelease);
    }
}

// ── Indicator ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLed {
    pub on: bool,
    pub history: Vec<bool>,
}

#[allow(dead_code)]
impl MockLed {
    /// Number of completed pulses (a toggle followed by its restore).
    pub fn toggles(&self) -> usize {
        self.history.len()
    }
}

impl Indicator for MockLed {
    fn set(&mut self, on: bool) {
        self.on = on;
        self.history.push(on);
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// One simulated board with every port mocked.
pub struct Rig {
    pub ms: SharedMs,
    pub store: ScheduleStore<MemRegisters, MockWallClock>,
    pub log: MemLogStore,
    pub sensor: MockSensor,
    pub link: ScriptedLink,
    pub timebase: VirtualTimebase,
    pub wake: MockWake,
    pub led: MockLed,
    pub sink: RecordingSink,
    pub config: LoggerConfig,
}

#[allow(dead_code)]
impl Rig {
    /// Timer wake at wall time `epoch` with no host around.
    pub fn new(epoch: u32) -> Self {
        let ms: SharedMs = Rc::new(Cell::new(0));
        Self {
            store: ScheduleStore::new(
                MemRegisters::default(),
                MockWallClock {
                    base: epoch,
                    ms: ms.clone(),
                },
            ),
            log: MemLogStore::default(),
            sensor: MockSensor::default(),
            link: ScriptedLink::absent(ms.clone()),
            timebase: VirtualTimebase { ms: ms.clone() },
            wake: MockWake::new(WakeCause::Timer),
            led: MockLed::default(),
            sink: RecordingSink::default(),
            config: LoggerConfig::default(),
            ms,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.ms.get()
    }

    pub fn run_cycle(&mut self) -> SleepPlan {
        let Self {
            store,
            log,
            sensor,
            link,
            timebase,
            wake,
            led,
            sink,
            config,
            ..
        } = self;
        let mut board = Board {
            log,
            sensor,
            link,
            timebase,
            wake,
            indicator: led,
        };
        WakeCycle::new(config).run(store, &mut board, sink)
    }

    pub fn run_window(&mut self) -> WindowOutcome {
        let Self {
            store,
            log,
            sensor,
            link,
            timebase,
            wake,
            led,
            sink,
            config,
            ..
        } = self;
        let mut board = Board {
            log,
            sensor,
            link,
            timebase,
            wake,
            indicator: led,
        };
        ServiceWindow::new(config).run(store, &mut board, sink)
    }

    /// Dispatch one line as if the session had just taken it.
    pub fn dispatch(&mut self, line: impl AsRef<[u8]>) -> Flow {
        let Self {
            store,
            log,
            sensor,
            link,
            timebase,
            wake,
            led,
            config,
            ..
        } = self;
        let mut board = Board {
            log,
            sensor,
            link,
            timebase,
            wake,
            indicator: led,
        };
        let mut env = CommandEnv {
            store,
            board: &mut board,
            config,
        };
        dispatch(&mut env, line.as_ref())
    }

    /// Simulate deep sleep for `seconds` followed by a wake from `cause`.
    /// Only the registers, the wall clock and the log volume survive.
    pub fn sleep_and_wake(&mut self, seconds: u32, cause: WakeCause) {
        self.ms.set(self.ms.get() + u64::from(seconds) * 1000);
        self.wake = MockWake::new(cause);
        self.led = MockLed::default();
        self.sink = RecordingSink::default();
        self.log.mounted = false;
        self.link.opened_at = None;
    }

    pub fn events(&self) -> &[AppEvent] {
        &self.sink.events
    }
}
