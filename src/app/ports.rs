//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ WakeCycle / ServiceWindow / dispatcher (domain)
//! ```
//!
//! Driven adapters (retained registers, clocks, log volume, sensor, host
//! link, wake sources, indicator) implement these traits.  The domain core
//! consumes them through generics or `&mut dyn` handles bundled in
//! [`Board`], so it never touches hardware directly.
//!
//! Every trait here is object safe.

use log::warn;

use crate::app::events::AppEvent;
use crate::config::LoggerConfig;
use crate::schedule::Register;

// ───────────────────────────────────────────────────────────────
// Retained registers (driven adapter: domain ↔ power-retained memory)
// ───────────────────────────────────────────────────────────────

/// A small bank of word registers that survives the deepest sleep mode and
/// warm resets, but not full power removal.
///
/// Contents after power-up are unspecified; callers validate with magic
/// values.
pub trait RetainedRegisters {
    fn read(&self, reg: Register) -> u32;
    fn write(&mut self, reg: Register, value: u32);
}

// ───────────────────────────────────────────────────────────────
// Clocks
// ───────────────────────────────────────────────────────────────

/// Wall clock in epoch seconds (see [`crate::calendar`]).  Keeps running
/// while the CPU sleeps.
pub trait WallClock {
    fn now(&self) -> u32;
    fn set(&mut self, epoch: u32);
}

/// Monotonic millisecond time plus a blocking delay.  The only form of
/// suspension the firmware uses.
pub trait Timebase {
    fn now_ms(&self) -> u64;
    fn delay_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Log store (driven adapter: domain ↔ append-only file system)
// ───────────────────────────────────────────────────────────────

/// Block accounting of the log volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageUsage {
    pub used_blocks: u32,
    pub total_blocks: u32,
}

impl StorageUsage {
    /// `used >= total - reserve`, with an empty volume never counting as full.
    pub fn is_near_full(&self, reserve_blocks: u32) -> bool {
        self.total_blocks > 0
            && self.used_blocks >= self.total_blocks.saturating_sub(reserve_blocks)
    }
}

/// The single append-only log file on a mountable volume.
///
/// The file is only reachable while mounted; every wake cycle mounts,
/// works, and unmounts, so nothing is held open across sleep.
pub trait LogStore {
    fn mount(&mut self) -> Result<(), StorageError>;

    /// Erase and re-create the volume.  Leaves it unmounted.
    fn format(&mut self) -> Result<(), StorageError>;

    fn unmount(&mut self);

    /// Append `data` to the log, creating the file if needed.
    fn append(&mut self, data: &[u8]) -> Result<(), StorageError>;

    /// Current log length in bytes.  [`StorageError::NotFound`] if the
    /// file does not exist.
    fn log_size(&mut self) -> Result<u64, StorageError>;

    /// Read from `offset`.  Returns the byte count, 0 at end of file.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Delete the log file.
    fn remove(&mut self) -> Result<(), StorageError>;

    fn usage(&mut self) -> Result<StorageUsage, StorageError>;

    /// Mount, formatting the volume first if the plain mount fails.
    fn mount_or_format(&mut self) -> Result<(), StorageError> {
        if self.mount().is_ok() {
            return Ok(());
        }
        warn!("Log volume: mount failed, formatting");
        self.format()?;
        self.mount()
    }
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One temperature / relative-humidity sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

pub trait HumiditySensor {
    /// Take one single-shot measurement.
    fn read(&mut self) -> Result<Reading, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Host link (driven adapter: domain ↔ USB serial)
// ───────────────────────────────────────────────────────────────

/// Packet-oriented serial link to a service host.
///
/// All methods are non-blocking; bounded waits are built on top with
/// [`crate::poll`].
pub trait HostLink {
    /// Debounce-free level of the physical host-presence signal.
    fn host_present(&self) -> bool;

    /// Bring the link up, including any clock recovery it needs.
    fn open(&mut self) -> Result<(), LinkError>;

    /// Tear the link down.  Safe to call when already closed.
    fn close(&mut self);

    /// The host has enumerated the device and the data path is usable.
    fn is_configured(&self) -> bool;

    /// Copy received bytes into `buf`.  Returns 0 when nothing is pending.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Start transmitting one packet of at most
    /// [`MAX_PACKET_SIZE`](crate::config::MAX_PACKET_SIZE) bytes.  An empty
    /// packet is a zero-length terminator.  All-or-nothing: on
    /// [`LinkError::Busy`] nothing was queued.
    fn begin_packet(&mut self, packet: &[u8]) -> Result<(), LinkError>;

    /// The last accepted packet has been handed whole to the transport
    /// driver.  This is a local hand-off, not delivery: bytes may still sit
    /// in the driver's TX buffer and are lost if the host detaches first.
    /// A stream is known complete only when the host has read it.
    fn packet_done(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Wake sources
// ───────────────────────────────────────────────────────────────

/// What ended the previous sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    /// Cold boot or reset; no sleep preceded this run.
    PowerOn,
    /// The one-shot alarm fired.
    Timer,
    /// The host-presence line was asserted.
    HostPresence,
    Other,
}

/// Arms wake sources before the lowest-power mode.  Entering that mode is
/// left to the adapter because it does not return on hardware.
pub trait WakeControl {
    fn wake_cause(&self) -> WakeCause;

    /// Disable every wake source, including ones armed by earlier cycles.
    fn disarm_all(&mut self);

    /// One-shot alarm `seconds` from now.
    fn arm_timer(&mut self, seconds: u32);

    /// Wake when the host-presence signal asserts.  The source is
    /// level-triggered, so it must only be armed while the signal is low.
    fn arm_host_presence(&mut self);

    /// Wake when the host-presence signal drops.  Armed instead of
    /// [`arm_host_presence`](Self::arm_host_presence) when the signal is
    /// still high at sleep entry; the next cycle then arms for insertion.
    fn arm_host_release(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Indicator
// ───────────────────────────────────────────────────────────────

/// Single visible status LED.
pub trait Indicator {
    fn set(&mut self, on: bool);
    fn is_on(&self) -> bool;

    /// Invert the indicator for `ms`, then restore it.
    fn pulse(&mut self, timebase: &mut dyn Timebase, ms: u32) {
        let was = self.is_on();
        self.set(!was);
        timebase.delay_ms(ms);
        self.set(was);
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`LoggerConfig`].
///
/// Implementations validate before persisting; out-of-range values are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Returns [`LoggerConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<LoggerConfig, ConfigError>;

    fn save(&self, config: &LoggerConfig) -> Result<(), ConfigError>;

    /// Load, falling back to defaults.  A stored blob that is corrupt or
    /// out of range is overwritten with the defaults so the next boot
    /// reads cleanly; an I/O failure leaves storage untouched.
    fn load_or_repair(&self) -> LoggerConfig {
        match self.load() {
            Ok(cfg) => cfg,
            Err(e @ (ConfigError::Corrupted | ConfigError::ValidationFailed(_))) => {
                warn!("Stored config rejected ({}), restoring defaults", e);
                let defaults = LoggerConfig::default();
                if let Err(e) = self.save(&defaults) {
                    warn!("Config repair failed ({})", e);
                }
                defaults
            }
            Err(e) => {
                warn!("Config unavailable ({}), using defaults", e);
                LoggerConfig::default()
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Board: per-cycle device handles
// ───────────────────────────────────────────────────────────────

/// Mutable handles to every driven adapter a wake cycle touches besides the
/// schedule store.  Built once in `main` and lent to the orchestrator,
/// which lends it on to the service window and the command dispatcher.
pub struct Board<'a> {
    pub log: &'a mut dyn LogStore,
    pub sensor: &'a mut dyn HumiditySensor,
    pub link: &'a mut dyn HostLink,
    pub timebase: &'a mut dyn Timebase,
    pub wake: &'a mut dyn WakeControl,
    pub indicator: &'a mut dyn Indicator,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`LogStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Volume could not be mounted or is not mounted.
    Mount,
    /// The log file does not exist.
    NotFound,
    /// No space left for the write.
    Full,
    /// Generic I/O error.
    Io,
}

/// Errors from [`HostLink`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Transmitter is still occupied; retry later.
    Busy,
    /// Host detached or never enumerated.
    NotConfigured,
    /// Driver install or bus failure.
    Io,
}

/// Errors from [`HumiditySensor`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// I²C transaction failed (NACK, arbitration, timeout).
    Bus,
    /// Response word failed its CRC check.
    Crc,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Mount => write!(f, "volume not mounted"),
            Self::NotFound => write!(f, "log file not found"),
            Self::Full => write!(f, "storage full"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Busy => write!(f, "link busy"),
            Self::NotConfigured => write!(f, "link not configured"),
            Self::Io => write!(f, "link I/O error"),
        }
    }
}

impl core::fmt::Display for SensorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus => write!(f, "I2C bus error"),
            Self::Crc => write!(f, "CRC mismatch"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
