//! Logger configuration parameters
//!
//! Protocol and layout constants are fixed at compile time.  Timing and
//! threshold values live in [`LoggerConfig`], which can be overridden from
//! NVS (see [`crate::adapters::nvs`]).

use serde::{Deserialize, Serialize};

// --- Logging interval ---
/// Shortest accepted logging interval (seconds).
pub const MIN_INTERVAL_SECS: u32 = 5;
/// Longest accepted logging interval (seconds, 24 h).
pub const MAX_INTERVAL_SECS: u32 = 86_400;
/// Interval used when the stored value reads as zero.
pub const DEFAULT_INTERVAL_SECS: u32 = 30;

// --- Host link ---
/// Largest single transport packet (full-speed bulk endpoint size).
pub const MAX_PACKET_SIZE: usize = 64;
/// Bytes read from the log per storage access while streaming.
pub const STREAM_CHUNK_SIZE: usize = 512;
/// Receive line buffer, including room for one terminator byte.
pub const LINE_CAPACITY: usize = 256;
/// Name of the append-only log file.
pub const LOG_FILE_NAME: &str = "wake.bin";

/// Runtime-tunable timings and thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    // --- Replies ---
    /// Budget for one best-effort text reply (milliseconds)
    pub reply_timeout_ms: u32,
    /// Indicator pulse on each accepted command (milliseconds)
    pub accept_pulse_ms: u32,

    // --- Service window ---
    /// Time allowed for the link to reach the configured state (milliseconds)
    pub enumeration_timeout_ms: u32,
    /// Host presence must stay high this long before a window opens
    pub presence_stable_ms: u32,
    /// Overall wait for a stable presence signal
    pub presence_timeout_ms: u32,
    /// Host presence must stay low this long after a window
    pub release_stable_ms: u32,
    /// Overall wait for the host to detach after a window
    pub release_timeout_ms: u32,

    // --- Streaming ---
    /// Wait for the link to accept a packet
    pub packet_start_timeout_ms: u32,
    /// Wait for an accepted packet to leave the device
    pub packet_complete_timeout_ms: u32,
    /// Pause before retrying a packet that was not accepted
    pub packet_retry_backoff_ms: u32,

    // --- Storage ---
    /// Blocks kept free for metadata and erase headroom
    pub reserve_blocks: u32,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            // Replies
            reply_timeout_ms: 250,
            accept_pulse_ms: 60,

            // Service window
            enumeration_timeout_ms: 60_000,
            presence_stable_ms: 20,
            presence_timeout_ms: 1_000,
            release_stable_ms: 300,
            release_timeout_ms: 5_000,

            // Streaming
            packet_start_timeout_ms: 5_000,
            packet_complete_timeout_ms: 2_000,
            packet_retry_backoff_ms: 5,

            // Storage
            reserve_blocks: 2,
        }
    }
}
