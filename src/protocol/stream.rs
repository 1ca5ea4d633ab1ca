//! Packet transmitter for replies and log retrieval.
//!
//! ```text
//!  wake.bin ──read 512──▶ chunk ──split 64──▶ packet ──begin/done──▶ host
//!                                                 │
//!                               total % 64 == 0 ──┴──▶ zero-length packet
//! ```
//!
//! Replies are best effort: one overall deadline, dropped when it expires.
//! Log packets are never dropped; a packet that was not accepted in time is
//! offered again until the host goes away.
//!
//! A `SINCE=`/`BETWEEN=` filter selects whole records by their epoch field.
//! Selected records are packed back to back, so packets stay full and the
//! terminator rule applies to the filtered byte count.

use log::{debug, warn};

use crate::app::ports::{HostLink, LinkError, LogStore, Timebase};
use crate::config::{LoggerConfig, MAX_PACKET_SIZE, STREAM_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::poll::poll_until;
use crate::protocol::args::LogFilter;
use crate::record::LogRecord;

// Chunk reads must never split a record.
const _: () = assert!(STREAM_CHUNK_SIZE % LogRecord::SIZE == 0);

/// What one GETLOG transfer put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStats {
    pub bytes: u64,
    /// Data packets, not counting the terminator.
    pub packets: u32,
    pub terminator: bool,
}

/// Send `text` within `budget_ms`.  Returns `false` if the text (or part
/// of it) was dropped.
pub fn send_reply(
    link: &mut dyn HostLink,
    tb: &mut dyn Timebase,
    text: &[u8],
    budget_ms: u32,
) -> bool {
    let start = tb.now_ms();
    for packet in text.chunks(MAX_PACKET_SIZE) {
        let spent = tb.now_ms().saturating_sub(start);
        let left = u64::from(budget_ms).saturating_sub(spent) as u32;
        if left == 0 {
            debug!("Reply dropped: budget spent");
            return false;
        }

        let mut failed = false;
        let accepted = poll_until(tb, left, 1, |_| match link.begin_packet(packet) {
            Ok(()) => true,
            Err(LinkError::Busy) => false,
            Err(_) => {
                failed = true;
                true
            }
        });
        if failed || !accepted {
            debug!("Reply dropped: link not accepting");
            return false;
        }

        let spent = tb.now_ms().saturating_sub(start);
        let left = u64::from(budget_ms).saturating_sub(spent) as u32;
        if !poll_until(tb, left, 1, |_| link.packet_done()) {
            debug!("Reply dropped: packet not drained");
            return false;
        }
    }
    true
}

/// Stream the whole log file to the host.
///
/// The volume must already be mounted.  Ends with a zero-length packet
/// when the byte count is a multiple of [`MAX_PACKET_SIZE`], including an
/// empty log.
pub fn stream_log(
    log: &mut dyn LogStore,
    link: &mut dyn HostLink,
    tb: &mut dyn Timebase,
    cfg: &LoggerConfig,
) -> Result<StreamStats> {
    stream_log_filtered(log, link, tb, cfg, LogFilter::All)
}

/// Stream the records selected by `filter`.
///
/// [`LogFilter::All`] sends the file byte for byte.  Any other filter reads
/// whole records and stops at a torn tail.
pub fn stream_log_filtered(
    log: &mut dyn LogStore,
    link: &mut dyn HostLink,
    tb: &mut dyn Timebase,
    cfg: &LoggerConfig,
    filter: LogFilter,
) -> Result<StreamStats> {
    let mut chunk = [0u8; STREAM_CHUNK_SIZE];
    let mut out = Packetizer::default();
    let mut offset = 0u64;

    loop {
        let n = log.read_at(offset, &mut chunk)?;
        if n == 0 {
            break;
        }

        if filter == LogFilter::All {
            offset += n as u64;
            out.push(link, tb, cfg, &chunk[..n])?;
            continue;
        }

        let whole = n - n % LogRecord::SIZE;
        if whole == 0 {
            warn!("Log stream: {} trailing bytes skipped, not a whole record", n);
            break;
        }
        offset += whole as u64;

        for raw in chunk[..whole].chunks_exact(LogRecord::SIZE) {
            let Ok(bytes) = <&[u8; LogRecord::SIZE]>::try_from(raw) else {
                continue;
            };
            if filter.matches(LogRecord::from_bytes(bytes).epoch) {
                out.push(link, tb, cfg, raw)?;
            }
        }
    }

    let stats = out.finish(link, tb, cfg)?;
    debug!(
        "Log stream: {} bytes in {} packets, terminator={}",
        stats.bytes, stats.packets, stats.terminator
    );
    Ok(stats)
}

/// Packs outgoing bytes into full-size packets.
struct Packetizer {
    buf: [u8; MAX_PACKET_SIZE],
    len: usize,
    stats: StreamStats,
}

impl Default for Packetizer {
    fn default() -> Self {
        Self {
            buf: [0; MAX_PACKET_SIZE],
            len: 0,
            stats: StreamStats::default(),
        }
    }
}

impl Packetizer {
    fn push(
        &mut self,
        link: &mut dyn HostLink,
        tb: &mut dyn Timebase,
        cfg: &LoggerConfig,
        mut data: &[u8],
    ) -> Result<()> {
        while !data.is_empty() {
            let take = (MAX_PACKET_SIZE - self.len).min(data.len());
            self.buf[self.len..self.len + take].copy_from_slice(&data[..take]);
            self.len += take;
            data = &data[take..];
            if self.len == MAX_PACKET_SIZE {
                self.flush(link, tb, cfg)?;
            }
        }
        Ok(())
    }

    fn flush(
        &mut self,
        link: &mut dyn HostLink,
        tb: &mut dyn Timebase,
        cfg: &LoggerConfig,
    ) -> Result<()> {
        if self.len == 0 {
            return Ok(());
        }
        send_packet(link, tb, &self.buf[..self.len], cfg)?;
        self.stats.packets += 1;
        self.stats.bytes += self.len as u64;
        self.len = 0;
        Ok(())
    }

    /// Send the partial packet, then the terminator if the total is a
    /// multiple of [`MAX_PACKET_SIZE`].
    fn finish(
        mut self,
        link: &mut dyn HostLink,
        tb: &mut dyn Timebase,
        cfg: &LoggerConfig,
    ) -> Result<StreamStats> {
        self.flush(link, tb, cfg)?;
        if self.stats.bytes % MAX_PACKET_SIZE as u64 == 0 {
            send_packet(link, tb, &[], cfg)?;
            self.stats.terminator = true;
        }
        Ok(self.stats)
    }
}

/// Deliver one packet, retrying acceptance until the link goes away.
fn send_packet(
    link: &mut dyn HostLink,
    tb: &mut dyn Timebase,
    packet: &[u8],
    cfg: &LoggerConfig,
) -> Result<()> {
    loop {
        ensure_link(link)?;

        let mut fault = None;
        let accepted = poll_until(
            tb,
            cfg.packet_start_timeout_ms,
            cfg.packet_retry_backoff_ms,
            |_| match link.begin_packet(packet) {
                Ok(()) => true,
                Err(LinkError::Busy) => false,
                Err(e) => {
                    fault = Some(e);
                    true
                }
            },
        );
        if let Some(e) = fault {
            warn!("Log stream: link error: {}", e);
            return Err(Error::Link(e));
        }
        if accepted {
            break;
        }
        warn!("Log stream: packet not accepted, retrying");
    }

    loop {
        if poll_until(tb, cfg.packet_complete_timeout_ms, 1, |_| link.packet_done()) {
            return Ok(());
        }
        ensure_link(link)?;
        warn!("Log stream: packet still in flight, waiting again");
    }
}

fn ensure_link(link: &dyn HostLink) -> Result<()> {
    if link.is_configured() && link.host_present() {
        Ok(())
    } else {
        warn!("Log stream: host gone, aborting");
        Err(Error::Link(LinkError::NotConfigured))
    }
}
