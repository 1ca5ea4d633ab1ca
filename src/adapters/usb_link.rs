//! Host link over the USB Serial/JTAG peripheral.
//!
//! - **`target_os = "espidf"`**: VBUS sense on [`VBUS_SENSE_GPIO`] gives
//!   presence; the Serial/JTAG driver is installed on `open` and removed
//!   on `close`.  Writes never block: a packet the TX ring buffer cannot
//!   take whole is held and pushed out by `packet_done`, which reports
//!   true once the ring buffer holds every byte.  The driver exposes no
//!   per-packet TX-done event, so "done" means queued, not on the wire.
//! - **`not(target_os = "espidf")`**: an in-memory link whose presence,
//!   enumeration state and RX bytes are injected by the caller.
//!
//! [`VBUS_SENSE_GPIO`]: crate::pins::VBUS_SENSE_GPIO

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{HostLink, LinkError};
use crate::config::MAX_PACKET_SIZE;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const DRIVER_BUFFER_SIZE: u32 = 1024;

pub struct UsbSerialLink {
    open: bool,
    /// Tail of an accepted packet not yet taken by the driver.
    pending: heapless::Vec<u8, MAX_PACKET_SIZE>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimHost,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
struct SimHost {
    present: bool,
    configured: bool,
    rx: std::collections::VecDeque<u8>,
    tx: Vec<Vec<u8>>,
}

impl UsbSerialLink {
    /// Configure the VBUS-sense pin as a plain input.  After an ext0 wake the
    /// pin still belongs to the RTC domain and must be handed back first.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, LinkError> {
        use crate::pins::VBUS_SENSE_GPIO;

        // SAFETY: single-threaded init; the pin is reserved for VBUS sense.
        unsafe {
            rtc_gpio_deinit(VBUS_SENSE_GPIO);
        }
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << VBUS_SENSE_GPIO,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: cfg is valid for the duration of the call.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            warn!("UsbSerialLink: VBUS pin config failed ({})", ret);
            return Err(LinkError::Io);
        }
        info!("UsbSerialLink: VBUS sense on GPIO{}", VBUS_SENSE_GPIO);
        Ok(Self {
            open: false,
            pending: heapless::Vec::new(),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, LinkError> {
        info!("UsbSerialLink: simulation backend");
        Ok(Self {
            open: false,
            pending: heapless::Vec::new(),
            sim: SimHost::default(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    #[cfg(target_os = "espidf")]
    fn write_now(&mut self, bytes: &[u8]) -> usize {
        // SAFETY: bytes is valid for reads of its length; zero ticks never blocks.
        let n = unsafe { usb_serial_jtag_write_bytes(bytes.as_ptr().cast(), bytes.len(), 0) };
        n.max(0) as usize
    }

    /// Simulated driver that always takes the whole packet.
    #[cfg(not(target_os = "espidf"))]
    fn write_now(&mut self, bytes: &[u8]) -> usize {
        self.sim.tx.push(bytes.to_vec());
        bytes.len()
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = self.pending.clone();
        let n = self.write_now(&pending);
        self.pending.clear();
        // Always fits: the remainder only shrinks.
        let _ = self.pending.extend_from_slice(&pending[n..]);
    }
}

#[cfg(not(target_os = "espidf"))]
impl UsbSerialLink {
    pub fn set_present(&mut self, present: bool) {
        self.sim.present = present;
        if !present {
            self.sim.configured = false;
        }
    }

    pub fn set_configured(&mut self, configured: bool) {
        self.sim.configured = configured;
    }

    pub fn inject_rx(&mut self, bytes: &[u8]) {
        self.sim.rx.extend(bytes.iter().copied());
    }

    /// Drain everything transmitted so far, one entry per packet.
    pub fn take_tx(&mut self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.sim.tx)
    }
}

#[cfg(target_os = "espidf")]
impl HostLink for UsbSerialLink {
    fn host_present(&self) -> bool {
        // SAFETY: read-only access to a configured input pin.
        (unsafe { gpio_get_level(crate::pins::VBUS_SENSE_GPIO) }) != 0
    }

    fn open(&mut self) -> Result<(), LinkError> {
        if self.open {
            return Ok(());
        }
        let mut cfg = usb_serial_jtag_driver_config_t {
            tx_buffer_size: DRIVER_BUFFER_SIZE,
            rx_buffer_size: DRIVER_BUFFER_SIZE,
        };
        // SAFETY: cfg is valid for the call; the driver copies it.
        let ret = unsafe { usb_serial_jtag_driver_install(&mut cfg) };
        if ret != ESP_OK as i32 {
            warn!("UsbSerialLink: driver install failed ({})", ret);
            return Err(LinkError::Io);
        }
        self.open = true;
        self.pending.clear();
        info!("UsbSerialLink: driver installed");
        Ok(())
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        // SAFETY: the driver was installed by `open`.
        unsafe {
            usb_serial_jtag_driver_uninstall();
        }
        self.open = false;
        self.pending.clear();
        info!("UsbSerialLink: driver removed");
    }

    fn is_configured(&self) -> bool {
        // SAFETY: read-only status query.
        self.open && unsafe { usb_serial_jtag_is_connected() }
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        if !self.open || buf.is_empty() {
            return 0;
        }
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        // SAFETY: buf is valid for writes of `len` bytes; zero ticks never blocks.
        let n = unsafe { usb_serial_jtag_read_bytes(buf.as_mut_ptr().cast(), len, 0) };
        n.max(0) as usize
    }

    fn begin_packet(&mut self, packet: &[u8]) -> Result<(), LinkError> {
        begin_packet(self, packet)
    }

    fn packet_done(&mut self) -> bool {
        self.flush_pending();
        self.pending.is_empty()
    }
}

#[cfg(not(target_os = "espidf"))]
impl HostLink for UsbSerialLink {
    fn host_present(&self) -> bool {
        self.sim.present
    }

    fn open(&mut self) -> Result<(), LinkError> {
        self.open = true;
        self.pending.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.pending.clear();
    }

    fn is_configured(&self) -> bool {
        self.open && self.sim.configured
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        if !self.open {
            return 0;
        }
        let mut n = 0;
        while n < buf.len() {
            match self.sim.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    fn begin_packet(&mut self, packet: &[u8]) -> Result<(), LinkError> {
        begin_packet(self, packet)
    }

    fn packet_done(&mut self) -> bool {
        self.flush_pending();
        self.pending.is_empty()
    }
}

/// Shared acceptance rule.  The Serial/JTAG endpoint has no notion of a
/// zero-length packet, so an empty packet is accepted and sends nothing.
fn begin_packet(link: &mut UsbSerialLink, packet: &[u8]) -> Result<(), LinkError> {
    if !link.is_configured() {
        return Err(LinkError::NotConfigured);
    }
    if packet.len() > MAX_PACKET_SIZE {
        return Err(LinkError::Io);
    }
    if !link.pending.is_empty() {
        link.flush_pending();
        if !link.pending.is_empty() {
            return Err(LinkError::Busy);
        }
    }
    if packet.is_empty() {
        return Ok(());
    }
    let n = link.write_now(packet);
    if n == 0 {
        return Err(LinkError::Busy);
    }
    let _ = link.pending.extend_from_slice(&packet[n..]);
    Ok(())
}
