//! Half-duplex RTU transport.
//!
//! Turns raw UART bytes into discrete frames and back. Frame boundaries
//! are detected by bus silence: reception accumulates bytes until the gap
//! since the last byte exceeds the inter-frame delay. Transmission
//! brackets the write with the driver-enable line and holds it for one
//! character time after the flush so the final byte physically leaves the
//! wire before the transceiver flips back to receive.

use bytes::BytesMut;
use log::{debug, error, info};
use serialport::SerialPort;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::settings::ParityConfig;
use crate::hal::gpio::DigitalOutput;
use crate::modbus::crc;
use crate::utils::error::NodeError;

/// Granularity of the idle poll while waiting for a first byte.
const RX_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Transceiver settle time after asserting driver-enable.
const DRIVER_ENABLE_SETTLE: Duration = Duration::from_micros(200);

/// UART access as the transport needs it. `read_available` returns bytes
/// already received, zero when the line is idle; it must not wait for a
/// full buffer.
pub trait UartLink: Send {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Line timing constants, derived once from the serial parameters.
#[derive(Debug, Clone, Copy)]
pub struct RtuTimings {
    pub char_time: Duration,
    pub inter_frame_delay: Duration,
}

impl RtuTimings {
    /// One character = start bit + data bits + parity/framing + stop bits,
    /// approximated as `data_bits + stop_bits + 2` bit times. The
    /// inter-frame delay is 3.5 character times up to 19200 baud; above
    /// that the formula underestimates and the Modbus spec fixes 1750 us.
    pub fn from_line(baud_rate: u32, data_bits: u8, stop_bits: u8) -> Self {
        let char_time_us =
            1_000_000u64 * (data_bits as u64 + stop_bits as u64 + 2) / baud_rate as u64;
        let inter_frame_us = if baud_rate <= 19200 {
            char_time_us * 3500 / 1000
        } else {
            1750
        };
        Self {
            char_time: Duration::from_micros(char_time_us),
            inter_frame_delay: Duration::from_micros(inter_frame_us),
        }
    }
}

/// [`UartLink`] over a real serial port.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        data_bits: u8,
        stop_bits: u8,
        parity: &ParityConfig,
    ) -> Result<Self, NodeError> {
        info!("🔌 Opening RTU slave port: {}", port_name);
        info!(
            "⚙️  Configuration: {} baud, {} data bits, {} stop bit(s)",
            baud_rate, data_bits, stop_bits
        );

        let serial_parity = match parity {
            ParityConfig::None => serialport::Parity::None,
            ParityConfig::Even => serialport::Parity::Even,
            ParityConfig::Odd => serialport::Parity::Odd,
        };
        let serial_data_bits = match data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            _ => serialport::DataBits::Eight,
        };
        let serial_stop_bits = match stop_bits {
            2 => serialport::StopBits::Two,
            _ => serialport::StopBits::One,
        };

        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(50))
            .data_bits(serial_data_bits)
            .stop_bits(serial_stop_bits)
            .parity(serial_parity)
            .open()
            .map_err(|e| {
                error!("❌ Failed to open serial port {}: {}", port_name, e);
                NodeError::ConnectionError(format!("Failed to open port: {}", e))
            })?;

        info!("✅ Serial line ready");
        Ok(Self { port })
    }
}

impl UartLink for SerialLink {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pending = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
        if pending == 0 {
            return Ok(0);
        }
        let take = pending.min(buf.len());
        io::Read::read(&mut self.port, &mut buf[..take])
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(&mut self.port, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut self.port)
    }
}

pub struct RtuTransport<L: UartLink> {
    link: L,
    timings: RtuTimings,
    driver_enable: Option<Box<dyn DigitalOutput>>,
    rx_led: Option<Box<dyn DigitalOutput>>,
    tx_led: Option<Box<dyn DigitalOutput>>,
}

impl<L: UartLink> RtuTransport<L> {
    pub fn new(link: L, timings: RtuTimings) -> Self {
        Self {
            link,
            timings,
            driver_enable: None,
            rx_led: None,
            tx_led: None,
        }
    }

    /// Direction-control line of the RS-485 transceiver, asserted for the
    /// duration of a transmission.
    pub fn with_driver_enable(mut self, pin: Box<dyn DigitalOutput>) -> Self {
        self.driver_enable = Some(pin);
        self
    }

    pub fn with_rx_indicator(mut self, pin: Box<dyn DigitalOutput>) -> Self {
        self.rx_led = Some(pin);
        self
    }

    pub fn with_tx_indicator(mut self, pin: Box<dyn DigitalOutput>) -> Self {
        self.tx_led = Some(pin);
        self
    }

    pub fn timings(&self) -> RtuTimings {
        self.timings
    }

    /// Waits up to `timeout` (default: twice the inter-frame delay) for a
    /// first byte, then accumulates until the bus stays silent for one
    /// inter-frame delay. Returns the collected frame, empty on timeout.
    pub fn receive_frame(&mut self, timeout: Option<Duration>) -> Result<Vec<u8>, NodeError> {
        let timeout = timeout.unwrap_or(self.timings.inter_frame_delay * 2);
        let mut received = BytesMut::new();
        let mut scratch = [0u8; 256];

        let start = Instant::now();
        while start.elapsed() <= timeout {
            let count = self.link.read_available(&mut scratch)?;
            if count > 0 {
                if let Some(led) = &mut self.rx_led {
                    led.set_high();
                }
                received.extend_from_slice(&scratch[..count]);

                // keep collecting until one inter-frame delay of silence
                let mut last_byte = Instant::now();
                while last_byte.elapsed() <= self.timings.inter_frame_delay {
                    let count = self.link.read_available(&mut scratch)?;
                    if count > 0 {
                        received.extend_from_slice(&scratch[..count]);
                        last_byte = Instant::now();
                    }
                }
            }

            if !received.is_empty() {
                if let Some(led) = &mut self.rx_led {
                    led.set_low();
                }
                debug!("📥 Frame received: {}", hex::encode(&received));
                return Ok(received.to_vec());
            }

            thread::sleep(RX_POLL_INTERVAL);
        }

        if let Some(led) = &mut self.rx_led {
            led.set_low();
        }
        Ok(Vec::new())
    }

    /// Assembles `[unit_addr][pdu][crc]` and transmits it. Driver-enable
    /// stays asserted until one character time after the flush; releasing
    /// it earlier would clip the final byte on the bus.
    pub fn send_frame(&mut self, unit_addr: u8, pdu: &[u8]) -> Result<(), NodeError> {
        let mut adu = Vec::with_capacity(pdu.len() + 3);
        adu.push(unit_addr);
        adu.extend_from_slice(pdu);
        crc::append_crc(&mut adu);

        debug!("📤 Transmitting frame: {}", hex::encode(&adu));

        if let Some(led) = &mut self.tx_led {
            led.set_high();
        }
        if let Some(de) = &mut self.driver_enable {
            de.set_high();
            thread::sleep(DRIVER_ENABLE_SETTLE);
        }

        self.link.write_all(&adu)?;
        self.link.flush()?;
        thread::sleep(self.timings.char_time);

        if let Some(de) = &mut self.driver_enable {
            de.set_low();
        }
        if let Some(led) = &mut self.tx_led {
            led.set_low();
        }
        Ok(())
    }

    /// Discards bytes that arrived while the node was busy (e.g. during a
    /// blocking actuator pulse).
    pub fn drain(&mut self) -> Result<usize, NodeError> {
        let mut scratch = [0u8; 256];
        let mut total = 0;
        loop {
            let count = self.link.read_available(&mut scratch)?;
            if count == 0 {
                break;
            }
            total += count;
        }
        if total > 0 {
            debug!("🗑️  Drained {} stale byte(s) from the receive buffer", total);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Link whose pending bytes become visible in timed batches.
    struct ScriptedLink {
        batches: VecDeque<(Duration, Vec<u8>)>,
        started: Instant,
        events: Arc<Mutex<Vec<String>>>,
        tx: Vec<u8>,
    }

    impl ScriptedLink {
        fn new(batches: Vec<(Duration, Vec<u8>)>) -> Self {
            Self {
                batches: batches.into(),
                started: Instant::now(),
                events: Arc::new(Mutex::new(Vec::new())),
                tx: Vec::new(),
            }
        }
    }

    impl UartLink for ScriptedLink {
        fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if let Some((delay, _)) = self.batches.front() {
                if self.started.elapsed() >= *delay {
                    let (_, bytes) = self.batches.pop_front().unwrap();
                    let count = bytes.len().min(buf.len());
                    buf[..count].copy_from_slice(&bytes[..count]);
                    return Ok(count);
                }
            }
            Ok(0)
        }

        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            self.events.lock().unwrap().push("write".to_string());
            self.tx.extend_from_slice(buf);
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct EventPin {
        label: &'static str,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl DigitalOutput for EventPin {
        fn set_high(&mut self) {
            self.events.lock().unwrap().push(format!("{}+", self.label));
        }

        fn set_low(&mut self) {
            self.events.lock().unwrap().push(format!("{}-", self.label));
        }
    }

    fn fast_timings() -> RtuTimings {
        // 115200 baud keeps the inter-frame delay at the 1750 us floor
        RtuTimings::from_line(115_200, 8, 1)
    }

    #[test]
    fn test_timing_constants() {
        let timings = RtuTimings::from_line(9600, 8, 1);
        // (8 + 1 + 2) bits at 9600 baud = 1145 us per character
        assert_eq!(timings.char_time, Duration::from_micros(1145));
        assert_eq!(timings.inter_frame_delay, Duration::from_micros(4007));

        let fast = RtuTimings::from_line(115_200, 8, 1);
        assert_eq!(fast.inter_frame_delay, Duration::from_micros(1750));
    }

    #[test]
    fn test_receive_returns_pending_frame() {
        let link = ScriptedLink::new(vec![(Duration::ZERO, vec![0x06, 0x03, 0x00, 0x64])]);
        let mut transport = RtuTransport::new(link, fast_timings());
        let frame = transport.receive_frame(None).unwrap();
        assert_eq!(frame, vec![0x06, 0x03, 0x00, 0x64]);
    }

    #[test]
    fn test_receive_times_out_empty() {
        let link = ScriptedLink::new(vec![]);
        let mut transport = RtuTransport::new(link, fast_timings());
        let frame = transport
            .receive_frame(Some(Duration::from_millis(5)))
            .unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_receive_stops_at_inter_frame_gap() {
        // second batch arrives well past the 1750 us gap: a separate frame
        let link = ScriptedLink::new(vec![
            (Duration::ZERO, vec![0x01, 0x02, 0x03]),
            (Duration::from_millis(50), vec![0xAA, 0xBB]),
        ]);
        let mut transport = RtuTransport::new(link, fast_timings());
        let frame = transport.receive_frame(None).unwrap();
        assert_eq!(frame, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_receive_joins_bytes_within_gap() {
        let link = ScriptedLink::new(vec![
            (Duration::ZERO, vec![0x01, 0x02]),
            (Duration::from_micros(500), vec![0x03, 0x04]),
        ]);
        let mut transport = RtuTransport::new(link, fast_timings());
        let frame = transport.receive_frame(None).unwrap();
        assert_eq!(frame, vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_send_appends_address_and_crc() {
        let link = ScriptedLink::new(vec![]);
        let mut transport = RtuTransport::new(link, fast_timings());
        transport
            .send_frame(0x06, &[0x06, 0x00, 0x64, 0x00, 0x01])
            .unwrap();

        let sent = &transport.link.tx;
        assert_eq!(sent.len(), 8);
        assert_eq!(sent[0], 0x06);
        assert!(crc::verify_crc(sent));
    }

    #[test]
    fn test_send_driver_enable_brackets_write() {
        let link = ScriptedLink::new(vec![]);
        let events = Arc::clone(&link.events);
        let mut transport = RtuTransport::new(link, fast_timings())
            .with_driver_enable(Box::new(EventPin {
                label: "de",
                events: Arc::clone(&events),
            }))
            .with_tx_indicator(Box::new(EventPin {
                label: "tx_led",
                events: Arc::clone(&events),
            }));

        transport.send_frame(0x06, &[0x03, 0x02, 0x00, 0x01]).unwrap();

        let recorded = events.lock().unwrap().clone();
        assert_eq!(
            recorded,
            vec!["tx_led+", "de+", "write", "de-", "tx_led-"]
        );
    }

    #[test]
    fn test_rx_indicator_active_during_reception() {
        let link = ScriptedLink::new(vec![(Duration::ZERO, vec![0x01, 0x02])]);
        let events = Arc::clone(&link.events);
        let mut transport = RtuTransport::new(link, fast_timings()).with_rx_indicator(Box::new(
            EventPin {
                label: "rx_led",
                events: Arc::clone(&events),
            },
        ));

        transport.receive_frame(None).unwrap();
        let recorded = events.lock().unwrap().clone();
        assert_eq!(recorded, vec!["rx_led+", "rx_led-"]);
    }

    #[test]
    fn test_drain_discards_pending_bytes() {
        let link = ScriptedLink::new(vec![
            (Duration::ZERO, vec![0x01, 0x02]),
            (Duration::ZERO, vec![0x03]),
        ]);
        let mut transport = RtuTransport::new(link, fast_timings());
        assert_eq!(transport.drain().unwrap(), 3);
        assert_eq!(transport.drain().unwrap(), 0);
    }
}
