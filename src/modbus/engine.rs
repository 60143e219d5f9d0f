//! Slave poll cycle: receive → validate → dispatch → respond.
//!
//! Each `poll` is stateless with respect to the previous one. Frames that
//! fail the length, unit-address or CRC gates are discarded without any
//! response — a non-addressed RTU slave stays silent — and without touching
//! the register bank. Protocol-level rejections travel exactly one level:
//! back to the master as an exception response.

use log::debug;

use crate::modbus::crc;
use crate::modbus::registers::RegisterBank;
use crate::modbus::request::{
    ExceptionCode, ExceptionInfo, Request, READ_COILS, READ_DISCRETE_INPUTS,
    READ_HOLDING_REGISTERS, READ_INPUT_REGISTERS, WRITE_MULTIPLE_COILS, WRITE_MULTIPLE_REGISTERS,
    WRITE_SINGLE_COIL, WRITE_SINGLE_REGISTER,
};
use crate::modbus::response::{
    self, read_bits_response, read_registers_response, unpack_bits, write_multiple_response,
    write_single_response, Signedness,
};
use crate::modbus::transport::{RtuTransport, UartLink};
use crate::utils::error::NodeError;

/// Smallest complete request ADU on the wire.
const MIN_FRAME_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No frame arrived within the receive timeout.
    Idle,
    /// A frame arrived but failed a silent-discard gate.
    Discarded,
    /// A request was served with a normal response.
    Responded,
    /// A request was answered with an exception response.
    ExceptionSent,
}

pub struct SlaveEngine<L: UartLink> {
    transport: RtuTransport<L>,
    unit_addrs: Vec<u8>,
}

impl<L: UartLink> SlaveEngine<L> {
    pub fn new(transport: RtuTransport<L>, unit_addrs: Vec<u8>) -> Self {
        Self {
            transport,
            unit_addrs,
        }
    }

    /// One receive/respond cycle against `bank`.
    pub fn poll(&mut self, bank: &mut RegisterBank) -> Result<PollOutcome, NodeError> {
        let frame = self.transport.receive_frame(None)?;
        if frame.is_empty() {
            return Ok(PollOutcome::Idle);
        }

        if frame.len() < MIN_FRAME_LEN {
            debug!("Dropping truncated frame ({} bytes)", frame.len());
            return Ok(PollOutcome::Discarded);
        }

        let unit_addr = frame[0];
        if !self.unit_addrs.contains(&unit_addr) {
            debug!("Frame for unit {} ignored", unit_addr);
            return Ok(PollOutcome::Discarded);
        }

        if !crc::verify_crc(&frame) {
            debug!("CRC mismatch, frame dropped");
            return Ok(PollOutcome::Discarded);
        }

        let adu = &frame[..frame.len() - 2];
        match Request::parse(adu).and_then(|request| Self::dispatch(&request, bank)) {
            Ok(pdu) => {
                self.transport.send_frame(unit_addr, &pdu)?;
                Ok(PollOutcome::Responded)
            }
            Err(exception) => {
                self.transport
                    .send_frame(unit_addr, &response::exception_response(&exception))?;
                Ok(PollOutcome::ExceptionSent)
            }
        }
    }

    /// Discards any bytes that arrived while the application was busy.
    pub fn drain(&mut self) -> Result<usize, NodeError> {
        self.transport.drain()
    }

    fn dispatch(request: &Request, bank: &mut RegisterBank) -> Result<Vec<u8>, ExceptionInfo> {
        let bad_address = ExceptionInfo::new(request.function, ExceptionCode::IllegalDataAddress);
        let bad_value = ExceptionInfo::new(request.function, ExceptionCode::IllegalDataValue);
        let address = request.register_addr;

        match request.function {
            READ_COILS => {
                let quantity = request.quantity.ok_or(bad_value)?;
                let values = bank.get_coil_many(address, quantity).map_err(|_| bad_address)?;
                Ok(read_bits_response(request.function, &values))
            }
            READ_DISCRETE_INPUTS => {
                let quantity = request.quantity.ok_or(bad_value)?;
                let values = bank
                    .get_discrete_many(address, quantity)
                    .map_err(|_| bad_address)?;
                Ok(read_bits_response(request.function, &values))
            }
            READ_HOLDING_REGISTERS => {
                let quantity = request.quantity.ok_or(bad_value)?;
                let words = bank
                    .get_holding_many(address, quantity)
                    .map_err(|_| bad_address)?;
                let values: Vec<i32> = words.iter().map(|&word| word as i32).collect();
                read_registers_response(request.function, &values, &Signedness::Uniform(false))
                    .map_err(|_| bad_value)
            }
            READ_INPUT_REGISTERS => {
                let quantity = request.quantity.ok_or(bad_value)?;
                let words = bank
                    .get_input_many(address, quantity)
                    .map_err(|_| bad_address)?;
                let values: Vec<i32> = words.iter().map(|&word| word as i32).collect();
                read_registers_response(request.function, &values, &Signedness::Uniform(false))
                    .map_err(|_| bad_value)
            }
            WRITE_SINGLE_COIL => {
                // parser guarantees 0xFF00 or 0x0000
                let value = request.payload[0] == 0xFF;
                bank.set_coil(address, value).map_err(|_| bad_address)?;
                Ok(write_single_response(request.function, address, &request.payload))
            }
            WRITE_SINGLE_REGISTER => {
                let word = u16::from_be_bytes([request.payload[0], request.payload[1]]);
                bank.set_holding(address, word).map_err(|_| bad_address)?;
                Ok(write_single_response(request.function, address, &request.payload))
            }
            WRITE_MULTIPLE_COILS => {
                let quantity = request.quantity.ok_or(bad_value)?;
                let values = unpack_bits(&request.payload, quantity as usize);
                for (offset, &value) in values.iter().enumerate() {
                    let target = address.checked_add(offset as u16).ok_or(bad_address)?;
                    bank.set_coil(target, value).map_err(|_| bad_address)?;
                }
                Ok(write_multiple_response(request.function, address, quantity))
            }
            WRITE_MULTIPLE_REGISTERS => {
                let quantity = request.quantity.ok_or(bad_value)?;
                for (offset, chunk) in request.payload.chunks_exact(2).enumerate() {
                    let word = u16::from_be_bytes([chunk[0], chunk[1]]);
                    let target = address.checked_add(offset as u16).ok_or(bad_address)?;
                    bank.set_holding(target, word).map_err(|_| bad_address)?;
                }
                Ok(write_multiple_response(request.function, address, quantity))
            }
            _ => Err(ExceptionInfo::new(
                request.function,
                ExceptionCode::IllegalFunction,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::transport::RtuTimings;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    struct TestLink {
        rx: Arc<Mutex<VecDeque<Vec<u8>>>>,
        tx: Arc<Mutex<Vec<u8>>>,
    }

    impl UartLink for TestLink {
        fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.rx.lock().unwrap().pop_front() {
                Some(bytes) => {
                    let count = bytes.len().min(buf.len());
                    buf[..count].copy_from_slice(&bytes[..count]);
                    Ok(count)
                }
                None => Ok(0),
            }
        }

        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            self.tx.lock().unwrap().extend_from_slice(buf);
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Harness {
        engine: SlaveEngine<TestLink>,
        rx: Arc<Mutex<VecDeque<Vec<u8>>>>,
        tx: Arc<Mutex<Vec<u8>>>,
    }

    fn harness() -> Harness {
        let rx = Arc::new(Mutex::new(VecDeque::new()));
        let tx = Arc::new(Mutex::new(Vec::new()));
        let link = TestLink {
            rx: Arc::clone(&rx),
            tx: Arc::clone(&tx),
        };
        let transport = RtuTransport::new(link, RtuTimings::from_line(115_200, 8, 1));
        Harness {
            engine: SlaveEngine::new(transport, vec![0x06]),
            rx,
            tx,
        }
    }

    impl Harness {
        fn push_frame(&self, adu_without_crc: &[u8]) {
            let mut frame = adu_without_crc.to_vec();
            crc::append_crc(&mut frame);
            self.rx.lock().unwrap().push_back(frame);
        }

        fn push_raw(&self, bytes: &[u8]) {
            self.rx.lock().unwrap().push_back(bytes.to_vec());
        }

        fn sent(&self) -> Vec<u8> {
            self.tx.lock().unwrap().clone()
        }

        fn take_sent(&self) -> Vec<u8> {
            std::mem::take(&mut *self.tx.lock().unwrap())
        }
    }

    fn node_bank() -> RegisterBank {
        let mut bank = RegisterBank::new();
        for address in 0..4 {
            bank.add_input(address, (address + 1) * 100);
        }
        bank.add_holding(100, 0);
        bank.add_holding(101, 0);
        bank.add_coil(0, false);
        bank.add_coil(1, false);
        bank.add_coil(2, false);
        bank.add_discrete(6, true);
        bank.add_discrete(7, false);
        bank
    }

    #[test]
    fn test_idle_poll() {
        let mut h = harness();
        let mut bank = node_bank();
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::Idle);
        assert!(h.sent().is_empty());
    }

    #[test]
    fn test_short_frame_dropped_silently() {
        let mut h = harness();
        let mut bank = node_bank();
        h.push_raw(&[0x06, 0x03, 0x00]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::Discarded);
        assert!(h.sent().is_empty());
    }

    #[test]
    fn test_foreign_address_dropped_silently() {
        let mut h = harness();
        let mut bank = node_bank();
        // valid CRC, but addressed to unit 9
        h.push_frame(&[0x09, 0x03, 0x00, 0x64, 0x00, 0x01]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::Discarded);
        assert!(h.sent().is_empty());
    }

    #[test]
    fn test_crc_mismatch_dropped_silently() {
        let mut h = harness();
        let mut bank = node_bank();
        let mut frame = vec![0x06, 0x03, 0x00, 0x64, 0x00, 0x01];
        crc::append_crc(&mut frame);
        frame[2] ^= 0x01; // corrupt after CRC was computed
        h.push_raw(&frame);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::Discarded);
        assert!(h.sent().is_empty());
        // no observable effect on the store
        assert_eq!(bank.get_holding(100).unwrap(), 0);
    }

    #[test]
    fn test_write_then_read_holding_register() {
        let mut h = harness();
        let mut bank = node_bank();

        // write holding register 100 = 1
        h.push_frame(&[0x06, 0x06, 0x00, 0x64, 0x00, 0x01]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::Responded);
        assert_eq!(bank.get_holding(100).unwrap(), 1);

        // response echoes the request
        let mut expected = vec![0x06, 0x06, 0x00, 0x64, 0x00, 0x01];
        crc::append_crc(&mut expected);
        assert_eq!(h.take_sent(), expected);

        // read it back via 0x03
        h.push_frame(&[0x06, 0x03, 0x00, 0x64, 0x00, 0x01]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::Responded);
        let mut expected = vec![0x06, 0x03, 0x02, 0x00, 0x01];
        crc::append_crc(&mut expected);
        assert_eq!(h.take_sent(), expected);
    }

    #[test]
    fn test_read_input_registers_block() {
        let mut h = harness();
        let mut bank = node_bank();
        h.push_frame(&[0x06, 0x04, 0x00, 0x00, 0x00, 0x04]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::Responded);

        let sent = h.sent();
        assert_eq!(sent[0], 0x06);
        assert_eq!(sent[1], 0x04);
        assert_eq!(sent[2], 0x08); // 4 registers = 8 data bytes
        assert_eq!(sent.len(), 3 + 8 + 2);
        assert_eq!(&sent[3..11], &[0x00, 0x64, 0x00, 0xC8, 0x01, 0x2C, 0x01, 0x90]);
        assert!(crc::verify_crc(&sent));
    }

    #[test]
    fn test_read_coils_and_discrete_inputs() {
        let mut h = harness();
        let mut bank = node_bank();
        bank.set_coil(0, true).unwrap();
        bank.set_coil(2, true).unwrap();

        h.push_frame(&[0x06, 0x01, 0x00, 0x00, 0x00, 0x03]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::Responded);
        // [1,0,1] packed first-value-high: 0b101
        assert_eq!(&h.take_sent()[..4], &[0x06, 0x01, 0x01, 0x05]);

        h.push_frame(&[0x06, 0x02, 0x00, 0x06, 0x00, 0x02]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::Responded);
        // [true, false] -> 0b10
        assert_eq!(&h.take_sent()[..4], &[0x06, 0x02, 0x01, 0x02]);
    }

    #[test]
    fn test_write_single_coil_semantics() {
        let mut h = harness();
        let mut bank = node_bank();

        h.push_frame(&[0x06, 0x05, 0x00, 0x01, 0xFF, 0x00]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::Responded);
        assert!(bank.get_coil(1).unwrap());

        h.push_frame(&[0x06, 0x05, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::Responded);
        assert!(!bank.get_coil(1).unwrap());
    }

    #[test]
    fn test_write_multiple_coils_and_registers() {
        let mut h = harness();
        let mut bank = node_bank();

        // 3 coils from address 0: [1,0,1] -> one byte 0b101
        h.push_frame(&[0x06, 0x0F, 0x00, 0x00, 0x00, 0x03, 0x01, 0x05]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::Responded);
        assert!(bank.get_coil(0).unwrap());
        assert!(!bank.get_coil(1).unwrap());
        assert!(bank.get_coil(2).unwrap());
        let mut expected = vec![0x06, 0x0F, 0x00, 0x00, 0x00, 0x03];
        crc::append_crc(&mut expected);
        assert_eq!(h.take_sent(), expected);

        // 2 registers from address 100
        h.push_frame(&[0x06, 0x10, 0x00, 0x64, 0x00, 0x02, 0x04, 0x12, 0x34, 0x56, 0x78]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::Responded);
        assert_eq!(bank.get_holding(100).unwrap(), 0x1234);
        assert_eq!(bank.get_holding(101).unwrap(), 0x5678);
    }

    #[test]
    fn test_out_of_range_quantity_yields_exception() {
        let mut h = harness();
        let mut bank = node_bank();
        h.push_frame(&[0x06, 0x03, 0x00, 0x64, 0x00, 0x00]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::ExceptionSent);
        let sent = h.sent();
        assert_eq!(&sent[..3], &[0x06, 0x83, 0x03]);
        assert!(crc::verify_crc(&sent));
    }

    #[test]
    fn test_unmapped_register_yields_illegal_data_address() {
        let mut h = harness();
        let mut bank = node_bank();
        h.push_frame(&[0x06, 0x04, 0x00, 0x32, 0x00, 0x01]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::ExceptionSent);
        assert_eq!(&h.sent()[..3], &[0x06, 0x84, 0x02]);
    }

    #[test]
    fn test_unsupported_function_yields_illegal_function() {
        let mut h = harness();
        let mut bank = node_bank();
        h.push_frame(&[0x06, 0x2B, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::ExceptionSent);
        assert_eq!(&h.sent()[..3], &[0x06, 0xAB, 0x01]);
    }

    #[test]
    fn test_write_to_unmapped_holding_register() {
        let mut h = harness();
        let mut bank = node_bank();
        h.push_frame(&[0x06, 0x06, 0x01, 0x00, 0x00, 0x01]);
        assert_eq!(h.engine.poll(&mut bank).unwrap(), PollOutcome::ExceptionSent);
        assert_eq!(&h.sent()[..3], &[0x06, 0x86, 0x02]);
    }
}
