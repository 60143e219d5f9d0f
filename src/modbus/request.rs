//! Request decoding and per-function-code validation.
//!
//! A [`Request`] is only ever constructed from a frame that already passed
//! the length, unit-address and CRC gates in the engine. Validation
//! failures are returned as [`ExceptionInfo`] values carrying the function
//! code and exception code to put on the wire; a partial request is never
//! produced.

use log::debug;

pub const READ_COILS: u8 = 0x01;
pub const READ_DISCRETE_INPUTS: u8 = 0x02;
pub const READ_HOLDING_REGISTERS: u8 = 0x03;
pub const READ_INPUT_REGISTERS: u8 = 0x04;
pub const WRITE_SINGLE_COIL: u8 = 0x05;
pub const WRITE_SINGLE_REGISTER: u8 = 0x06;
pub const WRITE_MULTIPLE_COILS: u8 = 0x0F;
pub const WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Offset added to the function code in exception responses.
pub const ERROR_BIAS: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
}

/// Protocol-level rejection: function code plus exception code. Transient,
/// only lives long enough to be encoded into an exception response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub function: u8,
    pub code: ExceptionCode,
}

impl ExceptionInfo {
    pub fn new(function: u8, code: ExceptionCode) -> Self {
        Self { function, code }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub unit_addr: u8,
    pub function: u8,
    pub register_addr: u16,
    /// Absent for the single-write functions.
    pub quantity: Option<u16>,
    /// Write data; empty for reads.
    pub payload: Vec<u8>,
}

fn be_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

impl Request {
    /// Decodes an ADU with the CRC already stripped:
    /// `[unit_addr][function][register_addr_hi][register_addr_lo][fields...]`.
    pub fn parse(adu: &[u8]) -> Result<Request, ExceptionInfo> {
        let unit_addr = adu[0];
        let function = adu[1];
        let register_addr = be_u16(adu, 2);

        let reject = |code| {
            debug!(
                "Rejecting function 0x{:02X} request: {:?}",
                function, code
            );
            Err(ExceptionInfo::new(function, code))
        };

        match function {
            READ_COILS | READ_DISCRETE_INPUTS => {
                let quantity = be_u16(adu, 4);
                if !(1..=2000).contains(&quantity) {
                    return reject(ExceptionCode::IllegalDataValue);
                }
                Ok(Request {
                    unit_addr,
                    function,
                    register_addr,
                    quantity: Some(quantity),
                    payload: Vec::new(),
                })
            }
            READ_HOLDING_REGISTERS | READ_INPUT_REGISTERS => {
                let quantity = be_u16(adu, 4);
                if !(1..=125).contains(&quantity) {
                    return reject(ExceptionCode::IllegalDataValue);
                }
                Ok(Request {
                    unit_addr,
                    function,
                    register_addr,
                    quantity: Some(quantity),
                    payload: Vec::new(),
                })
            }
            WRITE_SINGLE_COIL => {
                let payload = adu[4..6].to_vec();
                // Only 0xFF00 (on) and 0x0000 (off) are legal coil values
                if !(payload[0] == 0x00 || payload[0] == 0xFF) || payload[1] != 0x00 {
                    return reject(ExceptionCode::IllegalDataValue);
                }
                Ok(Request {
                    unit_addr,
                    function,
                    register_addr,
                    quantity: None,
                    payload,
                })
            }
            WRITE_SINGLE_REGISTER => {
                // All 16-bit values are acceptable
                Ok(Request {
                    unit_addr,
                    function,
                    register_addr,
                    quantity: None,
                    payload: adu[4..6].to_vec(),
                })
            }
            WRITE_MULTIPLE_COILS => {
                let quantity = be_u16(adu, 4);
                if !(1..=2000).contains(&quantity) {
                    return reject(ExceptionCode::IllegalDataValue);
                }
                let payload = if adu.len() > 7 { adu[7..].to_vec() } else { Vec::new() };
                let expected = (quantity as usize - 1) / 8 + 1;
                if payload.len() != expected {
                    return reject(ExceptionCode::IllegalDataValue);
                }
                Ok(Request {
                    unit_addr,
                    function,
                    register_addr,
                    quantity: Some(quantity),
                    payload,
                })
            }
            WRITE_MULTIPLE_REGISTERS => {
                let quantity = be_u16(adu, 4);
                if !(1..=123).contains(&quantity) {
                    return reject(ExceptionCode::IllegalDataValue);
                }
                let payload = if adu.len() > 7 { adu[7..].to_vec() } else { Vec::new() };
                if payload.len() != quantity as usize * 2 {
                    return reject(ExceptionCode::IllegalDataValue);
                }
                Ok(Request {
                    unit_addr,
                    function,
                    register_addr,
                    quantity: Some(quantity),
                    payload,
                })
            }
            _ => {
                // Standard behavior for codes this node does not implement
                reject(ExceptionCode::IllegalFunction)
            }
        }
    }
}
