//! Response PDU encoding.
//!
//! Builds the function-code-plus-data portion of a reply; the transport
//! prepends the unit address and appends the CRC. Write responses echo the
//! request fields back as an acknowledgment, they do not re-read stored
//! state.

use crate::modbus::request::{ExceptionInfo, ERROR_BIAS};
use crate::utils::error::NodeError;

/// Signed/unsigned interpretation of register values at encode time,
/// either one flag for the whole read or one flag per value.
#[derive(Debug, Clone)]
pub enum Signedness {
    Uniform(bool),
    PerValue(Vec<bool>),
}

/// Packs a bool sequence into bytes, first value in the most significant
/// position of each chunk.
pub fn pack_bits(values: &[bool]) -> Vec<u8> {
    values
        .chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | bit as u8))
        .collect()
}

/// Inverse of [`pack_bits`] for `count` values.
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    let mut values = Vec::with_capacity(count);
    let mut remaining = count;
    for &byte in bytes {
        if remaining == 0 {
            break;
        }
        let bits = remaining.min(8);
        for position in (0..bits).rev() {
            values.push((byte >> position) & 1 == 1);
        }
        remaining -= bits;
    }
    values
}

/// Read-coils / read-discrete-inputs response: byte count plus packed bits.
pub fn read_bits_response(function: u8, values: &[bool]) -> Vec<u8> {
    let packed = pack_bits(values);
    let mut pdu = Vec::with_capacity(2 + packed.len());
    pdu.push(function);
    pdu.push(packed.len() as u8);
    pdu.extend_from_slice(&packed);
    pdu
}

/// Read-holding / read-input-registers response: byte count plus one
/// big-endian word per value.
///
/// Rejects a value count outside [1, 125] (mirrors the parser bound), a
/// per-value signedness list whose length does not match the value count,
/// and any value outside the range of its signedness.
pub fn read_registers_response(
    function: u8,
    values: &[i32],
    signedness: &Signedness,
) -> Result<Vec<u8>, NodeError> {
    if values.is_empty() || values.len() > 125 {
        return Err(NodeError::EncodingError(format!(
            "invalid number of registers: {}",
            values.len()
        )));
    }

    if let Signedness::PerValue(flags) = signedness {
        if flags.len() != values.len() {
            return Err(NodeError::EncodingError(format!(
                "signedness list length {} does not match value count {}",
                flags.len(),
                values.len()
            )));
        }
    }

    let mut pdu = Vec::with_capacity(2 + values.len() * 2);
    pdu.push(function);
    pdu.push((values.len() * 2) as u8);

    for (index, &value) in values.iter().enumerate() {
        let signed = match signedness {
            Signedness::Uniform(signed) => *signed,
            Signedness::PerValue(flags) => flags[index],
        };
        let word = if signed {
            if !(i16::MIN as i32..=i16::MAX as i32).contains(&value) {
                return Err(NodeError::EncodingError(format!(
                    "value {} out of signed 16-bit range",
                    value
                )));
            }
            value as i16 as u16
        } else {
            if !(0..=u16::MAX as i32).contains(&value) {
                return Err(NodeError::EncodingError(format!(
                    "value {} out of unsigned 16-bit range",
                    value
                )));
            }
            value as u16
        };
        pdu.extend_from_slice(&word.to_be_bytes());
    }

    Ok(pdu)
}

/// Write-single-coil / write-single-register response: echo of the request
/// address and payload.
pub fn write_single_response(function: u8, register_addr: u16, payload: &[u8]) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(5);
    pdu.push(function);
    pdu.extend_from_slice(&register_addr.to_be_bytes());
    pdu.extend_from_slice(payload);
    pdu
}

/// Write-multiple-coils / write-multiple-registers response: echo of the
/// request address and quantity, not the data.
pub fn write_multiple_response(function: u8, register_addr: u16, quantity: u16) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(5);
    pdu.push(function);
    pdu.extend_from_slice(&register_addr.to_be_bytes());
    pdu.extend_from_slice(&quantity.to_be_bytes());
    pdu
}

/// Exception response: `[function + 0x80][exception code]`.
pub fn exception_response(exception: &ExceptionInfo) -> Vec<u8> {
    vec![exception.function.wrapping_add(ERROR_BIAS), exception.code as u8]
}
