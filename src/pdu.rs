//! PDU Construction and Response Parsing
//!
//! Pure functions between request blueprints and protocol data units. A PDU
//! is the function code plus its payload; framing (MBAP header, CRC) belongs
//! to the connection implementation. Parsing validates exception responses,
//! function code echo and payload sizes before any payload is handed on.

use crate::data::{BitArray, RegisterArray};
use crate::error::{ExceptionCode, TransportError};
use crate::request::{ReadRequest, WritePayload, WriteRequest};

/// Parsed payload of a successful read response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Coil or discrete-input state, one bit per point
    Bits(BitArray),
    /// Holding or input register contents
    Registers(RegisterArray),
}

/// Parsed payload of a successful write response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResponse {
    /// Echoed function code
    pub function_code: u8,
    /// Echoed start address
    pub address: u16,
}

/// Build the request PDU for a read blueprint.
pub fn build_read_pdu(request: &ReadRequest) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(5);
    pdu.push(request.function().code());
    pdu.extend_from_slice(&request.address().to_be_bytes());
    pdu.extend_from_slice(&request.count().to_be_bytes());
    pdu
}

/// Build the request PDU for a write blueprint.
pub fn build_write_pdu(request: &WriteRequest) -> Vec<u8> {
    let mut pdu = Vec::new();
    pdu.push(request.function_code());
    pdu.extend_from_slice(&request.address().to_be_bytes());
    match request.payload() {
        WritePayload::Coils { bits, multiple: false } => {
            // 0xFF00 switches the coil on, 0x0000 off
            let value: u16 = if bits.iter().next() == Some(true) {
                0xFF00
            } else {
                0x0000
            };
            pdu.extend_from_slice(&value.to_be_bytes());
        }
        WritePayload::Coils { bits, multiple: true } => {
            pdu.extend_from_slice(&(bits.len() as u16).to_be_bytes());
            pdu.push(bits.as_packed().len() as u8);
            pdu.extend_from_slice(bits.as_packed());
        }
        WritePayload::Registers { registers, multiple: false } => {
            pdu.extend_from_slice(registers.as_bytes());
        }
        WritePayload::Registers { registers, multiple: true } => {
            pdu.extend_from_slice(&(registers.len() as u16).to_be_bytes());
            pdu.push(registers.as_bytes().len() as u8);
            pdu.extend_from_slice(registers.as_bytes());
        }
    }
    pdu
}

/// Validate and decode the response PDU for a read.
pub fn parse_read_response(
    request: &ReadRequest,
    pdu: &[u8],
) -> Result<ReadOutcome, TransportError> {
    check_function_code(request.function().code(), pdu)?;
    let byte_count = pdu[1] as usize;
    let data = &pdu[2..];
    let expected = if request.function().reads_bits() {
        (request.count() as usize).div_ceil(8)
    } else {
        request.count() as usize * 2
    };
    if byte_count != expected || data.len() != byte_count {
        return Err(TransportError::UnexpectedResponseSize {
            expected,
            actual: data.len().min(byte_count),
        });
    }
    if request.function().reads_bits() {
        let bits = BitArray::from_packed(data, request.count() as usize).map_err(|_| {
            TransportError::UnexpectedResponseSize {
                expected,
                actual: data.len(),
            }
        })?;
        Ok(ReadOutcome::Bits(bits))
    } else {
        let registers = RegisterArray::from_bytes(data.to_vec()).map_err(|_| {
            TransportError::UnexpectedResponseSize {
                expected,
                actual: data.len(),
            }
        })?;
        Ok(ReadOutcome::Registers(registers))
    }
}

/// Validate and decode the response PDU for a write.
///
/// All four write responses echo the start address in bytes 1..3; the
/// remaining two bytes (value or quantity) are not re-validated beyond size.
pub fn parse_write_response(
    request: &WriteRequest,
    pdu: &[u8],
) -> Result<WriteResponse, TransportError> {
    check_function_code(request.function_code(), pdu)?;
    if pdu.len() != 5 {
        return Err(TransportError::UnexpectedResponseSize {
            expected: 5,
            actual: pdu.len(),
        });
    }
    Ok(WriteResponse {
        function_code: pdu[0],
        address: u16::from_be_bytes([pdu[1], pdu[2]]),
    })
}

fn check_function_code(expected: u8, pdu: &[u8]) -> Result<(), TransportError> {
    if pdu.len() < 2 {
        return Err(TransportError::UnexpectedResponseSize {
            expected: 2,
            actual: pdu.len(),
        });
    }
    let function_code = pdu[0];
    if function_code == expected | 0x80 {
        return Err(TransportError::SlaveException(ExceptionCode::from_wire(
            pdu[1],
        )));
    }
    if function_code != expected {
        return Err(TransportError::UnexpectedFunctionCode {
            request: expected,
            response: function_code,
        });
    }
    Ok(())
}
