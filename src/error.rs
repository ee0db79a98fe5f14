//! Transport Error Types
//!
//! Closed error taxonomy for Modbus transactions, plus the synchronous codec
//! error used by value extraction and encoding.

use thiserror::Error;

use crate::codec::ValueType;
use crate::endpoint::Endpoint;

/// Result type for transaction-level operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors describing a failed transaction attempt.
///
/// Every variant represents one resolved attempt; the scheduler retries
/// silently up to the blueprint's `max_tries` before surfacing the last
/// error through the task callback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not establish or retain a connection to the endpoint
    #[error("could not connect to {0}")]
    Connection(Endpoint),

    /// Byte-level communication failure on an established connection
    #[error("i/o error: {0}")]
    Io(String),

    /// Response correlation id did not match the request
    #[error("response transaction id {response} does not match request {request}")]
    UnexpectedTransactionId { request: u16, response: u16 },

    /// Response function code did not match the request and was not a
    /// recognized exception response
    #[error("response function code 0x{response:02X} does not match request 0x{request:02X}")]
    UnexpectedFunctionCode { request: u8, response: u8 },

    /// Response payload length did not match what the request implies
    #[error("unexpected response size: expected {expected} bytes, got {actual}")]
    UnexpectedResponseSize { expected: usize, actual: usize },

    /// The slave explicitly returned an exception response
    #[error("slave exception: {0}")]
    SlaveException(ExceptionCode),
}

impl TransportError {
    /// Whether the pooled connection should be invalidated before the next
    /// attempt. An explicit exception response means the connection itself
    /// is healthy; everything else is treated as a corrupted or broken link.
    pub fn drops_connection(&self) -> bool {
        !matches!(self, TransportError::SlaveException(_))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

/// Modbus application-protocol exception codes as returned by a slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    SlaveDeviceFailure,
    Acknowledge,
    SlaveDeviceBusy,
    NegativeAcknowledge,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetFailedToRespond,
    /// Code outside the set the protocol defines
    Other(u8),
}

impl ExceptionCode {
    /// Map the raw wire byte to an exception code.
    pub fn from_wire(code: u8) -> Self {
        match code {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::SlaveDeviceFailure,
            0x05 => Self::Acknowledge,
            0x06 => Self::SlaveDeviceBusy,
            0x07 => Self::NegativeAcknowledge,
            0x08 => Self::MemoryParityError,
            0x0A => Self::GatewayPathUnavailable,
            0x0B => Self::GatewayTargetFailedToRespond,
            other => Self::Other(other),
        }
    }

    /// Numeric code as carried on the wire.
    pub fn code(&self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
            Self::SlaveDeviceFailure => 0x04,
            Self::Acknowledge => 0x05,
            Self::SlaveDeviceBusy => 0x06,
            Self::NegativeAcknowledge => 0x07,
            Self::MemoryParityError => 0x08,
            Self::GatewayPathUnavailable => 0x0A,
            Self::GatewayTargetFailedToRespond => 0x0B,
            Self::Other(code) => *code,
        }
    }

    /// Human-readable description per the Modbus application protocol.
    pub fn description(&self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal Function",
            Self::IllegalDataAddress => "Illegal Data Address",
            Self::IllegalDataValue => "Illegal Data Value",
            Self::SlaveDeviceFailure => "Slave Device Failure",
            Self::Acknowledge => "Acknowledge",
            Self::SlaveDeviceBusy => "Slave Device Busy",
            Self::NegativeAcknowledge => "Negative Acknowledge",
            Self::MemoryParityError => "Memory Parity Error",
            Self::GatewayPathUnavailable => "Gateway Path Unavailable",
            Self::GatewayTargetFailedToRespond => "Gateway Target Device Failed to Respond",
            Self::Other(_) => "Unknown Exception",
        }
    }
}

impl std::fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), self.code())
    }
}

/// Errors raised synchronously by the value codec and data containers.
///
/// These are programmer errors on the calling side and are never part of the
/// scheduler retry loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The type's bit span at the given index exceeds the buffer
    #[error("index {index} with type {value_type} does not fit in {available} bytes")]
    OutOfBounds {
        index: usize,
        value_type: ValueType,
        available: usize,
    },

    /// Byte range requested from a buffer exceeds its length
    #[error("byte range {start}..{end} does not fit in {available} bytes")]
    ByteRangeOutOfBounds {
        start: usize,
        end: usize,
        available: usize,
    },

    /// 1-bit and 8-bit destination types cannot be written to registers
    #[error("cannot encode into {0}: 1-bit and 8-bit targets are unsupported")]
    UnsupportedEncodeTarget(ValueType),

    /// Register data must come in 2-byte units
    #[error("register data must have an even byte count, got {0}")]
    OddByteCount(usize),

    /// Bit index beyond the fixed size of a `BitArray`
    #[error("bit index {index} out of range for {len} bits")]
    BitIndexOutOfRange { index: usize, len: usize },

    /// Declared bit count does not fit in the packed bytes provided
    #[error("{len} bits do not fit in {available} packed bytes")]
    PackedLengthMismatch { len: usize, available: usize },
}
