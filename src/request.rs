//! Read and Write Request Blueprints
//!
//! Immutable descriptions of a single Modbus transaction, validated at
//! construction. Blueprints carry everything needed to build a request PDU
//! and to validate its response, plus the retry budget for the scheduler.
//! They compare structurally, which makes them usable as part of poll task
//! identity.

use thiserror::Error;

use crate::data::{BitArray, RegisterArray};

/// Most coils one FC 0x0F transaction can carry.
pub const MAX_WRITE_COILS: usize = 1968;

/// Most registers one FC 0x10 transaction can carry.
pub const MAX_WRITE_REGISTERS: usize = 123;

/// Blueprint construction failures. These are caller mistakes, detected
/// before anything is scheduled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidRequest {
    /// `max_tries` must allow at least one attempt
    #[error("max_tries must be at least 1")]
    ZeroTries,

    /// Write payloads must carry at least one element
    #[error("write payload must not be empty")]
    EmptyPayload,

    /// Single-element write functions accept exactly one element
    #[error("single-write function requires exactly one element, got {0}")]
    SingleWriteWithMany(usize),

    /// Payload exceeds what one transaction can carry on the wire
    #[error("write payload of {len} elements exceeds the protocol limit of {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

/// The four modeled read function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadFunction {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
}

impl ReadFunction {
    /// Wire function code.
    pub fn code(&self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
        }
    }

    /// Whether the response payload is packed bits rather than registers.
    pub fn reads_bits(&self) -> bool {
        matches!(self, Self::ReadCoils | Self::ReadDiscreteInputs)
    }
}

/// Blueprint for a read transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadRequest {
    slave_id: u8,
    function: ReadFunction,
    address: u16,
    count: u16,
    max_tries: u32,
}

impl ReadRequest {
    pub fn new(
        slave_id: u8,
        function: ReadFunction,
        address: u16,
        count: u16,
        max_tries: u32,
    ) -> Result<Self, InvalidRequest> {
        if max_tries == 0 {
            return Err(InvalidRequest::ZeroTries);
        }
        Ok(Self {
            slave_id,
            function,
            address,
            count,
            max_tries,
        })
    }

    pub fn slave_id(&self) -> u8 {
        self.slave_id
    }

    pub fn function(&self) -> ReadFunction {
        self.function
    }

    /// First coil/register address.
    pub fn address(&self) -> u16 {
        self.address
    }

    /// Number of coils or registers to read.
    pub fn count(&self) -> u16 {
        self.count
    }

    /// Total attempts the scheduler may make, including the first.
    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }
}

/// Payload of a write transaction.
///
/// `multiple` selects the multi-element function code (0x0F/0x10) even for a
/// one-element payload; some devices only implement one of the two forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WritePayload {
    Coils { bits: BitArray, multiple: bool },
    Registers { registers: RegisterArray, multiple: bool },
}

impl WritePayload {
    fn validate(&self) -> Result<(), InvalidRequest> {
        let (len, multiple, max) = match self {
            Self::Coils { bits, multiple } => (bits.len(), *multiple, MAX_WRITE_COILS),
            Self::Registers { registers, multiple } => {
                (registers.len(), *multiple, MAX_WRITE_REGISTERS)
            }
        };
        if len == 0 {
            return Err(InvalidRequest::EmptyPayload);
        }
        if !multiple && len != 1 {
            return Err(InvalidRequest::SingleWriteWithMany(len));
        }
        // The PDU byte-count field is a single byte; these caps keep it honest
        if len > max {
            return Err(InvalidRequest::PayloadTooLarge { len, max });
        }
        Ok(())
    }
}

/// Blueprint for a write transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteRequest {
    slave_id: u8,
    address: u16,
    payload: WritePayload,
    max_tries: u32,
}

impl WriteRequest {
    /// Coil write blueprint. FC 0x05 when `multiple` is false, 0x0F otherwise.
    pub fn coils(
        slave_id: u8,
        address: u16,
        bits: BitArray,
        multiple: bool,
        max_tries: u32,
    ) -> Result<Self, InvalidRequest> {
        Self::new(
            slave_id,
            address,
            WritePayload::Coils { bits, multiple },
            max_tries,
        )
    }

    /// Register write blueprint. FC 0x06 when `multiple` is false, 0x10 otherwise.
    pub fn registers(
        slave_id: u8,
        address: u16,
        registers: RegisterArray,
        multiple: bool,
        max_tries: u32,
    ) -> Result<Self, InvalidRequest> {
        Self::new(
            slave_id,
            address,
            WritePayload::Registers { registers, multiple },
            max_tries,
        )
    }

    fn new(
        slave_id: u8,
        address: u16,
        payload: WritePayload,
        max_tries: u32,
    ) -> Result<Self, InvalidRequest> {
        if max_tries == 0 {
            return Err(InvalidRequest::ZeroTries);
        }
        payload.validate()?;
        Ok(Self {
            slave_id,
            address,
            payload,
            max_tries,
        })
    }

    pub fn slave_id(&self) -> u8 {
        self.slave_id
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn payload(&self) -> &WritePayload {
        &self.payload
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    /// Wire function code implied by the payload shape.
    pub fn function_code(&self) -> u8 {
        match &self.payload {
            WritePayload::Coils { multiple: false, .. } => 0x05,
            WritePayload::Coils { multiple: true, .. } => 0x0F,
            WritePayload::Registers { multiple: false, .. } => 0x06,
            WritePayload::Registers { multiple: true, .. } => 0x10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_function_codes() {
        assert_eq!(ReadFunction::ReadCoils.code(), 0x01);
        assert_eq!(ReadFunction::ReadDiscreteInputs.code(), 0x02);
        assert_eq!(ReadFunction::ReadHoldingRegisters.code(), 0x03);
        assert_eq!(ReadFunction::ReadInputRegisters.code(), 0x04);
        assert!(ReadFunction::ReadCoils.reads_bits());
        assert!(!ReadFunction::ReadInputRegisters.reads_bits());
    }

    #[test]
    fn test_read_request_rejects_zero_tries() {
        assert_eq!(
            ReadRequest::new(1, ReadFunction::ReadCoils, 0, 8, 0),
            Err(InvalidRequest::ZeroTries)
        );
        assert!(ReadRequest::new(1, ReadFunction::ReadCoils, 0, 8, 1).is_ok());
    }

    #[test]
    fn test_write_request_validation() {
        // Empty payloads never pass
        assert_eq!(
            WriteRequest::coils(1, 0, BitArray::from_bits(&[]), true, 3),
            Err(InvalidRequest::EmptyPayload)
        );
        assert_eq!(
            WriteRequest::registers(1, 0, RegisterArray::from_registers(&[]), false, 3),
            Err(InvalidRequest::EmptyPayload)
        );
        // Single-write form requires exactly one element
        assert_eq!(
            WriteRequest::coils(1, 0, BitArray::from_bits(&[true, false]), false, 3),
            Err(InvalidRequest::SingleWriteWithMany(2))
        );
        assert_eq!(
            WriteRequest::registers(
                1,
                0,
                RegisterArray::from_registers(&[1, 2, 3]),
                false,
                3
            ),
            Err(InvalidRequest::SingleWriteWithMany(3))
        );
        // Multi-write form accepts one element
        assert!(WriteRequest::coils(1, 0, BitArray::single(true), true, 3).is_ok());
        assert_eq!(
            WriteRequest::registers(1, 0, RegisterArray::from_registers(&[7]), true, 0),
            Err(InvalidRequest::ZeroTries)
        );
    }

    #[test]
    fn test_write_payload_protocol_limits() {
        // One register over the FC 0x10 cap would wrap the byte-count field
        let too_many = RegisterArray::from_registers(&vec![0xAAAA; 124]);
        assert_eq!(
            WriteRequest::registers(1, 0, too_many, true, 1),
            Err(InvalidRequest::PayloadTooLarge { len: 124, max: 123 })
        );
        let at_cap = RegisterArray::from_registers(&vec![0xAAAA; 123]);
        assert!(WriteRequest::registers(1, 0, at_cap, true, 1).is_ok());

        let too_many_bits = BitArray::from_bits(&vec![true; 1969]);
        assert_eq!(
            WriteRequest::coils(1, 0, too_many_bits, true, 1),
            Err(InvalidRequest::PayloadTooLarge {
                len: 1969,
                max: 1968
            })
        );
        let bits_at_cap = BitArray::from_bits(&vec![true; 1968]);
        assert!(WriteRequest::coils(1, 0, bits_at_cap, true, 1).is_ok());
    }

    #[test]
    fn test_write_function_code_selection() {
        let single_coil = WriteRequest::coils(1, 2, BitArray::single(true), false, 1).unwrap();
        assert_eq!(single_coil.function_code(), 0x05);
        let multi_coil =
            WriteRequest::coils(1, 2, BitArray::from_bits(&[true, false, true]), true, 1)
                .unwrap();
        assert_eq!(multi_coil.function_code(), 0x0F);
        let single_register =
            WriteRequest::registers(1, 2, RegisterArray::from_registers(&[9]), false, 1).unwrap();
        assert_eq!(single_register.function_code(), 0x06);
        let multi_register =
            WriteRequest::registers(1, 2, RegisterArray::from_registers(&[9, 10]), true, 1)
                .unwrap();
        assert_eq!(multi_register.function_code(), 0x10);
    }

    #[test]
    fn test_read_request_structural_equality() {
        let a = ReadRequest::new(1, ReadFunction::ReadHoldingRegisters, 100, 4, 3).unwrap();
        let b = ReadRequest::new(1, ReadFunction::ReadHoldingRegisters, 100, 4, 3).unwrap();
        let c = ReadRequest::new(1, ReadFunction::ReadHoldingRegisters, 100, 4, 2).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
