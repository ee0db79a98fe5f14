//! Register Value Codec
//!
//! Bidirectional conversion between raw register bytes and typed values.
//! Registers are 16-bit big-endian words; multi-register values place the
//! most significant register first unless a `*Swap` type reverses the
//! register order. Decoding never panics on bad indices; every out-of-range
//! access fails with [`CodecError::OutOfBounds`].
//!
//! # Addressing
//!
//! For types of 16 bits and wider, `index` counts registers (2 bytes per
//! unit). For `Bit` the index counts bits (bit 0 = LSB of the first
//! register), and for `Int8`/`Uint8` it counts bytes in low-byte-first order
//! within each register (index 0 = low byte of register 0, index 1 = its
//! high byte).

use crate::data::RegisterArray;
use crate::error::CodecError;

/// Supported value types for register decoding and encoding.
///
/// `*Swap` variants reverse the register order of multi-register values
/// (least significant register first) while the byte order inside each
/// register stays big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bit,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Int64,
    Uint64,
    Int32Swap,
    Uint32Swap,
    Float32Swap,
    Int64Swap,
    Uint64Swap,
}

impl ValueType {
    /// Width of the value in bits.
    pub fn bits(&self) -> usize {
        match self {
            Self::Bit => 1,
            Self::Int8 | Self::Uint8 => 8,
            Self::Int16 | Self::Uint16 => 16,
            Self::Int32
            | Self::Uint32
            | Self::Float32
            | Self::Int32Swap
            | Self::Uint32Swap
            | Self::Float32Swap => 32,
            Self::Int64 | Self::Uint64 | Self::Int64Swap | Self::Uint64Swap => 64,
        }
    }

    /// Number of 16-bit registers the value occupies.
    pub fn register_count(&self) -> usize {
        self.bits().div_ceil(16)
    }

    /// Whether the register order is reversed.
    pub fn is_swapped(&self) -> bool {
        matches!(
            self,
            Self::Int32Swap
                | Self::Uint32Swap
                | Self::Float32Swap
                | Self::Int64Swap
                | Self::Uint64Swap
        )
    }

    /// Parse a configuration string such as `"uint16"` or `"float32_swap"`.
    pub fn from_config(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bit" | "bool" => Some(Self::Bit),
            "int8" => Some(Self::Int8),
            "uint8" => Some(Self::Uint8),
            "int16" => Some(Self::Int16),
            "uint16" => Some(Self::Uint16),
            "int32" => Some(Self::Int32),
            "uint32" => Some(Self::Uint32),
            "float32" => Some(Self::Float32),
            "int64" => Some(Self::Int64),
            "uint64" => Some(Self::Uint64),
            "int32_swap" => Some(Self::Int32Swap),
            "uint32_swap" => Some(Self::Uint32Swap),
            "float32_swap" => Some(Self::Float32Swap),
            "int64_swap" => Some(Self::Int64Swap),
            "uint64_swap" => Some(Self::Uint64Swap),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Bit => "bit",
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Float32 => "float32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Int32Swap => "int32_swap",
            Self::Uint32Swap => "uint32_swap",
            Self::Float32Swap => "float32_swap",
            Self::Int64Swap => "int64_swap",
            Self::Uint64Swap => "uint64_swap",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A decoded register value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bit(bool),
    Signed(i64),
    Unsigned(u64),
    Float32(f32),
}

impl Value {
    /// Raw bit pattern for integer encode targets. Boolean-like values map
    /// to 1/0; floats truncate toward zero.
    fn as_u64(&self) -> u64 {
        match self {
            Value::Bit(bit) => u64::from(*bit),
            Value::Signed(v) => *v as u64,
            Value::Unsigned(v) => *v,
            Value::Float32(v) => *v as i64 as u64,
        }
    }

    /// Numeric value for the float32 encode target.
    fn as_f32(&self) -> f32 {
        match self {
            Value::Bit(bit) => f32::from(u8::from(*bit)),
            Value::Signed(v) => *v as f32,
            Value::Unsigned(v) => *v as f32,
            Value::Float32(v) => *v,
        }
    }
}

/// Decode a typed value from a raw big-endian register buffer.
///
/// Returns `Ok(None)` only when a float32 decode produces NaN or an
/// infinity: the bytes are well-formed but carry no usable value. Bounds
/// violations fail with [`CodecError::OutOfBounds`].
pub fn extract(bytes: &[u8], index: usize, value_type: ValueType) -> Result<Option<Value>, CodecError> {
    check_bounds(bytes, index, value_type)?;
    let value = match value_type {
        ValueType::Bit => {
            let register = read_register(bytes, index / 16);
            Value::Bit((register >> (index % 16)) & 1 != 0)
        }
        ValueType::Int8 => Value::Signed(i64::from(bytes[index ^ 1] as i8)),
        ValueType::Uint8 => Value::Unsigned(u64::from(bytes[index ^ 1])),
        ValueType::Int16 => Value::Signed(i64::from(read_register(bytes, index) as i16)),
        ValueType::Uint16 => Value::Unsigned(u64::from(read_register(bytes, index))),
        ValueType::Int32 | ValueType::Int32Swap => {
            Value::Signed(i64::from(read_u32(bytes, index, value_type.is_swapped()) as i32))
        }
        ValueType::Uint32 | ValueType::Uint32Swap => {
            Value::Unsigned(u64::from(read_u32(bytes, index, value_type.is_swapped())))
        }
        ValueType::Float32 | ValueType::Float32Swap => {
            let raw = read_u32(bytes, index, value_type.is_swapped());
            let value = f32::from_bits(raw);
            if !value.is_finite() {
                return Ok(None);
            }
            Value::Float32(value)
        }
        ValueType::Int64 | ValueType::Int64Swap => {
            Value::Signed(read_u64(bytes, index, value_type.is_swapped()) as i64)
        }
        ValueType::Uint64 | ValueType::Uint64Swap => {
            Value::Unsigned(read_u64(bytes, index, value_type.is_swapped()))
        }
    };
    Ok(Some(value))
}

/// Decode a fixed-length string starting at `byte_index`.
///
/// Reads at most `length` bytes, stopping early at the first NUL. Byte
/// ranges beyond the buffer fail the same way numeric decodes do.
pub fn extract_string(bytes: &[u8], byte_index: usize, length: usize) -> Result<String, CodecError> {
    let end = byte_index
        .checked_add(length)
        .filter(|end| *end <= bytes.len())
        .ok_or(CodecError::ByteRangeOutOfBounds {
            start: byte_index,
            end: byte_index.saturating_add(length),
            available: bytes.len(),
        })?;
    let slice = &bytes[byte_index..end];
    let terminated = slice.iter().position(|b| *b == 0).unwrap_or(slice.len());
    Ok(String::from_utf8_lossy(&slice[..terminated]).into_owned())
}

/// Encode a value into registers of the destination type.
///
/// Only 16/32/64-bit integer and float32 targets are supported; `Bit`,
/// `Int8` and `Uint8` fail fast with
/// [`CodecError::UnsupportedEncodeTarget`]. Byte order mirrors the decode
/// rules, including the swap variants.
pub fn encode(value: &Value, value_type: ValueType) -> Result<RegisterArray, CodecError> {
    match value_type {
        ValueType::Bit | ValueType::Int8 | ValueType::Uint8 => {
            Err(CodecError::UnsupportedEncodeTarget(value_type))
        }
        ValueType::Int16 | ValueType::Uint16 => {
            Ok(RegisterArray::from_registers(&[value.as_u64() as u16]))
        }
        ValueType::Int32 | ValueType::Uint32 | ValueType::Int32Swap | ValueType::Uint32Swap => {
            Ok(registers_from_u32(
                value.as_u64() as u32,
                value_type.is_swapped(),
            ))
        }
        ValueType::Float32 | ValueType::Float32Swap => Ok(registers_from_u32(
            value.as_f32().to_bits(),
            value_type.is_swapped(),
        )),
        ValueType::Int64 | ValueType::Uint64 | ValueType::Int64Swap | ValueType::Uint64Swap => {
            Ok(registers_from_u64(value.as_u64(), value_type.is_swapped()))
        }
    }
}

/// Decode a single bit. Bit 0 is the LSB of the first register.
pub fn extract_bit(bytes: &[u8], index: usize) -> Result<bool, CodecError> {
    match extract(bytes, index, ValueType::Bit)? {
        Some(Value::Bit(bit)) => Ok(bit),
        _ => unreachable!("bit extraction always yields a bit"),
    }
}

/// Decode a signed 16-bit value at a register index.
pub fn extract_i16(bytes: &[u8], index: usize) -> Result<i16, CodecError> {
    match extract(bytes, index, ValueType::Int16)? {
        Some(Value::Signed(v)) => Ok(v as i16),
        _ => unreachable!("int16 extraction always yields a signed value"),
    }
}

/// Decode an unsigned 16-bit value at a register index.
pub fn extract_u16(bytes: &[u8], index: usize) -> Result<u16, CodecError> {
    match extract(bytes, index, ValueType::Uint16)? {
        Some(Value::Unsigned(v)) => Ok(v as u16),
        _ => unreachable!("uint16 extraction always yields an unsigned value"),
    }
}

/// Decode a float32 at a register index. `None` for NaN/infinite patterns.
pub fn extract_f32(bytes: &[u8], index: usize) -> Result<Option<f32>, CodecError> {
    match extract(bytes, index, ValueType::Float32)? {
        Some(Value::Float32(v)) => Ok(Some(v)),
        None => Ok(None),
        _ => unreachable!("float32 extraction always yields a float"),
    }
}

fn check_bounds(bytes: &[u8], index: usize, value_type: ValueType) -> Result<(), CodecError> {
    let out_of_bounds = CodecError::OutOfBounds {
        index,
        value_type,
        available: bytes.len(),
    };
    let unit_bits = match value_type {
        ValueType::Bit => 1usize,
        ValueType::Int8 | ValueType::Uint8 => 8,
        _ => 16,
    };
    let start_bit = index.checked_mul(unit_bits).ok_or(out_of_bounds.clone())?;
    let end_bit = start_bit
        .checked_add(value_type.bits())
        .ok_or(out_of_bounds.clone())?;
    if end_bit > bytes.len() * 8 {
        return Err(out_of_bounds);
    }
    // The end-bit rule covers whole-register buffers; odd-length buffers
    // additionally need the physical byte positions verified.
    let last_byte = match value_type {
        ValueType::Bit => (index / 16) * 2 + 1,
        ValueType::Int8 | ValueType::Uint8 => index ^ 1,
        _ => (index + value_type.register_count()) * 2 - 1,
    };
    if last_byte >= bytes.len() {
        return Err(out_of_bounds);
    }
    Ok(())
}

fn read_register(bytes: &[u8], register_index: usize) -> u16 {
    let offset = register_index * 2;
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], register_index: usize, swapped: bool) -> u32 {
    let first = read_register(bytes, register_index);
    let second = read_register(bytes, register_index + 1);
    let (high, low) = if swapped { (second, first) } else { (first, second) };
    (u32::from(high) << 16) | u32::from(low)
}

fn read_u64(bytes: &[u8], register_index: usize, swapped: bool) -> u64 {
    let mut registers = [
        read_register(bytes, register_index),
        read_register(bytes, register_index + 1),
        read_register(bytes, register_index + 2),
        read_register(bytes, register_index + 3),
    ];
    if swapped {
        registers.reverse();
    }
    registers
        .iter()
        .fold(0u64, |acc, register| (acc << 16) | u64::from(*register))
}

fn registers_from_u32(raw: u32, swapped: bool) -> RegisterArray {
    let high = (raw >> 16) as u16;
    let low = raw as u16;
    if swapped {
        RegisterArray::from_registers(&[low, high])
    } else {
        RegisterArray::from_registers(&[high, low])
    }
}

fn registers_from_u64(raw: u64, swapped: bool) -> RegisterArray {
    let mut registers = [
        (raw >> 48) as u16,
        (raw >> 32) as u16,
        (raw >> 16) as u16,
        raw as u16,
    ];
    if swapped {
        registers.reverse();
    }
    RegisterArray::from_registers(&registers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TYPES: [ValueType; 15] = [
        ValueType::Bit,
        ValueType::Int8,
        ValueType::Uint8,
        ValueType::Int16,
        ValueType::Uint16,
        ValueType::Int32,
        ValueType::Uint32,
        ValueType::Float32,
        ValueType::Int64,
        ValueType::Uint64,
        ValueType::Int32Swap,
        ValueType::Uint32Swap,
        ValueType::Float32Swap,
        ValueType::Int64Swap,
        ValueType::Uint64Swap,
    ];

    fn decode(registers: &RegisterArray, value_type: ValueType) -> Option<Value> {
        extract(registers.as_bytes(), 0, value_type).unwrap()
    }

    #[test]
    fn test_roundtrip_integers() {
        let cases = [
            (Value::Signed(-1234), ValueType::Int16),
            (Value::Unsigned(0xABCD), ValueType::Uint16),
            (Value::Signed(-123_456_789), ValueType::Int32),
            (Value::Signed(-123_456_789), ValueType::Int32Swap),
            (Value::Unsigned(0xDEAD_BEEF), ValueType::Uint32),
            (Value::Unsigned(0xDEAD_BEEF), ValueType::Uint32Swap),
            (Value::Signed(i64::MIN), ValueType::Int64),
            (Value::Signed(-42), ValueType::Int64Swap),
            (Value::Unsigned(u64::MAX - 7), ValueType::Uint64),
            (Value::Unsigned(0x0123_4567_89AB_CDEF), ValueType::Uint64Swap),
        ];
        for (value, value_type) in cases {
            let encoded = encode(&value, value_type).unwrap();
            assert_eq!(
                decode(&encoded, value_type),
                Some(value),
                "roundtrip failed for {value_type}"
            );
        }
    }

    #[test]
    fn test_roundtrip_float32() {
        for value_type in [ValueType::Float32, ValueType::Float32Swap] {
            for v in [0.0f32, 25.6, -1.5e20, f32::MIN_POSITIVE] {
                let encoded = encode(&Value::Float32(v), value_type).unwrap();
                match decode(&encoded, value_type) {
                    Some(Value::Float32(decoded)) => assert_eq!(decoded, v),
                    other => panic!("expected float32, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_boolean_input_encodes_as_one_and_zero() {
        let on = encode(&Value::Bit(true), ValueType::Uint16).unwrap();
        let off = encode(&Value::Bit(false), ValueType::Uint16).unwrap();
        assert_eq!(on.get(0), Some(1));
        assert_eq!(off.get(0), Some(0));
    }

    #[test]
    fn test_encode_rejects_narrow_targets() {
        for value_type in [ValueType::Bit, ValueType::Int8, ValueType::Uint8] {
            assert_eq!(
                encode(&Value::Signed(1), value_type),
                Err(CodecError::UnsupportedEncodeTarget(value_type))
            );
        }
    }

    #[test]
    fn test_register_order() {
        // 0x12345678 laid out most-significant register first
        let encoded = encode(&Value::Unsigned(0x1234_5678), ValueType::Uint32).unwrap();
        assert_eq!(encoded.as_bytes(), &[0x12, 0x34, 0x56, 0x78]);
        // Swap variant: low register first, bytes inside each register unchanged
        let swapped = encode(&Value::Unsigned(0x1234_5678), ValueType::Uint32Swap).unwrap();
        assert_eq!(swapped.as_bytes(), &[0x56, 0x78, 0x12, 0x34]);
    }

    #[test]
    fn test_swap_symmetry() {
        let straight = RegisterArray::from_registers(&[0x1234, 0x5678]);
        let reversed = RegisterArray::from_registers(&[0x5678, 0x1234]);
        assert_eq!(
            extract(straight.as_bytes(), 0, ValueType::Int32Swap).unwrap(),
            extract(reversed.as_bytes(), 0, ValueType::Int32).unwrap()
        );
        assert_eq!(
            extract(straight.as_bytes(), 0, ValueType::Uint32Swap).unwrap(),
            extract(reversed.as_bytes(), 0, ValueType::Uint32).unwrap()
        );
    }

    #[test]
    fn test_bit_addressing() {
        let registers = RegisterArray::from_registers(&[0x0001, 0x8000]);
        for index in 0..32 {
            let expected = index == 0 || index == 31;
            assert_eq!(
                extract_bit(registers.as_bytes(), index).unwrap(),
                expected,
                "bit {index}"
            );
        }
        assert!(extract_bit(registers.as_bytes(), 32).is_err());
    }

    #[test]
    fn test_byte_addressing() {
        // Register 0 = 0xHHLL with high byte 0x12, low byte 0xF4
        let registers = RegisterArray::from_registers(&[0x12F4, 0x7F80]);
        let bytes = registers.as_bytes();
        assert_eq!(
            extract(bytes, 0, ValueType::Uint8).unwrap(),
            Some(Value::Unsigned(0xF4))
        );
        assert_eq!(
            extract(bytes, 1, ValueType::Uint8).unwrap(),
            Some(Value::Unsigned(0x12))
        );
        assert_eq!(
            extract(bytes, 2, ValueType::Int8).unwrap(),
            Some(Value::Signed(-128))
        );
        assert_eq!(
            extract(bytes, 3, ValueType::Int8).unwrap(),
            Some(Value::Signed(0x7F))
        );
    }

    #[test]
    fn test_sign_extension() {
        let registers = RegisterArray::from_registers(&[0xFFFE]);
        assert_eq!(
            extract(registers.as_bytes(), 0, ValueType::Int16).unwrap(),
            Some(Value::Signed(-2))
        );
        assert_eq!(
            extract(registers.as_bytes(), 0, ValueType::Uint16).unwrap(),
            Some(Value::Unsigned(0xFFFE))
        );
    }

    #[test]
    fn test_bounds_all_types() {
        let two_registers = RegisterArray::from_registers(&[0, 0]);
        let bytes = two_registers.as_bytes();
        for value_type in ALL_TYPES {
            // Empty buffer always fails
            assert!(
                extract(&[], 0, value_type).is_err(),
                "{value_type} on empty buffer"
            );
            // An index one unit past the end always fails
            let past_end = match value_type {
                ValueType::Bit => 32,
                ValueType::Int8 | ValueType::Uint8 => 4,
                _ => 2,
            };
            assert!(
                extract(bytes, past_end, value_type).is_err(),
                "{value_type} past end"
            );
        }
        // 64-bit types need four registers
        assert!(extract(bytes, 0, ValueType::Int64).is_err());
        let four_registers = RegisterArray::from_registers(&[0, 0, 0, 0]);
        assert!(extract(four_registers.as_bytes(), 0, ValueType::Int64).is_ok());
        assert!(extract(four_registers.as_bytes(), 1, ValueType::Int64).is_err());
    }

    #[test]
    fn test_float32_nan_and_infinity_yield_no_value() {
        for pattern in [f32::NAN.to_bits(), f32::INFINITY.to_bits(), f32::NEG_INFINITY.to_bits()]
        {
            let registers =
                RegisterArray::from_registers(&[(pattern >> 16) as u16, pattern as u16]);
            assert_eq!(extract_f32(registers.as_bytes(), 0).unwrap(), None);
        }
    }

    #[test]
    fn test_int64_swap_register_order() {
        let encoded = encode(&Value::Unsigned(0x0011_2233_4455_6677), ValueType::Uint64Swap)
            .unwrap();
        assert_eq!(
            encoded.as_bytes(),
            &[0x66, 0x77, 0x44, 0x55, 0x22, 0x33, 0x00, 0x11]
        );
    }

    #[test]
    fn test_string_truncates_at_nul() {
        let bytes = b"AB\0CD";
        assert_eq!(extract_string(bytes, 0, 5).unwrap(), "AB");
        assert_eq!(extract_string(bytes, 3, 2).unwrap(), "CD");
        assert!(extract_string(bytes, 3, 3).is_err());
        assert!(extract_string(bytes, 6, 1).is_err());
    }

    #[test]
    fn test_from_config() {
        assert_eq!(ValueType::from_config("uint16"), Some(ValueType::Uint16));
        assert_eq!(
            ValueType::from_config("FLOAT32_SWAP"),
            Some(ValueType::Float32Swap)
        );
        assert_eq!(ValueType::from_config("bcd"), None);
    }
}
