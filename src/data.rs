//! Immutable Bit and Register Containers
//!
//! Value types for the two payload shapes moved over the wire: packed coil
//! bits and 16-bit big-endian registers. Both are fixed-size after
//! construction and compare structurally, which is what the task identity
//! layer relies on for deduplication.

use bytes::Bytes;

use crate::error::CodecError;

/// Ordered, fixed-length sequence of booleans.
///
/// Bit 0 is the least-significant bit of the first conceptual register.
/// Storage is packed LSB-first, matching the coil layout on the wire (bit 0
/// of byte 0 is the first coil). Unused trailing bits are kept zero so the
/// derived structural equality and hashing hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitArray {
    bytes: Vec<u8>,
    len: usize,
}

impl BitArray {
    /// Build from individual bit values.
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut bytes = vec![0u8; bits.len().div_ceil(8)];
        for (i, bit) in bits.iter().enumerate() {
            if *bit {
                bytes[i / 8] |= 1 << (i % 8);
            }
        }
        Self {
            bytes,
            len: bits.len(),
        }
    }

    /// Single-bit array, the payload shape of a single-coil write.
    pub fn single(bit: bool) -> Self {
        Self::from_bits(&[bit])
    }

    /// Build from wire-format packed bytes and an explicit bit count.
    ///
    /// Trailing padding bits beyond `len` are masked off.
    pub fn from_packed(bytes: &[u8], len: usize) -> Result<Self, CodecError> {
        if len > bytes.len() * 8 {
            return Err(CodecError::PackedLengthMismatch {
                len,
                available: bytes.len(),
            });
        }
        let mut bytes = bytes[..len.div_ceil(8)].to_vec();
        if len % 8 != 0 {
            if let Some(last) = bytes.last_mut() {
                *last &= (1u16 << (len % 8)).wrapping_sub(1) as u8;
            }
        }
        Ok(Self { bytes, len })
    }

    /// Bit at `index`.
    pub fn get(&self, index: usize) -> Result<bool, CodecError> {
        if index >= self.len {
            return Err(CodecError::BitIndexOutOfRange {
                index,
                len: self.len,
            });
        }
        Ok((self.bytes[index / 8] >> (index % 8)) & 1 != 0)
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate bits in index order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| (self.bytes[i / 8] >> (i % 8)) & 1 != 0)
    }

    /// Wire-format packed bytes, LSB-first within each byte.
    pub fn as_packed(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Display for BitArray {
    /// Renders as a 0/1 string in bit-index order, e.g. `10010000`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for bit in self.iter() {
            write!(f, "{}", u8::from(bit))?;
        }
        Ok(())
    }
}

/// Ordered, fixed-length sequence of 16-bit registers.
///
/// Backed by a contiguous big-endian byte buffer, two bytes per register
/// with the high byte first. `len() * 2 == as_bytes().len()` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegisterArray {
    bytes: Bytes,
}

impl RegisterArray {
    /// Build from register values.
    pub fn from_registers(registers: &[u16]) -> Self {
        let mut bytes = Vec::with_capacity(registers.len() * 2);
        for register in registers {
            bytes.extend_from_slice(&register.to_be_bytes());
        }
        Self {
            bytes: Bytes::from(bytes),
        }
    }

    /// Build from a raw big-endian byte buffer. Odd lengths are rejected at
    /// construction.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CodecError> {
        if bytes.len() % 2 != 0 {
            return Err(CodecError::OddByteCount(bytes.len()));
        }
        Ok(Self {
            bytes: Bytes::from(bytes),
        })
    }

    /// Register value at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<u16> {
        let offset = index.checked_mul(2)?;
        if offset + 2 > self.bytes.len() {
            return None;
        }
        Some(u16::from_be_bytes([
            self.bytes[offset],
            self.bytes[offset + 1],
        ]))
    }

    /// Number of registers.
    pub fn len(&self) -> usize {
        self.bytes.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw big-endian byte buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Iterate register values in index order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}

impl From<&[u16]> for RegisterArray {
    fn from(registers: &[u16]) -> Self {
        Self::from_registers(registers)
    }
}

impl std::fmt::Display for RegisterArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode_upper(&self.bytes))
    }
}
