//! Compact 16-bit encoding of `[0,1)` used for matrix cells and gossip
//! payloads.
//!
//! A 1-bit range selector plus a 15-bit value span two complementary
//! intervals:
//!
//! - range 0 covers `[0, 31/32)` linearly,
//! - range 1 covers `[31/32, 1)` linearly with finer granularity.
//!
//! The conversions to and from [`Fixpoint32`] trade the smallest possible
//! approximation error for pure shift arithmetic; the loss is at most one
//! encoding step in the applicable range. Because both the range bit and
//! the value grow monotonically with the encoded integer, the numeric
//! maximum of two encodings is their bitwise integer maximum.

use crate::Fixpoint32;

/// Fixed-point boundary between the two encoding ranges: 31/32 of full
/// scale.
const RANGE_SPLIT: u32 = 0xf800_0000;

/// A number in `[0,1)` packed into 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fractional16(u16);

impl Fractional16 {
    /// Storage size of one encoded cell, in bytes.
    pub const SIZE: usize = 2;

    /// The largest encodable value.
    pub const MAX: Self = Self(0xffff);

    /// Reinterpret raw bits.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// The raw bit pattern.
    pub const fn to_bits(self) -> u16 {
        self.0
    }

    /// The range selector, 0 or 1.
    const fn range(self) -> u16 {
        self.0 >> 15
    }

    /// The 15-bit value within the selected range.
    const fn value(self) -> u16 {
        self.0 & 0x7fff
    }

    /// Truncating conversion from the 32-bit representation.
    pub fn from_fixpoint(fix: Fixpoint32) -> Self {
        let bits = fix.to_bits();
        if bits < RANGE_SPLIT {
            Self((bits >> 17) as u16)
        } else {
            Self(0x8000 | (((bits - RANGE_SPLIT) >> 12) as u16))
        }
    }

    /// Widening conversion back to the 32-bit representation.
    pub fn to_fixpoint(self) -> Fixpoint32 {
        let value = u32::from(self.value());
        if self.range() == 0 {
            Fixpoint32::from_bits(value << 17)
        } else {
            Fixpoint32::from_bits(RANGE_SPLIT | (value << 12))
        }
    }

    /// The larger of two encodings.
    ///
    /// Bitwise-equivalent to the numeric maximum: range 1 always compares
    /// greater than range 0, and within a range the value is monotone.
    pub fn max(self, other: Self) -> Self {
        if self.0 < other.0 {
            other
        } else {
            self
        }
    }

    /// Little-endian wire bytes.
    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    /// Decode from little-endian wire bytes.
    pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }
}
