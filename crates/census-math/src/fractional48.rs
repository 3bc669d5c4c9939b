//! Normalized floating accumulator for long products of `[0,1)` factors.
//!
//! Multiplying a hundred fixed-point samples together underflows any
//! fixed-width representation. [`Fractional48`] keeps a 32-bit mantissa
//! with its top bit always set plus a signed power-of-two exponent, so the
//! product of an entire matrix column survives with full leading
//! precision. The canonical zero is mantissa 0, exponent 0.

use crate::Fixpoint32;

/// A nonnegative value `mantissa / 2^32 * 2^exp` with a normalized
/// mantissa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fractional48 {
    mantissa: u32,
    exp: i16,
}

impl Fractional48 {
    /// The canonical zero.
    pub const ZERO: Self = Self { mantissa: 0, exp: 0 };

    /// Normalize a fixed-point value: shift the mantissa left until its
    /// top bit is set, decrementing the exponent per shift.
    pub fn from_fixpoint(fix: Fixpoint32) -> Self {
        let mut mantissa = fix.to_bits();
        let mut exp = 0i16;
        if mantissa != 0 {
            while mantissa & 0x8000_0000 == 0 {
                mantissa <<= 1;
                exp -= 1;
            }
        }
        Self { mantissa, exp }
    }

    /// The normalized mantissa; top bit set unless the value is zero.
    pub const fn mantissa(self) -> u32 {
        self.mantissa
    }

    /// The power-of-two exponent.
    pub const fn exponent(self) -> i16 {
        self.exp
    }

    /// Whether this is the canonical zero.
    pub const fn is_zero(self) -> bool {
        self.mantissa == 0
    }

    /// Multiply in place by a fixed-point factor, renormalizing.
    ///
    /// The 64-bit product is shifted back into the mantissa range: right
    /// with an exponent rebase of 32 when it overflows 32 bits, left until
    /// the top bit is set when it does not.
    pub fn mul_fixpoint(&mut self, fix: Fixpoint32) {
        if self.mantissa == 0 {
            assert_eq!(self.exp, 0, "denormalized zero");
        } else {
            assert!(self.mantissa & 0x8000_0000 != 0, "denormalized mantissa");
        }

        let mut product = u64::from(self.mantissa) * u64::from(fix.to_bits());

        if product == 0 {
            *self = Self::ZERO;
        } else if product > u64::from(u32::MAX) {
            self.exp -= 32;
            while product > u64::from(u32::MAX) {
                product >>= 1;
                self.exp += 1;
            }
            self.mantissa = product as u32;
        } else {
            self.mantissa = product as u32;
            while self.mantissa & 0x8000_0000 == 0 {
                self.mantissa <<= 1;
                self.exp -= 1;
            }
        }
    }

    /// The value as a double, for off-node aggregation and tests.
    pub fn to_f64(self) -> f64 {
        (self.mantissa as f64 / 4_294_967_296.0) * (self.exp as f64).exp2()
    }

    /// Natural logarithm, defined for nonzero values.
    pub fn ln(self) -> f64 {
        assert!(!self.is_zero(), "logarithm of zero");
        (self.mantissa as f64 / 4_294_967_296.0).ln() + f64::from(self.exp) * std::f64::consts::LN_2
    }
}

impl std::fmt::Display for Fractional48 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}.{}", self.mantissa, self.exp)
    }
}
