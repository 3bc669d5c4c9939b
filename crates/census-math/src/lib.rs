//! Census fixed-point numerics
//!
//! Deterministic, bounded-precision arithmetic for nodes without a floating
//! point unit. Three complementary representations cover the estimator's
//! needs:
//!
//! - [`Fixpoint32`]: a 32-bit fixed-point number in `[0,1)`, the working
//!   representation for samples and intermediate arithmetic.
//! - [`Fractional16`]: a compact 16-bit split-range encoding of `[0,1)`,
//!   the on-wire and in-matrix cell format.
//! - [`Fractional48`]: a normalized mantissa/exponent pair that can
//!   accumulate products of hundreds of `[0,1)` factors without
//!   underflowing to zero.
//!
//! All conversions are deterministic shifts and divisions, so two nodes
//! running the same inputs produce bit-identical results.
//!
//! # Rational approximation
//!
//! [`Fixpoint32::to_coprime_fraction`] recovers the best bounded-denominator
//! rational for a fixed-point value via a Stern-Brocot mediant walk. The
//! denominator bound is [`NETWORK_MAX_SIZE`], the largest network the
//! estimator is dimensioned for.

mod fixpoint;
mod fractional16;
mod fractional48;

pub use fixpoint::{CoprimeFraction, Fixpoint32};
pub use fractional16::Fractional16;
pub use fractional48::Fractional48;

/// Largest network size the numeric substrate is dimensioned for.
///
/// Bounds the denominator of [`CoprimeFraction`] and, doubled, the domain
/// of [`Fixpoint32::from_fraction`].
pub const NETWORK_MAX_SIZE: u16 = 1024;

// The shift-based fraction approximation in `from_fraction` is exact only
// for numerators below 2^11; the doubled network bound must stay inside it.
const _: () = assert!(NETWORK_MAX_SIZE as u32 * 2 <= 2048);
