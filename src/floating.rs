//! Working with IEEE 754 floating point values bit by bit.
//!
//! The main entry point is [`floor_exact`], which finds the integer nearest
//! to a given one, towards zero, that a floating point type represents
//! exactly. This is what makes it possible to clip values to an integer
//! range before casting without the bounds themselves rounding outwards.
use num_traits::Float;
use std::fmt::Debug;

/// The bit layout of a binary floating point format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FloatFormat {
    /// Number of stored significand bits, not counting the leading bit.
    pub nmant: u32,
    /// Number of exponent bits.
    pub nexp: u32,
    /// Whether the leading significand bit is stored, as in the x87
    /// extended format.
    pub explicit_leading_bit: bool,
}

/// The sign, significand and exponent of a floating point value.
///
/// The significand excludes the leading bit, so the value of a normal
/// number is `(1 + significand / 2^nmant) * 2^exponent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FloatParts {
    /// Whether the sign bit is set.
    pub negative: bool,
    /// The significand bits, without the leading bit.
    pub significand: u128,
    /// The unbiased exponent.
    pub exponent: i32,
}

fn mask(nbits: u32) -> u128 {
    (1u128 << nbits) - 1
}

impl FloatFormat {
    /// IEEE 754 binary32.
    pub const SINGLE: FloatFormat = FloatFormat {
        nmant: 23,
        nexp: 8,
        explicit_leading_bit: false,
    };

    /// IEEE 754 binary64.
    pub const DOUBLE: FloatFormat = FloatFormat {
        nmant: 52,
        nexp: 11,
        explicit_leading_bit: false,
    };

    /// Intel 80-bit extended precision.
    pub const EXTENDED80: FloatFormat = FloatFormat {
        nmant: 63,
        nexp: 15,
        explicit_leading_bit: true,
    };

    /// The exponent bias.
    pub fn bias(&self) -> i32 {
        (1 << (self.nexp - 1)) - 1
    }

    /// The smallest exponent of a normal number.
    pub fn minexp(&self) -> i32 {
        1 - self.bias()
    }

    /// The smallest power of two that overflows the format.
    pub fn maxexp(&self) -> i32 {
        self.bias() + 1
    }

    /// Total width of the format, in bits.
    pub fn bits(&self) -> u32 {
        1 + self.nexp + self.nmant + self.explicit_leading_bit as u32
    }

    fn mant_bits(&self) -> u32 {
        self.nmant + self.explicit_leading_bit as u32
    }

    /// Split the raw bits of a value in this format into its parts.
    pub fn parts_from_bits(&self, bits: u128) -> FloatParts {
        let significand = bits & mask(self.nmant);
        let rest = bits >> self.mant_bits();
        let biased = (rest & mask(self.nexp)) as i32;
        FloatParts {
            negative: (rest >> self.nexp) & 1 == 1,
            significand,
            exponent: biased - self.bias(),
        }
    }

    /// Assemble the raw bits of a value in this format from its parts.
    ///
    /// The significand is truncated to `nmant` bits and the biased exponent
    /// to `nexp` bits.
    pub fn bits_from_parts(&self, parts: &FloatParts) -> u128 {
        let biased = (i64::from(parts.exponent) + i64::from(self.bias())) as u128 & mask(self.nexp);
        let mut bits = (biased << self.mant_bits()) | (parts.significand & mask(self.nmant));
        if self.explicit_leading_bit && biased != 0 {
            bits |= 1 << self.nmant;
        }
        if parts.negative {
            bits |= 1 << (self.mant_bits() + self.nexp);
        }
        bits
    }
}

/// A native IEEE 754 floating point type.
pub trait IeeeFloat: Float + Debug {
    /// The layout of this type.
    const FORMAT: FloatFormat;

    /// The raw bits of this value.
    fn to_bits_u128(self) -> u128;

    /// A value from its raw bits.
    fn from_bits_u128(bits: u128) -> Self;

    /// The nearest value to an integer.
    fn from_u128(v: u128) -> Self;

    /// The integer part of a non-negative value, saturating.
    fn trunc_u128(self) -> u128;

    /// The sign, significand and exponent of this value.
    fn parts_from_val(self) -> FloatParts {
        Self::FORMAT.parts_from_bits(self.to_bits_u128())
    }

    /// The value with the given sign, significand and exponent.
    fn val_from_parts(parts: &FloatParts) -> Self {
        Self::from_bits_u128(Self::FORMAT.bits_from_parts(parts))
    }
}

impl IeeeFloat for f32 {
    const FORMAT: FloatFormat = FloatFormat::SINGLE;

    fn to_bits_u128(self) -> u128 {
        u128::from(self.to_bits())
    }

    fn from_bits_u128(bits: u128) -> Self {
        f32::from_bits(bits as u32)
    }

    fn from_u128(v: u128) -> Self {
        v as f32
    }

    fn trunc_u128(self) -> u128 {
        self as u128
    }
}

impl IeeeFloat for f64 {
    const FORMAT: FloatFormat = FloatFormat::DOUBLE;

    fn to_bits_u128(self) -> u128 {
        u128::from(self.to_bits())
    }

    fn from_bits_u128(bits: u128) -> Self {
        f64::from_bits(bits as u64)
    }

    fn from_u128(v: u128) -> Self {
        v as f64
    }

    fn trunc_u128(self) -> u128 {
        self as u128
    }
}

/// The next exact integer towards zero from the integral value `val`.
///
/// This is `val ∓ 1` where the type represents it, and otherwise the
/// next float towards zero, found by decrementing the significand.
///
/// ```
/// use fileslice::floating::step_towards_zero;
///
/// assert_eq!(step_towards_zero(3f32), 2.);
/// assert_eq!(step_towards_zero(16_777_216f32), 16_777_215.);
/// assert_eq!(step_towards_zero(16_777_218f32), 16_777_216.);
/// ```
pub fn step_towards_zero<F: IeeeFloat>(val: F) -> F {
    if val == F::zero() {
        return val;
    }
    let step = if val > F::zero() { F::one() } else { -F::one() };
    let next = val - step;
    if next != val {
        return next;
    }
    let mut parts = val.parts_from_val();
    if parts.significand == 0 {
        parts.significand = mask(F::FORMAT.nmant);
        parts.exponent -= 1;
    } else {
        parts.significand -= 1;
    }
    F::val_from_parts(&parts)
}

/// The nearest integer to `val`, towards zero, that is exactly
/// representable in `F`. Equal to `val` if `val` is already representable.
///
/// The value is passed as an integer because converting a large integer to
/// a float may round it up.
///
/// ```
/// use fileslice::floor_exact;
///
/// assert_eq!(floor_exact::<f32>(2), 2.);
/// assert_eq!(floor_exact::<f32>((1 << 24) - 1), 16_777_215.);
/// assert_eq!(floor_exact::<f32>((1 << 24) + 1), 16_777_216.);
/// assert_eq!(floor_exact::<f64>(i64::MAX.into()), 9_223_372_036_854_774_784.);
/// ```
pub fn floor_exact<F: IeeeFloat>(val: i128) -> F {
    let aval = val.unsigned_abs();
    let mut faval = F::from_u128(aval);
    if faval.trunc_u128() > aval {
        // the conversion rounded up
        faval = step_towards_zero(faval);
    }
    if val < 0 {
        -faval
    } else {
        faval
    }
}

/// A value in the Intel 80-bit extended precision format, held by its
/// bits. Arithmetic is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extended80 {
    bits: u128,
}

impl Extended80 {
    /// A value from its raw bits. Bits above the 80th are ignored.
    pub fn from_bits(bits: u128) -> Self {
        Extended80 {
            bits: bits & mask(80),
        }
    }

    /// The raw bits of this value.
    pub fn to_bits(self) -> u128 {
        self.bits
    }

    /// The value with the given sign, significand and exponent.
    pub fn from_parts(parts: &FloatParts) -> Self {
        Extended80::from_bits(FloatFormat::EXTENDED80.bits_from_parts(parts))
    }

    /// The sign, significand and exponent of this value.
    pub fn parts(self) -> FloatParts {
        FloatFormat::EXTENDED80.parts_from_bits(self.bits)
    }

    /// Widen a double precision value, exactly.
    pub fn from_f64(val: f64) -> Self {
        let format = FloatFormat::EXTENDED80;
        let bits = val.to_bits();
        let negative = val.is_sign_negative();
        let biased = ((bits >> 52) & 0x7FF) as i32;
        let mant = bits & ((1 << 52) - 1);
        let parts = match biased {
            0 if mant == 0 => {
                let sign = if negative { 1u128 << 79 } else { 0 };
                return Extended80::from_bits(sign);
            }
            0 => {
                // subnormal in f64, normal in the wider format
                let top = 63 - mant.leading_zeros() as i32;
                FloatParts {
                    negative,
                    significand: u128::from(mant << (63 - top)),
                    exponent: top - 1074,
                }
            }
            0x7FF => FloatParts {
                negative,
                significand: u128::from(mant) << 11,
                exponent: format.maxexp(),
            },
            _ => FloatParts {
                negative,
                significand: u128::from(mant) << 11,
                exponent: biased - FloatFormat::DOUBLE.bias(),
            },
        };
        Extended80::from_parts(&parts)
    }

    /// The 10 bytes of this value in little endian order.
    pub fn to_le_bytes(self) -> [u8; 10] {
        let mut out = [0; 10];
        out.copy_from_slice(&self.bits.to_le_bytes()[..10]);
        out
    }
}
