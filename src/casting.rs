//! Utilities for casting floating point values to integers.
use crate::element::{DataElement, Scalar};
use crate::error::{ArrayError, Result};
use crate::floating::{floor_exact, IeeeFloat};
use crate::typedef::{DataType, Kind};
use log::warn;

/// The smallest and largest finite values of a collection.
///
/// Integer collections have `Int` bounds, floating point ones have
/// `Float` bounds. An empty range is `(+inf, -inf)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiniteRange {
    /// Smallest finite value.
    pub min: Scalar,
    /// Largest finite value.
    pub max: Scalar,
}

impl FiniteRange {
    /// The range of a collection without finite values.
    pub fn empty() -> Self {
        FiniteRange {
            min: Scalar::Float(f64::INFINITY),
            max: Scalar::Float(f64::NEG_INFINITY),
        }
    }

    /// Whether no finite value was found.
    pub fn is_empty(&self) -> bool {
        self.min.as_f64() > self.max.as_f64()
    }
}

/// Compute the range of the finite values in `values`, ignoring NaN and
/// infinities.
///
/// # Errors
///
/// - `UnsupportedDataType` for complex elements.
///
/// ```
/// use fileslice::casting::finite_range;
/// use fileslice::Scalar;
///
/// let range = finite_range(&[3f32, f32::NAN, -1., f32::INFINITY])?;
/// assert_eq!(range.min, Scalar::Float(-1.));
/// assert_eq!(range.max, Scalar::Float(3.));
/// # Ok::<(), fileslice::ArrayError>(())
/// ```
pub fn finite_range<'a, T, I>(values: I) -> Result<FiniteRange>
where
    T: DataElement,
    I: IntoIterator<Item = &'a T>,
{
    match T::DATA_TYPE.kind() {
        Kind::SignedInt | Kind::UnsignedInt => {
            let mut bounds: Option<(i128, i128)> = None;
            for v in values {
                if let Scalar::Int(v) = v.to_scalar() {
                    bounds = Some(match bounds {
                        None => (v, v),
                        Some((mn, mx)) => (mn.min(v), mx.max(v)),
                    });
                }
            }
            Ok(bounds.map_or_else(FiniteRange::empty, |(mn, mx)| FiniteRange {
                min: Scalar::Int(mn),
                max: Scalar::Int(mx),
            }))
        }
        Kind::Float => {
            let (mut mn, mut mx) = (f64::INFINITY, f64::NEG_INFINITY);
            for v in values {
                let v = v.to_scalar().as_f64();
                if v.is_finite() {
                    mn = mn.min(v);
                    mx = mx.max(v);
                }
            }
            Ok(FiniteRange {
                min: Scalar::Float(mn),
                max: Scalar::Float(mx),
            })
        }
        Kind::Complex | Kind::Opaque => Err(ArrayError::UnsupportedDataType(T::DATA_TYPE)),
    }
}

/// The range of values shared by the integer type `target` and the float
/// type `F`: every value of `F` within it casts to `target` without
/// overflow.
///
/// Floating point targets give `(-inf, inf)`.
///
/// # Errors
///
/// - `UnsupportedDataType` for complex and opaque targets.
pub fn shared_range<F: IeeeFloat>(target: DataType) -> Result<(F, F)> {
    match target.int_range() {
        Some((mn, mx)) => Ok((floor_exact(mn), floor_exact(mx))),
        None if target.kind() == Kind::Float => Ok((F::neg_infinity(), F::infinity())),
        None => Err(ArrayError::UnsupportedDataType(target)),
    }
}

/// The float values to clip to before casting to the integer type
/// `target`, so that the cast stays within its range.
pub fn clippers<F: IeeeFloat>(target: DataType) -> Result<(F, F)> {
    shared_range(target)
}

/// What to do with NaN when casting to an integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NanPolicy {
    /// NaN becomes zero.
    ToZero,
    /// NaN is cast as is, with a warning. Casting NaN to an integer
    /// yields zero.
    Cast,
    /// NaN is an error.
    Error,
}

impl Default for NanPolicy {
    fn default() -> Self {
        NanPolicy::ToZero
    }
}

/// Rounds floating point values to the nearest value of an integer type,
/// saturating at its bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntRounder {
    min: f64,
    max: f64,
    nan_policy: NanPolicy,
}

impl IntRounder {
    /// Create a rounder to the integer type `target`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedDataType` if `target` is not an integer type.
    pub fn new(target: DataType, nan_policy: NanPolicy) -> Result<Self> {
        if !target.is_integer() {
            return Err(ArrayError::UnsupportedDataType(target));
        }
        let (min, max) = clippers::<f64>(target)?;
        Ok(IntRounder {
            min,
            max,
            nan_policy,
        })
    }

    /// Round a single value, with ties to even.
    ///
    /// # Errors
    ///
    /// - `Rounding` on NaN with `NanPolicy::Error`.
    pub fn round(&self, v: f64) -> Result<i128> {
        if v.is_nan() {
            return match self.nan_policy {
                NanPolicy::Error => Err(ArrayError::Rounding),
                NanPolicy::ToZero | NanPolicy::Cast => Ok(0),
            };
        }
        Ok(v.round_ties_even().max(self.min).min(self.max) as i128)
    }
}

/// Round floating point values to the integer type `target`. Infinities
/// become the bounds of the type.
///
/// # Errors
///
/// - `Rounding` if there are NaNs and the policy is `NanPolicy::Error`.
/// - `UnsupportedDataType` if `target` is not an integer type.
///
/// ```
/// use fileslice::casting::{nice_round, NanPolicy};
/// use fileslice::{DataType, Scalar};
///
/// let values = [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 1.1, 6.6];
/// let rounded = nice_round(&values, DataType::Int16, NanPolicy::ToZero)?;
/// assert_eq!(
///     rounded,
///     [0, 32767, -32768, 1, 7].iter().map(|&v| Scalar::Int(v)).collect::<Vec<_>>()
/// );
/// # Ok::<(), fileslice::ArrayError>(())
/// ```
pub fn nice_round(values: &[f64], target: DataType, nan_policy: NanPolicy) -> Result<Vec<Scalar>> {
    let rounder = IntRounder::new(target, nan_policy)?;
    if values.iter().any(|v| v.is_nan()) {
        match nan_policy {
            NanPolicy::Error => return Err(ArrayError::Rounding),
            NanPolicy::Cast => warn!("casting NaN to {:?}", target),
            NanPolicy::ToZero => {}
        }
    }
    values
        .iter()
        .map(|&v| rounder.round(v).map(Scalar::Int))
        .collect()
}
