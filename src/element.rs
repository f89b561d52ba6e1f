//! This module defines the data element API, which enables the crate to
//! read, write and convert the elements of stored arrays.
//!
//! Every supported primitive type implements [`DataElement`]. Conversions
//! between element types go through [`Scalar`], a lossless intermediate
//! for all supported integer and floating point values.
use crate::error::{ArrayError, Result};
use crate::typedef::{DataType, ElementType, Kind};
use byteordered::{ByteOrdered, Endianness};
use num_complex::Complex;
use num_traits::cast::AsPrimitive;
use std::io::{Read, Write};
use std::mem::size_of;
use std::ops::{Add, Mul};

/// An element value in a type-independent representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// Any integer value of a supported integer type, exactly.
    Int(i128),
    /// A real floating point value.
    Float(f64),
    /// A complex value.
    Complex(Complex<f64>),
}

impl Scalar {
    /// The real value as an `f64`, possibly rounded.
    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Int(v) => v as f64,
            Scalar::Float(v) => v,
            Scalar::Complex(c) => c.re,
        }
    }

    /// Whether the value is finite. Integers always are.
    pub fn is_finite(self) -> bool {
        match self {
            Scalar::Int(_) => true,
            Scalar::Float(v) => v.is_finite(),
            Scalar::Complex(c) => c.re.is_finite() && c.im.is_finite(),
        }
    }
}

/// Interface for linear (affine) transformations to values. Multiple
/// implementations are needed because the original type `T` may not have
/// enough precision to obtain an appropriate outcome. For example,
/// transforming a `u8` is done through `f64` and converted back, but a
/// complex number is instead manipulated through its own type.
pub trait LinearTransform<T: 'static + Copy> {
    /// Linearly transform a value with the given slope and intercept.
    fn linear_transform(value: T, slope: f64, intercept: f64) -> T;

    /// Linearly transform a sequence of values inline, with the given slope and intercept.
    fn linear_transform_many_inline<'a, I>(values: I, slope: f64, intercept: f64)
    where
        I: IntoIterator<Item = &'a mut T>,
    {
        for v in values {
            *v = Self::linear_transform(*v, slope, intercept);
        }
    }
}

/// A linear transformation in which the value and parameters are converted to
/// `f64` for the affine transformation, then converted to the original type.
/// Integer results saturate at the bounds of the type.
#[derive(Debug)]
pub struct LinearTransformViaF64;

impl<T> LinearTransform<T> for LinearTransformViaF64
where
    T: 'static + Copy + AsPrimitive<f64>,
    f64: AsPrimitive<T>,
{
    fn linear_transform(value: T, slope: f64, intercept: f64) -> T {
        (value.as_() * slope + intercept).as_()
    }
}

/// A linear transformation in which the slope and intercept parameters are
/// converted to the value's type for the affine transformation. Ideal
/// for high precision or complex number types.
#[derive(Debug)]
pub struct LinearTransformViaOriginal;

impl<T> LinearTransform<T> for LinearTransformViaOriginal
where
    T: DataElement + Mul<Output = T> + Add<Output = T>,
{
    fn linear_transform(value: T, slope: f64, intercept: f64) -> T {
        let slope = T::from_scalar(Scalar::Float(slope));
        let intercept = T::from_scalar(Scalar::Float(intercept));
        value * slope + intercept
    }
}

/// Trait type for characterizing a data element, implemented for
/// primitive numeric types which are used by the crate to represent
/// array values.
pub trait DataElement: 'static + Sized + Copy + PartialEq + std::fmt::Debug {
    /// The data type mapped to the type T
    const DATA_TYPE: DataType;

    /// For defining how this element is linearly transformed to another.
    type Transform: LinearTransform<Self>;

    /// Read a single element from the given byte source.
    fn from_raw<R: Read>(src: R, endianness: Endianness) -> Result<Self>;

    /// Transform the given data vector into a vector of data elements.
    fn from_raw_vec(vec: Vec<u8>, endianness: Endianness) -> Result<Vec<Self>> {
        let n = vec.len() / size_of::<Self>();
        let mut cursor: &[u8] = &vec;
        (0..n)
            .map(|_| Self::from_raw(&mut cursor, endianness))
            .collect()
    }

    /// Write this element to the given byte sink.
    fn write_raw<W: Write>(self, dst: W, endianness: Endianness) -> Result<()>;

    /// Convert this element to its type-independent representation.
    fn to_scalar(self) -> Scalar;

    /// Convert a scalar to this element type. Out of range integers
    /// saturate, NaN becomes zero for integer types, and the imaginary
    /// part is dropped for real types.
    fn from_scalar(value: Scalar) -> Self;
}

macro_rules! impl_int_element {
    ($t: ty, $data_type: ident, $read: ident, $write: ident) => {
        impl DataElement for $t {
            const DATA_TYPE: DataType = DataType::$data_type;
            type Transform = LinearTransformViaF64;

            fn from_raw<R: Read>(src: R, e: Endianness) -> Result<Self> {
                ByteOrdered::runtime(src, e).$read().map_err(From::from)
            }

            fn from_raw_vec(vec: Vec<u8>, e: Endianness) -> Result<Vec<Self>> {
                let mut values: Vec<$t> = bytemuck::allocation::pod_collect_to_vec(&vec);
                if e != Endianness::native() {
                    for v in &mut values {
                        *v = v.swap_bytes();
                    }
                }
                Ok(values)
            }

            fn write_raw<W: Write>(self, dst: W, e: Endianness) -> Result<()> {
                ByteOrdered::runtime(dst, e).$write(self).map_err(From::from)
            }

            fn to_scalar(self) -> Scalar {
                Scalar::Int(i128::from(self))
            }

            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Int(v) => {
                        v.max(i128::from(<$t>::MIN)).min(i128::from(<$t>::MAX)) as $t
                    }
                    Scalar::Float(v) => v as $t,
                    Scalar::Complex(c) => c.re as $t,
                }
            }
        }
    };
}

impl_int_element!(u8, Uint8, read_u8, write_u8);
impl_int_element!(i8, Int8, read_i8, write_i8);
impl_int_element!(u16, Uint16, read_u16, write_u16);
impl_int_element!(i16, Int16, read_i16, write_i16);
impl_int_element!(u32, Uint32, read_u32, write_u32);
impl_int_element!(i32, Int32, read_i32, write_i32);
impl_int_element!(u64, Uint64, read_u64, write_u64);
impl_int_element!(i64, Int64, read_i64, write_i64);

macro_rules! impl_float_element {
    ($t: ty, $data_type: ident, $transform: ty, $read: ident, $write: ident) => {
        impl DataElement for $t {
            const DATA_TYPE: DataType = DataType::$data_type;
            type Transform = $transform;

            fn from_raw<R: Read>(src: R, e: Endianness) -> Result<Self> {
                ByteOrdered::runtime(src, e).$read().map_err(From::from)
            }

            fn from_raw_vec(vec: Vec<u8>, e: Endianness) -> Result<Vec<Self>> {
                let mut values: Vec<$t> = bytemuck::allocation::pod_collect_to_vec(&vec);
                if e != Endianness::native() {
                    for v in &mut values {
                        *v = <$t>::from_bits(v.to_bits().swap_bytes());
                    }
                }
                Ok(values)
            }

            fn write_raw<W: Write>(self, dst: W, e: Endianness) -> Result<()> {
                ByteOrdered::runtime(dst, e).$write(self).map_err(From::from)
            }

            fn to_scalar(self) -> Scalar {
                Scalar::Float(f64::from(self))
            }

            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Int(v) => v as $t,
                    Scalar::Float(v) => v as $t,
                    Scalar::Complex(c) => c.re as $t,
                }
            }
        }
    };
}

impl_float_element!(f32, Float32, LinearTransformViaF64, read_f32, write_f32);
impl_float_element!(f64, Float64, LinearTransformViaOriginal, read_f64, write_f64);

macro_rules! impl_complex_element {
    ($t: ty, $data_type: ident, $read: ident, $write: ident) => {
        impl DataElement for Complex<$t> {
            const DATA_TYPE: DataType = DataType::$data_type;
            type Transform = LinearTransformViaOriginal;

            fn from_raw<R: Read>(src: R, e: Endianness) -> Result<Self> {
                let mut src = ByteOrdered::runtime(src, e);
                let re = src.$read()?;
                let im = src.$read()?;
                Ok(Complex::new(re, im))
            }

            fn write_raw<W: Write>(self, dst: W, e: Endianness) -> Result<()> {
                let mut dst = ByteOrdered::runtime(dst, e);
                dst.$write(self.re)?;
                dst.$write(self.im)?;
                Ok(())
            }

            fn to_scalar(self) -> Scalar {
                Scalar::Complex(Complex::new(f64::from(self.re), f64::from(self.im)))
            }

            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Int(v) => Complex::new(v as $t, 0.),
                    Scalar::Float(v) => Complex::new(v as $t, 0.),
                    Scalar::Complex(c) => Complex::new(c.re as $t, c.im as $t),
                }
            }
        }
    };
}

impl_complex_element!(f32, Complex64, read_f32, write_f32);
impl_complex_element!(f64, Complex128, read_f64, write_f64);

/// Decode raw bytes of the given stored element type into elements of type
/// `T`.
///
/// When `T` is the stored data type, the values are reinterpreted
/// bit for bit (after any byte swap). Otherwise each value is converted
/// numerically.
///
/// # Errors
///
/// - `UnsupportedDataType` if the stored type is opaque.
/// - `IncompatibleElementType` if complex values are requested as reals.
pub fn decode_values<T>(raw: Vec<u8>, stored: ElementType) -> Result<Vec<T>>
where
    T: DataElement,
{
    if stored.kind() == Kind::Complex && T::DATA_TYPE.kind() != Kind::Complex {
        return Err(ArrayError::IncompatibleElementType(
            stored.data_type,
            T::DATA_TYPE,
        ));
    }
    let e = stored.endianness;
    match stored.data_type {
        DataType::Uint8 => convert_vec::<u8, T>(raw, e),
        DataType::Int8 => convert_vec::<i8, T>(raw, e),
        DataType::Uint16 => convert_vec::<u16, T>(raw, e),
        DataType::Int16 => convert_vec::<i16, T>(raw, e),
        DataType::Uint32 => convert_vec::<u32, T>(raw, e),
        DataType::Int32 => convert_vec::<i32, T>(raw, e),
        DataType::Uint64 => convert_vec::<u64, T>(raw, e),
        DataType::Int64 => convert_vec::<i64, T>(raw, e),
        DataType::Float32 => convert_vec::<f32, T>(raw, e),
        DataType::Float64 => convert_vec::<f64, T>(raw, e),
        DataType::Complex64 => convert_vec::<Complex<f32>, T>(raw, e),
        DataType::Complex128 => convert_vec::<Complex<f64>, T>(raw, e),
        t @ DataType::Rgb24 | t @ DataType::Rgba32 => Err(ArrayError::UnsupportedDataType(t)),
    }
}

fn convert_vec<S, T>(raw: Vec<u8>, e: Endianness) -> Result<Vec<T>>
where
    S: DataElement,
    T: DataElement,
{
    if S::DATA_TYPE == T::DATA_TYPE {
        return T::from_raw_vec(raw, e);
    }
    Ok(S::from_raw_vec(raw, e)?
        .into_iter()
        .map(|v| T::from_scalar(v.to_scalar()))
        .collect())
}

/// Append the encoding of `value` as an element of `target` to `buf`.
pub(crate) fn write_scalar(buf: &mut Vec<u8>, value: Scalar, target: ElementType) -> Result<()> {
    let e = target.endianness;
    match target.data_type {
        DataType::Uint8 => u8::from_scalar(value).write_raw(buf, e),
        DataType::Int8 => i8::from_scalar(value).write_raw(buf, e),
        DataType::Uint16 => u16::from_scalar(value).write_raw(buf, e),
        DataType::Int16 => i16::from_scalar(value).write_raw(buf, e),
        DataType::Uint32 => u32::from_scalar(value).write_raw(buf, e),
        DataType::Int32 => i32::from_scalar(value).write_raw(buf, e),
        DataType::Uint64 => u64::from_scalar(value).write_raw(buf, e),
        DataType::Int64 => i64::from_scalar(value).write_raw(buf, e),
        DataType::Float32 => f32::from_scalar(value).write_raw(buf, e),
        DataType::Float64 => f64::from_scalar(value).write_raw(buf, e),
        DataType::Complex64 => Complex::<f32>::from_scalar(value).write_raw(buf, e),
        DataType::Complex128 => Complex::<f64>::from_scalar(value).write_raw(buf, e),
        t @ DataType::Rgb24 | t @ DataType::Rgba32 => Err(ArrayError::UnsupportedDataType(t)),
    }
}
