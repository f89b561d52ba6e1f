//! Utilities to write arrays to files, possibly in a narrower element
//! type.
//!
//! An [`ArrayWriter`] decides when it is created whether the values of an
//! array need to be scaled to fit the output type, and how. The scale and
//! intercept it picks must be recorded alongside the data (usually in the
//! image header) so that readers can restore the original values:
//! `value = stored * scale + inter`.
//!
//! The data is written one slab at a time along the slowest varying axis,
//! so that conversion buffers stay small.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, warn};
use ndarray::{ArrayBase, ArrayView, Axis, Data, Dimension};

use crate::casting::{finite_range, shared_range, FiniteRange, IntRounder, NanPolicy};
use crate::element::{write_scalar, DataElement, Scalar};
use crate::error::{ArrayError, Result};
use crate::header::ScalingParams;
use crate::typedef::{DataType, ElementType, Kind, MemoryOrder};
use crate::util::is_gz_file;

/// Which scaling parameters a writer may compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalingMode {
    /// No scaling: the values must already fit the output type.
    None,
    /// A scale factor only.
    Slope,
    /// A scale factor and an intercept.
    SlopeInter,
}

impl Default for ScalingMode {
    fn default() -> Self {
        ScalingMode::SlopeInter
    }
}

/// Writes an array in a given output element type, scaling it if needed.
///
/// # Example
///
/// ```
/// use fileslice::{ArrayWriter, DataType, ElementType, MemoryOrder, NanPolicy};
/// use ndarray::array;
///
/// let data = array![[-100i16, 0], [-50, -20]];
/// let writer = ArrayWriter::new(&data, ElementType::le(DataType::Uint8))?;
/// // all values are negative, so a sign flip makes them fit
/// assert_eq!((writer.scale(), writer.inter()), (-1., 0.));
/// let mut out = Vec::new();
/// writer.write_to(&mut out, MemoryOrder::RowMajor, NanPolicy::ToZero)?;
/// assert_eq!(out, vec![100, 0, 50, 20]);
/// # Ok::<(), fileslice::ArrayError>(())
/// ```
#[derive(Debug)]
pub struct ArrayWriter<'a, A, D>
where
    D: Dimension,
{
    array: ArrayView<'a, A, D>,
    target: ElementType,
    mode: ScalingMode,
    scaling: ScalingParams,
    has_finite: bool,
}

impl<'a, A, D> ArrayWriter<'a, A, D>
where
    A: DataElement,
    D: Dimension,
{
    /// Create a writer of `array` as elements of type `target`, computing
    /// a scale and an intercept if needed.
    pub fn new<S>(array: &'a ArrayBase<S, D>, target: ElementType) -> Result<Self>
    where
        S: Data<Elem = A>,
    {
        ArrayWriter::with_mode(array, target, ScalingMode::SlopeInter)
    }

    /// Create a writer of `array` as elements of type `target`, computing
    /// scaling parameters as allowed by `mode`.
    ///
    /// # Errors
    ///
    /// - `Writer` if the conversion is impossible, if scaling is needed but
    ///   `mode` is `ScalingMode::None`, or if the scaling found is not
    ///   finite.
    /// - `Range` if a scale alone cannot map values of both signs to an
    ///   unsigned type.
    pub fn with_mode<S>(
        array: &'a ArrayBase<S, D>,
        target: ElementType,
        mode: ScalingMode,
    ) -> Result<Self>
    where
        S: Data<Elem = A>,
    {
        let array = array.view();
        let src = A::DATA_TYPE;
        let dst = target.data_type;
        if dst.kind() == Kind::Opaque && src != dst {
            return Err(ArrayError::Writer(format!("cannot convert {:?} to {:?}", src, dst)));
        }
        if src.kind() == Kind::Complex && dst.kind() != Kind::Complex {
            return Err(ArrayError::Writer(format!(
                "cannot convert complex {:?} to {:?}",
                src, dst
            )));
        }

        let mut has_finite = true;
        let scaling = if src.can_cast_losslessly(dst) || !dst.is_integer() {
            ScalingParams::identity()
        } else {
            let range = finite_range(array.iter())?;
            if range.is_empty() {
                has_finite = false;
                ScalingParams::identity()
            } else {
                calculate_scaling(&range, dst, mode)?
            }
        };
        debug!(
            "writing {:?} as {:?} with scale {} and intercept {}",
            src, target, scaling.scale, scaling.inter
        );
        Ok(ArrayWriter {
            array,
            target,
            mode,
            scaling,
            has_finite,
        })
    }

    /// The array to write.
    pub fn array(&self) -> &ArrayView<'a, A, D> {
        &self.array
    }

    /// The output element type.
    pub fn out_type(&self) -> ElementType {
        self.target
    }

    /// The scaling mode the writer was created with.
    pub fn mode(&self) -> ScalingMode {
        self.mode
    }

    /// The scale factor to record with the written data.
    pub fn scale(&self) -> f64 {
        self.scaling.scale
    }

    /// The intercept to record with the written data.
    pub fn inter(&self) -> f64 {
        self.scaling.inter
    }

    /// The scale and intercept to record with the written data.
    pub fn scaling(&self) -> ScalingParams {
        self.scaling
    }

    /// Write the array to `sink` in the given memory order.
    ///
    /// # Errors
    ///
    /// - `Rounding` if a NaN is written to an integer type with
    ///   `NanPolicy::Error`.
    /// - `Io` on write failures.
    pub fn write_to<W>(&self, mut sink: W, order: MemoryOrder, nan_policy: NanPolicy) -> Result<()>
    where
        W: Write,
    {
        let conversion = self.conversion(nan_policy)?;
        let data = self.array.view().into_dyn();
        // iterating the reversed axes in logical order walks column-major order
        let data = if order.is_column_major() {
            data.reversed_axes()
        } else {
            data
        };
        let mut buf = Vec::new();
        let mut nan_warned = false;
        if data.ndim() < 2 {
            self.encode(data.iter(), &conversion, &mut buf, &mut nan_warned)?;
            sink.write_all(&buf)?;
        } else {
            for slab in data.axis_iter(Axis(0)) {
                buf.clear();
                self.encode(slab.iter(), &conversion, &mut buf, &mut nan_warned)?;
                sink.write_all(&buf)?;
            }
        }
        Ok(())
    }

    fn conversion(&self, nan_policy: NanPolicy) -> Result<Conversion> {
        let src = A::DATA_TYPE;
        let dst = self.target.data_type;
        if src == dst {
            return Ok(Conversion::Direct);
        }
        if !dst.is_integer() {
            return Ok(Conversion::Cast);
        }
        if !self.has_finite {
            return Ok(Conversion::Zeros { nan_policy });
        }
        let ScalingParams { scale, inter } = self.scaling;
        let (min, max) = dst
            .int_range()
            .ok_or(ArrayError::UnsupportedDataType(dst))?;
        if src.is_integer()
            && scale.abs() == 1.
            && inter.fract() == 0.
            && inter.abs() < 2f64.powi(126)
        {
            return Ok(Conversion::ExactInt {
                flip: scale < 0.,
                inter: inter as i128,
                min,
                max,
            });
        }
        Ok(Conversion::Round {
            scaling: self.scaling,
            rounder: IntRounder::new(dst, nan_policy)?,
            nan_policy,
        })
    }

    fn encode<'b, I>(
        &self,
        values: I,
        conversion: &Conversion,
        buf: &mut Vec<u8>,
        nan_warned: &mut bool,
    ) -> Result<()>
    where
        I: IntoIterator<Item = &'b A>,
        A: 'b,
    {
        let target = self.target;
        let e = target.endianness;
        for &v in values {
            match *conversion {
                Conversion::Direct => v.write_raw(&mut *buf, e)?,
                Conversion::Cast => write_scalar(buf, v.to_scalar(), target)?,
                Conversion::Zeros { nan_policy } => {
                    if v.to_scalar().as_f64().is_nan() {
                        match nan_policy {
                            NanPolicy::Error => return Err(ArrayError::Rounding),
                            NanPolicy::Cast if !*nan_warned => {
                                warn!("casting NaN to {:?}, written as 0", target.data_type);
                                *nan_warned = true;
                            }
                            _ => {}
                        }
                    }
                    write_scalar(buf, Scalar::Int(0), target)?;
                }
                Conversion::ExactInt {
                    flip,
                    inter,
                    min,
                    max,
                } => {
                    let v = match v.to_scalar() {
                        Scalar::Int(v) => v,
                        other => other.as_f64() as i128,
                    };
                    let stored = if flip { inter - v } else { v - inter };
                    write_scalar(buf, Scalar::Int(stored.max(min).min(max)), target)?;
                }
                Conversion::Round {
                    scaling,
                    rounder,
                    nan_policy,
                } => {
                    let x = (v.to_scalar().as_f64() - scaling.inter) / scaling.scale;
                    if x.is_nan() && nan_policy == NanPolicy::Cast && !*nan_warned {
                        warn!("casting NaN to {:?}, written as 0", target.data_type);
                        *nan_warned = true;
                    }
                    write_scalar(buf, Scalar::Int(rounder.round(x)?), target)?;
                }
            }
        }
        Ok(())
    }
}

/// How each element is converted on write.
#[derive(Debug, Clone, Copy)]
enum Conversion {
    /// Same data type, only the byte order may change.
    Direct,
    /// Numeric cast to a floating point or complex type.
    Cast,
    /// No finite values: every element is written as zero, NaNs as the
    /// policy says.
    Zeros { nan_policy: NanPolicy },
    /// Integer to integer with a unit scale and an integral intercept.
    ExactInt {
        flip: bool,
        inter: i128,
        min: i128,
        max: i128,
    },
    /// Scaled, rounded and clipped to an integer type.
    Round {
        scaling: ScalingParams,
        rounder: IntRounder,
        nan_policy: NanPolicy,
    },
}

fn range_fits(range: &FiniteRange, target: DataType) -> Result<bool> {
    if let (Scalar::Int(mn), Scalar::Int(mx), Some((tmin, tmax))) =
        (range.min, range.max, target.int_range())
    {
        return Ok(mn >= tmin && mx <= tmax);
    }
    let (smin, smax) = shared_range::<f64>(target)?;
    Ok(range.min.as_f64() >= smin && range.max.as_f64() <= smax)
}

/// Find the scale and intercept mapping the finite `range` of the input
/// into the integer type `target`.
fn calculate_scaling(
    range: &FiniteRange,
    target: DataType,
    mode: ScalingMode,
) -> Result<ScalingParams> {
    let (tmin, tmax) = target
        .int_range()
        .ok_or(ArrayError::UnsupportedDataType(target))?;
    if range_fits(range, target)? {
        return Ok(ScalingParams::identity());
    }
    let (mn, mx) = (range.min.as_f64(), range.max.as_f64());
    if mode == ScalingMode::None {
        return Err(ArrayError::Writer(format!(
            "values from {} to {} need scaling to fit {:?}",
            mn, mx, target
        )));
    }
    let (smin, smax) = shared_range::<f64>(target)?;
    let unsigned = target.kind() == Kind::UnsignedInt;

    if unsigned && mx <= 0. {
        let flip_fits = match range.min {
            Scalar::Int(v) => -v <= tmax,
            other => -other.as_f64() <= smax,
        };
        if flip_fits {
            return Ok(ScalingParams {
                scale: -1.,
                inter: 0.,
            });
        }
    }

    if mode == ScalingMode::SlopeInter {
        if range.min == range.max {
            return Ok(ScalingParams { scale: 1., inter: mn });
        }
        if let (Scalar::Int(imn), Scalar::Int(imx)) = (range.min, range.max) {
            let inter = imn - tmin;
            if imx - imn <= tmax - tmin && (inter as f64) as i128 == inter {
                return Ok(ScalingParams {
                    scale: 1.,
                    inter: inter as f64,
                });
            }
        }
    }

    let (scale, inter) = if mode == ScalingMode::Slope {
        let scale = if unsigned {
            if mn < 0. && mx > 0. {
                return Err(ArrayError::Range(format!(
                    "cannot scale negative and positive values to {:?} without an intercept",
                    target
                )));
            }
            if mx <= 0. {
                mn / smax
            } else {
                mx / smax
            }
        } else if mx.abs() >= mn.abs() {
            mx / smax
        } else {
            mn / smin
        };
        (scale, 0.)
    } else {
        let scale = (mx - mn) / (smax - smin);
        (scale, mn - smin * scale)
    };
    if scale == 0. || !scale.is_finite() || !inter.is_finite() {
        return Err(ArrayError::Writer(format!(
            "non-finite scaling ({}, {}) for values from {} to {}",
            scale, inter, mn, mx
        )));
    }
    Ok(ScalingParams { scale, inter })
}

/// Options for writing arrays to files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterOptions {
    order: MemoryOrder,
    nan_policy: NanPolicy,
    scaling_mode: ScalingMode,
    offset: u64,
}

impl WriterOptions {
    /// Column-major order, NaN to zero, slope and intercept scaling, no
    /// offset.
    pub fn new() -> Self {
        WriterOptions::default()
    }

    /// Set the memory order of the written array.
    pub fn with_order(mut self, order: MemoryOrder) -> Self {
        self.order = order;
        self
    }

    /// Set what to do with NaN values written to integer types.
    pub fn with_nan_policy(mut self, nan_policy: NanPolicy) -> Self {
        self.nan_policy = nan_policy;
        self
    }

    /// Set which scaling parameters may be computed.
    pub fn with_scaling_mode(mut self, scaling_mode: ScalingMode) -> Self {
        self.scaling_mode = scaling_mode;
        self
    }

    /// Set the byte offset of the array. The bytes before it are zeroed.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Write `array` to `sink` as elements of `target`, after `offset`
    /// zero bytes. Returns the scaling to record with the data.
    pub fn write<W, A, S, D>(
        &self,
        mut sink: W,
        array: &ArrayBase<S, D>,
        target: ElementType,
    ) -> Result<ScalingParams>
    where
        W: Write,
        A: DataElement,
        S: Data<Elem = A>,
        D: Dimension,
    {
        let writer = ArrayWriter::with_mode(array, target, self.scaling_mode)?;
        let _ = io::copy(&mut io::repeat(0).take(self.offset), &mut sink)?;
        writer.write_to(&mut sink, self.order, self.nan_policy)?;
        Ok(writer.scaling())
    }

    /// Write `array` to a new file at `path` as elements of `target`. The
    /// file is Gzip-compressed if the path has the ".gz" extension.
    /// Returns the scaling to record with the data.
    pub fn write_file<P, A, S, D>(
        &self,
        path: P,
        array: &ArrayBase<S, D>,
        target: ElementType,
    ) -> Result<ScalingParams>
    where
        P: AsRef<Path>,
        A: DataElement,
        S: Data<Elem = A>,
        D: Dimension,
    {
        let gz = is_gz_file(&path);
        let mut writer = BufWriter::new(File::create(path)?);
        let scaling = if gz {
            let mut e = GzEncoder::new(&mut writer, Compression::default());
            let scaling = self.write(&mut e, array, target)?;
            let _ = e.finish()?; // Must use result
            scaling
        } else {
            self.write(&mut writer, array, target)?
        };
        writer.flush()?;
        Ok(scaling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array, IxDyn};
    use pretty_assertions::assert_eq;

    fn le(t: DataType) -> ElementType {
        ElementType::le(t)
    }

    fn scaling_of<A: DataElement>(
        values: Vec<A>,
        target: DataType,
        mode: ScalingMode,
    ) -> Result<(f64, f64)> {
        let data = Array::from_shape_vec(IxDyn(&[values.len()]), values).unwrap();
        let w = ArrayWriter::with_mode(&data, le(target), mode)?;
        Ok((w.scale(), w.inter()))
    }

    fn write_le<A: DataElement>(
        values: Vec<A>,
        target: DataType,
        policy: NanPolicy,
    ) -> Result<Vec<u8>> {
        let data = Array::from_shape_vec(IxDyn(&[values.len()]), values).unwrap();
        let mut out = Vec::new();
        let writer = ArrayWriter::new(&data, le(target))?;
        writer.write_to(&mut out, MemoryOrder::ColumnMajor, policy)?;
        Ok(out)
    }

    use ScalingMode::{None as NoScaling, Slope, SlopeInter};

    #[test]
    fn identity_cases() {
        assert_eq!(scaling_of(vec![0u8, 255], DataType::Int16, SlopeInter).unwrap(), (1., 0.));
        assert_eq!(
            scaling_of(vec![-1e30f64, 1e30], DataType::Float32, NoScaling).unwrap(),
            (1., 0.)
        );
        assert_eq!(scaling_of(vec![-1.5f64, 1.5], DataType::Int16, NoScaling).unwrap(), (1., 0.));
        assert_eq!(scaling_of(vec![1i64, 2], DataType::Complex64, SlopeInter).unwrap(), (1., 0.));
        assert_eq!(
            scaling_of(vec![f32::NAN, f32::INFINITY], DataType::Uint8, SlopeInter).unwrap(),
            (1., 0.)
        );
    }

    #[test]
    fn impossible_conversions() {
        let complex = vec![num_complex::Complex::new(1f32, 0.)];
        assert!(matches!(
            scaling_of(complex, DataType::Float64, SlopeInter),
            Err(ArrayError::Writer(_))
        ));
        assert!(matches!(
            scaling_of(vec![1u8], DataType::Rgb24, SlopeInter),
            Err(ArrayError::Writer(_))
        ));
        assert!(matches!(
            scaling_of(vec![0f64, 1000.], DataType::Uint8, NoScaling),
            Err(ArrayError::Writer(_))
        ));
        assert!(matches!(
            scaling_of(vec![-1e308f64, 1e308], DataType::Int8, SlopeInter),
            Err(ArrayError::Writer(_))
        ));
    }

    #[test]
    fn sign_flip() {
        assert_eq!(scaling_of(vec![-100i16, 0], DataType::Uint8, SlopeInter).unwrap(), (-1., 0.));
        assert_eq!(scaling_of(vec![-255f32, -1.], DataType::Uint8, Slope).unwrap(), (-1., 0.));
        // too wide to flip
        let (scale, inter) = scaling_of(vec![-1000i16, -1], DataType::Uint8, Slope).unwrap();
        assert_eq!((scale, inter), (-1000. / 255., 0.));
    }

    #[test]
    fn intercept_only() {
        assert_eq!(scaling_of(vec![0u8, 255], DataType::Int8, SlopeInter).unwrap(), (1., 128.));
        assert_eq!(
            scaling_of(vec![1000i32, 1200], DataType::Uint8, SlopeInter).unwrap(),
            (1., 1000.)
        );
        // not for floating point input
        let (scale, _) = scaling_of(vec![1000f32, 1200.], DataType::Uint8, SlopeInter).unwrap();
        assert_eq!(scale, 200. / 255.);
    }

    #[test]
    fn constant_values_keep_their_value_as_intercept() {
        let cases: Vec<(Vec<f64>, DataType)> = vec![
            (vec![1000., 1000.], DataType::Uint8),
            (vec![-70_000., -70_000.], DataType::Int16),
        ];
        for (values, target) in cases {
            let v = values[0];
            assert_eq!(scaling_of(values, target, SlopeInter).unwrap(), (1., v));
        }
        assert_eq!(
            scaling_of(vec![1000i32, 1000, 1000], DataType::Int8, SlopeInter).unwrap(),
            (1., 1000.)
        );
        assert_eq!(
            scaling_of(vec![300u16, 300], DataType::Uint8, SlopeInter).unwrap(),
            (1., 300.)
        );
        assert_eq!(
            scaling_of(vec![-200i64], DataType::Int8, SlopeInter).unwrap(),
            (1., -200.)
        );
        assert_eq!(
            write_le(vec![1000i32, 1000, 1000], DataType::Int8, NanPolicy::ToZero).unwrap(),
            vec![0, 0, 0]
        );
    }

    #[test]
    fn slope_and_inter() {
        let (scale, inter) = scaling_of(vec![0f64, 1e6], DataType::Uint8, SlopeInter).unwrap();
        assert_eq!((scale, inter), (1e6 / 255., 0.));
        let (scale, inter) = scaling_of(vec![-1e6f64, 1e6], DataType::Int16, SlopeInter).unwrap();
        assert_eq!(scale, 2e6 / 65535.);
        assert_eq!(inter, -1e6 + 32768. * scale);
    }

    #[test]
    fn slope_only() {
        assert_eq!(scaling_of(vec![0u8, 255], DataType::Int8, Slope).unwrap(), (255. / 127., 0.));
        assert_eq!(
            scaling_of(vec![-1000f64, 500.], DataType::Int8, Slope).unwrap(),
            (1000. / 128., 0.)
        );
        // ties go to the maximum
        assert_eq!(
            scaling_of(vec![-1000f64, 1000.], DataType::Int8, Slope).unwrap(),
            (1000. / 127., 0.)
        );
        assert!(matches!(
            scaling_of(vec![-1000f64, 1000.], DataType::Uint8, Slope),
            Err(ArrayError::Range(_))
        ));
    }

    #[test]
    fn rounding_and_nan() {
        let values = vec![0.5f64, 1.5, 2.5, f64::NAN, 255., 0.4];
        assert_eq!(
            write_le(values.clone(), DataType::Uint8, NanPolicy::ToZero).unwrap(),
            vec![0, 2, 2, 0, 255, 0]
        );
        assert_eq!(
            write_le(values.clone(), DataType::Uint8, NanPolicy::Cast).unwrap(),
            vec![0, 2, 2, 0, 255, 0]
        );
        assert!(matches!(
            write_le(values, DataType::Uint8, NanPolicy::Error),
            Err(ArrayError::Rounding)
        ));
    }

    #[test]
    fn nan_policy_without_finite_values() {
        for values in vec![vec![f32::NAN, f32::NAN], vec![f32::NAN, f32::INFINITY]] {
            assert!(matches!(
                write_le(values.clone(), DataType::Int16, NanPolicy::Error),
                Err(ArrayError::Rounding)
            ));
            for &policy in &[NanPolicy::ToZero, NanPolicy::Cast] {
                assert_eq!(write_le(values.clone(), DataType::Int16, policy).unwrap(), vec![0; 4]);
            }
        }
        assert_eq!(
            write_le(vec![f64::INFINITY, f64::NEG_INFINITY], DataType::Uint8, NanPolicy::Error)
                .unwrap(),
            vec![0, 0]
        );
    }

    #[test]
    fn exact_integer_paths() {
        assert_eq!(
            write_le(vec![0u8, 255], DataType::Int8, NanPolicy::ToZero).unwrap(),
            vec![0x80, 0x7F]
        );
        assert_eq!(
            write_le(vec![-300i16, 0], DataType::Uint16, NanPolicy::ToZero).unwrap(),
            vec![0x2C, 0x01, 0, 0]
        );
        assert_eq!(
            write_le(vec![i64::MIN, i64::MAX], DataType::Int64, NanPolicy::ToZero).unwrap(),
            [i64::MIN.to_le_bytes(), i64::MAX.to_le_bytes()].concat()
        );
    }

    #[test]
    fn write_order_and_byte_order() {
        let data = array![[1i16, 2, 3], [4, 5, 6]];
        let mut f = Vec::new();
        let w = ArrayWriter::new(&data, ElementType::be(DataType::Int16)).unwrap();
        w.write_to(&mut f, MemoryOrder::ColumnMajor, NanPolicy::ToZero).unwrap();
        assert_eq!(f, vec![0, 1, 0, 4, 0, 2, 0, 5, 0, 3, 0, 6]);
        let mut c = Vec::new();
        let w = ArrayWriter::new(&data, ElementType::le(DataType::Int16)).unwrap();
        w.write_to(&mut c, MemoryOrder::RowMajor, NanPolicy::ToZero).unwrap();
        assert_eq!(c, vec![1, 0, 2, 0, 3, 0, 4, 0, 5, 0, 6, 0]);
        assert_eq!(w.out_type(), ElementType::le(DataType::Int16));
        assert_eq!(w.mode(), SlopeInter);
        assert_eq!(w.array().shape(), &[2, 3]);
    }

    #[test]
    fn options_pad_to_offset() {
        let data = array![1u8, 2, 3];
        let mut out = Vec::new();
        let scaling = WriterOptions::new()
            .with_offset(4)
            .write(&mut out, &data, ElementType::le(DataType::Uint8))
            .unwrap();
        assert!(scaling.is_identity());
        assert_eq!(out, vec![0, 0, 0, 0, 1, 2, 3]);
    }
}
