//! This module defines the header contract through which an array proxy
//! learns where and how an array is stored, along with `ArrayHeader`, a
//! plain implementation of it.
//!
//! Format-specific header parsers only need to implement [`HeaderSource`].

use crate::error::{ArrayError, Result};
use crate::typedef::{DataType, ElementType, MemoryOrder};

/// A scale and intercept pair relating stored values to true values:
/// `value = stored * scale + inter`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingParams {
    /// The multiplicative factor. Never zero.
    pub scale: f64,
    /// The additive term.
    pub inter: f64,
}

impl Default for ScalingParams {
    fn default() -> Self {
        ScalingParams::identity()
    }
}

impl ScalingParams {
    /// Create scaling parameters.
    ///
    /// # Errors
    ///
    /// - `InvalidScaling` if the scale is zero, or either value is not finite.
    pub fn new(scale: f64, inter: f64) -> Result<Self> {
        if scale == 0. || !scale.is_finite() || !inter.is_finite() {
            return Err(ArrayError::InvalidScaling(format!(
                "scale {} and intercept {}",
                scale, inter
            )));
        }
        Ok(ScalingParams { scale, inter })
    }

    /// Create scaling parameters from optional header fields, where a
    /// missing scale is 1 and a missing intercept is 0.
    pub fn or_identity(scale: Option<f64>, inter: Option<f64>) -> Result<Self> {
        ScalingParams::new(scale.unwrap_or(1.), inter.unwrap_or(0.))
    }

    /// The scaling that leaves values unchanged.
    pub fn identity() -> Self {
        ScalingParams {
            scale: 1.,
            inter: 0.,
        }
    }

    /// Whether this is the identity scaling.
    pub fn is_identity(&self) -> bool {
        self.scale == 1. && self.inter == 0.
    }
}

/// How the stored values of an array are scaled.
#[derive(Debug, Clone, PartialEq)]
pub enum Scaling {
    /// One pair for the whole array.
    Uniform(ScalingParams),
    /// One pair per volume, along the slowest varying stored axis.
    PerVolume(Vec<ScalingParams>),
}

impl Default for Scaling {
    fn default() -> Self {
        Scaling::Uniform(ScalingParams::identity())
    }
}

impl Scaling {
    /// Whether no value is changed by this scaling.
    pub fn is_identity(&self) -> bool {
        match self {
            Scaling::Uniform(p) => p.is_identity(),
            Scaling::PerVolume(ps) => ps.iter().all(ScalingParams::is_identity),
        }
    }
}

/// The information an array proxy needs from an image header.
pub trait HeaderSource {
    /// The shape of the stored array.
    fn data_shape(&self) -> &[usize];

    /// The element type of the stored array.
    fn data_type(&self) -> ElementType;

    /// The byte offset of the first element.
    fn data_offset(&self) -> u64;

    /// The scaling of the stored values. No scaling by default.
    fn scaling(&self) -> Scaling {
        Scaling::default()
    }

    /// The memory order of the stored array. Column-major by default.
    fn data_order(&self) -> MemoryOrder {
        MemoryOrder::ColumnMajor
    }
}

/// A plain header, with every field given explicitly.
///
/// # Example
///
/// ```
/// use fileslice::{ArrayHeader, DataType, ElementType, HeaderSource, MemoryOrder};
///
/// let header = ArrayHeader::new(vec![64, 64, 30], ElementType::le(DataType::Int16))
///     .with_offset(352)
///     .with_order(MemoryOrder::ColumnMajor);
/// assert_eq!(header.data_shape(), &[64, 64, 30]);
/// assert_eq!(header.data_offset(), 352);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayHeader {
    /// Shape of the stored array.
    pub shape: Vec<usize>,
    /// Element type of the stored array.
    pub element_type: ElementType,
    /// Byte offset of the first element.
    pub offset: u64,
    /// Scaling of the stored values.
    pub scaling: Scaling,
    /// Memory order of the stored array.
    pub order: MemoryOrder,
}

impl Default for ArrayHeader {
    fn default() -> ArrayHeader {
        ArrayHeader {
            shape: vec![],
            element_type: ElementType::native(DataType::Float32),
            offset: 0,
            scaling: Scaling::default(),
            order: MemoryOrder::ColumnMajor,
        }
    }
}

impl ArrayHeader {
    /// Create a header for an unscaled, column-major array at offset 0.
    pub fn new(shape: Vec<usize>, element_type: ElementType) -> Self {
        ArrayHeader {
            shape,
            element_type,
            ..Default::default()
        }
    }

    /// Set the byte offset.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the scaling.
    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Set the memory order.
    pub fn with_order(mut self, order: MemoryOrder) -> Self {
        self.order = order;
        self
    }
}

impl HeaderSource for ArrayHeader {
    fn data_shape(&self) -> &[usize] {
        &self.shape
    }

    fn data_type(&self) -> ElementType {
        self.element_type
    }

    fn data_offset(&self) -> u64 {
        self.offset
    }

    fn scaling(&self) -> Scaling {
        self.scaling.clone()
    }

    fn data_order(&self) -> MemoryOrder {
        self.order
    }
}
