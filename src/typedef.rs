//! This module contains the element type descriptors used to interpret the
//! bytes of a stored array: the data type itself, its byte order, and the
//! memory order of the array's axes.
//!
//! The numeric codes of [`DataType`] follow the NIfTI-1 `datatype` field,
//! which lets header parsers map a stored code with
//! [`DataType::from_code`].

use byteordered::Endianness;
use num_traits::FromPrimitive;

/// Data type of the elements of a stored array.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, FromPrimitive)]
pub enum DataType {
    /// unsigned char.
    Uint8 = 2,
    /// signed short.
    Int16 = 4,
    /// signed int.
    Int32 = 8,
    /// 32 bit float.
    Float32 = 16,
    /// 64 bit complex = 2 32 bit floats.
    Complex64 = 32,
    /// 64 bit float = double.
    Float64 = 64,
    /// 3 8 bit bytes.
    Rgb24 = 128,
    /// signed char.
    Int8 = 256,
    /// unsigned short.
    Uint16 = 512,
    /// unsigned int.
    Uint32 = 768,
    /// signed long long.
    Int64 = 1024,
    /// unsigned long long.
    Uint64 = 1280,
    /// 128 bit complex = 2 64 bit floats.
    Complex128 = 1792,
    /// 4 8 bit bytes.
    Rgba32 = 2304,
}

/// The broad category of a data type.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Kind {
    /// Two's complement integers.
    SignedInt,
    /// Unsigned integers.
    UnsignedInt,
    /// IEEE 754 binary floating point numbers.
    Float,
    /// Pairs of floating point numbers.
    Complex,
    /// Fixed-size records with no numeric interpretation.
    Opaque,
}

impl DataType {
    /// Map a stored numeric code to a data type.
    pub fn from_code(code: i16) -> Option<DataType> {
        DataType::from_i16(code)
    }

    /// The numeric code of this data type.
    pub fn code(self) -> i16 {
        self as i16
    }

    /// Retrieve the size of an element of this data type, in bytes.
    pub fn size_of(self) -> usize {
        use DataType::*;
        match self {
            Int8 | Uint8 => 1,
            Int16 | Uint16 => 2,
            Rgb24 => 3,
            Int32 | Uint32 | Float32 | Rgba32 => 4,
            Int64 | Uint64 | Float64 | Complex64 => 8,
            Complex128 => 16,
        }
    }

    /// The category of this data type.
    pub fn kind(self) -> Kind {
        use DataType::*;
        match self {
            Int8 | Int16 | Int32 | Int64 => Kind::SignedInt,
            Uint8 | Uint16 | Uint32 | Uint64 => Kind::UnsignedInt,
            Float32 | Float64 => Kind::Float,
            Complex64 | Complex128 => Kind::Complex,
            Rgb24 | Rgba32 => Kind::Opaque,
        }
    }

    /// Whether this is a signed or unsigned integer type.
    pub fn is_integer(self) -> bool {
        matches!(self.kind(), Kind::SignedInt | Kind::UnsignedInt)
    }

    /// The inclusive range of values of an integer data type,
    /// or `None` for any other kind.
    pub fn int_range(self) -> Option<(i128, i128)> {
        use DataType::*;
        let range = match self {
            Int8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            Uint8 => (0, i128::from(u8::MAX)),
            Int16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            Uint16 => (0, i128::from(u16::MAX)),
            Int32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            Uint32 => (0, i128::from(u32::MAX)),
            Int64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
            Uint64 => (0, i128::from(u64::MAX)),
            _ => return None,
        };
        Some(range)
    }

    /// Whether every value of this type can be represented by `target`
    /// without loss, following NumPy's safe casting rules (but requiring
    /// exact representation for integers converted to floats).
    pub fn can_cast_losslessly(self, target: DataType) -> bool {
        if self == target {
            return true;
        }
        let (src_width, dst_width) = (self.size_of(), target.size_of());
        match (self.kind(), target.kind()) {
            (Kind::UnsignedInt, Kind::UnsignedInt) | (Kind::SignedInt, Kind::SignedInt) => {
                dst_width >= src_width
            }
            (Kind::UnsignedInt, Kind::SignedInt) => dst_width > src_width,
            (Kind::SignedInt, Kind::UnsignedInt) => false,
            (Kind::UnsignedInt, Kind::Float) | (Kind::SignedInt, Kind::Float) => {
                // mantissas of 24 and 53 bits
                src_width * 2 <= dst_width
            }
            (Kind::UnsignedInt, Kind::Complex) | (Kind::SignedInt, Kind::Complex) => {
                src_width * 4 <= dst_width
            }
            (Kind::Float, Kind::Float) | (Kind::Complex, Kind::Complex) => dst_width >= src_width,
            (Kind::Float, Kind::Complex) => dst_width >= src_width * 2,
            _ => false,
        }
    }
}

/// A data type together with the byte order of its stored elements.
///
/// Two element types can be reinterpreted as one another when their kind
/// and width match. A byte-order mismatch only requires a byte swap.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ElementType {
    /// The data type of each element.
    pub data_type: DataType,
    /// The byte order of each element.
    pub endianness: Endianness,
}

impl ElementType {
    /// Create a new element type.
    pub fn new(data_type: DataType, endianness: Endianness) -> Self {
        ElementType {
            data_type,
            endianness,
        }
    }

    /// An element type in this system's native byte order.
    pub fn native(data_type: DataType) -> Self {
        ElementType::new(data_type, Endianness::native())
    }

    /// An element type in little endian byte order.
    pub fn le(data_type: DataType) -> Self {
        ElementType::new(data_type, Endianness::Little)
    }

    /// An element type in big endian byte order.
    pub fn be(data_type: DataType) -> Self {
        ElementType::new(data_type, Endianness::Big)
    }

    /// The size of each element, in bytes.
    pub fn itemsize(&self) -> usize {
        self.data_type.size_of()
    }

    /// The category of the element's data type.
    pub fn kind(&self) -> Kind {
        self.data_type.kind()
    }

    /// The same data type with the opposite byte order.
    pub fn byte_swapped(&self) -> Self {
        ElementType::new(self.data_type, self.endianness.to_opposite())
    }

    /// Whether the elements of `other` can be reinterpreted as elements of
    /// this type, possibly after swapping bytes.
    pub fn is_compatible(&self, other: &ElementType) -> bool {
        self.kind() == other.kind() && self.itemsize() == other.itemsize()
    }

    /// Whether the elements are stored in this system's native byte order.
    pub fn is_native(&self) -> bool {
        self.endianness == Endianness::native()
    }
}

/// The memory order of a stored multi-dimensional array.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum MemoryOrder {
    /// C order: the last axis varies fastest.
    RowMajor,
    /// Fortran order: the first axis varies fastest.
    ColumnMajor,
}

impl Default for MemoryOrder {
    fn default() -> Self {
        MemoryOrder::ColumnMajor
    }
}

impl MemoryOrder {
    /// Whether this is column-major (Fortran) order.
    pub fn is_column_major(self) -> bool {
        self == MemoryOrder::ColumnMajor
    }

    /// The byte stride of each axis of an array stored in this order.
    pub fn strides(self, shape: &[usize], itemsize: usize) -> Vec<usize> {
        let mut strides = vec![0; shape.len()];
        let mut stride = itemsize;
        let axes: Box<dyn Iterator<Item = usize>> = match self {
            MemoryOrder::ColumnMajor => Box::new(0..shape.len()),
            MemoryOrder::RowMajor => Box::new((0..shape.len()).rev()),
        };
        for axis in axes {
            strides[axis] = stride;
            stride *= shape[axis];
        }
        strides
    }

    /// The index of the slowest varying axis in an array of `ndim` dimensions.
    pub fn outer_axis(self, ndim: usize) -> Option<usize> {
        match (self, ndim) {
            (_, 0) => None,
            (MemoryOrder::ColumnMajor, n) => Some(n - 1),
            (MemoryOrder::RowMajor, _) => Some(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for t in &[
            DataType::Uint8,
            DataType::Int16,
            DataType::Complex128,
            DataType::Rgba32,
        ] {
            assert_eq!(DataType::from_code(t.code()), Some(*t));
        }
        assert_eq!(DataType::from_code(1536), None);
    }

    #[test]
    fn lossless_casts() {
        use DataType::*;
        assert!(Uint8.can_cast_losslessly(Int16));
        assert!(!Int8.can_cast_losslessly(Uint8));
        assert!(!Uint16.can_cast_losslessly(Int16));
        assert!(Int16.can_cast_losslessly(Float32));
        assert!(!Int32.can_cast_losslessly(Float32));
        assert!(Int32.can_cast_losslessly(Float64));
        assert!(!Float32.can_cast_losslessly(Int64));
        assert!(Float32.can_cast_losslessly(Complex64));
        assert!(!Float64.can_cast_losslessly(Complex64));
        assert!(!Complex64.can_cast_losslessly(Float64));
        assert!(!Rgb24.can_cast_losslessly(Rgba32));
    }

    #[test]
    fn strides_by_order() {
        assert_eq!(MemoryOrder::ColumnMajor.strides(&[10, 6], 4), vec![4, 40]);
        assert_eq!(MemoryOrder::RowMajor.strides(&[10, 6], 4), vec![24, 4]);
        assert_eq!(MemoryOrder::ColumnMajor.outer_axis(3), Some(2));
        assert_eq!(MemoryOrder::RowMajor.outer_axis(3), Some(0));
        assert_eq!(MemoryOrder::RowMajor.outer_axis(0), None);
    }

    #[test]
    fn byte_swapped_is_compatible() {
        let t = ElementType::le(DataType::Int32);
        assert!(t.is_compatible(&t.byte_swapped()));
        assert_eq!(t.byte_swapped().endianness, Endianness::Big);
        assert!(!t.is_compatible(&ElementType::le(DataType::Float32)));
    }
}
