//! Types for error handling go here.
use crate::typedef::DataType;
use ndarray::ShapeError;
use std::io::Error as IOError;

quick_error! {
    /// Error type for all error variants originated by this crate.
    #[derive(Debug)]
    pub enum ArrayError {
        /// Fancy (array-valued or boolean) indexing was requested.
        InvalidSliceKind {
            display("fancy indexing is not supported")
        }
        /// More than one ellipsis in a slice expression.
        MultipleEllipsis {
            display("cannot use more than one ellipsis")
        }
        /// More indexing selectors than array dimensions.
        TooManyIndices(given: usize, ndim: usize) {
            display("too many indices: {} given for an array of {} dimensions", given, ndim)
        }
        /// A slice with a step of zero.
        ZeroSliceStep {
            display("slice step cannot be zero")
        }
        /// Integer index outside of the axis bounds.
        OutOfRangeIndex(index: isize, axis: usize, len: usize) {
            display("index {} is out of bounds for axis {} with size {}", index, axis, len)
        }
        /// The byte extent of the array does not fit the address space.
        TooLarge(shape: Vec<usize>, itemsize: usize) {
            display("cannot address an array of shape {:?} with {}-byte items", shape, itemsize)
        }
        /// The data source returned fewer bytes than a segment asked for.
        ShortRead(offset: u64, expected: u64, got: u64) {
            display("expected {} bytes at offset {}, got {}", expected, offset, got)
        }
        /// The bytes read do not add up to the expected total.
        SegmentAccounting(expected: usize, got: usize) {
            display("expected to read {} bytes in total, got {}", expected, got)
        }
        /// The array cannot be written to the requested element type.
        Writer(msg: String) {
            display("cannot write array: {}", msg)
        }
        /// The data range cannot be scaled into the requested element type.
        Range(msg: String) {
            display("cannot scale data range: {}", msg)
        }
        /// NaN found while rounding to integers with a failing NaN policy.
        Rounding {
            display("NaN values cannot be rounded to integers")
        }
        /// A space heuristic answered outside of its contract.
        HeuristicContract(msg: &'static str) {
            display("space heuristic contract violated: {}", msg)
        }
        /// This data type is not supported for the requested operation.
        UnsupportedDataType(t: DataType) {
            display("unsupported data type {:?}", t)
        }
        /// Stored elements cannot be decoded into the requested element type.
        IncompatibleElementType(stored: DataType, requested: DataType) {
            display("cannot decode {:?} values as {:?}", stored, requested)
        }
        /// Invalid scale and intercept parameters.
        InvalidScaling(msg: String) {
            display("invalid scaling: {}", msg)
        }
        /// The decoded data does not fit the expected array shape.
        Shape(err: ShapeError) {
            from()
            source(err)
            display("{}", err)
        }
        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
            display("{}", err)
        }
    }
}

/// Alias type for results originated from this crate.
pub type Result<T> = ::std::result::Result<T, ArrayError>;
