//! Lazy slicing of arrays stored in files.
//!
//! A slice expression is a sequence of [`Selector`]s with NumPy basic
//! indexing semantics. [`fileslice`] reads exactly the bytes needed to
//! produce the slice (give or take what the [space heuristic] chooses to
//! over-read), and the result is identical to slicing the fully
//! materialized array.
//!
//! [space heuristic]: heuristic/trait.SpaceHeuristic.html
use crate::element::{decode_values, DataElement};
use crate::error::{ArrayError, Result};
use crate::typedef::{ElementType, Kind, MemoryOrder};
use crate::util::ReadSeek;
use log::trace;
use ndarray::{Array, ArrayD, IxDyn, ShapeBuilder, SliceInfo, SliceInfoElem};
use std::convert::TryFrom;
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

pub mod heuristic;
mod segments;

pub use self::heuristic::{
    AlwaysContiguous, AlwaysFull, AlwaysSkip, AxisSelection, CostModelHeuristic, ReadAction,
    SpaceHeuristic, ThresholdHeuristic, SKIP_THRESHOLD,
};
pub use self::segments::{
    analyze_slice, plan_segments, plan_segments_with, read_segments, AxisLayout, AxisPlan,
    ResidualSelector, Segment, SegmentPlan,
};

/// A slice over one axis, with optional bounds as in `start:stop:step`.
///
/// Negative bounds count from the end of the axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SliceRange {
    /// First index, or the axis start (end for negative steps) when `None`.
    pub start: Option<isize>,
    /// Exclusive end, or the axis end (start for negative steps) when `None`.
    pub stop: Option<isize>,
    /// Step, 1 when `None`. Must not be zero.
    pub step: Option<isize>,
}

impl SliceRange {
    /// Create a slice range from its three optional parts.
    pub fn new(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> Self {
        SliceRange { start, stop, step }
    }

    /// The slice selecting the whole axis.
    pub fn full() -> Self {
        SliceRange::default()
    }

    /// The slice selecting the whole axis backwards.
    pub fn reversed() -> Self {
        SliceRange::new(None, None, Some(-1))
    }

    /// This slice with a different step.
    pub fn step_by(self, step: isize) -> Self {
        SliceRange {
            step: Some(step),
            ..self
        }
    }

    /// Whether this is literally the full slice `:` (or `::1`).
    pub fn is_full(&self) -> bool {
        self.start.is_none() && self.stop.is_none() && self.step.unwrap_or(1) == 1
    }
}

impl From<Range<isize>> for SliceRange {
    fn from(r: Range<isize>) -> Self {
        SliceRange::new(Some(r.start), Some(r.end), None)
    }
}

impl From<RangeFrom<isize>> for SliceRange {
    fn from(r: RangeFrom<isize>) -> Self {
        SliceRange::new(Some(r.start), None, None)
    }
}

impl From<RangeTo<isize>> for SliceRange {
    fn from(r: RangeTo<isize>) -> Self {
        SliceRange::new(None, Some(r.end), None)
    }
}

impl From<RangeFull> for SliceRange {
    fn from(_: RangeFull) -> Self {
        SliceRange::full()
    }
}

/// One element of a slice expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select a single position, dropping the axis.
    Index(isize),
    /// Select a range of positions.
    Slice(SliceRange),
    /// Insert a new axis of length 1.
    NewAxis,
    /// Stand for as many full slices as needed to cover all axes.
    Ellipsis,
    /// Fancy indexing by an array of positions. Never supported.
    Array(Vec<isize>),
    /// Fancy indexing by a boolean mask. Never supported.
    Mask(Vec<bool>),
}

impl Selector {
    /// Whether this selector is a form of fancy indexing.
    pub fn is_fancy(&self) -> bool {
        matches!(self, Selector::Array(_) | Selector::Mask(_))
    }

    /// Whether this selector consumes an axis of the array.
    fn is_real(&self) -> bool {
        matches!(self, Selector::Index(_) | Selector::Slice(_))
    }
}

impl From<isize> for Selector {
    fn from(i: isize) -> Self {
        Selector::Index(i)
    }
}

impl From<SliceRange> for Selector {
    fn from(r: SliceRange) -> Self {
        Selector::Slice(r)
    }
}

impl From<Range<isize>> for Selector {
    fn from(r: Range<isize>) -> Self {
        Selector::Slice(r.into())
    }
}

impl From<RangeFrom<isize>> for Selector {
    fn from(r: RangeFrom<isize>) -> Self {
        Selector::Slice(r.into())
    }
}

impl From<RangeTo<isize>> for Selector {
    fn from(r: RangeTo<isize>) -> Self {
        Selector::Slice(r.into())
    }
}

impl From<RangeFull> for Selector {
    fn from(r: RangeFull) -> Self {
        Selector::Slice(r.into())
    }
}

/// Whether the slice expression uses any form of fancy indexing.
pub fn is_fancy(spec: &[Selector]) -> bool {
    spec.iter().any(Selector::is_fancy)
}

/// A selector of a canonical slice expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalSelector {
    /// A non-negative index within the axis bounds.
    Index(usize),
    /// A slice; the full slice when it selects the whole axis.
    Slice(SliceRange),
    /// A new axis of length 1.
    NewAxis,
}

/// A slice expression with the ellipsis expanded, one selector per axis
/// (plus any new axes), negative indices resolved and full-axis slices
/// replaced by the full slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalSliceSpec(Vec<CanonicalSelector>);

impl CanonicalSliceSpec {
    /// The canonical selectors.
    pub fn selectors(&self) -> &[CanonicalSelector] {
        &self.0
    }

    /// Retrieve the canonical selectors.
    pub fn into_inner(self) -> Vec<CanonicalSelector> {
        self.0
    }

    /// Whether every selector is a full slice (or a new axis).
    pub fn is_full(&self) -> bool {
        self.0.iter().all(|s| match s {
            CanonicalSelector::Slice(r) => r.is_full(),
            CanonicalSelector::NewAxis => true,
            CanonicalSelector::Index(_) => false,
        })
    }
}

/// A slice with every bound resolved against an axis length.
///
/// `stop` is only `None` for a negative step running through index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilledSlice {
    /// First index. May be -1 for an empty backwards slice.
    pub start: isize,
    /// Exclusive end.
    pub stop: Option<isize>,
    /// Step, never zero.
    pub step: isize,
}

impl FilledSlice {
    /// Create a filled slice.
    pub fn new(start: isize, stop: Option<isize>, step: isize) -> Self {
        FilledSlice { start, stop, step }
    }

    /// The number of selected positions.
    pub fn len(&self) -> usize {
        let stop = self.stop.unwrap_or(-1);
        let gap = stop - self.start;
        let step = self.step;
        if (step > 0 && gap <= 0) || (step < 0 && gap >= 0) {
            0
        } else if step > 0 {
            ((gap - 1) / step + 1) as usize
        } else {
            ((gap + 1) / step + 1) as usize
        }
    }

    /// Whether no position is selected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The selected positions, in slice order.
    pub fn indices(&self) -> impl Iterator<Item = usize> {
        let FilledSlice { start, step, .. } = *self;
        (0..self.len() as isize).map(move |k| (start + k * step) as usize)
    }

    /// The same positions as a slice with a positive step.
    pub fn positive(&self) -> FilledSlice {
        positive_slice(self)
    }
}

/// Resolve the bounds of a slice against an axis of length `len`, with the
/// clamping rules of NumPy. Steps longer than the axis are shortened to its
/// length, which selects the same positions.
///
/// # Errors
///
/// - `ZeroSliceStep` if the step is zero.
pub fn fill_slice(range: &SliceRange, len: usize) -> Result<FilledSlice> {
    let step = range.step.unwrap_or(1);
    if step == 0 {
        return Err(ArrayError::ZeroSliceStep);
    }
    // a step longer than the axis selects at most the start
    let longest = len.max(1).min(isize::MAX as usize);
    let step = step.signum() * step.unsigned_abs().min(longest) as isize;
    let len = len as isize;
    let filled = if step > 0 {
        let clamp = |v: isize| {
            if v < 0 {
                (v + len).max(0)
            } else {
                v.min(len)
            }
        };
        FilledSlice {
            start: range.start.map_or(0, clamp),
            stop: Some(range.stop.map_or(len, clamp)),
            step,
        }
    } else {
        let start = match range.start {
            None => len - 1,
            Some(v) if v < 0 => (v + len).max(-1),
            Some(v) => v.min(len - 1),
        };
        let stop = match range.stop {
            None => None,
            Some(v) if v < 0 => Some(v + len).filter(|s| *s >= 0),
            Some(v) => Some(v.min(len - 1)),
        };
        FilledSlice { start, stop, step }
    };
    Ok(filled)
}

/// The number of positions a slice selects on an axis of length `len`.
pub fn slice_len(range: &SliceRange, len: usize) -> Result<usize> {
    fill_slice(range, len).map(|s| s.len())
}

/// The slice selecting the same positions as `slice`, in ascending order.
pub fn positive_slice(slice: &FilledSlice) -> FilledSlice {
    if slice.step > 0 {
        return *slice;
    }
    let step = slice.step.saturating_neg();
    let n = slice.len() as isize;
    if n == 0 {
        return FilledSlice::new(0, Some(0), step);
    }
    let end = slice.start + (n - 1) * slice.step;
    FilledSlice::new(end, Some(slice.start + 1), step)
}

/// Bring a slice expression into its canonical form for an array of the
/// given shape.
///
/// # Errors
///
/// - `InvalidSliceKind` on fancy indexing.
/// - `MultipleEllipsis` if more than one ellipsis is present.
/// - `TooManyIndices` if more axes are indexed than the array has.
/// - `OutOfRangeIndex` if an index falls outside of its axis.
/// - `ZeroSliceStep` if a slice has a zero step.
pub fn canonicalize(spec: &[Selector], shape: &[usize]) -> Result<CanonicalSliceSpec> {
    if is_fancy(spec) {
        return Err(ArrayError::InvalidSliceKind);
    }
    if spec.iter().filter(|s| **s == Selector::Ellipsis).count() > 1 {
        return Err(ArrayError::MultipleEllipsis);
    }
    let ndim = shape.len();
    let n_real = spec.iter().filter(|s| s.is_real()).count();
    if n_real > ndim {
        return Err(ArrayError::TooManyIndices(n_real, ndim));
    }

    let mut canonical = Vec::with_capacity(spec.len() + ndim - n_real);
    let mut axis = 0;
    for selector in spec {
        match selector {
            Selector::Ellipsis => {
                let n_full = ndim - n_real;
                canonical.extend((0..n_full).map(|_| CanonicalSelector::Slice(SliceRange::full())));
                axis += n_full;
            }
            Selector::NewAxis => canonical.push(CanonicalSelector::NewAxis),
            Selector::Index(i) => {
                let len = shape[axis];
                let resolved = if *i < 0 { *i + len as isize } else { *i };
                if resolved < 0 || resolved >= len as isize {
                    return Err(ArrayError::OutOfRangeIndex(*i, axis, len));
                }
                canonical.push(CanonicalSelector::Index(resolved as usize));
                axis += 1;
            }
            Selector::Slice(range) => {
                let len = shape[axis];
                let filled = fill_slice(range, len)?;
                let range = if filled == FilledSlice::new(0, Some(len as isize), 1) {
                    SliceRange::full()
                } else {
                    *range
                };
                canonical.push(CanonicalSelector::Slice(range));
                axis += 1;
            }
            Selector::Array(_) | Selector::Mask(_) => return Err(ArrayError::InvalidSliceKind),
        }
    }
    canonical.extend((axis..ndim).map(|_| CanonicalSelector::Slice(SliceRange::full())));
    Ok(CanonicalSliceSpec(canonical))
}

/// Predict the shape of an array of the given shape after slicing.
///
/// Integer selectors drop their axis, new axes insert 1, and slices keep
/// their length.
pub fn predict_shape(spec: &[Selector], shape: &[usize]) -> Result<Vec<usize>> {
    let canonical = canonicalize(spec, shape)?;
    let mut out = Vec::with_capacity(canonical.0.len());
    let mut axis = 0;
    for selector in canonical.selectors() {
        match selector {
            CanonicalSelector::NewAxis => out.push(1),
            CanonicalSelector::Index(_) => axis += 1,
            CanonicalSelector::Slice(range) => {
                out.push(slice_len(range, shape[axis])?);
                axis += 1;
            }
        }
    }
    Ok(out)
}

/// Slice an array stored in `source`, reading only the bytes needed.
///
/// The array has the given `shape` and `element_type`, starts at `offset`
/// and is laid out in `order`. The values are decoded into `T`; when `T`
/// is the stored data type the result is bit-identical to slicing the
/// whole array after reading it.
///
/// # Errors
///
/// Fails with `InvalidSliceKind` before reading anything if `spec` uses
/// fancy indexing, with any error of [`canonicalize`], and with
/// `ShortRead` if the source ends early.
///
/// # Example
///
/// ```
/// use fileslice::{fileslice, DataType, ElementType, MemoryOrder, Selector};
/// use std::io::Cursor;
///
/// let bytes: Vec<u8> = (0..10u8).collect();
/// let mut source = Cursor::new(bytes);
/// let spec = [Selector::from(2..8)];
/// let data = fileslice::<u8, _>(
///     &mut source,
///     &spec,
///     &[10],
///     ElementType::native(DataType::Uint8),
///     0,
///     MemoryOrder::ColumnMajor,
/// )?;
/// assert_eq!(data.as_slice().unwrap(), &[2, 3, 4, 5, 6, 7]);
/// # Ok::<(), fileslice::ArrayError>(())
/// ```
pub fn fileslice<T, R>(
    source: &mut R,
    spec: &[Selector],
    shape: &[usize],
    element_type: ElementType,
    offset: u64,
    order: MemoryOrder,
) -> Result<ArrayD<T>>
where
    T: DataElement,
    R: ?Sized + ReadSeek,
{
    fileslice_with(
        source,
        spec,
        shape,
        element_type,
        offset,
        order,
        &ThresholdHeuristic::default(),
    )
}

/// Same as [`fileslice`], deciding over-reads with a custom space heuristic.
pub fn fileslice_with<T, R>(
    source: &mut R,
    spec: &[Selector],
    shape: &[usize],
    element_type: ElementType,
    offset: u64,
    order: MemoryOrder,
    heuristic: &dyn SpaceHeuristic,
) -> Result<ArrayD<T>>
where
    T: DataElement,
    R: ?Sized + ReadSeek,
{
    if is_fancy(spec) {
        return Err(ArrayError::InvalidSliceKind);
    }
    if element_type.kind() == Kind::Opaque {
        return Err(ArrayError::UnsupportedDataType(element_type.data_type));
    }
    let itemsize = element_type.itemsize();
    let plan = plan_segments_with(spec, shape, itemsize, offset, order, heuristic)?;
    let n_bytes = plan.shape.iter().product::<usize>() * itemsize;
    trace!(
        "slicing {:?} as {} segments of {} bytes into shape {:?}",
        shape,
        plan.segments.len(),
        n_bytes,
        plan.shape
    );
    let raw = read_segments(source, &plan.segments, n_bytes)?;
    let values = decode_values::<T>(raw, element_type)?;
    let data = Array::from_shape_vec(IxDyn(&plan.shape).set_f(order.is_column_major()), values)?;
    apply_residual(data, &plan.residual)
}

/// Apply the in-memory part of a slice plan to the data read from file.
pub fn apply_residual<T>(data: ArrayD<T>, residual: &[ResidualSelector]) -> Result<ArrayD<T>> {
    if residual.is_empty() {
        return Ok(data);
    }
    let elems: Vec<SliceInfoElem> = residual.iter().map(ResidualSelector::to_slice_elem).collect();
    let info = SliceInfo::<_, IxDyn, IxDyn>::try_from(elems)?;
    Ok(data.slice_move(info))
}
