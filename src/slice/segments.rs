//! Planning and reading of the byte segments behind a slice.
use super::heuristic::{AxisSelection, ReadAction, SpaceHeuristic, ThresholdHeuristic};
use super::{canonicalize, fill_slice, CanonicalSelector, FilledSlice, Selector};
use crate::error::{ArrayError, Result};
use crate::typedef::MemoryOrder;
use crate::util::ReadSeek;
use log::trace;
use ndarray::SliceInfoElem;
use std::io::{Read, Seek, SeekFrom};

/// A contiguous run of bytes in a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Absolute byte offset of the run.
    pub offset: u64,
    /// Length of the run, in bytes.
    pub length: u64,
}

impl Segment {
    /// Create a new segment.
    pub fn new(offset: u64, length: u64) -> Self {
        Segment { offset, length }
    }
}

/// The in-memory selection applied on one axis of the data read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResidualSelector {
    /// Keep the whole axis.
    Full,
    /// Take one position, dropping the axis.
    Index(usize),
    /// Take a range of positions.
    Range(FilledSlice),
}

impl ResidualSelector {
    pub(crate) fn to_slice_elem(&self) -> SliceInfoElem {
        match *self {
            ResidualSelector::Full => SliceInfoElem::Slice {
                start: 0,
                end: None,
                step: 1,
            },
            ResidualSelector::Index(i) => SliceInfoElem::Index(i as isize),
            ResidualSelector::Range(s) if s.is_empty() => SliceInfoElem::Slice {
                start: 0,
                end: Some(0),
                step: 1,
            },
            ResidualSelector::Range(s) if s.step > 0 => SliceInfoElem::Slice {
                start: s.start,
                end: s.stop,
                step: s.step,
            },
            // ndarray takes negative steps from the end of the range
            ResidualSelector::Range(s) => {
                let positive = s.positive();
                SliceInfoElem::Slice {
                    start: positive.start,
                    end: positive.stop,
                    step: s.step,
                }
            }
        }
    }
}

/// How the bytes of one axis are laid out once read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisLayout {
    /// The whole axis.
    Full,
    /// One run of consecutive positions.
    Contiguous,
    /// Anything else.
    Strided,
}

/// The outcome of planning one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisPlan {
    /// What is read from the source.
    pub read: AxisSelection,
    /// What is then selected in memory. Only meaningful when `read` is a
    /// slice, since an index read drops the axis.
    pub residual: ResidualSelector,
    /// The layout of the bytes read.
    pub layout: AxisLayout,
}

/// The full plan for reading a slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentPlan {
    /// Byte runs to read, in order. Their concatenation holds the data
    /// before the residual slicing.
    pub segments: Vec<Segment>,
    /// Shape of the data read, in the stored memory order.
    pub shape: Vec<usize>,
    /// Selection to apply in memory, one per axis of `shape`. Empty when
    /// the data read is the final result.
    pub residual: Vec<ResidualSelector>,
}

impl SegmentPlan {
    /// Total number of bytes covered by the segments.
    pub fn total_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.length).sum()
    }
}

/// Decide what to read on one axis and what to select afterwards.
///
/// `all_full` tells whether every faster varying axis is read in full;
/// only then may the heuristic widen the read. The slowest varying axis is
/// never widened to the full axis, as there is nothing after it to keep
/// contiguous with.
///
/// # Errors
///
/// - `HeuristicContract` if the heuristic answers `Contiguous` for an index.
/// - `ZeroSliceStep` for a slice with a step of zero.
pub fn analyze_slice(
    selector: CanonicalSelector,
    axis_len: usize,
    all_full: bool,
    is_slowest: bool,
    stride: usize,
    heuristic: &dyn SpaceHeuristic,
) -> Result<AxisPlan> {
    let full_read = AxisSelection::full(axis_len);
    let selection = match selector {
        CanonicalSelector::NewAxis => {
            return Ok(AxisPlan {
                read: AxisSelection::full(1),
                residual: ResidualSelector::Full,
                layout: AxisLayout::Full,
            });
        }
        CanonicalSelector::Slice(range) if range.is_full() => {
            return Ok(AxisPlan {
                read: full_read,
                residual: ResidualSelector::Full,
                layout: AxisLayout::Full,
            });
        }
        CanonicalSelector::Slice(range)
            if range.start.is_none() && range.stop.is_none() && range.step == Some(-1) =>
        {
            return Ok(AxisPlan {
                read: full_read,
                residual: ResidualSelector::Range(fill_slice(&range, axis_len)?),
                layout: AxisLayout::Full,
            });
        }
        CanonicalSelector::Slice(range) => AxisSelection::Slice(fill_slice(&range, axis_len)?),
        CanonicalSelector::Index(i) => AxisSelection::Index(i),
    };

    let layout = match selection {
        AxisSelection::Slice(s) if s.step == 1 || s.step == -1 => AxisLayout::Contiguous,
        _ => AxisLayout::Strided,
    };

    let mut action = ReadAction::Skip;
    if all_full {
        action = heuristic.decide(&selection, axis_len, stride);
        if let (ReadAction::Contiguous, AxisSelection::Index(_)) = (action, selection) {
            return Err(ArrayError::HeuristicContract(
                "an index cannot be read as a contiguous run",
            ));
        }
        if is_slowest && action == ReadAction::Full {
            action = match selection {
                AxisSelection::Index(_) => ReadAction::Skip,
                AxisSelection::Slice(_) => ReadAction::Contiguous,
            };
        }
    }

    let plan = match (action, selection) {
        (ReadAction::Full, AxisSelection::Index(i)) => AxisPlan {
            read: full_read,
            residual: ResidualSelector::Index(i),
            layout: AxisLayout::Full,
        },
        (ReadAction::Full, AxisSelection::Slice(s)) => AxisPlan {
            read: full_read,
            residual: ResidualSelector::Range(s),
            layout: AxisLayout::Full,
        },
        (ReadAction::Contiguous, AxisSelection::Slice(s)) if layout != AxisLayout::Contiguous => {
            let positive = s.positive();
            let read = FilledSlice::new(positive.start, positive.stop, 1);
            let n = read.len() as isize;
            let residual = if s.step > 0 {
                FilledSlice::new(0, Some(n), s.step)
            } else {
                FilledSlice::new(n - 1, None, s.step)
            };
            AxisPlan {
                read: AxisSelection::Slice(read),
                residual: ResidualSelector::Range(residual),
                layout: AxisLayout::Contiguous,
            }
        }
        (_, AxisSelection::Slice(s)) if s.step < 0 => {
            let positive = s.positive();
            let n = positive.len() as isize;
            AxisPlan {
                read: AxisSelection::Slice(positive),
                residual: ResidualSelector::Range(FilledSlice::new(n - 1, None, -1)),
                layout,
            }
        }
        (_, read) => AxisPlan {
            read,
            residual: ResidualSelector::Full,
            layout,
        },
    };
    Ok(plan)
}

/// Plan the byte segments needed to read a slice of an array stored with
/// the given shape, item size, base offset and memory order, using the
/// default space heuristic.
///
/// # Example
///
/// ```
/// use fileslice::{plan_segments, MemoryOrder, Segment, Selector};
///
/// let plan = plan_segments(&[Selector::from(1..9)], &[10], 4, 0, MemoryOrder::RowMajor)?;
/// assert_eq!(plan.segments, vec![Segment::new(4, 32)]);
/// assert_eq!(plan.shape, vec![8]);
/// assert!(plan.residual.is_empty());
/// # Ok::<(), fileslice::ArrayError>(())
/// ```
pub fn plan_segments(
    spec: &[Selector],
    shape: &[usize],
    itemsize: usize,
    offset: u64,
    order: MemoryOrder,
) -> Result<SegmentPlan> {
    plan_segments_with(
        spec,
        shape,
        itemsize,
        offset,
        order,
        &ThresholdHeuristic::default(),
    )
}

/// Same as [`plan_segments`], with a custom space heuristic.
pub fn plan_segments_with(
    spec: &[Selector],
    shape: &[usize],
    itemsize: usize,
    offset: u64,
    order: MemoryOrder,
    heuristic: &dyn SpaceHeuristic,
) -> Result<SegmentPlan> {
    let mut selectors = canonicalize(spec, shape)?.into_inner();
    let mut dims = shape.to_vec();
    // work from the fastest to the slowest varying axis
    if order == MemoryOrder::RowMajor {
        selectors.reverse();
        dims.reverse();
    }
    let ndim = dims.len();
    check_extent(&dims, shape, itemsize, offset)?;

    let mut segments = vec![Segment::new(offset, itemsize as u64)];
    let mut out_shape = Vec::with_capacity(selectors.len());
    let mut residual = Vec::with_capacity(selectors.len());
    let mut all_full = true;
    let mut stride = itemsize;
    let mut axis = 0;
    for selector in selectors {
        if selector == CanonicalSelector::NewAxis {
            out_shape.push(1);
            residual.push(ResidualSelector::Full);
            continue;
        }
        let axis_len = dims[axis];
        axis += 1;
        let plan = analyze_slice(selector, axis_len, all_full, axis == ndim, stride, heuristic)?;

        match plan.read {
            AxisSelection::Slice(s) => {
                out_shape.push(s.len());
                residual.push(plan.residual);
                if all_full && plan.layout != AxisLayout::Strided {
                    // still a single segment: widen it
                    let first = &mut segments[0];
                    first.offset += (stride * s.start as usize) as u64;
                    first.length *= s.len() as u64;
                } else {
                    let mut expanded = Vec::with_capacity(segments.len() * s.len());
                    for i in s.indices() {
                        let shift = (stride * i) as u64;
                        expanded.extend(
                            segments
                                .iter()
                                .map(|seg| Segment::new(seg.offset + shift, seg.length)),
                        );
                    }
                    segments = expanded;
                }
            }
            AxisSelection::Index(i) => {
                for segment in &mut segments {
                    segment.offset += (stride * i) as u64;
                }
            }
        }
        all_full = all_full && plan.layout == AxisLayout::Full;
        stride *= axis_len;
    }

    segments.retain(|s| s.length > 0);
    if residual.iter().all(|r| *r == ResidualSelector::Full) {
        residual.clear();
    }
    if order == MemoryOrder::RowMajor {
        out_shape.reverse();
        residual.reverse();
    }
    trace!(
        "planned {} segments for {:?} over shape {:?}",
        segments.len(),
        spec,
        shape
    );
    Ok(SegmentPlan {
        segments,
        shape: out_shape,
        residual,
    })
}

/// Make sure that every stride and byte offset of the array can be
/// addressed. `dims` runs from the fastest to the slowest varying axis.
fn check_extent(dims: &[usize], shape: &[usize], itemsize: usize, offset: u64) -> Result<()> {
    let too_large = || ArrayError::TooLarge(shape.to_vec(), itemsize);
    let mut stride = itemsize;
    for &axis_len in dims {
        stride = stride.checked_mul(axis_len).ok_or_else(too_large)?;
    }
    let _ = offset.checked_add(stride as u64).ok_or_else(too_large)?;
    Ok(())
}

/// Read the given segments from `source` and concatenate them.
///
/// # Errors
///
/// - `ShortRead` if the source ends before a segment does.
/// - `SegmentAccounting` if the bytes read do not add up to `n_bytes`.
pub fn read_segments<R>(source: &mut R, segments: &[Segment], n_bytes: usize) -> Result<Vec<u8>>
where
    R: ?Sized + ReadSeek,
{
    let mut buf = Vec::with_capacity(n_bytes);
    for segment in segments {
        let _ = source.seek(SeekFrom::Start(segment.offset))?;
        let got = Read::take(&mut *source, segment.length).read_to_end(&mut buf)? as u64;
        if got != segment.length {
            return Err(ArrayError::ShortRead(segment.offset, segment.length, got));
        }
    }
    if buf.len() != n_bytes {
        return Err(ArrayError::SegmentAccounting(n_bytes, buf.len()));
    }
    Ok(buf)
}
