//! Space heuristics decide when reading more bytes than needed is cheaper
//! than skipping over them.
//!
//! When every faster axis is read in full, a slice over the next axis can be
//! read as a single contiguous run, and the unwanted elements discarded in
//! memory afterwards. Whether that pays off depends on how expensive a seek
//! is compared to reading the gap.
use super::FilledSlice;
use std::fmt::Debug;

/// Default number of bytes worth reading instead of seeking past them.
pub const SKIP_THRESHOLD: usize = 256;

/// The selection made on one axis, with every bound resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisSelection {
    /// A single position.
    Index(usize),
    /// A range of positions.
    Slice(FilledSlice),
}

impl AxisSelection {
    /// The selection of a whole axis of length `len`.
    pub fn full(len: usize) -> Self {
        AxisSelection::Slice(FilledSlice::new(0, Some(len as isize), 1))
    }
}

/// What to read along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadAction {
    /// Read the whole axis.
    Full,
    /// Read one run from the first to the last selected position.
    Contiguous,
    /// Read only the selected positions, seeking past the rest.
    Skip,
}

/// Decides how to read an axis, given the selection on that axis, the
/// axis length and the byte stride between consecutive positions.
///
/// `Contiguous` is not a valid answer for an `Index` selection.
pub trait SpaceHeuristic: Debug {
    /// Decide how to read the selection.
    fn decide(&self, selection: &AxisSelection, axis_len: usize, stride: usize) -> ReadAction;
}

/// Reads over a gap whenever it is at most `skip_threshold` bytes long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdHeuristic {
    /// Largest gap, in bytes, that is read rather than skipped.
    pub skip_threshold: usize,
}

impl Default for ThresholdHeuristic {
    fn default() -> Self {
        ThresholdHeuristic {
            skip_threshold: SKIP_THRESHOLD,
        }
    }
}

impl ThresholdHeuristic {
    /// Create a heuristic with the given threshold, in bytes.
    pub fn new(skip_threshold: usize) -> Self {
        ThresholdHeuristic { skip_threshold }
    }
}

impl SpaceHeuristic for ThresholdHeuristic {
    fn decide(&self, selection: &AxisSelection, axis_len: usize, stride: usize) -> ReadAction {
        let threshold = self.skip_threshold;
        match selection {
            AxisSelection::Index(_) => {
                if axis_len.saturating_sub(1).saturating_mul(stride) <= threshold {
                    ReadAction::Full
                } else {
                    ReadAction::Skip
                }
            }
            AxisSelection::Slice(slice) => {
                if slice.step.unsigned_abs().saturating_mul(stride) > threshold {
                    return ReadAction::Skip;
                }
                let positive = slice.positive();
                let span = (positive.stop.unwrap_or(0) - positive.start).max(0) as usize;
                if axis_len.saturating_sub(span).saturating_mul(stride) <= threshold {
                    ReadAction::Full
                } else {
                    ReadAction::Contiguous
                }
            }
        }
    }
}

/// Weighs the cost of a seek against the cost of reading the bytes it
/// would skip.
///
/// This is equivalent to a [`ThresholdHeuristic`] with a threshold of
/// `seek_ns / byte_ns` bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModelHeuristic {
    /// Estimated cost of one seek, in nanoseconds.
    pub seek_ns: f64,
    /// Estimated cost of reading one byte, in nanoseconds.
    pub byte_ns: f64,
}

impl CostModelHeuristic {
    /// Costs for data held in a memory buffer.
    pub fn in_memory() -> Self {
        CostModelHeuristic {
            seek_ns: 50.,
            byte_ns: 0.2,
        }
    }

    /// Costs for an uncompressed file read through the operating system.
    pub fn file() -> Self {
        CostModelHeuristic {
            seek_ns: 1_000.,
            byte_ns: 1.,
        }
    }

    /// Costs for a compressed stream, where forward seeks decompress the
    /// skipped bytes anyway.
    pub fn compressed() -> Self {
        CostModelHeuristic {
            seek_ns: 40_000.,
            byte_ns: 5.,
        }
    }

    /// The gap size, in bytes, at which seeking becomes cheaper.
    pub fn threshold(&self) -> usize {
        if self.byte_ns <= 0. {
            return usize::MAX;
        }
        (self.seek_ns / self.byte_ns).max(0.) as usize
    }
}

impl SpaceHeuristic for CostModelHeuristic {
    fn decide(&self, selection: &AxisSelection, axis_len: usize, stride: usize) -> ReadAction {
        ThresholdHeuristic::new(self.threshold()).decide(selection, axis_len, stride)
    }
}

/// Always reads whole axes when allowed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysFull;

impl SpaceHeuristic for AlwaysFull {
    fn decide(&self, _: &AxisSelection, _: usize, _: usize) -> ReadAction {
        ReadAction::Full
    }
}

/// Always reads slices as one contiguous run, and indices exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysContiguous;

impl SpaceHeuristic for AlwaysContiguous {
    fn decide(&self, selection: &AxisSelection, _: usize, _: usize) -> ReadAction {
        match selection {
            AxisSelection::Index(_) => ReadAction::Skip,
            AxisSelection::Slice(_) => ReadAction::Contiguous,
        }
    }
}

/// Never reads more than the selected positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysSkip;

impl SpaceHeuristic for AlwaysSkip {
    fn decide(&self, _: &AxisSelection, _: usize, _: usize) -> ReadAction {
        ReadAction::Skip
    }
}
