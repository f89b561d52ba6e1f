//! Lazy, file-backed access to n-dimensional arrays.
//!
//! This crate reads arbitrary slices of arrays stored in (possibly
//! Gzip-compressed) files without loading them in full, and writes arrays
//! into narrower numeric types with automatically computed scaling
//! parameters.
//!
//! - [`fileslice`] reads a slice of a stored array, planning the fewest
//!   reasonable byte segments to fetch.
//! - [`ArrayProxy`] wraps a file and a header into a lazy, cached array.
//! - [`ArrayWriter`] and [`WriterOptions`] write arrays, scaling values
//!   to fit integer output types.
//! - The [`floating`] and [`casting`] modules hold the bit-exact numeric
//!   utilities the writer relies on.
//!
//! # Example
//!
//! ```no_run
//! use fileslice::{ArrayHeader, ArrayProxy, DataType, ElementType, FileOpener, Selector};
//!
//! let header = ArrayHeader::new(vec![64, 64, 30], ElementType::le(DataType::Int16))
//!     .with_offset(352);
//! let mut proxy: ArrayProxy<_, f32> = ArrayProxy::new(FileOpener::new("volume.nii.gz"), &header)?;
//! let plane = proxy.slice(&[Selector::from(..), Selector::from(..), Selector::Index(15)])?;
//! assert_eq!(plane.shape(), &[64, 64]);
//! # Ok::<(), fileslice::ArrayError>(())
//! ```
#![deny(missing_debug_implementations)]
#![warn(missing_docs, unused_extern_crates, trivial_casts, unused_results)]

#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate num_derive;

pub mod casting;
pub mod element;
pub mod error;
pub mod floating;
pub mod header;
pub mod opener;
pub mod proxy;
pub mod slice;
pub mod typedef;
mod util;
pub mod writer;

pub use byteordered::Endianness;
pub use casting::{finite_range, nice_round, shared_range, IntRounder, NanPolicy};
pub use element::{DataElement, Scalar};
pub use error::{ArrayError, Result};
pub use floating::{floor_exact, Extended80, IeeeFloat};
pub use header::{ArrayHeader, HeaderSource, Scaling, ScalingParams};
pub use opener::{FileLike, FileOpener, GzSeeker, KeepOpen};
pub use proxy::ArrayProxy;
pub use slice::{
    canonicalize, fileslice, fileslice_with, plan_segments, plan_segments_with, predict_shape,
    read_segments, AlwaysContiguous, AlwaysFull, AlwaysSkip, CostModelHeuristic, Segment,
    SegmentPlan, Selector, SliceRange, SpaceHeuristic, ThresholdHeuristic,
};
pub use typedef::{DataType, ElementType, Kind, MemoryOrder};
pub use util::{is_gz_file, ReadSeek};
pub use writer::{ArrayWriter, ScalingMode, WriterOptions};
