//! Private utility module
use std::io::{Read, Seek};
use std::path::Path;

/// A trait that is both Read and Seek.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Whether the file at the given path is expected to be Gzip-compressed,
/// going by its extension.
pub fn is_gz_file<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    path.as_ref()
        .extension()
        .map(|a| a.to_string_lossy() == "gz")
        .unwrap_or(false)
}
