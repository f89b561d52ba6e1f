//! File-like data sources for array proxies.
//!
//! A proxy does not hold an open file by default: a [`FileOpener`] opens
//! the file on every access and closes it afterwards, so that several
//! proxies can share a path. [`KeepOpen`] keeps a single handle instead,
//! which saves reopening (and, for compressed streams, decompressing from
//! the start) on every access.
use crate::error::Result;
use crate::util::{is_gz_file, ReadSeek};
use flate2::bufread::GzDecoder;
use log::trace;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A source of bytes that grants temporary access to a seekable reader.
pub trait FileLike {
    /// Run `f` with a reader over the data.
    fn with_reader<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn ReadSeek) -> Result<T>;
}

/// Opens a file for every access. Files with the ".gz" extension are
/// decoded as Gzip streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileOpener {
    path: PathBuf,
}

impl FileOpener {
    /// Create an opener for the given path. The file is not opened yet.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileOpener {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileLike for FileOpener {
    fn with_reader<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn ReadSeek) -> Result<T>,
    {
        trace!("opening {}", self.path.display());
        let file = BufReader::new(File::open(&self.path)?);
        if is_gz_file(&self.path) {
            f(&mut GzSeeker::new(file))
        } else {
            let mut file = file;
            f(&mut file)
        }
    }
}

/// Keeps one reader open for its whole lifetime.
pub struct KeepOpen<R> {
    inner: R,
}

impl<R> fmt::Debug for KeepOpen<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KeepOpen").finish()
    }
}

impl<R> KeepOpen<R>
where
    R: ReadSeek,
{
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        KeepOpen { inner }
    }

    /// Retrieve the reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// A reference to the reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

impl KeepOpen<Box<dyn ReadSeek>> {
    /// Open the file at the given path once, decoding it as a Gzip stream
    /// if it has the ".gz" extension.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = BufReader::new(File::open(&path)?);
        let inner: Box<dyn ReadSeek> = if is_gz_file(&path) {
            Box::new(GzSeeker::new(file))
        } else {
            Box::new(file)
        };
        Ok(KeepOpen { inner })
    }
}

impl<R> FileLike for KeepOpen<R>
where
    R: ReadSeek,
{
    fn with_reader<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn ReadSeek) -> Result<T>,
    {
        f(&mut self.inner)
    }
}

/// A Gzip decoder that can seek.
///
/// Seeking forward decompresses and discards the bytes in between. Seeking
/// backward restarts decompression from the beginning of the underlying
/// stream. Seeking from the end is not supported, since the decompressed
/// length is unknown.
pub struct GzSeeker<R> {
    decoder: Option<GzDecoder<R>>,
    pos: u64,
}

impl<R> fmt::Debug for GzSeeker<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("GzSeeker").field("pos", &self.pos).finish()
    }
}

impl<R> GzSeeker<R>
where
    R: BufRead + Seek,
{
    /// Decode the Gzip stream in `inner`, which starts at its current
    /// position. Rewinding goes back to the beginning of `inner`.
    pub fn new(inner: R) -> Self {
        GzSeeker {
            decoder: Some(GzDecoder::new(inner)),
            pos: 0,
        }
    }

    /// Retrieve the underlying compressed stream.
    pub fn into_inner(self) -> Option<R> {
        self.decoder.map(GzDecoder::into_inner)
    }

    fn decoder(&mut self) -> io::Result<&mut GzDecoder<R>> {
        self.decoder.as_mut().ok_or_else(lost_stream)
    }

    fn rewind_stream(&mut self) -> io::Result<()> {
        let decoder = self.decoder.take().ok_or_else(lost_stream)?;
        let mut inner = decoder.into_inner();
        let _ = inner.seek(SeekFrom::Start(0))?;
        self.decoder = Some(GzDecoder::new(inner));
        self.pos = 0;
        Ok(())
    }
}

impl<R> Read for GzSeeker<R>
where
    R: BufRead + Seek,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decoder()?.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R> Seek for GzSeeker<R>
where
    R: BufRead + Seek,
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p,
            SeekFrom::Current(d) => {
                let p = self.pos as i64 + d;
                if p < 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "seek to a negative position",
                    ));
                }
                p as u64
            }
            SeekFrom::End(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "cannot seek from the end of a Gzip stream",
                ));
            }
        };
        if target < self.pos {
            self.rewind_stream()?;
        }
        let gap = target - self.pos;
        if gap > 0 {
            let skipped = io::copy(&mut self.decoder()?.take(gap), &mut io::sink())?;
            // stops early at the end of the stream
            self.pos += skipped;
        }
        Ok(self.pos)
    }
}

fn lost_stream() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "Gzip stream lost after a failed rewind")
}
