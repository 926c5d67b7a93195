//! Random-access byte sources
//!
//! Everything the decoder reads goes through positioned `(offset, length)`
//! reads. There is no cursor, so a source can be shared between threads.

use std::fs::File;
use std::io;
use std::path::Path;

/// A random-access, read-only byte source of known size
pub trait ByteSource: Send + Sync {
    /// Read into `buf` starting at `offset`, returning the bytes read.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Total size of the source in bytes
    fn size(&self) -> u64;

    /// Fill `buf` from `offset`, failing on a short read.
    fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("short read at offset {}", offset),
                    ))
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl ByteSource for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let start = match usize::try_from(offset) {
            Ok(start) if start <= self.len() => start,
            _ => return Ok(0),
        };
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl ByteSource for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// A file read with platform positioned reads
#[derive(Debug)]
pub struct FileSource {
    file: File,
    size: u64,
}

impl FileSource {
    /// Open a file and probe its size
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::from_file(file)
    }

    /// Wrap an already open file
    pub fn from_file(file: File) -> io::Result<Self> {
        let size = file.metadata()?.len();
        Ok(FileSource { file, size })
    }
}

impl ByteSource for FileSource {
    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_at(buf, offset)
    }

    // seek_read moves the OS cursor, but nothing here relies on it
    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.file.seek_read(buf, offset)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// A memory-mapped file
pub struct MmapSource {
    inner: memmap2::Mmap,
}

impl MmapSource {
    /// Map a file read-only
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the map is read-only; a concurrent truncation by another
        // process is the usual mmap caveat and is not guarded against.
        let inner = unsafe { memmap2::Mmap::map(&file)? };
        Ok(MmapSource { inner })
    }

    /// Mapped bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }
}

impl ByteSource for MmapSource {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }

    fn size(&self) -> u64 {
        self.inner.len() as u64
    }
}
