//! Typed little-endian storage used for mesh blobs and actor save state.
//!
//! Strings are stored as a 16-bit length followed by the raw bytes, with no
//! terminator.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::Vec3;

use crate::error::StorageError;

pub type StorageResult<T> = Result<T, StorageError>;

/// An abstract read/write stream of typed primitives.
///
/// Implementations only need to provide the byte-level primitives; strings
/// and vectors are layered on top.
pub trait Storage {
    fn is_read_mode(&self) -> bool;
    fn is_write_mode(&self) -> bool;

    fn read_u8(&mut self) -> StorageResult<u8>;
    fn read_u16(&mut self) -> StorageResult<u16>;
    fn read_u32(&mut self) -> StorageResult<u32>;
    fn read_f32(&mut self) -> StorageResult<f32>;
    fn read_bytes(&mut self, len: usize) -> StorageResult<Vec<u8>>;

    fn write_u8(&mut self, value: u8) -> StorageResult<()>;
    fn write_u16(&mut self, value: u16) -> StorageResult<()>;
    fn write_u32(&mut self, value: u32) -> StorageResult<()>;
    fn write_f32(&mut self, value: f32) -> StorageResult<()>;
    fn write_bytes(&mut self, bytes: &[u8]) -> StorageResult<()>;

    fn read_string(&mut self) -> StorageResult<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8(bytes)?)
    }

    fn write_string(&mut self, value: &str) -> StorageResult<()> {
        let len = u16::try_from(value.len()).map_err(|_| StorageError::StringTooLong(value.len()))?;
        self.write_u16(len)?;
        self.write_bytes(value.as_bytes())
    }

    fn read_vec3(&mut self) -> StorageResult<Vec3> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        Ok(Vec3::new(x, y, z))
    }

    fn write_vec3(&mut self, value: Vec3) -> StorageResult<()> {
        self.write_f32(value.x)?;
        self.write_f32(value.y)?;
        self.write_f32(value.z)
    }
}

// ============================================================================
// Shared stream plumbing
// ============================================================================

enum Stream<R, W> {
    Reader(R),
    Writer(W),
}

impl<R: Read, W: Write> Stream<R, W> {
    fn reader(&mut self) -> StorageResult<&mut R> {
        match self {
            Stream::Reader(r) => Ok(r),
            Stream::Writer(_) => Err(StorageError::WrongMode("reading")),
        }
    }

    fn writer(&mut self) -> StorageResult<&mut W> {
        match self {
            Stream::Writer(w) => Ok(w),
            Stream::Reader(_) => Err(StorageError::WrongMode("writing")),
        }
    }
}

macro_rules! impl_stream_storage {
    ($ty:ty) => {
        impl Storage for $ty {
            fn is_read_mode(&self) -> bool {
                matches!(self.stream, Stream::Reader(_))
            }

            fn is_write_mode(&self) -> bool {
                matches!(self.stream, Stream::Writer(_))
            }

            fn read_u8(&mut self) -> StorageResult<u8> {
                Ok(self.stream.reader()?.read_u8()?)
            }

            fn read_u16(&mut self) -> StorageResult<u16> {
                Ok(self.stream.reader()?.read_u16::<LittleEndian>()?)
            }

            fn read_u32(&mut self) -> StorageResult<u32> {
                Ok(self.stream.reader()?.read_u32::<LittleEndian>()?)
            }

            fn read_f32(&mut self) -> StorageResult<f32> {
                Ok(self.stream.reader()?.read_f32::<LittleEndian>()?)
            }

            fn read_bytes(&mut self, len: usize) -> StorageResult<Vec<u8>> {
                let mut bytes = vec![0; len];
                self.stream.reader()?.read_exact(&mut bytes)?;
                Ok(bytes)
            }

            fn write_u8(&mut self, value: u8) -> StorageResult<()> {
                Ok(self.stream.writer()?.write_u8(value)?)
            }

            fn write_u16(&mut self, value: u16) -> StorageResult<()> {
                Ok(self.stream.writer()?.write_u16::<LittleEndian>(value)?)
            }

            fn write_u32(&mut self, value: u32) -> StorageResult<()> {
                Ok(self.stream.writer()?.write_u32::<LittleEndian>(value)?)
            }

            fn write_f32(&mut self, value: f32) -> StorageResult<()> {
                Ok(self.stream.writer()?.write_f32::<LittleEndian>(value)?)
            }

            fn write_bytes(&mut self, bytes: &[u8]) -> StorageResult<()> {
                Ok(self.stream.writer()?.write_all(bytes)?)
            }
        }
    };
}

// ============================================================================
// In-memory buffer
// ============================================================================

/// Storage over an owned byte buffer.
pub struct MemoryStorage {
    stream: Stream<Cursor<Vec<u8>>, Vec<u8>>,
}

impl MemoryStorage {
    /// Opens `bytes` for reading from the start.
    pub fn reader(bytes: Vec<u8>) -> Self {
        Self {
            stream: Stream::Reader(Cursor::new(bytes)),
        }
    }

    /// Opens an empty buffer for writing.
    pub fn writer() -> Self {
        Self {
            stream: Stream::Writer(Vec::new()),
        }
    }

    /// Bytes not yet consumed (read mode) or written so far (write mode).
    pub fn remaining(&self) -> usize {
        match &self.stream {
            Stream::Reader(c) => c.get_ref().len().saturating_sub(c.position() as usize),
            Stream::Writer(w) => w.len(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self.stream {
            Stream::Reader(c) => c.into_inner(),
            Stream::Writer(w) => w,
        }
    }
}

impl_stream_storage!(MemoryStorage);

// ============================================================================
// File handle
// ============================================================================

/// Storage over a buffered file handle.
pub struct FileStorage {
    stream: Stream<BufReader<File>, BufWriter<File>>,
}

impl FileStorage {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self {
            stream: Stream::Reader(BufReader::new(File::open(path)?)),
        })
    }

    pub fn create(path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self {
            stream: Stream::Writer(BufWriter::new(File::create(path)?)),
        })
    }

    /// Flushes buffered writes. Dropping the storage also flushes, but
    /// silently discards any error.
    pub fn flush(&mut self) -> StorageResult<()> {
        if let Stream::Writer(w) = &mut self.stream {
            w.flush()?;
        }
        Ok(())
    }
}

impl_stream_storage!(FileStorage);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_use_a_16_bit_prefix_without_terminator() {
        let mut out = MemoryStorage::writer();
        out.write_string("race").unwrap();
        assert_eq!(out.into_bytes(), vec![4, 0, b'r', b'a', b'c', b'e']);
    }

    #[test]
    fn mixed_primitives_read_back_in_order() {
        let mut out = MemoryStorage::writer();
        out.write_u8(7).unwrap();
        out.write_u32(0xDEAD_BEEF).unwrap();
        out.write_vec3(Vec3::new(1.0, -2.5, 3.0)).unwrap();
        out.write_string("").unwrap();

        let mut input = MemoryStorage::reader(out.into_bytes());
        assert!(input.is_read_mode());
        assert_eq!(input.read_u8().unwrap(), 7);
        assert_eq!(input.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(input.read_vec3().unwrap(), Vec3::new(1.0, -2.5, 3.0));
        assert_eq!(input.read_string().unwrap(), "");
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn reading_past_the_end_is_an_error() {
        let mut input = MemoryStorage::reader(vec![1]);
        assert!(matches!(input.read_u16(), Err(StorageError::Io(_))));
    }

    #[test]
    fn writer_refuses_reads() {
        let mut out = MemoryStorage::writer();
        assert!(matches!(out.read_u8(), Err(StorageError::WrongMode(_))));
    }
}
