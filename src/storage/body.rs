//! Upload bodies
//!
//! Small uploads stay in memory. Once a body grows past the spool threshold it
//! moves to a temporary file, and the object store streams it from disk with a
//! known length. The file is removed when the body is dropped.

use aws_sdk_s3::primitives::{ByteStream, ByteStreamError};
use bytes::{Bytes, BytesMut};
use std::io;
use std::path::Path;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Default size above which an upload is spooled to disk (8 MiB)
pub const DEFAULT_SPOOL_THRESHOLD: usize = 8 * 1024 * 1024;

/// Object contents ready to be written
#[derive(Debug)]
pub struct ObjectBody {
    repr: Repr,
    len: u64,
}

#[derive(Debug)]
enum Repr {
    Memory(Bytes),
    Spooled(TempPath),
}

impl ObjectBody {
    /// Body held in memory
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            len: data.len() as u64,
            repr: Repr::Memory(data),
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the contents live in a temporary file
    pub fn is_spooled(&self) -> bool {
        matches!(self.repr, Repr::Spooled(_))
    }

    /// Location of the spool file, if any
    pub fn path(&self) -> Option<&Path> {
        match &self.repr {
            Repr::Memory(_) => None,
            Repr::Spooled(path) => Some(&**path),
        }
    }

    /// Read the whole body into memory
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        match self.repr {
            Repr::Memory(data) => Ok(data),
            Repr::Spooled(path) => Ok(Bytes::from(tokio::fs::read(&path).await?)),
        }
    }

    /// Stream for the SDK
    ///
    /// A spooled stream reads the file lazily, so `self` must outlive the
    /// request that consumes it.
    pub(crate) async fn byte_stream(&self) -> Result<ByteStream, ByteStreamError> {
        match &self.repr {
            Repr::Memory(data) => Ok(ByteStream::from(data.clone())),
            Repr::Spooled(path) => ByteStream::from_path(path).await,
        }
    }
}

/// Collects a body chunk by chunk, moving it to disk past `threshold` bytes
pub struct Spool {
    threshold: usize,
    buffer: BytesMut,
    file: Option<(File, TempPath)>,
    len: u64,
}

impl Spool {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            buffer: BytesMut::new(),
            file: None,
            len: 0,
        }
    }

    /// Append a chunk
    pub async fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.len += chunk.len() as u64;

        if let Some((file, _)) = &mut self.file {
            return file.write_all(chunk).await;
        }

        if self.buffer.len() + chunk.len() <= self.threshold {
            self.buffer.extend_from_slice(chunk);
            return Ok(());
        }

        let (file, path) = tempfile::NamedTempFile::new()?.into_parts();
        let mut file = File::from_std(file);
        file.write_all(&self.buffer).await?;
        file.write_all(chunk).await?;
        self.buffer = BytesMut::new();
        self.file = Some((file, path));
        Ok(())
    }

    /// Bytes written so far
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finish writing and hand over the body
    pub async fn finish(self) -> io::Result<ObjectBody> {
        let repr = match self.file {
            Some((mut file, path)) => {
                file.flush().await?;
                Repr::Spooled(path)
            }
            None => Repr::Memory(self.buffer.freeze()),
        };

        Ok(ObjectBody {
            repr,
            len: self.len,
        })
    }
}
