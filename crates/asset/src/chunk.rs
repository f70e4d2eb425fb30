//! Sequential cursor over a chunked PSK stream.
//!
//! The reader knows the header layout and byte accounting only; payload
//! interpretation lives in [`crate::psk`].

use std::{
    borrow::Cow,
    io::{self, Read, Seek, SeekFrom},
};

use byteorder::{LittleEndian, ReadBytesExt};

/// Full width of the ASCII tag field. Only the first [`CHUNK_ID_LEN`] bytes are significant.
pub const CHUNK_TAG_LEN: usize = 20;
pub const CHUNK_ID_LEN: usize = 8;
/// Tag + type flag + record size + record count.
pub const CHUNK_HEADER_LEN: u64 = CHUNK_TAG_LEN as u64 + 12;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub tag: [u8; CHUNK_TAG_LEN],
    pub type_flag: i32,
    pub record_size: i32,
    pub record_count: i32,
}

impl ChunkHeader {
    /// The significant part of the tag, e.g. `b"PNTS0000"`.
    #[inline]
    pub fn id(&self) -> &[u8] {
        &self.tag[..CHUNK_ID_LEN]
    }

    pub fn id_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.id())
    }

    /// Declared payload length, `None` when either factor is negative.
    pub fn payload_len(&self) -> Option<u64> {
        let size = u64::try_from(self.record_size).ok()?;
        let count = u64::try_from(self.record_count).ok()?;
        size.checked_mul(count)
    }
}

/// Byte cursor that tracks its position against the known stream length.
pub struct ChunkReader<R> {
    inner: R,
    len: u64,
    pos: u64,
}

impl<R: Read + Seek> ChunkReader<R> {
    /// Wrap a source positioned at its first chunk, with `len` total bytes.
    pub fn new(inner: R, len: u64) -> Self {
        Self { inner, len, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    /// `true` once the cursor sits exactly on the end of the stream.
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.len
    }

    pub fn read_header(&mut self) -> io::Result<ChunkHeader> {
        let mut tag = [0u8; CHUNK_TAG_LEN];
        self.read_exact(&mut tag)?;
        let type_flag = self.read_i32::<LittleEndian>()?;
        let record_size = self.read_i32::<LittleEndian>()?;
        let record_count = self.read_i32::<LittleEndian>()?;
        Ok(ChunkHeader {
            tag,
            type_flag,
            record_size,
            record_count,
        })
    }

    /// Advance past `n` bytes without reading them.
    pub fn skip(&mut self, n: u64) -> io::Result<()> {
        if n > self.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("skip of {n} bytes overruns stream ({} left)", self.remaining()),
            ));
        }
        let offset = i64::try_from(n)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "skip too large"))?;
        self.inner.seek(SeekFrom::Current(offset))?;
        self.pos += n;
        Ok(())
    }

    /// Read a raw span of `n` bytes.
    pub fn read_span(&mut self, n: u64) -> io::Result<Vec<u8>> {
        if n > self.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("span of {n} bytes overruns stream ({} left)", self.remaining()),
            ));
        }
        let mut buf = vec![0u8; n as usize];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<R: Read> Read for ChunkReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}
