use super::v2_serializer::{V2SerializeError, V2Serializer};
use super::{Serializer, V2_COMPRESSED_COOKIE};
use crate::Histogram;
use byteorder::{BigEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Write};
use std::{error, fmt, mem};

/// Errors that occur while writing the compressed container.
#[derive(Debug)]
pub enum V2DeflateSerializeError {
    /// Encoding the uncompressed V2 message failed.
    Encode(V2SerializeError),
    /// Compressing, or writing the result, failed.
    IoError(io::Error),
}

impl From<io::Error> for V2DeflateSerializeError {
    fn from(e: io::Error) -> Self {
        V2DeflateSerializeError::IoError(e)
    }
}

impl fmt::Display for V2DeflateSerializeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            V2DeflateSerializeError::Encode(e) => write!(f, "Encoding the histogram failed: {}", e),
            V2DeflateSerializeError::IoError(e) => write!(f, "An i/o operation failed: {}", e),
        }
    }
}

impl error::Error for V2DeflateSerializeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            V2DeflateSerializeError::Encode(e) => Some(e),
            V2DeflateSerializeError::IoError(e) => Some(e),
        }
    }
}

/// Serializer for the V2 + DEFLATE binary format: a plain V2 message, zlib-compressed, behind an
/// 8 byte container header (cookie, compressed length).
///
/// The "deflate" name is the one other implementations use; the payload is zlib's wrapper around
/// DEFLATE, not raw DEFLATE.
pub struct V2DeflateSerializer {
    v2_serializer: V2Serializer,
    v2_buf: Vec<u8>,
    compressed_buf: Vec<u8>,
}

impl Default for V2DeflateSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl V2DeflateSerializer {
    /// Create a new serializer.
    pub fn new() -> V2DeflateSerializer {
        V2DeflateSerializer {
            v2_serializer: V2Serializer::new(),
            v2_buf: Vec::new(),
            compressed_buf: Vec::new(),
        }
    }
}

impl Serializer for V2DeflateSerializer {
    type SerializeError = V2DeflateSerializeError;

    fn serialize<W: Write>(
        &mut self,
        h: &Histogram,
        writer: &mut W,
    ) -> Result<usize, V2DeflateSerializeError> {
        self.v2_buf.clear();
        self.v2_serializer
            .serialize(h, &mut self.v2_buf)
            .map_err(V2DeflateSerializeError::Encode)?;

        let mut out = mem::take(&mut self.compressed_buf);
        out.clear();
        let mut encoder = ZlibEncoder::new(out, Compression::default());
        encoder.write_all(&self.v2_buf)?;
        self.compressed_buf = encoder.finish()?;

        // the largest counts array encodes to tens of MiB, far below u32::MAX
        let compressed_len = self.compressed_buf.len();
        writer.write_u32::<BigEndian>(V2_COMPRESSED_COOKIE)?;
        writer.write_u32::<BigEndian>(compressed_len as u32)?;
        writer.write_all(&self.compressed_buf)?;

        Ok(8 + compressed_len)
    }
}
