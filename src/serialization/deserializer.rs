use super::{
    cookie_base, DOUBLE_HISTOGRAM_COMPRESSED_COOKIE, DOUBLE_HISTOGRAM_COOKIE, V0_COMPRESSED_COOKIE_BASE,
    V0_COOKIE_BASE, V1_COMPRESSED_COOKIE_BASE, V1_COOKIE_BASE, V2_COMPRESSED_COOKIE_BASE,
    V2_COOKIE_BASE, V2_HEADER_SIZE,
};
use crate::errors::CreationError;
use crate::Histogram;
use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use std::convert::TryFrom;
use std::io::{self, Cursor, Read};
use std::{self, error, fmt};
use tracing::debug;

/// Legacy wire versions that are recognized but not decoded.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum WireVersion {
    /// The oldest format, with a 32 byte header.
    V0,
    /// V0 inside a compressed container.
    V0Compressed,
    /// V1, which encodes counts differently from V2.
    V1,
    /// V1 inside a compressed container.
    V1Compressed,
}

impl fmt::Display for WireVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WireVersion::V0 => write!(f, "v0"),
            WireVersion::V0Compressed => write!(f, "compressed v0"),
            WireVersion::V1 => write!(f, "v1"),
            WireVersion::V1Compressed => write!(f, "compressed v1"),
        }
    }
}

/// Errors that can happen during deserialization.
#[derive(Debug)]
pub enum DeserializeError {
    /// An i/o operation failed. This includes input that ends inside the header, and corrupt
    /// compressed data.
    IoError(io::Error),
    /// The cookie (first 4 bytes) did not match that for any supported format.
    InvalidCookie,
    /// The input is a histogram in an older format that this implementation does not decode.
    UnsupportedVersion(WireVersion),
    /// The input is a histogram of floating point values.
    DoubleHistogramUnsupported,
    /// The histogram instance could not be created because the serialized parameters were invalid
    /// (e.g. lowest value, highest value, etc.)
    InvalidParameters(CreationError),
    /// The header or container claims more bytes than the input holds.
    PayloadTruncated,
    /// A varint runs past the end of the payload.
    TruncatedVarint,
    /// A run of empty slots is longer than any valid histogram could have.
    ZeroRunTooLong,
    /// The current system's pointer width cannot represent the encoded histogram.
    UsizeTypeTooSmall,
    /// The encoded array is longer than it should be for the histogram's value range.
    EncodedArrayTooLong,
}

impl std::convert::From<std::io::Error> for DeserializeError {
    fn from(e: std::io::Error) -> Self {
        DeserializeError::IoError(e)
    }
}

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeserializeError::IoError(e) => write!(f, "An i/o operation failed: {}", e),
            DeserializeError::InvalidCookie => write!(
                f,
                "The cookie (first 4 bytes) did not match that for any supported format"
            ),
            DeserializeError::UnsupportedVersion(v) => {
                write!(f, "The {} encoding is not supported", v)
            }
            DeserializeError::DoubleHistogramUnsupported => {
                write!(f, "Double histograms are not supported")
            }
            DeserializeError::InvalidParameters(e) => {
                write!(f, "The serialized parameters were invalid: {}", e)
            }
            DeserializeError::PayloadTruncated => {
                write!(f, "The input does not contain the full payload")
            }
            DeserializeError::TruncatedVarint => {
                write!(f, "A varint runs past the end of the payload")
            }
            DeserializeError::ZeroRunTooLong => {
                write!(f, "A run of empty slots exceeds i32::max_value()")
            }
            DeserializeError::UsizeTypeTooSmall => write!(
                f,
                "The current system's pointer width cannot represent the encoded histogram"
            ),
            DeserializeError::EncodedArrayTooLong => write!(
                f,
                "The encoded array is longer than it should be for the histogram's value range"
            ),
        }
    }
}

impl error::Error for DeserializeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DeserializeError::IoError(e) => Some(e),
            DeserializeError::InvalidParameters(e) => Some(e),
            _ => None,
        }
    }
}

/// Deserializer for all supported formats.
///
/// Since the serialization formats all include some magic bytes that allow reliable identification
/// of the different formats, only one Deserializer implementation is needed.
pub struct Deserializer {
    payload_buf: Vec<u8>,
    pub(super) inflated_buf: Vec<u8>,
}

impl Default for Deserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer {
    /// Create a new deserializer.
    pub fn new() -> Deserializer {
        Deserializer {
            payload_buf: Vec::new(),
            inflated_buf: Vec::new(),
        }
    }

    /// Deserialize an encoded histogram from the provided reader.
    ///
    /// Exactly one encoded histogram is consumed, so several can be read back to back from the
    /// same reader. The result is a fixed-range histogram with the encoded settings and counts.
    ///
    /// Note that `&[u8]` and `Cursor` are convenient implementations of `Read` if you have some
    /// bytes already in slice or `Vec` form.
    pub fn deserialize<R: Read>(&mut self, reader: &mut R) -> Result<Histogram, DeserializeError> {
        let cookie = reader.read_u32::<BigEndian>()?;

        if cookie == DOUBLE_HISTOGRAM_COOKIE || cookie == DOUBLE_HISTOGRAM_COMPRESSED_COOKIE {
            return Err(DeserializeError::DoubleHistogramUnsupported);
        }

        match cookie_base(cookie) {
            V2_COOKIE_BASE => self.deser_v2(reader),
            V2_COMPRESSED_COOKIE_BASE => self.deser_v2_compressed(reader),
            base => Err(unsupported(base)),
        }
    }

    fn deser_v2_compressed<R: Read>(
        &mut self,
        reader: &mut R,
    ) -> Result<Histogram, DeserializeError> {
        let compressed_len = reader.read_u32::<BigEndian>()?;
        let compressed_len =
            usize::try_from(compressed_len).map_err(|_| DeserializeError::UsizeTypeTooSmall)?;

        self.payload_buf.clear();
        reader
            .take(compressed_len as u64)
            .read_to_end(&mut self.payload_buf)?;
        if self.payload_buf.len() < compressed_len {
            return Err(DeserializeError::PayloadTruncated);
        }

        // Inflate the header first, then no more than the payload length it declares, so a small
        // container cannot expand without bound.
        self.inflated_buf.clear();
        let mut decoder = ZlibDecoder::new(self.payload_buf.as_slice());
        (&mut decoder)
            .take(V2_HEADER_SIZE as u64)
            .read_to_end(&mut self.inflated_buf)?;
        if self.inflated_buf.len() == V2_HEADER_SIZE {
            let mut declared = &self.inflated_buf[4..8];
            let declared_len = declared.read_u32::<BigEndian>()?;
            decoder
                .take(u64::from(declared_len))
                .read_to_end(&mut self.inflated_buf)?;
        }

        // The inflated bytes are a complete uncompressed histogram. Swap the buffer out so the
        // inner decode can reuse `payload_buf`.
        let inflated = std::mem::replace(&mut self.inflated_buf, Vec::new());
        let result = {
            let mut inner = inflated.as_slice();
            let inner_cookie = inner.read_u32::<BigEndian>()?;
            match cookie_base(inner_cookie) {
                V2_COOKIE_BASE => self.deser_v2(&mut inner),
                base => Err(unsupported(base)),
            }
        };
        self.inflated_buf = inflated;
        result
    }

    fn deser_v2<R: Read>(&mut self, reader: &mut R) -> Result<Histogram, DeserializeError> {
        let payload_len = reader.read_u32::<BigEndian>()?;
        let payload_len =
            usize::try_from(payload_len).map_err(|_| DeserializeError::UsizeTypeTooSmall)?;
        // normalizing index offset, not used
        let _ = reader.read_u32::<BigEndian>()?;
        let num_digits = reader.read_i32::<BigEndian>()?;
        let low = reader.read_i64::<BigEndian>()?;
        let high = reader.read_i64::<BigEndian>()?;
        // int to double conversion ratio, not used
        let _ = reader.read_f64::<BigEndian>()?;

        let num_digits = u8::try_from(num_digits)
            .map_err(|_| DeserializeError::InvalidParameters(CreationError::SigFigExceedsMax))?;
        let mut h = Histogram::new_with_bounds(low, high, num_digits)
            .map_err(DeserializeError::InvalidParameters)?;

        self.payload_buf.clear();
        reader
            .take(payload_len as u64)
            .read_to_end(&mut self.payload_buf)?;
        if self.payload_buf.len() < payload_len {
            return Err(DeserializeError::PayloadTruncated);
        }

        let payload_slice = self.payload_buf.as_slice();
        let mut payload_index: usize = 0;
        let mut decode_state = DecodeLoopState::new();

        while payload_index < payload_len.saturating_sub(9) {
            // Read with fast loop until we are within 9 of the end. Fast loop can't handle EOF,
            // so bail to slow version for the last few bytes.

            // payload_index math is safe because payload_len is a usize
            let (zz_num, bytes_read) =
                varint_read_slice(&payload_slice[payload_index..(payload_index + 9)]);
            payload_index += bytes_read;

            decode_state.on_decoded_num(zig_zag_decode(zz_num), &mut h)?;
        }

        // Now read the leftovers
        let leftover_slice = &payload_slice[payload_index..];
        let mut cursor = Cursor::new(leftover_slice);
        while cursor.position() < leftover_slice.len() as u64 {
            let zz_num =
                varint_read(&mut cursor).map_err(|_| DeserializeError::TruncatedVarint)?;

            decode_state.on_decoded_num(zig_zag_decode(zz_num), &mut h)?;
        }

        h.set_total_count(decode_state.total_count);

        Ok(h)
    }
}

fn unsupported(base: u32) -> DeserializeError {
    let version = match base {
        V0_COOKIE_BASE => WireVersion::V0,
        V0_COMPRESSED_COOKIE_BASE => WireVersion::V0Compressed,
        V1_COOKIE_BASE => WireVersion::V1,
        V1_COMPRESSED_COOKIE_BASE => WireVersion::V1Compressed,
        _ => return DeserializeError::InvalidCookie,
    };
    debug!(%version, "refusing to decode legacy histogram encoding");
    DeserializeError::UnsupportedVersion(version)
}

// Only public for testing.
/// Read from a slice that must be 9 bytes long or longer. Returns the decoded number and how many
/// bytes were consumed.
#[inline]
pub fn varint_read_slice(slice: &[u8]) -> (u64, usize) {
    let mut value: u64 = 0;
    for (i, &b) in slice.iter().take(8).enumerate() {
        value |= low_7_bits(b) << (7 * i);
        if !is_high_bit_set(b) {
            return (value, i + 1);
        }
    }

    // special case: use last byte as is
    value |= u64::from(slice[8]) << (7 * 8);

    (value, 9)
}

// Only public for testing.
/// Read a LEB128-64b9B from the buffer
pub fn varint_read<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut value: u64 = 0;
    for i in 0..8 {
        let b = reader.read_u8()?;
        value |= low_7_bits(b) << (7 * i);
        if !is_high_bit_set(b) {
            return Ok(value);
        }
    }

    // special case: use last byte as is
    let b = reader.read_u8()?;
    value |= u64::from(b) << (7 * 8);

    Ok(value)
}

/// truncate byte to low 7 bits, cast to u64
#[inline]
fn low_7_bits(b: u8) -> u64 {
    u64::from(b & 0x7F)
}

#[inline]
fn is_high_bit_set(b: u8) -> bool {
    (b & 0x80) != 0
}

// Only public for testing.
#[inline]
pub fn zig_zag_decode(encoded: u64) -> i64 {
    ((encoded >> 1) as i64) ^ -((encoded & 1) as i64)
}

/// We need to perform the same logic in two different decode loops while carrying over a modicum
/// of state.
struct DecodeLoopState {
    dest_index: usize,
    total_count: i64,
}

impl DecodeLoopState {
    fn new() -> DecodeLoopState {
        DecodeLoopState {
            dest_index: 0,
            total_count: 0,
        }
    }

    #[inline]
    fn on_decoded_num(&mut self, count_or_zeros: i64, h: &mut Histogram) -> Result<(), DeserializeError> {
        if count_or_zeros < 0 {
            if count_or_zeros < -i64::from(i32::max_value()) {
                return Err(DeserializeError::ZeroRunTooLong);
            }
            // fits in a positive i32, so in usize on anything but 16 bit targets
            let zero_count = usize::try_from(-count_or_zeros)
                .map_err(|_| DeserializeError::UsizeTypeTooSmall)?;
            // skip the zeros
            self.dest_index = self
                .dest_index
                .checked_add(zero_count)
                .ok_or(DeserializeError::UsizeTypeTooSmall)?;
        } else {
            if count_or_zeros > 0 {
                h.set_count_at_index(self.dest_index, count_or_zeros)
                    .ok_or(DeserializeError::EncodedArrayTooLong)?;
                self.total_count = self.total_count.saturating_add(count_or_zeros);
            }

            self.dest_index = self
                .dest_index
                .checked_add(1)
                .ok_or(DeserializeError::UsizeTypeTooSmall)?;
        }

        Ok(())
    }
}
