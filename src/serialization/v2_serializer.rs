use super::{Serializer, V2_COOKIE, V2_HEADER_SIZE};
use crate::Histogram;
use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};
use std::{error, fmt};

/// Errors that occur during serialization.
#[derive(Debug)]
pub enum V2SerializeError {
    /// Internal calculations cannot be represented in `usize`. Use smaller histograms or beefier
    /// hardware.
    UsizeTypeTooSmall,
    /// An i/o operation failed.
    IoError(io::Error),
}

impl std::convert::From<std::io::Error> for V2SerializeError {
    fn from(e: std::io::Error) -> Self {
        V2SerializeError::IoError(e)
    }
}

impl fmt::Display for V2SerializeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            V2SerializeError::UsizeTypeTooSmall => {
                write!(f, "Internal calculations cannot be represented in `usize`")
            }
            V2SerializeError::IoError(e) => write!(f, "An i/o operation failed: {}", e),
        }
    }
}

impl error::Error for V2SerializeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            V2SerializeError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// Serializer for the V2 binary format.
pub struct V2Serializer {
    buf: Vec<u8>,
}

impl Default for V2Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl V2Serializer {
    /// Create a new serializer.
    pub fn new() -> V2Serializer {
        V2Serializer { buf: Vec::new() }
    }
}

impl Serializer for V2Serializer {
    type SerializeError = V2SerializeError;

    fn serialize<W: Write>(
        &mut self,
        h: &Histogram,
        writer: &mut W,
    ) -> Result<usize, V2SerializeError> {
        self.buf.clear();
        let max_size = max_encoded_size(h).ok_or(V2SerializeError::UsizeTypeTooSmall)?;
        self.buf.reserve(max_size);

        let config = h.config();
        self.buf.write_u32::<BigEndian>(V2_COOKIE)?;
        // placeholder for length
        self.buf.write_u32::<BigEndian>(0)?;
        // normalizing index offset
        self.buf.write_u32::<BigEndian>(0)?;
        self.buf.write_u32::<BigEndian>(u32::from(config.sig_figs))?;
        self.buf.write_i64::<BigEndian>(config.lowest_discernible)?;
        self.buf.write_i64::<BigEndian>(config.highest_trackable)?;
        // int to double conversion
        self.buf.write_f64::<BigEndian>(1.0)?;

        debug_assert_eq!(V2_HEADER_SIZE, self.buf.len());

        // zero-filled room for the worst case; trimmed once we know the real length
        self.buf.resize(max_size, 0);
        let counts_len = encode_counts(h, &mut self.buf[V2_HEADER_SIZE..]);
        let total_len = V2_HEADER_SIZE + counts_len;

        // counts is always under 2^24 entries of at most 9 bytes
        (&mut self.buf[4..8]).write_u32::<BigEndian>(counts_len as u32)?;

        writer
            .write_all(&self.buf[0..total_len])
            .map(|_| total_len)
            .map_err(V2SerializeError::IoError)
    }
}

fn max_encoded_size(h: &Histogram) -> Option<usize> {
    counts_array_max_encoded_size(h.last_nonzero_index().unwrap_or(0) + 1)
        .and_then(|x| x.checked_add(V2_HEADER_SIZE))
}

// Only public for testing.
pub fn counts_array_max_encoded_size(length: usize) -> Option<usize> {
    // LEB128-64b9B uses at most 9 bytes
    length.checked_mul(9)
}

// Only public for testing.
/// Encode the counts array, up to and including the last non-zero slot, into `buf`.
/// The slice must be at least 9 * the number of counts that will be encoded.
///
/// Each token is a zig-zag varint: a non-negative token is the count of one slot, a negative one
/// skips that many empty slots. An empty histogram still encodes its first slot, as a single 0.
pub fn encode_counts(h: &Histogram, buf: &mut [u8]) -> usize {
    let counts = h.counts();
    let end = h.last_nonzero_index().map_or(1, |i| i + 1);
    let mut index = 0;
    let mut written = 0;

    while index < end {
        let run = counts[index..end].iter().take_while(|&&c| c == 0).count();
        // a lone empty slot is as short written as a plain 0
        let token = if run > 1 {
            // at most the whole counts array, which is well under 2^31 slots
            -(run as i64)
        } else {
            counts[index]
        };
        index += run.max(1);

        written += varint_write(zig_zag_encode(token), &mut buf[written..]);
    }

    written
}

// Only public for testing.
/// Write `input` as a LEB128-64b9B varint: little endian groups of 7 bits, each with the high bit
/// set when more follow. Unlike protobuf's LEB128, a 64 bit value takes at most 9 bytes, because
/// the ninth byte carries the top 8 bits whole.
/// Returns the number of bytes written (in [1, 9]).
#[inline]
pub fn varint_write(input: u64, buf: &mut [u8]) -> usize {
    let mut rest = input;
    for (i, byte) in buf.iter_mut().take(8).enumerate() {
        if rest < 0x80 {
            *byte = rest as u8;
            return i + 1;
        }
        *byte = (rest as u8 & 0x7F) | 0x80;
        rest >>= 7;
    }
    buf[8] = rest as u8;
    9
}

// Only public for testing.
/// Map signed numbers to unsigned: 0 to 0, -1 to 1, 1 to 2, -2 to 3, etc
#[inline]
pub fn zig_zag_encode(num: i64) -> u64 {
    // If num < 0, num >> 63 is all 1 and vice versa.
    ((num << 1) ^ (num >> 63)) as u64
}
