//! Serialization/deserialization support.
//!
//! Histograms are stored and shipped in the V2 binary format shared by the HDR histogram family of
//! libraries, either as-is or wrapped in a zlib-compressed container ("V2 + DEFLATE", following
//! the names used elsewhere). Both are compact: counts are written as zig-zag LEB128 varints and
//! runs of empty slots collapse into a single negative skip code.
//!
//! A stored histogram keeps every count, so stored intervals can be decoded and merged later with
//! `Histogram::add`: a day of per-minute histograms adds up to an exact histogram of the day, and
//! its 99.99th percentile is as accurate as if it had been recorded in one go. Stored percentiles
//! cannot be combined that way.
//!
//! # Wire layout
//!
//! All integers are big-endian.
//!
//! ```text
//! compressed container:  cookie: i32 | compressed_len: i32 | zlib(header + body)
//! header (40 bytes):     cookie: i32 | payload_len: i32 | normalizing_index_offset: i32
//!                        | sig_figs: i32 | lowest: i64 | highest: i64 | int_to_double_ratio: f64
//! body:                  payload_len bytes of zig-zag varints
//! ```
//!
//! The normalizing offset and the conversion ratio are written as 0 and 1.0 and ignored when
//! reading. Older wire versions (V0, V1) and double histograms are recognized by their cookies
//! and rejected with a `DeserializeError` that says which one was seen.
//!
//! # API
//!
//! `V2Serializer` and `V2DeflateSerializer` write the two formats through the `Serializer` trait.
//! A single `Deserializer` reads either, telling them apart by cookie. Both sides keep internal
//! buffers, so reuse one instance across many histograms where you can.
//! `encode_compressed` and `decode_compressed` are one-shot shortcuts.
//!
//! # Examples
//!
//! Creating, serializing, and deserializing a single histogram using a `Vec<u8>` as a `Write` and a
//! `&[u8]` slice from the vec as a `Read`.
//!
//! ```
//! use hdrhist::Histogram;
//! use hdrhist::serialization::{Deserializer, Serializer, V2Serializer};
//!
//! let mut vec = Vec::new();
//! let orig_histogram = Histogram::new(1).unwrap();
//! V2Serializer::new().serialize(&orig_histogram, &mut vec).unwrap();
//!
//! let _histogram = Deserializer::new()
//!     .deserialize(&mut vec.as_slice()).unwrap();
//! ```
//!
//! This example shows serializing several histograms into a `Vec<u8>` and deserializing them again,
//! at which point they are summed into one histogram (for further hypothetical analysis).
//!
//! ```
//! use hdrhist::Histogram;
//! use hdrhist::serialization::{Deserializer, Serializer, V2DeflateSerializer};
//! use std::io::Cursor;
//!
//! let num_histograms = 4;
//! let mut histograms = Vec::new();
//!
//! for _ in 0..num_histograms {
//!     let mut h = Histogram::new_with_bounds(1, i64::max_value(), 3).unwrap();
//!     h.record_n(42, 7).unwrap();
//!     histograms.push(h);
//! }
//!
//! let mut buf = Vec::new();
//! let mut serializer = V2DeflateSerializer::new();
//! for h in histograms.iter() {
//!     serializer.serialize(h, &mut buf).unwrap();
//! }
//!
//! let mut deserializer = Deserializer::new();
//! let mut cursor = Cursor::new(&buf);
//! let mut accumulator = Histogram::new_with_bounds(1, i64::max_value(), 3).unwrap();
//!
//! for _ in 0..num_histograms {
//!     let h = deserializer.deserialize(&mut cursor).unwrap();
//!     assert_eq!(7, h.count_at(42));
//!     assert_eq!(0, h.count_at(1000));
//!
//!     accumulator.add(h).unwrap();
//! }
//!
//! assert_eq!(num_histograms * 7, accumulator.count_at(42));
//! ```
//!
//! # Interval logs
//!
//! See the `interval_log` module.

use std::{fmt, io};

use crate::Histogram;

#[cfg(test)]
mod rand_varint;

mod v2_serializer;
pub use self::v2_serializer::{V2SerializeError, V2Serializer};

mod v2_deflate_serializer;
pub use self::v2_deflate_serializer::{V2DeflateSerializeError, V2DeflateSerializer};

mod deserializer;
pub use self::deserializer::{DeserializeError, Deserializer, WireVersion};

pub mod interval_log;

const V0_COOKIE_BASE: u32 = 0x1c84_9308;
const V0_COMPRESSED_COOKIE_BASE: u32 = 0x1c84_9309;

const V1_COOKIE_BASE: u32 = 0x1c84_9301;
const V1_COMPRESSED_COOKIE_BASE: u32 = 0x1c84_9302;

const V2_COOKIE_BASE: u32 = 0x1c84_9303;
const V2_COMPRESSED_COOKIE_BASE: u32 = 0x1c84_9304;

const V2_COOKIE: u32 = V2_COOKIE_BASE | 0x10;
const V2_COMPRESSED_COOKIE: u32 = V2_COMPRESSED_COOKIE_BASE | 0x10;

const DOUBLE_HISTOGRAM_COOKIE: u32 = 0x0c72_124e;
const DOUBLE_HISTOGRAM_COMPRESSED_COOKIE: u32 = 0x0c72_124f;

const V2_HEADER_SIZE: usize = 40;

/// The word-size bits of a cookie vary between writers; only the rest identifies the format.
#[inline]
fn cookie_base(cookie: u32) -> u32 {
    cookie & !0xF0
}

/// Histogram serializer.
///
/// Different implementations serialize to different formats.
pub trait Serializer {
    /// Error type returned when serialization fails.
    type SerializeError: fmt::Debug;

    /// Serialize the histogram into the provided writer.
    /// Returns the number of bytes written, or an error.
    ///
    /// Note that `Vec<u8>` is a reasonable `Write` implementation for simple usage.
    fn serialize<W: io::Write>(
        &mut self,
        h: &Histogram,
        writer: &mut W,
    ) -> Result<usize, Self::SerializeError>;
}

/// Encode `h` as a compressed V2 histogram into a new buffer.
///
/// This is the form interval logs carry (before base64).
pub fn encode_compressed(h: &Histogram) -> Result<Vec<u8>, V2DeflateSerializeError> {
    let mut buf = Vec::new();
    V2DeflateSerializer::new().serialize(h, &mut buf)?;
    Ok(buf)
}

/// Decode a histogram from `bytes`. Both the compressed container and plain V2 are accepted.
pub fn decode_compressed(bytes: &[u8]) -> Result<Histogram, DeserializeError> {
    let mut reader = bytes;
    Deserializer::new().deserialize(&mut reader)
}
