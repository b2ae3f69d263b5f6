//! Interval log parsing and writing.
//!
//! Interval logs are a way to record a sequence of histograms over time. Suppose you were running
//! a load test for an hour: you might want to record a histogram per second or minute so that you
//! could correlate measurements with behavior you might see in logs, etc. The format is shared with
//! the other HDR histogram implementations, so logs written here can be read by their tooling and
//! vice versa.
//!
//! A log is UTF-8 text, one record per line:
//!
//! ```text
//! #[StartTime: 1441812279.474 (seconds since epoch)]
//! #[BaseTime: 1441812123.000 (seconds since epoch)]
//! #any other comment
//! "StartTimestamp","Interval_Length","Interval_Max","Interval_Compressed_Histogram"
//! 0.127,1.007,2.769,HISTFAAAAC94Ak3NsQ...
//! Tag=t,1.134,1.000,3.112,HISTFAAAAC94Ak3Nsw...
//! ```
//!
//! Each interval line holds a start timestamp and an interval length in fractional seconds, the
//! interval's max value (informational only; it is not read back) and the base64 text of a
//! compressed V2 histogram. Fields are separated by commas, spaces or line breaks. Tags are
//! accepted and ignored.
//!
//! # Timestamps
//!
//! When a BaseTime is present, interval timestamps are seconds since BaseTime. When it is absent,
//! the reader decides once, at the first interval, how to interpret them: if that timestamp is more
//! than a year before StartTime, timestamps are taken to be offsets from StartTime, otherwise they
//! are seconds since the epoch. A log without StartTime uses its first interval's timestamp as
//! StartTime, so its timestamps are read as absolute.
//!
//! Every histogram a `LogReader` yields carries absolute (wall-clock) start and end times.
//!
//! # Examples
//!
//! Write a log, then read it back.
//!
//! ```
//! use std::time::{Duration, UNIX_EPOCH};
//! use hdrhist::Histogram;
//! use hdrhist::serialization::interval_log::{LogReader, LogWriter};
//!
//! let start = UNIX_EPOCH + Duration::from_secs(1_500_000_000);
//!
//! let mut h = Histogram::new(3).unwrap();
//! h.record(12345).unwrap();
//! h.set_start_time(start);
//! h.set_end_time(start + Duration::from_secs(1));
//!
//! let mut buf = Vec::new();
//! {
//!     let mut writer = LogWriter::new(&mut buf);
//!     writer.write_comment("Comments are great").unwrap();
//!     writer.write_start_time(start).unwrap();
//!     writer.write_base_time(start).unwrap();
//!     writer.set_base_time(start);
//!     writer.write_legend().unwrap();
//!     writer.write_interval_histogram(&h).unwrap();
//! }
//!
//! let histograms = LogReader::new(buf.as_slice())
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//! assert_eq!(1, histograms.len());
//! assert_eq!(1, histograms[0].count_at(12345));
//! assert_eq!(Some(start), histograms[0].start_time());
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use std::{error, fmt, io};

use nom::bytes::complete::{tag, take_till};
use nom::character::complete::{satisfy, space0};
use nom::combinator::{all_consuming, opt};
use nom::number::complete::double;
use nom::sequence::{pair, preceded, terminated};
use nom::IResult;
use tracing::{debug, warn};

use super::{DeserializeError, Deserializer, Serializer, V2DeflateSerializeError, V2DeflateSerializer};
use crate::Histogram;

const START_TIME_PREFIX: &str = "#[StartTime:";
const BASE_TIME_PREFIX: &str = "#[BaseTime:";
const LEGEND_PREFIX: &str = "\"StartTimestamp\"";
const LEGEND: &str =
    "\"StartTimestamp\",\"Interval_Length\",\"Interval_Max\",\"Interval_Compressed_Histogram\"";

/// The max value column is conventionally written in milliseconds of a nanosecond-valued
/// histogram.
const DEFAULT_MAX_VALUE_DIVISOR: f64 = 1_000_000.0;

/// Timestamps within a year of StartTime are taken to be absolute.
const ONE_YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Errors that can occur while writing a log.
#[derive(Debug)]
pub enum LogWriteError {
    /// An i/o error occurred.
    Io(io::Error),
    /// The histogram has no start or end time, so its interval cannot be written.
    MissingTimestamps,
    /// Histogram serialization failed.
    Serialize(V2DeflateSerializeError),
}

impl From<io::Error> for LogWriteError {
    fn from(e: io::Error) -> Self {
        LogWriteError::Io(e)
    }
}

impl fmt::Display for LogWriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogWriteError::Io(e) => write!(f, "An i/o error occurred: {}", e),
            LogWriteError::MissingTimestamps => {
                write!(f, "The histogram must have both a start and an end time")
            }
            LogWriteError::Serialize(e) => write!(f, "Histogram serialization failed: {}", e),
        }
    }
}

impl error::Error for LogWriteError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LogWriteError::Io(e) => Some(e),
            LogWriteError::Serialize(e) => Some(e),
            LogWriteError::MissingTimestamps => None,
        }
    }
}

/// Writes histograms, and the metadata around them, as an interval log.
///
/// Header lines are not written automatically; call the `write_*` methods in the order you want
/// them to appear, typically:
///
/// ```
/// use std::time::SystemTime;
/// use hdrhist::serialization::interval_log::LogWriter;
///
/// let now = SystemTime::now();
/// let mut writer = LogWriter::new(Vec::new());
/// writer.write_start_time(now).unwrap();
/// writer.set_base_time(now);
/// writer.write_legend().unwrap();
/// // ... then one write_interval_histogram per interval
/// ```
pub struct LogWriter<W: io::Write> {
    writer: W,
    base_time: Option<SystemTime>,
    max_value_divisor: f64,
    serializer: V2DeflateSerializer,
    serialize_buf: Vec<u8>,
    text_buf: String,
}

impl<W: io::Write> LogWriter<W> {
    /// Create a log writer on top of `writer`.
    pub fn new(writer: W) -> LogWriter<W> {
        LogWriter {
            writer,
            base_time: None,
            max_value_divisor: DEFAULT_MAX_VALUE_DIVISOR,
            serializer: V2DeflateSerializer::new(),
            serialize_buf: Vec::new(),
            text_buf: String::new(),
        }
    }

    /// Set a max value divisor.
    ///
    /// The max value column is only for human consumption, and is written as the histogram's max
    /// divided by this. The default of 10<sup>6</sup> turns nanoseconds into milliseconds.
    pub fn with_max_value_divisor(mut self, max_value_divisor: f64) -> LogWriter<W> {
        self.max_value_divisor = max_value_divisor;
        self
    }

    /// Write a StartTime header line.
    pub fn write_start_time(&mut self, start: SystemTime) -> io::Result<()> {
        writeln!(
            self.writer,
            "{} {:.3} (seconds since epoch)]",
            START_TIME_PREFIX,
            millis_as_fp_seconds(millis_since_epoch(start))
        )
    }

    /// Write a BaseTime header line. This does not change how intervals are written; see
    /// `set_base_time`.
    pub fn write_base_time(&mut self, base: SystemTime) -> io::Result<()> {
        writeln!(
            self.writer,
            "{} {:.3} (seconds since epoch)]",
            BASE_TIME_PREFIX,
            millis_as_fp_seconds(millis_since_epoch(base))
        )
    }

    /// Make interval timestamps written from now on relative to `base`.
    ///
    /// Readers only know about the base time if it is also written with `write_base_time`, or if
    /// it is the log's StartTime.
    pub fn set_base_time(&mut self, base: SystemTime) {
        self.base_time = Some(base);
    }

    /// The base time interval timestamps are written relative to, if any.
    pub fn base_time(&self) -> Option<SystemTime> {
        self.base_time
    }

    /// Write a comment line.
    ///
    /// Comments containing '\n' will be transformed into multiple lines of comments.
    pub fn write_comment(&mut self, s: &str) -> io::Result<()> {
        for l in s.split('\n') {
            writeln!(self.writer, "#{}", l)?;
        }
        Ok(())
    }

    /// Write the CSV legend line.
    pub fn write_legend(&mut self) -> io::Result<()> {
        writeln!(self.writer, "{}", LEGEND)
    }

    /// Write `h` as one interval line.
    ///
    /// The interval is the histogram's start and end time, both of which must be set. Times are
    /// written to millisecond precision, relative to the base time if one is set.
    pub fn write_interval_histogram(&mut self, h: &Histogram) -> Result<(), LogWriteError> {
        let (start, end) = match (h.start_time(), h.end_time()) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(LogWriteError::MissingTimestamps),
        };

        let start_millis = match self.base_time {
            Some(base) => signed_millis_between(base, start),
            None => millis_since_epoch(start),
        };
        // an end before the start is written as an empty interval
        let length_millis = end
            .duration_since(start)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        self.serialize_buf.clear();
        self.serializer
            .serialize(h, &mut self.serialize_buf)
            .map_err(LogWriteError::Serialize)?;
        self.text_buf.clear();
        base64::encode_config_buf(&self.serialize_buf, base64::STANDARD, &mut self.text_buf);

        writeln!(
            self.writer,
            "{:.3},{:.3},{:.3},{}",
            millis_as_fp_seconds(start_millis),
            millis_as_fp_seconds(length_millis),
            h.max() as f64 / self.max_value_divisor,
            self.text_buf
        )?;

        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Errors that occur when reading an interval log.
#[derive(Debug)]
pub enum LogReadError {
    /// Reading a line failed, or the line was not UTF-8.
    Io(io::Error),
    /// A StartTime header without a usable timestamp.
    StartTime,
    /// A BaseTime header without a usable timestamp.
    BaseTime,
    /// An interval line ended before the named field.
    MissingField(&'static str),
    /// An interval's start timestamp is not a non-negative number of seconds.
    InvalidTimestamp,
    /// An interval's length is not a non-negative number of seconds.
    InvalidIntervalLength,
    /// The histogram field is not valid base64.
    Base64(base64::DecodeError),
    /// The histogram field does not hold a decodable histogram.
    Decode(DeserializeError),
}

impl From<io::Error> for LogReadError {
    fn from(e: io::Error) -> Self {
        LogReadError::Io(e)
    }
}

impl fmt::Display for LogReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogReadError::Io(e) => write!(f, "An i/o error occurred: {}", e),
            LogReadError::StartTime => write!(f, "Unable to parse start time"),
            LogReadError::BaseTime => write!(f, "Unable to parse base time"),
            LogReadError::MissingField(field) => {
                write!(f, "Malformed input, expected {}", field)
            }
            LogReadError::InvalidTimestamp => write!(f, "Invalid timestamp"),
            LogReadError::InvalidIntervalLength => write!(f, "Invalid interval length"),
            LogReadError::Base64(e) => write!(f, "Malformed base64 histogram: {}", e),
            LogReadError::Decode(e) => write!(f, "Unable to decode histogram: {}", e),
        }
    }
}

impl error::Error for LogReadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LogReadError::Io(e) => Some(e),
            LogReadError::Base64(e) => Some(e),
            LogReadError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

/// Reads the histograms of an interval log.
///
/// Header lines, comments, blank lines and the legend are consumed along the way; each interval
/// line becomes one decoded `Histogram` stamped with its absolute start and end time. The first
/// error ends the iteration.
///
/// ```
/// use hdrhist::serialization::interval_log::LogReader;
///
/// let log = "#[StartTime: 1441812279.474 (seconds since epoch)]\n#just a comment\n";
/// let mut reader = LogReader::new(log.as_bytes());
/// assert!(reader.next().is_none());
/// assert!(reader.start_time().is_some());
/// ```
pub struct LogReader<R: io::BufRead> {
    reader: R,
    line: String,
    line_number: usize,
    start_time: Option<Duration>,
    base_time: Option<Duration>,
    deserializer: Deserializer,
    decode_buf: Vec<u8>,
    ended: bool,
}

impl<R: io::BufRead> LogReader<R> {
    /// Create a reader over the lines of `reader`.
    pub fn new(reader: R) -> LogReader<R> {
        LogReader {
            reader,
            line: String::new(),
            line_number: 0,
            start_time: None,
            base_time: None,
            deserializer: Deserializer::new(),
            decode_buf: Vec::new(),
            ended: false,
        }
    }

    /// The log's StartTime, once seen. Without a StartTime header, this is the first interval's
    /// timestamp as written.
    pub fn start_time(&self) -> Option<SystemTime> {
        self.start_time.and_then(|d| UNIX_EPOCH.checked_add(d))
    }

    /// The time interval timestamps are relative to: the BaseTime header if there was one,
    /// otherwise what the reader settled on at the first interval (see the module docs).
    pub fn base_time(&self) -> Option<SystemTime> {
        self.base_time.and_then(|d| UNIX_EPOCH.checked_add(d))
    }

    fn read_interval(&mut self) -> Option<Result<Histogram, LogReadError>> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => self.line_number += 1,
                Err(e) => return Some(Err(LogReadError::Io(e))),
            }

            let line = self.line.trim_end_matches(|c| c == '\n' || c == '\r');
            if line.starts_with(START_TIME_PREFIX) {
                match header_seconds(START_TIME_PREFIX, line) {
                    Some(t) => self.start_time = Some(t),
                    None => return Some(Err(LogReadError::StartTime)),
                }
            } else if line.starts_with(BASE_TIME_PREFIX) {
                match header_seconds(BASE_TIME_PREFIX, line) {
                    Some(t) => self.base_time = Some(t),
                    None => return Some(Err(LogReadError::BaseTime)),
                }
            } else if line.starts_with(LEGEND_PREFIX) || line.starts_with('#') {
                continue;
            } else if line.trim().is_empty() {
                continue;
            } else {
                return Some(self.decode_interval_line());
            }
        }
    }

    fn decode_interval_line(&mut self) -> Result<Histogram, LogReadError> {
        let line = self.line.trim_end_matches(|c| c == '\n' || c == '\r');
        let interval = IntervalLine::parse(line)?;

        // intervals that began before the base time are written as negative offsets
        let before_base = interval.start_timestamp < 0.0;
        let timestamp = fp_seconds_as_duration(interval.start_timestamp.abs())
            .ok_or(LogReadError::InvalidTimestamp)?;
        let length = fp_seconds_as_duration(interval.length)
            .ok_or(LogReadError::InvalidIntervalLength)?;

        let start_time = match self.start_time {
            Some(t) => t,
            // without a StartTime header the first timestamp is absolute, and may not precede 1970
            None if before_base => return Err(LogReadError::InvalidTimestamp),
            None => *self.start_time.get_or_insert(timestamp),
        };
        let base_time = match self.base_time {
            Some(base) => base,
            None => {
                let behind = if before_base {
                    start_time.checked_add(timestamp)
                } else {
                    start_time.checked_sub(timestamp)
                };
                let base = match behind {
                    Some(behind) if behind > ONE_YEAR => start_time,
                    _ => Duration::from_secs(0),
                };
                debug!(
                    base_secs = base.as_secs_f64(),
                    relative = base > Duration::from_secs(0),
                    "interval log base time decided by first timestamp"
                );
                self.base_time = Some(base);
                base
            }
        };

        self.decode_buf.clear();
        base64::decode_config_buf(interval.encoded_histogram, base64::STANDARD, &mut self.decode_buf)
            .map_err(LogReadError::Base64)?;
        let mut h = self
            .deserializer
            .deserialize(&mut self.decode_buf.as_slice())
            .map_err(LogReadError::Decode)?;

        let since_epoch = if before_base {
            base_time.checked_sub(timestamp)
        } else {
            base_time.checked_add(timestamp)
        };
        let start = since_epoch
            .and_then(|d| UNIX_EPOCH.checked_add(d))
            .ok_or(LogReadError::InvalidTimestamp)?;
        let end = start
            .checked_add(length)
            .ok_or(LogReadError::InvalidIntervalLength)?;
        h.set_start_time(start);
        h.set_end_time(end);
        Ok(h)
    }
}

impl<R: io::BufRead> Iterator for LogReader<R> {
    type Item = Result<Histogram, LogReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ended {
            return None;
        }

        let item = self.read_interval();
        match item {
            None => self.ended = true,
            Some(Err(ref e)) => {
                warn!(line = self.line_number, error = %e, "malformed interval log");
                self.ended = true;
            }
            Some(Ok(_)) => {}
        }
        item
    }
}

/// The fields of one interval line that matter for reading it back.
#[derive(Debug, PartialEq)]
struct IntervalLine<'a> {
    start_timestamp: f64,
    length: f64,
    encoded_histogram: &'a str,
}

impl<'a> IntervalLine<'a> {
    fn parse(line: &'a str) -> Result<IntervalLine<'a>, LogReadError> {
        let mut rest = line;

        let mut first = next_field(&mut rest).ok_or(LogReadError::MissingField("start timestamp"))?;
        if first.starts_with("Tag=") {
            first = next_field(&mut rest).ok_or(LogReadError::MissingField("start timestamp"))?;
        }
        let start_timestamp = number(first).ok_or(LogReadError::InvalidTimestamp)?;

        let length = next_field(&mut rest)
            .ok_or(LogReadError::MissingField("interval length"))
            .and_then(|f| number(f).ok_or(LogReadError::InvalidIntervalLength))?;

        // the max value is informational; the histogram carries its own
        let _ = next_field(&mut rest).ok_or(LogReadError::MissingField("max value"))?;

        let encoded_histogram =
            next_field(&mut rest).ok_or(LogReadError::MissingField("encoded histogram"))?;

        Ok(IntervalLine {
            start_timestamp,
            length,
            encoded_histogram,
        })
    }
}

fn is_field_delimiter(c: char) -> bool {
    c == ',' || c == ' ' || c == '\r' || c == '\n'
}

/// One field, and the delimiter after it if there is one.
fn field(input: &str) -> IResult<&str, &str> {
    terminated(take_till(is_field_delimiter), opt(satisfy(is_field_delimiter)))(input)
}

/// Take the next field off `rest`, or `None` at the end of the line.
fn next_field<'a>(rest: &mut &'a str) -> Option<&'a str> {
    if rest.is_empty() {
        return None;
    }
    let (remaining, f) = field(rest).ok()?;
    *rest = remaining;
    Some(f)
}

fn number(input: &str) -> Option<f64> {
    let parsed: IResult<&str, f64> = all_consuming(double)(input);
    parsed.ok().map(|(_, n)| n)
}

/// `#[StartTime: 1441812279.474 (seconds since epoch), ...]` and friends.
fn header_time<'a>(prefix: &'static str, input: &'a str) -> IResult<&'a str, f64> {
    preceded(pair(tag(prefix), space0), double)(input)
}

fn header_seconds(prefix: &'static str, line: &str) -> Option<Duration> {
    header_time(prefix, line)
        .ok()
        .and_then(|(_, t)| fp_seconds_as_duration(t))
}

/// Sub-microsecond digits are dropped: an f64 holding seconds since the epoch cannot represent
/// them, and logs only carry milliseconds anyway.
fn fp_seconds_as_duration(secs: f64) -> Option<Duration> {
    if !secs.is_finite() || secs < 0.0 || secs >= u64::max_value() as f64 {
        return None;
    }
    let whole = secs.trunc();
    // at most 1_000_000, which Duration::new carries into the seconds
    let micros = ((secs - whole) * 1e6).round() as u32;
    Some(Duration::new(whole as u64, micros * 1_000))
}

fn millis_since_epoch(time: SystemTime) -> i64 {
    signed_millis_between(UNIX_EPOCH, time)
}

/// Whole milliseconds from `origin` to `time`, negative if `time` is earlier.
fn signed_millis_between(origin: SystemTime, time: SystemTime) -> i64 {
    match time.duration_since(origin) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

fn millis_as_fp_seconds(millis: i64) -> f64 {
    millis as f64 / 1000.0
}
