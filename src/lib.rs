//! hdrhist provides high dynamic range (HDR) histograms. It records and analyzes sampled integer
//! values across a large, configurable value range with configurable precision within the range.
//! The resulting histogram allows fast and accurate analysis of the extreme ranges of data with
//! non-normal distributions, like latency.
//!
//! # HDR histograms
//!
//! An HDR histogram supports the recording and analyzing of sampled data value counts across a
//! configurable integer value range with configurable value precision within the range. Value
//! precision is expressed as the number of significant digits in the value recording, and provides
//! control over value quantization behavior across the value range and the subsequent value
//! resolution at any given level.
//!
//! For example, a histogram could be configured to track the counts of observed integer values
//! between 0 and 3,600,000,000 while maintaining a value precision of 3 significant digits across
//! that range. Value quantization within the range will thus be no larger than 1/1,000th (or 0.1%)
//! of any value. This example histogram could be used to track and analyze the counts of observed
//! response times ranging between 1 microsecond and 1 hour in magnitude, while maintaining a value
//! resolution of 1 microsecond up to 1 millisecond, a resolution of 1 millisecond (or better) up
//! to one second, and a resolution of 1 second (or better) up to 1,000 seconds. At its maximum
//! tracked value (1 hour), it would still maintain a resolution of 3.6 seconds (or better).
//!
//! A histogram's memory footprint is constant, with no allocation operations involved in recording
//! data values or in iterating through them (unless it has to grow, see below). The footprint is
//! fixed regardless of the number of samples recorded, and depends solely on the dynamic range and
//! precision chosen. The amount of work involved in recording a sample is constant, and directly
//! computes storage index locations such that no iteration or searching is ever involved in
//! recording data values.
//!
//! # Interacting with the library
//!
//! A histogram is generally used in one of two modes: recording samples, or querying for
//! analytics. In distributed deployments, the recording may be performed remotely (and possibly in
//! multiple locations), to then be aggregated later in a central location for analysis. The
//! `serialization` module covers moving histograms between those locations.
//!
//! ## Recording samples
//!
//! A histogram instance is created using the `::new` methods on the `Histogram` struct. These come
//! in four variants: `new`, `new_with_max`, `new_with_bounds` and `with_config`. The first of
//! these only sets the required precision of the sampled data, but leaves the value range open
//! such that any value may be recorded. A `Histogram` created this way (or one where auto-resize
//! has been explicitly enabled in its `Config`) will automatically resize itself if a value that is
//! too large to fit in the current dataset is encountered. `new_with_max` sets an upper bound on
//! the values to be recorded, and disables auto-resizing, thus preventing any re-allocation during
//! recording. If the application attempts to record a larger value than this maximum bound, the
//! record call will fail. Finally, `new_with_bounds` restricts the lowest representable value of
//! the dataset, such that a smaller range needs to be covered (thus reducing the overall
//! allocation size).
//!
//! For example the example below shows how to create a `Histogram` that can count values in the
//! `[1..3600000]` range with 1% precision, which could be used to track latencies in the range `[1
//! msec..1 hour]`).
//!
//! ```
//! use hdrhist::Histogram;
//! let mut hist = Histogram::new_with_bounds(1, 60 * 60 * 1000, 2).unwrap();
//!
//! // samples can be recorded using .record, which will error if the value is too small or large
//! hist.record(54321).expect("value 54321 should be in range");
//!
//! // if the code that generates the values is subject to Coordinated Omission,
//! // the self-correcting record method should be used instead.
//! // for example, if the expected sampling interval is 10 msec:
//! hist.record_corrected(54321, 10).expect("value 54321 should be in range");
//! ```
//!
//! ## Querying samples
//!
//! At any time, the histogram can be queried to return interesting statistical measurements, such
//! as the total number of recorded samples, or the value at a given percentile:
//!
//! ```
//! use hdrhist::Histogram;
//! let hist = Histogram::new(2).unwrap();
//! // ...
//! println!("# of samples: {}", hist.total_count());
//! println!("99.9'th percentile: {}", hist.value_at_quantile(99.9).value);
//! ```
//!
//! Several useful iterators are also provided for quickly getting an overview of the dataset. The
//! simplest one is `iter_recorded()`, which yields one item for every non-empty sample bin.
//!
//! ```
//! use hdrhist::Histogram;
//! let hist = Histogram::new(2).unwrap();
//! // ...
//! for v in hist.iter_recorded() {
//!     println!("{}'th percentile of data is {} with {} samples",
//!         v.percentile, v.value, v.count);
//! }
//! ```
//!
//! ## Interval recording
//!
//! Long-running processes usually want one histogram per time window rather than one for their
//! whole lifetime. `IntervalRecorder` hands out such non-overlapping snapshots, and the
//! `serialization::interval_log` module writes them to (and reads them back from) the text log
//! format shared with other HDR histogram implementations.
//!
//! # Logging
//!
//! Diagnostics (resizes, snapshots, decoded log metadata) are emitted through `tracing`. Install a
//! subscriber in your application to see them; the library never installs one itself.

#![deny(
    missing_docs,
    trivial_casts,
    unused_extern_crates,
    unused_import_braces
)]

use std::borrow::Borrow;
use std::mem;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod core;
pub mod errors;
pub mod iterators;
pub mod recorder;
#[cfg(feature = "serialization")]
pub mod serialization;

#[cfg(test)]
mod tests;

pub use crate::core::config::{Config, MAX_SIG_FIGS};
pub use crate::core::layout::BucketLayout;
pub use crate::errors::*;
pub use crate::recorder::IntervalRecorder;

/// A summary of the histogram at one value level.
///
/// Returned by value and quantile queries, and yielded by every histogram iterator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistVal {
    /// The value level. Depending on the query this is the highest value equivalent to the one
    /// asked about, or the level an iterator stepped to.
    pub value: i64,
    /// Samples counted at this level (for iterators: since the previous step).
    pub count: i64,
    /// Samples counted at or below this level.
    pub cumulative_count: i64,
    /// `cumulative_count` as a percentage of the total count, in `[0, 100]`.
    pub percentile: f64,
}

impl HistVal {
    fn empty() -> HistVal {
        // an empty histogram is, by convention, complete at every value
        HistVal {
            value: 0,
            count: 0,
            cumulative_count: 0,
            percentile: 100.0,
        }
    }
}

/// `Histogram` is the core data structure in hdrhist. It records values, and performs analytics.
///
/// At its heart, it keeps the count for recorded samples in "buckets" of values. The resolution
/// and distribution of these buckets is tuned based on the desired highest trackable value, as
/// well as the user-specified number of significant decimal digits to preserve. The values for the
/// buckets are kept in a way that resembles floats and doubles: there is a mantissa and an
/// exponent, and each bucket represents a different exponent. The "sub-buckets" within a bucket
/// represent different values for the mantissa. See `BucketLayout` for the geometry.
///
/// To a first approximation, the sub-buckets of the first bucket would hold the values `0`, `1`,
/// `2`, `3`, …, the sub-buckets of the second bucket would hold `0`, `2`, `4`, `6`, …, the third
/// would hold `0`, `4`, `8`, and so on. However, the low half of each bucket (except bucket 0) is
/// unnecessary, since those values are already covered by the sub-buckets of all the preceeding
/// buckets. Thus, `Histogram` keeps the top half of every such bucket.
///
/// A histogram is not safe for concurrent mutation. Share it behind a lock, or give each thread
/// its own and `add` them together.
#[derive(Debug, Clone)]
pub struct Histogram {
    config: Config,
    layout: BucketLayout,
    counts: Vec<i64>,
    total_count: i64,
    start_time: Option<SystemTime>,
    end_time: Option<SystemTime>,
}

// Construction

impl Histogram {
    /// Construct an auto-resizing `Histogram` with a lowest discernible value of 1 and an
    /// auto-adjusting highest trackable value. Can auto-resize up to track values up to
    /// `i64::max_value()`.
    ///
    /// See `new_with_bounds` for info on `sig_figs`.
    pub fn new(sig_figs: u8) -> Result<Histogram, CreationError> {
        Self::with_config(Config::new(1, 2, sig_figs).with_auto_resize(true))
    }

    /// Construct a `Histogram` given a known maximum value to be tracked, and a number of
    /// significant decimal digits. The histogram will be constructed to implicitly track
    /// (distinguish from 0) values as low as 1. Auto-resizing will be disabled.
    ///
    /// See `new_with_bounds` for info on `high` and `sig_figs`.
    pub fn new_with_max(high: i64, sig_figs: u8) -> Result<Histogram, CreationError> {
        Self::new_with_bounds(1, high, sig_figs)
    }

    /// Construct a `Histogram` with known upper and lower bounds for recorded sample values.
    ///
    /// `low` is the lowest value that can be discerned (distinguished from 0) by the histogram,
    /// and must be a positive integer that is >= 1. It may be internally rounded down to nearest
    /// power of 2. Providing a lowest discernible value (`low`) is useful in situations where the
    /// units used for the histogram's values are much smaller that the minimal accuracy required.
    /// E.g. when tracking time values stated in nanosecond units, where the minimal accuracy
    /// required is a microsecond, the proper value for `low` would be 1000.
    ///
    /// `high` is the highest value to be tracked by the histogram, and must be a
    /// positive integer that is `>= (2 * low)`. Auto-resizing will be disabled.
    ///
    /// `sig_figs` specifies the number of significant figures to maintain. This is the number of
    /// significant decimal digits to which the histogram will maintain value resolution and
    /// separation. Must be in the range [0, 5]. If you're not sure, use 3. As `sig_figs`
    /// increases, memory usage grows exponentially, so choose carefully if there will be many
    /// histograms in memory at once or if storage is a concern.
    pub fn new_with_bounds(low: i64, high: i64, sig_figs: u8) -> Result<Histogram, CreationError> {
        Self::with_config(Config::new(low, high, sig_figs))
    }

    /// Construct a `Histogram` from a `Config`.
    pub fn with_config(config: Config) -> Result<Histogram, CreationError> {
        let config = config.validate()?;
        let layout = BucketLayout::new(&config)?;
        Ok(Histogram::from_parts(config, layout))
    }

    /// Construct an empty `Histogram` with the same settings as `source`. Neither its counts nor
    /// its timestamps are copied.
    pub fn new_from(source: &Histogram) -> Histogram {
        Histogram::from_parts(source.config, source.layout)
    }

    fn from_parts(config: Config, layout: BucketLayout) -> Histogram {
        Histogram {
            config,
            layout,
            counts: vec![0; layout.counts_len()],
            total_count: 0,
            start_time: None,
            end_time: None,
        }
    }
}

// Accessors

impl Histogram {
    /// The settings this histogram currently uses.
    ///
    /// After an auto-resize, `highest_trackable` reflects the grown range.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The bucket geometry derived from `config()`.
    pub fn layout(&self) -> &BucketLayout {
        &self.layout
    }

    /// Get the current number of distinct counted values (the length of the counts array).
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if this histogram has no recorded values.
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    /// Get the total number of samples recorded.
    pub fn total_count(&self) -> i64 {
        self.total_count
    }

    /// Whether this histogram grows to fit values beyond its highest trackable value.
    pub fn is_auto_resize(&self) -> bool {
        self.config.auto_resize
    }

    /// When recording for this histogram's interval started, if known.
    pub fn start_time(&self) -> Option<SystemTime> {
        self.start_time
    }

    /// Set the start of this histogram's interval.
    pub fn set_start_time(&mut self, time: SystemTime) {
        self.start_time = Some(time);
    }

    /// When recording for this histogram's interval ended, if known.
    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }

    /// Set the end of this histogram's interval.
    pub fn set_end_time(&mut self, time: SystemTime) {
        self.end_time = Some(time);
    }

    /// Estimate the memory this histogram occupies, in bytes.
    pub fn estimated_memory_size(&self) -> usize {
        mem::size_of::<Histogram>() + self.counts.capacity() * mem::size_of::<i64>()
    }

    /// Iterate over `(index, count)` for every non-zero slot, in increasing value order.
    fn nonzero_counts(&self) -> impl Iterator<Item = (usize, i64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c != 0)
            .map(|(i, &c)| (i, c))
    }

    fn first_nonzero_index(&self) -> Option<usize> {
        self.counts.iter().position(|&c| c != 0)
    }

    pub(crate) fn last_nonzero_index(&self) -> Option<usize> {
        self.counts.iter().rposition(|&c| c != 0)
    }

    pub(crate) fn counts(&self) -> &[i64] {
        &self.counts
    }

    /// Overwrite a single slot while decoding. Callers keep `total_count` consistent.
    /// Returns `None` if `index` is past the end of the counts array.
    pub(crate) fn set_count_at_index(&mut self, index: usize, count: i64) -> Option<()> {
        let slot = self.counts.get_mut(index)?;
        *slot = count;
        Some(())
    }

    pub(crate) fn set_total_count(&mut self, total_count: i64) {
        self.total_count = total_count;
    }
}

// Recording

impl Histogram {
    /// Record `value` in the histogram.
    ///
    /// Returns an error if `value` is negative, or if it exceeds the highest trackable value and
    /// auto-resize is disabled.
    pub fn record(&mut self, value: i64) -> Result<(), RecordError> {
        self.record_n(value, 1)
    }

    /// Record multiple samples for a value in the histogram, adding to the value's current count.
    ///
    /// `count` is the number of occurrences of this value to record.
    ///
    /// Returns an error if `value` or `count` is negative, or if `value` exceeds the highest
    /// trackable value and auto-resize is disabled. Nothing is recorded on error.
    pub fn record_n(&mut self, value: i64, count: i64) -> Result<(), RecordError> {
        if value < 0 {
            return Err(RecordError::ValueNegative);
        }
        if count < 0 {
            return Err(RecordError::CountNegative);
        }

        let index = match self.layout.index_for(value) {
            Some(i) => i,
            None => {
                if !self.config.auto_resize {
                    return Err(RecordError::ValueOutOfRangeResizeDisabled);
                }
                self.resize(value)
                    .map_err(|_| RecordError::ResizeFailedUsizeTypeTooSmall)?;
                self.layout
                    .index_for(value)
                    .ok_or(RecordError::ResizeFailedUsizeTypeTooSmall)?
            }
        };

        self.counts[index] = self.counts[index].saturating_add(count);
        self.total_count = self.total_count.saturating_add(count);
        Ok(())
    }

    /// Record a value in the histogram while correcting for coordinated omission.
    ///
    /// See `record_n_corrected` for further documentation.
    pub fn record_corrected(&mut self, value: i64, interval: i64) -> Result<(), RecordError> {
        self.record_n_corrected(value, 1, interval)
    }

    /// Record multiple values in the histogram while correcting for coordinated omission.
    ///
    /// To compensate for the loss of sampled values when a recorded value is larger than the
    /// expected interval between value samples, this method will auto-generate an additional
    /// series of decreasingly-smaller (down to the interval) value records: one for each
    /// `value - k * interval` that stays above zero.
    ///
    /// Note: This is an at-recording correction method, as opposed to the post-recording
    /// correction method provided by `clone_correct`. The two methods are mutually exclusive, and
    /// only one of the two should be be used on a given data set to correct for the same
    /// coordinated omission issue.
    ///
    /// Returns an error if `value` exceeds the highest trackable value and auto-resize is
    /// disabled.
    pub fn record_n_corrected(
        &mut self,
        value: i64,
        count: i64,
        interval: i64,
    ) -> Result<(), RecordError> {
        self.record_n(value, count)?;
        if interval <= 0 || value <= interval {
            return Ok(());
        }

        let mut missing_value = value - interval;
        while missing_value > 0 {
            self.record_n(missing_value, count)?;
            missing_value -= interval;
        }
        Ok(())
    }

    /// Get a copy of this histogram, corrected for coordinated omission.
    ///
    /// Each recorded slot is re-recorded through `record_n_corrected`, using the highest value
    /// equivalent to the slot, so backfill starts from the top of the slot rather than from the
    /// value originally recorded.
    pub fn clone_correct(&self, interval: i64) -> Result<Histogram, RecordError> {
        let mut h = Histogram::new_from(self);
        for v in self.iter_recorded() {
            h.record_n_corrected(v.value, v.count, interval)?;
        }
        h.start_time = self.start_time;
        h.end_time = self.end_time;
        Ok(h)
    }

    /// Reset the contents of this histogram. Settings and timestamps are kept.
    pub fn clear(&mut self) {
        for c in self.counts.iter_mut() {
            *c = 0;
        }
        self.total_count = 0;
    }

    /// Grow to a layout that covers `value`, re-deriving every non-empty slot's index under the
    /// new layout. The old counts array is discarded.
    fn resize(&mut self, value: i64) -> Result<(), CreationError> {
        let grown = Config {
            highest_trackable: value.max(self.config.highest_trackable),
            ..self.config
        };
        let layout = BucketLayout::new(&grown)?;

        let mut counts = vec![0; layout.counts_len()];
        for (index, count) in self.nonzero_counts() {
            let new_index = layout
                .index_for(self.layout.value_for(index))
                .ok_or(CreationError::UsizeTypeTooSmall)?;
            counts[new_index] += count;
        }

        debug!(
            old_highest = self.config.highest_trackable,
            new_highest = layout.highest_covered(),
            counts_len = layout.counts_len(),
            "resized histogram"
        );

        self.counts = counts;
        self.layout = layout;
        self.config.highest_trackable = layout.highest_covered();
        Ok(())
    }
}

// Merging

impl Histogram {
    /// Add the contents of another histogram to this one.
    ///
    /// Each non-empty slot of `source` is translated through its lowest equivalent value into
    /// this histogram's layout, so the two need not share settings. As part of adding the
    /// contents, the start/end timestamp range of this histogram will be extended to include the
    /// start/end timestamp range of the other histogram.
    ///
    /// Returns an error if values in the other histogram cannot be stored; see `AdditionError`.
    /// Nothing is added on error.
    pub fn add<B: Borrow<Histogram>>(&mut self, source: B) -> Result<(), AdditionError> {
        let source = source.borrow();

        // make sure we can take the values in source
        if let Some(top_index) = source.last_nonzero_index() {
            let top = source.layout.value_for(top_index);
            if self.layout.index_for(top).is_none() {
                if !self.config.auto_resize {
                    return Err(AdditionError::OtherAddendValueExceedsRange);
                }
                self.resize(top)
                    .map_err(|_| AdditionError::ResizeFailedUsizeTypeTooSmall)?;
            }
        }

        if self.layout == source.layout {
            // Counts arrays are of the same length and meaning, so we can just iterate and add
            // directly
            for (mine, &theirs) in self.counts.iter_mut().zip(source.counts.iter()) {
                *mine = mine.saturating_add(theirs);
            }
        } else {
            // Arrays are not a direct match, so we can't just stream through and add them.
            // Instead, go through the array and add each non-zero value found at its proper
            // value. Everything below the top value checked above fits as well.
            for (index, count) in source.nonzero_counts() {
                let value = source.layout.value_for(index);
                let target = self
                    .layout
                    .index_for(value)
                    .ok_or(AdditionError::OtherAddendValueExceedsRange)?;
                self.counts[target] = self.counts[target].saturating_add(count);
            }
        }

        self.total_count = self.total_count.saturating_add(source.total_count);
        self.start_time = earliest(self.start_time, source.start_time);
        self.end_time = latest(self.end_time, source.end_time);
        Ok(())
    }

    /// Subtract the contents of another histogram from this one.
    ///
    /// The whole subtraction is checked before any count changes: if any value in `subtrahend`
    /// falls outside this histogram's range, or any slot would go negative, an error is returned
    /// and this histogram is unchanged. Subtraction never resizes.
    pub fn subtract<B: Borrow<Histogram>>(&mut self, subtrahend: B) -> Result<(), SubtractionError> {
        let subtrahend = subtrahend.borrow();

        // several source slots can land in one of ours if our layout is coarser
        let mut pending: Vec<(usize, i64)> = Vec::new();
        for (index, count) in subtrahend.nonzero_counts() {
            let value = subtrahend.layout.value_for(index);
            let target = self
                .layout
                .index_for(value)
                .ok_or(SubtractionError::SubtrahendValueExceedsMinuendRange)?;
            match pending.last_mut() {
                Some((last, sum)) if *last == target => *sum = sum.saturating_add(count),
                _ => pending.push((target, count)),
            }
        }

        if pending
            .iter()
            .any(|&(index, count)| self.counts[index] < count)
        {
            return Err(SubtractionError::SubtrahendCountExceedsMinuendCount);
        }

        for (index, count) in pending {
            self.counts[index] -= count;
            self.total_count -= count;
        }
        Ok(())
    }

    /// Copy this histogram's settings, counts and timestamps into `dest`, reusing its counts
    /// allocation where possible.
    pub fn copy_into(&self, dest: &mut Histogram) {
        dest.config = self.config;
        dest.layout = self.layout;
        dest.counts.clear();
        dest.counts.extend_from_slice(&self.counts);
        dest.total_count = self.total_count;
        dest.start_time = self.start_time;
        dest.end_time = self.end_time;
    }
}

fn earliest(a: Option<SystemTime>, b: Option<SystemTime>) -> Option<SystemTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn latest(a: Option<SystemTime>, b: Option<SystemTime>) -> Option<SystemTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

// Equivalence

impl Histogram {
    /// Get the lowest value that is equivalent to the given value within the histogram's
    /// resolution. Equivalent here means that value samples recorded for any two equivalent values
    /// are counted in a common total count.
    pub fn lowest_equiv(&self, value: i64) -> i64 {
        self.layout.lowest_equiv(value)
    }

    /// Get the highest value that is equivalent to the given value within the histogram's
    /// resolution.
    pub fn highest_equiv(&self, value: i64) -> i64 {
        self.layout.highest_equiv(value)
    }

    /// Get a value that lies in the middle (rounded up) of the range of values equivalent the
    /// given value.
    pub fn median_equiv(&self, value: i64) -> i64 {
        self.layout.median_equiv(value)
    }

    /// Get the next value that is *not* equivalent to the given value within the histogram's
    /// resolution.
    pub fn next_non_equiv(&self, value: i64) -> i64 {
        self.layout.next_non_equiv(value)
    }

    /// Get the size (in value units) of the range of values that are equivalent to the given
    /// value within the histogram's resolution.
    pub fn size_of_equivalent_range(&self, value: i64) -> i64 {
        self.layout.size_of_equivalent_range(value)
    }

    /// Determine if two values are equivalent with the histogram's resolution.
    pub fn are_equiv(&self, value1: i64, value2: i64) -> bool {
        self.layout.are_equiv(value1, value2)
    }
}

// Queries

impl Histogram {
    /// Get the lowest recorded value level in the histogram. If the histogram has no recorded
    /// values, the value returned is 0.
    pub fn min(&self) -> i64 {
        self.first_nonzero_index()
            .map_or(0, |i| self.layout.value_for(i))
    }

    /// Get the highest recorded value level in the histogram. If the histogram has no recorded
    /// values, the value returned is 0.
    pub fn max(&self) -> i64 {
        self.last_nonzero_index()
            .map_or(0, |i| self.layout.highest_equiv(self.layout.value_for(i)))
    }

    /// Get the computed mean value of all recorded values in the histogram, taking each slot's
    /// median equivalent value as representative. 0 if nothing was recorded.
    pub fn mean(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }

        let sum = self.nonzero_counts().fold(0_i128, |total, (index, count)| {
            let median = self.layout.median_equiv(self.layout.value_for(index));
            total.saturating_add(i128::from(median) * i128::from(count))
        });

        sum as f64 / self.total_count as f64
    }

    /// Get the computed standard deviation of all recorded values in the histogram. 0 if nothing
    /// was recorded.
    pub fn stdev(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }

        let mean = self.mean();
        let geom_dev_tot = self.nonzero_counts().fold(0.0_f64, |gdt, (index, count)| {
            let dev = self.layout.median_equiv(self.layout.value_for(index)) as f64 - mean;
            gdt + (dev * dev) * count as f64
        });

        (geom_dev_tot / self.total_count as f64).sqrt()
    }

    /// Get the value at a given percentile.
    ///
    /// `percentile` is in `[0, 100]`; values outside are clamped. The returned `HistVal` describes
    /// the first slot (in increasing value order) at which the cumulative count reaches
    /// `ceil(percentile / 100 * total_count)`, at least 1. Its `value` is the highest value
    /// equivalent to that slot: the given percentage of recorded values are smaller than or
    /// equivalent to it.
    ///
    /// An empty histogram yields value 0 with a percentile of 100.
    pub fn value_at_quantile(&self, percentile: f64) -> HistVal {
        if self.total_count == 0 {
            return HistVal::empty();
        }

        let target = self.count_at_percentile(percentile);
        let mut cumulative = 0_i64;
        for (index, &count) in self.counts.iter().enumerate() {
            cumulative = cumulative.saturating_add(count);
            if cumulative >= target {
                return HistVal {
                    value: self.layout.highest_equiv(self.layout.value_for(index)),
                    count,
                    cumulative_count: cumulative,
                    percentile: 100.0 * cumulative as f64 / self.total_count as f64,
                };
            }
        }

        // counts always sum to total_count, so the loop returns before this
        HistVal {
            value: self.max(),
            count: 0,
            cumulative_count: self.total_count,
            percentile: 100.0,
        }
    }

    fn count_at_percentile(&self, percentile: f64) -> i64 {
        // NaN clamps to 0 here
        let percentile = percentile.max(0.0).min(100.0);
        let exact = (percentile / 100.0) * self.total_count as f64;

        // don't let float noise like 750000.0000000001 push the target up a whole sample; the
        // product is off by at most a couple of ulps, so real fractions are never snapped
        let nearest = exact.round();
        let target = if (exact - nearest).abs() <= f64::EPSILON * exact.max(1.0) * 4.0 {
            nearest
        } else {
            exact.ceil()
        };

        (target as i64).max(1).min(self.total_count)
    }

    /// Describe the histogram at the level of `value`.
    ///
    /// Never fails:
    /// - an empty histogram reports a percentile of 100
    /// - a negative value reports nothing at or below it (percentile 0)
    /// - a value beyond the histogram's range reports everything below it (percentile 100)
    /// - otherwise `count` is the count of `value`'s slot, and `cumulative_count` and
    ///   `percentile` cover every slot up to and including it. `value` is the highest value
    ///   equivalent to the given one.
    pub fn val(&self, value: i64) -> HistVal {
        if self.total_count == 0 {
            return HistVal {
                value: value.max(0),
                ..HistVal::empty()
            };
        }
        if value < 0 {
            return HistVal {
                value,
                count: 0,
                cumulative_count: 0,
                percentile: 0.0,
            };
        }

        match self.layout.index_for(value) {
            Some(index) => {
                let cumulative = self.counts[..=index]
                    .iter()
                    .fold(0_i64, |t, &c| t.saturating_add(c));
                HistVal {
                    value: self.layout.highest_equiv(value),
                    count: self.counts[index],
                    cumulative_count: cumulative,
                    percentile: 100.0 * cumulative as f64 / self.total_count as f64,
                }
            }
            None => HistVal {
                value,
                count: 0,
                cumulative_count: self.total_count,
                percentile: 100.0,
            },
        }
    }

    /// Get the percentile of recorded values that are smaller than or equivalent to `value`.
    pub fn percentile_below(&self, value: i64) -> f64 {
        self.val(value).percentile
    }

    /// Get the count of recorded values at a specific value (to within the histogram resolution at
    /// the value level). 0 for values outside the histogram's range.
    pub fn count_at(&self, value: i64) -> i64 {
        self.layout
            .index_for(value)
            .map_or(0, |index| self.counts[index])
    }

    /// Get the count of recorded values within a range of value levels (inclusive to within the
    /// histogram's resolution).
    ///
    /// `low` will be rounded down with `lowest_equiv`, and `high` rounded up with
    /// `highest_equiv`. Parts of the range outside the histogram contribute nothing.
    pub fn count_between(&self, low: i64, high: i64) -> i64 {
        if high < low || high < 0 {
            return 0;
        }
        let low_index = match self.layout.index_for(low.max(0)) {
            Some(i) => i,
            None => return 0,
        };
        let high_index = self
            .layout
            .index_for(high)
            .unwrap_or_else(|| self.layout.last_index());
        self.counts[low_index..=high_index]
            .iter()
            .fold(0_i64, |t, &c| t.saturating_add(c))
    }
}

// Iterators

impl Histogram {
    /// Iterate through histogram values by percentile levels.
    ///
    /// The iteration mechanic for this iterator may appear somewhat confusing, but it yields
    /// fairly pleasing output. The iterator starts with a *percentile step size* of
    /// `100/ticks_per_half_distance`. It then keeps incrementing the percentile by that step size,
    /// and for every new percentile it finds the highest value equivalent to it. When the
    /// percentile has reached halfway to 100, the step size is halved, and so on, finishing with a
    /// final step at 100.
    ///
    /// # Panics
    ///
    /// `ticks_per_half_distance` must be at least 1.
    pub fn iter_percentiles(
        &self,
        ticks_per_half_distance: u32,
    ) -> iterators::HistogramIterator<'_, iterators::percentile::Iter<'_>> {
        iterators::percentile::Iter::new(self, ticks_per_half_distance)
    }

    /// Iterate through histogram values using linear value steps. The iteration is performed in
    /// steps of size `step`, each one yielding the count for all values in the preceeding value
    /// range of size `step`. The iterator terminates when all recorded histogram values are
    /// exhausted.
    ///
    /// # Panics
    ///
    /// `step` must be at least 1.
    pub fn iter_linear(
        &self,
        step: i64,
    ) -> iterators::HistogramIterator<'_, iterators::linear::Iter<'_>> {
        iterators::linear::Iter::new(self, step)
    }

    /// Iterate through histogram values at logarithmically increasing levels. The iteration is
    /// performed in steps that start at `start` and increase exponentially according to `exp`.
    /// The iterator terminates when all recorded histogram values are exhausted.
    ///
    /// # Panics
    ///
    /// `start` must be at least 1, and `exp` must be greater than 1.
    pub fn iter_log(
        &self,
        start: i64,
        exp: f64,
    ) -> iterators::HistogramIterator<'_, iterators::log::Iter<'_>> {
        iterators::log::Iter::new(self, start, exp)
    }

    /// Iterate through all recorded histogram values using the finest granularity steps supported
    /// by the underlying representation. The iteration steps through all non-zero recorded value
    /// counts, in increasing value order, and terminates when all recorded histogram values are
    /// exhausted.
    ///
    /// This is the way for external reporting tools to walk the full distribution.
    pub fn iter_recorded(
        &self,
    ) -> iterators::HistogramIterator<'_, iterators::recorded::Iter> {
        iterators::recorded::Iter::new(self)
    }

    /// Iterate through all histogram values using the finest granularity supported by the
    /// underlying representation. The iteration steps through all possible unit value levels,
    /// regardless of whether or not there were recorded values for that value level.
    pub fn iter_all(&self) -> iterators::HistogramIterator<'_, iterators::all::Iter> {
        iterators::all::Iter::new(self)
    }
}

// Comparison

impl PartialEq for Histogram {
    /// Histograms are equal when they have the same precision and lowest discernible value and
    /// hold the same counts. The highest trackable value and timestamps are not compared.
    fn eq(&self, other: &Histogram) -> bool {
        if self.config.lowest_discernible != other.config.lowest_discernible
            || self.config.sig_figs != other.config.sig_figs
        {
            return false;
        }
        if self.total_count != other.total_count {
            return false;
        }
        if self.max() != other.max() || self.min() != other.min() {
            return false;
        }

        // same precision and lowest value means the slots line up; compare up to the max
        let top = self.last_nonzero_index().map_or(0, |i| i + 1);
        self.counts[..top] == other.counts[..top]
    }
}
