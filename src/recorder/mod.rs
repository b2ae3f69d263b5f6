//! Interval recording: hand out consecutive, non-overlapping histograms from one stream of samples.

use std::mem;
use std::time::SystemTime;

use tracing::trace;

use crate::errors::{CreationError, RecordError};
use crate::{Config, Histogram};

/// Records samples into an active histogram, and on request hands out what was recorded since the
/// previous request as an interval histogram.
///
/// Every recorded sample ends up in exactly one interval histogram. The recorder does no locking:
/// if samples come from several threads, wrap it in a `Mutex` (or give each thread its own
/// recorder and `add` the snapshots together).
///
/// ```
/// use hdrhist::IntervalRecorder;
///
/// let mut recorder = IntervalRecorder::new(3).unwrap();
/// recorder.record(120).unwrap();
/// recorder.record(240).unwrap();
///
/// let first = recorder.interval_snapshot(None);
/// assert_eq!(2, first.total_count());
///
/// // reuse the first snapshot's allocation for the next one
/// recorder.record(360).unwrap();
/// let second = recorder.interval_snapshot(Some(first));
/// assert_eq!(1, second.total_count());
/// ```
#[derive(Debug)]
pub struct IntervalRecorder {
    active: Histogram,
    inactive: Histogram,
}

impl IntervalRecorder {
    /// Create a recorder whose histograms auto-resize, with the given precision.
    pub fn new(sig_figs: u8) -> Result<IntervalRecorder, CreationError> {
        Self::with_config(Config::new(1, 2, sig_figs).with_auto_resize(true))
    }

    /// Create a recorder whose histograms use `config`.
    pub fn with_config(config: Config) -> Result<IntervalRecorder, CreationError> {
        let mut active = Histogram::with_config(config)?;
        let inactive = Histogram::new_from(&active);
        active.set_start_time(SystemTime::now());
        Ok(IntervalRecorder { active, inactive })
    }

    /// Record a sample in the current interval.
    pub fn record(&mut self, value: i64) -> Result<(), RecordError> {
        self.active.record(value)
    }

    /// Record `count` samples of `value` in the current interval.
    pub fn record_n(&mut self, value: i64, count: i64) -> Result<(), RecordError> {
        self.active.record_n(value, count)
    }

    /// Record a sample in the current interval while correcting for coordinated omission. See
    /// `Histogram::record_n_corrected`.
    pub fn record_corrected(&mut self, value: i64, interval: i64) -> Result<(), RecordError> {
        self.active.record_corrected(value, interval)
    }

    /// End the current interval and return its histogram.
    ///
    /// The returned histogram holds every sample recorded since the previous snapshot (or since
    /// the recorder was created), with start and end times covering the interval. A new interval
    /// starts immediately.
    ///
    /// If `reuse` is given, the snapshot is copied into it instead of into a new allocation. Pass
    /// back a snapshot you are done with to avoid allocating on every interval.
    pub fn interval_snapshot(&mut self, reuse: Option<Histogram>) -> Histogram {
        let now = SystemTime::now();

        mem::swap(&mut self.active, &mut self.inactive);
        self.active.clear();
        self.active.set_start_time(now);
        self.inactive.set_end_time(now);

        trace!(
            total_count = self.inactive.total_count(),
            reused = reuse.is_some(),
            "interval snapshot"
        );

        match reuse {
            Some(mut target) => {
                self.inactive.copy_into(&mut target);
                target
            }
            None => self.inactive.clone(),
        }
    }
}
