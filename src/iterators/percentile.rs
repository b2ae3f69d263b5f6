use crate::iterators::{HistogramIterator, PickMetadata, PickyIterator};
use crate::Histogram;

/// An iterator that will yield at percentile steps through the histogram's value range.
pub struct Iter<'a> {
    hist: &'a Histogram,

    ticks_per_half_distance: u32,
    percentile_to_iterate_to: f64,
    reached_end: bool,
}

impl<'a> Iter<'a> {
    /// Construct a new percentile iterator. See `Histogram::iter_percentiles` for details.
    pub fn new(hist: &'a Histogram, ticks_per_half_distance: u32) -> HistogramIterator<'a, Iter<'a>> {
        assert!(
            ticks_per_half_distance > 0,
            "Ticks per half distance must be > 0"
        );

        HistogramIterator::new(
            hist,
            Iter {
                hist,
                ticks_per_half_distance,
                percentile_to_iterate_to: 0.0,
                reached_end: false,
            },
        )
    }
}

impl<'a> PickyIterator for Iter<'a> {
    #[allow(clippy::float_cmp)]
    fn pick(&mut self, _: usize, running_total: i64, count_at_index: i64) -> Option<PickMetadata> {
        if count_at_index == 0 || self.reached_end {
            return None;
        }

        let current_percentile = 100.0 * running_total as f64 / self.hist.total_count() as f64;
        if current_percentile < self.percentile_to_iterate_to {
            return None;
        }

        // we're going to yield this as the next percentile
        let metadata = PickMetadata::new(Some(self.percentile_to_iterate_to), None);
        if self.percentile_to_iterate_to == 100.0 {
            self.reached_end = true;
            return Some(metadata);
        }

        // The choice to maintain fixed-sized "ticks" in each half-distance to 100% [starting from
        // 0%], as opposed to a "tick" size that varies with each interval, was made to make the
        // steps easily comprehensible and readable to humans. The resulting percentile steps are
        // much easier to browse through in a percentile distribution output, for example.
        //
        // We calculate the number of equal-sized "ticks" that the 0-100 range will be divided by
        // at the current scale. The scale is determined by the percentile level we are iterating
        // to. The following math determines the tick size for the current scale, and maintain a
        // fixed tick size for the remaining "half the distance to 100%" [from either 0% or from
        // the previous half-distance]. When that half-distance is crossed, the scale changes and
        // the tick size is effectively cut in half.
        let percentile_reporting_ticks = f64::from(self.ticks_per_half_distance)
            * 2_f64
                .powi(((100.0 / (100.0 - self.percentile_to_iterate_to)).log2() as i32) + 1);
        self.percentile_to_iterate_to += 100.0 / percentile_reporting_ticks;

        Some(metadata)
    }

    fn more(&mut self, _: usize) -> bool {
        // We want one additional last step to 100%
        if !self.reached_end && self.hist.total_count() > 0 {
            self.percentile_to_iterate_to = 100.0;
            true
        } else {
            false
        }
    }
}
