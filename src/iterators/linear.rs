use crate::iterators::{HistogramIterator, PickMetadata, PickyIterator};
use crate::Histogram;

/// An iterator that will yield at fixed-size steps through the histogram's value range.
pub struct Iter<'a> {
    hist: &'a Histogram,

    // > 0
    value_units_per_bucket: i64,
    current_step_highest_value_reporting_level: i64,
    current_step_lowest_value_reporting_level: i64,
}

impl<'a> Iter<'a> {
    /// Construct a new linear iterator. See `Histogram::iter_linear` for details.
    pub fn new(hist: &'a Histogram, value_units_per_bucket: i64) -> HistogramIterator<'a, Iter<'a>> {
        assert!(value_units_per_bucket > 0, "value_units_per_bucket must be > 0");

        let new_lowest = hist.lowest_equiv(value_units_per_bucket - 1);
        HistogramIterator::new(
            hist,
            Iter {
                hist,
                value_units_per_bucket,
                current_step_highest_value_reporting_level: value_units_per_bucket - 1,
                current_step_lowest_value_reporting_level: new_lowest,
            },
        )
    }
}

impl<'a> PickyIterator for Iter<'a> {
    fn pick(&mut self, index: usize, _: i64, _: i64) -> Option<PickMetadata> {
        let val = self.hist.layout().value_for(index);
        if val >= self.current_step_lowest_value_reporting_level
            || index == self.hist.layout().last_index()
        {
            let metadata =
                PickMetadata::new(None, Some(self.current_step_highest_value_reporting_level));
            self.current_step_highest_value_reporting_level = self
                .current_step_highest_value_reporting_level
                .saturating_add(self.value_units_per_bucket);
            self.current_step_lowest_value_reporting_level = self
                .hist
                .lowest_equiv(self.current_step_highest_value_reporting_level);
            Some(metadata)
        } else {
            None
        }
    }

    fn more(&mut self, index_to_pick: usize) -> bool {
        // Keep stepping while the next slot still starts above the current reporting level, so
        // the last step covers the last recorded value rather than stopping at it. The level was
        // already advanced past the previous step.
        self.current_step_highest_value_reporting_level
            < self.hist.layout().value_for(index_to_pick + 1)
    }
}
