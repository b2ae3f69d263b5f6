//! Iterators over a histogram's contents.
//!
//! Every iterator walks the counts array in increasing value order, and differs only in which
//! positions it stops at. That decision is delegated to a `PickyIterator`.

use crate::{HistVal, Histogram};

/// An iterator that iterates over histogram values.
pub mod all;
/// An iterator that iterates linearly over histogram values.
pub mod linear;
/// An iterator that iterates logarithmically over histogram values.
pub mod log;
/// An iterator that iterates over histogram values at percentile steps.
pub mod percentile;
/// An iterator that iterates over recorded histogram values.
pub mod recorded;

/// Extra information about the picked point in the histogram provided by the picker.
pub struct PickMetadata {
    /// Supply the percentile iterated to in the last `pick()`, if the picker can supply a more
    /// precise value than the percentile of the counts seen so far.
    percentile_iterated_to: Option<f64>,

    /// Supply the value iterated to in the last `pick()`, if the picker can supply a more
    /// relevant value than the highest value equivalent to the picked slot.
    value_iterated_to: Option<i64>,
}

impl PickMetadata {
    fn new(percentile_iterated_to: Option<f64>, value_iterated_to: Option<i64>) -> PickMetadata {
        PickMetadata {
            percentile_iterated_to,
            value_iterated_to,
        }
    }
}

/// A trait for designing an subset iterator over values in a `Histogram`.
pub trait PickyIterator {
    /// Return `Some` if an `HistVal` should be emitted at this point.
    ///
    /// `index` is a valid index in the relevant histogram.
    ///
    /// This will be called with the same index until it returns `None`. This enables modes of
    /// iteration that pick different values represented by the same bucket, for instance.
    fn pick(
        &mut self,
        index: usize,
        total_count_to_index: i64,
        count_at_index: i64,
    ) -> Option<PickMetadata>;

    /// Should we keep iterating even though the last index with non-zero count has already been
    /// picked at least once?
    ///
    /// This will be called on every iteration once the last index with non-zero count has been
    /// picked, even if the index was not advanced in the last iteration (because `pick()` returned
    /// `Some`).
    fn more(&mut self, index_to_pick: usize) -> bool;
}

/// `HistogramIterator` provides a base iterator for a `Histogram`.
///
/// It will iterate over all discrete values until there are no more recorded values (i.e. *not*
/// necessarily until all bins have been exhausted). To facilitate the development of more
/// sophisticated iterators, a *picker* is also provided, which is allowed to only select some bins
/// that should be yielded. The picker may also extend the iteration to include a suffix of empty
/// bins.
pub struct HistogramIterator<'a, P: PickyIterator> {
    hist: &'a Histogram,
    total_count_to_index: i64,
    count_since_last_iteration: i64,
    count_at_index: i64,
    current_index: usize,
    last_picked_index: usize,
    max_value_index: usize,
    fresh: bool,
    ended: bool,
    picker: P,
}

impl<'a, P: PickyIterator> HistogramIterator<'a, P> {
    fn new(h: &'a Histogram, picker: P) -> HistogramIterator<'a, P> {
        HistogramIterator {
            hist: h,
            total_count_to_index: 0,
            count_since_last_iteration: 0,
            count_at_index: 0,
            current_index: 0,
            last_picked_index: 0,
            max_value_index: h.last_nonzero_index().unwrap_or(0),
            picker,
            fresh: true,
            ended: false,
        }
    }

    fn current(&self, metadata: PickMetadata) -> HistVal {
        let total = self.hist.total_count();
        let percentile = metadata.percentile_iterated_to.unwrap_or_else(|| {
            if total == 0 {
                100.0
            } else {
                100.0 * self.total_count_to_index as f64 / total as f64
            }
        });
        let value = metadata.value_iterated_to.unwrap_or_else(|| {
            self.hist
                .highest_equiv(self.hist.layout().value_for(self.current_index))
        });
        HistVal {
            value,
            count: self.count_since_last_iteration,
            cumulative_count: self.total_count_to_index,
            percentile,
        }
    }
}

impl<'a, P> Iterator for HistogramIterator<'a, P>
where
    P: PickyIterator,
{
    type Item = HistVal;

    fn next(&mut self) -> Option<Self::Item> {
        // Most of the counts array (especially towards the end) is zeros, which we don't want to
        // walk through needlessly. So we iterate over indices until the last non-zero index has
        // been picked. After that, we iterate only until .more() returns false, at which point we
        // stop completely.

        // A picker may pick the same index several times, so we loop instead of recursing when
        // we would otherwise have yielded None.
        while !self.ended {
            // have we reached the end?
            if self.current_index == self.hist.len() {
                self.ended = true;
                return None;
            }

            // Have we already picked the index with the last non-zero count in the histogram?
            if self.last_picked_index >= self.max_value_index
                && self.total_count_to_index == self.hist.total_count()
            {
                // is the picker done?
                if !self.picker.more(self.current_index) {
                    self.ended = true;
                    return None;
                }
            } else if self.fresh {
                // This is the first time we've gone to this index, so add its count.
                let count = self.hist.counts()[self.current_index];
                self.count_at_index = count;
                self.total_count_to_index = self.total_count_to_index.saturating_add(count);
                self.count_since_last_iteration =
                    self.count_since_last_iteration.saturating_add(count);

                // make sure we don't add this index again
                self.fresh = false;
            }

            // figure out if picker thinks we should yield this value
            if let Some(metadata) = self.picker.pick(
                self.current_index,
                self.total_count_to_index,
                self.count_at_index,
            ) {
                let val = self.current(metadata);

                // Note that we *don't* increment self.current_index here. The picker will be
                // exposed to the same index again after yielding. This is to allow a picker to
                // pick multiple times at the same index. An example of this is how the percentile
                // iterator has many percentile steps in the same bucket.

                self.last_picked_index = self.current_index;
                self.count_since_last_iteration = 0;
                return Some(val);
            }

            // check the next entry
            self.current_index += 1;
            self.fresh = true;
        }
        None
    }
}
