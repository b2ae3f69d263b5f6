use crate::core::config::Config;
use crate::errors::CreationError;

/// The bucket geometry derived from a `Config`.
///
/// Buckets (each of which has `sub_bucket_count` sub-buckets, here assumed to be 2048 as an
/// example) overlap:
///
/// ```text
/// The 0'th bucket covers 0...2047 in multiples of 1, using all 2048 sub-buckets
/// The 1'th bucket covers 2048..4095 in multiples of 2, using only the top 1024 sub-buckets
/// The 2'th bucket covers 4096..8191 in multiple of 4, using only the top 1024 sub-buckets
/// ...
/// ```
///
/// Bucket 0 is the only one that uses all of its sub-buckets. Every other bucket's lower half is
/// already covered, with better precision, by the buckets before it, so only its upper half gets
/// slots in the counts array. That is why the counts array holds `bucket_count + 1` halves.
///
/// A layout never changes after it is built. Growing a histogram builds a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketLayout {
    unit_magnitude: u8,
    sub_bucket_half_count_magnitude: u8,
    sub_bucket_count: u32,
    sub_bucket_half_count: u32,
    sub_bucket_mask: u64,
    leading_zero_count_base: u8,
    bucket_count: u8,
    counts_len: usize,
}

impl BucketLayout {
    /// Derive the geometry for an already validated config.
    pub fn new(config: &Config) -> Result<BucketLayout, CreationError> {
        // lowest_discernible >= 1, so this is floor(log2(lowest_discernible))
        let unit_magnitude = (63 - (config.lowest_discernible as u64).leading_zeros()) as u8;

        // Given a 3 decimal point accuracy, the expectation is obviously for "+/- 1 unit at 1000".
        // It also means that it's "ok to be +/- 2 units at 2000". The "tricky" thing is that it is
        // NOT ok to be +/- 2 units at 1999. Only starting at 2000. So internally, we need to
        // maintain single unit resolution to 2x 10^decimal_points.
        let largest_value_with_single_unit_resolution = 2 * 10_u64.pow(u32::from(config.sig_figs));

        // ceil(log2(x)) for x >= 2
        let sub_bucket_count_magnitude =
            (64 - (largest_value_with_single_unit_resolution - 1).leading_zeros()) as u8;
        let sub_bucket_half_count_magnitude = sub_bucket_count_magnitude.max(1) - 1;

        // the largest value in bucket 0 must stay a positive i64
        if unit_magnitude + sub_bucket_half_count_magnitude > 61 {
            return Err(CreationError::CannotRepresentSigFigBeyondLow);
        }

        let sub_bucket_count = 1_u32 << (sub_bucket_half_count_magnitude + 1);
        let sub_bucket_half_count = sub_bucket_count / 2;
        let sub_bucket_mask = (u64::from(sub_bucket_count) - 1) << unit_magnitude;

        let mut layout = BucketLayout {
            unit_magnitude,
            sub_bucket_half_count_magnitude,
            sub_bucket_count,
            sub_bucket_half_count,
            sub_bucket_mask,
            // subtract the bits that would be used by the largest value in bucket 0
            leading_zero_count_base: 64 - unit_magnitude - sub_bucket_half_count_magnitude - 1,
            bucket_count: 0,
            counts_len: 0,
        };

        layout.bucket_count = layout.buckets_needed_to_cover(config.highest_trackable);
        layout.counts_len = (usize::from(layout.bucket_count) + 1)
            .checked_mul(sub_bucket_half_count as usize)
            .ok_or(CreationError::UsizeTypeTooSmall)?;

        Ok(layout)
    }

    /// Number of slots in a counts array using this layout.
    pub fn counts_len(&self) -> usize {
        self.counts_len
    }

    /// Number of power-of-two buckets.
    pub fn bucket_count(&self) -> u8 {
        self.bucket_count
    }

    /// Sub-buckets per bucket (a power of two).
    pub fn sub_bucket_count(&self) -> u32 {
        self.sub_bucket_count
    }

    /// Half of `sub_bucket_count`.
    pub fn sub_bucket_half_count(&self) -> u32 {
        self.sub_bucket_half_count
    }

    /// `log2(sub_bucket_half_count)`.
    pub fn sub_bucket_half_count_magnitude(&self) -> u8 {
        self.sub_bucket_half_count_magnitude
    }

    /// Mask covering the values that fall into bucket 0.
    pub fn sub_bucket_mask(&self) -> u64 {
        self.sub_bucket_mask
    }

    /// `floor(log2(lowest_discernible))`.
    pub fn unit_magnitude(&self) -> u8 {
        self.unit_magnitude
    }

    /// Index of the last slot in the counts array.
    pub fn last_index(&self) -> usize {
        self.counts_len - 1
    }

    /// The highest value this layout can count without growing.
    pub fn highest_covered(&self) -> i64 {
        self.highest_equiv(self.value_for(self.last_index()))
    }

    /// Counts array index for `value`, or `None` if the value is negative or beyond the layout's
    /// coverage.
    pub fn index_for(&self, value: i64) -> Option<usize> {
        if value < 0 {
            return None;
        }
        let value = value as u64;
        let bucket_index = self.bucket_for(value);
        let sub_bucket_index = self.sub_bucket_for(value, bucket_index);

        debug_assert!(sub_bucket_index < self.sub_bucket_count);
        debug_assert!(bucket_index == 0 || (sub_bucket_index >= self.sub_bucket_half_count));

        // Calculate the index for the first entry that will be used in the bucket (halfway through
        // sub_bucket_count). For bucket_index 0, all sub_bucket_count entries may be used, but
        // bucket_base_index is still set in the middle.
        let bucket_base_index =
            (usize::from(bucket_index) + 1) << self.sub_bucket_half_count_magnitude;

        // Calculate the offset in the bucket. This is negative for the lower half of bucket 0,
        // which is why the base index sits in the middle: bucket 0 gets twice the space.
        let index = bucket_base_index - self.sub_bucket_half_count as usize
            + sub_bucket_index as usize;

        if index < self.counts_len {
            Some(index)
        } else {
            None
        }
    }

    /// The lowest value that maps to `index`.
    ///
    /// This is the exact inverse of `index_for` for every in-range index.
    pub fn value_for(&self, index: usize) -> i64 {
        // Dividing by sub bucket half count will yield 1 in top half of first bucket, 2 in top
        // half (i.e., the only half that's used) of 2nd bucket, etc, so subtract 1 to get
        // 0-indexed bucket indexes. This will be -1 for the bottom half of the first bucket.
        let mut bucket_index = (index >> self.sub_bucket_half_count_magnitude) as isize - 1;

        // Calculate the remainder of dividing by sub_bucket_half_count, shifted into the top half
        // of the corresponding bucket. This will (temporarily) map indexes in the lower half of
        // first bucket into the top half.
        let mut sub_bucket_index = ((index as u64 & (u64::from(self.sub_bucket_half_count) - 1))
            + u64::from(self.sub_bucket_half_count)) as u32;
        if bucket_index < 0 {
            // lower half of first bucket case; move sub bucket index back
            sub_bucket_index -= self.sub_bucket_half_count;
            bucket_index = 0;
        }

        self.value_from_loc(bucket_index as u8, sub_bucket_index)
    }

    /// Width, in value units, of the range of values that share a slot with `value`.
    pub fn size_of_equivalent_range(&self, value: i64) -> i64 {
        let value = value.max(0) as u64;
        let bucket_index = self.bucket_for(value);
        let sub_bucket_index = self.sub_bucket_for(value, bucket_index);
        // an overflowed sub bucket index belongs to the next bucket up
        let shift = self.unit_magnitude
            + if sub_bucket_index >= self.sub_bucket_count {
                bucket_index + 1
            } else {
                bucket_index
            };
        saturate((1_u64 << shift) as u128)
    }

    /// The lowest value that shares a slot with `value`.
    pub fn lowest_equiv(&self, value: i64) -> i64 {
        let value = value.max(0) as u64;
        let bucket_index = self.bucket_for(value);
        let sub_bucket_index = self.sub_bucket_for(value, bucket_index);
        self.value_from_loc(bucket_index, sub_bucket_index)
    }

    /// The highest value that shares a slot with `value`.
    pub fn highest_equiv(&self, value: i64) -> i64 {
        // the top slot ends exactly at i64::max_value(), so don't go through next_non_equiv
        let lowest = self.lowest_equiv(value) as u128;
        saturate(lowest + self.size_of_equivalent_range(value) as u128 - 1)
    }

    /// The value in the middle (rounded up) of the range of values sharing a slot with `value`.
    pub fn median_equiv(&self, value: i64) -> i64 {
        self.lowest_equiv(value)
            .saturating_add(self.size_of_equivalent_range(value) >> 1)
    }

    /// The smallest value above `value` that does not share its slot.
    pub fn next_non_equiv(&self, value: i64) -> i64 {
        self.lowest_equiv(value)
            .saturating_add(self.size_of_equivalent_range(value))
    }

    /// Whether both values are counted in the same slot.
    pub fn are_equiv(&self, a: i64, b: i64) -> bool {
        self.lowest_equiv(a) == self.lowest_equiv(b)
    }

    /// Number of buckets required for the layout to count `value`.
    ///
    /// The k'th bucket can express from 0 * 2^k to sub_bucket_count * 2^k in units of 2^k.
    pub fn buckets_needed_to_cover(&self, value: i64) -> u8 {
        let mut smallest_untrackable_value =
            u64::from(self.sub_bucket_count) << self.unit_magnitude;
        let value = value.max(0) as u64;

        // always have at least 1 bucket
        let mut buckets_needed = 1;
        while smallest_untrackable_value <= value {
            if smallest_untrackable_value > (i64::max_value() / 2) as u64 {
                // next shift will overflow, meaning that bucket could represent values up to ones
                // greater than i64::max_value(), so it's the last bucket
                return buckets_needed + 1;
            }
            smallest_untrackable_value <<= 1;
            buckets_needed += 1;
        }
        buckets_needed
    }

    /// Compute the lowest (and therefore highest precision) bucket index whose sub-buckets can
    /// represent the value.
    #[inline]
    pub(crate) fn bucket_for(&self, value: u64) -> u8 {
        // Calculates the number of powers of two by which the value is greater than the biggest
        // value that fits in bucket 0. This is the bucket index since each successive bucket can
        // hold a value 2x greater. The mask maps small values to bucket 0.
        self.leading_zero_count_base - (value | self.sub_bucket_mask).leading_zeros() as u8
    }

    /// Compute the position inside a bucket at which the given value should be recorded.
    ///
    /// For bucket 0 this is just the value (in units), anywhere in `[0, sub_bucket_count)`. For
    /// any other bucket it lands in the top half: a value in the bottom half of bucket k would
    /// also have been in the top half of bucket k-1, and `bucket_for` would have picked that one.
    #[inline]
    pub(crate) fn sub_bucket_for(&self, value: u64, bucket_index: u8) -> u32 {
        (value >> (bucket_index + self.unit_magnitude)) as u32
    }

    #[inline]
    fn value_from_loc(&self, bucket_index: u8, sub_bucket_index: u32) -> i64 {
        saturate(u128::from(sub_bucket_index) << (bucket_index + self.unit_magnitude))
    }
}

#[inline]
fn saturate(v: u128) -> i64 {
    if v > i64::max_value() as u128 {
        i64::max_value()
    } else {
        v as i64
    }
}
