use crate::tests::helpers::histo;

#[test]
fn equivalent_range_unit_magnitude_0() {
    let h = histo(1, 100_000, 3);

    assert_eq!(1, h.size_of_equivalent_range(0));
    assert_eq!(1, h.size_of_equivalent_range(1));
    assert_eq!(1, h.size_of_equivalent_range(1023));
    // first in top half
    assert_eq!(1, h.size_of_equivalent_range(1024));
    // last in top half
    assert_eq!(1, h.size_of_equivalent_range(2047));
    // first in 2nd bucket
    assert_eq!(2, h.size_of_equivalent_range(2048));
    assert_eq!(2, h.size_of_equivalent_range(2049));
    // end of 2nd bucket
    assert_eq!(2, h.size_of_equivalent_range(4095));

    assert_eq!(7, h.layout().bucket_count());
    // in 7th bucket
    assert_eq!(1 << 6, h.size_of_equivalent_range(100_000));
    // max value in top bucket
    assert_eq!(1 << 6, h.size_of_equivalent_range((1 << 17) - 1));
    // even bigger
    assert_eq!(1 << 7, h.size_of_equivalent_range(1 << 17));
}

#[test]
fn equivalent_range_unit_magnitude_2() {
    let h = histo(4, 100_000, 3);

    assert_eq!(4, h.size_of_equivalent_range(0));
    assert_eq!(4, h.size_of_equivalent_range(1));
    assert_eq!(4, h.size_of_equivalent_range(3));
    assert_eq!(4, h.size_of_equivalent_range(4));
    assert_eq!(4, h.size_of_equivalent_range(4095));
    // first in top half
    assert_eq!(4, h.size_of_equivalent_range(4096));
    // last in top half
    assert_eq!(4, h.size_of_equivalent_range(8188));
    // first in 2nd bucket
    assert_eq!(8, h.size_of_equivalent_range(8192));
    // end of 2nd bucket
    assert_eq!(8, h.size_of_equivalent_range(16384 - 7));

    assert_eq!(5, h.layout().bucket_count());
    // in 5th bucket: same ranges as the unit magnitude 0 case because we're 2 buckets earlier, but
    // with magnitude 2 larger.
    assert_eq!(1 << 6, h.size_of_equivalent_range(100_000));
    assert_eq!(1 << 6, h.size_of_equivalent_range((1 << 17) - 1));
    assert_eq!(1 << 7, h.size_of_equivalent_range(1 << 17));
}

#[test]
fn equivalent_range_unit_magnitude_0_max_buckets() {
    let h = histo(1, i64::max_value(), 3);

    assert_eq!(1, h.size_of_equivalent_range(0));
    assert_eq!(1, h.size_of_equivalent_range(1));
    assert_eq!(1, h.size_of_equivalent_range((1 << 11) - 1));
    // start of second bucket
    assert_eq!(1 << 1, h.size_of_equivalent_range(1 << 11));
    // third
    assert_eq!(1 << 2, h.size_of_equivalent_range(1 << 12));
    assert_eq!(1 << 3, h.size_of_equivalent_range(1 << 13));
    assert_eq!(1 << 4, h.size_of_equivalent_range(1 << 14));
    // ...

    assert_eq!(1 << 52, h.size_of_equivalent_range(1 << 62));
    assert_eq!(1 << 52, h.size_of_equivalent_range(i64::max_value()));
}

#[test]
fn equivalent_range_unit_magnitude_0_min_precision_max_buckets() {
    let h = histo(1, i64::max_value(), 0);

    assert_eq!(1, h.size_of_equivalent_range(0));
    assert_eq!(1, h.size_of_equivalent_range(1));
    // start of second bucket
    assert_eq!(1 << 1, h.size_of_equivalent_range(1 << 1));
    // third
    assert_eq!(1 << 2, h.size_of_equivalent_range(1 << 2));
    // ...

    assert_eq!(1 << 62, h.size_of_equivalent_range(1 << 62));
    assert_eq!(1 << 62, h.size_of_equivalent_range(i64::max_value()));
}

#[test]
fn equivalent_range_unit_magnitude_0_max_precision_max_buckets() {
    let h = histo(1, i64::max_value(), 5);

    assert_eq!(1, h.size_of_equivalent_range(0));
    assert_eq!(1, h.size_of_equivalent_range((1 << 18) - 1));
    // start of second bucket
    assert_eq!(1 << 1, h.size_of_equivalent_range(1 << 18));
    // third
    assert_eq!(1 << 2, h.size_of_equivalent_range(1 << 19));
    // ...

    assert_eq!(1 << 45, h.size_of_equivalent_range(1 << 62));
    assert_eq!(1 << 45, h.size_of_equivalent_range(i64::max_value()));
}

#[test]
fn equivalent_range_unit_magnitude_2_max_buckets() {
    let h = histo(4, i64::max_value(), 3);

    assert_eq!(1 << 2, h.size_of_equivalent_range(0));
    assert_eq!(1 << 2, h.size_of_equivalent_range(1));
    assert_eq!(1 << 2, h.size_of_equivalent_range(1 << 12));
    assert_eq!(1 << 2, h.size_of_equivalent_range((1 << 13) - 1));
    // above lowest value, same ranges at all values
    // start of second bucket
    assert_eq!(1 << 3, h.size_of_equivalent_range(1 << 13));
    // third
    assert_eq!(1 << 4, h.size_of_equivalent_range(1 << 14));
    // ...

    assert_eq!(1 << 52, h.size_of_equivalent_range(1 << 62));
    assert_eq!(1 << 52, h.size_of_equivalent_range(i64::max_value()));
}

#[test]
fn equivalent_range_unit_magnitude_50_max_buckets() {
    let h = histo(1 << 50, i64::max_value(), 3);

    // 11-bit sub buckets
    assert_eq!(2048, h.layout().sub_bucket_count());

    assert_eq!(1 << 50, h.size_of_equivalent_range(0));
    assert_eq!(1 << 50, h.size_of_equivalent_range(4));
    assert_eq!(1 << 50, h.size_of_equivalent_range((1 << 61) - 1));
    // start of second bucket
    assert_eq!(1 << 51, h.size_of_equivalent_range(1 << 61));
    // third
    assert_eq!(1 << 52, h.size_of_equivalent_range(1 << 62));
    assert_eq!(1 << 52, h.size_of_equivalent_range(i64::max_value()));
}

#[test]
fn highest_equivalent_unit_magnitude_0() {
    let h = histo(1, 100_000, 3);

    assert_eq!(0, h.highest_equiv(0));
    assert_eq!(1, h.highest_equiv(1));
    assert_eq!(1023, h.highest_equiv(1023));
    // first in top half
    assert_eq!(1024, h.highest_equiv(1024));
    // last in top half
    assert_eq!(2047, h.highest_equiv(2047));
    // first in 2nd bucket
    assert_eq!(2049, h.highest_equiv(2048));
    assert_eq!(2049, h.highest_equiv(2049));
    // end of 2nd bucket
    assert_eq!(4095, h.highest_equiv(4095));
}

#[test]
fn highest_equivalent_unit_magnitude_2() {
    let h = histo(4, 100_000, 3);

    assert_eq!(3, h.highest_equiv(0));
    assert_eq!(3, h.highest_equiv(1));
    assert_eq!(3, h.highest_equiv(3));
    assert_eq!(7, h.highest_equiv(4));
    assert_eq!(4095, h.highest_equiv(4095));
    // first in top half
    assert_eq!(4099, h.highest_equiv(4096));
    // last in top half
    assert_eq!(8191, h.highest_equiv(8188));
    // first in 2nd bucket
    assert_eq!(8192 + 7, h.highest_equiv(8192));
    // 2nd bucket has a scale of 8
    assert_eq!(8192 + 7, h.highest_equiv(8192 + 7));
    // end of 2nd bucket
    assert_eq!(16384 - 1, h.highest_equiv(16384 - 7));
}

#[test]
fn highest_equivalent_top_of_range() {
    let h = histo(1, i64::max_value(), 3);

    // the last slot ends exactly at the top of the range
    assert_eq!(i64::max_value(), h.highest_equiv(i64::max_value() - 1));
    assert_eq!(i64::max_value(), h.highest_equiv(i64::max_value()));
    assert_eq!(i64::max_value(), h.layout().highest_covered());
}

#[test]
fn next_non_equivalent_unit_magnitude_0() {
    let h = histo(1, 100_000, 3);

    assert_eq!(1, h.next_non_equiv(0));
    assert_eq!(2, h.next_non_equiv(1));
    assert_eq!(1024, h.next_non_equiv(1023));
    // first in top half
    assert_eq!(1025, h.next_non_equiv(1024));
    // last in top half
    assert_eq!(2048, h.next_non_equiv(2047));
    // first in 2nd bucket
    assert_eq!(2050, h.next_non_equiv(2048));
    // but 2nd bucket has a scale of 2, so next value is same
    assert_eq!(2050, h.next_non_equiv(2049));
    // end of 2nd bucket
    assert_eq!(4096, h.next_non_equiv(4095));
}

#[test]
fn next_non_equivalent_unit_magnitude_2() {
    let h = histo(4, 100_000, 3);

    assert_eq!(4, h.next_non_equiv(0));
    assert_eq!(4, h.next_non_equiv(1));
    assert_eq!(4, h.next_non_equiv(3));
    assert_eq!(8, h.next_non_equiv(4));
    assert_eq!(4096, h.next_non_equiv(4095));
    // first in top half
    assert_eq!(4100, h.next_non_equiv(4096));
    // last in top half
    assert_eq!(8192, h.next_non_equiv(8188));
    // first in 2nd bucket
    assert_eq!(8192 + 8, h.next_non_equiv(8192));
    // 2nd bucket has a scale of 8
    assert_eq!(8192 + 8, h.next_non_equiv(8192 + 7));
    // end of 2nd bucket
    assert_eq!(16384, h.next_non_equiv(16384 - 7));
}

#[test]
fn next_non_equivalent_saturates() {
    let h = histo(1, i64::max_value(), 3);

    // the next number would be quite a lot higher...
    assert_eq!(1 << 52, h.size_of_equivalent_range(i64::max_value()));

    // ... but it's capped.
    assert_eq!(i64::max_value(), h.next_non_equiv(i64::max_value() - 1));
    assert_eq!(i64::max_value(), h.next_non_equiv(i64::max_value()));
}

#[test]
fn lowest_equivalent_unit_magnitude_0() {
    let h = histo(1, 100_000, 3);

    assert_eq!(0, h.lowest_equiv(0));
    assert_eq!(1, h.lowest_equiv(1));
    assert_eq!(1023, h.lowest_equiv(1023));
    // first in top half
    assert_eq!(1024, h.lowest_equiv(1024));
    // last in top half
    assert_eq!(2047, h.lowest_equiv(2047));
    // first in 2nd bucket
    assert_eq!(2048, h.lowest_equiv(2048));
    // but 2nd bucket has a scale of 2, so next value is same
    assert_eq!(2048, h.lowest_equiv(2049));
    // end of 2nd bucket
    assert_eq!(4094, h.lowest_equiv(4095));
}

#[test]
fn lowest_equivalent_unit_magnitude_2() {
    let h = histo(4, 100_000, 3);

    assert_eq!(0, h.lowest_equiv(0));
    assert_eq!(0, h.lowest_equiv(1));
    assert_eq!(0, h.lowest_equiv(3));
    assert_eq!(4, h.lowest_equiv(4));
    // last in bottom half
    assert_eq!(1024 * 4 - 4, h.lowest_equiv(1024 * 4 - 1));
    // first in top half
    assert_eq!(1024 * 4, h.lowest_equiv(1024 * 4));
    // last in top half
    assert_eq!(2048 * 4 - 4, h.lowest_equiv(2048 * 4 - 4));
    assert_eq!(2048 * 4 - 4, h.lowest_equiv(2048 * 4 - 1));
    // first in 2nd bucket
    assert_eq!(8192, h.lowest_equiv(8192));
    // 2nd bucket has a scale of 8
    assert_eq!(8192, h.lowest_equiv(8192 + 7));
    // end of 2nd bucket
    assert_eq!(16384 - 8, h.lowest_equiv(16384 - 8));
    assert_eq!(16384 - 8, h.lowest_equiv(16384 - 1));
}

#[test]
fn median_equivalent() {
    let h = histo(1, 100_000, 3);

    assert_eq!(4, h.median_equiv(4));
    assert_eq!(1023, h.median_equiv(1023));
    // scale 2, rounds up
    assert_eq!(2049, h.median_equiv(2048));
    assert_eq!(2049, h.median_equiv(2049));
    // scale 4
    assert_eq!(4098, h.median_equiv(4096));
    assert_eq!(4098, h.median_equiv(4099));
}

#[test]
fn are_equivalent() {
    let h = histo(1, 100_000, 3);

    assert!(h.are_equiv(1023, 1023));
    assert!(!h.are_equiv(1023, 1024));
    assert!(h.are_equiv(2048, 2049));
    assert!(!h.are_equiv(2049, 2050));
    assert!(h.are_equiv(100_000, 100_000 | 63));
    assert!(!h.are_equiv(100_000, (100_000 | 63) + 1));
}

#[test]
fn value_for_unit_magnitude_0() {
    let h = histo(1, 100_000, 3);
    let l = h.layout();

    // first bucket
    assert_eq!(0, l.value_for(0));
    assert_eq!(1023, l.value_for(1023));
    assert_eq!(1024, l.value_for(1024));
    assert_eq!(2047, l.value_for(2047));
    // second bucket
    assert_eq!(2048, l.value_for(2048));
    assert_eq!(4096 - 2, l.value_for(3071));
    // third bucket
    assert_eq!(4096, l.value_for(3072));
}

#[test]
fn value_for_unit_magnitude_2() {
    let h = histo(4, 100_000, 3);
    let l = h.layout();

    // first bucket
    assert_eq!(0, l.value_for(0));
    assert_eq!(1023 * 4, l.value_for(1023));
    assert_eq!(1024 * 4, l.value_for(1024));
    assert_eq!(2047 * 4, l.value_for(2047));
    // second bucket
    assert_eq!(2048 * 4, l.value_for(2048));
    assert_eq!((4096 - 2) * 4, l.value_for(3071));
}

#[test]
fn geometry_bounds_hold_across_range() {
    let h = histo(1, 1 << 40, 3);

    let mut v = 0_i64;
    while v < (1 << 40) {
        let lowest = h.lowest_equiv(v);
        let highest = h.highest_equiv(v);
        assert!(lowest <= v && v <= highest, "value {}", v);
        assert!((v - h.median_equiv(v)).abs() <= h.size_of_equivalent_range(v) / 2);
        // relative error stays within the configured precision
        assert!((highest - lowest) as f64 <= (lowest.max(1) as f64) / 1000.0 + 1.0);
        v = v * 3 / 2 + 1;
    }
}
