use crate::Histogram;

pub fn histo(lowest_discernible: i64, highest_trackable: i64, sig_figs: u8) -> Histogram {
    Histogram::new_with_bounds(lowest_discernible, highest_trackable, sig_figs).unwrap()
}
