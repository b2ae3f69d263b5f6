use crate::{CreationError, Histogram};

pub(crate) mod helpers;
mod value_calculation;

#[test]
fn new_err_high_not_double_low() {
    let res = Histogram::new_with_bounds(10, 15, 0);
    assert_eq!(CreationError::HighLessThanTwiceLow, res.unwrap_err());
}

#[test]
fn new_err_low_zero() {
    let res = Histogram::new_with_bounds(0, 15, 3);
    assert_eq!(CreationError::LowIsZero, res.unwrap_err());
}

#[test]
fn new_err_too_many_sig_figs() {
    assert_eq!(
        CreationError::SigFigExceedsMax,
        Histogram::new(6).unwrap_err()
    );
}
