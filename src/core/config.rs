use serde::{Deserialize, Serialize};

use crate::errors::CreationError;

/// Largest supported number of significant decimal digits.
pub const MAX_SIG_FIGS: u8 = 5;

/// The settings a histogram is built from.
///
/// A `Config` is plain data: it can be built by hand, loaded from a configuration file through
/// serde, or copied from an existing histogram with `Histogram::config`. It is checked when a
/// histogram is created from it (see `validate`).
///
/// ```
/// use hdrhist::{Config, Histogram};
///
/// // track 1 microsecond to 1 hour (in nanoseconds) with 3 digits of precision
/// let config = Config::new(1_000, 3_600_000_000_000, 3);
/// let h = Histogram::with_config(config).unwrap();
/// assert_eq!(1_000, h.config().lowest_discernible);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// The lowest value that can be distinguished from 0. Values below it share bucket 0's first
    /// slots. Internally rounded down to a power of two.
    pub lowest_discernible: i64,
    /// The highest value to be tracked. Must be at least twice `lowest_discernible`.
    pub highest_trackable: i64,
    /// Number of significant decimal digits to maintain across the whole range, in `[0, 5]`.
    pub sig_figs: u8,
    /// Grow the histogram instead of rejecting values above `highest_trackable`.
    #[serde(default)]
    pub auto_resize: bool,
}

impl Config {
    /// Settings for a fixed-range histogram. Nothing is checked until the config is validated.
    pub fn new(lowest_discernible: i64, highest_trackable: i64, sig_figs: u8) -> Config {
        Config {
            lowest_discernible,
            highest_trackable,
            sig_figs,
            auto_resize: false,
        }
    }

    /// Enable or disable auto-resizing.
    pub fn with_auto_resize(mut self, enabled: bool) -> Config {
        self.auto_resize = enabled;
        self
    }

    /// Check the settings, returning the config a histogram should actually use.
    ///
    /// When auto-resize is enabled a highest trackable value below `2 * lowest_discernible` is
    /// raised to that minimum, since the histogram will grow on demand anyway. Without
    /// auto-resize it is an error.
    pub fn validate(self) -> Result<Config, CreationError> {
        if self.lowest_discernible < 1 {
            return Err(CreationError::LowIsZero);
        }
        if self.lowest_discernible > i64::max_value() / 2 {
            // highest must be at least twice lowest, so lowest has to fit in half the range
            return Err(CreationError::LowExceedsMax);
        }
        if self.sig_figs > MAX_SIG_FIGS {
            return Err(CreationError::SigFigExceedsMax);
        }

        let min_highest = 2 * self.lowest_discernible;
        let mut validated = self;
        if self.auto_resize && self.highest_trackable < min_highest {
            validated.highest_trackable = min_highest;
        }
        if validated.highest_trackable < min_highest {
            return Err(CreationError::HighLessThanTwiceLow);
        }

        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_zero_low() {
        assert_eq!(
            CreationError::LowIsZero,
            Config::new(0, 100, 3).validate().unwrap_err()
        );
    }

    #[test]
    fn validate_rejects_low_above_half_range() {
        assert_eq!(
            CreationError::LowExceedsMax,
            Config::new(i64::max_value() / 2 + 1, i64::max_value(), 3)
                .validate()
                .unwrap_err()
        );
    }

    #[test]
    fn validate_rejects_too_many_sig_figs() {
        assert_eq!(
            CreationError::SigFigExceedsMax,
            Config::new(1, 100, 6).validate().unwrap_err()
        );
    }

    #[test]
    fn validate_rejects_high_below_twice_low() {
        assert_eq!(
            CreationError::HighLessThanTwiceLow,
            Config::new(2, 3, 3).validate().unwrap_err()
        );
        assert!(Config::new(2, 4, 3).validate().is_ok());
        assert!(Config::new(2, 5, 3).validate().is_ok());
        assert!(Config::new(12, 30, 3).validate().is_ok());
    }

    #[test]
    fn validate_raises_high_when_auto_resizing() {
        let c = Config::new(1, 1, 3)
            .with_auto_resize(true)
            .validate()
            .unwrap();
        assert_eq!(2, c.highest_trackable);
    }

    #[test]
    fn validate_keeps_configured_high() {
        let c = Config::new(1, 11, 3).validate().unwrap();
        assert_eq!(11, c.highest_trackable);
    }

    #[test]
    fn serde_defaults_auto_resize_off() {
        let c: Config = serde_json::from_str(
            r#"{"lowest_discernible":1,"highest_trackable":1000,"sig_figs":2}"#,
        )
        .unwrap();
        assert_eq!(Config::new(1, 1000, 2), c);
    }

    #[test]
    fn serde_round_trip() {
        let c = Config::new(1000, 3_600_000_000, 3).with_auto_resize(true);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(c, serde_json::from_str(&json).unwrap());
    }
}
