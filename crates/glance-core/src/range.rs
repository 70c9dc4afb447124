//! Classification of glucose values into display bands.

use serde::{Deserialize, Serialize};

use crate::options::DisplayOptions;

/// Which side of the configured target range a value falls on.
///
/// Presentation layers map each band to a color (red / green / yellow in the
/// stock theme); this crate does not deal in colors itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeBand {
    BelowRange,
    InRange,
    AboveRange,
}

impl RangeBand {
    /// Classify `value` against explicit thresholds.
    ///
    /// Both bounds are exclusive: `value == below` and `value == above` are
    /// in range.
    ///
    /// ```
    /// use glance_core::RangeBand;
    ///
    /// assert_eq!(RangeBand::classify(84, 85, 250), RangeBand::BelowRange);
    /// assert_eq!(RangeBand::classify(85, 85, 250), RangeBand::InRange);
    /// assert_eq!(RangeBand::classify(251, 85, 250), RangeBand::AboveRange);
    /// ```
    #[must_use]
    pub fn classify(value: i32, below: i32, above: i32) -> Self {
        if value < below {
            Self::BelowRange
        } else if value > above {
            Self::AboveRange
        } else {
            Self::InRange
        }
    }

    /// Classify `value` against the thresholds in `options`.
    #[must_use]
    pub fn for_value(value: i32, options: &DisplayOptions) -> Self {
        Self::classify(value, options.below_range, options.above_range)
    }

    /// Short label for text output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::BelowRange => "low",
            Self::InRange => "in range",
            Self::AboveRange => "high",
        }
    }
}

impl std::fmt::Display for RangeBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let options = DisplayOptions::default();
        assert_eq!(RangeBand::for_value(40, &options), RangeBand::BelowRange);
        assert_eq!(RangeBand::for_value(84, &options), RangeBand::BelowRange);
        assert_eq!(RangeBand::for_value(85, &options), RangeBand::InRange);
        assert_eq!(RangeBand::for_value(250, &options), RangeBand::InRange);
        assert_eq!(RangeBand::for_value(251, &options), RangeBand::AboveRange);
    }

    #[test]
    fn test_custom_thresholds() {
        let options = DisplayOptions {
            below_range: 70,
            above_range: 180,
            ..DisplayOptions::default()
        };
        assert_eq!(RangeBand::for_value(75, &options), RangeBand::InRange);
        assert_eq!(RangeBand::for_value(181, &options), RangeBand::AboveRange);
    }

    #[test]
    fn test_labels() {
        assert_eq!(RangeBand::BelowRange.to_string(), "low");
        assert_eq!(RangeBand::AboveRange.label(), "high");
    }
}
