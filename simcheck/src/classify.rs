//! Classification of similarity scores into review statuses.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SimcheckError};

/// Review status of a comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// No match reaches the warning threshold.
    Safe,
    /// The highest match needs a look.
    Warning,
    /// The highest match is likely plagiarism.
    Flagged,
}

impl Status {
    /// Gets the lower-case name used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Warning => "warning",
            Self::Flagged => "flagged",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "safe" => Ok(Self::Safe),
            "warning" => Ok(Self::Warning),
            "flagged" => Ok(Self::Flagged),
            _ => Err("Could not parse a status value"),
        }
    }
}

/// Policy thresholds. Both bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    /// Scores at or above this value are [`Status::Flagged`] and count as high risk.
    #[serde(default = "default_flagged")]
    pub flagged: f64,
    /// Scores at or above this value (and below `flagged`) are [`Status::Warning`].
    #[serde(default = "default_warning")]
    pub warning: f64,
}

fn default_flagged() -> f64 {
    0.70
}
fn default_warning() -> f64 {
    0.40
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            flagged: default_flagged(),
            warning: default_warning(),
        }
    }
}

impl Thresholds {
    /// Creates validated thresholds.
    pub fn new(flagged: f64, warning: f64) -> Result<Self> {
        let thresholds = Self { flagged, warning };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Checks `0 <= warning <= flagged <= 1`.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.warning) || !(0.0..=1.0).contains(&self.flagged) {
            return Err(SimcheckError::config("thresholds must be within [0, 1]"));
        }
        if self.warning > self.flagged {
            return Err(SimcheckError::config(
                "the warning threshold must not exceed the flagged threshold",
            ));
        }
        Ok(())
    }

    /// Classifies a score.
    pub fn classify(&self, score: f64) -> Status {
        if score >= self.flagged {
            Status::Flagged
        } else if score >= self.warning {
            Status::Warning
        } else {
            Status::Safe
        }
    }

    /// Whether a match counts as high risk.
    pub fn is_high_risk(&self, score: f64) -> bool {
        score >= self.flagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_boundaries() {
        let t = Thresholds::default();
        assert_eq!(t.classify(0.70), Status::Flagged);
        assert_eq!(t.classify(0.6999), Status::Warning);
        assert_eq!(t.classify(0.40), Status::Warning);
        assert_eq!(t.classify(0.3999), Status::Safe);
        assert_eq!(t.classify(0.), Status::Safe);
        assert_eq!(t.classify(1.), Status::Flagged);
    }

    #[test]
    fn test_custom_thresholds() {
        let t = Thresholds::new(0.9, 0.5).unwrap();
        assert_eq!(t.classify(0.8), Status::Warning);
        assert!(!t.is_high_risk(0.8));
        assert!(t.is_high_risk(0.9));
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(Thresholds::new(0.3, 0.5).is_err());
        assert!(Thresholds::new(1.2, 0.5).is_err());
        assert!(Thresholds::new(0.7, -0.1).is_err());
        assert!(Thresholds::new(f64::NAN, 0.1).is_err());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&Status::Flagged).unwrap(), "\"flagged\"");
        assert_eq!("warning".parse::<Status>(), Ok(Status::Warning));
        assert!("unknown".parse::<Status>().is_err());
    }
}
