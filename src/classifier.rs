//! Severity classification of the latest reading.
//!
//! Thresholds are checked most severe first and the first match wins; any
//! single breached limit is enough to reach a tier. The texts are fixed per
//! tier and have nothing to do with the free-text advisory.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reactor::Reading;

pub mod limits {
    pub const EMERGENCY_TEMP_C: f64 = 550.0;
    pub const EMERGENCY_RADIATION_USV: f64 = 180.0;

    pub const WARNING_TEMP_C: f64 = 450.0;
    pub const WARNING_RADIATION_USV: f64 = 120.0;
    pub const WARNING_PRESSURE_BAR: f64 = 180.0;
}

use limits::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityTier {
    Nominal,
    Warning,
    Emergency,
}

impl SeverityTier {
    /// Label used in the status report
    pub fn label(self) -> &'static str {
        match self {
            SeverityTier::Nominal => "NORMAL",
            SeverityTier::Warning => "WARNING",
            SeverityTier::Emergency => "EMERGENCY",
        }
    }

    pub fn assessment(self) -> &'static str {
        match self {
            SeverityTier::Nominal => "All reactor parameters are within nominal operating limits.",
            SeverityTier::Warning => {
                "Reactor parameters show abnormal trends indicating potential instability."
            }
            SeverityTier::Emergency => {
                "Critical safety thresholds exceeded. Core temperature or radiation levels are unsafe."
            }
        }
    }

    pub fn action(self) -> &'static str {
        match self {
            SeverityTier::Nominal => "Continue routine monitoring.",
            SeverityTier::Warning => "Increase coolant flow and prepare for possible SCRAM.",
            SeverityTier::Emergency => {
                "Initiate immediate SCRAM and evacuate non-essential personnel."
            }
        }
    }

    /// Display colour hint for presentation
    pub fn color(self) -> &'static str {
        match self {
            SeverityTier::Nominal => "#39ff14",
            SeverityTier::Warning => "#ff9d00",
            SeverityTier::Emergency => "#ff3131",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tier plus the fixed operator-facing text for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub tier: SeverityTier,
    pub assessment: &'static str,
    pub action: &'static str,
}

impl Assessment {
    /// Three-line status report shown in the co-pilot panel
    pub fn report(&self) -> String {
        format!(
            "Status: {}\nAssessment: {}\nAction: {}",
            self.tier.label(),
            self.assessment,
            self.action
        )
    }
}

/// Header badge: critical mode is on whenever the tier is Emergency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub critical_mode: bool,
    pub text: &'static str,
    pub color: &'static str,
}

impl From<SeverityTier> for StatusBadge {
    fn from(tier: SeverityTier) -> Self {
        if tier == SeverityTier::Emergency {
            StatusBadge {
                critical_mode: true,
                text: "CRITICAL STATE",
                color: tier.color(),
            }
        } else {
            StatusBadge {
                critical_mode: false,
                text: "AI OVERWATCH ACTIVE",
                color: SeverityTier::Nominal.color(),
            }
        }
    }
}

pub fn tier_of(reading: &Reading) -> SeverityTier {
    if reading.temperature > EMERGENCY_TEMP_C || reading.radiation > EMERGENCY_RADIATION_USV {
        SeverityTier::Emergency
    } else if reading.temperature > WARNING_TEMP_C
        || reading.radiation > WARNING_RADIATION_USV
        || reading.pressure > WARNING_PRESSURE_BAR
    {
        SeverityTier::Warning
    } else {
        SeverityTier::Nominal
    }
}

pub fn classify(reading: &Reading) -> Assessment {
    let tier = tier_of(reading);
    Assessment {
        tier,
        assessment: tier.assessment(),
        action: tier.action(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(temperature: f64, radiation: f64, pressure: f64) -> Reading {
        Reading {
            temperature,
            radiation,
            pressure,
            ..Reading::baseline()
        }
    }

    #[test]
    fn scenario_tiers() {
        assert_eq!(classify(&reading(600.0, 200.0, 150.0)).tier, SeverityTier::Emergency);
        assert_eq!(classify(&reading(460.0, 50.0, 100.0)).tier, SeverityTier::Warning);
        assert_eq!(classify(&reading(300.0, 12.5, 150.0)).tier, SeverityTier::Nominal);
    }

    #[test]
    fn single_breach_is_enough() {
        assert_eq!(tier_of(&reading(300.0, 181.0, 150.0)), SeverityTier::Emergency);
        assert_eq!(tier_of(&reading(551.0, 0.1, 150.0)), SeverityTier::Emergency);
        assert_eq!(tier_of(&reading(300.0, 12.5, 181.0)), SeverityTier::Warning);
        assert_eq!(tier_of(&reading(300.0, 121.0, 150.0)), SeverityTier::Warning);
    }

    #[test]
    fn limits_are_exclusive() {
        assert_eq!(tier_of(&reading(550.0, 180.0, 180.0)), SeverityTier::Warning);
        assert_eq!(tier_of(&reading(450.0, 120.0, 180.0)), SeverityTier::Nominal);
    }

    #[test]
    fn classification_is_pure() {
        let r = reading(500.0, 130.0, 160.0);
        assert_eq!(classify(&r), classify(&r));
    }

    #[test]
    fn report_and_badge() {
        let a = classify(&reading(600.0, 200.0, 150.0));
        assert_eq!(
            a.report(),
            "Status: EMERGENCY\n\
             Assessment: Critical safety thresholds exceeded. Core temperature or radiation levels are unsafe.\n\
             Action: Initiate immediate SCRAM and evacuate non-essential personnel."
        );
        let badge = StatusBadge::from(a.tier);
        assert!(badge.critical_mode);
        assert_eq!(badge.text, "CRITICAL STATE");

        let calm = StatusBadge::from(SeverityTier::Warning);
        assert!(!calm.critical_mode);
        assert_eq!(calm.text, "AI OVERWATCH ACTIVE");
        assert_eq!(calm.color, "#39ff14");
    }
}
