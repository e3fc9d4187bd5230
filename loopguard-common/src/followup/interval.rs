//! Recommendation interval value object
//!
//! Parses the interval phrases radiologists write ("3 months", "1 year",
//! "6-12 months") and converts them to the whole months a recommendation
//! stores.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::MAX_INTERVAL_MONTHS;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl IntervalUnit {
    fn parse(raw: &str) -> Result<Self> {
        let unit = raw.trim().to_ascii_lowercase();
        match unit.trim_end_matches('s') {
            "day" => Ok(IntervalUnit::Days),
            "week" | "wk" => Ok(IntervalUnit::Weeks),
            "month" | "mo" => Ok(IntervalUnit::Months),
            "year" | "yr" => Ok(IntervalUnit::Years),
            _ => Err(Error::Validation(format!("Unknown time unit: {}", raw))),
        }
    }

    /// Largest value in this unit that stays within the longest interval
    fn max_value(&self) -> u32 {
        match self {
            IntervalUnit::Days => MAX_INTERVAL_MONTHS * 30,
            IntervalUnit::Weeks => MAX_INTERVAL_MONTHS * 4,
            IntervalUnit::Months => MAX_INTERVAL_MONTHS,
            IntervalUnit::Years => MAX_INTERVAL_MONTHS / 12,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Days => "days",
            IntervalUnit::Weeks => "weeks",
            IntervalUnit::Months => "months",
            IntervalUnit::Years => "years",
        }
    }
}

/// A follow-up interval, optionally a range like "6-12 months"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationInterval {
    value: u32,
    unit: IntervalUnit,
    max_value: Option<u32>,
}

impl RecommendationInterval {
    pub fn new(value: u32, unit: IntervalUnit, max_value: Option<u32>) -> Result<Self> {
        if value == 0 {
            return Err(Error::Validation("Interval value must be positive".to_string()));
        }
        if let Some(max) = max_value {
            if max <= value {
                return Err(Error::Validation(
                    "Interval range maximum must be greater than its minimum".to_string(),
                ));
            }
        }
        let limit = unit.max_value();
        if max_value.unwrap_or(value) > limit {
            return Err(Error::Validation(format!(
                "Interval may not exceed {} {}",
                limit,
                unit.as_str()
            )));
        }
        Ok(Self {
            value,
            unit,
            max_value,
        })
    }

    /// Whole months, collapsing whole years to the years unit
    pub fn from_months(months: u32) -> Result<Self> {
        if months >= 12 && months % 12 == 0 {
            Self::new(months / 12, IntervalUnit::Years, None)
        } else {
            Self::new(months, IntervalUnit::Months, None)
        }
    }

    /// Parse "3 months", "1 yr", "6-12 months", "2weeks"
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim().to_ascii_lowercase();
        let invalid = || Error::Validation(format!("Cannot parse interval: {}", text));

        let digits_end = text
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let value: u32 = text[..digits_end].parse().map_err(|_| invalid())?;
        let rest = text[digits_end..].trim_start();

        let (max_value, unit_text) = match rest.strip_prefix('-') {
            Some(range_rest) => {
                let range_rest = range_rest.trim_start();
                let max_end = range_rest
                    .find(|c: char| !c.is_ascii_digit())
                    .ok_or_else(invalid)?;
                let max: u32 = range_rest[..max_end].parse().map_err(|_| invalid())?;
                (Some(max), &range_rest[max_end..])
            }
            None => (None, rest),
        };

        let unit_word = unit_text.split_whitespace().next().ok_or_else(invalid)?;
        let unit = IntervalUnit::parse(unit_word)?;
        Self::new(value, unit, max_value)
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn unit(&self) -> IntervalUnit {
        self.unit
    }

    pub fn max_value(&self) -> Option<u32> {
        self.max_value
    }

    /// Approximate days (30-day months, 365-day years)
    pub fn to_days(&self) -> u32 {
        let multiplier = match self.unit {
            IntervalUnit::Days => 1,
            IntervalUnit::Weeks => 7,
            IntervalUnit::Months => 30,
            IntervalUnit::Years => 365,
        };
        self.value * multiplier
    }

    /// Approximate whole months, never less than one
    ///
    /// Ranges use their lower bound: the earliest recommended follow-up.
    pub fn to_months(&self) -> u32 {
        let months = match self.unit {
            IntervalUnit::Days => self.value / 30,
            IntervalUnit::Weeks => self.value / 4,
            IntervalUnit::Months => self.value,
            IntervalUnit::Years => self.value * 12,
        };
        months.max(1)
    }
}

impl fmt::Display for RecommendationInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(max) = self.max_value {
            return write!(f, "{}-{} {}", self.value, max, self.unit.as_str());
        }
        let unit = self.unit.as_str();
        if self.value == 1 {
            write!(f, "1 {}", unit.trim_end_matches('s'))
        } else {
            write!(f, "{} {}", self.value, unit)
        }
    }
}
