//! Settings keys, write-time validation, and the quiet-hours window.
//!
//! The gateway re-reads these keys from the settings source on every
//! evaluation, so a changed value takes effect on the next request
//! without a restart.

use chrono::{NaiveTime, Timelike};

use crate::error::ValidationError;

/// Well-known settings keys.
pub mod keys {
    pub const INTERVENTION_BUDGET: &str = "intervention_budget";
    pub const BUDGET_SILENT: &str = "budget_silent";
    pub const BUDGET_LIGHT: &str = "budget_light";
    pub const BUDGET_ACTIVE: &str = "budget_active";
    pub const DAILY_BUDGET_CAP: &str = "daily_budget_cap";
    pub const HOURLY_BUDGET_CAP: &str = "hourly_budget_cap";
    pub const COOLDOWN_SECONDS: &str = "cooldown_seconds";
    pub const FOCUS_MONITOR_ENABLED: &str = "focus_monitor_enabled";
    pub const QUIET_HOURS: &str = "quiet_hours";
    pub const LAST_AUTO_SUGGEST_MS: &str = "last_auto_suggest_ms";
}

/// Validates and canonicalizes a settings value before it is written.
/// Unknown keys pass through trimmed.
pub fn normalize_value(key: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let invalid = |message: &str| ValidationError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    };

    match key {
        keys::INTERVENTION_BUDGET => {
            let lowered = trimmed.to_lowercase();
            match lowered.as_str() {
                "low" | "medium" | "high" => Ok(lowered),
                _ => Err(invalid("expected low, medium or high")),
            }
        }
        keys::FOCUS_MONITOR_ENABLED => {
            let lowered = trimmed.to_lowercase();
            match lowered.as_str() {
                "true" | "false" => Ok(lowered),
                _ => Err(invalid("expected true or false")),
            }
        }
        keys::QUIET_HOURS => {
            if QuietHours::parse(trimmed).is_some() {
                Ok(trimmed.to_string())
            } else {
                Err(invalid("expected HH:MM-HH:MM"))
            }
        }
        keys::BUDGET_SILENT
        | keys::BUDGET_LIGHT
        | keys::BUDGET_ACTIVE
        | keys::DAILY_BUDGET_CAP
        | keys::HOURLY_BUDGET_CAP => match trimmed.parse::<f64>() {
            Ok(parsed) if parsed >= 0.0 => Ok(trimmed.to_string()),
            _ => Err(invalid("expected a non-negative number")),
        },
        keys::COOLDOWN_SECONDS => match trimmed.parse::<i64>() {
            Ok(parsed) if parsed >= 0 => Ok(parsed.to_string()),
            _ => Err(invalid("expected a non-negative integer")),
        },
        _ => Ok(trimmed.to_string()),
    }
}

/// A daily time window, wrap-around aware (`22:00-07:00` spans midnight).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    start_minute: u32,
    end_minute: u32,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            start_minute: 22 * 60,
            end_minute: 7 * 60,
        }
    }
}

impl QuietHours {
    /// Parses `HH:MM-HH:MM`. Returns `None` for anything else, including
    /// a zero-length window.
    pub fn parse(value: &str) -> Option<Self> {
        let (start, end) = value.split_once('-')?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H:%M").ok()?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H:%M").ok()?;
        let start_minute = start.hour() * 60 + start.minute();
        let end_minute = end.hour() * 60 + end.minute();
        if start_minute == end_minute {
            return None;
        }
        Some(Self {
            start_minute,
            end_minute,
        })
    }

    /// Whether the given time of day falls inside the window.
    pub fn contains(&self, time: NaiveTime) -> bool {
        let minute = time.hour() * 60 + time.minute();
        if self.start_minute < self.end_minute {
            minute >= self.start_minute && minute < self.end_minute
        } else {
            minute >= self.start_minute || minute < self.end_minute
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_intervention_budget() {
        assert_eq!(
            normalize_value(keys::INTERVENTION_BUDGET, " High ").unwrap(),
            "high"
        );
        assert!(normalize_value(keys::INTERVENTION_BUDGET, "extreme").is_err());
    }

    #[test]
    fn normalize_numeric_keys() {
        assert_eq!(normalize_value(keys::BUDGET_LIGHT, "6.5").unwrap(), "6.5");
        assert!(normalize_value(keys::BUDGET_LIGHT, "-1").is_err());
        assert_eq!(normalize_value(keys::COOLDOWN_SECONDS, " 300 ").unwrap(), "300");
        assert!(normalize_value(keys::COOLDOWN_SECONDS, "1.5").is_err());
    }

    #[test]
    fn normalize_unknown_key_passes_through() {
        assert_eq!(normalize_value("some_new_key", "  hi  ").unwrap(), "hi");
    }

    #[test]
    fn quiet_hours_parse_rejects_garbage() {
        assert!(QuietHours::parse("22:00-07:00").is_some());
        assert!(QuietHours::parse("2200-0700").is_none());
        assert!(QuietHours::parse("22:00").is_none());
        assert!(QuietHours::parse("22:00-22:00").is_none());
    }

    #[test]
    fn quiet_hours_wraps_midnight() {
        let window = QuietHours::parse("22:00-07:00").unwrap();
        assert!(window.contains(NaiveTime::from_hms_opt(23, 30, 0).unwrap()));
        assert!(window.contains(NaiveTime::from_hms_opt(3, 0, 0).unwrap()));
        assert!(!window.contains(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
        assert!(!window.contains(NaiveTime::from_hms_opt(7, 0, 0).unwrap()));
        assert!(window.contains(NaiveTime::from_hms_opt(22, 0, 0).unwrap()));
    }

    #[test]
    fn quiet_hours_same_day_window() {
        let window = QuietHours::parse("09:00-17:00").unwrap();
        assert!(window.contains(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
        assert!(!window.contains(NaiveTime::from_hms_opt(18, 0, 0).unwrap()));
    }
}
