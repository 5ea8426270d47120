//! Wall-clock formatting in the configured timezone.

use crate::ChorusCoreError;
use chorus_rs_config::TimeConfig;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Formats the current time for logs, memory, and model context.
#[derive(Clone)]
pub struct TimeSource {
    clock: Arc<dyn Clock>,
    tz: Tz,
    label: String,
    format: String,
}

impl std::fmt::Debug for TimeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSource")
            .field("tz", &self.tz)
            .field("label", &self.label)
            .field("format", &self.format)
            .finish()
    }
}

impl TimeSource {
    pub fn from_config(config: &TimeConfig) -> Result<Self, ChorusCoreError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &TimeConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ChorusCoreError> {
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|_| ChorusCoreError::InvalidTimezone(config.timezone.clone()))?;
        Ok(Self {
            clock,
            tz,
            label: config.label.clone(),
            format: config.format.clone(),
        })
    }

    /// Current time, e.g. `01-02-2024 10:00 AM`.
    pub fn stamp(&self) -> String {
        self.clock
            .now()
            .with_timezone(&self.tz)
            .format(&self.format)
            .to_string()
    }

    /// Current time with the zone label, e.g. `01-02-2024 10:00 AM EST`.
    pub fn labeled(&self) -> String {
        format!("{} {}", self.stamp(), self.label)
    }

    /// Suffix appended to system prompts.
    pub fn annotation(&self) -> String {
        format!("\nCurrent Time: {}", self.labeled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn fixed() -> TimeSource {
        let instant = Utc.with_ymd_and_hms(2024, 1, 2, 15, 4, 0).single().expect("instant");
        TimeSource::with_clock(&TimeConfig::default(), Arc::new(FixedClock(instant)))
            .expect("time source")
    }

    #[test]
    fn formats_in_configured_zone() {
        let time = fixed();
        assert_eq!(time.stamp(), "01-02-2024 10:04 AM");
        assert_eq!(time.labeled(), "01-02-2024 10:04 AM EST");
        assert_eq!(time.annotation(), "\nCurrent Time: 01-02-2024 10:04 AM EST");
    }

    #[test]
    fn rejects_unknown_timezone() {
        let config = TimeConfig {
            timezone: "Mars/Olympus".to_string(),
            ..TimeConfig::default()
        };
        let err = TimeSource::from_config(&config).unwrap_err();
        assert!(matches!(err, ChorusCoreError::InvalidTimezone(_)));
    }
}
