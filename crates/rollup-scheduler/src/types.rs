use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use rollup_core::config::ScheduleConfig;

use crate::error::{Result, SchedulerError};

/// Fire every day at `hour:minute` local time in `timezone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySchedule {
    pub hour: u8,
    pub minute: u8,
    /// IANA zone name, e.g. "America/Chicago".
    pub timezone: String,
}

impl DailySchedule {
    /// Parse the zone and range-check the wall-clock time.
    pub fn zone(&self) -> Result<Tz> {
        if self.hour > 23 || self.minute > 59 {
            return Err(SchedulerError::InvalidSchedule(format!(
                "{:02}:{:02} is not a valid time of day",
                self.hour, self.minute
            )));
        }
        self.timezone.parse::<Tz>().map_err(|e| {
            SchedulerError::InvalidSchedule(format!("unknown timezone {:?}: {e}", self.timezone))
        })
    }
}

impl From<&ScheduleConfig> for DailySchedule {
    fn from(cfg: &ScheduleConfig) -> Self {
        Self {
            hour: cfg.hour,
            minute: cfg.minute,
            timezone: cfg.timezone.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_eight_am_chicago() {
        let s = DailySchedule::from(&ScheduleConfig::default());
        assert_eq!((s.hour, s.minute), (8, 0));
        assert_eq!(s.zone().unwrap(), chrono_tz::America::Chicago);
    }

    #[test]
    fn rejects_bad_zone_and_time() {
        let mut s = DailySchedule {
            hour: 8,
            minute: 0,
            timezone: "Mars/Olympus".into(),
        };
        assert!(matches!(s.zone(), Err(SchedulerError::InvalidSchedule(_))));

        s.timezone = "UTC".into();
        s.hour = 24;
        assert!(s.zone().is_err());
    }

    #[test]
    fn serde_shape() {
        let s: DailySchedule =
            serde_json::from_str(r#"{"hour":8,"minute":30,"timezone":"Europe/Berlin"}"#).unwrap();
        assert_eq!(s.minute, 30);
    }
}
