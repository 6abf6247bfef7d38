//! Ordering rules for a day's GPS punches and freshness of the GPS fix.

use chrono::NaiveDateTime;

use crate::error::{AppError, AppResult};
use crate::model::gps_log::PunchType;

/// Which punches an employee already has for the day.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DayPunches {
    pub check_in: bool,
    pub lunch_out: bool,
    pub lunch_in: bool,
    pub check_out: bool,
}

impl DayPunches {
    pub fn from_types<I: IntoIterator<Item = PunchType>>(types: I) -> Self {
        let mut day = DayPunches::default();
        for t in types {
            day.record(t);
        }
        day
    }

    pub fn record(&mut self, punch: PunchType) {
        match punch {
            PunchType::CheckIn => self.check_in = true,
            PunchType::LunchOut => self.lunch_out = true,
            PunchType::LunchIn => self.lunch_in = true,
            PunchType::CheckOut => self.check_out = true,
        }
    }

    /// Each punch happens at most once and in order: check-in, lunch-out,
    /// lunch-in, check-out. Lunch is optional.
    pub fn validate_next(&self, punch: PunchType) -> AppResult<()> {
        let err = |m: &str| Err(AppError::bad_request(m));
        match punch {
            PunchType::CheckIn if self.check_in => err("Check-in already recorded for today"),
            PunchType::LunchOut if !self.check_in => {
                err("Please check-in first before marking lunch out")
            }
            PunchType::LunchOut if self.lunch_out => err("Lunch out already recorded for today"),
            PunchType::LunchIn if !self.lunch_out => {
                err("Please mark lunch out first before marking lunch in")
            }
            PunchType::LunchIn if self.lunch_in => err("Lunch in already recorded for today"),
            PunchType::CheckOut if !self.check_in => {
                err("Please check-in first before checking out")
            }
            PunchType::CheckOut if self.check_out => err("Check-out already recorded for today"),
            _ => Ok(()),
        }
    }
}

/// A missing timestamp is accepted.
pub fn validate_fix_age(
    captured_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
    max_age_secs: i64,
    max_skew_secs: i64,
) -> AppResult<()> {
    let Some(captured_at) = captured_at else {
        return Ok(());
    };
    let age = (now - captured_at).num_seconds();
    if age < -max_skew_secs {
        return Err(AppError::bad_request(format!(
            "Location timestamp is too far in the future ({} seconds ahead). Please check your device time settings.",
            -age
        )));
    }
    if age > max_age_secs {
        return Err(AppError::bad_request(format!(
            "Location data is too old ({age} seconds). Location must be captured within the last {max_age_secs} seconds."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    #[test]
    fn first_punch_must_be_check_in() {
        let day = DayPunches::default();
        assert!(day.validate_next(PunchType::CheckIn).is_ok());
        assert!(day.validate_next(PunchType::LunchOut).is_err());
        assert!(day.validate_next(PunchType::LunchIn).is_err());
        assert!(day.validate_next(PunchType::CheckOut).is_err());
    }

    #[test]
    fn lunch_is_optional_but_ordered() {
        let day = DayPunches::from_types([PunchType::CheckIn]);
        assert!(day.validate_next(PunchType::CheckOut).is_ok());
        assert!(day.validate_next(PunchType::LunchOut).is_ok());
        assert!(day.validate_next(PunchType::LunchIn).is_err());

        let day = DayPunches::from_types([PunchType::CheckIn, PunchType::LunchOut]);
        assert!(day.validate_next(PunchType::LunchIn).is_ok());
        assert!(day.validate_next(PunchType::LunchOut).is_err());
    }

    #[test]
    fn every_punch_happens_once() {
        let day = DayPunches::from_types([
            PunchType::CheckIn,
            PunchType::LunchOut,
            PunchType::LunchIn,
            PunchType::CheckOut,
        ]);
        assert!(day.validate_next(PunchType::CheckIn).is_err());
        assert!(day.validate_next(PunchType::LunchOut).is_err());
        assert!(day.validate_next(PunchType::LunchIn).is_err());
        let err = day.validate_next(PunchType::CheckOut).unwrap_err();
        assert_eq!(err.to_string(), "Check-out already recorded for today");
    }

    #[test]
    fn fix_age_window() {
        let now = NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let ago = |s| Some(now - Duration::seconds(s));
        assert!(validate_fix_age(None, now, 60, 10).is_ok());
        assert!(validate_fix_age(ago(60), now, 60, 10).is_ok());
        assert!(validate_fix_age(ago(61), now, 60, 10).is_err());
        assert!(validate_fix_age(ago(-10), now, 60, 10).is_ok());
        assert!(validate_fix_age(ago(-11), now, 60, 10).is_err());
    }
}
