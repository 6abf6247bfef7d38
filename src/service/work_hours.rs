//! Working and overtime hours for one attendance day.
//!
//! Office hours are 09:00-18:00 with a compulsory one hour lunch, so a full
//! day counts as eight working hours. Early arrivals before 08:00 and late
//! departures from 19:00 accrue overtime; Sundays are overtime only.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

const STANDARD_WORKING_HOURS: f64 = 8.0;
const LUNCH_MINUTES: i64 = 60;

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct DayHours {
    pub working_hours: f64,
    pub overtime_hours: f64,
}

#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Punches {
    pub check_in: Option<NaiveDateTime>,
    pub lunch_out: Option<NaiveDateTime>,
    pub lunch_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
}

pub fn compute_day_hours(date: NaiveDate, punches: &Punches) -> DayHours {
    let (Some(check_in), Some(check_out)) = (punches.check_in, punches.check_out) else {
        return DayHours::default();
    };

    if date.weekday() == Weekday::Sun {
        let minutes = (check_out - check_in).num_minutes();
        return DayHours {
            working_hours: 0.0,
            overtime_hours: minutes as f64 / 60.0,
        };
    }

    let office_start = hm(9, 0);
    let office_end = hm(18, 0);

    let norm_in = normalize_check_in(check_in);
    let norm_out = normalize_check_out(check_out);
    let day = norm_in.date();

    let mut working = (office_end - office_start).num_minutes() as f64 / 60.0;
    working -= LUNCH_MINUTES as f64 / 60.0;
    working -= extra_lunch_hours(punches.lunch_out, punches.lunch_in);

    if norm_in.time() >= hm(9, 16) {
        let late = (norm_in - day.and_time(office_start)).num_minutes();
        working -= late as f64 / 60.0;
    }
    if norm_out.time() < office_end {
        let early = (day.and_time(office_end) - norm_out).num_minutes();
        working -= early as f64 / 60.0;
    }

    DayHours {
        working_hours: working.min(STANDARD_WORKING_HOURS).max(0.0),
        overtime_hours: morning_overtime(check_in) + evening_overtime(check_out),
    }
}

/// 08:00-09:15 is grace and counts as 09:00, so does anything before 08:00
/// (that time is overtime). From 09:16 the real time stands.
fn normalize_check_in(check_in: NaiveDateTime) -> NaiveDateTime {
    if check_in.time() >= hm(9, 16) {
        check_in
    } else {
        check_in.date().and_time(hm(9, 0))
    }
}

fn normalize_check_out(check_out: NaiveDateTime) -> NaiveDateTime {
    let t = check_out.time();
    if t >= hm(18, 0) && t < hm(19, 0) {
        check_out.date().and_time(hm(18, 0))
    } else {
        check_out
    }
}

fn extra_lunch_hours(lunch_out: Option<NaiveDateTime>, lunch_in: Option<NaiveDateTime>) -> f64 {
    match (lunch_out, lunch_in) {
        (Some(out), Some(back)) => {
            let minutes = (back - out).num_minutes();
            if minutes > LUNCH_MINUTES {
                (minutes - LUNCH_MINUTES) as f64 / 60.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn morning_overtime(check_in: NaiveDateTime) -> f64 {
    let t = check_in.time();
    if t >= hm(0, 1) && t < hm(8, 0) {
        let minutes = (check_in.date().and_time(hm(8, 0)) - check_in).num_minutes();
        minutes.max(0) as f64 / 60.0
    } else {
        0.0
    }
}

fn evening_overtime(check_out: NaiveDateTime) -> f64 {
    if check_out.time() >= hm(19, 0) {
        let minutes = (check_out - check_out.date().and_time(hm(19, 0))).num_minutes();
        minutes.max(0) as f64 / 60.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2025-03-03 is a Monday, 2025-03-02 a Sunday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> Option<NaiveDateTime> {
        date.and_hms_opt(h, m, 0)
    }

    fn day(check_in: (u32, u32), check_out: (u32, u32)) -> Punches {
        let d = monday();
        Punches {
            check_in: at(d, check_in.0, check_in.1),
            lunch_out: at(d, 13, 0),
            lunch_in: at(d, 14, 0),
            check_out: at(d, check_out.0, check_out.1),
        }
    }

    fn assert_hours(got: DayHours, working: f64, overtime: f64) {
        assert!((got.working_hours - working).abs() < 1e-9, "working {got:?}");
        assert!((got.overtime_hours - overtime).abs() < 1e-9, "overtime {got:?}");
    }

    #[test]
    fn regular_day_is_eight_hours() {
        assert_hours(compute_day_hours(monday(), &day((9, 0), (18, 0))), 8.0, 0.0);
    }

    #[test]
    fn grace_windows_are_not_penalised() {
        assert_hours(compute_day_hours(monday(), &day((9, 15), (18, 45))), 8.0, 0.0);
        assert_hours(compute_day_hours(monday(), &day((8, 0), (18, 0))), 8.0, 0.0);
    }

    #[test]
    fn late_arrival_counts_from_nine() {
        assert_hours(compute_day_hours(monday(), &day((9, 30), (18, 0))), 7.5, 0.0);
    }

    #[test]
    fn early_departure_is_deducted() {
        assert_hours(compute_day_hours(monday(), &day((9, 0), (17, 0))), 7.0, 0.0);
    }

    #[test]
    fn early_arrival_and_late_departure_accrue_overtime() {
        assert_hours(compute_day_hours(monday(), &day((7, 0), (20, 30))), 8.0, 2.5);
    }

    #[test]
    fn long_lunch_is_deducted() {
        let mut p = day((9, 0), (18, 0));
        p.lunch_in = at(monday(), 14, 30);
        assert_hours(compute_day_hours(monday(), &p), 7.5, 0.0);
    }

    #[test]
    fn missing_lunch_still_deducts_one_hour() {
        let mut p = day((9, 0), (18, 0));
        p.lunch_out = None;
        p.lunch_in = None;
        assert_hours(compute_day_hours(monday(), &p), 8.0, 0.0);
    }

    #[test]
    fn sunday_is_all_overtime() {
        let sunday = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let p = Punches {
            check_in: at(sunday, 10, 0),
            check_out: at(sunday, 14, 30),
            ..Punches::default()
        };
        assert_hours(compute_day_hours(sunday, &p), 0.0, 4.5);
    }

    #[test]
    fn incomplete_day_counts_nothing() {
        let mut p = day((9, 0), (18, 0));
        p.check_out = None;
        assert_eq!(compute_day_hours(monday(), &p), DayHours::default());
    }

    #[test]
    fn working_hours_never_negative() {
        assert_hours(compute_day_hours(monday(), &day((9, 0), (9, 30))), 0.0, 0.0);
    }
}
