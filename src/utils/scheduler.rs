//! Daily background jobs.

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime};
use sqlx::MySqlPool;

use crate::config::Config;
use crate::service::absence;

/// Time left until the next `at`, strictly in the future.
pub fn until_next_run(now: NaiveDateTime, at: NaiveTime) -> ChronoDuration {
    let today = now.date().and_time(at);
    let next = if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    };
    next - now
}

/// Catches up yesterday once, then marks absences every day at the
/// configured time.
pub fn spawn_absence_job(pool: MySqlPool, config: &Config) {
    if !config.absent_job_enabled {
        tracing::info!("Absence job disabled");
        return;
    }
    let at = config.absent_job_time;

    actix_web::rt::spawn(async move {
        let yesterday = Local::now().date_naive() - ChronoDuration::days(1);
        if let Err(e) = absence::mark_absent_for_date(&pool, yesterday).await {
            tracing::error!(error = %e, %yesterday, "Absence catch-up failed");
        }

        loop {
            let wait = until_next_run(Local::now().naive_local(), at);
            tracing::debug!(seconds = wait.num_seconds(), "Next absence run scheduled");
            actix_web::rt::time::sleep(wait.to_std().unwrap_or_default()).await;

            let today = Local::now().date_naive();
            if let Err(e) = absence::mark_absent_for_date(&pool, today).await {
                tracing::error!(error = %e, %today, "Absence job failed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn waits_until_later_today() {
        let t = NaiveTime::from_hms_opt(23, 59, 0).unwrap();
        assert_eq!(until_next_run(at(23, 0), t), ChronoDuration::minutes(59));
    }

    #[test]
    fn rolls_to_tomorrow_when_time_passed() {
        let t = NaiveTime::from_hms_opt(23, 59, 0).unwrap();
        assert_eq!(until_next_run(at(23, 59), t), ChronoDuration::days(1));
        let t = NaiveTime::from_hms_opt(1, 0, 0).unwrap();
        assert_eq!(until_next_run(at(2, 0), t), ChronoDuration::hours(23));
    }
}
