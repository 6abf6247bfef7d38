//! Monthly salary calculation: calendar, attendance proration, earnings,
//! statutory deductions and slip limits.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::model::employee::Employee;

const HOURS_PER_DAY: f64 = 8.0;
const MIN_WORKING_DAYS: i32 = 1;

const EPF_THRESHOLD: f64 = 15_000.0;
const FIXED_EPF_EMPLOYEE: f64 = 1_800.0;
const FIXED_EPF_EMPLOYER: f64 = 1_950.0;

const MAX_BASIC_SALARY: f64 = 1_000_000.0;
const MAX_TOTAL_EARNINGS: f64 = 500_000.0;
const MAX_NET_SALARY: f64 = 400_000.0;
const MAX_BASIC_PAY: f64 = 200_000.0;
const MAX_EPF_EMPLOYEE_DEDUCTION: f64 = 50_000.0;

/// Deductions and overrides supplied by the person running payroll.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct PayAdjustments {
    #[serde(default)]
    pub tds: f64,
    #[serde(default)]
    pub advance_salary_recovery: f64,
    #[serde(default)]
    pub loan_recovery: f64,
    #[serde(default)]
    pub fuel_advance_recovery: f64,
    #[serde(default)]
    pub other_deductions: f64,
    /// Replaces the employee's other allowance as the (unprorated) incentive.
    pub other_incentive: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct CalendarSummary {
    pub total_days_in_month: i32,
    pub working_days: i32,
    pub weekly_offs: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub total_effective_working_hours: f64,
    pub total_overtime_hours: f64,
    pub raw_present_days: f64,
    pub present_days: i32,
    pub absent_days: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Earnings {
    pub basic_pay: f64,
    pub hra_amount: f64,
    pub medical_allowance: f64,
    pub conveyance_allowance: f64,
    pub uniform_and_safety_allowance: f64,
    pub bonus: f64,
    pub food_allowance: f64,
    pub special_allowance: f64,
    pub overtime_pay: f64,
    pub total_special_allowance: f64,
    pub other_incentive: f64,
    pub epf_employer_earnings: f64,
    pub total_earnings: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Deductions {
    pub epf_employee_deduction: f64,
    pub epf_employer_deduction: f64,
    pub esic_deduction: f64,
    pub professional_tax: f64,
    pub tds: f64,
    pub advance_salary_recovery: f64,
    pub loan_recovery: f64,
    pub fuel_advance_recovery: f64,
    pub other_deductions: f64,
    pub total_statutory_deductions: f64,
    pub total_other_deductions: f64,
    pub total_deductions: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct SalaryBreakdown {
    pub calendar: CalendarSummary,
    pub attendance: AttendanceSummary,
    pub proration_factor: f64,
    pub earnings: Earnings,
    pub deductions: Deductions,
    pub net_salary: f64,
    pub daily_rate: f64,
    pub hourly_rate: f64,
    pub overtime_rate: f64,
}

pub fn validate_period(year: i32, month: u32) -> AppResult<()> {
    if !(2020..=2030).contains(&year) {
        return Err(AppError::bad_request("Year must be between 2020 and 2030"));
    }
    if !(1..=12).contains(&month) {
        return Err(AppError::bad_request("Month must be between 1 and 12"));
    }
    Ok(())
}

/// First and last day of the month.
pub fn month_bounds(year: i32, month: u32) -> AppResult<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::bad_request("Invalid year/month"))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| AppError::bad_request("Invalid year/month"))?;
    Ok((first, last))
}

/// Monday to Saturday are working days; Sundays are weekly offs.
pub fn calendar_for(year: i32, month: u32) -> AppResult<CalendarSummary> {
    let (first, last) = month_bounds(year, month)?;
    let mut working_days = 0;
    let mut weekly_offs = 0;
    for day in first.iter_days().take_while(|d| *d <= last) {
        if day.weekday() == Weekday::Sun {
            weekly_offs += 1;
        } else {
            working_days += 1;
        }
    }
    Ok(CalendarSummary {
        total_days_in_month: last.day() as i32,
        working_days: working_days.max(MIN_WORKING_DAYS),
        weekly_offs,
    })
}

/// `days` holds `(working_hours, overtime_hours)` per attendance row.
pub fn summarize_attendance(days: &[(f64, f64)], working_days: i32) -> AttendanceSummary {
    let total_effective_working_hours: f64 = days.iter().map(|(w, _)| w).sum();
    let total_overtime_hours: f64 = days.iter().map(|(_, o)| o).sum();
    let raw_present_days = total_effective_working_hours / HOURS_PER_DAY;
    let present_days = raw_present_days.round() as i32;
    AttendanceSummary {
        total_effective_working_hours,
        total_overtime_hours,
        raw_present_days,
        present_days,
        absent_days: (working_days - present_days).max(0),
    }
}

pub fn validate_salary_structure(emp: &Employee) -> AppResult<()> {
    if emp.basic_salary <= 0.0 || emp.basic_salary > MAX_BASIC_SALARY {
        return Err(AppError::bad_request("Basic salary must be > 0 and ≤ ₹10,00,000"));
    }
    if emp.has_uan() && !(0.0..=15.0).contains(&emp.epf_employee) {
        return Err(AppError::bad_request("EPF rate must be between 0% and 15%"));
    }
    if emp.has_esic() && !(0.0..=5.0).contains(&emp.esic) {
        return Err(AppError::bad_request("ESIC rate must be between 0% and 5%"));
    }
    if emp.overtime_rate < 1.0 {
        return Err(AppError::bad_request("Overtime rate must be ≥ 1.0"));
    }
    Ok(())
}

fn earnings_for(emp: &Employee, factor: f64, overtime_hours: f64, adj: &PayAdjustments) -> Earnings {
    let basic_pay = emp.basic_salary * factor;
    let hra_amount = emp.house_rent_allowance * factor;
    let conveyance_allowance = emp.conveyance * factor;
    let uniform_and_safety_allowance = emp.uniform_and_safety * factor;
    let bonus = emp.bonus * factor;
    let food_allowance = emp.food_allowance * factor;
    let special_allowance = emp.other_allowance * factor;
    let overtime_pay = overtime_hours * emp.overtime_rate;
    let total_special_allowance = special_allowance + overtime_pay;
    let other_incentive = adj.other_incentive.unwrap_or(emp.other_allowance);

    let epf_employer_earnings = if basic_pay > EPF_THRESHOLD {
        FIXED_EPF_EMPLOYER
    } else {
        basic_pay * emp.epf_employer / 100.0
    };

    let medical_allowance = 0.0;
    let total_earnings = basic_pay
        + hra_amount
        + medical_allowance
        + conveyance_allowance
        + uniform_and_safety_allowance
        + bonus
        + food_allowance
        + total_special_allowance
        + other_incentive
        + epf_employer_earnings;

    Earnings {
        basic_pay,
        hra_amount,
        medical_allowance,
        conveyance_allowance,
        uniform_and_safety_allowance,
        bonus,
        food_allowance,
        special_allowance,
        overtime_pay,
        total_special_allowance,
        other_incentive,
        epf_employer_earnings,
        total_earnings,
    }
}

fn deductions_for(emp: &Employee, basic_pay: f64, adj: &PayAdjustments) -> Deductions {
    let (epf_employee_deduction, epf_employer_deduction) = match emp.has_uan() {
        false => (0.0, 0.0),
        true if basic_pay > EPF_THRESHOLD => (FIXED_EPF_EMPLOYEE, FIXED_EPF_EMPLOYER),
        true => (
            basic_pay * emp.epf_employee / 100.0,
            basic_pay * emp.epf_employer / 100.0,
        ),
    };
    let esic_deduction = if emp.has_esic() {
        basic_pay * emp.esic / 100.0
    } else {
        0.0
    };
    let professional_tax = emp.professional_tax;

    let total_statutory_deductions =
        epf_employee_deduction + epf_employer_deduction + esic_deduction + professional_tax;
    let total_other_deductions = adj.tds
        + adj.advance_salary_recovery
        + adj.loan_recovery
        + adj.fuel_advance_recovery
        + adj.other_deductions;

    Deductions {
        epf_employee_deduction,
        epf_employer_deduction,
        esic_deduction,
        professional_tax,
        tds: adj.tds,
        advance_salary_recovery: adj.advance_salary_recovery,
        loan_recovery: adj.loan_recovery,
        fuel_advance_recovery: adj.fuel_advance_recovery,
        other_deductions: adj.other_deductions,
        total_statutory_deductions,
        total_other_deductions,
        total_deductions: total_statutory_deductions + total_other_deductions,
    }
}

/// Full calculation for one employee and month. `days` are the month's
/// attendance rows as `(working_hours, overtime_hours)`.
pub fn calculate(
    emp: &Employee,
    year: i32,
    month: u32,
    days: &[(f64, f64)],
    adj: &PayAdjustments,
) -> AppResult<SalaryBreakdown> {
    validate_period(year, month)?;
    validate_salary_structure(emp)?;

    let calendar = calendar_for(year, month)?;
    let attendance = summarize_attendance(days, calendar.working_days);
    if attendance.present_days > calendar.working_days {
        return Err(AppError::bad_request(format!(
            "Present days ({}) cannot exceed working days ({})",
            attendance.present_days, calendar.working_days
        )));
    }

    let proration_factor = attendance.present_days as f64 / calendar.working_days as f64;
    let earnings = earnings_for(emp, proration_factor, attendance.total_overtime_hours, adj);
    let deductions = deductions_for(emp, earnings.basic_pay, adj);
    let net_salary = (earnings.total_earnings - deductions.total_deductions).round();

    let daily_rate = emp.basic_salary / calendar.working_days as f64;
    let breakdown = SalaryBreakdown {
        calendar,
        attendance,
        proration_factor,
        earnings,
        deductions,
        net_salary,
        daily_rate,
        hourly_rate: daily_rate / HOURS_PER_DAY,
        overtime_rate: emp.overtime_rate,
    };
    validate_breakdown(&breakdown)?;
    Ok(breakdown)
}

pub fn validate_breakdown(b: &SalaryBreakdown) -> AppResult<()> {
    if b.net_salary < 0.0 {
        return Err(AppError::bad_request("Net salary cannot be negative"));
    }
    if b.earnings.total_earnings <= 0.0 {
        return Err(AppError::bad_request("Total earnings must be > 0"));
    }
    if b.earnings.total_earnings > MAX_TOTAL_EARNINGS {
        return Err(AppError::bad_request("Total earnings cannot exceed ₹5,00,000"));
    }
    if b.net_salary > MAX_NET_SALARY {
        return Err(AppError::bad_request("Net salary cannot exceed ₹4,00,000"));
    }
    if b.earnings.basic_pay > MAX_BASIC_PAY {
        return Err(AppError::bad_request("Basic pay cannot exceed ₹2,00,000"));
    }
    if b.deductions.epf_employee_deduction > MAX_EPF_EMPLOYEE_DEDUCTION {
        return Err(AppError::bad_request("EPF employee deduction cannot exceed ₹50,000"));
    }
    Ok(())
}

/// "March 2025"
pub fn period_label(year: i32, month: u32) -> String {
    match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(d) => d.format("%B %Y").to_string(),
        None => format!("{month}/{year}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::employee::sample_employee;

    fn full_days(n: usize) -> Vec<(f64, f64)> {
        vec![(8.0, 0.0); n]
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn march_2025_calendar() {
        let cal = calendar_for(2025, 3).unwrap();
        assert_eq!(cal.total_days_in_month, 31);
        assert_eq!(cal.weekly_offs, 5);
        assert_eq!(cal.working_days, 26);

        let feb = calendar_for(2024, 2).unwrap();
        assert_eq!(feb.total_days_in_month, 29);
        assert_eq!(feb.weekly_offs + feb.working_days, 29);
    }

    #[test]
    fn period_bounds_are_enforced() {
        assert!(validate_period(2019, 5).is_err());
        assert!(validate_period(2031, 5).is_err());
        assert!(validate_period(2025, 0).is_err());
        assert!(validate_period(2025, 13).is_err());
        assert!(validate_period(2025, 12).is_ok());
        assert_eq!(
            month_bounds(2025, 12).unwrap().1,
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
    }

    #[test]
    fn attendance_rounds_present_days() {
        let s = summarize_attendance(&[(8.0, 1.0), (4.0, 0.5)], 26);
        assert!(close(s.raw_present_days, 1.5));
        assert_eq!(s.present_days, 2);
        assert_eq!(s.absent_days, 24);
        assert!(close(s.total_overtime_hours, 1.5));
    }

    #[test]
    fn full_month_above_epf_threshold_uses_fixed_epf() {
        let emp = sample_employee();
        let mut days = full_days(26);
        days[0].1 = 10.0;
        let adj = PayAdjustments {
            tds: 500.0,
            ..PayAdjustments::default()
        };
        let b = calculate(&emp, 2025, 3, &days, &adj).unwrap();

        assert!(close(b.proration_factor, 1.0));
        assert!(close(b.earnings.overtime_pay, 1_500.0));
        assert!(close(b.earnings.total_special_allowance, 3_500.0));
        assert!(close(b.earnings.epf_employer_earnings, 1_950.0));
        assert!(close(b.earnings.total_earnings, 39_750.0));
        assert!(close(b.deductions.epf_employee_deduction, 1_800.0));
        assert!(close(b.deductions.total_statutory_deductions, 3_950.0));
        assert!(close(b.deductions.total_deductions, 4_450.0));
        assert!(close(b.net_salary, 35_300.0));
        assert!(close(b.daily_rate, 20_000.0 / 26.0));
        assert!(close(b.hourly_rate, 20_000.0 / 26.0 / 8.0));
    }

    #[test]
    fn half_month_prorates_and_uses_percentage_epf() {
        let emp = sample_employee();
        let b = calculate(&emp, 2025, 3, &full_days(13), &PayAdjustments::default()).unwrap();

        assert!(close(b.proration_factor, 0.5));
        assert!(close(b.earnings.basic_pay, 10_000.0));
        assert!(close(b.earnings.epf_employer_earnings, 1_300.0));
        // other incentive is not prorated
        assert!(close(b.earnings.other_incentive, 2_000.0));
        assert!(close(b.earnings.total_earnings, 20_450.0));
        assert!(close(b.deductions.epf_employee_deduction, 1_200.0));
        assert!(close(b.deductions.epf_employer_deduction, 1_300.0));
        assert!(close(b.net_salary, 17_750.0));
    }

    #[test]
    fn no_uan_means_no_epf_deduction_and_esic_applies_with_number() {
        let mut emp = sample_employee();
        emp.uan_number = None;
        emp.esic_number = Some("3100123456".into());
        let b = calculate(&emp, 2025, 3, &full_days(26), &PayAdjustments::default()).unwrap();
        assert_eq!(b.deductions.epf_employee_deduction, 0.0);
        assert_eq!(b.deductions.epf_employer_deduction, 0.0);
        assert!(close(b.deductions.esic_deduction, 150.0));
    }

    #[test]
    fn incentive_override_replaces_other_allowance() {
        let emp = sample_employee();
        let adj = PayAdjustments {
            other_incentive: Some(0.0),
            ..PayAdjustments::default()
        };
        let b = calculate(&emp, 2025, 3, &full_days(26), &adj).unwrap();
        assert_eq!(b.earnings.other_incentive, 0.0);
    }

    #[test]
    fn more_present_days_than_working_days_is_rejected() {
        let emp = sample_employee();
        let err = calculate(&emp, 2025, 3, &full_days(27), &PayAdjustments::default()).unwrap_err();
        assert!(err.to_string().contains("cannot exceed working days"));
    }

    #[test]
    fn structure_validation() {
        let mut emp = sample_employee();
        emp.basic_salary = 0.0;
        assert!(validate_salary_structure(&emp).is_err());

        let mut emp = sample_employee();
        emp.epf_employee = 16.0;
        assert!(validate_salary_structure(&emp).is_err());
        emp.uan_number = None;
        assert!(validate_salary_structure(&emp).is_ok());

        let mut emp = sample_employee();
        emp.overtime_rate = 0.5;
        assert!(validate_salary_structure(&emp).is_err());
    }

    #[test]
    fn heavy_deductions_cannot_make_net_negative() {
        let emp = sample_employee();
        let adj = PayAdjustments {
            loan_recovery: 100_000.0,
            ..PayAdjustments::default()
        };
        let err = calculate(&emp, 2025, 3, &full_days(26), &adj).unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn zero_attendance_still_pays_incentive() {
        let emp = sample_employee();
        let b = calculate(&emp, 2025, 3, &[], &PayAdjustments::default()).unwrap();
        assert_eq!(b.attendance.present_days, 0);
        assert_eq!(b.attendance.absent_days, 26);
        assert!(close(b.earnings.total_earnings, 2_000.0));
    }

    #[test]
    fn label_uses_month_name() {
        assert_eq!(period_label(2025, 3), "March 2025");
    }
}
