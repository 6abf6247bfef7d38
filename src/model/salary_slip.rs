use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum SalarySlipStatus {
    Draft,
    Finalized,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SalarySlip {
    pub id: u64,
    pub employee_id: u64,
    pub year: i32,
    pub month: i32,

    // Calendar and attendance
    pub total_days_in_month: i32,
    pub working_days: i32,
    pub weekly_offs: i32,
    pub total_effective_working_hours: f64,
    pub total_overtime_hours: f64,
    pub raw_present_days: f64,
    pub present_days: i32,
    pub absent_days: i32,
    pub proration_factor: f64,

    // Earnings
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

    // Deductions
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

    pub net_salary: f64,
    pub daily_rate: f64,
    pub hourly_rate: f64,
    pub overtime_rate: f64,

    #[schema(example = "DRAFT")]
    pub status: String,
    pub generated_by: Option<u64>,
    pub generated_at: NaiveDateTime,
    pub notes: Option<String>,
    #[serde(skip_serializing)]
    pub deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub const SALARY_SLIP_COLUMNS: &str = "id, employee_id, year, month, total_days_in_month, \
    working_days, weekly_offs, total_effective_working_hours, total_overtime_hours, \
    raw_present_days, present_days, absent_days, proration_factor, basic_pay, hra_amount, \
    medical_allowance, conveyance_allowance, uniform_and_safety_allowance, bonus, food_allowance, \
    special_allowance, overtime_pay, total_special_allowance, other_incentive, \
    epf_employer_earnings, total_earnings, epf_employee_deduction, epf_employer_deduction, \
    esic_deduction, professional_tax, tds, advance_salary_recovery, loan_recovery, \
    fuel_advance_recovery, other_deductions, total_statutory_deductions, total_other_deductions, \
    total_deductions, net_salary, daily_rate, hourly_rate, overtime_rate, status, generated_by, \
    generated_at, notes, deleted, created_at, updated_at";

#[cfg(test)]
pub(crate) fn sample_slip() -> SalarySlip {
    let ts = chrono::NaiveDate::from_ymd_opt(2026, 4, 1)
        .and_then(|d| d.and_hms_opt(10, 0, 0))
        .unwrap();
    SalarySlip {
        id: 1,
        employee_id: 7,
        year: 2026,
        month: 3,
        total_days_in_month: 31,
        working_days: 26,
        weekly_offs: 5,
        total_effective_working_hours: 208.0,
        total_overtime_hours: 0.0,
        raw_present_days: 26.0,
        present_days: 26,
        absent_days: 0,
        proration_factor: 1.0,
        basic_pay: 20_000.0,
        hra_amount: 0.0,
        medical_allowance: 0.0,
        conveyance_allowance: 0.0,
        uniform_and_safety_allowance: 0.0,
        bonus: 0.0,
        food_allowance: 0.0,
        special_allowance: 0.0,
        overtime_pay: 0.0,
        total_special_allowance: 0.0,
        other_incentive: 0.0,
        epf_employer_earnings: 0.0,
        total_earnings: 20_000.0,
        epf_employee_deduction: 0.0,
        epf_employer_deduction: 0.0,
        esic_deduction: 0.0,
        professional_tax: 0.0,
        tds: 0.0,
        advance_salary_recovery: 0.0,
        loan_recovery: 0.0,
        fuel_advance_recovery: 0.0,
        other_deductions: 0.0,
        total_statutory_deductions: 0.0,
        total_other_deductions: 0.0,
        total_deductions: 0.0,
        net_salary: 20_000.0,
        daily_rate: 769.0,
        hourly_rate: 96.0,
        overtime_rate: 150.0,
        status: "DRAFT".into(),
        generated_by: Some(1),
        generated_at: ts,
        notes: None,
        deleted: false,
        created_at: ts,
        updated_at: ts,
    }
}

