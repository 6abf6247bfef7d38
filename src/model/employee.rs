use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum EmploymentStatus {
    Active,
    Inactive,
    Terminated,
    OnLeave,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Intern,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AttendanceMethod {
    GpsBased,
    FaceRecognition,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "first_name": "Ravi",
        "last_name": "Kumar",
        "email": "ravi.kumar@civildesk.in",
        "phone": "+919812345678",
        "department": "Site Operations",
        "designation": "Site Engineer",
        "joining_date": "2024-01-01",
        "employment_type": "FULL_TIME",
        "employment_status": "ACTIVE",
        "attendance_method": "GPS_BASED",
        "basic_salary": 25000.0
    })
)]
pub struct Employee {
    pub id: u64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub joining_date: Option<NaiveDate>,
    pub employment_type: String,
    pub employment_status: String,
    pub attendance_method: String,

    // Statutory identifiers; EPF needs a UAN and ESIC needs an ESIC number.
    pub uan_number: Option<String>,
    pub esic_number: Option<String>,

    // Monthly salary structure
    pub basic_salary: f64,
    pub house_rent_allowance: f64,
    pub conveyance: f64,
    pub uniform_and_safety: f64,
    pub bonus: f64,
    pub food_allowance: f64,
    pub other_allowance: f64,
    pub overtime_rate: f64,
    /// Percentages
    pub epf_employee: f64,
    pub epf_employer: f64,
    pub esic: f64,
    pub professional_tax: f64,

    #[serde(skip_serializing)]
    pub deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn has_uan(&self) -> bool {
        self.uan_number.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    pub fn has_esic(&self) -> bool {
        self.esic_number.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    pub fn is_active(&self) -> bool {
        !self.deleted
            && self.employment_status.parse::<EmploymentStatus>().ok() == Some(EmploymentStatus::Active)
    }

    pub fn uses_gps_attendance(&self) -> bool {
        self.attendance_method.parse::<AttendanceMethod>().ok() == Some(AttendanceMethod::GpsBased)
    }
}

pub const EMPLOYEE_COLUMNS: &str = "id, employee_code, first_name, last_name, email, phone, \
    department, designation, joining_date, employment_type, employment_status, attendance_method, \
    uan_number, esic_number, basic_salary, house_rent_allowance, conveyance, uniform_and_safety, \
    bonus, food_allowance, other_allowance, overtime_rate, epf_employee, epf_employer, esic, \
    professional_tax, deleted, created_at, updated_at";

#[cfg(test)]
pub(crate) fn sample_employee() -> Employee {
    let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    Employee {
        id: 7,
        employee_code: "EMP-007".into(),
        first_name: "Asha".into(),
        last_name: "Patil".into(),
        email: "asha.patil@civildesk.in".into(),
        phone: None,
        department: Some("Site Operations".into()),
        designation: Some("Site Engineer".into()),
        joining_date: NaiveDate::from_ymd_opt(2024, 4, 1),
        employment_type: "FULL_TIME".into(),
        employment_status: "ACTIVE".into(),
        attendance_method: "GPS_BASED".into(),
        uan_number: Some("100200300400".into()),
        esic_number: None,
        basic_salary: 20_000.0,
        house_rent_allowance: 8_000.0,
        conveyance: 1_600.0,
        uniform_and_safety: 500.0,
        bonus: 1_000.0,
        food_allowance: 1_200.0,
        other_allowance: 2_000.0,
        overtime_rate: 150.0,
        epf_employee: 12.0,
        epf_employer: 13.0,
        esic: 0.75,
        professional_tax: 200.0,
        deleted: false,
        created_at: ts,
        updated_at: ts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_method_parse_from_columns() {
        let mut emp = sample_employee();
        assert!(emp.is_active());
        assert!(emp.uses_gps_attendance());

        emp.employment_status = "terminated".into();
        assert!(!emp.is_active());

        emp.attendance_method = "FACE_RECOGNITION".into();
        assert!(!emp.uses_gps_attendance());
    }

    #[test]
    fn blank_statutory_numbers_do_not_count() {
        let mut emp = sample_employee();
        assert!(emp.has_uan());
        emp.uan_number = Some("   ".into());
        assert!(!emp.has_uan());
        assert!(!emp.has_esic());
    }

    #[test]
    fn full_name_joins_parts() {
        assert_eq!(sample_employee().full_name(), "Asha Patil");
    }
}
