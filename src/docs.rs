use crate::api::attendance::{
    BulkAbsentItem, BulkAbsentRequest, BulkAbsentResult, ManualMark, MarkAbsentRequest,
    PunchCorrection, StatusUpdate,
};
use crate::api::broadcast::BroadcastRequest;
use crate::api::employee::CreateEmployee;
use crate::api::expense::{ExpenseApplication, ExpenseView};
use crate::api::gps_attendance::{GpsLogView, PunchRequest, SyncResult};
use crate::api::holiday::HolidayRequest;
use crate::api::leave_request::{HandoverEmployee, LeaveApplication, LeaveConflict, LeaveView};
use crate::api::notification::PushTokenRequest;
use crate::api::overtime::{OvertimeApplication, OvertimeView};
use crate::api::payroll::{
    BulkSlipRequest, BulkSlipResult, SalaryCalculation, SlipRequest, SlipStatusUpdate, SlipView,
};
use crate::api::site::{AssignmentRequest, SiteRequest};
use crate::api::task::{TaskAssignee, TaskRequest, TaskReview, TaskView};
use crate::model::attendance::{Attendance, AttendanceStatus, RecognitionMethod};
use crate::model::broadcast::{BroadcastMessage, BroadcastPriority};
use crate::model::employee::{AttendanceMethod, Employee, EmploymentStatus, EmploymentType};
use crate::model::expense::{Expense, ExpenseCategory};
use crate::model::gps_log::{GpsAttendanceLog, NetworkStatus, PunchType, SyncStatus};
use crate::model::holiday::Holiday;
use crate::model::leave_request::{HalfDayPeriod, LeaveRequest, LeaveType};
use crate::model::notification::{NotificationResponse, NotificationType};
use crate::model::overtime::Overtime;
use crate::model::review::{RequestStatus, ReviewRequest};
use crate::model::role::Role;
use crate::model::salary_slip::{SalarySlip, SalarySlipStatus};
use crate::model::site::{GeofenceType, Site};
use crate::model::site_assignment::SiteAssignment;
use crate::model::task::{Task, TaskStatus};
use crate::models::{CredentialsReq, LoginReqDto, RegisterReq, TokenPair};
use crate::service::absence::{AbsenceSummary, SkipReason};
use crate::service::leave::ConflictType;
use crate::service::payroll::{
    AttendanceSummary, CalendarSummary, Deductions, Earnings, PayAdjustments, SalaryBreakdown,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

pub struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Civildesk HRM API",
        version = "1.0.0",
        description = r#"
## Civildesk HR and attendance backend

Employee records, GPS attendance at construction sites and the approval
workflows around them.

### Key Features
- **Employees and sites**: employee profiles, sites with circle or polygon geofences, site assignments
- **GPS attendance**: check-in, lunch and check-out punches validated against the site geofence, offline sync
- **Attendance**: daily rows with working and overtime hours, holidays and automatic absences
- **Requests**: leave (with handover and conflict detection), overtime and expenses, reviewed by HR
- **Tasks**: travel tasks assigned by HR and reviewed by the assignees
- **Payroll**: prorated salary slips with EPF, ESIC and professional tax
- **Broadcasts and notifications**: in-app notices for every workflow event

### Security
Endpoints under `/api` require a **JWT Bearer** access token from `/auth/login`.
Management operations are limited to **Admin** and **HR**.

### Response Format
- JSON bodies; errors are `{"message": "..."}`
- List endpoints that page return `data`, `page`, `per_page` and `total`
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::my_profile,
        crate::api::employee::departments,
        crate::api::employee::designations,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::create_credentials,

        crate::api::site::create_site,
        crate::api::site::update_site,
        crate::api::site::get_site,
        crate::api::site::get_site_by_code,
        crate::api::site::list_sites,
        crate::api::site::active_sites,
        crate::api::site::nearby_sites,
        crate::api::site::delete_site,
        crate::api::site::assign_employee,
        crate::api::site::remove_assignment,
        crate::api::site::employee_assignments,
        crate::api::site::site_employees,
        crate::api::site::employee_sites,
        crate::api::site::my_sites,

        crate::api::gps_attendance::mark,
        crate::api::gps_attendance::sync_offline,
        crate::api::gps_attendance::my_logs,
        crate::api::gps_attendance::employee_logs,
        crate::api::gps_attendance::site_logs,
        crate::api::gps_attendance::map_logs,
        crate::api::gps_attendance::logs_in_range,
        crate::api::gps_attendance::punch_summary,

        crate::api::attendance::employee_attendance,
        crate::api::attendance::my_attendance,
        crate::api::attendance::attendance_for_date,
        crate::api::attendance::recompute_hours,
        crate::api::attendance::update_status,
        crate::api::attendance::mark_absent,
        crate::api::attendance::mark_employee_absent,
        crate::api::attendance::bulk_mark_absent,
        crate::api::attendance::mark_manual,
        crate::api::attendance::correct_punch,
        crate::api::attendance::today_for_employee,
        crate::api::attendance::my_today,
        crate::api::attendance::daily_summary,

        crate::api::holiday::create_holiday,
        crate::api::holiday::update_holiday,
        crate::api::holiday::delete_holiday,
        crate::api::holiday::get_holiday,
        crate::api::holiday::holiday_by_date,
        crate::api::holiday::active_holidays,
        crate::api::holiday::holidays_in_range,

        crate::api::leave_request::apply_leave,
        crate::api::leave_request::update_leave,
        crate::api::leave_request::delete_leave,
        crate::api::leave_request::my_leaves,
        crate::api::leave_request::my_responsibilities,
        crate::api::leave_request::list_leaves,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::review_leave,

        crate::api::overtime::apply_overtime,
        crate::api::overtime::update_overtime,
        crate::api::overtime::delete_overtime,
        crate::api::overtime::my_overtimes,
        crate::api::overtime::list_overtimes,
        crate::api::overtime::get_overtime,
        crate::api::overtime::review_overtime,

        crate::api::expense::apply_expense,
        crate::api::expense::update_expense,
        crate::api::expense::delete_expense,
        crate::api::expense::my_expenses,
        crate::api::expense::list_expenses,
        crate::api::expense::get_expense,
        crate::api::expense::review_expense,

        crate::api::task::assign_task,
        crate::api::task::update_task,
        crate::api::task::delete_task,
        crate::api::task::my_tasks,
        crate::api::task::list_tasks,
        crate::api::task::get_task,
        crate::api::task::review_task,

        crate::api::payroll::calculate_salary,
        crate::api::payroll::generate_slip,
        crate::api::payroll::generate_bulk,
        crate::api::payroll::finalize_slip,
        crate::api::payroll::update_slip_status,
        crate::api::payroll::delete_slip,
        crate::api::payroll::get_slip,
        crate::api::payroll::slip_for_period,
        crate::api::payroll::employee_slips,
        crate::api::payroll::my_slips,
        crate::api::payroll::list_slips,

        crate::api::broadcast::create_broadcast,
        crate::api::broadcast::update_broadcast,
        crate::api::broadcast::delete_broadcast,
        crate::api::broadcast::list_broadcasts,
        crate::api::broadcast::active_broadcasts,
        crate::api::broadcast::get_broadcast,

        crate::api::notification::my_notifications,
        crate::api::notification::unread_notifications,
        crate::api::notification::unread_count,
        crate::api::notification::mark_read,
        crate::api::notification::mark_all_read,
        crate::api::notification::delete_notification,
        crate::api::notification::register_push_token,
        crate::api::notification::remove_push_token
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            CredentialsReq,
            TokenPair,
            Role,
            Employee,
            CreateEmployee,
            EmploymentStatus,
            EmploymentType,
            AttendanceMethod,
            Site,
            GeofenceType,
            SiteRequest,
            SiteAssignment,
            AssignmentRequest,
            GpsAttendanceLog,
            GpsLogView,
            PunchRequest,
            PunchType,
            NetworkStatus,
            SyncStatus,
            SyncResult,
            Attendance,
            AttendanceStatus,
            RecognitionMethod,
            StatusUpdate,
            MarkAbsentRequest,
            PunchCorrection,
            ManualMark,
            BulkAbsentRequest,
            BulkAbsentItem,
            BulkAbsentResult,
            AbsenceSummary,
            SkipReason,
            Holiday,
            HolidayRequest,
            LeaveRequest,
            LeaveType,
            HalfDayPeriod,
            LeaveApplication,
            LeaveView,
            LeaveConflict,
            ConflictType,
            HandoverEmployee,
            RequestStatus,
            ReviewRequest,
            Overtime,
            OvertimeApplication,
            OvertimeView,
            Expense,
            ExpenseCategory,
            ExpenseApplication,
            ExpenseView,
            Task,
            TaskStatus,
            TaskRequest,
            TaskReview,
            TaskAssignee,
            TaskView,
            SalarySlip,
            SalarySlipStatus,
            SlipRequest,
            BulkSlipRequest,
            BulkSlipResult,
            SlipStatusUpdate,
            SlipView,
            SalaryCalculation,
            SalaryBreakdown,
            CalendarSummary,
            AttendanceSummary,
            Earnings,
            Deductions,
            PayAdjustments,
            BroadcastMessage,
            BroadcastPriority,
            BroadcastRequest,
            NotificationResponse,
            NotificationType,
            PushTokenRequest
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Login, registration and tokens"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Site", description = "Sites, geofences and assignments"),
        (name = "GPS Attendance", description = "GPS punches and logs"),
        (name = "Attendance", description = "Daily attendance records"),
        (name = "Holiday", description = "Company holidays"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Overtime", description = "Overtime requests"),
        (name = "Expense", description = "Expense claims"),
        (name = "Task", description = "Task assignment and review"),
        (name = "Payroll", description = "Salary slips"),
        (name = "Broadcast", description = "Broadcast messages"),
        (name = "Notification", description = "In-app notifications"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_declares_bearer_scheme_and_paths() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/api/gps-attendance/mark"));
        assert!(doc.paths.paths.contains_key("/api/salary-slips/{slip_id}/finalize"));
    }
}
