pub mod attendance;
pub mod broadcast;
pub mod employee;
pub mod expense;
pub mod gps_attendance;
pub mod holiday;
pub mod leave_request;
pub mod notification;
pub mod overtime;
pub mod payroll;
pub mod site;
pub mod task;
