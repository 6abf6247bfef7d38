pub mod attendance;
pub mod broadcast;
pub mod employee;
pub mod expense;
pub mod gps_log;
pub mod holiday;
pub mod leave_request;
pub mod notification;
pub mod overtime;
pub mod review;
pub mod role;
pub mod salary_slip;
pub mod site;
pub mod site_assignment;
pub mod task;
pub mod user;
