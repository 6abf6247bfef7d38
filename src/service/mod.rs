pub mod absence;
pub mod geofence;
pub mod holiday;
pub mod leave;
pub mod notify;
pub mod payroll;
pub mod punch;
pub mod review;
pub mod work_hours;
