use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum PunchType {
    CheckIn,
    LunchOut,
    LunchIn,
    CheckOut,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkStatus {
    Online,
    Offline,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

/// One GPS punch as captured by the device.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct GpsAttendanceLog {
    pub id: u64,
    pub employee_id: u64,
    pub attendance_id: Option<u64>,
    pub site_id: Option<u64>,
    #[schema(example = "CHECK_IN")]
    pub punch_type: String,
    pub punch_time: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
    pub altitude: Option<f64>,
    pub distance_from_site: Option<f64>,
    pub is_inside_geofence: bool,
    pub network_status: String,
    pub sync_status: String,
    pub offline_timestamp: Option<NaiveDateTime>,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub device_model: Option<String>,
    pub os_version: Option<String>,
    pub app_version: Option<String>,
    pub is_mock_location: bool,
    /// When a punch captured offline reached the server
    pub synced_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

pub const GPS_LOG_COLUMNS: &str = "id, employee_id, attendance_id, site_id, punch_type, \
    punch_time, latitude, longitude, accuracy_meters, altitude, distance_from_site, \
    is_inside_geofence, network_status, sync_status, offline_timestamp, device_id, device_name, \
    device_model, os_version, app_version, is_mock_location, synced_at, created_at";
