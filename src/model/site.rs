use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum GeofenceType {
    Radius,
    Polygon,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Site {
    pub id: u64,
    #[schema(example = "SITE-3F9A1C2D")]
    pub site_code: String,
    #[schema(example = "Metro Line 3 - Package 4")]
    pub site_name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    #[schema(example = 19.0760)]
    pub latitude: f64,
    #[schema(example = 72.8777)]
    pub longitude: f64,
    #[schema(example = "RADIUS")]
    pub geofence_type: String,
    #[schema(example = 100)]
    pub geofence_radius_meters: i32,
    /// JSON array of `[lat, lon]` pairs, used when `geofence_type` is POLYGON.
    pub geofence_polygon: Option<String>,
    pub is_active: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub shift_start_time: Option<NaiveTime>,
    pub shift_end_time: Option<NaiveTime>,
    pub lunch_start_time: Option<NaiveTime>,
    pub lunch_end_time: Option<NaiveTime>,
    #[serde(skip_serializing)]
    pub deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub const SITE_COLUMNS: &str = "id, site_code, site_name, description, address, city, state, \
    pincode, latitude, longitude, geofence_type, geofence_radius_meters, geofence_polygon, \
    is_active, start_date, end_date, shift_start_time, shift_end_time, lunch_start_time, \
    lunch_end_time, deleted, created_at, updated_at";

#[cfg(test)]
pub(crate) fn sample_site() -> Site {
    let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    Site {
        id: 3,
        site_code: "SITE-0000ABCD".into(),
        site_name: "Bandra Flyover".into(),
        description: None,
        address: None,
        city: Some("Mumbai".into()),
        state: Some("Maharashtra".into()),
        pincode: None,
        latitude: 19.0760,
        longitude: 72.8777,
        geofence_type: "RADIUS".into(),
        geofence_radius_meters: 100,
        geofence_polygon: None,
        is_active: true,
        start_date: None,
        end_date: None,
        shift_start_time: None,
        shift_end_time: None,
        lunch_start_time: None,
        lunch_end_time: None,
        deleted: false,
        created_at: ts,
        updated_at: ts,
    }
}
