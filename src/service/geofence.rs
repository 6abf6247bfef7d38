//! Distance and containment checks between a GPS fix and a site geofence.

use crate::model::site::{GeofenceType, Site};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
const METERS_PER_DEGREE_LAT: f64 = 111_000.0;
pub const DEFAULT_RADIUS_METERS: i32 = 100;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        is_valid_coordinates(self.lat, self.lon)
    }
}

pub fn is_valid_coordinates(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Great-circle distance in meters.
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geofence {
    Radius { center: GeoPoint, radius_meters: f64 },
    Polygon { center: GeoPoint, vertices: Vec<GeoPoint> },
}

impl Geofence {
    pub fn from_site(site: &Site) -> Self {
        let center = GeoPoint::new(site.latitude, site.longitude);
        let kind = site
            .geofence_type
            .parse::<GeofenceType>()
            .unwrap_or(GeofenceType::Radius);

        match kind {
            GeofenceType::Polygon => Geofence::Polygon {
                center,
                vertices: parse_polygon(site.geofence_polygon.as_deref()).unwrap_or_default(),
            },
            GeofenceType::Radius => {
                let radius = if site.geofence_radius_meters > 0 {
                    site.geofence_radius_meters
                } else {
                    DEFAULT_RADIUS_METERS
                };
                Geofence::Radius {
                    center,
                    radius_meters: f64::from(radius),
                }
            }
        }
    }

    pub fn center(&self) -> GeoPoint {
        match self {
            Geofence::Radius { center, .. } | Geofence::Polygon { center, .. } => *center,
        }
    }

    pub fn distance_from_center(&self, point: GeoPoint) -> f64 {
        haversine_distance(self.center(), point)
    }

    /// A polygon with fewer than three vertices contains nothing.
    pub fn contains(&self, point: GeoPoint) -> bool {
        match self {
            Geofence::Radius { center, radius_meters } => {
                haversine_distance(*center, point) <= *radius_meters
            }
            Geofence::Polygon { vertices, .. } => {
                vertices.len() >= 3 && point_in_polygon(point, vertices)
            }
        }
    }

    /// Meters beyond the boundary, used in rejection messages. Zero when inside.
    pub fn distance_outside(&self, point: GeoPoint) -> f64 {
        if self.contains(point) {
            return 0.0;
        }
        match self {
            Geofence::Radius { center, radius_meters } => {
                (haversine_distance(*center, point) - radius_meters).max(0.0)
            }
            Geofence::Polygon { center, .. } => haversine_distance(*center, point),
        }
    }
}

/// Parses `[[lat, lon], ...]`. Returns `None` on malformed JSON.
pub fn parse_polygon(raw: Option<&str>) -> Option<Vec<GeoPoint>> {
    let pairs: Vec<Vec<f64>> = serde_json::from_str(raw?).ok()?;
    pairs
        .into_iter()
        .map(|pair| match pair.as_slice() {
            [lat, lon] => Some(GeoPoint::new(*lat, *lon)),
            _ => None,
        })
        .collect()
}

// Ray casting over (lon, lat) as (x, y).
fn point_in_polygon(point: GeoPoint, vertices: &[GeoPoint]) -> bool {
    let (x, y) = (point.lon, point.lat);
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (xi, yi) = (vertices[i].lon, vertices[i].lat);
        let (xj, yj) = (vertices[j].lon, vertices[j].lat);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn around(center: GeoPoint, radius_meters: f64) -> Self {
        let lat_delta = radius_meters / METERS_PER_DEGREE_LAT;
        let lon_delta = radius_meters / (METERS_PER_DEGREE_LAT * center.lat.to_radians().cos());
        Self {
            min_lat: center.lat - lat_delta,
            max_lat: center.lat + lat_delta,
            min_lon: center.lon - lon_delta,
            max_lon: center.lon + lon_delta,
        }
    }

    /// Longitude intervals to search, within [-180, 180]. A box crossing the
    /// antimeridian splits in two.
    pub fn lon_ranges(&self) -> Vec<(f64, f64)> {
        let span = self.max_lon - self.min_lon;
        if !span.is_finite() || span >= 360.0 {
            return vec![(-180.0, 180.0)];
        }
        if self.min_lon < -180.0 {
            vec![(self.min_lon + 360.0, 180.0), (-180.0, self.max_lon)]
        } else if self.max_lon > 180.0 {
            vec![(self.min_lon, 180.0), (-180.0, self.max_lon - 360.0)]
        } else {
            vec![(self.min_lon, self.max_lon)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::site::sample_site;

    const MUMBAI: GeoPoint = GeoPoint { lat: 19.0760, lon: 72.8777 };
    const PUNE: GeoPoint = GeoPoint { lat: 18.5204, lon: 73.8567 };

    #[test]
    fn haversine_matches_known_distance() {
        let d = haversine_distance(MUMBAI, PUNE);
        // roughly 120 km by great circle
        assert!((d - 120_000.0).abs() < 2_000.0, "got {d}");
        assert_eq!(haversine_distance(MUMBAI, MUMBAI), 0.0);
    }

    #[test]
    fn coordinate_bounds() {
        assert!(is_valid_coordinates(90.0, 180.0));
        assert!(is_valid_coordinates(-90.0, -180.0));
        assert!(!is_valid_coordinates(90.1, 0.0));
        assert!(!is_valid_coordinates(0.0, -180.5));
    }

    #[test]
    fn radius_fence_includes_boundary_region() {
        let site = sample_site();
        let fence = Geofence::from_site(&site);
        // ~55 m north
        let near = GeoPoint::new(site.latitude + 0.0005, site.longitude);
        // ~222 m north
        let far = GeoPoint::new(site.latitude + 0.002, site.longitude);
        assert!(fence.contains(near));
        assert!(!fence.contains(far));
        let beyond = fence.distance_outside(far);
        assert!(beyond > 100.0 && beyond < 140.0, "got {beyond}");
        assert_eq!(fence.distance_outside(near), 0.0);
    }

    #[test]
    fn non_positive_radius_falls_back_to_default() {
        let mut site = sample_site();
        site.geofence_radius_meters = 0;
        match Geofence::from_site(&site) {
            Geofence::Radius { radius_meters, .. } => assert_eq!(radius_meters, 100.0),
            other => panic!("unexpected fence {other:?}"),
        }
    }

    #[test]
    fn polygon_fence_uses_ray_casting() {
        let mut site = sample_site();
        site.geofence_type = "POLYGON".into();
        site.geofence_polygon =
            Some("[[19.0,72.0],[19.0,73.0],[20.0,73.0],[20.0,72.0]]".into());
        let fence = Geofence::from_site(&site);
        assert!(fence.contains(GeoPoint::new(19.5, 72.5)));
        assert!(!fence.contains(GeoPoint::new(18.9, 72.5)));
        assert!(!fence.contains(GeoPoint::new(19.5, 73.1)));
    }

    #[test]
    fn degenerate_or_broken_polygon_contains_nothing() {
        let mut site = sample_site();
        site.geofence_type = "POLYGON".into();
        site.geofence_polygon = Some("[[19.0,72.0],[20.0,73.0]]".into());
        assert!(!Geofence::from_site(&site).contains(GeoPoint::new(19.5, 72.5)));

        site.geofence_polygon = Some("not json".into());
        assert!(!Geofence::from_site(&site).contains(GeoPoint::new(19.5, 72.5)));

        assert!(parse_polygon(Some("[[1.0]]")).is_none());
        assert!(parse_polygon(None).is_none());
    }

    #[test]
    fn bounding_box_widens_longitude_away_from_equator() {
        let bbox = BoundingBox::around(MUMBAI, 1_110.0);
        assert!((bbox.max_lat - MUMBAI.lat - 0.01).abs() < 1e-9);
        let lon_span = bbox.max_lon - MUMBAI.lon;
        assert!(lon_span > 0.01);
        assert!(bbox.min_lat < MUMBAI.lat && bbox.min_lon < MUMBAI.lon);
        assert_eq!(bbox.lon_ranges(), vec![(bbox.min_lon, bbox.max_lon)]);
    }

    #[test]
    fn box_across_the_antimeridian_splits() {
        // Taveuni, Fiji sits on the 180th meridian
        let ranges = BoundingBox::around(GeoPoint::new(-16.8, 179.99), 5_000.0).lon_ranges();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].1, 180.0);
        assert_eq!(ranges[1].0, -180.0);
        assert!(ranges[0].0 > 179.9 && ranges[1].1 < -179.9);

        let ranges = BoundingBox::around(GeoPoint::new(-16.8, -179.99), 5_000.0).lon_ranges();
        assert_eq!(ranges.len(), 2);
        assert!(ranges[0].0 > 179.9 && ranges[1].1 < -179.9);
    }

    #[test]
    fn box_at_the_pole_covers_every_longitude() {
        let bbox = BoundingBox::around(GeoPoint::new(90.0, 10.0), 1_000.0);
        assert_eq!(bbox.lon_ranges(), vec![(-180.0, 180.0)]);
    }
}
