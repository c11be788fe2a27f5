//! Coordinates, great-circle distance and the site geofence.
//!
//! Range validation happens once, when a [`Coordinate`] is built. Everything
//! downstream (distance, geofence) works on values that are already known to
//! be in range and therefore never fails.

pub mod geocode;
pub mod location;

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default geofence radius, overridable with `GEOFENCE_RADIUS_KM`.
pub const DEFAULT_RADIUS_KM: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("coordinate ({latitude}, {longitude}) is out of range")]
pub struct InvalidCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("location is {distance_km:.3} km from the site, allowed radius is {radius_km:.3} km")]
pub struct OutsideGeofence {
    pub distance_km: f64,
    pub radius_km: f64,
}

/// A latitude/longitude pair in degrees. Always in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({ "latitude": 23.8103, "longitude": 90.4125 }))]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinate> {
        let in_range = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if !in_range {
            return Err(InvalidCoordinate {
                latitude,
                longitude,
            });
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// A place attendance can be marked at.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub id: Option<u64>,
    pub name: String,
    /// Geofence centre. `None` means the site does not restrict attendance.
    pub reference: Option<Coordinate>,
}

impl Site {
    /// Site used for employees without an assignment.
    pub fn unrestricted() -> Self {
        Self {
            id: None,
            name: "Unassigned".to_string(),
            reference: None,
        }
    }
}

/// Great-circle distance in kilometres (haversine).
///
/// Symmetric, zero for identical points, never negative. Inputs are valid by
/// construction so this cannot fail.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    // rounding can push h a hair past 1 for antipodal points
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Distance from `current` to the site's reference coordinate, or `None`
/// when the site has no reference and therefore never restricts.
fn site_distance_km(current: Coordinate, site: &Site) -> Option<f64> {
    site.reference.map(|reference| distance_km(current, reference))
}

/// `true` when `current` lies within `radius_km` of the site's reference
/// coordinate, or when the site has no reference coordinate at all.
pub fn is_within_site(current: Coordinate, site: &Site, radius_km: f64) -> bool {
    site_distance_km(current, site).is_none_or(|distance| distance <= radius_km)
}

/// Deployment-wide geofence radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofencePolicy {
    pub radius_km: f64,
}

impl Default for GeofencePolicy {
    fn default() -> Self {
        Self {
            radius_km: DEFAULT_RADIUS_KM,
        }
    }
}

impl GeofencePolicy {
    pub fn new(radius_km: f64) -> Self {
        Self { radius_km }
    }

    pub fn check(&self, current: Coordinate, site: &Site) -> Result<(), OutsideGeofence> {
        if is_within_site(current, site, self.radius_km) {
            return Ok(());
        }

        Err(OutsideGeofence {
            distance_km: site_distance_km(current, site).unwrap_or_default(),
            radius_km: self.radius_km,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn site_at(reference: Option<Coordinate>) -> Site {
        Site {
            id: Some(1),
            name: "Downtown Tower".to_string(),
            reference,
        }
    }

    #[test]
    fn rejects_out_of_range_and_non_finite() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(90.0001, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());

        let err = Coordinate::new(120.0, 10.0).unwrap_err();
        assert_eq!(err.latitude, 120.0);
        assert_eq!(err.longitude, 10.0);
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let pairs = [
            (coord(23.8103, 90.4125), coord(22.3569, 91.7832)),
            (coord(-33.8688, 151.2093), coord(51.5074, -0.1278)),
            (coord(0.0, 179.9), coord(0.0, -179.9)),
        ];

        for (a, b) in pairs {
            let ab = distance_km(a, b);
            let ba = distance_km(b, a);
            assert!((ab - ba).abs() < 1e-9, "{ab} != {ba}");
            assert!(ab >= 0.0);
            assert_eq!(distance_km(a, a), 0.0);
        }
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        for lat in [-45.0, 0.0, 10.0, 60.0] {
            let a = coord(lat, 30.0);
            let b = coord(lat + 1.0, 30.0);
            let d = distance_km(a, b);
            assert!((d - 111.0).abs() < 0.5, "got {d} km at latitude {lat}");
        }
    }

    #[test]
    fn antipodal_points_do_not_produce_nan() {
        let d = distance_km(coord(0.0, 0.0), coord(0.0, 180.0));
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn site_without_reference_never_restricts() {
        let site = site_at(None);
        for current in [coord(0.0, 0.0), coord(89.0, -179.0), coord(-45.0, 120.0)] {
            assert!(is_within_site(current, &site, DEFAULT_RADIUS_KM));
            assert!(is_within_site(current, &site, 0.0));
            assert!(GeofencePolicy::default().check(current, &site).is_ok());
        }
    }

    #[test]
    fn default_radius_accepts_111m_and_rejects_1_1km() {
        let site = site_at(Some(coord(0.0, 0.0)));

        assert!(is_within_site(coord(0.0, 0.001), &site, DEFAULT_RADIUS_KM));
        assert!(!is_within_site(coord(0.0, 0.01), &site, DEFAULT_RADIUS_KM));

        let policy = GeofencePolicy::default();
        assert!(policy.check(coord(0.0, 0.001), &site).is_ok());

        let err = policy.check(coord(0.0, 0.01), &site).unwrap_err();
        assert!((err.distance_km - 1.112).abs() < 0.01);
        assert_eq!(err.radius_km, DEFAULT_RADIUS_KM);
    }

    #[test]
    fn radius_is_configurable() {
        let site = site_at(Some(coord(0.0, 0.0)));
        assert!(GeofencePolicy::new(2.0).check(coord(0.0, 0.01), &site).is_ok());
        assert!(GeofencePolicy::new(0.05).check(coord(0.0, 0.001), &site).is_err());
    }

    #[test]
    fn policy_check_agrees_with_is_within_site() {
        let site = site_at(Some(coord(23.8103, 90.4125)));
        let points = [
            coord(23.8103, 90.4125),
            coord(23.8110, 90.4125),
            coord(23.8193, 90.4125),
            coord(23.8203, 90.4125),
            coord(22.3569, 91.7832),
        ];

        for radius in [0.0, 0.08, 1.0, 1.1, 200.0] {
            let policy = GeofencePolicy::new(radius);
            for current in points {
                assert_eq!(
                    policy.check(current, &site).is_ok(),
                    is_within_site(current, &site, radius),
                    "disagreement at {current} with radius {radius}"
                );
            }
        }
    }

    #[test]
    fn display_is_lat_then_lng() {
        assert_eq!(coord(1.5, -2.25).to_string(), "1.500000, -2.250000");
    }
}
