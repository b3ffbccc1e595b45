//! Local planar projection of geodetic fixes.
//!
//! Equirectangular approximation around a fixed datum: the latitude offset is
//! scaled by the meridian arc length per degree and becomes `x`; the
//! longitude offset is scaled by the parallel arc length per degree at the
//! datum latitude and becomes `y`.
//!
//! Valid over sub-kilometer to low-kilometer distances from the datum. No
//! curvature correction is applied, and antipodal or antimeridian-crossing
//! inputs are not handled.

use crate::types::{GeoPoint, PlanarPoint};

/// Projects geodetic points into meters relative to a datum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateProjector {
    datum: GeoPoint,
    /// Meters per degree of latitude.
    meridian_m_per_deg: f64,
    /// Meters per degree of longitude at the datum latitude.
    parallel_m_per_deg: f64,
}

impl CoordinateProjector {
    /// Create a projector for `datum` using an earth radius in kilometers.
    pub fn new(datum: GeoPoint, earth_radius_km: f64) -> Self {
        let radius_m = earth_radius_km * 1000.0;
        let meridian_m_per_deg = radius_m * std::f64::consts::PI / 180.0;
        let parallel_m_per_deg = meridian_m_per_deg * datum.latitude.to_radians().cos();
        Self {
            datum,
            meridian_m_per_deg,
            parallel_m_per_deg,
        }
    }

    pub fn datum(&self) -> GeoPoint {
        self.datum
    }

    /// Geodetic point to local meters.
    pub fn project(&self, point: GeoPoint) -> PlanarPoint {
        PlanarPoint {
            x: self.meridian_m_per_deg * (point.latitude - self.datum.latitude),
            y: self.parallel_m_per_deg * (point.longitude - self.datum.longitude),
        }
    }

    /// Local meters back to a geodetic point.
    ///
    /// Inverse of [`project`](Self::project). Undefined at the poles, where
    /// parallels collapse to a point.
    pub fn unproject(&self, point: PlanarPoint) -> GeoPoint {
        GeoPoint {
            latitude: self.datum.latitude + point.x / self.meridian_m_per_deg,
            longitude: self.datum.longitude + point.y / self.parallel_m_per_deg,
        }
    }
}

/// One-shot projection of `point` relative to `datum`.
pub fn project(datum: GeoPoint, point: GeoPoint, earth_radius_km: f64) -> PlanarPoint {
    CoordinateProjector::new(datum, earth_radius_km).project(point)
}
