/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 first eccentricity squared.
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

/// Meridional radius of curvature at `lat_rad` (meters).
pub fn meridional_radius(lat_rad: f64) -> f64 {
    let s = lat_rad.sin();
    let w2 = 1.0 - WGS84_E2 * s * s;
    WGS84_A * (1.0 - WGS84_E2) / (w2 * w2.sqrt())
}

/// Prime-vertical radius of curvature at `lat_rad` (meters).
pub fn prime_vertical_radius(lat_rad: f64) -> f64 {
    let s = lat_rad.sin();
    WGS84_A / (1.0 - WGS84_E2 * s * s).sqrt()
}

#[cfg(test)]
mod tests {
    use super::{WGS84_A, meridional_radius, prime_vertical_radius};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn radii_at_equator() {
        assert_close(prime_vertical_radius(0.0), WGS84_A, 1e-6);
        // a(1 - e^2)
        assert_close(meridional_radius(0.0), 6_335_439.327, 1e-3);
    }

    #[test]
    fn radii_grow_towards_pole() {
        let lat = 36f64.to_radians();
        assert!(meridional_radius(lat) > meridional_radius(0.0));
        assert!(prime_vertical_radius(lat) > prime_vertical_radius(0.0));
    }
}
