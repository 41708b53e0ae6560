use super::{meridional_radius, prime_vertical_radius};

/// Local planar coordinates (meters) east/north of a frame origin.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalXy {
    pub east: f64,
    pub north: f64,
}

/// Equirectangular tangent frame for small extents (a mesh cell, a survey area).
///
/// Scale factors are fixed at the origin latitude, so distortion grows with
/// distance from the origin; at a few hundred meters it is far below survey
/// accuracy.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalFrame {
    origin_lon_deg: f64,
    origin_lat_deg: f64,
    m_per_deg_lon: f64,
    m_per_deg_lat: f64,
}

impl LocalFrame {
    pub fn new(origin_lon_deg: f64, origin_lat_deg: f64) -> Self {
        let lat = origin_lat_deg.to_radians();
        Self {
            origin_lon_deg,
            origin_lat_deg,
            m_per_deg_lon: prime_vertical_radius(lat) * lat.cos() * core::f64::consts::PI / 180.0,
            m_per_deg_lat: meridional_radius(lat) * core::f64::consts::PI / 180.0,
        }
    }

    pub fn m_per_deg_lon(&self) -> f64 {
        self.m_per_deg_lon
    }

    pub fn m_per_deg_lat(&self) -> f64 {
        self.m_per_deg_lat
    }

    pub fn to_local(&self, lon_deg: f64, lat_deg: f64) -> LocalXy {
        LocalXy {
            east: (lon_deg - self.origin_lon_deg) * self.m_per_deg_lon,
            north: (lat_deg - self.origin_lat_deg) * self.m_per_deg_lat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LocalFrame;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn origin_maps_to_zero() {
        let f = LocalFrame::new(136.6, 36.5);
        let xy = f.to_local(136.6, 36.5);
        assert_close(xy.east, 0.0, 1e-12);
        assert_close(xy.north, 0.0, 1e-12);
    }

    #[test]
    fn one_millidegree_at_equator_is_about_111m() {
        let f = LocalFrame::new(0.0, 0.0);
        let xy = f.to_local(0.001, 0.001);
        assert_close(xy.east, 111.319, 1e-2);
        assert_close(xy.north, 110.574, 1e-2);
    }
}
