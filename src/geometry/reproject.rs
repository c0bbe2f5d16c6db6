//! Projected boundary coordinates to geographic WGS84.

use geo::{Coord, MapCoords, Polygon};

pub trait Reprojection {
    fn reproject_coord(&self, coord: Coord<f64>) -> Coord<f64>;

    /// Ring order and closure are preserved.
    fn reproject(&self, polygon: &Polygon<f64>) -> Polygon<f64> {
        polygon.map_coords(|coord| self.reproject_coord(coord))
    }
}

/// Inverse transverse Mercator for a UTM zone on the GRS80 ellipsoid
/// (ETRS89, treated as identical to WGS84 at this scale).
#[derive(Debug, Clone, Copy)]
pub struct UtmToWgs84 {
    central_meridian: f64,
}

/// EPSG:25832, the reference system of the Hamburg boundary data.
pub const ETRS89_UTM32N: UtmToWgs84 = UtmToWgs84 {
    central_meridian: 9.0,
};

const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_222_101;
const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;

impl Reprojection for UtmToWgs84 {
    fn reproject_coord(&self, coord: Coord<f64>) -> Coord<f64> {
        let a = SEMI_MAJOR_AXIS;
        let e2 = FLATTENING * (2.0 - FLATTENING);
        let ep2 = e2 / (1.0 - e2);

        let x = coord.x - FALSE_EASTING;
        let m = coord.y / SCALE_FACTOR;
        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));

        let root = (1.0 - e2).sqrt();
        let e1 = (1.0 - root) / (1.0 + root);
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let (sin_phi, cos_phi) = phi1.sin_cos();
        let tan_phi = phi1.tan();
        let c1 = ep2 * cos_phi * cos_phi;
        let t1 = tan_phi * tan_phi;
        let n1 = a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let r1 = a * (1.0 - e2) / (1.0 - e2 * sin_phi * sin_phi).powf(1.5);
        let d = x / (n1 * SCALE_FACTOR);

        let lat = phi1
            - (n1 * tan_phi / r1)
                * (d.powi(2) / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lon = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5) / 120.0)
            / cos_phi;

        Coord {
            x: self.central_meridian + lon.to_degrees(),
            y: lat.to_degrees(),
        }
    }
}

#[cfg(test)]
mod tests {
    use geo::LineString;

    use super::*;

    #[test]
    fn central_meridian_on_the_equator() {
        let coord = ETRS89_UTM32N.reproject_coord(Coord { x: 500_000.0, y: 0.0 });
        assert!((coord.x - 9.0).abs() < 1e-9);
        assert!(coord.y.abs() < 1e-9);
    }

    #[test]
    fn hamburg_city_hall() {
        let coord = ETRS89_UTM32N.reproject_coord(Coord { x: 565_700.0, y: 5_933_800.0 });
        assert!((coord.x - 9.9916).abs() < 1e-3, "lon {}", coord.x);
        assert!((coord.y - 53.5490).abs() < 1e-3, "lat {}", coord.y);
    }

    #[test]
    fn polygon_stays_closed() {
        let ring = LineString::from(vec![
            (565_000.0, 5_933_000.0),
            (566_000.0, 5_933_000.0),
            (566_000.0, 5_934_000.0),
            (565_000.0, 5_933_000.0),
        ]);
        let polygon = ETRS89_UTM32N.reproject(&Polygon::new(ring, Vec::new()));
        assert_eq!(polygon.exterior().0.len(), 4);
        assert!(polygon.exterior().is_closed());
    }
}
