//! Coordinate reference systems used by the pipeline.
//!
//! Sites and boundaries live in WGS84. Area math runs in EPSG:2285
//! (NAD83 / Washington North, US survey feet), a Lambert Conformal Conic
//! projection on the GRS80 ellipsoid. The NAD83/WGS84 datum difference is
//! below a metre in the region and is ignored. Boundary files may also
//! arrive in the Washington South zone (EPSG:2286).

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use geo::{Coord, MapCoords, MultiPolygon};

/// GRS80 semi-major axis (metres)
const GRS80_A: f64 = 6_378_137.0;
/// GRS80 inverse flattening
const GRS80_RF: f64 = 298.257_222_101;
/// Metres per US survey foot
const US_SURVEY_FOOT: f64 = 1200.0 / 3937.0;

/// Supported coordinate reference systems
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// EPSG:4326, longitude/latitude in degrees
    Wgs84,
    /// EPSG:2285, NAD83 / Washington North (ftUS); also read for the
    /// HARN realization EPSG:2926
    WashingtonNorth,
    /// EPSG:2286, NAD83 / Washington South (ftUS); also read for EPSG:2927
    WashingtonSouth,
}

impl Crs {
    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::WashingtonNorth => 2285,
            Crs::WashingtonSouth => 2286,
        }
    }

    /// Parse a CRS name as written in GeoJSON `crs` members.
    ///
    /// Accepts `EPSG:4326`, `urn:ogc:def:crs:EPSG::2285`,
    /// `urn:ogc:def:crs:OGC:1.3:CRS84` and similar spellings. NAD83 and
    /// NAD83(HARN) codes map to the same zone; the shift between them is a
    /// few centimetres.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.ends_with("CRS84") {
            return Some(Crs::Wgs84);
        }
        let code = name.rsplit(':').next()?.trim();
        match code {
            "4326" | "4269" | "4152" => Some(Crs::Wgs84),
            "2285" | "2926" => Some(Crs::WashingtonNorth),
            "2286" | "2927" => Some(Crs::WashingtonSouth),
            _ => None,
        }
    }

    /// Projection for a projected CRS, `None` for geographic ones
    fn projection(&self) -> Option<LambertConformalConic> {
        match self {
            Crs::Wgs84 => None,
            Crs::WashingtonNorth => Some(LambertConformalConic::washington_north()),
            Crs::WashingtonSouth => Some(LambertConformalConic::washington_south()),
        }
    }
}

/// Lambert Conformal Conic (two standard parallels) on an ellipsoid
#[derive(Debug, Clone, Copy)]
pub struct LambertConformalConic {
    a: f64,
    e: f64,
    n: f64,
    f: f64,
    rho0: f64,
    lon0: f64,
    false_easting: f64,
    false_northing: f64,
    /// Metres per output unit
    unit: f64,
}

impl LambertConformalConic {
    /// Build from standard parallels and origin, all in degrees.
    /// False easting/northing are in metres.
    pub fn new(
        lat1: f64,
        lat2: f64,
        lat0: f64,
        lon0: f64,
        false_easting: f64,
        false_northing: f64,
        unit: f64,
    ) -> Self {
        let flattening = 1.0 / GRS80_RF;
        let e = (2.0 * flattening - flattening * flattening).sqrt();
        let (phi1, phi2, phi0) = (lat1.to_radians(), lat2.to_radians(), lat0.to_radians());

        let m1 = msfn(phi1, e);
        let m2 = msfn(phi2, e);
        let t1 = tsfn(phi1, e);
        let t2 = tsfn(phi2, e);
        let t0 = tsfn(phi0, e);

        let n = (m1.ln() - m2.ln()) / (t1.ln() - t2.ln());
        let f = m1 / (n * t1.powf(n));
        let rho0 = GRS80_A * f * t0.powf(n);

        Self {
            a: GRS80_A,
            e,
            n,
            f,
            rho0,
            lon0: lon0.to_radians(),
            false_easting,
            false_northing,
            unit,
        }
    }

    /// EPSG:2285 parameters
    pub fn washington_north() -> Self {
        Self::new(
            48.0 + 44.0 / 60.0,
            47.5,
            47.0,
            -(120.0 + 50.0 / 60.0),
            500_000.0,
            0.0,
            US_SURVEY_FOOT,
        )
    }

    /// EPSG:2286 parameters
    pub fn washington_south() -> Self {
        Self::new(
            47.0 + 20.0 / 60.0,
            45.0 + 50.0 / 60.0,
            45.0 + 20.0 / 60.0,
            -120.5,
            500_000.0,
            0.0,
            US_SURVEY_FOOT,
        )
    }

    /// Project (lon, lat) degrees to (x, y) in projection units
    pub fn forward(&self, c: Coord<f64>) -> Coord<f64> {
        let phi = c.y.to_radians();
        let lambda = c.x.to_radians();
        let rho = self.a * self.f * tsfn(phi, self.e).powf(self.n);
        let theta = self.n * (lambda - self.lon0);

        let x = rho * theta.sin() + self.false_easting;
        let y = self.rho0 - rho * theta.cos() + self.false_northing;
        Coord {
            x: x / self.unit,
            y: y / self.unit,
        }
    }

    /// Unproject (x, y) in projection units to (lon, lat) degrees
    pub fn inverse(&self, c: Coord<f64>) -> Coord<f64> {
        let x = c.x * self.unit - self.false_easting;
        let y = self.rho0 - (c.y * self.unit - self.false_northing);
        let sign = self.n.signum();

        let rho = sign * (x * x + y * y).sqrt();
        let theta = (sign * x).atan2(sign * y);
        let t = (rho / (self.a * self.f)).powf(1.0 / self.n);

        let lambda = theta / self.n + self.lon0;

        let mut phi = FRAC_PI_2 - 2.0 * t.atan();
        for _ in 0..15 {
            let es = self.e * phi.sin();
            let next = FRAC_PI_2 - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(self.e / 2.0)).atan();
            let done = (next - phi).abs() < 1e-12;
            phi = next;
            if done {
                break;
            }
        }

        Coord {
            x: lambda.to_degrees(),
            y: phi.to_degrees(),
        }
    }
}

fn msfn(phi: f64, e: f64) -> f64 {
    let es = e * phi.sin();
    phi.cos() / (1.0 - es * es).sqrt()
}

fn tsfn(phi: f64, e: f64) -> f64 {
    let es = e * phi.sin();
    (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}

/// Reproject a multipolygon between supported CRSs
pub fn reproject(geometry: &MultiPolygon<f64>, from: Crs, to: Crs) -> MultiPolygon<f64> {
    if from == to {
        return geometry.clone();
    }
    let (source, target) = (from.projection(), to.projection());
    geometry.map_coords(|c| {
        let lonlat = source.map_or(c, |p| p.inverse(c));
        target.map_or(lonlat, |p| p.forward(lonlat))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_origin_maps_to_false_easting() {
        let lcc = LambertConformalConic::washington_north();
        let p = lcc.forward(Coord {
            x: -(120.0 + 50.0 / 60.0),
            y: 47.0,
        });
        assert!((p.x - 1_640_416.667).abs() < 0.01, "x = {}", p.x);
        assert!(p.y.abs() < 1e-6, "y = {}", p.y);
    }

    #[test]
    fn test_seattle_round_trip() {
        let lcc = LambertConformalConic::washington_north();
        let seattle = Coord {
            x: -122.3321,
            y: 47.6062,
        };
        let projected = lcc.forward(seattle);
        // Downtown Seattle sits around 1.27M ftUS east, 0.22M ftUS north
        assert!(projected.x > 1_200_000.0 && projected.x < 1_300_000.0);
        assert!(projected.y > 200_000.0 && projected.y < 250_000.0);

        let back = lcc.inverse(projected);
        assert!((back.x - seattle.x).abs() < 1e-9);
        assert!((back.y - seattle.y).abs() < 1e-9);
    }

    #[test]
    fn test_crs_names() {
        assert_eq!(Crs::from_name("EPSG:4326"), Some(Crs::Wgs84));
        assert_eq!(
            Crs::from_name("urn:ogc:def:crs:OGC:1.3:CRS84"),
            Some(Crs::Wgs84)
        );
        assert_eq!(
            Crs::from_name("urn:ogc:def:crs:EPSG::2285"),
            Some(Crs::WashingtonNorth)
        );
        assert_eq!(
            Crs::from_name("urn:ogc:def:crs:EPSG::2926"),
            Some(Crs::WashingtonNorth)
        );
        assert_eq!(Crs::from_name("EPSG:2927"), Some(Crs::WashingtonSouth));
        assert_eq!(Crs::from_name("EPSG:3857"), None);
        assert_eq!(Crs::WashingtonNorth.epsg(), 2285);
        assert_eq!(Crs::WashingtonSouth.epsg(), 2286);
    }

    #[test]
    fn test_south_zone_origin() {
        let lcc = LambertConformalConic::washington_south();
        let p = lcc.forward(Coord {
            x: -120.5,
            y: 45.0 + 20.0 / 60.0,
        });
        assert!((p.x - 1_640_416.667).abs() < 0.01, "x = {}", p.x);
        assert!(p.y.abs() < 1e-6, "y = {}", p.y);
    }

    #[test]
    fn test_reproject_between_zones() {
        // Centralia sits near the North/South zone line
        let square = MultiPolygon::new(vec![polygon![
            (x: -122.96, y: 46.71), (x: -122.95, y: 46.71), (x: -122.95, y: 46.72), (x: -122.96, y: 46.71)
        ]]);
        let south = reproject(&square, Crs::Wgs84, Crs::WashingtonSouth);
        let north = reproject(&south, Crs::WashingtonSouth, Crs::WashingtonNorth);
        let back = reproject(&north, Crs::WashingtonNorth, Crs::Wgs84);
        for (a, b) in square.0[0].exterior().0.iter().zip(back.0[0].exterior().0.iter()) {
            assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9);
        }
        assert_eq!(reproject(&square, Crs::Wgs84, Crs::Wgs84), square);
    }
}
