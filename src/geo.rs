const EARTH_RADIUS_M: f64 = 6_371_000.0;
const MILES_PER_DEG_LAT: f64 = 69.1;
const METRES_PER_MILE: f64 = 1600.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Query region handed to the flight-state API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lamin: f64,
    pub lomin: f64,
    pub lamax: f64,
    pub lomax: f64,
}

impl BoundingBox {
    /// Box of `radius_miles` around `center`, with the longitude span widened by
    /// 1/cos(lat). Clamped to valid degrees; boxes crossing the antimeridian are
    /// not split, so coverage near ±180° is cut short.
    pub fn around(center: Coordinate, radius_miles: f64) -> Self {
        let miles_per_deg_lng = MILES_PER_DEG_LAT * center.lat.to_radians().cos();
        let lat_pm = radius_miles / MILES_PER_DEG_LAT;
        let lng_pm = radius_miles / miles_per_deg_lng;

        Self {
            lamin: (center.lat - lat_pm).max(-90.0),
            lomin: (center.lon - lng_pm).max(-180.0),
            lamax: (center.lat + lat_pm).min(90.0),
            lomax: (center.lon + lng_pm).min(180.0),
        }
    }

    pub fn query_params(&self) -> [(&'static str, f64); 4] {
        [
            ("lamin", self.lamin),
            ("lomin", self.lomin),
            ("lamax", self.lamax),
            ("lomax", self.lomax),
        ]
    }
}

/// Great-circle distance on a spherical earth, in miles.
pub fn distance_in_miles(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lon - a.lon).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c / METRES_PER_MILE
}
