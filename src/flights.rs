use std::time::Instant;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::geo::{distance_in_miles, BoundingBox, Coordinate};

const SERVICE: &str = "OpenSky";

/// All OpenSky state vector columns, in wire order.
pub const COL_NAMES: [&str; 18] = [
    "icao24",
    "callsign",
    "origin_country",
    "time_position",
    "last_contact",
    "longitude",
    "latitude",
    "baro_altitude",
    "on_ground",
    "velocity",
    "true_track",
    "vertical_rate",
    "sensors",
    "geo_altitude",
    "squawk",
    "spi",
    "position_source",
    "category",
];

pub const CALLSIGN: &str = "Callsign";
pub const ORIGIN_COUNTRY: &str = "Origin country";
pub const LONGITUDE: &str = "Longitude";
pub const LATITUDE: &str = "Latitude";
pub const BARO_ALTITUDE: &str = "Barometric altitude";
pub const ON_GROUND: &str = "On ground";
pub const VELOCITY: &str = "Velocity";
pub const TRUE_TRACK: &str = "True track";
pub const VERTICAL_RATE: &str = "Vertical rate";
pub const DISTANCE: &str = "Distance";

/// Narrowest row we accept.
pub const MIN_ROW_WIDTH: usize = 9;

const IDX_CALLSIGN: usize = 1;
const IDX_ORIGIN_COUNTRY: usize = 2;
const IDX_LONGITUDE: usize = 5;
const IDX_LATITUDE: usize = 6;
const IDX_BARO_ALTITUDE: usize = 7;
const IDX_ON_GROUND: usize = 8;
const IDX_VELOCITY: usize = 9;
const IDX_TRUE_TRACK: usize = 10;
const IDX_VERTICAL_RATE: usize = 11;

/// Displayed columns with their position in a state row, index column first.
const SELECTED_COLUMNS: [(&str, usize); 9] = [
    (CALLSIGN, IDX_CALLSIGN),
    (ORIGIN_COUNTRY, IDX_ORIGIN_COUNTRY),
    (LONGITUDE, IDX_LONGITUDE),
    (LATITUDE, IDX_LATITUDE),
    (BARO_ALTITUDE, IDX_BARO_ALTITUDE),
    (ON_GROUND, IDX_ON_GROUND),
    (VELOCITY, IDX_VELOCITY),
    (TRUE_TRACK, IDX_TRUE_TRACK),
    (VERTICAL_RATE, IDX_VERTICAL_RATE),
];

/// Display labels of the columns present in rows `width` wide.
fn display_columns(width: usize) -> Vec<&'static str> {
    SELECTED_COLUMNS
        .iter()
        .filter(|(_, idx)| *idx < width)
        .map(|(label, _)| *label)
        .collect()
}

#[derive(Debug, Deserialize)]
struct OpenSkyResponse {
    states: Option<Vec<Vec<serde_json::Value>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flight {
    pub callsign: String,
    pub origin_country: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub baro_altitude: Option<f64>,
    pub on_ground: Option<bool>,
    pub velocity: Option<f64>,
    pub true_track: Option<f64>,
    pub vertical_rate: Option<f64>,
    /// Miles from the viewer, set by [`FlightTable::within`].
    pub distance: Option<f64>,
}

impl Flight {
    fn from_row(row: &[serde_json::Value]) -> Self {
        let f = |i: usize| row.get(i).and_then(serde_json::Value::as_f64);
        Flight {
            callsign: row
                .get(IDX_CALLSIGN)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            origin_country: row
                .get(IDX_ORIGIN_COUNTRY)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            longitude: f(IDX_LONGITUDE),
            latitude: f(IDX_LATITUDE),
            baro_altitude: f(IDX_BARO_ALTITUDE),
            on_ground: row.get(IDX_ON_GROUND).and_then(serde_json::Value::as_bool),
            velocity: f(IDX_VELOCITY),
            true_track: f(IDX_TRUE_TRACK),
            vertical_rate: f(IDX_VERTICAL_RATE),
            distance: None,
        }
    }

    pub fn position(&self) -> Option<Coordinate> {
        Some(Coordinate::new(self.latitude?, self.longitude?))
    }
}

/// Flights from one query, indexed by callsign, in upstream order. `columns`
/// holds the display labels, index column first.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightTable {
    pub columns: Vec<&'static str>,
    pub flights: Vec<Flight>,
}

impl Default for FlightTable {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FlightTable {
    pub fn new(flights: Vec<Flight>) -> Self {
        Self::with_width(flights, COL_NAMES.len())
    }

    fn with_width(flights: Vec<Flight>, width: usize) -> Self {
        Self {
            columns: display_columns(width),
            flights,
        }
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    /// Computes each flight's distance from `center` and keeps those strictly
    /// closer than `radius_miles`. Flights without a position are dropped.
    pub fn within(self, center: Coordinate, radius_miles: f64) -> Self {
        let flights = self
            .flights
            .into_iter()
            .filter_map(|mut flight| {
                let distance = distance_in_miles(flight.position()?, center);
                flight.distance = Some(distance);
                (distance < radius_miles).then_some(flight)
            })
            .collect();
        let mut columns = self.columns;
        if !columns.contains(&DISTANCE) {
            columns.push(DISTANCE);
        }
        Self { columns, flights }
    }

    pub fn min_distance(&self) -> Option<f64> {
        self.flights
            .iter()
            .filter_map(|f| f.distance)
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Queries OpenSky for every state vector inside `bbox`.
pub async fn fetch(
    client: &reqwest::Client,
    opensky_url: &str,
    bbox: &BoundingBox,
) -> AppResult<FlightTable> {
    let start = Instant::now();
    info!("Fetching flights from OpenSky: {:?}", bbox);
    let resp = client
        .get(opensky_url)
        .query(&bbox.query_params())
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .send()
        .await
        .map_err(|e| AppError::upstream(SERVICE, e))?;

    if !resp.status().is_success() {
        return Err(AppError::UpstreamStatus {
            service: SERVICE,
            status: resp.status(),
        });
    }

    let body: OpenSkyResponse = resp.json().await.map_err(|e| AppError::upstream(SERVICE, e))?;
    let table = parse_states(body.states.unwrap_or_default())?;
    info!(
        "OpenSky returned {} flights in {:?}",
        table.len(),
        start.elapsed()
    );
    Ok(table)
}

fn parse_states(states: Vec<Vec<serde_json::Value>>) -> AppResult<FlightTable> {
    let Some(width) = states.iter().map(Vec::len).min() else {
        return Ok(FlightTable::new(Vec::new()));
    };
    if width < MIN_ROW_WIDTH {
        return Err(AppError::RowTooNarrow {
            width,
            required: MIN_ROW_WIDTH,
        });
    }

    if width != COL_NAMES.len() {
        warn!(
            "{} columns returned, generally {} columns expected from OpenSky REST API",
            width,
            COL_NAMES.len()
        );
    }
    let flights = states.iter().map(|row| Flight::from_row(row)).collect();
    Ok(FlightTable::with_width(flights, width))
}
