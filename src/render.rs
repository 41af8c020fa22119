use std::fmt::Write as _;

use crate::flights::{
    Flight, FlightTable, BARO_ALTITUDE, CALLSIGN, DISTANCE, LATITUDE, LONGITUDE, ON_GROUND,
    ORIGIN_COUNTRY, TRUE_TRACK, VELOCITY, VERTICAL_RATE,
};
use crate::geo::Coordinate;

/// Column meanings shown beneath the table.
pub const COLUMN_KEYS: [(&str, &str); 10] = [
    ("Callsign", "Callsign of the vehicle (8 chars)."),
    ("Origin country", "Country name inferred from the ICAO 24-bit address."),
    ("Longitude", "WGS-84 longitude in decimal degrees."),
    ("Latitude", "WGS-84 latitude in decimal degrees."),
    ("Barometric altitude", "Barometric altitude in meters."),
    (
        "On ground",
        "Boolean value which indicates if the position was retrieved from a surface position report.",
    ),
    ("Velocity", "Velocity over ground in m/s."),
    (
        "True track",
        "True track in decimal degrees clockwise from north (north=0°).",
    ),
    (
        "Vertical rate",
        "Vertical rate in m/s. A positive value indicates that the airplane is climbing, a negative value indicates that it descends.",
    ),
    ("Distance", "Distance plane is from you (in miles)"),
];

/// Everything the index page embeds for the browser.
pub struct IndexPage<'a> {
    pub table: &'a FlightTable,
    pub location: Coordinate,
    pub pm_miles: f64,
    pub update_interval_ms: u64,
    pub default_location: Coordinate,
    pub overhead_radius: f64,
    pub mapbox_key: &'a str,
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn num(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "NaN".to_string())
}

fn cell(flight: &Flight, column: &str) -> String {
    match column {
        ORIGIN_COUNTRY => flight
            .origin_country
            .as_deref()
            .map(escape)
            .unwrap_or_else(|| "None".to_string()),
        LONGITUDE => num(flight.longitude),
        LATITUDE => num(flight.latitude),
        BARO_ALTITUDE => num(flight.baro_altitude),
        ON_GROUND => flight
            .on_ground
            .map(|b| if b { "True" } else { "False" }.to_string())
            .unwrap_or_else(|| "None".to_string()),
        VELOCITY => num(flight.velocity),
        TRUE_TRACK => num(flight.true_track),
        VERTICAL_RATE => num(flight.vertical_rate),
        DISTANCE => num(flight.distance),
        _ => String::new(),
    }
}

/// Renders flights as a table indexed by callsign, one column per entry in
/// `table.columns` after the index.
pub fn render_table(table: &FlightTable) -> String {
    let (index, columns) = table.columns.split_first().unwrap_or((&CALLSIGN, &[][..]));

    let mut html = String::from("<table border=\"1\" class=\"dataframe\">\n  <thead>\n    <tr style=\"text-align: right;\">\n      <th></th>\n");
    for column in columns {
        let _ = writeln!(html, "      <th>{}</th>", column);
    }
    let _ = writeln!(
        html,
        "    </tr>\n    <tr>\n      <th>{}</th>\n{}    </tr>\n  </thead>\n  <tbody>",
        index,
        "      <th></th>\n".repeat(columns.len())
    );

    for flight in &table.flights {
        let _ = writeln!(html, "    <tr>\n      <th>{}</th>", escape(&flight.callsign));
        for column in columns {
            let _ = writeln!(html, "      <td>{}</td>", cell(flight, column));
        }
        html.push_str("    </tr>\n");
    }

    html.push_str("  </tbody>\n</table>");
    html
}

pub fn render_glossary() -> String {
    let mut html = String::from("<table border=\"1\" class=\"dataframe\">\n  <thead>\n    <tr style=\"text-align: right;\">\n      <th></th>\n      <th>Description</th>\n    </tr>\n    <tr>\n      <th>Key</th>\n      <th></th>\n    </tr>\n  </thead>\n  <tbody>\n");
    for (key, description) in COLUMN_KEYS {
        let _ = writeln!(
            html,
            "    <tr>\n      <th>{}</th>\n      <td>{}</td>\n    </tr>",
            escape(key),
            escape(description)
        );
    }
    html.push_str("  </tbody>\n</table>");
    html
}

pub fn render_index(page: &IndexPage) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Flights overhead</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
  <style>
    body {{ font-family: sans-serif; margin: 1em 2em; }}
    #map {{ height: 400px; }}
    #alert {{ display: none; padding: 0.5em; background: #c0392b; color: white; font-weight: bold; }}
    table.dataframe {{ border-collapse: collapse; margin: 1em 0; }}
    table.dataframe td, table.dataframe th {{ padding: 2px 8px; }}
  </style>
</head>
<body>
  <h1>Flights within {pm_miles} miles</h1>
  <p><a href="/about">About</a></p>
  <div id="alert">Aircraft overhead! Closest is <span id="min-dist"></span> miles away.</div>
  <div id="map"></div>
  <div id="flights">{table}</div>
  <h2>Column keys</h2>
  {column_keys}
  <script>
    const UPDATE_INTERVAL = {update_interval};
    const DEFAULT_LOCATION = [{default_lat}, {default_lng}];
    const OVERHEAD_RADIUS = {overhead_radius};
    const MAPBOX_KEY = {mapbox_key};
    let location_ = [{lat}, {lng}];

    const map = L.map('map').setView(location_, 9);
    L.tileLayer('https://api.mapbox.com/styles/v1/{{id}}/tiles/{{z}}/{{x}}/{{y}}?access_token={{accessToken}}', {{
      attribution: '&copy; Mapbox &copy; OpenStreetMap',
      id: 'mapbox/streets-v11',
      tileSize: 512,
      zoomOffset: -1,
      accessToken: MAPBOX_KEY
    }}).addTo(map);
    const you = L.marker(location_).addTo(map);
    L.circle(location_, {{ radius: {pm_miles} * 1600 }}).addTo(map);

    function refresh() {{
      fetch(`/flights?lat=${{location_[0]}}&lng=${{location_[1]}}`)
        .then(r => r.ok ? r.text() : Promise.reject(r.status))
        .then(html => {{ document.getElementById('flights').innerHTML = html; }})
        .then(checkOverhead)
        .catch(err => console.log('refresh failed', err));
    }}

    function checkOverhead() {{
      return fetch('/check_overhead')
        .then(r => r.json())
        .then(s => {{
          const alert = document.getElementById('alert');
          alert.style.display = s.overhead ? 'block' : 'none';
          if (s.min_dist !== null) {{
            document.getElementById('min-dist').textContent = s.min_dist.toFixed(1);
          }}
        }});
    }}

    function locate() {{
      if (!navigator.geolocation) {{ return; }}
      navigator.geolocation.getCurrentPosition(
        pos => {{
          location_ = [pos.coords.latitude, pos.coords.longitude];
          you.setLatLng(location_);
          map.setView(location_);
        }},
        () => {{ location_ = DEFAULT_LOCATION; }}
      );
    }}

    locate();
    checkOverhead();
    setInterval(refresh, UPDATE_INTERVAL);
  </script>
</body>
</html>
"#,
        pm_miles = page.pm_miles,
        table = render_table(page.table),
        column_keys = render_glossary(),
        update_interval = page.update_interval_ms,
        default_lat = page.default_location.lat,
        default_lng = page.default_location.lon,
        overhead_radius = page.overhead_radius,
        mapbox_key = serde_json::to_string(page.mapbox_key).unwrap_or_else(|_| "\"\"".to_string()),
        lat = page.location.lat,
        lng = page.location.lon,
    )
}

pub fn render_about() -> &'static str {
    r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>About</title>
</head>
<body>
  <h1>About</h1>
  <p>This page shows aircraft within 50 miles of you, using live state vectors
  from the <a href="https://opensky-network.org">OpenSky Network</a>.</p>
  <p>Your location comes from the browser when you allow it, otherwise it is
  approximated from an IP address. Distances are great-circle distances on a
  spherical earth.</p>
  <p><a href="/">Back to the map</a></p>
</body>
</html>
"#
}
