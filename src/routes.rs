use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{Config, DEFAULT_LOCATION, OVERHEAD_RADIUS, PM_MILES, UPDATE_INTERVAL_MS};
use crate::error::{AppError, AppResult};
use crate::flights::{self, FlightTable};
use crate::geo::{BoundingBox, Coordinate};
use crate::location;
use crate::render::{self, IndexPage};
use crate::store::FlightStore;

const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

#[derive(Clone)]
pub struct AppState {
    pub client: reqwest::Client,
    pub config: Config,
    pub store: FlightStore,
}

#[derive(Debug, Deserialize)]
pub struct FlightsQuery {
    lat: Option<String>,
    lng: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/flights", get(flights_fragment))
        .route("/about", get(about))
        .route("/check_overhead", get(check_overhead))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolves the viewer, queries OpenSky around them and keeps the flights
/// within `PM_MILES`. Returns the table with the location it was computed for.
pub async fn get_flights(
    state: &AppState,
    explicit: Option<Coordinate>,
) -> AppResult<(FlightTable, Coordinate)> {
    let start = Instant::now();
    let center = location::resolve(
        &state.client,
        &state.config.ipstack_url,
        &state.config.ipstack_key,
        explicit,
    )
    .await?;

    let bbox = BoundingBox::around(center, PM_MILES);
    let table = flights::fetch(&state.client, &state.config.opensky_url, &bbox)
        .await?
        .within(center, PM_MILES);

    if table.is_empty() {
        info!(
            "no flights within {} miles of {:?} (took {:?})",
            PM_MILES,
            center,
            start.elapsed()
        );
    } else {
        info!(
            "{} flights within {} miles of {:?} (took {:?})",
            table.len(),
            PM_MILES,
            center,
            start.elapsed()
        );
    }
    Ok((table, center))
}

async fn index(State(state): State<AppState>) -> AppResult<Html<String>> {
    let (table, location) = get_flights(&state, None).await?;
    let html = render::render_index(&IndexPage {
        table: &table,
        location,
        pm_miles: PM_MILES,
        update_interval_ms: UPDATE_INTERVAL_MS,
        default_location: DEFAULT_LOCATION,
        overhead_radius: OVERHEAD_RADIUS,
        mapbox_key: &state.config.mapbox_key,
    });
    state.store.replace(table, location).await;
    Ok(Html(html))
}

async fn flights_fragment(
    State(state): State<AppState>,
    Query(query): Query<FlightsQuery>,
) -> AppResult<Response> {
    let location = parse_location(&query)?;
    let (table, _) = get_flights(&state, Some(location)).await?;
    let html = render::render_table(&table);
    state.store.replace(table, location).await;
    Ok(no_cache(Html(html)))
}

async fn about() -> Html<&'static str> {
    Html(render::render_about())
}

async fn check_overhead(State(state): State<AppState>) -> Response {
    no_cache(Json(state.store.overhead(OVERHEAD_RADIUS).await))
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn no_cache(body: impl IntoResponse) -> Response {
    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    response
}

fn parse_degrees(name: &str, value: Option<&String>, limit: f64) -> AppResult<f64> {
    let raw = value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidCoordinate(format!("missing {}", name)))?;
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && (-limit..=limit).contains(v))
        .ok_or_else(|| AppError::InvalidCoordinate(format!("{}={}", name, raw)))
}

fn parse_location(query: &FlightsQuery) -> AppResult<Coordinate> {
    Ok(Coordinate::new(
        parse_degrees("lat", query.lat.as_ref(), 90.0)?,
        parse_degrees("lng", query.lng.as_ref(), 180.0)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}", addr)
    }

    fn state_row(callsign: &str, lat: f64, lon: f64) -> Value {
        json!([
            "400abc", callsign, "United Kingdom", 1700000000, 1700000001, lon, lat,
            3048.0, false, 120.0, 270.0, 0.0, null, 3100.0, "1234", false, 0, 0
        ])
    }

    /// Starts stand-ins for ipstack and OpenSky, then the app in front of them.
    async fn start_app(states: Value) -> (String, FlightStore) {
        let upstream = Router::new()
            .route(
                "/check",
                get(|| async { Json(json!({"latitude": 51.505, "longitude": -0.09})) }),
            )
            .route(
                "/states/all",
                get(move || {
                    let states = states.clone();
                    async move { Json(json!({"time": 1700000001, "states": states})) }
                }),
            );
        let upstream_url = serve(upstream).await;

        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            ipstack_key: "key".to_string(),
            mapbox_key: "pk.test".to_string(),
            ipstack_url: format!("{}/check", upstream_url),
            opensky_url: format!("{}/states/all", upstream_url),
            upstream_timeout: Duration::from_secs(5),
        };
        let store = FlightStore::new();
        let state = AppState {
            client: reqwest::Client::new(),
            config,
            store: store.clone(),
        };
        (serve(router(state)).await, store)
    }

    #[test]
    fn test_parse_location() {
        let query = FlightsQuery {
            lat: Some("51.5".to_string()),
            lng: Some(" -0.1 ".to_string()),
        };
        assert_eq!(parse_location(&query).unwrap(), Coordinate::new(51.5, -0.1));

        for (lat, lng) in [(Some("91"), Some("0")), (Some("0"), Some("abc")), (None, Some("0")), (Some("NaN"), Some("0"))] {
            let query = FlightsQuery {
                lat: lat.map(str::to_string),
                lng: lng.map(str::to_string),
            };
            assert!(matches!(parse_location(&query), Err(AppError::InvalidCoordinate(_))));
        }
    }

    #[tokio::test]
    async fn test_flights_fragment_filters_by_distance() {
        let (app, store) = start_app(json!([
            state_row("NEAR1   ", 51.6, -0.1),
            state_row("FAR1    ", 52.5, -0.1)
        ]))
        .await;

        let resp = reqwest::get(format!("{}/flights?lat=51.505&lng=-0.09", app))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CACHE_CONTROL], NO_CACHE);
        let body = resp.text().await.unwrap();
        assert!(body.contains("<th>NEAR1</th>"));
        assert!(!body.contains("FAR1"));

        let status = store.overhead(OVERHEAD_RADIUS).await;
        assert!(!status.overhead);
        assert!((status.min_dist.unwrap() - 6.6).abs() < 0.1);
    }

    #[tokio::test]
    async fn test_index_uses_ip_location() {
        let (app, _) = start_app(json!([state_row("OVER1", 51.51, -0.09)])).await;

        let body = reqwest::get(format!("{}/", app))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("<th>OVER1</th>"));
        assert!(body.contains("let location_ = [51.505, -0.09];"));
        assert!(body.contains("Distance plane is from you"));

        let status: Value = reqwest::get(format!("{}/check_overhead", app))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["overhead"], json!(true));
    }

    #[tokio::test]
    async fn test_empty_states_render_empty_table() {
        let (app, _) = start_app(Value::Null).await;
        let resp = reqwest::get(format!("{}/flights?lat=0&lng=0", app))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.text().await.unwrap();
        assert!(body.contains("<th>Distance</th>"));
        assert!(!body.contains("<td>"));
    }

    #[tokio::test]
    async fn test_narrow_rows_drop_missing_columns() {
        let mut row = state_row("SHORT1", 51.6, -0.1);
        row.as_array_mut().unwrap().truncate(9);
        let (app, store) = start_app(json!([row])).await;

        let body = reqwest::get(format!("{}/flights?lat=51.505&lng=-0.09", app))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("<th>SHORT1</th>"));
        assert!(body.contains("<th>On ground</th>"));
        assert!(body.contains("<th>Distance</th>"));
        assert!(!body.contains("<th>Velocity</th>"));

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.location, Coordinate::new(51.505, -0.09));
        assert_eq!(snapshot.table.columns.len(), 7);
    }

    #[tokio::test]
    async fn test_check_overhead_before_any_fetch() {
        let (app, _) = start_app(Value::Null).await;
        let status: Value = reqwest::get(format!("{}/check_overhead", app))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status, json!({"overhead": false, "min_dist": null}));
    }

    #[tokio::test]
    async fn test_bad_coordinates_are_rejected() {
        let (app, _) = start_app(Value::Null).await;
        let resp = reqwest::get(format!("{}/flights?lat=100&lng=0", app))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let upstream = Router::new().route(
            "/states/all",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let broken_url = serve(upstream).await;
        let state = AppState {
            client: reqwest::Client::new(),
            config: Config {
                host: "127.0.0.1".to_string(),
                port: 0,
                ipstack_key: String::new(),
                mapbox_key: String::new(),
                ipstack_url: format!("{}/check", broken_url),
                opensky_url: format!("{}/states/all", broken_url),
                upstream_timeout: Duration::from_secs(5),
            },
            store: FlightStore::new(),
        };
        let err = get_flights(&state, Some(Coordinate::new(0.0, 0.0)))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_about_and_healthz() {
        let (app, _) = start_app(Value::Null).await;
        let about = reqwest::get(format!("{}/about", app)).await.unwrap();
        assert_eq!(about.status(), StatusCode::OK);
        assert!(about.text().await.unwrap().contains("OpenSky Network"));

        let health = reqwest::get(format!("{}/healthz", app)).await.unwrap();
        assert_eq!(health.text().await.unwrap(), "ok");
    }
}
