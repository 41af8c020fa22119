use std::time::Instant;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::DEFAULT_LOCATION;
use crate::error::{AppError, AppResult};
use crate::geo::Coordinate;

const SERVICE: &str = "ipstack";

#[derive(Debug, Deserialize)]
struct IpstackResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Passes an explicit location through, or asks ipstack for the approximate
/// location of this host's address.
pub async fn resolve(
    client: &reqwest::Client,
    ipstack_url: &str,
    access_key: &str,
    location: Option<Coordinate>,
) -> AppResult<Coordinate> {
    match location {
        Some(coordinate) => Ok(coordinate),
        None => lookup_by_ip(client, ipstack_url, access_key).await,
    }
}

async fn lookup_by_ip(
    client: &reqwest::Client,
    ipstack_url: &str,
    access_key: &str,
) -> AppResult<Coordinate> {
    let start = Instant::now();
    let resp = client
        .get(ipstack_url)
        .query(&[("access_key", access_key)])
        .send()
        .await
        .map_err(|e| AppError::upstream(SERVICE, e))?;

    if !resp.status().is_success() {
        return Err(AppError::UpstreamStatus {
            service: SERVICE,
            status: resp.status(),
        });
    }

    let body = resp.text().await.map_err(|e| AppError::upstream(SERVICE, e))?;
    info!("ipstack lookup took {:?}", start.elapsed());

    Ok(coordinate_or_default(&body))
}

// ipstack reports failures (bad key, quota) inside a 200 body without
// coordinates, sometimes not even as JSON.
fn coordinate_or_default(body: &str) -> Coordinate {
    match serde_json::from_str::<IpstackResponse>(body) {
        Ok(IpstackResponse {
            latitude: Some(lat),
            longitude: Some(lon),
        }) => Coordinate::new(lat, lon),
        _ => {
            warn!(
                "Failed to get location from IP address, using default {:?}",
                DEFAULT_LOCATION
            );
            DEFAULT_LOCATION
        }
    }
}
