use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::flights::FlightTable;
use crate::geo::Coordinate;

/// The most recent query result.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub table: FlightTable,
    pub location: Coordinate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverheadStatus {
    pub overhead: bool,
    pub min_dist: Option<f64>,
}

/// Single-slot holder for the last fetched table. Each query replaces the slot
/// wholesale; concurrent writers race and the last one wins.
#[derive(Debug, Clone, Default)]
pub struct FlightStore {
    current: Arc<RwLock<Option<Snapshot>>>,
}

impl FlightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, table: FlightTable, location: Coordinate) {
        *self.current.write().await = Some(Snapshot { table, location });
    }

    pub async fn snapshot(&self) -> Option<Snapshot> {
        self.current.read().await.clone()
    }

    /// Whether any stored flight is closer than `alert_radius` miles. Before the
    /// first fetch, or with an empty table, nothing is overhead.
    pub async fn overhead(&self, alert_radius: f64) -> OverheadStatus {
        let guard = self.current.read().await;
        if let Some(snapshot) = guard.as_ref() {
            debug!(
                "checking {} flights around {:?}",
                snapshot.table.len(),
                snapshot.location
            );
        }
        let min_dist = guard.as_ref().and_then(|s| s.table.min_distance());
        OverheadStatus {
            overhead: min_dist.is_some_and(|d| d < alert_radius),
            min_dist,
        }
    }
}
