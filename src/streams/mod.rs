mod proximity;
mod ranking;
mod recorder;
mod seed;

pub use proximity::{NearbyResult, Resolution, SearchPolicy, SearchStep};
pub use ranking::{ExternalStreamView, LocalStreamView, RankingView, ViewRecord};
pub use recorder::RecordedPlay;
pub use seed::{demo_entries, SeedEntry, SeedRejection, SeedReport, MAX_SEED_STREAM_COUNT};

use crate::catalog::TrackCatalog;
use crate::coords::{self, haversine_m, normalize, BoundingBox};
use crate::error::{StreamError, StreamResult};
use crate::metrics;
use crate::stream_store::{Location, SqliteStreamStore, StreamStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct StreamServiceConfig {
    /// Precision new locations are written at.
    pub write_precision: u8,
    pub policy: SearchPolicy,
    /// Length of the global ranking used when nothing nearby is visible.
    pub global_top_n: usize,
}

impl Default for StreamServiceConfig {
    fn default() -> Self {
        Self {
            write_precision: 6,
            policy: SearchPolicy::default(),
            global_top_n: 50,
        }
    }
}

/// A stored location together with its distance from a query point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyLocation {
    pub location: Location,
    pub distance_m: f64,
}

/// Entry point for recording plays and asking what is popular nearby.
pub struct StreamService {
    store: Arc<dyn StreamStore>,
    catalog: Arc<dyn TrackCatalog>,
    ranking: RankingView,
    config: StreamServiceConfig,
}

impl StreamService {
    pub fn new(
        store: Arc<dyn StreamStore>,
        catalog: Arc<dyn TrackCatalog>,
        config: StreamServiceConfig,
    ) -> StreamResult<Self> {
        coords::validate_precision(config.write_precision)?;
        Ok(Self {
            store,
            ranking: RankingView::new(catalog.clone()),
            catalog,
            config,
        })
    }

    /// Service whose counters and catalog share one SQLite database.
    pub fn with_sqlite(store: SqliteStreamStore, config: StreamServiceConfig) -> StreamResult<Self> {
        let shared = Arc::new(store);
        let stream_store: Arc<dyn StreamStore> = shared.clone();
        let catalog: Arc<dyn TrackCatalog> = shared;
        Self::new(stream_store, catalog, config)
    }

    pub fn config(&self) -> &StreamServiceConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<dyn TrackCatalog> {
        &self.catalog
    }

    pub(crate) fn store(&self) -> &Arc<dyn StreamStore> {
        &self.store
    }

    pub(crate) fn ranking(&self) -> &RankingView {
        &self.ranking
    }

    pub fn get_or_create_location(
        &self,
        latitude: f64,
        longitude: f64,
        precision: u8,
    ) -> StreamResult<Location> {
        let bucket = normalize(latitude, longitude, precision)?;
        self.store
            .get_or_create_location(&bucket)
            .map_err(storage_error("get_or_create_location"))
    }

    pub fn lookup_location(
        &self,
        latitude: f64,
        longitude: f64,
        precision: u8,
    ) -> StreamResult<Option<Location>> {
        let bucket = normalize(latitude, longitude, precision)?;
        self.store
            .lookup_location(&bucket)
            .map_err(storage_error("lookup_location"))
    }

    pub fn lookup_in_bucket(
        &self,
        latitude: f64,
        longitude: f64,
        precision: u8,
    ) -> StreamResult<Vec<Location>> {
        let bucket = normalize(latitude, longitude, precision)?;
        self.store
            .locations_in_bucket(&bucket)
            .map_err(storage_error("locations_in_bucket"))
    }

    /// Locations within ±`radius_m` of the point, nearest first.
    pub fn lookup_bounding_box(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
    ) -> StreamResult<Vec<NearbyLocation>> {
        let mut nearby = Vec::new();
        for bbox in BoundingBox::around(latitude, longitude, radius_m)? {
            let locations = self
                .store
                .locations_in_box(&bbox)
                .map_err(storage_error("locations_in_box"))?;
            nearby.extend(locations.into_iter().map(|location| NearbyLocation {
                distance_m: haversine_m(latitude, longitude, location.latitude, location.longitude),
                location,
            }));
        }
        nearby.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then(a.location.id.cmp(&b.location.id))
        });
        Ok(nearby)
    }
}

/// Maps a store failure to a retryable error, counting it by operation.
pub(crate) fn storage_error(operation: &'static str) -> impl Fn(anyhow::Error) -> StreamError {
    move |e| {
        warn!("Store operation {} failed: {:#}", operation, e);
        metrics::record_store_error(operation);
        StreamError::Storage(e)
    }
}
