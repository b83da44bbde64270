mod models;
mod schema;
mod sqlite_catalog;
mod sqlite_stream_store;

pub use models::*;
pub use schema::STREAMS_SCHEMA;
pub use sqlite_stream_store::SqliteStreamStore;

use crate::coords::{BoundingBox, Bucket};
use anyhow::Result;

pub trait StreamStore: Send + Sync {
    // Locations
    /// Returns the location row for the bucket, inserting it if missing. Concurrent
    /// callers with the same bucket all get the same row.
    ///
    /// Identity is the grid point alone. A bucket whose center coincides with an
    /// existing row of another precision gets that row back, and the row keeps the
    /// precision it was first written at.
    fn get_or_create_location(&self, bucket: &Bucket) -> Result<Location>;
    /// Exact match on the bucket's canonical pair; never creates.
    fn lookup_location(&self, bucket: &Bucket) -> Result<Option<Location>>;
    /// Every stored location whose normalization at the bucket's precision is the bucket.
    fn locations_in_bucket(&self, bucket: &Bucket) -> Result<Vec<Location>>;
    fn locations_in_box(&self, bbox: &BoundingBox) -> Result<Vec<Location>>;
    fn location_count(&self) -> Result<usize>;

    // Counters
    /// Adds `plays` to the (user, subject) counter in one atomic statement,
    /// creating it at `location_id` if absent. Returns the resulting count, or
    /// `None` without touching the counter when the sum would overflow `i64`.
    fn add_plays(
        &self,
        user_id: i64,
        location_id: i64,
        subject: &SubjectRef,
        plays: i64,
    ) -> Result<Option<(UpsertOutcome, i64)>>;
    fn get_counter(&self, user_id: i64, subject: &SubjectRef) -> Result<Option<StreamCounter>>;
    /// Counters of `kind` at any location in the bucket, by count descending then id.
    fn counters_in_bucket(&self, bucket: &Bucket, kind: StreamKind) -> Result<Vec<StreamCounter>>;
    /// Counters of `kind` at the given locations, by count descending then id.
    fn counters_at_locations(
        &self,
        location_ids: &[i64],
        kind: StreamKind,
    ) -> Result<Vec<StreamCounter>>;
    /// A page of the counters of `kind` anywhere, by count descending then id.
    fn top_counters(
        &self,
        kind: StreamKind,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StreamCounter>>;
}
