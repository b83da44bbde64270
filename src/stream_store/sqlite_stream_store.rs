use super::models::{Location, StreamCounter, StreamKind, SubjectRef, UpsertOutcome};
use super::schema::STREAMS_SCHEMA;
use super::StreamStore;
use crate::coords::{BoundingBox, Bucket};
use crate::sqlite_persistence::open_versioned;
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

const LOCATION_COLUMNS: &str = "id, precision, lat_units, lon_units, latitude, longitude, created";

const COUNTER_COLUMNS: &str = "c.id, c.user_id, c.location_id, c.kind, c.local_track_id, \
     c.external_track_id, c.play_count, c.first_played, c.last_played";

/// Upper bound on bound parameters per `IN (...)` query.
const MAX_IN_PARAMS: usize = 500;

/// Streams database handle. Each handle owns one connection; several handles may
/// point at the same file.
#[derive(Clone, Debug)]
pub struct SqliteStreamStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStreamStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::with_busy_timeout(db_path, Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
    }

    pub fn with_busy_timeout<P: AsRef<Path>>(db_path: P, busy_timeout: Duration) -> Result<Self> {
        let conn = open_versioned(db_path, &STREAMS_SCHEMA, busy_timeout)
            .context("Failed to open streams database")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(super) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Streams database connection mutex poisoned"))
    }

    fn row_to_location(row: &rusqlite::Row) -> rusqlite::Result<Location> {
        Ok(Location {
            id: row.get("id")?,
            precision: row.get("precision")?,
            lat_units: row.get("lat_units")?,
            lon_units: row.get("lon_units")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
            created: row.get::<_, Option<i64>>("created")?.unwrap_or_default(),
        })
    }

    fn row_to_counter(row: &rusqlite::Row) -> rusqlite::Result<StreamCounter> {
        let kind_str: String = row.get("kind")?;
        let local_track_id: Option<i64> = row.get("local_track_id")?;
        let external_track_id: Option<String> = row.get("external_track_id")?;

        let subject = match (StreamKind::parse(&kind_str), local_track_id, external_track_id) {
            (Some(StreamKind::Local), Some(id), _) => SubjectRef::Local(id),
            (Some(StreamKind::External), _, Some(id)) => SubjectRef::External(id),
            _ => {
                return Err(rusqlite::Error::FromSqlConversionFailure(
                    3,
                    Type::Text,
                    format!("Malformed subject for stream counter of kind '{}'", kind_str).into(),
                ))
            }
        };

        Ok(StreamCounter {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            location_id: row.get("location_id")?,
            subject,
            play_count: row.get("play_count")?,
            first_played: row.get("first_played")?,
            last_played: row.get("last_played")?,
        })
    }

    fn sort_by_count(counters: &mut [StreamCounter]) {
        counters.sort_by(|a, b| b.play_count.cmp(&a.play_count).then(a.id.cmp(&b.id)));
    }
}

impl StreamStore for SqliteStreamStore {
    fn get_or_create_location(&self, bucket: &Bucket) -> Result<Location> {
        let (lat_units, lon_units) = bucket.grid_units();
        let conn = self.lock()?;

        let inserted = conn
            .execute(
                "INSERT INTO location (precision, lat_units, lon_units, latitude, longitude)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(lat_units, lon_units) DO NOTHING",
                params![
                    bucket.precision,
                    lat_units,
                    lon_units,
                    bucket.latitude(),
                    bucket.longitude()
                ],
            )
            .context("Failed to insert location")?;
        if inserted > 0 {
            debug!(
                "Created location ({}, {}) at precision {}",
                bucket.latitude(),
                bucket.longitude(),
                bucket.precision
            );
        }

        conn.query_row(
            &format!(
                "SELECT {} FROM location WHERE lat_units = ?1 AND lon_units = ?2",
                LOCATION_COLUMNS
            ),
            params![lat_units, lon_units],
            Self::row_to_location,
        )
        .context("Failed to read back location")
    }

    fn lookup_location(&self, bucket: &Bucket) -> Result<Option<Location>> {
        let (lat_units, lon_units) = bucket.grid_units();
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM location WHERE lat_units = ?1 AND lon_units = ?2",
                LOCATION_COLUMNS
            ),
            params![lat_units, lon_units],
            Self::row_to_location,
        )
        .optional()
        .context("Failed to look up location")
    }

    fn locations_in_bucket(&self, bucket: &Bucket) -> Result<Vec<Location>> {
        let (lat_span, lon_span) = bucket.grid_span();
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM location
             WHERE lat_units BETWEEN ?1 AND ?2 AND lon_units BETWEEN ?3 AND ?4
             ORDER BY id",
            LOCATION_COLUMNS
        ))?;
        let locations = stmt
            .query_map(
                params![
                    lat_span.start(),
                    lat_span.end(),
                    lon_span.start(),
                    lon_span.end()
                ],
                Self::row_to_location,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read locations in bucket")?;
        Ok(locations)
    }

    fn locations_in_box(&self, bbox: &BoundingBox) -> Result<Vec<Location>> {
        let (lat_range, lon_range) = bbox.grid_ranges();
        if lat_range.is_empty() || lon_range.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM location
             WHERE lat_units BETWEEN ?1 AND ?2 AND lon_units BETWEEN ?3 AND ?4
             ORDER BY id",
            LOCATION_COLUMNS
        ))?;
        let locations = stmt
            .query_map(
                params![
                    lat_range.start(),
                    lat_range.end(),
                    lon_range.start(),
                    lon_range.end()
                ],
                Self::row_to_location,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read locations in bounding box")?;
        Ok(locations)
    }

    fn location_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM location", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    fn add_plays(
        &self,
        user_id: i64,
        location_id: i64,
        subject: &SubjectRef,
        plays: i64,
    ) -> Result<Option<(UpsertOutcome, i64)>> {
        if plays < 1 {
            bail!("Play count increment must be positive, got {}", plays);
        }
        let now = Utc::now().timestamp();
        let conn = self.lock()?;

        // An existing counter keeps the location it was first recorded at. The
        // WHERE guard skips the update, returning no row, when the sum would
        // leave the INTEGER range.
        let play_count: Option<i64> = conn
            .query_row(
                "INSERT INTO stream_counter
                    (user_id, location_id, kind, local_track_id, external_track_id,
                     subject_key, play_count, first_played, last_played)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT(user_id, kind, subject_key) DO UPDATE SET
                    play_count = play_count + excluded.play_count,
                    last_played = excluded.last_played
                 WHERE stream_counter.play_count <= 9223372036854775807 - excluded.play_count
                 RETURNING play_count",
                params![
                    user_id,
                    location_id,
                    subject.kind().as_str(),
                    subject.local_track_id(),
                    subject.external_track_id(),
                    subject.key(),
                    plays,
                    now
                ],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| {
                format!(
                    "Failed to record {} plays of {:?} for user {}",
                    plays, subject, user_id
                )
            })?;

        let Some(play_count) = play_count else {
            warn!(
                "Play count of {:?} for user {} would overflow, left unchanged",
                subject, user_id
            );
            return Ok(None);
        };
        let outcome = if play_count == plays {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Incremented
        };
        Ok(Some((outcome, play_count)))
    }

    fn get_counter(&self, user_id: i64, subject: &SubjectRef) -> Result<Option<StreamCounter>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM stream_counter c
                 WHERE c.user_id = ?1 AND c.kind = ?2 AND c.subject_key = ?3",
                COUNTER_COLUMNS
            ),
            params![user_id, subject.kind().as_str(), subject.key()],
            Self::row_to_counter,
        )
        .optional()
        .context("Failed to read stream counter")
    }

    fn counters_in_bucket(&self, bucket: &Bucket, kind: StreamKind) -> Result<Vec<StreamCounter>> {
        let (lat_span, lon_span) = bucket.grid_span();
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM stream_counter c
             JOIN location l ON l.id = c.location_id
             WHERE l.lat_units BETWEEN ?1 AND ?2 AND l.lon_units BETWEEN ?3 AND ?4
               AND c.kind = ?5
             ORDER BY c.play_count DESC, c.id ASC",
            COUNTER_COLUMNS
        ))?;
        let counters = stmt
            .query_map(
                params![
                    lat_span.start(),
                    lat_span.end(),
                    lon_span.start(),
                    lon_span.end(),
                    kind.as_str()
                ],
                Self::row_to_counter,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read counters in bucket")?;
        Ok(counters)
    }

    fn counters_at_locations(
        &self,
        location_ids: &[i64],
        kind: StreamKind,
    ) -> Result<Vec<StreamCounter>> {
        let conn = self.lock()?;
        let mut counters = Vec::new();
        for chunk in location_ids.chunks(MAX_IN_PARAMS) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM stream_counter c
                 WHERE c.kind = ? AND c.location_id IN ({})",
                COUNTER_COLUMNS, placeholders
            ))?;
            let values = std::iter::once(Value::Text(kind.as_str().to_string()))
                .chain(chunk.iter().map(|id| Value::Integer(*id)));
            let rows = stmt
                .query_map(params_from_iter(values), Self::row_to_counter)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to read counters at locations")?;
            counters.extend(rows);
        }
        Self::sort_by_count(&mut counters);
        Ok(counters)
    }

    fn top_counters(
        &self,
        kind: StreamKind,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StreamCounter>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM stream_counter c
             WHERE c.kind = ?1
             ORDER BY c.play_count DESC, c.id ASC
             LIMIT ?2 OFFSET ?3",
            COUNTER_COLUMNS
        ))?;
        let counters = stmt
            .query_map(
                params![kind.as_str(), limit as i64, offset as i64],
                Self::row_to_counter,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read top counters")?;
        Ok(counters)
    }
}
