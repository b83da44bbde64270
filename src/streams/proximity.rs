//! "What is popular near here": a cascade of progressively wider searches around a
//! point, ending in a global ranking when nothing nearby is visible.

use super::ranking::ViewRecord;
use super::{storage_error, StreamService};
use crate::coords::{normalize, validate_coordinate, validate_precision};
use crate::error::{StreamError, StreamResult};
use crate::metrics;
use crate::stream_store::StreamKind;
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SearchStep {
    /// Every location in the query point's bucket at this precision.
    Bucket { precision: u8 },
    /// Every location within ±radius meters of the raw query point.
    BoundingBox { radius_m: f64 },
}

/// Ordered search steps tried until one yields a visible entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPolicy {
    steps: Vec<SearchStep>,
}

impl SearchPolicy {
    pub fn new(steps: Vec<SearchStep>) -> StreamResult<Self> {
        for step in &steps {
            match step {
                SearchStep::Bucket { precision } => validate_precision(*precision)?,
                SearchStep::BoundingBox { radius_m } => {
                    if !radius_m.is_finite() || *radius_m <= 0.0 {
                        return Err(StreamError::InvalidSearchPolicy(format!(
                            "bounding box radius must be positive, got {}",
                            radius_m
                        )));
                    }
                }
            }
        }
        Ok(Self { steps })
    }

    /// Bucket steps for each precision in order, with the bounding box step (if
    /// the radius is positive) right after the first one.
    pub fn from_precisions(precisions: &[u8], bounding_box_radius_m: f64) -> StreamResult<Self> {
        let mut steps: Vec<SearchStep> = precisions
            .iter()
            .map(|&precision| SearchStep::Bucket { precision })
            .collect();
        if bounding_box_radius_m > 0.0 {
            let at = steps.len().min(1);
            steps.insert(
                at,
                SearchStep::BoundingBox {
                    radius_m: bounding_box_radius_m,
                },
            );
        }
        Self::new(steps)
    }

    pub fn steps(&self) -> &[SearchStep] {
        &self.steps
    }
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            steps: vec![
                SearchStep::Bucket { precision: 6 },
                SearchStep::BoundingBox { radius_m: 100.0 },
                SearchStep::Bucket { precision: 5 },
                SearchStep::Bucket { precision: 4 },
                SearchStep::Bucket { precision: 3 },
                SearchStep::Bucket { precision: 2 },
                SearchStep::Bucket { precision: 1 },
            ],
        }
    }
}

/// Which step answered a nearby query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    Bucket { precision: u8 },
    BoundingBox { radius_m: f64 },
    Global,
}

impl Resolution {
    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Bucket { .. } => "bucket",
            Resolution::BoundingBox { .. } => "bounding_box",
            Resolution::Global => "global",
        }
    }
}

impl From<SearchStep> for Resolution {
    fn from(step: SearchStep) -> Self {
        match step {
            SearchStep::Bucket { precision } => Resolution::Bucket { precision },
            SearchStep::BoundingBox { radius_m } => Resolution::BoundingBox { radius_m },
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Bucket { precision } => write!(f, "bucket at precision {}", precision),
            Resolution::BoundingBox { radius_m } => write!(f, "bounding box of {} m", radius_m),
            Resolution::Global => write!(f, "global ranking"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyResult {
    pub resolution: Resolution,
    pub entries: Vec<ViewRecord>,
}

impl StreamService {
    /// Ranked streams of `kind` near the point. Each configured step is tried in
    /// order and the first one with a visible entry answers; otherwise the global
    /// top list does.
    pub fn find_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        kind: StreamKind,
    ) -> StreamResult<NearbyResult> {
        validate_coordinate(latitude, longitude)?;
        let started = Instant::now();

        for step in self.config().policy.steps() {
            let counters = match *step {
                SearchStep::Bucket { precision } => {
                    let bucket = normalize(latitude, longitude, precision)?;
                    self.store()
                        .counters_in_bucket(&bucket, kind)
                        .map_err(storage_error("counters_in_bucket"))?
                }
                SearchStep::BoundingBox { radius_m } => {
                    let location_ids: Vec<i64> = self
                        .lookup_bounding_box(latitude, longitude, radius_m)?
                        .into_iter()
                        .map(|nearby| nearby.location.id)
                        .collect();
                    if location_ids.is_empty() {
                        continue;
                    }
                    self.store()
                        .counters_at_locations(&location_ids, kind)
                        .map_err(storage_error("counters_at_locations"))?
                }
            };
            if counters.is_empty() {
                continue;
            }

            let entries = self
                .ranking()
                .render(&counters, kind)
                .map_err(storage_error("render"))?;
            if !entries.is_empty() {
                let resolution = Resolution::from(*step);
                debug!(
                    "Nearby {} query at ({}, {}) answered by {} with {} entries",
                    kind.as_str(),
                    latitude,
                    longitude,
                    resolution,
                    entries.len()
                );
                metrics::record_nearby_query(kind.as_str(), resolution.label(), started.elapsed());
                return Ok(NearbyResult {
                    resolution,
                    entries,
                });
            }
        }

        let entries = self.top_streams(kind)?;
        debug!(
            "Nearby {} query at ({}, {}) fell back to the global ranking",
            kind.as_str(),
            latitude,
            longitude
        );
        metrics::record_nearby_query(kind.as_str(), Resolution::Global.label(), started.elapsed());
        Ok(NearbyResult {
            resolution: Resolution::Global,
            entries,
        })
    }

    /// The global top list of `kind`, visibility filtered, at most `global_top_n` long.
    pub fn top_streams(&self, kind: StreamKind) -> StreamResult<Vec<ViewRecord>> {
        let limit = self.config().global_top_n;
        let mut entries = Vec::new();
        let mut offset = 0;
        while limit > 0 {
            let page = self
                .store()
                .top_counters(kind, limit, offset)
                .map_err(storage_error("top_counters"))?;
            let page_len = page.len();
            entries.extend(
                self.ranking()
                    .render(&page, kind)
                    .map_err(storage_error("render"))?,
            );
            // Hidden entries may leave the list short; keep paging until full
            if entries.len() >= limit || page_len < limit {
                break;
            }
            offset += page_len;
        }
        entries.truncate(limit);
        Ok(entries)
    }
}
