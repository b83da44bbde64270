//! Bulk import of pre-aggregated play counts.

use super::StreamService;
use crate::error::{StreamError, StreamResult};
use crate::stream_store::SubjectRef;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Largest `stream_count` a single seed entry may carry.
pub const MAX_SEED_STREAM_COUNT: i64 = 1_000_000_000;

/// One pre-aggregated counter. Unknown fields are ignored. `stream_count` must be
/// within `1..=MAX_SEED_STREAM_COUNT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedEntry {
    pub latitude: f64,
    pub longitude: f64,
    pub user_id: i64,
    #[serde(default)]
    pub local_track_id: Option<i64>,
    #[serde(default)]
    pub external_track_id: Option<String>,
    pub stream_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRejection {
    pub index: usize,
    pub code: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub applied: usize,
    pub rejected: Vec<SeedRejection>,
}

impl StreamService {
    pub fn seed_from_json(&self, json: &str) -> StreamResult<SeedReport> {
        let entries: Vec<SeedEntry> =
            serde_json::from_str(json).map_err(|e| StreamError::InvalidSeedData(e.to_string()))?;
        self.seed(&entries)
    }

    /// Adds each entry's count to its counter, creating counters and locations
    /// as needed. Invalid entries are skipped and reported; a storage failure
    /// stops the import.
    pub fn seed(&self, entries: &[SeedEntry]) -> StreamResult<SeedReport> {
        let mut report = SeedReport::default();
        for (index, entry) in entries.iter().enumerate() {
            match self.apply_seed_entry(entry) {
                Ok(()) => report.applied += 1,
                Err(e) if e.is_validation() => {
                    warn!("Skipping seed entry {}: {}", index, e);
                    report.rejected.push(SeedRejection {
                        index,
                        code: e.code(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            "Seeded {} entries ({} rejected)",
            report.applied,
            report.rejected.len()
        );
        Ok(report)
    }

    fn apply_seed_entry(&self, entry: &SeedEntry) -> StreamResult<()> {
        if !(1..=MAX_SEED_STREAM_COUNT).contains(&entry.stream_count) {
            return Err(StreamError::InvalidSeedData(format!(
                "stream_count must be within 1..={}, got {}",
                MAX_SEED_STREAM_COUNT, entry.stream_count
            )));
        }
        let subject =
            SubjectRef::from_parts(entry.local_track_id, entry.external_track_id.clone())?;
        self.record_plays(
            entry.user_id,
            entry.latitude,
            entry.longitude,
            &subject,
            entry.stream_count,
        )?;
        Ok(())
    }
}

/// Landmarks around Intramuros, Manila, used as demo hot spots.
const DEMO_ZONES: &[(f64, f64)] = &[
    (14.594761128970328, 120.97026952427406),
    (14.592476740948166, 120.97733923115828),
    (14.589473271883076, 120.97531260375288),
    (14.585819814762619, 120.9753461404145),
    (14.58706788661019, 120.9762008997024),
];

const DEMO_RADIUS_M: f64 = 200.0;

/// Synthetic external-track entries scattered within 200 m of a few hot spots,
/// with a long-tailed count distribution.
pub fn demo_entries<R: Rng>(rng: &mut R, user_ids: &[i64], count: usize) -> Vec<SeedEntry> {
    if user_ids.is_empty() {
        return Vec::new();
    }
    let radius_deg = DEMO_RADIUS_M / 111_320.0;
    (0..count)
        .map(|i| {
            let (lat, lon) = DEMO_ZONES[rng.random_range(0..DEMO_ZONES.len())];
            let u: f64 = rng.random_range(f64::EPSILON..=1.0);
            SeedEntry {
                latitude: lat + rng.random_range(-radius_deg..=radius_deg),
                longitude: lon + rng.random_range(-radius_deg..=radius_deg),
                user_id: user_ids[rng.random_range(0..user_ids.len())],
                local_track_id: None,
                external_track_id: Some(format!("demo:{}", i)),
                stream_count: ((1.0 / u).floor() as i64 * 10).min(10_000),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_store::{SqliteStreamStore, StreamKind};
    use crate::streams::StreamServiceConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn create_test_service() -> (StreamService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStreamStore::new(temp_dir.path().join("streams.db")).unwrap();
        let service = StreamService::with_sqlite(store, StreamServiceConfig::default()).unwrap();
        (service, temp_dir)
    }

    #[test]
    fn seeds_counts_and_reports_bad_entries() {
        let (service, _dir) = create_test_service();
        let user = service.catalog().create_user("seeder").unwrap();
        let json = format!(
            r#"[
                {{"latitude": 14.5947, "longitude": 120.9702, "user_id": {user}, "external_track_id": "a", "stream_count": 30, "zone": "North"}},
                {{"latitude": 14.5947, "longitude": 120.9702, "user_id": {user}, "external_track_id": "a", "stream_count": 5}},
                {{"latitude": 14.5947, "longitude": 120.9702, "user_id": {user}, "stream_count": 5}},
                {{"latitude": 95.0, "longitude": 120.9702, "user_id": {user}, "external_track_id": "b", "stream_count": 5}},
                {{"latitude": 14.5947, "longitude": 120.9702, "user_id": {user}, "external_track_id": "c", "stream_count": 0}}
            ]"#
        );

        let report = service.seed_from_json(&json).unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(
            report.rejected.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        assert_eq!(report.rejected[0].code, "invalid_subject");
        assert_eq!(report.rejected[1].code, "invalid_coordinate");
        assert_eq!(report.rejected[2].code, "invalid_seed_data");

        let top = service.top_streams(StreamKind::External).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].play_count(), 35);
    }

    #[test]
    fn oversized_counts_are_rejected() {
        let (service, _dir) = create_test_service();
        let user = service.catalog().create_user("seeder").unwrap();
        let entry = |stream_count| SeedEntry {
            latitude: 14.5947,
            longitude: 120.9702,
            user_id: user,
            local_track_id: None,
            external_track_id: Some("big".to_string()),
            stream_count,
        };

        let report = service
            .seed(&[
                entry(i64::MAX),
                entry(i64::MAX),
                entry(MAX_SEED_STREAM_COUNT + 1),
                entry(MAX_SEED_STREAM_COUNT),
            ])
            .unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(
            report.rejected.iter().map(|r| r.code).collect::<Vec<_>>(),
            vec!["invalid_seed_data"; 3]
        );

        let top = service.top_streams(StreamKind::External).unwrap();
        assert_eq!(top[0].play_count(), MAX_SEED_STREAM_COUNT);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let (service, _dir) = create_test_service();
        let err = service.seed_from_json("{not json").unwrap_err();
        assert_eq!(err.code(), "invalid_seed_data");
    }

    #[test]
    fn demo_entries_stay_near_zones() {
        let mut rng = StdRng::seed_from_u64(1);
        let entries = demo_entries(&mut rng, &[1, 2], 100);
        assert_eq!(entries.len(), 100);
        for entry in &entries {
            assert!(entry.stream_count >= 10);
            assert!([1, 2].contains(&entry.user_id));
            let near_zone = DEMO_ZONES.iter().any(|(lat, lon)| {
                crate::coords::haversine_m(*lat, *lon, entry.latitude, entry.longitude)
                    <= DEMO_RADIUS_M * 1.5
            });
            assert!(near_zone);
        }
        assert!(demo_entries(&mut rng, &[], 10).is_empty());
    }

    #[test]
    fn demo_entries_seed_cleanly() {
        let (service, _dir) = create_test_service();
        let user = service.catalog().create_user("demo").unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let report = service.seed(&demo_entries(&mut rng, &[user], 20)).unwrap();
        assert_eq!(report.applied, 20);
        assert!(report.rejected.is_empty());
    }
}
