//! Integration tests for recording plays and nearby lookups
//!
//! Each test runs against its own SQLite file through the public service API.

mod common;

use audioloca_streams::streams::{SearchPolicy, SeedEntry, MAX_SEED_STREAM_COUNT};
use audioloca_streams::{
    Resolution, StreamError, StreamKind, StreamServiceConfig, StreamStore, SubjectRef,
    UpsertOutcome, ViewRecord, Visibility,
};
use common::*;

fn external(id: &str) -> SubjectRef {
    SubjectRef::External(id.to_string())
}

fn counts(entries: &[ViewRecord]) -> Vec<i64> {
    entries.iter().map(ViewRecord::play_count).collect()
}

fn plaza_location_id(env: &TestEnv) -> i64 {
    env.service
        .lookup_location(PLAZA_LAT, PLAZA_LON, 6)
        .unwrap()
        .expect("plaza location exists")
        .id
}

#[test]
fn test_repeated_plays_collapse_into_one_counter() {
    let env = TestEnv::new();
    let ana = env.add_user("ana");
    let track = add_track(&env, ana, "bahay-kubo", Visibility::Public);
    let subject = SubjectRef::Local(track);

    let first = env
        .service
        .record_play(ana, PLAZA_LAT, PLAZA_LON, &subject)
        .unwrap();
    let second = env
        .service
        .record_play(ana, PLAZA_LAT, PLAZA_LON, &subject)
        .unwrap();

    assert_eq!(first.outcome, UpsertOutcome::Inserted);
    assert_eq!(second.outcome, UpsertOutcome::Incremented);
    assert_eq!(second.play_count, 2);
    assert_eq!(first.location_id, second.location_id);

    let counter = env.store.get_counter(ana, &subject).unwrap().unwrap();
    assert_eq!(counter.play_count, 2);
    assert_eq!(env.store.location_count().unwrap(), 1);
}

#[test]
fn test_neighbors_meet_in_the_bounding_box() {
    let env = TestEnv::new();
    let ana = env.add_user("ana");
    let ben = env.add_user("ben");
    let track = add_track(&env, ana, "bahay-kubo", Visibility::Public);

    env.service
        .record_play(ana, PLAZA_LAT, PLAZA_LON, &SubjectRef::Local(track))
        .unwrap();
    env.service
        .record_play(ana, PLAZA_LAT, PLAZA_LON, &SubjectRef::Local(track))
        .unwrap();
    let neighbor = env
        .service
        .record_play(ben, NEIGHBOR_LAT, PLAZA_LON, &external(EXTERNAL_TRACK))
        .unwrap();

    // Five meters apart but in different fine buckets
    assert_eq!(env.store.location_count().unwrap(), 2);

    // Own bucket answers when it holds the kind asked for
    let result = env
        .service
        .find_nearby(NEIGHBOR_LAT, PLAZA_LON, StreamKind::External)
        .unwrap();
    assert_eq!(result.resolution, Resolution::Bucket { precision: 6 });
    assert_eq!(counts(&result.entries), vec![1]);

    // Otherwise the box reaches the neighbor
    let result = env
        .service
        .find_nearby(NEIGHBOR_LAT, PLAZA_LON, StreamKind::Local)
        .unwrap();
    assert_eq!(result.resolution, Resolution::BoundingBox { radius_m: 100.0 });
    let ViewRecord::Local(view) = &result.entries[0] else {
        panic!("expected a local record");
    };
    assert_eq!(view.track_id, track);
    assert_eq!(view.owner_handle.as_deref(), Some("ana"));
    assert_eq!(view.play_count, 2);

    // A 100 m box around the first play covers both
    let nearby = env
        .service
        .lookup_bounding_box(PLAZA_LAT, PLAZA_LON, 100.0)
        .unwrap();
    let mut ids: Vec<i64> = nearby.iter().map(|n| n.location.id).collect();
    ids.sort();
    let mut expected = vec![neighbor.location_id, plaza_location_id(&env)];
    expected.sort();
    assert_eq!(ids, expected);
    assert!(nearby.iter().all(|n| n.distance_m <= 100.0));

    // A point between them with no location of its own sees both
    let nearby = env
        .service
        .lookup_bounding_box(CORNER_LAT, PLAZA_LON, 100.0)
        .unwrap();
    assert_eq!(nearby.len(), 2);
    assert_eq!(nearby[0].location.id, neighbor.location_id);
    for kind in [StreamKind::Local, StreamKind::External] {
        let result = env.service.find_nearby(CORNER_LAT, PLAZA_LON, kind).unwrap();
        assert_eq!(result.resolution, Resolution::BoundingBox { radius_m: 100.0 });
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].kind(), kind);
    }
}

#[test]
fn test_precision_cascade_stops_at_first_match() {
    let env = TestEnv::with_config(StreamServiceConfig {
        policy: SearchPolicy::from_precisions(&[3, 2, 1], 0.0).unwrap(),
        ..Default::default()
    });
    let ana = env.add_user("ana");
    env.service
        .record_play(ana, PLAZA_LAT, PLAZA_LON, &external(EXTERNAL_TRACK))
        .unwrap();

    // 14.588 differs at three decimals but rounds to 14.59 like the play
    let result = env
        .service
        .find_nearby(14.588, PLAZA_LON, StreamKind::External)
        .unwrap();
    assert_eq!(result.resolution, Resolution::Bucket { precision: 2 });
    assert_eq!(counts(&result.entries), vec![1]);

    let result = env
        .service
        .find_nearby(14.5921, 120.9731, StreamKind::External)
        .unwrap();
    assert_eq!(result.resolution, Resolution::Bucket { precision: 3 });

    let result = env
        .service
        .find_nearby(FAR_LAT, FAR_LON, StreamKind::External)
        .unwrap();
    assert_eq!(result.resolution, Resolution::Global);
    assert_eq!(counts(&result.entries), vec![1]);
}

#[test]
fn test_private_tracks_are_hidden_everywhere() {
    let env = TestEnv::new();
    let ana = env.add_user("ana");
    let hidden = add_track(&env, ana, "demo-take", Visibility::Private);
    let shown = add_track(&env, ana, "single", Visibility::Public);

    for _ in 0..3 {
        env.service
            .record_play(ana, PLAZA_LAT, PLAZA_LON, &SubjectRef::Local(hidden))
            .unwrap();
    }
    env.service
        .record_play(ana, FAR_LAT, FAR_LON, &SubjectRef::Local(shown))
        .unwrap();

    // The plaza only has a private track, so the query falls through to global
    let result = env
        .service
        .find_nearby(PLAZA_LAT, PLAZA_LON, StreamKind::Local)
        .unwrap();
    assert_eq!(result.resolution, Resolution::Global);
    assert_eq!(result.entries.len(), 1);
    let ViewRecord::Local(view) = &result.entries[0] else {
        panic!("expected a local record");
    };
    assert_eq!(view.track_id, shown);

    env.service
        .catalog()
        .set_track_visibility(hidden, Visibility::Public)
        .unwrap();
    let result = env
        .service
        .find_nearby(PLAZA_LAT, PLAZA_LON, StreamKind::Local)
        .unwrap();
    assert_eq!(result.resolution, Resolution::Bucket { precision: 6 });
    assert_eq!(counts(&result.entries), vec![3]);
}

#[test]
fn test_global_ranking_is_capped() {
    let env = TestEnv::new();
    let ana = env.add_user("ana");
    let entries: Vec<SeedEntry> = (0..60)
        .map(|i| SeedEntry {
            latitude: 10.0 + i as f64 * 0.01,
            longitude: 20.0,
            user_id: ana,
            local_track_id: None,
            external_track_id: Some(format!("ext:{}", i)),
            stream_count: i + 1,
        })
        .collect();
    let report = env.service.seed(&entries).unwrap();
    assert_eq!(report.applied, 60);

    let top = env.service.top_streams(StreamKind::External).unwrap();
    assert_eq!(top.len(), 50);
    assert_eq!(counts(&top), (11..=60).rev().collect::<Vec<i64>>());

    // Nothing near Sydney, so the nearby query falls back to the same list
    let result = env
        .service
        .find_nearby(FAR_LAT, FAR_LON, StreamKind::External)
        .unwrap();
    assert_eq!(result.resolution, Resolution::Global);
    assert_eq!(result.entries.len(), 50);
    assert_eq!(result.entries, top);
}

#[test]
fn test_global_ranking_fills_past_hidden_tracks() {
    let env = TestEnv::new();
    let ana = env.add_user("ana");
    let entries: Vec<SeedEntry> = (0..60)
        .map(|i| {
            let visibility = if i >= 50 {
                Visibility::Private
            } else {
                Visibility::Public
            };
            let track = add_track(&env, ana, &format!("track-{}", i), visibility);
            SeedEntry {
                latitude: PLAZA_LAT,
                longitude: PLAZA_LON,
                user_id: ana,
                local_track_id: Some(track),
                external_track_id: None,
                stream_count: i + 1,
            }
        })
        .collect();
    env.service.seed(&entries).unwrap();

    let top = env.service.top_streams(StreamKind::Local).unwrap();
    assert_eq!(counts(&top), (1..=50).rev().collect::<Vec<i64>>());
}

#[test]
fn test_subject_must_be_exactly_one_track() {
    let env = TestEnv::new();
    let ana = env.add_user("ana");

    let both = env.service.record_play_parts(
        ana,
        PLAZA_LAT,
        PLAZA_LON,
        Some(1),
        Some(EXTERNAL_TRACK.to_string()),
    );
    assert!(matches!(both, Err(StreamError::InvalidSubject(_))));

    let neither = env
        .service
        .record_play_parts(ana, PLAZA_LAT, PLAZA_LON, None, None);
    assert!(matches!(neither, Err(StreamError::InvalidSubject(_))));

    let missing = env
        .service
        .record_play(ana, PLAZA_LAT, PLAZA_LON, &SubjectRef::Local(999));
    assert!(matches!(missing, Err(StreamError::InvalidSubject(_))));

    let stranger = env
        .service
        .record_play(999, PLAZA_LAT, PLAZA_LON, &external(EXTERNAL_TRACK));
    assert!(matches!(stranger, Err(StreamError::UnknownUser(999))));

    // Nothing was written by the rejected plays
    assert_eq!(env.store.location_count().unwrap(), 0);
}

#[test]
fn test_deleting_a_track_removes_its_counters() {
    let env = TestEnv::new();
    let ana = env.add_user("ana");
    let track = add_track(&env, ana, "bahay-kubo", Visibility::Public);
    env.service
        .record_play(ana, PLAZA_LAT, PLAZA_LON, &SubjectRef::Local(track))
        .unwrap();

    assert!(env.service.catalog().delete_track(track).unwrap());
    assert!(env
        .store
        .get_counter(ana, &SubjectRef::Local(track))
        .unwrap()
        .is_none());
    assert_eq!(env.store.location_count().unwrap(), 1);
    assert!(env.service.top_streams(StreamKind::Local).unwrap().is_empty());
}

#[test]
fn test_deleting_a_user_keeps_anonymous_counts() {
    let env = TestEnv::new();
    let ben = env.add_user("ben");
    env.service
        .record_play(ben, PLAZA_LAT, PLAZA_LON, &external(EXTERNAL_TRACK))
        .unwrap();

    assert!(env.service.catalog().delete_user(ben).unwrap());

    let counters = env.store.top_counters(StreamKind::External, 10, 0).unwrap();
    assert_eq!(counters.len(), 1);
    assert_eq!(counters[0].user_id, None);
    assert_eq!(counters[0].play_count, 1);

    let result = env
        .service
        .find_nearby(PLAZA_LAT, PLAZA_LON, StreamKind::External)
        .unwrap();
    assert_eq!(result.resolution, Resolution::Bucket { precision: 6 });
}

#[test]
fn test_seed_json_reports_rejected_entries() {
    let env = TestEnv::new();
    let ana = env.add_user("ana");
    let json = format!(
        r#"[
            {{"latitude": {lat}, "longitude": {lon}, "user_id": {ana}, "external_track_id": "a", "stream_count": 4}},
            {{"latitude": 95.0, "longitude": {lon}, "user_id": {ana}, "external_track_id": "b", "stream_count": 1}},
            {{"latitude": {lat}, "longitude": {lon}, "user_id": {ana}, "stream_count": 2}},
            {{"latitude": {lat}, "longitude": {lon}, "user_id": {ana}, "external_track_id": "a", "stream_count": 3}}
        ]"#,
        lat = PLAZA_LAT,
        lon = PLAZA_LON,
        ana = ana,
    );

    let report = env.service.seed_from_json(&json).unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(
        report.rejected.iter().map(|r| r.index).collect::<Vec<_>>(),
        vec![1, 2]
    );

    let counter = env.store.get_counter(ana, &external("a")).unwrap().unwrap();
    assert_eq!(counter.play_count, 7);

    assert!(matches!(
        env.service.seed_from_json("not json"),
        Err(StreamError::InvalidSeedData(_))
    ));
}

#[test]
fn test_huge_seed_counts_leave_rankings_readable() {
    let env = TestEnv::new();
    let ana = env.add_user("ana");
    let huge = SeedEntry {
        latitude: PLAZA_LAT,
        longitude: PLAZA_LON,
        user_id: ana,
        local_track_id: None,
        external_track_id: Some("big".to_string()),
        stream_count: i64::MAX,
    };

    for _ in 0..2 {
        let report = env.service.seed(&[huge.clone()]).unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(report.rejected[0].code, "invalid_seed_data");
    }
    let report = env
        .service
        .seed(&[SeedEntry {
            stream_count: MAX_SEED_STREAM_COUNT,
            ..huge.clone()
        }])
        .unwrap();
    assert_eq!(report.applied, 1);

    env.service
        .record_play(ana, FAR_LAT, FAR_LON, &external(EXTERNAL_TRACK))
        .unwrap();

    let top = env.service.top_streams(StreamKind::External).unwrap();
    assert_eq!(counts(&top), vec![MAX_SEED_STREAM_COUNT, 1]);
    let result = env
        .service
        .find_nearby(PLAZA_LAT, PLAZA_LON, StreamKind::External)
        .unwrap();
    assert_eq!(result.resolution, Resolution::Bucket { precision: 6 });
    assert_eq!(counts(&result.entries), vec![MAX_SEED_STREAM_COUNT]);
}
