use crate::catalog::{LocalTrack, TrackCatalog};
use crate::stream_store::{StreamCounter, StreamKind, SubjectRef};
use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalStreamView {
    pub counter_id: i64,
    pub track_id: i64,
    pub owner_handle: Option<String>,
    pub album_id: Option<i64>,
    pub album_cover: Option<String>,
    pub title: String,
    pub audio_path: String,
    pub duration_secs: i64,
    pub play_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalStreamView {
    pub counter_id: i64,
    pub external_track_id: String,
    pub play_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewRecord {
    Local(LocalStreamView),
    External(ExternalStreamView),
}

impl ViewRecord {
    pub fn kind(&self) -> StreamKind {
        match self {
            ViewRecord::Local(_) => StreamKind::Local,
            ViewRecord::External(_) => StreamKind::External,
        }
    }

    pub fn play_count(&self) -> i64 {
        match self {
            ViewRecord::Local(view) => view.play_count,
            ViewRecord::External(view) => view.play_count,
        }
    }

    pub fn counter_id(&self) -> i64 {
        match self {
            ViewRecord::Local(view) => view.counter_id,
            ViewRecord::External(view) => view.counter_id,
        }
    }
}

/// Turns counters into display records, dropping what the caller may not see.
pub struct RankingView {
    catalog: Arc<dyn TrackCatalog>,
}

impl RankingView {
    pub fn new(catalog: Arc<dyn TrackCatalog>) -> Self {
        Self { catalog }
    }

    /// Renders `counters` in their given order. Local tracks that are private or
    /// no longer exist are left out, as are counters of another kind.
    pub fn render(&self, counters: &[StreamCounter], kind: StreamKind) -> Result<Vec<ViewRecord>> {
        let mut tracks: HashMap<i64, Option<LocalTrack>> = HashMap::new();
        let mut records = Vec::with_capacity(counters.len());

        for counter in counters {
            match (&counter.subject, kind) {
                (SubjectRef::Local(track_id), StreamKind::Local) => {
                    if !tracks.contains_key(track_id) {
                        tracks.insert(*track_id, self.catalog.get_track(*track_id)?);
                    }
                    let Some(track) = tracks.get(track_id).and_then(Option::as_ref) else {
                        continue;
                    };
                    if !track.is_public() {
                        continue;
                    }
                    records.push(ViewRecord::Local(LocalStreamView {
                        counter_id: counter.id,
                        track_id: track.id,
                        owner_handle: track.owner_handle.clone(),
                        album_id: track.album_id,
                        album_cover: track.album_cover.clone(),
                        title: track.title.clone(),
                        audio_path: track.audio_path.clone(),
                        duration_secs: track.duration_secs,
                        play_count: counter.play_count,
                    }));
                }
                (SubjectRef::External(external_id), StreamKind::External) => {
                    records.push(ViewRecord::External(ExternalStreamView {
                        counter_id: counter.id,
                        external_track_id: external_id.clone(),
                        play_count: counter.play_count,
                    }));
                }
                _ => continue,
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NewTrack, Visibility};
    use anyhow::bail;
    use std::sync::Mutex;

    /// Catalog backed by a plain map, counting lookups.
    #[derive(Default)]
    struct MapCatalog {
        tracks: HashMap<i64, LocalTrack>,
        lookups: Mutex<usize>,
    }

    impl MapCatalog {
        fn with_track(mut self, id: i64, visibility: Visibility) -> Self {
            self.tracks.insert(
                id,
                LocalTrack {
                    id,
                    owner_id: Some(1),
                    owner_handle: Some("owner".to_string()),
                    album_id: Some(3),
                    album_cover: Some("cover.jpg".to_string()),
                    title: format!("track {}", id),
                    audio_path: format!("audio/{}.mp3", id),
                    duration_secs: 180,
                    visibility,
                },
            );
            self
        }
    }

    impl TrackCatalog for MapCatalog {
        fn create_user(&self, _handle: &str) -> Result<i64> {
            bail!("read only")
        }
        fn user_exists(&self, _user_id: i64) -> Result<bool> {
            Ok(true)
        }
        fn delete_user(&self, _user_id: i64) -> Result<bool> {
            bail!("read only")
        }
        fn create_album(
            &self,
            _owner_id: i64,
            _name: &str,
            _cover_path: Option<&str>,
            _description: Option<&str>,
        ) -> Result<i64> {
            bail!("read only")
        }
        fn create_track(&self, _track: &NewTrack) -> Result<i64> {
            bail!("read only")
        }
        fn set_track_visibility(&self, _track_id: i64, _visibility: Visibility) -> Result<bool> {
            bail!("read only")
        }
        fn delete_track(&self, _track_id: i64) -> Result<bool> {
            bail!("read only")
        }
        fn get_track(&self, track_id: i64) -> Result<Option<LocalTrack>> {
            *self.lookups.lock().unwrap() += 1;
            Ok(self.tracks.get(&track_id).cloned())
        }
    }

    fn counter(id: i64, subject: SubjectRef, play_count: i64) -> StreamCounter {
        StreamCounter {
            id,
            user_id: Some(1),
            location_id: Some(1),
            subject,
            play_count,
            first_played: 0,
            last_played: 0,
        }
    }

    #[test]
    fn local_records_skip_private_and_missing_tracks() {
        let catalog = Arc::new(
            MapCatalog::default()
                .with_track(1, Visibility::Public)
                .with_track(2, Visibility::Private),
        );
        let view = RankingView::new(catalog.clone());
        let counters = vec![
            counter(10, SubjectRef::Local(2), 9),
            counter(11, SubjectRef::Local(1), 5),
            counter(12, SubjectRef::Local(404), 4),
            counter(13, SubjectRef::Local(1), 2),
        ];

        let records = view.render(&counters, StreamKind::Local).unwrap();
        assert_eq!(
            records.iter().map(ViewRecord::counter_id).collect::<Vec<_>>(),
            vec![11, 13]
        );
        let ViewRecord::Local(first) = &records[0] else {
            panic!("expected a local record");
        };
        assert_eq!(first.owner_handle.as_deref(), Some("owner"));
        assert_eq!(first.album_cover.as_deref(), Some("cover.jpg"));
        assert_eq!(first.duration_secs, 180);
        assert_eq!(first.play_count, 5);

        // One lookup per distinct track
        assert_eq!(*catalog.lookups.lock().unwrap(), 3);
    }

    #[test]
    fn external_records_need_no_catalog() {
        let catalog = Arc::new(MapCatalog::default());
        let view = RankingView::new(catalog.clone());
        let counters = vec![
            counter(1, SubjectRef::External("spotify:a".to_string()), 3),
            counter(2, SubjectRef::Local(1), 8),
        ];

        let records = view.render(&counters, StreamKind::External).unwrap();
        assert_eq!(
            records,
            vec![ViewRecord::External(ExternalStreamView {
                counter_id: 1,
                external_track_id: "spotify:a".to_string(),
                play_count: 3,
            })]
        );
        assert_eq!(*catalog.lookups.lock().unwrap(), 0);
    }

    #[test]
    fn serializes_with_type_tag() {
        let record = ViewRecord::External(ExternalStreamView {
            counter_id: 1,
            external_track_id: "x".to_string(),
            play_count: 2,
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "external");
        assert_eq!(json["play_count"], 2);
    }
}
