use super::{storage_error, StreamService};
use crate::coords::normalize;
use crate::error::{StreamError, StreamResult};
use crate::metrics;
use crate::stream_store::{SubjectRef, UpsertOutcome};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordedPlay {
    pub location_id: i64,
    pub outcome: UpsertOutcome,
    pub play_count: i64,
}

impl StreamService {
    /// Records one play of `subject` by `user_id` at the given coordinate.
    ///
    /// Repeated plays of the same subject by the same user collapse into one
    /// counter, which stays attached to the location of its first play.
    pub fn record_play(
        &self,
        user_id: i64,
        latitude: f64,
        longitude: f64,
        subject: &SubjectRef,
    ) -> StreamResult<RecordedPlay> {
        self.record_plays(user_id, latitude, longitude, subject, 1)
    }

    /// Like [`StreamService::record_play`], taking the two optional track ids a
    /// client sends. Exactly one of them must be set.
    pub fn record_play_parts(
        &self,
        user_id: i64,
        latitude: f64,
        longitude: f64,
        local_track_id: Option<i64>,
        external_track_id: Option<String>,
    ) -> StreamResult<RecordedPlay> {
        let subject = SubjectRef::from_parts(local_track_id, external_track_id)?;
        self.record_play(user_id, latitude, longitude, &subject)
    }

    pub(super) fn record_plays(
        &self,
        user_id: i64,
        latitude: f64,
        longitude: f64,
        subject: &SubjectRef,
        plays: i64,
    ) -> StreamResult<RecordedPlay> {
        let bucket = normalize(latitude, longitude, self.config().write_precision)?;
        self.check_participants(user_id, subject)?;

        let location = self
            .store()
            .get_or_create_location(&bucket)
            .map_err(storage_error("get_or_create_location"))?;
        let (outcome, play_count) = self
            .store()
            .add_plays(user_id, location.id, subject, plays)
            .map_err(storage_error("add_plays"))?
            .ok_or_else(|| StreamError::PlayCountOverflow {
                user_id,
                subject: format!("{}:{}", subject.kind().as_str(), subject.key()),
            })?;

        metrics::record_stream_event(subject.kind().as_str(), outcome.as_str());
        debug!(
            "Play of {:?} by user {} at location {}: {} (count {})",
            subject,
            user_id,
            location.id,
            outcome.as_str(),
            play_count
        );

        Ok(RecordedPlay {
            location_id: location.id,
            outcome,
            play_count,
        })
    }

    fn check_participants(&self, user_id: i64, subject: &SubjectRef) -> StreamResult<()> {
        if !self
            .catalog()
            .user_exists(user_id)
            .map_err(storage_error("user_exists"))?
        {
            return Err(StreamError::UnknownUser(user_id));
        }
        if let SubjectRef::Local(track_id) = subject {
            let track = self
                .catalog()
                .get_track(*track_id)
                .map_err(storage_error("get_track"))?;
            if track.is_none() {
                return Err(StreamError::InvalidSubject(format!(
                    "local track {} does not exist",
                    track_id
                )));
            }
        }
        Ok(())
    }
}
