use crate::error::{StreamError, StreamResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// A track hosted in the catalog.
    Local,
    /// A track identified by a third-party provider id.
    External,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Local => "local",
            StreamKind::External => "external",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(StreamKind::Local),
            "external" => Some(StreamKind::External),
            _ => None,
        }
    }
}

/// What was played: exactly one of a catalog track or an external provider id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SubjectRef {
    Local(i64),
    External(String),
}

impl SubjectRef {
    /// Builds a subject from the two optional ids a client sends. Exactly one must
    /// be present.
    pub fn from_parts(local_track_id: Option<i64>, external_track_id: Option<String>) -> StreamResult<Self> {
        match (local_track_id, external_track_id) {
            (Some(id), None) => Ok(SubjectRef::Local(id)),
            (None, Some(id)) if id.trim().is_empty() => Err(StreamError::InvalidSubject(
                "external track id is empty".to_string(),
            )),
            (None, Some(id)) => Ok(SubjectRef::External(id)),
            (Some(_), Some(_)) => Err(StreamError::InvalidSubject(
                "both a local and an external track id were given".to_string(),
            )),
            (None, None) => Err(StreamError::InvalidSubject(
                "neither a local nor an external track id was given".to_string(),
            )),
        }
    }

    pub fn kind(&self) -> StreamKind {
        match self {
            SubjectRef::Local(_) => StreamKind::Local,
            SubjectRef::External(_) => StreamKind::External,
        }
    }

    /// Canonical, never-null key used for counter uniqueness.
    pub fn key(&self) -> String {
        match self {
            SubjectRef::Local(id) => id.to_string(),
            SubjectRef::External(id) => id.clone(),
        }
    }

    pub fn local_track_id(&self) -> Option<i64> {
        match self {
            SubjectRef::Local(id) => Some(*id),
            SubjectRef::External(_) => None,
        }
    }

    pub fn external_track_id(&self) -> Option<&str> {
        match self {
            SubjectRef::Local(_) => None,
            SubjectRef::External(id) => Some(id),
        }
    }
}

/// A canonical location, stored at the precision it was first written with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub id: i64,
    /// Precision of the bucket that first created this row.
    pub precision: u8,
    pub lat_units: i64,
    pub lon_units: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamCounter {
    pub id: i64,
    /// None once the user has been deleted.
    pub user_id: Option<i64>,
    pub location_id: Option<i64>,
    pub subject: SubjectRef,
    pub play_count: i64,
    pub first_played: i64,
    pub last_played: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Incremented,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Inserted => "inserted",
            UpsertOutcome::Incremented => "incremented",
        }
    }
}
