//! Location-bucketed play-count aggregation for the audio catalog.

pub mod catalog;
pub mod config;
pub mod coords;
pub mod error;
pub mod metrics;
pub mod sqlite_persistence;
pub mod stream_store;
pub mod streams;

pub use catalog::{LocalTrack, NewTrack, TrackCatalog, Visibility};
pub use error::{StreamError, StreamResult};
pub use stream_store::{SqliteStreamStore, StreamKind, StreamStore, SubjectRef, UpsertOutcome};
pub use streams::{NearbyResult, Resolution, StreamService, StreamServiceConfig, ViewRecord};
