//! The slice of the media catalog that stream aggregation depends on: users,
//! albums and tracks, enough to resolve visibility and display metadata and to
//! let the database enforce deletion cascades.

mod models;

pub use models::*;

use anyhow::Result;

pub trait TrackCatalog: Send + Sync {
    fn create_user(&self, handle: &str) -> Result<i64>;
    fn user_exists(&self, user_id: i64) -> Result<bool>;
    /// Deleting a user removes their albums and tracks; their stream counters stay
    /// behind with no user attached.
    fn delete_user(&self, user_id: i64) -> Result<bool>;

    fn create_album(
        &self,
        owner_id: i64,
        name: &str,
        cover_path: Option<&str>,
        description: Option<&str>,
    ) -> Result<i64>;

    fn create_track(&self, track: &NewTrack) -> Result<i64>;
    fn set_track_visibility(&self, track_id: i64, visibility: Visibility) -> Result<bool>;
    /// Deleting a track also deletes every stream counter that references it.
    fn delete_track(&self, track_id: i64) -> Result<bool>;
    fn get_track(&self, track_id: i64) -> Result<Option<LocalTrack>>;
}
