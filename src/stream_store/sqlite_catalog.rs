use super::SqliteStreamStore;
use crate::catalog::{LocalTrack, NewTrack, TrackCatalog, Visibility};
use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};
use tracing::info;

fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<LocalTrack> {
    let visibility_str: String = row.get("visibility")?;
    let visibility = Visibility::parse(&visibility_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            Type::Text,
            format!("Unknown track visibility '{}'", visibility_str).into(),
        )
    })?;
    Ok(LocalTrack {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        owner_handle: row.get("owner_handle")?,
        album_id: row.get("album_id")?,
        album_cover: row.get("album_cover")?,
        title: row.get("title")?,
        audio_path: row.get("audio_path")?,
        duration_secs: row.get("duration_secs")?,
        visibility,
    })
}

impl TrackCatalog for SqliteStreamStore {
    fn create_user(&self, handle: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute("INSERT INTO user (handle) VALUES (?1)", params![handle])
            .with_context(|| format!("Failed to create user '{}'", handle))?;
        Ok(conn.last_insert_rowid())
    }

    fn user_exists(&self, user_id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM user WHERE id = ?1)",
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(exists)
    }

    fn delete_user(&self, user_id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM user WHERE id = ?1", params![user_id])
            .with_context(|| format!("Failed to delete user {}", user_id))?;
        if deleted > 0 {
            info!("Deleted user {}", user_id);
        }
        Ok(deleted > 0)
    }

    fn create_album(
        &self,
        owner_id: i64,
        name: &str,
        cover_path: Option<&str>,
        description: Option<&str>,
    ) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO album (owner_id, name, cover_path, description) VALUES (?1, ?2, ?3, ?4)",
            params![owner_id, name, cover_path, description],
        )
        .with_context(|| format!("Failed to create album '{}' for user {}", name, owner_id))?;
        Ok(conn.last_insert_rowid())
    }

    fn create_track(&self, track: &NewTrack) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO track (owner_id, album_id, title, audio_path, duration_secs, visibility)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                track.owner_id,
                track.album_id,
                track.title,
                track.audio_path,
                track.duration_secs,
                track.visibility.as_str()
            ],
        )
        .with_context(|| format!("Failed to create track '{}'", track.title))?;
        Ok(conn.last_insert_rowid())
    }

    fn set_track_visibility(&self, track_id: i64, visibility: Visibility) -> Result<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE track SET visibility = ?1 WHERE id = ?2",
            params![visibility.as_str(), track_id],
        )?;
        Ok(updated > 0)
    }

    fn delete_track(&self, track_id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM track WHERE id = ?1", params![track_id])
            .with_context(|| format!("Failed to delete track {}", track_id))?;
        Ok(deleted > 0)
    }

    fn get_track(&self, track_id: i64) -> Result<Option<LocalTrack>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT t.id, t.owner_id, u.handle AS owner_handle, t.album_id,
                    a.cover_path AS album_cover, t.title, t.audio_path, t.duration_secs,
                    t.visibility
             FROM track t
             LEFT JOIN user u ON u.id = t.owner_id
             LEFT JOIN album a ON a.id = t.album_id
             WHERE t.id = ?1",
            params![track_id],
            row_to_track,
        )
        .optional()
        .context("Failed to read track")
    }
}
