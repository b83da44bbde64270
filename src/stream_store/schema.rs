//! SQLite schema for the streams database.
//!
//! The catalog tables (user, album, track) live next to the stream tables so
//! that deletion cascades are enforced by foreign keys.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

// =============================================================================
// Version 1 - Catalog, locations and stream counters
// =============================================================================

const USER_TABLE_V1: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const ALBUM_TABLE_V1: Table = Table {
    name: "album",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "owner_id",
            &SqlType::Integer,
            foreign_key = Some(&ForeignKey {
                foreign_table: "user",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("cover_path", &SqlType::Text),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_album_owner", "owner_id")],
    unique_constraints: &[],
};

const TRACK_TABLE_V1: Table = Table {
    name: "track",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "owner_id",
            &SqlType::Integer,
            foreign_key = Some(&ForeignKey {
                foreign_table: "user",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!(
            "album_id",
            &SqlType::Integer,
            foreign_key = Some(&ForeignKey {
                foreign_table: "album",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::SetNull,
            })
        ),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("audio_path", &SqlType::Text, non_null = true),
        sqlite_column!(
            "duration_secs",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "visibility",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'public'")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_track_owner", "owner_id"),
        ("idx_track_album", "album_id"),
    ],
    unique_constraints: &[],
};

/// Canonical locations. Coordinates are kept as integer grid units (10^-8 degrees)
/// so that identity never depends on floating point comparison.
const LOCATION_TABLE_V1: Table = Table {
    name: "location",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("precision", &SqlType::Integer, non_null = true),
        sqlite_column!("lat_units", &SqlType::Integer, non_null = true),
        sqlite_column!("lon_units", &SqlType::Integer, non_null = true),
        sqlite_column!("latitude", &SqlType::Real, non_null = true),
        sqlite_column!("longitude", &SqlType::Real, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_location_lon_units", "lon_units")],
    unique_constraints: &[&["lat_units", "lon_units"]],
};

const STREAM_COUNTER_TABLE_V1: Table = Table {
    name: "stream_counter",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            foreign_key = Some(&ForeignKey {
                foreign_table: "user",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::SetNull,
            })
        ),
        sqlite_column!(
            "location_id",
            &SqlType::Integer,
            foreign_key = Some(&ForeignKey {
                foreign_table: "location",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::SetNull,
            })
        ),
        sqlite_column!("kind", &SqlType::Text, non_null = true),
        sqlite_column!(
            "local_track_id",
            &SqlType::Integer,
            foreign_key = Some(&ForeignKey {
                foreign_table: "track",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("external_track_id", &SqlType::Text),
        sqlite_column!("subject_key", &SqlType::Text, non_null = true),
        sqlite_column!(
            "play_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
        sqlite_column!("first_played", &SqlType::Integer, non_null = true),
        sqlite_column!("last_played", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_stream_counter_location", "location_id, kind"),
        ("idx_stream_counter_kind_count", "kind, play_count DESC"),
        ("idx_stream_counter_local_track", "local_track_id"),
    ],
    unique_constraints: &[&["user_id", "kind", "subject_key"]],
};

pub const STREAMS_SCHEMA: VersionedSchema = VersionedSchema {
    version: 1,
    tables: &[
        USER_TABLE_V1,
        ALBUM_TABLE_V1,
        TRACK_TABLE_V1,
        LOCATION_TABLE_V1,
        STREAM_COUNTER_TABLE_V1,
    ],
};
