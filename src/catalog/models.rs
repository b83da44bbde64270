use serde::{Deserialize, Serialize};

/// Who can see a local track. Private tracks never show up in rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrack {
    pub owner_id: i64,
    pub album_id: Option<i64>,
    pub title: String,
    pub audio_path: String,
    pub duration_secs: i64,
    pub visibility: Visibility,
}

/// A track joined with the display data of its owner and album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalTrack {
    pub id: i64,
    pub owner_id: Option<i64>,
    pub owner_handle: Option<String>,
    pub album_id: Option<i64>,
    pub album_cover: Option<String>,
    pub title: String,
    pub audio_path: String,
    pub duration_secs: i64,
    pub visibility: Visibility,
}

impl LocalTrack {
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}
