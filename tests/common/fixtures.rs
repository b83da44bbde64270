use audioloca_streams::{
    NewTrack, SqliteStreamStore, StreamService, StreamServiceConfig, Visibility,
};
use std::path::PathBuf;
use tempfile::TempDir;

/// A service over a fresh database file, plus a second handle on the same store.
pub struct TestEnv {
    pub service: StreamService,
    pub store: SqliteStreamStore,
    pub db_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(StreamServiceConfig::default())
    }

    pub fn with_config(config: StreamServiceConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("streams.db");
        let store = SqliteStreamStore::new(&db_path).expect("Failed to open store");
        let service =
            StreamService::with_sqlite(store.clone(), config).expect("Failed to create service");
        Self {
            service,
            store,
            db_path,
            _temp_dir: temp_dir,
        }
    }

    pub fn add_user(&self, handle: &str) -> i64 {
        self.service
            .catalog()
            .create_user(handle)
            .expect("Failed to create user")
    }
}

pub fn add_track(env: &TestEnv, owner_id: i64, title: &str, visibility: Visibility) -> i64 {
    env.service
        .catalog()
        .create_track(&NewTrack {
            owner_id,
            album_id: None,
            title: title.to_string(),
            audio_path: format!("audio/{}.mp3", title),
            duration_secs: 200,
            visibility,
        })
        .expect("Failed to create track")
}
