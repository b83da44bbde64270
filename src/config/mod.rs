mod file_config;

pub use file_config::{FileConfig, SearchConfig};

use crate::stream_store::SqliteStreamStore;
use crate::streams::{SearchPolicy, StreamService, StreamServiceConfig};
use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// TOML config values override these.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub write_precision: u8,
    pub search_precisions: Vec<u8>,
    pub bounding_box_radius_m: f64,
    pub global_top_n: usize,
    pub busy_timeout_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            write_precision: 6,
            search_precisions: vec![6, 5, 4, 3, 2, 1],
            bounding_box_radius_m: 100.0,
            global_top_n: 50,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub busy_timeout: Duration,
    pub service: StreamServiceConfig,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let search = file.search.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| anyhow!("db_path must be specified via --db or in config file"))?;
        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let write_precision = file.write_precision.unwrap_or(cli.write_precision);
        let precisions = search
            .precisions
            .unwrap_or_else(|| cli.search_precisions.clone());
        let bounding_box_radius_m = search
            .bounding_box_radius_m
            .unwrap_or(cli.bounding_box_radius_m);
        let global_top_n = search.global_top_n.unwrap_or(cli.global_top_n);
        let busy_timeout_ms = file.busy_timeout_ms.unwrap_or(cli.busy_timeout_ms);

        if bounding_box_radius_m < 0.0 || !bounding_box_radius_m.is_finite() {
            bail!(
                "bounding_box_radius_m must be a non-negative number, got {}",
                bounding_box_radius_m
            );
        }
        let policy = SearchPolicy::from_precisions(&precisions, bounding_box_radius_m)
            .map_err(|e| anyhow!("Invalid search configuration: {}", e))?;
        if policy.steps().is_empty() {
            bail!("At least one search precision or a bounding box radius is required");
        }

        let service = StreamServiceConfig {
            write_precision,
            policy,
            global_top_n,
        };
        crate::coords::validate_precision(write_precision)
            .map_err(|e| anyhow!("Invalid write_precision: {}", e))?;

        Ok(Self {
            db_path,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            service,
        })
    }

    pub fn open_service(&self) -> Result<StreamService> {
        let store = SqliteStreamStore::with_busy_timeout(&self.db_path, self.busy_timeout)?;
        Ok(StreamService::with_sqlite(store, self.service.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::SearchStep;
    use std::io::Write;
    use tempfile::TempDir;

    fn cli_with_db(dir: &TempDir) -> CliConfig {
        CliConfig {
            db_path: Some(dir.path().join("streams.db")),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::resolve(&cli_with_db(&temp_dir), None).unwrap();

        assert_eq!(config.db_path, temp_dir.path().join("streams.db"));
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
        assert_eq!(config.service, StreamServiceConfig::default());
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            db_path: Some(PathBuf::from("/should/be/overridden.db")),
            ..Default::default()
        };
        let file_config = FileConfig {
            db_path: Some(temp_dir.path().join("other.db").to_string_lossy().into_owned()),
            write_precision: Some(4),
            busy_timeout_ms: Some(250),
            search: Some(SearchConfig {
                precisions: Some(vec![3, 2, 1]),
                bounding_box_radius_m: Some(0.0),
                global_top_n: Some(10),
            }),
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();
        assert_eq!(config.db_path, temp_dir.path().join("other.db"));
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert_eq!(config.service.write_precision, 4);
        assert_eq!(config.service.global_top_n, 10);
        assert_eq!(
            config.service.policy.steps(),
            &[
                SearchStep::Bucket { precision: 3 },
                SearchStep::Bucket { precision: 2 },
                SearchStep::Bucket { precision: 1 },
            ]
        );
    }

    #[test]
    fn test_resolve_requires_db_path() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("db_path"));
    }

    #[test]
    fn test_resolve_rejects_missing_directory() {
        let cli = CliConfig {
            db_path: Some(PathBuf::from("/nonexistent/dir/streams.db")),
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli, None).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_rejects_invalid_precisions() {
        let temp_dir = TempDir::new().unwrap();
        let cli = CliConfig {
            search_precisions: vec![6, 10],
            ..cli_with_db(&temp_dir)
        };
        assert!(AppConfig::resolve(&cli, None).is_err());

        let cli = CliConfig {
            write_precision: 9,
            ..cli_with_db(&temp_dir)
        };
        assert!(AppConfig::resolve(&cli, None).is_err());

        let cli = CliConfig {
            search_precisions: vec![],
            bounding_box_radius_m: 0.0,
            ..cli_with_db(&temp_dir)
        };
        assert!(AppConfig::resolve(&cli, None).is_err());

        let cli = CliConfig {
            bounding_box_radius_m: -5.0,
            ..cli_with_db(&temp_dir)
        };
        assert!(AppConfig::resolve(&cli, None).is_err());
    }

    #[test]
    fn test_load_file_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
db_path = "/data/streams.db"
write_precision = 5

[search]
precisions = [5, 3, 1]
bounding_box_radius_m = 250.0
"#
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.db_path.as_deref(), Some("/data/streams.db"));
        assert_eq!(config.write_precision, Some(5));
        assert_eq!(config.busy_timeout_ms, None);
        let search = config.search.unwrap();
        assert_eq!(search.precisions, Some(vec![5, 3, 1]));
        assert_eq!(search.bounding_box_radius_m, Some(250.0));
        assert_eq!(search.global_top_n, None);
    }

    #[test]
    fn test_load_rejects_unparseable_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "write_precision = \"six\"").unwrap();
        assert!(FileConfig::load(&path).is_err());
    }

    #[test]
    fn test_open_service() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::resolve(&cli_with_db(&temp_dir), None).unwrap();
        let service = config.open_service().unwrap();
        assert_eq!(service.config().write_precision, 6);
        assert!(temp_dir.path().join("streams.db").exists());
    }
}
