use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub write_precision: Option<u8>,
    pub busy_timeout_ms: Option<u64>,

    pub search: Option<SearchConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// Bucket precisions tried in order, finest first.
    pub precisions: Option<Vec<u8>>,
    /// Radius of the bounding box step; 0 disables it.
    pub bounding_box_radius_m: Option<f64>,
    pub global_top_n: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
