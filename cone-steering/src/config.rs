use std::{fs, path::{Path, PathBuf}};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use telemetry::conn::Framing;
use vision::PipelineConfig;

/// Top-level driver configuration. The pipeline section is handed to the
/// vision crate unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub telemetry: TelemetryConfig,
    pub debug: DebugConfig,
}

impl DriverConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;

        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    File { path: PathBuf },
    Camera { index: i32 },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Camera { index: 0 }
    }
}

/// Addresses are `host:port`. A missing address disables that channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub ground_steering_addr: Option<String>,
    pub distance_addr: Option<String>,
    pub publish_addr: Option<String>,
    pub sender_stamp: u32,
    /// `cluon` to talk to an OD4 session.
    pub framing: Framing,
    /// Recorded session (`.rec`) replayed alongside the video.
    pub recording: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Overlay images are written here when set.
    pub overlay_dir: Option<PathBuf>,
    /// Write every n-th overlay only.
    pub overlay_every: u64,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self { overlay_dir: None, overlay_every: 1 }
    }
}
