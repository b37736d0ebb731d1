//! On-disk artifacts: processed frames and finished search results.

use crate::model::BisectResult;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "launch-bisect";

/// Default directory for saved frames.
pub fn default_frame_dir() -> PathBuf {
    base_dir(dirs::cache_dir()).join("frames")
}

/// Default log file used when the TUI owns the terminal.
pub fn default_log_file() -> PathBuf {
    base_dir(dirs::cache_dir()).join("launch-bisect.log")
}

fn runs_dir() -> PathBuf {
    base_dir(dirs::data_local_dir()).join("runs")
}

fn base_dir(root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

/// Make a string safe to use as a single file name component.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Saves processed frames as `<root>/<video>/<index>.jpg`.
#[derive(Debug, Clone)]
pub struct FrameStore {
    root: PathBuf,
}

impl FrameStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn frame_path(&self, video: &str, index: u64) -> PathBuf {
        self.root.join(sanitize(video)).join(format!("{index}.jpg"))
    }

    pub fn save(&self, video: &str, index: u64, jpeg: &[u8]) -> Result<PathBuf> {
        let path = self.frame_path(video, index);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create frame directory {}", parent.display()))?;
        }
        std::fs::write(&path, jpeg).with_context(|| format!("write frame {}", path.display()))?;
        Ok(path)
    }
}

/// Save a finished search under the data directory.
pub fn save_result(result: &BisectResult) -> Result<PathBuf> {
    save_result_in(&runs_dir(), result)
}

pub fn save_result_in(dir: &Path, result: &BisectResult) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let name = format!(
        "{}-{}.json",
        sanitize(&result.timestamp_utc),
        sanitize(&result.video)
    );
    let path = dir.join(name);
    export_json(&path, result)?;
    Ok(path)
}

pub fn export_json(path: &Path, result: &BisectResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("serialize result")?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
