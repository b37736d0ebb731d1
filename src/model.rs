use crate::framex::VideoInfo;
use crate::session::{Progress, UserId};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub api_base: String,
    pub video: String,
    pub mock: bool,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
    pub frame_dir: PathBuf,
    pub max_width: u32,
    pub max_height: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("video name must not be empty (set --video or VIDEO_NAME)")]
    EmptyVideo,

    #[error("invalid API base {url:?}: {reason}")]
    InvalidApiBase { url: String, reason: String },

    #[error("frame size must be non-zero, got {width}x{height}")]
    ZeroFrameSize { width: u32, height: u32 },
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.video.trim().is_empty() {
            return Err(ConfigError::EmptyVideo);
        }
        if !self.mock {
            let url = reqwest::Url::parse(&self.api_base).map_err(|e| {
                ConfigError::InvalidApiBase {
                    url: self.api_base.clone(),
                    reason: e.to_string(),
                }
            })?;
            if url.cannot_be_a_base() {
                return Err(ConfigError::InvalidApiBase {
                    url: self.api_base.clone(),
                    reason: "not a hierarchical URL".into(),
                });
            }
        }
        if self.max_width == 0 || self.max_height == 0 {
            return Err(ConfigError::ZeroFrameSize {
                width: self.max_width,
                height: self.max_height,
            });
        }
        Ok(())
    }
}

/// A processed frame ready for display, or why it could not be loaded.
#[derive(Debug, Clone)]
pub enum FrameDisplay {
    Ready {
        index: u64,
        jpeg: Bytes,
        /// Where the frame was saved, if saving succeeded.
        path: Option<PathBuf>,
    },
    Unavailable {
        index: u64,
        reason: String,
    },
}

impl FrameDisplay {
    pub fn index(&self) -> u64 {
        match self {
            FrameDisplay::Ready { index, .. } | FrameDisplay::Unavailable { index, .. } => *index,
        }
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            FrameDisplay::Ready { path, .. } => path.as_deref(),
            FrameDisplay::Unavailable { .. } => None,
        }
    }
}

/// The frame currently awaiting a yes/no answer.
#[derive(Debug, Clone)]
pub struct ProbeView {
    pub progress: Progress,
    pub frame: FrameDisplay,
    pub frame_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BisectResult {
    #[serde(default)]
    pub timestamp_utc: String,
    pub user_id: UserId,
    pub video: String,
    pub total_frames: u64,
    pub found_frame: u64,
    pub steps_taken: u32,
    #[serde(default)]
    pub frame_url: Option<String>,
}

#[derive(Debug, Clone)]
pub enum BisectEvent {
    VideoLoaded {
        info: VideoInfo,
    },
    Probe(ProbeView),
    Finished {
        // Box to keep the enum small next to ProbeView.
        result: Box<BisectResult>,
        frame: FrameDisplay,
    },
    Info(InfoEvent),
}

/// Status messages emitted by the controller and rendered by the front ends.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    Message(String),
    SessionMissing,
    Restarting,
    StartFailed(String),
}

impl InfoEvent {
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::SessionMissing => "Session expired. Press r to start again.".to_string(),
            InfoEvent::Restarting => "Restarting…".to_string(),
            InfoEvent::StartFailed(reason) => format!("Could not start a search: {reason}"),
        }
    }
}
