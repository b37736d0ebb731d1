//! Frame sources.
//!
//! The search engine only needs two things from the outside world: how many frames a video has,
//! and the image for a given frame. [`FrameSource`] captures that, with a real FrameX HTTP
//! client and an offline mock behind it.

mod client;
mod mock;
mod processor;

pub use client::FrameXClient;
pub use mock::MockFrameSource;
pub use processor::FrameProcessor;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Video metadata as served by the FrameX API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub frames: u64,
    pub frame_rate: Vec<u32>,
    pub url: String,
    pub first_frame: String,
    pub last_frame: String,
}

impl VideoInfo {
    /// Frames per second, when the API reports a `[num, den]` rate.
    pub fn fps(&self) -> Option<f64> {
        match self.frame_rate.as_slice() {
            [num, den] if *den != 0 => Some(f64::from(*num) / f64::from(*den)),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameSourceError {
    #[error("invalid FrameX URL {0}")]
    InvalidUrl(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to render frame {index}: {source}")]
    Render {
        index: u64,
        #[source]
        source: image::ImageError,
    },
}

/// Where video metadata and frame images come from.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn video_info(&self, video: &str) -> Result<VideoInfo, FrameSourceError>;

    /// Raw image bytes for frame `index` of `video`.
    async fn frame(&self, video: &str, index: u64) -> Result<Bytes, FrameSourceError>;

    /// Public URL of a frame, for sources that have one.
    fn frame_url(&self, video: &str, index: u64) -> Option<String>;
}
