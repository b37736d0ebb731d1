use super::{FrameSource, FrameSourceError, VideoInfo};
use crate::model::RunConfig;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, Url};
use std::time::Duration;

/// Base delay between retries; multiplied by the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// HTTP client for the FrameX API.
pub struct FrameXClient {
    http: reqwest::Client,
    base: Url,
    max_retries: u32,
}

impl FrameXClient {
    pub fn new(cfg: &RunConfig) -> Result<Self, FrameSourceError> {
        let base =
            Url::parse(&cfg.api_base).map_err(|_| FrameSourceError::InvalidUrl(cfg.api_base.clone()))?;
        if base.cannot_be_a_base() {
            return Err(FrameSourceError::InvalidUrl(cfg.api_base.clone()));
        }
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|source| FrameSourceError::Http {
                url: cfg.api_base.clone(),
                source,
            })?;
        Ok(Self {
            http,
            base,
            max_retries: cfg.max_retries,
        })
    }

    fn video_url(&self, video: &str) -> Url {
        self.endpoint(&["video", video, ""])
    }

    fn frame_endpoint(&self, video: &str, index: u64) -> Url {
        self.endpoint(&["video", video, "frame", &index.to_string(), ""])
    }

    /// Append percent-encoded path segments to the API base. A trailing empty segment keeps
    /// the trailing slash FrameX expects.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET with retries on transport errors, 5xx and 429. Other statuses fail immediately.
    async fn get(&self, url: &Url) -> Result<reqwest::Response, FrameSourceError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let reason = match self.http.get(url.clone()).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    if !is_retryable(status) || attempt > self.max_retries {
                        return Err(FrameSourceError::Status {
                            url: url.to_string(),
                            status,
                        });
                    }
                    format!("HTTP {status}")
                }
                Err(source) => {
                    if attempt > self.max_retries {
                        return Err(FrameSourceError::Http {
                            url: url.to_string(),
                            source,
                        });
                    }
                    source.to_string()
                }
            };
            tracing::warn!(%url, attempt, %reason, "FrameX request failed, retrying");
            tokio::time::sleep(retry_delay(attempt)).await;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn retry_delay(attempt: u32) -> Duration {
    RETRY_BACKOFF * attempt
}

#[async_trait]
impl FrameSource for FrameXClient {
    async fn video_info(&self, video: &str) -> Result<VideoInfo, FrameSourceError> {
        let url = self.video_url(video);
        tracing::debug!(%url, "fetching video info");
        let resp = self.get(&url).await?;
        resp.json::<VideoInfo>()
            .await
            .map_err(|source| FrameSourceError::Decode {
                url: url.to_string(),
                source,
            })
    }

    async fn frame(&self, video: &str, index: u64) -> Result<Bytes, FrameSourceError> {
        let url = self.frame_endpoint(video, index);
        tracing::debug!(%url, frame = index, "fetching frame");
        let resp = self.get(&url).await?;
        resp.bytes().await.map_err(|source| FrameSourceError::Http {
            url: url.to_string(),
            source,
        })
    }

    fn frame_url(&self, video: &str, index: u64) -> Option<String> {
        Some(self.frame_endpoint(video, index).to_string())
    }
}
