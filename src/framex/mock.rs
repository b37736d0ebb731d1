use super::{FrameSource, FrameSourceError, VideoInfo};
use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};

const MOCK_VIDEO: &str = "Falcon Heavy Test Flight (Hosted Webcast)-wbSwFU6tY1c";
const MOCK_FRAMES: u64 = 61_696;
const MOCK_WIDTH: u32 = 800;
const MOCK_HEIGHT: u32 = 600;

/// Offline stand-in for FrameX: fixed metadata and solid-colour frames whose shade
/// depends on the frame index.
#[derive(Debug, Clone)]
pub struct MockFrameSource {
    info: VideoInfo,
    fail_frames: bool,
}

impl Default for MockFrameSource {
    fn default() -> Self {
        Self::with_frames(MOCK_FRAMES)
    }
}

impl MockFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same video metadata, different frame count.
    pub fn with_frames(frames: u64) -> Self {
        let url = format!(
            "https://framex.wadledot.com/api/video/{}/",
            MOCK_VIDEO.replace(' ', "%20")
        );
        Self {
            info: VideoInfo {
                name: MOCK_VIDEO.to_string(),
                width: 1280,
                height: 720,
                frames,
                frame_rate: vec![30, 1],
                first_frame: format!("{url}frame/0/"),
                last_frame: format!("{url}frame/{}/", frames.saturating_sub(1)),
                url,
            },
            fail_frames: false,
        }
    }

    /// Make every frame request fail, as a flaky image backend would.
    #[cfg(test)]
    pub fn failing_frames(mut self) -> Self {
        self.fail_frames = true;
        self
    }

    fn render(&self, index: u64) -> Result<Bytes, FrameSourceError> {
        let shade = ((index % 255) * 10 % 255) as u8;
        let img = RgbImage::from_pixel(MOCK_WIDTH, MOCK_HEIGHT, Rgb([shade, 50, 100]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, 85))
            .map_err(|source| FrameSourceError::Render { index, source })?;
        Ok(Bytes::from(out))
    }
}

#[async_trait]
impl FrameSource for MockFrameSource {
    async fn video_info(&self, video: &str) -> Result<VideoInfo, FrameSourceError> {
        tracing::debug!(video, "serving mock video info");
        Ok(self.info.clone())
    }

    async fn frame(&self, video: &str, index: u64) -> Result<Bytes, FrameSourceError> {
        tracing::debug!(video, frame = index, "generating mock frame");
        if self.fail_frames {
            return Err(FrameSourceError::Status {
                url: self.info.url.clone(),
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            });
        }
        self.render(index)
    }

    fn frame_url(&self, _video: &str, _index: u64) -> Option<String> {
        None
    }
}
