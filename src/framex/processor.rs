use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

const JPEG_QUALITY: u8 = 85;

/// Shrinks frames to a display size and re-encodes them as JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameProcessor {
    max_width: u32,
    max_height: u32,
}

impl FrameProcessor {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }

    /// Decode `data`, fit it inside the max size (aspect preserved, never enlarged) and
    /// encode it as JPEG.
    pub fn prepare(&self, data: &[u8]) -> Result<Bytes, image::ImageError> {
        let img = image::load_from_memory(data)?;
        let img = if img.width() > self.max_width || img.height() > self.max_height {
            img.resize(self.max_width, self.max_height, FilterType::Lanczos3)
        } else {
            img
        };
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))?;
        Ok(Bytes::from(out))
    }
}
