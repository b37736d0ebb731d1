//! Frame preview drawn with half-block characters: each cell shows two vertically stacked
//! pixels, the upper as foreground and the lower as background.

use image::RgbImage;
use ratatui::{buffer::Buffer, layout::Rect, style::Color, widgets::Widget};

pub struct FramePreview<'a> {
    image: &'a RgbImage,
}

impl<'a> FramePreview<'a> {
    pub fn new(image: &'a RgbImage) -> Self {
        Self { image }
    }
}

/// Largest `(w, h)` with the image's aspect ratio that fits in `max_w` x `max_h`.
pub(crate) fn fit(img_w: u32, img_h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if img_w == 0 || img_h == 0 || max_w == 0 || max_h == 0 {
        return (0, 0);
    }
    let (iw, ih, mw, mh) = (
        u64::from(img_w),
        u64::from(img_h),
        u64::from(max_w),
        u64::from(max_h),
    );
    if iw * mh <= ih * mw {
        (((iw * mh) / ih).max(1) as u32, max_h)
    } else {
        (max_w, ((ih * mw) / iw).max(1) as u32)
    }
}

impl Widget for FramePreview<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (img_w, img_h) = self.image.dimensions();
        let (cols, rows) = fit(
            img_w,
            img_h,
            u32::from(area.width),
            u32::from(area.height) * 2,
        );
        if cols == 0 || rows == 0 {
            return;
        }

        let cell_rows = rows.div_ceil(2);
        let x0 = area.x + (area.width - cols as u16) / 2;
        let y0 = area.y + (area.height - cell_rows as u16) / 2;
        let pixel = |x: u32, y: u32| {
            let px = self.image.get_pixel(
                (x * img_w / cols).min(img_w - 1),
                (y * img_h / rows).min(img_h - 1),
            );
            Color::Rgb(px[0], px[1], px[2])
        };

        for cy in 0..cell_rows {
            for cx in 0..cols {
                let top = pixel(cx, cy * 2);
                let bottom = if cy * 2 + 1 < rows {
                    pixel(cx, cy * 2 + 1)
                } else {
                    Color::Reset
                };
                if let Some(cell) = buf.cell_mut((x0 + cx as u16, y0 + cy as u16)) {
                    cell.set_char('▀').set_fg(top).set_bg(bottom);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn fit_keeps_aspect_ratio() {
        assert_eq!(fit(800, 600, 80, 48), (64, 48));
        assert_eq!(fit(800, 450, 80, 100), (80, 45));
        assert_eq!(fit(10, 10, 0, 10), (0, 0));
    }

    #[test]
    fn renders_top_and_bottom_pixels() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(0, 1, Rgb([0, 0, 255]));
        img.put_pixel(1, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 1, Rgb([0, 0, 255]));

        let area = Rect::new(0, 0, 2, 1);
        let mut buf = Buffer::empty(area);
        FramePreview::new(&img).render(area, &mut buf);

        let cell = &buf[(0, 0)];
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
        assert_eq!(cell.bg, Color::Rgb(0, 0, 255));
    }
}
