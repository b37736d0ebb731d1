//! Human-readable lines for text mode and the TUI.

use crate::framex::VideoInfo;
use crate::model::{BisectResult, FrameDisplay, ProbeView};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// `61696` -> `61,696`.
pub(crate) fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub(crate) fn video_line(info: &VideoInfo) -> String {
    let fps = info
        .fps()
        .map(|fps| format!(", {fps:.0} fps"))
        .unwrap_or_default();
    format!(
        "Video: {} ({}x{}, {} frames{fps})",
        info.name,
        info.width,
        info.height,
        group_thousands(info.frames)
    )
}

fn frame_line(frame: &FrameDisplay) -> String {
    let index = group_thousands(frame.index());
    match frame {
        FrameDisplay::Ready {
            path: Some(path), ..
        } => format!("Frame {index} image: {}", path.display()),
        FrameDisplay::Ready { path: None, .. } => format!("Frame {index} image: loaded (not saved)"),
        FrameDisplay::Unavailable { reason, .. } => {
            format!("Sorry, I couldn't load frame {index} ({reason})")
        }
    }
}

/// Lines describing the frame awaiting an answer.
pub(crate) fn probe_lines(view: &ProbeView) -> Vec<String> {
    let p = &view.progress;
    let mut lines = vec![
        format!(
            "Frame {} of {}",
            group_thousands(p.current_probe),
            group_thousands(p.total_frames)
        ),
        format!(
            "Step {} of ~{} | Progress: {}%",
            p.steps_taken,
            p.estimated_total_steps(),
            p.progress_percent
        ),
        frame_line(&view.frame),
    ];
    if let Some(url) = view.frame_url.as_deref() {
        lines.push(format!("URL: {url}"));
    }
    lines
}

/// Build the final summary for a finished search.
pub(crate) fn build_text_summary(result: &BisectResult, frame: &FrameDisplay) -> TextSummary {
    let mut lines = vec![
        "Analysis complete!".to_string(),
        format!("Launch frame found: {}", group_thousands(result.found_frame)),
        format!("Total steps: {}", result.steps_taken),
        format!("Total frames: {}", group_thousands(result.total_frames)),
        frame_line(frame),
    ];
    if let Some(url) = result.frame_url.as_deref() {
        lines.push(format!("URL: {url}"));
    }
    TextSummary { lines }
}
