use crate::framex::VideoInfo;
use crate::model::{BisectEvent, BisectResult, FrameDisplay, InfoEvent, ProbeView};
use image::RgbImage;

#[derive(Default)]
pub struct UiState {
    pub video: Option<VideoInfo>,
    pub probe: Option<ProbeView>,
    pub result: Option<BisectResult>,
    /// Frame shown in the preview pane: the probe, or the launch frame once found.
    pub frame: Option<FrameDisplay>,
    pub preview: Option<RgbImage>,
    pub info: String,
    pub show_help: bool,
    /// An answer or restart is in flight; further answers are ignored until it lands.
    pub awaiting: bool,
    pub auto_save: bool,
}

impl UiState {
    pub fn apply_event(&mut self, ev: BisectEvent) {
        match ev {
            BisectEvent::VideoLoaded { info } => {
                self.info = crate::text_summary::video_line(&info);
                self.video = Some(info);
                self.result = None;
            }
            BisectEvent::Probe(view) => {
                self.set_frame(view.frame.clone());
                self.probe = Some(view);
                self.awaiting = false;
            }
            BisectEvent::Finished { result, frame } => {
                self.set_frame(frame);
                self.probe = None;
                self.result = Some(*result);
                self.awaiting = false;
            }
            BisectEvent::Info(info) => {
                if !matches!(info, InfoEvent::Restarting) {
                    self.awaiting = false;
                }
                if matches!(info, InfoEvent::SessionMissing | InfoEvent::StartFailed(_)) {
                    self.probe = None;
                }
                self.info = info.to_message();
            }
        }
    }

    fn set_frame(&mut self, frame: FrameDisplay) {
        self.preview = match &frame {
            FrameDisplay::Ready { jpeg, .. } => image::load_from_memory(jpeg)
                .map(|img| img.to_rgb8())
                .ok(),
            FrameDisplay::Unavailable { .. } => None,
        };
        self.frame = Some(frame);
    }

    /// Whether a y/n key press should be sent as an answer right now.
    pub fn can_answer(&self) -> bool {
        self.probe.is_some() && self.result.is_none() && !self.awaiting
    }

    /// Forget the current search before a restart.
    pub fn reset_search(&mut self) {
        self.probe = None;
        self.result = None;
        self.frame = None;
        self.preview = None;
        self.awaiting = true;
    }
}
