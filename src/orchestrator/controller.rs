//! Search lifecycle controller.
//!
//! Owns start/answer/restart handling on top of the session registry and emits events for
//! presentation layers. All collaborators are injected; nothing here is global.

use crate::framex::{FrameProcessor, FrameSource, VideoInfo};
use crate::model::{BisectEvent, BisectResult, FrameDisplay, InfoEvent, ProbeView, RunConfig};
use crate::session::{SessionRegistry, UserId};
use crate::storage::FrameStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UiCommand {
    /// Whether the launch is visible on the current frame.
    Answer(bool),
    Restart,
    Quit,
}

/// What became of an answer.
#[derive(Debug)]
pub(crate) enum AnswerOutcome {
    Next(ProbeView),
    Finished {
        result: BisectResult,
        frame: FrameDisplay,
    },
    /// No live search for this user, e.g. it already finished. Not an error.
    SessionMissing,
}

pub(crate) struct BisectController {
    registry: Arc<SessionRegistry>,
    frames: Arc<dyn FrameSource>,
    processor: FrameProcessor,
    store: FrameStore,
    video: String,
}

impl BisectController {
    pub(crate) fn new(
        registry: Arc<SessionRegistry>,
        frames: Arc<dyn FrameSource>,
        cfg: &RunConfig,
    ) -> Self {
        Self {
            registry,
            frames,
            processor: FrameProcessor::new(cfg.max_width, cfg.max_height),
            store: FrameStore::new(cfg.frame_dir.clone()),
            video: cfg.video.clone(),
        }
    }

    pub(crate) async fn video_info(&self) -> Result<VideoInfo> {
        self.frames
            .video_info(&self.video)
            .await
            .with_context(|| format!("failed to load video info for {:?}", self.video))
    }

    /// Begin a new search for `user`, replacing any search in progress.
    pub(crate) async fn start(&self, user: UserId) -> Result<(VideoInfo, ProbeView)> {
        let info = self.video_info().await?;
        let session = self
            .registry
            .create(user, info.frames)
            .context("video cannot be bisected")?;
        let progress = session.with(|s| s.progress());
        let view = self.probe_view(progress).await;
        Ok((info, view))
    }

    pub(crate) async fn answer(&self, user: UserId, has_launched: bool) -> Result<AnswerOutcome> {
        let Some(session) = self.registry.get(user) else {
            tracing::info!(%user, "answer for a user without a live search");
            return Ok(AnswerOutcome::SessionMissing);
        };

        let finished = session.with(|s| s.submit_answer(has_launched))?;
        let snapshot = session.snapshot();
        tracing::debug!(
            %user,
            frame = snapshot.current_probe(),
            bounds = ?snapshot.bounds(),
            has_launched,
            finished,
            "answer recorded"
        );

        if !finished {
            return Ok(AnswerOutcome::Next(self.probe_view(snapshot.progress()).await));
        }

        self.registry.end(user);
        let Some(found_frame) = snapshot.found_frame() else {
            anyhow::bail!("finished search for user {user} has no found frame");
        };
        tracing::info!(
            %user,
            found_frame,
            steps = snapshot.steps_taken(),
            total_frames = snapshot.total_frames(),
            "launch frame found"
        );
        let result = BisectResult {
            timestamp_utc: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            user_id: snapshot.user_id(),
            video: self.video.clone(),
            total_frames: snapshot.total_frames(),
            found_frame,
            steps_taken: snapshot.steps_taken(),
            frame_url: self.frames.frame_url(&self.video, found_frame),
        };
        let frame = self.render(found_frame).await;
        Ok(AnswerOutcome::Finished { result, frame })
    }

    pub(crate) async fn restart(&self, user: UserId) -> Result<(VideoInfo, ProbeView)> {
        self.registry.end(user);
        self.start(user).await
    }

    pub(crate) fn end(&self, user: UserId) {
        self.registry.end(user);
        if !self.registry.is_empty() {
            tracing::debug!(live_sessions = self.registry.len(), "sessions still live at shutdown");
        }
    }

    async fn probe_view(&self, progress: crate::session::Progress) -> ProbeView {
        let index = progress.current_probe;
        ProbeView {
            progress,
            frame: self.render(index).await,
            frame_url: self.frames.frame_url(&self.video, index),
        }
    }

    /// Fetch, shrink and save a frame. Failures degrade to [`FrameDisplay::Unavailable`] so the
    /// search can go on without the picture.
    async fn render(&self, index: u64) -> FrameDisplay {
        match self.fetch(index).await {
            Ok((jpeg, path)) => FrameDisplay::Ready { index, jpeg, path },
            Err(e) => {
                tracing::warn!(frame = index, error = %format!("{e:#}"), "could not load frame");
                FrameDisplay::Unavailable {
                    index,
                    reason: format!("{e:#}"),
                }
            }
        }
    }

    async fn fetch(&self, index: u64) -> Result<(bytes::Bytes, Option<std::path::PathBuf>)> {
        let raw = self.frames.frame(&self.video, index).await?;
        let processor = self.processor;
        let jpeg = tokio::task::spawn_blocking(move || processor.prepare(&raw))
            .await
            .context("frame processing task failed")?
            .with_context(|| format!("failed to process frame {index}"))?;
        let path = match self.store.save(&self.video, index, &jpeg) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(frame = index, error = %format!("{e:#}"), "could not save frame");
                None
            }
        };
        Ok((jpeg, path))
    }
}

fn emit_start(event_tx: &UnboundedSender<BisectEvent>, started: Result<(VideoInfo, ProbeView)>) {
    match started {
        Ok((info, view)) => {
            let _ = event_tx.send(BisectEvent::VideoLoaded { info });
            let _ = event_tx.send(BisectEvent::Probe(view));
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "could not start search");
            let _ = event_tx.send(BisectEvent::Info(InfoEvent::StartFailed(format!("{e:#}"))));
        }
    }
}

/// Serve one user's commands in order and emit events back to presentation layers.
///
/// Commands are handled strictly one at a time, which is what keeps answers for the same
/// session from racing each other.
pub(crate) async fn run_controller(
    controller: BisectController,
    user: UserId,
    event_tx: UnboundedSender<BisectEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    emit_start(&event_tx, controller.start(user).await);

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            UiCommand::Answer(has_launched) => match controller.answer(user, has_launched).await {
                Ok(AnswerOutcome::Next(view)) => {
                    let _ = event_tx.send(BisectEvent::Probe(view));
                }
                Ok(AnswerOutcome::Finished { result, frame }) => {
                    let _ = event_tx.send(BisectEvent::Finished {
                        result: Box::new(result),
                        frame,
                    });
                }
                Ok(AnswerOutcome::SessionMissing) => {
                    let _ = event_tx.send(BisectEvent::Info(InfoEvent::SessionMissing));
                }
                Err(e) => {
                    tracing::error!(%user, error = %format!("{e:#}"), "answer failed");
                    let _ = event_tx.send(BisectEvent::Info(InfoEvent::Message(format!(
                        "Internal error: {e:#}"
                    ))));
                }
            },
            UiCommand::Restart => {
                let _ = event_tx.send(BisectEvent::Info(InfoEvent::Restarting));
                emit_start(&event_tx, controller.restart(user).await);
            }
            UiCommand::Quit => break,
        }
    }

    controller.end(user);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framex::MockFrameSource;
    use std::path::Path;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const USER: UserId = UserId(11);

    fn config(frame_dir: &Path) -> RunConfig {
        RunConfig {
            api_base: "https://framex.example.com/api/".into(),
            video: "mock video".into(),
            mock: true,
            request_timeout: Duration::from_secs(1),
            max_retries: 0,
            user_agent: "launch-bisect/test".into(),
            frame_dir: frame_dir.to_path_buf(),
            max_width: 160,
            max_height: 120,
        }
    }

    fn controller(source: MockFrameSource, frame_dir: &Path) -> (BisectController, Arc<SessionRegistry>) {
        let registry = Arc::new(SessionRegistry::new());
        let controller = BisectController::new(registry.clone(), Arc::new(source), &config(frame_dir));
        (controller, registry)
    }

    #[tokio::test]
    async fn start_shows_first_probe_and_saves_it() {
        let tmp = tempfile::tempdir().unwrap();
        let (controller, registry) = controller(MockFrameSource::with_frames(100), tmp.path());

        let (info, view) = controller.start(USER).await.unwrap();
        assert_eq!(info.frames, 100);
        assert_eq!(view.progress.current_probe, 49);
        assert_eq!(view.frame.index(), 49);
        let path = view.frame.path().unwrap();
        assert!(path.starts_with(tmp.path()));
        let img = image::load_from_memory(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!((img.width(), img.height()), (160, 120));
        assert!(registry.get(USER).is_some());
    }

    #[tokio::test]
    async fn answers_converge_on_launch_frame_and_end_session() {
        let tmp = tempfile::tempdir().unwrap();
        let (controller, registry) = controller(MockFrameSource::with_frames(1_000), tmp.path());
        let launch_at = 637;

        let (_, mut view) = controller.start(USER).await.unwrap();
        let (result, frame) = loop {
            let launched = view.progress.current_probe >= launch_at;
            match controller.answer(USER, launched).await.unwrap() {
                AnswerOutcome::Next(next) => view = next,
                AnswerOutcome::Finished { result, frame } => break (result, frame),
                AnswerOutcome::SessionMissing => panic!("session vanished"),
            }
        };

        assert_eq!(result.found_frame, launch_at);
        assert_eq!(result.total_frames, 1_000);
        assert_eq!(result.user_id, USER);
        assert!(result.steps_taken <= 10);
        assert_eq!(frame.index(), launch_at);
        assert!(registry.get(USER).is_none());
    }

    #[tokio::test]
    async fn answer_without_session_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let (controller, _) = controller(MockFrameSource::with_frames(10), tmp.path());
        assert!(matches!(
            controller.answer(USER, true).await.unwrap(),
            AnswerOutcome::SessionMissing
        ));
    }

    #[tokio::test]
    async fn frame_failures_do_not_block_the_search() {
        let tmp = tempfile::tempdir().unwrap();
        let (controller, _) =
            controller(MockFrameSource::with_frames(4).failing_frames(), tmp.path());

        let (_, view) = controller.start(USER).await.unwrap();
        assert!(matches!(view.frame, FrameDisplay::Unavailable { index: 1, .. }));
        assert!(matches!(
            controller.answer(USER, false).await.unwrap(),
            AnswerOutcome::Next(_)
        ));
    }

    #[tokio::test]
    async fn zero_frame_video_fails_to_start() {
        let tmp = tempfile::tempdir().unwrap();
        let (controller, registry) = controller(MockFrameSource::with_frames(0), tmp.path());
        let err = controller.start(USER).await.unwrap_err();
        assert!(format!("{err:#}").contains("at least one frame"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn restart_replaces_progress() {
        let tmp = tempfile::tempdir().unwrap();
        let (controller, registry) = controller(MockFrameSource::with_frames(64), tmp.path());
        controller.start(USER).await.unwrap();
        controller.answer(USER, true).await.unwrap();
        assert_eq!(registry.get(USER).unwrap().snapshot().steps_taken(), 2);

        let (_, view) = controller.restart(USER).await.unwrap();
        assert_eq!(view.progress.steps_taken, 1);
        assert_eq!(registry.get(USER).unwrap().snapshot().bounds(), (0, 63));
    }

    #[tokio::test]
    async fn dispatch_loop_serves_commands_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let (controller, registry) = controller(MockFrameSource::with_frames(1), tmp.path());
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        cmd_tx.send(UiCommand::Answer(false)).unwrap();
        cmd_tx.send(UiCommand::Answer(true)).unwrap();
        cmd_tx.send(UiCommand::Quit).unwrap();
        run_controller(controller, USER, event_tx, cmd_rx).await.unwrap();

        let mut events = Vec::new();
        while let Ok(ev) = event_rx.try_recv() {
            events.push(ev);
        }
        assert!(matches!(events[0], BisectEvent::VideoLoaded { .. }));
        assert!(matches!(events[1], BisectEvent::Probe(_)));
        match &events[2] {
            BisectEvent::Finished { result, .. } => assert_eq!(result.found_frame, 0),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(
            events[3],
            BisectEvent::Info(InfoEvent::SessionMissing)
        ));
        assert_eq!(events.len(), 4);
        assert!(registry.is_empty());
    }
}
