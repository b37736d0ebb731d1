use crate::framex::{FrameSource, FrameXClient, MockFrameSource};
use crate::logging::{init_logging, LogConfig, LogFormat};
use crate::model::{BisectEvent, BisectResult, RunConfig};
use crate::orchestrator::{self, BisectController, UiCommand};
use crate::session::{SessionRegistry, UserId};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "launch-bisect",
    version,
    about = "Find the exact frame a rocket launches by bisecting a video with yes/no answers"
)]
pub struct Cli {
    /// Base URL of the FrameX API
    #[arg(
        long,
        env = "API_BASE",
        default_value = "https://framex-develop-amzw3.ondigitalocean.app/api/"
    )]
    pub api_base: String,

    /// Name of the video to bisect
    #[arg(
        long,
        env = "VIDEO_NAME",
        default_value = "Falcon Heavy Test Flight (Hosted Webcast)-wbSwFU6tY1c"
    )]
    pub video: String,

    /// Serve generated frames instead of calling FrameX (offline use)
    #[arg(long)]
    pub mock: bool,

    /// Print the video metadata as JSON and exit
    #[arg(long)]
    pub info: bool,

    /// Answer on a line-based prompt instead of the TUI
    #[arg(long)]
    pub text: bool,

    /// Print the final result as JSON on stdout (prompts go to stderr)
    #[arg(long)]
    pub json: bool,

    /// Timeout for each FrameX request
    #[arg(long, default_value = "30s")]
    pub request_timeout: humantime::Duration,

    /// Retries for transient FrameX failures (network errors, 5xx, 429)
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Directory for saved frame images
    #[arg(long)]
    pub frame_dir: Option<PathBuf>,

    /// Maximum width of displayed frames
    #[arg(long, default_value_t = 800)]
    pub max_width: u32,

    /// Maximum height of displayed frames
    #[arg(long, default_value_t = 600)]
    pub max_height: u32,

    /// Identifier of the person answering
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub user_id: i64,

    /// Export the result as JSON
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Use --auto-save true or --auto-save false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_save: bool,

    /// Log filter (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Also write logs to this file (the TUI logs only here)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Whether this invocation hands the terminal to the TUI.
    pub fn is_tui(&self) -> bool {
        cfg!(feature = "tui") && !(self.info || self.text || self.json)
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    cfg.validate().context("invalid configuration")?;
    init_logging(&log_config(&args)).context("failed to initialize logging")?;

    if args.info {
        return run_info(&cfg).await;
    }

    if args.is_tui() {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args, cfg).await;
        }
    }

    run_text(args, cfg).await
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> RunConfig {
    RunConfig {
        api_base: args.api_base.clone(),
        video: args.video.clone(),
        mock: args.mock,
        request_timeout: Duration::from(args.request_timeout),
        max_retries: args.max_retries,
        user_agent: format!("launch-bisect/{}", env!("CARGO_PKG_VERSION")),
        frame_dir: args
            .frame_dir
            .clone()
            .unwrap_or_else(crate::storage::default_frame_dir),
        max_width: args.max_width,
        max_height: args.max_height,
    }
}

fn log_config(args: &Cli) -> LogConfig {
    let tui = args.is_tui();
    LogConfig {
        level: args.log_level.clone(),
        format: args.log_format,
        file: args
            .log_file
            .clone()
            .or_else(|| tui.then(crate::storage::default_log_file)),
        stderr: !tui,
    }
}

fn frame_source(cfg: &RunConfig) -> Result<Arc<dyn FrameSource>> {
    if cfg.mock {
        return Ok(Arc::new(MockFrameSource::new()));
    }
    let client = FrameXClient::new(cfg).context("failed to create FrameX client")?;
    Ok(Arc::new(client))
}

/// Wire a controller with a fresh registry and the configured frame source.
pub(crate) fn build_controller(cfg: &RunConfig) -> Result<BisectController> {
    let registry = Arc::new(SessionRegistry::new());
    Ok(BisectController::new(registry, frame_source(cfg)?, cfg))
}

async fn run_info(cfg: &RunConfig) -> Result<()> {
    let info = build_controller(cfg)?.video_info().await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Map a line of user input to a command.
pub(crate) fn parse_command(line: &str) -> Option<UiCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(UiCommand::Answer(true)),
        "n" | "no" => Some(UiCommand::Answer(false)),
        "r" | "restart" => Some(UiCommand::Restart),
        "q" | "quit" | "exit" => Some(UiCommand::Quit),
        _ => None,
    }
}

/// Read commands from stdin on a dedicated thread; EOF counts as quit.
fn spawn_input_reader(cmd_tx: mpsc::UnboundedSender<UiCommand>, out_tx: mpsc::UnboundedSender<OutputLine>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(cmd) => {
                    if cmd_tx.send(cmd).is_err() || cmd == UiCommand::Quit {
                        return;
                    }
                }
                None if line.trim().is_empty() => {}
                None => {
                    let _ = out_tx.send(OutputLine::Stderr(
                        "Please answer y (launched), n (not yet), r (restart) or q (quit)".into(),
                    ));
                }
            }
        }
        let _ = cmd_tx.send(UiCommand::Quit);
    });
}

async fn run_text(args: Cli, cfg: RunConfig) -> Result<()> {
    let controller = build_controller(&cfg)?;
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<BisectEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let user = UserId::from(args.user_id);
    let handle = tokio::spawn(orchestrator::run_controller(controller, user, evt_tx, cmd_rx));
    spawn_input_reader(cmd_tx.clone(), out_tx.clone());

    let mut last_result: Option<BisectResult> = None;
    while let Some(ev) = evt_rx.recv().await {
        match ev {
            BisectEvent::VideoLoaded { info } => {
                let _ = out_tx.send(OutputLine::Stderr(crate::text_summary::video_line(&info)));
            }
            BisectEvent::Probe(view) => {
                for line in crate::text_summary::probe_lines(&view) {
                    let _ = out_tx.send(OutputLine::Stderr(line));
                }
                let _ = out_tx.send(OutputLine::Stderr(
                    "Has the rocket launched yet? [y/n, r restart, q quit]".into(),
                ));
            }
            BisectEvent::Finished { result, frame } => {
                let summary = crate::text_summary::build_text_summary(&result, &frame);
                for line in summary.lines {
                    let line = if args.json {
                        OutputLine::Stderr(line)
                    } else {
                        OutputLine::Stdout(line)
                    };
                    let _ = out_tx.send(line);
                }
                let processed = orchestrator::process_completion(&args, &result);
                for msg in processed.messages {
                    let _ = out_tx.send(OutputLine::Stderr(msg));
                }
                if args.json {
                    let out = serde_json::to_string_pretty(&*result)?;
                    let _ = out_tx.send(OutputLine::Stdout(out));
                    let _ = cmd_tx.send(UiCommand::Quit);
                } else {
                    let _ = out_tx.send(OutputLine::Stderr(
                        "Press r to start over or q to quit.".into(),
                    ));
                }
                last_result = Some(*result);
            }
            BisectEvent::Info(info) => {
                let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
            }
        }
    }

    handle.await.context("controller task failed")??;
    drop(out_tx);
    let _ = out_handle.await;

    if args.json && last_result.is_none() {
        anyhow::bail!("search ended before a launch frame was found");
    }
    Ok(())
}
