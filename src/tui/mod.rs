mod help;
mod preview;
mod state;

use crate::cli::Cli;
use crate::model::{BisectEvent, FrameDisplay, RunConfig};
use crate::orchestrator::{self, UiCommand};
use crate::session::UserId;
use crate::text_summary::group_thousands;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use preview::FramePreview;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Terminal,
};
use state::UiState;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli, cfg: RunConfig) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<BisectEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let controller = crate::cli::build_controller(&cfg)?;
    let user = UserId::from(args.user_id);

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(args, event_rx, cmd_tx));

    let res = orchestrator::run_controller(controller, user, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    args: Cli,
    mut event_rx: UnboundedReceiver<BisectEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState {
        auto_save: args.auto_save,
        awaiting: true,
        info: "Loading video…".into(),
        ..Default::default()
    };

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();
    let mut dirty = true;

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            if let BisectEvent::Finished { result, .. } = &ev {
                let processed = orchestrator::process_completion(&args, result);
                state.apply_event(ev);
                if !processed.messages.is_empty() {
                    state.info = processed.messages.join(" | ");
                }
            } else {
                state.apply_event(ev);
            }
            dirty = true;
        }

        if dirty || last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
            dirty = false;
        }

        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                dirty = true;
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char(c @ ('y' | 'n'))) => {
                        if state.can_answer() {
                            state.awaiting = true;
                            state.info = "Loading next frame…".into();
                            let _ = cmd_tx.send(UiCommand::Answer(c == 'y'));
                        }
                    }
                    (_, KeyCode::Char('r')) => {
                        state.reset_search();
                        state.info = "Restart requested…".into();
                        let _ = cmd_tx.send(UiCommand::Restart);
                    }
                    (_, KeyCode::Char('c')) => {
                        state.info = match state.result.as_ref() {
                            Some(result) => match copy_to_clipboard(&result.found_frame.to_string())
                            {
                                Ok(()) => format!("Copied frame {}", result.found_frame),
                                Err(e) => format!("Copy failed: {e:#}"),
                            },
                            None => "Nothing to copy yet".into(),
                        };
                    }
                    (_, KeyCode::Char('?')) => {
                        state.show_help = !state.show_help;
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("open clipboard")?;
    clipboard.set_text(text).context("set clipboard text")?;
    Ok(())
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(3),
                Constraint::Length(5),
            ]
            .as_ref(),
        )
        .split(area);

    let title = state
        .video
        .as_ref()
        .map(|v| format!("launch-bisect · {}", v.name))
        .unwrap_or_else(|| "launch-bisect".into());
    let header = Paragraph::new(Line::from(vec![
        Span::styled("y", Style::default().fg(Color::Magenta)),
        Span::raw(" launched  "),
        Span::styled("n", Style::default().fg(Color::Magenta)),
        Span::raw(" not yet  "),
        Span::styled("r", Style::default().fg(Color::Magenta)),
        Span::raw(" restart  "),
        Span::styled("?", Style::default().fg(Color::Magenta)),
        Span::raw(" help  "),
        Span::styled("q", Style::default().fg(Color::Magenta)),
        Span::raw(" quit"),
    ]))
    .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(header, chunks[0]);

    if state.show_help {
        help::draw_help(chunks[1], f);
    } else {
        draw_frame(chunks[1], f, state);
    }
    draw_progress(chunks[2], f, state);
    draw_status(chunks[3], f, state);
}

fn draw_frame(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let title = match (&state.result, &state.probe) {
        (Some(result), _) => format!(
            "Launch frame {} of {}",
            group_thousands(result.found_frame),
            group_thousands(result.total_frames)
        ),
        (None, Some(view)) => format!(
            "Frame {} of {} · Has the rocket launched yet?",
            group_thousands(view.progress.current_probe),
            group_thousands(view.progress.total_frames)
        ),
        (None, None) => "Frame".into(),
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    match (&state.preview, &state.frame) {
        (Some(img), _) => f.render_widget(FramePreview::new(img), inner),
        (None, Some(FrameDisplay::Unavailable { reason, .. })) => {
            let p = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Sorry, I couldn't load this frame.",
                    Style::default().fg(Color::Red),
                )),
                Line::from(reason.as_str()),
                Line::from("You can still answer, or press r to start over."),
            ])
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
            f.render_widget(p, inner);
        }
        _ => {
            let p = Paragraph::new("Loading…").alignment(Alignment::Center);
            f.render_widget(p, inner);
        }
    }
}

fn draw_progress(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let (percent, label) = match (&state.result, &state.probe) {
        (Some(result), _) => (100, format!("Done in {} steps", result.steps_taken)),
        (None, Some(view)) => {
            let p = &view.progress;
            (
                p.progress_percent,
                format!(
                    "Step {} of ~{} · {}%",
                    p.steps_taken,
                    p.estimated_total_steps(),
                    p.progress_percent
                ),
            )
        }
        (None, None) => (0, String::new()),
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(u16::from(percent.min(100)))
        .label(label);
    f.render_widget(gauge, area);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines = Vec::new();
    if let Some(result) = &state.result {
        lines.push(Line::from(Span::styled(
            format!(
                "Launch detected at frame {}",
                group_thousands(result.found_frame)
            ),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from("Press c to copy the frame number, r to start over."));
    } else if let Some(path) = state.frame.as_ref().and_then(|fr| fr.path()) {
        lines.push(Line::from(format!("Saved: {}", path.display())));
    }
    lines.push(Line::from(state.info.as_str()));
    if !state.auto_save {
        lines.push(Line::from(Span::styled(
            "Auto-save off",
            Style::default().fg(Color::DarkGray),
        )));
    }
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}
