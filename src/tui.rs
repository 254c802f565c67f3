use crate::autostart;
use crate::config::{Settings, SettingsUpdate};
use crate::engine::{Engine, Snapshot};
use crate::models::RunState;
use crate::storage::SettingsStore;
use crate::utils::{format_duration, format_secs};
use anyhow::Result;
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

pub struct App {
    pub engine: Engine,
    pub store: SettingsStore,
    pub autostart: bool,
    pub message: Option<String>,
}

impl App {
    pub fn new(engine: Engine, store: SettingsStore, autostart: bool) -> Self {
        Self {
            engine,
            store,
            autostart,
            message: None,
        }
    }

    /// Handles one key press. Returns true when the user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let current = self.engine.settings();
        let update = match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char(' ') | KeyCode::Char('s') => {
                self.toggle()?;
                return Ok(false);
            }
            KeyCode::Char('a') => {
                self.toggle_autostart();
                return Ok(false);
            }
            KeyCode::Char('r') => {
                let defaults = Settings::default();
                SettingsUpdate {
                    frequency: Some(defaults.frequency),
                    distance: Some(defaults.distance),
                    idle_threshold: Some(defaults.idle_threshold),
                }
            }
            KeyCode::Char('f') => SettingsUpdate::nudge_frequency(&current, -0.1),
            KeyCode::Char('F') => SettingsUpdate::nudge_frequency(&current, 0.1),
            KeyCode::Char('d') => SettingsUpdate::nudge_distance(&current, -1),
            KeyCode::Char('D') => SettingsUpdate::nudge_distance(&current, 1),
            KeyCode::Char('i') => SettingsUpdate::nudge_idle_threshold(&current, -1),
            KeyCode::Char('I') => SettingsUpdate::nudge_idle_threshold(&current, 1),
            _ => return Ok(false),
        };
        self.apply(update)?;
        Ok(false)
    }

    fn toggle(&mut self) -> Result<()> {
        if self.engine.is_running() {
            self.engine.stop();
            self.message = Some("Stopped".into());
        } else {
            self.engine.start()?;
            self.message = Some("Go, Mouse, Go!".into());
        }
        Ok(())
    }

    /// Applies `update` live and persists the same change to the store.
    /// A failed save keeps the live change and is reported in the footer.
    fn apply(&mut self, update: SettingsUpdate) -> Result<()> {
        self.engine.update_settings(update)?;
        self.message = None;

        let saved = self.store.load().and_then(|stored| {
            let next = stored.with_update(&update)?;
            self.store.save(&next)
        });
        if let Err(e) = saved {
            tracing::warn!("failed to save settings: {}", e);
            self.message = Some(format!("Not saved: {}", e));
        }
        Ok(())
    }

    fn toggle_autostart(&mut self) {
        match autostart::set_enabled(!self.autostart) {
            Ok(enabled) => {
                self.autostart = enabled;
                self.message = Some(if enabled {
                    "Will run on startup".into()
                } else {
                    "Will not run on startup".into()
                });
                let saved = self.store.load().and_then(|mut s| {
                    s.run_on_startup = enabled;
                    self.store.save(&s)
                });
                if let Err(e) = saved {
                    tracing::warn!("failed to persist run_on_startup: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("autostart toggle failed: {}", e);
                self.message = Some(format!("Autostart: {}", e));
            }
        }
    }
}

pub fn run_tui(app: &mut App) -> Result<()> {
    // setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_loop(&mut terminal, app);

    // restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        let snapshot = app.engine.snapshot();
        terminal.draw(|f| draw(f, app, &snapshot))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key.code)? {
                    return Ok(());
                }
            }
        }
    }
}

pub fn draw(frame: &mut Frame, app: &App, snapshot: &Snapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(6), // Settings
            Constraint::Min(6),    // Activity
            Constraint::Length(3), // Footer
        ])
        .split(frame.size());

    draw_header(frame, chunks[0], snapshot);
    draw_settings(frame, chunks[1], app, &snapshot.settings);
    draw_activity(frame, chunks[2], snapshot);
    draw_footer(frame, chunks[3], app.message.as_deref());
}

fn draw_header(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let status = match snapshot.run_state {
        RunState::Running => Span::styled(
            RunState::Running.label(),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        RunState::Stopped => Span::styled(
            RunState::Stopped.label(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
    };

    let header = Line::from(vec![
        Span::styled(
            " CursorVibe ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        status,
        Span::raw(" | "),
        Span::raw(Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
    ]);

    let para = Paragraph::new(header).block(Block::default().borders(Borders::ALL));
    frame.render_widget(para, area);
}

fn draw_settings(frame: &mut Frame, area: Rect, app: &App, settings: &Settings) {
    let key = Style::default().fg(Color::DarkGray);
    let lines = vec![
        Line::from(vec![
            Span::raw(format!("  Check interval:  {:<8}", format_secs(settings.frequency))),
            Span::styled("[f/F]", key),
        ]),
        Line::from(vec![
            Span::raw(format!("  Distance:        {:<8}", format!("{}px", settings.distance))),
            Span::styled("[d/D]", key),
        ]),
        Line::from(vec![
            Span::raw(format!("  Idle threshold:  {:<8}", format!("{}s", settings.idle_threshold))),
            Span::styled("[i/I]", key),
        ]),
        Line::from(vec![
            Span::raw(format!(
                "  Run on startup:  {:<8}",
                if app.autostart { "yes" } else { "no" }
            )),
            Span::styled("[a]", key),
        ]),
    ];

    let block = Block::default()
        .title(Span::styled(" SETTINGS ", Style::default().add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_activity(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let (state, color) = if snapshot.is_idle {
        ("idle", Color::Yellow)
    } else {
        ("active", Color::Green)
    };

    let mut lines = vec![
        Line::from(vec![
            Span::raw("  User:        "),
            Span::styled(state, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::raw(format!(" for {}", format_duration(snapshot.idle_for))),
        ]),
        Line::raw(format!("  Moves:       {}", snapshot.moves)),
    ];

    match &snapshot.last_move {
        Some(last) => lines.push(Line::raw(format!(
            "  Last move:   {} to {} at {}",
            last.displacement,
            last.to,
            last.at.format("%H:%M:%S")
        ))),
        None => lines.push(Line::raw("  Last move:   ---")),
    }

    if snapshot.failures > 0 {
        lines.push(Line::from(Span::styled(
            format!("  Failures:    {} (see log)", snapshot.failures),
            Style::default().fg(Color::Red),
        )));
    }

    let block = Block::default()
        .title(Span::styled(" ACTIVITY ", Style::default().add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_footer(frame: &mut Frame, area: Rect, message: Option<&str>) {
    let help = "'space' start/stop | 'r' reset | 'q' quit";
    let text = match message {
        Some(msg) => format!("{} | {}", msg, help),
        None => help.to_string(),
    };
    let footer = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(footer, area);
}
