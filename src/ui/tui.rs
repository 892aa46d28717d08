use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};

use crate::config::MonitorConfig;
use crate::core::{
    reveal_selection, AppEvent, ChangeRecord, ElapsedTimer, EventKind, KindColor, WatchController,
};

/// Records mirrored from the change log for display.
#[derive(Debug, Clone)]
pub struct AppState {
    pub records: VecDeque<ChangeRecord>,
    pub max_records: usize,
    pub elapsed_secs: u64,
    pub show_help: bool,
}

impl AppState {
    pub fn new(max_records: usize) -> Self {
        Self {
            records: VecDeque::new(),
            max_records,
            elapsed_secs: 0,
            show_help: false,
        }
    }

    /// Append a record, returning how many old rows were dropped to stay
    /// under the display cap.
    pub fn push_record(&mut self, record: ChangeRecord) -> usize {
        self.records.push_back(record);
        let mut dropped = 0;
        while self.records.len() > self.max_records {
            self.records.pop_front();
            dropped += 1;
        }
        dropped
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }
}

pub struct TuiApp {
    pub state: AppState,
    pub controller: WatchController,
    pub table_state: TableState,
    pub path_input: String,
    pub editing_path: bool,
    pub recursive: bool,
    pub status: Option<String>,
    pub should_quit: bool,
    no_color: bool,
    events: Receiver<AppEvent>,
    _timer: ElapsedTimer,
}

impl TuiApp {
    pub fn new(config: &MonitorConfig, path: Option<PathBuf>) -> Self {
        let controller = WatchController::from_config(config);
        let (tx, rx) = mpsc::channel();
        controller.log().subscribe(tx.clone());
        let timer = ElapsedTimer::start_with_sender(config.ui.tick_period(), tx);

        let path_input = path
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        Self {
            state: AppState::new(config.ui.max_display_records),
            controller,
            table_state: TableState::default(),
            editing_path: path_input.is_empty(),
            path_input,
            recursive: config.watcher.recursive,
            status: None,
            should_quit: false,
            no_color: config.ui.no_color,
            events: rx,
            _timer: timer,
        }
    }

    pub fn run<B: Backend>(mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            self.drain_events();
            terminal.draw(|f| self.ui(f))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        if self.controller.is_watching() {
            if let Err(err) = self.controller.stop() {
                tracing::warn!("Failed to stop watch on exit: {}", err);
            }
        }
        Ok(())
    }

    /// Apply everything published since the last frame.
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                AppEvent::RecordAppended(record) => {
                    let dropped = self.state.push_record(record);
                    if let Some(selected) = self.table_state.selected() {
                        self.table_state.select(selected.checked_sub(dropped));
                    }
                }
                AppEvent::LogCleared => {
                    self.state.clear();
                    self.table_state.select(None);
                }
                AppEvent::WatchStarted { root, recursive } => {
                    self.status = Some(format!(
                        "Watching {}{}",
                        root.display(),
                        if recursive { " (recursive)" } else { "" }
                    ));
                }
                AppEvent::WatchStopped { root } => {
                    self.status = Some(format!("Stopped watching {}", root.display()));
                }
                AppEvent::Tick(secs) => self.state.elapsed_secs = secs,
                AppEvent::Quit => self.should_quit = true,
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.editing_path {
            match key.code {
                KeyCode::Enter => self.editing_path = false,
                KeyCode::Esc => self.editing_path = false,
                KeyCode::Backspace => {
                    self.path_input.pop();
                }
                KeyCode::Char(c) => self.path_input.push(c),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('h') | KeyCode::F(1) => self.state.toggle_help(),
            KeyCode::Char('s') => self.toggle_watch(),
            KeyCode::Char('c') => self.controller.log().clear(),
            KeyCode::Char('e') => {
                if self.controller.is_watching() {
                    self.status = Some("Stop the watch before changing the directory".to_string());
                } else {
                    self.editing_path = true;
                }
            }
            KeyCode::Char('r') => {
                if self.controller.is_watching() {
                    self.status = Some("Stop the watch before changing recursion".to_string());
                } else {
                    self.recursive = !self.recursive;
                }
            }
            KeyCode::Char(c @ '1'..='4') => {
                let kind = EventKind::ALL[c as usize - '1' as usize];
                let enabled = self.controller.filter().toggle(kind);
                self.status = Some(format!(
                    "{} {}",
                    kind.label(),
                    if enabled { "shown" } else { "hidden" }
                ));
            }
            KeyCode::Up | KeyCode::Char('k') => self.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Home => {
                if !self.state.records.is_empty() {
                    self.table_state.select(Some(0));
                }
            }
            KeyCode::End => self.table_state.select(None),
            KeyCode::Char('o') | KeyCode::Enter => self.reveal_selected(),
            _ => {}
        }
    }

    fn toggle_watch(&mut self) {
        let result = if self.controller.is_watching() {
            self.controller.stop().map(|_| ())
        } else {
            self.controller.start(self.path_input.trim(), self.recursive).map(|_| ())
        };
        if let Err(err) = result {
            self.status = Some(err.to_string());
        }
    }

    fn select_previous(&mut self) {
        let len = self.state.records.len();
        if len == 0 {
            return;
        }
        let index = match self.table_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => len - 1,
        };
        self.table_state.select(Some(index));
    }

    fn select_next(&mut self) {
        let len = self.state.records.len();
        match self.table_state.selected() {
            // Moving past the newest row resumes following new records
            Some(i) if i + 1 >= len => self.table_state.select(None),
            Some(i) => self.table_state.select(Some(i + 1)),
            None => {}
        }
    }

    pub fn selected_records(&self) -> Vec<&ChangeRecord> {
        self.table_state
            .selected()
            .and_then(|i| self.state.records.get(i))
            .into_iter()
            .collect()
    }

    fn reveal_selected(&mut self) {
        // Selection is kept on failure
        if let Err(err) = reveal_selection(&self.selected_records()) {
            self.status = Some(err.to_string());
        }
    }

    fn ui(&mut self, f: &mut Frame) {
        if self.state.show_help {
            self.render_help(f);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Target
                Constraint::Min(5),    // Records
                Constraint::Length(3), // Status bar
            ])
            .split(f.area());

        self.render_target(f, chunks[0]);
        self.render_records(f, chunks[1]);
        self.render_status(f, chunks[2]);
    }

    fn render_target(&self, f: &mut Frame, area: Rect) {
        let state = if self.controller.is_watching() {
            Span::styled(" WATCHING ", Style::default().fg(Color::Black).bg(Color::Green))
        } else {
            Span::styled(" IDLE ", Style::default().fg(Color::Black).bg(Color::Gray))
        };

        let path_style = if self.editing_path {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        };
        let path = if self.path_input.is_empty() && !self.editing_path {
            "(press e to choose a directory)".to_string()
        } else {
            self.path_input.clone()
        };

        let mut spans = vec![
            state,
            Span::raw(" "),
            Span::styled(path, path_style),
            Span::raw("  "),
            Span::styled(
                if self.recursive { "[x] subdirectories" } else { "[ ] subdirectories" },
                Style::default().fg(Color::Cyan),
            ),
            Span::raw("  "),
        ];
        for (i, kind) in EventKind::ALL.iter().enumerate() {
            let enabled = self.controller.filter().is_enabled(*kind);
            let style = if enabled {
                self.kind_style(*kind).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
            };
            spans.push(Span::styled(format!("{}:{} ", i + 1, kind.label()), style));
        }

        let paragraph = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Directory ")
                .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        );
        f.render_widget(paragraph, area);
    }

    fn render_records(&mut self, f: &mut Frame, area: Rect) {
        let header = Row::new(vec!["#", "File", "Path", "Action", "Time"]).style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );

        let rows: Vec<Row> = self
            .state
            .records
            .iter()
            .map(|record| {
                Row::new(vec![
                    Cell::from(record.sequence.to_string()),
                    Cell::from(record.file_name.clone()),
                    Cell::from(record.full_path.display().to_string()),
                    Cell::from(record.label.clone()),
                    Cell::from(record.display_time()),
                ])
                .style(self.kind_style(record.kind))
            })
            .collect();

        // Follow the newest record unless the user picked a row
        if self.table_state.selected().is_none() {
            let visible = area.height.saturating_sub(3) as usize;
            *self.table_state.offset_mut() = self.state.records.len().saturating_sub(visible);
        }

        let title = format!(
            " Changes ({}) - s start/stop, c clear, o reveal, h help ",
            self.state.records.len()
        );
        let table = Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Percentage(25),
                Constraint::Percentage(45),
                Constraint::Length(8),
                Constraint::Length(19),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Rgb(80, 80, 80)))
                .title(title)
                .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");

        f.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn render_status(&self, f: &mut Frame, area: Rect) {
        let elapsed = crate::core::format_elapsed(self.state.elapsed_secs);
        let mut spans = vec![Span::styled(
            format!("Running {}", elapsed),
            Style::default().fg(Color::Green),
        )];
        if let Some(status) = &self.status {
            spans.push(Span::raw("  |  "));
            spans.push(Span::styled(status.clone(), Style::default().fg(Color::Yellow)));
        }

        let status = Paragraph::new(Line::from(spans))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Status ")
                    .title_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
            )
            .alignment(Alignment::Center);

        f.render_widget(status, area);
    }

    fn render_help(&self, f: &mut Frame) {
        let popup_area = self.centered_rect(80, 60, f.area());
        let key = |k: &'static str, color: Color| {
            Span::styled(k, Style::default().fg(color).add_modifier(Modifier::BOLD))
        };

        let help_text = vec![
            Line::from(vec![Span::styled(
                "WebMonitor - Directory Change Log",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(vec![key("  q, Esc     ", Color::Red), Span::raw("- Quit the application")]),
            Line::from(vec![key("  h, F1      ", Color::Green), Span::raw("- Show/hide this help")]),
            Line::from(vec![key("  e          ", Color::Yellow), Span::raw("- Edit the directory (Enter to confirm)")]),
            Line::from(vec![key("  r          ", Color::Yellow), Span::raw("- Toggle watching subdirectories")]),
            Line::from(vec![key("  s          ", Color::Yellow), Span::raw("- Start/stop watching")]),
            Line::from(vec![key("  c          ", Color::Yellow), Span::raw("- Clear the log")]),
            Line::from(vec![key("  1-4        ", Color::Magenta), Span::raw("- Show/hide created, deleted, modified, renamed")]),
            Line::from(vec![key("  ↑/k ↓/j    ", Color::Blue), Span::raw("- Select a record")]),
            Line::from(vec![key("  Home/End   ", Color::Blue), Span::raw("- First record / follow newest")]),
            Line::from(vec![key("  o, Enter   ", Color::Blue), Span::raw("- Reveal the selected file in its folder")]),
        ];

        let paragraph = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Help ")
                    .title_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: true });

        f.render_widget(Clear, popup_area);
        f.render_widget(paragraph, popup_area);
    }

    fn kind_style(&self, kind: EventKind) -> Style {
        if self.no_color {
            return Style::default();
        }
        let color = match kind.color() {
            KindColor::Green => Color::Green,
            KindColor::Red => Color::Red,
            KindColor::Orange => Color::Rgb(255, 165, 0),
            KindColor::Default => Color::Reset,
            KindColor::Gray => Color::Gray,
        };
        Style::default().fg(color)
    }

    fn centered_rect(&self, percent_x: u16, percent_y: u16, r: Rect) -> Rect {
        let popup_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ])
            .split(r);

        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ])
            .split(popup_layout[1])[1]
    }
}

pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>, io::Error> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

pub fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<(), io::Error> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()
}
