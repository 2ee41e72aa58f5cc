use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::{error, info, LevelFilter};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use simplelog::{Config, WriteLogger};
use std::fs::File;
use std::io::{self, stdout};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use treescope::backend::{Backend, ScanOptions};
use treescope::flatten::{flatten, FlatRow};
use treescope::format::{format_duration, format_size, size_percentage};
use treescope::node::{FsNode, ScanResult};
use treescope::orchestrator::ScanOrchestrator;
use treescope::scanner::{ProgressReporter, ScanProgress};
use treescope::service::LocalBackend;
use treescope::store::{LoadState, TreeStore};
use treescope::window::{window, Viewport};

const OVERSCAN_ROWS: u64 = 4;
const GAUGE_WIDTH: usize = 10;
const LOG_FILE: &str = "treescope.log";
const EXPORT_FILE: &str = "treescope-export.json";

/// Lazy-loading disk usage tree explorer for the terminal.
#[derive(Parser, Debug)]
#[command(name = "treescope", version, about)]
struct Cli {
    /// Directory to scan on startup
    path: Option<PathBuf>,

    /// Maximum traversal depth
    #[arg(long)]
    max_depth: Option<u32>,

    /// Ignore files and subtrees smaller than this many bytes
    #[arg(long)]
    min_size: Option<u64>,
}

enum AppEvent {
    ScanProgress(ScanProgress),
    ScanFinished {
        seq: u64,
        result: Result<ScanResult, String>,
    },
    FetchFinished {
        id: u64,
        result: Result<Vec<FsNode>, String>,
    },
    Status(String),
}

/// One line of the list: either a real flattened row or a placeholder the
/// renderer inserts beneath an expanded directory that is loading or failed.
enum DisplayRow {
    Node(FlatRow),
    Loading { depth: usize },
    Error { depth: usize, message: String },
}

impl DisplayRow {
    fn node_id(&self) -> Option<u64> {
        match self {
            DisplayRow::Node(row) => Some(row.id),
            _ => None,
        }
    }
}

struct App {
    backend: Arc<LocalBackend>,
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,

    store: TreeStore,
    orchestrator: ScanOrchestrator,

    path_input: String,
    input_mode: bool,
    options: ScanOptions,

    scan_progress: Option<ScanProgress>,
    status: String,

    cursor: usize,
    scroll_offset: u64,

    should_quit: bool,
}

impl App {
    fn new(cli: Cli) -> Self {
        let (tx, rx) = mpsc::channel::<AppEvent>();

        let progress_tx = tx.clone();
        let reporter: ProgressReporter = Arc::new(move |progress: ScanProgress| {
            let _ = progress_tx.send(AppEvent::ScanProgress(progress));
        });

        let path = cli
            .path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            backend: Arc::new(LocalBackend::new(Some(reporter))),
            tx,
            rx,
            store: TreeStore::new(),
            orchestrator: ScanOrchestrator::new(),
            path_input: path,
            input_mode: false,
            options: ScanOptions {
                max_depth: cli.max_depth,
                min_size: cli.min_size,
            },
            scan_progress: None,
            status: String::from("Press Enter to scan, / to edit the path"),
            cursor: 0,
            scroll_offset: 0,
            should_quit: false,
        }
    }

    fn start_scan(&mut self) {
        if self.path_input.trim().is_empty() {
            self.status = "Enter a path to scan".to_string();
            return;
        }
        let path = PathBuf::from(self.path_input.trim());

        // The ticket is claimed here, before the worker spawns, so the
        // backend and the orchestrator agree on which scan is newest even
        // when workers start out of order.
        let seq = self.backend.begin_scan();
        self.orchestrator.begin(seq);
        self.scan_progress = None;
        self.status = format!("Scanning {} ...", path.display());
        info!("starting scan {} of {:?}", seq, path);

        let backend = self.backend.clone();
        let options = self.options;
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = backend
                .scan_directory(&path, options, seq)
                .map_err(|err| err.to_string());
            let _ = tx.send(AppEvent::ScanFinished { seq, result });
        });
    }

    fn spawn_fetch(&self, id: u64) {
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = backend.fetch_children(id).map_err(|err| err.to_string());
            let _ = tx.send(AppEvent::FetchFinished { id, result });
        });
    }

    fn poll_events(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(AppEvent::ScanProgress(progress)) => {
                    if self.orchestrator.is_scanning() {
                        self.scan_progress = Some(progress);
                    }
                }
                Ok(AppEvent::ScanFinished { seq, result }) => match result {
                    Ok(scan) => {
                        if let Some(applied) = self.orchestrator.complete(seq, scan) {
                            self.scan_progress = None;
                            self.install_scan(applied);
                        }
                    }
                    Err(err) => {
                        if self.orchestrator.fail(seq) {
                            self.scan_progress = None;
                            self.status = format!("Scan failed: {}", err);
                            error!("scan {} failed: {}", seq, err);
                        }
                    }
                },
                Ok(AppEvent::FetchFinished { id, result }) => match result {
                    Ok(children) => self.store.apply_children(id, children),
                    Err(err) => {
                        error!("fetch for node {} failed: {}", id, err);
                        self.store.apply_fetch_error(id, err);
                    }
                },
                Ok(AppEvent::Status(message)) => self.status = message,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn install_scan(&mut self, scan: ScanResult) {
        let summary = format!(
            "Scanned {} files, {} dirs, {} in {}",
            scan.root.num_files,
            scan.root.num_dirs,
            format_size(scan.root.size),
            format_duration(scan.elapsed_millis),
        );
        let root_id = scan.root.id;
        self.store.initialize(scan.root);
        // The scan response ships the first level; expanding the root here
        // costs no fetch and saves a keypress.
        self.store.toggle_expand(root_id);
        self.cursor = 0;
        self.scroll_offset = 0;
        self.status = summary;
    }

    fn display_rows(&self) -> Vec<DisplayRow> {
        let mut out = Vec::new();
        for row in flatten(&self.store) {
            let pending = self
                .store
                .node(row.id)
                .filter(|node| node.is_dir() && node.children.is_none())
                .filter(|_| self.store.is_expanded(row.id))
                .map(|_| self.store.load_state(row.id));

            let depth = row.depth;
            out.push(DisplayRow::Node(row));
            match pending {
                Some(LoadState::Loading) => out.push(DisplayRow::Loading { depth: depth + 1 }),
                Some(LoadState::Error(message)) => out.push(DisplayRow::Error {
                    depth: depth + 1,
                    message,
                }),
                _ => {}
            }
        }
        out
    }

    fn toggle_at_cursor(&mut self, rows: &[DisplayRow]) {
        let Some(id) = rows.get(self.cursor).and_then(DisplayRow::node_id) else {
            return;
        };
        // An expanded directory whose fetch failed retries in place instead
        // of collapsing.
        if self.store.is_expanded(id) && matches!(self.store.load_state(id), LoadState::Error(_)) {
            if let Some(request) = self.store.retry(id) {
                self.spawn_fetch(request.id);
            }
            return;
        }
        if let Some(request) = self.store.toggle_expand(id) {
            self.spawn_fetch(request.id);
        }
    }

    fn reveal_at_cursor(&mut self, rows: &[DisplayRow]) {
        let Some(id) = rows.get(self.cursor).and_then(DisplayRow::node_id) else {
            return;
        };
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            if let Err(err) = backend.reveal(id) {
                let _ = tx.send(AppEvent::Status(format!("Reveal failed: {}", err)));
            }
        });
    }

    fn export_json(&mut self) {
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let message = match backend.export_json(PathBuf::from(EXPORT_FILE).as_path(), true) {
                Ok(()) => format!("Exported to {}", EXPORT_FILE),
                Err(err) => format!("Export failed: {}", err),
            };
            let _ = tx.send(AppEvent::Status(message));
        });
    }

    fn move_cursor(&mut self, delta: isize, total: usize) {
        if total == 0 {
            self.cursor = 0;
            return;
        }
        let next = self.cursor as isize + delta;
        self.cursor = next.clamp(0, total as isize - 1) as usize;
    }

    fn ensure_cursor_visible(&mut self, viewport_height: u64) {
        if viewport_height == 0 {
            return;
        }
        let cursor = self.cursor as u64;
        if cursor < self.scroll_offset {
            self.scroll_offset = cursor;
        } else if cursor >= self.scroll_offset + viewport_height {
            self.scroll_offset = cursor + 1 - viewport_height;
        }
    }

    fn on_key(&mut self, key: KeyEvent, rows: &[DisplayRow], page: usize) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }

        if self.input_mode {
            match key.code {
                KeyCode::Enter => {
                    self.input_mode = false;
                    self.start_scan();
                }
                KeyCode::Esc => self.input_mode = false,
                KeyCode::Backspace => {
                    self.path_input.pop();
                }
                KeyCode::Char(ch) => self.path_input.push(ch),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') => self.input_mode = true,
            KeyCode::Char('r') => self.start_scan(),
            KeyCode::Char('e') => self.export_json(),
            KeyCode::Char('o') => self.reveal_at_cursor(rows),
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_at_cursor(rows),
            KeyCode::Up => self.move_cursor(-1, rows.len()),
            KeyCode::Down => self.move_cursor(1, rows.len()),
            KeyCode::PageUp => self.move_cursor(-(page as isize), rows.len()),
            KeyCode::PageDown => self.move_cursor(page as isize, rows.len()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => {
                if !rows.is_empty() {
                    self.cursor = rows.len() - 1;
                }
            }
            _ => {}
        }
    }
}

fn gauge(percent: f64) -> String {
    let filled = ((percent / 100.0) * GAUGE_WIDTH as f64).round() as usize;
    let filled = filled.min(GAUGE_WIDTH);
    format!("{}{}", "█".repeat(filled), "░".repeat(GAUGE_WIDTH - filled))
}

fn node_line(app: &App, row: &FlatRow, selected: bool) -> Line<'static> {
    let Some(node) = app.store.node(row.id) else {
        return Line::from("");
    };

    let indent = "  ".repeat(row.depth);
    let chevron = if node.is_dir() {
        if app.store.is_expanded(row.id) {
            "▾ "
        } else {
            "▸ "
        }
    } else {
        "  "
    };

    let percent = size_percentage(node.size, row.parent_size);
    let counts = if node.is_dir() {
        format!("  {} files, {} dirs", node.num_files, node.num_dirs)
    } else {
        String::new()
    };

    let name_style = if selected {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else if node.is_dir() {
        Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };

    Line::from(vec![
        Span::raw(indent),
        Span::styled(format!("{}{}", chevron, node.name), name_style),
        Span::styled(
            format!("  {}", format_size(node.size)),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(
            format!("  {} {:>5.1}%", gauge(percent), percent),
            Style::default().fg(Color::Green),
        ),
        Span::styled(counts, Style::default().fg(Color::Gray)),
    ])
}

fn placeholder_line(depth: usize, text: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::raw("  ".repeat(depth)),
        Span::styled(
            text,
            Style::default().fg(color).add_modifier(Modifier::ITALIC),
        ),
    ])
}

fn progress_status(progress: &ScanProgress) -> String {
    let mut status = format!(
        "Scanning... {} files, {} dirs, {}",
        progress.files,
        progress.dirs,
        format_size(progress.bytes)
    );
    if let Some(top) = progress.top_level_preview.first() {
        status.push_str(&format!(
            " | largest so far: {} ({})",
            top.name,
            format_size(top.size)
        ));
    }
    status
}

fn draw_ui(frame: &mut Frame, app: &mut App, rows: &[DisplayRow]) -> Rect {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(3),
        Constraint::Length(3),
    ])
    .split(frame.area());

    let input_title = if app.input_mode {
        " Path (typing) "
    } else {
        " Path "
    };
    let path_style = if app.input_mode {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    };
    frame.render_widget(
        Paragraph::new(app.path_input.as_str())
            .style(path_style)
            .block(Block::default().title(input_title).borders(Borders::ALL)),
        chunks[0],
    );

    let status_text = if app.orchestrator.is_scanning() {
        app.scan_progress
            .as_ref()
            .map(progress_status)
            .unwrap_or_else(|| "Scanning...".to_string())
    } else {
        app.status.clone()
    };
    frame.render_widget(
        Paragraph::new(status_text).block(Block::default().title(" Status ").borders(Borders::ALL)),
        chunks[1],
    );

    let list_block = Block::default().title(" Tree ").borders(Borders::ALL);
    let list_area = list_block.inner(chunks[2]);
    frame.render_widget(list_block, chunks[2]);

    app.ensure_cursor_visible(list_area.height as u64);

    // Materialize only the windowed slice of rows. Terminal rows have unit
    // height, so offsets and indices coincide.
    let viewport = Viewport::new(1, list_area.height as u64, OVERSCAN_ROWS);
    if let Some(win) = window(viewport, rows.len() as u64, app.scroll_offset) {
        let mut lines = Vec::new();
        for index in win.indices() {
            // Overscan rows outside the drawable area are skipped here; a
            // pixel-based host would render them offscreen instead.
            if index < app.scroll_offset {
                continue;
            }
            if index >= app.scroll_offset + list_area.height as u64 {
                break;
            }
            let selected = index as usize == app.cursor;
            lines.push(match &rows[index as usize] {
                DisplayRow::Node(flat) => node_line(app, flat, selected),
                DisplayRow::Loading { depth } => {
                    placeholder_line(*depth, "Loading...".to_string(), Color::Yellow)
                }
                DisplayRow::Error { depth, message } => placeholder_line(
                    *depth,
                    format!("{} (Enter on the folder retries)", message),
                    Color::Red,
                ),
            });
        }
        frame.render_widget(Paragraph::new(lines), list_area);
    } else if !app.orchestrator.is_scanning() {
        frame.render_widget(
            Paragraph::new("No scan yet. Press Enter to scan the path above.")
                .style(Style::default().fg(Color::Gray)),
            list_area,
        );
    }

    let help = Line::from(
        "Enter/Space: expand/collapse  r: rescan  /: path  e: export JSON  o: reveal  q: quit",
    );
    frame.render_widget(
        Paragraph::new(help).block(Block::default().title(" Keys ").borders(Borders::ALL)),
        chunks[3],
    );

    list_area
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> io::Result<()> {
    app.start_scan();

    loop {
        app.poll_events();

        let rows = app.display_rows();
        if app.cursor >= rows.len() && !rows.is_empty() {
            app.cursor = rows.len() - 1;
        }

        let mut list_height = 0u16;
        terminal.draw(|frame| {
            let area = draw_ui(frame, &mut app, &rows);
            list_height = area.height;
        })?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                app.on_key(key, &rows, list_height.max(1) as usize);
            }
        }
    }

    Ok(())
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    if let Ok(log_file) = File::create(LOG_FILE) {
        let _ = WriteLogger::init(LevelFilter::Info, Config::default(), log_file);
    }

    enable_raw_mode()?;
    crossterm::execute!(stdout(), EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let app_result = run_app(&mut terminal, App::new(cli));

    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use treescope::node::NodeKind;

    fn test_app() -> App {
        App::new(Cli {
            path: None,
            max_depth: None,
            min_size: None,
        })
    }

    fn dir(id: u64, name: &str) -> FsNode {
        FsNode {
            id,
            name: name.to_string(),
            kind: NodeKind::Directory,
            size: 100,
            num_files: 0,
            num_dirs: 1,
            children: None,
        }
    }

    #[test]
    fn enter_on_failed_dir_retries_without_collapsing() {
        let mut app = test_app();
        let mut root = dir(0, "root");
        root.children = Some(vec![dir(1, "docs")]);
        app.store.initialize(root);
        app.store.toggle_expand(0);

        app.store.toggle_expand(1);
        app.store
            .apply_fetch_error(1, "permission denied".to_string());

        let rows = app.display_rows();
        // root, docs, error placeholder
        assert_eq!(rows.len(), 3);
        app.cursor = 1;

        app.toggle_at_cursor(&rows);
        assert!(app.store.is_expanded(1));
        assert_eq!(app.store.load_state(1), LoadState::Loading);
    }
}
