//! Interactive ConfInsights console.
//!
//! A TUI with a page sidebar (credentials, upload, column mapping,
//! results), a console output pane and a command line. Every action is a
//! slash command; Tab cycles pages, Ctrl+Left/Right cycles result tabs and
//! the mouse zooms, pans and drags graph nodes.
//!
//! Launch with `confinsights console` (or no command at all).

use std::cell::Cell;
use std::io::{self, Stdout};
use std::path::Path;
use std::time::Duration;

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell as TableCell, Paragraph, Row, Table, Tabs, Wrap},
    Frame, Terminal,
};

use ci_client::{BackendClient, CancellationToken, UploadOutcome};
use ci_protocol::{
    value_text, AnalysisFamily, BackendCredentials, ProtocolError, ResourceMetric, Role,
};
use ci_view::{Point, TableView, ZoomTrigger};

use crate::canvas;
use crate::commands::{parse_param, resolve_variant};
use crate::config::AppConfig;
use crate::nav::{MappingOutcome, NavState, Page};
use crate::results::{GraphSettings, ResultsController, TabContent, TabStatus};

const MAX_MESSAGES: usize = 500;
const ZOOM_STEP: f64 = 1.2;
/// Layout ticks per frame while a graph is still moving.
const TICKS_PER_FRAME: usize = 3;

#[derive(Debug, Clone, Default)]
struct CredentialsDraft {
    base_url: String,
    api_token: String,
    pool: String,
    model: String,
    table: String,
}

impl CredentialsDraft {
    fn missing(&self) -> Vec<&'static str> {
        [
            ("url", &self.base_url),
            ("token", &self.api_token),
            ("pool", &self.pool),
            ("model", &self.model),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Node(usize),
    /// Panning; holds the last pointer position in screen space.
    Pan(Point),
}

struct ConfInsightsConsole {
    client: BackendClient,
    backend_url: String,
    nav: NavState,
    results: ResultsController,
    credentials: CredentialsDraft,
    /// Current text in the input field.
    input: String,
    /// Cursor position within the input field, in characters.
    cursor_pos: usize,
    history: Vec<String>,
    history_pos: Option<usize>,
    console_messages: Vec<(chrono::DateTime<chrono::Utc>, String, Color)>,
    /// Where the last frame drew the focused graph, for mouse hit-testing.
    graph_area: Cell<Option<Rect>>,
    drag: Option<Drag>,
    table_scroll: usize,
}

impl ConfInsightsConsole {
    fn new(client: BackendClient, config: &AppConfig, root: CancellationToken) -> Self {
        let results = ResultsController::new(client.clone(), GraphSettings::from_config(config), root);
        let mut console = Self {
            client,
            backend_url: config.backend.base_url.clone(),
            nav: NavState::new(),
            results,
            credentials: CredentialsDraft {
                table: ci_protocol::DEFAULT_DATA_TABLE_NAME.to_string(),
                ..Default::default()
            },
            input: String::new(),
            cursor_pos: 0,
            history: Vec::new(),
            history_pos: None,
            console_messages: Vec::new(),
            graph_area: Cell::new(None),
            drag: None,
            table_scroll: 0,
        };
        console.add_message("ConfInsights console ready.", Color::Cyan);
        console.add_message(
            "Commands: /help, /set, /save, /upload, /map, /commit, /compute, /show, /quit",
            Color::DarkGray,
        );
        console
    }

    async fn process_input(&mut self) {
        let input = self.input.trim().to_string();
        if input.is_empty() {
            return;
        }

        self.history.push(input.clone());
        self.history_pos = None;

        if input.starts_with('/') {
            self.process_command(&input).await;
        } else {
            self.add_message(
                "Commands start with '/'. Type /help for the list.",
                Color::Yellow,
            );
        }

        self.input.clear();
        self.cursor_pos = 0;
    }

    async fn process_command(&mut self, cmd: &str) {
        let parts: Vec<&str> = cmd.splitn(2, ' ').collect();
        let command = parts[0];
        let args = parts.get(1).copied().unwrap_or("").trim();

        match command {
            "/help" => self.show_help(),
            "/page" => match parse_page(args) {
                Some(page) => self.go_page(page),
                None => self.add_message(
                    "Usage: /page credentials|upload|mapping|results",
                    Color::Red,
                ),
            },
            "/set" => self.set_credential(args),
            "/save" => self.save_credentials().await,
            "/upload" => self.upload(args).await,
            "/map" => self.map_column(args),
            "/unmap" => self.unmap_column(args),
            "/commit" => self.commit_mapping().await,
            "/tab" => self.switch_tab(args),
            "/zeta" => {
                self.set_zeta(args);
            }
            "/compute" => {
                if !args.is_empty() && !self.set_zeta(args) {
                    return;
                }
                self.go_page(Page::Results);
                if let Err(e) = self.results.compute() {
                    self.add_message(&e.to_string(), Color::Red);
                }
            }
            "/show" => self.show_variant(args),
            "/metric" => self.request_metric(args),
            "/graph" => self.focus_graph(args),
            "/reset" => {
                if let Some(view) = self.results.active_graph_mut() {
                    view.viewport.reset();
                }
            }
            "/quit" | "/exit" | "/q" => {
                // Handled in the event loop.
            }
            _ => {
                self.add_message(
                    &format!("Unknown command: {}. Type /help for available commands.", command),
                    Color::Red,
                );
            }
        }
    }

    fn show_help(&mut self) {
        self.add_message("Available commands:", Color::Cyan);
        for line in [
            "  /page <name>              - Go to credentials, upload, mapping or results",
            "  /set <field> <value>      - Credentials field: url, token, pool, model, table",
            "  /save                     - Send the credentials to the backend",
            "  /upload <path> [table]    - Upload a .csv or .xes event log",
            "  /map <role> <column>      - Bind a column (case, activity, timestamp, resource1, resource2)",
            "  /unmap <role>             - Clear a role",
            "  /commit                   - Commit the column mapping",
            "  /tab <family|1-5>         - Switch results tab",
            "  /compute [zeta]           - Start the active tab's computation",
            "  /show <n|variant>         - Show a variant of the active tab",
            "  /metric <name> [k=v ...]  - Query a resource-profile metric",
            "  /graph <n>                - Focus the n-th graph of the result",
            "  /reset                    - Reset zoom and pan",
            "  /quit                     - Exit the console",
        ] {
            self.add_message(line, Color::White);
        }
    }

    fn set_credential(&mut self, args: &str) {
        let (field, value) = args.split_once(' ').unwrap_or((args, ""));
        let value = value.trim().to_string();
        let slot = match field {
            "url" => &mut self.credentials.base_url,
            "token" => &mut self.credentials.api_token,
            "pool" => &mut self.credentials.pool,
            "model" => &mut self.credentials.model,
            "table" => &mut self.credentials.table,
            _ => {
                self.add_message("Usage: /set url|token|pool|model|table <value>", Color::Red);
                return;
            }
        };
        *slot = value;
        self.go_page(Page::Credentials);
    }

    async fn save_credentials(&mut self) {
        let missing = self.credentials.missing();
        if !missing.is_empty() {
            self.add_message(
                &format!("Required: {}", missing.join(", ")),
                Color::Red,
            );
            return;
        }
        let draft = &self.credentials;
        let credentials = BackendCredentials::new(
            draft.base_url.trim(),
            draft.api_token.trim(),
            draft.pool.trim(),
            draft.model.trim(),
            Some(draft.table.as_str()),
        );
        match self.client.save_credentials(&credentials).await {
            Ok(()) => {
                self.credentials.table = credentials.data_table_name.clone();
                self.add_message("Credentials saved.", Color::Green);
                self.go_page(Page::Upload);
            }
            Err(e) => self.add_message(&format!("Saving credentials failed: {e}"), Color::Red),
        }
    }

    async fn upload(&mut self, args: &str) {
        let mut words = args.split_whitespace();
        let Some(path) = words.next() else {
            self.add_message("Usage: /upload <path> [table]", Color::Red);
            return;
        };
        let table = words.next();
        self.add_message(&format!("Uploading {path}..."), Color::Yellow);
        match self.client.upload_log(Path::new(path), table).await {
            Ok(outcome) => {
                self.add_message(
                    &format!(
                        "Uploaded {} ({} log, {} columns)",
                        outcome.file_name,
                        outcome.log_type,
                        outcome.columns.columns.len()
                    ),
                    Color::Green,
                );
                self.log_uploaded(outcome);
            }
            Err(e) => self.add_message(&format!("Upload failed: {e}"), Color::Red),
        }
    }

    /// A new log makes every job and result of the previous one meaningless.
    fn log_uploaded(&mut self, outcome: UploadOutcome) {
        self.end_drag();
        self.nav.complete_upload(outcome);
        self.results.reset();
    }

    fn mapping_committed(&mut self, initial: serde_json::Value) {
        self.end_drag();
        self.nav.complete_mapping(MappingOutcome { initial });
        self.results.reset();
    }

    fn map_column(&mut self, args: &str) {
        let (role, column) = args.split_once(' ').unwrap_or((args, ""));
        let Some(role) = parse_role(role) else {
            self.add_message("Usage: /map <role> <column>", Color::Red);
            return;
        };
        let Some(form) = self.nav.mapping_form_mut() else {
            self.add_message("Upload a log first.", Color::Red);
            return;
        };
        match form.set(role, column.trim()) {
            Ok(()) => self.go_page(Page::Mapping),
            Err(e) => self.add_message(&e.to_string(), Color::Red),
        }
    }

    fn unmap_column(&mut self, args: &str) {
        let Some(role) = parse_role(args) else {
            self.add_message("Usage: /unmap <role>", Color::Red);
            return;
        };
        let Some(form) = self.nav.mapping_form_mut() else {
            self.add_message("Upload a log first.", Color::Red);
            return;
        };
        if let Err(e) = form.clear(role) {
            self.add_message(&e.to_string(), Color::Red);
        }
    }

    async fn commit_mapping(&mut self) {
        let Some(form) = self.nav.mapping_form() else {
            self.add_message("Upload a log first.", Color::Red);
            return;
        };
        let validated = match form.validate() {
            Ok(v) => v,
            Err(e) => {
                self.go_page(Page::Mapping);
                self.add_message(&format!("Cannot commit: {e}"), Color::Red);
                return;
            }
        };
        match self.client.commit_mapping(&validated).await {
            Ok(initial) => {
                self.add_message("Mapping committed.", Color::Green);
                self.mapping_committed(initial);
            }
            Err(e) => self.add_message(&format!("Commit failed: {e}"), Color::Red),
        }
    }

    fn switch_tab(&mut self, args: &str) {
        let family = match args.parse::<usize>() {
            Ok(n) if (1..=AnalysisFamily::ALL.len()).contains(&n) => AnalysisFamily::ALL[n - 1],
            _ => match args.parse::<AnalysisFamily>() {
                Ok(f) => f,
                Err(e) => {
                    self.add_message(&e.to_string(), Color::Red);
                    return;
                }
            },
        };
        self.select_tab(family);
    }

    fn select_tab(&mut self, family: AnalysisFamily) {
        self.end_drag();
        self.results.switch_to(family);
        self.nav.go(Page::Results);
        self.table_scroll = 0;
    }

    fn go_page(&mut self, page: Page) {
        if page != self.nav.page() {
            self.end_drag();
        }
        self.nav.go(page);
    }

    /// Let go of whatever the pointer holds; a dragged node is unpinned.
    fn end_drag(&mut self) {
        if let Some(Drag::Node(index)) = self.drag.take() {
            if let Some(view) = self.results.active_graph_mut() {
                if let Err(e) = view.layout.release(index) {
                    tracing::debug!(error = %e, "Cannot release node");
                }
            }
        }
    }

    fn cycle_tab(&mut self, forward: bool) {
        let all = AnalysisFamily::ALL;
        let i = all
            .iter()
            .position(|f| *f == self.results.active_family())
            .unwrap_or(0);
        let next = if forward {
            (i + 1) % all.len()
        } else {
            (i + all.len() - 1) % all.len()
        };
        self.select_tab(all[next]);
    }

    /// Returns false, after reporting why, when `args` is not a usable zeta.
    fn set_zeta(&mut self, args: &str) -> bool {
        let parsed = args
            .parse::<f64>()
            .map_err(|_| ProtocolError::InvalidZeta(f64::NAN))
            .and_then(|z| self.results.set_zeta(z).map(|_| z));
        match parsed {
            Ok(z) => {
                self.add_message(&format!("zeta = {z}"), Color::White);
                true
            }
            Err(_) => {
                self.add_message(
                    &format!("zeta must be a number greater than zero, got '{args}'"),
                    Color::Red,
                );
                false
            }
        }
    }

    fn show_variant(&mut self, args: &str) {
        let family = self.results.active_family();
        let variants = family.variants();
        let variant = match args.parse::<usize>() {
            Ok(n) if (1..=variants.len()).contains(&n) => variants[n - 1],
            _ => match resolve_variant(family.tag(), args) {
                Ok(v) => v,
                Err(e) => {
                    self.add_message(&e.to_string(), Color::Red);
                    return;
                }
            },
        };
        self.end_drag();
        self.nav.go(Page::Results);
        self.table_scroll = 0;
        if let Err(e) = self.results.select_variant(variant) {
            self.add_message(&e.to_string(), Color::Red);
        }
    }

    fn request_metric(&mut self, args: &str) {
        let mut words = args.split_whitespace();
        let metric = match words.next().map(str::parse::<ResourceMetric>) {
            Some(Ok(m)) => m,
            Some(Err(e)) => {
                self.add_message(&e.to_string(), Color::Red);
                return;
            }
            None => {
                self.add_message("Usage: /metric <name> [key=value ...]", Color::Red);
                return;
            }
        };
        let params: Result<Vec<_>, _> = words.map(parse_param).collect();
        match params {
            Ok(params) => {
                self.end_drag();
                self.nav.go(Page::Results);
                self.add_message(&format!("Querying {metric}..."), Color::Yellow);
                self.results.request_metric(metric, params);
            }
            Err(e) => self.add_message(&e, Color::Red),
        }
    }

    fn focus_graph(&mut self, args: &str) {
        self.end_drag();
        let Some(view) = self.results.active_result_mut() else {
            self.add_message("No result is shown.", Color::Red);
            return;
        };
        match args.parse::<usize>() {
            Ok(n) if (1..=view.graphs.len()).contains(&n) => view.focus = n - 1,
            _ => {
                let count = view.graphs.len();
                self.add_message(&format!("Pick a graph between 1 and {count}"), Color::Red);
            }
        }
    }

    fn add_message(&mut self, msg: &str, color: Color) {
        self.console_messages
            .push((chrono::Utc::now(), msg.to_string(), color));
        if self.console_messages.len() > MAX_MESSAGES {
            self.console_messages.remove(0);
        }
    }

    /// Apply finished jobs and advance moving layouts.
    fn on_frame(&mut self) {
        for notice in self.results.drain() {
            let color = if notice.is_error { Color::Red } else { Color::Green };
            self.add_message(&notice.text, color);
        }
        if let Some(view) = self.results.active_graph_mut() {
            if !view.layout.is_settled() {
                for _ in 0..TICKS_PER_FRAME {
                    view.layout.tick();
                }
            }
        }
    }

    fn render(&self, frame: &mut Frame) {
        self.graph_area.set(None);
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Status bar
                Constraint::Min(8),    // Sidebar + page
                Constraint::Length(5), // Input area
            ])
            .split(frame.area());

        self.render_status_bar(frame, outer[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(26), Constraint::Min(20)])
            .split(outer[1]);
        self.render_sidebar(frame, columns[0]);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(8)])
            .split(columns[1]);
        match self.nav.page() {
            Page::Credentials => self.render_credentials(frame, right[0]),
            Page::Upload => self.render_upload(frame, right[0]),
            Page::Mapping => self.render_mapping(frame, right[0]),
            Page::Results => self.render_results(frame, right[0]),
        }
        self.render_console_output(frame, right[1]);
        self.render_input(frame, outer[2]);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" ConfInsights ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        let tab = self.results.active_tab();
        let (status, status_color) = status_text(tab.status());
        let log = self
            .nav
            .upload()
            .map(|u| format!("{} ({})", u.file_name, u.log_type))
            .unwrap_or_else(|| "none".to_string());

        let status_line = Line::from(vec![
            Span::styled("  Backend: ", Style::default().fg(Color::Gray)),
            Span::styled(&self.backend_url, Style::default().fg(Color::White)),
            Span::styled("  |  Log: ", Style::default().fg(Color::Gray)),
            Span::styled(log, Style::default().fg(Color::LightCyan)),
            Span::styled("  |  ", Style::default().fg(Color::Gray)),
            Span::styled(tab.family().label(), Style::default().fg(Color::Cyan)),
            Span::styled(": ", Style::default().fg(Color::Gray)),
            Span::styled(status, Style::default().fg(status_color)),
        ]);

        frame.render_widget(Paragraph::new(status_line).block(block), area);
    }

    fn render_sidebar(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" Pages ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White));
        let lines: Vec<Line> = Page::ALL
            .iter()
            .map(|page| {
                if *page == self.nav.page() {
                    Line::from(Span::styled(
                        format!(" > {}", page.title()),
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    ))
                } else {
                    Line::from(Span::styled(
                        format!("   {}", page.title()),
                        Style::default().fg(Color::Gray),
                    ))
                }
            })
            .collect();
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_credentials(&self, frame: &mut Frame, area: Rect) {
        let block = page_block(Page::Credentials);
        let draft = &self.credentials;
        let token = if draft.api_token.is_empty() {
            String::new()
        } else {
            "*".repeat(draft.api_token.chars().count().min(12))
        };
        let field = |name: &'static str, value: &str, required: bool| {
            let mut spans = vec![
                Span::styled(format!("  {name:<18}"), Style::default().fg(Color::Gray)),
                Span::styled(value.to_string(), Style::default().fg(Color::White)),
            ];
            if required && value.trim().is_empty() {
                spans.push(Span::styled("  Required", Style::default().fg(Color::Red)));
            }
            Line::from(spans)
        };
        let lines = vec![
            field("Base URL", &draft.base_url, true),
            field("API token", &token, true),
            field("Data pool", &draft.pool, true),
            field("Data model", &draft.model, true),
            field("Data table", &draft.table, false),
            Line::from(""),
            hint("  /set <url|token|pool|model|table> <value>, then /save"),
        ];
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_upload(&self, frame: &mut Frame, area: Rect) {
        let block = page_block(Page::Upload);
        let mut lines = Vec::new();
        match self.nav.upload() {
            Some(upload) => {
                lines.push(Line::from(vec![
                    Span::styled("  Current log: ", Style::default().fg(Color::Gray)),
                    Span::styled(&upload.file_name, Style::default().fg(Color::White)),
                    Span::styled(format!(" ({})", upload.log_type), Style::default().fg(Color::Cyan)),
                ]));
                lines.push(Line::from(Span::styled(
                    format!("  Columns: {}", upload.columns.columns.join(", ")),
                    Style::default().fg(Color::Gray),
                )));
            }
            None => lines.push(Line::from(Span::styled(
                "  No log uploaded yet.",
                Style::default().fg(Color::DarkGray),
            ))),
        }
        lines.push(Line::from(""));
        lines.push(hint("  /upload <path.csv|path.xes> [data table name]"));
        frame.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
            area,
        );
    }

    fn render_mapping(&self, frame: &mut Frame, area: Rect) {
        let block = page_block(Page::Mapping);
        let Some(form) = self.nav.mapping_form() else {
            let text = Paragraph::new(hint("  Upload a log to map its columns.")).block(block);
            frame.render_widget(text, area);
            return;
        };

        let rows: Vec<Row> = Role::ALL
            .iter()
            .map(|role| {
                let value = form.get(*role).unwrap_or("");
                let (marker, marker_color) = if form.is_read_only(*role) {
                    ("read-only", Color::DarkGray)
                } else if role.is_required() && value.is_empty() {
                    ("Required", Color::Red)
                } else {
                    ("", Color::White)
                };
                let options = form.options(*role).len();
                Row::new(vec![
                    TableCell::from(Span::styled(
                        format!("  {}", role.label()),
                        Style::default().fg(Color::White),
                    )),
                    TableCell::from(Span::styled(value.to_string(), Style::default().fg(Color::Cyan))),
                    TableCell::from(Span::styled(marker, Style::default().fg(marker_color))),
                    TableCell::from(Span::styled(
                        format!("{options} options"),
                        Style::default().fg(Color::DarkGray),
                    )),
                ])
            })
            .collect();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(8), Constraint::Min(2)])
            .split(block.inner(area));
        frame.render_widget(block, area);

        let table = Table::new(
            rows,
            [
                Constraint::Length(30),
                Constraint::Min(16),
                Constraint::Length(10),
                Constraint::Length(12),
            ],
        )
        .header(
            Row::new(vec!["  Role", "Column", "", "Choices"])
                .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
        );
        frame.render_widget(table, chunks[0]);

        let submit = if form.is_submittable() {
            Span::styled("  /commit to submit the mapping", Style::default().fg(Color::Green))
        } else {
            Span::styled(
                "  Submit disabled: fill every Required role",
                Style::default().fg(Color::DarkGray),
            )
        };
        let lines = vec![
            Line::from(Span::styled(
                format!("  Columns: {}", form.columns().join(", ")),
                Style::default().fg(Color::Gray),
            )),
            Line::from(submit),
        ];
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), chunks[1]);
    }

    fn render_results(&self, frame: &mut Frame, area: Rect) {
        let block = page_block(Page::Results);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(4)])
            .split(inner);

        let active = self.results.active_family();
        let titles: Vec<Line> = AnalysisFamily::ALL
            .iter()
            .map(|f| Line::from(format!(" {} ", f.label())))
            .collect();
        let selected = AnalysisFamily::ALL
            .iter()
            .position(|f| *f == active)
            .unwrap_or(0);
        let tabs = Tabs::new(titles)
            .select(selected)
            .style(Style::default().fg(Color::Gray))
            .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
        frame.render_widget(tabs, rows[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(36), Constraint::Min(20)])
            .split(rows[1]);
        self.render_variant_list(frame, body[0]);
        self.render_tab_content(frame, body[1]);
    }

    fn render_variant_list(&self, frame: &mut Frame, area: Rect) {
        let tab = self.results.active_tab();
        let mut lines = Vec::new();
        match tab.job() {
            Some(job) => lines.push(Line::from(Span::styled(
                format!(" job {}", job.id()),
                Style::default().fg(Color::DarkGray),
            ))),
            None if tab.family().start_path().is_some() => {
                lines.push(hint(" /compute to start"));
            }
            None => {}
        }
        if tab.family() == AnalysisFamily::TemporalProfile {
            lines.push(hint(&format!(" zeta {}", self.results.zeta())));
        }
        for (i, variant) in tab.family().variants().iter().enumerate() {
            let style = if tab.selected() == Some(*variant) {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            lines.push(Line::from(Span::styled(
                format!(" {:>2}. {}", i + 1, variant.label()),
                style,
            )));
        }
        let block = Block::default()
            .title(" Variants ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White));
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_tab_content(&self, frame: &mut Frame, area: Rect) {
        let tab = self.results.active_tab();
        match tab.content() {
            TabContent::Empty => {
                let mut lines = vec![hint("  Pick a variant with /show <n>.")];
                if let Some(mapping) = self.nav.mapping() {
                    if !mapping.initial.is_null() {
                        lines.push(Line::from(""));
                        lines.push(Line::from(Span::styled(
                            format!("  Mapping response: {}", value_text(&mapping.initial)),
                            Style::default().fg(Color::Gray),
                        )));
                    }
                }
                let block = Block::default().borders(Borders::ALL);
                frame.render_widget(
                    Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
                    area,
                );
            }
            TabContent::Metric { metric, value } => {
                let lines = vec![
                    Line::from(""),
                    Line::from(vec![
                        Span::styled(format!("  {metric}: "), Style::default().fg(Color::Gray)),
                        Span::styled(
                            value.to_string(),
                            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                        ),
                    ]),
                ];
                let block = Block::default().title(" Metric ").borders(Borders::ALL);
                frame.render_widget(Paragraph::new(lines).block(block), area);
            }
            TabContent::Result(view) => {
                if view.is_empty() {
                    let block = Block::default().borders(Borders::ALL);
                    frame.render_widget(
                        Paragraph::new(hint("  No data for this variant.")).block(block),
                        area,
                    );
                    return;
                }
                let mut constraints = Vec::new();
                if !view.graphs.is_empty() {
                    constraints.push(Constraint::Percentage(if view.tables.is_empty() { 100 } else { 60 }));
                }
                for _ in &view.tables {
                    constraints.push(Constraint::Min(4));
                }
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints(constraints)
                    .split(area);
                let mut slot = 0;
                if let Some(graph) = view.graphs.get(view.focus) {
                    let title = format!(
                        "{} ({}/{}, zoom {:.1}x)",
                        view.variant.label(),
                        view.focus + 1,
                        view.graphs.len(),
                        graph.viewport.scale()
                    );
                    canvas::render_graph(frame, chunks[slot], graph, &title);
                    self.graph_area.set(Some(chunks[slot]));
                    slot += 1;
                }
                for (i, table) in view.tables.iter().enumerate() {
                    self.render_table(frame, chunks[slot + i], table, &format!("Table {}", i + 1));
                }
            }
        }
    }

    fn render_table(&self, frame: &mut Frame, area: Rect, table: &TableView, title: &str) {
        let block = Block::default()
            .title(format!(" {title} ({} rows) ", table.rows.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White));
        let widths: Vec<Constraint> = table
            .column_widths()
            .into_iter()
            .map(|w| Constraint::Length(w.clamp(3, 40) as u16 + 2))
            .collect();
        let rows: Vec<Row> = table
            .rows
            .iter()
            .skip(self.table_scroll)
            .map(|row| Row::new(row.iter().map(|c| TableCell::from(c.as_str()))))
            .collect();
        let widget = Table::new(rows, widths).block(block).header(
            Row::new(table.headers.iter().map(|h| TableCell::from(h.as_str())))
                .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
        );
        frame.render_widget(widget, area);
    }

    fn render_console_output(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" Console Output ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White));

        let inner_height = area.height.saturating_sub(2) as usize;
        let start = self.console_messages.len().saturating_sub(inner_height);
        let lines: Vec<Line> = self.console_messages[start..]
            .iter()
            .map(|(ts, msg, color)| {
                Line::from(vec![
                    Span::styled(
                        format!("  [{}] ", ts.format("%H:%M:%S")),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(msg.as_str(), Style::default().fg(*color)),
                ])
            })
            .collect();

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_input(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" Command Input (/help = commands, /quit = exit) ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green));

        let input_display = if self.input.is_empty() {
            Line::from(vec![
                Span::styled("  > ", Style::default().fg(Color::Green)),
                Span::styled("Type a /command...", Style::default().fg(Color::DarkGray)),
            ])
        } else {
            Line::from(vec![
                Span::styled("  > ", Style::default().fg(Color::Green)),
                Span::styled(&self.input, Style::default().fg(Color::White)),
            ])
        };

        let hint_line = hint(
            "  Tab: pages  |  Ctrl+Left/Right: result tabs  |  PgUp/PgDn or wheel: zoom  |  Ctrl+C: exit",
        );

        let paragraph = Paragraph::new(vec![Line::from(""), input_display, hint_line]).block(block);
        frame.render_widget(paragraph, area);

        let cursor_x = area.x + 4 + self.cursor_pos as u16;
        let cursor_y = area.y + 2;
        frame.set_cursor_position((cursor_x, cursor_y));
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    /// Handle keyboard input. Returns `true` if the console should exit.
    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        match (code, modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => return true,
            (KeyCode::Left, m) if m.contains(KeyModifiers::CONTROL) => self.cycle_tab(false),
            (KeyCode::Right, m) if m.contains(KeyModifiers::CONTROL) => self.cycle_tab(true),
            (KeyCode::Tab, _) => self.go_page(self.nav.page().next()),
            (KeyCode::BackTab, _) => self.go_page(self.nav.page().previous()),
            (KeyCode::Char(c), _) => {
                let at = self.byte_index();
                self.input.insert(at, c);
                self.cursor_pos += 1;
            }
            (KeyCode::Backspace, _) => {
                if self.cursor_pos > 0 {
                    self.cursor_pos -= 1;
                    let at = self.byte_index();
                    self.input.remove(at);
                }
            }
            (KeyCode::Delete, _) => {
                if self.cursor_pos < self.input_len() {
                    let at = self.byte_index();
                    self.input.remove(at);
                }
            }
            (KeyCode::Left, _) => {
                self.cursor_pos = self.cursor_pos.saturating_sub(1);
            }
            (KeyCode::Right, _) => {
                if self.cursor_pos < self.input_len() {
                    self.cursor_pos += 1;
                }
            }
            (KeyCode::Home, _) => {
                self.cursor_pos = 0;
            }
            (KeyCode::End, _) => {
                self.cursor_pos = self.input_len();
            }
            (KeyCode::Up, _) => {
                if !self.history.is_empty() {
                    let pos = match self.history_pos {
                        Some(p) if p > 0 => p - 1,
                        Some(p) => p,
                        None => self.history.len() - 1,
                    };
                    self.history_pos = Some(pos);
                    self.input = self.history[pos].clone();
                    self.cursor_pos = self.input_len();
                }
            }
            (KeyCode::Down, _) => {
                if let Some(pos) = self.history_pos {
                    if pos + 1 < self.history.len() {
                        self.history_pos = Some(pos + 1);
                        self.input = self.history[pos + 1].clone();
                        self.cursor_pos = self.input_len();
                    } else {
                        self.history_pos = None;
                        self.input.clear();
                        self.cursor_pos = 0;
                    }
                }
            }
            (KeyCode::Enter, _) => {
                // Handled by caller (needs async).
            }
            (KeyCode::PageUp, _) => self.zoom_or_scroll(true),
            (KeyCode::PageDown, _) => self.zoom_or_scroll(false),
            _ => {}
        }
        false
    }

    /// PageUp/PageDown zoom the focused graph, or scroll tables when there is none.
    fn zoom_or_scroll(&mut self, up: bool) {
        if self.nav.page() != Page::Results {
            return;
        }
        if let Some(view) = self.results.active_graph_mut() {
            let config = view.layout.config();
            let anchor = Point::new(config.width / 2.0, config.height / 2.0);
            let factor = if up { ZOOM_STEP } else { 1.0 / ZOOM_STEP };
            view.viewport.zoom_by(factor, anchor, ZoomTrigger::Wheel);
        } else if up {
            self.table_scroll = self.table_scroll.saturating_sub(5);
        } else {
            self.table_scroll += 5;
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.nav.page() != Page::Results {
            return;
        }
        let Some(area) = self.graph_area.get() else {
            return;
        };
        let Some(view) = self.results.active_graph_mut() else {
            return;
        };
        let (width, height) = (view.layout.config().width, view.layout.config().height);
        let screen = canvas::cell_to_screen(area, mouse.column, mouse.row, width, height);

        match mouse.kind {
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                if let Some(at) = screen {
                    let factor = if mouse.kind == MouseEventKind::ScrollUp {
                        ZOOM_STEP
                    } else {
                        1.0 / ZOOM_STEP
                    };
                    view.viewport.zoom_by(factor, at, ZoomTrigger::Wheel);
                }
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(at) = screen else { return };
                let world = view.viewport.to_world(at);
                let radius = view.graph.variant.node_radius();
                self.drag = match view.layout.node_at(world, radius) {
                    Some(index) => match view.layout.pin(index, world) {
                        Ok(()) => Some(Drag::Node(index)),
                        Err(e) => {
                            tracing::debug!(error = %e, "Cannot pin node");
                            None
                        }
                    },
                    None => Some(Drag::Pan(at)),
                };
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let Some(at) = screen else { return };
                let drag = self.drag;
                match drag {
                    Some(Drag::Node(index)) => {
                        let world = view.viewport.to_world(at);
                        if let Err(e) = view.layout.drag_to(index, world) {
                            tracing::debug!(error = %e, "Cannot drag node");
                        }
                    }
                    Some(Drag::Pan(last)) => {
                        view.viewport
                            .pan(at.x - last.x, at.y - last.y, ZoomTrigger::MouseDown);
                        self.drag = Some(Drag::Pan(at));
                    }
                    None => {}
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(Drag::Node(index)) = self.drag.take() {
                    if let Err(e) = view.layout.release(index) {
                        tracing::debug!(error = %e, "Cannot release node");
                    }
                }
            }
            _ => {}
        }
    }
}

fn page_block(page: Page) -> Block<'static> {
    Block::default()
        .title(format!(" {} ", page.title()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::LightBlue))
}

fn hint(text: &str) -> Line<'static> {
    Line::from(Span::styled(text.to_string(), Style::default().fg(Color::DarkGray)))
}

fn status_text(status: &TabStatus) -> (String, Color) {
    match status {
        TabStatus::Idle => ("idle".to_string(), Color::Gray),
        TabStatus::Starting => ("starting...".to_string(), Color::Yellow),
        TabStatus::Ready => ("ready".to_string(), Color::Green),
        TabStatus::Loading(variant) => (format!("loading {}...", variant.label()), Color::Yellow),
        TabStatus::Failed(reason) => (format!("failed: {reason}"), Color::Red),
    }
}

fn parse_role(raw: &str) -> Option<Role> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "case" | "case_id" | "caseid" => Some(Role::CaseId),
        "activity" => Some(Role::Activity),
        "timestamp" | "time" => Some(Role::Timestamp),
        "resource" | "resource1" => Some(Role::Resource1),
        "resource2" | "group" => Some(Role::Resource2),
        _ => None,
    }
}

fn parse_page(raw: &str) -> Option<Page> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "credentials" | "1" => Some(Page::Credentials),
        "upload" | "2" => Some(Page::Upload),
        "mapping" | "map" | "3" => Some(Page::Mapping),
        "results" | "insights" | "4" => Some(Page::Results),
        _ => None,
    }
}

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the console event loop until the user quits.
pub async fn run_console(
    client: BackendClient,
    config: &AppConfig,
    root: CancellationToken,
) -> Result<(), anyhow::Error> {
    use std::io::IsTerminal;
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        return Err(anyhow::anyhow!("The console requires a terminal (TTY)."));
    }

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;
    let mut console = ConfInsightsConsole::new(client, config, root);
    tracing::info!(backend = %config.backend.base_url, "Console started");

    let tick_rate = Duration::from_millis(100);

    loop {
        console.on_frame();
        terminal.draw(|frame| console.render(frame))?;

        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key_event) if key_event.kind == KeyEventKind::Press => {
                    if key_event.code == KeyCode::Enter {
                        let trimmed = console.input.trim().to_string();
                        if trimmed == "/quit" || trimmed == "/exit" || trimmed == "/q" {
                            break;
                        }
                        console.process_input().await;
                    } else if console.handle_key(key_event.code, key_event.modifiers) {
                        break;
                    }
                }
                Event::Mouse(mouse) => console.handle_mouse(mouse),
                _ => {}
            }
        }
    }

    console.results.shutdown();
    restore_terminal(&mut terminal)?;
    tracing::info!("Console stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{JobEvent, JobMessage, ResultView};
    use ci_protocol::{
        AnalysisVariant, ColumnsResponse, JobHandle, LogType, ResultPayload, SkeletonRelation,
    };
    use serde_json::json;

    fn console() -> ConfInsightsConsole {
        let config = AppConfig::default().with_backend_override(Some("http://127.0.0.1:9"), None);
        let client = BackendClient::new(config.client_config()).expect("client");
        ConfInsightsConsole::new(client, &config, CancellationToken::new())
    }

    fn last_message(console: &ConfInsightsConsole) -> (&str, Color) {
        let (_, msg, color) = console.console_messages.last().expect("message");
        (msg.as_str(), *color)
    }

    fn uploaded(console: &mut ConfInsightsConsole) {
        console.log_uploaded(UploadOutcome {
            file_name: "orders.csv".into(),
            log_type: LogType::Tabular,
            columns: ColumnsResponse {
                columns: vec!["case".into(), "act".into(), "ts".into(), "who".into()],
                ..Default::default()
            },
        });
    }

    #[test]
    fn roles_accept_short_names() {
        assert_eq!(parse_role("case"), Some(Role::CaseId));
        assert_eq!(parse_role("Resource2"), Some(Role::Resource2));
        assert_eq!(parse_role("nope"), None);
    }

    #[test]
    fn editing_handles_multibyte_input() {
        let mut c = console();
        for ch in "zé!".chars() {
            c.handle_key(KeyCode::Char(ch), KeyModifiers::NONE);
        }
        c.handle_key(KeyCode::Left, KeyModifiers::NONE);
        c.handle_key(KeyCode::Backspace, KeyModifiers::NONE);
        assert_eq!(c.input, "z!");
        assert_eq!(c.cursor_pos, 1);
        assert!(c.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL));
    }

    #[test]
    fn tab_cycles_pages_and_ctrl_arrows_cycle_results() {
        let mut c = console();
        c.handle_key(KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(c.nav.page(), Page::Upload);
        c.handle_key(KeyCode::Right, KeyModifiers::CONTROL);
        assert_eq!(c.nav.page(), Page::Results);
        assert_eq!(c.results.active_family(), AnalysisFamily::LogSkeleton);
        c.handle_key(KeyCode::Left, KeyModifiers::CONTROL);
        c.handle_key(KeyCode::Left, KeyModifiers::CONTROL);
        assert_eq!(c.results.active_family(), AnalysisFamily::ResourceBased);
    }

    #[tokio::test]
    async fn commit_is_blocked_until_required_roles_are_set() {
        let mut c = console();
        uploaded(&mut c);
        c.process_command("/map case case").await;
        c.process_command("/commit").await;
        let (msg, color) = last_message(&c);
        assert!(msg.starts_with("Cannot commit"), "{msg}");
        assert_eq!(color, Color::Red);
        assert_eq!(c.nav.page(), Page::Mapping);
        assert!(c.nav.mapping().is_none());
    }

    #[tokio::test]
    async fn mapping_rejects_columns_bound_elsewhere() {
        let mut c = console();
        uploaded(&mut c);
        c.process_command("/map case case").await;
        c.process_command("/map resource1 case").await;
        assert_eq!(last_message(&c).1, Color::Red);
        assert_eq!(c.nav.mapping_form().unwrap().get(Role::Resource1), None);
    }

    #[tokio::test]
    async fn variant_before_compute_is_refused() {
        let mut c = console();
        c.process_command("/tab log_skeleton").await;
        c.process_command("/show 1").await;
        let (msg, color) = last_message(&c);
        assert!(msg.contains("start the computation first"), "{msg}");
        assert_eq!(color, Color::Red);
    }

    #[tokio::test]
    async fn credentials_need_every_required_field() {
        let mut c = console();
        c.process_command("/set url https://pm.example").await;
        c.process_command("/save").await;
        let (msg, _) = last_message(&c);
        assert_eq!(msg, "Required: token, pool, model");
        assert_eq!(c.credentials.base_url, "https://pm.example");
    }

    #[tokio::test]
    async fn zeta_must_be_positive() {
        let mut c = console();
        c.process_command("/zeta -1").await;
        assert_eq!(last_message(&c).1, Color::Red);
        c.process_command("/zeta 0.8").await;
        assert_eq!(c.results.zeta(), 0.8);
    }

    fn started(console: &mut ConfInsightsConsole, family: AnalysisFamily, id: &str) {
        let generation = console.results.tab(family).generation();
        let notice = console.results.apply(JobMessage {
            family,
            generation,
            event: JobEvent::Started(JobHandle::new(id, family)),
        });
        assert!(notice.is_some());
    }

    fn show_graph(console: &mut ConfInsightsConsole) {
        let variant = AnalysisVariant::LogSkeleton(SkeletonRelation::Equivalence);
        let payload = ResultPayload::from_value(json!({
            "graphs": [{"nodes": [{"id": "a"}, {"id": "b"}], "edges": [{"from": "a", "to": "b", "label": "1"}]}],
            "tables": []
        }));
        let settings = GraphSettings {
            directed: false,
            budget: Duration::from_millis(10),
            seed: Some(3),
        };
        console.select_tab(AnalysisFamily::LogSkeleton);
        let generation = console.results.active_tab().generation();
        console.results.apply(JobMessage {
            family: AnalysisFamily::LogSkeleton,
            generation,
            event: JobEvent::Loaded(Box::new(ResultView::build(variant, &payload, &settings))),
        });
        assert!(console.results.active_graph_mut().is_some());
    }

    fn grab_node(console: &mut ConfInsightsConsole) {
        let view = console.results.active_graph_mut().expect("graph");
        view.layout.pin(0, Point::new(50.0, 50.0)).unwrap();
        console.drag = Some(Drag::Node(0));
    }

    fn node_pinned(console: &mut ConfInsightsConsole) -> bool {
        console
            .results
            .active_graph_mut()
            .map(|v| v.layout.is_pinned(0))
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn invalid_zeta_starts_no_computation() {
        let mut c = console();
        c.process_command("/tab temporal").await;
        c.process_command("/compute -1").await;
        assert_eq!(last_message(&c).1, Color::Red);
        assert_eq!(c.results.active_tab().status(), &TabStatus::Idle);
        assert_eq!(c.results.zeta(), ci_protocol::DEFAULT_ZETA);
    }

    #[tokio::test]
    async fn new_log_forgets_previous_jobs() {
        let mut c = console();
        uploaded(&mut c);
        c.mapping_committed(json!({"ok": true}));
        started(&mut c, AnalysisFamily::LogSkeleton, "old-log-job");
        assert!(c.results.tab(AnalysisFamily::LogSkeleton).job().is_some());

        uploaded(&mut c);
        assert!(c.results.tab(AnalysisFamily::LogSkeleton).job().is_none());

        started(&mut c, AnalysisFamily::LogSkeleton, "mid-mapping-job");
        c.mapping_committed(json!({"ok": true}));
        assert!(c.results.tab(AnalysisFamily::LogSkeleton).job().is_none());

        c.process_command("/tab log_skeleton").await;
        c.process_command("/show 1").await;
        assert!(last_message(&c).0.contains("start the computation first"));
    }

    #[tokio::test]
    async fn leaving_results_releases_dragged_node() {
        let mut c = console();
        show_graph(&mut c);
        grab_node(&mut c);
        assert!(node_pinned(&mut c));

        c.handle_key(KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(c.nav.page(), Page::Credentials);
        assert!(c.drag.is_none());
        assert!(!node_pinned(&mut c));
    }

    #[tokio::test]
    async fn switching_graph_focus_releases_dragged_node() {
        let mut c = console();
        show_graph(&mut c);
        grab_node(&mut c);
        c.process_command("/graph 1").await;
        assert!(c.drag.is_none());
        assert!(!node_pinned(&mut c));
    }
}
