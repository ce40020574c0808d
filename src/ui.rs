use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, Gauge, Paragraph, Row, Table, TableState, Wrap,
};
use serde_json::Value;

use crate::app::{App, InputMode, SETTINGS_ACTIONS};
use crate::model::{ResourceKind, Tab};
use crate::nav::Location;
use crate::render::{
    EmptyState, LoadMore, StatusTone, SummaryCard, TableView, format_cores, format_mebibytes,
};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);
const PL_D: Color = Color::Rgb(82, 24, 124);
const KEY: Color = Color::Rgb(103, 232, 249);
const STRING: Color = Color::Rgb(125, 211, 252);
const NUMBER: Color = Color::Rgb(251, 146, 60);
const VALUE: Color = Color::Rgb(147, 197, 253);

pub fn render(frame: &mut Frame, app: &mut App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    render_body(frame, root[1], app);
    render_footer(frame, root[2], app);

    if let Some(selected) = app.namespace_picker() {
        render_namespace_picker(frame, app, selected);
    }
    if app.show_help() {
        render_help_modal(frame, app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let mut bar = Powerline::default();
    bar.segment(" 󱃾 kubedeck ", Color::White, PL_A, PL_B);
    bar.segment(
        format!(" {} ", ellipsize(&display_endpoint(app.server()), 28)),
        Color::White,
        PL_B,
        PL_C,
    );
    bar.segment(
        format!(" 󰉖 {} ", ellipsize(&app.namespace_scope().label(), 20)),
        Color::White,
        PL_C,
        BG,
    );
    let mut spans = bar.spans;
    spans.push(Span::raw(" "));

    let active = app.active_tab();
    for (index, tab) in Tab::ALL.iter().enumerate() {
        let style = if *tab == active {
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MUTED)
        };
        spans.push(Span::styled(format!(" {}:{} ", index + 1, tab.title()), style));
    }

    let history = format!(
        " {}{} ",
        if app.can_go_back() { "◀" } else { " " },
        if app.can_go_forward() { "▶" } else { " " }
    );
    let history_width = history.chars().count() as u16;
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(history_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG).fg(Color::White)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(history)
            .style(Style::default().bg(BG).fg(MUTED))
            .alignment(Alignment::Right),
        chunks[1],
    );
}

fn render_body(frame: &mut Frame, area: Rect, app: &mut App) {
    app.set_table_page_size(table_rows_visible(area));
    app.set_detail_page_size(area.height.saturating_sub(2).max(1));

    if app.detail().is_some() {
        render_detail(frame, area, app);
        return;
    }

    match app.location() {
        Location::Home(kind) => render_home(frame, area, app, kind),
        Location::Resources(kind) => render_explorer(frame, area, app, kind),
        Location::Cli => render_console(frame, area, app),
        Location::Yaml => render_manifest(frame, area, app),
        Location::Namespaces => render_namespaces(frame, area, app),
        Location::Charts => render_charts(frame, area, app),
        Location::Settings => render_settings(frame, area, app),
    }
}

fn render_home(frame: &mut Frame, area: Rect, app: &App, kind: ResourceKind) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Length(1),
            Constraint::Min(4),
        ])
        .split(area);

    render_metrics_panel(frame, chunks[0], app);
    render_kind_bar(frame, chunks[1], kind);
    if let Some(view) = app.table_view() {
        render_resource_view(frame, chunks[2], &view);
    }
}

fn render_explorer(frame: &mut Frame, area: Rect, app: &App, kind: ResourceKind) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(4)])
        .split(area);
    render_kind_bar(frame, chunks[0], kind);
    if let Some(view) = app.table_view() {
        render_resource_view(frame, chunks[1], &view);
    }
}

fn render_kind_bar(frame: &mut Frame, area: Rect, active: ResourceKind) {
    let narrow = area.width < 90;
    let mut spans = Vec::new();
    for kind in ResourceKind::ALL {
        let style = if kind == active {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Rgb(94, 234, 212))
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MUTED)
        };
        let label = if narrow { kind.short_token() } else { kind.title() };
        spans.push(Span::styled(format!(" {label} "), style));
    }
    spans.push(Span::styled("  Tab/S-Tab", Style::default().fg(MUTED)));
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_metrics_panel(frame: &mut Frame, area: Rect, app: &App) {
    let metrics = app.metrics();
    let capacity = app.capacity();
    let block = Block::default()
        .title(format!("Cluster ({} pods)", metrics.total_pods))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(MUTED))
        .style(Style::default().bg(PANEL));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width < 20 || inner.height < 4 {
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    let phases = ["Running", "Pending", "Succeeded", "Failed"]
        .iter()
        .map(|phase| format!("{phase}:{}", metrics.phase(phase)))
        .collect::<Vec<_>>()
        .join("  ");
    frame.render_widget(
        Paragraph::new(phases).style(Style::default().fg(Color::Rgb(147, 197, 253))),
        chunks[0],
    );

    let bars = [
        MetricBar {
            icon: "󰾆",
            label: "CPU",
            value: format!(
                "{}/{}",
                format_cores(metrics.requested.cpu_cores),
                format_cores(capacity.cpu_cores)
            ),
            percent: metrics.cpu_percent,
            color: Color::Rgb(56, 189, 248),
        },
        MetricBar {
            icon: "󰍛",
            label: "Memory",
            value: format!(
                "{}/{}",
                format_mebibytes(metrics.requested.memory_mi),
                format_mebibytes(capacity.memory_mi)
            ),
            percent: metrics.memory_percent,
            color: Color::Rgb(147, 197, 253),
        },
        MetricBar {
            icon: "󰢮",
            label: "GPU",
            value: format!("{}/{}", metrics.requested.gpu, capacity.gpu),
            percent: metrics.gpu_percent,
            color: Color::Rgb(192, 132, 252),
        },
    ];
    for (index, bar) in bars.iter().enumerate() {
        render_metric_gauge(frame, chunks[1 + index], bar);
    }
}

struct MetricBar {
    icon: &'static str,
    label: &'static str,
    value: String,
    percent: f64,
    color: Color,
}

fn render_metric_gauge(frame: &mut Frame, area: Rect, bar: &MetricBar) {
    let [label_area, gauge_area] =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(area);
    let label = format!("{} {} {}", bar.icon, bar.label, bar.value);
    frame.render_widget(
        Paragraph::new(ellipsize(&label, label_area.width.saturating_sub(1).max(1) as usize))
            .style(Style::default().fg(Color::Rgb(94, 234, 212))),
        label_area,
    );

    let percent = bar.percent.clamp(0.0, 100.0).round() as u16;
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(bar.color).bg(Color::Rgb(30, 41, 59)))
        .percent(percent)
        .label(Span::styled(
            format!("{percent}%"),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
    frame.render_widget(gauge, gauge_area);
}

fn render_resource_view(frame: &mut Frame, area: Rect, view: &TableView) {
    let mut constraints = vec![Constraint::Length(1)];
    if view.stale || view.error.is_some() {
        constraints.push(Constraint::Length(1));
    }
    constraints.push(Constraint::Min(3));
    if view.load_more.is_some() {
        constraints.push(Constraint::Length(1));
    }
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut slot = 0;
    frame.render_widget(
        Paragraph::new(Line::from(summary_card_spans(&view.cards, &view.indicators)))
            .style(Style::default().bg(BG)),
        chunks[slot],
    );
    slot += 1;

    if view.stale || view.error.is_some() {
        let (text, color) = match &view.error {
            Some(error) => (format!("󰅚 {error}  (r to retry)"), ERROR),
            None => ("󰀦 Data may be outdated; press r to refresh".to_string(), WARN),
        };
        frame.render_widget(
            Paragraph::new(ellipsize(&text, chunks[slot].width as usize))
                .style(Style::default().fg(color).bg(BG)),
            chunks[slot],
        );
        slot += 1;
    }

    let table_area = chunks[slot];
    slot += 1;
    let title = format!("{} · {}", view.kind.title(), view.count_line);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .style(Style::default().bg(PANEL));

    if let Some(empty) = &view.empty {
        let color = match empty {
            EmptyState::Failed { .. } => ERROR,
            EmptyState::Loading { .. } => Color::Rgb(125, 211, 252),
            _ => MUTED,
        };
        let message = Paragraph::new(empty.message(view.kind))
            .wrap(Wrap { trim: false })
            .alignment(Alignment::Center)
            .block(block)
            .style(Style::default().fg(color));
        frame.render_widget(message, table_area);
    } else {
        let header_row = Row::new(view.headers.iter().map(|header| {
            Cell::from(*header).style(Style::default().add_modifier(Modifier::BOLD))
        }))
        .height(1)
        .style(Style::default().fg(ACCENT));

        let status_column = view.headers.iter().position(|header| *header == "STATUS");
        let rows = view.rows.iter().map(|row| {
            Row::new(row.cells.iter().enumerate().map(|(index, cell)| {
                let color = if Some(index) == status_column {
                    tone_color(row.tone)
                } else {
                    Color::White
                };
                Cell::from(cell.clone()).style(Style::default().fg(color))
            }))
        });

        let table = Table::new(rows, column_widths(&view.headers))
            .header(header_row)
            .block(block)
            .column_spacing(1)
            .row_highlight_style(
                Style::default()
                    .bg(Color::Rgb(24, 36, 58))
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("󰜴 ");

        let mut state = TableState::default();
        state.select(view.selected);
        frame.render_stateful_widget(table, table_area, &mut state);
    }

    if let Some(load_more) = view.load_more {
        let (text, color) = match load_more {
            LoadMore::Available {
                next_page,
                remaining,
            } => (
                format!("  m  Load More (page {next_page}, {remaining} remaining)   a  fetch all"),
                ACCENT,
            ),
            LoadMore::Loading { page } => (format!("  ⟳ Loading page {page}…"), MUTED),
        };
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(color).bg(BG)),
            chunks[slot],
        );
    }
}

fn summary_card_spans(cards: &[SummaryCard], indicators: &[String]) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    for card in cards {
        let fg = tone_color(card.tone);
        let style = if card.active {
            Style::default()
                .fg(Color::Black)
                .bg(fg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(fg)
        };
        spans.push(Span::styled(format!(" {} {} ", card.label, card.count), style));
    }
    if !indicators.is_empty() {
        spans.push(Span::styled(
            format!("  󰈲 {}", indicators.join("  ")),
            Style::default().fg(WARN),
        ));
    }
    spans
}

fn tone_color(tone: StatusTone) -> Color {
    match tone {
        StatusTone::Good => ACCENT,
        StatusTone::Warn => WARN,
        StatusTone::Bad => ERROR,
        StatusTone::Neutral => Color::Rgb(147, 197, 253),
    }
}

fn render_detail(frame: &mut Frame, area: Rect, app: &App) {
    let Some(detail) = app.detail() else {
        return;
    };
    let block = Block::default()
        .title(format!("{}  (Esc to close)", detail.title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .style(Style::default().bg(PANEL));
    let paragraph = Paragraph::new(highlight_structured_text(&detail.body))
        .block(block)
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false })
        .scroll((detail.scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_console(frame: &mut Frame, area: Rect, app: &App) {
    let lines = app.console_lines();
    let height = area.height.saturating_sub(2) as usize;
    let start = lines.len().saturating_sub(height);
    let text = lines[start..]
        .iter()
        .map(|line| {
            if line.starts_with("$ ") {
                Line::from(Span::styled(line.clone(), Style::default().fg(ACCENT)))
            } else if line.starts_with("error:") {
                Line::from(Span::styled(line.clone(), Style::default().fg(ERROR)))
            } else {
                Line::from(line.clone())
            }
        })
        .collect::<Vec<_>>();

    let title = if app.mode() == InputMode::Console {
        "Console".to_string()
    } else {
        "Console  (i to type, `help` for commands)".to_string()
    };
    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, area);
}

fn render_manifest(frame: &mut Frame, area: Rect, app: &App) {
    let Some(preview) = app.manifest() else {
        let hint = Paragraph::new("Press i to load a manifest file, then u to upload it.")
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .title("YAML deploy")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(MUTED))
                    .style(Style::default().bg(PANEL)),
            )
            .style(Style::default().fg(MUTED));
        frame.render_widget(hint, area);
        return;
    };

    let summary_height = (preview.documents.len() as u16 + 2).min(area.height / 2).max(3);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(summary_height), Constraint::Min(3)])
        .split(area);

    let documents = preview
        .documents
        .iter()
        .map(|document| Line::from(format!("• {}", document.summary())))
        .collect::<Vec<_>>();
    frame.render_widget(
        Paragraph::new(documents)
            .block(
                Block::default()
                    .title(format!("{}  (u to upload)", preview.path.display()))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(ACCENT))
                    .style(Style::default().bg(PANEL)),
            )
            .style(Style::default().fg(Color::White)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(highlight_yaml_text(&preview.contents))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(preview.file_name.clone())
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(MUTED))
                    .style(Style::default().bg(PANEL)),
            ),
        chunks[1],
    );
}

fn render_namespaces(frame: &mut Frame, area: Rect, app: &App) {
    let scope = app.namespace_scope().label();
    let rows = app.namespace_details().iter().map(|summary| {
        let marker = if summary.name == scope { "● " } else { "  " };
        Row::new(vec![
            Cell::from(format!("{marker}{}", summary.name)),
            Cell::from(summary.pod_count.to_string()),
            Cell::from(value_text(&summary.resources.cpu)),
            Cell::from(value_text(&summary.resources.gpu)),
            Cell::from(value_text(&summary.resources.memory)),
        ])
        .style(Style::default().fg(Color::White))
    });
    let headers = ["NAME", "PODS", "CPU", "GPU", "MEMORY"];
    render_simple_table(
        frame,
        area,
        format!(
            "Namespaces ({})  Enter scope · c create · d describe · e events · x delete",
            app.namespace_details().len()
        ),
        &headers,
        rows.collect(),
        app.selected_index(),
    );
}

fn render_charts(frame: &mut Frame, area: Rect, app: &App) {
    let rows = app
        .charts()
        .iter()
        .map(|chart| {
            Row::new(vec![
                Cell::from(chart.name.clone()),
                Cell::from(chart.version.clone()),
                Cell::from(chart.app_version.clone()),
                Cell::from(chart.created.clone()),
                Cell::from(chart.description.clone()),
            ])
            .style(Style::default().fg(Color::White))
        })
        .collect();
    let headers = ["NAME", "VERSION", "APP VERSION", "CREATED", "DESCRIPTION"];
    render_simple_table(
        frame,
        area,
        format!("Charts ({})  Enter details · x delete", app.charts().len()),
        &headers,
        rows,
        app.selected_index(),
    );
}

fn render_settings(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(SETTINGS_ACTIONS.len() as u16 + 3),
            Constraint::Min(3),
        ])
        .split(area);

    let rows = SETTINGS_ACTIONS
        .iter()
        .map(|op| Row::new(vec![Cell::from(op.label())]).style(Style::default().fg(Color::White)))
        .collect();
    render_simple_table(
        frame,
        chunks[0],
        "Maintenance  (Enter to run)".to_string(),
        &["ACTION"],
        rows,
        app.selected_index(),
    );

    let health = app.health().unwrap_or("no health check yet");
    frame.render_widget(
        Paragraph::new(highlight_structured_text(health))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(format!(
                        "Health · {} · page size {}",
                        display_endpoint(app.server()),
                        app.page_size()
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(MUTED))
                    .style(Style::default().bg(PANEL)),
            ),
        chunks[1],
    );
}

fn render_simple_table(
    frame: &mut Frame,
    area: Rect,
    title: String,
    headers: &[&'static str],
    rows: Vec<Row<'static>>,
    selected: usize,
) {
    let len = rows.len();
    let header_row = Row::new(
        headers
            .iter()
            .map(|header| Cell::from(*header).style(Style::default().add_modifier(Modifier::BOLD))),
    )
    .height(1)
    .style(Style::default().fg(ACCENT));
    let table = Table::new(rows, column_widths(headers))
        .header(header_row)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .column_spacing(1)
        .row_highlight_style(
            Style::default()
                .bg(Color::Rgb(24, 36, 58))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("󰜴 ");

    let mut state = TableState::default();
    state.select((len > 0).then(|| selected.min(len - 1)));
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    if matches!(app.mode(), InputMode::Normal) {
        let status_text = app
            .pending_confirmation_prompt()
            .map(|pending| format!("{pending} (y/n)"))
            .unwrap_or_else(|| app.status().to_string());

        let mut bar = Powerline::default();
        let confirming = app.pending_confirmation_prompt().is_some();
        let status_bg = if confirming { WARN } else { PL_B };
        let status_fg = if confirming { Color::Black } else { Color::White };
        let status_icon = footer_status_icon(&status_text);
        bar.segment(" 󰘳 nrm ", Color::White, PL_A, status_bg);
        let status_width_hint = area.width.saturating_sub(24).min(120) as usize;
        bar.segment(
            format!(
                " {status_icon} {} ",
                ellipsize(&status_text, status_width_hint.max(24))
            ),
            status_fg,
            status_bg,
            BG,
        );

        let glance = if confirming {
            Powerline::default()
        } else {
            footer_glance(app)
        };
        let right_width = glance.width().min(area.width.saturating_sub(28));
        if right_width == 0 {
            frame.render_widget(
                Paragraph::new(Line::from(bar.spans)).style(Style::default().bg(BG)),
                area,
            );
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(1), Constraint::Length(right_width)])
            .split(area);
        frame.render_widget(
            Paragraph::new(Line::from(bar.spans)).style(Style::default().bg(BG)),
            chunks[0],
        );
        frame.render_widget(
            Paragraph::new(Line::from(glance.spans))
                .style(Style::default().bg(BG))
                .alignment(Alignment::Right),
            chunks[1],
        );
        return;
    }

    let (label, prompt, prompt_bg) = match app.mode() {
        InputMode::Search => (" 󰈲 srch ", format!("/{}", app.input()), WARN),
        InputMode::Command => (" 󰘳 cmd ", format!(":{}", app.input()), ACCENT),
        InputMode::Console => (" 󰆍 con ", format!("$ {}", app.input()), Color::Rgb(125, 211, 252)),
        InputMode::CreateNamespace => (" 󰉖 new ", format!("namespace: {}", app.input()), ACCENT),
        InputMode::ManifestPath => (" 󰈙 file ", format!("path: {}", app.input()), ACCENT),
        InputMode::Normal => (" ", String::new(), PL_A),
    };

    let mut bar = Powerline::default();
    bar.segment(label, Color::Black, prompt_bg, PL_B);
    bar.segment(format!(" {prompt}█ "), Color::White, PL_B, BG);
    let mut spans = bar.spans;
    if app.mode() == InputMode::CreateNamespace {
        spans.push(Span::styled(
            "  lowercase letters, digits and '-'",
            Style::default().fg(MUTED),
        ));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn footer_glance(app: &App) -> Powerline {
    let mut glance = Powerline::default();
    let Some(state) = app
        .location()
        .resource_kind()
        .and_then(|kind| app.store().state(kind))
    else {
        return glance;
    };

    glance.segment_rtl(
        format!(" p{}/{} ", state.current_page.max(1), state.total_pages),
        Color::White,
        PL_D,
        BG,
    );
    glance.segment_rtl(format!(" size {} ", state.page_size), Color::White, PL_C, PL_D);
    if let Some(sort) = &state.sort {
        glance.segment_rtl(
            format!(" {} {} ", sort.field.label(), sort.direction.arrow()),
            Color::White,
            PL_A,
            PL_C,
        );
    }
    glance
}

fn footer_status_icon(status_text: &str) -> &'static str {
    let status = status_text.to_ascii_lowercase();
    let has_failure = [
        "failed",
        "error",
        "invalid",
        "timed out",
        "unreachable",
        "refused",
        "outdated",
    ]
    .iter()
    .any(|needle| status.contains(needle));
    if has_failure { "󰅚" } else { "󰄬" }
}

fn highlight_structured_text(input: &str) -> Text<'static> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            let mut lines = Vec::new();
            json_lines(&value, None, 0, true, &mut lines);
            return Text::from(lines);
        }
    }
    highlight_yaml_text(input)
}

fn json_lines(
    value: &Value,
    key: Option<&str>,
    depth: usize,
    last: bool,
    out: &mut Vec<Line<'static>>,
) {
    let indent = "  ".repeat(depth);
    let comma = if last { "" } else { "," };
    let mut lead = vec![Span::raw(indent.clone())];
    if let Some(key) = key {
        lead.push(Span::styled(
            Value::String(key.to_string()).to_string(),
            Style::default().fg(KEY),
        ));
        lead.push(Span::styled(": ", Style::default().fg(MUTED)));
    }

    let children: Vec<(Option<&str>, &Value)> = match value {
        Value::Object(map) if !map.is_empty() => map
            .iter()
            .map(|(child_key, child)| (Some(child_key.as_str()), child))
            .collect(),
        Value::Array(items) if !items.is_empty() => {
            items.iter().map(|child| (None, child)).collect()
        }
        scalar => {
            lead.push(Span::styled(
                scalar.to_string(),
                Style::default().fg(json_scalar_color(scalar)),
            ));
            lead.push(Span::styled(comma, Style::default().fg(MUTED)));
            out.push(Line::from(lead));
            return;
        }
    };

    let (open, close) = if value.is_object() { ("{", "}") } else { ("[", "]") };
    lead.push(Span::styled(open, Style::default().fg(MUTED)));
    out.push(Line::from(lead));
    let count = children.len();
    for (index, (child_key, child)) in children.into_iter().enumerate() {
        json_lines(child, child_key, depth + 1, index + 1 == count, out);
    }
    out.push(Line::from(vec![
        Span::raw(indent),
        Span::styled(format!("{close}{comma}"), Style::default().fg(MUTED)),
    ]));
}

fn json_scalar_color(value: &Value) -> Color {
    match value {
        Value::String(_) => STRING,
        Value::Number(_) => NUMBER,
        Value::Bool(_) | Value::Null => WARN,
        _ => MUTED,
    }
}

fn highlight_yaml_text(input: &str) -> Text<'static> {
    Text::from(input.lines().map(highlight_yaml_line).collect::<Vec<_>>())
}

fn highlight_yaml_line(line: &str) -> Line<'static> {
    let body = line.trim_start();
    let mut spans = vec![Span::raw(line[..line.len() - body.len()].to_string())];
    if body.starts_with('#') || body == "---" || body == "..." {
        spans.push(Span::styled(body.to_string(), Style::default().fg(MUTED)));
        return Line::from(spans);
    }

    let body = match body.strip_prefix("- ") {
        Some(rest) => {
            spans.push(Span::styled("- ", Style::default().fg(ACCENT)));
            rest
        }
        None => body,
    };
    let pair = body
        .split_once(": ")
        .or_else(|| body.strip_suffix(':').map(|key| (key, "")));
    match pair {
        Some((key, value)) if !key.is_empty() && !key.contains(' ') => {
            spans.push(Span::styled(key.to_string(), Style::default().fg(KEY)));
            spans.push(Span::styled(":", Style::default().fg(MUTED)));
            let value = value.trim();
            if !value.is_empty() {
                spans.push(Span::raw(" "));
                spans.push(Span::styled(
                    value.to_string(),
                    Style::default().fg(yaml_scalar_color(value)),
                ));
            }
        }
        _ => spans.push(Span::styled(body.to_string(), Style::default().fg(Color::White))),
    }
    Line::from(spans)
}

fn yaml_scalar_color(raw: &str) -> Color {
    if raw.starts_with('"') || raw.starts_with('\'') {
        return STRING;
    }
    // Long values are plain text; parsing them per frame is wasted work.
    if raw.len() > 48 {
        return VALUE;
    }
    match serde_yaml::from_str::<serde_yaml::Value>(raw) {
        Ok(serde_yaml::Value::Bool(_) | serde_yaml::Value::Null) => WARN,
        Ok(serde_yaml::Value::Number(_)) => NUMBER,
        Ok(serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_)) => MUTED,
        _ => VALUE,
    }
}

/// Accumulates arrow-separated segments for the header and footer bars.
#[derive(Default)]
struct Powerline {
    spans: Vec<Span<'static>>,
}

impl Powerline {
    fn segment(&mut self, content: impl Into<String>, fg: Color, bg: Color, next_bg: Color) {
        self.spans.push(Span::styled(content.into(), segment_style(fg, bg)));
        self.spans
            .push(Span::styled("\u{e0b0}", Style::default().fg(bg).bg(next_bg)));
    }

    fn segment_rtl(&mut self, content: impl Into<String>, fg: Color, bg: Color, prev_bg: Color) {
        self.spans
            .push(Span::styled("\u{e0b2}", Style::default().fg(bg).bg(prev_bg)));
        self.spans.push(Span::styled(content.into(), segment_style(fg, bg)));
    }

    fn width(&self) -> u16 {
        self.spans.iter().map(Span::width).sum::<usize>() as u16
    }
}

fn segment_style(fg: Color, bg: Color) -> Style {
    Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD)
}

fn render_namespace_picker(frame: &mut Frame, app: &App, selected: usize) {
    let area = popup_area(frame.area(), 40, 60);
    frame.render_widget(Clear, area);

    let current = app.namespace_scope().label();
    let rows = app
        .namespace_choices()
        .into_iter()
        .map(|choice| {
            let marker = if choice == current { "● " } else { "  " };
            Row::new(vec![Cell::from(format!("{marker}{choice}"))])
                .style(Style::default().fg(Color::White))
        })
        .collect::<Vec<_>>();
    render_simple_table(
        frame,
        area,
        "Namespace scope  (Enter switch · Esc close)".to_string(),
        &["NAMESPACE"],
        rows,
        selected,
    );
}

fn render_help_modal(frame: &mut Frame, app: &App) {
    let area = popup_area(frame.area(), 78, 72);
    frame.render_widget(Clear, area);

    let rows = help_entries(app.active_tab())
        .into_iter()
        .map(|(keys, meaning)| {
            Row::new(vec![
                Cell::from(keys).style(Style::default().fg(ACCENT)),
                Cell::from(meaning).style(Style::default().fg(Color::White)),
            ])
        });
    let table = Table::new(rows, [Constraint::Length(18), Constraint::Fill(1)])
        .column_spacing(2)
        .block(
            Block::default()
                .title(format!(
                    "Help · mode {} · scope {} · tab {}",
                    help_mode_label(app.mode()),
                    app.namespace_scope(),
                    app.active_tab().title()
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        );
    frame.render_widget(table, area);
}

fn help_entries(tab: Tab) -> Vec<(&'static str, &'static str)> {
    let mut entries = vec![
        ("1..7  ←/→", "switch tab"),
        ("Alt+←/→  H/L", "history back/forward (Backspace back)"),
        ("j/k  gg/G", "move selection, jump to ends"),
        ("Ctrl+d/Ctrl+u", "page down/up"),
        ("s", "pick namespace scope"),
        ("Esc", "close detail or clear search"),
        (":", "ns · tab · <kind> · sort · status · search · page-size · all · more · health · q"),
    ];
    match tab {
        Tab::Home | Tab::Resources => entries.extend([
            ("Tab/S-Tab", "cycle resource kind"),
            ("/  f  F", "search · status filter · clear filters"),
            ("o  O", "cycle sort field · flip direction"),
            ("m  a  r", "load more · fetch all · refresh"),
            ("Enter  d  l", "pod details · describe · logs"),
            ("e  x", "namespace events · delete"),
        ]),
        Tab::Cli => entries.extend([
            ("i", "type a command"),
            ("describe|logs|delete", "<kind> <ns>/<name>"),
            ("exec", "<kind> <ns>/<name> -- <command>"),
        ]),
        Tab::Yaml => entries.extend([("i  u", "load a manifest path · upload it")]),
        Tab::Namespaces => entries.extend([
            ("Enter  c", "switch scope · create"),
            ("d  e  x", "describe · events · delete"),
            (":edit-ns :update-ns", "<name> [path]"),
        ]),
        Tab::Charts => entries.extend([("Enter  x  r", "details · delete · refresh")]),
        Tab::Settings => entries.extend([("Enter", "run the selected maintenance action")]),
    }
    entries
}

fn help_mode_label(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Normal => "normal",
        InputMode::Search => "search",
        InputMode::Command => "command",
        InputMode::Console => "console",
        InputMode::CreateNamespace => "create-namespace",
        InputMode::ManifestPath => "manifest",
    }
}

fn table_rows_visible(area: Rect) -> usize {
    area.height.saturating_sub(3).max(1) as usize
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(text) if text.is_empty() => "-".to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn ellipsize(value: &str, max_chars: usize) -> String {
    if value.char_indices().nth(max_chars).is_none() {
        return value.to_string();
    }
    let cut = value
        .char_indices()
        .nth(max_chars.saturating_sub(1))
        .map_or(0, |(offset, _)| offset);
    format!("{}…", &value[..cut])
}

fn display_endpoint(server: &str) -> String {
    let trimmed = server.trim().trim_end_matches('/');
    trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed)
        .to_string()
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}

fn column_widths(headers: &[&str]) -> Vec<Constraint> {
    headers
        .iter()
        .map(|header| match *header {
            "NAME" | "NAMESPACE" | "DESCRIPTION" => Constraint::Fill(3),
            "AGE" | "READY" | "PODS" | "RESTARTS" | "GPU" | "CPU" => Constraint::Length(9),
            _ => Constraint::Fill(1),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        Constraint, NUMBER, Powerline, Rect, Value, WARN, column_widths, display_endpoint,
        ellipsize, footer_status_icon, highlight_structured_text, highlight_yaml_line,
        popup_area, value_text, yaml_scalar_color,
    };
    use ratatui::style::Color;
    use serde_json::json;

    #[test]
    fn ellipsize_truncates_on_char_boundaries() {
        assert_eq!(ellipsize("kubedeck", 20), "kubedeck");
        assert_eq!(ellipsize("kubedeck", 8), "kubedeck");
        assert_eq!(ellipsize("kubedeck", 5), "kube…");
        assert_eq!(ellipsize("kubedeck", 1), "…");
        assert_eq!(ellipsize("żółć-ns", 4), "żół…");
    }

    #[test]
    fn endpoint_drops_scheme_and_trailing_slash() {
        assert_eq!(display_endpoint("http://127.0.0.1:5000/"), "127.0.0.1:5000");
        assert_eq!(display_endpoint("https://dash.example"), "dash.example");
    }

    #[test]
    fn value_text_renders_quantities() {
        assert_eq!(value_text(&json!("500m")), "500m");
        assert_eq!(value_text(&json!(4)), "4");
        assert_eq!(value_text(&Value::Null), "-");
    }

    #[test]
    fn json_detail_is_pretty_printed() {
        let text = highlight_structured_text(r#"{"a":1,"b":[true]}"#);
        let rendered = text
            .lines
            .iter()
            .map(|line| line.to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            rendered,
            vec!["{", "  \"a\": 1,", "  \"b\": [", "    true", "  ]", "}"]
        );
    }

    #[test]
    fn yaml_values_are_colored_by_scalar_type() {
        assert_eq!(yaml_scalar_color("3"), NUMBER);
        assert_eq!(yaml_scalar_color("true"), WARN);
        assert_eq!(yaml_scalar_color("~"), WARN);
        assert_eq!(yaml_scalar_color("nginx:1.27"), Color::Rgb(147, 197, 253));

        let line = highlight_yaml_line("  - name: web");
        assert_eq!(line.to_string(), "  - name: web");
        assert_eq!(line.spans[2].content, "name");
    }

    #[test]
    fn name_columns_get_the_widest_share() {
        assert_eq!(
            column_widths(&["NAME", "READY", "STATUS"]),
            vec![Constraint::Fill(3), Constraint::Length(9), Constraint::Fill(1)]
        );
    }

    #[test]
    fn popup_is_centered() {
        let area = popup_area(Rect::new(0, 0, 100, 50), 40, 60);
        assert_eq!(area, Rect::new(30, 10, 40, 30));
    }

    #[test]
    fn powerline_width_counts_separators() {
        let mut bar = Powerline::default();
        bar.segment(" ns ", Color::White, Color::Blue, Color::Black);
        bar.segment_rtl(" p1/3 ", Color::White, Color::Blue, Color::Black);
        assert_eq!(bar.width(), 12);
    }

    #[test]
    fn failure_statuses_get_error_icon() {
        assert_eq!(footer_status_icon("Pods load failed: timeout"), "󰅚");
        assert_eq!(footer_status_icon("Pods: 50 of 120 loaded"), "󰄬");
    }
}
