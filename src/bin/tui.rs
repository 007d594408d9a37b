mod tui_app;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use quantflow::catalog::{factor_label, FACTORS};
use quantflow::chart::{card_series, to_bars};
use quantflow::remote::{HttpScreener, DEFAULT_API_URL};
use quantflow::screener::ScreeningService;
use quantflow::session::ScanOutcome;
use quantflow::types::{SlopeBand, StockCard};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Sparkline, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tui_app::{
    change_color, format_change, format_price, source_host, tag_color, truncate, AppState,
    ConnectionStatus, Focus, HealthUpdate, StrategyRow,
};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

    let screener = match HttpScreener::new(base_url.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Client error: {e}");
            std::process::exit(1);
        }
    };

    let mut app = AppState::new(base_url);

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, screener).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    screener: Arc<HttpScreener>,
) -> io::Result<()> {
    let health_interval = Duration::from_secs(5);
    let (tx, mut rx) = mpsc::unbounded_channel::<ScanOutcome>();
    let (health_tx, mut health_rx) = mpsc::unbounded_channel::<HealthUpdate>();
    let service: Arc<dyn ScreeningService> = screener.clone();

    app.poll_health(screener.clone(), health_tx.clone());
    let mut last_health = std::time::Instant::now();

    loop {
        while let Ok(outcome) = rx.try_recv() {
            app.apply_outcome(outcome);
        }
        while let Ok(update) = health_rx.try_recv() {
            app.apply_health(update);
        }

        terminal.draw(|f| render(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                if let Some(buf) = app.query_input.as_mut() {
                    match key.code {
                        KeyCode::Enter => app.commit_query(),
                        KeyCode::Esc => app.query_input = None,
                        KeyCode::Backspace => {
                            buf.pop();
                        }
                        KeyCode::Char(c) => buf.push(c),
                        _ => {}
                    }
                    continue;
                }

                match key.code {
                    KeyCode::Char('q') | KeyCode::Char('Q') => {
                        app.session.abandon();
                        return Ok(());
                    }
                    KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::F(5) => {
                        app.trigger_scan(service.clone(), tx.clone());
                    }
                    KeyCode::Tab => {
                        app.focus = match app.focus {
                            Focus::Strategy => Focus::Results,
                            Focus::Results => Focus::Strategy,
                        };
                    }
                    KeyCode::Down | KeyCode::Char('j') => app.move_cursor(true),
                    KeyCode::Up | KeyCode::Char('k') => app.move_cursor(false),
                    KeyCode::Left | KeyCode::Char('h') if app.focus == Focus::Strategy => app.adjust(-1),
                    KeyCode::Right | KeyCode::Char('l') if app.focus == Focus::Strategy => app.adjust(1),
                    KeyCode::Enter | KeyCode::Char(' ') if app.focus == Focus::Strategy => app.activate(),
                    _ => {}
                }
            }
        }

        if last_health.elapsed() >= health_interval {
            app.poll_health(screener.clone(), health_tx.clone());
            last_health = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_body(f, app, chunks[1]);
    render_footer(f, app, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let model = app
        .health
        .as_ref()
        .map_or("—".to_string(), |h| h.model.clone());
    let scans = app
        .health
        .as_ref()
        .map_or("—".to_string(), |h| format!("{} scans / {} failed", h.scans_started, h.scans_failed));
    let p95 = app
        .latency_p95_ms
        .map_or("—".to_string(), |ms| format!("p95 {:.1}s", ms as f64 / 1000.0));
    let last = app
        .session
        .last_scan_at()
        .map_or("never".to_string(), |t| t.format("%H:%M:%S UTC").to_string());

    let spans = vec![
        Span::styled(
            " QuantFlow Scanner  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(model, Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(scans, Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(p95, Style::default().fg(Color::White)),
        Span::raw("  │  last scan "),
        Span::styled(last, Style::default().fg(Color::White)),
    ];

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(42),
            Constraint::Percentage(30),
            Constraint::Min(30),
        ])
        .split(area);

    render_strategy(f, app, cols[0]);
    render_results(f, app, cols[1]);
    render_detail(f, app, cols[2]);
}

fn panel(title: &str, focused: bool) -> Block<'static> {
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

fn render_strategy(f: &mut Frame, app: &AppState, area: Rect) {
    let cfg = &app.session.config;
    let focused = app.focus == Focus::Strategy;
    let label = Style::default().fg(Color::Yellow);

    let lines: Vec<Line> = app
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let (name, value, value_style) = match *row {
                StrategyRow::Market => ("市场", cfg.market_scope.short_label().to_string(), Style::default()),
                StrategyRow::CapTier => ("市值", cfg.market_cap_tier.label().to_string(), Style::default()),
                StrategyRow::Period => ("周期", cfg.trend_period.label().to_string(), Style::default()),
                StrategyRow::Sector => {
                    let style = if app.all_sectors() {
                        Style::default().fg(Color::Gray)
                    } else {
                        Style::default().fg(Color::White)
                    };
                    ("板块", truncate(app.sector_label(), 24), style)
                }
                StrategyRow::SlopeLow | StrategyRow::SlopeHigh => {
                    let bound = if *row == StrategyRow::SlopeLow {
                        cfg.slope_range.low()
                    } else {
                        cfg.slope_range.high()
                    };
                    let band = SlopeBand::from_slope(bound);
                    let name = if *row == StrategyRow::SlopeLow { "斜率下限" } else { "斜率上限" };
                    (
                        name,
                        format!("{bound:.2} {}", band.label()),
                        Style::default().fg(band_color(band)),
                    )
                }
                StrategyRow::Factor(idx) => {
                    let factor = &FACTORS[idx];
                    let on = app.session.is_factor_selected(factor.id);
                    let mark = if on { "[x]" } else { "[ ]" };
                    let style = if on {
                        Style::default().fg(Color::Green)
                    } else {
                        Style::default().fg(Color::Gray)
                    };
                    ("", format!("{mark} {}", truncate(factor.label, 30)), style)
                }
                StrategyRow::Query => {
                    let text = match &app.query_input {
                        Some(buf) => format!("{buf}▏"),
                        None => cfg.custom_query.clone().unwrap_or_else(|| "—".to_string()),
                    };
                    ("自定义", truncate(&text, 28), Style::default().fg(Color::White))
                }
            };

            let cursor = focused && i == app.row_cursor;
            let prefix = if cursor { "▶ " } else { "  " };
            let mut spans = vec![Span::styled(prefix, Style::default().fg(Color::Cyan))];
            if !name.is_empty() {
                spans.push(Span::styled(format!("{name}: "), label));
            }
            let value_style = if cursor { value_style.add_modifier(Modifier::BOLD) } else { value_style };
            spans.push(Span::styled(value, value_style));
            Line::from(spans)
        })
        .collect();

    f.render_widget(Paragraph::new(lines).block(panel("STRATEGY", focused)), area);
}

fn render_results(f: &mut Frame, app: &AppState, area: Rect) {
    let focused = app.focus == Focus::Results;
    let block = panel("RESULTS", focused);
    let market = app.results_market;

    if app.session.is_loading() {
        let p = Paragraph::new("正在联网检索并分析…").style(Style::default().fg(Color::Yellow)).block(block);
        f.render_widget(p, area);
        return;
    }
    if let Some(err) = app.session.last_error() {
        let p = Paragraph::new(vec![
            Line::from(Span::styled(err.user_message(), Style::default().fg(Color::Red))),
            Line::from(Span::styled(truncate(err.detail(), 120), Style::default().fg(Color::DarkGray))),
        ])
        .wrap(Wrap { trim: true })
        .block(block);
        f.render_widget(p, area);
        return;
    }
    if app.session.results().is_empty() {
        let msg = if app.session.has_scanned() { "没有符合条件的标的" } else { "按 [s] 开始扫描" };
        f.render_widget(Paragraph::new(msg).style(Style::default().fg(Color::DarkGray)).block(block), area);
        return;
    }

    let items: Vec<ListItem> = app
        .session
        .results()
        .iter()
        .map(|card| {
            let band = card.slope_band();
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<10}", truncate(&card.symbol, 10)), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(format!("{:<9}", format_price(card.price, market))),
                Span::styled(
                    format!("{:>8} ", format_change(card.change_percent)),
                    Style::default().fg(change_color(card.change_percent, market)),
                ),
                Span::styled(
                    card.slope.map_or("—".to_string(), |s| format!("{s:.2}")),
                    Style::default().fg(band_color(band)),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    let mut state = ListState::default();
    state.select(Some(app.selected_card));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_detail(f: &mut Frame, app: &AppState, area: Rect) {
    let Some(card) = app.selected() else {
        let cfg = &app.session.config;
        let factors: Vec<&str> = cfg.selected_factors.iter().map(|id| factor_label(id)).collect();
        let summary = Paragraph::new(vec![
            Line::from(format!("{} · {} · {}", cfg.market_scope.short_label(), cfg.market_cap_tier.label(), cfg.trend_period.label())),
            Line::from(format!(
                "斜率 {:.2} – {:.2}",
                cfg.slope_range.low(),
                cfg.slope_range.high()
            )),
            Line::from(factors.join(" / ")),
        ])
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true })
        .block(panel("DETAIL", false));
        f.render_widget(summary, area);
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(0)])
        .split(area);

    let band = card.slope_band();
    let chart = Sparkline::default()
        .block(panel(&format!("{} {}", card.symbol, truncate(&card.name, 16)), false))
        .style(Style::default().fg(band_color(band)))
        .data(to_bars(&card_series(card)));
    f.render_widget(chart, rows[0]);

    f.render_widget(
        Paragraph::new(detail_lines(card, app))
            .wrap(Wrap { trim: true })
            .block(panel("ANALYSIS", false)),
        rows[1],
    );
}

fn detail_lines<'a>(card: &'a StockCard, app: &AppState) -> Vec<Line<'a>> {
    let market = app.results_market;
    let band = card.slope_band();
    let heading = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let mut lines = vec![Line::from(vec![
        Span::raw(format_price(card.price, market)),
        Span::raw("  "),
        Span::styled(format_change(card.change_percent), Style::default().fg(change_color(card.change_percent, market))),
        Span::raw(format!("  市值 {}", card.market_cap)),
        Span::raw("  "),
        Span::styled(
            format!("[{} {}]", card.slope.map_or("—".to_string(), |s| format!("{s:.2}")), band.label()),
            Style::default().fg(band_color(band)).add_modifier(Modifier::BOLD),
        ),
    ])];

    if !card.tags.is_empty() {
        let mut spans = Vec::new();
        for tag in &card.tags {
            spans.push(Span::styled(format!("#{} ", tag.label), Style::default().fg(tag_color(tag.kind))));
        }
        lines.push(Line::from(spans));
    }

    let a = &card.analysis;
    for (title, body) in [
        (a.event_title.as_str(), a.event_content.as_str()),
        ("AI 逻辑", a.ai_logic.as_str()),
        ("技术诊断", a.tech_diagnosis.as_str()),
        ("资金分析", a.fund_analysis.as_str()),
    ] {
        if body.is_empty() {
            continue;
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(if title.is_empty() { "事件" } else { title }, heading)));
        lines.push(Line::from(body));
    }

    if card.net_inflow.is_some() || card.volume.is_some() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("资金", heading)));
        let mut spans = Vec::new();
        if let Some(inflow) = &card.net_inflow {
            let color = if inflow.trim_start().starts_with('-') { Color::Green } else { Color::Red };
            spans.push(Span::raw("主力净流入 "));
            spans.push(Span::styled(inflow.as_str(), Style::default().fg(color)));
        }
        if let Some(volume) = &card.volume {
            if !spans.is_empty() {
                spans.push(Span::raw(" · "));
            }
            spans.push(Span::raw(format!("成交量 {volume}")));
        }
        lines.push(Line::from(spans));
    }

    if let Some(t) = &card.technical {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("通道信号", heading)));
        let width = t.channel_width.map_or("—".to_string(), |w| format!("{w:.0}"));
        lines.push(Line::from(format!(
            "{} · {} · 宽度 {width}{}",
            t.channel_status,
            t.control_status,
            if t.resonance_60m { " · 60m 共振" } else { "" }
        )));
    }

    if !card.sources.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("来源", heading)));
        for s in &card.sources {
            let host = source_host(&s.uri).map_or(String::new(), |h| format!(" ({h})"));
            lines.push(Line::from(vec![
                Span::raw(format!("· {}", truncate(&s.title, 48))),
                Span::styled(host, Style::default().fg(Color::Cyan)),
            ]));
            lines.push(Line::from(Span::styled(
                format!("  {}", s.uri),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::UNDERLINED),
            )));
        }
    }
    lines
}

fn render_footer(f: &mut Frame, app: &AppState, area: Rect) {
    let line = if app.query_input.is_some() {
        Line::from(vec![
            Span::styled(" [Enter] ", Style::default().fg(Color::Yellow)),
            Span::raw("save  "),
            Span::styled("[Esc] ", Style::default().fg(Color::Yellow)),
            Span::raw("cancel"),
        ])
    } else {
        Line::from(vec![
            Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
            Span::raw("quit  "),
            Span::styled("[s] ", Style::default().fg(Color::Yellow)),
            Span::raw("scan  "),
            Span::styled("[Tab] ", Style::default().fg(Color::Yellow)),
            Span::raw("focus  "),
            Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
            Span::raw("move  "),
            Span::styled("[←→ / Enter] ", Style::default().fg(Color::Yellow)),
            Span::raw("change  "),
            Span::styled(app.base_url.clone(), Style::default().fg(Color::DarkGray)),
        ])
    };
    f.render_widget(Paragraph::new(line).style(Style::default().fg(Color::White)), area);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn band_color(band: SlopeBand) -> Color {
    match band {
        SlopeBand::Flat => Color::DarkGray,
        SlopeBand::Building => Color::Blue,
        SlopeBand::Steady => Color::Green,
        SlopeBand::Explosive => Color::Magenta,
    }
}
