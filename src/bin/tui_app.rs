use std::sync::Arc;

use quantflow::api::routes::{HealthResponse, LatencyResponse};
use quantflow::catalog::{ALL_SECTORS, FACTORS, SECTORS};
use quantflow::remote::HttpScreener;
use quantflow::error::ScanError;
use quantflow::screener::ScreeningService;
use quantflow::session::{ScanOutcome, ScanSession};
use quantflow::types::{MarketScope, StockCard, StrategyConfig, TagKind};
use ratatui::style::Color;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Strategy panel rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyRow {
    Market,
    CapTier,
    Period,
    Sector,
    SlopeLow,
    SlopeHigh,
    Factor(usize),
    Query,
}

impl StrategyRow {
    pub fn all() -> Vec<StrategyRow> {
        let mut rows = vec![
            StrategyRow::Market,
            StrategyRow::CapTier,
            StrategyRow::Period,
            StrategyRow::Sector,
            StrategyRow::SlopeLow,
            StrategyRow::SlopeHigh,
        ];
        rows.extend((0..FACTORS.len()).map(StrategyRow::Factor));
        rows.push(StrategyRow::Query);
        rows
    }
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Strategy,
    Results,
}

pub struct AppState {
    pub session: ScanSession,
    pub status: ConnectionStatus,
    pub health: Option<HealthResponse>,
    /// p95 scan round-trip reported by the service, in ms.
    pub latency_p95_ms: Option<u64>,
    pub focus: Focus,
    pub rows: Vec<StrategyRow>,
    pub row_cursor: usize,
    pub sector_index: usize,
    pub selected_card: usize,
    /// Some while the custom query is being edited.
    pub query_input: Option<String>,
    /// A health poll is in flight.
    pub health_pending: bool,
    /// Market the current results were requested for.
    pub results_market: MarketScope,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        let config = StrategyConfig::default();
        let results_market = config.market_scope;
        Self {
            session: ScanSession::new(config),
            status: ConnectionStatus::Connecting,
            health: None,
            latency_p95_ms: None,
            health_pending: false,
            focus: Focus::Strategy,
            rows: StrategyRow::all(),
            row_cursor: 0,
            sector_index: 0,
            selected_card: 0,
            query_input: None,
            results_market,
            base_url,
        }
    }

    pub fn current_row(&self) -> StrategyRow {
        self.rows[self.row_cursor.min(self.rows.len() - 1)]
    }

    pub fn sector_label(&self) -> &'static str {
        SECTORS[self.sector_index].label
    }

    pub fn selected(&self) -> Option<&StockCard> {
        self.session.results().get(self.selected_card)
    }

    pub fn move_cursor(&mut self, down: bool) {
        match self.focus {
            Focus::Strategy => {
                let max = self.rows.len() - 1;
                self.row_cursor = if down {
                    (self.row_cursor + 1).min(max)
                } else {
                    self.row_cursor.saturating_sub(1)
                };
            }
            Focus::Results => {
                let max = self.session.results().len().saturating_sub(1);
                self.selected_card = if down {
                    (self.selected_card + 1).min(max)
                } else {
                    self.selected_card.saturating_sub(1)
                };
            }
        }
    }

    /// Left/right on the focused strategy row. `dir` is -1 or +1.
    pub fn adjust(&mut self, dir: i32) {
        match self.current_row() {
            StrategyRow::Market => self.session.toggle_market(),
            StrategyRow::CapTier => self.session.cycle_cap_tier(),
            StrategyRow::Period => self.session.cycle_trend_period(),
            StrategyRow::Sector => {
                let n = SECTORS.len() as i32;
                self.sector_index = (self.sector_index as i32 + dir).rem_euclid(n) as usize;
                self.session.select_sector(&SECTORS[self.sector_index]);
            }
            StrategyRow::SlopeLow => {
                self.session.nudge_slope_low(dir);
            }
            StrategyRow::SlopeHigh => {
                self.session.nudge_slope_high(dir);
            }
            StrategyRow::Factor(i) => self.session.toggle_factor(FACTORS[i].id),
            StrategyRow::Query => {}
        }
    }

    /// Enter / space on the focused strategy row.
    pub fn activate(&mut self) {
        match self.current_row() {
            StrategyRow::Factor(i) => self.session.toggle_factor(FACTORS[i].id),
            StrategyRow::Query => {
                self.query_input = Some(self.session.config.custom_query.clone().unwrap_or_default());
            }
            _ => self.adjust(1),
        }
    }

    pub fn commit_query(&mut self) {
        if let Some(q) = self.query_input.take() {
            self.session.set_custom_query(&q);
        }
    }

    pub fn trigger_scan(
        &mut self,
        service: Arc<dyn ScreeningService>,
        tx: mpsc::UnboundedSender<ScanOutcome>,
    ) -> bool {
        let market = self.session.config.market_scope;
        if !self.session.trigger(service, tx) {
            return false;
        }
        self.results_market = market;
        true
    }

    pub fn apply_outcome(&mut self, outcome: ScanOutcome) {
        if self.session.finish(outcome.generation, outcome.result) {
            self.selected_card = 0;
            self.focus = if self.session.results().is_empty() {
                Focus::Strategy
            } else {
                Focus::Results
            };
        }
    }

    /// Start a background health poll unless one is still running. The result
    /// arrives on `tx`, so an unreachable service never blocks input.
    pub fn poll_health(&mut self, screener: Arc<HttpScreener>, tx: mpsc::UnboundedSender<HealthUpdate>) {
        if self.health_pending {
            return;
        }
        self.health_pending = true;
        tokio::spawn(async move {
            let update = fetch_health(&screener).await;
            let _ = tx.send(update);
        });
    }

    pub fn apply_health(&mut self, update: HealthUpdate) {
        self.health_pending = false;
        match update.health {
            Ok(h) => {
                self.health = Some(h);
                self.status = ConnectionStatus::Connected;
            }
            Err(e) => {
                self.status = ConnectionStatus::Error(e.detail().to_string());
                return;
            }
        }
        if let Some(l) = update.latency {
            self.latency_p95_ms = l.p95_ms;
        }
    }

    /// True when the sector row shows the catch-all entry.
    pub fn all_sectors(&self) -> bool {
        SECTORS[self.sector_index].id == ALL_SECTORS
    }
}

// ---------------------------------------------------------------------------
// Health polling
// ---------------------------------------------------------------------------

pub struct HealthUpdate {
    pub health: Result<HealthResponse, ScanError>,
    pub latency: Option<LatencyResponse>,
}

pub async fn fetch_health(screener: &HttpScreener) -> HealthUpdate {
    let health = screener.health().await;
    let latency = if health.is_ok() { screener.latency().await.ok() } else { None };
    HealthUpdate { health, latency }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_price(price: f64, market: MarketScope) -> String {
    format!("{}{:.2}", market.currency(), price)
}

pub fn format_change(pct: f64) -> String {
    if pct > 0.0 {
        format!("+{pct:.2}%")
    } else {
        format!("{pct:.2}%")
    }
}

/// A-share convention: red up, green down. US: green up, red down.
pub fn change_color(pct: f64, market: MarketScope) -> Color {
    let (up, down) = match market {
        MarketScope::CN => (Color::Red, Color::Green),
        MarketScope::US => (Color::Green, Color::Red),
    };
    if pct > 0.0 {
        up
    } else if pct < 0.0 {
        down
    } else {
        Color::Gray
    }
}

pub fn tag_color(kind: TagKind) -> Color {
    match kind {
        TagKind::Bullish => Color::LightRed,
        TagKind::Bearish => Color::LightGreen,
        TagKind::Event => Color::Yellow,
        TagKind::Neutral => Color::Gray,
    }
}

/// Host part of a citation link, for a compact label next to the title.
pub fn source_host(uri: &str) -> Option<String> {
    reqwest::Url::parse(uri)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
