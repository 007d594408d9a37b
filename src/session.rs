//! Scan lifecycle for one interactive user: filter state, the loading flag and
//! the latest outcome.
//!
//! At most one request is outstanding per session. Each request carries a
//! generation number; an outcome whose generation is no longer current
//! (superseded or abandoned) is dropped on arrival.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::catalog::{Sector, ALL_SECTORS};
use crate::error::ScanError;
use crate::screener::ScreeningService;
use crate::types::{MarketScope, ScanResult, Source, StockCard, StrategyConfig};

/// Permission to run one scan, with the configuration captured at trigger time.
#[derive(Debug, Clone)]
pub struct ScanTicket {
    pub generation: u64,
    pub config: StrategyConfig,
}

/// Result of a spawned scan, delivered back to the session's owner.
#[derive(Debug)]
pub struct ScanOutcome {
    pub generation: u64,
    pub result: Result<ScanResult, ScanError>,
}

#[derive(Debug, Default)]
pub struct ScanSession {
    pub config: StrategyConfig,
    results: Vec<StockCard>,
    citations: Vec<Source>,
    last_error: Option<ScanError>,
    has_scanned: bool,
    last_scan_at: Option<DateTime<Utc>>,
    generation: u64,
    outstanding: Option<u64>,
}

impl ScanSession {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn is_loading(&self) -> bool {
        self.outstanding.is_some()
    }

    pub fn has_scanned(&self) -> bool {
        self.has_scanned
    }

    pub fn results(&self) -> &[StockCard] {
        &self.results
    }

    pub fn citations(&self) -> &[Source] {
        &self.citations
    }

    pub fn last_error(&self) -> Option<&ScanError> {
        self.last_error.as_ref()
    }

    pub fn last_scan_at(&self) -> Option<DateTime<Utc>> {
        self.last_scan_at
    }

    /// Start a scan. Returns `None` while another scan is outstanding.
    pub fn begin_scan(&mut self) -> Option<ScanTicket> {
        if self.outstanding.is_some() {
            debug!("scan trigger ignored: request already in flight");
            return None;
        }
        self.generation += 1;
        self.outstanding = Some(self.generation);
        self.has_scanned = true;
        Some(ScanTicket { generation: self.generation, config: self.config.clone() })
    }

    /// Apply an outcome. Returns false when the outcome belongs to a superseded
    /// or abandoned request and was discarded.
    pub fn finish(&mut self, generation: u64, result: Result<ScanResult, ScanError>) -> bool {
        if self.outstanding != Some(generation) {
            debug!(generation, current = ?self.outstanding, "discarding stale scan outcome");
            return false;
        }
        self.outstanding = None;
        match result {
            Ok(r) => {
                info!(records = r.records.len(), "scan results applied");
                self.results = r.records;
                self.citations = r.citations;
                self.last_scan_at = Some(r.generated_at);
                self.last_error = None;
            }
            Err(e) => {
                info!(error = %e, "scan failed");
                self.results.clear();
                self.citations.clear();
                self.last_error = Some(e);
            }
        }
        true
    }

    /// Forget the outstanding request; its outcome will be discarded.
    pub fn abandon(&mut self) {
        if let Some(g) = self.outstanding.take() {
            debug!(generation = g, "scan abandoned");
        }
    }

    /// Run a scan in place. Returns false when a scan was already outstanding.
    pub async fn run_scan(&mut self, service: &dyn ScreeningService) -> bool {
        let Some(ticket) = self.begin_scan() else {
            return false;
        };
        let result = service.request_screening(&ticket.config).await;
        self.finish(ticket.generation, result)
    }

    /// Spawn a scan on the runtime; the outcome arrives on `tx`. Returns false
    /// (and issues no request) when a scan is already outstanding.
    pub fn trigger(
        &mut self,
        service: Arc<dyn ScreeningService>,
        tx: mpsc::UnboundedSender<ScanOutcome>,
    ) -> bool {
        let Some(ticket) = self.begin_scan() else {
            return false;
        };
        tokio::spawn(async move {
            let result = service.request_screening(&ticket.config).await;
            // Receiver gone means the owner shut down; nothing left to update.
            let _ = tx.send(ScanOutcome { generation: ticket.generation, result });
        });
        true
    }

    // -----------------------------------------------------------------------
    // Form mutators
    // -----------------------------------------------------------------------

    pub fn set_market(&mut self, market: MarketScope) {
        self.config.market_scope = market;
    }

    pub fn toggle_market(&mut self) {
        self.config.market_scope = self.config.market_scope.toggled();
    }

    pub fn cycle_cap_tier(&mut self) {
        self.config.market_cap_tier = self.config.market_cap_tier.next();
    }

    pub fn cycle_trend_period(&mut self) {
        self.config.trend_period = self.config.trend_period.next();
    }

    pub fn toggle_factor(&mut self, id: &str) {
        let factors = &mut self.config.selected_factors;
        if let Some(pos) = factors.iter().position(|f| f == id) {
            factors.remove(pos);
        } else {
            factors.push(id.to_string());
        }
    }

    pub fn is_factor_selected(&self, id: &str) -> bool {
        self.config.selected_factors.iter().any(|f| f == id)
    }

    /// Single-select sector; the catch-all entry clears the selection.
    pub fn select_sector(&mut self, sector: &Sector) {
        if sector.id == ALL_SECTORS {
            self.config.selected_sectors.clear();
        } else {
            self.config.selected_sectors = vec![sector.label.to_string()];
        }
    }

    pub fn set_custom_query(&mut self, query: &str) {
        let q = query.trim();
        self.config.custom_query = if q.is_empty() { None } else { Some(q.to_string()) };
    }

    pub fn nudge_slope_low(&mut self, steps: i32) -> bool {
        self.config.slope_range.nudge_low(steps)
    }

    pub fn nudge_slope_high(&mut self, steps: i32) -> bool {
        self.config.slope_range.nudge_high(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{sector, SECTORS};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Counts calls and holds each one open until released.
    struct GatedService {
        calls: AtomicUsize,
        gate: Notify,
        fail: bool,
    }

    impl GatedService {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), gate: Notify::new(), fail })
        }
    }

    #[async_trait]
    impl ScreeningService for GatedService {
        async fn request_screening(&self, _config: &StrategyConfig) -> Result<ScanResult, ScanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            if self.fail {
                Err(ScanError::Transport("down".to_string()))
            } else {
                Ok(ScanResult { records: vec![], citations: vec![], generated_at: Utc::now() })
            }
        }
    }

    fn card(symbol: &str) -> StockCard {
        serde_json::from_value(serde_json::json!({ "symbol": symbol })).unwrap()
    }

    #[tokio::test]
    async fn second_trigger_while_outstanding_issues_no_call() {
        let service = GatedService::new(false);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = ScanSession::default();

        assert!(session.trigger(service.clone(), tx.clone()));
        assert!(!session.trigger(service.clone(), tx.clone()));
        assert!(session.is_loading());

        // Let the spawned task reach the gate, then release it.
        while service.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        service.gate.notify_one();
        let outcome = rx.recv().await.unwrap();
        assert!(session.finish(outcome.generation, outcome.result));
        assert!(!session.is_loading());
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);

        // Re-enabled: exactly one new call.
        assert!(session.trigger(service.clone(), tx.clone()));
        while service.calls.load(Ordering::SeqCst) == 1 {
            tokio::task::yield_now().await;
        }
        service.gate.notify_one();
        let outcome = rx.recv().await.unwrap();
        session.finish(outcome.generation, outcome.result);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_resets_loading_and_allows_retry() {
        let service = GatedService::new(true);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = ScanSession::default();

        session.trigger(service.clone(), tx.clone());
        service.gate.notify_one();
        let outcome = rx.recv().await.unwrap();
        session.finish(outcome.generation, outcome.result);

        assert!(!session.is_loading());
        assert!(matches!(session.last_error(), Some(ScanError::Transport(_))));
        assert!(session.trigger(service.clone(), tx));
    }

    #[test]
    fn stale_outcome_is_discarded() {
        let mut session = ScanSession::default();
        let first = session.begin_scan().unwrap();
        session.abandon();
        let second = session.begin_scan().unwrap();

        let stale = ScanResult { records: vec![card("OLD")], citations: vec![], generated_at: Utc::now() };
        assert!(!session.finish(first.generation, Ok(stale)));
        assert!(session.is_loading());

        let fresh = ScanResult { records: vec![card("NEW")], citations: vec![], generated_at: Utc::now() };
        assert!(session.finish(second.generation, Ok(fresh)));
        assert_eq!(session.results()[0].symbol, "NEW");
    }

    #[test]
    fn success_replaces_results_and_clears_error() {
        let mut session = ScanSession::default();
        let t = session.begin_scan().unwrap();
        session.finish(t.generation, Err(ScanError::Format("x".to_string())));
        assert!(session.results().is_empty());
        assert!(session.last_error().is_some());

        let t = session.begin_scan().unwrap();
        let ok = ScanResult { records: vec![card("A"), card("B")], citations: vec![], generated_at: Utc::now() };
        session.finish(t.generation, Ok(ok));
        assert_eq!(session.results().len(), 2);
        assert!(session.last_error().is_none());
        assert!(session.has_scanned());
    }

    #[test]
    fn ticket_snapshots_config() {
        let mut session = ScanSession::default();
        let ticket = session.begin_scan().unwrap();
        session.toggle_market();
        assert_eq!(ticket.config.market_scope, MarketScope::US);
        assert_eq!(session.config.market_scope, MarketScope::CN);
    }

    #[test]
    fn form_mutators() {
        let mut session = ScanSession::default();
        session.toggle_factor("fund_inflow");
        assert!(session.is_factor_selected("fund_inflow"));
        session.toggle_factor("fund_inflow");
        assert!(!session.is_factor_selected("fund_inflow"));

        let semi = sector("semi").unwrap();
        session.select_sector(semi);
        assert_eq!(session.config.selected_sectors, vec![semi.label.to_string()]);
        session.select_sector(&SECTORS[0]);
        assert!(session.config.selected_sectors.is_empty());

        session.set_custom_query("   ");
        assert!(session.config.custom_query.is_none());
        session.set_custom_query(" 低空经济 ");
        assert_eq!(session.config.custom_query.as_deref(), Some("低空经济"));
    }

    #[tokio::test]
    async fn run_scan_in_place() {
        struct Immediate;
        #[async_trait]
        impl ScreeningService for Immediate {
            async fn request_screening(&self, _c: &StrategyConfig) -> Result<ScanResult, ScanError> {
                Ok(ScanResult { records: vec![], citations: vec![], generated_at: Utc::now() })
            }
        }
        let mut session = ScanSession::default();
        assert!(session.run_scan(&Immediate).await);
        assert!(!session.is_loading());
        assert!(session.has_scanned());
    }
}
