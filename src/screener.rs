use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, info, warn};

use crate::error::ScanError;
use crate::extract::extract_array;
use crate::normalize::{normalize_records, select_citations};
use crate::prompt::{beijing_now, build_prompt};
use crate::types::{ScanResult, Source, StrategyConfig};

/// Raw completion returned by a hosted model.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Grounding citations in the order the service reported them.
    pub citations: Vec<Source>,
}

/// A text-completion service with search grounding.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Completion, ScanError>;
}

/// The screening capability: one configuration in, one result set or typed error out.
#[async_trait]
pub trait ScreeningService: Send + Sync {
    async fn request_screening(&self, config: &StrategyConfig) -> Result<ScanResult, ScanError>;
}

/// Prompt -> model -> extraction -> normalisation.
pub struct Screener<B> {
    backend: B,
    clock: fn() -> DateTime<FixedOffset>,
}

impl<B: ModelBackend> Screener<B> {
    pub fn new(backend: B) -> Self {
        Self { backend, clock: beijing_now }
    }

    /// Use a fixed clock, so prompts are reproducible.
    pub fn with_clock(backend: B, clock: fn() -> DateTime<FixedOffset>) -> Self {
        Self { backend, clock }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: ModelBackend> ScreeningService for Screener<B> {
    async fn request_screening(&self, config: &StrategyConfig) -> Result<ScanResult, ScanError> {
        let prompt = build_prompt(config, (self.clock)());
        info!(
            market = %config.market_scope,
            cap = %config.market_cap_tier,
            period = %config.trend_period,
            factors = config.selected_factors.len(),
            sectors = config.selected_sectors.len(),
            "scan started"
        );
        debug!(prompt_chars = prompt.chars().count(), "prompt rendered");

        let completion = self.backend.generate(&prompt).await.map_err(|e| {
            warn!(error = %e, "model call failed");
            e
        })?;

        let items = extract_array(&completion.text).map_err(|e| {
            warn!(error = %e, "completion held no usable data");
            e
        })?;
        let citations = select_citations(&completion.citations);
        let records = normalize_records(items, config.market_scope, &config.slope_range, &citations)?;

        info!(records = records.len(), citations = citations.len(), "scan complete");
        Ok(ScanResult { records, citations, generated_at: Utc::now() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketCapTier, MarketScope, SlopeRange, TrendPeriod};
    use std::sync::Mutex;

    /// Replays a canned completion and remembers the prompts it saw.
    struct FixtureBackend {
        reply: Result<Completion, ScanError>,
        prompts: Mutex<Vec<String>>,
    }

    impl FixtureBackend {
        fn new(reply: Result<Completion, ScanError>) -> Self {
            Self { reply, prompts: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ModelBackend for FixtureBackend {
        async fn generate(&self, prompt: &str) -> Result<Completion, ScanError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }

    fn fixed_clock() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-03-02T09:30:00+08:00").unwrap()
    }

    fn cn_config() -> StrategyConfig {
        StrategyConfig {
            market_scope: MarketScope::CN,
            market_cap_tier: MarketCapTier::Small,
            trend_period: TrendPeriod::Days10,
            slope_range: SlopeRange::new(0.35, 1.0).unwrap(),
            selected_factors: vec!["channel_breakout".to_string()],
            selected_sectors: vec!["半导体".to_string()],
            custom_query: None,
        }
    }

    fn completion(text: &str) -> Completion {
        Completion {
            text: text.to_string(),
            citations: vec![
                Source { title: "新浪财经".to_string(), uri: "https://finance.sina.example/1".to_string() },
                Source { title: "东方财富".to_string(), uri: "https://eastmoney.example/2".to_string() },
            ],
        }
    }

    #[tokio::test]
    async fn full_pipeline_normalises_fixture() {
        let text = "分析如下：\n```json\n[\n {\"symbol\":\"600519\",\"name\":\"贵州茅台\",\"price\":1500.5,\"change_percent\":1.2,\"market_cap\":\"1.9万亿\",\"slope\":0.9},\n {\"symbol\":\"002371\",\"name\":\"北方华创\",\"price\":300,\"change_percent\":-0.4,\"market_cap\":\"1600亿\"}\n]\n```";
        let screener = Screener::with_clock(FixtureBackend::new(Ok(completion(text))), fixed_clock);

        let result = screener.request_screening(&cn_config()).await.unwrap();
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].symbol, "600519.SS");
        assert_eq!(result.records[1].symbol, "002371.SZ");
        assert_eq!(result.records[1].slope, Some(0.45));
        assert_eq!(result.citations.len(), 2);
        assert_eq!(result.records[1].sources, result.citations);

        let prompts = screener.backend().prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("2026/03/02 09:30:00"));
        assert!(prompts[0].contains("半导体"));
    }

    #[tokio::test]
    async fn prose_only_reply_is_format_error() {
        let screener = Screener::with_clock(
            FixtureBackend::new(Ok(completion("今日无符合条件的股票。"))),
            fixed_clock,
        );
        let err = screener.request_screening(&cn_config()).await.unwrap_err();
        assert!(matches!(err, ScanError::Format(_)));
    }

    #[tokio::test]
    async fn backend_failure_propagates_unchanged() {
        let screener = Screener::with_clock(
            FixtureBackend::new(Err(ScanError::Transport("connection reset".to_string()))),
            fixed_clock,
        );
        let err = screener.request_screening(&cn_config()).await.unwrap_err();
        assert_eq!(err, ScanError::Transport("connection reset".to_string()));
    }

    #[tokio::test]
    async fn empty_array_is_empty_success() {
        let screener =
            Screener::with_clock(FixtureBackend::new(Ok(completion("```json\n[]\n```"))), fixed_clock);
        let result = screener.request_screening(&cn_config()).await.unwrap();
        assert!(result.records.is_empty());
    }
}
