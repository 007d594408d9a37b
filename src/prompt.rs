//! Prompt template for the hosted quant-analyst model.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::catalog::{factor_label, CATALYST_FACTOR};
use crate::types::{MarketCapTier, MarketScope, StrategyConfig};

const DEFAULT_SECTOR: &str = "当前市场热点";
const DEFAULT_FACTORS: &str = "量价齐升";

/// Current time on the Beijing clock (UTC+8), which the template quotes.
pub fn beijing_now() -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset)
}

fn cap_instruction(tier: MarketCapTier, market: MarketScope) -> String {
    let currency = market.currency();
    match tier {
        MarketCapTier::All => String::new(),
        MarketCapTier::Small => format!(
            r#"
    def check_market_cap(cap):
        # STRICT RULE: Market Cap must be LESS THAN 20 Billion {currency}.
        # CRITICAL: IF symbol is 'NVDA', 'AAPL', 'MSFT', 'GOOG' or any large cap -> RETURN FALSE immediately.
        return cap < 20000000000
"#
        ),
        MarketCapTier::Mid => format!(
            r#"
    def check_market_cap(cap):
        # STRICT RULE: Market Cap must be between 20 Billion and 100 Billion {currency}.
        return 20000000000 <= cap < 100000000000
"#
        ),
        MarketCapTier::Large => format!(
            r#"
    def check_market_cap(cap):
        # STRICT RULE: Market Cap must be GREATER THAN 100 Billion {currency}.
        return cap >= 100000000000
"#
        ),
    }
}

fn catalyst_clause(config: &StrategyConfig) -> &'static str {
    if config.selected_factors.iter().any(|f| f == CATALYST_FACTOR) {
        "0. **CRITICAL PRIORITY**: Only select stocks that published a major announcement \
         (restructuring / large contract win / strategic partnership / buyback) within the last month. \
         Without a concrete positive catalyst, do not select the stock.\n    "
    } else {
        ""
    }
}

fn sector_text(config: &StrategyConfig) -> String {
    let sectors: Vec<&str> = config
        .selected_sectors
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if sectors.is_empty() {
        DEFAULT_SECTOR.to_string()
    } else {
        sectors.join("、")
    }
}

fn factor_text(config: &StrategyConfig) -> String {
    let mut parts: Vec<&str> = config
        .selected_factors
        .iter()
        .map(|id| factor_label(id))
        .collect();
    if parts.is_empty() {
        parts.push(DEFAULT_FACTORS);
    }
    let mut text = parts.join(", ");
    if let Some(q) = config.custom_query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        text.push_str(", ");
        text.push_str(q);
    }
    text
}

/// Render the screening prompt. Pure: the same config and clock reading always
/// produce the same string.
pub fn build_prompt(config: &StrategyConfig, now: DateTime<FixedOffset>) -> String {
    let now = now.format("%Y/%m/%d %H:%M:%S").to_string();
    let market = config.market_scope.prompt_label();
    let sector = sector_text(config);
    let factors = factor_text(config);
    let period = config.trend_period.label();
    let cap = cap_instruction(config.market_cap_tier, config.market_scope);
    let catalyst = catalyst_clause(config);
    let slope_min = format!("{:.2}", config.slope_range.low());
    let slope_max = format!("{:.2}", config.slope_range.high());

    format!(
        r#"
    Role: Senior Quant Execution Engine (Python Simulation).
    Current Beijing Time: {now}.
    Target Market: {market}.
    Sector: {sector}.
    Strategy Factors: {factors}.
    Trend Period: {period}.

    You are strictly simulating the following Python Logic. Do not hallucinate data.

    --- PYTHON LOGIC START ---
    {cap}
    def calculate_technical_features(prices):
        # 1. Normalize prices to 0-1 scale to make slope comparable.
        # 2. Simulate sklearn.LinearRegression on the last 20 bars.
        # 3. Raw Slope k = model.coef_[0]
        # 4. Score = np.clip(k * 10, 0.0, 1.0)
        # TARGET SCORE: {slope_min} to {slope_max}
        return score

    --- PYTHON LOGIC END ---

    TASK:
    Use Google Search to find 2 REAL stocks that satisfy check_market_cap() AND calculate_technical_features()
    and match the strategy factors above.

    CRITICAL CONSTRAINTS:
    {catalyst}1. **Real-time**: Price MUST be current as of {now}.
    2. **Market Cap Gate**: If the cap rule excludes large caps, absolutely NO large caps. Verify market cap in real-time.
    3. **Language**: All "name", "analysis" fields MUST be in Simplified Chinese.
    4. **Chart data**: "trend_points" are the last closing prices, oldest first (at most 20).
       "net_inflow" is today's main-force net inflow with sign and unit.
       "channel_width" is 0 (fully contracted) to 100 (wide open).

    OUTPUT FORMAT (JSON Array Only):
    [
      {{
        "symbol": "Ticker (e.g. 600519.SS or PLTR)",
        "name": "Chinese Name",
        "price": 123.45,
        "change_percent": 2.5,
        "market_cap": "150亿",
        "volume": "35万手",
        "quote_time": "14:35:00",
        "slope": 0.85,
        "tags": [
             {{"label": "Small Cap Checked", "type": "neutral"}},
             {{"label": "Strong Trend", "type": "bullish"}}
        ],
        "analysis": {{
            "event_title": "Selection Logic",
            "event_content": "Latest company-specific news...",
            "ai_logic": "Why it passed the logic (in Chinese)...",
            "tech_diagnosis": "Technical structure (in Chinese)...",
            "fund_analysis": "Money flow (in Chinese)..."
        }},
        "charts": {{"trend": "up"}},
        "trend_points": [10.2, 10.3, 10.1, 10.4, 10.9, 11.6],
        "net_inflow": "+1.2亿",
        "technical": {{
            "channel_status": "底部爆发 / 强势上涨 / 通道内",
            "channel_description": "Channel shape (in Chinese)...",
            "control_status": "LXHJ control-line state (in Chinese)...",
            "resonance_60m": true,
            "channel_width": 35
        }}
      }}
    ]
    "#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SlopeRange, TrendPeriod};

    fn fixed_now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-03-02T14:35:00+08:00").unwrap()
    }

    fn cn_small_semis() -> StrategyConfig {
        StrategyConfig {
            market_scope: MarketScope::CN,
            market_cap_tier: MarketCapTier::Small,
            trend_period: TrendPeriod::Days5,
            slope_range: SlopeRange::new(0.35, 1.0).unwrap(),
            selected_factors: vec!["channel_breakout".to_string()],
            selected_sectors: vec!["半导体".to_string()],
            custom_query: None,
        }
    }

    #[test]
    fn cn_semiconductor_prompt_carries_every_filter() {
        let prompt = build_prompt(&cn_small_semis(), fixed_now());
        assert!(prompt.contains("中国A股"));
        assert!(prompt.contains("半导体"));
        assert!(prompt.contains("0.35"));
        assert!(prompt.contains("1.00"));
        assert!(prompt.contains("薛斯通道底部爆发"));
        assert!(prompt.contains("2026/03/02 14:35:00"));
        assert!(prompt.contains("20 Billion CNY"));
    }

    #[test]
    fn every_selected_factor_label_is_rendered() {
        let mut cfg = StrategyConfig::default();
        cfg.selected_factors = vec![
            "macd_cross".to_string(),
            "fund_inflow".to_string(),
            "earnings_beat".to_string(),
        ];
        cfg.slope_range = SlopeRange::new(0.1, 0.55).unwrap();
        let prompt = build_prompt(&cfg, fixed_now());
        for id in &cfg.selected_factors {
            assert!(prompt.contains(factor_label(id)), "missing label for {id}");
        }
        assert!(prompt.contains("美股 (US Market)"));
        assert!(prompt.contains("0.10 to 0.55"));
    }

    #[test]
    fn empty_selections_fall_back_to_defaults() {
        let mut cfg = StrategyConfig::default();
        cfg.selected_factors.clear();
        cfg.market_cap_tier = MarketCapTier::All;
        let prompt = build_prompt(&cfg, fixed_now());
        assert!(prompt.contains("Sector: 当前市场热点."));
        assert!(prompt.contains("Strategy Factors: 量价齐升."));
        assert!(!prompt.contains("check_market_cap(cap)"));
    }

    #[test]
    fn catalyst_clause_only_with_event_factor() {
        let mut cfg = StrategyConfig::default();
        assert!(!build_prompt(&cfg, fixed_now()).contains("CRITICAL PRIORITY"));
        cfg.selected_factors.push(CATALYST_FACTOR.to_string());
        assert!(build_prompt(&cfg, fixed_now()).contains("CRITICAL PRIORITY"));
    }

    #[test]
    fn custom_query_is_appended_to_factors() {
        let mut cfg = StrategyConfig::default();
        cfg.custom_query = Some("  低空经济龙头 ".to_string());
        let prompt = build_prompt(&cfg, fixed_now());
        assert!(prompt.contains("薛斯通道底部爆发, 低空经济龙头"));
    }

    #[test]
    fn output_schema_requests_chart_flow_and_channel_fields() {
        let p = build_prompt(&StrategyConfig::default(), fixed_now());
        for field in [
            "\"trend_points\"",
            "\"net_inflow\"",
            "\"technical\"",
            "\"channel_status\"",
            "\"control_status\"",
            "\"resonance_60m\"",
            "\"channel_width\"",
        ] {
            assert!(p.contains(field), "missing {field}");
        }
    }

    #[test]
    fn schema_example_decodes_as_a_record() {
        let p = build_prompt(&StrategyConfig::default(), fixed_now());
        let start = p.find("OUTPUT FORMAT").unwrap();
        let items = crate::extract::extract_array(&p[start..]).unwrap();
        let card: crate::types::StockCard = serde_json::from_value(items[0].clone()).unwrap();
        assert_eq!(card.trend_points.as_ref().map(Vec::len), Some(6));
        assert!(card.technical.unwrap().resonance_60m);
    }

    #[test]
    fn rendering_is_deterministic() {
        let cfg = cn_small_semis();
        assert_eq!(build_prompt(&cfg, fixed_now()), build_prompt(&cfg, fixed_now()));
    }
}
