use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::{slope_thresholds, SLOPE_STEP};

// ---------------------------------------------------------------------------
// Screening configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketScope {
    CN,
    US,
}

impl MarketScope {
    /// Label interpolated into the prompt.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            MarketScope::CN => "中国A股 (China A-Shares)",
            MarketScope::US => "美股 (US Market)",
        }
    }

    pub fn short_label(&self) -> &'static str {
        match self {
            MarketScope::CN => "A股市场",
            MarketScope::US => "美股市场",
        }
    }

    pub fn currency(&self) -> &'static str {
        match self {
            MarketScope::CN => "CNY",
            MarketScope::US => "USD",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            MarketScope::CN => MarketScope::US,
            MarketScope::US => MarketScope::CN,
        }
    }
}

impl std::fmt::Display for MarketScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketScope::CN => write!(f, "CN"),
            MarketScope::US => write!(f, "US"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketCapTier {
    All,
    Small,
    Mid,
    Large,
}

impl MarketCapTier {
    pub const ALL: [MarketCapTier; 4] = [
        MarketCapTier::All,
        MarketCapTier::Small,
        MarketCapTier::Mid,
        MarketCapTier::Large,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MarketCapTier::All => "全部市值",
            MarketCapTier::Small => "中小盘 (<100亿)",
            MarketCapTier::Mid => "中盘股 (100-500亿)",
            MarketCapTier::Large => "大盘股 (>500亿)",
        }
    }

    pub fn next(self) -> Self {
        match self {
            MarketCapTier::All => MarketCapTier::Small,
            MarketCapTier::Small => MarketCapTier::Mid,
            MarketCapTier::Mid => MarketCapTier::Large,
            MarketCapTier::Large => MarketCapTier::All,
        }
    }
}

impl std::fmt::Display for MarketCapTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MarketCapTier::All => "all",
            MarketCapTier::Small => "small",
            MarketCapTier::Mid => "mid",
            MarketCapTier::Large => "large",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendPeriod {
    #[serde(rename = "5d")]
    Days5,
    #[serde(rename = "10d")]
    Days10,
    #[serde(rename = "20d")]
    Days20,
    #[serde(rename = "60d")]
    Days60,
}

impl TrendPeriod {
    pub const ALL: [TrendPeriod; 4] = [
        TrendPeriod::Days5,
        TrendPeriod::Days10,
        TrendPeriod::Days20,
        TrendPeriod::Days60,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TrendPeriod::Days5 => "近5日 (短线)",
            TrendPeriod::Days10 => "近10日 (中短)",
            TrendPeriod::Days20 => "近20日 (月线)",
            TrendPeriod::Days60 => "近60日 (季线)",
        }
    }

    pub fn next(self) -> Self {
        match self {
            TrendPeriod::Days5 => TrendPeriod::Days10,
            TrendPeriod::Days10 => TrendPeriod::Days20,
            TrendPeriod::Days20 => TrendPeriod::Days60,
            TrendPeriod::Days60 => TrendPeriod::Days5,
        }
    }
}

impl std::fmt::Display for TrendPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrendPeriod::Days5 => "5d",
            TrendPeriod::Days10 => "10d",
            TrendPeriod::Days20 => "20d",
            TrendPeriod::Days60 => "60d",
        };
        write!(f, "{s}")
    }
}

/// Target slope score window, `0 <= low < high <= 1`.
/// Serialized as a two-element array `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "[f64; 2]")]
pub struct SlopeRange {
    low: f64,
    high: f64,
}

impl SlopeRange {
    pub fn new(low: f64, high: f64) -> std::result::Result<Self, String> {
        if !low.is_finite() || !high.is_finite() {
            return Err("slope bounds must be finite".to_string());
        }
        if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) {
            return Err(format!("slope bounds must lie in [0, 1], got [{low}, {high}]"));
        }
        if low >= high {
            return Err(format!("slope lower bound {low} must be below upper bound {high}"));
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    /// Move the lower bound by `steps` increments. Returns false (and leaves the
    /// range untouched) when the move would cross the upper bound or leave [0, 1].
    pub fn nudge_low(&mut self, steps: i32) -> bool {
        let v = snap(self.low + f64::from(steps) * SLOPE_STEP);
        if v < 0.0 || v >= self.high {
            return false;
        }
        self.low = v;
        true
    }

    pub fn nudge_high(&mut self, steps: i32) -> bool {
        let v = snap(self.high + f64::from(steps) * SLOPE_STEP);
        if v > 1.0 || v <= self.low {
            return false;
        }
        self.high = v;
        true
    }
}

fn snap(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl Default for SlopeRange {
    fn default() -> Self {
        Self { low: 0.35, high: 1.0 }
    }
}

impl From<SlopeRange> for [f64; 2] {
    fn from(r: SlopeRange) -> Self {
        [r.low, r.high]
    }
}

impl<'de> Deserialize<'de> for SlopeRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let [low, high] = <[f64; 2]>::deserialize(deserializer)?;
        SlopeRange::new(low, high).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub market_scope: MarketScope,
    pub market_cap_tier: MarketCapTier,
    pub trend_period: TrendPeriod,
    pub slope_range: SlopeRange,
    /// Factor ids from the catalog.
    #[serde(default)]
    pub selected_factors: Vec<String>,
    /// Sector labels; free text allowed.
    #[serde(default)]
    pub selected_sectors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_query: Option<String>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            market_scope: MarketScope::US,
            market_cap_tier: MarketCapTier::Small,
            trend_period: TrendPeriod::Days5,
            slope_range: SlopeRange::default(),
            selected_factors: vec!["channel_breakout".to_string()],
            selected_sectors: Vec::new(),
            custom_query: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Slope band
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeBand {
    /// slope < 0.10
    Flat,
    /// 0.10 to 0.35
    Building,
    /// 0.35 to 0.75
    Steady,
    /// >= 0.75
    Explosive,
}

impl SlopeBand {
    pub fn from_slope(slope: f64) -> Self {
        use slope_thresholds::*;
        if slope < FLAT_MAX {
            SlopeBand::Flat
        } else if slope < BUILDING_MAX {
            SlopeBand::Building
        } else if slope < STEADY_MAX {
            SlopeBand::Steady
        } else {
            SlopeBand::Explosive
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SlopeBand::Flat => "盘整震荡",
            SlopeBand::Building => "底部蓄势",
            SlopeBand::Steady => "稳健趋势",
            SlopeBand::Explosive => "极强爆发",
        }
    }
}

// ---------------------------------------------------------------------------
// Result record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Bullish,
    Neutral,
    Bearish,
    Event,
}

impl<'de> Deserialize<'de> for TagKind {
    /// Unknown kinds read as neutral; the model is not held to the enum.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_lowercase().as_str() {
            "bullish" => TagKind::Bullish,
            "bearish" => TagKind::Bearish,
            "event" => TagKind::Event,
            _ => TagKind::Neutral,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub label: String,
    #[serde(rename = "type", default = "neutral_kind")]
    pub kind: TagKind,
}

fn neutral_kind() -> TagKind {
    TagKind::Neutral
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Analysis {
    #[serde(deserialize_with = "lenient_string")]
    pub event_title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub event_content: String,
    #[serde(deserialize_with = "lenient_string")]
    pub ai_logic: String,
    #[serde(deserialize_with = "lenient_string")]
    pub tech_diagnosis: String,
    #[serde(deserialize_with = "lenient_string")]
    pub fund_analysis: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartTrend {
    Up,
    Down,
    #[default]
    Flat,
}

impl<'de> Deserialize<'de> for ChartTrend {
    /// Anything other than up/down reads as flat.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(match raw.as_str().map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("up") => ChartTrend::Up,
            Some("down") => ChartTrend::Down,
            _ => ChartTrend::Flat,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Charts {
    pub trend: ChartTrend,
}

/// Channel / control-line readings the model may attach to a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalSignals {
    #[serde(alias = "xsStatus", deserialize_with = "lenient_string")]
    pub channel_status: String,
    #[serde(alias = "xsDescription", deserialize_with = "lenient_string")]
    pub channel_description: String,
    #[serde(alias = "lxhjStatus", deserialize_with = "lenient_string")]
    pub control_status: String,
    #[serde(alias = "resonance60m", deserialize_with = "lenient_bool")]
    pub resonance_60m: bool,
    /// 0 = fully contracted, 100 = wide open.
    #[serde(alias = "channelWidth", deserialize_with = "lenient_opt_f64")]
    pub channel_width: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

/// One screened candidate. Decoding goes through [`RawCard`], which accepts the
/// loose shapes a model produces; serialization is the canonical snake_case form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCard")]
pub struct StockCard {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change_percent: f64,
    pub market_cap: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_time: Option<String>,
    pub slope: Option<f64>,
    pub tags: Vec<Tag>,
    pub analysis: Analysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<Charts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_points: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_inflow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical: Option<TechnicalSignals>,
    pub sources: Vec<Source>,
}

impl StockCard {
    pub fn slope_band(&self) -> SlopeBand {
        SlopeBand::from_slope(self.slope.unwrap_or(0.0))
    }

    pub fn trend(&self) -> ChartTrend {
        match self.charts {
            Some(c) => c.trend,
            None if self.change_percent > 0.0 => ChartTrend::Up,
            None if self.change_percent < 0.0 => ChartTrend::Down,
            None => ChartTrend::Flat,
        }
    }
}

/// Wire shape of a record as models emit it. `symbol` and `ticker` are separate
/// fields so a record carrying both still decodes; `symbol` wins.
#[derive(Deserialize)]
struct RawCard {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    ticker: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    price: f64,
    #[serde(default, alias = "changePercent", deserialize_with = "lenient_f64")]
    change_percent: f64,
    #[serde(default, alias = "marketCap", deserialize_with = "lenient_string")]
    market_cap: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    volume: Option<String>,
    #[serde(default, alias = "quoteTime", deserialize_with = "lenient_opt_string")]
    quote_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    slope: Option<f64>,
    #[serde(default, deserialize_with = "lenient_vec")]
    tags: Vec<Tag>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    analysis: Analysis,
    #[serde(default, deserialize_with = "lenient_opt")]
    charts: Option<Charts>,
    #[serde(default, alias = "trendPoints", deserialize_with = "lenient_points")]
    trend_points: Option<Vec<f64>>,
    #[serde(default, alias = "netInflowAmount", deserialize_with = "lenient_opt_string")]
    net_inflow: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt")]
    technical: Option<TechnicalSignals>,
    #[serde(default, deserialize_with = "lenient_vec")]
    sources: Vec<Source>,
}

impl From<RawCard> for StockCard {
    fn from(raw: RawCard) -> Self {
        Self {
            symbol: raw.symbol.or(raw.ticker).unwrap_or_default(),
            name: raw.name,
            price: raw.price,
            change_percent: raw.change_percent,
            market_cap: raw.market_cap,
            volume: raw.volume,
            quote_time: raw.quote_time,
            slope: raw.slope,
            tags: raw.tags,
            analysis: raw.analysis,
            charts: raw.charts,
            trend_points: raw.trend_points,
            net_inflow: raw.net_inflow,
            technical: raw.technical,
            sources: raw.sources,
        }
    }
}

/// Outcome of one successful scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub records: Vec<StockCard>,
    pub citations: Vec<Source>,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Lenient decoding: the model quotes numbers, emits bare numbers for text
// fields and nulls for anything it has nothing to say about.
// ---------------------------------------------------------------------------

fn number_from_value(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim_start_matches('+')
            .replace(',', "")
            .parse::<f64>()
            .ok(),
        _ => None,
    }
}

fn string_from_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    let v = Value::deserialize(deserializer)?;
    Ok(number_from_value(&v).unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<f64>, D::Error> {
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().and_then(number_from_value))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let v = Value::deserialize(deserializer)?;
    Ok(string_from_value(&v).unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    let v = Value::deserialize(deserializer)?;
    Ok(string_from_value(&v).filter(|s| !s.trim().is_empty()))
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let v = Value::deserialize(deserializer)?;
    Ok(match v {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "是"),
        _ => false,
    })
}

/// Array of items where undecodable elements are dropped.
fn lenient_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let v = Value::deserialize(deserializer)?;
    Ok(match v {
        Value::Array(items) => items.into_iter().filter_map(|i| serde_json::from_value(i).ok()).collect(),
        _ => Vec::new(),
    })
}

fn lenient_opt<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let v = Value::deserialize(deserializer)?;
    if v.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(v).ok())
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    Ok(lenient_opt(deserializer)?.unwrap_or_default())
}

fn lenient_points<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<f64>>, D::Error> {
    let v = Value::deserialize(deserializer)?;
    let points: Vec<f64> = match v {
        Value::Array(items) => items.iter().filter_map(number_from_value).collect(),
        _ => Vec::new(),
    };
    Ok((!points.is_empty()).then_some(points))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_range_rejects_unordered_bounds() {
        assert!(SlopeRange::new(0.5, 0.5).is_err());
        assert!(SlopeRange::new(0.8, 0.2).is_err());
        assert!(SlopeRange::new(-0.1, 0.2).is_err());
        assert!(SlopeRange::new(0.1, 1.2).is_err());
        assert!(SlopeRange::new(0.0, 1.0).is_ok());
    }

    #[test]
    fn slope_range_deserializes_from_pair() {
        let r: SlopeRange = serde_json::from_str("[0.35, 1.0]").unwrap();
        assert!((r.low() - 0.35).abs() < 1e-9);
        assert!((r.high() - 1.0).abs() < 1e-9);
        assert!(serde_json::from_str::<SlopeRange>("[0.9, 0.1]").is_err());
    }

    #[test]
    fn nudge_never_crosses_bounds() {
        let mut r = SlopeRange::new(0.90, 0.95).unwrap();
        assert!(!r.nudge_low(1), "low may not reach high");
        assert!(!r.nudge_high(-1), "high may not reach low");
        assert!(!r.nudge_high(2), "high may not exceed 1.0");
        assert!(r.nudge_high(1));
        assert!((r.high() - 1.0).abs() < 1e-9);

        let mut r = SlopeRange::new(0.0, 0.5).unwrap();
        assert!(!r.nudge_low(-1));
        assert!(r.nudge_low(3));
        assert!((r.low() - 0.15).abs() < 1e-9);
    }

    #[test]
    fn default_config_matches_dashboard_defaults() {
        let cfg = StrategyConfig::default();
        assert_eq!(cfg.market_scope, MarketScope::US);
        assert_eq!(cfg.market_cap_tier, MarketCapTier::Small);
        assert_eq!(cfg.trend_period, TrendPeriod::Days5);
        assert_eq!(cfg.selected_factors, vec!["channel_breakout".to_string()]);
        assert!(cfg.selected_sectors.is_empty());
    }

    #[test]
    fn config_wire_shape() {
        let raw = r#"{"market_scope":"CN","market_cap_tier":"small","trend_period":"10d",
            "slope_range":[0.35,1.0],"selected_factors":["channel_breakout"],"selected_sectors":["半导体"]}"#;
        let cfg: StrategyConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.market_scope, MarketScope::CN);
        assert_eq!(cfg.trend_period, TrendPeriod::Days10);
        assert_eq!(cfg.selected_sectors, vec!["半导体".to_string()]);
        assert!(cfg.custom_query.is_none());
    }

    #[test]
    fn slope_bands() {
        assert_eq!(SlopeBand::from_slope(0.05), SlopeBand::Flat);
        assert_eq!(SlopeBand::from_slope(0.10), SlopeBand::Building);
        assert_eq!(SlopeBand::from_slope(0.35), SlopeBand::Steady);
        assert_eq!(SlopeBand::from_slope(0.74), SlopeBand::Steady);
        assert_eq!(SlopeBand::from_slope(0.75), SlopeBand::Explosive);
    }

    #[test]
    fn stock_card_accepts_quoted_numbers_and_aliases() {
        let raw = r#"{"ticker":"PLTR","name":"Palantir","price":"24.10","changePercent":"+3.5%",
            "marketCap":"540亿","slope":"0.8","tags":[{"label":"Strong","type":"BULLISH"},{"label":"?","type":"weird"}]}"#;
        let card: StockCard = serde_json::from_str(raw).unwrap();
        assert_eq!(card.symbol, "PLTR");
        assert!((card.price - 24.10).abs() < 1e-9);
        assert!((card.change_percent - 3.5).abs() < 1e-9);
        assert_eq!(card.slope, Some(0.8));
        assert_eq!(card.tags[0].kind, TagKind::Bullish);
        assert_eq!(card.tags[1].kind, TagKind::Neutral);
        assert_eq!(card.analysis, Analysis::default());
    }

    #[test]
    fn missing_slope_reads_as_none() {
        let card: StockCard = serde_json::from_str(r#"{"symbol":"AAPL","slope":null}"#).unwrap();
        assert_eq!(card.slope, None);
        let card: StockCard = serde_json::from_str(r#"{"symbol":"AAPL"}"#).unwrap();
        assert_eq!(card.slope, None);
        assert_eq!(card.trend(), ChartTrend::Flat);
    }

    fn decode(v: serde_json::Value) -> StockCard {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn text_fields_accept_numbers_and_null() {
        let card = decode(serde_json::json!({
            "symbol": "AAPL", "name": null, "market_cap": 3450000000000u64,
            "volume": 350000, "netInflowAmount": -1.2e8
        }));
        assert_eq!(card.name, "");
        assert_eq!(card.market_cap, "3450000000000");
        assert_eq!(card.volume.as_deref(), Some("350000"));
        assert!(card.net_inflow.is_some());
    }

    #[test]
    fn unknown_chart_trend_reads_as_flat() {
        let card = decode(serde_json::json!({"symbol": "AAPL", "charts": {"trend": "sideways"}}));
        assert_eq!(card.charts, Some(Charts { trend: ChartTrend::Flat }));
        let card = decode(serde_json::json!({"symbol": "AAPL", "charts": {"trend": "UP"}}));
        assert_eq!(card.trend(), ChartTrend::Up);
        let card = decode(serde_json::json!({"symbol": "AAPL", "charts": "n/a"}));
        assert_eq!(card.charts, None);
    }

    #[test]
    fn symbol_and_ticker_together_decode() {
        let card = decode(serde_json::json!({"symbol": "AAPL", "ticker": "AAPL.O"}));
        assert_eq!(card.symbol, "AAPL");
        let card = decode(serde_json::json!({"ticker": "TSLA"}));
        assert_eq!(card.symbol, "TSLA");
    }

    #[test]
    fn nested_sections_tolerate_loose_shapes() {
        let card = decode(serde_json::json!({
            "symbol": "NVDA",
            "tags": [{"label": "AI", "type": "bullish"}, {"type": "bearish"}, "hot"],
            "analysis": {"ai_logic": null, "tech_diagnosis": "突破"},
            "trendPoints": [1, "2.5", null, 4],
            "technical": {"xsStatus": "突破", "resonance60m": "true", "channelWidth": "35"}
        }));
        assert_eq!(card.tags.len(), 1);
        assert_eq!(card.analysis.tech_diagnosis, "突破");
        assert_eq!(card.analysis.ai_logic, "");
        assert_eq!(card.trend_points, Some(vec![1.0, 2.5, 4.0]));
        let t = card.technical.unwrap();
        assert!(t.resonance_60m);
        assert_eq!(t.channel_width, Some(35.0));
    }

    #[test]
    fn canonical_form_round_trips() {
        let card = decode(serde_json::json!({
            "symbol": "600519.SS", "name": "贵州茅台", "changePercent": 1.5,
            "charts": {"trend": "down"}, "slope": 0.5
        }));
        let back: StockCard = serde_json::from_value(serde_json::to_value(&card).unwrap()).unwrap();
        assert_eq!(back, card);
    }
}
