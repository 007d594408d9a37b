//! Option catalogs offered by the strategy panel.

use serde::Serialize;

use crate::types::{MarketCapTier, TrendPeriod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorGroup {
    /// Pure technical patterns.
    Technical,
    /// Money flow and volume.
    Flow,
    /// News and fundamentals.
    Fundamental,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Factor {
    pub id: &'static str,
    pub label: &'static str,
    pub group: FactorGroup,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Sector {
    pub id: &'static str,
    pub label: &'static str,
}

/// Factor whose selection adds the catalyst clause to the prompt.
pub const CATALYST_FACTOR: &str = "event_driven";

/// Sector entry meaning "no sector restriction".
pub const ALL_SECTORS: &str = "all";

pub const FACTORS: &[Factor] = &[
    Factor { id: "channel_breakout", label: "薛斯通道底部爆发", group: FactorGroup::Technical },
    Factor { id: "strong_trend", label: "薛斯通道强势上涨", group: FactorGroup::Technical },
    Factor { id: "macd_cross", label: "MACD 金叉买入", group: FactorGroup::Technical },
    Factor { id: "kdj_oversold", label: "KDJ 超卖反弹", group: FactorGroup::Technical },
    Factor { id: "fund_inflow", label: "主力资金抢筹 / 北向流入", group: FactorGroup::Flow },
    Factor { id: "bottom_volume", label: "底部放量 / 量价齐升", group: FactorGroup::Flow },
    Factor { id: "fund_resonance", label: "LXHJ 60分钟共振 / 资金合力", group: FactorGroup::Flow },
    Factor { id: "event_driven", label: "重大利好 / 事件驱动", group: FactorGroup::Fundamental },
    Factor { id: "earnings_beat", label: "业绩超预期 / 财报", group: FactorGroup::Fundamental },
];

pub const SECTORS: &[Sector] = &[
    Sector { id: "all", label: "全市场 / 不限" },
    Sector { id: "ai", label: "人工智能 (AI & Robotics)" },
    Sector { id: "semi", label: "半导体 / 芯片" },
    Sector { id: "ev", label: "新能源 / 锂电" },
    Sector { id: "bio", label: "生物医药" },
    Sector { id: "saas", label: "软件 / SaaS / 云计算" },
    Sector { id: "crypto", label: "数字货币 / 区块链" },
    Sector { id: "fin", label: "金融 / 券商" },
    Sector { id: "consumer", label: "大消费 / 零售" },
    Sector { id: "manuf", label: "高端制造 / 工业互联" },
    Sector { id: "military", label: "国防军工 / 航天" },
    Sector { id: "energy", label: "传统能源 / 石油煤炭" },
    Sector { id: "materials", label: "有色金属 / 稀土" },
    Sector { id: "infra", label: "基建 / 工程机械" },
    Sector { id: "media", label: "传媒 / 游戏 / 元宇宙" },
    Sector { id: "logistics", label: "交通物流 / 航运" },
    Sector { id: "telecom", label: "5G / 通信设备" },
];

/// Label for a factor id; unknown ids pass through unchanged.
pub fn factor_label(id: &str) -> &str {
    FACTORS
        .iter()
        .find(|f| f.id == id)
        .map(|f| f.label)
        .unwrap_or(id)
}

pub fn factors_in(group: FactorGroup) -> impl Iterator<Item = &'static Factor> {
    FACTORS.iter().filter(move |f| f.group == group)
}

pub fn sector(id: &str) -> Option<&'static Sector> {
    SECTORS.iter().find(|s| s.id == id)
}

// ---------------------------------------------------------------------------
// Wire form for GET /catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct OptionEntry {
    pub id: String,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub factors: &'static [Factor],
    pub sectors: &'static [Sector],
    pub market_cap_tiers: Vec<OptionEntry>,
    pub trend_periods: Vec<OptionEntry>,
}

pub fn catalog() -> CatalogResponse {
    CatalogResponse {
        factors: FACTORS,
        sectors: SECTORS,
        market_cap_tiers: MarketCapTier::ALL
            .iter()
            .map(|t| OptionEntry { id: t.to_string(), label: t.label() })
            .collect(),
        trend_periods: TrendPeriod::ALL
            .iter()
            .map(|p| OptionEntry { id: p.to_string(), label: p.label() })
            .collect(),
    }
}
