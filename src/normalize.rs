use serde_json::Value;
use tracing::warn;

use crate::config::{DEFAULT_SLOPE_OFFSET, MAX_CITATIONS};
use crate::error::ScanError;
use crate::types::{MarketScope, SlopeRange, Source, StockCard};

/// Exchange suffix for a China A-share code. Only bare 6-digit codes qualify.
pub fn cn_symbol(symbol: &str) -> String {
    let s = symbol.trim();
    if s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit()) {
        if s.starts_with('6') {
            format!("{s}.SS")
        } else {
            format!("{s}.SZ")
        }
    } else {
        symbol.to_string()
    }
}

/// Score substituted when the model omits one: `low + 0.1`, kept inside the range.
pub fn default_slope(range: &SlopeRange) -> f64 {
    let v = (range.low() + DEFAULT_SLOPE_OFFSET).clamp(range.low(), range.high());
    (v * 100.0).round() / 100.0
}

/// Deduplicate by URI, drop entries without a URI, keep the first `MAX_CITATIONS`.
pub fn select_citations(raw: &[Source]) -> Vec<Source> {
    let mut seen = std::collections::HashSet::new();
    raw.iter()
        .filter(|s| !s.uri.trim().is_empty())
        .filter(|s| seen.insert(s.uri.clone()))
        .take(MAX_CITATIONS)
        .cloned()
        .collect()
}

/// Decode and normalise extracted array items into cards.
///
/// Items that are not decodable records are skipped. If the array was non-empty
/// and nothing survives, the response is treated as unusable.
pub fn normalize_records(
    items: Vec<Value>,
    market: MarketScope,
    range: &SlopeRange,
    citations: &[Source],
) -> Result<Vec<StockCard>, ScanError> {
    let total = items.len();
    let mut cards = Vec::with_capacity(total);

    for (idx, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            warn!(index = idx, "skipping non-object array element");
            continue;
        }
        let mut card: StockCard = match serde_json::from_value(item) {
            Ok(c) => c,
            Err(e) => {
                warn!(index = idx, error = %e, "skipping undecodable record");
                continue;
            }
        };
        if card.symbol.trim().is_empty() {
            warn!(index = idx, "skipping record without symbol");
            continue;
        }

        if market == MarketScope::CN {
            card.symbol = cn_symbol(&card.symbol);
        }
        if card.slope.is_none() {
            card.slope = Some(default_slope(range));
        }
        card.sources = citations.to_vec();
        cards.push(card);
    }

    if total > 0 && cards.is_empty() {
        return Err(ScanError::Format(format!(
            "none of the {total} returned items matched the record schema"
        )));
    }
    Ok(cards)
}
