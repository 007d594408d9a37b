//! Synthetic trend series for card sparklines. Nothing here is market data:
//! the shape only illustrates the record's trend direction and slope score.

use crate::types::{ChartTrend, StockCard};

pub const SERIES_LEN: usize = 20;

/// Bars before the breakout leg of an upward series.
const BASE_LEN: usize = 15;

/// Build a deterministic illustrative series.
///
/// `Up` is a flat base followed by a breakout whose steepness follows `slope`;
/// `Down` rises then pulls back; `Flat` oscillates in a narrow channel.
pub fn synthetic_points(trend: ChartTrend, slope: f64, len: usize) -> Vec<f64> {
    let slope = slope.clamp(0.0, 1.0);
    let base = 100.0;
    (0..len)
        .map(|i| {
            let wobble = if i % 2 == 0 { 0.4 } else { -0.4 };
            match trend {
                ChartTrend::Up => {
                    let split = BASE_LEN.min(len.saturating_sub(1));
                    if i < split {
                        base + wobble
                    } else {
                        let k = (i - split + 1) as f64;
                        base + k * (1.0 + slope * 4.0)
                    }
                }
                ChartTrend::Down => {
                    let peak = len / 2;
                    let d = if i <= peak { i as f64 } else { peak as f64 - (i - peak) as f64 * 1.5 };
                    base + d * (0.5 + slope) + wobble
                }
                ChartTrend::Flat => base + wobble * 2.0,
            }
        })
        .collect()
}

/// Series to draw for a card: the model's points when it supplied any,
/// otherwise a synthetic shape.
pub fn card_series(card: &StockCard) -> Vec<f64> {
    match &card.trend_points {
        Some(points) if points.len() >= 2 && points.iter().all(|p| p.is_finite()) => points.clone(),
        _ => synthetic_points(card.trend(), card.slope.unwrap_or(0.0), SERIES_LEN),
    }
}

/// Rescale a series to 0..=100 integer bars for a sparkline widget.
pub fn to_bars(points: &[f64]) -> Vec<u64> {
    let min = points.iter().copied().fold(f64::INFINITY, f64::min);
    let max = points.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    points
        .iter()
        .map(|p| {
            if span <= f64::EPSILON {
                50
            } else {
                (((p - min) / span) * 100.0).round() as u64
            }
        })
        .collect()
}
