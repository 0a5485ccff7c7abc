//! Bounded price-history summary: momentum and trend from the price buffer.

use crate::numerics;
use crate::ring_buffer::RingBuffer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    Up,
    Down,
    Sideways,
}

impl Default for TrendLabel {
    fn default() -> Self {
        TrendLabel::Sideways
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceHistory {
    /// Oldest-first.
    pub closes: Vec<f64>,
    pub momentum: f64,
    pub trend: TrendLabel,
    pub trend_strength: f64,
}

pub fn compute(buffer: &RingBuffer<f64>) -> PriceHistory {
    let closes = buffer.to_vec();
    if closes.is_empty() {
        return PriceHistory::default();
    }

    let ema10 = numerics::ema(&closes, 10);
    let ema30 = numerics::ema(&closes, 30);
    let momentum = if ema30.abs() < f64::EPSILON {
        0.0
    } else {
        (ema10 - ema30) / ema30
    };

    let trend = if momentum > 0.005 {
        TrendLabel::Up
    } else if momentum < -0.005 {
        TrendLabel::Down
    } else {
        TrendLabel::Sideways
    };

    let lo = closes.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    let latest = *closes.last().unwrap();
    let trend_strength = if range.abs() < f64::EPSILON {
        0.0
    } else {
        let mid_range = (hi + lo) / 2.0;
        let half_range = range / 2.0;
        ((latest - mid_range).abs() / half_range).clamp(0.0, 1.0)
    };

    PriceHistory {
        closes,
        momentum: crate::models::sanitize(momentum),
        trend,
        trend_strength: crate::models::sanitize(trend_strength),
    }
}
