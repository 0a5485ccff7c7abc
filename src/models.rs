//! Market bundle: the tick-level input to the whole pipeline.
//!
//! Plain serde-derived structs, `f64` throughout, no newtypes over
//! primitives: describes options-chain/order-book market structure.

use serde::{Deserialize, Serialize};

/// A single OHLCV bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A single executed trade ("print").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Print {
    pub timestamp: i64,
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    /// Best-to-worst.
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    pub fn mid(&self) -> f64 {
        match (self.bids.first(), self.asks.first()) {
            (Some(b), Some(a)) => (b.price + a.price) / 2.0,
            (Some(b), None) => b.price,
            (None, Some(a)) => a.price,
            (None, None) => 0.0,
        }
    }

    pub fn bid_volume(&self) -> f64 {
        self.bids.iter().map(|l| l.size).sum()
    }

    pub fn ask_volume(&self) -> f64 {
        self.asks.iter().map(|l| l.size).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionRight {
    Call,
    Put,
}

/// One strike/expiry/right line of an options chain, with the five
/// sensitivities ("Greeks").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OptionContract {
    pub strike: f64,
    /// Days-to-expiry from the bundle timestamp; used purely as an
    /// ordering/bucketing key, not a calendar date.
    pub expiry: i64,
    pub right: OptionRight,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub volume: f64,
    pub open_interest: f64,
    pub implied_vol: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsChain {
    pub contracts: Vec<OptionContract>,
}

/// One timeframe's slice of market observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeframeStream {
    pub bars: Vec<Bar>,
    pub prints: Vec<Print>,
    pub order_book: Option<OrderBook>,
}

/// The full tick-level input: one instrument's fast/slow streams plus its
/// options chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketBundle {
    pub symbol: String,
    pub timestamp: i64,
    pub fast: TimeframeStream,
    pub slow: TimeframeStream,
    pub chain: OptionsChain,
}

impl MarketBundle {
    pub fn spot(&self) -> f64 {
        if let Some(book) = &self.fast.order_book {
            let mid = book.mid();
            if mid > 0.0 {
                return mid;
            }
        }
        self.fast.bars.last().map(|b| b.close).unwrap_or(0.0)
    }
}

/// A trade direction / signal bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    pub fn from_sign(sign: f64) -> Self {
        if sign > 0.0 {
            Direction::Long
        } else if sign < 0.0 {
            Direction::Short
        } else {
            Direction::Neutral
        }
    }
}

/// Replace any non-finite `f64` with `0.0`. Used at every component boundary
/// per the crate-wide "never emit NaN/Inf" contract.
#[inline]
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn sanitize_vec(values: &[f64]) -> Vec<f64> {
    values.iter().copied().map(sanitize).collect()
}
