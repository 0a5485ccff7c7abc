//! Order-book liquidity mapping: flow rate, imbalance, depth, absorption.

use crate::models::{OrderBook, Print};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LiquidityLevel {
    pub price: f64,
    pub size: f64,
    pub side: bool, // true = bid
    pub flow_rate: f64,
    pub persistence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiquidityMap {
    pub levels: Vec<LiquidityLevel>,
    /// In [-1, 1].
    pub imbalance: f64,
    pub depth: f64,
    pub absorption_rate: f64,
}

pub fn compute(book: &OrderBook, recent_prints: &[Print]) -> LiquidityMap {
    let mid = book.mid();
    let bid_volume = book.bid_volume();
    let ask_volume = book.ask_volume();

    let imbalance = if (bid_volume + ask_volume).abs() < f64::EPSILON {
        0.0
    } else {
        ((bid_volume - ask_volume) / (bid_volume + ask_volume)).clamp(-1.0, 1.0)
    };

    let mut levels = Vec::with_capacity(book.bids.len() + book.asks.len());
    for level in &book.bids {
        let flow_rate = flow_near(recent_prints, level.price);
        levels.push(LiquidityLevel {
            price: level.price,
            size: level.size,
            side: true,
            flow_rate,
            persistence: persistence_score(level.size, flow_rate),
        });
    }
    for level in &book.asks {
        let flow_rate = flow_near(recent_prints, level.price);
        levels.push(LiquidityLevel {
            price: level.price,
            size: level.size,
            side: false,
            flow_rate,
            persistence: persistence_score(level.size, flow_rate),
        });
    }

    let depth = if mid.abs() < f64::EPSILON {
        0.0
    } else {
        let band = mid * 0.01;
        book.bids
            .iter()
            .chain(book.asks.iter())
            .filter(|l| (l.price - mid).abs() <= band)
            .map(|l| l.size)
            .sum()
    };

    let total_book_volume = bid_volume + ask_volume;
    let recent_trade_volume: f64 = recent_prints
        .iter()
        .rev()
        .take(100)
        .map(|p| p.size)
        .sum();
    let absorption_rate = if total_book_volume.abs() < f64::EPSILON {
        0.0
    } else {
        recent_trade_volume / total_book_volume
    };

    LiquidityMap {
        levels,
        imbalance,
        depth,
        absorption_rate,
    }
}

/// Total size of trades within 0.1% of the level's price.
fn flow_near(prints: &[Print], level_price: f64) -> f64 {
    if level_price.abs() < f64::EPSILON {
        return 0.0;
    }
    let band = level_price * 0.001;
    prints
        .iter()
        .filter(|p| (p.price - level_price).abs() <= band)
        .map(|p| p.size)
        .sum()
}

fn persistence_score(size: f64, flow_rate: f64) -> f64 {
    if (size + flow_rate).abs() < f64::EPSILON {
        0.0
    } else {
        (size / (size + flow_rate)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookLevel;

    #[test]
    fn imbalance_within_unit_range() {
        let book = OrderBook {
            bids: vec![BookLevel { price: 99.0, size: 50.0 }],
            asks: vec![BookLevel { price: 101.0, size: 10.0 }],
        };
        let map = compute(&book, &[]);
        assert!(map.imbalance >= -1.0 && map.imbalance <= 1.0);
        assert!(map.imbalance > 0.0);
    }

    #[test]
    fn depth_is_nonnegative() {
        let book = OrderBook {
            bids: vec![BookLevel { price: 99.5, size: 20.0 }],
            asks: vec![BookLevel { price: 100.5, size: 20.0 }],
        };
        let map = compute(&book, &[]);
        assert!(map.depth >= 0.0);
    }

    #[test]
    fn empty_book_yields_zero_imbalance() {
        let map = compute(&OrderBook::default(), &[]);
        assert_eq!(map.imbalance, 0.0);
        assert_eq!(map.depth, 0.0);
        assert_eq!(map.absorption_rate, 0.0);
    }
}
