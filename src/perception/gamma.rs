//! Gamma surface aggregation and zero-crossing ("flip") detection.

use crate::models::{OptionRight, OptionsChain};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GammaSurface {
    /// Strictly ascending.
    pub strikes: Vec<f64>,
    /// Strictly ascending.
    pub expiries: Vec<i64>,
    /// `values[expiry_index][strike_index]`.
    pub values: Vec<Vec<f64>>,
    pub min: f64,
    pub max: f64,
    pub net: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipDirection {
    NegativeToPositive,
    PositiveToNegative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaFlip {
    pub price: f64,
    pub strength: f64,
    pub direction: FlipDirection,
    pub expiry: i64,
}

fn sorted_unique(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values.dedup_by(|a, b| (*a - *b).abs() < f64::EPSILON);
    values
}

fn sorted_unique_i64(mut values: Vec<i64>) -> Vec<i64> {
    values.sort_unstable();
    values.dedup();
    values
}

/// Build the gamma surface: sum `gamma * open_interest * 100` over every
/// contract at each strike/expiry cell. The cell aggregation loop is the one
/// place in Perception licensed to use `rayon` (independent cells).
pub fn build_surface(chain: &OptionsChain) -> GammaSurface {
    if chain.contracts.is_empty() {
        return GammaSurface::default();
    }

    let strikes = sorted_unique(chain.contracts.iter().map(|c| c.strike).collect());
    let expiries = sorted_unique_i64(chain.contracts.iter().map(|c| c.expiry).collect());

    if strikes.is_empty() || expiries.is_empty() {
        return GammaSurface::default();
    }

    let values: Vec<Vec<f64>> = expiries
        .par_iter()
        .map(|&expiry| {
            strikes
                .iter()
                .map(|&strike| {
                    chain
                        .contracts
                        .iter()
                        .filter(|c| c.expiry == expiry && (c.strike - strike).abs() < f64::EPSILON)
                        .map(|c| c.gamma * c.open_interest * 100.0)
                        .sum::<f64>()
                })
                .collect()
        })
        .collect();

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut net = 0.0;
    for row in &values {
        for &cell in row {
            min = min.min(cell);
            max = max.max(cell);
            net += cell;
        }
    }

    GammaSurface {
        strikes,
        expiries,
        values,
        min,
        max,
        net,
    }
}

/// Scan adjacent strike cells within each expiry row; a sign change in
/// aggregated gamma is a "flip". The label reads in ascending-strike scan
/// order: `negative_to_positive` when the lower strike's gamma is negative
/// and the higher strike's is positive, and vice versa — symmetric across
/// calls regardless of which side of the flip the caller queries.
pub fn detect_flips(surface: &GammaSurface) -> Vec<GammaFlip> {
    let mut flips = Vec::new();
    for (e_idx, &expiry) in surface.expiries.iter().enumerate() {
        let row = &surface.values[e_idx];
        for s_idx in 0..row.len().saturating_sub(1) {
            let lo = row[s_idx];
            let hi = row[s_idx + 1];
            if lo * hi < 0.0 {
                let midpoint = (surface.strikes[s_idx] + surface.strikes[s_idx + 1]) / 2.0;
                let direction = if lo < 0.0 && hi > 0.0 {
                    FlipDirection::NegativeToPositive
                } else {
                    FlipDirection::PositiveToNegative
                };
                flips.push(GammaFlip {
                    price: midpoint,
                    strength: (hi - lo).abs(),
                    direction,
                    expiry,
                });
            }
        }
    }
    flips.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap_or(std::cmp::Ordering::Equal));
    flips
}

/// Net delta exposure dealers hold: `-sum(delta * OI * 100)` across the
/// chain (dealers are short what retail is long).
pub fn net_delta_exposure(chain: &OptionsChain) -> f64 {
    -chain
        .contracts
        .iter()
        .map(|c| c.delta * c.open_interest * 100.0)
        .sum::<f64>()
}

pub fn put_call_volume_ratio(chain: &OptionsChain) -> f64 {
    let put_volume: f64 = chain
        .contracts
        .iter()
        .filter(|c| c.right == OptionRight::Put)
        .map(|c| c.volume)
        .sum();
    let call_volume: f64 = chain
        .contracts
        .iter()
        .filter(|c| c.right == OptionRight::Call)
        .map(|c| c.volume)
        .sum();
    if call_volume.abs() < f64::EPSILON {
        if put_volume.abs() < f64::EPSILON {
            1.0
        } else {
            f64::INFINITY
        }
    } else {
        put_volume / call_volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OptionContract;

    fn contract(strike: f64, expiry: i64, gamma: f64, oi: f64) -> OptionContract {
        OptionContract {
            strike,
            expiry,
            right: OptionRight::Call,
            bid: 1.0,
            ask: 1.1,
            last: 1.05,
            volume: 10.0,
            open_interest: oi,
            implied_vol: 0.2,
            delta: 0.5,
            gamma,
            theta: -0.01,
            vega: 0.1,
            rho: 0.01,
        }
    }

    #[test]
    fn surface_dimensions_match_strikes_by_expiries() {
        let chain = OptionsChain {
            contracts: vec![
                contract(100.0, 7, 0.01, 100.0),
                contract(105.0, 7, -0.02, 100.0),
                contract(100.0, 14, 0.01, 50.0),
            ],
        };
        let surface = build_surface(&chain);
        assert_eq!(surface.values.len(), surface.expiries.len());
        for row in &surface.values {
            assert_eq!(row.len(), surface.strikes.len());
        }
    }

    #[test]
    fn strikes_and_expiries_are_strictly_ascending() {
        let chain = OptionsChain {
            contracts: vec![
                contract(110.0, 14, 0.01, 10.0),
                contract(100.0, 7, 0.01, 10.0),
                contract(105.0, 7, 0.01, 10.0),
            ],
        };
        let surface = build_surface(&chain);
        assert!(surface.strikes.windows(2).all(|w| w[0] < w[1]));
        assert!(surface.expiries.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn net_gamma_equals_sum_of_cells() {
        let chain = OptionsChain {
            contracts: vec![
                contract(100.0, 7, 0.02, 100.0),
                contract(105.0, 7, -0.01, 100.0),
            ],
        };
        let surface = build_surface(&chain);
        let sum: f64 = surface.values.iter().flatten().sum();
        assert!((surface.net - sum).abs() < 1e-9);
        assert!(surface.max >= sum.min(surface.max));
    }

    #[test]
    fn flip_midpoint_lies_between_bracketing_strikes_with_opposite_signs() {
        let chain = OptionsChain {
            contracts: vec![
                contract(100.0, 7, 0.02 * 100.0, 1.0),
                contract(105.0, 7, -0.01 * 100.0, 1.0),
            ],
        };
        let surface = build_surface(&chain);
        let flips = detect_flips(&surface);
        assert_eq!(flips.len(), 1);
        let flip = &flips[0];
        assert!(flip.price > 100.0 && flip.price < 105.0);
    }

    #[test]
    fn empty_chain_yields_default_surface() {
        let surface = build_surface(&OptionsChain::default());
        assert!(surface.strikes.is_empty());
        assert!(surface.values.is_empty());
    }
}
