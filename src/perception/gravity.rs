//! Gravitational-pull scoring: gamma concentrations treated as point masses
//! attracting price via an inverse-square law.

use crate::perception::gamma::GammaSurface;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Attractor {
    pub price: f64,
    pub strength: f64,
    pub attractor_type: &'static str,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GravitationalPull {
    /// -1, 0, or +1.
    pub direction: i8,
    /// In [0, 1].
    pub magnitude: f64,
    /// Strongest-first, at most 10.
    pub attractors: Vec<Attractor>,
}

const MAX_ATTRACTORS: usize = 10;

pub fn compute(surface: &GammaSurface, spot: f64) -> GravitationalPull {
    if surface.strikes.is_empty() || spot <= 0.0 {
        return GravitationalPull::default();
    }

    let range = surface.max - surface.min;
    if range.abs() < f64::EPSILON {
        return GravitationalPull::default();
    }
    let threshold = 0.1 * range.abs();

    let mut cell_by_strike: Vec<(f64, f64)> = Vec::new();
    for (s_idx, &strike) in surface.strikes.iter().enumerate() {
        let total: f64 = surface.values.iter().map(|row| row[s_idx]).sum();
        cell_by_strike.push((strike, total));
    }

    let mut attractors: Vec<Attractor> = cell_by_strike
        .into_iter()
        .filter(|(_, gamma)| gamma.abs() > threshold)
        .map(|(strike, gamma)| Attractor {
            price: strike,
            strength: gamma,
            attractor_type: "gamma_max",
        })
        .collect();

    attractors.sort_by(|a, b| {
        b.strength
            .abs()
            .partial_cmp(&a.strength.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    attractors.truncate(MAX_ATTRACTORS);

    if attractors.is_empty() {
        return GravitationalPull::default();
    }

    let mut signed_sum = 0.0;
    let mut abs_sum = 0.0;
    for a in &attractors {
        let distance = a.price - spot;
        if distance.abs() < f64::EPSILON {
            continue;
        }
        let pull = a.strength / (distance * distance);
        signed_sum += pull;
        abs_sum += pull.abs();
    }

    let direction = if signed_sum > 0.0 {
        1
    } else if signed_sum < 0.0 {
        -1
    } else {
        0
    };
    let magnitude = if abs_sum.abs() < f64::EPSILON {
        0.0
    } else {
        (signed_sum.abs() / abs_sum).min(1.0)
    };

    GravitationalPull {
        direction,
        magnitude,
        attractors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OptionContract, OptionRight, OptionsChain};
    use crate::perception::gamma::build_surface;

    fn contract(strike: f64, gamma: f64, oi: f64) -> OptionContract {
        OptionContract {
            strike,
            expiry: 7,
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
    fn magnitude_in_unit_range_and_direction_tagged() {
        let chain = OptionsChain {
            contracts: vec![
                contract(95.0, 0.03, 500.0),
                contract(105.0, 0.01, 500.0),
            ],
        };
        let surface = build_surface(&chain);
        let pull = compute(&surface, 100.0);
        assert!(pull.magnitude >= 0.0 && pull.magnitude <= 1.0);
        assert!([-1, 0, 1].contains(&pull.direction));
        assert!(pull.attractors.len() <= 10);
    }

    #[test]
    fn empty_surface_yields_neutral_pull() {
        let pull = compute(&GammaSurface::default(), 100.0);
        assert_eq!(pull.direction, 0);
        assert_eq!(pull.magnitude, 0.0);
        assert!(pull.attractors.is_empty());
    }

    #[test]
    fn attractor_count_capped_at_ten() {
        let contracts: Vec<OptionContract> = (0..25)
            .map(|i| contract(50.0 + i as f64, 0.05 + i as f64 * 0.001, 1000.0))
            .collect();
        let chain = OptionsChain { contracts };
        let surface = build_surface(&chain);
        let pull = compute(&surface, 60.0);
        assert!(pull.attractors.len() <= 10);
    }
}
