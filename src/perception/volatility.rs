//! Volatility-state estimation: historical/implied vol, spread, vol-of-vol,
//! skew, term structure, and a discrete regime label.

use crate::models::OptionsChain;
use crate::numerics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolRegimeLabel {
    Low,
    Normal,
    Elevated,
    High,
    Extreme,
}

impl Default for VolRegimeLabel {
    fn default() -> Self {
        VolRegimeLabel::Low
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolatilityState {
    pub regime: VolRegimeLabel,
    pub historical_vol: f64,
    pub implied_vol: f64,
    pub spread: f64,
    pub vol_of_vol: f64,
    pub skew: f64,
    pub term: f64,
}

pub fn regime_label(iv_fraction: f64) -> VolRegimeLabel {
    let iv_pct = iv_fraction * 100.0;
    if iv_pct < 15.0 {
        VolRegimeLabel::Low
    } else if iv_pct < 25.0 {
        VolRegimeLabel::Normal
    } else if iv_pct < 35.0 {
        VolRegimeLabel::Elevated
    } else if iv_pct < 50.0 {
        VolRegimeLabel::High
    } else {
        VolRegimeLabel::Extreme
    }
}

pub fn compute(closes: &[f64], chain: &OptionsChain, realized_vol_buffer: &[f64]) -> VolatilityState {
    let returns = numerics::log_returns(closes);
    let historical_vol = numerics::std_dev(&returns) * 252f64.sqrt() * 100.0;

    let positive_ivs: Vec<f64> = chain
        .contracts
        .iter()
        .map(|c| c.implied_vol)
        .filter(|iv| *iv > 0.0)
        .collect();
    let implied_vol = if positive_ivs.is_empty() {
        historical_vol
    } else {
        numerics::mean(&positive_ivs) * 100.0
    };

    let spread = implied_vol - historical_vol;
    let vol_of_vol = numerics::std_dev(realized_vol_buffer);

    let otm_put_iv: Vec<f64> = chain
        .contracts
        .iter()
        .filter(|c| c.delta.abs() < 0.25)
        .map(|c| c.implied_vol)
        .collect();
    let atm_iv: Vec<f64> = chain
        .contracts
        .iter()
        .filter(|c| c.delta.abs() > 0.4 && c.delta.abs() < 0.6)
        .map(|c| c.implied_vol)
        .collect();
    let skew = (numerics::mean(&otm_put_iv) - numerics::mean(&atm_iv)) * 100.0;

    let term = term_structure(chain);

    let state = VolatilityState {
        regime: regime_label(implied_vol / 100.0),
        historical_vol,
        implied_vol,
        spread,
        vol_of_vol,
        skew,
        term,
    };
    sanitize_state(state)
}

fn term_structure(chain: &OptionsChain) -> f64 {
    if chain.contracts.is_empty() {
        return 0.0;
    }
    let nearest_expiry = chain.contracts.iter().map(|c| c.expiry).min().unwrap();
    let farthest_expiry = chain.contracts.iter().map(|c| c.expiry).max().unwrap();
    if nearest_expiry == farthest_expiry {
        return 0.0;
    }
    let nearest_iv: Vec<f64> = chain
        .contracts
        .iter()
        .filter(|c| c.expiry == nearest_expiry)
        .map(|c| c.implied_vol)
        .collect();
    let farthest_iv: Vec<f64> = chain
        .contracts
        .iter()
        .filter(|c| c.expiry == farthest_expiry)
        .map(|c| c.implied_vol)
        .collect();
    (numerics::mean(&farthest_iv) - numerics::mean(&nearest_iv)) * 100.0
}

fn sanitize_state(mut state: VolatilityState) -> VolatilityState {
    state.historical_vol = crate::models::sanitize(state.historical_vol);
    state.implied_vol = crate::models::sanitize(state.implied_vol);
    state.spread = crate::models::sanitize(state.spread);
    state.vol_of_vol = crate::models::sanitize(state.vol_of_vol);
    state.skew = crate::models::sanitize(state.skew);
    state.term = crate::models::sanitize(state.term);
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regime_thresholds_match_spec() {
        assert_eq!(regime_label(0.10), VolRegimeLabel::Low);
        assert_eq!(regime_label(0.20), VolRegimeLabel::Normal);
        assert_eq!(regime_label(0.30), VolRegimeLabel::Elevated);
        assert_eq!(regime_label(0.45), VolRegimeLabel::High);
        assert_eq!(regime_label(0.60), VolRegimeLabel::Extreme);
    }

    #[test]
    fn empty_chain_falls_back_to_historical_vol() {
        let closes = vec![100.0, 100.0, 100.0, 100.0];
        let state = compute(&closes, &OptionsChain::default(), &[]);
        assert!((state.implied_vol - state.historical_vol).abs() < 1e-9);
    }

    #[test]
    fn flat_prices_yield_zero_historical_vol() {
        let closes = vec![100.0; 10];
        let state = compute(&closes, &OptionsChain::default(), &[]);
        assert_eq!(state.historical_vol, 0.0);
        assert_eq!(state.regime, VolRegimeLabel::Low);
    }
}
