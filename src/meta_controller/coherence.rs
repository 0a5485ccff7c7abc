//! Coherence scoring: how well structural, regime, temporal, fractal, and
//! cross-signal evidence line up behind the current read.

use crate::models::Direction;
use crate::numerics;
use crate::perception::{FlowDirection, StructuralFeatures, TrendLabel, VolRegimeLabel};
use crate::ring_buffer::RingBuffer;
use serde::{Deserialize, Serialize};

use super::regime::RegimeLabel;

const STRUCTURAL_WEIGHT: f64 = 0.30;
const REGIME_WEIGHT: f64 = 0.25;
const TEMPORAL_WEIGHT: f64 = 0.20;
const FRACTAL_WEIGHT: f64 = 0.15;
const CONVERGENCE_WEIGHT: f64 = 0.10;

/// A tick's position in the five bounded per-feature histories: momentum,
/// volatility, gamma, liquidity, trend — in that order. Used both for the
/// temporal sub-score (momentum/volatility variance) and the fractal
/// sub-score (cosine similarity of the full vector).
pub type FeatureVector = [f64; 5];

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CoherenceScore {
    pub structural: f64,
    pub regime_alignment: f64,
    pub temporal: f64,
    pub fractal: f64,
    pub convergence: f64,
    pub total: f64,
    pub confidence: f64,
}

impl CoherenceScore {
    /// A mid-point placeholder score (every component at 0.5) used for the
    /// orchestrator's preliminary strategy-pool pass, before any signal has
    /// actually been scored. Distinct from `default()` (all zero), which
    /// would floor the preliminary activation cap at zero and defeat the
    /// two-pass design entirely.
    pub fn neutral() -> Self {
        Self {
            structural: 0.5,
            regime_alignment: 0.5,
            temporal: 0.5,
            fractal: 0.5,
            convergence: 0.5,
            total: 0.5,
            confidence: 0.5,
        }
    }
}

fn sign(value: f64, tolerance: f64) -> i8 {
    if value > tolerance {
        1
    } else if value < -tolerance {
        -1
    } else {
        0
    }
}

/// Average of four boolean-ish alignments, each in [0, 1].
fn structural_score(features: &StructuralFeatures) -> f64 {
    let trend = features.price_history.trend;
    let gamma_sign = features.gravitational_pull.direction.signum();

    let gamma_vs_trend = match trend {
        TrendLabel::Up => {
            if gamma_sign > 0 {
                1.0
            } else if gamma_sign == 0 {
                0.5
            } else {
                0.0
            }
        }
        TrendLabel::Down => {
            if gamma_sign < 0 {
                1.0
            } else if gamma_sign == 0 {
                0.5
            } else {
                0.0
            }
        }
        TrendLabel::Sideways => 0.5,
    };

    let imb_sign = sign(features.liquidity.imbalance, 0.01);
    let mom_sign = sign(features.price_history.momentum, 0.001);
    let liquidity_vs_momentum = if imb_sign == 0 || mom_sign == 0 {
        0.5
    } else if imb_sign == mom_sign {
        1.0
    } else {
        0.0
    };

    let dealer_vs_trend = match features.dealer.flow_direction {
        FlowDirection::Neutral => 1.0,
        FlowDirection::Buying => match trend {
            TrendLabel::Up => 1.0,
            TrendLabel::Sideways => 0.5,
            TrendLabel::Down => 0.0,
        },
        FlowDirection::Selling => match trend {
            TrendLabel::Down => 1.0,
            TrendLabel::Sideways => 0.5,
            TrendLabel::Up => 0.0,
        },
    };

    let hedging_significant = features.dealer.hedging_pressure.abs() > 0.01;
    let non_low_vol = features.volatility.regime != VolRegimeLabel::Low;
    let hedging_vs_volatility = if hedging_significant == non_low_vol {
        1.0
    } else {
        0.5
    };

    (gamma_vs_trend + liquidity_vs_momentum + dealer_vs_trend + hedging_vs_volatility) / 4.0
}

/// Fraction of active strategies whose valid-regime set contains the current
/// regime; 0.5 when nothing is active yet.
fn regime_alignment_score(current: RegimeLabel, active_valid_regimes: &[Vec<RegimeLabel>]) -> f64 {
    if active_valid_regimes.is_empty() {
        return 0.5;
    }
    let matching = active_valid_regimes
        .iter()
        .filter(|valid| valid.contains(&current))
        .count();
    matching as f64 / active_valid_regimes.len() as f64
}

/// `1 − clamp(10·σ(recentMomentum), 0, 1)` averaged with the same against
/// `5·σ(recentVol)`, both over the last 20 samples.
fn temporal_score(momentum_history: &RingBuffer<f64>, volatility_history: &RingBuffer<f64>) -> f64 {
    let momentum_term = if momentum_history.len() < 3 {
        0.5
    } else {
        let recent = momentum_history.recent(momentum_history.len().min(20));
        1.0 - numerics::clamp(10.0 * numerics::std_dev(&recent), 0.0, 1.0)
    };
    let vol_term = if volatility_history.len() < 3 {
        0.5
    } else {
        let recent = volatility_history.recent(volatility_history.len().min(20));
        1.0 - numerics::clamp(5.0 * numerics::std_dev(&recent), 0.0, 1.0)
    };
    (momentum_term + vol_term) / 2.0
}

/// Max cosine similarity between `current` and the last 50 historical
/// feature vectors; 0.5 when there is no history yet.
fn fractal_score(history: &RingBuffer<FeatureVector>, current: &FeatureVector) -> f64 {
    if history.is_empty() {
        return 0.5;
    }
    history
        .recent(history.len().min(50))
        .iter()
        .map(|past| numerics::cosine_similarity(past, current))
        .fold(f64::NEG_INFINITY, f64::max)
        .max(0.0)
}

/// Largest fraction of signals agreeing on direction; 0.5 when fewer than
/// two signals were generated this tick.
fn convergence_score(signal_directions: &[Direction]) -> f64 {
    if signal_directions.len() < 2 {
        return 0.5;
    }
    let long = signal_directions.iter().filter(|d| **d == Direction::Long).count();
    let short = signal_directions.iter().filter(|d| **d == Direction::Short).count();
    let neutral = signal_directions.len() - long - short;
    let majority = long.max(short).max(neutral);
    majority as f64 / signal_directions.len() as f64
}

pub struct CoherenceInputs<'a> {
    pub features: &'a StructuralFeatures,
    pub current_regime: RegimeLabel,
    pub active_valid_regimes: &'a [Vec<RegimeLabel>],
    pub momentum_history: &'a RingBuffer<f64>,
    pub volatility_history: &'a RingBuffer<f64>,
    pub feature_vector_history: &'a RingBuffer<FeatureVector>,
    pub signal_directions: &'a [Direction],
}

pub fn current_feature_vector(features: &StructuralFeatures) -> FeatureVector {
    [
        features.price_history.momentum,
        features.volatility.implied_vol,
        features.gamma_surface.net,
        features.liquidity.imbalance,
        features.price_history.trend_strength,
    ]
}

pub fn compute(inputs: CoherenceInputs) -> CoherenceScore {
    let current_vector = current_feature_vector(inputs.features);

    let structural = structural_score(inputs.features);
    let regime_alignment = regime_alignment_score(inputs.current_regime, inputs.active_valid_regimes);
    let temporal = temporal_score(inputs.momentum_history, inputs.volatility_history);
    let fractal = fractal_score(inputs.feature_vector_history, &current_vector);
    let convergence = convergence_score(inputs.signal_directions);

    let total = STRUCTURAL_WEIGHT * structural
        + REGIME_WEIGHT * regime_alignment
        + TEMPORAL_WEIGHT * temporal
        + FRACTAL_WEIGHT * fractal
        + CONVERGENCE_WEIGHT * convergence;
    let confidence = numerics::sigmoid(2.0 * total - 1.0);

    CoherenceScore {
        structural: crate::models::sanitize(structural),
        regime_alignment: crate::models::sanitize(regime_alignment),
        temporal: crate::models::sanitize(temporal),
        fractal: crate::models::sanitize(fractal),
        convergence: crate::models::sanitize(convergence),
        total: crate::models::sanitize(total),
        confidence: crate::models::sanitize(confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_and_confidence_stay_in_unit_range() {
        let features = StructuralFeatures::default();
        let momentum_history = RingBuffer::new(100);
        let volatility_history = RingBuffer::new(100);
        let feature_vector_history = RingBuffer::new(100);
        let score = compute(CoherenceInputs {
            features: &features,
            current_regime: RegimeLabel::RangeBound,
            active_valid_regimes: &[],
            momentum_history: &momentum_history,
            volatility_history: &volatility_history,
            feature_vector_history: &feature_vector_history,
            signal_directions: &[],
        });
        assert!((0.0..=1.0).contains(&score.total));
        assert!((0.0..=1.0).contains(&score.confidence));
    }

    #[test]
    fn neutral_dealer_flow_always_aligns_with_trend() {
        let mut features = StructuralFeatures::default();
        features.dealer.flow_direction = FlowDirection::Neutral;
        features.price_history.trend = TrendLabel::Up;
        let s = structural_score(&features);
        assert!(s > 0.0);
    }

    #[test]
    fn no_active_strategies_yields_neutral_regime_alignment() {
        assert_eq!(regime_alignment_score(RegimeLabel::RangeBound, &[]), 0.5);
    }

    #[test]
    fn regime_alignment_counts_matching_templates() {
        let active = vec![
            vec![RegimeLabel::RangeBound, RegimeLabel::Consolidation],
            vec![RegimeLabel::TrendingBullish],
        ];
        let score = regime_alignment_score(RegimeLabel::RangeBound, &active);
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn fewer_than_two_signals_yields_neutral_convergence() {
        assert_eq!(convergence_score(&[Direction::Long]), 0.5);
    }

    #[test]
    fn unanimous_signals_maximize_convergence() {
        let dirs = vec![Direction::Long, Direction::Long, Direction::Long];
        assert_eq!(convergence_score(&dirs), 1.0);
    }

    #[test]
    fn fractal_score_defaults_to_neutral_with_no_history() {
        let history: RingBuffer<FeatureVector> = RingBuffer::new(100);
        assert_eq!(fractal_score(&history, &[0.0; 5]), 0.5);
    }

    #[test]
    fn fractal_score_is_one_for_identical_repeated_vector() {
        let mut history: RingBuffer<FeatureVector> = RingBuffer::new(100);
        let v = [0.01, 20.0, 1000.0, 0.1, 0.5];
        history.push(v);
        assert!((fractal_score(&history, &v) - 1.0).abs() < 1e-9);
    }
}
