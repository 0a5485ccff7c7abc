//! Per-type activation bonus: one `match` arm per `StrategyKind`, ceiling
//! roughly 0.5, added into the activation score alongside regime confidence,
//! coherence, and recent performance.

use crate::meta_controller::CoherenceScore;
use crate::perception::{FlowDirection, StructuralFeatures};

use super::templates::StrategyKind;

const GAMMA_SCALP_MIN_CONCENTRATION: f64 = 0.3;
const GAMMA_SCALP_FLIP_PROXIMITY: f64 = 0.01;
const MOMENTUM_MIN: f64 = 0.01;
const TREND_STRENGTH_MIN: f64 = 0.3;
const MEAN_REVERSION_IV_MIN: f64 = 25.0;
const MEAN_REVERSION_MOMENTUM_MAX: f64 = 0.01;
const MEAN_REVERSION_TREND_MIN: f64 = 0.6;
const VOL_SPREAD_MIN: f64 = 5.0;
const VOL_OF_VOL_MIN: f64 = 0.2;
const VOL_CONTRACTION_IV_MAX: f64 = 15.0;
const IMBALANCE_MIN: f64 = 0.3;
const LIQUIDITY_POCKET_MIN: f64 = 500.0;
const LIQUIDITY_PROXIMITY: f64 = 0.005;
const HEDGING_PRESSURE_MIN: f64 = 0.1;
const NET_GAMMA_THRESHOLD: f64 = 500_000.0;
const STRUCTURAL_TREND_MIN: f64 = 0.5;
const PATTERN_RECOGNITION_CONSTANT: f64 = 0.25;
const RESONANCE_MIN: f64 = 0.6;

pub fn compute(kind: StrategyKind, features: &StructuralFeatures, coherence: &CoherenceScore) -> f64 {
    match kind {
        StrategyKind::GammaScalp => {
            let mut bonus = 0.0;
            if features.gravitational_pull.magnitude > GAMMA_SCALP_MIN_CONCENTRATION {
                bonus += 0.3;
            }
            let near_flip = features.gamma_flips.iter().any(|flip| {
                features.spot.abs() > f64::EPSILON
                    && ((flip.price - features.spot).abs() / features.spot) < GAMMA_SCALP_FLIP_PROXIMITY
            });
            if near_flip {
                bonus += 0.2;
            }
            bonus
        }
        StrategyKind::MomentumFollow => {
            let mut bonus = 0.0;
            if features.price_history.momentum.abs() > MOMENTUM_MIN {
                bonus += 0.25;
            }
            if features.price_history.trend_strength > TREND_STRENGTH_MIN {
                bonus += 0.25;
            }
            bonus
        }
        StrategyKind::MeanReversion => {
            let mut bonus = 0.0;
            if features.volatility.implied_vol > MEAN_REVERSION_IV_MIN
                && features.price_history.momentum.abs() < MEAN_REVERSION_MOMENTUM_MAX
            {
                bonus += 0.3;
            }
            if features.price_history.trend_strength > MEAN_REVERSION_TREND_MIN {
                bonus += 0.2;
            }
            bonus
        }
        StrategyKind::VolatilityExpansion => {
            let mut bonus = 0.0;
            if features.volatility.spread > VOL_SPREAD_MIN {
                bonus += 0.25;
            }
            if features.volatility.vol_of_vol > VOL_OF_VOL_MIN {
                bonus += 0.25;
            }
            bonus
        }
        StrategyKind::VolatilityContraction => {
            let mut bonus = 0.0;
            if features.volatility.implied_vol < VOL_CONTRACTION_IV_MAX {
                bonus += 0.3;
            }
            if features.volatility.spread < 0.0 {
                bonus += 0.2;
            }
            bonus
        }
        StrategyKind::LiquidityHunt => {
            let mut bonus = 0.0;
            if features.liquidity.imbalance.abs() > IMBALANCE_MIN {
                bonus += 0.25;
            }
            let spot = features.spot;
            let has_pocket = spot.abs() > f64::EPSILON
                && features.liquidity.levels.iter().any(|level| {
                    level.size >= LIQUIDITY_POCKET_MIN
                        && ((level.price - spot).abs() / spot) < LIQUIDITY_PROXIMITY
                });
            if has_pocket {
                bonus += 0.25;
            }
            bonus
        }
        StrategyKind::FlowAlignment => {
            let mut bonus = 0.0;
            if features.dealer.hedging_pressure.abs() > HEDGING_PRESSURE_MIN {
                bonus += 0.25;
            }
            if features.dealer.net_gamma_exposure.abs() > NET_GAMMA_THRESHOLD {
                bonus += 0.25;
            }
            bonus
        }
        StrategyKind::StructuralBreak => {
            let mut bonus = 0.0;
            if features.price_history.trend_strength > STRUCTURAL_TREND_MIN {
                bonus += 0.25;
            }
            if features.volatility.vol_of_vol > VOL_OF_VOL_MIN {
                bonus += 0.25;
            }
            bonus
        }
        StrategyKind::PatternRecognition => PATTERN_RECOGNITION_CONSTANT,
        StrategyKind::FractalResonance => {
            let mut bonus = 0.0;
            if coherence.temporal > RESONANCE_MIN {
                bonus += 0.3;
            }
            if coherence.fractal > RESONANCE_MIN {
                bonus += 0.2;
            }
            bonus
        }
    }
}

/// Dealer flow as a directional sign, shared by the flow-alignment bonus
/// family and the default signal generator.
pub fn dealer_flow_sign(features: &StructuralFeatures) -> i8 {
    match features.dealer.flow_direction {
        FlowDirection::Buying => 1,
        FlowDirection::Selling => -1,
        FlowDirection::Neutral => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_recognition_is_constant() {
        let features = StructuralFeatures::default();
        let coherence = CoherenceScore::default();
        assert_eq!(compute(StrategyKind::PatternRecognition, &features, &coherence), 0.25);
    }

    #[test]
    fn gamma_scalp_bonus_bounded_by_ceiling() {
        let mut features = StructuralFeatures::default();
        features.gravitational_pull.magnitude = 0.9;
        features.spot = 100.0;
        features.gamma_flips.push(crate::perception::GammaFlip {
            price: 100.05,
            strength: 1.0,
            direction: crate::perception::FlipDirection::NegativeToPositive,
            expiry: 7,
        });
        let coherence = CoherenceScore::default();
        let bonus = compute(StrategyKind::GammaScalp, &features, &coherence);
        assert!((bonus - 0.5).abs() < 1e-9);
    }

    #[test]
    fn fractal_resonance_responds_to_temporal_and_fractal_scores() {
        let features = StructuralFeatures::default();
        let mut coherence = CoherenceScore::default();
        coherence.temporal = 0.9;
        coherence.fractal = 0.9;
        assert!((compute(StrategyKind::FractalResonance, &features, &coherence) - 0.5).abs() < 1e-9);
    }
}
