//! Per-type signal generation: a second `match`-arm dispatch table keyed on
//! `StrategyKind`, returning `None` whenever direction is neutral or
//! strength falls below the floor.

use crate::meta_controller::Regime;
use crate::models::Direction;
use crate::numerics;
use crate::perception::{FlowDirection, StructuralFeatures, VolRegimeLabel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bonus::dealer_flow_sign;
use super::templates::{StrategyKind, StrategyParams};

const MIN_SIGNAL_STRENGTH: f64 = 0.3;

/// Compact structural snapshot carried alongside a signal, used downstream by
/// Risk Governance (gamma exposure) without needing the full features value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalContext {
    pub gamma_level: f64,
    pub liquidity_support: f64,
    pub volatility_label: VolRegimeLabel,
    pub dealer_flow_label: FlowDirection,
}

fn context_of(features: &StructuralFeatures) -> SignalContext {
    SignalContext {
        gamma_level: features.dealer.net_gamma_exposure,
        liquidity_support: features.liquidity.depth,
        volatility_label: features.volatility.regime,
        dealer_flow_label: features.dealer.flow_direction,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub kind: StrategyKind,
    pub direction: Direction,
    pub strength: f64,
    pub confidence: f64,
    pub entry: f64,
    pub stop: f64,
    /// 1-2 target prices, nearest first.
    pub targets: Vec<f64>,
    pub timeframe: &'static str,
    pub rationale: String,
    pub context: SignalContext,
}

#[allow(clippy::too_many_arguments)]
fn finalize(
    kind: StrategyKind,
    direction: Direction,
    strength: f64,
    entry: f64,
    stop: f64,
    targets: Vec<f64>,
    confidence: f64,
    rationale: String,
    features: &StructuralFeatures,
) -> Option<Signal> {
    if direction == Direction::Neutral || strength < MIN_SIGNAL_STRENGTH {
        return None;
    }
    Some(Signal {
        id: Uuid::new_v4(),
        kind,
        direction,
        strength: crate::models::sanitize(strength),
        confidence: crate::models::sanitize(confidence),
        entry: crate::models::sanitize(entry),
        stop: crate::models::sanitize(stop),
        targets: targets.into_iter().map(crate::models::sanitize).collect(),
        timeframe: kind.timeframe(),
        rationale,
        context: context_of(features),
    })
}

pub fn generate(
    kind: StrategyKind,
    features: &StructuralFeatures,
    regime: &Regime,
    params: &StrategyParams,
) -> Option<Signal> {
    let entry = features.spot;
    match kind {
        StrategyKind::GammaScalp => {
            let direction = Direction::from_sign(features.gravitational_pull.direction as f64);
            let sign = direction.sign();
            finalize(
                kind,
                direction,
                features.gravitational_pull.magnitude,
                entry,
                entry * (1.0 - sign * params.stop_loss),
                vec![entry * (1.0 + sign * params.target_profit)],
                features.gravitational_pull.magnitude,
                format!(
                    "gamma pull magnitude {:.2} toward strike concentration",
                    features.gravitational_pull.magnitude
                ),
                features,
            )
        }
        StrategyKind::MomentumFollow => {
            let momentum = features.price_history.momentum;
            let direction = Direction::from_sign(momentum);
            let strength = numerics::clamp(20.0 * momentum.abs(), 0.0, 1.0);
            let sign = direction.sign();
            let target_move = params.trailing_stop * params.target_multiple;
            finalize(
                kind,
                direction,
                strength,
                entry,
                entry * (1.0 - sign * params.trailing_stop),
                vec![entry * (1.0 + sign * target_move)],
                strength,
                format!("momentum {:.4} continuing trend", momentum),
                features,
            )
        }
        StrategyKind::MeanReversion => {
            let momentum = features.price_history.momentum;
            let direction = Direction::from_sign(-momentum);
            let strength = numerics::clamp(features.price_history.trend_strength, 0.0, 1.0);
            let sign = direction.sign();
            let widened_stop = params.stop_loss * params.stop_loss_multiple;
            finalize(
                kind,
                direction,
                strength,
                entry,
                entry * (1.0 - sign * widened_stop),
                vec![entry * (1.0 + sign * params.target_profit)],
                strength,
                format!("fading trend of strength {:.2}", features.price_history.trend_strength),
                features,
            )
        }
        StrategyKind::FlowAlignment => {
            let flow_sign = dealer_flow_sign(features);
            let direction = if features.dealer.confidence > 0.5 {
                Direction::from_sign(flow_sign as f64)
            } else {
                Direction::Neutral
            };
            let sign = direction.sign();
            finalize(
                kind,
                direction,
                features.dealer.confidence,
                entry,
                entry * (1.0 - sign * params.stop_loss),
                vec![
                    entry * (1.0 + sign * params.target_profit),
                    entry * (1.0 + sign * params.target_profit * 1.5),
                ],
                features.dealer.confidence,
                format!("dealer flow {:?} at confidence {:.2}", features.dealer.flow_direction, features.dealer.confidence),
                features,
            )
        }
        // volatility_expansion, volatility_contraction, liquidity_hunt,
        // structural_break, pattern_recognition, and fractal_resonance all
        // fall back to the regime-characteristics default: they trade the
        // regime's own momentum sign rather than a type-specific signal.
        _ => {
            let momentum = regime.characteristics.momentum;
            let direction = Direction::from_sign(momentum);
            let strength = numerics::clamp(regime.confidence, 0.0, 1.0);
            let sign = direction.sign();
            finalize(
                kind,
                direction,
                strength,
                entry,
                entry * (1.0 - sign * params.stop_loss),
                vec![entry * (1.0 + sign * params.target_profit)],
                regime.confidence,
                format!("{} riding {:?} regime", kind.name(), regime.label),
                features,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta_controller::regime::{RegimeCharacteristics, WyckoffPhase};
    use crate::perception::TrendLabel;

    fn regime(momentum: f64, confidence: f64) -> Regime {
        Regime {
            label: crate::meta_controller::RegimeLabel::RangeBound,
            confidence,
            duration: 1,
            transition_probability: 0.1,
            characteristics: RegimeCharacteristics {
                volatility: VolRegimeLabel::Normal,
                trend: TrendLabel::Sideways,
                momentum,
                phase: WyckoffPhase::Accumulation,
            },
        }
    }

    #[test]
    fn weak_momentum_yields_no_signal() {
        let mut features = StructuralFeatures::default();
        features.spot = 100.0;
        features.price_history.momentum = 0.001;
        let params = StrategyParams::default();
        let r = regime(0.0, 0.6);
        assert!(generate(StrategyKind::MomentumFollow, &features, &r, &params).is_none());
    }

    #[test]
    fn strong_momentum_yields_directional_signal_with_one_target() {
        let mut features = StructuralFeatures::default();
        features.spot = 100.0;
        features.price_history.momentum = 0.05;
        let params = StrategyParams::default();
        let r = regime(0.0, 0.6);
        let signal = generate(StrategyKind::MomentumFollow, &features, &r, &params).unwrap();
        assert_eq!(signal.direction, Direction::Long);
        assert!(signal.strength >= MIN_SIGNAL_STRENGTH);
        assert_eq!(signal.targets.len(), 1);
        assert!(!signal.rationale.is_empty());
    }

    #[test]
    fn mean_reversion_fades_the_trend() {
        let mut features = StructuralFeatures::default();
        features.spot = 100.0;
        features.price_history.momentum = 0.05;
        features.price_history.trend_strength = 0.8;
        let params = StrategyParams::default();
        let r = regime(0.0, 0.6);
        let signal = generate(StrategyKind::MeanReversion, &features, &r, &params).unwrap();
        assert_eq!(signal.direction, Direction::Short);
    }

    #[test]
    fn low_dealer_confidence_suppresses_flow_alignment() {
        let mut features = StructuralFeatures::default();
        features.spot = 100.0;
        features.dealer.confidence = 0.2;
        features.dealer.flow_direction = crate::perception::FlowDirection::Buying;
        let params = StrategyParams::default();
        let r = regime(0.0, 0.6);
        assert!(generate(StrategyKind::FlowAlignment, &features, &r, &params).is_none());
    }

    #[test]
    fn flow_alignment_emits_two_targets() {
        let mut features = StructuralFeatures::default();
        features.spot = 100.0;
        features.dealer.confidence = 0.8;
        features.dealer.flow_direction = crate::perception::FlowDirection::Buying;
        let params = StrategyParams::default();
        let r = regime(0.0, 0.6);
        let signal = generate(StrategyKind::FlowAlignment, &features, &r, &params).unwrap();
        assert_eq!(signal.targets.len(), 2);
    }
}
