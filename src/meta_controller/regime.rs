//! Regime classification: a rule-ordered cascade over ten structural inputs.

use crate::numerics;
use crate::perception::RegimeInputs;
use crate::ring_buffer::RingBuffer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeLabel {
    TrendingBullish,
    TrendingBearish,
    RangeBound,
    Breakout,
    Breakdown,
    Consolidation,
    HighVolatility,
    LowVolatility,
    GammaSqueeze,
    MeanReversion,
}

impl Default for RegimeLabel {
    fn default() -> Self {
        RegimeLabel::RangeBound
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WyckoffPhase {
    Accumulation,
    Markup,
    Distribution,
    Markdown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegimeCharacteristics {
    pub volatility: crate::perception::VolRegimeLabel,
    pub trend: crate::perception::TrendLabel,
    pub momentum: f64,
    pub phase: WyckoffPhase,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Regime {
    pub label: RegimeLabel,
    pub confidence: f64,
    pub duration: usize,
    pub transition_probability: f64,
    pub characteristics: RegimeCharacteristics,
}

/// First-match-wins cascade over the ten extracted features.
pub fn classify_label(inputs: &RegimeInputs) -> RegimeLabel {
    let iv = inputs.implied_vol;
    let momentum = inputs.momentum;
    let trend_str = inputs.trend_strength;
    let vol_of_vol = inputs.vol_of_vol;

    if iv > 0.40 {
        RegimeLabel::HighVolatility
    } else if iv > 0.0 && iv < 0.15 {
        // `iv == 0.0` means no vol was ever observed (empty chain, flat/too-short
        // price history), not a genuinely quiet market; fall through to the
        // trend/range rules below rather than mislabeling a zero-information
        // tick as low-volatility.
        RegimeLabel::LowVolatility
    } else if inputs.gamma_magnitude > 0.7 && inputs.net_gamma.abs() > 1e6 {
        RegimeLabel::GammaSqueeze
    } else if momentum > 0.02 && trend_str > 0.6 {
        RegimeLabel::TrendingBullish
    } else if momentum < -0.02 && trend_str > 0.6 {
        RegimeLabel::TrendingBearish
    } else if vol_of_vol > 0.3 && momentum > 0.01 {
        RegimeLabel::Breakout
    } else if vol_of_vol > 0.3 && momentum < -0.01 {
        RegimeLabel::Breakdown
    } else if momentum.abs() < 0.005 && iv > 0.2 {
        RegimeLabel::MeanReversion
    } else if trend_str < 0.3 && momentum.abs() < 0.01 {
        RegimeLabel::RangeBound
    } else if iv < 0.2 && trend_str < 0.4 {
        RegimeLabel::Consolidation
    } else {
        RegimeLabel::RangeBound
    }
}

fn confidence_for(label: RegimeLabel, inputs: &RegimeInputs) -> f64 {
    let c = match label {
        RegimeLabel::TrendingBullish | RegimeLabel::TrendingBearish => {
            0.5 + 0.3 * numerics::clamp(10.0 * inputs.momentum.abs(), 0.0, 1.0)
                + 0.2 * inputs.trend_strength
        }
        RegimeLabel::HighVolatility => {
            0.5 + 0.5 * numerics::clamp(inputs.implied_vol - 0.3, 0.0, 1.0)
        }
        RegimeLabel::LowVolatility => 0.5 + 0.5 * numerics::clamp(0.15 - inputs.implied_vol, 0.0, 1.0),
        RegimeLabel::GammaSqueeze => 0.5 + 0.3 * inputs.gamma_magnitude,
        RegimeLabel::Breakout | RegimeLabel::Breakdown => {
            0.5 + 0.3 * numerics::clamp(inputs.vol_of_vol, 0.0, 1.0)
        }
        RegimeLabel::MeanReversion => 0.5 + 0.3 * numerics::clamp(inputs.implied_vol - 0.2, 0.0, 1.0),
        RegimeLabel::RangeBound | RegimeLabel::Consolidation => {
            0.5 + 0.3 * numerics::clamp(0.3 - inputs.trend_strength, 0.0, 1.0)
        }
    };
    numerics::clamp(c, 0.0, 1.0)
}

fn phase_for(inputs: &RegimeInputs) -> WyckoffPhase {
    if inputs.momentum > 0.01 && inputs.trend_strength > 0.5 {
        WyckoffPhase::Markup
    } else if inputs.momentum < -0.01 && inputs.trend_strength > 0.5 {
        WyckoffPhase::Markdown
    } else if inputs.liquidity_imbalance > 0.2 && inputs.momentum.abs() < 0.01 {
        WyckoffPhase::Accumulation
    } else if inputs.liquidity_imbalance < -0.2 && inputs.momentum.abs() < 0.01 {
        WyckoffPhase::Distribution
    } else if inputs.momentum >= 0.0 {
        WyckoffPhase::Accumulation
    } else {
        WyckoffPhase::Distribution
    }
}

/// Run-length of the current label in recent history (most-recent-first
/// history, so `history[0]` is the prior tick's label).
fn duration(history: &[RegimeLabel], label: RegimeLabel) -> usize {
    history.iter().take_while(|&&l| l == label).count() + 1
}

/// `(adjacent transitions into `label` / times in `label`)`, boosted by
/// `0.5 * vol_of_vol`, clamped to `[0, 0.9]`; defaults to 0.1 below 10
/// samples of history.
fn transition_probability(history: &[RegimeLabel], label: RegimeLabel, vol_of_vol: f64) -> f64 {
    if history.len() < 10 {
        return 0.1;
    }
    let mut transitions_in = 0usize;
    let mut occurrences = 0usize;
    for window in history.windows(2) {
        if window[1] == label {
            occurrences += 1;
            if window[0] != label {
                transitions_in += 1;
            }
        }
    }
    if occurrences == 0 {
        return 0.1;
    }
    let base = transitions_in as f64 / occurrences as f64;
    numerics::clamp(base + 0.5 * vol_of_vol, 0.0, 0.9)
}

pub fn classify(
    inputs: &RegimeInputs,
    volatility_label: crate::perception::VolRegimeLabel,
    trend_label: crate::perception::TrendLabel,
    history: &RingBuffer<RegimeLabel>,
) -> Regime {
    let label = classify_label(inputs);
    let confidence = confidence_for(label, inputs);
    let recent = history.recent(history.len());
    let dur = duration(&recent, label);
    let transition = transition_probability(&recent, label, inputs.vol_of_vol);

    Regime {
        label,
        confidence,
        duration: dur,
        transition_probability: transition,
        characteristics: RegimeCharacteristics {
            volatility: volatility_label,
            trend: trend_label,
            momentum: inputs.momentum,
            phase: phase_for(inputs),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(momentum: f64, trend_strength: f64, iv: f64) -> RegimeInputs {
        RegimeInputs {
            momentum,
            trend_strength,
            implied_vol: iv,
            vol_of_vol: 0.05,
            vol_spread: 0.0,
            skew: 0.0,
            gamma_direction: 0,
            gamma_magnitude: 0.0,
            net_gamma: 0.0,
            liquidity_imbalance: 0.0,
            absorption: 0.0,
        }
    }

    #[test]
    fn high_iv_wins_first() {
        let i = inputs(0.03, 0.8, 0.5);
        assert_eq!(classify_label(&i), RegimeLabel::HighVolatility);
    }

    #[test]
    fn strong_uptrend_is_trending_bullish() {
        let i = inputs(0.03, 0.8, 0.25);
        assert_eq!(classify_label(&i), RegimeLabel::TrendingBullish);
    }

    #[test]
    fn zero_information_iv_does_not_trigger_low_volatility() {
        let i = inputs(0.0, 0.1, 0.0);
        let label = classify_label(&i);
        assert!(matches!(
            label,
            RegimeLabel::RangeBound | RegimeLabel::Consolidation
        ));
    }

    #[test]
    fn flat_low_vol_defaults_to_range_bound_family() {
        let i = inputs(0.0, 0.1, 0.18);
        let label = classify_label(&i);
        assert!(matches!(
            label,
            RegimeLabel::RangeBound | RegimeLabel::Consolidation
        ));
    }

    #[test]
    fn gamma_squeeze_detected_before_trend_rules() {
        let mut i = inputs(0.0, 0.1, 0.3);
        i.gamma_magnitude = 0.8;
        i.net_gamma = 2_000_000.0;
        assert_eq!(classify_label(&i), RegimeLabel::GammaSqueeze);
    }

    #[test]
    fn confidence_bounded_in_unit_range() {
        let i = inputs(0.05, 0.9, 0.45);
        let label = classify_label(&i);
        let c = confidence_for(label, &i);
        assert!((0.0..=1.0).contains(&c));
    }
}
