//! Meta-Controller: turns structural features into a classified regime plus
//! a coherence score the Strategy Pool sizes its activation count from.

pub mod coherence;
pub mod regime;

use crate::models::Direction;
use crate::perception::StructuralFeatures;
use crate::ring_buffer::RingBuffer;
use coherence::FeatureVector;
use serde::{Deserialize, Serialize};

pub use coherence::CoherenceScore;
pub use regime::{Regime, RegimeLabel, WyckoffPhase};

const HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeAssessment {
    pub regime: Regime,
    pub coherence: CoherenceScore,
}

/// Owns every piece of bounded state the classification/coherence pipeline
/// needs across ticks: regime history, coherence-scalar history, and the
/// momentum/volatility/feature-vector histories coherence's sub-scores read.
pub struct MetaController {
    regime_history: RingBuffer<RegimeLabel>,
    coherence_history: RingBuffer<f64>,
    momentum_history: RingBuffer<f64>,
    volatility_history: RingBuffer<f64>,
    feature_vector_history: RingBuffer<FeatureVector>,
}

impl MetaController {
    pub fn new() -> Self {
        Self {
            regime_history: RingBuffer::new(HISTORY_CAPACITY),
            coherence_history: RingBuffer::new(HISTORY_CAPACITY),
            momentum_history: RingBuffer::new(HISTORY_CAPACITY),
            volatility_history: RingBuffer::new(HISTORY_CAPACITY),
            feature_vector_history: RingBuffer::new(HISTORY_CAPACITY),
        }
    }

    /// Classifies this tick's regime from structural features alone. Called
    /// once up front (orchestrator step 2) before any strategy has activated.
    pub fn classify(&self, features: &StructuralFeatures) -> Regime {
        let inputs = features.regime_inputs();
        regime::classify(
            &inputs,
            features.volatility.regime,
            features.price_history.trend,
            &self.regime_history,
        )
    }

    /// Scores coherence given the regime already classified and whichever
    /// strategies/signals are live at the point of the call (preliminary on
    /// the first pass, real on the second — see orchestrator steps 3-5).
    /// Recording into history happens once per tick via `record`, not here,
    /// since `coherence` may legitimately be called twice per tick.
    pub fn coherence(
        &self,
        features: &StructuralFeatures,
        regime: &Regime,
        active_valid_regimes: &[Vec<RegimeLabel>],
        signal_directions: &[Direction],
    ) -> CoherenceScore {
        coherence::compute(coherence::CoherenceInputs {
            features,
            current_regime: regime.label,
            active_valid_regimes,
            momentum_history: &self.momentum_history,
            volatility_history: &self.volatility_history,
            feature_vector_history: &self.feature_vector_history,
            signal_directions,
        })
    }

    /// Commits this tick's final regime/coherence/features into bounded
    /// history. Call once per tick, after the real (post-activation)
    /// coherence has been computed.
    pub fn record(&mut self, features: &StructuralFeatures, regime: &Regime, coherence: &CoherenceScore) {
        self.regime_history.push(regime.label);
        self.coherence_history.push(coherence.total);
        self.momentum_history.push(features.price_history.momentum);
        self.volatility_history.push(features.volatility.implied_vol);
        self.feature_vector_history
            .push(coherence::current_feature_vector(features));
    }

    /// Convenience wrapper for callers (and tests) that don't need the
    /// two-pass preliminary/real activation split: classifies, scores
    /// coherence once against the given active set, and records.
    pub fn assess(
        &mut self,
        features: &StructuralFeatures,
        active_valid_regimes: &[Vec<RegimeLabel>],
        signal_directions: &[Direction],
    ) -> RegimeAssessment {
        let regime = self.classify(features);
        let coherence = self.coherence(features, &regime, active_valid_regimes, signal_directions);
        self.record(features, &regime, &coherence);
        RegimeAssessment { regime, coherence }
    }
}

impl Default for MetaController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::Perception;

    fn flat_bundle() -> crate::models::MarketBundle {
        crate::models::MarketBundle {
            symbol: "TEST".into(),
            timestamp: 0,
            fast: crate::models::TimeframeStream {
                bars: vec![crate::models::Bar {
                    timestamp: 0,
                    open: 100.0,
                    high: 100.0,
                    low: 100.0,
                    close: 100.0,
                    volume: 10.0,
                }],
                prints: vec![],
                order_book: None,
            },
            slow: Default::default(),
            chain: Default::default(),
        }
    }

    #[test]
    fn repeated_flat_ticks_stabilize_regime_and_raise_duration() {
        let mut perception = Perception::new(200);
        let mut controller = MetaController::new();
        let bundle = flat_bundle();

        let mut last = None;
        for _ in 0..20 {
            let features = perception.process(&bundle);
            last = Some(controller.assess(&features, &[], &[]));
        }
        let last = last.unwrap();
        assert!(last.regime.duration >= 2);
        assert!((0.0..=1.0).contains(&last.coherence.confidence));
    }

    #[test]
    fn first_tick_never_panics_on_empty_history() {
        let features = StructuralFeatures::default();
        let mut controller = MetaController::new();
        let assessment = controller.assess(&features, &[], &[]);
        assert!((0.0..=1.0).contains(&assessment.coherence.total));
    }

    #[test]
    fn coherence_can_be_queried_twice_before_a_single_record() {
        let mut perception = Perception::new(200);
        let mut controller = MetaController::new();
        let bundle = flat_bundle();
        let features = perception.process(&bundle);
        let regime = controller.classify(&features);
        let preliminary = controller.coherence(&features, &regime, &[], &[]);
        let real = controller.coherence(&features, &regime, &[vec![regime.label]], &[]);
        controller.record(&features, &regime, &real);
        assert_eq!(controller.regime_history.len(), 1);
        assert!(real.regime_alignment >= preliminary.regime_alignment);
    }
}
