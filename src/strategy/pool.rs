//! Strategy Pool: holds the ten templates, decides which activate this
//! tick, and adapts each activated template's parameters to the prevailing
//! volatility regime.

use crate::meta_controller::{CoherenceScore, Regime, RegimeLabel};
use crate::perception::{StructuralFeatures, VolRegimeLabel};
use crate::ring_buffer::RingBuffer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::bonus;
use super::signal::{self, Signal};
use super::templates::{default_templates, StrategyKind, StrategyParams, StrategyTemplate};

const PERFORMANCE_HISTORY_CAPACITY: usize = 100;

/// Snapshot of the tick context a strategy activated under, carried on the
/// `ActiveStrategy` so Learning can later attribute an outcome back to the
/// conditions that produced it without re-deriving them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActivationContext {
    pub regime: RegimeLabel,
    pub regime_confidence: f64,
    pub coherence_total: f64,
    pub volatility_regime: VolRegimeLabel,
}

/// Running record of a template's realized outcomes, updated by Learning
/// after execution settles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub trade_count: u32,
    pub win_count: u32,
    pub average_pnl_fraction: f64,
}

impl Default for PerformanceRecord {
    fn default() -> Self {
        Self {
            trade_count: 0,
            win_count: 0,
            average_pnl_fraction: 0.0,
        }
    }
}

impl PerformanceRecord {
    pub fn win_rate(&self) -> f64 {
        if self.trade_count == 0 {
            0.0
        } else {
            self.win_count as f64 / self.trade_count as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveStrategy {
    pub kind: StrategyKind,
    pub activation_score: f64,
    pub params: StrategyParams,
    pub context: ActivationContext,
    pub current_signal: Option<Signal>,
    pub performance: PerformanceRecord,
    pub active: bool,
}

/// `low→1.2, normal→1.0, elevated→0.8, high→0.5, extreme→0.25`.
fn volatility_multiplier(regime: VolRegimeLabel) -> f64 {
    match regime {
        VolRegimeLabel::Low => 1.2,
        VolRegimeLabel::Normal => 1.0,
        VolRegimeLabel::Elevated => 0.8,
        VolRegimeLabel::High => 0.5,
        VolRegimeLabel::Extreme => 0.25,
    }
}

/// Third dispatch table: parameter adaptation per `StrategyKind`. Every
/// kind currently scales stop/trailing/target by the same volatility
/// multiplier; the match stays explicit per-kind so a future strategy can
/// diverge (e.g. a kind indifferent to vol regime) without touching the
/// others.
fn adapt_params(kind: StrategyKind, base: &StrategyParams, vol_regime: VolRegimeLabel) -> StrategyParams {
    let m = match kind {
        StrategyKind::GammaScalp
        | StrategyKind::MomentumFollow
        | StrategyKind::MeanReversion
        | StrategyKind::VolatilityExpansion
        | StrategyKind::VolatilityContraction
        | StrategyKind::LiquidityHunt
        | StrategyKind::FlowAlignment
        | StrategyKind::StructuralBreak
        | StrategyKind::PatternRecognition
        | StrategyKind::FractalResonance => volatility_multiplier(vol_regime),
    };
    StrategyParams {
        stop_loss: base.stop_loss * m,
        trailing_stop: base.trailing_stop * m,
        target_profit: base.target_profit * m,
        stop_loss_multiple: base.stop_loss_multiple,
        target_multiple: base.target_multiple,
        position_size_multiple: base.position_size_multiple,
        confidence_threshold: base.confidence_threshold,
    }
}

/// `min(max_strategies, floor(20 * coherence.confidence))`; `max_strategies`
/// defaults to 10 per the configuration surface but is overridable at
/// construction.
fn activation_cap(coherence_confidence: f64, max_strategies: usize) -> usize {
    let raw = (20.0 * coherence_confidence).floor().max(0.0) as usize;
    raw.min(max_strategies)
}

pub struct StrategyPool {
    templates: Vec<StrategyTemplate>,
    performance_history: HashMap<StrategyKind, RingBuffer<f64>>,
    performance_records: HashMap<StrategyKind, PerformanceRecord>,
    max_strategies: usize,
}

impl StrategyPool {
    pub fn new() -> Self {
        Self::with_max_strategies(10)
    }

    /// Constructs a pool whose activation cap honors `maxStrategies` from
    /// the engine's configuration surface instead of the hardcoded default.
    pub fn with_max_strategies(max_strategies: usize) -> Self {
        let templates = default_templates();
        let mut performance_history = HashMap::new();
        let mut performance_records = HashMap::new();
        for template in &templates {
            performance_history.insert(template.kind, RingBuffer::new(PERFORMANCE_HISTORY_CAPACITY));
            performance_records.insert(template.kind, PerformanceRecord::default());
        }
        Self {
            templates,
            performance_history,
            performance_records,
            max_strategies: max_strategies.max(1),
        }
    }

    pub fn templates(&self) -> &[StrategyTemplate] {
        &self.templates
    }

    /// The valid-regime sets of every template currently eligible for the
    /// given regime, for the Meta-Controller's regime-alignment sub-score.
    pub fn valid_regimes_for(&self, regime: RegimeLabel) -> Vec<Vec<RegimeLabel>> {
        self.templates
            .iter()
            .filter(|t| t.valid_regimes.contains(&regime))
            .map(|t| t.valid_regimes.clone())
            .collect()
    }

    fn recent_performance(&self, kind: StrategyKind) -> f64 {
        self.performance_history
            .get(&kind)
            .map(|history| if history.is_empty() { 0.0 } else { history.mean() })
            .unwrap_or(0.0)
    }

    /// Records one more performance sample (e.g. a realized pnl%) for a
    /// template, feeding future activation scores.
    pub fn record_performance(&mut self, kind: StrategyKind, pnl_fraction: f64) {
        if let Some(history) = self.performance_history.get_mut(&kind) {
            history.push(crate::models::sanitize(pnl_fraction));
        }
    }

    /// Updates the running win/loss record for a template after an
    /// execution outcome settles; called by Learning.
    pub fn record_outcome(&mut self, kind: StrategyKind, pnl_fraction: f64, won: bool) {
        self.record_performance(kind, pnl_fraction);
        if let Some(record) = self.performance_records.get_mut(&kind) {
            let total_pnl = record.average_pnl_fraction * record.trade_count as f64 + pnl_fraction;
            record.trade_count += 1;
            record.win_count += won as u32;
            record.average_pnl_fraction = total_pnl / record.trade_count as f64;
        }
    }

    pub fn performance_record(&self, kind: StrategyKind) -> PerformanceRecord {
        self.performance_records.get(&kind).copied().unwrap_or_default()
    }

    /// Activates every eligible template against the given regime and
    /// coherence score, ranks by activation score, and truncates to the
    /// coherence-derived cap.
    pub fn activate(
        &self,
        features: &StructuralFeatures,
        regime: &Regime,
        coherence: &CoherenceScore,
    ) -> Vec<ActiveStrategy> {
        let mut eligible: Vec<ActiveStrategy> = self
            .templates
            .iter()
            .filter(|t| t.valid_regimes.contains(&regime.label))
            .filter_map(|template| {
                let bonus = bonus::compute(template.kind, features, coherence);
                let recent_performance = self.recent_performance(template.kind);
                let score = crate::numerics::clamp(
                    0.3 * regime.confidence + 0.2 * coherence.total + bonus + 0.1 * recent_performance,
                    0.0,
                    1.0,
                );
                if score < template.activation_threshold {
                    return None;
                }
                let params = adapt_params(template.kind, &template.params, features.volatility.regime);
                let current_signal = signal::generate(template.kind, features, regime, &params);
                Some(ActiveStrategy {
                    kind: template.kind,
                    activation_score: score,
                    params,
                    context: ActivationContext {
                        regime: regime.label,
                        regime_confidence: regime.confidence,
                        coherence_total: coherence.total,
                        volatility_regime: features.volatility.regime,
                    },
                    current_signal,
                    performance: self.performance_record(template.kind),
                    active: true,
                })
            })
            .collect();

        eligible.sort_by(|a, b| b.activation_score.partial_cmp(&a.activation_score).unwrap_or(std::cmp::Ordering::Equal));
        let cap = activation_cap(coherence.confidence, self.max_strategies);
        eligible.truncate(cap);
        eligible
    }
}

impl Default for StrategyPool {
    fn default() -> Self {
        Self::new()
    }
}
