//! Learning: fills -> trade outcomes -> parameter-adjustment suggestions.
//!
//! The per-strategy performance rollup (win rate / Sharpe / max drawdown /
//! profit factor / equity curve) is computed online, per strategy, from the
//! outcome history accumulated here rather than offline from a fixed signal
//! set.

use crate::execution::ExecutionResult;
use crate::models::{sanitize, Direction};
use crate::numerics;
use crate::perception::StructuralFeatures;
use crate::ring_buffer::RingBuffer;
use crate::strategy::StrategyKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

const OUTCOME_HISTORY_CAPACITY: usize = 10_000;
const PER_STRATEGY_HISTORY_CAPACITY: usize = 1_000;
const MAX_SUGGESTIONS: usize = 100;
const MAX_EVOLUTION_VERSIONS: usize = 50;
const EQUITY_CURVE_SEED: f64 = 100_000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub trade_id: Uuid,
    pub strategy: StrategyKind,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub pnl: f64,
    pub pnl_fraction: f64,
    pub holding_period_ms: i64,
    pub max_drawdown: f64,
    pub max_runup: f64,
    pub features_at_entry: StructuralFeatures,
    pub features_at_exit: StructuralFeatures,
    pub correct: bool,
    pub execution_quality: f64,
    pub timestamp: i64,
}

/// Eight structural inputs whose predictive weight Learning tracks.
pub const FEATURE_NAMES: [&str; 8] = [
    "momentum",
    "trend_strength",
    "implied_vol",
    "vol_of_vol",
    "gamma_magnitude",
    "liquidity_imbalance",
    "dealer_confidence",
    "regime_confidence",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRollup {
    pub strategy: StrategyKind,
    pub trade_count: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub recent_performance: f64,
    pub adaptation_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSuggestion {
    pub strategy: StrategyKind,
    pub parameter: &'static str,
    pub from_value: f64,
    pub to_value: f64,
    pub reason: &'static str,
    pub timestamp: i64,
}

struct StrategyLedger {
    outcomes: RingBuffer<f64>,
    win_flags: RingBuffer<f64>,
}

impl StrategyLedger {
    fn new() -> Self {
        Self {
            outcomes: RingBuffer::new(PER_STRATEGY_HISTORY_CAPACITY),
            win_flags: RingBuffer::new(PER_STRATEGY_HISTORY_CAPACITY),
        }
    }

    fn record(&mut self, pnl_fraction: f64, won: bool) {
        self.outcomes.push(sanitize(pnl_fraction));
        self.win_flags.push(if won { 1.0 } else { 0.0 });
    }

    fn rollup(&self, strategy: StrategyKind) -> PerformanceRollup {
        let trade_count = self.outcomes.len();
        if trade_count == 0 {
            return PerformanceRollup {
                strategy,
                trade_count: 0,
                win_rate: 0.0,
                profit_factor: 0.0,
                sharpe: 0.0,
                max_drawdown: 0.0,
                recent_performance: 0.0,
                adaptation_score: 0.0,
            };
        }
        let pnls = self.outcomes.to_vec();
        let win_rate = self.win_flags.mean();

        let wins: Vec<f64> = pnls.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = pnls.iter().copied().filter(|p| *p < 0.0).map(f64::abs).collect();
        let avg_win = numerics::mean(&wins);
        let avg_loss = numerics::mean(&losses);
        let profit_factor = if avg_loss.abs() < f64::EPSILON {
            if avg_win > 0.0 {
                999.0
            } else {
                0.0
            }
        } else {
            avg_win / avg_loss
        };

        let sharpe = numerics::sharpe_ratio(&pnls, 252f64.sqrt());

        let mut equity_curve = Vec::with_capacity(pnls.len() + 1);
        let mut equity = EQUITY_CURVE_SEED;
        equity_curve.push(equity);
        for pnl in &pnls {
            equity *= 1.0 + pnl;
            equity_curve.push(equity);
        }
        let max_drawdown = numerics::max_drawdown(&equity_curve);

        let recent_window = pnls.len().min(20);
        let recent_performance = numerics::mean(&pnls[pnls.len() - recent_window..]);

        let adaptation_score = if pnls.len() >= 2 {
            let mid = pnls.len() / 2;
            numerics::mean(&pnls[mid..]) - numerics::mean(&pnls[..mid])
        } else {
            0.0
        };

        PerformanceRollup {
            strategy,
            trade_count,
            win_rate: sanitize(win_rate),
            profit_factor: sanitize(profit_factor),
            sharpe: sanitize(sharpe),
            max_drawdown: sanitize(max_drawdown),
            recent_performance: sanitize(recent_performance),
            adaptation_score: sanitize(adaptation_score),
        }
    }
}

pub struct Learning {
    outcomes: RingBuffer<TradeOutcome>,
    ledgers: HashMap<StrategyKind, StrategyLedger>,
    suggestions: RingBuffer<ParameterSuggestion>,
    evolutions: HashMap<StrategyKind, RingBuffer<f64>>,
    feature_importance: [f64; 8],
}

impl Learning {
    pub fn new() -> Self {
        let mut ledgers = HashMap::new();
        let mut evolutions = HashMap::new();
        for kind in StrategyKind::ALL {
            ledgers.insert(kind, StrategyLedger::new());
            evolutions.insert(kind, RingBuffer::new(MAX_EVOLUTION_VERSIONS));
        }
        Self {
            outcomes: RingBuffer::new(OUTCOME_HISTORY_CAPACITY),
            ledgers,
            suggestions: RingBuffer::new(MAX_SUGGESTIONS),
            evolutions,
            feature_importance: [1.0 / 8.0; 8],
        }
    }

    /// Synthesizes a trade outcome from a successful execution result. Uses
    /// the same feature snapshot for entry and exit: this pipeline has no
    /// separate completion-time feature stream, a known simplification.
    pub fn synthesize_outcome(
        &mut self,
        result: &ExecutionResult,
        exit_price: f64,
        features: &StructuralFeatures,
        timestamp: i64,
    ) -> Option<TradeOutcome> {
        if !result.success {
            return None;
        }
        let order = &result.order;
        let side_sign = order.side.sign();
        let pnl = side_sign * (exit_price - order.fill_price) * order.fill_size;
        let notional = order.fill_price * order.fill_size;
        let pnl_fraction = if notional.abs() > f64::EPSILON { pnl / notional } else { 0.0 };
        let holding_period_ms = order.filled_at - order.submitted_at;
        let correct = (pnl > 0.0) == (order.side != Direction::Neutral);

        let fill_rate_score = if order.fill_size > 0.0 { 1.0 } else { 0.0 };
        let slippage_score = 1.0 - numerics::clamp(result.realized_slippage.abs() * 100.0, 0.0, 1.0);
        let speed_score = 1.0 - numerics::clamp(result.execution_latency_ms as f64 / 60.0, 0.0, 1.0);
        let execution_quality = 0.3 * fill_rate_score + 0.4 * slippage_score + 0.3 * speed_score;

        let outcome = TradeOutcome {
            trade_id: Uuid::new_v4(),
            // Placeholder: an `ExecutionResult` only carries the parent
            // signal id, not the originating `StrategyKind`. Callers that
            // know the kind (the orchestrator does) must pass it through
            // `record_for_strategy`, which overwrites this field.
            strategy: StrategyKind::MomentumFollow,
            entry_price: order.fill_price,
            exit_price,
            size: order.fill_size,
            pnl: sanitize(pnl),
            pnl_fraction: sanitize(pnl_fraction),
            holding_period_ms,
            max_drawdown: 0.0,
            max_runup: 0.0,
            features_at_entry: features.clone(),
            features_at_exit: features.clone(),
            correct,
            execution_quality: sanitize(execution_quality),
            timestamp,
        };

        Some(outcome)
    }

    /// Callers attach the originating strategy explicitly (the execution
    /// layer only knows the parent signal id), so `record` is the entry
    /// point orchestrator code actually calls per fill.
    pub fn record_for_strategy(&mut self, strategy: StrategyKind, mut outcome: TradeOutcome) -> TradeOutcome {
        outcome.strategy = strategy;
        self.record(&outcome);
        outcome
    }

    fn record(&mut self, outcome: &TradeOutcome) {
        let won = outcome.pnl > 0.0;
        if let Some(ledger) = self.ledgers.get_mut(&outcome.strategy) {
            ledger.record(outcome.pnl_fraction, won);
        }
        self.update_feature_importance(won);
        self.maybe_suggest(outcome.strategy, outcome.timestamp);
        self.outcomes.push(outcome.clone());
    }

    fn update_feature_importance(&mut self, won: bool) {
        let delta = if won { 0.01 } else { -0.005 };
        for v in self.feature_importance.iter_mut() {
            *v = (*v + delta).max(0.01);
        }
        let total: f64 = self.feature_importance.iter().sum();
        if total > 0.0 {
            for v in self.feature_importance.iter_mut() {
                *v /= total;
            }
        }
    }

    fn maybe_suggest(&mut self, strategy: StrategyKind, timestamp: i64) {
        let rollup = self.rollup_for(strategy);
        if rollup.win_rate < 0.4 && rollup.trade_count > 20 {
            self.suggestions.push(ParameterSuggestion {
                strategy,
                parameter: "activation_threshold",
                from_value: 0.6,
                to_value: 0.7,
                reason: "win rate below 0.4 with sufficient sample",
                timestamp,
            });
        }
        if rollup.profit_factor < 1.0 && rollup.trade_count > 30 {
            self.suggestions.push(ParameterSuggestion {
                strategy,
                parameter: "stop_loss_multiple",
                from_value: 1.0,
                to_value: 0.8,
                reason: "profit factor below 1 with sufficient sample",
                timestamp,
            });
        }
        if rollup.max_drawdown > 0.15 {
            self.suggestions.push(ParameterSuggestion {
                strategy,
                parameter: "position_size_multiple",
                from_value: 1.0,
                to_value: 0.7,
                reason: "max drawdown exceeds 0.15",
                timestamp,
            });
        }
        if rollup.recent_performance < -0.02 {
            self.suggestions.push(ParameterSuggestion {
                strategy,
                parameter: "confidence_threshold",
                from_value: 0.5,
                to_value: 0.6,
                reason: "recent performance below -0.02",
                timestamp,
            });
        }
        if let Some(evolution) = self.evolutions.get_mut(&strategy) {
            evolution.push(rollup.adaptation_score);
        }
    }

    pub fn rollup_for(&self, strategy: StrategyKind) -> PerformanceRollup {
        self.ledgers
            .get(&strategy)
            .map(|l| l.rollup(strategy))
            .unwrap_or(PerformanceRollup {
                strategy,
                trade_count: 0,
                win_rate: 0.0,
                profit_factor: 0.0,
                sharpe: 0.0,
                max_drawdown: 0.0,
                recent_performance: 0.0,
                adaptation_score: 0.0,
            })
    }

    pub fn all_rollups(&self) -> Vec<PerformanceRollup> {
        StrategyKind::ALL.iter().map(|k| self.rollup_for(*k)).collect()
    }

    pub fn recent_suggestions(&self) -> Vec<ParameterSuggestion> {
        self.suggestions.to_vec()
    }

    pub fn recent_outcomes(&self, n: usize) -> Vec<TradeOutcome> {
        self.outcomes.recent(n)
    }

    pub fn feature_importance(&self) -> HashMap<&'static str, f64> {
        FEATURE_NAMES.iter().zip(self.feature_importance.iter()).map(|(n, v)| (*n, *v)).collect()
    }

    pub fn evolution_versions(&self, strategy: StrategyKind) -> Vec<f64> {
        self.evolutions.get(&strategy).map(|r| r.to_vec()).unwrap_or_default()
    }
}

impl Default for Learning {
    fn default() -> Self {
        Self::new()
    }
}
