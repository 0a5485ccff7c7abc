//! Risk Governance: signals + portfolio + features -> approved actions.
//!
//! The kill switch is sticky and reason-tagged (activates on breach,
//! clears only on explicit deactivation or, for a daily-loss reason, on
//! `reset_daily_risk`) with a drawdown-monitor hysteresis band; Kelly sizing
//! follows the classic raw-fraction formula almost verbatim, generalized from
//! a per-signal-family bankroll fraction to a per-position notional size.

use crate::config::EngineConfig;
use crate::models::{sanitize, Direction};
use crate::perception::{StructuralFeatures, VolRegimeLabel};
use crate::strategy::Signal;
use serde::{Deserialize, Serialize};

const MAX_KELLY_FRACTION: f64 = 0.25;
const GLOBAL_MARGIN_FLOOR: f64 = 0.10;
const GAMMA_EXPOSURE_LIMIT: f64 = 0.01;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    /// Notional dollar size at entry.
    pub size: f64,
    pub entry_price: f64,
    pub current_price: f64,
}

impl Position {
    /// Mark-to-market value: notional scaled by price drift since entry.
    pub fn market_value(&self) -> f64 {
        if self.entry_price.abs() < f64::EPSILON {
            self.size
        } else {
            self.size * (self.current_price / self.entry_price)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: f64,
    pub positions: Vec<Position>,
    pub margin_used: f64,
    pub margin_available: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub daily_pnl: f64,
    pub max_drawdown: f64,
    pub current_drawdown: f64,
}

impl Portfolio {
    pub fn new(cash: f64) -> Self {
        Self {
            cash,
            positions: Vec::new(),
            margin_used: 0.0,
            margin_available: cash,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            daily_pnl: 0.0,
            max_drawdown: 0.0,
            current_drawdown: 0.0,
        }
    }

    pub fn total_value(&self) -> f64 {
        self.cash + self.positions.iter().map(Position::market_value).sum::<f64>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    Ioc,
    Day,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub correlation: f64,
    pub gamma_exposure: f64,
    pub var_contribution: f64,
    pub max_loss: f64,
    pub margin_required: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionConstraints {
    pub max_slippage: f64,
    pub urgency: Urgency,
    pub order_type: OrderType,
    pub iceberg_ratio: f64,
    pub time_in_force: TimeInForce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedSignal {
    pub signal: Signal,
    pub approved_size: f64,
    pub metrics: RiskMetrics,
    pub constraints: ExecutionConstraints,
    pub risk_score: f64,
}

/// Sticky until explicitly cleared, except daily-loss trips which
/// `reset_daily_risk` may clear — a circuit breaker generalized from a
/// single data source to the whole portfolio.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KillSwitch {
    active: bool,
    reason: String,
}

impl KillSwitch {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn trip(&mut self, reason: String) {
        self.active = true;
        self.reason = reason;
    }

    pub fn clear(&mut self) {
        self.active = false;
        self.reason.clear();
    }

    /// Clears the switch only if it was tripped for a daily-loss reason.
    /// Returns whether it was cleared.
    pub fn reset_daily_risk(&mut self) -> bool {
        if self.active && self.reason.contains("daily loss") {
            self.clear();
            true
        } else {
            false
        }
    }
}

fn volatility_multiplier(regime: VolRegimeLabel) -> f64 {
    match regime {
        VolRegimeLabel::Low => 1.2,
        VolRegimeLabel::Normal => 1.0,
        VolRegimeLabel::Elevated => 0.8,
        VolRegimeLabel::High => 0.5,
        VolRegimeLabel::Extreme => 0.25,
    }
}

fn volatility_penalty(regime: VolRegimeLabel) -> f64 {
    match regime {
        VolRegimeLabel::Low => 0.0,
        VolRegimeLabel::Normal => 0.1,
        VolRegimeLabel::Elevated => 0.2,
        VolRegimeLabel::High => 0.35,
        VolRegimeLabel::Extreme => 0.5,
    }
}

/// Raw Kelly fraction from a win probability: `b = 1/p - 1`, `f* = (b*p - q) / b`.
fn raw_kelly_fraction(win_probability: f64) -> f64 {
    let p = win_probability.clamp(0.001, 0.999);
    let q = 1.0 - p;
    let b = (1.0 / p) - 1.0;
    if b <= 0.0 {
        return 0.0;
    }
    ((b * p - q) / b).max(0.0)
}

fn urgency_of(strength: f64, vol_regime: VolRegimeLabel) -> Urgency {
    if strength > 0.7 || matches!(vol_regime, VolRegimeLabel::High | VolRegimeLabel::Extreme) {
        Urgency::High
    } else if strength < 0.3 {
        Urgency::Low
    } else {
        Urgency::Medium
    }
}

pub struct RiskGovernor {
    max_position_size: f64,
    max_portfolio_risk: f64,
    max_correlation: f64,
    max_drawdown: f64,
    max_daily_loss: f64,
    max_concentration: f64,
    kill_switch: KillSwitch,
    peak_equity: f64,
}

impl RiskGovernor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_position_size: config.max_position_size,
            max_portfolio_risk: config.max_portfolio_risk,
            max_correlation: config.max_correlation,
            max_drawdown: config.max_drawdown,
            max_daily_loss: config.max_daily_loss,
            max_concentration: config.max_concentration,
            kill_switch: KillSwitch::default(),
            peak_equity: config.initial_cash,
        }
    }

    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    pub fn reset_daily_risk(&mut self) -> bool {
        self.kill_switch.reset_daily_risk()
    }

    pub fn deactivate_kill_switch(&mut self) {
        self.kill_switch.clear();
    }

    /// Steps 2-3 of the pipeline: peak-equity/drawdown tracking and the
    /// daily-loss check. Mutates the kill switch; does not touch signals.
    pub fn update_risk_state(&mut self, portfolio: &Portfolio) {
        let total_value = portfolio.total_value();
        if total_value > self.peak_equity {
            self.peak_equity = total_value;
        }
        if self.peak_equity > 0.0 {
            let drawdown = ((self.peak_equity - total_value) / self.peak_equity).clamp(0.0, 1.0);
            if drawdown > self.max_drawdown {
                self.kill_switch
                    .trip(format!("drawdown {:.4} exceeds max_drawdown limit", drawdown));
            }
        }
        if total_value > 0.0 && portfolio.daily_pnl.abs() > self.max_daily_loss * total_value {
            self.kill_switch.trip(format!(
                "daily loss {:.2} exceeds max_daily_loss limit",
                portfolio.daily_pnl
            ));
        }
    }

    fn evaluate_signal(
        &self,
        signal: &Signal,
        portfolio: &Portfolio,
        features: &StructuralFeatures,
        total_value: f64,
    ) -> Option<ApprovedSignal> {
        if signal.entry.abs() < f64::EPSILON {
            return None;
        }
        let vol_mult = volatility_multiplier(features.volatility.regime);
        let raw_kelly = raw_kelly_fraction(signal.confidence).min(MAX_KELLY_FRACTION);
        let half_kelly = raw_kelly * 0.5;

        let size_by_kelly = total_value * half_kelly * vol_mult;
        let size_by_cap = self.max_position_size * total_value;
        let size_by_margin = portfolio.margin_available / 0.5;
        let approved_size = sanitize(size_by_kelly.min(size_by_cap).min(size_by_margin));
        if approved_size <= 0.0 {
            return None;
        }

        let same_direction_notional: f64 = portfolio
            .positions
            .iter()
            .filter(|p| p.direction == signal.direction)
            .map(|p| p.size)
            .sum();
        let correlation = if total_value > 0.0 {
            same_direction_notional / total_value
        } else {
            0.0
        };
        let gamma_exposure = signal.context.gamma_level * 0.01;
        if correlation > self.max_correlation || gamma_exposure.abs() > GAMMA_EXPOSURE_LIMIT {
            return None;
        }

        let max_loss = (signal.entry - signal.stop).abs() / signal.entry;
        let var_contribution = max_loss * signal.confidence;
        let margin_required = signal.entry * 0.5;

        let vol_penalty = volatility_penalty(features.volatility.regime);
        let risk_score = sanitize(crate::numerics::clamp(
            0.35 * crate::numerics::clamp(correlation / self.max_correlation.max(f64::EPSILON), 0.0, 1.0)
                + 0.35 * crate::numerics::clamp(gamma_exposure.abs() / GAMMA_EXPOSURE_LIMIT, 0.0, 1.0)
                + 0.20 * crate::numerics::clamp(var_contribution, 0.0, 1.0)
                + 0.10 * vol_penalty,
            0.0,
            1.0,
        ));

        let urgency = urgency_of(signal.strength, features.volatility.regime);
        let order_type = if urgency == Urgency::High { OrderType::Market } else { OrderType::Limit };
        let depth = features.liquidity.depth;
        let max_slippage = 0.001 * (1.0 + features.volatility.implied_vol / 100.0 + 1.0 / (depth + 1.0));
        let iceberg_ratio = if signal.strength > 0.7 { 0.2 } else { 0.5 };
        let time_in_force = if urgency == Urgency::High { TimeInForce::Ioc } else { TimeInForce::Day };

        Some(ApprovedSignal {
            signal: signal.clone(),
            approved_size,
            metrics: RiskMetrics {
                correlation: sanitize(correlation),
                gamma_exposure: sanitize(gamma_exposure),
                var_contribution: sanitize(var_contribution),
                max_loss: sanitize(max_loss),
                margin_required: sanitize(margin_required),
            },
            constraints: ExecutionConstraints {
                max_slippage: sanitize(max_slippage),
                urgency,
                order_type,
                iceberg_ratio,
                time_in_force,
            },
            risk_score,
        })
    }

    /// Steps 1, 4-9 of the pipeline. Call `update_risk_state` first each
    /// tick so the kill switch reflects the latest portfolio snapshot.
    pub fn filter(
        &self,
        signals: &[Signal],
        portfolio: &Portfolio,
        features: &StructuralFeatures,
    ) -> Vec<ApprovedSignal> {
        if self.kill_switch.is_active() {
            return Vec::new();
        }
        let total_value = portfolio.total_value();
        if total_value <= 0.0 {
            return Vec::new();
        }
        if portfolio.margin_available < GLOBAL_MARGIN_FLOOR * total_value {
            return Vec::new();
        }
        let over_concentrated = portfolio
            .positions
            .iter()
            .any(|p| p.size / total_value > self.max_concentration);
        if over_concentrated {
            return Vec::new();
        }

        let mut candidates: Vec<ApprovedSignal> = signals
            .iter()
            .filter_map(|signal| self.evaluate_signal(signal, portfolio, features, total_value))
            .collect();
        candidates.sort_by(|a, b| a.risk_score.partial_cmp(&b.risk_score).unwrap_or(std::cmp::Ordering::Equal));

        let mut accepted = Vec::new();
        let mut cumulative_var_fraction = 0.0;
        let mut cumulative_margin = 0.0;
        for candidate in candidates {
            let var_fraction = candidate.metrics.var_contribution * (candidate.approved_size / total_value);
            let margin_needed = candidate.metrics.margin_required;
            if cumulative_var_fraction + var_fraction <= self.max_portfolio_risk
                && cumulative_margin + margin_needed <= portfolio.margin_available
            {
                cumulative_var_fraction += var_fraction;
                cumulative_margin += margin_needed;
                accepted.push(candidate);
            }
        }
        accepted
    }
}
