//! Execution simulation: approved signals -> simulated fills with slippage,
//! latency, and market impact.
//!
//! Draws from a seeded `ChaCha8Rng` rather than thread-local `rand` so two
//! runs given the same seed reproduce byte-identical fills. The latency
//! wait is modeled as `tokio::time::sleep`, the pipeline's only await point.

use crate::models::{sanitize, Direction};
use crate::risk::{ApprovedSignal, OrderType, Urgency};
use crate::ring_buffer::RingBuffer;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const RESULT_HISTORY_CAPACITY: usize = 1000;
const SLIPPAGE_HISTORY_CAPACITY: usize = 100;
const DEFAULT_SLIPPAGE_ESTIMATE: f64 = 0.0008;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Submitted,
    Partial,
    Filled,
    Cancelled,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub parent_signal_id: Uuid,
    pub side: Direction,
    pub order_type: OrderType,
    pub size: f64,
    pub price: f64,
    pub status: OrderStatus,
    pub fill_size: f64,
    pub fill_price: f64,
    pub fees: f64,
    pub submitted_at: i64,
    pub filled_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub order: Order,
    pub realized_slippage: f64,
    pub execution_latency_ms: u64,
    pub estimated_market_impact: f64,
    pub success: bool,
    pub error: Option<String>,
}

fn fill_roll(order_type: OrderType, urgency: Urgency, roll: f64) -> (f64, bool) {
    match (order_type, urgency) {
        (OrderType::Market, _) => (1.0, true),
        (OrderType::Limit, Urgency::High) => {
            if roll < 0.9 {
                (1.0, true)
            } else {
                (0.8, true)
            }
        }
        (OrderType::Limit, Urgency::Medium) => {
            if roll < 0.8 {
                (1.0, true)
            } else if roll < 1.0 {
                (0.7, true)
            } else {
                (0.0, false)
            }
        }
        (OrderType::Limit, Urgency::Low) => {
            if roll < 0.6 {
                (1.0, true)
            } else if roll < 0.8 {
                (0.5, true)
            } else {
                (0.0, false)
            }
        }
    }
}

pub struct Execution {
    rng: ChaCha8Rng,
    result_history: RingBuffer<f64>,
    slippage_history: RingBuffer<f64>,
    order_count: u64,
}

impl Execution {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            result_history: RingBuffer::new(RESULT_HISTORY_CAPACITY),
            slippage_history: RingBuffer::new(SLIPPAGE_HISTORY_CAPACITY),
            order_count: 0,
        }
    }

    fn average_historical_slippage(&self) -> f64 {
        if self.slippage_history.is_empty() {
            DEFAULT_SLIPPAGE_ESTIMATE
        } else {
            self.slippage_history.mean()
        }
    }

    /// Simulates a fill for one approved signal. `now`, `depth`, and `iv`
    /// come from the caller (the orchestrator) so the simulator stays free
    /// of wall-clock/feature reads, keeping it deterministic given a fixed
    /// rng seed.
    pub async fn simulate(&mut self, approved: &ApprovedSignal, now: i64, depth: f64, iv: f64) -> ExecutionResult {
        let signal = &approved.signal;
        let order_value = approved.approved_size;
        let size_adj = 1.0 + 0.5 * order_value / (depth + 1.0);
        let vol_adj = 1.0 + iv / 100.0;
        let urgency_mult = match approved.constraints.urgency {
            Urgency::High => 1.5,
            Urgency::Medium => 1.2,
            Urgency::Low => 1.0,
        };
        let predicted_slippage = self.average_historical_slippage() * size_adj * vol_adj * urgency_mult;

        let latency_ms = self.rng.gen_range(10..=60);
        tokio::time::sleep(std::time::Duration::from_millis(latency_ms)).await;

        let roll = self.rng.gen_range(0.0..1.0);
        let (fill_fraction, submitted_ok) = fill_roll(approved.constraints.order_type, approved.constraints.urgency, roll);

        self.order_count += 1;
        let order_id = Uuid::new_v4();
        let direction_sign = signal.direction.sign();
        let slippage_draw: f64 = self.rng.gen_range(0.0..1.0);
        let signed_slippage = predicted_slippage * (0.5 + slippage_draw);
        let fill_price = sanitize(signal.entry * (1.0 + direction_sign * signed_slippage));
        let fill_size = order_value * fill_fraction;
        let fees = 0.0001 * fill_size;
        let market_impact = (order_value / 1_000_000.0).max(0.0).sqrt() * 1e-4 * (1.0 + order_value / (depth + 1.0));

        let status = if !submitted_ok {
            OrderStatus::Rejected
        } else if fill_fraction >= 1.0 {
            OrderStatus::Filled
        } else if fill_fraction > 0.0 {
            OrderStatus::Partial
        } else {
            OrderStatus::Cancelled
        };
        let success = matches!(status, OrderStatus::Filled | OrderStatus::Partial);

        if success {
            self.slippage_history.push(sanitize(signed_slippage));
            self.result_history.push(if signal.direction == Direction::Neutral { 0.0 } else { 1.0 });
        }

        let order = Order {
            id: order_id,
            parent_signal_id: signal.id,
            side: signal.direction,
            order_type: approved.constraints.order_type,
            size: order_value,
            price: signal.entry,
            status,
            fill_size: sanitize(fill_size),
            fill_price,
            fees: sanitize(fees),
            submitted_at: now,
            filled_at: now + latency_ms as i64,
        };

        ExecutionResult {
            order,
            realized_slippage: sanitize(signed_slippage),
            execution_latency_ms: latency_ms,
            estimated_market_impact: sanitize(market_impact),
            success,
            error: if success { None } else { Some(format!("{:?}", status)) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::{FlowDirection, VolRegimeLabel};
    use crate::risk::{ExecutionConstraints, RiskMetrics, TimeInForce};
    use crate::strategy::signal::SignalContext;
    use crate::strategy::StrategyKind;
    use rand::SeedableRng;

    fn approved_signal(urgency: Urgency, order_type: OrderType) -> ApprovedSignal {
        ApprovedSignal {
            signal: crate::strategy::Signal {
                id: Uuid::new_v4(),
                kind: StrategyKind::MomentumFollow,
                direction: Direction::Long,
                strength: 0.6,
                confidence: 0.7,
                entry: 100.0,
                stop: 99.0,
                targets: vec![102.0],
                timeframe: "intraday",
                rationale: "test".to_string(),
                context: SignalContext {
                    gamma_level: 0.0,
                    liquidity_support: 1000.0,
                    volatility_label: VolRegimeLabel::Normal,
                    dealer_flow_label: FlowDirection::Neutral,
                },
            },
            approved_size: 1000.0,
            metrics: RiskMetrics {
                correlation: 0.0,
                gamma_exposure: 0.0,
                var_contribution: 0.01,
                max_loss: 0.01,
                margin_required: 50.0,
            },
            constraints: ExecutionConstraints {
                max_slippage: 0.002,
                urgency,
                order_type,
                iceberg_ratio: 0.5,
                time_in_force: TimeInForce::Day,
            },
            risk_score: 0.2,
        }
    }

    #[tokio::test]
    async fn market_orders_always_fill() {
        let mut execution = Execution::new(ChaCha8Rng::seed_from_u64(1));
        let approved = approved_signal(Urgency::High, OrderType::Market);
        let result = execution.simulate(&approved, 0, 1000.0, 20.0).await;
        assert_eq!(result.order.status, OrderStatus::Filled);
        assert!(result.success);
    }

    #[tokio::test]
    async fn same_seed_yields_identical_fills() {
        let approved = approved_signal(Urgency::Medium, OrderType::Limit);
        let mut a = Execution::new(ChaCha8Rng::seed_from_u64(42));
        let mut b = Execution::new(ChaCha8Rng::seed_from_u64(42));
        let result_a = a.simulate(&approved, 0, 1000.0, 20.0).await;
        let result_b = b.simulate(&approved, 0, 1000.0, 20.0).await;
        assert_eq!(result_a.order.fill_price, result_b.order.fill_price);
        assert_eq!(result_a.execution_latency_ms, result_b.execution_latency_ms);
        assert_eq!(result_a.order.status, result_b.order.status);
    }

    #[tokio::test]
    async fn fees_scale_with_fill_size() {
        let mut execution = Execution::new(ChaCha8Rng::seed_from_u64(7));
        let approved = approved_signal(Urgency::High, OrderType::Market);
        let result = execution.simulate(&approved, 0, 1000.0, 20.0).await;
        assert!((result.order.fees - 0.0001 * result.order.fill_size).abs() < 1e-9);
    }
}
