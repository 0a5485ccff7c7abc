//! Perception: raw market bundle -> structural-features snapshot.
//!
//! Owns three bounded buffers (price, volume, realized-vol); every other
//! quantity here is a pure function of the current bundle plus those
//! buffers. Never fails a tick — missing options or empty buffers degrade to
//! sentinel zeros and default labels per the crate-wide error policy.

pub mod dealer;
pub mod gamma;
pub mod gravity;
pub mod liquidity;
pub mod price_history;
pub mod volatility;

use crate::models::{sanitize, MarketBundle};
use crate::numerics;
use crate::ring_buffer::RingBuffer;
use serde::{Deserialize, Serialize};

pub use dealer::{DealerPositioning, FlowDirection};
pub use gamma::{FlipDirection, GammaFlip, GammaSurface};
pub use gravity::{Attractor, GravitationalPull};
pub use liquidity::{LiquidityLevel, LiquidityMap};
pub use price_history::{PriceHistory, TrendLabel};
pub use volatility::{VolRegimeLabel, VolatilityState};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuralFeatures {
    pub gamma_surface: GammaSurface,
    pub gamma_flips: Vec<GammaFlip>,
    pub gravitational_pull: GravitationalPull,
    pub liquidity: LiquidityMap,
    pub volatility: VolatilityState,
    pub dealer: DealerPositioning,
    pub price_history: PriceHistory,
    pub spot: f64,
}

impl StructuralFeatures {
    /// The ten-feature vector the Meta-Controller's regime cascade reads.
    pub fn regime_inputs(&self) -> RegimeInputs {
        RegimeInputs {
            momentum: self.price_history.momentum,
            trend_strength: self.price_history.trend_strength,
            implied_vol: self.volatility.implied_vol / 100.0,
            vol_of_vol: self.volatility.vol_of_vol,
            vol_spread: self.volatility.spread,
            skew: self.volatility.skew,
            gamma_direction: self.gravitational_pull.direction,
            gamma_magnitude: self.gravitational_pull.magnitude,
            net_gamma: self.gamma_surface.net,
            liquidity_imbalance: self.liquidity.imbalance,
            absorption: self.liquidity.absorption_rate,
        }
    }
}

/// Plain numeric projection of structural features used for regime
/// classification and fingerprinting.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegimeInputs {
    pub momentum: f64,
    pub trend_strength: f64,
    pub implied_vol: f64,
    pub vol_of_vol: f64,
    pub vol_spread: f64,
    pub skew: f64,
    pub gamma_direction: i8,
    pub gamma_magnitude: f64,
    pub net_gamma: f64,
    pub liquidity_imbalance: f64,
    pub absorption: f64,
}

pub struct Perception {
    price_buffer: RingBuffer<f64>,
    volume_buffer: RingBuffer<f64>,
    realized_vol_buffer: RingBuffer<f64>,
}

impl Perception {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            price_buffer: RingBuffer::new(buffer_capacity),
            volume_buffer: RingBuffer::new(buffer_capacity),
            realized_vol_buffer: RingBuffer::new(buffer_capacity),
        }
    }

    pub fn process(&mut self, bundle: &MarketBundle) -> StructuralFeatures {
        let spot = sanitize(bundle.spot());

        for bar in &bundle.fast.bars {
            self.price_buffer.push(sanitize(bar.close));
            self.volume_buffer.push(sanitize(bar.volume));
        }
        if bundle.fast.bars.is_empty() && spot > 0.0 {
            self.price_buffer.push(spot);
        }

        let closes = self.price_buffer.to_vec();
        let recent_returns = numerics::log_returns(&closes);
        let realized_vol = numerics::std_dev(&recent_returns);
        self.realized_vol_buffer.push(sanitize(realized_vol));

        let gamma_surface = gamma::build_surface(&bundle.chain);
        let gamma_flips = gamma::detect_flips(&gamma_surface);
        let gravitational_pull = gravity::compute(&gamma_surface, spot);
        let liquidity = bundle
            .fast
            .order_book
            .as_ref()
            .map(|book| liquidity::compute(book, &bundle.fast.prints))
            .unwrap_or_default();
        let volatility = volatility::compute(&closes, &bundle.chain, &self.realized_vol_buffer.to_vec());
        let dealer = dealer::compute(&gamma_surface, &bundle.chain);
        let price_history = price_history::compute(&self.price_buffer);

        StructuralFeatures {
            gamma_surface,
            gamma_flips,
            gravitational_pull,
            liquidity,
            volatility,
            dealer,
            price_history,
            spot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bar, TimeframeStream};

    fn bundle_with_prices(prices: &[f64]) -> MarketBundle {
        let bars: Vec<Bar> = prices
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: i as i64 * 1000,
                open: close,
                high: close,
                low: close,
                close,
                volume: 100.0,
            })
            .collect();
        MarketBundle {
            symbol: "TEST".to_string(),
            timestamp: prices.len() as i64 * 1000,
            fast: TimeframeStream {
                bars,
                prints: vec![],
                order_book: None,
            },
            slow: TimeframeStream::default(),
            chain: Default::default(),
        }
    }

    #[test]
    fn empty_bundle_never_panics_and_yields_defaults() {
        let mut perception = Perception::new(1000);
        let bundle = MarketBundle::default();
        let features = perception.process(&bundle);
        assert_eq!(features.volatility.regime, VolRegimeLabel::Low);
        assert_eq!(features.price_history.trend, TrendLabel::Sideways);
    }

    #[test]
    fn flat_prices_scenario_matches_spec_scenario_one() {
        let mut perception = Perception::new(1000);
        let bundle = bundle_with_prices(&vec![100.0; 30]);
        let features = perception.process(&bundle);
        assert_eq!(features.price_history.trend, TrendLabel::Sideways);
        assert_eq!(features.gamma_surface.strikes.len(), 0);
    }

    #[test]
    fn uptrend_scenario_matches_spec_scenario_two() {
        let mut perception = Perception::new(1000);
        let prices: Vec<f64> = (0..21).map(|i| 100.0 + i as f64 * 0.5).collect();
        let bundle = bundle_with_prices(&prices);
        let features = perception.process(&bundle);
        assert_eq!(features.price_history.trend, TrendLabel::Up);
    }
}
