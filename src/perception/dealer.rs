//! Dealer-positioning inference: net exposures and implied flow direction.

use crate::models::OptionsChain;
use crate::perception::gamma::{net_delta_exposure, put_call_volume_ratio, GammaSurface};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDirection {
    Buying,
    Selling,
    Neutral,
}

impl Default for FlowDirection {
    fn default() -> Self {
        FlowDirection::Neutral
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DealerPositioning {
    pub net_gamma_exposure: f64,
    pub net_delta_exposure: f64,
    pub hedging_pressure: f64,
    pub flow_direction: FlowDirection,
    pub confidence: f64,
}

pub fn compute(surface: &GammaSurface, chain: &OptionsChain) -> DealerPositioning {
    let net_gamma_exposure = surface.net;
    let net_delta_exposure = net_delta_exposure(chain);
    let hedging_pressure = -net_gamma_exposure * 0.01;

    let ratio = put_call_volume_ratio(chain);
    let flow_direction = if ratio < 0.7 {
        FlowDirection::Buying
    } else if ratio > 1.3 {
        FlowDirection::Selling
    } else {
        FlowDirection::Neutral
    };

    let total_oi: f64 = chain.contracts.iter().map(|c| c.open_interest).sum();
    let confidence = (total_oi / 100_000.0).clamp(0.0, 1.0);

    DealerPositioning {
        net_gamma_exposure: crate::models::sanitize(net_gamma_exposure),
        net_delta_exposure: crate::models::sanitize(net_delta_exposure),
        hedging_pressure: crate::models::sanitize(hedging_pressure),
        flow_direction,
        confidence: crate::models::sanitize(confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OptionContract, OptionRight};
    use crate::perception::gamma::build_surface;

    #[test]
    fn empty_chain_yields_neutral_flow_and_zero_confidence() {
        let surface = GammaSurface::default();
        let positioning = compute(&surface, &OptionsChain::default());
        assert_eq!(positioning.flow_direction, FlowDirection::Neutral);
        assert_eq!(positioning.confidence, 0.0);
    }

    #[test]
    fn high_put_volume_drives_selling_flow() {
        let contracts = vec![
            OptionContract {
                strike: 100.0,
                expiry: 7,
                right: OptionRight::Put,
                bid: 1.0,
                ask: 1.1,
                last: 1.0,
                volume: 1000.0,
                open_interest: 500.0,
                implied_vol: 0.3,
                delta: -0.5,
                gamma: 0.01,
                theta: -0.01,
                vega: 0.1,
                rho: 0.01,
            },
            OptionContract {
                strike: 100.0,
                expiry: 7,
                right: OptionRight::Call,
                bid: 1.0,
                ask: 1.1,
                last: 1.0,
                volume: 100.0,
                open_interest: 500.0,
                implied_vol: 0.3,
                delta: 0.5,
                gamma: 0.01,
                theta: -0.01,
                vega: 0.1,
                rho: 0.01,
            },
        ];
        let chain = OptionsChain { contracts };
        let surface = build_surface(&chain);
        let positioning = compute(&surface, &chain);
        assert_eq!(positioning.flow_direction, FlowDirection::Selling);
    }
}
