//! The ten default strategy templates: closed tagged enum plus per-template
//! static configuration. A new strategy type is one variant here plus one
//! `match` arm in each of `bonus`, `signal`, and the parameter-adaptation
//! table in `pool`.

use crate::meta_controller::RegimeLabel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    GammaScalp,
    MomentumFollow,
    MeanReversion,
    VolatilityExpansion,
    VolatilityContraction,
    LiquidityHunt,
    FlowAlignment,
    StructuralBreak,
    PatternRecognition,
    FractalResonance,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 10] = [
        StrategyKind::GammaScalp,
        StrategyKind::MomentumFollow,
        StrategyKind::MeanReversion,
        StrategyKind::VolatilityExpansion,
        StrategyKind::VolatilityContraction,
        StrategyKind::LiquidityHunt,
        StrategyKind::FlowAlignment,
        StrategyKind::StructuralBreak,
        StrategyKind::PatternRecognition,
        StrategyKind::FractalResonance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::GammaScalp => "gamma_scalp",
            StrategyKind::MomentumFollow => "momentum_follow",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::VolatilityExpansion => "volatility_expansion",
            StrategyKind::VolatilityContraction => "volatility_contraction",
            StrategyKind::LiquidityHunt => "liquidity_hunt",
            StrategyKind::FlowAlignment => "flow_alignment",
            StrategyKind::StructuralBreak => "structural_break",
            StrategyKind::PatternRecognition => "pattern_recognition",
            StrategyKind::FractalResonance => "fractal_resonance",
        }
    }

    /// Nominal holding horizon label attached to signals of this kind, for
    /// downstream display and execution-constraint defaults.
    pub fn timeframe(&self) -> &'static str {
        match self {
            StrategyKind::GammaScalp => "intraday",
            StrategyKind::MomentumFollow => "intraday",
            StrategyKind::MeanReversion => "swing",
            StrategyKind::VolatilityExpansion => "intraday",
            StrategyKind::VolatilityContraction => "swing",
            StrategyKind::LiquidityHunt => "scalp",
            StrategyKind::FlowAlignment => "intraday",
            StrategyKind::StructuralBreak => "swing",
            StrategyKind::PatternRecognition => "swing",
            StrategyKind::FractalResonance => "swing",
        }
    }
}

/// Per-template parameters, regime-adapted at activation time by the
/// volatility multiplier before being attached to an `ActiveStrategy`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StrategyParams {
    pub stop_loss: f64,
    pub trailing_stop: f64,
    pub target_profit: f64,
    pub stop_loss_multiple: f64,
    pub target_multiple: f64,
    pub position_size_multiple: f64,
    pub confidence_threshold: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            stop_loss: 0.01,
            trailing_stop: 0.008,
            target_profit: 0.02,
            stop_loss_multiple: 1.0,
            target_multiple: 2.0,
            position_size_multiple: 1.0,
            confidence_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyTemplate {
    pub kind: StrategyKind,
    pub valid_regimes: Vec<RegimeLabel>,
    pub activation_threshold: f64,
    pub params: StrategyParams,
}

fn template(kind: StrategyKind, valid_regimes: Vec<RegimeLabel>, activation_threshold: f64) -> StrategyTemplate {
    StrategyTemplate {
        kind,
        valid_regimes,
        activation_threshold,
        params: StrategyParams::default(),
    }
}

/// The ten default templates, each scoped to the regimes it's calibrated
/// for. Thresholds are hand-picked, the way the teacher's per-signal-type
/// quality gates in `signals/quality.rs` are hand-picked rather than fit.
pub fn default_templates() -> Vec<StrategyTemplate> {
    use RegimeLabel::*;
    vec![
        template(StrategyKind::GammaScalp, vec![GammaSqueeze, HighVolatility], 0.55),
        template(
            StrategyKind::MomentumFollow,
            vec![TrendingBullish, TrendingBearish, Breakout, Breakdown],
            0.5,
        ),
        template(StrategyKind::MeanReversion, vec![RangeBound, Consolidation, MeanReversion], 0.5),
        template(StrategyKind::VolatilityExpansion, vec![Breakout, Breakdown, HighVolatility], 0.55),
        template(StrategyKind::VolatilityContraction, vec![LowVolatility, Consolidation, RangeBound], 0.5),
        template(StrategyKind::LiquidityHunt, vec![RangeBound, GammaSqueeze, Consolidation], 0.55),
        template(
            StrategyKind::FlowAlignment,
            vec![TrendingBullish, TrendingBearish, GammaSqueeze],
            0.5,
        ),
        template(StrategyKind::StructuralBreak, vec![Breakout, Breakdown], 0.55),
        template(
            StrategyKind::PatternRecognition,
            vec![
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
            ],
            0.6,
        ),
        template(StrategyKind::FractalResonance, vec![GammaSqueeze, MeanReversion, Consolidation], 0.55),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_default_templates_cover_all_kinds() {
        let templates = default_templates();
        assert_eq!(templates.len(), 10);
        let kinds: std::collections::HashSet<StrategyKind> = templates.iter().map(|t| t.kind).collect();
        assert_eq!(kinds.len(), 10);
    }

    #[test]
    fn names_match_glossary_snake_case() {
        assert_eq!(StrategyKind::GammaScalp.name(), "gamma_scalp");
        assert_eq!(StrategyKind::FractalResonance.name(), "fractal_resonance");
    }
}
