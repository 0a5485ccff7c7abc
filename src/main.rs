//! Fractal Resonance Engine - demo harness
//! Mission: drive the engine over a short synthetic tape and narrate the
//! headline numbers from each tick, the way the teacher's `main` narrated
//! its own startup and polling loop.

use fractal_resonance_engine::models::{Bar, MarketBundle, TimeframeStream};
use fractal_resonance_engine::{Engine, EngineConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Builds a single-symbol bundle from a running close price; everything
/// else (chain, order book, slow stream) stays empty, which the pipeline
/// handles by degrading to sentinel defaults rather than failing.
fn bundle_at(symbol: &str, tick: i64, close: f64) -> MarketBundle {
    MarketBundle {
        symbol: symbol.to_string(),
        timestamp: tick * 1000,
        fast: TimeframeStream {
            bars: vec![Bar {
                timestamp: tick * 1000,
                open: close,
                high: close * 1.001,
                low: close * 0.999,
                close,
                volume: 1_000.0,
            }],
            prints: vec![],
            order_book: None,
        },
        slow: TimeframeStream::default(),
        chain: Default::default(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = EngineConfig::default();
    let mut engine = Engine::new(config)?;

    info!("fractal-resonance-demo starting, replaying a synthetic uptrend tape");

    let mut price = 100.0;
    for tick in 0..40i64 {
        price += 0.15;
        let bundle = bundle_at("DEMO", tick, price);
        let state = engine.tick(&bundle).await;

        info!(
            tick,
            regime = ?state.regime.label,
            coherence = format!("{:.3}", state.coherence.total),
            active = state.active_strategies.len(),
            signals = state.signals.len(),
            approved = state.approved.len(),
            fills = state.results.iter().filter(|r| r.success).count(),
            portfolio_value = format!("{:.2}", state.portfolio.total_value()),
            "tick complete"
        );
    }

    let final_state = engine.last_state().expect("at least one tick ran");
    info!(
        total_value = format!("{:.2}", final_state.portfolio.total_value()),
        patterns_stored = final_state.health.memory_usage,
        "demo run finished"
    );

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fractal_resonance_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
