//! Fractal Resonance Engine
//!
//! A deterministic, single-threaded-per-tick trading pipeline: market data
//! in, a classified regime and a coherence score out, strategies activated
//! against both, risk-governed and simulated to fills, and every settled
//! trade folded back into per-strategy learning and a fractal pattern store.
//!
//! `Engine::tick` is the one entry point a caller needs; everything else is
//! exposed for direct subsystem use in tests and tooling.

pub mod config;
pub mod engine;
pub mod execution;
pub mod learning;
pub mod memory;
pub mod meta_controller;
pub mod models;
pub mod numerics;
pub mod perception;
pub mod ring_buffer;
pub mod risk;
pub mod strategy;

pub use config::EngineConfig;
pub use engine::{Engine, HealthMetrics, SystemState};
pub use models::MarketBundle;
