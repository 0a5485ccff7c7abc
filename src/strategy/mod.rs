//! Strategy Pool: ten tagged strategy types competing for activation each
//! tick, dispatched through `match` tables rather than a trait-object
//! hierarchy (see `templates::StrategyKind`).

pub mod bonus;
pub mod pool;
pub mod signal;
pub mod templates;

pub use pool::{ActiveStrategy, StrategyPool};
pub use signal::Signal;
pub use templates::{default_templates, StrategyKind, StrategyParams, StrategyTemplate};
