/// Monte Carlo batch rollouts over the pure transition.
pub mod batch;
/// Simulation clock for timestep management.
pub mod clock;
pub mod metrics;
/// Built-in dispatch policies.
pub mod policies;
pub mod runner;
/// Policy contract and tag-keyed catalog.
pub mod strategy;
pub mod validator;

pub use metrics::StrategyMetrics;
pub use runner::{StrategyResult, StrategyRunner, simulate};
pub use strategy::{DispatchContext, DispatchPolicy, ParamValue, StrategyLibrary, StrategyParams};
pub use validator::{Validator, Verdict};
