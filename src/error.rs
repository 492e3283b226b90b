//! Engine error types.

use thiserror::Error;

/// Invalid inputs detected before any simulation step runs.
///
/// These are never retried: the caller must fix the inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("rated power must be > 0, got {0} MW")]
    NonPositivePower(f64),
    #[error("rated duration must be > 0, got {0} h")]
    NonPositiveDuration(f64),
    #[error("initial state of charge must be in [0, 1], got {0}")]
    InvalidInitialSoc(f64),
    #[error("generation profile is empty")]
    EmptyProfile,
    #[error("time step must be a positive finite number of hours, got {0}")]
    InvalidTimeStep(f64),
    #[error("generation at step {0} is not a finite number")]
    NonFiniteGeneration(usize),
}

/// A completed run failed the post-run energy balance or bound checks.
///
/// Callers treat this as fatal to the run it came from.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("validation failed: {reason} (energy balance error {pct:.4}%)", pct = .energy_balance_error * 100.0)]
pub struct ValidationFailure {
    pub reason: String,
    /// Relative energy balance error (fraction, not percent).
    pub energy_balance_error: f64,
}

/// Either engine error, for call sites that propagate both with `?`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
}
