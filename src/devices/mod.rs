//! Battery storage model and its supporting tables.

/// Stateful battery model.
pub mod battery;
/// Technology and topology lookup tables.
pub mod catalog;
pub mod profile;
pub mod transition;

// Re-export the main types for convenience
pub use battery::{BatteryConfiguration, BatteryModel, BatteryOptions, BatteryState, OperationRecord};
pub use catalog::{Technology, Topology};
pub use profile::SolarProfile;
pub use transition::{LimitedBy, Precision, Transition, TransitionArrays};
