//! Battery energy storage dispatch simulator.

pub mod config;
pub mod devices;
pub mod error;
pub mod io;
/// Strategy runner, dispatch policies, validation and batch rollouts.
pub mod sim;
