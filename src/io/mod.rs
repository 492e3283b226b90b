/// CSV export of strategy results.
pub mod export;
