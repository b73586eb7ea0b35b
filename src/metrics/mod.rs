//! Read metrics

pub mod read_stats;

pub use read_stats::{ReadStats, ReadStatsSnapshot};
