//! Technology and topology lookup tables.
//!
//! Both tables are `const` data resolved once into a
//! [`BatteryConfiguration`](super::battery::BatteryConfiguration) when a model
//! is built. Nothing here is mutable at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Cell technology of the storage system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    Standard,
    #[default]
    ModernLfp,
    Premium,
}

/// Parameters attached to a [`Technology`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TechnologyParams {
    /// Round-trip efficiency of the cells and converter before topology losses.
    pub round_trip_efficiency: f64,
    /// Lowest state of charge the battery is dispatched down to.
    pub soc_min: f64,
    /// Highest state of charge the battery is dispatched up to.
    pub soc_max: f64,
    /// Maximum charge or discharge power as a multiple of energy capacity (1/h).
    pub max_c_rate: f64,
}

impl Technology {
    pub const ALL: [Self; 3] = [Self::Standard, Self::ModernLfp, Self::Premium];

    /// Returns the catalog entry for this technology.
    pub const fn params(self) -> TechnologyParams {
        match self {
            Self::Standard => TechnologyParams {
                round_trip_efficiency: 0.85,
                soc_min: 0.10,
                soc_max: 0.90,
                max_c_rate: 1.0,
            },
            Self::ModernLfp => TechnologyParams {
                round_trip_efficiency: 0.92,
                soc_min: 0.05,
                soc_max: 0.95,
                max_c_rate: 2.0,
            },
            Self::Premium => TechnologyParams {
                round_trip_efficiency: 0.95,
                soc_min: 0.02,
                soc_max: 0.98,
                max_c_rate: 4.0,
            },
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::ModernLfp => "modern_lfp",
            Self::Premium => "premium",
        }
    }
}

/// Placement of the battery relative to the generator and inverter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// AC-coupled retrofit with its own inverter.
    #[default]
    ParallelAc,
    /// DC-coupled behind the plant inverter.
    SeriesDc,
    Hybrid,
}

/// Parameters attached to a [`Topology`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopologyParams {
    /// Fraction subtracted from nameplate power.
    pub power_derating: f64,
    /// Additional conversion loss applied to the round-trip efficiency.
    pub extra_loss: f64,
}

impl Topology {
    pub const ALL: [Self; 3] = [Self::ParallelAc, Self::SeriesDc, Self::Hybrid];

    pub const fn params(self) -> TopologyParams {
        match self {
            Self::ParallelAc => TopologyParams {
                power_derating: 0.0,
                extra_loss: 0.0,
            },
            Self::SeriesDc => TopologyParams {
                power_derating: 0.02,
                extra_loss: 0.02,
            },
            Self::Hybrid => TopologyParams {
                power_derating: 0.01,
                extra_loss: 0.01,
            },
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParallelAc => "parallel_ac",
            Self::SeriesDc => "series_dc",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Technology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown technology \"{s}\", expected one of standard, modern_lfp, premium"))
    }
}

impl FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown topology \"{s}\", expected one of parallel_ac, series_dc, hybrid"))
    }
}
