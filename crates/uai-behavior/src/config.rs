//! Per-unit tuning knobs.

use crate::Stance;

/// Constants the behavior tree reads.  `Default` gives the stock values.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitAiConfig {
    /// Stance a unit starts with.
    pub default_stance:       Stance,
    /// How far an idle gatherer looks for more of the same resource.
    pub gather_search_radius: f32,
    /// Gather tick period.
    pub gather_interval_ms:   u64,
    /// Repair tick period.
    pub repair_interval_ms:   u64,
}

impl Default for UnitAiConfig {
    fn default() -> Self {
        Self {
            default_stance:       Stance::Aggressive,
            gather_search_radius: 64.0,
            gather_interval_ms:   1_000,
            repair_interval_ms:   1_000,
        }
    }
}
