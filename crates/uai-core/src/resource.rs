//! Resource descriptors and range-query filters shared by the behavior layer
//! and the world that serves it.

use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Two-level resource classification, e.g. `food.meat` or `wood.tree`.
///
/// `generic` decides which stockpile a gather feeds; `specific` decides which
/// gather animation plays and which nearby supplies count as "the same kind"
/// when a unit looks for a replacement target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceType {
    pub generic:  String,
    pub specific: String,
}

impl ResourceType {
    pub fn new(generic: impl Into<String>, specific: impl Into<String>) -> Self {
        Self { generic: generic.into(), specific: specific.into() }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.generic, self.specific)
    }
}

impl FromStr for ResourceType {
    type Err = CoreError;

    /// Parse the `generic.specific` form used in scenario files.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('.') {
            Some((g, sp)) if !g.is_empty() && !sp.is_empty() => Ok(Self::new(g, sp)),
            _ => Err(CoreError::Parse(format!(
                "invalid resource type {s:?}: expected \"generic.specific\""
            ))),
        }
    }
}

/// Which entities a range query should report.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QueryFilter {
    /// Anything that can take damage (live units and buildings).
    DamageReceiver,
    /// Anything that can be gathered from.
    ResourceSupply,
}
