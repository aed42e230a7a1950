//! Named default-reaction policies.

use std::fmt;
use std::str::FromStr;

use crate::BehaviorError;

/// How a unit reacts to enemies it has not been told about.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Stance {
    /// Attack any hostile that comes into sight.
    #[default]
    Aggressive,
    /// Never start a fight unprompted.
    HoldFire,
}

impl Stance {
    pub const ALL: [Stance; 2] = [Stance::Aggressive, Stance::HoldFire];

    pub fn from_name(name: &str) -> Option<Stance> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Stance::Aggressive => "aggressive",
            Stance::HoldFire => "holdfire",
        }
    }

    pub const fn attack_on_sight(self) -> bool {
        match self {
            Stance::Aggressive => true,
            Stance::HoldFire => false,
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stance {
    type Err = BehaviorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stance::from_name(s.trim()).ok_or_else(|| BehaviorError::UnknownStance(s.to_owned()))
    }
}
