//! CSV scenario loader.
//!
//! # CSV format
//!
//! One row per entity.  `stance` is optional and only meaningful for units.
//!
//! ```csv
//! template,owner,x,z,stance
//! infantry,1,0,0,aggressive
//! infantry,2,30,0,holdfire
//! tree,0,10,10,
//! house_foundation,1,-12,4,
//! ```
//!
//! Templates are checked when the scenario is built, not here, so a file
//! can be loaded and inspected without a world.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use uai_behavior::Stance;
use uai_core::{PlayerId, Point};

use crate::{SimError, SimResult, Spawn};

// ── CSV record ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ScenarioRecord {
    template: String,
    owner:    u32,
    x:        f32,
    z:        f32,
    #[serde(default)]
    stance:   Option<String>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load the spawns of a scenario from a CSV file.
pub fn load_scenario_csv(path: &Path) -> SimResult<Vec<Spawn>> {
    let file = std::fs::File::open(path)?;
    load_scenario_reader(file)
}

/// Like [`load_scenario_csv`] but accepts any `Read` source.
pub fn load_scenario_reader<R: Read>(reader: R) -> SimResult<Vec<Spawn>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut spawns = Vec::new();

    // Row numbers are 1-based and count the header.
    for (i, result) in csv_reader.deserialize::<ScenarioRecord>().enumerate() {
        let row = i + 2;
        let record = result?;
        if record.template.is_empty() {
            return Err(SimError::Scenario { row, reason: "empty template".into() });
        }
        if !record.x.is_finite() || !record.z.is_finite() {
            return Err(SimError::Scenario { row, reason: "non-finite coordinate".into() });
        }
        let stance = match record.stance.as_deref().filter(|s| !s.is_empty()) {
            None => None,
            Some(name) => Some(
                name.parse::<Stance>()
                    .map_err(|e| SimError::Scenario { row, reason: e.to_string() })?,
            ),
        };
        spawns.push(Spawn {
            template: record.template,
            owner: PlayerId(record.owner),
            position: Point::new(record.x, record.z),
            stance,
        });
    }
    Ok(spawns)
}
