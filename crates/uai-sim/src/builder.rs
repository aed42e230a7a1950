//! Fluent builder for constructing a [`Sim`].

use std::collections::BTreeMap;

use uai_behavior::{Stance, UnitAiConfig};
use uai_core::{PlayerId, Point, SimConfig, SimRng};

use crate::entity::Template;
use crate::{Sim, SimError, SimResult, SimWorld};

/// One entity to place before the first turn.
#[derive(Clone, Debug, PartialEq)]
pub struct Spawn {
    pub template: String,
    pub owner:    PlayerId,
    pub position: Point,
    /// Overrides the default stance of a unit.  Ignored for non-units.
    pub stance:   Option<Stance>,
}

/// Fluent builder for [`Sim`].
///
/// # Optional inputs (have defaults)
///
/// | Method                  | Default                                   |
/// |-------------------------|-------------------------------------------|
/// | `.players(n)`           | 2 real players (plus Gaia)                |
/// | `.diplomacy(a, b, v)`   | real players at war, neutral toward Gaia  |
/// | `.unit_config(c)`       | `UnitAiConfig::default()`                 |
/// | `.spawn(..)`/`.spawns`  | empty world                               |
/// | `.scatter(..)`          | nothing scattered                         |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(SimConfig::default())
///     .players(2)
///     .spawn("infantry", PlayerId(1), Point::new(0.0, 0.0))
///     .spawn("infantry", PlayerId(2), Point::new(30.0, 0.0))
///     .build()?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder {
    config:      SimConfig,
    players:     u32,
    diplomacy:   Vec<(PlayerId, PlayerId, i32)>,
    spawns:      Vec<Spawn>,
    unit_config: UnitAiConfig,
    /// One scatter stream per player, seeded from `config.seed`.
    rngs:        BTreeMap<PlayerId, SimRng>,
}

impl SimBuilder {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            players:     2,
            diplomacy:   Vec::new(),
            spawns:      Vec::new(),
            unit_config: UnitAiConfig::default(),
            rngs:        BTreeMap::new(),
        }
    }

    /// Number of real players.  Gaia (player 0) always exists on top.
    pub fn players(mut self, players: u32) -> Self {
        self.players = players;
        self
    }

    /// Set `player`'s stance toward `other`.  One-directional; call twice for
    /// a mutual alliance.
    pub fn diplomacy(mut self, player: PlayerId, other: PlayerId, value: i32) -> Self {
        self.diplomacy.push((player, other, value));
        self
    }

    pub fn unit_config(mut self, config: UnitAiConfig) -> Self {
        self.unit_config = config;
        self
    }

    pub fn spawn(mut self, template: &str, owner: PlayerId, position: Point) -> Self {
        self.spawns.push(Spawn { template: template.to_owned(), owner, position, stance: None });
        self
    }

    /// Place `count` copies of `template` uniformly in the square
    /// `center ± half_extent`.  Positions come from the owner's own stream,
    /// so the same seed always yields the same layout.
    pub fn scatter(
        mut self,
        template:    &str,
        owner:       PlayerId,
        center:      Point,
        count:       usize,
        half_extent: f32,
    ) -> Self {
        let seed = self.config.seed;
        let rng = self.rngs.entry(owner).or_insert_with(|| SimRng::for_player(seed, owner));
        for _ in 0..count {
            let position = rng.scatter(center, half_extent);
            self.spawns.push(Spawn { template: template.to_owned(), owner, position, stance: None });
        }
        self
    }

    /// Append spawns, e.g. from [`load_scenario_csv`][crate::load_scenario_csv].
    pub fn spawns(mut self, spawns: impl IntoIterator<Item = Spawn>) -> Self {
        self.spawns.extend(spawns);
        self
    }

    /// Validate inputs, populate the world and create a controller for every
    /// unit.
    pub fn build(self) -> SimResult<Sim> {
        // ── Validate ──────────────────────────────────────────────────────
        self.config.validate()?;
        if self.players == 0 {
            return Err(SimError::Config("at least one player is required".into()));
        }
        let total = self.players + 1;
        let check = |player: PlayerId| {
            if player.0 < total {
                Ok(())
            } else {
                Err(SimError::UnknownPlayer { player, players: self.players })
            }
        };

        let mut world = SimWorld::new(total);
        for &(player, other, value) in &self.diplomacy {
            check(player)?;
            check(other)?;
            world.set_diplomacy(player, other, value);
        }

        // ── Populate ──────────────────────────────────────────────────────
        let mut stances = Vec::new();
        for spawn in &self.spawns {
            check(spawn.owner)?;
            let template =
                Template::named(&spawn.template).ok_or_else(|| SimError::UnknownTemplate(spawn.template.clone()))?;
            let id = world.spawn(&template, spawn.owner, spawn.position);
            if let Some(stance) = spawn.stance {
                stances.push((id, stance));
            }
        }
        world.rebuild_index();

        // ── Controllers ───────────────────────────────────────────────────
        let mut sim = Sim::new(self.config, world, self.unit_config);
        sim.adopt_spawned()?;
        for (id, stance) in stances {
            if sim.unit(id).is_some() {
                sim.set_stance(id, stance.name())?;
            }
        }
        sim.drain_events()?;
        Ok(sim)
    }
}
