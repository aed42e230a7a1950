//! The `Sim` struct and its turn loop.

use std::collections::BTreeMap;

use tracing::{debug, error};

use uai_behavior::{Diplomacy, FormationCommand, Order, Regime, UnitAi, UnitAiConfig};
use uai_core::{EntityId, Point, SimClock, SimConfig};

use crate::{SimError, SimEvent, SimObserver, SimResult, SimWorld, TurnStats};

/// Events routed within one drain before the turn is declared runaway.
pub const EVENT_LIMIT: usize = 100_000;

/// An order issued from outside the simulation (a player, a script).
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Walk(Point),
    WalkToTarget(EntityId),
    Attack(EntityId),
    Gather(EntityId),
    Repair(EntityId),
    Garrison(EntityId),
}

// ── Sim ───────────────────────────────────────────────────────────────────────

/// The reference simulation: a [`SimWorld`] plus one [`UnitAi`] per unit.
///
/// Each turn runs four phases:
///
/// 1. **Timers**: fire every timer due by now and hand it to its owner.
/// 2. **Movement**: step every moving entity; arrivals become
///    `MotionChanged` events.
/// 3. **Perception**: rebuild the range index and deliver range updates.
/// 4. **Removal**: take dead units, exhausted resources and dissolved
///    formations out of the world.
///
/// Events queued by the world are routed to units after each of the first
/// three phases, in the order they were raised.
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Sim {
    pub config: SimConfig,
    pub clock:  SimClock,
    pub world:  SimWorld,
    /// Unit controllers by entity, so routing order is deterministic.
    units:       BTreeMap<EntityId, UnitAi>,
    unit_config: UnitAiConfig,
}

impl Sim {
    pub(crate) fn new(config: SimConfig, world: SimWorld, unit_config: UnitAiConfig) -> Self {
        Self { clock: config.make_clock(), config, world, units: BTreeMap::new(), unit_config }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Run from the current turn to `config.total_turns`.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        while self.clock.turn < self.config.total_turns {
            self.turn(observer)?;
        }
        observer.on_sim_end(self.clock.turn, &self.world);
        Ok(())
    }

    /// Run exactly `n` turns from the current position (ignores
    /// `total_turns`).
    pub fn run_turns<O: SimObserver>(&mut self, n: u64, observer: &mut O) -> SimResult<()> {
        for _ in 0..n {
            self.turn(observer)?;
        }
        Ok(())
    }

    pub fn unit(&self, id: EntityId) -> Option<&UnitAi> {
        self.units.get(&id)
    }

    /// Every unit controller, ascending by entity.
    pub fn units(&self) -> impl Iterator<Item = &UnitAi> + '_ {
        self.units.values()
    }

    /// Issue `command` to `unit`, appending it to the queue when `queued`
    /// and replacing the queue otherwise.
    pub fn command(&mut self, unit: EntityId, command: Command, queued: bool) -> SimResult<()> {
        let ai = self.units.get_mut(&unit).ok_or(SimError::NotAUnit(unit))?;
        let world = &mut self.world;
        match command {
            Command::Walk(to) => ai.walk(world, to, queued)?,
            Command::WalkToTarget(target) => ai.walk_to_target(world, target, queued)?,
            Command::Attack(target) => ai.attack(world, target, queued)?,
            Command::Gather(target) => ai.gather(world, target, queued)?,
            Command::Repair(target) => ai.repair(world, target, queued)?,
            Command::Garrison(target) => ai.garrison(world, target, queued)?,
        }
        self.drain_events()?;
        Ok(())
    }

    /// Returns `false` if `name` is not a stance; the unit keeps its old one.
    pub fn set_stance(&mut self, unit: EntityId, name: &str) -> SimResult<bool> {
        let ai = self.units.get_mut(&unit).ok_or(SimError::NotAUnit(unit))?;
        Ok(ai.set_stance(name))
    }

    /// Group `members` under a new formation controller owned by the first
    /// member's owner.  Orders given to the controller are carried out by
    /// the members.
    pub fn form_formation(&mut self, members: &[EntityId]) -> SimResult<EntityId> {
        let Some(&first) = members.first() else {
            return Err(SimError::Config("a formation needs at least one member".into()));
        };
        if let Some(&stray) = members.iter().find(|&&m| !self.units.contains_key(&m)) {
            return Err(SimError::NotAUnit(stray));
        }
        let owner = self.world.owner(first).ok_or(SimError::NotAUnit(first))?;

        let controller = self.world.spawn_formation(owner, members.to_vec());
        let mut ai = UnitAi::new(controller, Regime::FormationController, self.unit_config);
        ai.on_create(&mut self.world)?;
        self.units.insert(controller, ai);

        for member in members {
            if let Some(ai) = self.units.get_mut(member) {
                ai.set_formation_controller(&mut self.world, Some(controller))?;
            }
        }
        debug!(%controller, members = members.len(), "formation formed");
        self.drain_events()?;
        Ok(controller)
    }

    // ── Turn processing ───────────────────────────────────────────────────

    fn turn<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        let turn = self.clock.turn;
        observer.on_turn_start(turn, self.clock.now());
        let stats = self.process_turn()?;
        observer.on_turn_end(turn, &stats, &self.world);
        self.clock.advance();
        Ok(())
    }

    fn process_turn(&mut self) -> SimResult<TurnStats> {
        let mut stats = TurnStats::default();

        // ── Phase 1: timers ───────────────────────────────────────────────
        let firings = self.world.timers.advance(self.clock.now())?;
        stats.timers_fired = firings.len();
        for firing in &firings {
            if let Some(ai) = self.units.get_mut(&firing.owner) {
                ai.on_timer(&mut self.world, firing)?;
            }
        }
        stats.events += self.drain_events()?;

        // ── Phase 2: movement ─────────────────────────────────────────────
        self.world.advance_movement(self.clock.turn_secs());
        stats.events += self.drain_events()?;

        // ── Phase 3: range queries ────────────────────────────────────────
        let updates = self.world.update_queries();
        stats.range_updates = updates.len();
        for update in updates {
            if let Some(ai) = self.units.get_mut(&update.source) {
                ai.on_range_update(&mut self.world, update.query, update.added, update.removed)?;
            }
        }
        stats.events += self.drain_events()?;

        // ── Phase 4: removals ─────────────────────────────────────────────
        stats.removed = self.remove_expired();
        Ok(stats)
    }

    /// Route queued events until none remain.  Controllers for entities
    /// spawned along the way are created first.
    pub(crate) fn drain_events(&mut self) -> SimResult<usize> {
        let mut handled = 0;
        loop {
            self.adopt_spawned()?;
            let Some(event) = self.world.events.pop_front() else {
                return Ok(handled);
            };
            handled += 1;
            if handled > EVENT_LIMIT {
                error!(turn = self.clock.turn, limit = EVENT_LIMIT, "event queue does not drain");
                self.world.events.clear();
                return Err(SimError::EventStorm { turn: self.clock.turn, limit: EVENT_LIMIT });
            }
            self.route(event)?;
        }
    }

    fn route(&mut self, event: SimEvent) -> SimResult<()> {
        let world = &mut self.world;
        match event {
            SimEvent::MotionChanged { entity, starting, error } => {
                if let Some(ai) = self.units.get_mut(&entity) {
                    ai.on_motion_changed(world, starting, error)?;
                }
            }
            SimEvent::Attacked { target, attacker } => {
                if let Some(ai) = self.units.get_mut(&target) {
                    ai.on_attacked(world, attacker)?;
                }
            }
            SimEvent::ConstructionFinished { entity, new_entity } => {
                for ai in self.units.values_mut() {
                    ai.on_construction_finished(world, entity, new_entity)?;
                }
            }
            SimEvent::Formation { controller, command } => {
                for member in world.members_of(controller) {
                    let Some(ai) = self.units.get_mut(&member) else { continue };
                    match command {
                        FormationCommand::Attack(target) => ai.attack(world, target, false)?,
                        FormationCommand::Gather(target) => ai.gather(world, target, false)?,
                        FormationCommand::Repair(target) => ai.repair(world, target, false)?,
                        FormationCommand::Garrison(target) => ai.garrison(world, target, false)?,
                    }
                }
            }
            SimEvent::MembersIntoFormation { controller, slots } => {
                for (member, offset) in slots {
                    if let Some(ai) = self.units.get_mut(&member) {
                        ai.replace_order(world, Order::FormationWalk { controller, offset })?;
                    }
                }
            }
            SimEvent::Disband { controller } => {
                for member in world.dissolve_formation(controller) {
                    if let Some(ai) = self.units.get_mut(&member) {
                        ai.set_formation_controller(world, None)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Give every newly spawned unit a controller, in spawn order.
    pub(crate) fn adopt_spawned(&mut self) -> SimResult<()> {
        for id in std::mem::take(&mut self.world.spawned) {
            let owner = self.world.owner(id);
            let mut ai = UnitAi::new(id, Regime::Unit, self.unit_config);
            ai.on_create(&mut self.world)?;
            ai.on_ownership_changed(&mut self.world, owner);
            self.units.insert(id, ai);
        }
        Ok(())
    }

    fn remove_expired(&mut self) -> usize {
        let expired = self.world.expired();
        for &id in &expired {
            if let Some(mut ai) = self.units.remove(&id) {
                ai.on_destroy(&mut self.world);
            }
            self.world.remove(id);
        }
        if !expired.is_empty() {
            self.world.rebuild_index();
            debug!(turn = self.clock.turn, removed = expired.len(), "entities removed");
        }
        expired.len()
    }
}
