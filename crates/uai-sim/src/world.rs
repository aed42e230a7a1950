//! `SimWorld`: an in-memory world serving every collaborator interface of
//! the unit controller.
//!
//! # Rules
//!
//! | Concern      | Rule                                                       |
//! |--------------|------------------------------------------------------------|
//! | movement     | straight line at walk speed, one step per turn              |
//! | combat       | fixed damage per hit, no armour                            |
//! | gathering    | fixed amount per tick into the owner's stockpile           |
//! | construction | fixed progress per tick; a finished foundation is replaced |
//! | garrison     | first come, first served up to capacity                    |
//! | perception   | R-tree snapshot rebuilt after every change of positions    |
//!
//! Range bands are honoured at their outer edge only: a unit closes to
//! within `max` but never backs off to reach `min`.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use uai_behavior::{
    AttackTiming, AttackType, Building, Combat, Diplomacy, FormationCommand, Formations, Garrisoning,
    Gathering, Motion, Perception, Presentation,
};
use uai_core::{EntityId, PlayerId, Point, QueryFilter, QueryId, RangeBand, ResourceType, TimerId};
use uai_spatial::{QueryRegistry, QuerySpec, RangeIndex, RangeUpdate, Tracked};
use uai_timer::{TimerQueue, TimerService};

use crate::entity::{Entity, Formation, Mobility, Movement, Template};
use crate::SimEvent;

/// A range approach stops this far inside the band so that the next range
/// check does not fail on rounding.
const APPROACH_SLACK: f32 = 0.9;

/// Default distance between formation slots.
pub const FORMATION_SPACING: f32 = 4.0;

enum Step {
    Moved(Point),
    Arrived(Point),
    Lost,
}

pub struct SimWorld {
    entities:    FxHashMap<EntityId, Entity>,
    next_entity: u32,
    pub(crate) events:  VecDeque<SimEvent>,
    pub(crate) timers:  TimerQueue,
    /// Freshly spawned entities whose template wants a unit controller.
    pub(crate) spawned: Vec<EntityId>,
    index:       RangeIndex,
    queries:     QueryRegistry,
    /// `diplomacy[player][other]`.
    diplomacy:   Vec<Vec<i32>>,
    stockpiles:  FxHashMap<PlayerId, FxHashMap<String, f32>>,
}

impl SimWorld {
    /// A world for `players` players, Gaia included.  Every pair of real
    /// players starts at war; everyone is neutral toward Gaia.
    pub fn new(players: u32) -> Self {
        let n = players as usize;
        let diplomacy: Vec<Vec<i32>> = (0..n)
            .map(|p| {
                (0..n)
                    .map(|q| match (p, q) {
                        _ if p == q => 1,
                        (0, _) | (_, 0) => 0,
                        _ => -1,
                    })
                    .collect()
            })
            .collect();
        Self {
            entities: FxHashMap::default(),
            next_entity: 1,
            events: VecDeque::new(),
            timers: TimerQueue::new(),
            spawned: Vec::new(),
            index: RangeIndex::new(),
            queries: QueryRegistry::new(),
            diplomacy,
            stockpiles: FxHashMap::default(),
        }
    }

    // ── Entities ──────────────────────────────────────────────────────────

    pub fn spawn(&mut self, template: &Template, owner: PlayerId, position: Point) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        self.entities.insert(id, Entity::from_template(id, template, owner, position));
        if template.unit_ai {
            self.spawned.push(id);
        }
        debug!(entity = %id, template = %template.name, %owner, %position, "spawned");
        id
    }

    /// Create a formation controller at the members' centroid, moving at the
    /// pace of the slowest member.
    pub(crate) fn spawn_formation(&mut self, owner: PlayerId, members: Vec<EntityId>) -> EntityId {
        let positions: Vec<Point> = members.iter().filter_map(|&m| self.position(m)).collect();
        let n = positions.len().max(1) as f32;
        let centroid = Point::new(
            positions.iter().map(|p| p.x).sum::<f32>() / n,
            positions.iter().map(|p| p.z).sum::<f32>() / n,
        );
        let speed = members
            .iter()
            .filter_map(|m| self.entities.get(m).and_then(|e| e.mobility))
            .map(|m| m.walk_speed)
            .fold(f32::INFINITY, f32::min);
        let speed = if speed.is_finite() { speed } else { 0.0 };

        let id = self.spawn(&Template::formation_controller(), owner, centroid);
        if let Some(controller) = self.entities.get_mut(&id) {
            controller.mobility = Some(Mobility { walk_speed: speed, run_speed: speed });
            controller.formation = Some(Formation { members, spacing: FORMATION_SPACING });
        }
        id
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Direct access for scripted scenarios.  Changes bypass every rule and
    /// raise no events.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Every entity id, ascending.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Amount of `generic` resource `player` has gathered.
    pub fn stockpile(&self, player: PlayerId, generic: &str) -> f32 {
        self.stockpiles
            .get(&player)
            .and_then(|s| s.get(generic))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn queries(&self) -> &QueryRegistry {
        &self.queries
    }

    pub fn set_diplomacy(&mut self, player: PlayerId, other: PlayerId, value: i32) -> bool {
        match self.diplomacy.get_mut(player.index()).and_then(|row| row.get_mut(other.index())) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// Entities due for removal, ascending.
    pub(crate) fn expired(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> =
            self.entities.values().filter(|e| e.is_expired()).map(|e| e.id).collect();
        ids.sort_unstable();
        ids
    }

    /// Take `id` out of the world along with its timers, queries and
    /// memberships.  Occupants of a removed holder are put back outside.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        self.timers.cancel_owner(id);
        self.queries.destroy_source(id);
        for other in self.entities.values_mut() {
            if let Some(f) = other.formation.as_mut() {
                f.members.retain(|&m| m != id);
            }
            if let Some(g) = other.garrison.as_mut() {
                g.occupants.retain(|&o| o != id);
            }
        }
        if let (Some(holder), Some(at)) = (&entity.garrison, entity.position) {
            for occupant in &holder.occupants {
                if let Some(e) = self.entities.get_mut(occupant) {
                    e.position = Some(at);
                }
            }
        }
        trace!(entity = %id, template = %entity.template, "removed");
        Some(entity)
    }

    pub(crate) fn members_of(&self, controller: EntityId) -> Vec<EntityId> {
        self.entities
            .get(&controller)
            .and_then(|e| e.formation.as_ref())
            .map(|f| f.members.clone())
            .unwrap_or_default()
    }

    /// Release every member and schedule the controller for removal.
    /// Members still walking to their slot finish the walk on their own.
    pub(crate) fn dissolve_formation(&mut self, controller: EntityId) -> Vec<EntityId> {
        let Some(ctrl) = self.entities.get_mut(&controller) else {
            return Vec::new();
        };
        let members = ctrl.formation.take().map(|f| f.members).unwrap_or_default();
        let anchor = ctrl.position;
        ctrl.doomed = true;
        ctrl.movement = None;

        for m in &members {
            if let Some(e) = self.entities.get_mut(m) {
                if let (Some(Movement::Formation { offset, .. }), Some(anchor)) = (e.movement, anchor) {
                    e.movement = Some(Movement::Point(anchor.offset(offset)));
                }
            }
        }
        debug!(%controller, members = members.len(), "formation dissolved");
        members
    }

    // ── Turn phases ───────────────────────────────────────────────────────

    /// Move every entity with a goal one step, in ascending id order.
    pub(crate) fn advance_movement(&mut self, dt_secs: f32) {
        let mut moving: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.movement.is_some())
            .map(|e| e.id)
            .collect();
        if moving.is_empty() {
            return;
        }
        moving.sort_unstable();
        for id in moving {
            self.step(id, dt_secs);
        }
        self.rebuild_index();
    }

    fn step(&mut self, id: EntityId, dt_secs: f32) {
        let Some(ent) = self.entities.get(&id) else { return };
        let (Some(pos), Some(movement)) = (ent.position, ent.movement) else { return };
        let reach = ent.mobility.map_or(0.0, |m| m.walk_speed) * dt_secs;

        let step = match movement {
            Movement::Point(goal) => {
                let next = pos.step_toward(goal, reach);
                if next == goal { Step::Arrived(next) } else { Step::Moved(next) }
            }
            Movement::Range { target, band } => match self.position(target) {
                None => Step::Lost,
                Some(at) => {
                    let d = pos.distance(at);
                    let needed = d - band.max * APPROACH_SLACK;
                    if d <= band.max {
                        Step::Arrived(pos)
                    } else if reach >= needed {
                        Step::Arrived(pos.step_toward(at, needed))
                    } else {
                        Step::Moved(pos.step_toward(at, reach))
                    }
                }
            },
            Movement::Formation { controller, offset } => {
                match self.entities.get(&controller).map(|c| (c.position, c.movement.is_none())) {
                    Some((Some(anchor), settled)) => {
                        let goal = anchor.offset(offset);
                        let next = pos.step_toward(goal, reach);
                        if next == goal && settled { Step::Arrived(next) } else { Step::Moved(next) }
                    }
                    _ => Step::Lost,
                }
            }
        };

        let Some(ent) = self.entities.get_mut(&id) else { return };
        let error = match step {
            Step::Moved(next) => {
                ent.position = Some(next);
                return;
            }
            Step::Arrived(next) => {
                ent.position = Some(next);
                false
            }
            Step::Lost => true,
        };
        ent.movement = None;
        trace!(entity = %id, error, "movement finished");
        self.events.push_back(SimEvent::MotionChanged { entity: id, starting: false, error });
    }

    /// Rebuild the range index and diff every enabled query against it.
    pub(crate) fn update_queries(&mut self) -> Vec<RangeUpdate> {
        self.rebuild_index();
        let entities = &self.entities;
        self.queries.update(&self.index, |id| position_in(entities, id))
    }

    pub(crate) fn rebuild_index(&mut self) {
        let mut tracked: Vec<Tracked> = self
            .entities
            .values()
            .filter(|e| !e.doomed)
            .filter_map(|e| {
                Some(Tracked {
                    id:              e.id,
                    pos:             e.position?,
                    owner:           e.owner,
                    damage_receiver: e.is_damage_receiver(),
                    resource_supply: e.supply.as_ref().is_some_and(|s| s.amount > 0.0),
                })
            })
            .collect();
        tracked.sort_unstable_by_key(|t| t.id);
        self.index = RangeIndex::build(tracked);
    }

    /// Still in the world and not on its way out.
    fn is_present(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| !e.doomed && e.position.is_some())
    }

    fn push_motion_started(&mut self, entity: EntityId) {
        self.events.push_back(SimEvent::MotionChanged { entity, starting: true, error: false });
    }
}

fn position_in(entities: &FxHashMap<EntityId, Entity>, id: EntityId) -> Option<Point> {
    entities.get(&id).and_then(|e| e.position)
}

/// Slot `i` of a two-file column trailing the controller.
fn column_offset(i: usize, spacing: f32) -> Point {
    let file = if i % 2 == 0 { -0.5 } else { 0.5 };
    Point::new(file * spacing, -((i / 2) as f32) * spacing)
}

// ── Motion ────────────────────────────────────────────────────────────────────

impl Motion for SimWorld {
    fn position(&self, ent: EntityId) -> Option<Point> {
        position_in(&self.entities, ent)
    }

    fn move_to_point(&mut self, ent: EntityId, to: Point) -> bool {
        let Some(e) = self.entities.get_mut(&ent) else { return false };
        if e.position.is_none() || !e.can_move() {
            return false;
        }
        e.movement = Some(Movement::Point(to));
        self.push_motion_started(ent);
        true
    }

    fn move_to_range(&mut self, ent: EntityId, target: EntityId, band: RangeBand) -> bool {
        let Some(at) = self.position(target) else { return false };
        let Some(e) = self.entities.get_mut(&ent) else { return false };
        let Some(pos) = e.position else { return false };
        if !e.can_move() {
            return false;
        }
        if pos.distance(at) <= band.max {
            e.movement = None;
            return false;
        }
        e.movement = Some(Movement::Range { target, band });
        self.push_motion_started(ent);
        true
    }

    fn move_to_formation_offset(&mut self, ent: EntityId, controller: EntityId, offset: Point) {
        let Some(e) = self.entities.get_mut(&ent) else { return };
        if e.position.is_none() || !e.can_move() {
            return;
        }
        e.movement = Some(Movement::Formation { controller, offset });
        self.push_motion_started(ent);
    }

    fn is_in_range(&self, ent: EntityId, target: EntityId, band: RangeBand) -> bool {
        match (self.position(ent), self.position(target)) {
            (Some(a), Some(b)) => band.contains(a.distance(b)),
            _ => false,
        }
    }

    fn walk_speed(&self, ent: EntityId) -> f32 {
        self.entities.get(&ent).and_then(|e| e.mobility).map_or(0.0, |m| m.walk_speed)
    }

    fn run_speed(&self, ent: EntityId) -> f32 {
        self.entities.get(&ent).and_then(|e| e.mobility).map_or(0.0, |m| m.run_speed)
    }

    fn set_control_group(&mut self, ent: EntityId, group: EntityId) {
        if let Some(e) = self.entities.get_mut(&ent) {
            e.control_group = group;
        }
    }
}

// ── Combat ────────────────────────────────────────────────────────────────────

impl Combat for SimWorld {
    fn best_attack(&self, ent: EntityId) -> Option<AttackType> {
        self.entities.get(&ent).and_then(|e| e.attack).map(|a| a.kind)
    }

    fn attack_range(&self, ent: EntityId, kind: AttackType) -> Option<RangeBand> {
        self.entities.get(&ent).and_then(|e| e.attack).filter(|a| a.kind == kind).map(|a| a.range)
    }

    fn attack_timing(&self, ent: EntityId, kind: AttackType) -> Option<AttackTiming> {
        self.entities.get(&ent).and_then(|e| e.attack).filter(|a| a.kind == kind).map(|a| a.timing)
    }

    fn perform_attack(&mut self, ent: EntityId, kind: AttackType, target: EntityId) {
        let Some(damage) = self.entities.get(&ent).and_then(|e| e.attack).filter(|a| a.kind == kind).map(|a| a.damage)
        else {
            return;
        };
        let Some(health) = self.entities.get_mut(&target).and_then(|t| t.health.as_mut()) else { return };
        if health.hp == 0 {
            return;
        }
        health.hp = health.hp.saturating_sub(damage);
        if health.hp == 0 {
            debug!(attacker = %ent, %target, "killed");
        }
        self.events.push_back(SimEvent::Attacked { target, attacker: ent });
    }

    fn hitpoints(&self, ent: EntityId) -> Option<u32> {
        self.entities.get(&ent).and_then(|e| e.health).map(|h| h.hp)
    }
}

// ── Gathering ─────────────────────────────────────────────────────────────────

impl Gathering for SimWorld {
    fn gather_rate(&self, ent: EntityId, target: EntityId) -> f32 {
        let Some(gatherer) = self.entities.get(&ent).and_then(|e| e.gatherer) else { return 0.0 };
        let available = self
            .entities
            .get(&target)
            .is_some_and(|t| !t.doomed && t.supply.as_ref().is_some_and(|s| s.amount > 0.0));
        if available { gatherer.rate } else { 0.0 }
    }

    fn gather_range(&self, ent: EntityId) -> Option<RangeBand> {
        self.entities.get(&ent).and_then(|e| e.gatherer).map(|g| g.range)
    }

    fn perform_gather(&mut self, ent: EntityId, target: EntityId) {
        let Some((rate, owner)) = self.entities.get(&ent).and_then(|e| Some((e.gatherer?.rate, e.owner))) else {
            return;
        };
        let Some(t) = self.entities.get_mut(&target) else { return };
        if t.doomed || t.is_damage_receiver() {
            return;
        }
        let Some(supply) = t.supply.as_mut() else { return };

        let taken = rate.min(supply.amount);
        supply.amount -= taken;
        let generic = supply.resource.generic.clone();
        if supply.amount <= 0.0 {
            t.doomed = true;
            t.position = None;
            debug!(entity = %target, "resource exhausted");
        }
        *self.stockpiles.entry(owner).or_default().entry(generic).or_insert(0.0) += taken;
    }

    fn resource_type(&self, target: EntityId) -> Option<ResourceType> {
        self.entities
            .get(&target)
            .filter(|t| !t.doomed)
            .and_then(|t| t.supply.as_ref())
            .map(|s| s.resource.clone())
    }

    fn kill_before_gather(&self, target: EntityId) -> bool {
        self.entities.get(&target).and_then(|t| t.supply.as_ref()).is_some_and(|s| s.kill_first)
    }
}

// ── Building ──────────────────────────────────────────────────────────────────

impl Building for SimWorld {
    fn build_range(&self, ent: EntityId) -> Option<RangeBand> {
        self.entities.get(&ent).and_then(|e| e.builder).map(|b| b.range)
    }

    fn perform_building(&mut self, ent: EntityId, target: EntityId) {
        let Some(rate) = self.entities.get(&ent).and_then(|e| e.builder).map(|b| b.rate) else { return };
        let Some(t) = self.entities.get_mut(&target) else { return };
        let Some(foundation) = t.foundation.as_mut() else { return };

        foundation.progress += rate;
        if foundation.progress < foundation.needed {
            return;
        }
        let becomes = foundation.becomes.clone();
        let (owner, site) = (t.owner, t.position);
        t.foundation = None;
        t.doomed = true;
        t.position = None;

        let (Some(template), Some(site)) = (Template::named(&becomes), site) else {
            warn!(entity = %target, template = %becomes, "finished foundation has nothing to become");
            return;
        };
        let new_entity = self.spawn(&template, owner, site);
        debug!(entity = %target, %new_entity, "construction finished");
        self.events.push_back(SimEvent::ConstructionFinished { entity: target, new_entity });
    }
}

// ── Garrisoning ───────────────────────────────────────────────────────────────

impl Garrisoning for SimWorld {
    fn has_garrison_holder(&self, target: EntityId) -> bool {
        self.entities.get(&target).is_some_and(|t| !t.doomed && t.garrison.is_some())
    }

    fn garrison(&mut self, ent: EntityId, target: EntityId) -> bool {
        if ent == target || !self.entities.contains_key(&ent) {
            return false;
        }
        let Some(holder) = self.entities.get_mut(&target).and_then(|t| t.garrison.as_mut()) else {
            return false;
        };
        if !holder.occupants.contains(&ent) {
            if holder.occupants.len() >= holder.capacity {
                return false;
            }
            holder.occupants.push(ent);
        }
        if let Some(e) = self.entities.get_mut(&ent) {
            e.position = None;
            e.movement = None;
        }
        debug!(entity = %ent, holder = %target, "garrisoned");
        true
    }
}

// ── Perception ────────────────────────────────────────────────────────────────

impl Perception for SimWorld {
    fn vision_range(&self, ent: EntityId) -> Option<f32> {
        self.entities.get(&ent).and_then(|e| e.vision)
    }

    fn create_query(&mut self, ent: EntityId, range: f32, owners: Vec<PlayerId>, filter: QueryFilter) -> QueryId {
        self.queries.create(QuerySpec { source: ent, band: RangeBand::within(range), owners, filter })
    }

    fn enable_query(&mut self, query: QueryId) {
        if let Err(err) = self.queries.enable(query) {
            warn!(%query, %err, "enable_query failed");
        }
    }

    fn disable_query(&mut self, query: QueryId) {
        if let Err(err) = self.queries.disable(query) {
            warn!(%query, %err, "disable_query failed");
        }
    }

    fn destroy_query(&mut self, query: QueryId) {
        self.queries.destroy(query);
    }

    fn reset_query(&mut self, query: QueryId) -> Vec<EntityId> {
        let entities = &self.entities;
        let result = self.queries.reset(query, &self.index, |id| position_in(entities, id));
        match result {
            Ok(mut hits) => {
                hits.retain(|&id| self.is_present(id));
                hits
            }
            Err(err) => {
                warn!(%query, %err, "reset_query failed");
                Vec::new()
            }
        }
    }

    fn execute_query(&self, ent: EntityId, range: f32, owners: &[PlayerId], filter: QueryFilter) -> Vec<EntityId> {
        let Some(center) = self.position(ent) else { return Vec::new() };
        let spec = QuerySpec { source: ent, band: RangeBand::within(range), owners: owners.to_vec(), filter };
        let mut hits = self.index.query(center, &spec);
        hits.retain(|&id| self.is_present(id));
        hits
    }
}

// ── Diplomacy ─────────────────────────────────────────────────────────────────

impl Diplomacy for SimWorld {
    fn owner(&self, ent: EntityId) -> Option<PlayerId> {
        self.entities.get(&ent).map(|e| e.owner)
    }

    fn player_count(&self) -> u32 {
        self.diplomacy.len() as u32
    }

    fn diplomacy(&self, player: PlayerId, other: PlayerId) -> i32 {
        self.diplomacy
            .get(player.index())
            .and_then(|row| row.get(other.index()))
            .copied()
            .unwrap_or(0)
    }
}

// ── Presentation ──────────────────────────────────────────────────────────────

impl Presentation for SimWorld {
    fn has_visual(&self, ent: EntityId) -> bool {
        self.entities.get(&ent).is_some_and(|e| e.visual)
    }

    fn select_movement_animation(&mut self, ent: EntityId, run_threshold: f32) {
        let Some(e) = self.entities.get_mut(&ent) else { return };
        let speed = e.mobility.map_or(0.0, |m| m.walk_speed);
        e.animation = if speed >= run_threshold { "run" } else { "walk" }.to_owned();
    }

    fn select_animation(&mut self, ent: EntityId, name: &str, once: bool, speed: f32, sound_group: &str) {
        if let Some(e) = self.entities.get_mut(&ent) {
            e.animation = name.to_owned();
        }
        trace!(entity = %ent, animation = name, once, speed, sound_group, "animation");
    }

    fn sound_group(&self, ent: EntityId, name: &str) -> Option<String> {
        self.entities.get(&ent).filter(|e| e.visual).map(|e| format!("{}/{name}", e.template))
    }

    fn set_animation_sync(&mut self, ent: EntityId, action_ms: u64, repeat_ms: u64) {
        trace!(entity = %ent, action_ms, repeat_ms, "animation sync");
    }

    fn play_sound(&mut self, ent: EntityId, name: &str) {
        trace!(entity = %ent, sound = name, "sound");
    }
}

// ── Formations ────────────────────────────────────────────────────────────────

impl Formations for SimWorld {
    fn broadcast(&mut self, controller: EntityId, command: FormationCommand) {
        self.events.push_back(SimEvent::Formation { controller, command });
    }

    fn disband(&mut self, controller: EntityId) {
        self.events.push_back(SimEvent::Disband { controller });
    }

    fn move_members_into_formation(&mut self, controller: EntityId) {
        let Some(formation) = self.entities.get(&controller).and_then(|e| e.formation.as_ref()) else {
            return;
        };
        let slots = formation
            .members
            .iter()
            .enumerate()
            .map(|(i, &m)| (m, column_offset(i, formation.spacing)))
            .collect();
        self.events.push_back(SimEvent::MembersIntoFormation { controller, slots });
    }

    fn primary_member(&self, controller: EntityId) -> Option<EntityId> {
        self.entities
            .get(&controller)
            .and_then(|e| e.formation.as_ref())
            .and_then(|f| f.members.first().copied())
    }
}

// ── Timers ────────────────────────────────────────────────────────────────────

impl TimerService for SimWorld {
    fn set_timeout(&mut self, owner: EntityId, offset_ms: u64, repeat_ms: u64) -> TimerId {
        self.timers.schedule(owner, offset_ms, repeat_ms)
    }

    fn cancel_timer(&mut self, id: TimerId) {
        self.timers.cancel(id);
    }
}
