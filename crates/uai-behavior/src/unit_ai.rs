//! `UnitAi`: one unit's controller and the operations that drive it.
//!
//! Everything here runs to completion on the caller's thread.  Entry points
//! (`on_*`, the order commands) turn an event into a [`UnitMessage`] and hand
//! it to the shared state tree; handlers in `states.rs` call back into the
//! crate-private helpers at the bottom of this file.

use tracing::{debug, error, trace, warn};
use uai_core::{EntityId, PlayerId, Point, QueryFilter, QueryId, RangeBand, TimerId};
use uai_fsm::{FsmError, FsmState, Machine};
use uai_timer::TimerFiring;

use crate::states::tree;
use crate::{
    AttackTiming, AttackType, BehaviorError, BehaviorResult, DynWorld, Order, OrderQueue, Stance,
    UnitAiConfig, UnitMessage,
};

/// Which half of the state tree a unit lives in.  Fixed at creation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Regime {
    /// A virtual entity steering a group of members.
    FormationController,
    /// An ordinary unit, alone or as a formation member.
    Unit,
}

pub struct UnitAi {
    pub(crate) entity:               EntityId,
    pub(crate) regime:               Regime,
    pub(crate) fsm:                  FsmState<UnitMessage>,
    pub(crate) orders:               OrderQueue,
    pub(crate) stance:               Stance,
    pub(crate) timer:                Option<TimerId>,
    pub(crate) los_query:            Option<QueryId>,
    pub(crate) formation_controller: Option<EntityId>,
    /// Chosen by `Order.Attack`, read by the combat states.
    pub(crate) attack_type:          Option<AttackType>,
    /// Cached on entering `ATTACKING`.
    pub(crate) attack_timing:        Option<AttackTiming>,
    /// A formation controller that has handed its orders to its members.
    pub(crate) disbanded:            bool,
    pub(crate) config:               UnitAiConfig,
}

impl Machine for UnitAi {
    type Env = DynWorld;
    type Message = UnitMessage;
    type Error = BehaviorError;

    fn fsm(&self) -> &FsmState<UnitMessage> {
        &self.fsm
    }

    fn fsm_mut(&mut self) -> &mut FsmState<UnitMessage> {
        &mut self.fsm
    }
}

impl UnitAi {
    pub fn new(entity: EntityId, regime: Regime, config: UnitAiConfig) -> Self {
        Self {
            entity,
            regime,
            fsm: FsmState::new(),
            orders: OrderQueue::new(),
            stance: config.default_stance,
            timer: None,
            los_query: None,
            formation_controller: None,
            attack_type: None,
            attack_timing: None,
            disbanded: false,
            config,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    #[inline]
    pub fn is_formation_controller(&self) -> bool {
        self.regime == Regime::FormationController
    }

    pub fn orders(&self) -> &OrderQueue {
        &self.orders
    }

    /// The order being executed (the queue head).
    pub fn current_order(&self) -> Option<&Order> {
        self.orders.head()
    }

    pub fn stance(&self) -> Stance {
        self.stance
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    pub fn los_query(&self) -> Option<QueryId> {
        self.los_query
    }

    pub fn formation_controller(&self) -> Option<EntityId> {
        self.formation_controller
    }

    pub fn is_disbanded(&self) -> bool {
        self.disbanded
    }

    pub fn config(&self) -> &UnitAiConfig {
        &self.config
    }

    /// Current leaf state, e.g. `INDIVIDUAL.COMBAT.ATTACKING`.
    pub fn state_path(&self) -> Option<&'static str> {
        tree().ok()?.current_path(self)
    }

    /// `true` if the current state is `path` or one of its descendants.
    pub fn is_in(&self, path: &str) -> bool {
        tree().is_ok_and(|t| t.is_in(self, path))
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Enter the regime's idle state.  Call once, before anything else.
    pub fn on_create(&mut self, world: &mut DynWorld) -> BehaviorResult<()> {
        let initial = match self.regime {
            Regime::FormationController => "FORMATIONCONTROLLER.IDLE",
            Regime::Unit => "INDIVIDUAL.IDLE",
        };
        tree()?.init(self, world, initial)
    }

    /// Rebuild the line-of-sight query for the new owner.  `None` means the
    /// unit has no owner any more (it is being killed).
    pub fn on_ownership_changed(&mut self, world: &mut DynWorld, owner: Option<PlayerId>) {
        self.setup_range_query(world, owner);
    }

    /// Release the timer and the line-of-sight query.
    pub fn on_destroy(&mut self, world: &mut DynWorld) {
        self.stop_timer(world);
        if let Some(query) = self.los_query.take() {
            world.destroy_query(query);
        }
        trace!(entity = %self.entity, "unit destroyed");
    }

    pub fn on_motion_changed(
        &mut self,
        world: &mut DynWorld,
        starting: bool,
        error: bool,
    ) -> BehaviorResult<bool> {
        let msg = if starting && !error {
            UnitMessage::MoveStarted
        } else {
            UnitMessage::MoveCompleted { error }
        };
        self.dispatch(world, msg)
    }

    pub fn on_construction_finished(
        &mut self,
        world: &mut DynWorld,
        entity: EntityId,
        new_entity: EntityId,
    ) -> BehaviorResult<bool> {
        self.dispatch(world, UnitMessage::ConstructionFinished { entity, new_entity })
    }

    pub fn on_attacked(&mut self, world: &mut DynWorld, attacker: EntityId) -> BehaviorResult<bool> {
        self.dispatch(world, UnitMessage::Attacked { attacker })
    }

    /// Forward a range update.  Updates for any query other than this unit's
    /// line-of-sight query are ignored.
    pub fn on_range_update(
        &mut self,
        world: &mut DynWorld,
        query: QueryId,
        added: Vec<EntityId>,
        removed: Vec<EntityId>,
    ) -> BehaviorResult<bool> {
        if self.los_query != Some(query) {
            return Ok(false);
        }
        self.dispatch(world, UnitMessage::LosRangeUpdate { added, removed })
    }

    /// Re-arm the periodic timer (compensating for lateness) and deliver a
    /// `Timer` message.  Firings of a timer that is no longer active are
    /// dropped.
    pub fn on_timer(&mut self, world: &mut DynWorld, firing: &TimerFiring) -> BehaviorResult<bool> {
        if self.timer != Some(firing.id) {
            trace!(entity = %self.entity, timer = %firing.id, "stale timer dropped");
            return Ok(false);
        }
        self.timer = Some(world.set_timeout(self.entity, firing.next_offset(), firing.repeat_ms));
        self.dispatch(world, UnitMessage::Timer { lateness: firing.lateness })
    }

    // ── Order queue ───────────────────────────────────────────────────────────

    /// Append `order`; if the queue was empty, start executing it now.
    pub fn push_order(&mut self, world: &mut DynWorld, order: Order) -> BehaviorResult<()> {
        if self.ignores_orders(&order) {
            return Ok(());
        }
        self.ensure_initialised()?;
        debug!(entity = %self.entity, %order, queued = self.orders.len(), "push order");
        if self.orders.push_back(order.clone()) {
            self.dispatch_order(world, order)?;
        }
        Ok(())
    }

    /// Put `order` at the head and start executing it, preempting the current
    /// one.
    pub fn push_order_front(&mut self, world: &mut DynWorld, order: Order) -> BehaviorResult<()> {
        if self.ignores_orders(&order) {
            return Ok(());
        }
        self.ensure_initialised()?;
        debug!(entity = %self.entity, %order, "push order front");
        self.orders.push_front(order.clone());
        self.dispatch_order(world, order)
    }

    /// Drop every queued order and execute `order` instead.
    pub fn replace_order(&mut self, world: &mut DynWorld, order: Order) -> BehaviorResult<()> {
        if self.ignores_orders(&order) {
            return Ok(());
        }
        self.ensure_initialised()?;
        self.orders.clear();
        self.push_order(world, order)
    }

    /// Pop the current order.  Starts the next one and returns `true`, or
    /// heads for `IDLE` and returns `false` when none remain.
    ///
    /// Calling this with an empty queue is a logic error.
    pub fn finish_order(&mut self, world: &mut DynWorld) -> BehaviorResult<bool> {
        debug_assert!(
            !self.orders.is_empty(),
            "{}: finish_order called with an empty order queue",
            self.entity
        );
        let Some(done) = self.orders.pop_front() else {
            error!(entity = %self.entity, "finish_order called with an empty order queue");
            return Err(BehaviorError::EmptyOrderQueue(self.entity));
        };
        debug!(entity = %self.entity, order = %done, remaining = self.orders.len(), "order finished");

        match self.orders.head().cloned() {
            Some(next) => {
                self.dispatch(world, UnitMessage::Order(next))?;
                Ok(true)
            }
            None => {
                self.fsm.set_next_state("IDLE");
                tree()?.flush(self, world)?;
                Ok(false)
            }
        }
    }

    fn ignores_orders(&self, order: &Order) -> bool {
        if self.disbanded {
            debug!(entity = %self.entity, %order, "disbanded formation ignores order");
        }
        self.disbanded
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    pub fn walk(&mut self, world: &mut DynWorld, to: Point, queued: bool) -> BehaviorResult<()> {
        self.add_order(world, Order::Walk { to }, queued)
    }

    pub fn walk_to_target(&mut self, world: &mut DynWorld, target: EntityId, queued: bool) -> BehaviorResult<()> {
        self.add_order(world, Order::WalkToTarget { target }, queued)
    }

    /// Attack `target`, or just walk to it if this unit cannot attack.
    pub fn attack(&mut self, world: &mut DynWorld, target: EntityId, queued: bool) -> BehaviorResult<()> {
        if !self.can_attack(world, target) {
            return self.walk_to_target(world, target, queued);
        }
        self.add_order(world, Order::Attack { target }, queued)
    }

    /// Gather from `target`, or walk to it if this unit cannot gather there.
    pub fn gather(&mut self, world: &mut DynWorld, target: EntityId, queued: bool) -> BehaviorResult<()> {
        if !self.can_gather(world, target) {
            return self.walk_to_target(world, target, queued);
        }
        match world.resource_type(target) {
            Some(resource) => self.add_order(world, Order::Gather { target, resource }, queued),
            None => self.walk_to_target(world, target, queued),
        }
    }

    pub fn repair(&mut self, world: &mut DynWorld, target: EntityId, queued: bool) -> BehaviorResult<()> {
        if !self.can_repair(world, target) {
            return self.walk_to_target(world, target, queued);
        }
        self.add_order(world, Order::Repair { target }, queued)
    }

    pub fn garrison(&mut self, world: &mut DynWorld, target: EntityId, queued: bool) -> BehaviorResult<()> {
        if !self.can_garrison(world, target) {
            return self.walk_to_target(world, target, queued);
        }
        self.add_order(world, Order::Garrison { target }, queued)
    }

    fn add_order(&mut self, world: &mut DynWorld, order: Order, queued: bool) -> BehaviorResult<()> {
        if queued {
            self.push_order(world, order)
        } else {
            self.replace_order(world, order)
        }
    }

    /// Select a stance by name.  Unknown names leave the stance unchanged and
    /// return `false`.
    pub fn set_stance(&mut self, name: &str) -> bool {
        match Stance::from_name(name) {
            Some(stance) => {
                self.stance = stance;
                true
            }
            None => {
                warn!(entity = %self.entity, stance = name, "unknown stance rejected");
                false
            }
        }
    }

    /// Join (`Some`) or leave (`None`) a formation.  Leaving sends
    /// `FormationLeave`, which returns a member to `INDIVIDUAL.IDLE`.
    pub fn set_formation_controller(
        &mut self,
        world: &mut DynWorld,
        controller: Option<EntityId>,
    ) -> BehaviorResult<()> {
        self.formation_controller = controller;
        world.set_control_group(self.entity, controller.unwrap_or(self.entity));
        if controller.is_none() {
            self.dispatch(world, UnitMessage::FormationLeave)?;
        }
        Ok(())
    }

    /// Distance this unit will walk before its queue runs out or it reaches
    /// the target of a non-walk order.
    pub fn compute_walking_distance(&self, world: &DynWorld) -> f32 {
        let Some(mut pos) = world.position(self.entity) else {
            return 0.0;
        };
        let mut distance = 0.0;
        for order in self.orders.iter() {
            match order {
                Order::Walk { to } => {
                    distance += pos.distance(*to);
                    pos = *to;
                }
                Order::FormationWalk { .. } => return distance,
                targeted => {
                    let Some(target) = targeted.target().and_then(|t| world.position(t)) else {
                        return distance;
                    };
                    return distance + pos.distance(target);
                }
            }
        }
        distance
    }

    // ── Capability checks ─────────────────────────────────────────────────────
    //
    // A formation controller always accepts attack, gather and repair: its
    // members make their own decisions.

    pub fn can_attack(&self, world: &DynWorld, _target: EntityId) -> bool {
        self.is_formation_controller() || world.best_attack(self.entity).is_some()
    }

    pub fn can_gather(&self, world: &DynWorld, target: EntityId) -> bool {
        self.is_formation_controller() || world.gather_rate(self.entity, target) > 0.0
    }

    pub fn can_repair(&self, world: &DynWorld, _target: EntityId) -> bool {
        self.is_formation_controller() || world.build_range(self.entity).is_some()
    }

    pub fn can_garrison(&self, world: &DynWorld, target: EntityId) -> bool {
        world.has_garrison_holder(target)
    }

    // ── Handler helpers ───────────────────────────────────────────────────────

    pub(crate) fn dispatch(&mut self, world: &mut DynWorld, msg: UnitMessage) -> BehaviorResult<bool> {
        tree()?.process_message(self, world, &msg)
    }

    /// Start the order that just became the head.  A failed dispatch takes
    /// the order back out of the queue.
    fn dispatch_order(&mut self, world: &mut DynWorld, order: Order) -> BehaviorResult<()> {
        if let Err(err) = self.dispatch(world, UnitMessage::Order(order.clone())) {
            warn!(entity = %self.entity, %order, %err, "order dispatch failed, dropping it");
            self.orders.remove(&order);
            return Err(err);
        }
        Ok(())
    }

    /// Orders may only be queued once `on_create` has entered the tree.
    fn ensure_initialised(&self) -> BehaviorResult<()> {
        if self.fsm.current().is_none() {
            return Err(FsmError::NotInitialised.into());
        }
        Ok(())
    }

    /// Target of the current order.
    pub(crate) fn order_target(&self) -> Option<EntityId> {
        self.orders.head().and_then(Order::target)
    }

    pub(crate) fn start_timer(&mut self, world: &mut DynWorld, offset_ms: u64, repeat_ms: u64) -> BehaviorResult<()> {
        debug_assert!(
            self.timer.is_none(),
            "{}: start_timer called while a timer is already active",
            self.entity
        );
        if self.timer.is_some() {
            error!(entity = %self.entity, "start_timer called while a timer is already active");
            return Err(BehaviorError::TimerAlreadyActive(self.entity));
        }
        self.timer = Some(world.set_timeout(self.entity, offset_ms, repeat_ms));
        Ok(())
    }

    pub(crate) fn stop_timer(&mut self, world: &mut DynWorld) {
        if let Some(id) = self.timer.take() {
            world.cancel_timer(id);
        }
    }

    fn setup_range_query(&mut self, world: &mut DynWorld, owner: Option<PlayerId>) {
        let Some(range) = world.vision_range(self.entity) else {
            return;
        };
        if let Some(query) = self.los_query.take() {
            world.destroy_query(query);
        }
        let players = owner.map(|o| hostile_players(world, o)).unwrap_or_default();
        let query = world.create_query(self.entity, range, players, QueryFilter::DamageReceiver);
        world.enable_query(query);
        self.los_query = Some(query);
    }

    pub(crate) fn target_is_alive(&self, world: &DynWorld, target: EntityId) -> bool {
        world.hitpoints(target).is_some_and(|hp| hp != 0)
    }

    pub(crate) fn must_kill_gather_target(&self, world: &DynWorld, target: EntityId) -> bool {
        world.kill_before_gather(target) && self.target_is_alive(world, target)
    }

    pub(crate) fn move_to_target(&self, world: &mut DynWorld, target: EntityId) -> bool {
        match world.position(target) {
            Some(pos) => world.move_to_point(self.entity, pos),
            None => false,
        }
    }

    pub(crate) fn move_to_target_range(
        &self,
        world: &mut DynWorld,
        target: EntityId,
        band: Option<RangeBand>,
    ) -> bool {
        band.is_some_and(|b| world.move_to_range(self.entity, target, b))
    }

    pub(crate) fn check_target_range(&self, world: &DynWorld, target: EntityId, band: Option<RangeBand>) -> bool {
        band.is_some_and(|b| world.is_in_range(self.entity, target, b))
    }

    pub(crate) fn attack_band(&self, world: &DynWorld) -> Option<RangeBand> {
        self.attack_type.and_then(|kind| world.attack_range(self.entity, kind))
    }

    /// Push a front `Attack` on the first of `ents` this unit can attack.
    pub(crate) fn attack_visible_entity(&mut self, world: &mut DynWorld, ents: &[EntityId]) -> BehaviorResult<bool> {
        for &target in ents {
            if self.can_attack(world, target) {
                self.push_order_front(world, Order::Attack { target })?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns `false` when the unit has no visual to animate.
    pub(crate) fn select_animation(
        &self,
        world: &mut DynWorld,
        name: &str,
        once: bool,
        speed: f32,
        sound: Option<&str>,
    ) -> bool {
        if !world.has_visual(self.entity) {
            return false;
        }
        if name == "move" {
            let run_threshold = (world.walk_speed(self.entity) + world.run_speed(self.entity)) / 2.0;
            world.select_movement_animation(self.entity, run_threshold);
            return true;
        }
        let group = sound.and_then(|s| world.sound_group(self.entity, s)).unwrap_or_default();
        world.select_animation(self.entity, name, once, speed, &group);
        true
    }

    pub(crate) fn set_animation_sync(&self, world: &mut DynWorld, action_ms: u64, repeat_ms: u64) {
        if world.has_visual(self.entity) {
            world.set_animation_sync(self.entity, action_ms, repeat_ms);
        }
    }

    /// A formation controller has no voice of its own; it speaks through its
    /// primary member.
    pub(crate) fn play_sound(&self, world: &mut DynWorld, name: &str) {
        if self.is_formation_controller() {
            if let Some(member) = world.primary_member(self.entity) {
                world.play_sound(member, name);
            }
        } else {
            world.play_sound(self.entity, name);
        }
    }
}

/// Players `owner` is at war with: every non-Gaia player other than `owner`
/// whose diplomacy entry is negative.
pub fn hostile_players(world: &DynWorld, owner: PlayerId) -> Vec<PlayerId> {
    (1..world.player_count())
        .map(PlayerId)
        .filter(|&p| p != owner && world.diplomacy(owner, p) < 0)
        .collect()
}

impl std::fmt::Debug for UnitAi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitAi")
            .field("entity", &self.entity)
            .field("regime", &self.regime)
            .field("state", &self.state_path())
            .field("orders", &self.orders.len())
            .field("stance", &self.stance)
            .field("timer", &self.timer)
            .finish()
    }
}
