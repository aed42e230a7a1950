//! The unit behavior state tree.
//!
//! ```text
//! (root)                      order dispatch, spurious-event sinks
//! ├── FORMATIONCONTROLLER     relays orders to members, then disbands
//! │   ├── IDLE
//! │   └── WALKING
//! ├── FORMATIONMEMBER         following a controller's movement
//! │   ├── IDLE
//! │   └── WALKING
//! └── INDIVIDUAL              retaliates when attacked
//!     ├── IDLE                watches the line-of-sight query
//!     ├── WALKING
//!     ├── COMBAT              ignores further attackers
//!     │   ├── APPROACHING
//!     │   ├── ATTACKING       timer: attack / chase / give up
//!     │   └── CHASING
//!     ├── GATHER
//!     │   ├── APPROACHING
//!     │   └── GATHERING       timer: gather / re-approach / find more
//!     ├── REPAIR              finishes on construction completion
//!     │   ├── APPROACHING
//!     │   └── REPAIRING       timer: build / give up
//!     └── GARRISON
//!         ├── APPROACHING
//!         └── GARRISONED      garrisons and finishes on entry
//! ```
//!
//! Every `Order.*` handler at the root runs exactly once, when that order
//! becomes the queue head, and either picks the next state or finishes the
//! order.  The state it picks is always entered afresh, even when the unit is
//! already in it, so a queued `Garrison` or `Attack` gets its entry work.

use std::sync::LazyLock;

use tracing::debug;
use uai_core::{PlayerId, QueryFilter};
use uai_fsm::{EnterOutcome, FsmResult, StateTree, StateTreeBuilder};

use crate::{
    BehaviorError, BehaviorResult, DynWorld, FormationCommand, MessageKind as Kind, Order,
    OrderKind, UnitAi, UnitMessage,
};

static UNIT_FSM: LazyLock<FsmResult<StateTree<UnitAi>>> = LazyLock::new(build_tree);

/// The shared, immutable tree every [`UnitAi`] runs on.
pub fn tree() -> BehaviorResult<&'static StateTree<UnitAi>> {
    UNIT_FSM.as_ref().map_err(|err| BehaviorError::Fsm(err.clone()))
}

/// Declare the unit behavior tree.
pub fn build_tree() -> FsmResult<StateTree<UnitAi>> {
    let mut b = StateTreeBuilder::new();

    b.root()
        .on(Kind::MoveStarted, ignore)
        .on(Kind::MoveCompleted, ignore)
        .on(Kind::ConstructionFinished, ignore)
        .on(Kind::LosRangeUpdate, ignore)
        .on(Kind::Attacked, ignore)
        .on(Kind::FormationLeave, ignore)
        .on(Kind::Order(OrderKind::FormationWalk), order_formation_walk)
        .on(Kind::Order(OrderKind::Walk), order_walk)
        .on(Kind::Order(OrderKind::WalkToTarget), order_walk_to_target)
        .on(Kind::Order(OrderKind::Attack), order_attack)
        .on(Kind::Order(OrderKind::Gather), order_gather)
        .on(Kind::Order(OrderKind::Repair), order_repair)
        .on(Kind::Order(OrderKind::Garrison), order_garrison);

    // ── Formation controller ─────────────────────────────────────────────────
    b.state("FORMATIONCONTROLLER")
        .on(Kind::Order(OrderKind::Walk), controller_walk)
        .on(Kind::Order(OrderKind::WalkToTarget), controller_walk_to_target)
        .on(Kind::Order(OrderKind::Attack), controller_relay)
        .on(Kind::Order(OrderKind::Gather), controller_relay)
        .on(Kind::Order(OrderKind::Repair), controller_relay)
        .on(Kind::Order(OrderKind::Garrison), controller_relay);
    b.state("FORMATIONCONTROLLER.IDLE").enter(play_idle);
    b.state("FORMATIONCONTROLLER.WALKING")
        .on(Kind::MoveStarted, controller_move_started)
        .on(Kind::MoveCompleted, controller_move_completed);

    // ── Formation member ─────────────────────────────────────────────────────
    b.state("FORMATIONMEMBER").on(Kind::FormationLeave, member_leave);
    b.state("FORMATIONMEMBER.IDLE").enter(play_idle);
    b.state("FORMATIONMEMBER.WALKING")
        .enter(play_move)
        .on(Kind::MoveCompleted, finish_on_arrival);

    // ── Individual ───────────────────────────────────────────────────────────
    b.state("INDIVIDUAL").on(Kind::Attacked, retaliate);
    b.state("INDIVIDUAL.IDLE")
        .enter(idle_enter)
        .leave(idle_leave)
        .on(Kind::LosRangeUpdate, idle_sighting);
    b.state("INDIVIDUAL.WALKING")
        .enter(play_move)
        .on(Kind::MoveCompleted, finish_on_arrival);

    b.state("INDIVIDUAL.COMBAT").on(Kind::Attacked, ignore);
    b.state("INDIVIDUAL.COMBAT.APPROACHING")
        .enter(play_move)
        .on(Kind::MoveCompleted, start_attacking);
    b.state("INDIVIDUAL.COMBAT.ATTACKING")
        .enter(attacking_enter)
        .leave(attacking_leave)
        .on(Kind::Timer, attacking_tick);
    b.state("INDIVIDUAL.COMBAT.CHASING")
        .enter(play_move)
        .on(Kind::MoveCompleted, start_attacking);

    b.state("INDIVIDUAL.GATHER");
    b.state("INDIVIDUAL.GATHER.APPROACHING")
        .enter(play_move)
        .on(Kind::MoveCompleted, start_gathering);
    b.state("INDIVIDUAL.GATHER.GATHERING")
        .enter(gathering_enter)
        .leave(stop_timer)
        .on(Kind::Timer, gathering_tick);

    b.state("INDIVIDUAL.REPAIR")
        .on(Kind::ConstructionFinished, repair_construction_finished);
    b.state("INDIVIDUAL.REPAIR.APPROACHING")
        .enter(play_move)
        .on(Kind::MoveCompleted, start_repairing);
    b.state("INDIVIDUAL.REPAIR.REPAIRING")
        .enter(repairing_enter)
        .leave(stop_timer)
        .on(Kind::Timer, repairing_tick);

    b.state("INDIVIDUAL.GARRISON");
    b.state("INDIVIDUAL.GARRISON.APPROACHING")
        .enter(garrison_approach_enter)
        .leave(stop_timer)
        .on(Kind::MoveCompleted, arrive_at_garrison);
    b.state("INDIVIDUAL.GARRISON.GARRISONED").enter(garrisoned_enter);

    b.build()
}

// ── Shared pieces ─────────────────────────────────────────────────────────────

fn ignore(_: &mut UnitAi, _: &mut DynWorld, _: &UnitMessage) -> BehaviorResult<()> {
    Ok(())
}

fn finish(unit: &mut UnitAi, world: &mut DynWorld) -> BehaviorResult<()> {
    unit.finish_order(world).map(|_| ())
}

fn finish_on_arrival(unit: &mut UnitAi, world: &mut DynWorld, _: &UnitMessage) -> BehaviorResult<()> {
    finish(unit, world)
}

/// Outcome of an enter hook that may have moved the unit on.
fn settled_outcome(unit: &UnitAi) -> EnterOutcome {
    if unit.fsm.has_pending_transition() {
        EnterOutcome::Transitioning
    } else {
        EnterOutcome::Entered
    }
}

fn animate(unit: &UnitAi, world: &mut DynWorld, name: &str) -> EnterOutcome {
    if unit.select_animation(world, name, false, 1.0, None) {
        EnterOutcome::Entered
    } else {
        EnterOutcome::NotApplicable
    }
}

fn play_idle(unit: &mut UnitAi, world: &mut DynWorld) -> BehaviorResult<EnterOutcome> {
    Ok(animate(unit, world, "idle"))
}

fn play_move(unit: &mut UnitAi, world: &mut DynWorld) -> BehaviorResult<EnterOutcome> {
    Ok(animate(unit, world, "move"))
}

fn stop_timer(unit: &mut UnitAi, world: &mut DynWorld) -> BehaviorResult<()> {
    unit.stop_timer(world);
    Ok(())
}

// ── Order dispatch (root) ─────────────────────────────────────────────────────

fn order_formation_walk(unit: &mut UnitAi, world: &mut DynWorld, msg: &UnitMessage) -> BehaviorResult<()> {
    let &UnitMessage::Order(Order::FormationWalk { controller, offset }) = msg else {
        return Ok(());
    };
    world.move_to_formation_offset(unit.entity, controller, offset);
    unit.fsm.set_next_state_reentering("FORMATIONMEMBER.WALKING");
    Ok(())
}

fn order_walk(unit: &mut UnitAi, world: &mut DynWorld, msg: &UnitMessage) -> BehaviorResult<()> {
    let &UnitMessage::Order(Order::Walk { to }) = msg else {
        return Ok(());
    };
    if world.move_to_point(unit.entity, to) {
        unit.fsm.set_next_state_reentering("INDIVIDUAL.WALKING");
        Ok(())
    } else {
        finish(unit, world)
    }
}

fn order_walk_to_target(unit: &mut UnitAi, world: &mut DynWorld, msg: &UnitMessage) -> BehaviorResult<()> {
    let &UnitMessage::Order(Order::WalkToTarget { target }) = msg else {
        return Ok(());
    };
    if unit.move_to_target(world, target) {
        unit.fsm.set_next_state_reentering("INDIVIDUAL.WALKING");
        Ok(())
    } else {
        // Already there, or cannot move at all.
        finish(unit, world)
    }
}

fn order_attack(unit: &mut UnitAi, world: &mut DynWorld, msg: &UnitMessage) -> BehaviorResult<()> {
    let &UnitMessage::Order(Order::Attack { target }) = msg else {
        return Ok(());
    };
    if !unit.target_is_alive(world, target) {
        debug!(entity = %unit.entity, %target, "attack target is already dead");
        return finish(unit, world);
    }
    let Some(kind) = world.best_attack(unit.entity) else {
        debug!(entity = %unit.entity, "unit cannot attack");
        return finish(unit, world);
    };
    unit.attack_type = Some(kind);

    let band = world.attack_range(unit.entity, kind);
    if unit.move_to_target_range(world, target, band) {
        unit.fsm.set_next_state_reentering("INDIVIDUAL.COMBAT.APPROACHING");
    } else {
        // In range already, or unreachable: try from here.
        unit.fsm.set_next_state_reentering("INDIVIDUAL.COMBAT.ATTACKING");
    }
    Ok(())
}

fn order_gather(unit: &mut UnitAi, world: &mut DynWorld, msg: &UnitMessage) -> BehaviorResult<()> {
    let UnitMessage::Order(Order::Gather { target, .. }) = msg else {
        return Ok(());
    };
    let target = *target;

    if unit.must_kill_gather_target(world, target) {
        if world.best_attack(unit.entity).is_none() {
            debug!(entity = %unit.entity, %target, "gather target must be killed but unit cannot attack");
            return finish(unit, world);
        }
        return unit.push_order_front(world, Order::Attack { target });
    }

    let band = world.gather_range(unit.entity);
    if unit.move_to_target_range(world, target, band) {
        unit.fsm.set_next_state_reentering("INDIVIDUAL.GATHER.APPROACHING");
    } else {
        unit.fsm.set_next_state_reentering("INDIVIDUAL.GATHER.GATHERING");
    }
    Ok(())
}

fn order_repair(unit: &mut UnitAi, world: &mut DynWorld, msg: &UnitMessage) -> BehaviorResult<()> {
    let &UnitMessage::Order(Order::Repair { target }) = msg else {
        return Ok(());
    };
    let band = world.build_range(unit.entity);
    if unit.move_to_target_range(world, target, band) {
        unit.fsm.set_next_state_reentering("INDIVIDUAL.REPAIR.APPROACHING");
    } else {
        unit.fsm.set_next_state_reentering("INDIVIDUAL.REPAIR.REPAIRING");
    }
    Ok(())
}

fn order_garrison(unit: &mut UnitAi, world: &mut DynWorld, msg: &UnitMessage) -> BehaviorResult<()> {
    let &UnitMessage::Order(Order::Garrison { target }) = msg else {
        return Ok(());
    };
    if unit.move_to_target(world, target) {
        unit.fsm.set_next_state_reentering("INDIVIDUAL.GARRISON.APPROACHING");
    } else {
        unit.fsm.set_next_state_reentering("INDIVIDUAL.GARRISON.GARRISONED");
    }
    Ok(())
}

// ── FORMATIONCONTROLLER ───────────────────────────────────────────────────────

fn controller_walk(unit: &mut UnitAi, world: &mut DynWorld, msg: &UnitMessage) -> BehaviorResult<()> {
    let &UnitMessage::Order(Order::Walk { to }) = msg else {
        return Ok(());
    };
    if world.move_to_point(unit.entity, to) {
        unit.fsm.set_next_state_reentering("WALKING");
        Ok(())
    } else {
        finish_or_disband(unit, world)
    }
}

fn controller_walk_to_target(unit: &mut UnitAi, world: &mut DynWorld, msg: &UnitMessage) -> BehaviorResult<()> {
    let &UnitMessage::Order(Order::WalkToTarget { target }) = msg else {
        return Ok(());
    };
    if unit.move_to_target(world, target) {
        unit.fsm.set_next_state_reentering("WALKING");
        Ok(())
    } else {
        finish_or_disband(unit, world)
    }
}

/// Hand the order to every member and disband.
fn controller_relay(unit: &mut UnitAi, world: &mut DynWorld, msg: &UnitMessage) -> BehaviorResult<()> {
    let UnitMessage::Order(order) = msg else {
        return Ok(());
    };
    let command = match *order {
        Order::Attack { target } => FormationCommand::Attack(target),
        Order::Gather { target, .. } => FormationCommand::Gather(target),
        Order::Repair { target } => FormationCommand::Repair(target),
        Order::Garrison { target } => FormationCommand::Garrison(target),
        _ => return Ok(()),
    };
    debug!(entity = %unit.entity, ?command, "formation relays order to members");
    world.broadcast(unit.entity, command);
    disband(unit, world);
    Ok(())
}

fn controller_move_started(unit: &mut UnitAi, world: &mut DynWorld, _: &UnitMessage) -> BehaviorResult<()> {
    world.move_members_into_formation(unit.entity);
    Ok(())
}

fn controller_move_completed(unit: &mut UnitAi, world: &mut DynWorld, _: &UnitMessage) -> BehaviorResult<()> {
    finish_or_disband(unit, world)
}

fn finish_or_disband(unit: &mut UnitAi, world: &mut DynWorld) -> BehaviorResult<()> {
    if !unit.finish_order(world)? {
        disband(unit, world);
    }
    Ok(())
}

/// After this the controller ignores every further order.
fn disband(unit: &mut UnitAi, world: &mut DynWorld) {
    debug!(entity = %unit.entity, "formation disbanded");
    world.disband(unit.entity);
    unit.orders.clear();
    unit.disbanded = true;
    unit.fsm.set_next_state("FORMATIONCONTROLLER.IDLE");
}

// ── FORMATIONMEMBER ───────────────────────────────────────────────────────────

fn member_leave(unit: &mut UnitAi, _: &mut DynWorld, _: &UnitMessage) -> BehaviorResult<()> {
    unit.orders.clear();
    unit.fsm.set_next_state("INDIVIDUAL.IDLE");
    Ok(())
}

// ── INDIVIDUAL ────────────────────────────────────────────────────────────────

fn retaliate(unit: &mut UnitAi, world: &mut DynWorld, msg: &UnitMessage) -> BehaviorResult<()> {
    let &UnitMessage::Attacked { attacker } = msg else {
        return Ok(());
    };
    if unit.can_attack(world, attacker) {
        debug!(entity = %unit.entity, %attacker, "retaliating");
        unit.push_order_front(world, Order::Attack { target: attacker })?;
    }
    Ok(())
}

fn idle_enter(unit: &mut UnitAi, world: &mut DynWorld) -> BehaviorResult<EnterOutcome> {
    if let Some(query) = unit.los_query {
        let visible = world.reset_query(query);
        if unit.stance.attack_on_sight() && unit.attack_visible_entity(world, &visible)? {
            return Ok(settled_outcome(unit));
        }
    }
    Ok(animate(unit, world, "idle"))
}

fn idle_leave(unit: &mut UnitAi, world: &mut DynWorld) -> BehaviorResult<()> {
    if let Some(query) = unit.los_query {
        world.disable_query(query);
    }
    Ok(())
}

fn idle_sighting(unit: &mut UnitAi, world: &mut DynWorld, msg: &UnitMessage) -> BehaviorResult<()> {
    let UnitMessage::LosRangeUpdate { added, .. } = msg else {
        return Ok(());
    };
    if unit.stance.attack_on_sight() {
        unit.attack_visible_entity(world, added)?;
    }
    Ok(())
}

// ── INDIVIDUAL.COMBAT ─────────────────────────────────────────────────────────

fn start_attacking(unit: &mut UnitAi, _: &mut DynWorld, _: &UnitMessage) -> BehaviorResult<()> {
    unit.fsm.set_next_state("ATTACKING");
    Ok(())
}

fn attacking_enter(unit: &mut UnitAi, world: &mut DynWorld) -> BehaviorResult<EnterOutcome> {
    let timing = unit
        .attack_type
        .and_then(|kind| world.attack_timing(unit.entity, kind));
    let Some(timing) = timing else {
        debug!(entity = %unit.entity, "no attack timing, giving up");
        finish(unit, world)?;
        return Ok(settled_outcome(unit));
    };
    unit.attack_timing = Some(timing);

    unit.select_animation(world, "melee", false, 1.0, Some("attack"));
    unit.set_animation_sync(world, timing.prepare_ms, timing.repeat_ms);
    unit.start_timer(world, timing.prepare_ms, timing.repeat_ms)?;
    Ok(EnterOutcome::Entered)
}

fn attacking_leave(unit: &mut UnitAi, world: &mut DynWorld) -> BehaviorResult<()> {
    unit.stop_timer(world);
    unit.attack_timing = None;
    Ok(())
}

fn attacking_tick(unit: &mut UnitAi, world: &mut DynWorld, _: &UnitMessage) -> BehaviorResult<()> {
    let Some(target) = unit.order_target() else {
        return Ok(());
    };
    if unit.target_is_alive(world, target) {
        let band = unit.attack_band(world);
        if unit.check_target_range(world, target, band) {
            if let Some(kind) = unit.attack_type {
                world.perform_attack(unit.entity, kind, target);
            }
            return Ok(());
        }
        if unit.move_to_target_range(world, target, band) {
            unit.fsm.set_next_state("COMBAT.CHASING");
            return Ok(());
        }
    }
    // Dead, gone, or unreachable.
    finish(unit, world)
}

// ── INDIVIDUAL.GATHER ─────────────────────────────────────────────────────────

fn start_gathering(unit: &mut UnitAi, _: &mut DynWorld, _: &UnitMessage) -> BehaviorResult<()> {
    unit.fsm.set_next_state("GATHERING");
    Ok(())
}

fn gathering_enter(unit: &mut UnitAi, world: &mut DynWorld) -> BehaviorResult<EnterOutcome> {
    let Some(Order::Gather { resource, .. }) = unit.orders.head() else {
        return Ok(EnterOutcome::NotApplicable);
    };
    let animation = format!("gather_{}", resource.specific);
    unit.select_animation(world, &animation, false, 1.0, Some(&animation));

    let interval = unit.config.gather_interval_ms;
    unit.start_timer(world, interval, interval)?;
    Ok(EnterOutcome::Entered)
}

fn gathering_tick(unit: &mut UnitAi, world: &mut DynWorld, _: &UnitMessage) -> BehaviorResult<()> {
    let Some(Order::Gather { target, resource }) = unit.orders.head().cloned() else {
        return Ok(());
    };
    let band = world.gather_range(unit.entity);
    if unit.check_target_range(world, target, band) {
        world.perform_gather(unit.entity, target);
        return Ok(());
    }
    if unit.move_to_target_range(world, target, band) {
        unit.fsm.set_next_state("APPROACHING");
        return Ok(());
    }

    if unit.finish_order(world)? {
        return Ok(());
    }

    // Nothing queued: look for more of the same resource nearby, from Gaia
    // or from our own player.
    let mut owners = vec![PlayerId::GAIA];
    if let Some(owner) = world.owner(unit.entity).filter(|&o| o != PlayerId::GAIA) {
        owners.push(owner);
    }
    let nearby = world.execute_query(
        unit.entity,
        unit.config.gather_search_radius,
        &owners,
        QueryFilter::ResourceSupply,
    );
    let replacement = nearby.into_iter().find(|&ent| {
        ent != target && world.resource_type(ent).is_some_and(|t| t.specific == resource.specific)
    });
    match replacement {
        Some(next) => {
            debug!(entity = %unit.entity, from = %target, to = %next, "switching to nearby resource");
            unit.gather(world, next, true)
        }
        None => Ok(()),
    }
}

// ── INDIVIDUAL.REPAIR ─────────────────────────────────────────────────────────

fn start_repairing(unit: &mut UnitAi, _: &mut DynWorld, _: &UnitMessage) -> BehaviorResult<()> {
    unit.fsm.set_next_state("REPAIRING");
    Ok(())
}

fn repairing_enter(unit: &mut UnitAi, world: &mut DynWorld) -> BehaviorResult<EnterOutcome> {
    unit.select_animation(world, "build", false, 1.0, Some("build"));
    let interval = unit.config.repair_interval_ms;
    unit.start_timer(world, interval, interval)?;
    Ok(EnterOutcome::Entered)
}

fn repairing_tick(unit: &mut UnitAi, world: &mut DynWorld, _: &UnitMessage) -> BehaviorResult<()> {
    let Some(target) = unit.order_target() else {
        return Ok(());
    };
    let band = world.build_range(unit.entity);
    if !unit.check_target_range(world, target, band) {
        return finish(unit, world);
    }
    world.perform_building(unit.entity, target);
    Ok(())
}

fn repair_construction_finished(
    unit: &mut UnitAi,
    world: &mut DynWorld,
    msg: &UnitMessage,
) -> BehaviorResult<()> {
    let &UnitMessage::ConstructionFinished { entity, new_entity } = msg else {
        return Ok(());
    };
    if unit.order_target() != Some(entity) {
        return Ok(());
    }
    if unit.finish_order(world)? {
        return Ok(());
    }
    // A finished field or similar: start working it.
    if unit.can_gather(world, new_entity) {
        unit.gather(world, new_entity, true)?;
    }
    Ok(())
}

// ── INDIVIDUAL.GARRISON ───────────────────────────────────────────────────────

fn garrison_approach_enter(unit: &mut UnitAi, world: &mut DynWorld) -> BehaviorResult<EnterOutcome> {
    let speed = world.walk_speed(unit.entity);
    let animated = unit.select_animation(world, "walk", false, speed, None);
    unit.play_sound(world, "walk");
    Ok(if animated { EnterOutcome::Entered } else { EnterOutcome::NotApplicable })
}

fn arrive_at_garrison(unit: &mut UnitAi, _: &mut DynWorld, _: &UnitMessage) -> BehaviorResult<()> {
    unit.fsm.set_next_state("GARRISONED");
    Ok(())
}

fn garrisoned_enter(unit: &mut UnitAi, world: &mut DynWorld) -> BehaviorResult<EnterOutcome> {
    if let Some(target) = unit.order_target() {
        if world.has_garrison_holder(target) && !world.garrison(unit.entity, target) {
            debug!(entity = %unit.entity, %target, "garrison refused");
        }
    }
    finish(unit, world)?;
    Ok(settled_outcome(unit))
}
