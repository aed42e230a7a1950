//! Integration tests for uai-sim: the real behavior tree driven by the
//! reference world.

use std::io::Write;

use uai_behavior::{Combat, Diplomacy, Garrisoning, Motion, Order, hostile_players};
use uai_core::{EntityId, PlayerId, Point, SimConfig, SimTime};

use crate::{
    Command, NoopObserver, Sim, SimBuilder, SimError, SimObserver, SimWorld, Spawn, Template, TurnStats,
    load_scenario_csv, load_scenario_reader,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

const P1: PlayerId = PlayerId(1);
const P2: PlayerId = PlayerId(2);

fn config(total_turns: u64) -> SimConfig {
    SimConfig { turn_length_ms: 200, total_turns, seed: 7 }
}

fn run(sim: &mut Sim, turns: u64) {
    sim.run_turns(turns, &mut NoopObserver).unwrap();
}

fn state(sim: &Sim, id: EntityId) -> &'static str {
    sim.unit(id).and_then(|u| u.state_path()).unwrap_or("<none>")
}

fn close(a: Point, b: Point) -> bool {
    a.distance(b) < 0.01
}

// ── SimBuilder validation ─────────────────────────────────────────────────────

#[cfg(test)]
mod builder_tests {
    use super::*;

    #[test]
    fn units_get_a_controller_and_props_do_not() {
        let sim = SimBuilder::new(config(10))
            .spawn("infantry", P1, Point::new(0.0, 0.0))
            .spawn("tree", PlayerId::GAIA, Point::new(5.0, 5.0))
            .build()
            .unwrap();

        let soldier = sim.unit(EntityId(1)).unwrap();
        assert_eq!(state(&sim, EntityId(1)), "INDIVIDUAL.IDLE");
        assert!(soldier.los_query().is_some());
        assert!(sim.unit(EntityId(2)).is_none());
        assert_eq!(sim.world.len(), 2);
    }

    #[test]
    fn scatter_is_seeded_and_bounded() {
        let layout = |seed: u64| {
            let sim = SimBuilder::new(SimConfig { seed, ..config(10) })
                .scatter("tree", PlayerId::GAIA, Point::new(50.0, -20.0), 8, 10.0)
                .build()
                .unwrap();
            sim.world
                .ids()
                .into_iter()
                .filter_map(|id| sim.world.entity(id).and_then(|e| e.position))
                .collect::<Vec<_>>()
        };

        let first = layout(3);
        assert_eq!(first.len(), 8);
        assert_eq!(first, layout(3));
        assert_ne!(first, layout(4));
        for p in &first {
            assert!((40.0..=60.0).contains(&p.x), "{p}");
            assert!((-30.0..=-10.0).contains(&p.z), "{p}");
        }
    }

    #[test]
    fn unknown_template_errors() {
        let result = SimBuilder::new(config(10)).spawn("dragon", P1, Point::default()).build();
        assert!(matches!(result, Err(SimError::UnknownTemplate(t)) if t == "dragon"));
    }

    #[test]
    fn owner_out_of_range_errors() {
        let result = SimBuilder::new(config(10))
            .players(2)
            .spawn("infantry", PlayerId(3), Point::default())
            .build();
        assert!(matches!(result, Err(SimError::UnknownPlayer { player: PlayerId(3), players: 2 })));
    }

    #[test]
    fn zero_turn_length_errors() {
        let cfg = SimConfig { turn_length_ms: 0, ..config(10) };
        assert!(matches!(SimBuilder::new(cfg).build(), Err(SimError::Core(_))));
    }

    #[test]
    fn zero_players_errors() {
        assert!(matches!(SimBuilder::new(config(10)).players(0).build(), Err(SimError::Config(_))));
    }

    #[test]
    fn spawn_stance_overrides_default() {
        let sim = SimBuilder::new(config(10))
            .spawns([Spawn {
                template: "archer".into(),
                owner:    P1,
                position: Point::default(),
                stance:   Some(uai_behavior::Stance::HoldFire),
            }])
            .build()
            .unwrap();
        assert_eq!(sim.unit(EntityId(1)).unwrap().stance(), uai_behavior::Stance::HoldFire);
    }
}

// ── World rules ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod world_tests {
    use super::*;

    fn world_with(templates: &[(&str, PlayerId, Point)]) -> SimWorld {
        let mut world = SimWorld::new(3);
        for &(name, owner, at) in templates {
            world.spawn(&Template::named(name).unwrap(), owner, at);
        }
        world.rebuild_index();
        world
    }

    #[test]
    fn default_diplomacy_is_war_between_players() {
        let world = SimWorld::new(3);
        assert_eq!(world.diplomacy(P1, P2), -1);
        assert_eq!(world.diplomacy(P1, P1), 1);
        assert_eq!(world.diplomacy(P1, PlayerId::GAIA), 0);
        assert_eq!(hostile_players(&world, P1), vec![P2]);
    }

    #[test]
    fn move_to_range_refuses_when_already_in_range() {
        let mut world = world_with(&[
            ("infantry", P1, Point::new(0.0, 0.0)),
            ("infantry", P2, Point::new(3.0, 0.0)),
        ]);
        let band = world.attack_range(EntityId(1), uai_behavior::AttackType::Melee).unwrap();
        assert!(!world.move_to_range(EntityId(1), EntityId(2), band));
        assert!(world.events.is_empty());
        assert!(world.is_in_range(EntityId(1), EntityId(2), band));
    }

    #[test]
    fn range_approach_stops_inside_the_band() {
        let mut world = world_with(&[
            ("infantry", P1, Point::new(0.0, 0.0)),
            ("infantry", P2, Point::new(10.0, 0.0)),
        ]);
        let band = world.attack_range(EntityId(1), uai_behavior::AttackType::Melee).unwrap();
        assert!(world.move_to_range(EntityId(1), EntityId(2), band));
        for _ in 0..10 {
            world.advance_movement(0.2);
        }
        assert!(world.is_in_range(EntityId(1), EntityId(2), band));
        assert!(world.entity(EntityId(1)).unwrap().movement.is_none());
    }

    #[test]
    fn garrison_respects_capacity() {
        let mut spawns = vec![("house", P1, Point::new(0.0, 0.0))];
        spawns.extend(std::iter::repeat_n(("worker", P1, Point::new(1.0, 0.0)), 6));
        let mut world = world_with(&spawns);

        let house = EntityId(1);
        let accepted = (2..=7).filter(|&w| world.garrison(EntityId(w), house)).count();
        assert_eq!(accepted, 5);
        assert_eq!(world.position(EntityId(2)), None);
        assert!(world.position(EntityId(7)).is_some());
    }

    #[test]
    fn attack_queues_an_attacked_event() {
        let mut world = world_with(&[
            ("infantry", P1, Point::new(0.0, 0.0)),
            ("worker", P2, Point::new(1.0, 0.0)),
        ]);
        world.perform_attack(EntityId(1), uai_behavior::AttackType::Melee, EntityId(2));
        assert_eq!(world.hitpoints(EntityId(2)), Some(40));
        assert_eq!(
            world.events.pop_front(),
            Some(crate::SimEvent::Attacked { target: EntityId(2), attacker: EntityId(1) })
        );
    }
}

// ── End-to-end behavior ───────────────────────────────────────────────────────

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn walk_order_arrives_and_idles() {
        let mut sim = SimBuilder::new(config(100)).spawn("worker", P1, Point::new(0.0, 0.0)).build().unwrap();
        let worker = EntityId(1);

        sim.command(worker, Command::Walk(Point::new(9.0, 0.0)), false).unwrap();
        assert_eq!(state(&sim, worker), "INDIVIDUAL.WALKING");

        run(&mut sim, 7);
        assert_eq!(sim.world.position(worker), Some(Point::new(9.0, 0.0)));
        assert_eq!(state(&sim, worker), "INDIVIDUAL.IDLE");
        assert!(sim.unit(worker).unwrap().orders().is_empty());
    }

    #[test]
    fn aggressive_unit_engages_and_kills_a_sighted_enemy() {
        let mut sim = SimBuilder::new(config(200))
            .spawn("infantry", P1, Point::new(0.0, 0.0))
            .spawn("worker", P2, Point::new(20.0, 0.0))
            .build()
            .unwrap();
        let (soldier, victim) = (EntityId(1), EntityId(2));
        assert!(sim.set_stance(victim, "holdfire").unwrap());
        assert_eq!(sim.world.queries().len(), 2);

        run(&mut sim, 1);
        assert!(sim.unit(soldier).unwrap().is_in("INDIVIDUAL.COMBAT"));
        assert_eq!(sim.unit(soldier).unwrap().current_order(), Some(&Order::Attack { target: victim }));

        run(&mut sim, 100);
        assert!(sim.world.entity(victim).is_none());
        assert!(sim.unit(victim).is_none());
        assert_eq!(state(&sim, soldier), "INDIVIDUAL.IDLE");
        assert!(sim.world.hitpoints(soldier).is_some_and(|hp| hp > 0));
        // The dead unit's query and timers are gone with it.
        assert_eq!(sim.world.queries().len(), 1);
        assert_eq!(sim.world.timers().count_for(victim), 0);
    }

    #[test]
    fn allies_ignore_each_other() {
        let mut sim = SimBuilder::new(config(20))
            .diplomacy(P1, P2, 1)
            .diplomacy(P2, P1, 1)
            .spawn("infantry", P1, Point::new(0.0, 0.0))
            .spawn("infantry", P2, Point::new(6.0, 0.0))
            .build()
            .unwrap();
        sim.run(&mut NoopObserver).unwrap();
        assert_eq!(state(&sim, EntityId(1)), "INDIVIDUAL.IDLE");
        assert_eq!(state(&sim, EntityId(2)), "INDIVIDUAL.IDLE");
        assert_eq!(sim.world.hitpoints(EntityId(2)), Some(100));
    }

    #[test]
    fn gatherer_moves_on_to_the_next_tree() {
        let mut sim = SimBuilder::new(config(100))
            .spawn("worker", P1, Point::new(0.0, 0.0))
            .spawn("tree", PlayerId::GAIA, Point::new(10.0, 0.0))
            .spawn("tree", PlayerId::GAIA, Point::new(14.0, 0.0))
            .build()
            .unwrap();
        let (worker, first, second) = (EntityId(1), EntityId(2), EntityId(3));
        if let Some(supply) = sim.world.entity_mut(first).and_then(|t| t.supply.as_mut()) {
            supply.amount = 3.0;
        }

        sim.command(worker, Command::Gather(first), false).unwrap();
        assert_eq!(state(&sim, worker), "INDIVIDUAL.GATHER.APPROACHING");

        run(&mut sim, 40);
        assert!(sim.world.entity(first).is_none());
        assert!(sim.world.stockpile(P1, "wood") >= 3.0);
        let order = sim.unit(worker).unwrap().current_order().cloned();
        assert!(matches!(order, Some(Order::Gather { target, .. }) if target == second));
        assert!(sim.unit(worker).unwrap().is_in("INDIVIDUAL.GATHER"));
    }

    #[test]
    fn live_game_is_hunted_before_it_is_gathered() {
        let mut sim = SimBuilder::new(config(200))
            .spawn("worker", P1, Point::new(0.0, 0.0))
            .spawn("deer", PlayerId::GAIA, Point::new(10.0, 0.0))
            .build()
            .unwrap();
        let (worker, deer) = (EntityId(1), EntityId(2));

        sim.command(worker, Command::Gather(deer), false).unwrap();
        let unit = sim.unit(worker).unwrap();
        assert_eq!(unit.current_order(), Some(&Order::Attack { target: deer }));
        assert_eq!(unit.orders().len(), 2);

        run(&mut sim, 120);
        assert_eq!(sim.world.hitpoints(deer), Some(0));
        assert!(sim.world.entity(deer).is_some(), "carcass stays until eaten");
        assert!(sim.world.stockpile(P1, "food") > 0.0);
        assert_eq!(state(&sim, worker), "INDIVIDUAL.GATHER.GATHERING");
    }

    #[test]
    fn builder_finishes_a_foundation() {
        let mut sim = SimBuilder::new(config(100))
            .spawn("worker", P1, Point::new(0.0, 0.0))
            .spawn("house_foundation", P1, Point::new(8.0, 0.0))
            .build()
            .unwrap();
        let (worker, site) = (EntityId(1), EntityId(2));

        sim.command(worker, Command::Repair(site), false).unwrap();
        assert_eq!(state(&sim, worker), "INDIVIDUAL.REPAIR.APPROACHING");

        run(&mut sim, 5);
        assert_eq!(state(&sim, worker), "INDIVIDUAL.REPAIR.REPAIRING");

        run(&mut sim, 70);
        assert!(sim.world.entity(site).is_none());
        let house = sim.world.ids().into_iter().find(|&id| {
            sim.world.entity(id).is_some_and(|e| e.template == "house")
        });
        let house = house.unwrap();
        assert_eq!(sim.world.owner(house), Some(P1));
        assert_eq!(sim.world.position(house), Some(Point::new(8.0, 0.0)));
        assert_eq!(state(&sim, worker), "INDIVIDUAL.IDLE");
        assert!(sim.unit(worker).unwrap().orders().is_empty());
    }

    #[test]
    fn garrison_takes_the_unit_out_of_the_world() {
        let mut sim = SimBuilder::new(config(100))
            .spawn("worker", P1, Point::new(0.0, 0.0))
            .spawn("house", P1, Point::new(9.0, 0.0))
            .build()
            .unwrap();
        let (worker, house) = (EntityId(1), EntityId(2));

        sim.command(worker, Command::Garrison(house), false).unwrap();
        assert_eq!(state(&sim, worker), "INDIVIDUAL.GARRISON.APPROACHING");

        run(&mut sim, 10);
        assert_eq!(sim.world.position(worker), None);
        let holder = sim.world.entity(house).and_then(|h| h.garrison.clone()).unwrap();
        assert_eq!(holder.occupants, vec![worker]);
        assert_eq!(state(&sim, worker), "INDIVIDUAL.IDLE");
    }

    #[test]
    fn garrison_on_a_non_holder_walks_there_instead() {
        let mut sim = SimBuilder::new(config(100))
            .spawn("worker", P1, Point::new(0.0, 0.0))
            .spawn("tree", PlayerId::GAIA, Point::new(9.0, 0.0))
            .build()
            .unwrap();
        sim.command(EntityId(1), Command::Garrison(EntityId(2)), false).unwrap();
        assert_eq!(
            sim.unit(EntityId(1)).unwrap().current_order(),
            Some(&Order::WalkToTarget { target: EntityId(2) })
        );
        assert_eq!(state(&sim, EntityId(1)), "INDIVIDUAL.WALKING");
    }

    #[test]
    fn commands_to_props_are_rejected() {
        let mut sim = SimBuilder::new(config(10))
            .spawn("tree", PlayerId::GAIA, Point::default())
            .build()
            .unwrap();
        let result = sim.command(EntityId(1), Command::Walk(Point::new(1.0, 1.0)), false);
        assert!(matches!(result, Err(SimError::NotAUnit(EntityId(1)))));
    }

    #[test]
    fn unknown_stance_is_rejected_and_ignored() {
        let mut sim = SimBuilder::new(config(10)).spawn("archer", P1, Point::default()).build().unwrap();
        assert!(!sim.set_stance(EntityId(1), "berserk").unwrap());
        assert_eq!(sim.unit(EntityId(1)).unwrap().stance(), uai_behavior::Stance::Aggressive);
    }
}

// ── Formations ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod formation_tests {
    use super::*;

    fn pair() -> Sim {
        SimBuilder::new(config(200))
            .spawn("infantry", P1, Point::new(0.0, 0.0))
            .spawn("infantry", P1, Point::new(2.0, 0.0))
            .spawn("worker", P2, Point::new(80.0, 0.0))
            .build()
            .unwrap()
    }

    #[test]
    fn formation_walks_in_column_and_disbands_on_arrival() {
        let mut sim = pair();
        let (a, b) = (EntityId(1), EntityId(2));
        let controller = sim.form_formation(&[a, b]).unwrap();
        assert_eq!(sim.world.entity(a).unwrap().control_group, controller);
        assert_eq!(sim.unit(a).unwrap().formation_controller(), Some(controller));

        sim.command(controller, Command::Walk(Point::new(20.0, 0.0)), false).unwrap();
        assert_eq!(state(&sim, controller), "FORMATIONCONTROLLER.WALKING");
        assert_eq!(state(&sim, a), "FORMATIONMEMBER.WALKING");
        assert_eq!(state(&sim, b), "FORMATIONMEMBER.WALKING");

        run(&mut sim, 30);
        assert!(sim.unit(controller).is_none());
        assert!(sim.world.entity(controller).is_none());
        for (member, slot) in [(a, Point::new(18.0, 0.0)), (b, Point::new(22.0, 0.0))] {
            assert_eq!(state(&sim, member), "INDIVIDUAL.IDLE");
            assert!(sim.unit(member).unwrap().orders().is_empty());
            assert!(close(sim.world.position(member).unwrap(), slot));
            assert_eq!(sim.world.entity(member).unwrap().control_group, member);
        }
    }

    #[test]
    fn attack_order_is_relayed_and_the_controller_disbands() {
        let mut sim = pair();
        let (a, b, enemy) = (EntityId(1), EntityId(2), EntityId(3));
        let controller = sim.form_formation(&[a, b]).unwrap();

        sim.command(controller, Command::Attack(enemy), false).unwrap();
        assert!(sim.unit(controller).unwrap().is_disbanded());
        for member in [a, b] {
            let unit = sim.unit(member).unwrap();
            assert!(unit.is_in("INDIVIDUAL.COMBAT"));
            assert_eq!(unit.current_order(), Some(&Order::Attack { target: enemy }));
            assert_eq!(unit.formation_controller(), None);
        }

        // Orders to a disbanded controller go nowhere.
        sim.command(controller, Command::Walk(Point::new(5.0, 5.0)), false).unwrap();
        assert!(sim.unit(controller).unwrap().orders().is_empty());

        run(&mut sim, 1);
        assert!(sim.unit(controller).is_none());
    }

    #[test]
    fn only_units_can_form_up() {
        let mut sim = SimBuilder::new(config(10))
            .spawn("infantry", P1, Point::default())
            .spawn("tree", PlayerId::GAIA, Point::default())
            .build()
            .unwrap();
        assert!(matches!(sim.form_formation(&[EntityId(1), EntityId(2)]), Err(SimError::NotAUnit(EntityId(2)))));
        assert!(matches!(sim.form_formation(&[]), Err(SimError::Config(_))));
    }
}

// ── Turn loop ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod loop_tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        starts:  Vec<(u64, SimTime)>,
        removed: usize,
        ended:   Option<u64>,
    }

    impl SimObserver for Recorder {
        fn on_turn_start(&mut self, turn: u64, now: SimTime) {
            self.starts.push((turn, now));
        }
        fn on_turn_end(&mut self, _turn: u64, stats: &TurnStats, _world: &SimWorld) {
            self.removed += stats.removed;
        }
        fn on_sim_end(&mut self, turns: u64, _world: &SimWorld) {
            self.ended = Some(turns);
        }
    }

    #[test]
    fn run_stops_at_total_turns_and_reports() {
        let mut sim = SimBuilder::new(config(5)).spawn("worker", P1, Point::default()).build().unwrap();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();

        assert_eq!(rec.starts.len(), 5);
        assert_eq!(rec.starts[2], (2, SimTime(400)));
        assert_eq!(rec.ended, Some(5));
        assert_eq!(sim.clock.turn, 5);
    }

    #[test]
    fn run_turns_ignores_total_turns() {
        let mut sim = SimBuilder::new(config(2)).build().unwrap();
        run(&mut sim, 4);
        assert_eq!(sim.clock.turn, 4);
    }

    #[test]
    fn identical_inputs_give_identical_runs() {
        let snapshot = || {
            let mut sim = SimBuilder::new(config(80))
                .spawn("infantry", P1, Point::new(0.0, 0.0))
                .spawn("archer", P1, Point::new(3.0, 2.0))
                .spawn("cavalry", P2, Point::new(35.0, 4.0))
                .spawn("worker", P2, Point::new(30.0, -3.0))
                .build()
                .unwrap();
            sim.run(&mut NoopObserver).unwrap();
            sim.world
                .ids()
                .into_iter()
                .map(|id| (id, sim.world.position(id), sim.world.hitpoints(id)))
                .collect::<Vec<_>>()
        };
        assert_eq!(snapshot(), snapshot());
    }

    #[test]
    fn observer_sees_removals() {
        let mut sim = SimBuilder::new(config(150))
            .spawn("cavalry", P1, Point::new(0.0, 0.0))
            .spawn("worker", P2, Point::new(10.0, 0.0))
            .build()
            .unwrap();
        let mut rec = Recorder::default();
        sim.run(&mut rec).unwrap();
        assert_eq!(rec.removed, 1);
        assert!(sim.world.entity(EntityId(2)).is_none());
    }
}

// ── Scenario loader ───────────────────────────────────────────────────────────

#[cfg(test)]
mod scenario_loader_tests {
    use super::*;

    #[test]
    fn loads_rows_with_and_without_stance() {
        let csv = "template,owner,x,z,stance\n\
                   infantry,1,0,0,holdfire\n\
                   tree,0,10.5,-2,\n";
        let spawns = load_scenario_reader(csv.as_bytes()).unwrap();
        assert_eq!(spawns.len(), 2);
        assert_eq!(spawns[0].stance, Some(uai_behavior::Stance::HoldFire));
        assert_eq!(spawns[1].template, "tree");
        assert_eq!(spawns[1].owner, PlayerId::GAIA);
        assert_eq!(spawns[1].position, Point::new(10.5, -2.0));
        assert_eq!(spawns[1].stance, None);
    }

    #[test]
    fn stance_column_is_optional() {
        let spawns = load_scenario_reader("template,owner,x,z\nworker,2,1,1\n".as_bytes()).unwrap();
        assert_eq!(spawns[0].owner, P2);
        assert_eq!(spawns[0].stance, None);
    }

    #[test]
    fn bad_stance_names_the_row() {
        let csv = "template,owner,x,z,stance\ninfantry,1,0,0,\ninfantry,1,0,0,berserk\n";
        let err = load_scenario_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, SimError::Scenario { row: 3, .. }));
    }

    #[test]
    fn malformed_numbers_are_csv_errors() {
        let err = load_scenario_reader("template,owner,x,z\ninfantry,one,0,0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, SimError::Csv(_)));
    }

    #[test]
    fn loads_from_file_and_builds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "template,owner,x,z,stance").unwrap();
        writeln!(file, "worker,1,0,0,aggressive").unwrap();
        writeln!(file, "stone,0,6,0,").unwrap();
        file.flush().unwrap();

        let spawns = load_scenario_csv(file.path()).unwrap();
        let sim = SimBuilder::new(config(10)).spawns(spawns).build().unwrap();
        assert_eq!(sim.world.len(), 2);
        assert!(sim.unit(EntityId(1)).is_some());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_scenario_csv(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, SimError::Io(_)));
    }
}
