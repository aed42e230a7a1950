//! Unit tests for uai-core primitives.

#[cfg(test)]
mod ids {
    use crate::{EntityId, PlayerId, QueryId, TimerId};

    #[test]
    fn index_roundtrip() {
        let id = EntityId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(EntityId::try_from(42usize).unwrap(), id);
    }

    #[test]
    fn default_is_invalid() {
        assert_eq!(EntityId::default(), EntityId::INVALID);
        assert!(!TimerId::default().is_valid());
        assert!(QueryId(0).is_valid());
    }

    #[test]
    fn gaia_is_player_zero() {
        assert_eq!(PlayerId::GAIA, PlayerId(0));
    }

    #[test]
    fn display() {
        assert_eq!(EntityId(7).to_string(), "EntityId(7)");
    }
}

#[cfg(test)]
mod geo {
    use crate::{Point, RangeBand};

    #[test]
    fn distance_is_euclidean() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < 1e-6);
        assert!((a.distance_sq(b) - 25.0).abs() < 1e-6);
    }

    #[test]
    fn step_toward_stops_exactly_on_target() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        let mid = a.step_toward(b, 4.0);
        assert!((mid.x - 4.0).abs() < 1e-6);
        assert_eq!(mid.step_toward(b, 100.0), b);
    }

    #[test]
    fn step_toward_same_point() {
        let a = Point::new(1.0, 1.0);
        assert_eq!(a.step_toward(a, 2.0), a);
    }

    #[test]
    fn range_band_contains() {
        let band = RangeBand::new(2.0, 10.0);
        assert!(band.contains(2.0));
        assert!(band.contains(10.0));
        assert!(!band.contains(1.5));
        assert!(!band.contains(10.5));
        assert!(RangeBand::within(4.0).contains(0.0));
    }
}

#[cfg(test)]
mod time {
    use crate::{SimClock, SimConfig, SimTime};

    #[test]
    fn time_arithmetic() {
        let t = SimTime(1_000);
        assert_eq!(t + 500, SimTime(1_500));
        assert_eq!(t.offset(250), SimTime(1_250));
        assert_eq!(SimTime(1_500) - SimTime(1_000), 500u64);
        assert_eq!(SimTime(100).since(SimTime(400)), 0);
        assert_eq!(SimTime(100) - SimTime(400), 0u64);
    }

    #[test]
    fn clock_advances_by_turn_length() {
        let mut clock = SimClock::new(200);
        assert_eq!(clock.now(), SimTime::ZERO);
        assert_eq!(clock.advance(), SimTime(200));
        assert_eq!(clock.advance(), SimTime(400));
        assert_eq!(clock.turn, 2);
        assert!((clock.turn_secs() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn turns_for_ms_rounds_up() {
        let clock = SimClock::new(200);
        assert_eq!(clock.turns_for_ms(1_000), 5);
        assert_eq!(clock.turns_for_ms(1_001), 6);
    }

    #[test]
    fn config_end_time_and_validation() {
        let cfg = SimConfig { turn_length_ms: 200, total_turns: 50, seed: 1 };
        assert_eq!(cfg.end_time(), SimTime(10_000));
        assert!(cfg.validate().is_ok());

        let bad = SimConfig { turn_length_ms: 0, ..cfg };
        assert!(bad.validate().is_err());
    }
}

#[cfg(test)]
mod resource {
    use crate::ResourceType;

    #[test]
    fn parse_generic_specific() {
        let r: ResourceType = "food.meat".parse().unwrap();
        assert_eq!(r, ResourceType::new("food", "meat"));
        assert_eq!(r.to_string(), "food.meat");
    }

    #[test]
    fn parse_rejects_missing_part() {
        assert!("wood".parse::<ResourceType>().is_err());
        assert!(".tree".parse::<ResourceType>().is_err());
    }
}

#[cfg(test)]
mod rng {
    use crate::{PlayerId, Point, SimRng};

    #[test]
    fn deterministic_same_seed() {
        let mut a = SimRng::new(12345);
        let mut b = SimRng::new(12345);
        for _ in 0..50 {
            let x: u32 = a.gen_range(0..1000);
            let y: u32 = b.gen_range(0..1000);
            assert_eq!(x, y);
        }
    }

    #[test]
    fn scatter_stays_in_square() {
        let mut rng = SimRng::for_player(7, PlayerId(1));
        let c = Point::new(50.0, 50.0);
        for _ in 0..200 {
            let p = rng.scatter(c, 5.0);
            assert!((p.x - c.x).abs() <= 5.0 && (p.z - c.z).abs() <= 5.0);
        }
        assert_eq!(rng.scatter(c, 0.0), c);
    }
}
