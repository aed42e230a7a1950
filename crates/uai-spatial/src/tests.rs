//! Unit tests for uai-spatial.

#[cfg(test)]
mod fixture {
    use uai_core::{EntityId, PlayerId, Point};

    use crate::Tracked;

    pub fn unit(id: u32, owner: u32, x: f32, z: f32) -> Tracked {
        Tracked {
            id:              EntityId(id),
            pos:             Point::new(x, z),
            owner:           PlayerId(owner),
            damage_receiver: true,
            resource_supply: false,
        }
    }

    pub fn tree(id: u32, x: f32, z: f32) -> Tracked {
        Tracked {
            id:              EntityId(id),
            pos:             Point::new(x, z),
            owner:           PlayerId::GAIA,
            damage_receiver: false,
            resource_supply: true,
        }
    }
}

#[cfg(test)]
mod index {
    use uai_core::{EntityId, PlayerId, Point, QueryFilter, RangeBand};

    use super::fixture::{tree, unit};
    use crate::{QuerySpec, RangeIndex};

    fn spec(source: u32, max: f32, owners: &[u32]) -> QuerySpec {
        QuerySpec {
            source: EntityId(source),
            band:   RangeBand::within(max),
            owners: owners.iter().map(|&p| PlayerId(p)).collect(),
            filter: QueryFilter::DamageReceiver,
        }
    }

    #[test]
    fn query_sorted_nearest_first_excluding_source() {
        let idx = RangeIndex::build(vec![
            unit(1, 1, 0.0, 0.0),
            unit(2, 2, 8.0, 0.0),
            unit(3, 2, 3.0, 0.0),
            unit(4, 2, 50.0, 0.0),
        ]);
        let hits = idx.query(Point::new(0.0, 0.0), &spec(1, 10.0, &[1, 2]));
        assert_eq!(hits, vec![EntityId(3), EntityId(2)]);
    }

    #[test]
    fn query_filters_by_owner_and_kind() {
        let idx = RangeIndex::build(vec![
            unit(1, 1, 0.0, 0.0),
            unit(2, 1, 1.0, 0.0),
            unit(3, 2, 2.0, 0.0),
            tree(4, 1.0, 1.0),
        ]);
        let hits = idx.query(Point::new(0.0, 0.0), &spec(1, 10.0, &[2]));
        assert_eq!(hits, vec![EntityId(3)]);
    }

    #[test]
    fn band_minimum_excludes_close_entries() {
        let idx = RangeIndex::build(vec![unit(2, 2, 1.0, 0.0), unit(3, 2, 6.0, 0.0)]);
        let ids: Vec<_> = idx
            .within(Point::new(0.0, 0.0), RangeBand::new(2.0, 10.0))
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![EntityId(3)]);
    }

    #[test]
    fn nearest_where_respects_radius() {
        let idx = RangeIndex::build(vec![tree(1, 5.0, 0.0), tree(2, 30.0, 0.0), unit(3, 1, 1.0, 0.0)]);
        let c = Point::new(0.0, 0.0);
        assert_eq!(idx.nearest_where(c, 64.0, |t| t.resource_supply), Some(EntityId(1)));
        assert_eq!(idx.nearest_where(c, 64.0, |t| t.id == EntityId(2)), Some(EntityId(2)));
        assert_eq!(idx.nearest_where(c, 10.0, |t| t.id == EntityId(2)), None);
    }

    #[test]
    fn empty_index() {
        let idx = RangeIndex::new();
        assert!(idx.is_empty());
        assert!(idx.query(Point::default(), &spec(1, 100.0, &[1])).is_empty());
    }
}

#[cfg(test)]
mod registry {
    use uai_core::{EntityId, PlayerId, Point, QueryFilter, QueryId, RangeBand};

    use super::fixture::unit;
    use crate::{QueryRegistry, QuerySpec, RangeIndex, SpatialError};

    fn los(source: u32) -> QuerySpec {
        QuerySpec {
            source: EntityId(source),
            band:   RangeBand::within(10.0),
            owners: vec![PlayerId(2)],
            filter: QueryFilter::DamageReceiver,
        }
    }

    fn origin(_: EntityId) -> Option<Point> {
        Some(Point::new(0.0, 0.0))
    }

    #[test]
    fn disabled_query_reports_nothing() {
        let mut reg = QueryRegistry::new();
        let q = reg.create(los(1));
        assert!(!reg.is_enabled(q));
        let idx = RangeIndex::build(vec![unit(2, 2, 1.0, 0.0)]);
        assert!(reg.update(&idx, origin).is_empty());
    }

    #[test]
    fn update_reports_added_then_removed() {
        let mut reg = QueryRegistry::new();
        let q = reg.create(los(1));
        reg.enable(q).unwrap();

        let idx = RangeIndex::build(vec![unit(2, 2, 1.0, 0.0)]);
        let ups = reg.update(&idx, origin);
        assert_eq!(ups.len(), 1);
        assert_eq!(ups[0].query, q);
        assert_eq!(ups[0].added, vec![EntityId(2)]);
        assert!(ups[0].removed.is_empty());

        // Unchanged: no report.
        assert!(reg.update(&idx, origin).is_empty());

        let idx = RangeIndex::build(vec![unit(2, 2, 20.0, 0.0)]);
        let ups = reg.update(&idx, origin);
        assert_eq!(ups[0].removed, vec![EntityId(2)]);
        assert!(ups[0].added.is_empty());
    }

    #[test]
    fn reset_returns_current_and_suppresses_duplicate_add() {
        let mut reg = QueryRegistry::new();
        let q = reg.create(los(1));
        let idx = RangeIndex::build(vec![unit(2, 2, 4.0, 0.0), unit(3, 2, 2.0, 0.0)]);
        let now = reg.reset(q, &idx, origin).unwrap();
        assert_eq!(now, vec![EntityId(3), EntityId(2)]);
        assert!(reg.is_enabled(q));
        assert!(reg.update(&idx, origin).is_empty());
    }

    #[test]
    fn reset_requires_source_in_world() {
        let mut reg = QueryRegistry::new();
        let q = reg.create(los(1));
        let idx = RangeIndex::new();
        assert_eq!(reg.reset(q, &idx, |_| None), Err(SpatialError::SourceNotInWorld(EntityId(1))));
    }

    #[test]
    fn unknown_query_errors() {
        let mut reg = QueryRegistry::new();
        assert_eq!(reg.enable(QueryId(9)), Err(SpatialError::UnknownQuery(QueryId(9))));
        assert!(!reg.destroy(QueryId(9)));
    }

    #[test]
    fn destroy_source_removes_its_queries() {
        let mut reg = QueryRegistry::new();
        reg.create(los(1));
        reg.create(los(1));
        let keep = reg.create(los(2));
        assert_eq!(reg.destroy_source(EntityId(1)), 2);
        assert_eq!(reg.len(), 1);
        assert!(reg.spec(keep).is_some());
    }
}
