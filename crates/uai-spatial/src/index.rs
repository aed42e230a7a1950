//! Point index over every positioned entity.
//!
//! # Rebuild model
//!
//! Units move every turn, so the index is rebuilt from scratch once per turn
//! with `RTree::bulk_load` (O(N log N)) rather than updated in place.  Queries
//! within a turn all see the same snapshot.

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use uai_core::{EntityId, PlayerId, Point, QueryFilter, RangeBand};

// ── R-tree entry ──────────────────────────────────────────────────────────────

/// One entity as seen by range queries.
#[derive(Clone, Debug, PartialEq)]
pub struct Tracked {
    pub id:              EntityId,
    pub pos:             Point,
    pub owner:           PlayerId,
    pub damage_receiver: bool,
    pub resource_supply: bool,
}

impl Tracked {
    #[inline]
    pub fn matches(&self, filter: QueryFilter) -> bool {
        match filter {
            QueryFilter::DamageReceiver => self.damage_receiver,
            QueryFilter::ResourceSupply => self.resource_supply,
        }
    }
}

impl RTreeObject for Tracked {
    type Envelope = AABB<[f32; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.pos.x, self.pos.z])
    }
}

impl PointDistance for Tracked {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = self.pos.x - point[0];
        let dz = self.pos.z - point[1];
        dx * dx + dz * dz
    }
}

// ── RangeIndex ────────────────────────────────────────────────────────────────

/// What a one-shot or active query asks for.
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySpec {
    /// Entity the query is centred on; never reported by its own query.
    pub source: EntityId,
    pub band:   RangeBand,
    /// Only entities owned by one of these players match.
    pub owners: Vec<PlayerId>,
    pub filter: QueryFilter,
}

impl QuerySpec {
    #[inline]
    fn accepts(&self, t: &Tracked) -> bool {
        t.id != self.source && t.matches(self.filter) && self.owners.contains(&t.owner)
    }
}

#[derive(Default)]
pub struct RangeIndex {
    tree: RTree<Tracked>,
}

impl RangeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load an index from a turn's snapshot of entities.
    pub fn build(entries: Vec<Tracked>) -> Self {
        Self { tree: RTree::bulk_load(entries) }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Every entry whose distance from `center` lies in `band`.
    pub fn within(&self, center: Point, band: RangeBand) -> impl Iterator<Item = &Tracked> + '_ {
        let c = [center.x, center.z];
        let min_sq = band.min * band.min;
        self.tree
            .locate_within_distance(c, band.max * band.max)
            .filter(move |t| t.distance_2(&c) >= min_sq)
    }

    /// Entities matching `spec` around `center`, nearest first.  Ties are
    /// broken by id so the order is deterministic.
    pub fn query(&self, center: Point, spec: &QuerySpec) -> Vec<EntityId> {
        let mut hits: Vec<(f32, EntityId)> = self
            .within(center, spec.band)
            .filter(|t| spec.accepts(t))
            .map(|t| (t.pos.distance_sq(center), t.id))
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter().map(|(_, id)| id).collect()
    }

    /// Nearest entry within `max` of `center` accepted by `pred`.
    pub fn nearest_where(
        &self,
        center: Point,
        max: f32,
        mut pred: impl FnMut(&Tracked) -> bool,
    ) -> Option<EntityId> {
        let max_sq = max * max;
        self.tree
            .nearest_neighbor_iter_with_distance_2(&[center.x, center.z])
            .take_while(|(_, d2)| *d2 <= max_sq)
            .find(|(t, _)| pred(t))
            .map(|(t, _)| t.id)
    }
}
