//! Active range queries: standing subscriptions that report which matching
//! entities entered or left range since the previous update.

use std::collections::BTreeMap;

use uai_core::{EntityId, Point, QueryId};

use crate::{QuerySpec, RangeIndex, SpatialError, SpatialResult};

/// Entities that entered or left one query's range during an update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeUpdate {
    pub query:   QueryId,
    pub source:  EntityId,
    /// Nearest first.
    pub added:   Vec<EntityId>,
    /// Ascending id order.
    pub removed: Vec<EntityId>,
}

struct ActiveQuery {
    spec:    QuerySpec,
    enabled: bool,
    /// Matches reported so far, sorted by id.
    last:    Vec<EntityId>,
}

/// All active queries, iterated in creation order.
#[derive(Default)]
pub struct QueryRegistry {
    next_id: u32,
    queries: BTreeMap<QueryId, ActiveQuery>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a disabled query.
    pub fn create(&mut self, spec: QuerySpec) -> QueryId {
        let id = QueryId(self.next_id);
        self.next_id += 1;
        tracing::trace!(query = %id, source = %spec.source, range = spec.band.max, "range query created");
        self.queries.insert(id, ActiveQuery { spec, enabled: false, last: Vec::new() });
        id
    }

    pub fn enable(&mut self, id: QueryId) -> SpatialResult<()> {
        self.get_mut(id)?.enabled = true;
        Ok(())
    }

    /// Stop reporting updates.  What was last reported is kept, so a later
    /// `enable` diffs against it.
    pub fn disable(&mut self, id: QueryId) -> SpatialResult<()> {
        self.get_mut(id)?.enabled = false;
        Ok(())
    }

    /// Remove a query.  Returns `false` if it did not exist.
    pub fn destroy(&mut self, id: QueryId) -> bool {
        self.queries.remove(&id).is_some()
    }

    /// Remove every query whose source is `source`.
    pub fn destroy_source(&mut self, source: EntityId) -> usize {
        let before = self.queries.len();
        self.queries.retain(|_, q| q.spec.source != source);
        before - self.queries.len()
    }

    /// Enable `id` and return everything currently in range, nearest first.
    /// Later updates report changes relative to this result.
    pub fn reset(
        &mut self,
        id: QueryId,
        index: &RangeIndex,
        position_of: impl Fn(EntityId) -> Option<Point>,
    ) -> SpatialResult<Vec<EntityId>> {
        let q = self.queries.get_mut(&id).ok_or(SpatialError::UnknownQuery(id))?;
        let center = position_of(q.spec.source).ok_or(SpatialError::SourceNotInWorld(q.spec.source))?;
        let hits = index.query(center, &q.spec);
        let mut sorted = hits.clone();
        sorted.sort_unstable();
        q.last = sorted;
        q.enabled = true;
        Ok(hits)
    }

    /// Diff every enabled query against `index`.  Queries whose source is not
    /// in the world report everything as removed.
    pub fn update(
        &mut self,
        index: &RangeIndex,
        position_of: impl Fn(EntityId) -> Option<Point>,
    ) -> Vec<RangeUpdate> {
        let mut updates = Vec::new();
        for (&id, q) in self.queries.iter_mut().filter(|(_, q)| q.enabled) {
            let hits = match position_of(q.spec.source) {
                Some(center) => index.query(center, &q.spec),
                None => Vec::new(),
            };
            let mut now: Vec<EntityId> = hits.clone();
            now.sort_unstable();

            let added: Vec<EntityId> =
                hits.into_iter().filter(|e| q.last.binary_search(e).is_err()).collect();
            let removed: Vec<EntityId> =
                q.last.iter().copied().filter(|e| now.binary_search(e).is_err()).collect();
            q.last = now;

            if !added.is_empty() || !removed.is_empty() {
                updates.push(RangeUpdate { query: id, source: q.spec.source, added, removed });
            }
        }
        updates
    }

    pub fn is_enabled(&self, id: QueryId) -> bool {
        self.queries.get(&id).is_some_and(|q| q.enabled)
    }

    pub fn spec(&self, id: QueryId) -> Option<&QuerySpec> {
        self.queries.get(&id).map(|q| &q.spec)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    fn get_mut(&mut self, id: QueryId) -> SpatialResult<&mut ActiveQuery> {
        self.queries.get_mut(&id).ok_or(SpatialError::UnknownQuery(id))
    }
}
