//! Static state tree: nodes, handler tables, and the builder that validates
//! them.
//!
//! # Layout
//!
//! Nodes live in one `Vec` indexed by `StateId`; node 0 is the root with the
//! empty path `""`.  Every other node is identified by its dotted path
//! (`INDIVIDUAL.COMBAT.ATTACKING`) and points at its parent.  Handler lookup
//! walks parent pointers from the leaf, so the cost is bounded by the tree
//! depth and nothing is copied into descendants.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::{EnterHook, FsmError, FsmResult, Handler, LeaveHook, Machine, Message};

type Kind<M> = <<M as Machine>::Message as Message>::Kind;

// ── StateId ───────────────────────────────────────────────────────────────────

/// Index of a node in a [`StateTree`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct StateId(pub u16);

impl StateId {
    pub const ROOT: StateId = StateId(0);

    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateId({})", self.0)
    }
}

// ── StateNode ─────────────────────────────────────────────────────────────────

/// One state: its handler table and lifecycle hooks.
pub struct StateNode<M: Machine> {
    pub(crate) path:     String,
    pub(crate) parent:   Option<StateId>,
    pub(crate) depth:    u16,
    pub(crate) handlers: Vec<(Kind<M>, Handler<M>)>,
    pub(crate) enter:    Option<EnterHook<M>>,
    pub(crate) leave:    Option<LeaveHook<M>>,
}

impl<M: Machine> StateNode<M> {
    fn new(path: String, parent: Option<StateId>, depth: u16) -> Self {
        Self { path, parent, depth, handlers: Vec::new(), enter: None, leave: None }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    /// Handler declared on this node itself (no ancestor fallback).
    #[inline]
    pub fn own_handler(&self, kind: Kind<M>) -> Option<Handler<M>> {
        self.handlers.iter().find(|(k, _)| *k == kind).map(|&(_, h)| h)
    }
}

// ── StateTree ─────────────────────────────────────────────────────────────────

/// Immutable, shareable state tree.  Build with [`StateTreeBuilder`].
///
/// The dispatch and transition engine lives in `engine.rs` as further
/// `impl StateTree` blocks.
pub struct StateTree<M: Machine> {
    pub(crate) nodes: Vec<StateNode<M>>,
    pub(crate) index: FxHashMap<String, StateId>,
}

impl<M: Machine> StateTree<M> {
    /// Number of states including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Exact (absolute) path lookup.
    pub fn lookup(&self, path: &str) -> Option<StateId> {
        self.index.get(path).copied()
    }

    pub fn node(&self, id: StateId) -> &StateNode<M> {
        &self.nodes[id.index()]
    }

    pub fn path(&self, id: StateId) -> &str {
        &self.nodes[id.index()].path
    }

    /// `id` followed by each of its ancestors up to and including the root.
    pub fn ancestors(&self, id: StateId) -> impl Iterator<Item = StateId> + '_ {
        std::iter::successors(Some(id), move |n| self.nodes[n.index()].parent)
    }

    /// Deepest state that is an ancestor of (or equal to) both `a` and `b`.
    pub fn common_ancestor(&self, mut a: StateId, mut b: StateId) -> StateId {
        while self.nodes[a.index()].depth > self.nodes[b.index()].depth {
            a = self.nodes[a.index()].parent.unwrap_or(StateId::ROOT);
        }
        while self.nodes[b.index()].depth > self.nodes[a.index()].depth {
            b = self.nodes[b.index()].parent.unwrap_or(StateId::ROOT);
        }
        while a != b {
            a = self.nodes[a.index()].parent.unwrap_or(StateId::ROOT);
            b = self.nodes[b.index()].parent.unwrap_or(StateId::ROOT);
        }
        a
    }

    /// Find the handler for `kind`, searching `state` first and then each
    /// ancestor.  Returns the node that declared it alongside the handler.
    pub fn resolve_handler(&self, state: StateId, kind: Kind<M>) -> Option<(StateId, Handler<M>)> {
        self.ancestors(state)
            .find_map(|id| self.nodes[id.index()].own_handler(kind).map(|h| (id, h)))
    }

    /// Resolve a transition target named relative to `from`.
    ///
    /// `name` is tried under `from`'s parent, then under each further
    /// ancestor, and finally as an absolute path.  So from
    /// `INDIVIDUAL.COMBAT.APPROACHING`, `"ATTACKING"` finds
    /// `INDIVIDUAL.COMBAT.ATTACKING` and `"IDLE"` finds `INDIVIDUAL.IDLE`.
    pub fn resolve_target(&self, from: StateId, name: &str) -> FsmResult<StateId> {
        if name.is_empty() {
            return Err(FsmError::UnknownState(String::new()));
        }
        for base in self.ancestors(from).skip(1).chain(std::iter::once(StateId::ROOT)) {
            let found = if base == StateId::ROOT {
                self.lookup(name)
            } else {
                self.lookup(&format!("{}.{}", self.path(base), name))
            };
            if let Some(id) = found {
                return Ok(id);
            }
        }
        Err(FsmError::UnknownState(name.to_owned()))
    }

    /// The states strictly below `ancestor` on the way down to `leaf`, in
    /// top-down order.
    pub(crate) fn chain_below(&self, ancestor: StateId, leaf: StateId) -> Vec<StateId> {
        let mut chain: Vec<StateId> = self.ancestors(leaf).take_while(|&n| n != ancestor).collect();
        chain.reverse();
        chain
    }

    /// Current leaf path of `machine`, or `None` before init.
    pub fn current_path<'t>(&'t self, machine: &M) -> Option<&'t str> {
        machine.fsm().current.map(|id| self.path(id))
    }

    /// `true` if `machine`'s current state is `path` or lies beneath it.
    pub fn is_in(&self, machine: &M, path: &str) -> bool {
        match (machine.fsm().current, self.lookup(path)) {
            (Some(current), Some(target)) => self.ancestors(current).any(|n| n == target),
            _ => false,
        }
    }
}

// ── StateTreeBuilder ──────────────────────────────────────────────────────────

/// Declare states parent-first, then call [`build`](Self::build).
///
/// Mistakes (duplicate paths, undeclared parents, two handlers for the same
/// message kind on one state) are recorded and reported by `build`, so a
/// table can be written as one straight chain of calls.
///
/// ```ignore
/// let mut b = StateTreeBuilder::<Unit>::new();
/// b.root().on(Kind::Attacked, ignore);
/// b.state("INDIVIDUAL").on(Kind::Attacked, retaliate);
/// b.state("INDIVIDUAL.IDLE").enter(idle_enter).leave(idle_leave);
/// let tree = b.build()?;
/// ```
pub struct StateTreeBuilder<M: Machine> {
    nodes: Vec<StateNode<M>>,
    index: FxHashMap<String, StateId>,
    error: Option<FsmError>,
}

impl<M: Machine> StateTreeBuilder<M> {
    pub fn new() -> Self {
        let mut index = FxHashMap::default();
        index.insert(String::new(), StateId::ROOT);
        Self {
            nodes: vec![StateNode::new(String::new(), None, 0)],
            index,
            error: None,
        }
    }

    /// Configure the root state (global default handlers).
    pub fn root(&mut self) -> StateBuilder<'_, M> {
        StateBuilder { builder: self, id: Some(StateId::ROOT) }
    }

    /// Declare the state at `path`.  Its parent must already be declared.
    pub fn state(&mut self, path: &str) -> StateBuilder<'_, M> {
        let id = self.declare(path);
        StateBuilder { builder: self, id }
    }

    fn declare(&mut self, path: &str) -> Option<StateId> {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            self.record(FsmError::UnknownState(path.to_owned()));
            return None;
        }
        if self.index.contains_key(path) {
            self.record(FsmError::DuplicateState(path.to_owned()));
            return None;
        }
        let parent_path = path.rsplit_once('.').map_or("", |(p, _)| p);
        let Some(&parent) = self.index.get(parent_path) else {
            self.record(FsmError::MissingParent(path.to_owned()));
            return None;
        };
        let Ok(raw) = u16::try_from(self.nodes.len()) else {
            self.record(FsmError::TooManyStates(u16::MAX as usize));
            return None;
        };
        let id = StateId(raw);
        let depth = self.nodes[parent.index()].depth + 1;
        self.nodes.push(StateNode::new(path.to_owned(), Some(parent), depth));
        self.index.insert(path.to_owned(), id);
        Some(id)
    }

    fn record(&mut self, err: FsmError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Validate and freeze the tree.
    pub fn build(self) -> FsmResult<StateTree<M>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(StateTree { nodes: self.nodes, index: self.index })
    }
}

impl<M: Machine> Default for StateTreeBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Chained configuration of one declared state.
pub struct StateBuilder<'b, M: Machine> {
    builder: &'b mut StateTreeBuilder<M>,
    /// `None` when the declaration failed; further calls are ignored and the
    /// builder reports the original error.
    id: Option<StateId>,
}

impl<M: Machine> StateBuilder<'_, M> {
    /// Handle messages of `kind` in this state and, unless overridden, in
    /// every descendant.
    pub fn on(self, kind: Kind<M>, handler: Handler<M>) -> Self {
        if let Some(id) = self.id {
            let node = &mut self.builder.nodes[id.index()];
            if node.own_handler(kind).is_some() {
                let err = FsmError::DuplicateHandler {
                    state: node.path.clone(),
                    kind:  format!("{kind:?}"),
                };
                self.builder.record(err);
            } else {
                node.handlers.push((kind, handler));
            }
        }
        self
    }

    pub fn enter(self, hook: EnterHook<M>) -> Self {
        if let Some(id) = self.id {
            self.builder.nodes[id.index()].enter = Some(hook);
        }
        self
    }

    pub fn leave(self, hook: LeaveHook<M>) -> Self {
        if let Some(id) = self.id {
            self.builder.nodes[id.index()].leave = Some(hook);
        }
        self
    }
}
