//! The per-agent side of the engine: the `Machine` trait an agent implements,
//! the `FsmState` it embeds, and the hook signatures state tables use.

use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;

use crate::{FsmError, StateId};

// ── Message ───────────────────────────────────────────────────────────────────

/// A typed message with a discriminant used for handler lookup.
///
/// `Kind` is what state tables are keyed by: an `Order(Attack)` message and an
/// `Order(Walk)` message are different kinds even though they share a variant.
pub trait Message {
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

// ── Machine ───────────────────────────────────────────────────────────────────

/// An agent driven by a [`StateTree`](crate::StateTree).
///
/// The agent owns its [`FsmState`]; the tree is shared and immutable.  `Env`
/// is whatever the handlers need besides the agent itself, typically the
/// world's collaborator services, passed by `&mut` for the duration of one
/// dispatch.
pub trait Machine: Sized + 'static {
    type Env: ?Sized;
    type Message: Message;
    type Error: From<FsmError>;

    fn fsm(&self) -> &FsmState<Self::Message>;
    fn fsm_mut(&mut self) -> &mut FsmState<Self::Message>;
}

/// Message handler.  Runs exactly once per resolved dispatch.
pub type Handler<M> = fn(
    &mut M,
    &mut <M as Machine>::Env,
    &<M as Machine>::Message,
) -> Result<(), <M as Machine>::Error>;

/// `enter` lifecycle hook.
pub type EnterHook<M> =
    fn(&mut M, &mut <M as Machine>::Env) -> Result<EnterOutcome, <M as Machine>::Error>;

/// `leave` lifecycle hook.
pub type LeaveHook<M> = fn(&mut M, &mut <M as Machine>::Env) -> Result<(), <M as Machine>::Error>;

/// What an `enter` hook did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EnterOutcome {
    /// The hook requested another transition; the engine abandons the rest of
    /// the current entry chain and applies it.
    Transitioning,
    /// The hook ran and the state is now active.
    Entered,
    /// The hook had nothing to do for this agent (a capability it drives is
    /// missing).  The state is still active.
    NotApplicable,
}

// ── FsmState ──────────────────────────────────────────────────────────────────

/// Per-agent engine bookkeeping.
///
/// Only the engine moves `current`; handlers interact through
/// [`set_next_state`](Self::set_next_state) and [`defer`](Self::defer).
pub struct FsmState<Msg> {
    pub(crate) current:  Option<StateId>,
    pub(crate) pending:  Option<&'static str>,
    /// The pending transition re-enters its target even when already there.
    pub(crate) reenter:  bool,
    pub(crate) deferred: VecDeque<Msg>,
    /// Nesting level of handler/hook execution.  Zero means "outside any
    /// dispatch"; only that level applies transitions.
    pub(crate) depth:    u32,
    pub(crate) draining: bool,
}

impl<Msg> FsmState<Msg> {
    pub fn new() -> Self {
        Self {
            current:  None,
            pending:  None,
            reenter:  false,
            deferred: VecDeque::new(),
            depth:    0,
            draining: false,
        }
    }

    /// The active leaf state, or `None` before init.
    #[inline]
    pub fn current(&self) -> Option<StateId> {
        self.current
    }

    /// Request a transition once the running handler returns.
    ///
    /// `path` may be absolute or relative to any ancestor of the current state
    /// (see [`StateTree::resolve_target`](crate::StateTree::resolve_target)).
    /// A second request before the first is applied replaces it.
    pub fn set_next_state(&mut self, path: &'static str) {
        if let Some(previous) = self.pending.replace(path) {
            tracing::trace!(previous, next = path, "pending transition overwritten");
        }
        self.reenter = false;
    }

    /// Like [`set_next_state`](Self::set_next_state), but when the target is
    /// the current state or one of its ancestors, that state is left and
    /// entered again instead of the request being a no-op.
    pub fn set_next_state_reentering(&mut self, path: &'static str) {
        self.set_next_state(path);
        self.reenter = true;
    }

    /// Queue `msg` for re-delivery after the current dispatch settles.
    pub fn defer(&mut self, msg: Msg) {
        self.deferred.push_back(msg);
    }

    #[inline]
    pub fn has_pending_transition(&self) -> bool {
        self.pending.is_some()
    }

    #[inline]
    pub fn pending_transition(&self) -> Option<&'static str> {
        self.pending
    }

    #[inline]
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// `true` while a handler or hook of this agent is running.
    #[inline]
    pub fn is_dispatching(&self) -> bool {
        self.depth > 0
    }
}

impl<Msg> Default for FsmState<Msg> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Msg> fmt::Debug for FsmState<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsmState")
            .field("current", &self.current)
            .field("pending", &self.pending)
            .field("reenter", &self.reenter)
            .field("deferred", &self.deferred.len())
            .field("depth", &self.depth)
            .finish()
    }
}
