//! Orders and the per-unit order queue.

use std::collections::VecDeque;
use std::fmt;

use uai_core::{EntityId, Point, ResourceType};

/// One queued command.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Order {
    Walk { to: Point },
    WalkToTarget { target: EntityId },
    Attack { target: EntityId },
    /// `resource` is captured when the order is issued so a replacement of
    /// the same kind can be found even after the target is exhausted.
    Gather { target: EntityId, resource: ResourceType },
    Repair { target: EntityId },
    Garrison { target: EntityId },
    /// Relayed by a formation controller: keep `offset` from `controller`.
    FormationWalk { controller: EntityId, offset: Point },
}

/// Discriminant of [`Order`], used as part of a message kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrderKind {
    Walk,
    WalkToTarget,
    Attack,
    Gather,
    Repair,
    Garrison,
    FormationWalk,
}

impl Order {
    pub fn kind(&self) -> OrderKind {
        match self {
            Order::Walk { .. } => OrderKind::Walk,
            Order::WalkToTarget { .. } => OrderKind::WalkToTarget,
            Order::Attack { .. } => OrderKind::Attack,
            Order::Gather { .. } => OrderKind::Gather,
            Order::Repair { .. } => OrderKind::Repair,
            Order::Garrison { .. } => OrderKind::Garrison,
            Order::FormationWalk { .. } => OrderKind::FormationWalk,
        }
    }

    /// The entity this order is aimed at, if any.
    pub fn target(&self) -> Option<EntityId> {
        match *self {
            Order::WalkToTarget { target }
            | Order::Attack { target }
            | Order::Gather { target, .. }
            | Order::Repair { target }
            | Order::Garrison { target } => Some(target),
            Order::Walk { .. } | Order::FormationWalk { .. } => None,
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Walk { to } => write!(f, "Walk {to}"),
            Order::FormationWalk { controller, offset } => {
                write!(f, "FormationWalk {controller} {offset}")
            }
            Order::Gather { target, resource } => write!(f, "Gather {target} ({resource})"),
            other => match other.target() {
                Some(target) => write!(f, "{} {target}", other.kind()),
                None => write!(f, "{}", other.kind()),
            },
        }
    }
}

// ── OrderQueue ────────────────────────────────────────────────────────────────

/// Pending orders; the head is the one being executed.
///
/// The queue only stores.  Dispatching the head's handler is the unit's job
/// (see `UnitAi::push_order` and friends).
#[derive(Clone, Debug, Default)]
pub struct OrderQueue {
    inner: VecDeque<Order>,
}

impl OrderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append.  Returns `true` if `order` became the head.
    pub fn push_back(&mut self, order: Order) -> bool {
        self.inner.push_back(order);
        self.inner.len() == 1
    }

    pub fn push_front(&mut self, order: Order) {
        self.inner.push_front(order);
    }

    pub fn pop_front(&mut self) -> Option<Order> {
        self.inner.pop_front()
    }

    /// Drop the first queued order equal to `order`.  Returns whether one was
    /// found.
    pub fn remove(&mut self, order: &Order) -> bool {
        match self.inner.iter().position(|o| o == order) {
            Some(at) => self.inner.remove(at).is_some(),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    #[inline]
    pub fn head(&self) -> Option<&Order> {
        self.inner.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> + '_ {
        self.inner.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
