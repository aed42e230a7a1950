//! `uai-fsm`: a hierarchical finite-state-machine engine.
//!
//! A [`StateTree`] is a static, shared table of dotted-path states.  Each
//! agent implements [`Machine`] and embeds an [`FsmState`]; the tree drives
//! it.  Nothing here knows about units, orders or worlds.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                   |
//! |-------------|------------------------------------------------------------|
//! | [`machine`] | `Machine`, `Message`, `FsmState`, hook types, `EnterOutcome` |
//! | [`tree`]    | `StateId`, `StateNode`, `StateTree`, `StateTreeBuilder`    |
//! | `engine`    | `init`, `process_message` and the transition algorithm     |
//! | [`error`]   | `FsmError`, `FsmResult<T>`                                 |
//!
//! # Dispatch rules
//!
//! - A message is handled by the nearest state, from the current leaf up to
//!   the root, that declares a handler for its kind.  No handler: dropped.
//! - A handler requests at most one transition; a second request replaces
//!   the first.  It is applied after the handler returns.
//! - A transition runs `leave` hooks from the current leaf up to (not
//!   including) the common ancestor, then `enter` hooks down to the target.
//! - Deferred messages are re-delivered once all transitions have settled.

mod engine;
pub mod error;
pub mod machine;
pub mod tree;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{FsmError, FsmResult};
pub use machine::{EnterHook, EnterOutcome, FsmState, Handler, LeaveHook, Machine, Message};
pub use tree::{StateBuilder, StateId, StateNode, StateTree, StateTreeBuilder};
