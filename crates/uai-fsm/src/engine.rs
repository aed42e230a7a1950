//! Dispatch and transition engine.
//!
//! # Settling
//!
//! Handlers never move the machine directly.  They call
//! [`FsmState::set_next_state`](crate::FsmState::set_next_state) and return;
//! once the outermost dispatch finishes, the engine *settles*:
//!
//! ```text
//! 1. while a transition is pending:
//!        leave  current leaf .. (exclusive) common ancestor   (leaf-up)
//!        enter  just below common ancestor .. target          (top-down)
//!        an enter hook may redirect; the rest of its chain is abandoned
//!        a re-entering request treats the target's parent as the common
//!        ancestor when the target is already active
//! 2. drain one batch of deferred messages (each settles in turn)
//! ```
//!
//! Step 1 is bounded by the number of states in the tree.  Step 2 takes the
//! buffer as it stands; anything deferred while draining waits for the next
//! outermost dispatch.

use crate::{EnterOutcome, FsmError, Machine, Message, StateId, StateTree};

impl<M: Machine> StateTree<M> {
    /// Enter `initial`, running every `enter` hook from the root down.
    pub fn init(&self, machine: &mut M, env: &mut M::Env, initial: &str) -> Result<(), M::Error> {
        if machine.fsm().current.is_some() {
            return Err(FsmError::AlreadyInitialised.into());
        }
        let target = self
            .lookup(initial)
            .ok_or_else(|| FsmError::UnknownState(initial.to_owned()))?;

        let mut chain: Vec<StateId> = self.ancestors(target).collect();
        chain.reverse();
        tracing::trace!(state = initial, "init");
        self.enter_chain(machine, env, &chain)?;
        self.settle(machine, env)
    }

    /// Deliver `msg` to the first state, from the current leaf upwards, that
    /// handles its kind.
    ///
    /// Returns `Ok(false)` when nothing handles it; such messages are dropped.
    /// Transitions requested by the handler are applied before this returns,
    /// unless the call is nested inside another dispatch of the same machine,
    /// in which case the outer dispatch applies them.
    pub fn process_message(
        &self,
        machine: &mut M,
        env: &mut M::Env,
        msg: &M::Message,
    ) -> Result<bool, M::Error> {
        let current = machine.fsm().current.ok_or(FsmError::NotInitialised)?;
        let kind = msg.kind();

        let handled = match self.resolve_handler(current, kind) {
            Some((owner, handler)) => {
                tracing::trace!(state = self.path(current), handler = self.path(owner), ?kind, "dispatch");
                Self::nested(machine, |m| handler(m, env, msg))?;
                true
            }
            None => {
                tracing::trace!(state = self.path(current), ?kind, "unhandled message dropped");
                false
            }
        };

        if machine.fsm().depth == 0 {
            self.settle(machine, env)?;
        }
        Ok(handled)
    }

    /// Settle a transition requested outside any handler.
    ///
    /// Does nothing while a dispatch of `machine` is running; that dispatch
    /// settles when it returns.
    pub fn flush(&self, machine: &mut M, env: &mut M::Env) -> Result<(), M::Error> {
        if machine.fsm().current.is_none() {
            return Err(FsmError::NotInitialised.into());
        }
        if machine.fsm().depth > 0 {
            return Ok(());
        }
        self.settle(machine, env)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn nested<T>(
        machine: &mut M,
        f: impl FnOnce(&mut M) -> Result<T, M::Error>,
    ) -> Result<T, M::Error> {
        machine.fsm_mut().depth += 1;
        let result = f(machine);
        machine.fsm_mut().depth -= 1;
        result
    }

    fn settle(&self, machine: &mut M, env: &mut M::Env) -> Result<(), M::Error> {
        self.apply_transitions(machine, env)?;

        let fsm = machine.fsm_mut();
        if fsm.draining || fsm.deferred.is_empty() {
            return Ok(());
        }
        let mut batch = std::mem::take(&mut fsm.deferred);
        fsm.draining = true;

        let mut result = Ok(());
        while let Some(msg) = batch.pop_front() {
            if let Err(err) = self.process_message(machine, env, &msg) {
                result = Err(err);
                break;
            }
        }

        let fsm = machine.fsm_mut();
        fsm.draining = false;
        // Undelivered messages keep their place ahead of anything newer.
        while let Some(msg) = batch.pop_back() {
            fsm.deferred.push_front(msg);
        }
        result
    }

    fn apply_transitions(&self, machine: &mut M, env: &mut M::Env) -> Result<(), M::Error> {
        let limit = self.nodes.len();
        let mut hops = 0usize;

        while let Some(name) = machine.fsm_mut().pending.take() {
            let reenter = std::mem::take(&mut machine.fsm_mut().reenter);
            let current = machine.fsm().current.ok_or(FsmError::NotInitialised)?;
            if hops == limit {
                let state = self.path(current).to_owned();
                tracing::error!(state = %state, next = name, limit, "transition limit exceeded");
                return Err(FsmError::TransitionLimit { state, limit }.into());
            }
            hops += 1;

            let target = self.resolve_target(current, name)?;
            self.switch_to(machine, env, current, target, reenter)?;
        }
        Ok(())
    }

    fn switch_to(
        &self,
        machine: &mut M,
        env: &mut M::Env,
        from: StateId,
        to: StateId,
        reenter: bool,
    ) -> Result<(), M::Error> {
        let reentering = reenter && to != StateId::ROOT && self.ancestors(from).any(|n| n == to);
        if from == to && !reentering {
            tracing::trace!(state = self.path(from), "transition to current state ignored");
            return Ok(());
        }
        let lca = if reentering {
            self.nodes[to.index()].parent.unwrap_or(StateId::ROOT)
        } else {
            self.common_ancestor(from, to)
        };
        tracing::trace!(from = self.path(from), to = self.path(to), reentering, "transition");

        for id in self.ancestors(from).take_while(|&n| n != lca) {
            machine.fsm_mut().current = Some(id);
            if let Some(hook) = self.nodes[id.index()].leave {
                Self::nested(machine, |m| hook(m, env))?;
            }
        }
        machine.fsm_mut().current = Some(lca);

        let chain = self.chain_below(lca, to);
        self.enter_chain(machine, env, &chain)
    }

    /// Enter each state of `chain` in order.  Stops early when a hook
    /// redirects; the machine is then left in the redirecting state.
    fn enter_chain(&self, machine: &mut M, env: &mut M::Env, chain: &[StateId]) -> Result<(), M::Error> {
        for &id in chain {
            machine.fsm_mut().current = Some(id);
            let Some(hook) = self.nodes[id.index()].enter else {
                continue;
            };
            if Self::nested(machine, |m| hook(m, env))? == EnterOutcome::Transitioning {
                if !machine.fsm().has_pending_transition() {
                    return Err(FsmError::MissingTransition(self.path(id).to_owned()).into());
                }
                tracing::trace!(state = self.path(id), "enter redirected");
                return Ok(());
            }
        }
        Ok(())
    }
}
