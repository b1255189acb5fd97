// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The binding table behind event mediation.
//!
//! Every subscription in the system lives here: declarative map bindings,
//! `listen_for` registrations, namespaced provider entries, model change
//! handlers. Each binding records two nodes: the *target* it listens on and
//! the *owner* whose disposal removes it. The two differ routinely, e.g. a
//! component's application-event bindings target the root but are owned by
//! the component.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;
use trellis_events::Emitter;
use trellis_tree::NodeId;

use crate::event::{Event, Handler};

/// Undoes one foreign subscription made by `amplify`.
pub type Canceller = Box<dyn FnOnce()>;

/// Something whose events can be amplified into an application's own
/// propagation chain.
///
/// Implemented by [`Emitter<Value>`] and by [`crate::App`] itself, which is
/// what makes cross-application provider sharing possible.
pub trait EventSource {
    /// Invoke `relay` for every `name` event this source produces, until the
    /// returned canceller runs.
    fn subscribe(&self, name: &str, relay: Rc<dyn Fn(&Event)>) -> Canceller;
}

impl EventSource for Emitter<Value> {
    fn subscribe(&self, name: &str, relay: Rc<dyn Fn(&Event)>) -> Canceller {
        let token = self.on(
            name,
            Rc::new(move |event_name: &str, payload: &Value| {
                relay(&Event::new(event_name, payload.clone()));
            }),
        );
        let emitter = self.clone();
        Box::new(move || {
            emitter.off(token);
        })
    }
}

/// Identifier of one binding in a [`BindingTable`]. Never reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct BindingToken(u64);

pub(crate) struct Binding {
    pub(crate) token: BindingToken,
    pub(crate) owner: NodeId,
    pub(crate) handler: Handler,
}

/// All live subscriptions, indexed by target and cross-indexed by owner.
#[derive(Default)]
pub(crate) struct BindingTable {
    next: u64,
    by_target: HashMap<NodeId, HashMap<String, Vec<Binding>>>,
    // owner -> (target, event) pairs, for O(owned) removal at disposal.
    by_owner: HashMap<NodeId, Vec<(NodeId, String, BindingToken)>>,
}

impl std::fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bindings: usize = self
            .by_target
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum();
        f.debug_struct("BindingTable")
            .field("targets", &self.by_target.len())
            .field("owners", &self.by_owner.len())
            .field("bindings", &bindings)
            .finish_non_exhaustive()
    }
}

impl BindingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `handler` on `target` for `event`, owned by `owner`.
    pub(crate) fn bind(
        &mut self,
        target: NodeId,
        event: &str,
        owner: NodeId,
        handler: Handler,
    ) -> BindingToken {
        let token = BindingToken(self.next);
        self.next += 1;
        self.by_target
            .entry(target)
            .or_default()
            .entry(event.to_string())
            .or_default()
            .push(Binding {
                token,
                owner,
                handler,
            });
        self.by_owner
            .entry(owner)
            .or_default()
            .push((target, event.to_string(), token));
        token
    }

    /// Remove one binding by token. Idempotent.
    pub(crate) fn unbind(&mut self, token: BindingToken) {
        for per_event in self.by_target.values_mut() {
            for list in per_event.values_mut() {
                list.retain(|b| b.token != token);
            }
        }
        for owned in self.by_owner.values_mut() {
            owned.retain(|(_, _, t)| *t != token);
        }
    }

    /// Remove every binding owned by `owner`.
    pub(crate) fn unbind_owner(&mut self, owner: NodeId) {
        let Some(owned) = self.by_owner.remove(&owner) else {
            return;
        };
        for (target, event, token) in owned {
            if let Some(per_event) = self.by_target.get_mut(&target) {
                if let Some(list) = per_event.get_mut(&event) {
                    list.retain(|b| b.token != token);
                }
            }
        }
    }

    /// Remove every binding listening *on* `target` (the node is going away).
    pub(crate) fn purge_target(&mut self, target: NodeId) {
        let Some(per_event) = self.by_target.remove(&target) else {
            return;
        };
        for list in per_event.into_values() {
            for binding in list {
                if let Some(owned) = self.by_owner.get_mut(&binding.owner) {
                    owned.retain(|(_, _, t)| *t != binding.token);
                }
            }
        }
    }

    /// Clone out the handler list for `(target, event)` in binding order.
    pub(crate) fn snapshot(
        &self,
        target: NodeId,
        event: &str,
    ) -> Vec<(BindingToken, NodeId, Handler)> {
        self.by_target
            .get(&target)
            .and_then(|per_event| per_event.get(event))
            .map(|list| {
                list.iter()
                    .map(|b| (b.token, b.owner, Rc::clone(&b.handler)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True if the binding is still registered.
    pub(crate) fn contains(&self, target: NodeId, event: &str, token: BindingToken) -> bool {
        self.by_target
            .get(&target)
            .and_then(|per_event| per_event.get(event))
            .is_some_and(|list| list.iter().any(|b| b.token == token))
    }

    /// Number of live bindings for `(target, event)`.
    #[cfg(test)]
    pub(crate) fn count(&self, target: NodeId, event: &str) -> usize {
        self.by_target
            .get(&target)
            .and_then(|per_event| per_event.get(event))
            .map_or(0, Vec::len)
    }

    /// Event names bound on `target`, sorted. Used by registry-shape checks.
    #[cfg(test)]
    pub(crate) fn events_on(&self, target: NodeId) -> Vec<String> {
        let mut events: Vec<String> = self
            .by_target
            .get(&target)
            .map(|per_event| {
                per_event
                    .iter()
                    .filter(|(_, list)| !list.is_empty())
                    .map(|(event, _)| event.clone())
                    .collect()
            })
            .unwrap_or_default();
        events.sort();
        events
    }
}
