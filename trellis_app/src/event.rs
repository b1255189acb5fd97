// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The application event value and handler signature.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use trellis_tree::NodeId;

use crate::App;

/// Handler invoked during event propagation.
///
/// Handlers receive the shared [`App`] handle and may freely re-enter it:
/// emit further events, add or dispose nodes, run `collect`. Dispatch
/// snapshots the handler list first, so mutation during delivery is safe.
pub type Handler = Rc<dyn Fn(&App, &Event)>;

/// A single application event travelling the propagation chain.
///
/// Events are delivered synchronously on the emitting call stack, in strict
/// self, then owning component, then root order.
#[derive(Clone)]
pub struct Event {
    /// Event name, e.g. `"change:title"` or a namespaced provider key.
    pub name: String,
    /// The node that emitted the event, when it came from inside the tree.
    pub origin: Option<NodeId>,
    /// Event payload.
    pub args: Value,
    // Result sink carried by `collect` pseudo-events. Suppliers push into it;
    // everyone else ignores it.
    pub(crate) sink: Option<Rc<RefCell<Vec<Value>>>>,
}

impl Event {
    /// Create a plain event with no origin.
    pub fn new(name: &str, args: Value) -> Self {
        Self {
            name: name.to_string(),
            origin: None,
            args,
            sink: None,
        }
    }

    pub(crate) fn from_node(name: &str, origin: NodeId, args: Value) -> Self {
        Self {
            name: name.to_string(),
            origin: Some(origin),
            args,
            sink: None,
        }
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("args", &self.args)
            .field("sink", &self.sink.as_ref().map(|s| s.borrow().len()))
            .finish()
    }
}
