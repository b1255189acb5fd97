// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Provider-key namespacing for the collect mediator.
//!
//! Provider maps ride the ordinary event channel: each key is rewritten to a
//! namespaced pseudo-event name at bind time and installed as a root handler.
//! `collect` then emits that pseudo-event carrying a result sink.

use std::rc::Rc;

use serde_json::Value;
use trellis_events::EventMap;

use crate::App;
use crate::event::Handler;

/// Prefix separating provider pseudo-events from ordinary application events.
pub const PROVIDE_PREFIX: &str = "__provide:";

/// A provider function: answers a `collect` query, or declines with `None`.
///
/// `None` results are filtered out of the collected vector, so a supplier
/// that only sometimes has an answer can stay bound unconditionally.
pub type Supplier = Rc<dyn Fn(&App, &Value) -> Option<Value>>;

/// Namespace a provider key. Already-namespaced keys pass through unchanged,
/// which is what makes rebinding a shared provider map idempotent.
pub fn namespaced(key: &str) -> String {
    if key.starts_with(PROVIDE_PREFIX) {
        key.to_string()
    } else {
        format!("{PROVIDE_PREFIX}{key}")
    }
}

/// Rewrite every key of a provider map into its namespaced form.
pub(crate) fn namespaced_map(map: &EventMap<Supplier>) -> EventMap<Supplier> {
    let mut out = EventMap::new();
    for (key, supplier) in map.iter() {
        out.insert(&namespaced(key), Rc::clone(supplier));
    }
    out
}

/// Wrap a supplier as an event handler that feeds the collect sink.
pub(crate) fn supplier_handler(supplier: Supplier) -> Handler {
    Rc::new(move |app: &App, event| {
        if let Some(sink) = &event.sink {
            if let Some(value) = supplier(app, &event.args) {
                sink.borrow_mut().push(value);
            }
        }
    })
}
