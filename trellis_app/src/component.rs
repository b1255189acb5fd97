// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The component handle.

use serde_json::Value;
use trellis_tree::NodeId;

use crate::app::App;
use crate::blueprint::Blueprint;
use crate::entity::{CollectionHandle, ModelHandle};
use crate::event::{Event, Handler};
use crate::mediator::EventSource;
use crate::view::ViewHandle;

/// Handle to a live component node.
///
/// Handles are cheap to clone and do not keep the node alive; after the
/// node is disposed, any structural call through a stale handle panics on
/// the dangling id.
#[derive(Clone)]
pub struct ComponentHandle {
    app: App,
    node: NodeId,
}

impl std::fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

impl ComponentHandle {
    pub(crate) fn new(app: App, node: NodeId) -> Self {
        Self { app, node }
    }

    /// The underlying node id.
    pub fn id(&self) -> NodeId {
        self.node
    }

    /// The owning application.
    pub fn app(&self) -> &App {
        &self.app
    }

    /// The component's kind identity.
    pub fn kind(&self) -> String {
        self.app.shared.tree.borrow().kind(self.node).to_string()
    }

    /// The generated instance name, `kind + counter`.
    pub fn instance_name(&self) -> Option<String> {
        self.app
            .shared
            .tree
            .borrow()
            .instance_name(self.node)
            .map(str::to_string)
    }

    /// The parent component or root.
    pub fn parent(&self) -> Option<NodeId> {
        self.app.shared.tree.borrow().parent(self.node)
    }

    /// True while the underlying node is live.
    pub fn is_alive(&self) -> bool {
        self.app.is_alive(self.node)
    }

    // --- composition ---

    /// Instantiate `blueprint` as a child of this component.
    pub fn add_component(&self, blueprint: &Blueprint) -> Self {
        self.app.add_component_under(self.node, blueprint)
    }

    /// The component's view, if its blueprint declared one.
    pub fn view(&self) -> Option<ViewHandle> {
        self.app
            .shared
            .tree
            .borrow()
            .view_of(self.node)
            .map(|view| ViewHandle::new(self.app.clone(), view))
    }

    /// The component's model, if its blueprint declared state.
    pub fn model(&self) -> Option<ModelHandle> {
        self.app
            .shared
            .tree
            .borrow()
            .model_of(self.node)
            .map(|model| ModelHandle::new(self.app.clone(), model))
    }

    /// Create an empty collection owned by this component.
    pub fn init_collection(&self) -> CollectionHandle {
        let kind = format!("{}-collection", self.kind());
        let node = {
            let mut tree = self.app.shared.tree.borrow_mut();
            let node = tree.insert(trellis_tree::Role::Collection, &kind);
            tree.attach_loose(self.node, node);
            node
        };
        CollectionHandle::new(self.app.clone(), node)
    }

    // --- mediation ---

    /// Emit an event from this component: delivered to the component itself,
    /// then to the root.
    pub fn emit(&self, name: &str, args: Value) {
        let event = Event::from_node(name, self.node, args);
        self.app.emit_event(self.node, &event);
    }

    /// Subscribe to the root stream; the subscription is owned by this
    /// component and removed at its disposal.
    pub fn listen_for(&self, name: &str, handler: Handler) {
        self.app.listen_for_from(self.node, name, handler);
    }

    /// Re-emit a foreign source's events from this component; cancelled at
    /// disposal.
    pub fn amplify(&self, source: &dyn EventSource, name: &str) {
        self.app.amplify_from(self.node, source, name);
    }

    /// Query providers through the owning application.
    pub fn collect(&self, key: &str, args: Value) -> Vec<Value> {
        self.app.collect(key, args)
    }

    /// First collected value for `key`.
    pub fn collect_one(&self, key: &str, args: Value) -> Option<Value> {
        self.app.collect_one(key, args)
    }

    // --- lifecycle ---

    /// Run the disposal protocol on this component and its subtree.
    pub fn dispose(&self) {
        self.app.dispose_node(self.node);
    }
}
