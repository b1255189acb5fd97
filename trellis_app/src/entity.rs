// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Entity adapters: models, collections, and the router.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map, Value, json};
use trellis_tree::{NodeId, Role};

use crate::app::App;
use crate::event::{Event, Handler};
use crate::mediator::EventSource;

/// Per-model behavioral state kept by the application.
pub(crate) struct ModelState {
    pub(crate) attributes: Map<String, Value>,
    // Pending change notifications. An entry is cleared immediately after
    // its `change:<key>` emit so an unrelated later flush cannot re-report it.
    pub(crate) changed: HashMap<String, Value>,
}

impl ModelState {
    pub(crate) fn new(defaults: &Value) -> Self {
        Self {
            attributes: defaults.as_object().cloned().unwrap_or_default(),
            changed: HashMap::new(),
        }
    }
}

/// Handle to a live model node.
#[derive(Clone)]
pub struct ModelHandle {
    app: App,
    node: NodeId,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

impl ModelHandle {
    pub(crate) fn new(app: App, node: NodeId) -> Self {
        Self { app, node }
    }

    /// The underlying node id.
    pub fn id(&self) -> NodeId {
        self.node
    }

    /// True while the underlying node is live.
    pub fn is_alive(&self) -> bool {
        self.app.is_alive(self.node)
    }

    /// Read one attribute.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.app
            .shared
            .models
            .borrow()
            .get(&self.node)
            .and_then(|state| state.attributes.get(key).cloned())
    }

    /// Snapshot of all attributes.
    pub fn attributes(&self) -> Map<String, Value> {
        self.app
            .shared
            .models
            .borrow()
            .get(&self.node)
            .map(|state| state.attributes.clone())
            .unwrap_or_default()
    }

    /// Set one attribute. If the value actually changed, one
    /// `change:<key>` event travels the bubble chain: model, owning
    /// component, root.
    pub fn set(&self, key: &str, value: Value) {
        self.apply(vec![(key.to_string(), value)]);
    }

    /// Set several attributes in one update. Every actually-changed key
    /// fires exactly one `change:<key>` event; unchanged keys fire nothing.
    pub fn set_many(&self, attributes: Value) {
        let Some(object) = attributes.as_object() else {
            tracing::warn!("set_many expects an object; ignoring");
            return;
        };
        self.apply(
            object
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        );
    }

    fn apply(&self, entries: Vec<(String, Value)>) {
        let mut batch = Vec::new();
        {
            let mut models = self.app.shared.models.borrow_mut();
            let Some(state) = models.get_mut(&self.node) else {
                return;
            };
            for (key, value) in entries {
                if state.attributes.get(&key) != Some(&value) {
                    state.attributes.insert(key.clone(), value.clone());
                    state.changed.insert(key.clone(), value);
                    batch.push(key);
                }
            }
        }
        for key in batch {
            // Clear the pending entry before notifying; a reentrant flush
            // may already have consumed it.
            let pending = self
                .app
                .shared
                .models
                .borrow_mut()
                .get_mut(&self.node)
                .and_then(|state| state.changed.remove(&key));
            if let Some(value) = pending {
                let event = Event::from_node(&format!("change:{key}"), self.node, value);
                self.app.emit_event(self.node, &event);
            }
        }
    }

    /// Add a component under the nearest component-or-root container. The
    /// container is resolved before any mutation; the model itself never
    /// holds children.
    pub fn add_component(&self, blueprint: &crate::Blueprint) -> crate::ComponentHandle {
        let container = self.app.shared.tree.borrow().resolve_container(self.node);
        self.app.add_component_under(container, blueprint)
    }

    /// Emit an event from this model: model, owning component, root.
    pub fn emit(&self, name: &str, args: Value) {
        let event = Event::from_node(name, self.node, args);
        self.app.emit_event(self.node, &event);
    }

    /// Subscribe to the root stream; removed at this model's disposal.
    pub fn listen_for(&self, name: &str, handler: Handler) {
        self.app.listen_for_from(self.node, name, handler);
    }

    /// Re-emit a foreign source's events from this model; cancelled at
    /// disposal.
    pub fn amplify(&self, source: &dyn EventSource, name: &str) {
        self.app.amplify_from(self.node, source, name);
    }

    /// Run the disposal protocol on this model.
    pub fn dispose(&self) {
        self.app.dispose_node(self.node);
    }
}

/// Handle to a live collection node: an ordered list of owned models.
#[derive(Clone)]
pub struct CollectionHandle {
    app: App,
    node: NodeId,
}

impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

impl CollectionHandle {
    pub(crate) fn new(app: App, node: NodeId) -> Self {
        Self { app, node }
    }

    /// The underlying node id.
    pub fn id(&self) -> NodeId {
        self.node
    }

    /// True while the underlying node is live.
    pub fn is_alive(&self) -> bool {
        self.app.is_alive(self.node)
    }

    /// Append a new member model with the given attributes. Emits `add`
    /// from the collection.
    pub fn add(&self, attributes: Value) -> ModelHandle {
        let kind = format!("{}-model", self.app.shared.tree.borrow().kind(self.node));
        let model = {
            let mut tree = self.app.shared.tree.borrow_mut();
            let model = tree.insert(Role::Model, &kind);
            tree.attach_loose(self.node, model);
            model
        };
        self.app
            .shared
            .models
            .borrow_mut()
            .insert(model, ModelState::new(&attributes));
        let event = Event::from_node("add", self.node, attributes);
        self.app.emit_event(self.node, &event);
        ModelHandle::new(self.app.clone(), model)
    }

    /// Member models in insertion order.
    pub fn members(&self) -> Vec<ModelHandle> {
        self.app
            .shared
            .tree
            .borrow()
            .attachments_of(self.node)
            .into_iter()
            .map(|model| ModelHandle::new(self.app.clone(), model))
            .collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.app.shared.tree.borrow().attachments_of(self.node).len()
    }

    /// True when the collection has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove the given members. With `dispose`, every removed model also
    /// runs the full disposal protocol; without it, membership ends but the
    /// model stays alive, re-anchored to the collection's container. Each
    /// removal emits `remove` from the collection carrying the removed
    /// model's attributes.
    pub fn remove(&self, ids: &[NodeId], dispose: bool) {
        for &id in ids {
            let is_member = self
                .app
                .shared
                .tree
                .borrow()
                .attachments_of(self.node)
                .contains(&id);
            if !is_member {
                continue;
            }
            // Captured before teardown so observers can tell members apart.
            let removed = self
                .app
                .shared
                .models
                .borrow()
                .get(&id)
                .map_or(Value::Null, |state| Value::Object(state.attributes.clone()));
            if dispose {
                self.app.dispose_node(id);
            } else {
                let container = {
                    let mut tree = self.app.shared.tree.borrow_mut();
                    tree.detach(self.node, id);
                    tree.resolve_container(self.node)
                };
                self.app.shared.tree.borrow_mut().attach_loose(container, id);
            }
            let event = Event::from_node("remove", self.node, removed);
            self.app.emit_event(self.node, &event);
        }
    }

    /// Emit an event from this collection: collection, owning component,
    /// root.
    pub fn emit(&self, name: &str, args: Value) {
        let event = Event::from_node(name, self.node, args);
        self.app.emit_event(self.node, &event);
    }

    /// Subscribe to the root stream; removed at this collection's disposal.
    pub fn listen_for(&self, name: &str, handler: Handler) {
        self.app.listen_for_from(self.node, name, handler);
    }

    /// Re-emit a foreign source's events from this collection; cancelled at
    /// disposal.
    pub fn amplify(&self, source: &dyn EventSource, name: &str) {
        self.app.amplify_from(self.node, source, name);
    }

    /// Run the disposal protocol on this collection and its members.
    pub fn dispose(&self) {
        self.app.dispose_node(self.node);
    }
}

/// Route table for [`App::init_router`].
#[derive(Default)]
pub struct Routes {
    pub(crate) entries: Vec<(String, Handler)>,
}

impl std::fmt::Debug for Routes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routes")
            .field(
                "patterns",
                &self.entries.iter().map(|(p, _)| p).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Routes {
    /// Create an empty route table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Patterns are slash-separated; `:name` segments
    /// capture one path segment, a trailing `*name` captures the rest.
    /// Earlier routes win.
    #[must_use]
    pub fn route(mut self, pattern: &str, handler: Handler) -> Self {
        self.entries.push((pattern.to_string(), handler));
        self
    }
}

pub(crate) struct RouterState {
    pub(crate) routes: Routes,
}

impl RouterState {
    pub(crate) fn new(routes: Routes) -> Self {
        Self { routes }
    }
}

/// Match `path` against `pattern`, returning captured parameters.
fn match_route(pattern: &str, path: &str) -> Option<Vec<String>> {
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();
    let mut params = Vec::new();
    for (i, segment) in pattern_segments.iter().enumerate() {
        if segment.starts_with('*') {
            params.push(path_segments.get(i..).map_or_else(String::new, |rest| {
                rest.join("/")
            }));
            return Some(params);
        }
        let actual = path_segments.get(i)?;
        if segment.starts_with(':') {
            // A trailing slash leaves an empty segment; that is no match.
            if actual.is_empty() {
                return None;
            }
            params.push((*actual).to_string());
        } else if segment != actual {
            return None;
        }
    }
    (pattern_segments.len() == path_segments.len()).then_some(params)
}

/// Handle to a live router node.
///
/// The router is a full mediation participant: every dispatched navigation
/// also emits a `route` event that bubbles to the root.
#[derive(Clone)]
pub struct RouterHandle {
    app: App,
    node: NodeId,
}

impl std::fmt::Debug for RouterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterHandle")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

impl RouterHandle {
    pub(crate) fn new(app: App, node: NodeId) -> Self {
        Self { app, node }
    }

    /// The underlying node id.
    pub fn id(&self) -> NodeId {
        self.node
    }

    /// True while the underlying node is live.
    pub fn is_alive(&self) -> bool {
        self.app.is_alive(self.node)
    }

    /// Dispatch `path` against the route table, synchronously. Returns
    /// whether any route matched.
    pub fn navigate(&self, path: &str) -> bool {
        let matched = {
            let routers = self.app.shared.routers.borrow();
            routers.get(&self.node).and_then(|state| {
                state.routes.entries.iter().find_map(|(pattern, handler)| {
                    match_route(pattern, path).map(|params| (Rc::clone(handler), params))
                })
            })
        };
        let Some((handler, params)) = matched else {
            return false;
        };
        let event = Event::from_node("route", self.node, json!({"path": path, "params": params}));
        handler(&self.app, &event);
        self.app.emit_event(self.node, &event);
        true
    }

    /// Emit an event from this router: router, then root.
    pub fn emit(&self, name: &str, args: Value) {
        let event = Event::from_node(name, self.node, args);
        self.app.emit_event(self.node, &event);
    }

    /// Subscribe to the root stream; removed at this router's disposal.
    pub fn listen_for(&self, name: &str, handler: Handler) {
        self.app.listen_for_from(self.node, name, handler);
    }

    /// Re-emit a foreign source's events from this router; cancelled at
    /// disposal.
    pub fn amplify(&self, source: &dyn EventSource, name: &str) {
        self.app.amplify_from(self.node, source, name);
    }

    /// Run the disposal protocol on this router.
    pub fn dispose(&self) {
        self.app.dispose_node(self.node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use trellis_events::Emitter;

    fn list_with_collection(app: &App) -> CollectionHandle {
        app.add_component(&crate::Blueprint::new("list").expect("valid kind"))
            .init_collection()
    }

    #[test]
    fn remove_event_carries_the_removed_members_attributes() {
        let app = App::new();
        let collection = list_with_collection(&app);
        let first = collection.add(json!({"text": "keep"}));
        let second = collection.add(json!({"text": "drop"}));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        collection.listen_for(
            "remove",
            Rc::new(move |_, event| s.borrow_mut().push(event.args.clone())),
        );

        collection.remove(&[second.id()], true);
        collection.remove(&[first.id()], false);
        assert_eq!(
            &*seen.borrow(),
            &[json!({"text": "drop"}), json!({"text": "keep"})]
        );
    }

    #[test]
    fn collection_subscriptions_die_with_the_collection() {
        let app = App::new();
        let collection = list_with_collection(&app);

        let count = Rc::new(RefCell::new(0_u32));
        let c = Rc::clone(&count);
        collection.listen_for("ping", Rc::new(move |_, _| *c.borrow_mut() += 1));

        app.emit("ping", Value::Null);
        assert_eq!(*count.borrow(), 1);

        collection.dispose();
        app.emit("ping", Value::Null);
        assert_eq!(
            *count.borrow(),
            1,
            "subscription must not outlive the collection"
        );
    }

    #[test]
    fn model_amplify_relays_until_disposal() {
        let app = App::new();
        let component = app.add_component(
            &crate::Blueprint::new("widget")
                .expect("valid kind")
                .model_defaults(json!({})),
        );
        let model = component.model().expect("blueprint declares a model");

        let beats: Emitter<Value> = Emitter::new();
        model.amplify(&beats, "beat");

        let count = Rc::new(RefCell::new(0_u32));
        let c = Rc::clone(&count);
        app.listen_for("beat", Rc::new(move |_, _| *c.borrow_mut() += 1));

        beats.trigger("beat", &Value::Null);
        assert_eq!(*count.borrow(), 1);

        component.dispose();
        beats.trigger("beat", &Value::Null);
        assert_eq!(*count.borrow(), 1, "relay must be cancelled at disposal");
    }

    #[test]
    fn router_emits_and_listens_like_any_node() {
        let app = App::new();
        let router = app.init_router(Routes::new());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        app.listen_for(
            "sync",
            Rc::new(move |_, event| s.borrow_mut().push(event.args.clone())),
        );
        router.emit("sync", json!("now"));
        assert_eq!(&*seen.borrow(), &[json!("now")]);

        let count = Rc::new(RefCell::new(0_u32));
        let c = Rc::clone(&count);
        router.listen_for("tick", Rc::new(move |_, _| *c.borrow_mut() += 1));
        app.emit("tick", Value::Null);
        router.dispose();
        app.emit("tick", Value::Null);
        assert_eq!(
            *count.borrow(),
            1,
            "subscription must not outlive the router"
        );
    }

    #[test]
    fn route_patterns_capture_params_and_splats() {
        assert_eq!(match_route("items", "items"), Some(vec![]));
        assert_eq!(
            match_route("items/:id", "items/42"),
            Some(vec!["42".to_string()])
        );
        assert_eq!(match_route("items/:id", "items"), None);
        assert_eq!(match_route("items/:id", "items/42/edit"), None);
        assert_eq!(
            match_route("items/:id", "items/"),
            None,
            "a trailing slash must not capture an empty param"
        );
        assert_eq!(match_route("items/:id/edit", "items//edit"), None);
        assert_eq!(
            match_route("files/*path", "files/a/b/c"),
            Some(vec!["a/b/c".to_string()])
        );
        assert_eq!(match_route("other", "items"), None);
    }

    #[test]
    fn navigate_dispatches_the_first_matching_route() {
        let app = App::new();
        let hits = Rc::new(RefCell::new(Vec::new()));

        let h1 = Rc::clone(&hits);
        let h2 = Rc::clone(&hits);
        let router = app.init_router(
            Routes::new()
                .route(
                    "items/:id",
                    Rc::new(move |_, event| {
                        h1.borrow_mut().push(event.args["params"][0].clone());
                    }),
                )
                .route("items/special", Rc::new(move |_, _| h2.borrow_mut().push(Value::Null))),
        );

        assert!(router.navigate("items/7"));
        assert!(router.navigate("items/special"), "earlier route still wins");
        assert!(!router.navigate("nowhere"));
        assert_eq!(
            &*hits.borrow(),
            &[Value::from("7"), Value::from("special")],
            "first matching route must take both dispatches"
        );
    }

    #[test]
    fn navigation_emits_a_route_event_to_the_root() {
        let app = App::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        app.listen_for(
            "route",
            Rc::new(move |_, event| s.borrow_mut().push(event.args["path"].clone())),
        );

        let router = app.init_router(Routes::new().route("home", Rc::new(|_, _| {})));
        router.navigate("home");
        assert_eq!(&*seen.borrow(), &[Value::from("home")]);
    }

    #[test]
    fn disposed_router_stops_matching() {
        let app = App::new();
        let router = app.init_router(Routes::new().route("home", Rc::new(|_, _| {})));
        router.dispose();
        assert!(!router.is_alive());
        assert!(
            app.shared.routers.borrow().is_empty(),
            "router state must be dropped at disposal"
        );
    }
}
