// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The application root: tree ownership, event propagation, collect
//! mediation, and the disposal protocol.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use serde_json::{Map, Value};
use trellis_events::split_event_token;
use trellis_tree::{NodeFlags, NodeId, Role, Tree};

use crate::blueprint::{self, Blueprint, DeferredInit};
use crate::component::ComponentHandle;
use crate::entity::{ModelHandle, ModelState, RouterHandle, RouterState, Routes};
use crate::event::Event;
use crate::mediator::{BindingTable, Canceller, EventSource};
use crate::provider::{self, Supplier};
use crate::view::{Renderer, ViewHandle, ViewState};

/// Event emitted on a node at the start of its disposal cascade.
///
/// Observers may react (it bubbles like any other event) but cannot cancel
/// the disposal.
pub const BEFORE_DISPOSE: &str = "beforeDispose";

pub(crate) struct AppShared {
    pub(crate) tree: RefCell<Tree>,
    pub(crate) root: NodeId,
    pub(crate) root_model: NodeId,
    pub(crate) bindings: RefCell<BindingTable>,
    pub(crate) cancellers: RefCell<HashMap<NodeId, Vec<Canceller>>>,
    pub(crate) models: RefCell<HashMap<NodeId, ModelState>>,
    pub(crate) views: RefCell<HashMap<NodeId, ViewState>>,
    pub(crate) routers: RefCell<HashMap<NodeId, RouterState>>,
    pub(crate) deferred: RefCell<VecDeque<(NodeId, DeferredInit)>>,
    pub(crate) renderer: Option<Rc<dyn Renderer>>,
    pub(crate) global_render_data: RefCell<Map<String, Value>>,
    pub(crate) global_partials: RefCell<BTreeMap<String, String>>,
    // Markup of root-level renderable views, keyed by view node so a view's
    // disposal can detach exactly its own contribution.
    pub(crate) buffer: RefCell<Vec<(NodeId, String)>>,
}

/// Configuration for a new [`App`].
pub struct AppBuilder {
    renderer: Option<Rc<dyn Renderer>>,
    root_model_attributes: Value,
    global_render_data: Map<String, Value>,
}

impl std::fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppBuilder")
            .field("renderer", &self.renderer.is_some())
            .field("root_model_attributes", &self.root_model_attributes)
            .field("global_render_data", &self.global_render_data)
            .finish()
    }
}

impl AppBuilder {
    /// Install a template renderer. Without one, a view's markup is its raw
    /// template source.
    #[must_use]
    pub fn renderer(mut self, renderer: Rc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Initial attributes for the application-wide state model.
    #[must_use]
    pub fn root_model_attributes(mut self, attributes: Value) -> Self {
        self.root_model_attributes = attributes;
        self
    }

    /// Seed the global render-data map.
    #[must_use]
    pub fn global(mut self, key: &str, value: Value) -> Self {
        self.global_render_data.insert(key.to_string(), value);
        self
    }

    /// Build the application. Creates the root node and the root model.
    pub fn build(self) -> App {
        let mut tree = Tree::new();
        let root = tree.insert(Role::Root, "app");
        let root_model = tree.insert(Role::Model, "app-model");
        tree.attach_model(root, root_model);

        let mut models = HashMap::new();
        models.insert(root_model, ModelState::new(&self.root_model_attributes));

        App {
            shared: Rc::new(AppShared {
                tree: RefCell::new(tree),
                root,
                root_model,
                bindings: RefCell::new(BindingTable::new()),
                cancellers: RefCell::new(HashMap::new()),
                models: RefCell::new(models),
                views: RefCell::new(HashMap::new()),
                routers: RefCell::new(HashMap::new()),
                deferred: RefCell::new(VecDeque::new()),
                renderer: self.renderer,
                global_render_data: RefCell::new(self.global_render_data),
                global_partials: RefCell::new(BTreeMap::new()),
                buffer: RefCell::new(Vec::new()),
            }),
        }
    }
}

/// The application root and the single shared owner of the node tree.
///
/// `App` is a cheap handle; clones share one application. Every handle and
/// handler closure reaches shared state through it, which is what keeps the
/// mediator an explicit bus object rather than ambient global state.
#[derive(Clone)]
pub struct App {
    pub(crate) shared: Rc<AppShared>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("tree", &self.shared.tree.borrow())
            .field("bindings", &self.shared.bindings.borrow())
            .finish_non_exhaustive()
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Create an application with default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring an application.
    pub fn builder() -> AppBuilder {
        AppBuilder {
            renderer: None,
            root_model_attributes: Value::Object(Map::new()),
            global_render_data: Map::new(),
        }
    }

    /// The root node's id.
    pub fn root_id(&self) -> NodeId {
        self.shared.root
    }

    /// True if `id` refers to a live node of this application.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.shared.tree.borrow().is_alive(id)
    }

    /// The application-wide state model.
    pub fn model(&self) -> ModelHandle {
        ModelHandle::new(self.clone(), self.shared.root_model)
    }

    // --- composition ---

    /// Instantiate `blueprint` as a direct child of the root.
    pub fn add_component(&self, blueprint: &Blueprint) -> ComponentHandle {
        self.add_component_under(self.shared.root, blueprint)
    }

    /// Core instantiation: build a component under a resolved container.
    pub(crate) fn add_component_under(
        &self,
        container: NodeId,
        blueprint: &Blueprint,
    ) -> ComponentHandle {
        let node = {
            let mut tree = self.shared.tree.borrow_mut();
            let node = tree.insert(Role::Component, &blueprint.kind);
            let name = tree.attach_child(container, node);
            tracing::debug!(kind = %blueprint.kind, %name, "component added");
            node
        };

        // Inheritance-merged maps, then mixin overlays (mixin wins).
        // Mixins come down the base chain too, base-first.
        let methods = blueprint.effective_methods();
        let mixins = blueprint.effective_mixins();
        let mut app_events = blueprint.effective_app_events();
        let mut model_events = blueprint.effective_model_events();
        let mut providers = blueprint.effective_providers();
        for mixin in &mixins {
            app_events = mixin.app_events().merged_over(&app_events);
            model_events = mixin.model_events().merged_over(&model_events);
            providers = mixin.providers().merged_over(&providers);
        }

        // Model, if the blueprint (or a base) declares state or listens for
        // any.
        let model_defaults = blueprint.effective_model_defaults();
        let model = if model_defaults.is_some() || !model_events.is_empty() {
            let defaults = model_defaults.unwrap_or_else(|| Value::Object(Map::new()));
            Some(self.create_model(node, &format!("{}-model", blueprint.kind), &defaults))
        } else {
            None
        };

        // Application events bind on the root, owned by the new node.
        {
            let mut bindings = self.shared.bindings.borrow_mut();
            for (token, handler_ref) in app_events.iter() {
                let (name, _selector) = split_event_token(token);
                if let Some(handler) = blueprint::resolve(&blueprint.kind, token, handler_ref, &methods)
                {
                    bindings.bind(self.shared.root, name, node, handler);
                }
            }
            // Providers bind on the root under their namespaced pseudo-event.
            for (key, supplier) in provider::namespaced_map(&providers).iter() {
                bindings.bind(
                    self.shared.root,
                    key,
                    node,
                    provider::supplier_handler(Rc::clone(supplier)),
                );
            }
            // Model events bind on the instance's own model.
            if let Some(model) = model {
                for (token, handler_ref) in model_events.iter() {
                    let (name, _selector) = split_event_token(token);
                    if let Some(handler) =
                        blueprint::resolve(&blueprint.kind, token, handler_ref, &methods)
                    {
                        bindings.bind(model, name, node, handler);
                    }
                }
            }
        }

        // View, own or inherited from the nearest base that declares one.
        if let Some(view_blueprint) = blueprint.effective_view() {
            let view = self.build_view(node, None, &blueprint.kind, view_blueprint, &methods);
            let renderable = self
                .shared
                .tree
                .borrow()
                .flags(view)
                .contains(NodeFlags::RENDERABLE);
            if container == self.shared.root && renderable {
                let markup = ViewHandle::new(self.clone(), view).render_template();
                self.shared.buffer.borrow_mut().push((view, markup));
            }
        }

        let handle = ComponentHandle::new(self.clone(), node);
        for mixin in &mixins {
            mixin.init(self, &handle);
        }
        handle
    }

    pub(crate) fn build_view(
        &self,
        component: NodeId,
        parent_view: Option<NodeId>,
        kind: &str,
        view_blueprint: &crate::blueprint::ViewBlueprint,
        methods: &HashMap<String, crate::event::Handler>,
    ) -> NodeId {
        let view = {
            let mut tree = self.shared.tree.borrow_mut();
            let view = tree.insert(Role::View, &format!("{kind}-view"));
            match parent_view {
                Some(parent) => tree.attach_subview(parent, view),
                None => tree.attach_view(component, view),
            }
            if view_blueprint.template.is_some() {
                tree.insert_flags(view, NodeFlags::RENDERABLE);
            }
            view
        };

        self.shared
            .views
            .borrow_mut()
            .insert(view, ViewState::from_blueprint(view_blueprint));

        {
            let mut bindings = self.shared.bindings.borrow_mut();
            for (token, handler_ref) in view_blueprint.events.iter() {
                let (name, _selector) = split_event_token(token);
                if let Some(handler) = blueprint::resolve(kind, token, handler_ref, methods) {
                    bindings.bind(view, name, view, handler);
                }
            }
        }

        if let Some(hook) = &view_blueprint.deferred_init {
            self.shared
                .deferred
                .borrow_mut()
                .push_back((view, Rc::clone(hook)));
        }
        view
    }

    pub(crate) fn create_model(&self, owner: NodeId, kind: &str, defaults: &Value) -> NodeId {
        let model = {
            let mut tree = self.shared.tree.borrow_mut();
            let model = tree.insert(Role::Model, kind);
            tree.attach_model(owner, model);
            model
        };
        self.shared
            .models
            .borrow_mut()
            .insert(model, ModelState::new(defaults));
        model
    }

    // --- event mediation ---

    /// Emit an application event from the root.
    pub fn emit(&self, name: &str, args: Value) {
        let event = Event::from_node(name, self.shared.root, args);
        self.emit_event(self.shared.root, &event);
    }

    /// Subscribe to the root event stream, which sees every emit in the
    /// application. The subscription lives as long as the application.
    pub fn listen_for(&self, name: &str, handler: crate::event::Handler) {
        self.listen_for_from(self.shared.root, name, handler);
    }

    pub(crate) fn listen_for_from(
        &self,
        owner: NodeId,
        name: &str,
        handler: crate::event::Handler,
    ) {
        self.shared
            .bindings
            .borrow_mut()
            .bind(self.shared.root, name, owner, handler);
    }

    /// Re-emit a foreign source's `name` events into this application's
    /// propagation chain. Cancelled automatically when the application's
    /// root is disposed.
    pub fn amplify(&self, source: &dyn EventSource, name: &str) {
        self.amplify_from(self.shared.root, source, name);
    }

    pub(crate) fn amplify_from(&self, owner: NodeId, source: &dyn EventSource, name: &str) {
        let weak = Rc::downgrade(&self.shared);
        let relay: Rc<dyn Fn(&Event)> = Rc::new(move |event| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let app = App { shared };
            if app.shared.tree.borrow().is_alive(owner) {
                app.emit_event(owner, event);
            }
        });
        let canceller = source.subscribe(name, relay);
        self.shared
            .cancellers
            .borrow_mut()
            .entry(owner)
            .or_default()
            .push(canceller);
    }

    /// Answer `other`'s `collect` queries for `provider_name` with this
    /// application's providers.
    pub fn share_with(&self, other: &Self, provider_name: &str) {
        self.amplify(other, &provider::namespaced(provider_name));
    }

    /// Propagate `event` from `origin`: self, then the owning component for
    /// nodes that have one, then (always) the root. The root emitting
    /// reaches only the root.
    pub(crate) fn emit_event(&self, origin: NodeId, event: &Event) {
        let targets = {
            let tree = self.shared.tree.borrow();
            if !tree.is_alive(origin) {
                return;
            }
            match tree.role(origin) {
                Role::Root => vec![self.shared.root],
                Role::Component => vec![origin, self.shared.root],
                _ => {
                    let mut targets = vec![origin];
                    if let Some(component) = tree.owner_component(origin) {
                        targets.push(component);
                    }
                    targets.push(self.shared.root);
                    targets
                }
            }
        };
        for target in targets {
            // A handler earlier on the chain may have disposed a later target.
            if self.shared.tree.borrow().is_alive(target) {
                self.dispatch_on(target, event);
            }
        }
    }

    fn dispatch_on(&self, target: NodeId, event: &Event) {
        let snapshot = self.shared.bindings.borrow().snapshot(target, &event.name);
        for (token, owner, handler) in snapshot {
            let still_bound = self.shared.tree.borrow().is_alive(owner)
                && self
                    .shared
                    .bindings
                    .borrow()
                    .contains(target, &event.name, token);
            if still_bound {
                handler(self, event);
            }
        }
    }

    // --- providers ---

    /// Register an application-level provider, owned by the root.
    pub fn provide(&self, key: &str, supplier: Supplier) {
        self.shared.bindings.borrow_mut().bind(
            self.shared.root,
            &provider::namespaced(key),
            self.shared.root,
            provider::supplier_handler(supplier),
        );
    }

    /// Query every provider bound under `key`.
    ///
    /// Suppliers run synchronously within this call; results arrive in
    /// binding order (the construction order of the providing nodes) with
    /// `None` answers filtered out. An unknown key yields an empty vector.
    pub fn collect(&self, key: &str, args: Value) -> Vec<Value> {
        let sink = Rc::new(RefCell::new(Vec::new()));
        let event = Event {
            name: provider::namespaced(key),
            origin: Some(self.shared.root),
            args,
            sink: Some(Rc::clone(&sink)),
        };
        self.emit_event(self.shared.root, &event);
        drop(event);
        sink.take()
    }

    /// The first collected value for `key`, if any provider answered.
    pub fn collect_one(&self, key: &str, args: Value) -> Option<Value> {
        self.collect(key, args).into_iter().next()
    }

    // --- router ---

    /// Create a router node owned by the root.
    pub fn init_router(&self, routes: Routes) -> RouterHandle {
        let node = {
            let mut tree = self.shared.tree.borrow_mut();
            let node = tree.insert(Role::Router, "app-router");
            let root = self.shared.root;
            tree.attach_loose(root, node);
            node
        };
        self.shared
            .routers
            .borrow_mut()
            .insert(node, RouterState::new(routes));
        RouterHandle::new(self.clone(), node)
    }

    // --- deferred turn ---

    /// Drain the deferred-hook queue, FIFO. Hooks whose view has since been
    /// disposed are skipped.
    pub fn run_deferred(&self) {
        loop {
            let next = self.shared.deferred.borrow_mut().pop_front();
            let Some((node, hook)) = next else {
                break;
            };
            if self.shared.tree.borrow().is_alive(node) {
                hook(self, &ViewHandle::new(self.clone(), node));
            } else {
                tracing::debug!(?node, "skipping deferred hook for disposed view");
            }
        }
    }

    // --- globals and presentation ---

    /// Set a key in the global render-data map.
    pub fn set_global(&self, key: &str, value: Value) {
        self.shared
            .global_render_data
            .borrow_mut()
            .insert(key.to_string(), value);
    }

    /// Read a key from the global render-data map.
    pub fn global(&self, key: &str) -> Option<Value> {
        self.shared.global_render_data.borrow().get(key).cloned()
    }

    /// Register a partial template available to every view.
    pub fn set_global_partial(&self, name: &str, template: &str) {
        self.shared
            .global_partials
            .borrow_mut()
            .insert(name.to_string(), template.to_string());
    }

    /// The root presentation buffer: markup of every root-level renderable
    /// view, in addition order.
    pub fn markup(&self) -> String {
        self.shared
            .buffer
            .borrow()
            .iter()
            .map(|(_, markup)| markup.as_str())
            .collect()
    }

    // --- logging passthrough ---

    /// Informational log line. A no-op when no subscriber is installed.
    pub fn log(&self, message: &str) {
        tracing::info!("{message}");
    }

    /// Warning log line.
    pub fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    /// Error log line.
    pub fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    // --- disposal ---

    /// Dispose the whole application: the root and every descendant, exactly
    /// once, depth-first. The handle remains but every node id goes stale.
    pub fn dispose(&self) {
        self.dispose_node(self.shared.root);
    }

    /// The disposal protocol.
    ///
    /// 1. `beforeDispose` bubbles from the node.
    /// 2. Role-specific teardown, recursing depth-first.
    /// 3. Every binding owned by or targeting the node is removed and every
    ///    foreign-subscription canceller runs.
    /// 4. The arena slot is freed; outstanding ids for it go stale.
    ///
    /// Disposing an already-disposed node is a contract violation and panics
    /// on the dangling id.
    pub(crate) fn dispose_node(&self, id: NodeId) {
        {
            let mut tree = self.shared.tree.borrow_mut();
            if tree.flags(id).contains(NodeFlags::DISPOSING) {
                return;
            }
            tree.insert_flags(id, NodeFlags::DISPOSING);
        }

        let event = Event::from_node(BEFORE_DISPOSE, id, Value::Null);
        self.emit_event(id, &event);

        let role = self.shared.tree.borrow().role(id);
        match role {
            Role::View => {
                let subviews = self.shared.tree.borrow().subviews_of(id);
                for subview in subviews {
                    self.dispose_child(subview);
                }
                self.shared.buffer.borrow_mut().retain(|(view, _)| *view != id);
                self.shared.views.borrow_mut().remove(&id);
            }
            Role::Component => {
                let (view, model, children, attachments) = {
                    let tree = self.shared.tree.borrow();
                    (
                        tree.view_of(id),
                        tree.model_of(id),
                        tree.children(id),
                        tree.attachments_of(id),
                    )
                };
                if let Some(view) = view {
                    self.dispose_child(view);
                }
                for child in children {
                    self.dispose_child(child.id);
                }
                if let Some(model) = model {
                    self.dispose_child(model);
                }
                for attachment in attachments {
                    self.dispose_child(attachment);
                }
            }
            Role::Root => {
                let (children, model, attachments) = {
                    let tree = self.shared.tree.borrow();
                    (tree.children(id), tree.model_of(id), tree.attachments_of(id))
                };
                for child in children {
                    self.dispose_child(child.id);
                }
                for attachment in attachments {
                    self.dispose_child(attachment);
                }
                if let Some(model) = model {
                    self.dispose_child(model);
                }
            }
            Role::Model => {
                // Leave an owning collection's member list immediately.
                let parent = self.shared.tree.borrow().parent(id);
                if let Some(parent) = parent {
                    let is_collection = self.shared.tree.borrow().is_alive(parent)
                        && self.shared.tree.borrow().role(parent) == Role::Collection;
                    if is_collection {
                        self.shared.tree.borrow_mut().detach(parent, id);
                    }
                }
                self.shared.models.borrow_mut().remove(&id);
            }
            Role::Collection => {
                let members = self.shared.tree.borrow().attachments_of(id);
                for member in members {
                    self.dispose_child(member);
                }
            }
            Role::Router => {
                self.shared.routers.borrow_mut().remove(&id);
            }
        }

        {
            let mut bindings = self.shared.bindings.borrow_mut();
            bindings.unbind_owner(id);
            bindings.purge_target(id);
        }
        let cancellers = self.shared.cancellers.borrow_mut().remove(&id);
        if let Some(cancellers) = cancellers {
            for cancel in cancellers {
                cancel();
            }
        }

        self.shared.tree.borrow_mut().remove(id);
    }

    // Cascade step: a `beforeDispose` handler may have disposed this node
    // already, so stale ids are skipped rather than treated as violations.
    fn dispose_child(&self, id: NodeId) {
        if self.shared.tree.borrow().is_alive(id) {
            self.dispose_node(id);
        }
    }
}

impl EventSource for App {
    fn subscribe(&self, name: &str, relay: Rc<dyn Fn(&Event)>) -> Canceller {
        let token = self.shared.bindings.borrow_mut().bind(
            self.shared.root,
            name,
            self.shared.root,
            Rc::new(move |_app: &Self, event: &Event| relay(event)),
        );
        let weak = Rc::downgrade(&self.shared);
        Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.bindings.borrow_mut().unbind(token);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_events::Emitter;

    use crate::blueprint::{HandlerRef, Mixin, ViewBlueprint};
    use crate::event::Handler;

    fn counter() -> (Rc<RefCell<u32>>, Handler) {
        let count = Rc::new(RefCell::new(0_u32));
        let c = Rc::clone(&count);
        (count, Rc::new(move |_, _| *c.borrow_mut() += 1))
    }

    // --- composition and naming ---

    #[test]
    fn repeated_add_counts_up_and_never_reuses_an_index() {
        let app = App::new();
        let widget = Blueprint::new("widget").expect("valid kind");

        let first = app.add_component(&widget);
        let second = app.add_component(&widget);
        assert_eq!(first.instance_name().as_deref(), Some("widget0"));
        assert_eq!(second.instance_name().as_deref(), Some("widget1"));

        first.dispose();
        let third = app.add_component(&widget);
        assert_eq!(
            third.instance_name().as_deref(),
            Some("widget2"),
            "a removed child's index must never come back"
        );
    }

    #[test]
    fn children_entry_exists_before_disposal_and_not_after() {
        let app = App::new();
        let child = app.add_component(&Blueprint::new("widget").expect("valid kind"));
        let root = app.root_id();

        assert_eq!(
            app.shared.tree.borrow().child_named(root, "widget0"),
            Some(child.id())
        );
        child.dispose();
        assert!(app.shared.tree.borrow().child_named(root, "widget0").is_none());
    }

    #[test]
    fn add_on_view_and_model_resolves_to_the_container() {
        let app = App::new();
        let parent = app.add_component(
            &Blueprint::new("parent")
                .expect("valid kind")
                .model_defaults(json!({}))
                .view(ViewBlueprint::new().template("t")),
        );
        let leaf = Blueprint::new("leaf").expect("valid kind");

        let via_view = parent.view().expect("has view").add_component(&leaf);
        let via_model = parent.model().expect("has model").add_component(&leaf);

        assert_eq!(via_view.parent(), Some(parent.id()));
        assert_eq!(via_model.parent(), Some(parent.id()));
        assert_eq!(via_view.instance_name().as_deref(), Some("leaf0"));
        assert_eq!(via_model.instance_name().as_deref(), Some("leaf1"));
    }

    // --- propagation ---

    #[test]
    fn emit_from_a_nested_view_reaches_the_root() {
        let app = App::new();
        let (count, handler) = counter();
        app.listen_for("ping", handler);

        let outer = app.add_component(
            &Blueprint::new("outer")
                .expect("valid kind")
                .view(ViewBlueprint::new().template("t")),
        );
        let inner = outer.add_component(
            &Blueprint::new("inner")
                .expect("valid kind")
                .view(ViewBlueprint::new().template("t")),
        );

        inner.view().expect("has view").emit("ping", Value::Null);
        inner.emit("ping", Value::Null);
        assert_eq!(*count.borrow(), 2, "both view and component emits bubble up");
    }

    #[test]
    fn root_emit_reaches_only_the_root() {
        let app = App::new();
        let (view_count, view_handler) = counter();
        let component = app.add_component(
            &Blueprint::new("widget")
                .expect("valid kind")
                .view(ViewBlueprint::new().template("t").event("ping", view_handler)),
        );
        let (root_count, root_handler) = counter();
        app.listen_for("ping", root_handler);

        app.emit("ping", Value::Null);
        assert_eq!(*root_count.borrow(), 1);
        assert_eq!(*view_count.borrow(), 0, "root emits never travel downwards");

        // The view-target binding fires only for the view's own emits.
        component.view().expect("has view").emit("ping", Value::Null);
        assert_eq!(*view_count.borrow(), 1);
    }

    #[test]
    fn model_change_bubbles_through_the_owning_component() {
        let app = App::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = Rc::clone(&seen);
        let blueprint = Blueprint::new("widget")
            .expect("valid kind")
            .model_defaults(json!({"title": "old"}))
            .model_event(
                "change:title",
                Rc::new(move |_, event| s.borrow_mut().push(("component", event.args.clone()))),
            );
        let component = app.add_component(&blueprint);

        let s = Rc::clone(&seen);
        app.listen_for(
            "change:title",
            Rc::new(move |_, event| s.borrow_mut().push(("root", event.args.clone()))),
        );

        component.model().expect("has model").set("title", json!("new"));
        assert_eq!(
            &*seen.borrow(),
            &[("component", json!("new")), ("root", json!("new"))]
        );
    }

    #[test]
    fn two_changes_fire_two_events_and_unrelated_changes_do_not_repeat() {
        let app = App::new();
        let component = app.add_component(
            &Blueprint::new("widget")
                .expect("valid kind")
                .model_defaults(json!({"a": 1, "b": 2})),
        );
        let model = component.model().expect("has model");

        let events = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::clone(&events);
        app.listen_for(
            "change:a",
            Rc::new(move |_, event| e.borrow_mut().push(("a", event.args.clone()))),
        );
        let e = Rc::clone(&events);
        app.listen_for(
            "change:b",
            Rc::new(move |_, event| e.borrow_mut().push(("b", event.args.clone()))),
        );

        model.set_many(json!({"a": 10, "b": 20}));
        assert_eq!(
            &*events.borrow(),
            &[("a", json!(10)), ("b", json!(20))],
            "one update with two changed keys fires exactly two events"
        );

        events.borrow_mut().clear();
        model.set("b", json!(21));
        assert_eq!(
            &*events.borrow(),
            &[("b", json!(21))],
            "an unrelated later change must not re-report the other key"
        );

        events.borrow_mut().clear();
        model.set("b", json!(21));
        assert!(events.borrow().is_empty(), "no-op sets fire nothing");
    }

    #[test]
    fn named_handlers_resolve_through_the_method_registry() {
        let app = App::new();
        let (count, handler) = counter();
        let blueprint = Blueprint::new("widget")
            .expect("valid kind")
            .method("onPing", handler)
            .app_event_named("ping", "onPing")
            .app_event_named("pong", "missingMethod");
        app.add_component(&blueprint);

        app.emit("ping", Value::Null);
        app.emit("pong", Value::Null);
        assert_eq!(*count.borrow(), 1, "unresolvable binding stays inert");
    }

    #[test]
    fn selector_suffixes_are_parsed_off_event_tokens() {
        let app = App::new();
        let (count, handler) = counter();
        let blueprint = Blueprint::new("widget")
            .expect("valid kind")
            .view(ViewBlueprint::new().event("click .save", handler));
        let component = app.add_component(&blueprint);

        component.view().expect("has view").emit("click", Value::Null);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn mixin_entries_win_and_init_runs() {
        struct PingMixin {
            count: Rc<RefCell<u32>>,
            inits: Rc<RefCell<u32>>,
        }
        impl Mixin for PingMixin {
            fn app_events(&self) -> trellis_events::EventMap<HandlerRef> {
                let count = Rc::clone(&self.count);
                trellis_events::EventMap::new().with(
                    "ping",
                    HandlerRef::Func(Rc::new(move |_, _| *count.borrow_mut() += 10)),
                )
            }
            fn init(&self, _app: &App, _component: &crate::ComponentHandle) {
                *self.inits.borrow_mut() += 1;
            }
        }

        let app = App::new();
        let mixin_count = Rc::new(RefCell::new(0_u32));
        let inits = Rc::new(RefCell::new(0_u32));
        let (blueprint_count, blueprint_handler) = counter();
        let blueprint = Blueprint::new("widget")
            .expect("valid kind")
            .app_event("ping", blueprint_handler)
            .mixin(Rc::new(PingMixin {
                count: Rc::clone(&mixin_count),
                inits: Rc::clone(&inits),
            }));
        app.add_component(&blueprint);

        app.emit("ping", Value::Null);
        assert_eq!(*mixin_count.borrow(), 10, "mixin entry wins on conflict");
        assert_eq!(*blueprint_count.borrow(), 0);
        assert_eq!(*inits.borrow(), 1);
    }

    #[test]
    fn extending_inherits_mixins_model_and_view() {
        struct TagMixin {
            count: Rc<RefCell<u32>>,
        }
        impl Mixin for TagMixin {
            fn app_events(&self) -> trellis_events::EventMap<HandlerRef> {
                let count = Rc::clone(&self.count);
                trellis_events::EventMap::new().with(
                    "tag",
                    HandlerRef::Func(Rc::new(move |_, _| *count.borrow_mut() += 1)),
                )
            }
        }

        let count = Rc::new(RefCell::new(0_u32));
        let base = Rc::new(
            Blueprint::new("base")
                .expect("valid kind")
                .model_defaults(json!({"origin": "base"}))
                .view(ViewBlueprint::new().template("base template"))
                .mixin(Rc::new(TagMixin {
                    count: Rc::clone(&count),
                })),
        );
        let child = Blueprint::extend(&base, "child").expect("valid kind");

        let app = App::new();
        let component = app.add_component(&child);

        let model = component.model().expect("model inherited from the base");
        assert_eq!(model.get("origin"), Some(json!("base")));
        assert!(
            component.view().is_some(),
            "view inherited from the base"
        );

        app.emit("tag", Value::Null);
        assert_eq!(*count.borrow(), 1, "base mixin must bind on the child");

        // A child's own defaults still win over the base's.
        let overriding = Blueprint::extend(&base, "custom")
            .expect("valid kind")
            .model_defaults(json!({"origin": "custom"}));
        let custom = app.add_component(&overriding);
        assert_eq!(
            custom.model().expect("declares a model").get("origin"),
            Some(json!("custom"))
        );
    }

    // --- providers ---

    #[test]
    fn collect_gathers_across_tree_levels_in_binding_order() {
        let app = App::new();
        app.provide("val", Rc::new(|_, _| Some(json!(0))));
        let a = app.add_component(
            &Blueprint::new("a")
                .expect("valid kind")
                .provide("val", Rc::new(|_, _| Some(json!(1)))),
        );
        a.add_component(
            &Blueprint::new("b")
                .expect("valid kind")
                .provide("val", Rc::new(|_, _| Some(json!(2))))
                .provide("silent", Rc::new(|_, _| None)),
        );

        assert_eq!(app.collect("val", Value::Null), [json!(0), json!(1), json!(2)]);
        assert_eq!(app.collect_one("val", Value::Null), Some(json!(0)));
        assert!(
            app.collect("silent", Value::Null).is_empty(),
            "declined answers are filtered"
        );
        assert!(app.collect("unknown", Value::Null).is_empty());
    }

    #[test]
    fn ancestor_providers_answer_before_descendants() {
        let app = App::new();
        let a = app.add_component(
            &Blueprint::new("a")
                .expect("valid kind")
                .provide("val", Rc::new(|_, _| Some(json!(1)))),
        );
        a.add_component(
            &Blueprint::new("b")
                .expect("valid kind")
                .provide("val", Rc::new(|_, _| Some(json!(2)))),
        );
        assert_eq!(app.collect("val", Value::Null), [json!(1), json!(2)]);
    }

    #[test]
    fn suppliers_receive_the_collect_arguments() {
        let app = App::new();
        app.provide(
            "double",
            Rc::new(|_, args| args.as_i64().map(|n| json!(n * 2))),
        );
        assert_eq!(app.collect("double", json!(21)), [json!(42)]);
    }

    #[test]
    fn binding_a_shared_provider_map_twice_keeps_the_registry_shape() {
        let shared = Blueprint::new("widget")
            .expect("valid kind")
            .provide("val", Rc::new(|_, _| Some(json!(1))));

        let once = App::new();
        once.add_component(&shared);
        let twice = App::new();
        twice.add_component(&shared);
        twice.add_component(&shared);

        let shape_once = once.shared.bindings.borrow().events_on(once.root_id());
        let shape_twice = twice.shared.bindings.borrow().events_on(twice.root_id());
        assert_eq!(shape_once, ["__provide:val"], "no double prefixing");
        assert_eq!(shape_twice, shape_once);
        // Two instances still both answer.
        assert_eq!(twice.collect("val", Value::Null).len(), 2);
    }

    #[test]
    fn disposed_providers_stop_answering() {
        let app = App::new();
        let component = app.add_component(
            &Blueprint::new("widget")
                .expect("valid kind")
                .provide("val", Rc::new(|_, _| Some(json!(1)))),
        );
        assert_eq!(app.collect("val", Value::Null).len(), 1);
        component.dispose();
        assert!(app.collect("val", Value::Null).is_empty());
    }

    // --- amplify and cross-app sharing ---

    #[test]
    fn amplify_splices_an_emitter_into_the_chain_until_disposal() {
        let app = App::new();
        let emitter: Emitter<Value> = Emitter::new();
        let (count, handler) = counter();
        app.listen_for("tick", handler);

        let component = app.add_component(&Blueprint::new("widget").expect("valid kind"));
        component.amplify(&emitter, "tick");

        emitter.trigger("tick", &Value::Null);
        assert_eq!(*count.borrow(), 1);

        component.dispose();
        emitter.trigger("tick", &Value::Null);
        assert_eq!(*count.borrow(), 1, "cancelled at disposal");
        assert_eq!(
            emitter.handler_count("tick"),
            0,
            "the foreign subscription itself must be gone"
        );
    }

    #[test]
    fn share_with_relays_collect_between_applications() {
        let provider_app = App::new();
        provider_app.provide("val", Rc::new(|_, _| Some(json!("shared"))));
        let consumer_app = App::new();

        provider_app.share_with(&consumer_app, "val");
        assert_eq!(consumer_app.collect("val", Value::Null), [json!("shared")]);
        assert!(provider_app.collect("other", Value::Null).is_empty());
    }

    // --- deferred turn ---

    #[test]
    fn deferred_hooks_run_fifo_and_skip_disposed_views() {
        let app = App::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let make = |tag: &'static str, order: &Rc<RefCell<Vec<&'static str>>>| {
            let order = Rc::clone(order);
            Blueprint::new(tag).expect("valid kind").view(
                ViewBlueprint::new()
                    .template("t")
                    .deferred_init(Rc::new(move |_, _| order.borrow_mut().push(tag))),
            )
        };

        app.add_component(&make("first", &order));
        let second = app.add_component(&make("second", &order));
        app.add_component(&make("third", &order));

        second.dispose();
        app.run_deferred();
        assert_eq!(&*order.borrow(), &["first", "third"]);

        app.run_deferred();
        assert_eq!(order.borrow().len(), 2, "the queue drains exactly once");
    }

    // --- disposal protocol ---

    #[test]
    fn disposing_the_root_tears_down_every_node_exactly_once_depth_first() {
        let app = App::new();
        let outer = app.add_component(
            &Blueprint::new("outer")
                .expect("valid kind")
                .model_defaults(json!({}))
                .view(ViewBlueprint::new().template("t")),
        );
        let inner = outer.add_component(&Blueprint::new("inner").expect("valid kind"));

        let order = Rc::new(RefCell::new(Vec::new()));
        let o = Rc::clone(&order);
        app.listen_for(
            BEFORE_DISPOSE,
            Rc::new(move |_, event| o.borrow_mut().push(event.origin.expect("node origin"))),
        );

        let root = app.root_id();
        let root_model = app.model().id();
        let view = outer.view().expect("has view").id();
        let model = outer.model().expect("has model").id();

        app.dispose();

        assert_eq!(
            &*order.borrow(),
            &[root, outer.id(), view, inner.id(), model, root_model],
            "teardown must be depth-first with one notification per node"
        );
        assert_eq!(app.shared.tree.borrow().alive_count(), 0);
        assert!(app.shared.models.borrow().is_empty());
        assert!(app.shared.views.borrow().is_empty());
    }

    #[test]
    fn disposal_removes_listen_for_subscriptions() {
        let app = App::new();
        let (count, handler) = counter();
        let component = app.add_component(&Blueprint::new("widget").expect("valid kind"));
        component.listen_for("ping", handler);

        app.emit("ping", Value::Null);
        component.dispose();
        app.emit("ping", Value::Null);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn before_dispose_observers_see_the_node_while_still_intact() {
        let app = App::new();
        let component = app.add_component(
            &Blueprint::new("widget")
                .expect("valid kind")
                .model_defaults(json!({"k": 1})),
        );

        let observed = Rc::new(RefCell::new(None));
        let o = Rc::clone(&observed);
        let model = component.model().expect("has model");
        app.listen_for(
            BEFORE_DISPOSE,
            Rc::new(move |app_ref: &App, event| {
                if event.origin == Some(model.id()) {
                    *o.borrow_mut() = Some(app_ref.is_alive(model.id()));
                }
            }),
        );

        component.dispose();
        assert_eq!(
            *observed.borrow(),
            Some(true),
            "the model must still be alive during its own beforeDispose"
        );
    }

    #[test]
    fn collection_remove_with_dispose_frees_members() {
        let app = App::new();
        let component = app.add_component(&Blueprint::new("widget").expect("valid kind"));
        let collection = component.init_collection();

        let kept = collection.add(json!({"n": 1}));
        let freed = collection.add(json!({"n": 2}));
        assert_eq!(collection.len(), 2);

        collection.remove(&[freed.id()], true);
        assert_eq!(collection.len(), 1);
        assert!(!freed.is_alive());

        collection.remove(&[kept.id()], false);
        assert!(collection.is_empty());
        assert!(kept.is_alive(), "removal without dispose keeps the model");
        assert_eq!(kept.get("n"), Some(json!(1)));
    }

    #[test]
    fn disposing_a_component_frees_its_collections() {
        let app = App::new();
        let component = app.add_component(&Blueprint::new("widget").expect("valid kind"));
        let collection = component.init_collection();
        let member = collection.add(json!({}));

        component.dispose();
        assert!(!collection.is_alive());
        assert!(!member.is_alive());
    }

    #[test]
    #[should_panic(expected = "dangling NodeId")]
    fn double_dispose_is_a_contract_violation() {
        let app = App::new();
        let component = app.add_component(&Blueprint::new("widget").expect("valid kind"));
        component.dispose();
        component.dispose();
    }

    #[test]
    fn handlers_may_reenter_the_app_during_delivery() {
        let app = App::new();
        let (count, handler) = counter();
        app.listen_for("second", handler);

        let relay = app.clone();
        app.listen_for(
            "first",
            Rc::new(move |_, _| relay.emit("second", Value::Null)),
        );
        app.emit("first", Value::Null);
        assert_eq!(*count.borrow(), 1, "re-emit is processed on the same stack");
    }
}
