// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Views and the rendering seam.
//!
//! Actual templating lives behind the [`Renderer`] trait; the framework only
//! assembles the render data (global render data overlaid with the owning
//! model's attributes), merges partials, and caches the produced markup.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use trellis_tree::NodeId;

use crate::app::App;
use crate::blueprint::{RenderDataFn, ViewBlueprint};
use crate::component::ComponentHandle;
use crate::event::{Event, Handler};
use crate::mediator::EventSource;

/// External template engine seam.
pub trait Renderer {
    /// Render `template` with `data`, resolving partial references against
    /// `partials`.
    fn render(&self, template: &str, data: &Value, partials: &BTreeMap<String, String>) -> String;
}

/// Per-view behavioral state kept by the application.
pub(crate) struct ViewState {
    pub(crate) template: Option<String>,
    pub(crate) partials: BTreeMap<String, String>,
    pub(crate) render_data: Option<RenderDataFn>,
    pub(crate) markup: Option<String>,
}

impl ViewState {
    pub(crate) fn from_blueprint(blueprint: &ViewBlueprint) -> Self {
        Self {
            template: blueprint.template.clone(),
            partials: blueprint.partials.clone(),
            render_data: blueprint.render_data.clone(),
            markup: None,
        }
    }
}

/// Handle to a live view node.
#[derive(Clone)]
pub struct ViewHandle {
    app: App,
    node: NodeId,
}

impl std::fmt::Debug for ViewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewHandle")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

impl ViewHandle {
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

    /// The owning component, absent for views hung directly off the root.
    pub fn component(&self) -> Option<ComponentHandle> {
        self.app
            .shared
            .tree
            .borrow()
            .owner_component(self.node)
            .map(|component| ComponentHandle::new(self.app.clone(), component))
    }

    /// The parent view, for subviews.
    pub fn parent_view(&self) -> Option<Self> {
        let tree = self.app.shared.tree.borrow();
        tree.parent(self.node)
            .filter(|parent| tree.role(*parent) == trellis_tree::Role::View)
            .map(|parent| Self::new(self.app.clone(), parent))
    }

    /// True while the underlying node is live.
    pub fn is_alive(&self) -> bool {
        self.app.is_alive(self.node)
    }

    // --- composition ---

    /// Add a component under the nearest component-or-root container. A call
    /// on a view never mutates the view itself; the container is resolved
    /// first.
    pub fn add_component(&self, blueprint: &crate::Blueprint) -> ComponentHandle {
        let container = self.app.shared.tree.borrow().resolve_container(self.node);
        self.app.add_component_under(container, blueprint)
    }

    /// Instantiate a subview under this view. The subview shares this view's
    /// owning component and is disposed with it.
    pub fn add_subview(&self, blueprint: &ViewBlueprint) -> Self {
        let (component, kind) = {
            let tree = self.app.shared.tree.borrow();
            let component = tree.owner_component(self.node);
            let kind = match component {
                Some(component) => tree.kind(component).to_string(),
                None => "app".to_string(),
            };
            (component.unwrap_or(self.app.root_id()), kind)
        };
        let subview =
            self.app
                .build_view(component, Some(self.node), &kind, blueprint, &HashMap::new());
        Self::new(self.app.clone(), subview)
    }

    /// Subviews in addition order.
    pub fn subviews(&self) -> Vec<Self> {
        self.app
            .shared
            .tree
            .borrow()
            .subviews_of(self.node)
            .into_iter()
            .map(|subview| Self::new(self.app.clone(), subview))
            .collect()
    }

    // --- rendering ---

    /// Render the view's template and cache the markup.
    ///
    /// The data object is the global render-data map overlaid with the
    /// owning component's model attributes, unless the blueprint overrode
    /// `render_data`. View partials are merged over global partials.
    pub fn render_template(&self) -> String {
        let (template, render_data, partials) = {
            let views = self.app.shared.views.borrow();
            match views.get(&self.node) {
                Some(state) => (
                    state.template.clone(),
                    state.render_data.clone(),
                    state.partials.clone(),
                ),
                None => (None, None, BTreeMap::new()),
            }
        };

        let data = match render_data {
            Some(f) => f(&self.app, self),
            None => Value::Object(self.default_render_data()),
        };

        let mut merged_partials = self.app.shared.global_partials.borrow().clone();
        merged_partials.extend(partials);

        let markup = match (&self.app.shared.renderer, template) {
            (Some(renderer), Some(template)) => {
                renderer.render(&template, &data, &merged_partials)
            }
            (None, Some(template)) => template,
            (_, None) => String::new(),
        };

        if let Some(state) = self.app.shared.views.borrow_mut().get_mut(&self.node) {
            state.markup = Some(markup.clone());
        }
        markup
    }

    fn default_render_data(&self) -> Map<String, Value> {
        let mut data = self.app.shared.global_render_data.borrow().clone();
        let model = {
            let tree = self.app.shared.tree.borrow();
            tree.owner_component(self.node)
                .and_then(|component| tree.model_of(component))
        };
        if let Some(model) = model {
            if let Some(state) = self.app.shared.models.borrow().get(&model) {
                for (key, value) in &state.attributes {
                    data.insert(key.clone(), value.clone());
                }
            }
        }
        data
    }

    /// The cached markup from the last [`ViewHandle::render_template`] call.
    pub fn markup(&self) -> Option<String> {
        self.app
            .shared
            .views
            .borrow()
            .get(&self.node)
            .and_then(|state| state.markup.clone())
    }

    // --- mediation ---

    /// Emit an event from this view: delivered to the view, its owning
    /// component, then the root.
    pub fn emit(&self, name: &str, args: Value) {
        let event = Event::from_node(name, self.node, args);
        self.app.emit_event(self.node, &event);
    }

    /// Subscribe to the root stream; removed at this view's disposal.
    pub fn listen_for(&self, name: &str, handler: Handler) {
        self.app.listen_for_from(self.node, name, handler);
    }

    /// Re-emit a foreign source's events from this view; cancelled at
    /// disposal.
    pub fn amplify(&self, source: &dyn EventSource, name: &str) {
        self.app.amplify_from(self.node, source, name);
    }

    // --- lifecycle ---

    /// Run the disposal protocol on this view and its subviews.
    pub fn dispose(&self) {
        self.app.dispose_node(self.node);
    }
}
