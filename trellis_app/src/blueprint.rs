// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Component blueprints: the declarative side of the framework.
//!
//! A [`Blueprint`] describes a component kind before any instance exists:
//! its event maps, its providers, its named-method registry, its optional
//! view and model. Blueprints form an explicit inheritance chain through
//! [`Blueprint::extend`]; the child's maps are merged over the base's at
//! instantiation, and the merged result is stored per instance, never
//! written back to the shared blueprint.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;
use trellis_events::EventMap;

use crate::event::Handler;
use crate::provider::Supplier;
use crate::{App, ComponentHandle, ViewHandle};

/// Definition-time validation failure.
///
/// Kind validation happens when the blueprint is *defined*, so instantiation
/// is infallible for any blueprint that exists.
#[derive(Debug, Error)]
pub enum DefineError {
    /// The kind string was empty or all whitespace.
    #[error("component kind must be a non-empty name")]
    EmptyKind,
    /// The kind string contained whitespace.
    #[error("component kind {0:?} must not contain whitespace")]
    WhitespaceKind(String),
}

/// An event-map value: a handler given directly, or the name of a method
/// registered on the blueprint.
///
/// Named references are resolved once, at bind time. An unresolvable name is
/// reported through `tracing::error!` and that one binding is left inert;
/// nothing else fails.
#[derive(Clone)]
pub enum HandlerRef {
    /// A handler function bound directly.
    Func(Handler),
    /// The name of a method in the blueprint's method registry.
    Named(String),
}

impl std::fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Func(_) => f.write_str("HandlerRef::Func(..)"),
            Self::Named(name) => write!(f, "HandlerRef::Named({name:?})"),
        }
    }
}

/// Behavior mixed into a component at instantiation.
///
/// Map entries contributed by a mixin win over the blueprint's own entries
/// on conflict. The `init` hook runs after the instance's maps are bound.
pub trait Mixin {
    /// Application-event entries to overlay.
    fn app_events(&self) -> EventMap<HandlerRef> {
        EventMap::new()
    }

    /// Model-event entries to overlay.
    fn model_events(&self) -> EventMap<HandlerRef> {
        EventMap::new()
    }

    /// Provider entries to overlay.
    fn providers(&self) -> EventMap<Supplier> {
        EventMap::new()
    }

    /// Runs in the context of the freshly built component.
    fn init(&self, _app: &App, _component: &ComponentHandle) {}
}

/// Produces the data object handed to the template renderer.
pub type RenderDataFn = Rc<dyn Fn(&App, &ViewHandle) -> Value>;

/// Runs on the deferred turn after the view is constructed and rendered.
pub type DeferredInit = Rc<dyn Fn(&App, &ViewHandle)>;

/// Declarative description of a component's view.
#[derive(Clone, Default)]
pub struct ViewBlueprint {
    pub(crate) template: Option<String>,
    pub(crate) partials: std::collections::BTreeMap<String, String>,
    pub(crate) render_data: Option<RenderDataFn>,
    pub(crate) deferred_init: Option<DeferredInit>,
    pub(crate) events: EventMap<HandlerRef>,
}

impl std::fmt::Debug for ViewBlueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewBlueprint")
            .field("template", &self.template)
            .field("partials", &self.partials.keys().collect::<Vec<_>>())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl ViewBlueprint {
    /// Create an empty view description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the template source.
    #[must_use]
    pub fn template(mut self, template: &str) -> Self {
        self.template = Some(template.to_string());
        self
    }

    /// Register a named partial template.
    #[must_use]
    pub fn partial(mut self, name: &str, template: &str) -> Self {
        self.partials.insert(name.to_string(), template.to_string());
        self
    }

    /// Override the data object handed to the renderer.
    #[must_use]
    pub fn render_data(mut self, f: RenderDataFn) -> Self {
        self.render_data = Some(f);
        self
    }

    /// Install a hook for the deferred turn after construction.
    #[must_use]
    pub fn deferred_init(mut self, f: DeferredInit) -> Self {
        self.deferred_init = Some(f);
        self
    }

    /// Bind an event on the view node itself. The token may carry a selector
    /// suffix after whitespace, which core dispatch parses off and ignores.
    #[must_use]
    pub fn event(mut self, token: &str, handler: Handler) -> Self {
        self.events.insert(token, HandlerRef::Func(handler));
        self
    }
}

/// Declarative description of a component kind.
pub struct Blueprint {
    pub(crate) kind: String,
    base: Option<Rc<Blueprint>>,
    app_events: EventMap<HandlerRef>,
    model_events: EventMap<HandlerRef>,
    providers: EventMap<Supplier>,
    methods: HashMap<String, Handler>,
    mixins: Vec<Rc<dyn Mixin>>,
    model_defaults: Option<Value>,
    view: Option<ViewBlueprint>,
}

impl std::fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blueprint")
            .field("kind", &self.kind)
            .field("base", &self.base.as_ref().map(|b| &b.kind))
            .field("app_events", &self.app_events)
            .field("model_events", &self.model_events)
            .field("providers", &self.providers.len())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("mixins", &self.mixins.len())
            .finish_non_exhaustive()
    }
}

impl Blueprint {
    /// Define a new component kind.
    ///
    /// The kind doubles as the instance-name stem and an event-namespacing
    /// identity, so it must be a non-empty, whitespace-free name.
    pub fn new(kind: &str) -> Result<Self, DefineError> {
        Self::with_base(kind, None)
    }

    /// Define a kind extending `base`. Map entries here override the base's
    /// key-for-key; unset keys inherit.
    pub fn extend(base: &Rc<Self>, kind: &str) -> Result<Self, DefineError> {
        Self::with_base(kind, Some(Rc::clone(base)))
    }

    fn with_base(kind: &str, base: Option<Rc<Self>>) -> Result<Self, DefineError> {
        if kind.trim().is_empty() {
            return Err(DefineError::EmptyKind);
        }
        if kind.contains(char::is_whitespace) {
            return Err(DefineError::WhitespaceKind(kind.to_string()));
        }
        Ok(Self {
            kind: kind.to_string(),
            base,
            app_events: EventMap::new(),
            model_events: EventMap::new(),
            providers: EventMap::new(),
            methods: HashMap::new(),
            mixins: Vec::new(),
            model_defaults: None,
            view: None,
        })
    }

    /// The kind identity.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Bind an application event (delivered via the root) to a handler.
    #[must_use]
    pub fn app_event(mut self, token: &str, handler: Handler) -> Self {
        self.app_events.insert(token, HandlerRef::Func(handler));
        self
    }

    /// Bind an application event to a named method.
    #[must_use]
    pub fn app_event_named(mut self, token: &str, method: &str) -> Self {
        self.app_events
            .insert(token, HandlerRef::Named(method.to_string()));
        self
    }

    /// Bind a model event (delivered on the instance's own model).
    #[must_use]
    pub fn model_event(mut self, token: &str, handler: Handler) -> Self {
        self.model_events.insert(token, HandlerRef::Func(handler));
        self
    }

    /// Bind a model event to a named method.
    #[must_use]
    pub fn model_event_named(mut self, token: &str, method: &str) -> Self {
        self.model_events
            .insert(token, HandlerRef::Named(method.to_string()));
        self
    }

    /// Register a provider for `key`.
    #[must_use]
    pub fn provide(mut self, key: &str, supplier: Supplier) -> Self {
        self.providers.insert(key, supplier);
        self
    }

    /// Register a named method for `*_named` bindings.
    #[must_use]
    pub fn method(mut self, name: &str, handler: Handler) -> Self {
        self.methods.insert(name.to_string(), handler);
        self
    }

    /// Attach a mixin. Mixin map entries win on conflict.
    #[must_use]
    pub fn mixin(mut self, mixin: Rc<dyn Mixin>) -> Self {
        self.mixins.push(mixin);
        self
    }

    /// Give instances a model with these initial attributes.
    #[must_use]
    pub fn model_defaults(mut self, attributes: Value) -> Self {
        self.model_defaults = Some(attributes);
        self
    }

    /// Give instances a view.
    #[must_use]
    pub fn view(mut self, view: ViewBlueprint) -> Self {
        self.view = Some(view);
        self
    }

    // --- effective (inheritance-merged) maps, computed at instantiation ---

    pub(crate) fn effective_app_events(&self) -> EventMap<HandlerRef> {
        match &self.base {
            Some(base) => self.app_events.merged_over(&base.effective_app_events()),
            None => self.app_events.clone(),
        }
    }

    pub(crate) fn effective_model_events(&self) -> EventMap<HandlerRef> {
        match &self.base {
            Some(base) => self.model_events.merged_over(&base.effective_model_events()),
            None => self.model_events.clone(),
        }
    }

    pub(crate) fn effective_providers(&self) -> EventMap<Supplier> {
        match &self.base {
            Some(base) => self.providers.merged_over(&base.effective_providers()),
            None => self.providers.clone(),
        }
    }

    pub(crate) fn effective_methods(&self) -> HashMap<String, Handler> {
        let mut methods = match &self.base {
            Some(base) => base.effective_methods(),
            None => HashMap::new(),
        };
        for (name, handler) in &self.methods {
            methods.insert(name.clone(), Rc::clone(handler));
        }
        methods
    }

    /// Mixins down the base chain, base-first so a child's mixins overlay
    /// last and still win.
    pub(crate) fn effective_mixins(&self) -> Vec<Rc<dyn Mixin>> {
        let mut mixins = match &self.base {
            Some(base) => base.effective_mixins(),
            None => Vec::new(),
        };
        mixins.extend(self.mixins.iter().map(Rc::clone));
        mixins
    }

    /// The nearest declared model defaults: own, else the closest base's.
    pub(crate) fn effective_model_defaults(&self) -> Option<Value> {
        match &self.model_defaults {
            Some(defaults) => Some(defaults.clone()),
            None => self
                .base
                .as_ref()
                .and_then(|base| base.effective_model_defaults()),
        }
    }

    /// The nearest declared view: own, else the closest base's.
    pub(crate) fn effective_view(&self) -> Option<&ViewBlueprint> {
        match &self.view {
            Some(view) => Some(view),
            None => self.base.as_ref().and_then(|base| base.effective_view()),
        }
    }
}

/// Resolve a handler reference against a method registry.
///
/// Returns `None` (and logs) for an unknown method name; the caller leaves
/// that binding inert.
pub(crate) fn resolve(
    kind: &str,
    token: &str,
    handler_ref: &HandlerRef,
    methods: &HashMap<String, Handler>,
) -> Option<Handler> {
    match handler_ref {
        HandlerRef::Func(handler) => Some(Rc::clone(handler)),
        HandlerRef::Named(name) => match methods.get(name) {
            Some(handler) => Some(Rc::clone(handler)),
            None => {
                tracing::error!(kind, token, method = %name, "no such method; binding is inert");
                None
            }
        },
    }
}
