// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis: component composition and lifecycle for hierarchical apps.
//!
//! ## Overview
//!
//! Applications are trees of loosely-coupled components, each owning an
//! optional view, an optional model, and optional collections. The framework
//! keeps the object graph honest so application code never has to:
//!
//! - **Composition.** [`App::add_component`] (and the same operation on
//!   component, view, and model handles) instantiates a [`Blueprint`] under
//!   the nearest component-or-root container, assigns a `kind + counter`
//!   instance name, and wires parent references.
//! - **Mediation.** `emit` delivers an event to the emitter, its owning
//!   component, and the root, synchronously on the same call stack;
//!   `listen_for` taps the root stream, which sees everything; `amplify`
//!   splices a foreign [`EventSource`] into the chain.
//! - **Provide/collect.** Providers registered on a blueprint (or via
//!   [`App::provide`]) answer [`App::collect`] queries through namespaced
//!   pseudo-events; absent providers yield an empty result, never an error.
//! - **Disposal.** `dispose` on any handle runs the protocol: `beforeDispose`
//!   bubbles, the subtree is torn down depth-first, every owned subscription
//!   and foreign cancellation runs, and the node's arena slot is freed.
//!   Using a stale handle afterwards is a contract violation and panics.
//!
//! Rendering is consumed behind the [`Renderer`] trait; logging goes through
//! [`tracing`] and is a no-op unless a subscriber is installed.
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//! use serde_json::{Value, json};
//! use trellis_app::{App, Blueprint};
//!
//! let app = App::new();
//! let header = Blueprint::new("header")
//!     .expect("valid kind")
//!     .provide("title", Rc::new(|_, _| Some(json!("hello"))));
//! app.add_component(&header);
//! assert_eq!(app.collect_one("title", Value::Null), Some(json!("hello")));
//! ```

mod app;
mod blueprint;
mod component;
mod entity;
mod event;
mod mediator;
mod provider;
mod view;

pub use app::{App, AppBuilder, BEFORE_DISPOSE};
pub use blueprint::{
    Blueprint, DeferredInit, DefineError, HandlerRef, Mixin, RenderDataFn, ViewBlueprint,
};
pub use component::ComponentHandle;
pub use entity::{CollectionHandle, ModelHandle, RouterHandle, Routes};
pub use event::{Event, Handler};
pub use mediator::{Canceller, EventSource};
pub use provider::{PROVIDE_PREFIX, Supplier};
pub use view::{Renderer, ViewHandle};
