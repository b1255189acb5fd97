// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Provide/collect mediation.
//!
//! Components across different branches register providers under shared
//! keys; `collect` gathers every answer without the branches knowing about
//! each other. Also shows amplifying a plain emitter into the event chain
//! and sharing providers across two applications.
//!
//! Run:
//! - `cargo run -p trellis_demos --example providers`

use std::rc::Rc;

use serde_json::{Value, json};
use trellis_app::{App, Blueprint};
use trellis_events::Emitter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let app = App::new();

    // Two sibling branches each provide a "status" answer.
    let sidebar = Blueprint::new("sidebar")
        .expect("valid kind")
        .provide("status", Rc::new(|_, _| Some(json!("sidebar: ok"))));
    let content = Blueprint::new("content")
        .expect("valid kind")
        .provide("status", Rc::new(|_, _| Some(json!("content: ok"))))
        // Providers may decline; `None` answers are filtered out.
        .provide("errors", Rc::new(|_, _| None));
    app.add_component(&sidebar);
    app.add_component(&content);

    println!("status  -> {:?}", app.collect("status", Value::Null));
    println!("errors  -> {:?}", app.collect("errors", Value::Null));
    println!("unknown -> {:?}", app.collect("unknown", Value::Null));

    // A plain emitter spliced into the chain via amplify.
    let clock: Emitter<Value> = Emitter::new();
    app.amplify(&clock, "tick");
    app.listen_for("tick", Rc::new(|_, event| println!("tick {}", event.args)));
    clock.trigger("tick", &json!(1));
    clock.trigger("tick", &json!(2));

    // Cross-application sharing: `backend`'s providers answer `frontend`'s
    // collect queries.
    let backend = App::new();
    backend.provide("user", Rc::new(|_, _| Some(json!({"name": "ada"}))));
    let frontend = App::new();
    backend.share_with(&frontend, "user");
    println!("frontend user -> {:?}", frontend.collect_one("user", Value::Null));
}
