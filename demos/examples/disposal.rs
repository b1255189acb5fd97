// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The disposal protocol.
//!
//! Builds a nested tree with views, models, and a collection, then disposes
//! the root and prints the `beforeDispose` cascade: one notification per
//! node, depth-first, with every subscription gone afterwards.
//!
//! Run:
//! - `cargo run -p trellis_demos --example disposal`

use std::rc::Rc;

use serde_json::{Value, json};
use trellis_app::{App, BEFORE_DISPOSE, Blueprint, ViewBlueprint};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let app = App::new();

    let panel = Blueprint::new("panel")
        .expect("valid kind")
        .model_defaults(json!({"open": true}))
        .view(ViewBlueprint::new().template("<div>panel</div>"));
    let item = Blueprint::new("item").expect("valid kind");

    let outer = app.add_component(&panel);
    let inner = outer.add_component(&item);
    inner.add_component(&item);

    let todos = outer.init_collection();
    todos.add(json!({"text": "write demo"}));
    todos.add(json!({"text": "run demo"}));

    // Watch the cascade from the root stream.
    app.listen_for(
        BEFORE_DISPOSE,
        Rc::new(|app_ref: &App, event| {
            if let Some(origin) = event.origin {
                // The node is still intact while its own notification runs.
                assert!(app_ref.is_alive(origin), "notified nodes are still live");
                println!("beforeDispose <- {origin:?}");
            }
        }),
    );

    // Removing a member without disposing keeps the model alive.
    let members = todos.members();
    todos.remove(&[members[0].id()], false);
    println!(
        "detached member still alive: {} ({:?})",
        members[0].is_alive(),
        members[0].get("text")
    );

    println!("== disposing the root ==");
    app.dispose();
    println!("outer alive after dispose: {}", outer.is_alive());
    println!("collection alive after dispose: {}", todos.is_alive());
    app.emit("ping", Value::Null); // no listeners remain; nothing happens
}
