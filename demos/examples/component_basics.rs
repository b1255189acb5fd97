// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Component basics.
//!
//! Builds a small component tree, renders root-level views into the
//! presentation buffer, and shows model changes bubbling to the root.
//!
//! Run:
//! - `cargo run -p trellis_demos --example component_basics`

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{Value, json};
use trellis_app::{App, Blueprint, Renderer, ViewBlueprint};

/// A toy renderer: replaces `{{key}}` with the stringified data value.
struct BraceRenderer;

impl Renderer for BraceRenderer {
    fn render(&self, template: &str, data: &Value, _partials: &BTreeMap<String, String>) -> String {
        let mut out = template.to_string();
        if let Some(object) = data.as_object() {
            for (key, value) in object {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                out = out.replace(&format!("{{{{{key}}}}}"), &rendered);
            }
        }
        out
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let app = App::builder()
        .renderer(Rc::new(BraceRenderer))
        .global("site", json!("trellis demo"))
        .build();

    let header = Blueprint::new("header")
        .expect("valid kind")
        .model_defaults(json!({"title": "welcome"}))
        .view(ViewBlueprint::new().template("<h1>{{site}}: {{title}}</h1>\n"));

    let first = app.add_component(&header);
    let second = app.add_component(&header);
    println!("instance names: {:?}, {:?}", first.instance_name(), second.instance_name());
    println!("== initial markup ==\n{}", app.markup());

    // Model changes bubble to the root as `change:<key>` events.
    app.listen_for(
        "change:title",
        Rc::new(|_, event| println!("root saw change:title -> {}", event.args)),
    );
    first
        .model()
        .expect("header declares a model")
        .set("title", json!("updated"));

    let view = first.view().expect("header declares a view");
    println!("== re-rendered first header ==\n{}", view.render_template());
}
