// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ordered event-map container and the declarative inheritance merge.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

/// Split an event-map token into its event name and optional selector suffix.
///
/// The name runs up to the first whitespace; everything after it (trimmed) is
/// the selector. Core dispatch ignores the selector entirely; it exists for
/// presentation-layer bindings.
///
/// ```
/// use trellis_events::split_event_token;
/// assert_eq!(split_event_token("click .save"), ("click", Some(".save")));
/// assert_eq!(split_event_token("change:title"), ("change:title", None));
/// ```
pub fn split_event_token(token: &str) -> (&str, Option<&str>) {
    match token.split_once(char::is_whitespace) {
        Some((name, rest)) => {
            let rest = rest.trim();
            (name, (!rest.is_empty()).then_some(rest))
        }
        None => (token, None),
    }
}

/// An ordered `token → handler` map for declarative event bindings.
///
/// `EventMap` is generic over the handler representation so the same
/// container serves application-event maps, model-event maps, and provider
/// maps. Keys keep their full token (selector suffix included); use
/// [`split_event_token`] when binding.
///
/// ## Inheritance merge
///
/// [`EventMap::merged_over`] composes a child map over a base map: entries in
/// `self` win key-for-key, keys absent from `self` fall back to `base`. The
/// result is a fresh map; the shared inputs are never mutated, so one
/// blueprint-level map can back any number of instances.
#[derive(Clone)]
pub struct EventMap<H> {
    entries: BTreeMap<String, H>,
}

impl<H> Default for EventMap<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> core::fmt::Debug for EventMap<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventMap")
            .field("keys", &self.entries.keys().collect::<alloc::vec::Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<H> EventMap<H> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Insert or replace the handler for `token`.
    pub fn insert(&mut self, token: &str, handler: H) -> Option<H> {
        self.entries.insert(token.to_string(), handler)
    }

    /// Builder-style [`EventMap::insert`].
    #[must_use]
    pub fn with(mut self, token: &str, handler: H) -> Self {
        self.insert(token, handler);
        self
    }

    /// Look up the handler bound to `token`.
    pub fn get(&self, token: &str) -> Option<&H> {
        self.entries.get(token)
    }

    /// True if `token` has a binding.
    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    /// Iterate `(token, handler)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &H)> {
        self.entries.iter().map(|(k, h)| (k.as_str(), h))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H: Clone> EventMap<H> {
    /// Compose this map over `base`: entries here override the base
    /// key-for-key, unset keys inherit from the base.
    #[must_use]
    pub fn merged_over(&self, base: &Self) -> Self {
        let mut merged = base.entries.clone();
        for (key, handler) in &self.entries {
            merged.insert(key.clone(), handler.clone());
        }
        Self { entries: merged }
    }
}
