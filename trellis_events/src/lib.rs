// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Events: a small, `no_std` publish/subscribe layer.
//!
//! ## Overview
//!
//! This crate is the bottom layer of the Trellis workspace. It provides two
//! building blocks that the composition tree and the application layer are
//! assembled from:
//!
//! - [`Emitter`]: a synchronous, token-based subscription channel. Handlers
//!   are registered per event name and invoked in registration order when the
//!   event is triggered. Triggering snapshots the handler list first, so a
//!   handler may freely subscribe, unsubscribe, or re-trigger while it runs.
//! - [`EventMap`]: an ordered `name → handler` container with the explicit
//!   two-step inheritance merge used by declarative event maps: a child map
//!   overlaid on a base map wins key-for-key, unset keys fall back to the
//!   base. The merged result is a new map, never a mutation of the shared
//!   inputs.
//!
//! Event name tokens may carry a selector suffix after the first run of
//! whitespace (`"click .save-button"`). The suffix is preserved by
//! [`EventMap`] keys but ignored by dispatch; [`split_event_token`] separates
//! the two parts.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod emitter;
pub mod map;

pub use emitter::{Callback, Emitter, Token};
pub use map::{EventMap, split_event_token};
