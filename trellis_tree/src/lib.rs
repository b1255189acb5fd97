// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Tree: a generational node arena for component hierarchies.
//!
//! ## Overview
//!
//! This crate keeps the *structure* of a composition tree and nothing else:
//! which node encloses which, who owns which view or model, and what every
//! child is named. Behavior (event propagation, providers, disposal
//! protocol) lives upstream in `trellis_app`; this crate guarantees the
//! structural invariants that behavior relies on:
//!
//! - Nodes live in slots addressed by generational [`NodeId`]s. Freeing a
//!   slot makes every outstanding id for it stale; stale ids never alias a
//!   later occupant because the generation must match.
//! - `parent.children[name] == child` if and only if `child.parent == parent`;
//!   the pair is linked and broken atomically by [`Tree::attach_child`] and
//!   [`Tree::remove`].
//! - Instance names are `kind + counter`, unique per parent. Counters are
//!   monotonic and never reused, so removing `kind0` and adding again
//!   produces `kind2`, never a second `kind0`.
//! - [`Tree::remove`] frees a node and its structural descendants
//!   depth-first: named children, the owned view, the owned model, and
//!   subviews.
//!
//! Accessing a stale id through the panicking accessors is a contract
//! violation, reported as a panic (`"dangling NodeId"`); use
//! [`Tree::is_alive`] where staleness is an expected input.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod tree;
mod types;

pub use tree::Tree;
pub use types::{ChildEntry, NodeFlags, NodeId, Role};
