// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the node arena: identifiers, roles, flags, child entries.

use alloc::string::String;

/// Identifier for a node in the tree.
///
/// This is a small, copyable handle that stays stable across updates but
/// becomes invalid when the underlying slot is reused.
/// It consists of a slot index and a generation counter.
///
/// ## Semantics
///
/// - On insert, a fresh slot is allocated with generation `1`.
/// - On remove, the slot is freed; any existing `NodeId` that pointed to
///   that slot is now stale.
/// - On reuse of a freed slot, its generation is incremented, producing a
///   new, distinct `NodeId`.
///
/// ### Liveness
///
/// Use [`Tree::is_alive`](crate::Tree::is_alive) to check whether a `NodeId`
/// still refers to a live node. Stale `NodeId`s never alias a different live
/// node because the generation must match.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// The structural role a node plays in the composition tree.
///
/// Roles determine which links a node may carry: only [`Role::Root`] and
/// [`Role::Component`] keep named children; views keep subviews; views,
/// models, collections and routers carry an owning-component link.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Role {
    /// The application root. Exactly one per tree, created first.
    Root,
    /// A composable unit owning an optional view and model.
    Component,
    /// A presentation node owned by a component, optionally nested.
    View,
    /// A state node owned by a component or the root.
    Model,
    /// An ordered list of models owned by a component or the root.
    Collection,
    /// A route-dispatch node owned by the root.
    Router,
}

bitflags::bitflags! {
    /// Node state flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Node exposes a renderable surface (a view with a template).
        const RENDERABLE = 0b0000_0001;
        /// Node is currently inside its disposal cascade.
        const DISPOSING  = 0b0000_0010;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// A named child slot on a root or component node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChildEntry {
    /// Generated instance name, `kind + counter`.
    pub name: String,
    /// The child node.
    pub id: NodeId,
}
