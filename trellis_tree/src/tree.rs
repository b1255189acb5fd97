// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core arena implementation: slots, links, naming, removal.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::types::{ChildEntry, NodeFlags, NodeId, Role};

#[derive(Clone, Debug)]
struct Node {
    generation: u32,
    role: Role,
    kind: String,
    instance_name: Option<String>,
    // Enclosing node: parent component (or root) for components, parent view
    // for subviews, the owning node for views/models/collections/routers.
    parent: Option<NodeId>,
    // Nearest owning component, kept for event propagation. `None` when the
    // node hangs off the root directly.
    owner_component: Option<NodeId>,
    children: Vec<ChildEntry>,
    kind_counters: BTreeMap<String, u64>,
    view: Option<NodeId>,
    model: Option<NodeId>,
    subviews: Vec<NodeId>,
    // Collections, routers, and collection members: owned, unnamed.
    attachments: Vec<NodeId>,
    flags: NodeFlags,
}

impl Node {
    fn new(generation: u32, role: Role, kind: &str) -> Self {
        Self {
            generation,
            role,
            kind: kind.to_string(),
            instance_name: None,
            parent: None,
            owner_component: None,
            children: Vec::new(),
            kind_counters: BTreeMap::new(),
            view: None,
            model: None,
            subviews: Vec::new(),
            attachments: Vec::new(),
            flags: NodeFlags::empty(),
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// The node arena backing a composition tree.
pub struct Tree {
    nodes: Vec<Option<Node>>, // slots
    generations: Vec<u32>,    // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    root: Option<NodeId>,
}

impl core::fmt::Debug for Tree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        let free = self.free_list.len();
        f.debug_struct("Tree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &free)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Tree {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            root: None,
        }
    }

    /// Allocate an unlinked node with the given role and kind identity.
    ///
    /// The first [`Role::Root`] insertion becomes the tree's root; inserting
    /// a second root is a contract violation.
    pub fn insert(&mut self, role: Role, kind: &str) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, role, kind));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, role, kind)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        let id = NodeId::new(idx, generation);
        if role == Role::Root {
            assert!(self.root.is_none(), "a tree has exactly one root");
            self.root = Some(id);
        }
        id
    }

    /// Remove a node and its structural descendants, depth-first.
    ///
    /// Frees named children, the owned view, the owned model, subviews, and
    /// attachments, then the node itself. Stale ids are ignored so a cascade
    /// that already freed part of a subtree can be re-entered safely.
    pub fn remove(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(parent) = self.node(id).parent {
            self.unlink(parent, id);
        }
        let owned = {
            let n = self.node(id);
            let mut owned: Vec<NodeId> = n.children.iter().map(|c| c.id).collect();
            owned.extend(n.view);
            owned.extend(n.model);
            owned.extend(n.subviews.iter().copied());
            owned.extend(n.attachments.iter().copied());
            owned
        };
        for child in owned {
            self.remove(child);
        }
        if self.root == Some(id) {
            self.root = None;
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    /// Store `child` in `parent`'s named children and assign its instance
    /// name, `kind + counter`.
    ///
    /// Counters are per-parent and monotonic: an index handed out once is
    /// never handed out again, even after the child is removed.
    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) -> String {
        let parent_role = self.node(parent).role;
        assert!(
            matches!(parent_role, Role::Root | Role::Component),
            "named children are kept on Root and Component nodes only"
        );
        let kind = self.node(child).kind.clone();
        let name = {
            let p = self.node_mut(parent);
            let counter = p.kind_counters.entry(kind.clone()).or_insert(0);
            let name = format!("{kind}{counter}");
            *counter += 1;
            p.children.push(ChildEntry {
                name: name.clone(),
                id: child,
            });
            name
        };
        let c = self.node_mut(child);
        c.parent = Some(parent);
        c.instance_name = Some(name.clone());
        name
    }

    /// Link a component's owned view.
    pub fn attach_view(&mut self, component: NodeId, view: NodeId) {
        self.node_mut(component).view = Some(view);
        let v = self.node_mut(view);
        v.parent = Some(component);
        v.owner_component = Some(component);
    }

    /// Link a subview under `parent_view`, inheriting its owning component.
    pub fn attach_subview(&mut self, parent_view: NodeId, subview: NodeId) {
        let owner = self.node(parent_view).owner_component;
        self.node_mut(parent_view).subviews.push(subview);
        let s = self.node_mut(subview);
        s.parent = Some(parent_view);
        s.owner_component = owner;
    }

    /// Link a node's owned model. `owner` is a component or the root.
    pub fn attach_model(&mut self, owner: NodeId, model: NodeId) {
        let owner_component = (self.node(owner).role == Role::Component).then_some(owner);
        self.node_mut(owner).model = Some(model);
        let m = self.node_mut(model);
        m.parent = Some(owner);
        m.owner_component = owner_component;
    }

    /// Link an unnamed owned node (collection, router, collection member).
    pub fn attach_loose(&mut self, owner: NodeId, node: NodeId) {
        let owner_component = match self.node(owner).role {
            Role::Component => Some(owner),
            Role::Root => None,
            _ => self.node(owner).owner_component,
        };
        self.node_mut(owner).attachments.push(node);
        let n = self.node_mut(node);
        n.parent = Some(owner);
        n.owner_component = owner_component;
    }

    /// Break the link between `owner` and `node` without freeing either.
    ///
    /// The child keeps running; callers re-anchor it or remove it. The
    /// `parent.children[name] == child` pair is broken atomically here.
    pub fn detach(&mut self, owner: NodeId, node: NodeId) {
        self.unlink(owner, node);
    }

    fn unlink(&mut self, owner: NodeId, node: NodeId) {
        if !self.is_alive(owner) {
            return;
        }
        {
            let o = self.node_mut(owner);
            o.children.retain(|c| c.id != node);
            o.subviews.retain(|s| *s != node);
            o.attachments.retain(|a| *a != node);
            if o.view == Some(node) {
                o.view = None;
            }
            if o.model == Some(node) {
                o.model = None;
            }
        }
        if self.is_alive(node) && self.node(node).parent == Some(owner) {
            self.node_mut(node).parent = None;
        }
    }

    // --- queries ---

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .map(|n| n.generation == id.1)
            .unwrap_or(false)
    }

    /// The tree's root, if one has been inserted.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Number of live nodes.
    pub fn alive_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// The node's role.
    pub fn role(&self, id: NodeId) -> Role {
        self.node(id).role
    }

    /// The node's kind identity.
    pub fn kind(&self, id: NodeId) -> &str {
        &self.node(id).kind
    }

    /// The generated instance name, if the node was attached as a named child.
    pub fn instance_name(&self, id: NodeId) -> Option<&str> {
        self.node(id).instance_name.as_deref()
    }

    /// The enclosing node, if any.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// The nearest owning component, if the node hangs off one.
    pub fn owner_component(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).owner_component
    }

    /// Named children, in attachment order.
    pub fn children(&self, id: NodeId) -> Vec<ChildEntry> {
        self.node(id).children.clone()
    }

    /// Look up a named child.
    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
    }

    /// The node's owned view, if any.
    pub fn view_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).view
    }

    /// The node's owned model, if any.
    pub fn model_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).model
    }

    /// Subviews in attachment order.
    pub fn subviews_of(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).subviews.clone()
    }

    /// Unnamed owned nodes in attachment order.
    pub fn attachments_of(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).attachments.clone()
    }

    /// Resolve the nearest component-or-root container for `id`.
    ///
    /// Components and the root resolve to themselves; everything else
    /// resolves through its owning component, falling back to the root.
    pub fn resolve_container(&self, id: NodeId) -> NodeId {
        match self.node(id).role {
            Role::Root | Role::Component => id,
            _ => self
                .node(id)
                .owner_component
                .unwrap_or_else(|| self.root.expect("tree has no root")),
        }
    }

    /// Node state flags.
    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.node(id).flags
    }

    /// Set the given flag bits.
    pub fn insert_flags(&mut self, id: NodeId, flags: NodeFlags) {
        self.node_mut(id).flags |= flags;
    }

    /// Clear the given flag bits.
    pub fn remove_flags(&mut self, id: NodeId, flags: NodeFlags) {
        self.node_mut(id).flags &= !flags;
    }

    // --- internals ---

    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }
}
