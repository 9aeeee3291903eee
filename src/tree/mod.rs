//! The node store: an owned, mutable system device tree.
//!
//! [`Tree`] owns every [`Node`] through an arena and is the sole mutation
//! surface. All structural operations keep the phandle index exact and are
//! transactional at single-call granularity: they either fully succeed or
//! leave the tree untouched.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::error::LopError;

pub mod node;
pub mod prop;

pub use node::Node;
pub use prop::{Prop, PropValue};

/// An arena index naming one node of a [`Tree`].
///
/// Ids are never reused within a run, so a dangling id is detected as
/// [`LopError::StaleNode`] rather than silently naming a new node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

const_assert!(core::mem::size_of::<NodeId>() == 4);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// An owned system device tree plus its phandle index.
pub struct Tree {
    slots: Vec<Option<Node>>,
    phandles: HashMap<u32, NodeId>,
    // High water mark; assign_phandle() hands out watermark + 1 so ids are
    // monotonic and never reused, even after a node is deleted.
    max_phandle: u32,
}

impl Tree {
    /// Create a tree holding only the root node `/`.
    pub fn new() -> Tree {
        Tree {
            slots: vec![Some(Node::new("", None))],
            phandles: HashMap::new(),
            max_phandle: 0,
        }
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Borrow a node, failing if the id names a removed node.
    pub fn node(&self, id: NodeId) -> Result<&Node, LopError> {
        self.slots
            .get(id.index())
            .and_then(|s| s.as_ref())
            .ok_or(LopError::StaleNode(id.0))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, LopError> {
        self.slots
            .get_mut(id.index())
            .and_then(|s| s.as_mut())
            .ok_or(LopError::StaleNode(id.0))
    }

    /// The absolute path of a node, derived from its parent chain.
    pub fn path(&self, id: NodeId) -> Result<String, LopError> {
        let mut segs = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            let n = self.node(c)?;
            segs.push(n.name().to_string());
            cur = n.parent();
        }
        segs.reverse();
        if segs.len() == 1 {
            return Ok("/".to_string());
        }
        Ok(segs.join("/"))
    }

    /// Look up a node by absolute path.
    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        let mut cur = self.root();
        for seg in path.split('/').filter(|s| !s.is_empty()) {
            let node = self.node(cur).ok()?;
            cur = *node.children().iter().find(|&&c| {
                self.node(c).map(|n| n.name() == seg).unwrap_or(false)
            })?;
        }
        Some(cur)
    }

    /// Look up a node by label (alias).
    pub fn lookup_label(&self, label: &str) -> Option<NodeId> {
        self.walk()
            .find(|&id| self.node(id).map(|n| n.label() == Some(label)).unwrap_or(false))
    }

    /// Look up the first node (document order) with the given name.
    pub fn lookup_name(&self, name: &str) -> Option<NodeId> {
        self.walk()
            .find(|&id| self.node(id).map(|n| n.name() == name).unwrap_or(false))
    }

    /// The node currently holding the given phandle.
    pub fn node_by_phandle(&self, phandle: u32) -> Option<NodeId> {
        self.phandles.get(&phandle).copied()
    }

    /// Create an empty child of `parent`. Fails if a sibling already has
    /// the name.
    pub fn create(&mut self, parent: NodeId, name: &str) -> Result<NodeId, LopError> {
        if self.child_by_name(parent, name)?.is_some() {
            return Err(LopError::NodeExists {
                path: format!("{}/{}", self.path(parent)?.trim_end_matches('/'), name),
            });
        }
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(Node::new(name, Some(parent))));
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    fn child_by_name(&self, parent: NodeId, name: &str) -> Result<Option<NodeId>, LopError> {
        for &c in self.node(parent)?.children() {
            if self.node(c)?.name() == name {
                return Ok(Some(c));
            }
        }
        Ok(None)
    }

    /// Remove a node and its whole subtree, dropping every contained
    /// phandle from the index.
    pub fn remove(&mut self, id: NodeId) -> Result<(), LopError> {
        let parent = self
            .node(id)?
            .parent()
            .ok_or(LopError::RootImmutable("removed"))?;
        let doomed = self.collect_subtree(id)?;
        self.node_mut(parent)?.children.retain(|&c| c != id);
        for d in doomed {
            if let Some(node) = self.slots[d.index()].take() {
                if let Some(ph) = node.phandle {
                    self.phandles.remove(&ph);
                }
            }
        }
        Ok(())
    }

    fn collect_subtree(&self, id: NodeId) -> Result<Vec<NodeId>, LopError> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            for &c in self.node(cur)?.children() {
                stack.push(c);
            }
        }
        Ok(out)
    }

    /// Whether `descendant` sits somewhere below `ancestor`.
    pub fn is_descendant(&self, ancestor: NodeId, descendant: NodeId) -> Result<bool, LopError> {
        let mut cur = self.node(descendant)?.parent();
        while let Some(c) = cur {
            if c == ancestor {
                return Ok(true);
            }
            cur = self.node(c)?.parent();
        }
        Ok(false)
    }

    /// Move a node (and its subtree) under a new parent, optionally taking
    /// a new name. Rejects cycles and sibling collisions before touching
    /// anything, so a failed call leaves the tree unchanged.
    pub fn reparent(
        &mut self,
        id: NodeId,
        new_parent: NodeId,
        new_name: Option<&str>,
    ) -> Result<(), LopError> {
        let old_parent = self
            .node(id)?
            .parent()
            .ok_or(LopError::RootImmutable("reparented"))?;
        if new_parent == id || self.is_descendant(id, new_parent)? {
            return Err(LopError::Cycle {
                path: self.path(id)?,
                dest: self.path(new_parent)?,
            });
        }
        let name = match new_name {
            Some(n) => n.to_string(),
            None => self.node(id)?.name().to_string(),
        };
        if let Some(existing) = self.child_by_name(new_parent, &name)? {
            if existing != id {
                return Err(LopError::NodeExists {
                    path: format!("{}/{}", self.path(new_parent)?.trim_end_matches('/'), name),
                });
            }
        }
        self.node_mut(old_parent)?.children.retain(|&c| c != id);
        self.node_mut(new_parent)?.children.push(id);
        let node = self.node_mut(id)?;
        node.parent = Some(new_parent);
        node.name = name;
        Ok(())
    }

    /// Rename a node in place. Fails on a sibling collision.
    pub fn rename(&mut self, id: NodeId, new_name: &str) -> Result<(), LopError> {
        let parent = self
            .node(id)?
            .parent()
            .ok_or(LopError::RootImmutable("renamed"))?;
        if let Some(existing) = self.child_by_name(parent, new_name)? {
            if existing != id {
                return Err(LopError::NodeExists {
                    path: format!("{}/{}", self.path(parent)?.trim_end_matches('/'), new_name),
                });
            }
        }
        self.node_mut(id)?.name = new_name.to_string();
        Ok(())
    }

    /// Set (replace or append) a property, preserving property order.
    pub fn set_property(
        &mut self,
        id: NodeId,
        name: &str,
        value: PropValue,
    ) -> Result<(), LopError> {
        let node = self.node_mut(id)?;
        match node.props.iter_mut().find(|p| p.name == name) {
            Some(p) => p.value = value,
            None => node.props.push(Prop::new(name, value)),
        }
        Ok(())
    }

    /// Delete a property; returns whether it was present.
    pub fn remove_property(&mut self, id: NodeId, name: &str) -> Result<bool, LopError> {
        let node = self.node_mut(id)?;
        let before = node.props.len();
        node.props.retain(|p| p.name != name);
        Ok(node.props.len() != before)
    }

    /// Set or clear a node's label.
    pub fn set_label(&mut self, id: NodeId, label: Option<&str>) -> Result<(), LopError> {
        self.node_mut(id)?.label = label.map(|l| l.to_string());
        Ok(())
    }

    /// The node's phandle, if assigned.
    pub fn phandle_of(&self, id: NodeId) -> Result<Option<u32>, LopError> {
        Ok(self.node(id)?.phandle())
    }

    /// Assign a fresh phandle to a node that lacks one, or return the
    /// existing assignment. Fresh ids are strictly greater than every id
    /// ever assigned in this run, so deletion never frees an id for reuse.
    pub fn assign_phandle(&mut self, id: NodeId) -> Result<u32, LopError> {
        if self.node(id)?.parent().is_none() {
            return Err(LopError::RootImmutable("given a phandle"));
        }
        if let Some(ph) = self.node(id)?.phandle() {
            return Ok(ph);
        }
        let ph = self.max_phandle + 1;
        self.max_phandle = ph;
        self.node_mut(id)?.phandle = Some(ph);
        self.phandles.insert(ph, id);
        Ok(ph)
    }

    /// Record an explicit phandle on ingest. Fails if the id is already
    /// held by another node or this node already has a different one.
    pub fn set_phandle(&mut self, id: NodeId, phandle: u32) -> Result<(), LopError> {
        match self.node(id)?.phandle() {
            Some(existing) if existing == phandle => return Ok(()),
            Some(_) => return Err(LopError::PhandleInUse(phandle)),
            None => {}
        }
        if self.phandles.contains_key(&phandle) {
            return Err(LopError::PhandleInUse(phandle));
        }
        self.node_mut(id)?.phandle = Some(phandle);
        self.phandles.insert(phandle, id);
        if phandle > self.max_phandle {
            self.max_phandle = phandle;
        }
        Ok(())
    }

    /// Deep-copy a subtree under `new_parent`. Copies carry properties and
    /// child structure but never labels or phandles, keeping both aliases
    /// and the phandle index unambiguous.
    pub fn duplicate(
        &mut self,
        src: NodeId,
        new_parent: NodeId,
        new_name: &str,
    ) -> Result<NodeId, LopError> {
        if src == new_parent || self.is_descendant(src, new_parent)? {
            return Err(LopError::Cycle {
                path: self.path(src)?,
                dest: self.path(new_parent)?,
            });
        }
        let copy = self.create(new_parent, new_name)?;
        self.node_mut(copy)?.props = self.node(src)?.props().to_vec();
        let children: Vec<NodeId> = self.node(src)?.children().to_vec();
        for child in children {
            let name = self.node(child)?.name().to_string();
            self.duplicate(child, copy, &name)?;
        }
        Ok(copy)
    }

    /// Pre-order iterator over the whole tree in document order.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            tree: self,
            stack: vec![self.root()],
        }
    }

    /// Pre-order iterator over the subtree rooted at `id` (inclusive).
    pub fn walk_from(&self, id: NodeId) -> Walk<'_> {
        Walk {
            tree: self,
            stack: vec![id],
        }
    }

    /// Total number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        false // the root always exists
    }

    /// Render the tree as indented source-style text. Used for debug
    /// output and for whole-tree comparisons in tests.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_node(self.root(), 0, &mut out);
        out
    }

    fn render_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = match self.node(id) {
            Ok(n) => n,
            Err(_) => return,
        };
        let pad = "    ".repeat(depth);
        let name = if depth == 0 { "/" } else { node.name() };
        match node.label() {
            Some(l) => {
                let _ = writeln!(out, "{}{}: {} {{", pad, l, name);
            }
            None => {
                let _ = writeln!(out, "{}{} {{", pad, name);
            }
        }
        if let Some(ph) = node.phandle() {
            let _ = writeln!(out, "{}    phandle = <{:#x}>;", pad, ph);
        }
        for prop in node.props() {
            match &prop.value {
                PropValue::Empty => {
                    let _ = writeln!(out, "{}    {};", pad, prop.name);
                }
                PropValue::Cells(cells) => {
                    let body: Vec<String> = cells.iter().map(|c| format!("{:#x}", c)).collect();
                    let _ = writeln!(out, "{}    {} = <{}>;", pad, prop.name, body.join(" "));
                }
                PropValue::Strings(strs) => {
                    let body: Vec<String> = strs.iter().map(|s| format!("\"{}\"", s)).collect();
                    let _ = writeln!(out, "{}    {} = {};", pad, prop.name, body.join(", "));
                }
            }
        }
        for &child in node.children() {
            self.render_node(child, depth + 1, out);
        }
        let _ = writeln!(out, "{}}};", pad);
    }
}

impl Default for Tree {
    fn default() -> Tree {
        Tree::new()
    }
}

/// Pre-order, document-order node iterator.
pub struct Walk<'t> {
    tree: &'t Tree,
    stack: Vec<NodeId>,
}

impl<'t> Iterator for Walk<'t> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        if let Ok(node) = self.tree.node(id) {
            for &c in node.children().iter().rev() {
                self.stack.push(c);
            }
        }
        Some(id)
    }
}
