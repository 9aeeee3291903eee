use super::NodeId;
use super::prop::{Prop, PropValue};

/// A single node of a system device tree.
///
/// Nodes are owned by the [`Tree`](super::Tree) arena and referenced by
/// [`NodeId`]. The parent link is a plain back-reference used only for
/// traversal; ownership runs strictly parent to child through `children`.
#[derive(Clone, Debug)]
pub struct Node {
    pub(super) name: String,
    pub(super) label: Option<String>,
    pub(super) parent: Option<NodeId>,
    pub(super) children: Vec<NodeId>,
    pub(super) props: Vec<Prop>,
    pub(super) phandle: Option<u32>,
}

impl Node {
    pub(super) fn new(name: &str, parent: Option<NodeId>) -> Node {
        Node {
            name: name.to_string(),
            label: None,
            parent,
            children: Vec::new(),
            props: Vec::new(),
            phandle: None,
        }
    }

    /// The node name, including any unit address tag (`cpu@0`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node label (alias), if one is set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The parent node id; `None` only for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child ids in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Properties in document order.
    pub fn props(&self) -> &[Prop] {
        &self.props
    }

    /// The node's phandle, if one has been assigned.
    pub fn phandle(&self) -> Option<u32> {
        self.phandle
    }

    /// Look up a property value by name.
    pub fn property(&self, name: &str) -> Option<&PropValue> {
        self.props
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// Whether the node carries the named property at all.
    pub fn has_property(&self, name: &str) -> bool {
        self.props.iter().any(|p| p.name == name)
    }
}
