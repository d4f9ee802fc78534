//! The external, DOM-like element tree a scene is built from.
//!
//! An [`ElementTree`] is an arena of [`TreeNode`]s addressed by [`ElementId`].
//! Besides tag, attributes and children, every element carries the
//! [`ElementState`] the scene builder attaches to it: the live scene node it
//! mirrors, the namespace a ROUTE was wired in, and the flags recording which
//! host-facing operations were installed.

use std::fmt;

use indexmap::IndexMap;

use crate::{
    node::{NamespaceId, NodeId},
    span::Span,
};

/// Index of a node inside an [`ElementTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

impl ElementId {
    /// Returns the arena index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Builder-managed state attached to an element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementState {
    /// The live scene node this element mirrors (or aliases, for USE).
    pub node: Option<NodeId>,
    /// Namespace a ROUTE element was wired in.
    pub route_namespace: Option<NamespaceId>,
    /// A ROUTE element waits in its namespace for its endpoints.
    pub route_pending: bool,
    /// Listener add/remove calls are mirrored on the node's registry.
    pub listeners_bridged: bool,
    /// Field get/set/request/release operations are available.
    pub field_interface: bool,
    /// Attribute get/set/has go through the node's fields.
    pub attribute_shim: bool,
    /// The highlight operation is installed.
    pub highlight: bool,
}

/// An element: tag, ordered attributes and builder state.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    tag: String,
    attributes: IndexMap<String, String>,
    /// Builder-managed state.
    pub state: ElementState,
}

impl Element {
    /// Create an element with the given tag and attributes.
    pub fn new(tag: impl Into<String>, attributes: IndexMap<String, String>) -> Self {
        Self {
            tag: tag.into(),
            attributes,
            state: ElementState::default(),
        }
    }

    /// The tag as written.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Whether the tag equals `name` ignoring ASCII case.
    pub fn is_tag(&self, name: &str) -> bool {
        self.tag.eq_ignore_ascii_case(name)
    }

    /// All attributes in document order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Exact-name attribute lookup.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Attribute lookup trying `name` first and then its lowercase spelling.
    pub fn attribute_or_lower(&self, name: &str) -> Option<&str> {
        self.attribute(name)
            .or_else(|| self.attribute(&name.to_ascii_lowercase()))
    }

    /// Whether the attribute exists under `name` or its lowercase spelling.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_or_lower(name).is_some()
    }

    /// Set or replace an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.shift_remove(name)
    }
}

/// What a tree node holds.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNodeKind {
    Element(Element),
    Text(String),
}

/// One node of the tree together with its links.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    kind: TreeNodeKind,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    span: Span,
}

impl TreeNode {
    /// The node payload.
    pub fn kind(&self) -> &TreeNodeKind {
        &self.kind
    }

    /// The parent node, if attached.
    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    /// Children in document order.
    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    /// Source span of the node.
    pub fn span(&self) -> Span {
        self.span
    }

    /// The element payload, if this is an element.
    pub fn as_element(&self) -> Option<&Element> {
        match &self.kind {
            TreeNodeKind::Element(element) => Some(element),
            TreeNodeKind::Text(_) => None,
        }
    }
}

/// Arena of tree nodes.
///
/// Nodes are never freed; detaching a subtree only unlinks it from its parent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementTree {
    nodes: Vec<TreeNode>,
    roots: Vec<ElementId>,
}

impl ElementTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever allocated.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level nodes in document order.
    pub fn roots(&self) -> &[ElementId] {
        &self.roots
    }

    /// The first top-level element.
    pub fn document_element(&self) -> Option<ElementId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.element(*id).is_some())
    }

    fn push(&mut self, kind: TreeNodeKind, parent: Option<ElementId>, span: Span) -> ElementId {
        let id = ElementId(self.nodes.len());
        self.nodes.push(TreeNode {
            kind,
            parent,
            children: Vec::new(),
            span,
        });
        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Append a new element under `parent` (or as a top-level node).
    pub fn add_element(
        &mut self,
        parent: Option<ElementId>,
        element: Element,
        span: Span,
    ) -> ElementId {
        self.push(TreeNodeKind::Element(element), parent, span)
    }

    /// Append a text node under `parent` (or as a top-level node).
    pub fn add_text(
        &mut self,
        parent: Option<ElementId>,
        text: impl Into<String>,
        span: Span,
    ) -> ElementId {
        self.push(TreeNodeKind::Text(text.into()), parent, span)
    }

    /// Borrow a node.
    pub fn get(&self, id: ElementId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    /// Borrow an element.
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.get(id).and_then(TreeNode::as_element)
    }

    /// Borrow an element mutably.
    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        match self.nodes.get_mut(id.0).map(|node| &mut node.kind) {
            Some(TreeNodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    /// Children of a node in document order (empty for unknown ids).
    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.get(id).map(TreeNode::children).unwrap_or(&[])
    }

    /// Element children only.
    pub fn child_elements(&self, id: ElementId) -> Vec<ElementId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.element(*child).is_some())
            .collect()
    }

    /// Parent of a node.
    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.get(id).and_then(TreeNode::parent)
    }

    /// Source span of a node (empty for unknown ids).
    pub fn span(&self, id: ElementId) -> Span {
        self.get(id).map(TreeNode::span).unwrap_or_default()
    }

    /// Pre-order iterator over `id` and all of its descendants.
    pub fn descendants(&self, id: ElementId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// Attach an unattached node (or move an attached one) under `parent`.
    pub fn append_child(&mut self, parent: ElementId, child: ElementId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Unlink a node from its parent (or from the top-level list).
    pub fn detach(&mut self, id: ElementId) {
        match self.nodes[id.0].parent.take() {
            Some(parent) => self.nodes[parent.0].children.retain(|c| *c != id),
            None => self.roots.retain(|r| *r != id),
        }
    }

    /// Deep-copy the subtree at `id`, attaching the copy under `parent`.
    ///
    /// Builder state is not copied; the clone is an unbuilt subtree.
    pub fn clone_subtree(&mut self, id: ElementId, parent: Option<ElementId>) -> ElementId {
        let source = self.clone_detached(id);
        self.import_subtree(&source.0, source.1, parent)
    }

    fn clone_detached(&self, id: ElementId) -> (ElementTree, ElementId) {
        let mut copy = ElementTree::new();
        let root = copy.import_subtree(self, id, None);
        (copy, root)
    }

    /// Copy the subtree at `id` of `other` into this tree under `parent`.
    ///
    /// Builder state is reset on every copied element.
    pub fn import_subtree(
        &mut self,
        other: &ElementTree,
        id: ElementId,
        parent: Option<ElementId>,
    ) -> ElementId {
        let node = &other.nodes[id.0];
        let kind = match &node.kind {
            TreeNodeKind::Element(element) => {
                let mut element = element.clone();
                element.state = ElementState::default();
                TreeNodeKind::Element(element)
            }
            TreeNodeKind::Text(text) => TreeNodeKind::Text(text.clone()),
        };
        let new_id = self.push(kind, parent, node.span);
        for child in &node.children {
            self.import_subtree(other, *child, Some(new_id));
        }
        new_id
    }
}

/// Pre-order traversal produced by [`ElementTree::descendants`].
pub struct Descendants<'a> {
    tree: &'a ElementTree,
    stack: Vec<ElementId>,
}

impl Iterator for Descendants<'_> {
    type Item = ElementId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}
