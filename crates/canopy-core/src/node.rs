//! The scene node capability set and the node type registry.
//!
//! Node types are not a class hierarchy: any type implementing [`SceneNode`]
//! can be registered in a [`NodeTypeRegistry`] under a type name together with
//! a [`NodeFactory`], and the scene builder instantiates it through that
//! factory with a [`NodeContext`].

use std::{any::Any, fmt};

use indexmap::IndexMap;

use crate::{
    color::Color,
    field::{FieldError, FieldMap},
    identifier::Id,
    tree::{Element, ElementId},
};

/// Index of a live scene node inside a document session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Wrap an arena index.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the arena index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Index of a namespace inside a document session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(usize);

impl NamespaceId {
    /// Wrap an arena index.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the arena index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns{}", self.0)
    }
}

/// Document-level information visible to node constructors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    /// URL the document was loaded from; may be empty.
    pub url: String,
}

/// Runtime state shared by all nodes of a document session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Runtime {
    time: f64,
    frame: u64,
}

impl Runtime {
    /// Current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of frames advanced so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Advance the clock by `dt` seconds and count one frame.
    pub fn advance(&mut self, dt: f64) {
        self.time += dt;
        self.frame += 1;
    }
}

/// Everything a node constructor gets to see.
#[derive(Debug, Clone, Copy)]
pub struct NodeContext<'a> {
    /// The owning document.
    pub document: &'a DocumentInfo,
    /// The document's runtime.
    pub runtime: &'a Runtime,
    /// The element being instantiated.
    pub element_id: ElementId,
    /// The element's tag and attributes.
    pub element: &'a Element,
    /// Namespace the node is built in.
    pub namespace: NamespaceId,
    /// Canonical name of the registered type.
    pub type_name: Id,
}

/// A dataflow edge leaving a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteLink {
    pub from_field: String,
    pub target: NodeId,
    pub to_field: String,
}

/// The capability set every scene node type provides.
pub trait SceneNode: fmt::Debug {
    /// Canonical type name.
    fn type_name(&self) -> Id;

    /// The node's fields.
    fn fields(&self) -> &FieldMap;

    /// The node's fields, mutably.
    fn fields_mut(&mut self) -> &mut FieldMap;

    /// Container field this node lands in when its element does not say.
    fn default_container_field(&self) -> &str {
        "children"
    }

    /// Attach a child node, using `container_field` to pick the slot.
    fn add_child(&mut self, child: NodeId, container_field: Option<&str>);

    /// Detach a child node. Returns whether it was attached.
    fn remove_child(&mut self, child: NodeId) -> bool;

    /// Children grouped by container field.
    fn children(&self) -> Vec<(&str, NodeId)>;

    /// Establish a dataflow edge from one of this node's fields.
    fn setup_route(&mut self, from_field: &str, target: NodeId, to_field: &str);

    /// Remove a previously established edge. Returns whether it existed.
    fn remove_route(&mut self, from_field: &str, target: NodeId, to_field: &str) -> bool;

    /// Outgoing dataflow edges.
    fn routes(&self) -> &[RouteLink];

    /// A field value changed.
    fn field_changed(&mut self, name: &str);

    /// Construction finished.
    fn node_changed(&mut self);

    /// Toggle highlighting.
    fn highlight(&mut self, enable: bool, color: Color);

    /// Parse attribute text into a declared field.
    ///
    /// Returns `Ok(false)` when the field is not declared.
    fn update_field(&mut self, name: &str, text: &str) -> Result<bool, FieldError> {
        self.fields_mut().update_from_str(name, text)
    }

    /// Downcasting support for hosts that know the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// Constructor registered for a node type.
pub type NodeFactory = fn(&NodeContext<'_>) -> Box<dyn SceneNode>;

/// A registered node type.
#[derive(Debug, Clone, Copy)]
pub struct NodeType {
    name: Id,
    factory: NodeFactory,
}

impl NodeType {
    /// Canonical type name as registered.
    pub fn name(&self) -> Id {
        self.name
    }

    /// Instantiate the type.
    pub fn instantiate(&self, ctx: &NodeContext<'_>) -> Box<dyn SceneNode> {
        (self.factory)(ctx)
    }
}

/// Case-insensitive registry of node types.
///
/// # Examples
///
/// ```
/// use canopy_core::{node::NodeTypeRegistry, nodes};
///
/// let mut registry = NodeTypeRegistry::new();
/// nodes::register_builtins(&mut registry);
///
/// assert!(registry.get("transform").is_some());
/// assert_eq!(registry.get("TRANSFORM").unwrap().name(), "Transform");
/// assert!(registry.get("Teapot").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct NodeTypeRegistry {
    types: IndexMap<String, NodeType>,
}

impl NodeTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a node type.
    pub fn register(&mut self, name: &str, factory: NodeFactory) {
        self.types.insert(
            name.to_ascii_lowercase(),
            NodeType {
                name: Id::new(name),
                factory,
            },
        );
    }

    /// Look up a type ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&NodeType> {
        self.types.get(&name.to_ascii_lowercase())
    }

    /// Whether a type is registered under `name` (ignoring ASCII case).
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_advance() {
        let mut runtime = Runtime::default();
        runtime.advance(0.5);
        runtime.advance(0.25);
        assert_eq!(runtime.frame(), 2);
        assert!((runtime.time() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(NodeId::new(3).to_string(), "n3");
        assert_eq!(NamespaceId::new(0).to_string(), "ns0");
    }
}
