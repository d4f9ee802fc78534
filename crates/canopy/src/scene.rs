//! Node and namespace arenas.
//!
//! The [`SceneGraph`] owns every live scene node and every namespace of a
//! document session. All cross links (node to namespace, namespace to parent)
//! are ids into these arenas, so nothing here owns anything through a back
//! reference.

use std::fmt;

use log::{debug, warn};

use canopy_core::{
    identifier::Id,
    node::{NamespaceId, NodeId, SceneNode},
    tree::ElementId,
};

use crate::{events::ListenerRegistry, namespace::Namespace};

/// A live scene node together with its links.
pub struct NodeRecord {
    node: Box<dyn SceneNode>,
    def_name: Option<String>,
    namespace: Option<NamespaceId>,
    element: Option<ElementId>,
    listeners: ListenerRegistry,
}

impl NodeRecord {
    /// The node itself.
    pub fn node(&self) -> &dyn SceneNode {
        self.node.as_ref()
    }

    /// The node itself, mutably.
    pub fn node_mut(&mut self) -> &mut dyn SceneNode {
        self.node.as_mut()
    }

    /// Name the node was last registered under.
    pub fn def_name(&self) -> Option<&str> {
        self.def_name.as_deref()
    }

    /// Namespace that owns the node; `None` once unregistered.
    pub fn namespace(&self) -> Option<NamespaceId> {
        self.namespace
    }

    /// Element the node mirrors.
    pub fn element(&self) -> Option<ElementId> {
        self.element
    }

    /// Listeners mirrored from the node's elements.
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub(crate) fn listeners_mut(&mut self) -> &mut ListenerRegistry {
        &mut self.listeners
    }

    pub(crate) fn set_element(&mut self, element: ElementId) {
        self.element = Some(element);
    }
}

impl fmt::Debug for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRecord")
            .field("type_name", &self.node.type_name())
            .field("def_name", &self.def_name)
            .field("namespace", &self.namespace)
            .field("element", &self.element)
            .finish()
    }
}

/// Arenas of scene nodes and namespaces.
///
/// Ids handed out by one graph are only meaningful for that graph; accessors
/// taking an id panic when given a foreign one.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<NodeRecord>,
    namespaces: Vec<Namespace>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a freshly constructed node.
    ///
    /// `namespace` is the scope the node was built in.
    pub fn add_node(
        &mut self,
        node: Box<dyn SceneNode>,
        namespace: Option<NamespaceId>,
        element: Option<ElementId>,
    ) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(NodeRecord {
            node,
            def_name: None,
            namespace,
            element,
            listeners: ListenerRegistry::new(),
        });
        id
    }

    /// Borrow a node record.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this graph.
    pub fn node(&self, id: NodeId) -> &NodeRecord {
        &self.nodes[id.index()]
    }

    /// Borrow a node record mutably.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this graph.
    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeRecord {
        &mut self.nodes[id.index()]
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeRecord)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, record)| (NodeId::new(index), record))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Create a detached namespace.
    pub fn create_namespace(&mut self, name: &str) -> NamespaceId {
        let id = NamespaceId::new(self.namespaces.len());
        self.namespaces.push(Namespace::new(name));
        debug!(namespace:% = id, name; "Namespace created");
        id
    }

    /// Borrow a namespace.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this graph.
    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.index()]
    }

    /// Borrow a namespace mutably.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this graph.
    pub fn namespace_mut(&mut self, id: NamespaceId) -> &mut Namespace {
        &mut self.namespaces[id.index()]
    }

    /// All namespaces in creation order.
    pub fn namespaces(&self) -> impl Iterator<Item = (NamespaceId, &Namespace)> {
        self.namespaces
            .iter()
            .enumerate()
            .map(|(index, ns)| (NamespaceId::new(index), ns))
    }

    /// Register `node` under `name` in `namespace`.
    ///
    /// A previous entry under the same name is replaced. The replaced node is
    /// left untouched and keeps reporting `namespace` as its owner.
    pub fn register(&mut self, namespace: NamespaceId, node: NodeId, name: &str) {
        let replaced = self.namespaces[namespace.index()].insert_symbol(name, node);
        let record = &mut self.nodes[node.index()];
        record.namespace = Some(namespace);
        record.def_name = Some(name.to_string());
        debug!(namespace:%, node:%, name, replaced:?; "Registered node");
    }

    /// Remove `name` from `namespace` and clear the node's owner.
    ///
    /// Returns the node that was registered, if any.
    pub fn unregister(&mut self, namespace: NamespaceId, name: &str) -> Option<NodeId> {
        let node = self.namespaces[namespace.index()].remove_symbol(name)?;
        self.nodes[node.index()].namespace = None;
        debug!(namespace:%, node:%, name; "Unregistered node");
        Some(node)
    }

    /// Look `name` up in `namespace` only.
    pub fn lookup(&self, namespace: NamespaceId, name: &str) -> Option<NodeId> {
        self.namespace(namespace).lookup(name)
    }

    /// `namespace` followed by its ancestors, innermost first.
    pub fn ancestors(&self, namespace: NamespaceId) -> impl Iterator<Item = NamespaceId> + '_ {
        std::iter::successors(Some(namespace), |ns| self.namespace(*ns).parent())
    }

    /// Make `child` a nested scope of `parent`.
    ///
    /// The child is detached from any previous parent first. Returns `false`
    /// and changes nothing when the link would create a cycle.
    pub fn add_child_namespace(&mut self, parent: NamespaceId, child: NamespaceId) -> bool {
        if self.ancestors(parent).any(|ns| ns == child) {
            warn!(parent:%, child:%; "Refusing to nest a namespace inside itself");
            return false;
        }
        if let Some(old) = self.namespace(child).parent() {
            self.namespace_mut(old).remove_child(child);
        }
        self.namespace_mut(child).set_parent(Some(parent));
        self.namespace_mut(parent).push_child(child);
        true
    }

    /// Detach `child` from `parent`. Returns whether it was nested there.
    pub fn remove_child_namespace(&mut self, parent: NamespaceId, child: NamespaceId) -> bool {
        let removed = self.namespace_mut(parent).remove_child(child);
        if removed {
            self.namespace_mut(child).set_parent(None);
        }
        removed
    }

    /// Resolve a `Scope__Local` style name seen from `namespace`.
    ///
    /// `namespace` and its ancestors are tried first, outward; each one named
    /// like the scope part is asked for the local part. Then the immediate
    /// children of `namespace` are tried the same way. The first hit wins.
    pub fn resolve_qualified(
        &self,
        namespace: NamespaceId,
        name: &str,
        separator: &str,
    ) -> Option<NodeId> {
        let (scope, local) = Id::new(name).split_scoped(separator)?;
        let local = local.to_string();
        let find_in = |ns: NamespaceId| {
            let space = self.namespace(ns);
            if scope == space.name() {
                space.lookup(&local)
            } else {
                None
            }
        };

        self.ancestors(namespace)
            .find_map(find_in)
            .or_else(|| {
                self.namespace(namespace)
                    .children()
                    .iter()
                    .copied()
                    .find_map(find_in)
            })
    }
}
