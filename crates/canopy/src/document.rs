//! A document session: the element tree, the scene built from it and
//! everything the host talks to afterwards.

use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, info, warn};

use canopy_core::{
    color::Color,
    node::{DocumentInfo, NamespaceId, NodeId, NodeTypeRegistry, Runtime},
    tree::{ElementId, ElementTree},
};
use canopy_parser::error::{Diagnostic, ErrorCode};

use crate::{
    builder::{TreeBuilder, read_route},
    config::AppConfig,
    error::CanopyError,
    events::{Event, Listener, ListenerId, ListenerRegistry},
    loader::LoadQueue,
    namespace::PendingRoute,
    scene::SceneGraph,
    template::TemplateRef,
};

/// One loaded scene document.
///
/// Created by [`SceneBuilder::load`](crate::SceneBuilder::load). The document
/// owns the element tree and the scene graph mirroring it; elements and nodes
/// are addressed by [`ElementId`] and [`NodeId`].
#[derive(Debug)]
pub struct Document {
    pub(crate) info: DocumentInfo,
    pub(crate) tree: ElementTree,
    pub(crate) graph: SceneGraph,
    pub(crate) registry: NodeTypeRegistry,
    pub(crate) runtime: Runtime,
    pub(crate) config: AppConfig,
    pub(crate) root_namespace: NamespaceId,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) needs_redraw: bool,
    pub(crate) warnings: Vec<Diagnostic>,
    pub(crate) loads: LoadQueue,
    /// Instance nodes built ahead of the general child walk.
    pub(crate) expansions: IndexMap<ElementId, Option<NodeId>>,
    /// Templates currently being expanded, innermost last.
    pub(crate) expanding: Vec<TemplateRef>,
    element_listeners: IndexMap<ElementId, ListenerRegistry>,
    next_listener: u64,
}

impl Document {
    pub(crate) fn new(
        tree: ElementTree,
        url: &str,
        registry: NodeTypeRegistry,
        config: AppConfig,
    ) -> Self {
        let mut graph = SceneGraph::new();
        let root_namespace = graph.create_namespace("");
        graph.namespace_mut(root_namespace).set_base_url(url);
        Self {
            info: DocumentInfo {
                url: url.to_string(),
            },
            tree,
            graph,
            registry,
            runtime: Runtime::default(),
            config,
            root_namespace,
            roots: Vec::new(),
            needs_redraw: false,
            warnings: Vec::new(),
            loads: LoadQueue::default(),
            expansions: IndexMap::new(),
            expanding: Vec::new(),
            element_listeners: IndexMap::new(),
            next_listener: 0,
        }
    }

    /// Build the scene for every top-level element.
    pub(crate) fn build(&mut self) {
        let roots = self.tree.roots().to_vec();
        let namespace = self.root_namespace;
        let built = TreeBuilder::new(self, namespace).build_children(&roots, None);
        self.roots = built;
        self.needs_redraw = true;
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The document-level namespace.
    pub fn root_namespace(&self) -> NamespaceId {
        self.root_namespace
    }

    /// Nodes built from the top-level elements.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Scene node an element is linked to (its own node, or the aliased one).
    pub fn node_of(&self, element: ElementId) -> Option<NodeId> {
        self.tree.element(element)?.state.node
    }

    /// Look `name` up in the root namespace.
    pub fn named_node(&self, name: &str) -> Option<NodeId> {
        self.graph.lookup(self.root_namespace, name)
    }

    /// Whether anything changed since the last [`clear_redraw`](Self::clear_redraw).
    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    pub fn clear_redraw(&mut self) {
        self.needs_redraw = false;
    }

    /// Warnings recorded while building, oldest first.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Log a recoverable problem and keep it as a diagnostic.
    pub(crate) fn warn(&mut self, element: ElementId, code: ErrorCode, message: impl Into<String>) {
        let message = message.into();
        warn!(element:%, code:%; "{message}");
        let span = self.tree.span(element);
        self.warnings.push(
            Diagnostic::warning(message)
                .with_code(code)
                .with_label(span, code.description()),
        );
    }

    /// Link an element to the node it produced.
    pub(crate) fn link(&mut self, element: ElementId, node: NodeId) {
        self.graph.node_mut(node).set_element(element);
        if let Some(el) = self.tree.element_mut(element) {
            el.state.highlight = true;
        }
        self.link_alias(element, node);
    }

    /// Point an element at an existing node without claiming it.
    pub(crate) fn link_alias(&mut self, element: ElementId, node: NodeId) {
        let Some(el) = self.tree.element_mut(element) else {
            return;
        };
        el.state.node = Some(node);
        if !el.state.listeners_bridged {
            return;
        }
        if let Some(registry) = self.element_listeners.get(&element) {
            let mirrored = self.graph.node_mut(node).listeners_mut();
            for (event_type, id, listener) in registry.entries() {
                mirrored.add(event_type, id, Rc::clone(listener));
            }
        }
    }

    /// Attach `child` under `parent` in the slot the child's element asks for.
    pub(crate) fn attach_child(&mut self, parent: NodeId, child: NodeId, element: ElementId) {
        let slot = self
            .tree
            .element(element)
            .and_then(|el| el.attribute_or_lower("containerField"))
            .map(str::to_string)
            .unwrap_or_else(|| {
                self.graph
                    .node(child)
                    .node()
                    .default_container_field()
                    .to_string()
            });
        debug!(parent:%, child:%, slot; "Attaching child");
        self.graph.node_mut(parent).node_mut().add_child(child, Some(&slot));
    }

    /// Wire a route whose endpoints are known.
    pub(crate) fn connect_route(
        &mut self,
        namespace: NamespaceId,
        from: NodeId,
        to: NodeId,
        route: &PendingRoute,
    ) {
        self.graph
            .node_mut(from)
            .node_mut()
            .setup_route(&route.from_field, to, &route.to_field);
        if let Some(el) = self.tree.element_mut(route.element) {
            el.state.route_namespace = Some(namespace);
            el.state.route_pending = false;
        }
        debug!(
            namespace:%,
            from = route.from_node.as_str(),
            from_field = route.from_field.as_str(),
            to = route.to_node.as_str(),
            to_field = route.to_field.as_str();
            "Route wired"
        );
    }

    /// Tear down a route element's edge.
    ///
    /// A wired route is removed from its source node using the namespace the
    /// route was wired in. A route still waiting for its endpoints is dropped
    /// from the waiting list. Returns whether anything was removed.
    pub fn remove_route(&mut self, route_element: ElementId) -> bool {
        let Some(el) = self.tree.element(route_element) else {
            return false;
        };
        let route = read_route(route_element, el);

        if let Some(namespace) = el.state.route_namespace {
            let endpoints = (
                self.graph.lookup(namespace, &route.from_node),
                self.graph.lookup(namespace, &route.to_node),
            );
            if let Some(el) = self.tree.element_mut(route_element) {
                el.state.route_namespace = None;
            }
            let (Some(from), Some(to)) = endpoints else {
                return false;
            };
            let removed = self
                .graph
                .node_mut(from)
                .node_mut()
                .remove_route(&route.from_field, to, &route.to_field);
            debug!(route:% = route_element, removed; "Route removed");
            return removed;
        }

        if let Some(el) = self.tree.element_mut(route_element) {
            el.state.route_pending = false;
        }
        let namespaces: Vec<NamespaceId> = self.graph.namespaces().map(|(id, _)| id).collect();
        let mut removed = false;
        for namespace in namespaces {
            let pending = self.graph.namespace_mut(namespace).pending_routes_mut();
            let before = pending.len();
            pending.retain(|p| p.element != route_element);
            removed |= pending.len() != before;
        }
        removed
    }

    /// Set an attribute on an element.
    ///
    /// When the element is linked to a node and the attribute names one of
    /// its fields, the field is updated, the node is told and a redraw is
    /// requested. Returns whether a field was updated.
    pub fn set_attribute(&mut self, element: ElementId, name: &str, value: &str) -> bool {
        let Some(el) = self.tree.element_mut(element) else {
            return false;
        };
        el.set_attribute(name, value);
        let Some(node) = el.state.node else {
            return false;
        };
        let shimmed = el.state.attribute_shim;

        let record = self.graph.node_mut(node);
        match record.node_mut().update_field(name, value) {
            Ok(true) => {
                record.node_mut().field_changed(name);
                self.needs_redraw = true;
                debug!(element:%, node:%, field = name, shimmed; "Attribute updated field");
                true
            }
            Ok(false) => false,
            Err(err) => {
                warn!(element:%, field = name, err:%; "Ignoring invalid attribute value");
                false
            }
        }
    }

    /// Read an attribute.
    ///
    /// With the attribute shim installed the lowercase spelling is tried too,
    /// and a missing attribute falls back to the node's field value.
    pub fn get_attribute(&self, element: ElementId, name: &str) -> Option<String> {
        let el = self.tree.element(element)?;
        if !el.state.attribute_shim {
            return el.attribute(name).map(str::to_string);
        }
        if let Some(value) = el.attribute_or_lower(name) {
            return Some(value.to_string());
        }
        let node = el.state.node?;
        self.graph
            .node(node)
            .node()
            .fields()
            .get(name)
            .map(|value| value.to_attribute_string())
    }

    /// Whether an element has an attribute (lowercase spelling too with the shim).
    pub fn has_attribute(&self, element: ElementId, name: &str) -> bool {
        match self.tree.element(element) {
            Some(el) if el.state.attribute_shim => el.has_attribute(name),
            Some(el) => el.attribute(name).is_some(),
            None => false,
        }
    }

    /// Toggle highlighting of a built element.
    ///
    /// `color` is three floats or a CSS color. An unreadable color only
    /// matters when enabling; disabling ignores it.
    pub fn highlight(&mut self, element: ElementId, enable: bool, color: &str) -> bool {
        let Some(node) = self
            .tree
            .element(element)
            .filter(|el| el.state.highlight)
            .and_then(|el| el.state.node)
        else {
            return false;
        };
        let color = match Color::parse(color) {
            Ok(color) => color,
            Err(err) if enable => {
                self.warn(element, ErrorCode::W107, err);
                return false;
            }
            Err(_) => Color::default(),
        };
        self.graph.node_mut(node).node_mut().highlight(enable, color);
        self.needs_redraw = true;
        true
    }

    /// Register a listener on an element.
    ///
    /// Once the element is bridged and linked, the listener is mirrored on
    /// the node so it can be enumerated and replayed there.
    pub fn add_event_listener(
        &mut self,
        element: ElementId,
        event_type: &str,
        listener: Listener,
    ) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId::new(self.next_listener);
        self.element_listeners
            .entry(element)
            .or_default()
            .add(event_type, id, Rc::clone(&listener));
        if let Some(node) = self.bridged_node(element) {
            self.graph
                .node_mut(node)
                .listeners_mut()
                .add(event_type, id, listener);
        }
        id
    }

    /// Remove a listener from an element and from its mirror.
    pub fn remove_event_listener(
        &mut self,
        element: ElementId,
        event_type: &str,
        id: ListenerId,
    ) -> bool {
        let removed = self
            .element_listeners
            .get_mut(&element)
            .is_some_and(|registry| registry.remove(event_type, id));
        if let Some(node) = self.bridged_node(element) {
            self.graph
                .node_mut(node)
                .listeners_mut()
                .remove(event_type, id);
        }
        removed
    }

    /// Listener ids mirrored on a node for `event_type`.
    pub fn listeners(&self, node: NodeId, event_type: &str) -> Vec<ListenerId> {
        self.graph.node(node).listeners().ids(event_type)
    }

    /// Replay a node's mirrored listeners for `event_type`.
    ///
    /// Returns how many listeners were called.
    pub fn dispatch_event(&self, node: NodeId, event_type: &str) -> usize {
        let record = self.graph.node(node);
        let event = Event {
            event_type: event_type.to_string(),
            element: record.element(),
            node: Some(node),
        };
        let callbacks = record.listeners().callbacks(event_type);
        for callback in &callbacks {
            callback(&event);
        }
        callbacks.len()
    }

    fn bridged_node(&self, element: ElementId) -> Option<NodeId> {
        let el = self.tree.element(element)?;
        if el.state.listeners_bridged {
            el.state.node
        } else {
            None
        }
    }

    /// Build one element in `namespace` without attaching the result.
    ///
    /// An element that is already built is left alone and reported.
    pub fn build_element(&mut self, element: ElementId, namespace: NamespaceId) -> Option<NodeId> {
        TreeBuilder::new(self, namespace).build(element, None)
    }

    /// Read `source` as a fragment and build it under an existing element.
    ///
    /// The fragment is built in the namespace of the element's node and
    /// attached to that node. Waiting routes of that namespace are retried.
    ///
    /// # Errors
    ///
    /// Returns [`CanopyError::Parse`] when the fragment does not read and
    /// [`CanopyError::Unlinked`] when the element has no scene node.
    pub fn attach_subtree(
        &mut self,
        parent_element: ElementId,
        source: &str,
    ) -> Result<Vec<NodeId>, CanopyError> {
        let fragment = canopy_parser::parse(source)
            .map_err(|err| CanopyError::new_parse_error(err, source))?;
        let parent = self
            .node_of(parent_element)
            .ok_or(CanopyError::Unlinked(parent_element))?;
        let namespace = self
            .graph
            .node(parent)
            .namespace()
            .unwrap_or(self.root_namespace);

        let imported: Vec<ElementId> = fragment
            .roots()
            .iter()
            .map(|root| self.tree.import_subtree(&fragment, *root, Some(parent_element)))
            .collect();
        let nodes = TreeBuilder::new(self, namespace).build_children(&imported, Some(parent));
        self.resolve_pending_routes(namespace);
        self.needs_redraw = true;

        info!(parent:%, namespace:%, nodes = nodes.len(); "Subtree attached");
        Ok(nodes)
    }

    /// Detach a namespace from its parent.
    ///
    /// Symbols stay registered in the detached namespace. Returns `false` for
    /// a namespace without a parent.
    pub fn remove_namespace(&mut self, namespace: NamespaceId) -> bool {
        match self.graph.namespace(namespace).parent() {
            Some(parent) => self.graph.remove_child_namespace(parent, namespace),
            None => false,
        }
    }
}
