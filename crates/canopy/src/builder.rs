//! The tree builder.
//!
//! A [`TreeBuilder`] walks elements depth first inside one namespace and
//! decides, per element, between aliasing an existing node (`USE`), wiring a
//! route, instantiating a new node or handling one of the auxiliary tags.
//! Problems with one element are recorded as warnings on the document and
//! never stop the walk.

use log::{debug, trace};

use canopy_core::{
    node::{NamespaceId, NodeContext, NodeId},
    tree::{Element, ElementId},
};
use canopy_parser::error::ErrorCode;

use crate::{document::Document, namespace::PendingRoute};

/// Read a ROUTE element's endpoints, accepting lowercase attribute spellings.
pub(crate) fn read_route(id: ElementId, element: &Element) -> PendingRoute {
    let attr = |name: &str| element.attribute_or_lower(name).unwrap_or_default();
    PendingRoute::new(
        id,
        attr("fromNode"),
        attr("toNode"),
        attr("fromField"),
        attr("toField"),
    )
}

/// Builds elements into scene nodes inside one namespace.
pub(crate) struct TreeBuilder<'d> {
    pub(crate) doc: &'d mut Document,
    pub(crate) namespace: NamespaceId,
}

impl<'d> TreeBuilder<'d> {
    pub(crate) fn new(doc: &'d mut Document, namespace: NamespaceId) -> Self {
        Self { doc, namespace }
    }

    /// Build sibling nodes in document order.
    ///
    /// Template declarations and instances among `children` are handled
    /// first, so a declaration is visible to every sibling instance. Built
    /// nodes are attached to `parent` when there is one.
    pub(crate) fn build_children(
        &mut self,
        children: &[ElementId],
        parent: Option<NodeId>,
    ) -> Vec<NodeId> {
        self.declare_templates(children, parent);

        let mut built = Vec::new();
        for &child in children {
            if let Some(node) = self.build(child, parent) {
                if let Some(parent) = parent {
                    self.doc.attach_child(parent, node, child);
                }
                built.push(node);
            }
        }
        built
    }

    /// Build one element.
    ///
    /// Returns the new node, the aliased node for `USE`, or nothing.
    pub(crate) fn build(&mut self, id: ElementId, parent: Option<NodeId>) -> Option<NodeId> {
        // Text and other non-element nodes carry nothing to build.
        let element = self.doc.tree.element(id)?;
        let tag = element.tag().to_string();
        let built = element.state.node;
        let routed = element.state.route_namespace.is_some() || element.state.route_pending;

        // Instances expanded by the sibling pass of `build_children`.
        if let Some(expanded) = self.doc.expansions.shift_remove(&id) {
            return expanded;
        }

        if let Some(node) = built {
            self.doc.warn(
                id,
                ErrorCode::W102,
                format!("<{tag}> is already built as node {node}"),
            );
            return None;
        }
        if routed {
            self.doc
                .warn(id, ErrorCode::W102, format!("<{tag}> is already wired"));
            return None;
        }

        if !self.is_scene_element(&tag) {
            return self.build_auxiliary(id, &tag, parent);
        }

        self.bridge_listeners(id);

        if let Some(name) = self.use_name(id) {
            return self.resolve_use(id, &name);
        }

        if tag.eq_ignore_ascii_case("route") {
            self.wire_route(id);
            return None;
        }

        self.instantiate(id, &tag)
    }

    fn is_scene_element(&self, tag: &str) -> bool {
        tag.eq_ignore_ascii_case("route") || self.doc.registry.contains(tag)
    }

    fn bridge_listeners(&mut self, id: ElementId) {
        if let Some(element) = self.doc.tree.element_mut(id) {
            element.state.listeners_bridged = true;
        }
    }

    /// The `USE` value, storing a lowercase `use` under `USE`.
    fn use_name(&mut self, id: ElementId) -> Option<String> {
        let element = self.doc.tree.element_mut(id)?;
        if let Some(name) = element.attribute("USE") {
            return Some(name.to_string());
        }
        let name = element.attribute("use")?.to_string();
        element.set_attribute("USE", name.clone());
        Some(name)
    }

    fn resolve_use(&mut self, id: ElementId, name: &str) -> Option<NodeId> {
        let separator = self.doc.config.build().scope_separator();
        let found = self
            .doc
            .graph
            .lookup(self.namespace, name)
            .or_else(|| {
                self.doc
                    .graph
                    .resolve_qualified(self.namespace, name, separator)
            });

        let Some(node) = found else {
            self.doc
                .warn(id, ErrorCode::W100, format!("cannot USE `{name}`"));
            return None;
        };
        self.doc.link_alias(id, node);
        debug!(element:% = id, node:%, name; "USE resolved");
        Some(node)
    }

    fn wire_route(&mut self, id: ElementId) {
        let Some(route) = self.doc.tree.element(id).map(|el| read_route(id, el)) else {
            return;
        };
        let from = self.doc.graph.lookup(self.namespace, &route.from_node);
        let to = self.doc.graph.lookup(self.namespace, &route.to_node);

        match (from, to) {
            (Some(from), Some(to)) => self.doc.connect_route(self.namespace, from, to, &route),
            _ => {
                self.doc.warn(
                    id,
                    ErrorCode::W104,
                    format!(
                        "route {}.{} -> {}.{} waits for its endpoints",
                        route.from_node, route.from_field, route.to_node, route.to_field
                    ),
                );
                if let Some(element) = self.doc.tree.element_mut(id) {
                    element.state.route_pending = true;
                }
                self.doc
                    .graph
                    .namespace_mut(self.namespace)
                    .pending_routes_mut()
                    .push(route);
            }
        }
    }

    fn instantiate(&mut self, id: ElementId, tag: &str) -> Option<NodeId> {
        if let Some(element) = self.doc.tree.element_mut(id) {
            element.state.field_interface = true;
        }
        let Some(node_type) = self.doc.registry.get(tag).copied() else {
            self.doc
                .warn(id, ErrorCode::W101, format!("unrecognized element <{tag}>"));
            return None;
        };

        let native = self.doc.config.build().native_attribute_notifications();
        let def_name = {
            let element = self.doc.tree.element_mut(id)?;
            if !native {
                element.state.attribute_shim = true;
            }
            element
                .attribute_or_lower("DEF")
                .or_else(|| element.attribute("id"))
                .map(str::to_string)
        };

        let node = {
            let element = self.doc.tree.element(id)?;
            let ctx = NodeContext {
                document: &self.doc.info,
                runtime: &self.doc.runtime,
                element_id: id,
                element,
                namespace: self.namespace,
                type_name: node_type.name(),
            };
            node_type.instantiate(&ctx)
        };
        let node = self.doc.graph.add_node(node, Some(self.namespace), Some(id));
        if let Some(name) = &def_name {
            self.doc.graph.register(self.namespace, node, name);
        }
        self.doc.link(id, node);
        trace!(element:% = id, node:%, type_name:% = node_type.name(); "Node instantiated");

        let children = self.doc.tree.children(id).to_vec();
        self.build_children(&children, Some(node));

        self.doc.graph.node_mut(node).node_mut().node_changed();
        debug!(element:% = id, node:%, def = def_name.as_deref(); "Node built");
        Some(node)
    }

    /// Tags that are not node types.
    fn build_auxiliary(
        &mut self,
        id: ElementId,
        tag: &str,
        parent: Option<NodeId>,
    ) -> Option<NodeId> {
        let lower = tag.to_ascii_lowercase();
        let grouping = lower.eq_ignore_ascii_case(self.doc.config.build().grouping_tag());

        match (lower.as_str(), parent) {
            (_, Some(parent)) if grouping => {
                let children = self.doc.tree.children(id).to_vec();
                self.build_children(&children, Some(parent));
                None
            }
            ("protodeclare" | "externprotodeclare" | "connect", _) => None,
            ("protoinstance", _) => self.instantiate_prototype(id, parent),
            ("is", _) => {
                let connected = self.doc.tree.descendants(id).skip(1).any(|d| {
                    self.doc
                        .tree
                        .element(d)
                        .is_some_and(|el| el.is_tag("connect"))
                });
                if !connected {
                    let owner = self
                        .doc
                        .tree
                        .parent(id)
                        .and_then(|p| self.doc.tree.element(p))
                        .map(|el| el.tag().to_string())
                        .unwrap_or_default();
                    self.doc.warn(
                        id,
                        ErrorCode::W103,
                        format!("IS inside <{owner}> has no connect"),
                    );
                }
                None
            }
            _ => match self.doc.external_template(self.namespace, tag) {
                Some(template) => self.instantiate_template(template, id, parent, true),
                None => {
                    self.doc
                        .warn(id, ErrorCode::W101, format!("unrecognized element <{tag}>"));
                    None
                }
            },
        }
    }
}
