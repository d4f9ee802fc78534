//! Reusable node templates and late route resolution.
//!
//! `ProtoDeclare` declares a template with an interface and a body;
//! `ExternProtoDeclare` declares one whose body lives in another document and
//! is loaded through the [`loader`](crate::loader). An instance (`ProtoInstance`,
//! or a tag named after an external template) expands to a copy of the body
//! built in a fresh namespace nested in the instance's namespace.

use indexmap::IndexMap;
use log::{debug, info, warn};

use canopy_core::{
    field::{FieldKind, FieldValue},
    node::{NamespaceId, NodeId},
    tree::{ElementId, ElementTree},
};
use canopy_parser::error::ErrorCode;

use crate::{
    builder::TreeBuilder,
    document::Document,
    loader::{LoadId, WaitingInstance},
};

/// Load state of a template body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateState {
    /// The body is known; instances expand immediately.
    Available,
    /// External body not requested yet.
    Unloaded,
    /// External body requested; instances wait for it.
    Loading(LoadId),
    /// External body could not be loaded.
    Failed,
}

/// One interface field of a template.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceField {
    pub name: String,
    /// Declared type, when it is one of the known field kinds.
    pub kind: Option<FieldKind>,
    /// Default value as written.
    pub value: Option<String>,
}

/// A template declared in a namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDeclaration {
    name: String,
    external: bool,
    element: ElementId,
    interface: Vec<InterfaceField>,
    body: Option<ElementId>,
    urls: Vec<String>,
    base_url: String,
    state: TemplateState,
}

impl TemplateDeclaration {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the body comes from another document.
    pub fn is_external(&self) -> bool {
        self.external
    }

    /// The declaring element.
    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn interface(&self) -> &[InterfaceField] {
        &self.interface
    }

    /// The `ProtoBody` element, once known.
    pub fn body(&self) -> Option<ElementId> {
        self.body
    }

    /// Candidate URLs of an external body, already resolved.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Base URL the body's own relative URLs resolve against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn state(&self) -> TemplateState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TemplateState) {
        self.state = state;
    }

    /// Adopt a loaded body and the defaults of its interface.
    pub(crate) fn load_body(
        &mut self,
        body: Option<ElementId>,
        interface: Vec<InterfaceField>,
        base_url: &str,
    ) {
        for loaded in interface {
            match self.interface.iter_mut().find(|f| f.name == loaded.name) {
                Some(field) => {
                    if field.value.is_none() {
                        field.value = loaded.value;
                    }
                    if field.kind.is_none() {
                        field.kind = loaded.kind;
                    }
                }
                None => self.interface.push(loaded),
            }
        }
        self.body = body;
        self.base_url = base_url.to_string();
        self.state = TemplateState::Available;
    }
}

/// Where a declaration lives: its namespace and position there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TemplateRef {
    pub(crate) namespace: NamespaceId,
    pub(crate) index: usize,
}

fn child_named<'t>(
    tree: &'t ElementTree,
    parent: ElementId,
    tag: &'t str,
) -> impl Iterator<Item = ElementId> + 't {
    tree.child_elements(parent)
        .into_iter()
        .filter(move |id| tree.element(*id).is_some_and(|el| el.is_tag(tag)))
}

/// Interface fields declared as `field` children of `parent`.
pub(crate) fn read_interface(tree: &ElementTree, parent: ElementId) -> Vec<InterfaceField> {
    child_named(tree, parent, "field")
        .filter_map(|id| tree.element(id))
        .filter_map(|el| {
            let name = el.attribute("name")?;
            Some(InterfaceField {
                name: name.to_string(),
                kind: el.attribute("type").and_then(|t| t.parse().ok()),
                value: el.attribute("value").map(str::to_string),
            })
        })
        .collect()
}

/// The `ProtoBody` and interface of a `ProtoDeclare` element.
pub(crate) fn read_declaration(
    tree: &ElementTree,
    declaration: ElementId,
) -> (Option<ElementId>, Vec<InterfaceField>) {
    let interface = child_named(tree, declaration, "ProtoInterface")
        .next()
        .map(|iface| read_interface(tree, iface))
        .unwrap_or_default();
    let body = child_named(tree, declaration, "ProtoBody").next();
    (body, interface)
}

/// Split an MFString attribute into its strings; unquoted text is one string.
fn url_list(text: &str) -> Vec<String> {
    match FieldKind::MFString.parse(text) {
        Ok(FieldValue::MFString(urls)) if !urls.is_empty() => urls,
        _ => vec![text.trim().to_string()],
    }
}

impl Document {
    pub(crate) fn template(&self, template: TemplateRef) -> &TemplateDeclaration {
        &self.graph.namespace(template.namespace).templates()[template.index]
    }

    pub(crate) fn template_mut(&mut self, template: TemplateRef) -> &mut TemplateDeclaration {
        &mut self.graph.namespace_mut(template.namespace).templates_mut()[template.index]
    }

    /// Find a declaration by name in `namespace` or its ancestors.
    pub(crate) fn find_template(&self, namespace: NamespaceId, name: &str) -> Option<TemplateRef> {
        self.graph.ancestors(namespace).find_map(|ns| {
            self.graph
                .namespace(ns)
                .templates()
                .iter()
                .position(|t| t.name == name)
                .map(|index| TemplateRef {
                    namespace: ns,
                    index,
                })
        })
    }

    /// An external declaration in `namespace` whose name matches `tag`.
    pub(crate) fn external_template(
        &self,
        namespace: NamespaceId,
        tag: &str,
    ) -> Option<TemplateRef> {
        self.graph
            .namespace(namespace)
            .templates()
            .iter()
            .position(|t| t.external && t.name.eq_ignore_ascii_case(tag))
            .map(|index| TemplateRef { namespace, index })
    }

    /// Retry the routes waiting in `namespace`, in the order they were made.
    ///
    /// Routes whose endpoints now resolve are wired and dropped from the
    /// waiting list. The others stay; each is reported at most once more.
    /// Returns how many routes were wired.
    pub fn resolve_pending_routes(&mut self, namespace: NamespaceId) -> usize {
        let pending = std::mem::take(self.graph.namespace_mut(namespace).pending_routes_mut());
        let mut waiting = Vec::with_capacity(pending.len());
        let mut wired = 0;

        for mut route in pending {
            let from = self.graph.lookup(namespace, &route.from_node);
            let to = self.graph.lookup(namespace, &route.to_node);
            if let (Some(from), Some(to)) = (from, to) {
                self.connect_route(namespace, from, to, &route);
                wired += 1;
                continue;
            }
            if !route.retry_reported {
                route.retry_reported = true;
                self.warn(
                    route.element,
                    ErrorCode::W104,
                    format!(
                        "route {}.{} -> {}.{} is still unresolved",
                        route.from_node, route.from_field, route.to_node, route.to_field
                    ),
                );
            }
            waiting.push(route);
        }

        *self.graph.namespace_mut(namespace).pending_routes_mut() = waiting;

        if wired > 0 {
            info!(namespace:%, wired; "Late routes wired");
        }
        wired
    }

    /// Field values of one instance: interface defaults overridden by the
    /// instance's `fieldValue` children, or by its attributes for a tag
    /// named after the template.
    fn instance_values(
        &self,
        declaration: &TemplateDeclaration,
        instance: ElementId,
        direct: bool,
    ) -> IndexMap<String, String> {
        let mut values: IndexMap<String, String> = declaration
            .interface
            .iter()
            .filter_map(|f| f.value.clone().map(|v| (f.name.clone(), v)))
            .collect();

        if direct {
            if let Some(el) = self.tree.element(instance) {
                for field in &declaration.interface {
                    if let Some(value) = el.attribute(&field.name) {
                        values.insert(field.name.clone(), value.to_string());
                    }
                }
            }
        } else {
            for id in child_named(&self.tree, instance, "fieldValue") {
                let Some(el) = self.tree.element(id) else {
                    continue;
                };
                if let (Some(name), Some(value)) = (el.attribute("name"), el.attribute("value")) {
                    values.insert(name.to_string(), value.to_string());
                }
            }
        }
        values
    }

    /// Apply `IS`/`connect` bindings below `root`.
    fn substitute_interface(&mut self, root: ElementId, values: &IndexMap<String, String>) {
        let mut bindings = Vec::new();
        for id in self.tree.descendants(root) {
            let is_binding = self.tree.element(id).is_some_and(|el| el.is_tag("IS"));
            let Some(target) = self.tree.parent(id).filter(|_| is_binding) else {
                continue;
            };
            for connect in child_named(&self.tree, id, "connect") {
                let Some(el) = self.tree.element(connect) else {
                    continue;
                };
                if let (Some(node_field), Some(proto_field)) =
                    (el.attribute("nodeField"), el.attribute("protoField"))
                {
                    bindings.push((target, node_field.to_string(), proto_field.to_string()));
                }
            }
        }

        for (target, node_field, proto_field) in bindings {
            match (values.get(&proto_field), self.tree.element_mut(target)) {
                (Some(value), Some(el)) => el.set_attribute(node_field, value.clone()),
                _ => debug!(proto_field = proto_field.as_str(); "Interface field has no value"),
            }
        }
    }
}

impl TreeBuilder<'_> {
    /// Handle template declarations and instances among `children`.
    ///
    /// Every declaration is made before the first instance expands, so an
    /// instance may precede its sibling declaration.
    pub(crate) fn declare_templates(&mut self, children: &[ElementId], parent: Option<NodeId>) {
        let tags: Vec<(ElementId, String)> = children
            .iter()
            .filter_map(|&child| {
                let el = self.doc.tree.element(child)?;
                Some((child, el.tag().to_ascii_lowercase()))
            })
            .collect();

        for (child, tag) in &tags {
            match tag.as_str() {
                "protodeclare" => self.declare(*child, false),
                "externprotodeclare" => self.declare(*child, true),
                _ => {}
            }
        }
        for (child, tag) in &tags {
            if tag == "protoinstance" {
                let expanded = self.instantiate_prototype(*child, parent);
                self.doc.expansions.insert(*child, expanded);
            }
        }
    }

    fn declare(&mut self, id: ElementId, external: bool) {
        let Some(el) = self.doc.tree.element(id) else {
            return;
        };
        let Some(name) = el.attribute("name").map(str::to_string) else {
            warn!(element:% = id; "Ignoring template declaration without a name");
            return;
        };
        let namespace = self.doc.graph.namespace(self.namespace);

        let declaration = if external {
            let urls = el
                .attribute("url")
                .map(url_list)
                .unwrap_or_default()
                .iter()
                .map(|url| namespace.resolve_url(url))
                .collect();
            TemplateDeclaration {
                name,
                external,
                element: id,
                interface: read_interface(&self.doc.tree, id),
                body: None,
                urls,
                base_url: namespace.base_url().to_string(),
                state: TemplateState::Unloaded,
            }
        } else {
            let (body, interface) = read_declaration(&self.doc.tree, id);
            TemplateDeclaration {
                name,
                external,
                element: id,
                interface,
                body,
                urls: Vec::new(),
                base_url: namespace.base_url().to_string(),
                state: TemplateState::Available,
            }
        };

        debug!(
            namespace:% = self.namespace,
            name = declaration.name.as_str(),
            external;
            "Template declared"
        );
        self.doc
            .graph
            .namespace_mut(self.namespace)
            .templates_mut()
            .push(declaration);
    }

    /// Expand a `ProtoInstance` against the templates visible here.
    pub(crate) fn instantiate_prototype(
        &mut self,
        id: ElementId,
        parent: Option<NodeId>,
    ) -> Option<NodeId> {
        let Some(name) = self
            .doc
            .tree
            .element(id)
            .and_then(|el| el.attribute("name"))
            .map(str::to_string)
        else {
            self.doc
                .warn(id, ErrorCode::W105, "ProtoInstance without a name");
            return None;
        };
        let Some(template) = self.doc.find_template(self.namespace, &name) else {
            self.doc
                .warn(id, ErrorCode::W105, format!("no template named `{name}`"));
            return None;
        };
        self.instantiate_template(template, id, parent, false)
    }

    /// Expand now when the body is known, otherwise wait for its load.
    pub(crate) fn instantiate_template(
        &mut self,
        template: TemplateRef,
        instance: ElementId,
        parent: Option<NodeId>,
        direct: bool,
    ) -> Option<NodeId> {
        let state = self.doc.template(template).state();
        match state {
            TemplateState::Available => self.expand(template, instance, direct),
            TemplateState::Failed => {
                let name = self.doc.template(template).name.clone();
                self.doc.warn(
                    instance,
                    ErrorCode::W106,
                    format!("template `{name}` failed to load"),
                );
                None
            }
            TemplateState::Unloaded | TemplateState::Loading(_) => {
                self.doc.enqueue_instance(
                    template,
                    WaitingInstance {
                        element: instance,
                        parent,
                        namespace: self.namespace,
                        direct,
                    },
                );
                None
            }
        }
    }

    /// Build a copy of the template body for one instance.
    ///
    /// The copy is built in a new namespace named after the instance's DEF
    /// (or the template). The first node of the body is the instance node; it
    /// is registered under the instance's DEF in this builder's namespace.
    pub(crate) fn expand(
        &mut self,
        template: TemplateRef,
        instance: ElementId,
        direct: bool,
    ) -> Option<NodeId> {
        let declaration = self.doc.template(template).clone();
        let Some(body) = declaration.body else {
            self.doc.warn(
                instance,
                ErrorCode::W105,
                format!("template `{}` has no ProtoBody", declaration.name),
            );
            return None;
        };
        if self.doc.expanding.contains(&template) {
            self.doc.warn(
                instance,
                ErrorCode::W105,
                format!("template `{}` instantiates itself", declaration.name),
            );
            return None;
        }

        let values = self.doc.instance_values(&declaration, instance, direct);
        let copy = self.doc.tree.clone_subtree(body, Some(instance));
        self.doc.substitute_interface(copy, &values);

        let instance_def = self
            .doc
            .tree
            .element(instance)
            .and_then(|el| el.attribute_or_lower("DEF"))
            .map(str::to_string);
        let scope_name = instance_def.as_deref().unwrap_or(&declaration.name);
        let scope = self.doc.graph.create_namespace(scope_name);
        self.doc.graph.add_child_namespace(self.namespace, scope);
        self.doc
            .graph
            .namespace_mut(scope)
            .set_base_url(&declaration.base_url);

        self.doc.expanding.push(template);
        let children = self.doc.tree.children(copy).to_vec();
        let nodes = TreeBuilder::new(&mut *self.doc, scope).build_children(&children, None);
        self.doc.expanding.pop();

        let Some(&node) = nodes.first() else {
            warn!(template = declaration.name.as_str(); "Template body produced no node");
            return None;
        };
        if let Some(def) = &instance_def {
            self.doc.graph.register(self.namespace, node, def);
        }
        if self.doc.node_of(instance).is_none() {
            self.doc.link_alias(instance, node);
        }
        debug!(
            template = declaration.name.as_str(),
            scope:%,
            node:%;
            "Template expanded"
        );
        Some(node)
    }
}
