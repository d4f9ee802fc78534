//! Lexical scopes.
//!
//! A [`Namespace`] is a flat symbol table for one scope together with its
//! place in the scope tree, its base URL, the templates declared in it and
//! the routes still waiting for their endpoints. Operations that also touch
//! the registered node (its owning-namespace back-reference) live on
//! [`SceneGraph`](crate::scene::SceneGraph).

use indexmap::IndexMap;

use canopy_core::{
    node::{NamespaceId, NodeId},
    tree::ElementId,
};

use crate::template::TemplateDeclaration;

/// A ROUTE that could not resolve both endpoints when it was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRoute {
    /// The ROUTE element.
    pub element: ElementId,
    pub from_node: String,
    pub to_node: String,
    pub from_field: String,
    pub to_field: String,
    /// A failed retry was already reported.
    pub(crate) retry_reported: bool,
}

impl PendingRoute {
    pub fn new(
        element: ElementId,
        from_node: impl Into<String>,
        to_node: impl Into<String>,
        from_field: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            element,
            from_node: from_node.into(),
            to_node: to_node.into(),
            from_field: from_field.into(),
            to_field: to_field.into(),
            retry_reported: false,
        }
    }
}

/// Base part of `url`: everything up to and including the last `/`.
pub(crate) fn base_of(url: &str) -> &str {
    match url.rfind('/') {
        Some(i) => &url[..=i],
        None => "",
    }
}

/// One lexical scope.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    name: String,
    base_url: String,
    symbols: IndexMap<String, NodeId>,
    parent: Option<NamespaceId>,
    children: Vec<NamespaceId>,
    templates: Vec<TemplateDeclaration>,
    pending_routes: Vec<PendingRoute>,
}

impl Namespace {
    /// Create a detached, empty scope.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Scope name; may be empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URL; empty until set.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Keep the directory part of `raw_url` as the base URL.
    ///
    /// ```
    /// # use canopy::namespace::Namespace;
    /// let mut ns = Namespace::new("");
    /// ns.set_base_url("http://x/y/z.x3d");
    /// assert_eq!(ns.base_url(), "http://x/y/");
    /// ns.set_base_url("scene.x3d");
    /// assert_eq!(ns.base_url(), "");
    /// ```
    pub fn set_base_url(&mut self, raw_url: &str) {
        self.base_url = base_of(raw_url).to_string();
    }

    /// Resolve `url` against the base URL.
    ///
    /// Empty, absolute-path and scheme-qualified URLs are returned unchanged.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.is_empty() || url.starts_with('/') || url.contains(':') {
            url.to_string()
        } else {
            format!("{}{}", self.base_url, url)
        }
    }

    /// Look `name` up in this scope only.
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.symbols.get(name).copied()
    }

    /// Registered names in registration order.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.symbols.iter().map(|(name, node)| (name.as_str(), *node))
    }

    /// Enclosing scope.
    pub fn parent(&self) -> Option<NamespaceId> {
        self.parent
    }

    /// Nested scopes in creation order.
    pub fn children(&self) -> &[NamespaceId] {
        &self.children
    }

    /// Templates declared here, in declaration order.
    pub fn templates(&self) -> &[TemplateDeclaration] {
        &self.templates
    }

    /// Routes waiting for endpoints, in creation order.
    pub fn pending_routes(&self) -> &[PendingRoute] {
        &self.pending_routes
    }

    pub(crate) fn insert_symbol(&mut self, name: &str, node: NodeId) -> Option<NodeId> {
        self.symbols.insert(name.to_string(), node)
    }

    pub(crate) fn remove_symbol(&mut self, name: &str) -> Option<NodeId> {
        self.symbols.shift_remove(name)
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NamespaceId>) {
        self.parent = parent;
    }

    pub(crate) fn push_child(&mut self, child: NamespaceId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn remove_child(&mut self, child: NamespaceId) -> bool {
        let before = self.children.len();
        self.children.retain(|c| *c != child);
        self.children.len() != before
    }

    pub(crate) fn templates_mut(&mut self) -> &mut Vec<TemplateDeclaration> {
        &mut self.templates
    }

    pub(crate) fn pending_routes_mut(&mut self) -> &mut Vec<PendingRoute> {
        &mut self.pending_routes
    }
}
