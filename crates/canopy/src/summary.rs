//! Plain-text summary of a built document.

use std::fmt;

use canopy_core::node::{NamespaceId, NodeId};

use crate::{document::Document, template::TemplateState};

/// Displays the namespaces, node tree and routes of a document.
///
/// Nodes reached again (through `USE`) are printed once and referenced by id
/// afterwards.
pub struct Summary<'a> {
    document: &'a Document,
}

impl<'a> Summary<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    fn namespace(&self, f: &mut fmt::Formatter<'_>, id: NamespaceId, depth: usize) -> fmt::Result {
        let graph = self.document.graph();
        let ns = graph.namespace(id);
        let indent = "  ".repeat(depth);
        writeln!(f, "{indent}namespace {id} \"{}\" base \"{}\"", ns.name(), ns.base_url())?;
        for (name, node) in ns.symbols() {
            let type_name = graph.node(node).node().type_name();
            writeln!(f, "{indent}  DEF {name} = {node} {type_name}")?;
        }
        for template in ns.templates() {
            let state = match template.state() {
                TemplateState::Available => "available",
                TemplateState::Unloaded => "unloaded",
                TemplateState::Loading(_) => "loading",
                TemplateState::Failed => "failed",
            };
            let kind = if template.is_external() { "extern " } else { "" };
            writeln!(f, "{indent}  {kind}template {} ({state})", template.name())?;
        }
        for route in ns.pending_routes() {
            writeln!(
                f,
                "{indent}  pending ROUTE {}.{} -> {}.{}",
                route.from_node, route.from_field, route.to_node, route.to_field
            )?;
        }
        for child in ns.children() {
            self.namespace(f, *child, depth + 1)?;
        }
        Ok(())
    }

    fn node(
        &self,
        f: &mut fmt::Formatter<'_>,
        id: NodeId,
        slot: Option<&str>,
        depth: usize,
        seen: &mut Vec<NodeId>,
    ) -> fmt::Result {
        let record = self.document.graph().node(id);
        let indent = "  ".repeat(depth);
        let slot = slot.map(|s| format!("{s}: ")).unwrap_or_default();
        write!(f, "{indent}{slot}{id} {}", record.node().type_name())?;
        if let Some(def) = record.def_name() {
            write!(f, " DEF {def}")?;
        }
        if seen.contains(&id) {
            return writeln!(f, " (again)");
        }
        writeln!(f)?;

        seen.push(id);
        for (child_slot, child) in record.node().children() {
            self.node(f, child, Some(child_slot), depth + 1, seen)?;
        }
        Ok(())
    }
}

impl Document {
    /// A printable summary of the document.
    pub fn summary(&self) -> Summary<'_> {
        Summary::new(self)
    }
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.namespace(f, self.document.root_namespace(), 0)?;

        writeln!(f, "scene")?;
        let mut seen = Vec::new();
        for root in self.document.roots() {
            self.node(f, *root, None, 1, &mut seen)?;
        }

        writeln!(f, "routes")?;
        for (id, record) in self.document.graph().nodes() {
            for route in record.node().routes() {
                writeln!(
                    f,
                    "  {id}.{} -> {}.{}",
                    route.from_field, route.target, route.to_field
                )?;
            }
        }
        Ok(())
    }
}
