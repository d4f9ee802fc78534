//! Reading and writing node fields through their elements.
//!
//! Values always cross this boundary as duplicates, so a caller never holds a
//! node's live value. The one exception is [`Document::request_field_ref`],
//! which lends out a multi-valued field for in-place editing; the edit is only
//! observed once [`Document::release_field_ref`] is called.

use log::{debug, warn};

use canopy_core::{field::FieldValue, node::NodeId, tree::ElementId};

use crate::document::Document;

impl Document {
    /// Node behind an element that has the field interface.
    fn field_node(&self, element: ElementId) -> Option<NodeId> {
        let el = self.tree.element(element)?;
        if el.state.field_interface {
            el.state.node
        } else {
            None
        }
    }

    /// A duplicate of a field's current value.
    ///
    /// `None` when the element has no live node or the field does not exist.
    pub fn get_field_value(&self, element: ElementId, name: &str) -> Option<FieldValue> {
        let node = self.field_node(element)?;
        self.graph
            .node(node)
            .node()
            .fields()
            .get(name)
            .map(FieldValue::duplicate)
    }

    /// Store a duplicate of `value` in a field and notify the node.
    ///
    /// Returns `false` and changes nothing when the element has no live node,
    /// the field does not exist or `value` is of another kind.
    pub fn set_field_value(&mut self, element: ElementId, name: &str, value: &FieldValue) -> bool {
        let Some(node) = self.field_node(element) else {
            return false;
        };
        let record = self.graph.node_mut(node).node_mut();
        let Some(slot) = record.fields_mut().get_mut(name) else {
            return false;
        };
        if slot.kind() != value.kind() {
            warn!(
                element:%,
                field = name,
                expected:% = slot.kind(),
                given:% = value.kind();
                "Refusing field value of another kind"
            );
            return false;
        }

        *slot = value.duplicate();
        record.field_changed(name);
        self.needs_redraw = true;
        debug!(element:%, node:%, field = name; "Field set");
        true
    }

    /// Borrow the live value of a multi-valued field for in-place editing.
    ///
    /// Call [`release_field_ref`](Self::release_field_ref) afterwards, or the
    /// node never learns about the edit. `None` for single-valued or missing
    /// fields.
    pub fn request_field_ref(&mut self, element: ElementId, name: &str) -> Option<&mut FieldValue> {
        let node = self.field_node(element)?;
        let value = self
            .graph
            .node_mut(node)
            .node_mut()
            .fields_mut()
            .get_mut(name)?;
        if value.is_by_reference() {
            Some(value)
        } else {
            None
        }
    }

    /// Commit edits made through [`request_field_ref`](Self::request_field_ref).
    pub fn release_field_ref(&mut self, element: ElementId, name: &str) -> bool {
        let Some(node) = self.field_node(element) else {
            return false;
        };
        let record = self.graph.node_mut(node).node_mut();
        if !record.fields().contains(name) {
            return false;
        }
        record.field_changed(name);
        self.needs_redraw = true;
        true
    }
}
