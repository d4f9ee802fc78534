//! Built-in node catalog.
//!
//! Every built-in type is served by [`BasicNode`], a generic node that keeps
//! its fields, children, outgoing routes and notification history. The
//! per-type part is a static [`NodeSchema`] listing field names, kinds and
//! default values.

use std::any::Any;

use indexmap::IndexMap;
use log::{trace, warn};

use crate::{
    color::Color,
    field::{FieldKind, FieldMap},
    identifier::Id,
    node::{NodeContext, NodeId, NodeTypeRegistry, RouteLink, SceneNode},
};

/// Static description of a built-in node type.
#[derive(Debug)]
pub struct NodeSchema {
    pub name: &'static str,
    pub container_field: &'static str,
    pub fields: &'static [(&'static str, FieldKind, &'static str)],
}

use FieldKind::*;

static SCHEMAS: &[NodeSchema] = &[
    NodeSchema {
        name: "X3D",
        container_field: "children",
        fields: &[("profile", SFString, "Immersive"), ("version", SFString, "3.3")],
    },
    NodeSchema {
        name: "Scene",
        container_field: "children",
        fields: &[],
    },
    NodeSchema {
        name: "Group",
        container_field: "children",
        fields: &[
            ("bboxCenter", SFVec3f, "0 0 0"),
            ("bboxSize", SFVec3f, "-1 -1 -1"),
        ],
    },
    NodeSchema {
        name: "Transform",
        container_field: "children",
        fields: &[
            ("translation", SFVec3f, "0 0 0"),
            ("rotation", SFRotation, "0 0 1 0"),
            ("scale", SFVec3f, "1 1 1"),
            ("center", SFVec3f, "0 0 0"),
        ],
    },
    NodeSchema {
        name: "Shape",
        container_field: "children",
        fields: &[("render", SFBool, "true")],
    },
    NodeSchema {
        name: "Appearance",
        container_field: "appearance",
        fields: &[],
    },
    NodeSchema {
        name: "Material",
        container_field: "material",
        fields: &[
            ("diffuseColor", SFColor, "0.8 0.8 0.8"),
            ("emissiveColor", SFColor, "0 0 0"),
            ("transparency", SFFloat, "0"),
        ],
    },
    NodeSchema {
        name: "Box",
        container_field: "geometry",
        fields: &[("size", SFVec3f, "2 2 2"), ("solid", SFBool, "true")],
    },
    NodeSchema {
        name: "Sphere",
        container_field: "geometry",
        fields: &[("radius", SFFloat, "1"), ("solid", SFBool, "true")],
    },
    NodeSchema {
        name: "Coordinate",
        container_field: "coord",
        fields: &[("point", MFVec3f, "")],
    },
    NodeSchema {
        name: "IndexedFaceSet",
        container_field: "geometry",
        fields: &[("coordIndex", MFInt32, ""), ("solid", SFBool, "true")],
    },
    NodeSchema {
        name: "TimeSensor",
        container_field: "children",
        fields: &[
            ("cycleInterval", SFTime, "1"),
            ("loop", SFBool, "false"),
            ("enabled", SFBool, "true"),
            ("fraction_changed", SFFloat, "0"),
        ],
    },
    NodeSchema {
        name: "PositionInterpolator",
        container_field: "children",
        fields: &[
            ("key", MFFloat, ""),
            ("keyValue", MFVec3f, ""),
            ("set_fraction", SFFloat, "0"),
            ("value_changed", SFVec3f, "0 0 0"),
        ],
    },
    NodeSchema {
        name: "ColorInterpolator",
        container_field: "children",
        fields: &[
            ("key", MFFloat, ""),
            ("keyValue", MFColor, ""),
            ("set_fraction", SFFloat, "0"),
            ("value_changed", SFColor, "0 0 0"),
        ],
    },
    NodeSchema {
        name: "TouchSensor",
        container_field: "children",
        fields: &[
            ("enabled", SFBool, "true"),
            ("isActive", SFBool, "false"),
            ("touchTime", SFTime, "0"),
        ],
    },
    NodeSchema {
        name: "WorldInfo",
        container_field: "children",
        fields: &[("title", SFString, ""), ("info", MFString, "")],
    },
];

/// Look up the schema of a built-in type (exact name).
pub fn schema(name: &str) -> Option<&'static NodeSchema> {
    SCHEMAS.iter().find(|schema| schema.name == name)
}

/// Register every built-in type.
pub fn register_builtins(registry: &mut NodeTypeRegistry) {
    for schema in SCHEMAS {
        registry.register(schema.name, BasicNode::from_context);
    }
}

/// Generic node serving every built-in type.
#[derive(Debug, Clone)]
pub struct BasicNode {
    type_name: Id,
    container_field: &'static str,
    fields: FieldMap,
    children: IndexMap<String, Vec<NodeId>>,
    routes: Vec<RouteLink>,
    changed_fields: Vec<String>,
    ready_count: u32,
    highlight: Option<Color>,
}

impl BasicNode {
    /// Create a node with the schema defaults of `type_name`.
    ///
    /// Unknown type names produce a node without fields.
    pub fn new(type_name: Id) -> Self {
        let schema = schema(&type_name.to_string());
        let mut fields = FieldMap::new();
        for (name, kind, default) in schema.map(|s| s.fields).unwrap_or(&[]) {
            match kind.parse(default) {
                Ok(value) => fields.insert(*name, value),
                Err(err) => warn!(type_name:%, field = name, err:%; "Invalid built-in default"),
            }
        }
        Self {
            type_name,
            container_field: schema.map(|s| s.container_field).unwrap_or("children"),
            fields,
            children: IndexMap::new(),
            routes: Vec::new(),
            changed_fields: Vec::new(),
            ready_count: 0,
            highlight: None,
        }
    }

    /// Factory used for built-in registrations.
    ///
    /// Schema defaults are overridden by matching element attributes.
    pub fn from_context(ctx: &NodeContext<'_>) -> Box<dyn SceneNode> {
        let mut node = Self::new(ctx.type_name);
        for (name, text) in ctx.element.attributes() {
            if let Err(err) = node.fields.update_from_str(name, text) {
                warn!(
                    element:% = ctx.element_id,
                    field = name,
                    err:%;
                    "Ignoring invalid field value"
                );
            }
        }
        Box::new(node)
    }

    /// Names of fields reported changed, oldest first.
    pub fn changed_fields(&self) -> &[String] {
        &self.changed_fields
    }

    /// How many times construction completion was signalled.
    pub fn ready_count(&self) -> u32 {
        self.ready_count
    }

    /// The highlight color, when highlighted.
    pub fn highlight_color(&self) -> Option<Color> {
        self.highlight
    }
}

impl SceneNode for BasicNode {
    fn type_name(&self) -> Id {
        self.type_name
    }

    fn fields(&self) -> &FieldMap {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut FieldMap {
        &mut self.fields
    }

    fn default_container_field(&self) -> &str {
        self.container_field
    }

    fn add_child(&mut self, child: NodeId, container_field: Option<&str>) {
        let slot = container_field.unwrap_or("children");
        self.children.entry(slot.to_string()).or_default().push(child);
    }

    fn remove_child(&mut self, child: NodeId) -> bool {
        let mut removed = false;
        for nodes in self.children.values_mut() {
            let before = nodes.len();
            nodes.retain(|n| *n != child);
            removed |= nodes.len() != before;
        }
        removed
    }

    fn children(&self) -> Vec<(&str, NodeId)> {
        self.children
            .iter()
            .flat_map(|(slot, nodes)| nodes.iter().map(move |n| (slot.as_str(), *n)))
            .collect()
    }

    fn setup_route(&mut self, from_field: &str, target: NodeId, to_field: &str) {
        trace!(type_name:% = self.type_name, from_field, target:%, to_field; "Route set up");
        self.routes.push(RouteLink {
            from_field: from_field.to_string(),
            target,
            to_field: to_field.to_string(),
        });
    }

    fn remove_route(&mut self, from_field: &str, target: NodeId, to_field: &str) -> bool {
        let before = self.routes.len();
        self.routes.retain(|route| {
            !(route.from_field == from_field && route.target == target && route.to_field == to_field)
        });
        self.routes.len() != before
    }

    fn routes(&self) -> &[RouteLink] {
        &self.routes
    }

    fn field_changed(&mut self, name: &str) {
        self.changed_fields.push(name.to_string());
    }

    fn node_changed(&mut self) {
        self.ready_count += 1;
    }

    fn highlight(&mut self, enable: bool, color: Color) {
        self.highlight = enable.then_some(color);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
