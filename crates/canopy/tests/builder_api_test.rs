//! Integration tests for the SceneBuilder and Document API
//!
//! These tests load small documents through the public API and check the
//! scene graph, the warnings and the element-facing operations.

use std::{cell::Cell, rc::Rc};

use canopy::{
    CanopyError, Document, ErrorCode, SceneBuilder,
    config::{AppConfig, BuildConfig, LoaderConfig},
    events::Event,
    field::FieldValue,
    node::NodeId,
    nodes::BasicNode,
    tree::ElementId,
};

fn load(source: &str) -> Document {
    SceneBuilder::default()
        .load(source, "scenes/main.x3d")
        .expect("Failed to load document")
}

fn load_with_shim(source: &str) -> Document {
    let config = AppConfig::new(
        BuildConfig::default().with_native_attribute_notifications(false),
        LoaderConfig::default(),
    );
    SceneBuilder::new(config)
        .load(source, "scenes/main.x3d")
        .expect("Failed to load document")
}

/// The first element carrying `attribute="value"`.
fn element_with(doc: &Document, attribute: &str, value: &str) -> ElementId {
    let tree = doc.tree();
    tree.roots()
        .iter()
        .flat_map(|root| tree.descendants(*root))
        .find(|id| {
            tree.element(*id)
                .is_some_and(|el| el.attribute(attribute) == Some(value))
        })
        .unwrap_or_else(|| panic!("no element with {attribute}={value}"))
}

/// The first element with tag `tag`.
fn element_tagged(doc: &Document, tag: &str) -> ElementId {
    let tree = doc.tree();
    tree.roots()
        .iter()
        .flat_map(|root| tree.descendants(*root))
        .find(|id| tree.element(*id).is_some_and(|el| el.tag() == tag))
        .unwrap_or_else(|| panic!("no <{tag}> element"))
}

fn warning_codes(doc: &Document) -> Vec<ErrorCode> {
    doc.warnings().iter().filter_map(|w| w.code()).collect()
}

fn basic(doc: &Document, node: NodeId) -> &BasicNode {
    doc.graph()
        .node(node)
        .node()
        .as_any()
        .downcast_ref::<BasicNode>()
        .expect("built-in nodes are BasicNode")
}

fn children(doc: &Document, node: NodeId) -> Vec<(String, NodeId)> {
    doc.graph()
        .node(node)
        .node()
        .children()
        .into_iter()
        .map(|(slot, child)| (slot.to_string(), child))
        .collect()
}

const DEF_USE: &str = r#"
    <X3D><Scene>
      <Transform DEF="T" translation="1 2 3">
        <Shape DEF="S"><Box/></Shape>
      </Transform>
      <Transform USE="T"/>
    </Scene></X3D>
"#;

#[test]
fn test_builder_api_exists() {
    let builder = SceneBuilder::default();
    assert!(builder.registry().contains("Transform"));
    assert!(builder.registry().contains("transform"));
}

#[test]
fn test_load_invalid_markup_returns_error() {
    let result = SceneBuilder::default().load("<X3D><Scene></X3D>", "");
    assert!(matches!(result, Err(CanopyError::Parse { .. })));
}

#[test]
fn test_def_and_use_share_one_node() {
    let doc = load(DEF_USE);
    assert!(doc.warnings().is_empty(), "{:?}", doc.warnings());
    assert!(doc.needs_redraw());

    let t = doc.named_node("T").expect("T is registered");
    let use_el = element_with(&doc, "USE", "T");
    assert_eq!(doc.node_of(use_el), Some(t));

    let x3d = doc.roots()[0];
    let scene = children(&doc, x3d)[0].1;
    let scene_children = children(&doc, scene);
    assert_eq!(
        scene_children,
        vec![("children".to_string(), t), ("children".to_string(), t)]
    );

    // Shape goes in `children`, Box in `geometry`.
    let shape = doc.named_node("S").unwrap();
    assert_eq!(children(&doc, t), vec![("children".to_string(), shape)]);
    assert_eq!(children(&doc, shape)[0].0, "geometry");

    let record = doc.graph().node(t);
    assert_eq!(record.def_name(), Some("T"));
    assert_eq!(record.namespace(), Some(doc.root_namespace()));
    assert_eq!(basic(&doc, t).ready_count(), 1);
}

#[test]
fn test_use_element_never_defines_a_name() {
    let doc = load(
        r#"<Scene>
             <Transform DEF="A"/>
             <Transform USE="A" DEF="B"/>
             <Group use="A"/>
           </Scene>"#,
    );
    let a = doc.named_node("A").unwrap();
    assert!(doc.named_node("B").is_none());

    // Lowercase `use` is accepted and stored under `USE`.
    let lower = element_tagged(&doc, "Group");
    assert_eq!(doc.node_of(lower), Some(a));
    assert_eq!(doc.tree().element(lower).unwrap().attribute("USE"), Some("A"));
}

#[test]
fn test_id_attribute_registers_when_def_is_missing() {
    let doc = load(r#"<Scene><Transform id="byId"/><Shape def="lower"/></Scene>"#);
    assert!(doc.named_node("byId").is_some());
    assert!(doc.named_node("lower").is_some());
}

#[test]
fn test_unresolved_use_warns_w100() {
    let doc = load(r#"<Scene><Transform USE="Nowhere"/></Scene>"#);
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W100]);

    let el = element_with(&doc, "USE", "Nowhere");
    assert_eq!(doc.node_of(el), None);
}

#[test]
fn test_unknown_element_warns_w101() {
    let doc = load(r#"<Scene><Teapot DEF="Tea"/><Shape/></Scene>"#);
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W101]);
    assert!(doc.named_node("Tea").is_none());
    assert!(doc.warnings()[0].message().contains("Teapot"));
}

#[test]
fn test_building_an_element_twice_warns_w102() {
    let mut doc = load(DEF_USE);
    let el = element_with(&doc, "DEF", "T");
    let before = doc.graph().node_count();

    assert_eq!(doc.build_element(el, doc.root_namespace()), None);
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W102]);
    assert_eq!(doc.graph().node_count(), before);
}

#[test]
fn test_is_without_connect_warns_w103() {
    let doc = load(
        r#"<Scene>
             <Material><IS/></Material>
             <Material><IS><connect nodeField="diffuseColor" protoField="c"/></IS></Material>
           </Scene>"#,
    );
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W103]);
}

#[test]
fn test_grouping_tag_builds_children_onto_parent() {
    let doc = load(
        r#"<Scene>
             <Group DEF="G"><metagroup><Shape DEF="A"/><Shape DEF="B"/></metagroup></Group>
           </Scene>"#,
    );
    let g = doc.named_node("G").unwrap();
    let a = doc.named_node("A").unwrap();
    let b = doc.named_node("B").unwrap();
    let attached: Vec<NodeId> = children(&doc, g).into_iter().map(|(_, n)| n).collect();
    assert_eq!(attached, vec![a, b]);
    assert!(doc.warnings().is_empty());
}

#[test]
fn test_grouping_tag_without_parent_is_unrecognized() {
    let doc = load(r#"<metagroup><Shape DEF="A"/></metagroup>"#);
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W101]);
    assert!(doc.named_node("A").is_none());
    assert!(doc.roots().is_empty());
}

#[test]
fn test_container_field_attribute_picks_slot() {
    let doc = load(
        r#"<Scene><Transform DEF="T"><Shape DEF="S" containerField="proxy"/></Transform></Scene>"#,
    );
    let t = doc.named_node("T").unwrap();
    let s = doc.named_node("S").unwrap();
    assert_eq!(children(&doc, t), vec![("proxy".to_string(), s)]);
}

const ROUTED: &str = r#"
    <Scene>
      <TimeSensor DEF="Clock" loop="true"/>
      <PositionInterpolator DEF="Mover"/>
      <ROUTE fromNode="Clock" fromField="fraction_changed" toNode="Mover" toField="set_fraction"/>
    </Scene>
"#;

#[test]
fn test_route_between_known_nodes_is_wired() {
    let doc = load(ROUTED);
    assert!(doc.warnings().is_empty());

    let clock = doc.named_node("Clock").unwrap();
    let mover = doc.named_node("Mover").unwrap();
    let routes = doc.graph().node(clock).node().routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].from_field, "fraction_changed");
    assert_eq!(routes[0].target, mover);
    assert_eq!(routes[0].to_field, "set_fraction");

    let route_el = element_tagged(&doc, "ROUTE");
    assert_eq!(
        doc.tree().element(route_el).unwrap().state.route_namespace,
        Some(doc.root_namespace())
    );
}

#[test]
fn test_remove_wired_route() {
    let mut doc = load(ROUTED);
    let clock = doc.named_node("Clock").unwrap();
    let route_el = element_tagged(&doc, "ROUTE");

    assert!(doc.remove_route(route_el));
    assert!(doc.graph().node(clock).node().routes().is_empty());
    assert!(!doc.remove_route(route_el));
}

#[test]
fn test_route_before_its_endpoints_waits() {
    let mut doc = load(
        r#"<Scene>
             <ROUTE fromnode="Clock" fromfield="fraction_changed" tonode="Mover" tofield="set_fraction"/>
             <TimeSensor DEF="Clock"/>
             <PositionInterpolator DEF="Mover"/>
           </Scene>"#,
    );
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W104]);
    let root = doc.root_namespace();
    assert_eq!(doc.graph().namespace(root).pending_routes().len(), 1);

    assert_eq!(doc.resolve_pending_routes(root), 1);
    assert!(doc.graph().namespace(root).pending_routes().is_empty());

    let clock = doc.named_node("Clock").unwrap();
    assert_eq!(doc.graph().node(clock).node().routes().len(), 1);
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W104]);
}

#[test]
fn test_remove_pending_route() {
    let mut doc = load(
        r#"<Scene><ROUTE fromNode="A" fromField="x" toNode="B" toField="y"/></Scene>"#,
    );
    let route_el = element_tagged(&doc, "ROUTE");
    assert!(doc.remove_route(route_el));
    assert!(
        doc.graph()
            .namespace(doc.root_namespace())
            .pending_routes()
            .is_empty()
    );
    assert!(!doc.remove_route(route_el));
}

#[test]
fn test_building_a_wired_route_twice_warns_w102() {
    let mut doc = load(ROUTED);
    let clock = doc.named_node("Clock").unwrap();
    let route_el = element_tagged(&doc, "ROUTE");

    assert_eq!(doc.build_element(route_el, doc.root_namespace()), None);
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W102]);
    assert_eq!(doc.graph().node(clock).node().routes().len(), 1);
}

#[test]
fn test_building_a_pending_route_twice_warns_w102() {
    let mut doc = load(
        r#"<Scene><ROUTE fromNode="A" fromField="x" toNode="B" toField="y"/></Scene>"#,
    );
    let root = doc.root_namespace();
    let route_el = element_tagged(&doc, "ROUTE");

    assert_eq!(doc.build_element(route_el, root), None);
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W104, ErrorCode::W102]);
    assert_eq!(doc.graph().namespace(root).pending_routes().len(), 1);

    // A removed route may be built again.
    assert!(doc.remove_route(route_el));
    assert_eq!(doc.build_element(route_el, root), None);
    assert_eq!(doc.graph().namespace(root).pending_routes().len(), 1);
    assert_eq!(
        warning_codes(&doc),
        vec![ErrorCode::W104, ErrorCode::W102, ErrorCode::W104]
    );
}

#[test]
fn test_field_values_are_duplicates() {
    let mut doc = load(DEF_USE);
    let el = element_with(&doc, "DEF", "T");
    let t = doc.named_node("T").unwrap();

    let mut value = doc.get_field_value(el, "translation").unwrap();
    assert_eq!(value, FieldValue::SFVec3f([1.0, 2.0, 3.0]));

    // Editing the copy leaves the node alone.
    if let FieldValue::SFVec3f(v) = &mut value {
        v[0] = 9.0;
    }
    assert_eq!(
        doc.get_field_value(el, "translation"),
        Some(FieldValue::SFVec3f([1.0, 2.0, 3.0]))
    );

    doc.clear_redraw();
    assert!(doc.set_field_value(el, "translation", &value));
    assert_eq!(doc.get_field_value(el, "translation"), Some(value));
    assert!(doc.needs_redraw());
    assert_eq!(basic(&doc, t).changed_fields(), ["translation".to_string()]);
}

#[test]
fn test_set_field_value_rejects_other_kinds_and_unknown_fields() {
    let mut doc = load(DEF_USE);
    let el = element_with(&doc, "DEF", "T");

    assert!(!doc.set_field_value(el, "translation", &FieldValue::SFBool(true)));
    assert!(!doc.set_field_value(el, "nonsense", &FieldValue::SFBool(true)));
    assert_eq!(doc.get_field_value(el, "nonsense"), None);
}

#[test]
fn test_use_aliases_expose_no_field_interface() {
    let doc = load(DEF_USE);
    let use_el = element_with(&doc, "USE", "T");
    assert!(doc.node_of(use_el).is_some());
    assert_eq!(doc.get_field_value(use_el, "translation"), None);
}

#[test]
fn test_field_reference_is_committed_on_release() {
    let mut doc = load(
        r#"<Scene><Coordinate DEF="C" point="0 0 0, 1 0 0"/><Transform DEF="T"/></Scene>"#,
    );
    let coord_el = element_with(&doc, "DEF", "C");
    let coord = doc.named_node("C").unwrap();

    {
        let value = doc.request_field_ref(coord_el, "point").unwrap();
        if let FieldValue::MFVec3f(points) = value {
            points.push([0.0, 1.0, 0.0]);
        }
    }
    assert!(basic(&doc, coord).changed_fields().is_empty());
    assert!(doc.release_field_ref(coord_el, "point"));
    assert_eq!(basic(&doc, coord).changed_fields(), ["point".to_string()]);
    assert_eq!(
        doc.get_field_value(coord_el, "point"),
        Some(FieldValue::MFVec3f(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0]
        ]))
    );

    // Single-valued fields are never lent out.
    let t_el = element_with(&doc, "DEF", "T");
    assert!(doc.request_field_ref(t_el, "translation").is_none());
    assert!(!doc.release_field_ref(t_el, "nonsense"));
}

#[test]
fn test_set_attribute_updates_field() {
    let mut doc = load(DEF_USE);
    let el = element_with(&doc, "DEF", "T");
    doc.clear_redraw();

    assert!(doc.set_attribute(el, "translation", "0 1 0"));
    assert!(doc.needs_redraw());
    assert_eq!(
        doc.get_field_value(el, "translation"),
        Some(FieldValue::SFVec3f([0.0, 1.0, 0.0]))
    );
    assert_eq!(doc.get_attribute(el, "translation").as_deref(), Some("0 1 0"));

    // Not a field, or not a valid value: the attribute is still stored.
    assert!(!doc.set_attribute(el, "class", "big"));
    assert_eq!(doc.get_attribute(el, "class").as_deref(), Some("big"));
    assert!(!doc.set_attribute(el, "translation", "up"));
    assert_eq!(
        doc.get_field_value(el, "translation"),
        Some(FieldValue::SFVec3f([0.0, 1.0, 0.0]))
    );
}

#[test]
fn test_native_attributes_do_not_fall_back_to_fields() {
    let doc = load(r#"<Scene><Transform def="T"/></Scene>"#);
    let el = element_with(&doc, "def", "T");
    assert_eq!(doc.get_attribute(el, "scale"), None);
    assert_eq!(doc.get_attribute(el, "DEF"), None);
    assert!(!doc.has_attribute(el, "DEF"));
}

#[test]
fn test_attribute_shim_falls_back_to_lowercase_and_fields() {
    let mut doc = load_with_shim(r#"<Scene><Transform def="T"/></Scene>"#);
    let el = element_with(&doc, "def", "T");
    assert!(doc.tree().element(el).unwrap().state.attribute_shim);

    assert_eq!(doc.get_attribute(el, "DEF").as_deref(), Some("T"));
    assert!(doc.has_attribute(el, "DEF"));
    assert_eq!(doc.get_attribute(el, "scale").as_deref(), Some("1 1 1"));
    assert!(!doc.has_attribute(el, "scale"));

    assert!(doc.set_attribute(el, "scale", "2 2 2"));
    assert_eq!(doc.get_attribute(el, "scale").as_deref(), Some("2 2 2"));
}

#[test]
fn test_highlight() {
    let mut doc = load(DEF_USE);
    let el = element_with(&doc, "DEF", "T");
    let t = doc.named_node("T").unwrap();

    assert!(doc.highlight(el, true, "1 0 0"));
    let color = basic(&doc, t).highlight_color().unwrap();
    assert!(color.components()[0] > 0.99);
    assert!(color.components()[1] < 0.01);

    assert!(doc.highlight(el, false, "not a color"));
    assert!(basic(&doc, t).highlight_color().is_none());
    assert!(doc.warnings().is_empty());

    assert!(!doc.highlight(el, true, "not a color"));
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W107]);

    assert!(!doc.highlight(el, true, "NaN 0 0"));
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W107, ErrorCode::W107]);

    // USE aliases are not highlightable.
    let use_el = element_with(&doc, "USE", "T");
    assert!(!doc.highlight(use_el, true, "red"));
}

#[test]
fn test_listeners_are_mirrored_on_nodes() {
    let mut doc = load(DEF_USE);
    let el = element_with(&doc, "DEF", "T");
    let t = doc.named_node("T").unwrap();

    let calls = Rc::new(Cell::new(0));
    let seen = Rc::clone(&calls);
    let id = doc.add_event_listener(
        el,
        "click",
        Rc::new(move |event: &Event| {
            assert_eq!(event.event_type, "click");
            seen.set(seen.get() + 1);
        }),
    );

    assert_eq!(doc.listeners(t, "click"), vec![id]);
    assert_eq!(doc.dispatch_event(t, "click"), 1);
    assert_eq!(doc.dispatch_event(t, "hover"), 0);
    assert_eq!(calls.get(), 1);

    assert!(doc.remove_event_listener(el, "click", id));
    assert!(doc.listeners(t, "click").is_empty());
    assert_eq!(doc.dispatch_event(t, "click"), 0);
    assert!(!doc.remove_event_listener(el, "click", id));
}

#[test]
fn test_attach_subtree_builds_in_parent_namespace() {
    let mut doc = load(
        r#"<Scene>
             <Group DEF="G"/>
             <ROUTE fromNode="Late" fromField="fraction_changed" toNode="G" toField="x"/>
           </Scene>"#,
    );
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W104]);
    let g_el = element_with(&doc, "DEF", "G");
    let g = doc.named_node("G").unwrap();
    doc.clear_redraw();

    let nodes = doc
        .attach_subtree(g_el, r#"<TimeSensor DEF="Late"/>"#)
        .expect("Failed to attach");
    assert_eq!(nodes.len(), 1);
    assert_eq!(doc.named_node("Late"), Some(nodes[0]));
    assert_eq!(children(&doc, g), vec![("children".to_string(), nodes[0])]);
    assert!(doc.needs_redraw());

    // The waiting route is wired without another warning.
    assert_eq!(doc.graph().node(nodes[0]).node().routes().len(), 1);
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W104]);
}

#[test]
fn test_attach_subtree_errors() {
    let mut doc = load(r#"<Scene><Group DEF="G"/><Teapot/></Scene>"#);
    let g_el = element_with(&doc, "DEF", "G");
    let teapot = element_tagged(&doc, "Teapot");

    assert!(matches!(
        doc.attach_subtree(g_el, "<Shape"),
        Err(CanopyError::Parse { .. })
    ));
    assert!(matches!(
        doc.attach_subtree(teapot, "<Shape/>"),
        Err(CanopyError::Unlinked(el)) if el == teapot
    ));
}

#[test]
fn test_summary_lists_names_and_routes() {
    let doc = load(ROUTED);
    let summary = doc.summary().to_string();
    assert!(summary.contains("DEF Clock ="), "{summary}");
    assert!(summary.contains("TimeSensor DEF Clock"), "{summary}");
    assert!(summary.contains(".fraction_changed -> "), "{summary}");
}

#[test]
fn test_summary_marks_reused_nodes() {
    let doc = load(DEF_USE);
    let summary = doc.summary().to_string();
    assert_eq!(summary.matches("(again)").count(), 1, "{summary}");
}
