//! Template declaration, expansion and loading.

use std::fs;

use canopy::{
    CanopyError, Document, ErrorCode, SceneBuilder,
    config::{AppConfig, BuildConfig, LoaderConfig},
    field::FieldValue,
    loader::FileFetcher,
    node::{NamespaceId, NodeId},
    template::TemplateState,
    tree::ElementId,
};

fn load(source: &str) -> Document {
    SceneBuilder::default()
        .load(source, "scenes/main.x3d")
        .expect("Failed to load document")
}

fn warning_codes(doc: &Document) -> Vec<ErrorCode> {
    doc.warnings().iter().filter_map(|w| w.code()).collect()
}

fn count(doc: &Document, code: ErrorCode) -> usize {
    warning_codes(doc).into_iter().filter(|c| *c == code).count()
}

fn scope(doc: &Document, parent: NamespaceId, name: &str) -> NamespaceId {
    doc.graph()
        .namespace(parent)
        .children()
        .iter()
        .copied()
        .find(|ns| doc.graph().namespace(*ns).name() == name)
        .unwrap_or_else(|| panic!("no namespace `{name}`"))
}

fn field(doc: &Document, node: NodeId, name: &str) -> Option<FieldValue> {
    doc.graph().node(node).node().fields().get(name).cloned()
}

fn element_tagged(doc: &Document, tag: &str) -> ElementId {
    let tree = doc.tree();
    tree.roots()
        .iter()
        .flat_map(|root| tree.descendants(*root))
        .find(|id| tree.element(*id).is_some_and(|el| el.tag() == tag))
        .unwrap_or_else(|| panic!("no <{tag}> element"))
}

fn template_state(doc: &Document, name: &str) -> TemplateState {
    doc.graph()
        .namespace(doc.root_namespace())
        .templates()
        .iter()
        .find(|t| t.name() == name)
        .map(|t| t.state())
        .unwrap_or_else(|| panic!("no template `{name}`"))
}

const LAMPS: &str = r#"
    <Scene>
      <ProtoDeclare name="Lamp">
        <ProtoInterface>
          <field name="color" type="SFColor" value="1 1 0"/>
          <field name="size" type="SFVec3f" value="1 1 1"/>
        </ProtoInterface>
        <ProtoBody>
          <Transform DEF="Base">
            <IS><connect nodeField="scale" protoField="size"/></IS>
            <Shape>
              <Appearance>
                <Material DEF="Glow">
                  <IS><connect nodeField="emissiveColor" protoField="color"/></IS>
                </Material>
              </Appearance>
              <Box/>
            </Shape>
          </Transform>
        </ProtoBody>
      </ProtoDeclare>
      <ProtoInstance name="Lamp" DEF="Red">
        <fieldValue name="color" value="1 0 0"/>
      </ProtoInstance>
      <ProtoInstance name="Lamp" DEF="Plain"/>
    </Scene>
"#;

#[test]
fn test_local_template_expands_per_instance() {
    let doc = load(LAMPS);
    assert!(doc.warnings().is_empty(), "{:?}", doc.warnings());
    let root = doc.root_namespace();

    let red = scope(&doc, root, "Red");
    let plain = scope(&doc, root, "Plain");
    let red_glow = doc.graph().lookup(red, "Glow").unwrap();
    let plain_glow = doc.graph().lookup(plain, "Glow").unwrap();
    assert_ne!(red_glow, plain_glow);

    // fieldValue overrides the interface default.
    assert_eq!(
        field(&doc, red_glow, "emissiveColor"),
        Some(FieldValue::SFColor([1.0, 0.0, 0.0]))
    );
    assert_eq!(
        field(&doc, plain_glow, "emissiveColor"),
        Some(FieldValue::SFColor([1.0, 1.0, 0.0]))
    );

    let red_base = doc.graph().lookup(red, "Base").unwrap();
    assert_eq!(doc.named_node("Red"), Some(red_base));
    assert_eq!(
        field(&doc, red_base, "scale"),
        Some(FieldValue::SFVec3f([1.0, 1.0, 1.0]))
    );
}

#[test]
fn test_instances_attach_to_parent_and_link_their_element() {
    let doc = load(LAMPS);
    let red = doc.named_node("Red").unwrap();
    let plain = doc.named_node("Plain").unwrap();

    let scene = doc.roots()[0];
    let attached: Vec<NodeId> = doc
        .graph()
        .node(scene)
        .node()
        .children()
        .into_iter()
        .map(|(_, n)| n)
        .collect();
    assert_eq!(attached, vec![red, plain]);

    let instance = element_tagged(&doc, "ProtoInstance");
    assert_eq!(doc.node_of(instance), Some(red));
}

#[test]
fn test_declaration_body_is_left_untouched() {
    let doc = load(LAMPS);
    let material = element_tagged(&doc, "Material");
    let el = doc.tree().element(material).unwrap();
    assert_eq!(el.attribute("DEF"), Some("Glow"));
    assert_eq!(el.attribute("emissiveColor"), None);
    assert_eq!(doc.node_of(material), None);
}

#[test]
fn test_unknown_or_nameless_instances_warn_w105() {
    let doc = load(
        r#"<Scene>
             <ProtoInstance name="Ghost"/>
             <ProtoInstance/>
             <ProtoDeclare name="Empty"/>
             <ProtoInstance name="Empty"/>
           </Scene>"#,
    );
    assert_eq!(
        warning_codes(&doc),
        vec![ErrorCode::W105, ErrorCode::W105, ErrorCode::W105]
    );
}

#[test]
fn test_template_instantiating_itself_warns_w105() {
    let doc = load(
        r#"<Scene>
             <ProtoDeclare name="Loop">
               <ProtoBody>
                 <Group DEF="G"><ProtoInstance name="Loop"/></Group>
               </ProtoBody>
             </ProtoDeclare>
             <ProtoInstance name="Loop" DEF="L"/>
           </Scene>"#,
    );
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W105]);
    assert!(doc.named_node("L").is_some());
}

#[test]
fn test_instance_may_precede_its_declaration() {
    let doc = load(
        r#"<Scene>
             <ProtoInstance name="Lamp" DEF="L"/>
             <ProtoDeclare name="Lamp"><ProtoBody><Group DEF="Stand"/></ProtoBody></ProtoDeclare>
           </Scene>"#,
    );
    assert!(doc.warnings().is_empty(), "{:?}", doc.warnings());

    let lamp = doc.named_node("L").unwrap();
    let stand = scope(&doc, doc.root_namespace(), "L");
    assert_eq!(doc.graph().lookup(stand, "Stand"), Some(lamp));

    let scene = doc.roots()[0];
    let attached: Vec<NodeId> = doc
        .graph()
        .node(scene)
        .node()
        .children()
        .into_iter()
        .map(|(_, n)| n)
        .collect();
    assert_eq!(attached, vec![lamp]);
}

#[test]
fn test_building_an_instance_twice_warns_w102() {
    let mut doc = load(LAMPS);
    let instance = element_tagged(&doc, "ProtoInstance");
    let nodes = doc.graph().node_count();
    let namespaces = doc.graph().namespaces().count();

    assert_eq!(doc.build_element(instance, doc.root_namespace()), None);
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W102]);
    assert_eq!(doc.graph().node_count(), nodes);
    assert_eq!(doc.graph().namespaces().count(), namespaces);
}

#[test]
fn test_attached_instance_expands() {
    let mut doc = load(
        r#"<Scene>
             <ProtoDeclare name="Lamp"><ProtoBody><Group DEF="Stand"/></ProtoBody></ProtoDeclare>
           </Scene>"#,
    );
    let root = doc.root_namespace();
    let scene = element_tagged(&doc, "Scene");
    let attached = doc
        .attach_subtree(scene, r#"<ProtoInstance name="Lamp" DEF="Late"/>"#)
        .expect("Failed to attach subtree");
    assert_eq!(attached.len(), 1);
    assert_eq!(doc.named_node("Late"), attached.first().copied());
    assert!(doc.graph().lookup(scope(&doc, root, "Late"), "Stand").is_some());
}

const DOOR_LIB: &str = r#"
    <X3D><Scene>
      <ProtoDeclare name="Door">
        <ProtoInterface>
          <field name="color" type="SFColor" value="1 1 1"/>
        </ProtoInterface>
        <ProtoBody>
          <Transform DEF="Frame">
            <Shape>
              <Appearance>
                <Material DEF="Paint">
                  <IS><connect nodeField="diffuseColor" protoField="color"/></IS>
                </Material>
              </Appearance>
            </Shape>
          </Transform>
        </ProtoBody>
      </ProtoDeclare>
    </Scene></X3D>
"#;

const HOUSE: &str = r#"
    <Scene>
      <ExternProtoDeclare name="Door" url='"lib/door.x3d#Door"'>
        <field name="color" type="SFColor"/>
      </ExternProtoDeclare>
      <TimeSensor DEF="Clock"/>
      <ProtoInstance name="Door" DEF="D1">
        <fieldValue name="color" value="0 0 1"/>
      </ProtoInstance>
      <Door DEF="D2" color="0 1 0"/>
      <ROUTE fromNode="Clock" fromField="fraction_changed" toNode="D1" toField="set_fraction"/>
      <ROUTE fromNode="Clock" fromField="isActive" toNode="Missing" toField="x"/>
    </Scene>
"#;

#[test]
fn test_external_template_queues_one_load() {
    let doc = load(HOUSE);
    let requests = doc.load_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].template, "Door");
    assert_eq!(requests[0].urls, vec!["scenes/lib/door.x3d#Door".to_string()]);

    assert!(matches!(
        template_state(&doc, "Door"),
        TemplateState::Loading(id) if id == requests[0].id
    ));
    assert!(doc.named_node("D1").is_none());
    assert!(doc.named_node("D2").is_none());
    assert_eq!(warning_codes(&doc), vec![ErrorCode::W104, ErrorCode::W104]);
}

#[test]
fn test_complete_load_builds_waiting_instances() {
    let mut doc = load(HOUSE);
    let id = doc.load_requests()[0].id;
    doc.clear_redraw();

    let nodes = doc
        .complete_load(id, "scenes/lib/door.x3d#Door", DOOR_LIB)
        .expect("Failed to complete load");
    assert_eq!(nodes.len(), 2);
    assert!(doc.needs_redraw());
    assert!(doc.load_requests().is_empty());
    assert_eq!(template_state(&doc, "Door"), TemplateState::Available);

    let root = doc.root_namespace();
    let d1 = doc.named_node("D1").unwrap();
    let d2 = doc.named_node("D2").unwrap();
    assert_eq!(nodes, vec![d1, d2]);

    // ProtoInstance takes fieldValue children, the direct tag its attributes.
    let d1_scope = scope(&doc, root, "D1");
    let d2_scope = scope(&doc, root, "D2");
    let paint = doc.graph().lookup(d1_scope, "Paint").unwrap();
    assert_eq!(
        field(&doc, paint, "diffuseColor"),
        Some(FieldValue::SFColor([0.0, 0.0, 1.0]))
    );
    let paint = doc.graph().lookup(d2_scope, "Paint").unwrap();
    assert_eq!(
        field(&doc, paint, "diffuseColor"),
        Some(FieldValue::SFColor([0.0, 1.0, 0.0]))
    );

    // The loaded body resolves its own URLs next to its file.
    assert_eq!(doc.graph().namespace(d1_scope).base_url(), "scenes/lib/");

    let scene = doc.roots()[0];
    let attached: Vec<NodeId> = doc
        .graph()
        .node(scene)
        .node()
        .children()
        .into_iter()
        .map(|(_, n)| n)
        .collect();
    assert!(attached.contains(&d1));
    assert!(attached.contains(&d2));
}

#[test]
fn test_building_a_direct_instance_twice_warns_w102() {
    let mut doc = load(HOUSE);
    let id = doc.load_requests()[0].id;
    doc.complete_load(id, "scenes/lib/door.x3d#Door", DOOR_LIB)
        .expect("Failed to complete load");
    let door = element_tagged(&doc, "Door");
    let d2 = doc.named_node("D2").unwrap();
    let nodes = doc.graph().node_count();
    let namespaces = doc.graph().namespaces().count();
    let before = count(&doc, ErrorCode::W102);

    assert_eq!(doc.node_of(door), Some(d2));
    assert_eq!(doc.build_element(door, doc.root_namespace()), None);
    assert_eq!(count(&doc, ErrorCode::W102), before + 1);
    assert_eq!(doc.graph().node_count(), nodes);
    assert_eq!(doc.graph().namespaces().count(), namespaces);
    assert_eq!(doc.named_node("D2"), Some(d2));
}

#[test]
fn test_rebuilding_a_waiting_instance_waits_once() {
    let mut doc = load(HOUSE);
    let root = doc.root_namespace();
    let door = element_tagged(&doc, "Door");
    let instance = element_tagged(&doc, "ProtoInstance");

    assert_eq!(doc.build_element(door, root), None);
    assert_eq!(doc.build_element(instance, root), None);
    assert_eq!(doc.load_requests().len(), 1);

    let id = doc.load_requests()[0].id;
    let nodes = doc
        .complete_load(id, "scenes/lib/door.x3d#Door", DOOR_LIB)
        .expect("Failed to complete load");
    assert_eq!(nodes.len(), 2);
}

#[test]
fn test_late_routes_are_wired_and_reported_once() {
    let mut doc = load(HOUSE);
    let id = doc.load_requests()[0].id;
    doc.complete_load(id, "scenes/lib/door.x3d", DOOR_LIB)
        .expect("Failed to complete load");

    let clock = doc.named_node("Clock").unwrap();
    let d1 = doc.named_node("D1").unwrap();
    let routes = doc.graph().node(clock).node().routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].target, d1);
    assert_eq!(routes[0].to_field, "set_fraction");

    let root = doc.root_namespace();
    let pending = doc.graph().namespace(root).pending_routes();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].to_node, "Missing");
    assert_eq!(count(&doc, ErrorCode::W104), 3);

    assert_eq!(doc.resolve_pending_routes(root), 0);
    assert_eq!(count(&doc, ErrorCode::W104), 3);
}

#[test]
fn test_complete_load_rejects_unknown_ids() {
    let mut doc = load(HOUSE);
    let id = doc.load_requests()[0].id;
    doc.complete_load(id, "scenes/lib/door.x3d", DOOR_LIB)
        .expect("Failed to complete load");
    assert!(matches!(
        doc.complete_load(id, "scenes/lib/door.x3d", DOOR_LIB),
        Err(CanopyError::Load(_))
    ));
}

#[test]
fn test_complete_load_without_declaration_fails_template() {
    let mut doc = load(HOUSE);
    let id = doc.load_requests()[0].id;
    let result = doc.complete_load(
        id,
        "scenes/lib/other.x3d",
        r#"<Scene><ProtoDeclare name="Window"><ProtoBody><Group/></ProtoBody></ProtoDeclare></Scene>"#,
    );

    assert!(matches!(result, Err(CanopyError::Load(_))));
    assert_eq!(template_state(&doc, "Door"), TemplateState::Failed);
    assert_eq!(count(&doc, ErrorCode::W106), 1);
    assert!(doc.named_node("D1").is_none());
}

#[test]
fn test_complete_load_with_bad_markup_fails_template() {
    let mut doc = load(HOUSE);
    let id = doc.load_requests()[0].id;
    let result = doc.complete_load(id, "scenes/lib/door.x3d", "<Scene>");

    assert!(matches!(result, Err(CanopyError::Parse { .. })));
    assert_eq!(template_state(&doc, "Door"), TemplateState::Failed);
}

#[test]
fn test_failed_template_rejects_later_instances() {
    let mut doc = load(HOUSE);
    let id = doc.load_requests()[0].id;
    assert!(doc.fail_load(id, "offline"));
    assert!(!doc.fail_load(id, "offline"));
    assert_eq!(template_state(&doc, "Door"), TemplateState::Failed);
    assert_eq!(count(&doc, ErrorCode::W106), 1);

    let scene_el = element_tagged(&doc, "Scene");
    let nodes = doc
        .attach_subtree(scene_el, r#"<ProtoInstance name="Door" DEF="D3"/>"#)
        .expect("Failed to attach");
    assert!(nodes.is_empty());
    assert_eq!(count(&doc, ErrorCode::W106), 2);
    assert!(doc.load_requests().is_empty());
}

#[test]
fn test_pending_load_limit_warns_w108() {
    let config = AppConfig::new(BuildConfig::default(), LoaderConfig::new(Vec::new(), 1));
    let doc = SceneBuilder::new(config)
        .load(
            r#"<Scene>
                 <ExternProtoDeclare name="A" url='"a.x3d"'/>
                 <ExternProtoDeclare name="B" url='"b.x3d"'/>
                 <ProtoInstance name="A"/>
                 <ProtoInstance name="A"/>
                 <ProtoInstance name="B"/>
               </Scene>"#,
            "",
        )
        .expect("Failed to load document");

    assert_eq!(warning_codes(&doc), vec![ErrorCode::W108]);
    assert_eq!(doc.load_requests().len(), 1);
    assert_eq!(template_state(&doc, "B"), TemplateState::Unloaded);
}

#[test]
fn test_run_loads_reads_files_next_to_the_document() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("door.x3d"), DOOR_LIB).unwrap();
    let url = dir.path().join("house.x3d").to_string_lossy().to_string();

    let mut doc = SceneBuilder::default()
        .load(
            r#"<Scene>
                 <ExternProtoDeclare name="Door" url='"door.x3d#Door"'/>
                 <ProtoInstance name="Door" DEF="D1"/>
               </Scene>"#,
            &url,
        )
        .expect("Failed to load document");

    assert_eq!(doc.run_loads(&FileFetcher::default()), 1);
    assert!(doc.warnings().is_empty(), "{:?}", doc.warnings());

    let d1_scope = scope(&doc, doc.root_namespace(), "D1");
    let paint = doc.graph().lookup(d1_scope, "Paint").unwrap();
    assert_eq!(
        field(&doc, paint, "diffuseColor"),
        Some(FieldValue::SFColor([1.0, 1.0, 1.0]))
    );
}

#[test]
fn test_run_loads_uses_search_paths_and_nested_templates() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("door.x3d"),
        r#"<ProtoDeclare name="Door">
             <ProtoBody>
               <Group DEF="Frame">
                 <ExternProtoDeclare name="Knob" url='"knob.x3d"'/>
                 <ProtoInstance name="Knob" DEF="K"/>
               </Group>
             </ProtoBody>
           </ProtoDeclare>"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("knob.x3d"),
        r#"<ProtoDeclare name="Knob"><ProtoBody><Sphere DEF="Ball"/></ProtoBody></ProtoDeclare>"#,
    )
    .unwrap();

    // Relative URLs of a document without a location only resolve through
    // the search paths.
    let mut doc = SceneBuilder::default()
        .load(
            r#"<Scene>
                 <ExternProtoDeclare name="Door" url='"door.x3d"'/>
                 <ProtoInstance name="Door" DEF="D1"/>
               </Scene>"#,
            "",
        )
        .expect("Failed to load document");
    let fetcher = FileFetcher::new(vec![dir.path().to_path_buf()]);
    assert_eq!(doc.run_loads(&fetcher), 2);
    assert!(doc.warnings().is_empty(), "{:?}", doc.warnings());

    let root = doc.root_namespace();
    let d1_scope = scope(&doc, root, "D1");
    let frame = doc.graph().lookup(d1_scope, "Frame").unwrap();
    let knob_scope = scope(&doc, d1_scope, "K");
    let ball = doc.graph().lookup(knob_scope, "Ball").unwrap();
    let frame_children: Vec<NodeId> = doc
        .graph()
        .node(frame)
        .node()
        .children()
        .into_iter()
        .map(|(_, n)| n)
        .collect();
    assert_eq!(frame_children, vec![ball]);
}

#[test]
fn test_run_loads_reports_missing_files() {
    let mut doc = load(HOUSE);
    assert_eq!(doc.run_loads(&FileFetcher::default()), 0);
    assert_eq!(template_state(&doc, "Door"), TemplateState::Failed);
    assert_eq!(count(&doc, ErrorCode::W106), 1);
    assert!(doc.load_requests().is_empty());
}
