//! Keyed loop reconciliation tests

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sprout::dom::{Document, NodeId};
use sprout::*;

// Mount a single root whose template content is `content`
fn mount(data: Value, content: &str) -> (Document, Engine<Document>, NodeId, RootId) {
    let mut doc = Document::new();
    let body = doc.body();
    let markup = format!(
        r#"<template is="🌱" data-json='{}'>{}</template>"#,
        data, content
    );
    let nodes = doc.append_markup(body, &markup).expect("markup");
    let mut engine = Engine::default();
    let id = engine.mount(&mut doc, &nodes[0]).expect("mount");
    (doc, engine, nodes[0], id)
}

fn update(doc: &mut Document, engine: &mut Engine<Document>, root: NodeId, data: Value) {
    doc.set_attribute(&root, "data-json", &data.to_string());
    for (_, result) in engine.flush(doc) {
        result.expect("render");
    }
}

fn rendered(doc: &Document, engine: &Engine<Document>, id: RootId) -> String {
    engine
        .output(doc, id)
        .into_iter()
        .map(|node| doc.outer_html(node))
        .collect()
}

fn users(ids: &[u64]) -> Value {
    Value::Array(
        ids.iter()
            .map(|i| json!({"id": i, "name": format!("User-{}", i)}))
            .collect(),
    )
}

const USER_LIST: &str = concat!(
    r#"<template data-for="{user in _}" data-key="{user.id}">"#,
    r#"<div data-id="{user.id}">{user.name}</div>"#,
    "</template>"
);

// ═══════════════════════════════════════════════════════════════════════
// Identity
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_reorder_preserves_identity() {
    let (mut doc, mut engine, root, id) = mount(users(&[0, 1, 2]), USER_LIST);
    let before: Vec<NodeId> = ["0", "1", "2"]
        .iter()
        .map(|i| doc.find_by_attribute("data-id", i).unwrap())
        .collect();
    let parent = doc.parent(&before[0]).unwrap();

    update(&mut doc, &mut engine, root, users(&[1, 2, 0]));

    let after: Vec<NodeId> = ["0", "1", "2"]
        .iter()
        .map(|i| doc.find_by_attribute("data-id", i).unwrap())
        .collect();
    assert_eq!(after, before);
    assert!(doc.contains(parent, after[0]));
    assert_eq!(
        rendered(&doc, &engine, id),
        concat!(
            "<!--loop-start-->",
            r#"<div data-id="1">User-1</div>"#,
            r#"<div data-id="2">User-2</div>"#,
            r#"<div data-id="0">User-0</div>"#,
            "<!--loop-end-->"
        )
    );
    assert_eq!(
        engine.owned_nodes(id, 0),
        vec![before[0], before[1], before[2]]
    );
}

#[test]
fn test_identity_field_is_default_key() {
    let content =
        r#"<template data-for="{user in _}"><p data-id="{user.id}">{user.name}</p></template>"#;
    let (mut doc, mut engine, root, _) = mount(users(&[5, 6]), content);
    let five = doc.find_by_attribute("data-id", "5").unwrap();

    update(&mut doc, &mut engine, root, users(&[6, 5]));

    assert_eq!(doc.find_by_attribute("data-id", "5"), Some(five));
}

#[test]
fn test_configured_identity_field_keys_reorder() {
    let mut doc = Document::new();
    let body = doc.body();
    let markup = concat!(
        r#"<template is="🌱" data-json='[{"code": "a", "id": 0}, {"code": "b", "id": 0}]'>"#,
        r#"<template data-for="{c in _}"><b>{c.code}</b></template>"#,
        "</template>"
    );
    let root = doc.append_markup(body, markup).expect("markup")[0];
    let mut engine = Engine::new(EngineConfig::default().with_identity_field("code"));
    let id = engine.mount(&mut doc, &root).expect("mount");
    let owned = engine.owned_nodes(id, 0);
    assert_eq!(
        engine.loop_keys(id, 0),
        vec![LoopKey::String("a".into()), LoopKey::String("b".into())]
    );

    update(
        &mut doc,
        &mut engine,
        root,
        json!([{"code": "b", "id": 0}, {"code": "a", "id": 0}]),
    );

    assert_eq!(engine.owned_nodes(id, 0), owned);
    assert_eq!(doc.text_content(owned[0]), "a");
    assert_eq!(doc.next_sibling(&owned[1]), Some(owned[0]));
    assert_eq!(
        rendered(&doc, &engine, id),
        "<!--loop-start--><b>b</b><b>a</b><!--loop-end-->"
    );
}

#[test]
fn test_key_expression_without_braces() {
    let content =
        r#"<template data-for="{item in _}" data-key="item.code"><b>{item.code}</b></template>"#;
    let (mut doc, mut engine, root, id) = mount(json!([{"code": "a"}, {"code": "b"}]), content);
    let owned = engine.owned_nodes(id, 0);

    update(&mut doc, &mut engine, root, json!([{"code": "b"}, {"code": "a"}]));

    assert_eq!(
        engine.loop_keys(id, 0),
        vec![LoopKey::String("a".into()), LoopKey::String("b".into())]
    );
    assert_eq!(engine.owned_nodes(id, 0), owned);
    assert_eq!(
        rendered(&doc, &engine, id),
        "<!--loop-start--><b>b</b><b>a</b><!--loop-end-->"
    );
}

#[test]
fn test_positional_keys_follow_index() {
    let content = r#"<template data-for="{s in _}"><span>{s}</span></template>"#;
    let (mut doc, mut engine, root, id) = mount(json!(["x", "y", "z"]), content);
    let owned = engine.owned_nodes(id, 0);

    update(&mut doc, &mut engine, root, json!(["y", "z"]));

    // identity stays with the position, not the item
    assert_eq!(engine.owned_nodes(id, 0), owned[..2].to_vec());
    assert_eq!(doc.text_content(owned[0]), "y");
    assert_eq!(engine.loop_keys(id, 0), vec![LoopKey::index(0), LoopKey::index(1)]);
}

// ═══════════════════════════════════════════════════════════════════════
// Patching
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_deep_change_patches_only_that_item() {
    let content =
        r#"<template data-for="{it in _}"><li data-id="{it.id}"><b>{it.v}</b></li></template>"#;
    let (mut doc, mut engine, root, id) =
        mount(json!([{"id": 0, "v": "a"}, {"id": 1, "v": "b"}]), content);
    let first = doc.find_by_attribute("data-id", "0").unwrap();
    let second = doc.find_by_attribute("data-id", "1").unwrap();
    let first_inner = doc.children(&first)[0];
    let second_inner = doc.children(&second)[0];

    update(&mut doc, &mut engine, root, json!([{"id": 0, "v": "a"}, {"id": 1, "v": "c"}]));

    assert_eq!(doc.find_by_attribute("data-id", "0"), Some(first));
    assert_eq!(doc.children(&first), vec![first_inner]);

    assert_eq!(doc.find_by_attribute("data-id", "1"), Some(second));
    assert_ne!(doc.children(&second), vec![second_inner]);
    assert_eq!(
        rendered(&doc, &engine, id),
        concat!(
            "<!--loop-start-->",
            r#"<li data-id="0"><b>a</b></li><li data-id="1"><b>c</b></li>"#,
            "<!--loop-end-->"
        )
    );
}

#[test]
fn test_patch_syncs_attributes_in_place() {
    let content = concat!(
        r#"<template data-for="{it in _}">"#,
        r#"<p data-id="{it.id}" class="{it.cls}">{it.id}</p>"#,
        "</template>"
    );
    let (mut doc, mut engine, root, id) = mount(json!([{"id": 1, "cls": "old"}]), content);
    let owned = engine.owned_nodes(id, 0);

    update(&mut doc, &mut engine, root, json!([{"id": 1, "cls": "new"}]));

    assert_eq!(engine.owned_nodes(id, 0), owned);
    assert_eq!(doc.attribute(&owned[0], "class").as_deref(), Some("new"));
    assert_eq!(
        rendered(&doc, &engine, id),
        r#"<!--loop-start--><p class="new" data-id="1">1</p><!--loop-end-->"#
    );
}

#[test]
fn test_shape_change_replaces_owned_node() {
    let content = concat!(
        r#"<template data-for="{x in _}">"#,
        r#"<template data-if="{x.big}"><h1>{x.id}</h1></template>"#,
        r#"<template data-unless="{x.big}"><p>{x.id}</p></template>"#,
        "</template>"
    );
    let (mut doc, mut engine, root, id) = mount(json!([{"id": 1, "big": true}]), content);
    assert_eq!(
        rendered(&doc, &engine, id),
        "<!--loop-start--><h1>1</h1><!--loop-end-->"
    );

    update(&mut doc, &mut engine, root, json!([{"id": 1, "big": false}]));

    let owned = engine.owned_nodes(id, 0);
    assert_eq!(owned.len(), 1);
    assert_eq!(doc.tag_name(&owned[0]).as_deref(), Some("p"));
    assert_eq!(
        rendered(&doc, &engine, id),
        "<!--loop-start--><p>1</p><!--loop-end-->"
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Insertion and Deletion
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_deleting_last_item_leaves_two_entries() {
    let (mut doc, mut engine, root, id) = mount(users(&[0, 1, 2]), USER_LIST);
    let removed = doc.find_by_attribute("data-id", "2").unwrap();

    update(&mut doc, &mut engine, root, users(&[0, 1]));

    assert_eq!(engine.owned_nodes(id, 0).len(), 2);
    assert_eq!(
        engine.loop_keys(id, 0),
        vec![LoopKey::index(0), LoopKey::index(1)]
    );
    assert_eq!(doc.parent(&removed), None);
    assert_eq!(doc.find_by_attribute("data-id", "2"), None);
}

#[test]
fn test_insert_in_middle() {
    let (mut doc, mut engine, root, id) = mount(users(&[0, 2]), USER_LIST);
    let zero = doc.find_by_attribute("data-id", "0").unwrap();

    update(&mut doc, &mut engine, root, users(&[0, 1, 2]));

    assert_eq!(doc.find_by_attribute("data-id", "0"), Some(zero));
    assert_eq!(
        rendered(&doc, &engine, id),
        concat!(
            "<!--loop-start-->",
            r#"<div data-id="0">User-0</div>"#,
            r#"<div data-id="1">User-1</div>"#,
            r#"<div data-id="2">User-2</div>"#,
            "<!--loop-end-->"
        )
    );
}

#[test]
fn test_sibling_nodes_move_and_leave_with_their_item() {
    let content = r#"<template data-for="{u in _}"> <b>{u.id}</b> </template>"#;
    let (mut doc, mut engine, root, id) = mount(json!([{"id": 1}, {"id": 2}]), content);

    update(&mut doc, &mut engine, root, json!([{"id": 2}, {"id": 1}]));
    assert_eq!(
        rendered(&doc, &engine, id),
        "<!--loop-start--> <b>2</b>  <b>1</b> <!--loop-end-->"
    );

    update(&mut doc, &mut engine, root, json!([{"id": 2}]));
    assert_eq!(
        rendered(&doc, &engine, id),
        "<!--loop-start--> <b>2</b> <!--loop-end-->"
    );
}

#[test]
fn test_empty_body_is_recreated_when_it_renders() {
    let content = concat!(
        r#"<template data-for="{x in _}">"#,
        r#"<template data-if="{x.show}"><b>{x.id}</b></template>"#,
        "</template>"
    );
    let (mut doc, mut engine, root, id) = mount(json!([{"id": 1, "show": false}]), content);
    assert_eq!(engine.loop_keys(id, 0), vec![LoopKey::index(1)]);
    assert!(engine.owned_nodes(id, 0).is_empty());

    update(&mut doc, &mut engine, root, json!([{"id": 1, "show": true}]));

    assert_eq!(engine.owned_nodes(id, 0).len(), 1);
    assert_eq!(
        rendered(&doc, &engine, id),
        "<!--loop-start--><b>1</b><!--loop-end-->"
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Degradation
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_duplicate_keys_last_item_wins() {
    let content = r#"<template data-for="{x in _}"><span>{x.v}</span></template>"#;
    let (doc, engine, _, id) = mount(json!([{"id": 1, "v": "a"}, {"id": 1, "v": "b"}]), content);

    assert_eq!(engine.loop_keys(id, 0), vec![LoopKey::index(1)]);
    assert_eq!(
        rendered(&doc, &engine, id),
        "<!--loop-start--><span>b</span><!--loop-end-->"
    );
}

#[test]
fn test_malformed_loop_renders_nothing() {
    let content = r#"<template data-for="users"><b>x</b></template>"#;
    let (doc, engine, _, id) = mount(json!({"users": [1, 2]}), content);
    assert_eq!(rendered(&doc, &engine, id), "<!--loop-start--><!--loop-end-->");
    assert!(engine.loop_keys(id, 0).is_empty());
}

#[test]
fn test_non_array_sequence_renders_nothing() {
    let content = concat!(
        r#"<template data-for="{c in name}"><b>{c}</b></template>"#,
        r#"<template data-for="{c in missing}"><b>{c}</b></template>"#
    );
    let (doc, engine, _, id) = mount(json!({"name": "Ada"}), content);
    assert_eq!(
        rendered(&doc, &engine, id),
        "<!--loop-start--><!--loop-end--><!--loop-start--><!--loop-end-->"
    );
}

#[test]
fn test_items_do_not_see_each_others_bindings() {
    let content = concat!(
        r#"<template data-for="{a in _}"><i>{b}</i></template>"#,
        r#"<template data-for="{b in _}"><u>{a}</u></template>"#
    );
    let (doc, engine, _, id) = mount(json!([1]), content);
    assert_eq!(
        rendered(&doc, &engine, id),
        "<!--loop-start--><i></i><!--loop-end--><!--loop-start--><u></u><!--loop-end-->"
    );
}

#[test]
fn test_item_binding_wins_over_item_field_of_same_name() {
    let content = concat!(
        r#"<template data-for="{user in _}">"#,
        "<b>{user.name}</b><i>{_.user}</i><u>{user}</u>",
        "</template>"
    );
    let (doc, engine, _, id) = mount(json!([{"name": "bound", "user": "field"}]), content);
    assert_eq!(
        rendered(&doc, &engine, id),
        concat!(
            "<!--loop-start-->",
            "<b>bound</b><i>field</i>",
            r#"<u>{"name":"bound","user":"field"}</u>"#,
            "<!--loop-end-->"
        )
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Nesting
// ═══════════════════════════════════════════════════════════════════════

const GROUPS: &str = concat!(
    r#"<template data-for="{g in _}">"#,
    r#"<section data-id="{g.id}">"#,
    r#"<template data-for="{t in g.tags}"><i>{t}</i></template>"#,
    "</section>",
    "</template>"
);

#[test]
fn test_nested_loops_are_independent_per_item() {
    let (doc, engine, _, id) = mount(
        json!([{"id": 1, "tags": ["a", "b"]}, {"id": 2, "tags": ["c"]}]),
        GROUPS,
    );

    assert_eq!(engine.loop_instances(id), 3);
    assert_eq!(
        rendered(&doc, &engine, id),
        concat!(
            "<!--loop-start-->",
            r#"<section data-id="1"><!--loop-start--><i>a</i><i>b</i><!--loop-end--></section>"#,
            r#"<section data-id="2"><!--loop-start--><i>c</i><!--loop-end--></section>"#,
            "<!--loop-end-->"
        )
    );
}

#[test]
fn test_nested_loop_patch_keeps_outer_and_inner_identity() {
    let (mut doc, mut engine, root, _) = mount(
        json!([{"id": 1, "tags": ["a", "b"]}, {"id": 2, "tags": ["c"]}]),
        GROUPS,
    );
    let section = doc.find_by_attribute("data-id", "2").unwrap();
    let first_tag = doc
        .children(&section)
        .into_iter()
        .find(|node| doc.tag_name(node).as_deref() == Some("i"))
        .unwrap();

    update(
        &mut doc,
        &mut engine,
        root,
        json!([{"id": 1, "tags": ["a", "b"]}, {"id": 2, "tags": ["c", "d"]}]),
    );

    assert_eq!(doc.find_by_attribute("data-id", "2"), Some(section));
    assert!(doc.contains(section, first_tag));
    assert_eq!(
        doc.inner_html(section),
        "<!--loop-start--><i>c</i><i>d</i><!--loop-end-->"
    );
}

#[test]
fn test_removing_outer_item_discards_nested_state() {
    let (mut doc, mut engine, root, id) = mount(
        json!([{"id": 1, "tags": ["a", "b"]}, {"id": 2, "tags": ["c"]}]),
        GROUPS,
    );

    update(&mut doc, &mut engine, root, json!([{"id": 2, "tags": ["c"]}]));

    assert_eq!(engine.loop_instances(id), 2);
    assert_eq!(engine.loop_keys(id, 0), vec![LoopKey::index(2)]);
}

const TAG_ONLY: &str = concat!(
    r#"<template data-for="{g in _}">"#,
    r#"<template data-for="{t in g.tags}"><i>{t}</i></template>"#,
    "</template>"
);

#[test]
fn test_loop_directly_in_loop_body_survives_outer_change() {
    let (mut doc, mut engine, root, id) =
        mount(json!([{"id": 1, "title": "a", "tags": ["x", "y"]}]), TAG_ONLY);
    let tags: Vec<NodeId> = engine
        .output(&doc, id)
        .into_iter()
        .filter(|node| doc.tag_name(node).as_deref() == Some("i"))
        .collect();
    assert_eq!(tags.len(), 2);

    update(
        &mut doc,
        &mut engine,
        root,
        json!([{"id": 1, "title": "b", "tags": ["x", "y"]}]),
    );

    assert_eq!(
        rendered(&doc, &engine, id),
        "<!--loop-start--><!--loop-start--><i>x</i><i>y</i><!--loop-end--><!--loop-end-->"
    );
    assert_eq!(doc.text_content(tags[0]), "x");
    assert_eq!(doc.text_content(tags[1]), "y");
    assert_eq!(engine.owned_nodes(id, 0), vec![tags[0]]);
    assert_eq!(engine.loop_instances(id), 2);
}

#[test]
fn test_loop_directly_in_loop_body_follows_inner_changes() {
    let (mut doc, mut engine, root, id) =
        mount(json!([{"id": 1, "tags": ["x", "y"]}, {"id": 2, "tags": []}]), TAG_ONLY);

    update(
        &mut doc,
        &mut engine,
        root,
        json!([{"id": 2, "tags": ["z"]}, {"id": 1, "tags": ["y"]}]),
    );

    assert_eq!(
        rendered(&doc, &engine, id),
        concat!(
            "<!--loop-start-->",
            "<!--loop-start--><i>z</i><!--loop-end-->",
            "<!--loop-start--><i>y</i><!--loop-end-->",
            "<!--loop-end-->"
        )
    );
}

#[test]
fn test_admin_listing() {
    let content = concat!(
        r#"<template data-for="{user in _}">"#,
        "<div>",
        r#"<template data-if="{user.isAdmin}"><h1>Admin: <span>{user.name}</span></h1></template>"#,
        r#"<template data-unless="{user.isAdmin}"><h1>{user.name}</h1></template>"#,
        "</div>",
        "</template>"
    );
    let data = json!([
        {"id": 0, "name": "User-0", "isAdmin": true},
        {"id": 1, "name": "User-1", "isAdmin": false}
    ]);
    let (doc, engine, _, id) = mount(data, content);
    assert_eq!(
        rendered(&doc, &engine, id),
        concat!(
            "<!--loop-start-->",
            "<div><h1>Admin: <span>User-0</span></h1></div>",
            "<div><h1>User-1</h1></div>",
            "<!--loop-end-->"
        )
    );
}
