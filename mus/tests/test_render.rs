use mus::ast::{ExprNode, ForBlock, IfBlock, Node, RawBlock, SetBlock, Template};
use mus::{AutoEscape, Environment, ErrorKind};
use serde_json::json;
use similar_asserts::assert_eq;

fn expr(source: &str) -> Node {
    Node::expression(source).unwrap()
}

fn render(nodes: Vec<Node>, ctx: serde_json::Value) -> String {
    Environment::new()
        .render(&Template::new(nodes), ctx)
        .unwrap()
}

#[test]
fn test_text_and_escaping() {
    let nodes = vec![Node::text("<p>"), expr("value"), Node::text("</p>")];
    assert_eq!(
        render(nodes, json!({"value": "a < b & c"})),
        "<p>a &lt; b &amp; c</p>"
    );
}

#[test]
fn test_safe_output() {
    assert_eq!(
        render(vec![expr("value | safe")], json!({"value": "<em>hi</em>"})),
        "<em>hi</em>"
    );
    assert_eq!(
        render(vec![expr("value | safe | upper")], json!({"value": "<b>"})),
        "<B>"
    );
    // escape marks its result safe, so it is not escaped twice
    assert_eq!(
        render(vec![expr("value | escape")], json!({"value": "<x>"})),
        "&lt;x&gt;"
    );
}

#[test]
fn test_auto_escape_none() {
    let mut env = Environment::new();
    env.set_auto_escape(AutoEscape::None);
    let tmpl = Template::new(vec![expr("value")]);
    assert_eq!(env.render(&tmpl, json!({"value": "<b>"})).unwrap(), "<b>");
}

#[test]
fn test_null_and_numbers() {
    assert_eq!(
        render(
            vec![expr("nothing"), Node::text("|"), expr("count")],
            json!({"nothing": null, "count": 42})
        ),
        "|42"
    );
}

#[test]
fn test_for_loop() {
    let body = vec![
        expr("loop.index"),
        Node::text(":"),
        expr("item"),
        IfBlock::new("not loop.last", vec![Node::text(",")])
            .unwrap()
            .into(),
    ];
    let nodes = vec![ForBlock::new("item", "items", body).unwrap().into()];
    assert_eq!(render(nodes, json!({"items": [10, 20, 30]})), "1:10,2:20,3:30");

    let body = vec![
        expr("loop.index0"),
        Node::text("/"),
        expr("loop.length"),
        IfBlock::new("loop.first", vec![Node::text("!")])
            .unwrap()
            .into(),
        Node::text(" "),
    ];
    let nodes = vec![ForBlock::new("item", "items", body).unwrap().into()];
    assert_eq!(render(nodes, json!({"items": ["a", "b", "c"]})), "0/3! 1/3 2/3 ");
}

#[test]
fn test_for_loop_index_name() {
    let body = vec![expr("k"), Node::text("="), expr("v"), Node::text(";")];
    let nodes = vec![ForBlock::new("v", "obj", body)
        .unwrap()
        .with_index("k")
        .into()];
    assert_eq!(render(nodes, json!({"obj": {"a": 1, "b": 2}})), "a=1;b=2;");

    let body = vec![expr("i"), expr("c")];
    let nodes = vec![ForBlock::new("c", "items", body)
        .unwrap()
        .with_index("i")
        .into()];
    assert_eq!(render(nodes, json!({"items": ["a", "b"]})), "0a1b");
}

#[test]
fn test_for_loop_over_other_values() {
    let body = vec![expr("c"), Node::text(".")];
    let nodes = vec![ForBlock::new("c", "value", body).unwrap().into()];
    let tmpl = Template::new(nodes);
    let env = Environment::new();
    assert_eq!(env.render(&tmpl, json!({"value": "ab"})).unwrap(), "a.b.");
    assert_eq!(env.render(&tmpl, json!({"value": null})).unwrap(), "");
    assert_eq!(env.render(&tmpl, json!({"value": 42})).unwrap(), "");
    assert_eq!(env.render(&tmpl, json!({})).unwrap(), "");
}

#[test]
fn test_if_chain() {
    let block = IfBlock::new("n > 10", vec![Node::text("big")])
        .unwrap()
        .elseif("n > 5", vec![Node::text("medium")])
        .unwrap()
        .elseif("n > 0", vec![Node::text("small")])
        .unwrap()
        .otherwise(vec![Node::text("none")]);
    let tmpl = Template::new(vec![block.into()]);
    let env = Environment::new();
    for (n, expected) in [(20, "big"), (7, "medium"), (3, "small"), (-1, "none")] {
        assert_eq!(env.render(&tmpl, json!({ "n": n })).unwrap(), expected);
    }
}

#[test]
fn test_set_scoping() {
    let nodes = vec![
        SetBlock::new("total", "1").unwrap().into(),
        ForBlock::new(
            "item",
            "items",
            vec![
                SetBlock::new("total", "total + item").unwrap().into(),
                expr("total"),
                Node::text(","),
            ],
        )
        .unwrap()
        .into(),
        expr("total"),
    ];
    assert_eq!(render(nodes, json!({"items": [10, 20]})), "11,21,1");
}

#[test]
fn test_set_shadows_context() {
    let nodes = vec![
        expr("name"),
        SetBlock::new("name", "name | upper").unwrap().into(),
        Node::text(" "),
        expr("name"),
    ];
    assert_eq!(render(nodes, json!({"name": "ann"})), "ann ANN");
}

#[test]
fn test_raw_block_uses_root_frame() {
    let nodes = vec![ForBlock::new(
        "name",
        "names",
        vec![
            expr("name"),
            Node::text("/"),
            RawBlock::new(vec![expr("name | safe")]).into(),
            Node::text(" "),
        ],
    )
    .unwrap()
    .into()];
    assert_eq!(
        render(nodes, json!({"name": "root", "names": ["a", "b"]})),
        "a/root b/root "
    );
}

#[test]
fn test_undefined_renders_empty() {
    assert_eq!(
        render(
            vec![
                Node::text("["),
                expr("missing"),
                expr("missing.deep"),
                expr("missing | upper"),
                expr("nope()"),
                Node::text("]"),
            ],
            json!({})
        ),
        "[]"
    );
    assert_eq!(
        render(
            vec![
                expr("missing | default('anon')"),
                Node::text(" "),
                expr("user.name | default('anon') | upper"),
            ],
            json!({})
        ),
        "anon ANON"
    );
}

#[test]
fn test_render_errors() {
    let env = Environment::new();

    let tmpl = Template::new(vec![expr("user.name.trim()")]);
    let err = env
        .render(&tmpl, json!({"user": {"name": null}}))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    let tmpl = Template::new(vec![expr("name | nope")]);
    let err = env.render(&tmpl, json!({"name": "x"})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownFilter);
    assert_eq!(err.detail(), Some("nope"));

    let tmpl = Template::new(vec![expr("x()")]);
    let err = env.render(&tmpl, json!({"x": 1})).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid operation: `x` is not callable (got number)"
    );
}

#[test]
fn test_render_context_must_be_a_map() {
    let env = Environment::new();
    let tmpl = Template::new(vec![Node::text("hi")]);
    assert_eq!(env.render(&tmpl, ()).unwrap(), "hi");
    let err = env.render(&tmpl, vec![1, 2]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid operation: render context must be a map, got sequence"
    );
}

#[test]
fn test_node_filters() {
    let node: Node = ExprNode::new("name")
        .unwrap()
        .with_filter("trim")
        .with_filter("upper")
        .into();
    assert_eq!(render(vec![node], json!({"name": "  ann "})), "ANN");

    let node: Node = ExprNode::new("name").unwrap().with_filter("nope").into();
    let err = Environment::new()
        .render(&Template::new(vec![node]), json!({"name": "x"}))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownFilter);
}

#[test]
fn test_serialize_struct_context() {
    #[derive(serde::Serialize)]
    struct User {
        name: &'static str,
        tags: Vec<&'static str>,
    }

    let nodes = vec![expr("name"), Node::text(": "), expr("tags | join(', ')")];
    let tmpl = Template::new(nodes);
    let rv = Environment::new()
        .render(
            &tmpl,
            User {
                name: "ann",
                tags: vec!["a", "b"],
            },
        )
        .unwrap();
    assert_eq!(rv, "ann: a, b");
}
