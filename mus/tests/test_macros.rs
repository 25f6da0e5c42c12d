use mus::ast::{ForBlock, IfBlock, MacroDecl, Node, SetBlock, Template};
use mus::{Environment, ErrorKind};
use serde_json::json;
use similar_asserts::assert_eq;

fn expr(source: &str) -> Node {
    Node::expression(source).unwrap()
}

fn decl(signature: &str, body: Vec<Node>) -> MacroDecl {
    MacroDecl::new(signature, body).unwrap()
}

fn greet() -> MacroDecl {
    decl(
        "greet(name, greeting='Hello')",
        vec![
            expr("greeting"),
            Node::text(", "),
            expr("name"),
            Node::text("!"),
        ],
    )
}

#[test]
fn test_defaults() {
    let tmpl = Template::new(vec![
        expr("greet('Ann')"),
        Node::text(" "),
        expr("greet('Bob', 'Hi')"),
    ])
    .with_macro(greet());
    let rv = Environment::new().render(&tmpl, ()).unwrap();
    assert_eq!(rv, "Hello, Ann! Hi, Bob!");
}

#[test]
fn test_default_refers_to_earlier_parameter() {
    let tmpl = Template::new(vec![expr("tag('x')"), expr("tag('y', '?')")])
        .with_macro(decl("tag(name, label=name + '!')", vec![expr("label")]));
    assert_eq!(Environment::new().render(&tmpl, ()).unwrap(), "x!?");
}

#[test]
fn test_missing_argument_is_empty() {
    let tmpl = Template::new(vec![expr("pair(1)")]).with_macro(decl(
        "pair(a, b)",
        vec![expr("a"), Node::text("-"), expr("b")],
    ));
    assert_eq!(Environment::new().render(&tmpl, ()).unwrap(), "1-");
}

#[test]
fn test_output_is_not_escaped_twice() {
    let tmpl = Template::new(vec![expr("bold(value)")]).with_macro(decl(
        "bold(text)",
        vec![Node::text("<b>"), expr("text"), Node::text("</b>")],
    ));
    let rv = Environment::new()
        .render(&tmpl, json!({"value": "a&b"}))
        .unwrap();
    assert_eq!(rv, "<b>a&amp;b</b>");
}

#[test]
fn test_bare_reference_calls_macro() {
    let tmpl = Template::new(vec![expr("divider"), expr("divider()")])
        .with_macro(decl("divider", vec![Node::text("<hr>")]));
    assert_eq!(Environment::new().render(&tmpl, ()).unwrap(), "<hr><hr>");
}

#[test]
fn test_macro_in_loop() {
    let tmpl = Template::new(vec![ForBlock::new(
        "item",
        "items",
        vec![expr("badge(item)")],
    )
    .unwrap()
    .into()])
    .with_macro(decl(
        "badge(label)",
        vec![Node::text("["), expr("label"), Node::text("]")],
    ));
    let rv = Environment::new()
        .render(&tmpl, json!({"items": ["a", "b"]}))
        .unwrap();
    assert_eq!(rv, "[a][b]");
}

#[test]
fn test_binding_follows_first_use() {
    let show = || decl("show", vec![expr("item")]);
    let ctx = json!({"items": ["a", "b"]});
    let env = Environment::new();

    // first used inside the loop: every iteration binds its own frame
    let tmpl = Template::new(vec![ForBlock::new("item", "items", vec![expr("show()")])
        .unwrap()
        .into()])
    .with_macro(show());
    assert_eq!(env.render(&tmpl, ctx.clone()).unwrap(), "ab");

    // first used at the top: the loop reuses the top level binding, which
    // cannot see the loop variable
    let tmpl = Template::new(vec![
        expr("show()"),
        ForBlock::new("item", "items", vec![expr("show()")])
            .unwrap()
            .into(),
    ])
    .with_macro(show());
    assert_eq!(env.render(&tmpl, ctx).unwrap(), "");
}

#[test]
fn test_bound_frame_is_live() {
    let tmpl = Template::new(vec![
        expr("show_x()"),
        SetBlock::new("x", "x + 1").unwrap().into(),
        expr("show_x()"),
    ])
    .with_macro(decl("show_x", vec![expr("x")]));
    let rv = Environment::new().render(&tmpl, json!({"x": 1})).unwrap();
    assert_eq!(rv, "12");
}

#[test]
fn test_parameters_do_not_leak() {
    let tmpl = Template::new(vec![expr("greet('Ann')"), Node::text("|"), expr("name")])
        .with_macro(greet());
    assert_eq!(Environment::new().render(&tmpl, ()).unwrap(), "Hello, Ann!|");
}

#[test]
fn test_nested_macros() {
    let tmpl = Template::new(vec![expr("outer('a')")])
        .with_macro(decl(
            "outer(x)",
            vec![Node::text("("), expr("inner(x)"), Node::text(")")],
        ))
        .with_macro(decl("inner(y)", vec![expr("y | upper")]));
    assert_eq!(Environment::new().render(&tmpl, ()).unwrap(), "(A)");
}

#[test]
fn test_later_declaration_wins() {
    let tmpl = Template::new(vec![expr("m()")])
        .with_macro(decl("m", vec![Node::text("first")]))
        .with_macro(decl("m", vec![Node::text("second")]));
    assert_eq!(Environment::new().render(&tmpl, ()).unwrap(), "second");
}

#[test]
fn test_undeclared_macro_renders_empty() {
    let tmpl = Template::new(vec![Node::text("["), expr("nope(1)"), Node::text("]")]);
    assert_eq!(Environment::new().render(&tmpl, ()).unwrap(), "[]");
}

fn countdown() -> MacroDecl {
    decl(
        "down(n)",
        vec![IfBlock::new("n > 0", vec![expr("n"), expr("down(n - 1)")])
            .unwrap()
            .into()],
    )
}

#[test]
fn test_recursion() {
    let tmpl = Template::new(vec![expr("down(3)")]).with_macro(countdown());
    assert_eq!(Environment::new().render(&tmpl, ()).unwrap(), "321");
}

#[test]
fn test_recursion_limit() {
    let mut env = Environment::new();
    env.set_recursion_limit(10);

    let tmpl = Template::new(vec![expr("down(5)")]).with_macro(countdown());
    assert_eq!(env.render(&tmpl, ()).unwrap(), "54321");

    let tmpl = Template::new(vec![expr("down(20)")]).with_macro(countdown());
    let err = env.render(&tmpl, ()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(
        err.to_string(),
        "invalid operation: recursion limit exceeded while calling macro `down`"
    );

    let tmpl = Template::new(vec![expr("forever()")])
        .with_macro(decl("forever", vec![expr("forever()")]));
    let err = env.render(&tmpl, ()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn test_default_recursion_limit() {
    let env = Environment::new();
    assert_eq!(env.recursion_limit(), 100);

    let tmpl = Template::new(vec![expr("down(50)")]).with_macro(countdown());
    let expected = (1..=50).rev().map(|n| n.to_string()).collect::<String>();
    assert_eq!(env.render(&tmpl, ()).unwrap(), expected);

    let tmpl = Template::new(vec![expr("forever()")])
        .with_macro(decl("forever", vec![expr("forever()")]));
    let err = env.render(&tmpl, ()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(
        err.to_string(),
        "invalid operation: recursion limit exceeded while calling macro `forever`"
    );
}
