use std::sync::Arc;
use std::thread;

use mus::ast::{ForBlock, MacroDecl, Node, Template};
use mus::{Environment, State};
use serde_json::json;
use similar_asserts::assert_eq;

fn tag_a(_state: &State, value: String) -> String {
    format!("a:{}", value)
}

fn tag_b(_state: &State, value: String) -> String {
    format!("b:{}", value)
}

fn template(macro_body: &str) -> Template {
    Template::new(vec![ForBlock::new(
        "item",
        "items",
        vec![Node::expression("wrap(item)").unwrap()],
    )
    .unwrap()
    .into()])
    .with_macro(
        MacroDecl::new(
            "wrap(value)",
            vec![Node::expression(macro_body).unwrap(), Node::text(";")],
        )
        .unwrap(),
    )
}

#[test]
fn test_shared_template_and_environment() {
    let env = Arc::new(Environment::new());
    let tmpl = Arc::new(template("value | upper"));

    let handles = (0..8)
        .map(|idx| {
            let env = env.clone();
            let tmpl = tmpl.clone();
            thread::spawn(move || {
                let items = (0..50).map(|x| format!("t{}x{}", idx, x)).collect::<Vec<_>>();
                let rv = env.render(&tmpl, json!({ "items": items })).unwrap();
                (items, rv)
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        let (items, rv) = handle.join().unwrap();
        let expected = items
            .iter()
            .map(|x| format!("{};", x.to_uppercase()))
            .collect::<String>();
        assert_eq!(rv, expected);
    }
}

#[test]
fn test_distinct_environments_do_not_interfere() {
    let mut env_a = Environment::new();
    env_a.add_filter("tag", tag_a);
    let mut env_b = Environment::new();
    env_b.add_filter("tag", tag_b);
    let tmpl_a = template("value | tag");
    let tmpl_b = template("value | tag | upper");
    let ctx = json!({"items": ["x", "y"]});

    thread::scope(|s| {
        let mut handles = Vec::new();
        for _ in 0..4 {
            handles.push(s.spawn(|| env_a.render(&tmpl_a, ctx.clone()).unwrap()));
            handles.push(s.spawn(|| env_b.render(&tmpl_b, ctx.clone()).unwrap()));
        }
        for (idx, handle) in handles.into_iter().enumerate() {
            let expected = if idx % 2 == 0 { "a:x;a:y;" } else { "B:X;B:Y;" };
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}
