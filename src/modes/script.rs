use std::rc::Rc;

use crate::dom::BodyValue;
use crate::error::{Error, Result};
use crate::expr::{Script, ScriptOutcome, Value};
use crate::registry::{ModeRegistry, Renderer, renderer};
use crate::stage::Stage;
use crate::target::Target;

pub(super) fn register(registry: &mut ModeRegistry) {
    registry.register("script", compile_data, &[]);
    registry.register("script", compile_body, &[Stage::Body]);
}

fn compile(body: &str) -> Result<Rc<Script>> {
    Script::compile(body)
        .map(Rc::new)
        .map_err(|e| Error::user_code("script syntax error", e))
}

fn run(script: &Script, target: &mut Target<'_>, data: &serde_json::Value) -> Result<ScriptOutcome> {
    let element = target.node();
    script
        .run(target.dom_mut(), element, data)
        .map_err(|e| Error::user_code("script threw", e))
}

fn compile_data(body: &str) -> Result<Renderer> {
    let script = compile(body)?;
    Ok(renderer(move |target, data| {
        let outcome = run(&script, target, data)?;
        Ok(outcome.next_data(data))
    }))
}

/// The `return` value becomes the element's children.
fn compile_body(body: &str) -> Result<Renderer> {
    let script = compile(body)?;
    Ok(renderer(move |target, data| {
        let outcome = run(&script, target, data)?;
        target.set_body(body_value(&outcome.returned))?;
        Ok(outcome.changed_data(data))
    }))
}

fn body_value(value: &Value) -> BodyValue {
    match value {
        Value::Undefined => BodyValue::Undefined,
        Value::Null => BodyValue::Null,
        Value::String(markup) => BodyValue::Markup(markup.clone()),
        Value::Element(node) => BodyValue::Node(*node),
        Value::Array(items) => BodyValue::List(items.borrow().iter().map(list_item).collect()),
        other => BodyValue::Text(other.to_js_string()),
    }
}

/// Inside a list strings are text, as with `append`.
fn list_item(value: &Value) -> BodyValue {
    match value {
        Value::Null => BodyValue::Null,
        Value::Element(node) => BodyValue::Node(*node),
        Value::Array(items) => BodyValue::List(items.borrow().iter().map(list_item).collect()),
        other => BodyValue::Text(other.to_js_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dom::{parse_document, serialize_children};

    fn run_body(source: &str, html: &str) -> (String, Result<Option<serde_json::Value>>) {
        let render = compile_body(source).unwrap();
        let mut dom = parse_document(html);
        let target = dom.get_by_id("t").unwrap();
        let out = render(&mut Target::element(&mut dom, target), &json!({}));
        (serialize_children(&dom, target), out)
    }

    #[test]
    fn test_return_value_becomes_data() {
        let render = compile_data("return {n: data.n + 1}").unwrap();
        let mut dom = parse_document("");
        let out = render(&mut Target::global(&mut dom), &json!({"n": 1})).unwrap();
        assert_eq!(out, Some(json!({"n": 2})));
    }

    #[test]
    fn test_no_return_leaves_data() {
        let render = compile_data("const x = 1;").unwrap();
        let mut dom = parse_document("");
        let out = render(&mut Target::global(&mut dom), &json!({"n": 1})).unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn test_body_values() {
        assert_eq!(run_body("return '<i>x</i>'", "<p id=t>old</p>").0, "<i>x</i>");
        assert_eq!(run_body("return ['<i>', 2]", "<p id=t></p>").0, "&lt;i&gt;2");
        assert_eq!(run_body("return null", "<p id=t>old</p>").0, "");
        assert_eq!(run_body("el.id", "<p id=t>old</p>").0, "old");
        assert_eq!(
            run_body("return document.getElementById('src')", "<p id=t></p><b id=src>s</b>").0,
            "<b id=\"src\">s</b>"
        );
    }

    #[test]
    fn test_moving_an_ancestor_inside_fails() {
        let (_, out) = run_body("return el.parentElement", "<div><p id=t></p></div>");
        assert!(out.unwrap_err().is_user_code());
    }

    #[test]
    fn test_exceptions_are_user_errors() {
        let render = compile_data("return missing.value").unwrap();
        let mut dom = parse_document("");
        let err = render(&mut Target::global(&mut dom), &json!({})).unwrap_err();
        let Error::UserCode(err) = err else {
            panic!("expected user-code error");
        };
        assert_eq!(err.message(), "script threw");
        assert!(err.detail().contains("missing is not defined"));

        assert!(compile_data("return (").err().unwrap().is_user_code());
    }
}
