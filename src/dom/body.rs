//! Replacing an element's children from a rendered value.
//!
//! Body-stage modes produce loosely typed output: a markup string, a list of
//! fragments, an existing node, or nothing at all. [`set_body`] turns each of
//! those into a child list the same way every mode expects.

use serde_json::Value;

use super::arena::{Dom, NodeId};
use super::parse_fragment_into;
use crate::error::{Error, Result};

/// Value assigned to an element's body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyValue {
    /// Leave the children untouched.
    Undefined,
    /// Remove all children.
    Null,
    /// Markup parsed as HTML.
    Markup(String),
    /// Literal text.
    Text(String),
    /// An existing node, moved into place.
    Node(NodeId),
    /// Children appended in order; nested lists are flattened.
    List(Vec<BodyValue>),
}

impl BodyValue {
    /// Interpret a data value: a top-level string is markup, a list becomes
    /// children with primitives as text.
    pub fn from_json(value: &Value) -> BodyValue {
        match value {
            Value::Null => BodyValue::Null,
            Value::String(s) => BodyValue::Markup(s.clone()),
            Value::Array(items) => BodyValue::List(items.iter().map(Self::from_json_item).collect()),
            other => BodyValue::Text(json_text(other)),
        }
    }

    fn from_json_item(value: &Value) -> BodyValue {
        match value {
            Value::Array(items) => BodyValue::List(items.iter().map(Self::from_json_item).collect()),
            Value::String(s) => BodyValue::Text(s.clone()),
            other => BodyValue::Text(json_text(other)),
        }
    }
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace the children of `element` according to `value`.
///
/// Fails only when asked to move a node into its own subtree.
pub fn set_body(dom: &mut Dom, element: NodeId, value: BodyValue) -> Result<()> {
    match value {
        BodyValue::Undefined => Ok(()),
        BodyValue::Null => {
            dom.clear_children(element);
            Ok(())
        }
        BodyValue::Markup(markup) => {
            dom.clear_children(element);
            parse_fragment_into(dom, element, &markup);
            Ok(())
        }
        BodyValue::Text(text) => {
            dom.set_text_content(element, &text);
            Ok(())
        }
        BodyValue::Node(node) => {
            check_insertable(dom, element, node)?;
            dom.clear_children(element);
            dom.append(element, node);
            Ok(())
        }
        BodyValue::List(items) => {
            let mut flat = Vec::new();
            flatten(items, &mut flat);
            for item in &flat {
                if let BodyValue::Node(node) = item {
                    check_insertable(dom, element, *node)?;
                }
            }

            dom.clear_children(element);
            for item in flat {
                match item {
                    BodyValue::Text(text) => {
                        let node = dom.create_text(text);
                        dom.append(element, node);
                    }
                    BodyValue::Markup(markup) => parse_fragment_into(dom, element, &markup),
                    BodyValue::Node(node) => dom.append(element, node),
                    BodyValue::Null => {
                        let node = dom.create_text("null".to_string());
                        dom.append(element, node);
                    }
                    BodyValue::Undefined | BodyValue::List(_) => {}
                }
            }
            Ok(())
        }
    }
}

fn flatten(items: Vec<BodyValue>, out: &mut Vec<BodyValue>) {
    for item in items {
        match item {
            BodyValue::List(inner) => flatten(inner, out),
            other => out.push(other),
        }
    }
}

fn check_insertable(dom: &Dom, element: NodeId, node: NodeId) -> Result<()> {
    if dom.is_inclusive_ancestor(node, element) {
        return Err(Error::user_code_msg(
            "cannot insert a node into its own subtree",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dom::{parse_document, serialize_children};

    fn setup() -> (Dom, NodeId) {
        let dom = parse_document("<div id=\"t\"><i>old</i></div>");
        let div = dom.get_by_id("t").unwrap();
        (dom, div)
    }

    #[test]
    fn test_string_is_markup() {
        let (mut dom, div) = setup();
        set_body(&mut dom, div, BodyValue::from_json(&json!("<b>new</b>"))).unwrap();
        assert_eq!(serialize_children(&dom, div), "<b>new</b>");
    }

    #[test]
    fn test_undefined_is_noop() {
        let (mut dom, div) = setup();
        set_body(&mut dom, div, BodyValue::Undefined).unwrap();
        assert_eq!(serialize_children(&dom, div), "<i>old</i>");
    }

    #[test]
    fn test_null_and_empty_list_clear() {
        let (mut dom, div) = setup();
        set_body(&mut dom, div, BodyValue::Null).unwrap();
        assert_eq!(serialize_children(&dom, div), "");

        let (mut dom, div) = setup();
        set_body(&mut dom, div, BodyValue::from_json(&json!([]))).unwrap();
        assert_eq!(serialize_children(&dom, div), "");
    }

    #[test]
    fn test_list_flattens_and_stringifies() {
        let (mut dom, div) = setup();
        let value = json!(["<b>", [1, [true]], null]);
        set_body(&mut dom, div, BodyValue::from_json(&value)).unwrap();
        assert_eq!(serialize_children(&dom, div), "&lt;b&gt;1truenull");
    }

    #[test]
    fn test_node_becomes_sole_child() {
        let (mut dom, div) = setup();
        let span = dom.create_element(crate::dom::html_name("span"), vec![]);
        set_body(&mut dom, div, BodyValue::Node(span)).unwrap();
        assert_eq!(serialize_children(&dom, div), "<span></span>");
    }

    #[test]
    fn test_cannot_insert_ancestor() {
        let (mut dom, div) = setup();
        let body = dom.find_by_tag("body").unwrap();
        let err = set_body(&mut dom, div, BodyValue::Node(body)).unwrap_err();
        assert!(err.is_user_code());
    }
}
