use serde_json::Value;

use crate::dom::BodyValue;
use crate::error::{Error, Result};
use crate::registry::{ModeRegistry, Renderer, renderer};
use crate::stage::Stage;

pub(super) fn register(registry: &mut ModeRegistry) {
    registry.register("json", compile_data, &[]);
    registry.register("json", compile_body, &[Stage::Body]);
}

fn parse(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| Error::user_code("invalid JSON", e))
}

fn compile_data(body: &str) -> Result<Renderer> {
    let value = parse(body)?;
    Ok(renderer(move |_, _| Ok(Some(value.clone()))))
}

fn compile_body(body: &str) -> Result<Renderer> {
    let value = parse(body)?;
    Ok(renderer(move |target, _| {
        target.set_body(BodyValue::from_json(&value))?;
        Ok(None)
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dom::{parse_document, serialize_children};
    use crate::target::Target;

    #[test]
    fn test_data_is_parsed_once_and_cloned() {
        let render = compile_data(r#"{"items": [1, 2]}"#).unwrap();
        let mut dom = parse_document("");
        let out = render(&mut Target::global(&mut dom), &json!({"ignored": true})).unwrap();
        assert_eq!(out, Some(json!({"items": [1, 2]})));
    }

    #[test]
    fn test_malformed_json_is_user_error() {
        let err = compile_data("{not json}").err().unwrap();
        assert!(err.is_user_code());
        assert!(err.to_string().starts_with("invalid JSON"));
    }

    #[test]
    fn test_body_assigns_list() {
        let render = compile_body(r#"["<b>", 1, null]"#).unwrap();
        let mut dom = parse_document("<p></p>");
        let p = dom.find_by_tag("p").unwrap();

        let out = render(&mut Target::element(&mut dom, p), &json!({})).unwrap();

        assert_eq!(out, None);
        assert_eq!(serialize_children(&dom, p), "&lt;b&gt;1null");
    }
}
