use std::rc::Rc;

use crate::dom::BodyValue;
use crate::error::{Error, Result};
use crate::expr::Template;
use crate::registry::{ModeRegistry, Renderer, renderer};
use crate::stage::Stage;
use crate::target::Target;

pub(super) fn register(registry: &mut ModeRegistry) {
    for mode in ["template", "html"] {
        registry.register(mode, compile_data, &[]);
        registry.register(mode, |body: &str| compile_body(body, BodyValue::Markup), &[Stage::Body]);
    }
    registry.register("text", compile_data, &[]);
    registry.register("text", |body: &str| compile_body(body, BodyValue::Text), &[Stage::Body]);
}

fn compile(body: &str) -> Result<Rc<Template>> {
    Template::compile(body)
        .map(Rc::new)
        .map_err(|e| Error::user_code("template syntax error", e))
}

fn render(template: &Template, target: &mut Target<'_>, data: &serde_json::Value) -> Result<String> {
    let element = target.node();
    template
        .render(target.dom_mut(), element, data)
        .map_err(|e| Error::user_code("template evaluation failed", e))
}

fn compile_data(body: &str) -> Result<Renderer> {
    let template = compile(body)?;
    Ok(renderer(move |target, data| {
        let text = render(&template, target, data)?;
        Ok(Some(serde_json::Value::String(text)))
    }))
}

fn compile_body(body: &str, assign: fn(String) -> BodyValue) -> Result<Renderer> {
    let template = compile(body)?;
    Ok(renderer(move |target, data| {
        let text = render(&template, target, data)?;
        target.set_body(assign(text))?;
        Ok(None)
    }))
}
