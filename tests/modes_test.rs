//! Mode registration and the built-in modes seen through a full render.

use std::cell::RefCell;
use std::rc::Rc;

use csspipe::{BodyValue, Engine, Error, ModeRegistry, RenderOptions, Stage, renderer};
use serde_json::json;

fn body_of(engine: &Engine) -> String {
    let dom = engine.dom();
    let body = dom.find_by_tag("body").expect("document has a body");
    csspipe::dom::serialize_children(dom, body)
}

// ============================================================================
// Registry resolution
// ============================================================================

#[test]
fn test_stage_specific_override_keeps_fallback() {
    let mut engine = Engine::new(
        r#"<style>p { --data: json({"from": "css"}); --body: json(["body"]) }</style><p></p>"#,
    );
    engine.register_mode(
        "json",
        |_body: &str| Ok(renderer(|_, _| Ok(Some(json!({"from": "override"}))))),
        &[Stage::Data],
    );
    engine.register_mode(
        "json",
        |_body: &str| {
            Ok(renderer(|target, data| {
                target.set_body(BodyValue::Text(data["from"].to_string()))?;
                Ok(None)
            }))
        },
        &[Stage::Body],
    );

    engine.render().unwrap();

    assert_eq!(body_of(&engine), "<p>\"override\"</p>");
}

#[test]
fn test_fallback_serves_every_stage() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let seen = calls.clone();
    let mut engine = Engine::new(
        "<style>p { --data: trace(d); --prepare: trace(p); --script: trace(s) }</style><p></p>",
    );
    engine.register_mode(
        "trace",
        move |body: &str| {
            let seen = seen.clone();
            let body = body.to_string();
            Ok(renderer(move |_, data| {
                seen.borrow_mut().push(body.clone());
                let mut next = data.clone();
                next[body.as_str()] = json!(true);
                Ok(Some(next))
            }))
        },
        &[],
    );

    engine.render().unwrap();

    assert_eq!(*calls.borrow(), ["d", "p", "s"]);
}

#[test]
fn test_stage_only_mode_rejects_other_stages() {
    let mut engine = Engine::new("<style>p { --data: only(x) }</style><p></p>");
    engine.register_mode(
        "only",
        |_body: &str| Ok(renderer(|_, _| Ok(None))),
        &[Stage::Body],
    );

    let err = engine.render().unwrap_err();

    assert!(matches!(
        err,
        Error::UnsupportedStage { ref mode, stage: Stage::Data } if mode == "only"
    ));
}

#[test]
fn test_empty_registry_with_custom_defaults() {
    let options = RenderOptions::new().with_builtin_modes(false);
    let mut engine = Engine::with_options("<style>p { --body: (hi) }</style><p></p>", options);
    assert!(engine.registry().modes().is_empty());

    engine.register_mode(
        "template",
        |body: &str| {
            let text = body.to_string();
            Ok(renderer(move |target, _| {
                target.set_body(BodyValue::Text(text.repeat(2)))?;
                Ok(None)
            }))
        },
        &[],
    );
    engine.render().unwrap();

    assert_eq!(body_of(&engine), "<p>hihi</p>");
}

#[test]
fn test_plugin_user_errors_are_reported() {
    let mut registry = ModeRegistry::with_builtin_modes();
    registry.register(
        "strict",
        |body: &str| {
            if body.trim().is_empty() {
                return Err(Error::user_code_msg("strict mode needs a body"));
            }
            Ok(renderer(|_, _| Ok(None)))
        },
        &[],
    );
    let mut engine = Engine::new("<style>p { --data: strict( ) } i { --data: strict(ok) }</style><p></p><i></i>");
    *engine.registry_mut() = registry;

    let report = engine.render().unwrap();

    assert_eq!(report.rules, 1);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].message, "strict mode needs a body");
}

// ============================================================================
// Built-in modes
// ============================================================================

#[test]
fn test_script_body_builds_elements() {
    let mut engine = Engine::new(
        r#"<style>
            ul {
                --data: json({"items": ["a", "b", "c"]});
                --body: script(
                    const out = [];
                    data.items.forEach((item, i) => {
                        const li = document.createElement("li");
                        li.textContent = item;
                        if (i % 2 === 0) li.classList.add("even");
                        out.push(li);
                    });
                    return out;
                )
            }
        </style>
        <ul></ul>"#,
    );

    engine.render().unwrap();

    assert_eq!(
        body_of(&engine).trim(),
        r#"<ul><li class="even">a</li><li>b</li><li class="even">c</li></ul>"#
    );
}

#[test]
fn test_script_stage_sees_rendered_body() {
    let mut engine = Engine::new(
        r#"<style>
            ol {
                --body: (<li>x</li><li>y</li>);
                --script: (el.dataset.count = el.children.length)
            }
        </style>
        <ol></ol>"#,
    );

    engine.render().unwrap();

    assert_eq!(
        body_of(&engine).trim(),
        r#"<ol data-count="2"><li>x</li><li>y</li></ol>"#
    );
}

#[test]
fn test_script_moves_existing_element() {
    let mut engine = Engine::new(
        r#"<style>#slot { --body: script(return document.getElementById("card")) }</style>
        <div id="slot"></div><section id="card">c</section>"#,
    );

    engine.render().unwrap();

    assert_eq!(
        body_of(&engine).trim(),
        r#"<div id="slot"><section id="card">c</section></div>"#
    );
}

#[test]
fn test_text_and_template_modes_differ_in_escaping() {
    let mut engine = Engine::new(
        r#"<style>
            .t { --data: json({"v": "<b>hi</b>"}); --body: template(${data.v}) }
            .x { --data: json({"v": "<b>hi</b>"}); --body: text(${data.v}) }
        </style>
        <p class="t"></p><p class="x"></p>"#,
    );

    engine.render().unwrap();

    assert_eq!(
        body_of(&engine).trim(),
        r#"<p class="t"><b>hi</b></p><p class="x">&lt;b&gt;hi&lt;/b&gt;</p>"#
    );
}

#[test]
fn test_json_body_assigns_list_and_null() {
    let mut engine = Engine::new(
        r#"<style>
            .list { --body: json(["<i>", 2, true]) }
            .clear { --body: json(null) }
        </style>
        <p class="list"></p><p class="clear">gone</p>"#,
    );

    engine.render().unwrap();

    assert_eq!(
        body_of(&engine).trim(),
        r#"<p class="list">&lt;i&gt;2true</p><p class="clear"></p>"#
    );
}

#[test]
fn test_runaway_loop_is_a_user_error() {
    let mut engine = Engine::new(
        "<style>p { --prepare: script(while (true) {}) ; --body: (never) }</style><p>kept</p>",
    );

    let report = engine.render().unwrap();

    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(body_of(&engine), "<p>kept</p>");
}

#[test]
fn test_oversized_string_is_a_user_error() {
    let mut engine = Engine::new(
        r#"<style>p { --body: script(return "ab".repeat(1e20)) } i { --body: (fine) }</style><p>kept</p><i></i>"#,
    );

    let report = engine.render().unwrap();

    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(body_of(&engine), "<p>kept</p><i>fine</i>");
}
