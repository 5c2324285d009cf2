//! WASM bindings for rendering documents in the browser.
//!
//! This module exposes the render pass to JavaScript via wasm-bindgen.

use wasm_bindgen::prelude::*;

use crate::engine::Engine;

/// Initialize panic hook for better error messages in the browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "wasm")]
    console_error_panic_hook::set_once();
}

/// Render an HTML document.
///
/// Takes the document's markup and returns the rendered markup. Only inline
/// `<style>` sheets are read.
#[wasm_bindgen]
pub fn render(html: &str) -> Result<String, JsValue> {
    let mut engine = Engine::new(html);
    engine.render().map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(engine.html())
}

/// Render an HTML document and describe the pass.
///
/// Returns a JSON object with `html` and `report` fields; the report lists
/// every snippet that failed to compile or run.
#[wasm_bindgen]
pub fn render_report(html: &str) -> Result<String, JsValue> {
    let mut engine = Engine::new(html);
    let report = engine.render().map_err(|e| JsValue::from_str(&e.to_string()))?;

    let output = serde_json::json!({
        "html": engine.html(),
        "report": report,
    });
    serde_json::to_string(&output).map_err(|e| JsValue::from_str(&e.to_string()))
}
