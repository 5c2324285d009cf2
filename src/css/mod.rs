//! Stylesheets attached to a document.
//!
//! A document's sheets are its `<style>` elements and
//! `<link rel="stylesheet">` elements, in document order. Linked and
//! imported sheets are fetched through a [`StylesheetLoader`].

mod loader;
mod stylesheet;

pub use loader::{FsLoader, LoadError, MemoryLoader, NoLoader, StylesheetLoader, resolve_href};
pub use stylesheet::{CssRule, Declaration, ImportRule, StyleRule, StyleSheet};

use crate::dom::{Dom, NodeId};

/// Collect every stylesheet of the document in document order.
///
/// `base` is the document's own href, used to resolve relative links.
/// Links that fail to load for a reason other than a cross-origin
/// restriction are skipped with a warning.
pub fn document_stylesheets(
    dom: &Dom,
    base: Option<&str>,
    loader: &dyn StylesheetLoader,
) -> Vec<StyleSheet> {
    let mut sheets = Vec::new();

    for id in dom.descendants(dom.document()) {
        match dom.element_name(id).map(|n| n.as_ref()) {
            Some("style") => {
                let text = dom.text_content(id);
                sheets.push(StyleSheet::load(&text, None, base, loader));
            }
            Some("link") if is_stylesheet_link(dom, id) => {
                let Some(href) = dom.get_attr(id, "href") else {
                    continue;
                };
                let resolved = resolve_href(base, href);
                match StyleSheet::fetch(&resolved, loader) {
                    Ok(sheet) => sheets.push(sheet),
                    Err(e) => log::warn!("failed to load stylesheet {resolved}: {e}"),
                }
            }
            _ => {}
        }
    }

    sheets
}

fn is_stylesheet_link(dom: &Dom, id: NodeId) -> bool {
    dom.get_attr(id, "rel").is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
    })
}
