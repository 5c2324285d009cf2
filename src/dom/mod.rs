//! Mutable HTML document model.
//!
//! Documents are parsed with html5ever into an arena ([`Dom`]), matched with
//! the `selectors` crate through [`ElementRef`], and written back out with
//! [`serialize_document`].
//!
//! # Example
//!
//! ```
//! use csspipe::dom::{parse_document, parse_selectors, query_selector_all, serialize_children};
//!
//! let dom = parse_document("<nav><b>1</b></nav>");
//! let selectors = parse_selectors("nav").unwrap();
//! let navs = query_selector_all(&dom, dom.document(), &selectors);
//!
//! assert_eq!(serialize_children(&dom, navs[0]), "<b>1</b>");
//! ```

mod arena;
mod body;
mod element_ref;
mod serialize;
mod tree_sink;

pub use arena::{Attribute, ChildrenIter, Dom, Node, NodeData, NodeId, attr_name, html_name};
pub use body::{BodyValue, set_body};
pub use element_ref::{
    ElementRef, PipeSelectors, SelectorList, matches, parse_selector_list, parse_selectors,
    query_selector_all,
};
pub use serialize::{escape_attr, escape_text, serialize_children, serialize_document, serialize_node};

use html5ever::driver::ParseOpts;
use html5ever::tendril::TendrilSink;

use tree_sink::DomSink;

/// Parse a complete HTML document.
pub fn parse_document(html: &str) -> Dom {
    let sink = DomSink::new();
    html5ever::parse_document(sink, ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes())
        .into_dom()
}

/// Parse a markup fragment, returning the scratch document and the `<body>`
/// element holding the fragment's nodes.
pub fn parse_fragment(html: &str) -> (Dom, NodeId) {
    // Wrap in a minimal document so the tree builder starts in body context.
    let wrapped = format!("<!DOCTYPE html><html><head></head><body>{html}</body></html>");
    let dom = parse_document(&wrapped);
    let body = dom.find_by_tag("body").unwrap_or_else(|| dom.document());
    (dom, body)
}

/// Parse `html` as a fragment and append its nodes to `parent`.
pub(crate) fn parse_fragment_into(dom: &mut Dom, parent: NodeId, html: &str) {
    let (fragment, body) = parse_fragment(html);
    for child in fragment.children(body) {
        let copy = dom.import(&fragment, child);
        dom.append(parent, copy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragment_keeps_top_level_nodes() {
        let (dom, body) = parse_fragment("<b>a</b> and <i>b</i>");
        assert_eq!(dom.children(body).count(), 3);
        assert_eq!(serialize_children(&dom, body), "<b>a</b> and <i>b</i>");
    }

    #[test]
    fn test_parse_fragment_into_appends() {
        let mut dom = parse_document("<ul id=\"list\"><li>1</li></ul>");
        let list = dom.get_by_id("list").unwrap();

        parse_fragment_into(&mut dom, list, "<li>2</li><li>3</li>");

        assert_eq!(
            serialize_children(&dom, list),
            "<li>1</li><li>2</li><li>3</li>"
        );
    }
}
