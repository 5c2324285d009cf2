//! HTML serialization of arena nodes.

use super::arena::{Dom, NodeData, NodeId};

/// Elements that never have an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose text children are written without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

/// Serialize the whole document.
pub fn serialize_document(dom: &Dom) -> String {
    serialize_children(dom, dom.document())
}

/// Serialize the children of a node (`innerHTML`).
pub fn serialize_children(dom: &Dom, id: NodeId) -> String {
    let mut out = String::new();
    let raw = dom
        .element_name(id)
        .is_some_and(|n| RAW_TEXT_ELEMENTS.contains(&n.as_ref()));
    for child in dom.children(id) {
        write_node(dom, child, raw, &mut out);
    }
    out
}

/// Serialize a node including itself (`outerHTML`).
pub fn serialize_node(dom: &Dom, id: NodeId) -> String {
    let mut out = String::new();
    write_node(dom, id, false, &mut out);
    out
}

fn write_node(dom: &Dom, id: NodeId, raw_text: bool, out: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };

    match &node.data {
        NodeData::Document => {
            for child in dom.children(id) {
                write_node(dom, child, false, out);
            }
        }
        NodeData::Doctype { name, .. } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.as_ref();
            out.push('<');
            out.push_str(tag);
            for attr in attrs {
                out.push(' ');
                if let Some(prefix) = &attr.name.prefix {
                    out.push_str(prefix.as_ref());
                    out.push(':');
                }
                out.push_str(attr.name.local.as_ref());
                out.push_str("=\"");
                out.push_str(&escape_attr(&attr.value));
                out.push('"');
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&tag) {
                return;
            }

            let raw = RAW_TEXT_ELEMENTS.contains(&tag);
            for child in dom.children(id) {
                write_node(dom, child, raw, out);
            }

            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

/// Escape text content.
pub fn escape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '\u{a0}' => result.push_str("&nbsp;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape an attribute value for use inside double quotes.
pub fn escape_attr(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\u{a0}' => result.push_str("&nbsp;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;

    #[test]
    fn test_serialize_round_trips_simple_markup() {
        let dom = parse_document("<nav><b class=\"x\">1</b><br></nav>");
        let nav = dom.find_by_tag("nav").unwrap();

        assert_eq!(serialize_children(&dom, nav), "<b class=\"x\">1</b><br>");
        assert_eq!(
            serialize_node(&dom, nav),
            "<nav><b class=\"x\">1</b><br></nav>"
        );
    }

    #[test]
    fn test_text_is_escaped_but_script_is_not() {
        let dom = parse_document("<p>a &lt; b</p><script>if (a < b) {}</script>");
        let p = dom.find_by_tag("p").unwrap();
        let script = dom.find_by_tag("script").unwrap();

        assert_eq!(serialize_children(&dom, p), "a &lt; b");
        assert_eq!(serialize_children(&dom, script), "if (a < b) {}");
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr(r#"say "hi" & go"#), "say &quot;hi&quot; &amp; go");
    }
}
