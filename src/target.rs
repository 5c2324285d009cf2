//! What a renderer runs against.

use std::fmt;

use crate::dom::{BodyValue, Dom, NodeId, set_body};
use crate::error::{Error, Result};

/// A matched element, or the global target of a `script` rule.
///
/// Renderers get mutable access to the whole document, not just the
/// element, so a stage may touch anything the page could.
pub struct Target<'a> {
    dom: &'a mut Dom,
    element: Option<NodeId>,
}

impl<'a> Target<'a> {
    pub fn element(dom: &'a mut Dom, element: NodeId) -> Self {
        Self {
            dom,
            element: Some(element),
        }
    }

    pub fn global(dom: &'a mut Dom) -> Self {
        Self { dom, element: None }
    }

    /// The element, or `None` for the global target.
    pub fn node(&self) -> Option<NodeId> {
        self.element
    }

    pub fn is_global(&self) -> bool {
        self.element.is_none()
    }

    pub fn dom(&self) -> &Dom {
        self.dom
    }

    pub fn dom_mut(&mut self) -> &mut Dom {
        self.dom
    }

    /// Replace the element's children. The global target has no body.
    pub fn set_body(&mut self, value: BodyValue) -> Result<()> {
        match self.element {
            Some(element) => set_body(self.dom, element, value),
            None => Err(Error::user_code_msg("the global target has no body")),
        }
    }

    /// Short description for diagnostics, e.g. `<nav id="main">`.
    pub fn describe(&self) -> Option<String> {
        self.element.map(|id| describe_element(self.dom, id))
    }
}

impl fmt::Debug for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("element", &self.element)
            .finish()
    }
}

/// Opening tag of an element with its id and class, for log messages.
pub fn describe_element(dom: &Dom, id: NodeId) -> String {
    let Some(name) = dom.element_name(id) else {
        return format!("#node{}", id.0);
    };
    let mut out = format!("<{}", name.as_ref());
    if let Some(element_id) = dom.element_id(id) {
        out.push_str(&format!(" id=\"{element_id}\""));
    }
    if let Some(class) = dom.get_attr(id, "class") {
        out.push_str(&format!(" class=\"{class}\""));
    }
    out.push('>');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_document, serialize_children};

    #[test]
    fn test_describe() {
        let mut dom = parse_document("<nav id=\"main\" class=\"a b\"></nav><p></p>");
        let nav = dom.get_by_id("main").unwrap();
        let p = dom.find_by_tag("p").unwrap();

        assert_eq!(describe_element(&dom, nav), "<nav id=\"main\" class=\"a b\">");
        assert_eq!(describe_element(&dom, p), "<p>");
        assert_eq!(Target::global(&mut dom).describe(), None);
    }

    #[test]
    fn test_global_target_has_no_body() {
        let mut dom = parse_document("<p></p>");
        let mut target = Target::global(&mut dom);
        assert!(target.set_body(BodyValue::Text("x".into())).unwrap_err().is_user_code());
    }

    #[test]
    fn test_element_set_body() {
        let mut dom = parse_document("<p></p>");
        let p = dom.find_by_tag("p").unwrap();
        Target::element(&mut dom, p)
            .set_body(BodyValue::Markup("<i>x</i>".into()))
            .unwrap();
        assert_eq!(serialize_children(&dom, p), "<i>x</i>");
    }
}
