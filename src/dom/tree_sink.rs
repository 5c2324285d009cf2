//! html5ever TreeSink implementation for [`Dom`].

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use html5ever::tendril::StrTendril;
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute as Html5Attribute, LocalName, QualName, ns};

use super::arena::{Attribute, Dom, NodeId};

/// Handle used by the tree builder to reference nodes.
///
/// Element handles carry their qualified name so `elem_name` can borrow it
/// from the handle instead of from the `RefCell`-guarded arena.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    id: NodeId,
    name: Rc<QualName>,
}

impl NodeHandle {
    fn new(id: NodeId, name: Rc<QualName>) -> Self {
        Self { id, name }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// TreeSink that builds a [`Dom`].
///
/// Uses interior mutability because html5ever's TreeSink methods take
/// `&self`.
pub struct DomSink {
    dom: RefCell<Dom>,
    quirks_mode: RefCell<QuirksMode>,
    unnamed: Rc<QualName>,
}

impl Default for DomSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DomSink {
    pub fn new() -> Self {
        Self {
            dom: RefCell::new(Dom::new()),
            quirks_mode: RefCell::new(QuirksMode::NoQuirks),
            unnamed: Rc::new(QualName::new(None, ns!(), LocalName::from(""))),
        }
    }

    /// Consume the sink and return the DOM.
    pub fn into_dom(self) -> Dom {
        self.dom.into_inner()
    }

    fn handle(&self, id: NodeId) -> NodeHandle {
        NodeHandle::new(id, self.unnamed.clone())
    }

    fn append_child(&self, parent: NodeId, child: NodeOrText<NodeHandle>) {
        let mut dom = self.dom.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => dom.append(parent, node.id),
            NodeOrText::AppendText(text) => dom.append_text(parent, &text),
        }
    }
}

impl TreeSink for DomSink {
    type Handle = NodeHandle;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        log::trace!("html parse error: {msg}");
    }

    fn get_document(&self) -> Self::Handle {
        self.handle(self.dom.borrow().document())
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        target.name.as_ref()
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Html5Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let converted: Vec<Attribute> = attrs
            .into_iter()
            .map(|a| Attribute {
                name: a.name,
                value: a.value.to_string(),
            })
            .collect();

        let handle_name = Rc::new(name.clone());
        let id = self.dom.borrow_mut().create_element(name, converted);
        NodeHandle::new(id, handle_name)
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        let id = self.dom.borrow_mut().create_comment(text.to_string());
        self.handle(id)
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        let id = self.dom.borrow_mut().create_comment(String::new());
        self.handle(id)
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        self.append_child(parent.id, child);
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = self
            .dom
            .borrow()
            .get(element.id)
            .is_some_and(|n| n.parent.is_some());

        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append_child(prev_element.id, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        let mut dom = self.dom.borrow_mut();
        let doc = dom.document();
        let doctype =
            dom.create_doctype(name.to_string(), public_id.to_string(), system_id.to_string());
        dom.append(doc, doctype);
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        // Template contents are kept inline as ordinary children.
        target.clone()
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x.id == y.id
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        *self.quirks_mode.borrow_mut() = mode;
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut dom = self.dom.borrow_mut();
        match new_node {
            NodeOrText::AppendNode(node) => dom.insert_before(sibling.id, node.id),
            NodeOrText::AppendText(text) => {
                let text_node = dom.create_text(text.to_string());
                dom.insert_before(sibling.id, text_node);
            }
        }
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Html5Attribute>) {
        let mut dom = self.dom.borrow_mut();
        let missing: Vec<_> = attrs
            .into_iter()
            .filter(|attr| dom.get_attr(target.id, attr.name.local.as_ref()).is_none())
            .collect();
        for attr in missing {
            dom.set_attr(target.id, attr.name.local.as_ref(), &attr.value);
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.dom.borrow_mut().detach(target.id);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut dom = self.dom.borrow_mut();
        let children: Vec<_> = dom.children(node.id).collect();
        for child in children {
            dom.append(new_parent.id, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dom::parse_document;

    #[test]
    fn test_basic_parse() {
        let dom = parse_document("<html><body><p>Hello</p></body></html>");

        assert!(dom.len() > 3);

        let p = dom.find_by_tag("p").expect("should find p");
        let text_id = dom.children(p).next().expect("p should have child");
        assert_eq!(dom.text(text_id), Some("Hello"));
    }

    #[test]
    fn test_attributes() {
        let dom = parse_document(r#"<div id="main" class="container header">Content</div>"#);

        let div = dom.find_by_tag("div").expect("should find div");
        assert_eq!(dom.element_id(div), Some("main"));

        let classes = dom.element_classes(div);
        assert!(classes.contains(&"container".to_string()));
        assert!(classes.contains(&"header".to_string()));
    }
}
