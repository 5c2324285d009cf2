//! Arena-based mutable DOM.
//!
//! All nodes live in one contiguous vector and link to each other by index.
//! Nodes are never freed: detaching a node only unlinks it, so a [`NodeId`]
//! stays valid (and unique) for the lifetime of the [`Dom`]. The rule runner
//! relies on that to remember which elements a rule has already processed.

use html5ever::{LocalName, Namespace, QualName, ns};

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel value for no node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Node payload.
#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
        /// Cached `id` attribute for selector matching.
        id: Option<String>,
        /// Cached `class` tokens for selector matching.
        classes: Vec<String>,
    },
    Text(String),
    Comment(String),
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
}

/// HTML attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

/// A node and its tree links.
#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }
}

/// Qualified name of an HTML element.
pub fn html_name(local: &str) -> QualName {
    QualName::new(None, ns!(html), LocalName::from(local))
}

/// Qualified name of an attribute without namespace.
pub fn attr_name(local: &str) -> QualName {
    QualName::new(None, ns!(), LocalName::from(local))
}

/// Arena-backed DOM tree.
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Node>,
    document: NodeId,
}

impl Dom {
    /// Create a new empty DOM with a document root.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: NodeId::NONE,
        };
        dom.document = dom.alloc(Node::new(NodeData::Document));
        dom
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    /// Create a detached element node.
    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> NodeId {
        let mut id = None;
        let mut classes = Vec::new();

        for attr in &attrs {
            match attr.name.local.as_ref() {
                "id" => id = Some(attr.value.clone()),
                "class" => classes = split_classes(&attr.value),
                _ => {}
            }
        }

        self.alloc(Node::new(NodeData::Element {
            name,
            attrs,
            id,
            classes,
        }))
    }

    pub fn create_text(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Text(text)))
    }

    pub fn create_comment(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Comment(text)))
    }

    pub fn create_doctype(
        &mut self,
        name: String,
        public_id: String,
        system_id: String,
    ) -> NodeId {
        self.alloc(Node::new(NodeData::Doctype {
            name,
            public_id,
            system_id,
        }))
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);

        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
        }

        if let Some(last_node) = self.get_mut(last_child) {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert `new_node` immediately before `sibling`, detaching it first.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        self.detach(new_node);

        let (parent, prev) = match self.get(sibling) {
            Some(n) => (n.parent, n.prev_sibling),
            None => return,
        };

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Append text, merging into the last child when it is a text node.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let NodeData::Text(existing) = &mut last.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text.to_string());
        self.append(parent, text_node);
    }

    /// Unlink a node from its parent and siblings. The node keeps its subtree.
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = match self.get(id) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.last_child = prev;
        }

        if let Some(node) = self.get_mut(id) {
            node.parent = NodeId::NONE;
            node.prev_sibling = NodeId::NONE;
            node.next_sibling = NodeId::NONE;
        }
    }

    /// Detach every child of `parent`.
    pub fn clear_children(&mut self, parent: NodeId) {
        let children: Vec<_> = self.children(parent).collect();
        for child in children {
            self.detach(child);
        }
    }

    /// Deep-copy `node` from another DOM into this one, returning the
    /// detached copy.
    pub fn import(&mut self, source: &Dom, node: NodeId) -> NodeId {
        let Some(data) = source.get(node).map(|n| n.data.clone()) else {
            return NodeId::NONE;
        };
        let copy = self.alloc(Node::new(data));
        for child in source.children(node) {
            let child_copy = self.import(source, child);
            self.append(copy, child_copy);
        }
        copy
    }

    /// Total number of allocated nodes, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the document root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn children(&self, parent: NodeId) -> ChildrenIter<'_> {
        let first = self.get(parent).map(|n| n.first_child).unwrap_or(NodeId::NONE);
        ChildrenIter {
            dom: self,
            current: first,
        }
    }

    /// All descendants of `root` in document order, excluding `root`.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            out.push(id);
            let start = stack.len();
            stack.extend(self.children(id));
            stack[start..].reverse();
        }
        out
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = node;
        while current.is_some() {
            if current == ancestor {
                return true;
            }
            current = self.get(current).map(|n| n.parent).unwrap_or(NodeId::NONE);
        }
        false
    }

    /// Whether the node is attached (transitively) to the document root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.is_inclusive_ancestor(self.document, node)
    }

    /// First element in the document with the given tag name.
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.document)
            .into_iter()
            .find(|&id| self.element_name(id).is_some_and(|n| n.as_ref() == tag))
    }

    /// First element in the document with the given `id` attribute.
    pub fn get_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.document)
            .into_iter()
            .find(|&node| self.element_id(node) == Some(id))
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    dom: &'a Dom,
    current: NodeId,
}

impl Iterator for ChildrenIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .dom
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(NodeId::NONE);
        Some(id)
    }
}

fn split_classes(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Element accessors and attribute mutation.
impl Dom {
    pub fn element_name(&self, id: NodeId) -> Option<&LocalName> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(&name.local),
            _ => None,
        })
    }

    pub fn element_namespace(&self, id: NodeId) -> Option<&Namespace> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(&name.ns),
            _ => None,
        })
    }

    pub fn get_attr(&self, id: NodeId, attr_name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|a| a.name.local.as_ref() == attr_name)
            .map(|a| a.value.as_str())
    }

    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        self.get(id)
            .and_then(|n| match &n.data {
                NodeData::Element { attrs, .. } => Some(attrs.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Set an attribute, keeping the cached id/classes in sync.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(NodeData::Element {
            attrs,
            id: cached_id,
            classes,
            ..
        }) = self.get_mut(id).map(|n| &mut n.data)
        else {
            return;
        };

        match attrs.iter_mut().find(|a| a.name.local.as_ref() == name) {
            Some(attr) => attr.value = value.to_string(),
            None => attrs.push(Attribute {
                name: attr_name(name),
                value: value.to_string(),
            }),
        }

        match name {
            "id" => *cached_id = Some(value.to_string()),
            "class" => *classes = split_classes(value),
            _ => {}
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        let Some(NodeData::Element {
            attrs,
            id: cached_id,
            classes,
            ..
        }) = self.get_mut(id).map(|n| &mut n.data)
        else {
            return;
        };

        attrs.retain(|a| a.name.local.as_ref() != name);
        match name {
            "id" => *cached_id = None,
            "class" => classes.clear(),
            _ => {}
        }
    }

    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { id, .. } => id.as_deref(),
            _ => None,
        })
    }

    pub fn element_classes(&self, id: NodeId) -> &[String] {
        self.get(id)
            .and_then(|n| match &n.data {
                NodeData::Element { classes, .. } => Some(classes.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Element { .. }))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| matches!(n.data, NodeData::Text(_)))
    }

    /// Contents of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Concatenated text of every text node under `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Replace the children of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        self.clear_children(id);
        if !text.is_empty() {
            let node = self.create_text(text.to_string());
            self.append(id, node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_elements() {
        let mut dom = Dom::new();

        let div = dom.create_element(
            html_name("div"),
            vec![Attribute {
                name: attr_name("id"),
                value: "main".to_string(),
            }],
        );

        dom.append(dom.document(), div);

        assert_eq!(dom.element_name(div).unwrap().as_ref(), "div");
        assert_eq!(dom.element_id(div), Some("main"));
        assert_eq!(dom.get_by_id("main"), Some(div));
    }

    #[test]
    fn test_append_children() {
        let mut dom = Dom::new();

        let parent = dom.create_element(html_name("div"), vec![]);
        let child1 = dom.create_element(html_name("p"), vec![]);
        let child2 = dom.create_element(html_name("p"), vec![]);

        dom.append(dom.document(), parent);
        dom.append(parent, child1);
        dom.append(parent, child2);

        let children: Vec<_> = dom.children(parent).collect();
        assert_eq!(children, vec![child1, child2]);
    }

    #[test]
    fn test_append_moves_attached_node() {
        let mut dom = Dom::new();
        let a = dom.create_element(html_name("div"), vec![]);
        let b = dom.create_element(html_name("div"), vec![]);
        let child = dom.create_element(html_name("span"), vec![]);
        dom.append(dom.document(), a);
        dom.append(dom.document(), b);
        dom.append(a, child);

        dom.append(b, child);

        assert_eq!(dom.children(a).count(), 0);
        assert_eq!(dom.children(b).collect::<Vec<_>>(), vec![child]);
    }

    #[test]
    fn test_text_merging() {
        let mut dom = Dom::new();

        let p = dom.create_element(html_name("p"), vec![]);
        dom.append(dom.document(), p);

        dom.append_text(p, "Hello, ");
        dom.append_text(p, "World!");

        let children: Vec<_> = dom.children(p).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(dom.text(children[0]), Some("Hello, World!"));
    }

    #[test]
    fn test_descendants_are_in_document_order() {
        let mut dom = Dom::new();
        let root = dom.create_element(html_name("div"), vec![]);
        let a = dom.create_element(html_name("a"), vec![]);
        let a1 = dom.create_element(html_name("b"), vec![]);
        let b = dom.create_element(html_name("i"), vec![]);
        dom.append(dom.document(), root);
        dom.append(root, a);
        dom.append(a, a1);
        dom.append(root, b);

        assert_eq!(dom.descendants(root), vec![a, a1, b]);
        assert_eq!(dom.descendants(dom.document()), vec![root, a, a1, b]);
    }

    #[test]
    fn test_detach_keeps_ids_valid() {
        let mut dom = Dom::new();
        let p = dom.create_element(html_name("p"), vec![]);
        dom.append(dom.document(), p);
        dom.append_text(p, "hi");
        assert!(dom.is_connected(p));

        dom.clear_children(dom.document());

        assert!(!dom.is_connected(p));
        assert_eq!(dom.text_content(p), "hi");
    }

    #[test]
    fn test_set_attr_updates_cached_classes() {
        let mut dom = Dom::new();
        let div = dom.create_element(html_name("div"), vec![]);
        dom.set_attr(div, "class", "a b");
        assert_eq!(dom.element_classes(div), ["a".to_string(), "b".to_string()]);

        dom.set_attr(div, "id", "x");
        assert_eq!(dom.element_id(div), Some("x"));

        dom.remove_attr(div, "class");
        assert!(dom.element_classes(div).is_empty());
        assert_eq!(dom.get_attr(div, "class"), None);
    }

    #[test]
    fn test_import_copies_subtree() {
        let mut source = Dom::new();
        let p = source.create_element(html_name("p"), vec![]);
        source.append(source.document(), p);
        source.append_text(p, "copied");

        let mut dom = Dom::new();
        let copy = dom.import(&source, p);
        dom.append(dom.document(), copy);

        assert_eq!(dom.element_name(copy).unwrap().as_ref(), "p");
        assert_eq!(dom.text_content(copy), "copied");
    }
}
