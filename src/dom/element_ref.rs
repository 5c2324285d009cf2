//! `selectors` crate bindings for [`Dom`].
//!
//! Rule selectors are parsed once into [`SelectorList`]s and matched against
//! arena elements through [`ElementRef`].

use std::fmt;

use cssparser::{CowRcStr, ParseError, Parser, ParserInput, SourceLocation, ToCss};
use html5ever::{LocalName, Namespace};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::context::{MatchingContext, SelectorCaches};
use selectors::matching::ElementSelectorFlags;
use selectors::parser::{ParseRelative, Selector, SelectorParseErrorKind};
use selectors::{OpaqueElement, SelectorImpl};

use super::arena::{Dom, NodeData, NodeId};

/// Selector implementation marker for the `selectors` crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeSelectors;

/// A parsed, comma-separated selector list.
pub type SelectorList = Vec<Selector<PipeSelectors>>;

/// Identifier string type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct IdentStr(pub String);

impl precomputed_hash::PrecomputedHash for IdentStr {
    fn precomputed_hash(&self) -> u32 {
        self.0
            .bytes()
            .fold(0u32, |h, byte| h.wrapping_mul(31).wrapping_add(byte as u32))
    }
}

impl AsRef<str> for IdentStr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for IdentStr {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl<'a> From<&'a str> for IdentStr {
    fn from(s: &'a str) -> Self {
        Self(s.to_string())
    }
}

impl ToCss for IdentStr {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(&self.0)
    }
}

/// LocalName wrapper that implements ToCss.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CssLocalName(pub LocalName);

impl precomputed_hash::PrecomputedHash for CssLocalName {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

impl ToCss for CssLocalName {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(self.0.as_ref())
    }
}

impl From<String> for CssLocalName {
    fn from(s: String) -> Self {
        Self(LocalName::from(s))
    }
}

impl<'a> From<&'a str> for CssLocalName {
    fn from(s: &'a str) -> Self {
        Self(LocalName::from(s))
    }
}

impl AsRef<str> for CssLocalName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Namespace wrapper that implements ToCss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CssNamespace(pub Namespace);

impl precomputed_hash::PrecomputedHash for CssNamespace {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

impl ToCss for CssNamespace {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(self.0.as_ref())
    }
}

impl From<String> for CssNamespace {
    fn from(s: String) -> Self {
        Self(Namespace::from(s))
    }
}

impl<'a> From<&'a str> for CssNamespace {
    fn from(s: &'a str) -> Self {
        Self(Namespace::from(s))
    }
}

/// Pseudo-elements never match a rendered element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PseudoElement {}

impl ToCss for PseudoElement {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

impl selectors::parser::PseudoElement for PseudoElement {
    type Impl = PipeSelectors;

    fn accepts_state_pseudo_classes(&self) -> bool {
        false
    }

    fn valid_after_slotted(&self) -> bool {
        false
    }
}

/// Non-tree-structural pseudo-classes. Only `:link` and `:any-link` can match
/// in a static document; the user-action states are accepted so rules that
/// use them still parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NonTSPseudoClass {
    Link,
    AnyLink,
    Visited,
    Hover,
    Active,
    Focus,
}

impl selectors::parser::NonTSPseudoClass for NonTSPseudoClass {
    type Impl = PipeSelectors;

    fn is_active_or_hover(&self) -> bool {
        matches!(self, Self::Hover | Self::Active)
    }

    fn is_user_action_state(&self) -> bool {
        matches!(self, Self::Hover | Self::Active | Self::Focus)
    }
}

impl ToCss for NonTSPseudoClass {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(match self {
            Self::Link => ":link",
            Self::AnyLink => ":any-link",
            Self::Visited => ":visited",
            Self::Hover => ":hover",
            Self::Active => ":active",
            Self::Focus => ":focus",
        })
    }
}

impl SelectorImpl for PipeSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = IdentStr;
    type Identifier = IdentStr;
    type LocalName = CssLocalName;
    type NamespaceUrl = CssNamespace;
    type NamespacePrefix = IdentStr;
    type BorrowedLocalName = CssLocalName;
    type BorrowedNamespaceUrl = CssNamespace;
    type NonTSPseudoClass = NonTSPseudoClass;
    type PseudoElement = PseudoElement;
}

impl<'i> selectors::parser::Parser<'i> for PipeSelectors {
    type Impl = PipeSelectors;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_non_ts_pseudo_class(
        &self,
        location: SourceLocation,
        name: CowRcStr<'i>,
    ) -> Result<NonTSPseudoClass, ParseError<'i, Self::Error>> {
        let class = match name.as_ref().to_ascii_lowercase().as_str() {
            "link" => NonTSPseudoClass::Link,
            "any-link" => NonTSPseudoClass::AnyLink,
            "visited" => NonTSPseudoClass::Visited,
            "hover" => NonTSPseudoClass::Hover,
            "active" => NonTSPseudoClass::Active,
            "focus" => NonTSPseudoClass::Focus,
            _ => {
                return Err(
                    location.new_custom_error(SelectorParseErrorKind::UnexpectedIdent(name))
                );
            }
        };
        Ok(class)
    }
}

/// Parse a comma-separated selector list from a cssparser input.
pub fn parse_selector_list<'i>(
    parser: &mut Parser<'i, '_>,
) -> Result<SelectorList, ParseError<'i, SelectorParseErrorKind<'i>>> {
    let list = selectors::parser::SelectorList::parse(&PipeSelectors, parser, ParseRelative::No)?;
    Ok(list.slice().to_vec())
}

/// Parse a selector list from text; `None` if it is not a valid selector.
pub fn parse_selectors(text: &str) -> Option<SelectorList> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    let list = parse_selector_list(&mut parser).ok()?;
    parser.expect_exhausted().ok()?;
    Some(list)
}

/// Whether the element matches any selector of the list.
pub fn matches(dom: &Dom, element: NodeId, selectors: &[Selector<PipeSelectors>]) -> bool {
    if !dom.is_element(element) {
        return false;
    }

    let elem = ElementRef::new(dom, element);
    let mut caches = SelectorCaches::default();
    let mut context = MatchingContext::new(
        selectors::matching::MatchingMode::Normal,
        None,
        &mut caches,
        selectors::context::QuirksMode::NoQuirks,
        selectors::matching::NeedsSelectorFlags::No,
        selectors::matching::MatchingForInvalidation::No,
    );

    selectors
        .iter()
        .any(|selector| selectors::matching::matches_selector(selector, 0, None, &elem, &mut context))
}

/// Every element strictly inside `scope` that matches, in document order.
pub fn query_selector_all(
    dom: &Dom,
    scope: NodeId,
    selectors: &[Selector<PipeSelectors>],
) -> Vec<NodeId> {
    dom.descendants(scope)
        .into_iter()
        .filter(|&node| matches(dom, node, selectors))
        .collect()
}

/// Reference to an element in the [`Dom`] for selector matching.
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    pub dom: &'a Dom,
    pub id: NodeId,
}

impl<'a> ElementRef<'a> {
    pub fn new(dom: &'a Dom, id: NodeId) -> Self {
        Self { dom, id }
    }

    fn is_link_element(&self) -> bool {
        let is_anchor = self
            .dom
            .element_name(self.id)
            .is_some_and(|n| matches!(n.as_ref(), "a" | "area" | "link"));
        is_anchor && self.dom.get_attr(self.id, "href").is_some()
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("id", &self.id)
            .field("name", &self.dom.element_name(self.id))
            .finish()
    }
}

impl<'a> selectors::Element for ElementRef<'a> {
    type Impl = PipeSelectors;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self)
    }

    fn parent_element(&self) -> Option<Self> {
        let node = self.dom.get(self.id)?;
        if self.dom.is_element(node.parent) {
            Some(Self::new(self.dom, node.parent))
        } else {
            None
        }
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let mut current = self.dom.get(self.id)?.prev_sibling;
        while current.is_some() {
            if self.dom.is_element(current) {
                return Some(Self::new(self.dom, current));
            }
            current = self.dom.get(current)?.prev_sibling;
        }
        None
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let mut current = self.dom.get(self.id)?.next_sibling;
        while current.is_some() {
            if self.dom.is_element(current) {
                return Some(Self::new(self.dom, current));
            }
            current = self.dom.get(current)?.next_sibling;
        }
        None
    }

    fn first_element_child(&self) -> Option<Self> {
        self.dom
            .children(self.id)
            .find(|&child| self.dom.is_element(child))
            .map(|child| Self::new(self.dom, child))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        self.dom
            .element_name(self.id)
            .is_some_and(|n| n == &name.0)
    }

    fn has_namespace(&self, ns: &CssNamespace) -> bool {
        self.dom
            .element_namespace(self.id)
            .is_some_and(|n| n == &ns.0)
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.dom.element_name(self.id) == other.dom.element_name(other.id)
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&CssNamespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&IdentStr>,
    ) -> bool {
        self.dom.attrs(self.id).iter().any(|attr| {
            let ns_match = match ns {
                NamespaceConstraint::Any => true,
                NamespaceConstraint::Specific(ns) => attr.name.ns == ns.0,
            };
            ns_match && attr.name.local == local_name.0 && operation.eval_str(&attr.value)
        })
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        match pc {
            NonTSPseudoClass::Link | NonTSPseudoClass::AnyLink => self.is_link_element(),
            _ => false,
        }
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn is_link(&self) -> bool {
        self.is_link_element()
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &IdentStr, case_sensitivity: CaseSensitivity) -> bool {
        self.dom
            .element_id(self.id)
            .is_some_and(|elem_id| case_sensitivity.eq(elem_id.as_bytes(), id.0.as_bytes()))
    }

    fn has_class(&self, name: &IdentStr, case_sensitivity: CaseSensitivity) -> bool {
        self.dom
            .element_classes(self.id)
            .iter()
            .any(|c| case_sensitivity.eq(c.as_bytes(), name.0.as_bytes()))
    }

    fn imported_part(&self, _name: &IdentStr) -> Option<IdentStr> {
        None
    }

    fn is_part(&self, _name: &IdentStr) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.dom.children(self.id).all(|child| match self.dom.get(child) {
            Some(node) => match &node.data {
                NodeData::Element { .. } => false,
                NodeData::Text(t) => t.is_empty(),
                _ => true,
            },
            None => true,
        })
    }

    fn is_root(&self) -> bool {
        self.dom
            .get(self.id)
            .and_then(|n| self.dom.get(n.parent))
            .is_some_and(|parent| matches!(parent.data, NodeData::Document))
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn add_element_unique_hashes(&self, _filter: &mut selectors::bloom::BloomFilter) -> bool {
        false
    }

    fn has_custom_state(&self, _name: &IdentStr) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_document;

    fn matches_text(dom: &Dom, element: NodeId, selector: &str) -> bool {
        let list = parse_selectors(selector).expect("valid selector");
        matches(dom, element, &list)
    }

    #[test]
    fn test_tag_selector() {
        let dom = parse_document("<div><p>Hello</p></div>");
        let p = dom.find_by_tag("p").unwrap();

        assert!(matches_text(&dom, p, "p"));
        assert!(!matches_text(&dom, p, "div"));
    }

    #[test]
    fn test_class_and_id_selectors() {
        let dom = parse_document(r#"<p id="main" class="intro highlight">Hello</p>"#);
        let p = dom.find_by_tag("p").unwrap();

        assert!(matches_text(&dom, p, ".intro"));
        assert!(matches_text(&dom, p, "p.highlight"));
        assert!(matches_text(&dom, p, "#main"));
        assert!(!matches_text(&dom, p, ".missing"));
        assert!(matches_text(&dom, p, ".missing, #main"));
    }

    #[test]
    fn test_combinators() {
        let dom = parse_document("<div><span><p>Nested</p></span></div>");
        let p = dom.find_by_tag("p").unwrap();

        assert!(matches_text(&dom, p, "div p"));
        assert!(matches_text(&dom, p, "span > p"));
        assert!(!matches_text(&dom, p, "div > p"));
    }

    #[test]
    fn test_link_pseudo_class() {
        let dom = parse_document(r#"<a href="/x">x</a>"#);
        let a = dom.find_by_tag("a").unwrap();

        assert!(matches_text(&dom, a, "a:link"));
        assert!(!matches_text(&dom, a, "a:hover"));
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        assert!(parse_selectors("p:not-a-real-class").is_none());
        assert!(parse_selectors("").is_none());
    }

    #[test]
    fn test_query_selector_all_excludes_scope() {
        let dom = parse_document(r#"<div class="x"><div class="x"></div></div>"#);
        let outer = dom.find_by_tag("div").unwrap();
        let list = parse_selectors(".x").unwrap();

        let found = query_selector_all(&dom, outer, &list);
        assert_eq!(found.len(), 1);
        assert_ne!(found[0], outer);

        assert_eq!(query_selector_all(&dom, dom.document(), &list).len(), 2);
    }
}
