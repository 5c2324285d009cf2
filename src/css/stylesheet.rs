//! Stylesheet model and cssparser-based rule parser.
//!
//! Only what the pipeline reads is kept: `@import` rules (with the sheet
//! they pulled in), style rules with their selector and raw declaration
//! text, and an opaque [`CssRule::Other`] for everything else.

use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput, ParserState,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, StyleSheetParser,
};

use super::loader::{LoadError, StylesheetLoader, resolve_href};
use crate::dom::{SelectorList, parse_selector_list};
use crate::error::{Error, Result};

/// A parsed stylesheet.
#[derive(Debug, Clone)]
pub struct StyleSheet {
    href: Option<String>,
    rules: SheetRules,
}

#[derive(Debug, Clone)]
enum SheetRules {
    Accessible(Vec<CssRule>),
    /// Loaded from another origin; the rules exist but cannot be read.
    Restricted,
}

/// One top-level rule.
#[derive(Debug, Clone)]
pub enum CssRule {
    Import(ImportRule),
    Style(StyleRule),
    Other,
}

/// An `@import` rule. `sheet` is `None` when the import could not be loaded.
#[derive(Debug, Clone)]
pub struct ImportRule {
    pub href: String,
    pub sheet: Option<Box<StyleSheet>>,
}

/// A qualified rule: selector plus declarations.
#[derive(Debug, Clone)]
pub struct StyleRule {
    pub selector_text: String,
    pub selectors: SelectorList,
    pub declarations: Vec<Declaration>,
}

/// A declaration with its value kept as source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

impl StyleRule {
    /// Value of `property` in this rule, honoring `!important` and
    /// last-declaration-wins.
    pub fn property_value(&self, property: &str) -> Option<&str> {
        let mut normal = None;
        let mut important = None;
        for decl in self.declarations.iter().filter(|d| d.property == property) {
            if decl.important {
                important = Some(decl.value.as_str());
            } else {
                normal = Some(decl.value.as_str());
            }
        }
        important.or(normal)
    }
}

impl StyleSheet {
    /// Parse a stylesheet without resolving its imports.
    pub fn parse(css: &str) -> Self {
        Self {
            href: None,
            rules: SheetRules::Accessible(parse_rules(css)),
        }
    }

    /// Parse a stylesheet and load its imports through `loader`.
    ///
    /// `href` identifies the sheet itself; `base` is used to resolve
    /// relative imports when the sheet has no href of its own (inline
    /// `<style>` content resolves against the document).
    pub fn load(
        css: &str,
        href: Option<&str>,
        base: Option<&str>,
        loader: &dyn StylesheetLoader,
    ) -> Self {
        let mut stack: Vec<String> = href.map(str::to_string).into_iter().collect();
        Self::load_nested(css, href, base, loader, &mut stack)
    }

    /// Fetch and parse the sheet at `href`. Cross-origin sheets come back
    /// restricted; any other load failure is returned.
    pub fn fetch(
        href: &str,
        loader: &dyn StylesheetLoader,
    ) -> std::result::Result<Self, LoadError> {
        match loader.load(href) {
            Ok(css) => Ok(Self::load(&css, Some(href), None, loader)),
            Err(LoadError::CrossOrigin(_)) => Ok(Self::restricted(href)),
            Err(e) => Err(e),
        }
    }

    /// A sheet from another origin whose rules cannot be read.
    pub fn restricted(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            rules: SheetRules::Restricted,
        }
    }

    fn load_nested(
        css: &str,
        href: Option<&str>,
        base: Option<&str>,
        loader: &dyn StylesheetLoader,
        stack: &mut Vec<String>,
    ) -> Self {
        let mut rules = parse_rules(css);
        let base = href.or(base);

        for rule in &mut rules {
            let CssRule::Import(import) = rule else {
                continue;
            };
            let resolved = resolve_href(base, &import.href);

            if stack.contains(&resolved) {
                log::warn!("skipping circular @import of {resolved}");
                continue;
            }

            import.sheet = match loader.load(&resolved) {
                Ok(text) => {
                    stack.push(resolved.clone());
                    let sheet = Self::load_nested(&text, Some(&resolved), None, loader, stack);
                    stack.pop();
                    Some(Box::new(sheet))
                }
                Err(LoadError::CrossOrigin(_)) => Some(Box::new(Self::restricted(resolved))),
                Err(e) => {
                    log::warn!("failed to load @import {resolved}: {e}");
                    None
                }
            };
        }

        Self {
            href: href.map(str::to_string),
            rules: SheetRules::Accessible(rules),
        }
    }

    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self.rules, SheetRules::Restricted)
    }

    /// The sheet's rules, or [`Error::CrossOrigin`] when they may not be read.
    pub fn css_rules(&self) -> Result<&[CssRule]> {
        match &self.rules {
            SheetRules::Accessible(rules) => Ok(rules),
            SheetRules::Restricted => Err(Error::CrossOrigin(
                self.href.clone().unwrap_or_default(),
            )),
        }
    }
}

fn parse_rules(css: &str) -> Vec<CssRule> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut rule_parser = TopLevelRuleParser { seen_style: false };

    StyleSheetParser::new(&mut parser, &mut rule_parser)
        .filter_map(|result| match result {
            Ok(rule) => Some(rule),
            Err((error, slice)) => {
                log::trace!("dropping invalid rule {slice:?}: {:?}", error.kind);
                None
            }
        })
        .collect()
}

/// Parser for top-level stylesheet rules.
struct TopLevelRuleParser {
    /// `@import` is only valid before the first style rule.
    seen_style: bool,
}

enum AtRulePrelude {
    Import(String),
    Other,
}

impl<'i> AtRuleParser<'i> for TopLevelRuleParser {
    type Prelude = AtRulePrelude;
    type AtRule = CssRule;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> std::result::Result<Self::Prelude, ParseError<'i, Self::Error>> {
        if name.eq_ignore_ascii_case("import") && !self.seen_style {
            let href = input.expect_url_or_string()?.to_string();
            // Media and supports conditions are not evaluated.
            while input.next().is_ok() {}
            return Ok(AtRulePrelude::Import(href));
        }
        while input.next().is_ok() {}
        Ok(AtRulePrelude::Other)
    }

    fn rule_without_block(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
    ) -> std::result::Result<Self::AtRule, ()> {
        Ok(match prelude {
            AtRulePrelude::Import(href) => CssRule::Import(ImportRule { href, sheet: None }),
            AtRulePrelude::Other => CssRule::Other,
        })
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> std::result::Result<Self::AtRule, ParseError<'i, Self::Error>> {
        while input.next().is_ok() {}
        Ok(CssRule::Other)
    }
}

impl<'i> QualifiedRuleParser<'i> for TopLevelRuleParser {
    type Prelude = (String, SelectorList);
    type QualifiedRule = CssRule;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> std::result::Result<Self::Prelude, ParseError<'i, Self::Error>> {
        let start = input.position();
        let location = input.current_source_location();
        let selectors =
            parse_selector_list(input).map_err(|_| location.new_custom_error(()))?;
        input.expect_exhausted()?;
        let text = input.slice_from(start).trim().to_string();
        Ok((text, selectors))
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> std::result::Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        self.seen_style = true;

        let (selector_text, selectors) = prelude;
        let mut declarations = Vec::new();
        let mut decl_parser = DeclarationListParser {
            declarations: &mut declarations,
        };

        for result in RuleBodyParser::new(input, &mut decl_parser) {
            // Ignore errors - lenient parsing
            let _ = result;
        }

        Ok(CssRule::Style(StyleRule {
            selector_text,
            selectors,
            declarations,
        }))
    }
}

struct DeclarationListParser<'a> {
    declarations: &'a mut Vec<Declaration>,
}

impl<'i> AtRuleParser<'i> for DeclarationListParser<'_> {
    type Prelude = ();
    type AtRule = ();
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for DeclarationListParser<'_> {
    type Prelude = ();
    type QualifiedRule = ();
    type Error = ();
}

impl<'i> DeclarationParser<'i> for DeclarationListParser<'_> {
    type Declaration = ();
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _start: &ParserState,
    ) -> std::result::Result<Self::Declaration, ParseError<'i, Self::Error>> {
        // Keep the value as written; custom property values are code.
        let start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        let (value, important) = split_important(input.slice_from(start));

        self.declarations.push(Declaration {
            property: name.to_string(),
            value: value.to_string(),
            important,
        });

        Ok(())
    }
}

impl<'i> RuleBodyItemParser<'i, (), ()> for DeclarationListParser<'_> {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

/// Strip a trailing `!important` from a raw value.
fn split_important(raw: &str) -> (&str, bool) {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if let Some(head) = lower.strip_suffix("important") {
        let head = head.trim_end();
        if let Some(value) = head.strip_suffix('!') {
            return (trimmed[..value.len()].trim_end(), true);
        }
    }
    (trimmed, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::MemoryLoader;

    fn style_rules(sheet: &StyleSheet) -> Vec<&StyleRule> {
        sheet
            .css_rules()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                CssRule::Style(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_style_rules() {
        let sheet = StyleSheet::parse(
            r#"
            p { color: red; }
            nav > a.x, .y { --data: json({"a": [1, 2]}); --body: html(<b>${data.a[0]}</b>); }
            "#,
        );

        let rules = style_rules(&sheet);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].selector_text, "nav > a.x, .y");
        assert_eq!(rules[1].selectors.len(), 2);
        assert_eq!(
            rules[1].property_value("--data"),
            Some(r#"json({"a": [1, 2]})"#)
        );
        assert_eq!(
            rules[1].property_value("--body"),
            Some("html(<b>${data.a[0]}</b>)")
        );
        assert_eq!(rules[0].property_value("--body"), None);
    }

    #[test]
    fn test_semicolons_inside_parentheses_stay_in_value() {
        let sheet = StyleSheet::parse("a { --script: (data.x = 1; data.y = 2); color: blue }");
        let rules = style_rules(&sheet);
        assert_eq!(
            rules[0].property_value("--script"),
            Some("(data.x = 1; data.y = 2)")
        );
        assert_eq!(rules[0].property_value("color"), Some("blue"));
    }

    #[test]
    fn test_important_and_last_declaration() {
        let sheet = StyleSheet::parse("a { --x: 1 !important; --x: 2; --y: 1; --y: 2 }");
        let rules = style_rules(&sheet);
        assert_eq!(rules[0].property_value("--x"), Some("1"));
        assert_eq!(rules[0].property_value("--y"), Some("2"));
    }

    #[test]
    fn test_rule_kinds() {
        let sheet = StyleSheet::parse(
            r#"
            @import url("a.css");
            @import "b.css" screen;
            @media print { p { color: red } }
            p { color: blue }
            @import "late.css";
            "#,
        );

        let rules = sheet.css_rules().unwrap();
        assert_eq!(rules.len(), 5);
        assert!(matches!(&rules[0], CssRule::Import(i) if i.href == "a.css"));
        assert!(matches!(&rules[1], CssRule::Import(i) if i.href == "b.css"));
        assert!(matches!(rules[2], CssRule::Other));
        assert!(matches!(rules[3], CssRule::Style(_)));
        assert!(matches!(rules[4], CssRule::Other));
    }

    #[test]
    fn test_invalid_selector_drops_rule() {
        let sheet = StyleSheet::parse("p:unknown-thing { --body: (x) } p { --body: (y) }");
        let rules = style_rules(&sheet);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].property_value("--body"), Some("(y)"));
    }

    #[test]
    fn test_load_resolves_imports() {
        let loader = MemoryLoader::new()
            .with("css/base.css", "@import 'parts/a.css'; b { --body: (base) }")
            .with("css/parts/a.css", "a { --body: (a) }");

        let sheet = StyleSheet::load("@import 'css/base.css';", None, None, &loader);
        let CssRule::Import(import) = &sheet.css_rules().unwrap()[0] else {
            panic!("expected import");
        };
        let base = import.sheet.as_ref().unwrap();
        assert_eq!(base.href(), Some("css/base.css"));

        let CssRule::Import(nested) = &base.css_rules().unwrap()[0] else {
            panic!("expected nested import");
        };
        assert_eq!(nested.sheet.as_ref().unwrap().href(), Some("css/parts/a.css"));
    }

    #[test]
    fn test_load_handles_cycles_and_failures() {
        let mut loader = MemoryLoader::new();
        loader
            .insert("a.css", "@import 'a.css'; a { --body: (a) }")
            .insert_cross_origin("https://cdn/x.css");

        let sheet = StyleSheet::load(
            "@import 'a.css'; @import 'missing.css'; @import 'https://cdn/x.css';",
            None,
            None,
            &loader,
        );
        let rules = sheet.css_rules().unwrap();

        let CssRule::Import(a) = &rules[0] else { panic!() };
        let a_sheet = a.sheet.as_ref().unwrap();
        let CssRule::Import(self_import) = &a_sheet.css_rules().unwrap()[0] else {
            panic!()
        };
        assert!(self_import.sheet.is_none());

        let CssRule::Import(missing) = &rules[1] else { panic!() };
        assert!(missing.sheet.is_none());

        let CssRule::Import(remote) = &rules[2] else { panic!() };
        let remote = remote.sheet.as_ref().unwrap();
        assert!(remote.is_restricted());
        assert!(matches!(remote.css_rules(), Err(Error::CrossOrigin(_))));
    }

    #[test]
    fn test_split_important() {
        assert_eq!(split_important(" red ! IMPORTANT "), ("red", true));
        assert_eq!(split_important("important"), ("important", false));
        assert_eq!(split_important("(x)"), ("(x)", false));
    }
}
