//! Stage property values: `[mode](body)` or a bare body.

use std::sync::LazyLock;

use regex::Regex;

use crate::css::StyleRule;

/// Matches `mode(body)` where the mode may be empty and the body runs to the
/// final `)` of the value.
static MODE_BODY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^([A-Za-z0-9_$-]*)\s*\((.*)\)$").expect("valid property regex")
});

/// A parsed stage property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValue {
    /// Explicit mode, or `None` to use the stage default.
    pub mode: Option<String>,
    pub body: String,
}

/// Parse a raw property value. Returns `None` only for blank input.
///
/// ```
/// use csspipe::property::parse_property_value;
///
/// let value = parse_property_value(" json({\"a\": (1)}) ").unwrap();
/// assert_eq!(value.mode.as_deref(), Some("json"));
/// assert_eq!(value.body, "{\"a\": (1)}");
///
/// let bare = parse_property_value("<b>${data.x}</b>").unwrap();
/// assert_eq!(bare.mode, None);
/// ```
pub fn parse_property_value(raw: &str) -> Option<PropertyValue> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(caps) = MODE_BODY_RE.captures(value) {
        let mode = &caps[1];
        return Some(PropertyValue {
            mode: (!mode.is_empty()).then(|| mode.to_string()),
            body: caps[2].to_string(),
        });
    }

    Some(PropertyValue {
        mode: None,
        body: value.to_string(),
    })
}

/// Read and parse `--{name}` from a style rule.
pub fn extract(rule: &StyleRule, name: &str) -> Option<PropertyValue> {
    rule.property_value(&format!("--{name}"))
        .and_then(parse_property_value)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::css::{CssRule, StyleSheet};

    fn first_rule(css: &str) -> StyleRule {
        let sheet = StyleSheet::parse(css);
        match &sheet.css_rules().unwrap()[0] {
            CssRule::Style(rule) => rule.clone(),
            other => panic!("expected style rule, got {other:?}"),
        }
    }

    #[test]
    fn test_mode_and_body() {
        let v = parse_property_value("html(<b>x</b>)").unwrap();
        assert_eq!(v.mode.as_deref(), Some("html"));
        assert_eq!(v.body, "<b>x</b>");
    }

    #[test]
    fn test_empty_mode_is_unset() {
        let v = parse_property_value("(data.x)").unwrap();
        assert_eq!(v.mode, None);
        assert_eq!(v.body, "data.x");
    }

    #[test]
    fn test_whitespace_between_mode_and_body() {
        let v = parse_property_value("script \n (return 1)").unwrap();
        assert_eq!(v.mode.as_deref(), Some("script"));
        assert_eq!(v.body, "return 1");
    }

    #[test]
    fn test_nested_parens_are_greedy() {
        let v = parse_property_value("script(f(a)(b))").unwrap();
        assert_eq!(v.body, "f(a)(b)");

        let v = parse_property_value("x(a) + (b)").unwrap();
        assert_eq!(v.mode.as_deref(), Some("x"));
        assert_eq!(v.body, "a) + (b");
    }

    #[test]
    fn test_body_spans_newlines() {
        let v = parse_property_value("script(\n  let a = 1;\n  return a;\n)").unwrap();
        assert_eq!(v.body, "\n  let a = 1;\n  return a;\n");
    }

    #[test]
    fn test_bare_body() {
        let v = parse_property_value("  <i>${data}</i> ").unwrap();
        assert_eq!(v.mode, None);
        assert_eq!(v.body, "<i>${data}</i>");

        let v = parse_property_value("foo.bar(1) + 2").unwrap();
        assert_eq!(v.mode, None);
        assert_eq!(v.body, "foo.bar(1) + 2");
    }

    #[test]
    fn test_blank_is_none() {
        assert_eq!(parse_property_value(""), None);
        assert_eq!(parse_property_value(" \n\t"), None);
    }

    #[test]
    fn test_extract_from_rule() {
        let rule = first_rule("nav { --data: json({\"a\":[1,2]}); --html: (<b>x</b>); --body: ; }");
        assert_eq!(
            extract(&rule, "data"),
            Some(PropertyValue {
                mode: Some("json".to_string()),
                body: "{\"a\":[1,2]}".to_string(),
            })
        );
        assert_eq!(extract(&rule, "html").unwrap().body, "<b>x</b>");
        assert_eq!(extract(&rule, "body"), None);
        assert_eq!(extract(&rule, "script"), None);
    }

    proptest! {
        #[test]
        fn prop_never_panics(raw in ".*") {
            let _ = parse_property_value(&raw);
        }

        #[test]
        fn prop_bare_body_is_trimmed_value(raw in "[a-z .+<>/]*[a-z.+<>/]") {
            // No trailing `)`, so never the mode(body) form.
            let v = parse_property_value(&raw).unwrap();
            prop_assert_eq!(v.mode, None);
            prop_assert_eq!(v.body, raw.trim());
        }

        #[test]
        fn prop_mode_body_round_trip(mode in "[a-z][a-z0-9_-]{0,8}", body in "[^\\s][^\n]{0,20}") {
            let v = parse_property_value(&format!("{mode}({body})")).unwrap();
            prop_assert_eq!(v.mode.as_deref(), Some(mode.as_str()));
            prop_assert_eq!(v.body, body);
        }
    }
}
