//! Flattening stylesheets into an ordered list of compiled rules.
//!
//! Rules keep source order with imported sheets inlined where the `@import`
//! appears. That order is the rule runner's priority order.

use crate::compile::{CompiledRule, compile_rule};
use crate::config::RenderOptions;
use crate::css::{CssRule, StyleSheet};
use crate::error::{Error, Result};
use crate::registry::ModeRegistry;
use crate::report::Diagnostics;

/// Shared state for compiling every rule of a render pass.
pub struct Walker<'a> {
    registry: &'a ModeRegistry,
    options: &'a RenderOptions,
    diagnostics: &'a Diagnostics,
}

impl<'a> Walker<'a> {
    pub fn new(
        registry: &'a ModeRegistry,
        options: &'a RenderOptions,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        Self {
            registry,
            options,
            diagnostics,
        }
    }

    /// Compile one stylesheet and everything it imports.
    pub fn walk(&self, sheet: &StyleSheet) -> Result<Vec<CompiledRule>> {
        let mut out = Vec::new();
        self.walk_into(sheet, &mut out)?;
        Ok(out)
    }

    /// Compile several stylesheets, concatenated in order.
    pub fn walk_all<'s>(
        &self,
        sheets: impl IntoIterator<Item = &'s StyleSheet>,
    ) -> Result<Vec<CompiledRule>> {
        let mut out = Vec::new();
        for sheet in sheets {
            self.walk_into(sheet, &mut out)?;
        }
        Ok(out)
    }

    fn walk_into(&self, sheet: &StyleSheet, out: &mut Vec<CompiledRule>) -> Result<()> {
        let rules = match sheet.css_rules() {
            Ok(rules) => rules,
            Err(Error::CrossOrigin(href)) => {
                log::debug!("skipping cross-origin stylesheet {href}");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        for rule in rules {
            match rule {
                CssRule::Import(import) => {
                    if let Some(imported) = &import.sheet {
                        self.walk_into(imported, out)?;
                    }
                }
                CssRule::Style(style) => {
                    if let Some(compiled) =
                        compile_rule(style, self.registry, self.options, self.diagnostics)?
                    {
                        out.push(compiled);
                    }
                }
                CssRule::Other => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::MemoryLoader;

    fn selectors(rules: &[CompiledRule]) -> Vec<&str> {
        rules.iter().map(|r| r.selector_text()).collect()
    }

    #[test]
    fn test_imports_are_inlined_in_place() {
        let loader = MemoryLoader::new()
            .with("a.css", ".a1 { --body: (a1) } .a2 { --body: (a2) }")
            .with("b.css", "@import 'c.css'; .b { --body: (b) }")
            .with("c.css", ".c { --body: (c) }");
        let sheet = StyleSheet::load(
            "@import 'a.css'; @import 'b.css'; .main { --body: (main) } p { color: red }",
            None,
            None,
            &loader,
        );

        let registry = ModeRegistry::with_builtin_modes();
        let options = RenderOptions::default();
        let diagnostics = Diagnostics::new();
        let rules = Walker::new(&registry, &options, &diagnostics)
            .walk(&sheet)
            .unwrap();

        assert_eq!(selectors(&rules), [".a1", ".a2", ".c", ".b", ".main"]);
    }

    #[test]
    fn test_cross_origin_sheets_yield_no_rules() {
        let mut loader = MemoryLoader::new();
        loader.insert_cross_origin("https://cdn.example/x.css");
        let sheet = StyleSheet::load(
            "@import 'https://cdn.example/x.css'; .ok { --body: (ok) }",
            None,
            None,
            &loader,
        );

        let registry = ModeRegistry::with_builtin_modes();
        let options = RenderOptions::default();
        let diagnostics = Diagnostics::new();
        let walker = Walker::new(&registry, &options, &diagnostics);

        assert_eq!(selectors(&walker.walk(&sheet).unwrap()), [".ok"]);
        assert!(
            walker
                .walk(&StyleSheet::restricted("https://cdn.example/x.css"))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_walk_all_concatenates() {
        let first = StyleSheet::parse(".one { --body: (1) }");
        let second = StyleSheet::parse(".two { --body: (2) } .bad { --data: json(not json) }");

        let registry = ModeRegistry::with_builtin_modes();
        let options = RenderOptions::default();
        let diagnostics = Diagnostics::new();
        let rules = Walker::new(&registry, &options, &diagnostics)
            .walk_all([&first, &second])
            .unwrap();

        assert_eq!(selectors(&rules), [".one", ".two"]);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_registry_errors_propagate() {
        let sheet = StyleSheet::parse(".x { --body: nope(1) }");
        let registry = ModeRegistry::with_builtin_modes();
        let options = RenderOptions::default();
        let diagnostics = Diagnostics::new();

        let err = Walker::new(&registry, &options, &diagnostics)
            .walk(&sheet)
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownMode { .. }));
    }
}
