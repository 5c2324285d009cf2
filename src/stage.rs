//! The fixed, ordered list of rendering stages.

use std::fmt;

use serde::Serialize;

/// One phase of the rendering pipeline.
///
/// The declaration order of the variants is the execution order: a rule's
/// stages are compiled and run as `data`, `prepare`, `body`, `script`
/// regardless of the order their properties appear in the rule body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Data,
    Prepare,
    Body,
    Script,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 4] = [Stage::Data, Stage::Prepare, Stage::Body, Stage::Script];

    /// Stage name, also the custom property suffix (`--data`, `--body`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Stage::Data => "data",
            Stage::Prepare => "prepare",
            Stage::Body => "body",
            Stage::Script => "script",
        }
    }

    /// Mode used when a property value carries no mode identifier.
    pub fn default_mode(self) -> &'static str {
        match self {
            Stage::Data => "json",
            Stage::Prepare => "script",
            Stage::Body => "template",
            Stage::Script => "script",
        }
    }

    /// Older property suffix still honored when the current one is absent.
    pub fn legacy_name(self) -> Option<&'static str> {
        match self {
            Stage::Body => Some("html"),
            Stage::Script => Some("js"),
            Stage::Data | Stage::Prepare => None,
        }
    }

    /// Look a stage up by its current or legacy name.
    pub fn from_name(name: &str) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == name || stage.legacy_name() == Some(name))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_fixed() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
        assert!(Stage::Data < Stage::Prepare);
        assert!(Stage::Body < Stage::Script);
    }

    #[test]
    fn test_defaults_and_legacy_names() {
        assert_eq!(Stage::Data.default_mode(), "json");
        assert_eq!(Stage::Prepare.default_mode(), "script");
        assert_eq!(Stage::Body.default_mode(), "template");
        assert_eq!(Stage::Script.default_mode(), "script");

        assert_eq!(Stage::Data.legacy_name(), None);
        assert_eq!(Stage::Prepare.legacy_name(), None);
        assert_eq!(Stage::Body.legacy_name(), Some("html"));
        assert_eq!(Stage::Script.legacy_name(), Some("js"));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Stage::from_name("body"), Some(Stage::Body));
        assert_eq!(Stage::from_name("html"), Some(Stage::Body));
        assert_eq!(Stage::from_name("js"), Some(Stage::Script));
        assert_eq!(Stage::from_name("style"), None);
    }
}
