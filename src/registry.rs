//! Mode name to compiler mapping.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::stage::Stage;
use crate::target::Target;

/// A compiled property body, run once per target.
///
/// Returns the new data value, or `None` to leave it unchanged.
pub type Renderer = Rc<dyn Fn(&mut Target<'_>, &Value) -> Result<Option<Value>>>;

/// Turns a property body into a [`Renderer`].
pub type Compiler = Rc<dyn Fn(&str) -> Result<Renderer>>;

#[derive(Default, Clone)]
struct ModeEntry {
    stages: HashMap<Stage, Compiler>,
    fallback: Option<Compiler>,
}

/// Registered modes.
///
/// Built once before the first render and passed by reference to the rule
/// compiler.
#[derive(Default, Clone)]
pub struct ModeRegistry {
    modes: HashMap<String, ModeEntry>,
}

impl ModeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `json`, `template`, `html`, `text` and `script`.
    pub fn with_builtin_modes() -> Self {
        let mut registry = Self::new();
        crate::modes::register_builtin_modes(&mut registry);
        registry
    }

    /// Register `compiler` for `mode`.
    ///
    /// With no stages it becomes the fallback for any stage lacking its own
    /// compiler; otherwise it is bound to exactly `stages`. Registering the
    /// same (mode, stage) again replaces the earlier compiler.
    pub fn register<F>(&mut self, mode: &str, compiler: F, stages: &[Stage])
    where
        F: Fn(&str) -> Result<Renderer> + 'static,
    {
        self.register_rc(mode, Rc::new(compiler), stages);
    }

    pub fn register_rc(&mut self, mode: &str, compiler: Compiler, stages: &[Stage]) {
        let entry = self.modes.entry(mode.to_string()).or_default();
        if stages.is_empty() {
            entry.fallback = Some(compiler);
        } else {
            for &stage in stages {
                entry.stages.insert(stage, compiler.clone());
            }
        }
    }

    /// Find the compiler for `mode` in `stage`, defaulting the mode to the
    /// stage's default.
    pub fn resolve(&self, stage: Stage, mode: Option<&str>) -> Result<Compiler> {
        let mode = mode.unwrap_or(stage.default_mode());
        let entry = self.modes.get(mode).ok_or_else(|| Error::UnknownMode {
            mode: mode.to_string(),
        })?;

        entry
            .stages
            .get(&stage)
            .or(entry.fallback.as_ref())
            .cloned()
            .ok_or_else(|| Error::UnsupportedStage {
                mode: mode.to_string(),
                stage,
            })
    }

    pub fn contains(&self, mode: &str) -> bool {
        self.modes.contains_key(mode)
    }

    /// Registered mode names, sorted.
    pub fn modes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ModeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeRegistry")
            .field("modes", &self.modes())
            .finish()
    }
}

/// Wrap a closure as a [`Renderer`].
pub fn renderer<F>(f: F) -> Renderer
where
    F: Fn(&mut Target<'_>, &Value) -> Result<Option<Value>> + 'static,
{
    Rc::new(f)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dom::Dom;

    fn constant(value: Value) -> impl Fn(&str) -> Result<Renderer> {
        move |_body| {
            let value = value.clone();
            Ok(renderer(move |_, _| Ok(Some(value.clone()))))
        }
    }

    fn run(compiler: &Compiler) -> Option<Value> {
        let mut dom = Dom::new();
        let render = compiler("").unwrap();
        render(&mut Target::global(&mut dom), &json!({})).unwrap()
    }

    #[test]
    fn test_stage_specific_beats_fallback() {
        let mut registry = ModeRegistry::new();
        registry.register("m", constant(json!("fallback")), &[]);
        registry.register("m", constant(json!("body")), &[Stage::Body]);

        let body = registry.resolve(Stage::Body, Some("m")).unwrap();
        let data = registry.resolve(Stage::Data, Some("m")).unwrap();
        assert_eq!(run(&body), Some(json!("body")));
        assert_eq!(run(&data), Some(json!("fallback")));
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = ModeRegistry::new();
        registry.register("m", constant(json!(1)), &[Stage::Data, Stage::Body]);
        registry.register("m", constant(json!(2)), &[Stage::Body]);

        assert_eq!(run(&registry.resolve(Stage::Data, Some("m")).unwrap()), Some(json!(1)));
        assert_eq!(run(&registry.resolve(Stage::Body, Some("m")).unwrap()), Some(json!(2)));
    }

    #[test]
    fn test_mode_defaults_to_stage_default() {
        let mut registry = ModeRegistry::new();
        registry.register("json", constant(json!("json")), &[]);

        assert_eq!(run(&registry.resolve(Stage::Data, None).unwrap()), Some(json!("json")));
        assert!(matches!(
            registry.resolve(Stage::Body, None),
            Err(Error::UnknownMode { mode }) if mode == "template"
        ));
    }

    #[test]
    fn test_unsupported_stage() {
        let mut registry = ModeRegistry::new();
        registry.register("only-body", constant(json!(null)), &[Stage::Body]);

        let err = registry.resolve(Stage::Data, Some("only-body")).err().unwrap();
        assert!(matches!(
            err,
            Error::UnsupportedStage { stage: Stage::Data, .. }
        ));
        assert!(!err.is_user_code());
    }

    #[test]
    fn test_builtin_modes() {
        let registry = ModeRegistry::with_builtin_modes();
        assert_eq!(registry.modes(), ["html", "json", "script", "template", "text"]);
        for stage in Stage::ALL {
            assert!(registry.resolve(stage, None).is_ok());
        }
    }
}
