//! Compiling style rules into staged renderers.
//!
//! A style rule becomes a [`CompiledRule`] when at least one stage property
//! is present. Stages are compiled in [`Stage`] order; a user-code failure
//! in any of them drops the whole rule.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

use crate::config::RenderOptions;
use crate::css::StyleRule;
use crate::dom::{NodeId, SelectorList};
use crate::error::{Error, Result, UserCodeError};
use crate::property::{PropertyValue, extract};
use crate::registry::{ModeRegistry, Renderer};
use crate::report::{Diagnostic, Diagnostics, Phase};
use crate::stage::Stage;
use crate::target::Target;

/// One stage of a compiled rule.
pub struct CompiledStage {
    stage: Stage,
    mode: String,
    body: String,
    selector: String,
    renderer: Renderer,
    diagnostics: Diagnostics,
}

impl CompiledStage {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Run the renderer against a target with the current data value.
    pub fn run(&self, target: &mut Target<'_>, data: &Value) -> Result<Option<Value>> {
        (self.renderer)(target, data)
    }

    /// Log a failure of this stage's renderer on `target`.
    pub fn log_error(&self, target: Option<String>, error: &UserCodeError) {
        record(
            &self.diagnostics,
            Diagnostic {
                phase: Phase::Execute,
                selector: self.selector.clone(),
                target,
                stage: self.stage,
                mode: self.mode.clone(),
                body: self.body.clone(),
                message: error.detail(),
            },
        );
    }
}

impl fmt::Debug for CompiledStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledStage")
            .field("stage", &self.stage)
            .field("mode", &self.mode)
            .field("body", &self.body)
            .finish()
    }
}

/// What a rule applies to.
#[derive(Debug, Clone)]
pub enum RuleTarget {
    /// Runs once, with no element.
    Global,
    Selectors(SelectorList),
}

/// Identity of a target in a rule's processed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKey {
    Global,
    Element(NodeId),
}

/// A style rule with its stage properties compiled.
#[derive(Debug)]
pub struct CompiledRule {
    selector_text: String,
    target: RuleTarget,
    stages: Vec<CompiledStage>,
    processed: RefCell<HashSet<TargetKey>>,
}

impl CompiledRule {
    pub fn selector_text(&self) -> &str {
        &self.selector_text
    }

    pub fn target(&self) -> &RuleTarget {
        &self.target
    }

    /// Compiled stages in execution order. Absent stages are omitted.
    pub fn stages(&self) -> &[CompiledStage] {
        &self.stages
    }

    pub fn has_stage(&self, stage: Stage) -> bool {
        self.stages.iter().any(|s| s.stage == stage)
    }

    /// Mark `key` processed. Returns `false` if it already was.
    pub fn mark_processed(&self, key: TargetKey) -> bool {
        self.processed.borrow_mut().insert(key)
    }

    pub fn is_processed(&self, key: TargetKey) -> bool {
        self.processed.borrow().contains(&key)
    }

    pub fn processed_count(&self) -> usize {
        self.processed.borrow().len()
    }

    /// Forget every processed target.
    pub fn reset(&self) {
        self.processed.borrow_mut().clear();
    }
}

/// Compile one style rule.
///
/// Returns `Ok(None)` when the rule has no stage properties or when one of
/// them fails to compile as user code (the failure is logged to
/// `diagnostics`). Registry failures are returned as errors.
pub fn compile_rule(
    rule: &StyleRule,
    registry: &ModeRegistry,
    options: &RenderOptions,
    diagnostics: &Diagnostics,
) -> Result<Option<CompiledRule>> {
    let selector_text = rule.selector_text.clone();
    let mut stages = Vec::new();

    for stage in Stage::ALL {
        let Some(property) = stage_property(rule, stage, options) else {
            continue;
        };
        let PropertyValue { mode, body } = property;
        let mode = mode.unwrap_or_else(|| stage.default_mode().to_string());

        let compiler = registry.resolve(stage, Some(&mode))?;
        let renderer = match compiler(&body) {
            Ok(renderer) => renderer,
            Err(Error::UserCode(error)) => {
                record(
                    diagnostics,
                    Diagnostic {
                        phase: Phase::Compile,
                        selector: selector_text,
                        target: None,
                        stage,
                        mode,
                        body,
                        message: error.detail(),
                    },
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        stages.push(CompiledStage {
            stage,
            mode,
            body,
            selector: selector_text.clone(),
            renderer,
            diagnostics: diagnostics.clone(),
        });
    }

    if stages.is_empty() {
        return Ok(None);
    }

    let target = if options.is_global_selector(&selector_text) {
        RuleTarget::Global
    } else {
        RuleTarget::Selectors(rule.selectors.clone())
    };

    log::debug!(
        "compiled `{}` with stages [{}]",
        selector_text,
        stages
            .iter()
            .map(|s| s.stage.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(Some(CompiledRule {
        selector_text,
        target,
        stages,
        processed: RefCell::new(HashSet::new()),
    }))
}

fn stage_property(rule: &StyleRule, stage: Stage, options: &RenderOptions) -> Option<PropertyValue> {
    extract(rule, stage.name()).or_else(|| {
        let legacy = stage.legacy_name().filter(|_| options.legacy_aliases())?;
        extract(rule, legacy)
    })
}

fn record(diagnostics: &Diagnostics, diagnostic: Diagnostic) {
    let on = diagnostic
        .target
        .as_deref()
        .map(|t| format!(" on {t}"))
        .unwrap_or_default();
    log::error!(
        "{} failed for `{}`{} ({} stage, mode {}): {}\n  body: {}",
        diagnostic.phase,
        diagnostic.selector,
        on,
        diagnostic.stage,
        diagnostic.mode,
        diagnostic.message,
        diagnostic.body,
    );
    diagnostics.push(diagnostic);
}
