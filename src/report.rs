//! Diagnostics collected during a render pass.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::stage::Stage;

/// Where a user-code failure was caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Compile,
    Execute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Compile => "compilation",
            Phase::Execute => "execution",
        })
    }
}

/// One logged user-code failure with its rule context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub phase: Phase,
    pub selector: String,
    /// The element being rendered, absent for compile failures and the
    /// global target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub stage: Stage,
    pub mode: String,
    pub body: String,
    pub message: String,
}

/// Shared sink for diagnostics.
///
/// Compiled stages keep a handle so failures found at run time land in the
/// same report as compile failures.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics(Rc<RefCell<Vec<Diagnostic>>>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        self.0.borrow_mut().push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Remove and return everything collected so far.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.0.borrow().clone()
    }
}

/// Counters and diagnostics for one [`Engine::render`](crate::Engine::render)
/// or [`Engine::refresh`](crate::Engine::refresh) call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderReport {
    /// Compiled rules taking part in the pass.
    pub rules: usize,
    /// (rule, target) pairs whose stage chain started.
    pub executions: usize,
    /// Individual stage invocations, including ones that failed.
    pub stage_runs: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl RenderReport {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
