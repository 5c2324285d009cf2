//! A small JavaScript-like expression language for `template` and `script`
//! bodies.
//!
//! Templates are the inside of a backtick literal: text with `${expr}`
//! substitutions. Scripts are statement lists whose `return` value, if any,
//! becomes the new data value. Both see three bindings:
//!
//! - `data`: the value threaded through the rule's stages
//! - `el`: the target element, `null` for the global target
//! - `this`: same as `el`, `undefined` for the global target
//!
//! ```
//! use csspipe::dom::parse_document;
//! use csspipe::expr::Template;
//! use serde_json::json;
//!
//! let mut dom = parse_document("<p id=\"x\"></p>");
//! let p = dom.get_by_id("x");
//! let template = Template::compile("${el.id}: ${data.items.join(', ')}").unwrap();
//! let text = template.render(&mut dom, p, &json!({"items": [1, 2]})).unwrap();
//! assert_eq!(text, "x: 1, 2");
//! ```

mod ast;
mod builtins;
mod interp;
mod lexer;
mod parser;
mod value;

use std::rc::Rc;

use thiserror::Error;

pub use builtins::MAX_STRING_LENGTH;
pub use interp::{MAX_CALL_DEPTH, MAX_LOOP_ITERATIONS};
pub use parser::MAX_NESTING_DEPTH;
pub use value::Value;

use crate::dom::{Dom, NodeId};
use interp::{Flow, Interp, Scope};
use parser::Parser;

/// Failure while parsing or evaluating a template or script.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("SyntaxError: {message} (line {line}, column {col})")]
    Syntax {
        message: String,
        line: usize,
        col: usize,
    },

    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("RangeError: {0}")]
    Range(String),

    /// A `throw` statement or a DOM exception.
    #[error("Uncaught {0}")]
    Thrown(String),
}

/// Bind `data`, `el` and `this` in a fresh scope.
fn bindings(data: &serde_json::Value, element: Option<NodeId>) -> (Scope, Value) {
    let scope = Scope::root();
    let (el, this) = match element {
        Some(id) => (Value::Element(id), Value::Element(id)),
        None => (Value::Null, Value::Undefined),
    };
    scope.declare("data", Value::from_json(data), true);
    scope.declare("el", el, true);
    (scope, this)
}

/// A parsed template body.
#[derive(Debug, Clone)]
pub struct Template {
    expr: Rc<ast::Expr>,
}

impl Template {
    pub fn compile(source: &str) -> Result<Self, ExprError> {
        Ok(Self {
            expr: Rc::new(Parser::parse_bare_template(source)?),
        })
    }

    /// Evaluate against `element` (or the global target) and `data`.
    pub fn render(
        &self,
        dom: &mut Dom,
        element: Option<NodeId>,
        data: &serde_json::Value,
    ) -> Result<String, ExprError> {
        let (scope, this) = bindings(data, element);
        let mut interp = Interp::new(dom, this);
        Ok(interp.eval(&self.expr, &scope)?.to_js_string())
    }
}

/// What a script run produced.
#[derive(Debug)]
pub struct ScriptOutcome {
    /// The `return` value, `undefined` if the script did not return.
    pub returned: Value,
    /// The `data` binding after the run.
    pub data: Value,
}

impl ScriptOutcome {
    /// The new data value: the return value if there was one, otherwise the
    /// `data` binding when it no longer matches `input`.
    pub fn next_data(&self, input: &serde_json::Value) -> Option<serde_json::Value> {
        if !matches!(self.returned, Value::Undefined) {
            return self.returned.to_json();
        }
        self.changed_data(input)
    }

    /// The `data` binding, if the script reassigned or mutated it.
    pub fn changed_data(&self, input: &serde_json::Value) -> Option<serde_json::Value> {
        let data = self.data.to_json().unwrap_or(serde_json::Value::Null);
        (data != *input).then_some(data)
    }
}

/// A parsed script body.
#[derive(Debug, Clone)]
pub struct Script {
    body: Rc<Vec<ast::Stmt>>,
}

impl Script {
    pub fn compile(source: &str) -> Result<Self, ExprError> {
        Ok(Self {
            body: Rc::new(Parser::new(source)?.parse_program()?),
        })
    }

    pub fn run(
        &self,
        dom: &mut Dom,
        element: Option<NodeId>,
        data: &serde_json::Value,
    ) -> Result<ScriptOutcome, ExprError> {
        let (scope, this) = bindings(data, element);
        let mut interp = Interp::new(dom, this);
        let returned = match interp.exec_block(&self.body, &scope)? {
            Flow::Return(value) => value,
            Flow::Normal => Value::Undefined,
            Flow::Break | Flow::Continue => {
                return Err(ExprError::Syntax {
                    message: "break or continue outside a loop".into(),
                    line: 0,
                    col: 0,
                });
            }
        };
        Ok(ScriptOutcome {
            returned,
            data: scope.lookup("data").unwrap_or_default(),
        })
    }
}
