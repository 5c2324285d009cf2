//! Tree-walking evaluator.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use super::ExprError;
use super::ast::*;
use super::builtins;
use super::value::{Function, Value, number_to_string};
use crate::dom::Dom;

/// Loop iterations allowed per evaluation before giving up.
pub const MAX_LOOP_ITERATIONS: u64 = 1_000_000;
/// Nested function calls allowed.
pub const MAX_CALL_DEPTH: usize = 64;

struct Binding {
    value: Value,
    mutable: bool,
}

struct ScopeData {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Scope>,
}

/// A lexical scope. Cloning shares it.
#[derive(Clone)]
pub struct Scope(Rc<ScopeData>);

impl Scope {
    pub fn root() -> Scope {
        Scope(Rc::new(ScopeData {
            vars: RefCell::new(HashMap::new()),
            parent: None,
        }))
    }

    pub fn child(&self) -> Scope {
        Scope(Rc::new(ScopeData {
            vars: RefCell::new(HashMap::new()),
            parent: Some(self.clone()),
        }))
    }

    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.0
            .vars
            .borrow_mut()
            .insert(name.to_string(), Binding { value, mutable });
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(s) = scope {
            if let Some(binding) = s.0.vars.borrow().get(name) {
                return Some(binding.value.clone());
            }
            scope = s.0.parent.as_ref();
        }
        None
    }

    fn assign(&self, name: &str, value: Value) -> Result<(), ExprError> {
        let mut scope = Some(self);
        while let Some(s) = scope {
            if let Some(binding) = s.0.vars.borrow_mut().get_mut(name) {
                if !binding.mutable {
                    return Err(ExprError::Type(format!(
                        "Assignment to constant variable `{name}`"
                    )));
                }
                binding.value = value;
                return Ok(());
            }
            scope = s.0.parent.as_ref();
        }
        Err(ExprError::Reference(name.to_string()))
    }
}

/// How a statement finished.
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

pub struct Interp<'a> {
    pub(super) dom: &'a mut Dom,
    this: Value,
    iterations: u64,
    depth: usize,
}

impl<'a> Interp<'a> {
    pub fn new(dom: &'a mut Dom, this: Value) -> Self {
        Self {
            dom,
            this,
            iterations: 0,
            depth: 0,
        }
    }

    fn tick(&mut self) -> Result<(), ExprError> {
        self.iterations += 1;
        if self.iterations > MAX_LOOP_ITERATIONS {
            return Err(ExprError::Range("loop iteration limit exceeded".into()));
        }
        Ok(())
    }

    // ── statements ──

    pub fn exec_block(&mut self, stmts: &[Stmt], scope: &Scope) -> Result<Flow, ExprError> {
        for stmt in stmts {
            match self.exec(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, scope: &Scope) -> Result<Flow, ExprError> {
        match stmt {
            Stmt::Empty => {}
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
            }
            Stmt::Decl { kind, decls } => {
                for (name, init) in decls {
                    let value = match init {
                        Some(expr) => self.eval(expr, scope)?,
                        None => Value::Undefined,
                    };
                    scope.declare(name, value, *kind != DeclKind::Const);
                }
            }
            Stmt::Block(body) => return self.exec_block(body, &scope.child()),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    return self.exec(consequent, &scope.child());
                } else if let Some(alternate) = alternate {
                    return self.exec(alternate, &scope.child());
                }
            }
            Stmt::ForEach {
                kind,
                name,
                of,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, scope)?;
                let items = if *of {
                    builtins::iterate(self.dom, &iterable)?
                } else {
                    builtins::keys(&iterable).into_iter().map(Value::String).collect()
                };
                for item in items {
                    self.tick()?;
                    let inner = scope.child();
                    match kind {
                        Some(kind) => inner.declare(name, item, *kind != DeclKind::Const),
                        None => scope.assign(name, item)?,
                    }
                    match self.exec(body, &inner)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let outer = scope.child();
                if let Some(init) = init {
                    self.exec(init, &outer)?;
                }
                loop {
                    if let Some(test) = test
                        && !self.eval(test, &outer)?.truthy()
                    {
                        break;
                    }
                    self.tick()?;
                    match self.exec(body, &outer.child())? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &outer)?;
                    }
                }
            }
            Stmt::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    self.tick()?;
                    match self.exec(body, &scope.child())? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Throw(expr) => {
                let value = self.eval(expr, scope)?;
                return Err(ExprError::Thrown(value.to_js_string()));
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    // ── expressions ──

    pub fn eval(&mut self, expr: &Expr, scope: &Scope) -> Result<Value, ExprError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::This => Ok(self.this.clone()),
            Expr::Ident(name) => self.lookup(name, scope),
            Expr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = exprs.get(i) {
                        out.push_str(&self.eval(expr, scope)?.to_js_string());
                    }
                }
                Ok(Value::String(out))
            }
            Expr::Array(items) => Ok(Value::array(self.eval_elements(items, scope)?)),
            Expr::Object(props) => {
                let mut map = IndexMap::new();
                for prop in props {
                    match prop {
                        Property::Named(key, value) => {
                            map.insert(key.clone(), self.eval(value, scope)?);
                        }
                        Property::Computed(key, value) => {
                            let key = property_key(&self.eval(key, scope)?);
                            map.insert(key, self.eval(value, scope)?);
                        }
                        Property::Spread(source) => match self.eval(source, scope)? {
                            Value::Object(source) => {
                                for (k, v) in source.borrow().iter() {
                                    map.insert(k.clone(), v.clone());
                                }
                            }
                            Value::Array(source) => {
                                for (i, v) in source.borrow().iter().enumerate() {
                                    map.insert(i.to_string(), v.clone());
                                }
                            }
                            _ => {}
                        },
                    }
                }
                Ok(Value::object(map))
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let object = self.eval(object, scope)?;
                if *optional && object.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = property_key(&self.eval(property, scope)?);
                builtins::get_property(self.dom, &object, &key)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => self.eval_call(callee, args, *optional, scope),
            Expr::Arrow(arrow) => Ok(Value::Function(Rc::new(Function::Closure {
                arrow: arrow.clone(),
                scope: scope.clone(),
            }))),
            Expr::Unary { op, arg } => {
                // `typeof undeclared` is "undefined", not an error.
                if *op == UnaryOp::Typeof
                    && let Expr::Ident(name) = &**arg
                    && scope.lookup(name).is_none()
                    && builtins::global(self.dom, name).is_none()
                {
                    return Ok(Value::String("undefined".into()));
                }
                let value = self.eval(arg, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Typeof => Value::String(value.type_of().into()),
                })
            }
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let old = self.eval(target, scope)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.assign(target, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Assign { op, target, value } => {
                let value = match op {
                    AssignOp::Assign => self.eval(value, scope)?,
                    AssignOp::Compound(op) => {
                        let current = self.eval(target, scope)?;
                        let rhs = self.eval(value, scope)?;
                        binary(*op, &current, &rhs)?
                    }
                    AssignOp::Nullish => {
                        let current = self.eval(target, scope)?;
                        if !current.is_nullish() {
                            return Ok(current);
                        }
                        self.eval(value, scope)?
                    }
                };
                self.assign(target, value.clone(), scope)?;
                Ok(value)
            }
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
        }
    }

    fn lookup(&self, name: &str, scope: &Scope) -> Result<Value, ExprError> {
        scope
            .lookup(name)
            .or_else(|| builtins::global(self.dom, name))
            .ok_or_else(|| ExprError::Reference(name.to_string()))
    }

    fn assign(&mut self, target: &Expr, value: Value, scope: &Scope) -> Result<(), ExprError> {
        match target {
            Expr::Ident(name) => scope.assign(name, value),
            Expr::Member {
                object, property, ..
            } => {
                let object = self.eval(object, scope)?;
                let key = property_key(&self.eval(property, scope)?);
                builtins::set_property(self.dom, &object, &key, value)
            }
            _ => Err(ExprError::Syntax {
                message: "invalid assignment target".into(),
                line: 0,
                col: 0,
            }),
        }
    }

    fn eval_elements(&mut self, items: &[Element], scope: &Scope) -> Result<Vec<Value>, ExprError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Element::Expr(expr) => out.push(self.eval(expr, scope)?),
                Element::Spread(expr) => {
                    let value = self.eval(expr, scope)?;
                    out.extend(builtins::iterate(self.dom, &value)?);
                }
            }
        }
        Ok(out)
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Element],
        optional: bool,
        scope: &Scope,
    ) -> Result<Value, ExprError> {
        if let Expr::Member {
            object,
            property,
            optional: optional_member,
        } = callee
        {
            let this = self.eval(object, scope)?;
            if *optional_member && this.is_nullish() {
                return Ok(Value::Undefined);
            }
            let key = property_key(&self.eval(property, scope)?);

            // Own function-valued properties take precedence over built-ins.
            let own = match &this {
                Value::Object(map) => map.borrow().get(&key).cloned(),
                _ => None,
            };
            if let Some(func) = own {
                if optional && func.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let args = self.eval_elements(args, scope)?;
                return self.call(&func, args);
            }

            if this.is_nullish() {
                return Err(ExprError::Type(format!(
                    "Cannot read properties of {} (reading '{key}')",
                    this.to_js_string()
                )));
            }
            let args = self.eval_elements(args, scope)?;
            if let Some(result) = builtins::call_method(self, &this, &key, &args)? {
                return Ok(result);
            }
            let func = builtins::get_property(self.dom, &this, &key)?;
            if optional && func.is_nullish() {
                return Ok(Value::Undefined);
            }
            if !matches!(func, Value::Function(_)) {
                return Err(ExprError::Type(format!("{} is not a function", describe_callee(callee))));
            }
            return self.call(&func, args);
        }

        let func = self.eval(callee, scope)?;
        if optional && func.is_nullish() {
            return Ok(Value::Undefined);
        }
        if !matches!(func, Value::Function(_)) {
            return Err(ExprError::Type(format!("{} is not a function", describe_callee(callee))));
        }
        let args = self.eval_elements(args, scope)?;
        self.call(&func, args)
    }

    /// Call a function value.
    pub fn call(&mut self, func: &Value, args: Vec<Value>) -> Result<Value, ExprError> {
        let Value::Function(func) = func else {
            return Err(ExprError::Type(format!(
                "{} is not a function",
                func.to_js_string()
            )));
        };
        match &**func {
            Function::Native(name) => builtins::call_native(self, name, &args),
            Function::Closure { arrow, scope } => {
                if self.depth >= MAX_CALL_DEPTH {
                    return Err(ExprError::Range("Maximum call stack size exceeded".into()));
                }
                let inner = scope.child();
                for (i, param) in arrow.params.iter().enumerate() {
                    inner.declare(param, args.get(i).cloned().unwrap_or_default(), true);
                }
                self.depth += 1;
                let result = match &arrow.body {
                    ArrowBody::Expr(expr) => self.eval(expr, &inner),
                    ArrowBody::Block(body) => self.exec_block(body, &inner).map(|flow| match flow {
                        Flow::Return(value) => value,
                        _ => Value::Undefined,
                    }),
                };
                self.depth -= 1;
                result
            }
        }
    }
}

/// Property key for a computed member.
pub fn property_key(value: &Value) -> String {
    match value {
        Value::Number(n) => number_to_string(*n),
        other => other.to_js_string(),
    }
}

fn describe_callee(callee: &Expr) -> String {
    match callee {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object, property, ..
        } => match &**property {
            Expr::Str(name) => format!("{}.{name}", describe_callee(object)),
            _ => format!("{}[...]", describe_callee(object)),
        },
        Expr::This => "this".into(),
        _ => "expression".into(),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    use BinaryOp::*;
    Ok(match op {
        Add => {
            let numeric = |v: &Value| {
                matches!(
                    v,
                    Value::Number(_) | Value::Bool(_) | Value::Null | Value::Undefined
                )
            };
            if numeric(left) && numeric(right) {
                Value::Number(left.to_number() + right.to_number())
            } else {
                Value::String(left.to_js_string() + &right.to_js_string())
            }
        }
        Sub => Value::Number(left.to_number() - right.to_number()),
        Mul => Value::Number(left.to_number() * right.to_number()),
        Div => Value::Number(left.to_number() / right.to_number()),
        Rem => Value::Number(left.to_number() % right.to_number()),
        Pow => Value::Number(left.to_number().powf(right.to_number())),
        Eq => Value::Bool(left.loose_equals(right)),
        NotEq => Value::Bool(!left.loose_equals(right)),
        StrictEq => Value::Bool(left.strict_equals(right)),
        StrictNotEq => Value::Bool(!left.strict_equals(right)),
        Lt | LtEq | Gt | GtEq => Value::Bool(compare(op, left, right)),
        In => match right {
            Value::Object(map) => Value::Bool(map.borrow().contains_key(&property_key(left))),
            Value::Array(items) => {
                let key = property_key(left);
                Value::Bool(
                    key == "length"
                        || key
                            .parse::<usize>()
                            .is_ok_and(|i| i < items.borrow().len()),
                )
            }
            other => {
                return Err(ExprError::Type(format!(
                    "Cannot use 'in' operator to search for '{}' in {}",
                    left.to_js_string(),
                    other.to_js_string()
                )));
            }
        },
    })
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::LtEq => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (left.to_number(), right.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::LtEq => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}
