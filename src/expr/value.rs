//! Runtime values.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Number, Value as Json};

use super::ast::Arrow;
use super::interp::Scope;
use crate::dom::NodeId;

pub type Array = Rc<RefCell<Vec<Value>>>;
pub type Object = Rc<RefCell<IndexMap<String, Value>>>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Array),
    Object(Object),
    /// An element, or the document node.
    Element(NodeId),
    /// `el.dataset`
    Dataset(NodeId),
    /// `el.classList`
    ClassList(NodeId),
    /// A built-in namespace such as `Math` or `JSON`.
    Namespace(&'static str),
    Function(Rc<Function>),
}

pub enum Function {
    Closure { arrow: Rc<Arrow>, scope: Scope },
    /// A built-in, named `Namespace.member` or by its global name.
    Native(String),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(entries: IndexMap<String, Value>) -> Value {
        Value::Object(Rc::new(RefCell::new(entries)))
    }

    pub fn native(name: impl Into<String>) -> Value {
        Value::Function(Rc::new(Function::Native(name.into())))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            _ => "object",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64)
                } else {
                    match s {
                        "Infinity" | "+Infinity" => f64::INFINITY,
                        "-Infinity" => f64::NEG_INFINITY,
                        // Rust also accepts "inf" and "nan"
                        _ if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
                            f64::NAN
                        }
                        _ => s.parse().unwrap_or(f64::NAN),
                    }
                }
            }
            Value::Array(items) => {
                let items = items.borrow();
                match items.as_slice() {
                    [] => 0.0,
                    [only] => only.to_number(),
                    _ => f64::NAN,
                }
            }
            _ => f64::NAN,
        }
    }

    /// String conversion as used by `+`, template substitutions and `String()`.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .borrow()
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) | Value::Namespace(_) => "[object Object]".into(),
            Value::Element(_) => "[object HTMLElement]".into(),
            Value::Dataset(_) => "[object DOMStringMap]".into(),
            Value::ClassList(_) => "[object DOMTokenList]".into(),
            Value::Function(_) => "function () { [native code] }".into(),
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Element(a), Value::Element(b))
            | (Value::Dataset(a), Value::Dataset(b))
            | (Value::ClassList(a), Value::ClassList(b)) => a == b,
            (Value::Namespace(a), Value::Namespace(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::String(_), b) | (b, Value::String(_)) if !b.is_primitive() => {
                self.to_js_string() == other.to_js_string()
            }
            (a, b) if a.is_primitive() || b.is_primitive() => a.to_number() == b.to_number(),
            _ => self.strict_equals(other),
        }
    }

    fn is_primitive(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Number(_) | Value::String(_))
    }

    /// Convert from a data value. Every array and object is a fresh copy.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::array(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to a data value following `JSON.stringify`: `None` for
    /// `undefined` and functions, which are dropped from objects and become
    /// `null` in arrays. Non-finite numbers become `null`.
    pub fn to_json(&self) -> Option<Json> {
        self.to_json_inner(&mut Vec::new())
    }

    fn to_json_inner(&self, seen: &mut Vec<*const ()>) -> Option<Json> {
        Some(match self {
            Value::Undefined | Value::Function(_) => return None,
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if seen.contains(&ptr) {
                    return Some(Json::Null);
                }
                seen.push(ptr);
                let out = items
                    .borrow()
                    .iter()
                    .map(|v| v.to_json_inner(seen).unwrap_or(Json::Null))
                    .collect();
                seen.pop();
                Json::Array(out)
            }
            Value::Object(map) => {
                let ptr = Rc::as_ptr(map) as *const ();
                if seen.contains(&ptr) {
                    return Some(Json::Null);
                }
                seen.push(ptr);
                let out = map
                    .borrow()
                    .iter()
                    .filter_map(|(k, v)| Some((k.clone(), v.to_json_inner(seen)?)))
                    .collect();
                seen.pop();
                Json::Object(out)
            }
            Value::Element(_)
            | Value::Dataset(_)
            | Value::ClassList(_)
            | Value::Namespace(_) => Json::Object(Default::default()),
        })
    }
}

/// Number formatting: integers without a fraction, `NaN`, `Infinity`.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n == 0.0 {
        "0".into()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

fn number_to_json(n: f64) -> Json {
    if !n.is_finite() {
        Json::Null
    } else if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Json::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(Json::Null, Json::Number)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Element(id) => write!(f, "Element({})", id.0),
            Value::Dataset(id) => write!(f, "Dataset({})", id.0),
            Value::ClassList(id) => write!(f, "ClassList({})", id.0),
            Value::Namespace(name) => f.write_str(name),
            Value::Function(func) => match &**func {
                Function::Native(name) => write!(f, "[native {name}]"),
                Function::Closure { arrow, .. } => write!(f, "[arrow ({})]", arrow.params.join(", ")),
            },
            Value::Array(_) | Value::Object(_) => match self.to_json() {
                Some(json) => write!(f, "{json}"),
                None => f.write_str("?"),
            },
            other => f.write_str(&other.to_js_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(2.5), "2.5");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_json_conversion_keeps_integers() {
        let data = json!({"n": 1, "xs": [1.5, null, "a"], "nested": {"ok": true}});
        assert_eq!(Value::from_json(&data).to_json(), Some(data));
    }

    #[test]
    fn test_to_json_follows_stringify() {
        let value = Value::array(vec![Value::Undefined, Value::Number(f64::NAN)]);
        assert_eq!(value.to_json(), Some(json!([null, null])));

        let mut map = IndexMap::new();
        map.insert("gone".to_string(), Value::Undefined);
        map.insert("el".to_string(), Value::Element(NodeId(2)));
        assert_eq!(Value::object(map).to_json(), Some(json!({"el": {}})));
        assert_eq!(Value::Undefined.to_json(), None);
    }

    #[test]
    fn test_self_referencing_array_serializes() {
        let array = Value::array(vec![Value::Number(1.0)]);
        if let Value::Array(items) = &array {
            items.borrow_mut().push(array.clone());
        }
        assert_eq!(array.to_json(), Some(json!([1, null])));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::String(" 42 ".into()).to_number(), 42.0);
        assert!(Value::String("x".into()).to_number().is_nan());
        assert_eq!(
            Value::array(vec![Value::Number(1.0), Value::Null, Value::String("b".into())])
                .to_js_string(),
            "1,,b"
        );
        assert!(!Value::String(String::new()).truthy());
        assert!(Value::array(vec![]).truthy());
    }

    #[test]
    fn test_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
        assert!(Value::Number(1.0).loose_equals(&Value::String("1".into())));
        assert!(Value::Bool(true).loose_equals(&Value::Number(1.0)));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));

        let a = Value::array(vec![]);
        assert!(a.strict_equals(&a.clone()));
        assert!(!a.strict_equals(&Value::array(vec![])));
    }
}
