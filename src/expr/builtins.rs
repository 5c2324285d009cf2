//! Built-in globals, properties and methods.

use indexmap::IndexMap;
use serde::Serialize;

use super::ExprError;
use super::interp::{Interp, MAX_LOOP_ITERATIONS, property_key};
use super::value::{Value, number_to_string};
use crate::dom::{
    BodyValue, Dom, NodeData, NodeId, html_name, matches, parse_selectors, query_selector_all,
    serialize_children, serialize_node, set_body,
};

/// Longest string `repeat` and `padStart`/`padEnd` will build, in bytes.
pub const MAX_STRING_LENGTH: usize = 1 << 24;

/// Resolve a name not bound in any scope.
pub fn global(dom: &Dom, name: &str) -> Option<Value> {
    Some(match name {
        "undefined" => Value::Undefined,
        "NaN" => Value::Number(f64::NAN),
        "Infinity" => Value::Number(f64::INFINITY),
        "document" => Value::Element(dom.document()),
        "Math" => Value::Namespace("Math"),
        "JSON" => Value::Namespace("JSON"),
        "Object" => Value::Namespace("Object"),
        "Array" => Value::Namespace("Array"),
        "console" => Value::Namespace("console"),
        "String" | "Number" | "Boolean" | "parseInt" | "parseFloat" | "isNaN" => {
            Value::native(name)
        }
        _ => return None,
    })
}

// ── properties ──

pub fn get_property(dom: &Dom, object: &Value, key: &str) -> Result<Value, ExprError> {
    Ok(match object {
        Value::Undefined | Value::Null => {
            return Err(ExprError::Type(format!(
                "Cannot read properties of {} (reading '{key}')",
                object.to_js_string()
            )));
        }
        Value::String(s) => match key {
            "length" => Value::Number(s.chars().count() as f64),
            _ => index(key)
                .and_then(|i| s.chars().nth(i))
                .map_or(Value::Undefined, |c| Value::String(c.to_string())),
        },
        Value::Array(items) => {
            let items = items.borrow();
            match key {
                "length" => Value::Number(items.len() as f64),
                _ => index(key)
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default(),
            }
        }
        Value::Object(map) => map.borrow().get(key).cloned().unwrap_or_default(),
        Value::Element(id) => element_property(dom, *id, key),
        Value::Dataset(id) => dom
            .get_attr(*id, &dataset_attr(key))
            .map_or(Value::Undefined, |v| Value::String(v.to_string())),
        Value::ClassList(id) => match key {
            "length" => Value::Number(dom.element_classes(*id).len() as f64),
            "value" => Value::String(dom.get_attr(*id, "class").unwrap_or_default().to_string()),
            _ => index(key)
                .and_then(|i| dom.element_classes(*id).get(i))
                .map_or(Value::Undefined, |c| Value::String(c.clone())),
        },
        Value::Namespace(ns) => match (*ns, key) {
            ("Math", "PI") => Value::Number(std::f64::consts::PI),
            ("Math", "E") => Value::Number(std::f64::consts::E),
            _ => Value::native(format!("{ns}.{key}")),
        },
        Value::Bool(_) | Value::Number(_) | Value::Function(_) => Value::Undefined,
    })
}

fn index(key: &str) -> Option<usize> {
    key.parse().ok()
}

fn element_property(dom: &Dom, id: NodeId, key: &str) -> Value {
    let node = |n: NodeId| {
        if n.is_some() {
            Value::Element(n)
        } else {
            Value::Null
        }
    };
    let string = |s: Option<&str>| Value::String(s.unwrap_or_default().to_string());
    let Some(data) = dom.get(id) else {
        return Value::Undefined;
    };
    let is_document = matches!(data.data, NodeData::Document);

    match key {
        "tagName" | "nodeName" => match dom.element_name(id) {
            Some(name) => Value::String(name.to_string().to_ascii_uppercase()),
            None if is_document => Value::String("#document".into()),
            None => Value::String("#text".into()),
        },
        "localName" => dom
            .element_name(id)
            .map_or(Value::Null, |name| Value::String(name.to_string())),
        "id" => string(dom.element_id(id)),
        "className" => string(dom.get_attr(id, "class")),
        "textContent" => Value::String(dom.text_content(id)),
        "innerHTML" => Value::String(serialize_children(dom, id)),
        "outerHTML" => Value::String(serialize_node(dom, id)),
        "dataset" => Value::Dataset(id),
        "classList" => Value::ClassList(id),
        "children" => Value::array(element_children(dom, id).map(Value::Element).collect()),
        "childElementCount" => Value::Number(element_children(dom, id).count() as f64),
        "firstElementChild" => element_children(dom, id).next().map_or(Value::Null, Value::Element),
        "lastElementChild" => element_children(dom, id).last().map_or(Value::Null, Value::Element),
        "parentElement" => {
            let parent = data.parent;
            if dom.is_element(parent) {
                Value::Element(parent)
            } else {
                Value::Null
            }
        }
        "parentNode" => node(data.parent),
        "nextElementSibling" => sibling_element(dom, id, true),
        "previousElementSibling" => sibling_element(dom, id, false),
        "isConnected" => Value::Bool(dom.is_connected(id)),
        "body" | "head" | "documentElement" if is_document => {
            let tag = if key == "documentElement" { "html" } else { key };
            dom.find_by_tag(tag).map_or(Value::Null, Value::Element)
        }
        _ => Value::Undefined,
    }
}

fn element_children(dom: &Dom, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    dom.children(id).filter(|&c| dom.is_element(c))
}

fn sibling_element(dom: &Dom, id: NodeId, forward: bool) -> Value {
    let step = |n: NodeId| {
        dom.get(n).map_or(NodeId::NONE, |node| {
            if forward {
                node.next_sibling
            } else {
                node.prev_sibling
            }
        })
    };
    let mut current = step(id);
    while current.is_some() {
        if dom.is_element(current) {
            return Value::Element(current);
        }
        current = step(current);
    }
    Value::Null
}

/// `fooBar` to `data-foo-bar`.
fn dataset_attr(key: &str) -> String {
    let mut out = String::from("data-");
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn set_property(dom: &mut Dom, object: &Value, key: &str, value: Value) -> Result<(), ExprError> {
    match object {
        Value::Object(map) => {
            map.borrow_mut().insert(key.to_string(), value);
        }
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            if key == "length" {
                let len = value.to_number();
                if len < 0.0 || len.fract() != 0.0 || len > MAX_LOOP_ITERATIONS as f64 {
                    return Err(ExprError::Range("Invalid array length".into()));
                }
                items.resize(len as usize, Value::Undefined);
            } else if let Some(i) = index(key) {
                if i >= items.len() {
                    let len = i
                        .checked_add(1)
                        .filter(|&len| len as u64 <= MAX_LOOP_ITERATIONS)
                        .ok_or_else(|| ExprError::Range("Invalid array length".into()))?;
                    items.resize(len, Value::Undefined);
                }
                items[i] = value;
            } else {
                return Err(ExprError::Type(format!("cannot set property '{key}' on an array")));
            }
        }
        Value::Element(id) if dom.is_element(*id) => match key {
            "textContent" => dom.set_text_content(*id, &value.to_js_string()),
            "innerHTML" => set_body(dom, *id, BodyValue::Markup(value.to_js_string()))
                .map_err(|e| ExprError::Type(e.to_string()))?,
            "id" => dom.set_attr(*id, "id", &value.to_js_string()),
            "className" => dom.set_attr(*id, "class", &value.to_js_string()),
            _ => {
                return Err(ExprError::Type(format!(
                    "cannot set property '{key}' on an element"
                )));
            }
        },
        Value::Dataset(id) => dom.set_attr(*id, &dataset_attr(key), &value.to_js_string()),
        Value::Undefined | Value::Null => {
            return Err(ExprError::Type(format!(
                "Cannot set properties of {} (setting '{key}')",
                object.to_js_string()
            )));
        }
        other => {
            return Err(ExprError::Type(format!(
                "cannot set property '{key}' on {}",
                other.type_of()
            )));
        }
    }
    Ok(())
}

/// Values produced by `for...of` and spread.
pub fn iterate(dom: &Dom, value: &Value) -> Result<Vec<Value>, ExprError> {
    Ok(match value {
        Value::Array(items) => items.borrow().clone(),
        Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
        Value::ClassList(id) => dom
            .element_classes(*id)
            .iter()
            .map(|c| Value::String(c.clone()))
            .collect(),
        other => {
            return Err(ExprError::Type(format!(
                "{} is not iterable",
                other.to_js_string()
            )));
        }
    })
}

/// Keys produced by `for...in` and `Object.keys`.
pub fn keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => map.borrow().keys().cloned().collect(),
        Value::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
        Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

// ── methods ──

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn arg_string(args: &[Value], i: usize) -> String {
    arg(args, i).to_js_string()
}

/// Relative index as used by `slice` and `at`.
fn relative(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

/// Call a built-in method. `Ok(None)` when `this` has no such method.
pub fn call_method(
    interp: &mut Interp<'_>,
    this: &Value,
    name: &str,
    args: &[Value],
) -> Result<Option<Value>, ExprError> {
    let result = match this {
        Value::String(s) => string_method(s, name, args, interp)?,
        Value::Array(_) => array_method(interp, this, name, args)?,
        Value::Number(n) => number_method(*n, name, args)?,
        Value::Element(id) => element_method(interp, *id, name, args)?,
        Value::ClassList(id) => class_list_method(interp.dom, *id, name, args),
        Value::Object(map) if name == "hasOwnProperty" => Some(Value::Bool(
            map.borrow().contains_key(&property_key(&arg(args, 0))),
        )),
        _ => None,
    };
    if result.is_none() && name == "toString" {
        return Ok(Some(Value::String(this.to_js_string())));
    }
    Ok(result)
}

fn string_method(
    s: &str,
    name: &str,
    args: &[Value],
    interp: &mut Interp<'_>,
) -> Result<Option<Value>, ExprError> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let substring = |start: usize, end: usize| -> String {
        if start >= end {
            String::new()
        } else {
            chars[start..end].iter().collect()
        }
    };
    let char_index = |byte: usize| s[..byte].chars().count();

    Ok(Some(match name {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "trimStart" => Value::String(s.trim_start().to_string()),
        "trimEnd" => Value::String(s.trim_end().to_string()),
        "includes" => Value::Bool(s.contains(&arg_string(args, 0))),
        "startsWith" => Value::Bool(s.starts_with(&arg_string(args, 0))),
        "endsWith" => Value::Bool(s.ends_with(&arg_string(args, 0))),
        "indexOf" => Value::Number(
            s.find(&arg_string(args, 0))
                .map_or(-1.0, |b| char_index(b) as f64),
        ),
        "lastIndexOf" => Value::Number(
            s.rfind(&arg_string(args, 0))
                .map_or(-1.0, |b| char_index(b) as f64),
        ),
        "slice" => {
            let start = relative(&arg(args, 0), len, 0);
            let end = relative(&arg(args, 1), len, len);
            Value::String(substring(start, end))
        }
        "substring" => {
            let clamp = |v: Value, default: usize| match v {
                Value::Undefined => default,
                v => {
                    let n = v.to_number();
                    if n.is_nan() { 0 } else { n.clamp(0.0, len as f64) as usize }
                }
            };
            let a = clamp(arg(args, 0), 0);
            let b = clamp(arg(args, 1), len);
            Value::String(substring(a.min(b), a.max(b)))
        }
        "charAt" => Value::String(
            relative_index(&arg(args, 0), len, false)
                .map(|i| chars[i].to_string())
                .unwrap_or_default(),
        ),
        "at" => relative_index(&arg(args, 0), len, true)
            .map_or(Value::Undefined, |i| Value::String(chars[i].to_string())),
        "split" => {
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Undefined => vec![Value::String(s.to_string())],
                sep => {
                    let sep = sep.to_js_string();
                    if sep.is_empty() {
                        chars.iter().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect()
                    }
                }
            };
            let limit = match arg(args, 1) {
                Value::Undefined => parts.len(),
                n => n.to_number().max(0.0) as usize,
            };
            Value::array(parts.into_iter().take(limit).collect())
        }
        "replace" | "replaceAll" => {
            let pattern = arg_string(args, 0);
            let replacement = arg(args, 1);
            let mut out = String::new();
            let mut rest = s;
            let mut replaced = false;
            while let Some(pos) = rest.find(&pattern) {
                if replaced && name == "replace" {
                    break;
                }
                out.push_str(&rest[..pos]);
                let piece = match &replacement {
                    Value::Function(_) => interp
                        .call(&replacement, vec![Value::String(pattern.clone())])?
                        .to_js_string(),
                    other => other.to_js_string(),
                };
                out.push_str(&piece);
                rest = &rest[pos + pattern.len()..];
                replaced = true;
                if pattern.is_empty() {
                    // An empty pattern matches between every character.
                    let Some(c) = rest.chars().next() else {
                        break;
                    };
                    out.push(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
            out.push_str(rest);
            Value::String(out)
        }
        "repeat" => {
            let n = arg(args, 0).to_number();
            if n < 0.0 || n.is_infinite() {
                return Err(ExprError::Range(format!("Invalid count value: {}", number_to_string(n))));
            }
            let n = if n.is_nan() { 0 } else { n as usize };
            if n.saturating_mul(s.len()) > MAX_STRING_LENGTH {
                return Err(ExprError::Range("Invalid string length".into()));
            }
            Value::String(s.repeat(n))
        }
        "padStart" | "padEnd" => {
            let target = arg(args, 0).to_number();
            if target > MAX_STRING_LENGTH as f64 {
                return Err(ExprError::Range("Invalid string length".into()));
            }
            let target = if target.is_nan() { 0 } else { target.max(0.0) as usize };
            let fill = match arg(args, 1) {
                Value::Undefined => " ".to_string(),
                v => v.to_js_string(),
            };
            if target <= len || fill.is_empty() {
                Value::String(s.to_string())
            } else {
                let pad: String = fill.chars().cycle().take(target - len).collect();
                Value::String(if name == "padStart" {
                    pad + s
                } else {
                    s.to_string() + &pad
                })
            }
        }
        "concat" => Value::String(
            std::iter::once(s.to_string())
                .chain(args.iter().map(Value::to_js_string))
                .collect(),
        ),
        _ => return Ok(None),
    }))
}

fn relative_index(value: &Value, len: usize, allow_negative: bool) -> Option<usize> {
    let n = match value {
        Value::Undefined => 0.0,
        v => v.to_number().trunc(),
    };
    let n = if n.is_nan() { 0.0 } else { n };
    let i = if n < 0.0 && allow_negative { len as f64 + n } else { n };
    (i >= 0.0 && i < len as f64).then_some(i as usize)
}

fn array_method(
    interp: &mut Interp<'_>,
    this: &Value,
    name: &str,
    args: &[Value],
) -> Result<Option<Value>, ExprError> {
    let Value::Array(array) = this else {
        return Ok(None);
    };
    // Callbacks may mutate the array, so they see a snapshot.
    let snapshot = || array.borrow().clone();
    let callback = arg(args, 0);
    let mut each = |interp: &mut Interp<'_>, i: usize, item: &Value| {
        interp.call(
            &callback,
            vec![item.clone(), Value::Number(i as f64), this.clone()],
        )
    };

    Ok(Some(match name {
        "push" => {
            let mut items = array.borrow_mut();
            items.extend(args.iter().cloned());
            Value::Number(items.len() as f64)
        }
        "pop" => array.borrow_mut().pop().unwrap_or_default(),
        "shift" => {
            let mut items = array.borrow_mut();
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        }
        "unshift" => {
            let mut items = array.borrow_mut();
            for (i, value) in args.iter().enumerate() {
                items.insert(i, value.clone());
            }
            Value::Number(items.len() as f64)
        }
        "map" => {
            let mut out = Vec::new();
            for (i, item) in snapshot().iter().enumerate() {
                out.push(each(interp, i, item)?);
            }
            Value::array(out)
        }
        "filter" => {
            let mut out = Vec::new();
            for (i, item) in snapshot().iter().enumerate() {
                if each(interp, i, item)?.truthy() {
                    out.push(item.clone());
                }
            }
            Value::array(out)
        }
        "forEach" => {
            for (i, item) in snapshot().iter().enumerate() {
                each(interp, i, item)?;
            }
            Value::Undefined
        }
        "find" | "findIndex" => {
            let mut found = None;
            for (i, item) in snapshot().iter().enumerate() {
                if each(interp, i, item)?.truthy() {
                    found = Some((i, item.clone()));
                    break;
                }
            }
            match (name, found) {
                ("find", Some((_, item))) => item,
                ("find", None) => Value::Undefined,
                (_, Some((i, _))) => Value::Number(i as f64),
                (_, None) => Value::Number(-1.0),
            }
        }
        "some" => {
            let mut any = false;
            for (i, item) in snapshot().iter().enumerate() {
                if each(interp, i, item)?.truthy() {
                    any = true;
                    break;
                }
            }
            Value::Bool(any)
        }
        "every" => {
            let mut all = true;
            for (i, item) in snapshot().iter().enumerate() {
                if !each(interp, i, item)?.truthy() {
                    all = false;
                    break;
                }
            }
            Value::Bool(all)
        }
        "reduce" => {
            let items = snapshot();
            let mut iter = items.iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match iter.next() {
                    Some((_, first)) => first.clone(),
                    None => {
                        return Err(ExprError::Type(
                            "Reduce of empty array with no initial value".into(),
                        ));
                    }
                },
            };
            for (i, item) in iter {
                acc = interp.call(
                    &callback,
                    vec![acc, item.clone(), Value::Number(i as f64), this.clone()],
                )?;
            }
            acc
        }
        "join" => {
            let sep = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                v => v.to_js_string(),
            };
            Value::String(
                snapshot()
                    .iter()
                    .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                    .collect::<Vec<_>>()
                    .join(&sep),
            )
        }
        "includes" => {
            let needle = arg(args, 0);
            Value::Bool(snapshot().iter().any(|v| {
                v.strict_equals(&needle)
                    || matches!((v, &needle), (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan())
            }))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            Value::Number(
                snapshot()
                    .iter()
                    .position(|v| v.strict_equals(&needle))
                    .map_or(-1.0, |i| i as f64),
            )
        }
        "slice" => {
            let items = snapshot();
            let start = relative(&arg(args, 0), items.len(), 0);
            let end = relative(&arg(args, 1), items.len(), items.len());
            Value::array(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            })
        }
        "at" => {
            let items = snapshot();
            relative_index(&arg(args, 0), items.len(), true)
                .map(|i| items[i].clone())
                .unwrap_or_default()
        }
        "concat" => {
            let mut out = snapshot();
            for value in args {
                match value {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::array(out)
        }
        "reverse" => {
            array.borrow_mut().reverse();
            this.clone()
        }
        "flat" => {
            let depth = match arg(args, 0) {
                Value::Undefined => 1,
                v => v.to_number().max(0.0) as usize,
            };
            Value::array(flatten(snapshot(), depth))
        }
        "sort" => {
            let mut items = snapshot();
            let mut failure = None;
            if matches!(callback, Value::Function(_)) {
                // Insertion sort: the comparator can fail, so no sort_by.
                for i in 1..items.len() {
                    let mut j = i;
                    while j > 0 {
                        let order = interp
                            .call(&callback, vec![items[j - 1].clone(), items[j].clone()])
                            .map(|v| v.to_number());
                        match order {
                            Ok(n) if n > 0.0 => {
                                items.swap(j - 1, j);
                                j -= 1;
                            }
                            Ok(_) => break,
                            Err(e) => {
                                failure = Some(e);
                                break;
                            }
                        }
                    }
                    if failure.is_some() {
                        break;
                    }
                }
            } else {
                // Default order compares string forms; undefined sorts last.
                items.sort_by(|a, b| match (a, b) {
                    (Value::Undefined, Value::Undefined) => std::cmp::Ordering::Equal,
                    (Value::Undefined, _) => std::cmp::Ordering::Greater,
                    (_, Value::Undefined) => std::cmp::Ordering::Less,
                    _ => a.to_js_string().cmp(&b.to_js_string()),
                });
            }
            if let Some(e) = failure {
                return Err(e);
            }
            *array.borrow_mut() = items;
            this.clone()
        }
        _ => return Ok(None),
    }))
}

fn flatten(items: Vec<Value>, depth: usize) -> Vec<Value> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => {
                let inner = inner.borrow().clone();
                out.extend(flatten(inner, depth - 1));
            }
            other => out.push(other),
        }
    }
    out
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Result<Option<Value>, ExprError> {
    Ok(Some(match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0.0 } else { digits };
            if !(0.0..=100.0).contains(&digits) {
                return Err(ExprError::Range(
                    "toFixed() digits argument must be between 0 and 100".into(),
                ));
            }
            if n.is_finite() {
                Value::String(format!("{:.*}", digits as usize, n))
            } else {
                Value::String(number_to_string(n))
            }
        }
        "toString" => Value::String(number_to_string(n)),
        _ => return Ok(None),
    }))
}

fn element_method(
    interp: &mut Interp<'_>,
    id: NodeId,
    name: &str,
    args: &[Value],
) -> Result<Option<Value>, ExprError> {
    let dom = &mut *interp.dom;
    Ok(Some(match name {
        "getAttribute" => dom
            .get_attr(id, &arg_string(args, 0))
            .map_or(Value::Null, |v| Value::String(v.to_string())),
        "hasAttribute" => Value::Bool(dom.get_attr(id, &arg_string(args, 0)).is_some()),
        "setAttribute" => {
            if !dom.is_element(id) {
                return Err(ExprError::Type("setAttribute called on a non-element".into()));
            }
            dom.set_attr(id, &arg_string(args, 0), &arg_string(args, 1));
            Value::Undefined
        }
        "removeAttribute" => {
            dom.remove_attr(id, &arg_string(args, 0));
            Value::Undefined
        }
        "querySelector" | "querySelectorAll" => {
            let selectors = selector_arg(args)?;
            let found = query_selector_all(dom, id, &selectors);
            if name == "querySelector" {
                found.first().map_or(Value::Null, |&n| Value::Element(n))
            } else {
                Value::array(found.into_iter().map(Value::Element).collect())
            }
        }
        "getElementById" => dom
            .get_by_id(&arg_string(args, 0))
            .map_or(Value::Null, Value::Element),
        "matches" => Value::Bool(matches(dom, id, &selector_arg(args)?)),
        "closest" => {
            let selectors = selector_arg(args)?;
            let mut current = id;
            let mut found = Value::Null;
            while current.is_some() {
                if matches(dom, current, &selectors) {
                    found = Value::Element(current);
                    break;
                }
                current = dom.get(current).map_or(NodeId::NONE, |n| n.parent);
            }
            found
        }
        "append" | "appendChild" | "prepend" => {
            let mut inserted = Vec::new();
            for value in args {
                let node = match value {
                    Value::Element(node) => {
                        if dom.is_inclusive_ancestor(*node, id) {
                            return Err(ExprError::Thrown(
                                "HierarchyRequestError: the new child contains the parent".into(),
                            ));
                        }
                        *node
                    }
                    other => dom.create_text(other.to_js_string()),
                };
                inserted.push(node);
            }
            let first = dom.get(id).map_or(NodeId::NONE, |n| n.first_child);
            for &node in &inserted {
                if name == "prepend" && first.is_some() {
                    dom.insert_before(first, node);
                } else {
                    dom.append(id, node);
                }
            }
            if name == "appendChild" {
                inserted.first().map_or(Value::Undefined, |&n| Value::Element(n))
            } else {
                Value::Undefined
            }
        }
        "remove" => {
            dom.detach(id);
            Value::Undefined
        }
        "createElement" => {
            let tag = arg_string(args, 0).to_ascii_lowercase();
            Value::Element(dom.create_element(html_name(&tag), Vec::new()))
        }
        "createTextNode" => Value::Element(dom.create_text(arg_string(args, 0))),
        _ => return Ok(None),
    }))
}

fn selector_arg(args: &[Value]) -> Result<crate::dom::SelectorList, ExprError> {
    let text = arg_string(args, 0);
    parse_selectors(&text).ok_or_else(|| {
        ExprError::Thrown(format!("SyntaxError: '{text}' is not a valid selector"))
    })
}

fn class_list_method(dom: &mut Dom, id: NodeId, name: &str, args: &[Value]) -> Option<Value> {
    let mut classes: Vec<String> = dom.element_classes(id).to_vec();
    let result = match name {
        "contains" => return Some(Value::Bool(classes.contains(&arg_string(args, 0)))),
        "add" => {
            for value in args {
                let class = value.to_js_string();
                if !classes.contains(&class) {
                    classes.push(class);
                }
            }
            Value::Undefined
        }
        "remove" => {
            let remove: Vec<String> = args.iter().map(Value::to_js_string).collect();
            classes.retain(|c| !remove.contains(c));
            Value::Undefined
        }
        "toggle" => {
            let class = arg_string(args, 0);
            let present = classes.contains(&class);
            let want = match args.get(1) {
                Some(force) => force.truthy(),
                None => !present,
            };
            if want && !present {
                classes.push(class);
            } else if !want {
                classes.retain(|c| *c != class);
            }
            Value::Bool(want)
        }
        _ => return None,
    };
    dom.set_attr(id, "class", &classes.join(" "));
    Some(result)
}

// ── global functions ──

pub fn call_native(interp: &mut Interp<'_>, name: &str, args: &[Value]) -> Result<Value, ExprError> {
    let number = |i: usize| arg(args, i).to_number();
    let math = |f: fn(f64) -> f64| Ok(Value::Number(f(number(0))));

    match name {
        "String" => Ok(Value::String(match args.first() {
            Some(v) => v.to_js_string(),
            None => String::new(),
        })),
        "Number" => Ok(Value::Number(args.first().map_or(0.0, Value::to_number))),
        "Boolean" => Ok(Value::Bool(arg(args, 0).truthy())),
        "isNaN" => Ok(Value::Bool(number(0).is_nan())),
        "parseFloat" => Ok(Value::Number(parse_float(&arg_string(args, 0)))),
        "parseInt" => {
            let radix = match arg(args, 1) {
                Value::Undefined => 10,
                v => v.to_number() as u32,
            };
            Ok(Value::Number(parse_int(&arg_string(args, 0), radix)))
        }

        "Math.floor" => math(f64::floor),
        "Math.ceil" => math(f64::ceil),
        "Math.round" => math(|x| (x + 0.5).floor()),
        "Math.trunc" => math(f64::trunc),
        "Math.abs" => math(f64::abs),
        "Math.sqrt" => math(f64::sqrt),
        "Math.sign" => math(|x| if x == 0.0 || x.is_nan() { x } else { x.signum() }),
        "Math.pow" => Ok(Value::Number(number(0).powf(number(1)))),
        "Math.min" => Ok(Value::Number(args.iter().map(Value::to_number).fold(
            f64::INFINITY,
            |a, b| if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) },
        ))),
        "Math.max" => Ok(Value::Number(args.iter().map(Value::to_number).fold(
            f64::NEG_INFINITY,
            |a, b| if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) },
        ))),

        "JSON.stringify" => Ok(match arg(args, 0).to_json() {
            Some(json) => Value::String(stringify(&json, &arg(args, 2))),
            None => Value::Undefined,
        }),
        "JSON.parse" => {
            let text = arg_string(args, 0);
            serde_json::from_str::<serde_json::Value>(&text)
                .map(|json| Value::from_json(&json))
                .map_err(|e| ExprError::Syntax {
                    message: format!("JSON.parse: {e}"),
                    line: e.line(),
                    col: e.column(),
                })
        }

        "Object.keys" => Ok(Value::array(
            keys(&arg(args, 0)).into_iter().map(Value::String).collect(),
        )),
        "Object.values" | "Object.entries" => {
            let object = arg(args, 0);
            let mut out = Vec::new();
            for key in keys(&object) {
                let value = get_property(interp.dom, &object, &key)?;
                out.push(if name == "Object.values" {
                    value
                } else {
                    Value::array(vec![Value::String(key), value])
                });
            }
            Ok(Value::array(out))
        }
        "Object.assign" => {
            let target = arg(args, 0);
            let Value::Object(map) = &target else {
                return Err(ExprError::Type("Object.assign target must be an object".into()));
            };
            for source in &args[1.min(args.len())..] {
                if let Value::Object(source) = source
                    && !std::rc::Rc::ptr_eq(source, map)
                {
                    let entries: IndexMap<String, Value> = source.borrow().clone();
                    map.borrow_mut().extend(entries);
                }
            }
            Ok(target)
        }
        "Array.isArray" => Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_)))),
        "Array.from" => {
            let items = match arg(args, 0) {
                // Array-like `{length: n}`.
                Value::Object(map) => {
                    let len = map.borrow().get("length").map_or(0.0, Value::to_number);
                    if len > MAX_LOOP_ITERATIONS as f64 {
                        return Err(ExprError::Range("Invalid array length".into()));
                    }
                    vec![Value::Undefined; if len > 0.0 { len as usize } else { 0 }]
                }
                other => iterate(interp.dom, &other)?,
            };
            match arg(args, 1) {
                Value::Undefined => Ok(Value::array(items)),
                func => {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.into_iter().enumerate() {
                        out.push(interp.call(&func, vec![item, Value::Number(i as f64)])?);
                    }
                    Ok(Value::array(out))
                }
            }
        }

        "console.log" | "console.info" | "console.warn" | "console.error" | "console.debug" => {
            let line = args
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => format!("{other:?}"),
                })
                .collect::<Vec<_>>()
                .join(" ");
            match name {
                "console.warn" => log::warn!("{line}"),
                "console.error" => log::error!("{line}"),
                "console.debug" => log::debug!("{line}"),
                _ => log::info!("{line}"),
            }
            Ok(Value::Undefined)
        }

        _ => Err(ExprError::Type(format!("{name} is not a function"))),
    }
}

fn stringify(json: &serde_json::Value, indent: &Value) -> String {
    let indent = match indent {
        Value::Number(n) => " ".repeat(n.clamp(0.0, 10.0) as usize),
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    if indent.is_empty() {
        return json.to_string();
    }
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    match json.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(out).unwrap_or_else(|_| json.to_string()),
        Err(_) => json.to_string(),
    }
}

fn parse_float(s: &str) -> f64 {
    let s = s.trim_start();
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = s.as_bytes();
    while end < bytes.len() {
        let c = bytes[end];
        let ok = c.is_ascii_digit()
            || ((c == b'+' || c == b'-') && (end == 0 || matches!(bytes[end - 1], b'e' | b'E')))
            || (c == b'.' && !seen_dot && !seen_exp)
            || ((c == b'e' || c == b'E') && !seen_exp && end > 0);
        if !ok {
            break;
        }
        seen_dot |= c == b'.';
        seen_exp |= c == b'e' || c == b'E';
        end += 1;
    }
    // Back off a dangling exponent or sign.
    let mut candidate = &s[..end];
    while !candidate.is_empty() {
        if let Ok(n) = candidate.parse::<f64>() {
            return n;
        }
        candidate = &candidate[..candidate.len() - 1];
    }
    if s.starts_with("Infinity") || s.starts_with("+Infinity") {
        f64::INFINITY
    } else if s.starts_with("-Infinity") {
        f64::NEG_INFINITY
    } else {
        f64::NAN
    }
}

fn parse_int(s: &str, radix: u32) -> f64 {
    let s = s.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (radix, s) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(rest) if radix == 16 || radix == 10 => (16, rest),
        _ => (radix, s),
    };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let digits: String = s.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let n = digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * radix as f64 + d as f64);
    if negative { -n } else { n }
}
