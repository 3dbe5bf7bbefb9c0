//! Config value writer
//!
//! Serializes a [`Value`] tree into an HCL-style configuration body. Output is
//! deterministic: object fields and map keys are always written in
//! lexicographic order, whatever order they were inserted in.
//!
//! ```text
//! name = "api"
//! subnets = [aws_subnet.a.id, aws_subnet.b.id]
//! listener {
//!   instance_port = 443
//! }
//! tags = {
//!   "Name" = "api"
//! }
//! ```

use crate::error::{CloudError, Result};
use crate::value::{Literal, quote};
use std::collections::{BTreeMap, HashMap};

const INDENT: usize = 2;

/// Value tree handed to the writer
///
/// Callers build deferred values explicitly with [`Value::Literal`]; the
/// writer never guesses whether a string is meant as a reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Number(i64),
    Bool(bool),
    Literal(Literal),
    List(Vec<Value>),
    /// Written as `key = { "k" = v }`
    Map(HashMap<String, Value>),
    /// Written as a nested `key { ... }` block
    Object(HashMap<String, Value>),
}

impl Value {
    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn map<K: Into<String>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn literals(literals: impl IntoIterator<Item = Literal>) -> Self {
        Self::List(literals.into_iter().map(Self::Literal).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Reject values the writer would only emit in part: lists mixing
    /// blocks with inline values, and map entries that are not scalars
    pub fn validate(&self, path: &str) -> Result<()> {
        match self {
            Self::List(items) => {
                let items: Vec<&Value> = items.iter().filter(|v| !v.is_null()).collect();
                let blocks = items.iter().filter(|v| matches!(v, Self::Object(_))).count();
                if blocks > 0 && blocks < items.len() {
                    return Err(invalid(path, "mixes blocks with inline values"));
                }
                if items.iter().any(|v| matches!(v, Self::Map(_))) {
                    return Err(invalid(path, "holds a map inside a list"));
                }
                for (i, item) in items.iter().enumerate() {
                    item.validate(&format!("{}[{}]", path, i))?;
                }
            }
            Self::Object(fields) => {
                for key in sorted_keys(fields) {
                    fields[key].validate(&format!("{}.{}", path, key))?;
                }
            }
            Self::Map(entries) => {
                for key in sorted_keys(entries) {
                    let value = &entries[key];
                    if !value.is_null() && map_value_token(value).is_none() {
                        return Err(invalid(&format!("{}.{}", path, key), "is not a scalar"));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn invalid(path: &str, problem: &str) -> CloudError {
    CloudError::InvalidConfig(format!("{} {}", path, problem))
}

fn sorted_keys(fields: &HashMap<String, Value>) -> Vec<&String> {
    let mut keys: Vec<&String> = fields.keys().collect();
    keys.sort();
    keys
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Literal> for Value {
    fn from(value: Literal) -> Self {
        Self::Literal(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(entries: BTreeMap<String, V>) -> Self {
        Self::map(entries)
    }
}

/// Accumulating config body
#[derive(Debug, Default)]
pub struct Body {
    out: String,
    indent: usize,
}

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `key` with the emission rule for its value type
    pub fn write_value(&mut self, key: &str, value: &Value) {
        match value {
            Value::Null => {}
            Value::List(items) => self.write_list(key, items),
            Value::Object(fields) => self.write_block(key, &[], fields),
            Value::Map(entries) => self.write_map(key, entries),
            scalar => {
                if let Some(token) = inline_token(scalar) {
                    self.write_attribute(key, &token);
                }
            }
        }
    }

    /// Write all fields in lexicographic key order
    pub fn write_fields(&mut self, fields: &HashMap<String, Value>) {
        for key in sorted_keys(fields) {
            self.write_value(key, &fields[key]);
        }
    }

    /// Write a block with quoted labels, e.g. `resource "aws_elb" "api" { ... }`
    pub fn write_block(&mut self, key: &str, labels: &[&str], fields: &HashMap<String, Value>) {
        self.pad(self.indent);
        self.out.push_str(key);
        for label in labels {
            self.out.push(' ');
            self.out.push_str(&quote(label));
        }
        self.out.push_str(" {\n");
        self.indent += INDENT;
        self.write_fields(fields);
        self.indent -= INDENT;
        self.pad(self.indent);
        self.out.push_str("}\n");
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn write_attribute(&mut self, key: &str, token: &str) {
        self.pad(self.indent);
        self.out.push_str(key);
        self.out.push_str(" = ");
        self.out.push_str(token);
        self.out.push('\n');
    }

    fn write_list(&mut self, key: &str, items: &[Value]) {
        let items: Vec<&Value> = items.iter().filter(|v| !v.is_null()).collect();
        let Some(first) = items.first() else {
            return;
        };

        // A list of objects becomes one repeated block per element
        if matches!(first, Value::Object(_)) {
            for item in items {
                match item {
                    Value::Object(fields) => self.write_block(key, &[], fields),
                    other => tracing::warn!("Dropping non-object element {:?} in {}", other, key),
                }
            }
            return;
        }

        let tokens: Vec<String> = items.into_iter().filter_map(inline_token).collect();
        self.write_attribute(key, &format!("[{}]", tokens.join(", ")));
    }

    fn write_map(&mut self, key: &str, entries: &HashMap<String, Value>) {
        let mut rows: Vec<(&str, String)> = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            if v.is_null() {
                continue;
            }
            match map_value_token(v) {
                Some(token) => rows.push((k.as_str(), token)),
                None => tracing::warn!("Dropping nested value for {}.{}", key, k),
            }
        }
        if rows.is_empty() {
            return;
        }
        rows.sort();

        let rows: Vec<(String, String)> = rows.into_iter().map(|(k, v)| (quote(k), v)).collect();
        let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        self.pad(self.indent);
        self.out.push_str(key);
        self.out.push_str(" = {\n");
        for (k, token) in rows {
            self.pad(self.indent + INDENT);
            self.out.push_str(&k);
            self.pad(width - k.len());
            self.out.push_str(" = ");
            self.out.push_str(&token);
            self.out.push('\n');
        }
        self.pad(self.indent);
        self.out.push_str("}\n");
    }

    fn pad(&mut self, width: usize) {
        self.out.extend(std::iter::repeat_n(' ', width));
    }
}

/// Render a value tree as a standalone body
pub fn render_fields(fields: &HashMap<String, Value>) -> String {
    let mut body = Body::new();
    body.write_fields(fields);
    body.into_string()
}

/// Token for a value written inline (attribute or list element)
fn inline_token(value: &Value) -> Option<String> {
    match value {
        Value::Literal(literal) => Some(literal.token()),
        Value::String(s) => Some(quote(s)),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::List(items) => {
            let tokens: Vec<String> = items.iter().filter_map(inline_token).collect();
            Some(format!("[{}]", tokens.join(", ")))
        }
        Value::Null | Value::Map(_) | Value::Object(_) => None,
    }
}

/// Map values: deferred values stay raw, everything else is quoted
fn map_value_token(value: &Value) -> Option<String> {
    match value {
        Value::Literal(literal) => Some(literal.token()),
        Value::List(items) if items.iter().all(|v| matches!(v, Value::Literal(_))) => {
            inline_token(value)
        }
        Value::String(s) => Some(quote(s)),
        Value::Number(n) => Some(quote(&n.to_string())),
        Value::Bool(b) => Some(quote(&b.to_string())),
        _ => None,
    }
}
