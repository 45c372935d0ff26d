// Copyright (c) 2025 - Cowboy AI, Inc.
//! Attribute values
//!
//! [`Value`] mirrors JSON but keeps [`Expr`] leaves unresolved until
//! synthesis, when every reference is rendered for the stack being written.

use std::collections::BTreeMap;

use serde_json::{Map, Number};

use super::expr::{escape_template, Expr, Reference};

/// Attribute value of a declared block
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    Text(Expr),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Static JSON with no references
    Json(serde_json::Value),
    /// Rendered, then serialized to a JSON string (policy documents,
    /// container definitions)
    Encoded(Box<Value>),
}

impl Value {
    /// Build a map value from key/value pairs
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Build a list value
    pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Wrap a value so it is emitted as a JSON-encoded string
    pub fn encoded(value: impl Into<Value>) -> Self {
        Value::Encoded(Box::new(value.into()))
    }

    /// Empty list
    pub fn empty_list() -> Self {
        Value::List(Vec::new())
    }

    /// Look up a key of a map value
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// The expression held by a text value
    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Value::Text(expr) => Some(expr),
            _ => None,
        }
    }

    /// Collect every reference reachable from this value
    pub fn references(&self) -> Vec<&Reference> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references<'a>(&'a self, found: &mut Vec<&'a Reference>) {
        match self {
            Value::Text(expr) => found.extend(expr.references()),
            Value::List(items) => {
                for item in items {
                    item.collect_references(found);
                }
            }
            Value::Map(map) => {
                for value in map.values() {
                    value.collect_references(found);
                }
            }
            Value::Encoded(inner) => inner.collect_references(found),
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::Json(_) => {}
        }
    }

    /// Render to JSON, resolving each reference with `resolve`
    pub fn render<E>(
        &self,
        resolve: &mut dyn FnMut(&Reference) -> Result<String, E>,
    ) -> Result<serde_json::Value, E>
    where
        E: From<serde_json::Error>,
    {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::Text(expr) => serde_json::Value::String(expr.render(resolve)?),
            Value::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| item.render(resolve))
                    .collect::<Result<Vec<_>, E>>()?,
            ),
            Value::Map(map) => {
                let mut rendered = Map::new();
                for (key, value) in map {
                    rendered.insert(key.clone(), value.render(resolve)?);
                }
                serde_json::Value::Object(rendered)
            }
            Value::Json(json) => escape_json(json),
            Value::Encoded(inner) => {
                let rendered = inner.render(resolve)?;
                serde_json::Value::String(serde_json::to_string(&rendered)?)
            }
        })
    }
}

/// Static JSON with every string escaped for the engine's template syntax
fn escape_json(json: &serde_json::Value) -> serde_json::Value {
    match json {
        serde_json::Value::String(text) => serde_json::Value::String(escape_template(text)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(escape_json).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), escape_json(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Number(Number::from(value))
                }
            }
        )*
    };
}

number_from!(u16, u32, u64, i32, i64);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(Expr::literal(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(Expr::literal(value))
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(Expr::literal(value.as_str()))
    }
}

impl From<Expr> for Value {
    fn from(value: Expr) -> Self {
        Value::Text(value)
    }
}

impl From<&Expr> for Value {
    fn from(value: &Expr) -> Self {
        Value::Text(value.clone())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Json(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::list(value)
    }
}

impl From<&BTreeMap<String, String>> for Value {
    fn from(value: &BTreeMap<String, String>) -> Self {
        Value::map(value.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StackId;
    use serde_json::json;

    fn render_local(value: &Value) -> serde_json::Value {
        value
            .render::<serde_json::Error>(&mut |reference| Ok(reference.traversal()))
            .unwrap()
    }

    fn subnet_ref() -> Expr {
        Expr::reference(Reference::new(
            StackId::new("net").unwrap(),
            "aws_subnet.public-0".to_string(),
            "id",
        ))
    }

    #[test]
    fn test_render_nested() {
        let value = Value::map([
            ("enabled", Value::from(true)),
            ("port", Value::from(80u16)),
            ("subnets", Value::list([subnet_ref()])),
            ("missing", Value::from(None::<String>)),
        ]);

        assert_eq!(
            render_local(&value),
            json!({
                "enabled": true,
                "port": 80,
                "subnets": ["${aws_subnet.public-0.id}"],
                "missing": null,
            })
        );
    }

    #[test]
    fn test_encoded_value_is_a_string() {
        let value = Value::encoded(Value::list([Value::map([("image", subnet_ref())])]));
        let rendered = render_local(&value);
        assert_eq!(
            rendered,
            json!("[{\"image\":\"${aws_subnet.public-0.id}\"}]")
        );
    }

    #[test]
    fn test_literal_templates_are_escaped() {
        let value = Value::map([
            ("env", Value::encoded(Value::list([Value::map([("value", "${var.secret}")])]))),
            ("static", Value::from(json!({ "Resource": ["arn:${aws:username}"] }))),
            ("tag", Value::from("%{ if x }")),
        ]);

        assert_eq!(
            render_local(&value),
            json!({
                "env": "[{\"value\":\"$${var.secret}\"}]",
                "static": { "Resource": ["arn:$${aws:username}"] },
                "tag": "%%{ if x }",
            })
        );
    }

    #[test]
    fn test_references_reach_encoded_values() {
        let value = Value::map([
            ("plain", Value::from("x")),
            ("nested", Value::encoded(Value::list([subnet_ref(), subnet_ref()]))),
        ]);
        assert_eq!(value.references().len(), 2);
    }
}
