//! Structural validation of external payloads
//!
//! A provider declares the shape it expects from its source. The raw JSON is
//! checked against that shape before it is turned into typed structures, and
//! every mismatch is collected so one report names all offending fields.

use crate::error::{PredictionError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use tracing::error;

/// Longest rendering of a received value kept in a diagnostic
const MAX_RENDERED_LEN: usize = 80;

/// Expected shape of a JSON value
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Any JSON number
    Number,
    /// A JSON number without fractional part
    Integer,
    /// A JSON string
    String,
    /// A JSON boolean
    Bool,
    /// The inner shape or `null`
    Nullable(Box<Shape>),
    /// An array whose items all have the inner shape
    Array(Box<Shape>),
    /// An object with declared fields
    Object(ObjectShape),
}

impl Shape {
    /// The inner shape or `null`
    pub fn nullable(inner: Shape) -> Self {
        Shape::Nullable(Box::new(inner))
    }

    /// An array of the inner shape
    pub fn array_of(inner: Shape) -> Self {
        Shape::Array(Box::new(inner))
    }

    /// Human readable description used in diagnostics
    pub fn describe(&self) -> String {
        match self {
            Shape::Number => "number".to_string(),
            Shape::Integer => "integer".to_string(),
            Shape::String => "string".to_string(),
            Shape::Bool => "boolean".to_string(),
            Shape::Nullable(inner) => format!("{} or null", inner.describe()),
            Shape::Array(inner) => format!("array of {}", inner.describe()),
            Shape::Object(_) => "object".to_string(),
        }
    }
}

impl From<ObjectShape> for Shape {
    fn from(object: ObjectShape) -> Self {
        Shape::Object(object)
    }
}

/// One declared field of an object shape
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    shape: Shape,
    required: bool,
}

/// Declared fields of a JSON object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectShape {
    fields: Vec<FieldSpec>,
    deny_unknown: bool,
}

impl ObjectShape {
    /// Create an object shape without fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field that must be present
    pub fn field(mut self, name: &str, shape: impl Into<Shape>) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            shape: shape.into(),
            required: true,
        });
        self
    }

    /// Declare a field that may be absent
    pub fn optional(mut self, name: &str, shape: impl Into<Shape>) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            shape: shape.into(),
            required: false,
        });
        self
    }

    /// Report fields that are not declared
    pub fn deny_unknown_fields(mut self) -> Self {
        self.deny_unknown = true;
        self
    }
}

/// A single field that does not match its declared shape
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    /// Location of the field, e.g. `meta.timezone` or `values[0][3].dcPower`
    pub path: String,
    /// Expected shape
    pub expected: String,
    /// What was received
    pub received: String,
}

/// Every structural mismatch found in one payload
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDrift {
    /// Name of the payload source
    pub source: String,
    /// All offending fields
    pub violations: Vec<FieldViolation>,
}

impl SchemaDrift {
    /// Drift report with a single violation
    pub fn single(
        source: impl Into<String>,
        path: impl Into<String>,
        expected: impl Into<String>,
        received: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            violations: vec![FieldViolation {
                path: path.into(),
                expected: expected.into(),
                received: received.into(),
            }],
        }
    }

    /// Whether the report names the given field path
    pub fn mentions(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

impl fmt::Display for SchemaDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} payload does not match its expected structure ({} field(s))",
            self.source,
            self.violations.len()
        )?;
        for violation in &self.violations {
            write!(
                f,
                "\nField: {}\nExpected: {}\nReceived: {}",
                violation.path, violation.expected, violation.received
            )?;
        }
        Ok(())
    }
}

/// Named structural contract of an external payload
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadSchema {
    name: String,
    root: Shape,
}

impl PayloadSchema {
    /// Create a payload schema
    pub fn new(name: impl Into<String>, root: impl Into<Shape>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Name of the payload source
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check a JSON value, collecting every violation
    pub fn validate(&self, value: &Value) -> std::result::Result<(), SchemaDrift> {
        let mut violations = Vec::new();
        check(&self.root, value, "", &mut violations);

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaDrift {
                source: self.name.clone(),
                violations,
            })
        }
    }

    /// Validate a raw body and deserialize it into the typed payload
    pub fn parse<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            self.report(SchemaDrift::single(
                &self.name,
                "<document>",
                "JSON document",
                e.to_string(),
            ))
        })?;

        self.validate(&value).map_err(|drift| self.report(drift))?;

        serde_json::from_value(value).map_err(|e| {
            self.report(SchemaDrift::single(
                &self.name,
                "<document>",
                "deserializable payload",
                e.to_string(),
            ))
        })
    }

    fn report(&self, drift: SchemaDrift) -> PredictionError {
        error!("{} schema change: {}", self.name, drift);
        PredictionError::SchemaDriftError(drift)
    }
}

fn check(shape: &Shape, value: &Value, path: &str, out: &mut Vec<FieldViolation>) {
    let matches = match shape {
        Shape::Number => value.is_number(),
        Shape::Integer => value.is_i64() || value.is_u64(),
        Shape::String => value.is_string(),
        Shape::Bool => value.is_boolean(),
        Shape::Nullable(inner) => {
            if !value.is_null() {
                check(inner, value, path, out);
            }
            return;
        }
        Shape::Array(inner) => match value {
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    check(inner, item, &format!("{}[{}]", path, i), out);
                }
                return;
            }
            _ => false,
        },
        Shape::Object(object) => match value {
            Value::Object(map) => {
                for field in &object.fields {
                    let field_path = join(path, &field.name);
                    match map.get(&field.name) {
                        Some(field_value) => check(&field.shape, field_value, &field_path, out),
                        None if field.required => out.push(FieldViolation {
                            path: field_path,
                            expected: field.shape.describe(),
                            received: "<missing>".to_string(),
                        }),
                        None => {}
                    }
                }
                if object.deny_unknown {
                    for (key, field_value) in map {
                        if !object.fields.iter().any(|f| &f.name == key) {
                            out.push(FieldViolation {
                                path: join(path, key),
                                expected: "no such field".to_string(),
                                received: render(field_value),
                            });
                        }
                    }
                }
                return;
            }
            _ => false,
        },
    };

    if !matches {
        out.push(FieldViolation {
            path: if path.is_empty() {
                "<document>".to_string()
            } else {
                path.to_string()
            },
            expected: shape.describe(),
            received: render(value),
        });
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn render(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() > MAX_RENDERED_LEN {
        let truncated: String = rendered.chars().take(MAX_RENDERED_LEN).collect();
        format!("{}...", truncated)
    } else {
        rendered
    }
}
