// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Schema Inference Engine
//!
//! Builds a [`Schema`] either from a declared JSON Schema document or from a
//! single representative JSON sample. Single-sample inference marks every
//! present key as required; it cannot detect optional fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::{FieldKind, InferenceError, ScalarType, Schema, SchemaError, SchemaField};
use crate::EstimatorResult;

/// Average length assigned to free-text fields such as `description`
pub const LONG_TEXT_AVERAGE_LENGTH: u32 = 195;

const LONG_TEXT_FIELDS: &[&str] = &["description", "comment"];
const ROOT_PATH: &str = "$";

/// Caller-supplied element kinds for arrays that are empty in the sample,
/// keyed by dotted field path (`stocks`, `product.tags`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleHints {
    pub array_elements: BTreeMap<String, FieldKind>,
}

impl SampleHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_array_element(mut self, path: impl Into<String>, element: FieldKind) -> Self {
        self.array_elements.insert(path.into(), element);
        self
    }

    fn array_element(&self, path: &str) -> Option<&FieldKind> {
        self.array_elements.get(path)
    }
}

/// Build a schema from a JSON Schema document (`type`/`properties`/`required`/`items`).
pub fn infer_from_schema(document: &Value) -> Result<Schema, SchemaError> {
    let root = document.as_object().ok_or_else(|| SchemaError::NotAnObject(ROOT_PATH.to_string()))?;
    let schema = object_from_declaration(root, "")?;
    debug!(fields = schema.len(), "Inferred schema from JSON Schema document");
    Ok(schema)
}

/// Build a schema from one representative JSON document.
pub fn infer_from_sample(sample: &Value) -> EstimatorResult<Schema> {
    infer_from_sample_with_hints(sample, &SampleHints::default())
}

/// Same as [`infer_from_sample`], resolving empty arrays through `hints`.
pub fn infer_from_sample_with_hints(sample: &Value, hints: &SampleHints) -> EstimatorResult<Schema> {
    let root = sample.as_object().ok_or_else(|| SchemaError::NotAnObject(ROOT_PATH.to_string()))?;
    let schema = object_from_sample(root, "", hints)?;
    debug!(fields = schema.len(), "Inferred schema from sample document");
    Ok(schema)
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() { name.to_string() } else { format!("{parent}.{name}") }
}

fn display_path(path: &str) -> String {
    if path.is_empty() { ROOT_PATH.to_string() } else { path.to_string() }
}

fn is_date_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with("date")
}

fn is_long_text_name(name: &str) -> bool {
    LONG_TEXT_FIELDS.contains(&name)
}

fn looks_like_date(value: &str) -> bool {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() || chrono::DateTime::parse_from_rfc3339(value).is_ok()
}

fn finish_field(name: &str, kind: FieldKind) -> SchemaField {
    let field = SchemaField::new(name, kind);
    if is_long_text_name(name) && field.kind == FieldKind::Scalar(ScalarType::String) {
        field.with_average_length(LONG_TEXT_AVERAGE_LENGTH)
    } else {
        field
    }
}

fn object_from_declaration(node: &Map<String, Value>, path: &str) -> Result<Schema, SchemaError> {
    let required: HashSet<&str> = node
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(properties) = node.get("properties") else {
        return Ok(Schema::default());
    };
    let properties = properties.as_object().ok_or_else(|| SchemaError::InvalidAnnotation {
        path: display_path(path),
        reason: "`properties` must be an object".to_string(),
    })?;

    let mut fields = Vec::with_capacity(properties.len());
    for (name, declaration) in properties {
        let field_path = join_path(path, name);
        let declaration = declaration.as_object().ok_or_else(|| SchemaError::NotAnObject(field_path.clone()))?;
        let kind = kind_from_declaration(name, declaration, &field_path)?;

        let mut field = finish_field(name, kind).with_required(required.contains(name.as_str()));
        if let Some(length) = average_length_annotation(declaration, &field_path)? {
            field = field.with_average_length(length);
        }
        fields.push(field);
    }
    Schema::new(fields)
}

fn average_length_annotation(declaration: &Map<String, Value>, path: &str) -> Result<Option<u32>, SchemaError> {
    match declaration.get("averageLength") {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|length| u32::try_from(length).ok())
            .map(Some)
            .ok_or_else(|| SchemaError::InvalidAnnotation {
                path: path.to_string(),
                reason: format!("`averageLength` must be a non-negative integer, got {value}"),
            }),
    }
}

/// Declared type name. A `[T, "null"]` union resolves to `T`; it says the
/// value may be null, not that the key may be absent.
fn declared_type<'a>(declaration: &'a Map<String, Value>, path: &str) -> Result<&'a str, SchemaError> {
    match declaration.get("type") {
        Some(Value::String(name)) => Ok(name.as_str()),
        Some(Value::Array(names)) => {
            let concrete: Vec<&str> = names.iter().filter_map(Value::as_str).filter(|name| *name != "null").collect();
            match concrete.as_slice() {
                [single] => Ok(*single),
                _ => Err(SchemaError::UnsupportedType {
                    path: path.to_string(),
                    declared: concrete.join("|"),
                }),
            }
        }
        Some(other) => Err(SchemaError::UnsupportedType {
            path: path.to_string(),
            declared: other.to_string(),
        }),
        None if declaration.contains_key("properties") => Ok("object"),
        None if declaration.contains_key("items") => Ok("array"),
        None => Err(SchemaError::UnsupportedType {
            path: path.to_string(),
            declared: "<missing>".to_string(),
        }),
    }
}

fn kind_from_declaration(name: &str, declaration: &Map<String, Value>, path: &str) -> Result<FieldKind, SchemaError> {
    let type_name = declared_type(declaration, path)?;
    let format = declaration.get("format").and_then(Value::as_str);

    let kind = match type_name {
        "integer" => FieldKind::Scalar(ScalarType::Integer),
        "number" => FieldKind::Scalar(ScalarType::Float),
        "boolean" => FieldKind::Scalar(ScalarType::Boolean),
        "date" => FieldKind::Scalar(ScalarType::Date),
        "string" => match format {
            Some("date") | Some("date-time") => FieldKind::Scalar(ScalarType::Date),
            Some("objectid") => FieldKind::Scalar(ScalarType::ReferenceId),
            _ if is_date_name(name) => FieldKind::Scalar(ScalarType::Date),
            _ => FieldKind::Scalar(ScalarType::String),
        },
        "object" => FieldKind::Object(object_from_declaration(declaration, path)?),
        "array" => {
            let items = declaration
                .get("items")
                .and_then(Value::as_object)
                .ok_or_else(|| SchemaError::InvalidAnnotation {
                    path: path.to_string(),
                    reason: "array declares no `items` object".to_string(),
                })?;
            FieldKind::Array(Box::new(kind_from_declaration(name, items, path)?))
        }
        other => {
            return Err(SchemaError::UnsupportedType {
                path: path.to_string(),
                declared: other.to_string(),
            });
        }
    };
    Ok(kind)
}

fn object_from_sample(node: &Map<String, Value>, path: &str, hints: &SampleHints) -> EstimatorResult<Schema> {
    let mut fields = Vec::with_capacity(node.len());
    for (name, value) in node {
        let field_path = join_path(path, name);
        let kind = kind_from_sample(name, value, &field_path, hints)?;
        fields.push(finish_field(name, kind));
    }
    Ok(Schema::new(fields)?)
}

fn kind_from_sample(name: &str, value: &Value, path: &str, hints: &SampleHints) -> EstimatorResult<FieldKind> {
    let kind = match value {
        Value::Null => {
            return Err(SchemaError::UnmappableValue {
                path: path.to_string(),
                kind: "null",
            }
            .into());
        }
        Value::Bool(_) => FieldKind::Scalar(ScalarType::Boolean),
        Value::Number(number) if number.is_i64() || number.is_u64() => FieldKind::Scalar(ScalarType::Integer),
        Value::Number(_) => FieldKind::Scalar(ScalarType::Float),
        Value::String(text) if is_date_name(name) || looks_like_date(text) => FieldKind::Scalar(ScalarType::Date),
        Value::String(_) => FieldKind::Scalar(ScalarType::String),
        Value::Array(items) => match items.first() {
            Some(first) => FieldKind::Array(Box::new(kind_from_sample(name, first, path, hints)?)),
            None => {
                let element = hints.array_element(path).cloned().ok_or_else(|| InferenceError::EmptyArray { path: path.to_string() })?;
                FieldKind::Array(Box::new(element))
            }
        },
        Value::Object(map) => FieldKind::Object(object_from_sample(map, path, hints)?),
    };
    Ok(kind)
}
