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

//! Schema Model
//!
//! Typed representation of a document's field structure. A schema is built
//! once by inference and never mutated; a changed layout means inferring a
//! new schema.

pub mod inference;

pub use inference::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Fixed-width and variable-length leaf types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Integer,
    Float,
    String,
    Boolean,
    Date,
    ReferenceId,
}

/// Flat type tag of a field, as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Integer,
    Float,
    String,
    Boolean,
    Date,
    Array,
    EmbeddedObject,
    ReferenceId,
}

impl From<ScalarType> for FieldType {
    fn from(scalar: ScalarType) -> Self {
        match scalar {
            ScalarType::Integer => FieldType::Integer,
            ScalarType::Float => FieldType::Float,
            ScalarType::String => FieldType::String,
            ScalarType::Boolean => FieldType::Boolean,
            ScalarType::Date => FieldType::Date,
            ScalarType::ReferenceId => FieldType::ReferenceId,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Array => "array",
            FieldType::EmbeddedObject => "embedded-object",
            FieldType::ReferenceId => "reference-id",
        };
        f.write_str(name)
    }
}

/// Structural kind of a field.
///
/// Embedded objects own their nested schema; arrays own their element kind,
/// which is itself a scalar, an object or another array. A scalar never
/// carries a nested schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Scalar(ScalarType),
    Object(Schema),
    Array(Box<FieldKind>),
}

impl FieldKind {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldKind::Scalar(scalar) => (*scalar).into(),
            FieldKind::Object(_) => FieldType::EmbeddedObject,
            FieldKind::Array(_) => FieldType::Array,
        }
    }

    /// Schema of an embedded object or of the objects held by an array
    pub fn nested_schema(&self) -> Option<&Schema> {
        match self {
            FieldKind::Scalar(_) => None,
            FieldKind::Object(schema) => Some(schema),
            FieldKind::Array(element) => element.nested_schema(),
        }
    }
}

/// One named field of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    /// Statistical average length for strings (bytes) and arrays (elements)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_length: Option<u32>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            average_length: None,
        }
    }

    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldKind::Scalar(scalar))
    }

    pub fn object(name: impl Into<String>, schema: Schema) -> Self {
        Self::new(name, FieldKind::Object(schema))
    }

    pub fn array(name: impl Into<String>, element: FieldKind) -> Self {
        Self::new(name, FieldKind::Array(Box::new(element)))
    }

    pub fn with_average_length(mut self, average_length: u32) -> Self {
        self.average_length = Some(average_length);
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }

    pub fn nested_schema(&self) -> Option<&Schema> {
        self.kind.nested_schema()
    }
}

/// Ordered, name-unique sequence of fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SchemaField>", into = "Vec<SchemaField>")]
pub struct Schema {
    fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new(fields: Vec<SchemaField>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Resolve a dotted path such as `product.brand` or `stocks.idw`,
    /// stepping through embedded objects and arrays of objects.
    pub fn resolve_path(&self, path: &str) -> Option<&SchemaField> {
        let mut segments = path.split('.');
        let mut field = self.get(segments.next()?)?;
        for segment in segments {
            field = field.nested_schema()?.get(segment)?;
        }
        Some(field)
    }
}

impl TryFrom<Vec<SchemaField>> for Schema {
    type Error = SchemaError;

    fn try_from(fields: Vec<SchemaField>) -> Result<Self, Self::Error> {
        Schema::new(fields)
    }
}

impl From<Schema> for Vec<SchemaField> {
    fn from(schema: Schema) -> Self {
        schema.fields
    }
}

/// Malformed or unsupported schema or sample
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Unsupported type `{declared}` at `{path}`")]
    UnsupportedType { path: String, declared: String },

    #[error("Sample value at `{path}` is {kind}, which maps to no field type")]
    UnmappableValue { path: String, kind: &'static str },

    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    #[error("Expected an object at `{0}`")]
    NotAnObject(String),

    #[error("Invalid schema annotation at `{path}`: {reason}")]
    InvalidAnnotation { path: String, reason: String },
}

/// Sample insufficient to infer a required detail
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("Cannot infer element type of empty array `{path}` without a type hint")]
    EmptyArray { path: String },
}
