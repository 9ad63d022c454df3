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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::PopulationParameters;
use crate::schema::{FieldKind, ScalarType, Schema, SchemaField};

/// Per-type byte costs of a self-describing document format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeRules {
    /// Field name and type tag stored alongside every value
    pub key_overhead: u64,
    pub document_overhead: u64,
    pub embedded_overhead: u64,
    pub integer_bytes: u64,
    pub float_bytes: u64,
    pub boolean_bytes: u64,
    pub date_bytes: u64,
    pub reference_id_bytes: u64,
    pub string_header: u64,
    pub default_string_length: u32,
    pub array_header: u64,
    pub default_array_length: u32,
}

impl Default for SizeRules {
    fn default() -> Self {
        Self {
            key_overhead: 12,
            document_overhead: 5,
            embedded_overhead: 5,
            integer_bytes: 8,
            float_bytes: 8,
            boolean_bytes: 1,
            date_bytes: 20,
            reference_id_bytes: 12,
            string_header: 5,
            default_string_length: 75,
            array_header: 5,
            default_array_length: 2,
        }
    }
}

/// Size of one representative document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSizeEstimate {
    pub total_bytes: u64,
    /// Full contribution of each top-level field, key overhead included
    pub per_field_breakdown: BTreeMap<String, u64>,
}

pub struct DocumentSizeCalculator {
    rules: SizeRules,
}

impl DocumentSizeCalculator {
    pub fn new(rules: SizeRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &SizeRules {
        &self.rules
    }

    pub fn estimate(&self, schema: &Schema, params: &PopulationParameters) -> DocumentSizeEstimate {
        let mut per_field_breakdown = BTreeMap::new();
        let mut total_bytes = self.rules.document_overhead;

        for field in schema.fields() {
            let bytes = self.field_bytes(field, &field.name, params);
            total_bytes = total_bytes.saturating_add(bytes);
            per_field_breakdown.insert(field.name.clone(), bytes);
        }

        debug!(total_bytes, fields = schema.len(), "Estimated document size");
        DocumentSizeEstimate { total_bytes, per_field_breakdown }
    }

    /// Lowest size any document of `schema` can have: the document overhead
    /// plus the key overhead of every top-level field.
    pub fn structural_floor(&self, schema: &Schema) -> u64 {
        self.rules.document_overhead + self.rules.key_overhead * schema.len() as u64
    }

    fn field_bytes(&self, field: &SchemaField, path: &str, params: &PopulationParameters) -> u64 {
        let average_length = params.length_override(path).or(field.average_length);
        self.rules.key_overhead.saturating_add(self.value_bytes(&field.kind, average_length, path, params))
    }

    fn value_bytes(&self, kind: &FieldKind, average_length: Option<u32>, path: &str, params: &PopulationParameters) -> u64 {
        match kind {
            FieldKind::Scalar(ScalarType::String) => self.rules.string_header + u64::from(average_length.unwrap_or(self.rules.default_string_length)),
            FieldKind::Scalar(scalar) => self.scalar_bytes(*scalar),
            FieldKind::Object(schema) => self.rules.embedded_overhead.saturating_add(self.nested_bytes(schema, path, params)),
            FieldKind::Array(element) => {
                let length = u64::from(average_length.unwrap_or(self.rules.default_array_length));
                let element_bytes = self.value_bytes(element, None, path, params);
                self.rules.array_header.saturating_add(length.saturating_mul(element_bytes))
            }
        }
    }

    fn nested_bytes(&self, schema: &Schema, path: &str, params: &PopulationParameters) -> u64 {
        schema
            .fields()
            .iter()
            .map(|field| self.field_bytes(field, &format!("{path}.{}", field.name), params))
            .fold(0u64, u64::saturating_add)
    }

    fn scalar_bytes(&self, scalar: ScalarType) -> u64 {
        match scalar {
            ScalarType::Integer => self.rules.integer_bytes,
            ScalarType::Float => self.rules.float_bytes,
            ScalarType::Boolean => self.rules.boolean_bytes,
            ScalarType::Date => self.rules.date_bytes,
            ScalarType::ReferenceId => self.rules.reference_id_bytes,
            ScalarType::String => self.rules.string_header + u64::from(self.rules.default_string_length),
        }
    }
}

impl Default for DocumentSizeCalculator {
    fn default() -> Self {
        Self::new(SizeRules::default())
    }
}

/// Size one document under the default [`SizeRules`].
pub fn estimate_size(schema: &Schema, params: &PopulationParameters) -> DocumentSizeEstimate {
    DocumentSizeCalculator::default().estimate(schema, params)
}
