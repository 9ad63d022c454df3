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
use tracing::debug;

use super::{DocumentSizeEstimate, bytes_to_gb};
use crate::config::{ConfigurationError, PopulationParameters};

/// A declared index over one or more fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSpec {
    pub name: String,
    pub fields: Vec<String>,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if fields.is_empty() {
            return Err(ConfigurationError::single(format!("index `{name}`"), "must cover at least one field"));
        }
        Ok(Self { name, fields })
    }

    /// Single-field index named after its field
    pub fn single(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: field.clone(),
            fields: vec![field],
        }
    }

    pub fn is_compound(&self) -> bool {
        self.fields.len() > 1
    }
}

/// Per-entry index costs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRules {
    /// Record pointer and entry bookkeeping
    pub entry_overhead_bytes: u64,
    pub key_bytes_per_field: u64,
}

impl Default for IndexRules {
    fn default() -> Self {
        Self {
            entry_overhead_bytes: 16,
            key_bytes_per_field: 16,
        }
    }
}

impl IndexRules {
    pub fn entry_bytes(&self, index: &IndexSpec) -> u64 {
        self.entry_overhead_bytes + self.key_bytes_per_field * index.fields.len() as u64
    }
}

/// Extrapolated size of one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionProfile {
    pub document_count: u64,
    pub avg_document_bytes: u64,
    pub index_overhead_bytes: u64,
    pub total_bytes: u64,
}

impl CollectionProfile {
    pub fn total_gb(&self) -> f64 {
        bytes_to_gb(self.total_bytes)
    }

    pub fn data_bytes(&self) -> u64 {
        self.document_count.saturating_mul(self.avg_document_bytes)
    }
}

pub struct CollectionSizeEstimator {
    rules: IndexRules,
}

impl CollectionSizeEstimator {
    pub fn new(rules: IndexRules) -> Self {
        Self { rules }
    }

    /// Every document is assumed to have the representative size of
    /// `document`; no size distribution is modelled.
    pub fn estimate(&self, document: &DocumentSizeEstimate, params: &PopulationParameters, indexes: &[IndexSpec]) -> CollectionProfile {
        let document_count = params.document_count;
        let index_overhead_bytes = indexes
            .iter()
            .map(|index| self.rules.entry_bytes(index).saturating_mul(document_count))
            .fold(0u64, u64::saturating_add);
        let total_bytes = document_count.saturating_mul(document.total_bytes).saturating_add(index_overhead_bytes);

        debug!(document_count, avg_document_bytes = document.total_bytes, index_overhead_bytes, total_bytes, "Estimated collection size");
        CollectionProfile {
            document_count,
            avg_document_bytes: document.total_bytes,
            index_overhead_bytes,
            total_bytes,
        }
    }
}

impl Default for CollectionSizeEstimator {
    fn default() -> Self {
        Self::new(IndexRules::default())
    }
}

/// Extrapolate to a full collection under the default [`IndexRules`].
pub fn estimate_collection(document: &DocumentSizeEstimate, params: &PopulationParameters, indexes: &[IndexSpec]) -> CollectionProfile {
    CollectionSizeEstimator::default().estimate(document, params, indexes)
}
