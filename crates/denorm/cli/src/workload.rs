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

//! TOML workload files
//!
//! A workload names collection variants once under `[collections.<key>]`,
//! lists the queries under `[[queries]]` and assembles strategies from
//! collection keys. Schema and sample paths are relative to the workload file.

use anyhow::{Context, Result, anyhow, bail};
use denorm_core::{
    CollectionDefinition, ConfigIssue, ConfigurationError, EstimatorConfig, IndexSpec, KeySkew, QuerySpec, Schema, ShardKeySpec, StrategyDefinition, ValidatedConfig, infer_from_sample, infer_from_schema,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadFile {
    /// Replaces the resolved configuration when present
    #[serde(default)]
    pub parameters: Option<EstimatorConfig>,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionEntry>,
    #[serde(default)]
    pub queries: Vec<QuerySpec>,
    #[serde(default)]
    pub strategies: Vec<StrategyEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionEntry {
    /// Collection name inside a strategy; defaults to the entry key
    pub name: Option<String>,
    pub schema: Option<PathBuf>,
    pub sample: Option<PathBuf>,
    #[serde(default)]
    pub document_count: i64,
    #[serde(default)]
    pub field_cardinalities: BTreeMap<String, i64>,
    #[serde(default)]
    pub length_overrides: BTreeMap<String, u32>,
    #[serde(default)]
    pub indexes: Vec<Vec<String>>,
    pub shard_key: Option<ShardKeyEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShardKeyEntry {
    pub field: String,
    /// Taken from `field_cardinalities` when absent
    pub cardinality: Option<i64>,
    #[serde(default)]
    pub skew: KeySkew,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyEntry {
    pub name: String,
    pub collections: Vec<String>,
    #[serde(default)]
    pub queries: Vec<QuerySpec>,
}

/// A workload resolved against the file system and validated
#[derive(Debug)]
pub struct Workload {
    pub config: ValidatedConfig,
    pub strategies: Vec<StrategyDefinition>,
    pub queries: Vec<QuerySpec>,
}

impl Workload {
    pub fn load(path: impl AsRef<Path>, config: &EstimatorConfig) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("failed to read workload {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base_dir, config).with_context(|| format!("invalid workload {}", path.display()))
    }

    pub fn from_toml_str(content: &str, base_dir: &Path, config: &EstimatorConfig) -> Result<Self> {
        let file: WorkloadFile = toml::from_str(content)?;
        let parameters = file.parameters.as_ref().unwrap_or(config);

        // Every invalid parameter and collection is reported in one error
        let mut issues = Vec::new();
        let validated = match parameters.validate() {
            Ok(validated) => Some(validated),
            Err(error) => {
                issues.extend(prefixed("parameters", error));
                None
            }
        };
        let mut definitions = BTreeMap::new();
        for (key, entry) in &file.collections {
            match entry.resolve(key, base_dir) {
                Ok(definition) => {
                    definitions.insert(key.as_str(), definition);
                }
                Err(error) => issues.extend(collection_issues(key, error)),
            }
        }
        let validated = match validated {
            Some(validated) if issues.is_empty() => validated,
            _ => return Err(ConfigurationError { issues }.into()),
        };

        let mut strategies = Vec::with_capacity(file.strategies.len());
        for entry in &file.strategies {
            let mut strategy = StrategyDefinition::new(&entry.name);
            for key in &entry.collections {
                let definition = definitions
                    .get(key.as_str())
                    .ok_or_else(|| anyhow!("strategy `{}` references unknown collection `{key}`", entry.name))?;
                strategy = strategy.with_collection(definition.clone());
            }
            for query in &entry.queries {
                strategy = strategy.with_query_override(query.clone());
            }
            strategies.push(strategy);
        }

        debug!(collections = definitions.len(), strategies = strategies.len(), queries = file.queries.len(), "Loaded workload");
        Ok(Self {
            config: validated,
            strategies,
            queries: file.queries,
        })
    }
}

impl CollectionEntry {
    fn resolve(&self, key: &str, base_dir: &Path) -> Result<CollectionDefinition> {
        let name = self.name.clone().unwrap_or_else(|| key.to_string());
        let schema = match (&self.schema, &self.sample) {
            (Some(path), None) => load_schema(&base_dir.join(path))?,
            (None, Some(path)) => load_sample(&base_dir.join(path))?,
            (Some(_), Some(_)) => bail!("give either `schema` or `sample`, not both"),
            (None, None) => bail!("one of `schema` or `sample` is required"),
        };

        let population_config = EstimatorConfig {
            document_count: self.document_count,
            field_cardinalities: self.field_cardinalities.clone(),
            ..EstimatorConfig::default()
        };
        let mut population = population_config.validate()?.population;
        for (path, length) in &self.length_overrides {
            population = population.with_length_override(path.clone(), *length);
        }

        let mut definition = CollectionDefinition::new(name, schema, population);
        for fields in &self.indexes {
            definition = definition.with_index(IndexSpec::new(fields.join("_"), fields.clone())?);
        }

        if let Some(shard_key) = &self.shard_key {
            let cardinality = match shard_key.cardinality {
                Some(cardinality) => cardinality,
                None => definition
                    .population
                    .cardinality(&shard_key.field)
                    .map(|distinct| distinct as i64)
                    .ok_or_else(|| anyhow!("shard key `{}` needs a cardinality or a field_cardinalities entry", shard_key.field))?,
            };
            definition = definition.with_shard_key(ShardKeySpec::new(shard_key.field.clone(), cardinality).with_skew(shard_key.skew));
        }
        Ok(definition)
    }
}

fn prefixed(scope: &str, error: ConfigurationError) -> impl Iterator<Item = ConfigIssue> + '_ {
    error.issues.into_iter().map(move |issue| ConfigIssue {
        parameter: format!("{scope}.{}", issue.parameter),
        reason: issue.reason,
    })
}

fn collection_issues(key: &str, error: anyhow::Error) -> Vec<ConfigIssue> {
    let scope = format!("collections.{key}");
    match error.downcast::<ConfigurationError>() {
        Ok(error) => prefixed(&scope, error).collect(),
        Err(other) => vec![ConfigIssue {
            parameter: scope,
            reason: format!("{other:#}"),
        }],
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

pub fn load_schema(path: &Path) -> Result<Schema> {
    Ok(infer_from_schema(&read_json(path)?)?)
}

pub fn load_sample(path: &Path) -> Result<Schema> {
    Ok(infer_from_sample(&read_json(path)?)?)
}
