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

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use super::ComparisonError;
use crate::config::{ConfigurationError, CostRates, IssueCollector, PopulationParameters, Topology};
use crate::query::{CollectionView, CostEstimate, CostModel, PlannedQuery, QueryPlanner, QueryQuality, QuerySpec};
use crate::schema::Schema;
use crate::sharding::{ShardEvaluation, ShardEvaluator, ShardKeySpec};
use crate::sizing::{CollectionProfile, CollectionSizeEstimator, DocumentSizeCalculator, DocumentSizeEstimate, IndexSpec};
use crate::EstimatorResult;

/// One collection of a candidate layout
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDefinition {
    pub name: String,
    pub schema: Schema,
    pub population: PopulationParameters,
    pub indexes: Vec<IndexSpec>,
    pub shard_key: Option<ShardKeySpec>,
}

impl CollectionDefinition {
    pub fn new(name: impl Into<String>, schema: Schema, population: PopulationParameters) -> Self {
        Self {
            name: name.into(),
            schema,
            population,
            indexes: Vec::new(),
            shard_key: None,
        }
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_shard_key(mut self, shard_key: ShardKeySpec) -> Self {
        self.shard_key = Some(shard_key);
        self
    }

    fn validate(&self, issues: &mut IssueCollector) {
        let fields = self
            .indexes
            .iter()
            .flat_map(|index| index.fields.iter())
            .chain(self.shard_key.as_ref().map(|key| &key.field_path));
        for field in fields {
            if self.schema.resolve_path(field).is_none() {
                issues.push(format!("collections.{}.{field}", self.name), "field is not declared in the collection schema");
            }
        }
    }
}

/// A named candidate layout: the set of collections it would create, plus
/// workload queries rewritten for that layout
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyDefinition {
    pub name: String,
    pub collections: Vec<CollectionDefinition>,
    /// Keyed by workload query name
    pub query_overrides: BTreeMap<String, QuerySpec>,
}

impl StrategyDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: Vec::new(),
            query_overrides: BTreeMap::new(),
        }
    }

    pub fn with_collection(mut self, collection: CollectionDefinition) -> Self {
        self.collections.push(collection);
        self
    }

    /// Replace the workload query of the same name for this strategy only,
    /// e.g. a join that disappears once the inner collection is embedded.
    pub fn with_query_override(mut self, query: QuerySpec) -> Self {
        self.query_overrides.insert(query.name.clone(), query);
        self
    }

    pub fn resolve<'a>(&'a self, query: &'a QuerySpec) -> &'a QuerySpec {
        self.query_overrides.get(&query.name).unwrap_or(query)
    }

    fn validate(&self, queries: &[QuerySpec]) -> Result<(), ConfigurationError> {
        let mut issues = IssueCollector::default();
        let mut seen = HashSet::new();
        for collection in &self.collections {
            if !seen.insert(collection.name.as_str()) {
                issues.push(format!("strategies.{}.collections", self.name), format!("collection `{}` is declared twice", collection.name));
            }
            collection.validate(&mut issues);
        }
        for name in self.query_overrides.keys() {
            if !queries.iter().any(|query| &query.name == name) {
                issues.push(format!("strategies.{}.queries.{name}", self.name), "overrides a query the workload does not define");
            }
        }
        issues.finish(())
    }
}

/// Derived figures for one collection of one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResult {
    pub document_size: DocumentSizeEstimate,
    pub profile: CollectionProfile,
    pub shard: Option<ShardEvaluation>,
    #[serde(skip)]
    population: PopulationParameters,
    #[serde(skip)]
    indexes: Vec<IndexSpec>,
}

impl CollectionResult {
    fn view<'a>(&'a self, name: &'a str) -> CollectionView<'a> {
        CollectionView {
            name,
            profile: &self.profile,
            population: &self.population,
            indexes: &self.indexes,
            shard: self.shard.as_ref(),
        }
    }
}

/// One workload query priced against one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub planned: PlannedQuery,
    pub cost: CostEstimate,
    pub quality: QueryQuality,
}

/// Everything computed for one strategy. Built whole or not at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub name: String,
    pub collections: BTreeMap<String, CollectionResult>,
    pub queries: BTreeMap<String, QueryResult>,
}

impl StrategyResult {
    pub fn profile(&self, collection: &str) -> Option<&CollectionProfile> {
        self.collections.get(collection).map(|result| &result.profile)
    }

    pub fn total_bytes(&self) -> u64 {
        self.collections.values().map(|result| result.profile.total_bytes).fold(0u64, u64::saturating_add)
    }

    pub fn shard_evaluations(&self) -> impl Iterator<Item = (&str, &ShardEvaluation)> {
        self.collections.iter().filter_map(|(name, result)| result.shard.as_ref().map(|shard| (name.as_str(), shard)))
    }
}

/// Runs every estimation step for strategies under one topology and rate set
pub struct StrategyEvaluator {
    topology: Topology,
    rates: CostRates,
    documents: DocumentSizeCalculator,
    collections: CollectionSizeEstimator,
    shards: ShardEvaluator,
    planner: QueryPlanner,
    costs: CostModel,
}

impl StrategyEvaluator {
    pub fn new(topology: Topology, rates: CostRates) -> Result<Self, ConfigurationError> {
        rates.validate()?;
        Ok(Self {
            topology,
            rates,
            documents: DocumentSizeCalculator::default(),
            collections: CollectionSizeEstimator::default(),
            shards: ShardEvaluator::default(),
            planner: QueryPlanner::new(topology),
            costs: CostModel::default(),
        })
    }

    pub fn with_document_sizes(mut self, documents: DocumentSizeCalculator) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_collection_sizes(mut self, collections: CollectionSizeEstimator) -> Self {
        self.collections = collections;
        self
    }

    pub fn with_shard_evaluator(mut self, shards: ShardEvaluator) -> Self {
        self.shards = shards;
        self
    }

    pub fn evaluate(&self, strategy: &StrategyDefinition, queries: &[QuerySpec]) -> EstimatorResult<StrategyResult> {
        check_unique_queries(queries)?;
        strategy.validate(queries)?;
        let collections = self.profile_collections(strategy)?;
        let queries = queries
            .iter()
            .map(|query| Ok((query.name.clone(), self.price_query(&strategy.name, &collections, strategy.resolve(query))?)))
            .collect::<EstimatorResult<BTreeMap<_, _>>>()?;

        info!(strategy = %strategy.name, collections = collections.len(), queries = queries.len(), "Evaluated strategy");
        Ok(StrategyResult {
            name: strategy.name.clone(),
            collections,
            queries,
        })
    }

    /// Size every collection and evaluate its shard key.
    fn profile_collections(&self, strategy: &StrategyDefinition) -> EstimatorResult<BTreeMap<String, CollectionResult>> {
        let mut results = BTreeMap::new();
        for collection in &strategy.collections {
            let document_size = self.documents.estimate(&collection.schema, &collection.population);
            let profile = self.collections.estimate(&document_size, &collection.population, &collection.indexes);
            let shard = collection
                .shard_key
                .as_ref()
                .map(|key| self.shards.evaluate(key, &profile, self.topology.server_count as i64))
                .transpose()?;

            debug!(strategy = %strategy.name, collection = %collection.name, total_bytes = profile.total_bytes, "Profiled collection");
            results.insert(
                collection.name.clone(),
                CollectionResult {
                    document_size,
                    profile,
                    shard,
                    population: collection.population.clone(),
                    indexes: collection.indexes.clone(),
                },
            );
        }
        Ok(results)
    }

    /// Plan and price one query against already profiled collections.
    fn price_query(&self, strategy: &str, collections: &BTreeMap<String, CollectionResult>, query: &QuerySpec) -> EstimatorResult<QueryResult> {
        let lookup = |name: &str| {
            collections.get_key_value(name).map(|(key, result)| result.view(key)).ok_or_else(|| ComparisonError::MissingCollection {
                strategy: strategy.to_string(),
                query: query.name.clone(),
                collection: name.to_string(),
            })
        };

        let target = lookup(&query.collection)?;
        let inner = query.join.as_ref().map(|join| lookup(&join.collection)).transpose()?;

        let planned = self.planner.plan(query, &target, inner.as_ref())?;
        let cost = self.costs.estimate_cost(&planned.scenario, &self.rates)?;
        let quality = QueryQuality::assess(cost.time_ms, planned.scenario.servers_involved);
        Ok(QueryResult { planned, cost, quality })
    }
}

fn check_unique_names(strategies: &[StrategyDefinition]) -> Result<(), ComparisonError> {
    let mut seen = HashSet::new();
    for strategy in strategies {
        if !seen.insert(strategy.name.as_str()) {
            return Err(ComparisonError::DuplicateStrategy(strategy.name.clone()));
        }
    }
    Ok(())
}

/// Results are keyed by query name, so a repeated name would overwrite a cost.
pub(crate) fn check_unique_queries(queries: &[QuerySpec]) -> Result<(), ComparisonError> {
    let mut seen = HashSet::new();
    for query in queries {
        if !seen.insert(query.name.as_str()) {
            return Err(ComparisonError::DuplicateQuery(query.name.clone()));
        }
    }
    Ok(())
}

/// Evaluate one strategy with default size rules.
pub fn evaluate_strategy(strategy: &StrategyDefinition, queries: &[QuerySpec], topology: Topology, rates: CostRates) -> EstimatorResult<StrategyResult> {
    StrategyEvaluator::new(topology, rates)?.evaluate(strategy, queries)
}

/// Evaluate strategies one after another.
pub fn evaluate_strategies(strategies: &[StrategyDefinition], queries: &[QuerySpec], topology: Topology, rates: CostRates) -> EstimatorResult<BTreeMap<String, StrategyResult>> {
    check_unique_names(strategies)?;
    check_unique_queries(queries)?;
    let evaluator = StrategyEvaluator::new(topology, rates)?;
    strategies
        .iter()
        .map(|strategy| Ok((strategy.name.clone(), evaluator.evaluate(strategy, queries)?)))
        .collect()
}

/// Evaluate strategies on the rayon pool, one task per collection set and
/// one per (strategy, query) pair. Results match [`evaluate_strategies`],
/// and so does the error returned when several strategies fail: failures
/// are reported in strategy order, then query order.
pub fn evaluate_strategies_parallel(
    strategies: &[StrategyDefinition],
    queries: &[QuerySpec],
    topology: Topology,
    rates: CostRates,
) -> EstimatorResult<BTreeMap<String, StrategyResult>> {
    check_unique_names(strategies)?;
    check_unique_queries(queries)?;
    let evaluator = StrategyEvaluator::new(topology, rates)?;

    let profiled: Vec<EstimatorResult<BTreeMap<String, CollectionResult>>> = strategies
        .par_iter()
        .map(|strategy| {
            strategy.validate(queries)?;
            evaluator.profile_collections(strategy)
        })
        .collect();

    let pairs: Vec<(usize, usize, &BTreeMap<String, CollectionResult>)> = profiled
        .iter()
        .enumerate()
        .filter_map(|(s, collections)| collections.as_ref().ok().map(|collections| (s, collections)))
        .flat_map(|(s, collections)| (0..queries.len()).map(move |q| (s, q, collections)))
        .collect();
    let priced: Vec<(usize, usize, EstimatorResult<QueryResult>)> = pairs
        .par_iter()
        .map(|&(s, q, collections)| (s, q, evaluator.price_query(&strategies[s].name, collections, strategies[s].resolve(&queries[q]))))
        .collect();

    // Both lists are in (strategy, query) order, as in the sequential walk
    let mut results = BTreeMap::new();
    let mut priced = priced.into_iter().peekable();
    for (s, (strategy, collections)) in strategies.iter().zip(profiled).enumerate() {
        let collections = collections?;
        let mut queries_priced = BTreeMap::new();
        while let Some((_, q, result)) = priced.next_if(|(next, _, _)| *next == s) {
            queries_priced.insert(queries[q].name.clone(), result?);
        }
        results.insert(
            strategy.name.clone(),
            StrategyResult {
                name: strategy.name.clone(),
                collections,
                queries: queries_priced,
            },
        );
    }

    info!(strategies = results.len(), queries = queries.len(), "Evaluated strategies in parallel");
    Ok(results)
}
