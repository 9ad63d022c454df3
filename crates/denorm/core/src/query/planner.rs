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

use super::{AccessAlgorithm, CostEstimate, CostModel, QueryQuality, QueryScenario};
use crate::config::{ConfigurationError, CostRates, PopulationParameters, Topology};
use crate::sharding::ShardEvaluation;
use crate::sizing::{CollectionProfile, IndexSpec};

/// Fraction of documents a filter matches when nothing better is known
pub const DEFAULT_SELECTIVITY: f64 = 0.01;

/// Inner side of a nested-loop join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub collection: String,
    /// Field of the inner collection probed for each outer document
    #[serde(default)]
    pub field: Option<String>,
}

/// A workload query, independent of any strategy's layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub name: String,
    pub collection: String,
    pub algorithm: AccessAlgorithm,
    #[serde(default)]
    pub filter_field: Option<String>,
    /// Matching fraction of the target collection, in [0, 1]
    #[serde(default)]
    pub selectivity: Option<f64>,
    #[serde(default)]
    pub join: Option<JoinSpec>,
}

impl QuerySpec {
    pub fn new(name: impl Into<String>, collection: impl Into<String>, algorithm: AccessAlgorithm) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            algorithm,
            filter_field: None,
            selectivity: None,
            join: None,
        }
    }

    pub fn filtered_on(mut self, field: impl Into<String>) -> Self {
        self.filter_field = Some(field.into());
        self
    }

    pub fn with_selectivity(mut self, selectivity: f64) -> Self {
        self.selectivity = Some(selectivity);
        self
    }

    pub fn joined_with(mut self, collection: impl Into<String>, field: Option<String>) -> Self {
        self.join = Some(JoinSpec {
            collection: collection.into(),
            field,
        });
        self
    }
}

/// What the planner knows about one collection of a strategy
#[derive(Debug, Clone, Copy)]
pub struct CollectionView<'a> {
    pub name: &'a str,
    pub profile: &'a CollectionProfile,
    pub population: &'a PopulationParameters,
    pub indexes: &'a [IndexSpec],
    pub shard: Option<&'a ShardEvaluation>,
}

impl CollectionView<'_> {
    /// Whether some declared index can serve a lookup on `field`, i.e. has
    /// it as its leading field.
    pub fn has_index_on(&self, field: Option<&str>) -> bool {
        field.is_some_and(|field| self.indexes.iter().any(|index| index.fields.first().is_some_and(|leading| leading == field)))
    }

    fn is_sharded_on(&self, field: Option<&str>) -> bool {
        matches!((self.shard, field), (Some(shard), Some(field)) if shard.field_path == field)
    }

    /// Documents held by one server, never below one
    fn docs_per_server(&self, topology: &Topology) -> f64 {
        let per_server = match self.shard {
            Some(shard) => shard.avg_docs_per_server,
            None => self.profile.document_count as f64 / topology.server_count as f64,
        };
        per_server.max(1.0)
    }
}

/// A scenario derived for one strategy, with the result size it produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedQuery {
    pub scenario: QueryScenario,
    pub matching_documents: u64,
    pub output_documents: u64,
    pub output_bytes: u64,
}

/// One row of an algorithm comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmCost {
    pub algorithm: AccessAlgorithm,
    pub planned: PlannedQuery,
    pub cost: CostEstimate,
    pub quality: QueryQuality,
}

/// Derives `docs_scanned` and `servers_involved` for each access algorithm
pub struct QueryPlanner {
    topology: Topology,
}

impl QueryPlanner {
    pub fn new(topology: Topology) -> Self {
        Self { topology }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn plan(&self, spec: &QuerySpec, target: &CollectionView<'_>, inner: Option<&CollectionView<'_>>) -> Result<PlannedQuery, ConfigurationError> {
        self.plan_with(spec.algorithm, spec, target, inner)
    }

    pub fn plan_with(&self, algorithm: AccessAlgorithm, spec: &QuerySpec, target: &CollectionView<'_>, inner: Option<&CollectionView<'_>>) -> Result<PlannedQuery, ConfigurationError> {
        let document_count = target.profile.document_count;
        let matching_documents = self.matching_documents(spec, target)?;

        let fleet = self.topology.server_count;
        let placement = self.placement_servers(target, spec.filter_field.as_deref(), matching_documents);
        let join_field = spec.join.as_ref().and_then(|join| join.field.as_deref());

        let (servers_involved, docs_scanned) = match algorithm {
            AccessAlgorithm::Index => {
                if !target.has_index_on(spec.filter_field.as_deref()) {
                    return Err(ConfigurationError::single(
                        format!("queries.{}.algorithm", spec.name),
                        match spec.filter_field.as_deref() {
                            Some(field) => format!("collection `{}` declares no index leading with `{field}`", target.name),
                            None => "an index lookup needs a filter field".to_string(),
                        },
                    ));
                }
                (1, 1)
            }
            AccessAlgorithm::Shard => (placement, placement),
            AccessAlgorithm::NestedLoop => {
                let resident = self.resident_documents(target, placement);
                let probes = inner.map_or(0, |inner| {
                    let probe = if inner.is_sharded_on(join_field) {
                        inner.docs_per_server(&self.topology).ceil() as u64
                    } else {
                        inner.profile.document_count
                    };
                    matching_documents.saturating_mul(probe)
                });
                (placement, resident.saturating_add(probes))
            }
            AccessAlgorithm::FullScan => {
                let inner_docs = inner.map_or(0, |inner| inner.profile.document_count);
                (fleet, document_count.max(1).saturating_add(inner_docs))
            }
        };

        let output_documents = match inner {
            Some(inner) => matching_documents.saturating_mul(Self::matches_per_probe(inner, join_field)),
            None => matching_documents,
        };
        let output_bytes = output_documents.saturating_mul(target.profile.avg_document_bytes);

        debug!(query = %spec.name, collection = target.name, %algorithm, servers_involved, docs_scanned, "Planned query");
        Ok(PlannedQuery {
            scenario: QueryScenario {
                algorithm,
                collection: target.name.to_string(),
                servers_involved,
                docs_scanned,
            },
            matching_documents,
            output_documents,
            output_bytes,
        })
    }

    /// Plan and price the same query under every access algorithm the
    /// collection supports. Index is left out when no declared index leads
    /// with the filter field.
    pub fn compare_algorithms(
        &self,
        spec: &QuerySpec,
        target: &CollectionView<'_>,
        inner: Option<&CollectionView<'_>>,
        model: &CostModel,
        rates: &CostRates,
    ) -> Result<Vec<AlgorithmCost>, ConfigurationError> {
        AccessAlgorithm::ALL
            .iter()
            .filter(|&&algorithm| algorithm != AccessAlgorithm::Index || target.has_index_on(spec.filter_field.as_deref()))
            .map(|&algorithm| {
                let planned = self.plan_with(algorithm, spec, target, inner)?;
                let cost = model.estimate_cost(&planned.scenario, rates)?;
                let quality = QueryQuality::assess(cost.time_ms, planned.scenario.servers_involved);
                Ok(AlgorithmCost { algorithm, planned, cost, quality })
            })
            .collect()
    }

    /// Documents of `target` matched by the filter, never below one. An
    /// explicit selectivity wins; otherwise one value of the filtered field
    /// is matched, or [`DEFAULT_SELECTIVITY`] when its cardinality is unknown.
    fn matching_documents(&self, spec: &QuerySpec, target: &CollectionView<'_>) -> Result<u64, ConfigurationError> {
        let document_count = target.profile.document_count;
        let cardinality = spec
            .filter_field
            .as_deref()
            .and_then(|field| target.population.cardinality(field))
            .filter(|cardinality| *cardinality > 0);

        let matching = match (spec.selectivity, cardinality) {
            (Some(selectivity), _) if (0.0..=1.0).contains(&selectivity) => (document_count as f64 * selectivity).ceil() as u64,
            (Some(selectivity), _) => {
                return Err(ConfigurationError::single(
                    format!("queries.{}.selectivity", spec.name),
                    format!("must lie in [0, 1], got {selectivity}"),
                ));
            }
            (None, Some(cardinality)) => document_count.div_ceil(cardinality),
            (None, None) => (document_count as f64 * DEFAULT_SELECTIVITY).ceil() as u64,
        };
        Ok(matching.max(1))
    }

    /// Servers holding the documents a filter can reach. A filter on the
    /// shard key is routed; any other filter on a sharded collection reaches
    /// the whole fleet; an unsharded collection lives on one server.
    fn placement_servers(&self, target: &CollectionView<'_>, filter_field: Option<&str>, matching_documents: u64) -> u64 {
        let fleet = self.topology.server_count;
        match target.shard {
            None => 1,
            Some(_) if target.is_sharded_on(filter_field) => {
                let servers = (matching_documents as f64 / target.docs_per_server(&self.topology)).ceil() as u64;
                servers.clamp(1, fleet)
            }
            Some(_) => fleet,
        }
    }

    fn resident_documents(&self, target: &CollectionView<'_>, servers: u64) -> u64 {
        let document_count = target.profile.document_count.max(1);
        if target.shard.is_none() {
            return document_count;
        }
        let resident = (servers as f64 * target.docs_per_server(&self.topology)).ceil() as u64;
        resident.clamp(1, document_count)
    }

    fn matches_per_probe(inner: &CollectionView<'_>, join_field: Option<&str>) -> u64 {
        let cardinality = join_field.and_then(|field| inner.population.cardinality(field)).filter(|c| *c > 0);
        match cardinality {
            Some(cardinality) => inner.profile.document_count.div_ceil(cardinality).max(1),
            None => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharding::{ShardEvaluator, ShardKeySpec};

    fn profile(document_count: u64, avg_document_bytes: u64) -> CollectionProfile {
        CollectionProfile {
            document_count,
            avg_document_bytes,
            index_overhead_bytes: 0,
            total_bytes: document_count * avg_document_bytes,
        }
    }

    fn planner() -> QueryPlanner {
        QueryPlanner::new(Topology::new(1000).unwrap())
    }

    #[test]
    fn test_index_is_single_lookup() {
        let profile = profile(100_000, 200);
        let population = PopulationParameters::new(100_000);
        let indexes = [IndexSpec::single("idp")];
        let view = CollectionView {
            name: "product",
            profile: &profile,
            population: &population,
            indexes: &indexes,
            shard: None,
        };
        let planned = planner().plan(&QuerySpec::new("q1", "product", AccessAlgorithm::Index).filtered_on("idp"), &view, None).unwrap();
        assert_eq!(planned.scenario.servers_involved, 1);
        assert_eq!(planned.scenario.docs_scanned, 1);
        assert_eq!(planned.matching_documents, 1_000);
        assert_eq!(planned.output_bytes, 1_000 * 200);
    }

    #[test]
    fn test_routed_shard_query() {
        let profile = profile(20_000_000, 100);
        let population = PopulationParameters::new(20_000_000).with_cardinality("idp", 100_000);
        let shard = ShardEvaluator::default().evaluate(&ShardKeySpec::new("idp", 100_000), &profile, 1000).unwrap();
        let view = CollectionView {
            name: "stock",
            profile: &profile,
            population: &population,
            indexes: &[],
            shard: Some(&shard),
        };

        let spec = QuerySpec::new("stock_of_product", "stock", AccessAlgorithm::Shard).filtered_on("idp");
        let planned = planner().plan(&spec, &view, None).unwrap();
        // 1 / 100_000 of 20M stocks = 200 documents, all on one server of 20_000
        assert_eq!(planned.matching_documents, 200);
        assert_eq!(planned.scenario.servers_involved, 1);

        let broadcast = planner().plan(&QuerySpec::new("by_quantity", "stock", AccessAlgorithm::Shard).filtered_on("quantity"), &view, None).unwrap();
        assert_eq!(broadcast.scenario.servers_involved, 1000);
    }

    #[test]
    fn test_nested_loop_join_probes() {
        let stock = profile(20_000_000, 100);
        let product = profile(100_000, 300);
        let stock_population = PopulationParameters::new(20_000_000).with_cardinality("idw", 200).with_cardinality("idp", 100_000);
        let product_population = PopulationParameters::new(100_000).with_cardinality("idp", 100_000);

        let stock_shard = ShardEvaluator::default().evaluate(&ShardKeySpec::new("idw", 200), &stock, 1000).unwrap();
        let product_shard = ShardEvaluator::default().evaluate(&ShardKeySpec::new("idp", 100_000), &product, 1000).unwrap();
        let stock_view = CollectionView {
            name: "stock",
            profile: &stock,
            population: &stock_population,
            indexes: &[],
            shard: Some(&stock_shard),
        };
        let product_view = CollectionView {
            name: "product",
            profile: &product,
            population: &product_population,
            indexes: &[],
            shard: Some(&product_shard),
        };

        let spec = QuerySpec::new("q4", "stock", AccessAlgorithm::NestedLoop)
            .filtered_on("idw")
            .joined_with("product", Some("idp".to_string()));
        let routed = planner().plan(&spec, &stock_view, Some(&product_view)).unwrap();
        // 100_000 matching stocks on 5 servers of 20_000, one product probe each
        assert_eq!(routed.matching_documents, 100_000);
        assert_eq!(routed.scenario.servers_involved, 5);
        assert_eq!(routed.scenario.docs_scanned, 100_000 + 100_000 * 100);
        assert_eq!(routed.output_documents, 100_000);

        let unrouted_spec = QuerySpec::new("q4", "stock", AccessAlgorithm::NestedLoop)
            .filtered_on("idw")
            .joined_with("product", Some("name".to_string()));
        let unrouted = planner().plan(&unrouted_spec, &stock_view, Some(&product_view)).unwrap();
        assert!(unrouted.scenario.docs_scanned > routed.scenario.docs_scanned);
    }

    #[test]
    fn test_invalid_selectivity() {
        let profile = profile(10, 10);
        let population = PopulationParameters::new(10);
        let view = CollectionView {
            name: "c",
            profile: &profile,
            population: &population,
            indexes: &[],
            shard: None,
        };
        let spec = QuerySpec::new("bad", "c", AccessAlgorithm::FullScan).with_selectivity(1.5);
        assert!(planner().plan(&spec, &view, None).unwrap_err().has_issue_for("queries.bad.selectivity"));
    }

    #[test]
    fn test_algorithm_time_ordering() {
        let profile = profile(4_000_000_000, 150);
        let population = PopulationParameters::new(4_000_000_000).with_cardinality("idc", 10_000_000);
        let shard = ShardEvaluator::default().evaluate(&ShardKeySpec::new("idc", 10_000_000), &profile, 1000).unwrap();
        let indexes = [IndexSpec::single("idc")];
        let view = CollectionView {
            name: "orderline",
            profile: &profile,
            population: &population,
            indexes: &indexes,
            shard: Some(&shard),
        };
        let spec = QuerySpec::new("orders_of_client", "orderline", AccessAlgorithm::Index).filtered_on("idc");

        let rows = planner().compare_algorithms(&spec, &view, None, &CostModel::default(), &CostRates::default()).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.windows(2).all(|pair| pair[0].cost.time_ms < pair[1].cost.time_ms));
        assert_eq!(rows[0].quality, QueryQuality::Excellent);
        assert_eq!(rows[3].planned.scenario.servers_involved, 1000);
    }

    #[test]
    fn test_index_lookup_needs_leading_index() {
        let profile = profile(20_000_000, 100);
        let population = PopulationParameters::new(20_000_000).with_cardinality("idp", 100_000);
        let compound = [IndexSpec::new("idw_idp", vec!["idw".into(), "idp".into()]).unwrap()];
        let view = CollectionView {
            name: "stock",
            profile: &profile,
            population: &population,
            indexes: &compound,
            shard: None,
        };

        let by_product = QuerySpec::new("by_product", "stock", AccessAlgorithm::Index).filtered_on("idp");
        let err = planner().plan(&by_product, &view, None).unwrap_err();
        assert!(err.has_issue_for("queries.by_product.algorithm"));

        let unfiltered = QuerySpec::new("any", "stock", AccessAlgorithm::Index);
        assert!(planner().plan(&unfiltered, &view, None).unwrap_err().has_issue_for("queries.any.algorithm"));

        let by_warehouse = QuerySpec::new("by_warehouse", "stock", AccessAlgorithm::Index).filtered_on("idw");
        assert_eq!(planner().plan(&by_warehouse, &view, None).unwrap().scenario.docs_scanned, 1);
    }

    #[test]
    fn test_compare_algorithms_skips_unindexed_lookup() {
        let profile = profile(100_000, 200);
        let population = PopulationParameters::new(100_000);
        let view = CollectionView {
            name: "product",
            profile: &profile,
            population: &population,
            indexes: &[],
            shard: None,
        };
        let spec = QuerySpec::new("by_brand", "product", AccessAlgorithm::Index).filtered_on("brand");

        let rows = planner().compare_algorithms(&spec, &view, None, &CostModel::default(), &CostRates::default()).unwrap();
        let algorithms: Vec<AccessAlgorithm> = rows.iter().map(|row| row.algorithm).collect();
        assert_eq!(algorithms, [AccessAlgorithm::Shard, AccessAlgorithm::NestedLoop, AccessAlgorithm::FullScan]);
    }
}
