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

//! Denormalization cost estimator
//!
//! Scores alternative document-store layouts. A schema (declared or inferred
//! from a sample) is sized per document, extrapolated to a collection,
//! distributed over a server fleet and priced per query algorithm. Named
//! strategies are then compared query by query.
//!
//! Every entry point is a pure function of its inputs; nothing here performs
//! I/O or keeps state between calls.

pub mod compare;
pub mod config;
pub mod query;
pub mod schema;
pub mod sharding;
pub mod sizing;

pub use compare::{
    CollectionDefinition, CollectionResult, ComparisonError, ComparisonReport, QueryRanking, QueryResult, RankedStrategy, StorageEntry, StorageRanking, StrategyDefinition,
    StrategyEvaluator, StrategyResult, WorkloadTotal, compare, evaluate_strategies, evaluate_strategies_parallel, evaluate_strategy,
};
pub use config::{ConfigIssue, ConfigurationError, CostRates, EstimatorConfig, PopulationParameters, Topology, ValidatedConfig};
pub use query::{
    AccessAlgorithm, AlgorithmCost, CollectionView, CostEstimate, CostModel, JoinSpec, PlannedQuery, QueryPlanner, QueryQuality, QueryScenario, QuerySpec, estimate_cost,
};
pub use schema::{FieldKind, FieldType, InferenceError, SampleHints, ScalarType, Schema, SchemaError, SchemaField, infer_from_sample, infer_from_sample_with_hints, infer_from_schema};
pub use sharding::{KeySkew, ShardEvaluation, ShardEvaluator, ShardKeySpec, UtilizationRating};
pub use sizing::{
    CollectionProfile, CollectionSizeEstimator, DocumentSizeCalculator, DocumentSizeEstimate, IndexRules, IndexSpec, SizeRules, bytes_to_gb, estimate_collection, estimate_size,
};

/// Errors surfaced by any estimation step
#[derive(Debug, thiserror::Error)]
pub enum EstimatorError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Comparison(#[from] ComparisonError),
}

/// Type alias for estimation results
pub type EstimatorResult<T> = Result<T, EstimatorError>;
