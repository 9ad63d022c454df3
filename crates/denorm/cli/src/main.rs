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

//! Denorm CLI Tool
//!
//! Command-line interface over the denormalization cost estimator.

mod config;
mod report;
mod workload;

use clap::{Args, Parser, Subcommand};
use denorm_core::{
    AccessAlgorithm, CollectionProfile, CollectionView, CostModel, EstimatorConfig, IndexSpec, KeySkew, PopulationParameters, QueryPlanner, QuerySpec, Schema, ShardEvaluator,
    ShardKeySpec, ValidatedConfig, compare, estimate_collection, estimate_size, evaluate_strategies, evaluate_strategies_parallel,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::DenormConfig;
use crate::workload::{Workload, load_sample, load_schema};

#[derive(Parser)]
#[command(name = "denorm")]
#[command(about = "Denorm - storage and query cost estimator for NoSQL layouts")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file (TOML); falls back to $DENORM_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SchemaSource {
    /// JSON Schema document
    #[arg(long)]
    schema: Option<PathBuf>,
    /// Representative JSON document
    #[arg(long)]
    sample: Option<PathBuf>,
}

impl SchemaSource {
    fn load(&self) -> anyhow::Result<Schema> {
        match (&self.schema, &self.sample) {
            (Some(path), _) => load_schema(path),
            (None, Some(path)) => load_sample(path),
            (None, None) => anyhow::bail!("either --schema or --sample is required"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the schema model of a JSON Schema or sample document
    Infer {
        #[command(flatten)]
        source: SchemaSource,
    },
    /// Estimate document and collection size
    Size {
        #[command(flatten)]
        source: SchemaSource,
        /// Number of documents in the collection
        #[arg(long)]
        documents: i64,
        /// Indexed fields, comma separated for a compound index; repeat for several indexes
        #[arg(long = "index")]
        indexes: Vec<String>,
    },
    /// Evaluate a shard key over the server fleet
    Shard {
        /// Number of documents in the collection
        #[arg(long)]
        documents: i64,
        /// Distinct values of the shard key
        #[arg(long)]
        cardinality: i64,
        /// Server count; defaults to the configured fleet
        #[arg(long)]
        servers: Option<i64>,
        /// Shard key name shown in the output
        #[arg(long, default_value = "shard_key")]
        field: String,
        /// Declare the key values as skewed
        #[arg(long, conflicts_with = "hottest_share")]
        skewed: bool,
        /// Share of all documents carried by the most popular key value
        #[arg(long)]
        hottest_share: Option<f64>,
    },
    /// Price one filter query under every applicable access algorithm
    Cost {
        /// Number of documents in the collection
        #[arg(long)]
        documents: i64,
        /// Server count; defaults to the configured fleet
        #[arg(long)]
        servers: Option<i64>,
        /// Matching fraction of the collection
        #[arg(long)]
        selectivity: Option<f64>,
        /// Average document size in bytes
        #[arg(long, default_value_t = 500)]
        document_bytes: u64,
        /// The filter is on the shard key
        #[arg(long)]
        routed: bool,
        /// No index covers the filter field; index lookups are not priced
        #[arg(long)]
        unindexed: bool,
    },
    /// Evaluate and rank the strategies of a TOML workload
    Compare {
        /// Workload file
        #[arg(long)]
        workload: PathBuf,
        /// Evaluate on all cores
        #[arg(long)]
        parallel: bool,
    },
}

fn main() {
    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match DenormConfig::resolve_config(cli.config.clone()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };
    let json = cli.json || config.output.json;

    let result = match cli.command {
        Commands::Infer { source } => handle_infer(&source, json),
        Commands::Size { source, documents, indexes } => handle_size(&config.estimator, &source, documents, &indexes, json),
        Commands::Shard {
            documents,
            cardinality,
            servers,
            field,
            skewed,
            hottest_share,
        } => {
            let skew = match (skewed, hottest_share) {
                (true, _) => KeySkew::Skewed,
                (false, Some(share)) => KeySkew::Popularity { hottest_value_share: share },
                (false, None) => KeySkew::Uniform,
            };
            handle_shard(&config.estimator, ShardKeySpec::new(field, cardinality).with_skew(skew), documents, servers, json)
        }
        Commands::Cost {
            documents,
            servers,
            selectivity,
            document_bytes,
            routed,
            unindexed,
        } => handle_cost(&config.estimator, documents, servers, selectivity, document_bytes, routed, !unindexed, json),
        Commands::Compare { workload, parallel } => handle_compare(&config.estimator, &workload, parallel || config.output.parallel, json),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Validate the configured parameters with command-line overrides applied.
fn validated(base: &EstimatorConfig, documents: i64, servers: Option<i64>) -> anyhow::Result<ValidatedConfig> {
    let config = EstimatorConfig {
        document_count: documents,
        server_count: servers.unwrap_or(base.server_count),
        ..base.clone()
    };
    Ok(config.validate()?)
}

fn handle_infer(source: &SchemaSource, json: bool) -> anyhow::Result<()> {
    let schema = source.load()?;
    info!("Inferred {} top-level fields", schema.len());
    if json {
        print_json(&schema)
    } else {
        print!("{}", report::render_schema(&schema));
        Ok(())
    }
}

fn handle_size(base: &EstimatorConfig, source: &SchemaSource, documents: i64, indexes: &[String], json: bool) -> anyhow::Result<()> {
    let schema = source.load()?;
    let population = validated(base, documents, None)?.population;
    let indexes = indexes
        .iter()
        .map(|fields| IndexSpec::new(fields.clone(), fields.split(',').map(|field| field.trim().to_string()).collect()))
        .collect::<Result<Vec<_>, _>>()?;

    let document = estimate_size(&schema, &population);
    let profile = estimate_collection(&document, &population, &indexes);
    info!("Estimated {} documents of {} bytes", profile.document_count, document.total_bytes);

    if json {
        print_json(&serde_json::json!({ "document": document, "collection": profile }))
    } else {
        print!("{}", report::render_size(&document, &profile));
        Ok(())
    }
}

fn handle_shard(base: &EstimatorConfig, key: ShardKeySpec, documents: i64, servers: Option<i64>, json: bool) -> anyhow::Result<()> {
    let config = validated(base, documents, servers)?;
    let profile = CollectionProfile {
        document_count: config.population.document_count,
        avg_document_bytes: 0,
        index_overhead_bytes: 0,
        total_bytes: 0,
    };
    let evaluation = ShardEvaluator::default().evaluate(&key, &profile, config.topology.server_count as i64)?;

    if json {
        print_json(&evaluation)
    } else {
        print!("{}", report::render_shard(&evaluation));
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_cost(
    base: &EstimatorConfig,
    documents: i64,
    servers: Option<i64>,
    selectivity: Option<f64>,
    document_bytes: u64,
    routed: bool,
    indexed: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = validated(base, documents, servers)?;
    let document_count = config.population.document_count;
    let profile = CollectionProfile {
        document_count,
        avg_document_bytes: document_bytes,
        index_overhead_bytes: 0,
        total_bytes: document_count.saturating_mul(document_bytes),
    };

    // Sharded on a unique key; the filter either hits it or another field
    let key = ShardKeySpec::new("key", document_count as i64);
    let shard = ShardEvaluator::default().evaluate(&key, &profile, config.topology.server_count as i64)?;
    let population = PopulationParameters::new(document_count);
    let filter_field = if routed { "key" } else { "filter" };
    let indexes = if indexed { vec![IndexSpec::single(filter_field)] } else { Vec::new() };
    let view = CollectionView {
        name: "collection",
        profile: &profile,
        population: &population,
        indexes: &indexes,
        shard: Some(&shard),
    };

    let mut spec = QuerySpec::new("query", "collection", AccessAlgorithm::Index).filtered_on(filter_field);
    if let Some(selectivity) = selectivity {
        spec = spec.with_selectivity(selectivity);
    }

    let costs = QueryPlanner::new(config.topology).compare_algorithms(&spec, &view, None, &CostModel::default(), &config.rates)?;
    if json {
        print_json(&costs)
    } else {
        print!("{}", report::render_algorithms(&costs));
        Ok(())
    }
}

fn handle_compare(base: &EstimatorConfig, path: &Path, parallel: bool, json: bool) -> anyhow::Result<()> {
    let workload = Workload::load(path, base)?;
    let topology = workload.config.topology;
    let rates = workload.config.rates;

    let results = if parallel {
        evaluate_strategies_parallel(&workload.strategies, &workload.queries, topology, rates)?
    } else {
        evaluate_strategies(&workload.strategies, &workload.queries, topology, rates)?
    };
    let report = compare(&results, &workload.queries)?;
    info!("Compared {} strategies over {} queries", results.len(), workload.queries.len());

    if json {
        print_json(&serde_json::json!({ "strategies": results, "report": report }))
    } else {
        print!("{}", report::render_comparison(&results, &report));
        Ok(())
    }
}
