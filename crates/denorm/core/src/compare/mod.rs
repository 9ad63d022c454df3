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

//! Strategy comparison
//!
//! Evaluates named denormalization strategies against one workload and ranks
//! them per query by time, then price, then name. Justifications only format
//! figures already present in the evaluated results.

pub mod strategy;

pub use strategy::*;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::info;

use crate::query::{CostEstimate, QueryQuality, QuerySpec};
use crate::sizing::bytes_to_gb;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComparisonError {
    #[error("No strategies to compare")]
    NoStrategies,

    #[error("Strategy `{0}` is defined more than once")]
    DuplicateStrategy(String),

    #[error("Query `{0}` is defined more than once")]
    DuplicateQuery(String),

    #[error("Query `{query}` references collection `{collection}`, which strategy `{strategy}` does not define")]
    MissingCollection { strategy: String, query: String, collection: String },

    #[error("Strategy `{strategy}` has no cost for query `{query}`")]
    MissingCost { strategy: String, query: String },
}

/// One strategy's position in a per-query ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStrategy {
    pub strategy: String,
    pub cost: CostEstimate,
    pub quality: QueryQuality,
    pub servers_involved: u64,
    pub docs_scanned: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRanking {
    pub query: String,
    /// Best first
    pub ranking: Vec<RankedStrategy>,
    pub winner: String,
    pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub strategy: String,
    pub total_bytes: u64,
    pub total_gb: f64,
}

/// Strategies ordered by total footprint, smallest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRanking {
    pub entries: Vec<StorageEntry>,
    pub most_efficient: String,
    pub least_efficient: String,
    /// Largest footprint over smallest; absent when the smallest is empty
    pub multiplier: Option<f64>,
}

/// Sum of every query cost for one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadTotal {
    pub strategy: String,
    pub cost: CostEstimate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub queries: Vec<QueryRanking>,
    pub storage: StorageRanking,
    /// Whole-workload totals, ranked like a single query
    pub totals: Vec<WorkloadTotal>,
}

impl ComparisonReport {
    pub fn winner_of(&self, query: &str) -> Option<&str> {
        self.queries.iter().find(|ranking| ranking.query == query).map(|ranking| ranking.winner.as_str())
    }
}

fn rank_order(a: (&str, &CostEstimate), b: (&str, &CostEstimate)) -> Ordering {
    a.1.time_ms.total_cmp(&b.1.time_ms).then(a.1.price_usd.total_cmp(&b.1.price_usd)).then(a.0.cmp(b.0))
}

/// Rank evaluated strategies for each query of the workload.
pub fn compare(strategies: &BTreeMap<String, StrategyResult>, queries: &[QuerySpec]) -> Result<ComparisonReport, ComparisonError> {
    if strategies.is_empty() {
        return Err(ComparisonError::NoStrategies);
    }
    check_unique_queries(queries)?;

    let mut rankings = Vec::with_capacity(queries.len());
    for query in queries {
        let mut ranking = Vec::with_capacity(strategies.len());
        for (name, result) in strategies {
            let priced = result.queries.get(&query.name).ok_or_else(|| ComparisonError::MissingCost {
                strategy: name.clone(),
                query: query.name.clone(),
            })?;
            let collection = &priced.planned.scenario.collection;
            if !result.collections.contains_key(collection) {
                return Err(ComparisonError::MissingCollection {
                    strategy: name.clone(),
                    query: query.name.clone(),
                    collection: collection.clone(),
                });
            }
            ranking.push(RankedStrategy {
                strategy: name.clone(),
                cost: priced.cost,
                quality: priced.quality,
                servers_involved: priced.planned.scenario.servers_involved,
                docs_scanned: priced.planned.scenario.docs_scanned,
            });
        }
        ranking.sort_by(|a, b| rank_order((&a.strategy, &a.cost), (&b.strategy, &b.cost)));

        let justification = justify(&query.name, &ranking);
        let winner = ranking.first().map(|best| best.strategy.clone()).unwrap_or_default();
        info!(query = %query.name, %winner, "Ranked strategies");
        rankings.push(QueryRanking {
            query: query.name.clone(),
            ranking,
            winner,
            justification,
        });
    }

    let mut totals: Vec<WorkloadTotal> = strategies
        .iter()
        .map(|(name, result)| WorkloadTotal {
            strategy: name.clone(),
            cost: queries
                .iter()
                .filter_map(|query| result.queries.get(&query.name))
                .fold(CostEstimate::zero(), |sum, priced| sum.add(&priced.cost)),
        })
        .collect();
    totals.sort_by(|a, b| rank_order((&a.strategy, &a.cost), (&b.strategy, &b.cost)));

    Ok(ComparisonReport {
        queries: rankings,
        storage: rank_storage(strategies),
        totals,
    })
}

fn rank_storage(strategies: &BTreeMap<String, StrategyResult>) -> StorageRanking {
    let mut entries: Vec<StorageEntry> = strategies
        .iter()
        .map(|(name, result)| {
            let total_bytes = result.total_bytes();
            StorageEntry {
                strategy: name.clone(),
                total_bytes,
                total_gb: bytes_to_gb(total_bytes),
            }
        })
        .collect();
    entries.sort_by(|a, b| a.total_bytes.cmp(&b.total_bytes).then_with(|| a.strategy.cmp(&b.strategy)));

    let most = entries.first();
    let least = entries.last();
    let multiplier = match (most, least) {
        (Some(most), Some(least)) if most.total_bytes > 0 => Some(least.total_bytes as f64 / most.total_bytes as f64),
        _ => None,
    };

    StorageRanking {
        most_efficient: most.map(|entry| entry.strategy.clone()).unwrap_or_default(),
        least_efficient: least.map(|entry| entry.strategy.clone()).unwrap_or_default(),
        multiplier,
        entries,
    }
}

fn justify(query: &str, ranking: &[RankedStrategy]) -> String {
    let Some(winner) = ranking.first() else {
        return String::new();
    };
    let (w, cost) = (&winner.strategy, &winner.cost);

    let Some(runner_up) = ranking.get(1) else {
        return format!("{w} is the only strategy priced for `{query}`: {:.4} ms, ${:.9}, {:.3e} kg CO2", cost.time_ms, cost.price_usd, cost.carbon_kg);
    };
    let (r, other) = (&runner_up.strategy, &runner_up.cost);

    if other.time_ms > cost.time_ms {
        format!(
            "{w} answers `{query}` in {:.4} ms on {} server(s), {:.4} ms faster than {r} ({:.4} ms on {}); ${:.9} vs ${:.9}",
            cost.time_ms,
            winner.servers_involved,
            other.time_ms - cost.time_ms,
            other.time_ms,
            runner_up.servers_involved,
            cost.price_usd,
            other.price_usd,
        )
    } else if other.price_usd > cost.price_usd {
        format!("{w} ties {r} on `{query}` at {:.4} ms and is ${:.9} cheaper", cost.time_ms, other.price_usd - cost.price_usd)
    } else {
        format!("{w} and {r} cost the same on `{query}` ({:.4} ms, ${:.9}); {w} sorts first by name", cost.time_ms, cost.price_usd)
    }
}
