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

//! Shard Distribution Evaluator
//!
//! Rates how well a candidate shard key spreads a collection over a fleet.
//! Cardinality alone decides the banded rating; popularity skew has to be
//! declared by the caller, it is never guessed from cardinality.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::config::{ConfigurationError, Topology};
use crate::sizing::CollectionProfile;

/// Thresholds on distinct key values per server, best band first
const EXCELLENT_THRESHOLD: f64 = 50.0;
const GOOD_THRESHOLD: f64 = 5.0;
const FAIR_THRESHOLD: f64 = 1.0;
const POOR_THRESHOLD: f64 = 0.2;

/// Popularity of shard key values
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySkew {
    #[default]
    Uniform,
    /// Declared skewed, e.g. one site attracting most orders
    Skewed,
    /// Share of all documents carried by the single most popular key value
    Popularity { hottest_value_share: f64 },
}

/// Candidate shard key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardKeySpec {
    pub field_path: String,
    /// Distinct values across the collection; non-positive means one shared value
    pub cardinality: i64,
    #[serde(default)]
    pub skew: KeySkew,
}

impl ShardKeySpec {
    pub fn new(field_path: impl Into<String>, cardinality: i64) -> Self {
        Self {
            field_path: field_path.into(),
            cardinality,
            skew: KeySkew::Uniform,
        }
    }

    pub fn with_skew(mut self, skew: KeySkew) -> Self {
        self.skew = skew;
        self
    }

    fn effective_cardinality(&self) -> u64 {
        u64::try_from(self.cardinality).unwrap_or(0).max(1)
    }
}

/// Ordinal load-balance rating, 1 (disastrous) to 5 (excellent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationRating {
    Disastrous = 1,
    Poor = 2,
    Fair = 3,
    Good = 4,
    Excellent = 5,
}

impl UtilizationRating {
    pub fn from_distinct_values_per_server(avg: f64) -> Self {
        if avg >= EXCELLENT_THRESHOLD {
            Self::Excellent
        } else if avg >= GOOD_THRESHOLD {
            Self::Good
        } else if avg >= FAIR_THRESHOLD {
            Self::Fair
        } else if avg > POOR_THRESHOLD {
            Self::Poor
        } else {
            Self::Disastrous
        }
    }

    pub fn value(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for UtilizationRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disastrous => "disastrous",
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        };
        write!(f, "{}/5 {label}", self.value())
    }
}

/// Distribution metrics of one shard key over one fleet size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardEvaluation {
    pub field_path: String,
    pub server_count: u64,
    pub avg_docs_per_server: f64,
    pub avg_distinct_values_per_server: f64,
    pub utilization_rating: UtilizationRating,
    pub hotspot_risk: bool,
}

pub struct ShardEvaluator {
    /// Hottest key value load, in multiples of the average per-server load,
    /// above which a popularity profile counts as a hotspot
    hotspot_load_factor: f64,
}

impl ShardEvaluator {
    pub fn new(hotspot_load_factor: f64) -> Self {
        Self { hotspot_load_factor }
    }

    pub fn evaluate(&self, key: &ShardKeySpec, profile: &CollectionProfile, server_count: i64) -> Result<ShardEvaluation, ConfigurationError> {
        let topology = Topology::new(server_count)?;
        let servers = topology.server_count as f64;
        let cardinality = key.effective_cardinality();

        let avg_docs_per_server = profile.document_count as f64 / servers;
        let avg_distinct_values_per_server = cardinality as f64 / servers;
        let hotspot_risk = self.hotspot_risk(key, profile.document_count, avg_docs_per_server)?;

        let mut utilization_rating = UtilizationRating::from_distinct_values_per_server(avg_distinct_values_per_server);
        if hotspot_risk {
            utilization_rating = utilization_rating.min(UtilizationRating::Fair);
        }
        // A single shared key value cannot be spread at all
        if cardinality <= 1 {
            utilization_rating = UtilizationRating::Disastrous;
        }

        debug!(field = %key.field_path, avg_docs_per_server, avg_distinct_values_per_server, rating = utilization_rating.value(), "Evaluated shard key");
        if hotspot_risk || utilization_rating == UtilizationRating::Disastrous {
            warn!(field = %key.field_path, hotspot_risk, rating = %utilization_rating, "Shard key distributes poorly");
        }

        Ok(ShardEvaluation {
            field_path: key.field_path.clone(),
            server_count: topology.server_count,
            avg_docs_per_server,
            avg_distinct_values_per_server,
            utilization_rating,
            hotspot_risk,
        })
    }

    fn hotspot_risk(&self, key: &ShardKeySpec, document_count: u64, avg_docs_per_server: f64) -> Result<bool, ConfigurationError> {
        match key.skew {
            KeySkew::Uniform => Ok(false),
            KeySkew::Skewed => Ok(true),
            KeySkew::Popularity { hottest_value_share } => {
                if !(0.0..=1.0).contains(&hottest_value_share) {
                    return Err(ConfigurationError::single(
                        format!("shard_key.{}.hottest_value_share", key.field_path),
                        format!("must lie in [0, 1], got {hottest_value_share}"),
                    ));
                }
                // One key value always lands on one server
                let hottest_docs = hottest_value_share * document_count as f64;
                Ok(hottest_docs > self.hotspot_load_factor * avg_docs_per_server)
            }
        }
    }
}

impl Default for ShardEvaluator {
    fn default() -> Self {
        Self::new(2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(document_count: u64) -> CollectionProfile {
        CollectionProfile {
            document_count,
            avg_document_bytes: 100,
            index_overhead_bytes: 0,
            total_bytes: document_count * 100,
        }
    }

    fn evaluate(key: &ShardKeySpec, document_count: u64, servers: i64) -> ShardEvaluation {
        ShardEvaluator::default().evaluate(key, &profile(document_count), servers).unwrap()
    }

    #[test]
    fn test_product_id_over_thousand_servers() {
        let eval = evaluate(&ShardKeySpec::new("idp", 100_000), 100_000, 1000);
        assert_eq!(eval.avg_distinct_values_per_server, 100.0);
        assert_eq!(eval.avg_docs_per_server, 100.0);
        assert_eq!(eval.utilization_rating.value(), 5);
        assert!(!eval.hotspot_risk);
    }

    #[test]
    fn test_warehouse_id_over_thousand_servers() {
        let eval = evaluate(&ShardKeySpec::new("idw", 200), 20_000_000, 1000);
        assert_eq!(eval.avg_distinct_values_per_server, 0.2);
        assert_eq!(eval.utilization_rating, UtilizationRating::Disastrous);
    }

    #[test]
    fn test_band_boundaries() {
        use UtilizationRating::*;
        assert_eq!(UtilizationRating::from_distinct_values_per_server(50.0), Excellent);
        assert_eq!(UtilizationRating::from_distinct_values_per_server(49.999), Good);
        assert_eq!(UtilizationRating::from_distinct_values_per_server(5.0), Good);
        assert_eq!(UtilizationRating::from_distinct_values_per_server(4.99), Fair);
        assert_eq!(UtilizationRating::from_distinct_values_per_server(1.0), Fair);
        assert_eq!(UtilizationRating::from_distinct_values_per_server(0.5), Poor);
        assert_eq!(UtilizationRating::from_distinct_values_per_server(0.2), Disastrous);
        assert_eq!(UtilizationRating::from_distinct_values_per_server(0.01), Disastrous);
    }

    #[test]
    fn test_declared_skew_caps_rating() {
        let key = ShardKeySpec::new("idp", 100_000).with_skew(KeySkew::Skewed);
        let eval = evaluate(&key, 100_000, 1000);
        assert!(eval.hotspot_risk);
        assert_eq!(eval.utilization_rating, UtilizationRating::Fair);
    }

    #[test]
    fn test_popularity_profile() {
        // 1% of 4e9 order lines on one product vs 4e6 per server on average
        let hot = ShardKeySpec::new("idp", 100_000).with_skew(KeySkew::Popularity { hottest_value_share: 0.01 });
        assert!(evaluate(&hot, 4_000_000_000, 1000).hotspot_risk);

        let mild = ShardKeySpec::new("idp", 100_000).with_skew(KeySkew::Popularity { hottest_value_share: 0.0001 });
        let eval = evaluate(&mild, 4_000_000_000, 1000);
        assert!(!eval.hotspot_risk);
        assert_eq!(eval.utilization_rating, UtilizationRating::Excellent);

        let invalid = ShardKeySpec::new("idp", 10).with_skew(KeySkew::Popularity { hottest_value_share: 1.5 });
        assert!(ShardEvaluator::default().evaluate(&invalid, &profile(10), 4).is_err());
    }

    #[test]
    fn test_non_positive_cardinality_is_worst_case() {
        let eval = evaluate(&ShardKeySpec::new("site", 0), 1_000, 1);
        assert_eq!(eval.avg_distinct_values_per_server, 1.0);
        assert_eq!(eval.utilization_rating, UtilizationRating::Disastrous);

        let eval = evaluate(&ShardKeySpec::new("site", -4), 1_000, 10);
        assert_eq!(eval.avg_distinct_values_per_server, 0.1);
    }

    #[test]
    fn test_invalid_server_count() {
        let key = ShardKeySpec::new("idp", 100);
        let evaluator = ShardEvaluator::default();
        assert!(evaluator.evaluate(&key, &profile(100), 0).unwrap_err().has_issue_for("server_count"));
        assert!(evaluator.evaluate(&key, &profile(100), -10).is_err());
    }

    #[test]
    fn test_more_servers_fewer_docs_each() {
        let key = ShardKeySpec::new("idp", 100_000);
        let small = evaluate(&key, 1_000_000, 10);
        let large = evaluate(&key, 1_000_000, 11);
        assert!(large.avg_docs_per_server < small.avg_docs_per_server);
    }
}
