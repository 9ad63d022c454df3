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
use std::fmt;
use std::str::FromStr;

use crate::config::{ConfigurationError, CostRates};

const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessAlgorithm {
    Index,
    Shard,
    NestedLoop,
    FullScan,
}

impl AccessAlgorithm {
    pub const ALL: [AccessAlgorithm; 4] = [AccessAlgorithm::Index, AccessAlgorithm::Shard, AccessAlgorithm::NestedLoop, AccessAlgorithm::FullScan];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessAlgorithm::Index => "index",
            AccessAlgorithm::Shard => "shard",
            AccessAlgorithm::NestedLoop => "nested_loop",
            AccessAlgorithm::FullScan => "full_scan",
        }
    }
}

impl fmt::Display for AccessAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "index" => Ok(AccessAlgorithm::Index),
            "shard" => Ok(AccessAlgorithm::Shard),
            "nested_loop" => Ok(AccessAlgorithm::NestedLoop),
            "full_scan" => Ok(AccessAlgorithm::FullScan),
            other => Err(format!("unknown access algorithm: {other}")),
        }
    }
}

/// One priced unit of work: an algorithm touching some documents on some servers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryScenario {
    pub algorithm: AccessAlgorithm,
    /// Name of the collection profile this scenario runs against
    pub collection: String,
    pub servers_involved: u64,
    pub docs_scanned: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub time_ms: f64,
    pub carbon_kg: f64,
    pub price_usd: f64,
}

impl CostEstimate {
    pub fn new(time_ms: f64, carbon_kg: f64, price_usd: f64) -> Self {
        Self { time_ms, carbon_kg, price_usd }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(&self, other: &CostEstimate) -> CostEstimate {
        CostEstimate::new(self.time_ms + other.time_ms, self.carbon_kg + other.carbon_kg, self.price_usd + other.price_usd)
    }
}

/// Coarse performance label for a priced query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryQuality {
    Slow = 2,
    Ok = 3,
    Good = 4,
    Excellent = 5,
}

impl QueryQuality {
    pub fn assess(time_ms: f64, servers_involved: u64) -> Self {
        if time_ms < 1.0 && servers_involved == 1 {
            QueryQuality::Excellent
        } else if time_ms < 10.0 && servers_involved <= 2 {
            QueryQuality::Good
        } else if time_ms < 100.0 && servers_involved <= 5 {
            QueryQuality::Ok
        } else {
            QueryQuality::Slow
        }
    }
}

impl fmt::Display for QueryQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QueryQuality::Excellent => "EXCELLENT",
            QueryQuality::Good => "GOOD",
            QueryQuality::Ok => "OK",
            QueryQuality::Slow => "SLOW",
        };
        write!(f, "[{}/5] {label}", *self as u8)
    }
}

/// Time constants per algorithm. Every scan variant pays shard routing on
/// each involved server, and a full scan pays more per document than a
/// nested loop because results cross the network.
pub struct CostModel {
    index_lookup_ms: f64,
    route_ms_per_server: f64,
    nested_loop_ms_per_doc: f64,
    full_scan_ms_per_doc: f64,
}

impl CostModel {
    pub fn new() -> Self {
        Self {
            index_lookup_ms: 0.001,
            route_ms_per_server: 0.002,
            nested_loop_ms_per_doc: 0.00001,
            full_scan_ms_per_doc: 0.00002,
        }
    }

    pub fn estimate_time_ms(&self, scenario: &QueryScenario) -> f64 {
        let servers = scenario.servers_involved as f64;
        let docs = scenario.docs_scanned as f64;
        match scenario.algorithm {
            AccessAlgorithm::Index => self.index_lookup_ms,
            AccessAlgorithm::Shard => self.route_ms_per_server * servers,
            AccessAlgorithm::NestedLoop => self.route_ms_per_server * servers + self.nested_loop_ms_per_doc * docs,
            AccessAlgorithm::FullScan => self.route_ms_per_server * servers + self.full_scan_ms_per_doc * docs,
        }
    }

    pub fn estimate_cost(&self, scenario: &QueryScenario, rates: &CostRates) -> Result<CostEstimate, ConfigurationError> {
        rates.validate()?;
        if scenario.servers_involved == 0 {
            return Err(ConfigurationError::single("servers_involved", "must be positive"));
        }

        let time_ms = self.estimate_time_ms(scenario);
        let server_hours = scenario.servers_involved as f64 * (time_ms / MS_PER_HOUR);
        let carbon_kg = server_hours * rates.power_per_server_kw * rates.co2_per_kwh_kg;
        let price_usd = server_hours * rates.rate_per_server_hour_usd;

        Ok(CostEstimate::new(time_ms, carbon_kg, price_usd))
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Price one scenario with the default time constants.
pub fn estimate_cost(scenario: &QueryScenario, rates: &CostRates) -> Result<CostEstimate, ConfigurationError> {
    CostModel::default().estimate_cost(scenario, rates)
}
