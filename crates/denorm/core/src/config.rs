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

//! Population, topology and rate configuration
//!
//! [`EstimatorConfig`] is the flat, caller-facing form. It is validated once
//! into typed parts before any estimation runs, and every problem found is
//! reported in a single [`ConfigurationError`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_SERVER_COUNT: i64 = 1000;
pub const DEFAULT_RATE_PER_SERVER_HOUR_USD: f64 = 0.50;
pub const DEFAULT_CO2_PER_KWH_KG: f64 = 0.233;
pub const DEFAULT_POWER_PER_SERVER_KW: f64 = 0.4;

/// One invalid parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    pub parameter: String,
    pub reason: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.parameter, self.reason)
    }
}

/// Invalid numeric parameters, all reported together
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid configuration: {}", render_issues(.issues))]
pub struct ConfigurationError {
    pub issues: Vec<ConfigIssue>,
}

fn render_issues(issues: &[ConfigIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl ConfigurationError {
    pub fn single(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            issues: vec![ConfigIssue {
                parameter: parameter.into(),
                reason: reason.into(),
            }],
        }
    }

    pub fn has_issue_for(&self, parameter: &str) -> bool {
        self.issues.iter().any(|issue| issue.parameter == parameter)
    }
}

/// Collects issues so callers can fail once with all of them
#[derive(Debug, Default)]
pub(crate) struct IssueCollector {
    issues: Vec<ConfigIssue>,
}

impl IssueCollector {
    pub(crate) fn push(&mut self, parameter: impl Into<String>, reason: impl Into<String>) {
        self.issues.push(ConfigIssue {
            parameter: parameter.into(),
            reason: reason.into(),
        });
    }

    pub(crate) fn check_rate(&mut self, parameter: &str, value: f64) {
        if !value.is_finite() {
            self.push(parameter, format!("must be a finite number, got {value}"));
        } else if value < 0.0 {
            self.push(parameter, format!("must not be negative, got {value}"));
        }
    }

    pub(crate) fn check_count(&mut self, parameter: &str, value: i64) -> u64 {
        u64::try_from(value).unwrap_or_else(|_| {
            self.push(parameter, format!("must not be negative, got {value}"));
            0
        })
    }

    pub(crate) fn absorb(&mut self, error: ConfigurationError) {
        self.issues.extend(error.issues);
    }

    pub(crate) fn finish<T>(self, value: T) -> Result<T, ConfigurationError> {
        if self.issues.is_empty() { Ok(value) } else { Err(ConfigurationError { issues: self.issues }) }
    }
}

/// Caller-supplied population statistics for one collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationParameters {
    pub document_count: u64,
    /// Distinct value count per field path
    #[serde(default)]
    pub field_cardinalities: BTreeMap<String, u64>,
    /// Average length per field path, overriding the schema's value
    #[serde(default)]
    pub length_overrides: BTreeMap<String, u32>,
}

impl PopulationParameters {
    pub fn new(document_count: u64) -> Self {
        Self {
            document_count,
            ..Self::default()
        }
    }

    pub fn with_cardinality(mut self, field: impl Into<String>, distinct_values: u64) -> Self {
        self.field_cardinalities.insert(field.into(), distinct_values);
        self
    }

    pub fn with_length_override(mut self, path: impl Into<String>, average_length: u32) -> Self {
        self.length_overrides.insert(path.into(), average_length);
        self
    }

    pub fn cardinality(&self, field: &str) -> Option<u64> {
        self.field_cardinalities.get(field).copied()
    }

    pub fn length_override(&self, path: &str) -> Option<u32> {
        self.length_overrides.get(path).copied()
    }
}

/// Server fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub server_count: u64,
}

impl Topology {
    pub fn new(server_count: i64) -> Result<Self, ConfigurationError> {
        match u64::try_from(server_count) {
            Ok(server_count) if server_count > 0 => Ok(Self { server_count }),
            _ => Err(ConfigurationError::single("server_count", format!("must be positive, got {server_count}"))),
        }
    }
}

/// Rate constants passed explicitly into every cost computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRates {
    pub rate_per_server_hour_usd: f64,
    pub co2_per_kwh_kg: f64,
    pub power_per_server_kw: f64,
}

impl CostRates {
    pub fn new(rate_per_server_hour_usd: f64, co2_per_kwh_kg: f64, power_per_server_kw: f64) -> Result<Self, ConfigurationError> {
        let rates = Self {
            rate_per_server_hour_usd,
            co2_per_kwh_kg,
            power_per_server_kw,
        };
        rates.validate()?;
        Ok(rates)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut issues = IssueCollector::default();
        issues.check_rate("rate_per_server_hour_usd", self.rate_per_server_hour_usd);
        issues.check_rate("co2_per_kwh_kg", self.co2_per_kwh_kg);
        issues.check_rate("power_per_server_kw", self.power_per_server_kw);
        issues.finish(())
    }
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            rate_per_server_hour_usd: DEFAULT_RATE_PER_SERVER_HOUR_USD,
            co2_per_kwh_kg: DEFAULT_CO2_PER_KWH_KG,
            power_per_server_kw: DEFAULT_POWER_PER_SERVER_KW,
        }
    }
}

/// Flat configuration as supplied by a caller or a TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub document_count: i64,
    pub field_cardinalities: BTreeMap<String, i64>,
    pub server_count: i64,
    pub rate_per_server_hour_usd: f64,
    pub co2_per_kwh_kg: f64,
    pub power_per_server_kw: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            document_count: 0,
            field_cardinalities: BTreeMap::new(),
            server_count: DEFAULT_SERVER_COUNT,
            rate_per_server_hour_usd: DEFAULT_RATE_PER_SERVER_HOUR_USD,
            co2_per_kwh_kg: DEFAULT_CO2_PER_KWH_KG,
            power_per_server_kw: DEFAULT_POWER_PER_SERVER_KW,
        }
    }
}

/// Typed configuration, only obtainable through [`EstimatorConfig::validate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedConfig {
    pub population: PopulationParameters,
    pub topology: Topology,
    pub rates: CostRates,
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigurationError> {
        let mut issues = IssueCollector::default();

        let document_count = issues.check_count("document_count", self.document_count);
        let mut population = PopulationParameters::new(document_count);
        for (field, cardinality) in &self.field_cardinalities {
            let cardinality = issues.check_count(&format!("field_cardinalities.{field}"), *cardinality);
            population.field_cardinalities.insert(field.clone(), cardinality);
        }

        let topology = Topology::new(self.server_count).unwrap_or_else(|error| {
            issues.absorb(error);
            Topology { server_count: 1 }
        });

        let rates = CostRates {
            rate_per_server_hour_usd: self.rate_per_server_hour_usd,
            co2_per_kwh_kg: self.co2_per_kwh_kg,
            power_per_server_kw: self.power_per_server_kw,
        };
        if let Err(error) = rates.validate() {
            issues.absorb(error);
        }

        issues.finish(ValidatedConfig { population, topology, rates })
    }
}
