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

//! Query Cost Model
//!
//! [`planner`] turns a workload query into a concrete [`QueryScenario`] for
//! one strategy's layout; [`cost_model`] prices a scenario in time, carbon
//! and money.

pub mod cost_model;
pub mod planner;

pub use cost_model::{AccessAlgorithm, CostEstimate, CostModel, QueryQuality, QueryScenario, estimate_cost};
pub use planner::{AlgorithmCost, CollectionView, DEFAULT_SELECTIVITY, JoinSpec, PlannedQuery, QueryPlanner, QuerySpec};
