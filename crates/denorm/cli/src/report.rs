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

//! Plain-text rendering of estimation results

use denorm_core::{AlgorithmCost, CollectionProfile, ComparisonReport, DocumentSizeEstimate, FieldKind, Schema, ShardEvaluation, StrategyResult};
use std::collections::BTreeMap;
use std::fmt::Write;

pub fn render_schema(schema: &Schema) -> String {
    let mut out = String::new();
    write_fields(&mut out, schema, 0);
    out
}

fn write_fields(out: &mut String, schema: &Schema, depth: usize) {
    let indent = "  ".repeat(depth);
    for field in schema.fields() {
        let required = if field.required { "" } else { " (optional)" };
        let length = field.average_length.map(|len| format!(" ~{len}")).unwrap_or_default();
        let _ = writeln!(out, "{indent}{}: {}{length}{required}", field.name, field.field_type());
        match &field.kind {
            FieldKind::Object(nested) => write_fields(out, nested, depth + 1),
            FieldKind::Array(element) => {
                if let Some(nested) = element.nested_schema() {
                    write_fields(out, nested, depth + 1);
                }
            }
            FieldKind::Scalar(_) => {}
        }
    }
}

pub fn render_size(document: &DocumentSizeEstimate, profile: &CollectionProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Document size: {} bytes", document.total_bytes);
    for (field, bytes) in &document.per_field_breakdown {
        let _ = writeln!(out, "  {field:<24} {bytes:>10}");
    }
    let _ = writeln!(out, "Documents:      {}", profile.document_count);
    let _ = writeln!(out, "Data:           {} bytes", profile.data_bytes());
    let _ = writeln!(out, "Index overhead: {} bytes", profile.index_overhead_bytes);
    let _ = writeln!(out, "Total:          {} bytes ({:.4} GB)", profile.total_bytes, profile.total_gb());
    out
}

pub fn render_shard(evaluation: &ShardEvaluation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Shard key {} over {} servers", evaluation.field_path, evaluation.server_count);
    let _ = writeln!(out, "  avg docs/server:            {:.2}", evaluation.avg_docs_per_server);
    let _ = writeln!(out, "  avg distinct values/server: {:.4}", evaluation.avg_distinct_values_per_server);
    let _ = writeln!(out, "  utilization:                {}", evaluation.utilization_rating);
    let _ = writeln!(out, "  hotspot risk:               {}", if evaluation.hotspot_risk { "yes" } else { "no" });
    out
}

pub fn render_algorithms(costs: &[AlgorithmCost]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<12} {:>8} {:>14} {:>12} {:>14} {:>14}  quality", "algorithm", "servers", "docs", "time ms", "carbon kg", "price usd");
    for row in costs {
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>14} {:>12.4} {:>14.3e} {:>14.3e}  {}",
            row.algorithm.as_str(),
            row.planned.scenario.servers_involved,
            row.planned.scenario.docs_scanned,
            row.cost.time_ms,
            row.cost.carbon_kg,
            row.cost.price_usd,
            row.quality,
        );
    }
    out
}

pub fn render_comparison(results: &BTreeMap<String, StrategyResult>, report: &ComparisonReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "== Storage ==");
    for entry in &report.storage.entries {
        let _ = writeln!(out, "{:<8} {:>14.4} GB", entry.strategy, entry.total_gb);
    }
    let _ = writeln!(out, "Most efficient:  {}", report.storage.most_efficient);
    let _ = writeln!(out, "Least efficient: {}", report.storage.least_efficient);
    if let Some(multiplier) = report.storage.multiplier {
        let _ = writeln!(out, "Cost multiplier: {multiplier:.2}x");
    }

    let _ = writeln!(out, "\n== Shard keys ==");
    for (strategy, result) in results {
        for (collection, shard) in result.shard_evaluations() {
            let _ = writeln!(
                out,
                "{strategy:<8} {collection:<12} {:<16} {:>12.4} values/server  {}{}",
                shard.field_path,
                shard.avg_distinct_values_per_server,
                shard.utilization_rating,
                if shard.hotspot_risk { "  hotspot" } else { "" },
            );
        }
    }

    for ranking in &report.queries {
        let _ = writeln!(out, "\n== {} ==", ranking.query);
        for (position, entry) in ranking.ranking.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {:<8} {:>12.4} ms {:>14.3e} kg {:>14.3e} usd  {}",
                position + 1,
                entry.strategy,
                entry.cost.time_ms,
                entry.cost.carbon_kg,
                entry.cost.price_usd,
                entry.quality,
            );
        }
        let _ = writeln!(out, "{}", ranking.justification);
    }

    let _ = writeln!(out, "\n== Whole workload ==");
    for total in &report.totals {
        let _ = writeln!(out, "{:<8} {:>12.4} ms {:>14.3e} kg {:>14.3e} usd", total.strategy, total.cost.time_ms, total.cost.carbon_kg, total.cost.price_usd);
    }
    out
}
