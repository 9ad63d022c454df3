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

// End-to-end estimation scenarios on the product/stock/warehouse domain
use denorm_core::*;
use serde_json::json;

fn product_schema() -> Schema {
    infer_from_schema(&json!({
        "type": "object",
        "properties": {
            "IDP": {"type": "integer"},
            "name": {"type": "string"},
            "price": {"type": "number"},
            "brand": {"type": "string"},
            "description": {"type": "string"},
            "categories": {
                "type": "array",
                "items": {"type": "object", "properties": {"title": {"type": "string"}}}
            },
            "supplier": {
                "type": "object",
                "properties": {"IDS": {"type": "integer"}, "name": {"type": "string"}}
            }
        },
        "required": ["IDP", "name"]
    }))
    .unwrap()
}

fn profile(document_count: u64) -> CollectionProfile {
    let params = PopulationParameters::new(document_count);
    estimate_collection(&estimate_size(&product_schema(), &params), &params, &[IndexSpec::single("IDP")])
}

#[test]
fn test_product_key_over_thousand_servers() {
    let evaluation = ShardEvaluator::default().evaluate(&ShardKeySpec::new("IDP", 100_000), &profile(100_000), 1000).unwrap();
    assert_eq!(evaluation.avg_distinct_values_per_server, 100.0);
    assert_eq!(evaluation.utilization_rating.value(), 5);
}

#[test]
fn test_warehouse_key_over_thousand_servers() {
    let evaluation = ShardEvaluator::default().evaluate(&ShardKeySpec::new("IDW", 200), &profile(20_000_000), 1000).unwrap();
    assert_eq!(evaluation.avg_distinct_values_per_server, 0.2);
    assert_eq!(evaluation.utilization_rating.value(), 1);
}

#[test]
fn test_full_scan_of_order_lines_is_pricier_than_index() {
    let rates = CostRates::default();
    let scenario = |algorithm, servers_involved, docs_scanned| QueryScenario {
        algorithm,
        collection: "orderline".to_string(),
        servers_involved,
        docs_scanned,
    };

    let index = estimate_cost(&scenario(AccessAlgorithm::Index, 1, 1), &rates).unwrap();
    let full = estimate_cost(&scenario(AccessAlgorithm::FullScan, 1000, 4_000_000_000), &rates).unwrap();
    assert!(full.price_usd > index.price_usd);
}

#[test]
fn test_invalid_parameters_are_aggregated() {
    let config = EstimatorConfig {
        server_count: -4,
        rate_per_server_hour_usd: -0.5,
        ..EstimatorConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.has_issue_for("server_count"));
    assert!(err.has_issue_for("rate_per_server_hour_usd"));

    let rates = CostRates {
        co2_per_kwh_kg: -1.0,
        ..CostRates::default()
    };
    let scenario = QueryScenario {
        algorithm: AccessAlgorithm::Shard,
        collection: "stock".to_string(),
        servers_involved: 10,
        docs_scanned: 10,
    };
    assert!(estimate_cost(&scenario, &rates).is_err());
}

#[test]
fn test_hotspot_caps_excellent_rating() {
    let key = ShardKeySpec::new("IDP", 100_000).with_skew(KeySkew::Skewed);
    let evaluation = ShardEvaluator::default().evaluate(&key, &profile(100_000), 1000).unwrap();
    assert!(evaluation.hotspot_risk);
    assert!(evaluation.utilization_rating.value() <= 3);
}

#[test]
fn test_collection_estimate_is_idempotent() {
    let params = PopulationParameters::new(4_000_000);
    let document = estimate_size(&product_schema(), &params);
    let indexes = [IndexSpec::single("IDP"), IndexSpec::new("brand_price", vec!["brand".into(), "price".into()]).unwrap()];

    let first = estimate_collection(&document, &params, &indexes);
    let second = estimate_collection(&document, &params, &indexes);
    assert_eq!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&second).unwrap());
}

#[test]
fn test_algorithm_ordering_on_sharded_collection() {
    let profile = profile(20_000_000);
    let population = PopulationParameters::new(20_000_000).with_cardinality("brand", 5000);
    let shard = ShardEvaluator::default().evaluate(&ShardKeySpec::new("IDP", 100_000), &profile, 1000).unwrap();
    let indexes = [IndexSpec::single("IDP"), IndexSpec::single("brand")];
    let view = CollectionView {
        name: "product",
        profile: &profile,
        population: &population,
        indexes: &indexes,
        shard: Some(&shard),
    };
    let spec = QuerySpec::new("by_brand", "product", AccessAlgorithm::Index).filtered_on("brand");

    let costs = QueryPlanner::new(Topology::new(1000).unwrap())
        .compare_algorithms(&spec, &view, None, &CostModel::default(), &CostRates::default())
        .unwrap();
    let times: Vec<f64> = costs.iter().map(|row| row.cost.time_ms).collect();
    assert!(times.windows(2).all(|pair| pair[0] < pair[1]), "{times:?}");
    assert_eq!(costs[0].quality, QueryQuality::Excellent);
}

#[test]
fn test_embedding_trades_storage_for_query_time() {
    let stock_fields = json!({
        "IDP": {"type": "integer"},
        "IDW": {"type": "integer"},
        "quantity": {"type": "integer"}
    });
    let stock = infer_from_schema(&json!({"type": "object", "properties": stock_fields})).unwrap();
    let mut embedded_properties = stock_fields.clone();
    embedded_properties["product"] = json!({
        "type": "object",
        "properties": {"name": {"type": "string"}, "brand": {"type": "string"}, "price": {"type": "number"}}
    });
    let stock_with_product = infer_from_schema(&json!({"type": "object", "properties": embedded_properties})).unwrap();

    let stock_population = PopulationParameters::new(20_000_000).with_cardinality("IDP", 100_000).with_cardinality("IDW", 200);
    let normalized = StrategyDefinition::new("normalized")
        .with_collection(
            CollectionDefinition::new("stock", stock, stock_population.clone())
                .with_index(IndexSpec::single("IDW"))
                .with_shard_key(ShardKeySpec::new("IDP", 100_000)),
        )
        .with_collection(
            CollectionDefinition::new("product", product_schema(), PopulationParameters::new(100_000).with_cardinality("IDP", 100_000))
                .with_index(IndexSpec::single("IDP"))
                .with_shard_key(ShardKeySpec::new("IDP", 100_000)),
        );
    let embedded = StrategyDefinition::new("embedded").with_collection(
        CollectionDefinition::new("stock", stock_with_product, stock_population)
            .with_index(IndexSpec::single("IDW"))
            .with_shard_key(ShardKeySpec::new("IDP", 100_000)),
    );
    let embedded = embedded.with_query_override(QuerySpec::new("warehouse_stock", "stock", AccessAlgorithm::NestedLoop).filtered_on("IDW"));

    let queries = vec![
        QuerySpec::new("warehouse_stock", "stock", AccessAlgorithm::NestedLoop)
            .filtered_on("IDW")
            .joined_with("product", Some("IDP".to_string())),
    ];
    let topology = Topology::new(1000).unwrap();
    let results = evaluate_strategies_parallel(&[normalized, embedded], &queries, topology, CostRates::default()).unwrap();
    let report = compare(&results, &queries).unwrap();

    assert_eq!(report.winner_of("warehouse_stock"), Some("embedded"));
    let stock_bytes = |strategy: &str| results[strategy].profile("stock").unwrap().total_bytes;
    assert!(stock_bytes("embedded") > stock_bytes("normalized"));

    let planned = &results["normalized"].queries["warehouse_stock"].planned;
    assert_eq!(planned.matching_documents, 100_000);
    assert_eq!(planned.output_documents, 100_000);
}

#[test]
fn test_dropping_indexes_cannot_buy_index_lookups() {
    let stock = infer_from_schema(&json!({
        "type": "object",
        "properties": {"IDP": {"type": "integer"}, "IDW": {"type": "integer"}}
    }))
    .unwrap();
    let population = PopulationParameters::new(20_000_000).with_cardinality("IDP", 100_000);
    let indexed = StrategyDefinition::new("indexed").with_collection(
        CollectionDefinition::new("stock", stock.clone(), population.clone())
            .with_index(IndexSpec::single("IDP"))
            .with_shard_key(ShardKeySpec::new("IDP", 100_000)),
    );
    let bare = StrategyDefinition::new("bare").with_collection(CollectionDefinition::new("stock", stock, population).with_shard_key(ShardKeySpec::new("IDP", 100_000)));
    let queries = vec![QuerySpec::new("stock_of_product", "stock", AccessAlgorithm::Index).filtered_on("IDP")];
    let topology = Topology::new(1000).unwrap();

    assert!(evaluate_strategy(&indexed, &queries, topology, CostRates::default()).is_ok());
    let err = evaluate_strategies(&[indexed, bare], &queries, topology, CostRates::default()).unwrap_err();
    assert!(err.to_string().contains("queries.stock_of_product.algorithm"), "{err}");
}
