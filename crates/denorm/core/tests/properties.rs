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

use denorm_core::*;
use proptest::prelude::*;

fn scalar_type() -> impl Strategy<Value = ScalarType> {
    prop_oneof![
        Just(ScalarType::Integer),
        Just(ScalarType::Float),
        Just(ScalarType::String),
        Just(ScalarType::Boolean),
        Just(ScalarType::Date),
        Just(ScalarType::ReferenceId),
    ]
}

fn field_kind() -> impl Strategy<Value = FieldKind> {
    scalar_type().prop_map(FieldKind::Scalar).prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(|kind| FieldKind::Array(Box::new(kind))),
            prop::collection::vec(inner, 1..4).prop_map(|kinds| {
                let fields = kinds.into_iter().enumerate().map(|(i, kind)| SchemaField::new(format!("f{i}"), kind)).collect();
                FieldKind::Object(Schema::new(fields).unwrap())
            }),
        ]
    })
}

fn schema() -> impl Strategy<Value = Schema> {
    prop::collection::vec((field_kind(), prop::option::of(0u32..500)), 0..8).prop_map(|fields| {
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(i, (kind, length))| {
                let field = SchemaField::new(format!("field{i}"), kind);
                match length {
                    Some(length) => field.with_average_length(length),
                    None => field,
                }
            })
            .collect();
        Schema::new(fields).unwrap()
    })
}

fn algorithm() -> impl Strategy<Value = AccessAlgorithm> {
    prop::sample::select(AccessAlgorithm::ALL.to_vec())
}

proptest! {
    #[test]
    fn test_size_never_below_structural_floor(schema in schema(), documents in 0u64..1_000_000) {
        let calculator = DocumentSizeCalculator::default();
        let estimate = calculator.estimate(&schema, &PopulationParameters::new(documents));
        prop_assert!(estimate.total_bytes >= calculator.structural_floor(&schema));
        prop_assert_eq!(estimate.per_field_breakdown.len(), schema.len());
    }

    #[test]
    fn test_collection_grows_with_document_count(schema in schema(), documents in 0u64..1_000_000_000, extra in 1u64..1_000_000) {
        let indexes = [IndexSpec::single("field0")];
        let small = PopulationParameters::new(documents);
        let large = PopulationParameters::new(documents + extra);
        let document = estimate_size(&schema, &small);

        let before = estimate_collection(&document, &small, &indexes);
        let after = estimate_collection(&document, &large, &indexes);
        prop_assert!(after.total_bytes > before.total_bytes);
        prop_assert_eq!(before.clone(), estimate_collection(&document, &small, &indexes));
    }

    #[test]
    fn test_more_servers_fewer_docs_per_server(documents in 1u64..10_000_000_000, cardinality in 1i64..10_000_000, servers in 1i64..100_000) {
        let profile = CollectionProfile {
            document_count: documents,
            avg_document_bytes: 100,
            index_overhead_bytes: 0,
            total_bytes: documents * 100,
        };
        let evaluator = ShardEvaluator::default();
        let key = ShardKeySpec::new("key", cardinality);

        let fewer = evaluator.evaluate(&key, &profile, servers).unwrap();
        let more = evaluator.evaluate(&key, &profile, servers + 1).unwrap();
        prop_assert!(more.avg_docs_per_server < fewer.avg_docs_per_server);
        prop_assert!(more.utilization_rating <= fewer.utilization_rating);
    }

    #[test]
    fn test_cost_monotonic_in_docs_and_servers(
        algorithm in algorithm(),
        servers in 1u64..10_000,
        docs in 1u64..1_000_000_000,
        extra_servers in 0u64..1_000,
        extra_docs in 0u64..1_000_000,
    ) {
        let rates = CostRates::default();
        let scenario = |servers_involved, docs_scanned| QueryScenario {
            algorithm,
            collection: "c".to_string(),
            servers_involved,
            docs_scanned,
        };

        let base = estimate_cost(&scenario(servers, docs), &rates).unwrap();
        let bigger = estimate_cost(&scenario(servers + extra_servers, docs + extra_docs), &rates).unwrap();
        prop_assert!(bigger.time_ms >= base.time_ms);
        prop_assert!(bigger.price_usd >= base.price_usd);
        prop_assert!(bigger.carbon_kg >= base.carbon_kg);
    }

    #[test]
    fn test_rating_follows_bands(avg in 0.0f64..200.0) {
        let rating = UtilizationRating::from_distinct_values_per_server(avg).value();
        let expected = if avg >= 50.0 { 5 } else if avg >= 5.0 { 4 } else if avg >= 1.0 { 3 } else if avg > 0.2 { 2 } else { 1 };
        prop_assert_eq!(rating, expected);
    }
}
