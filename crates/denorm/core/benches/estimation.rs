use criterion::{Criterion, criterion_group, criterion_main};
use denorm_core::{
    AccessAlgorithm, CollectionDefinition, CostRates, IndexSpec, PopulationParameters, QuerySpec, ScalarType, Schema, SchemaField, ShardKeySpec, StrategyDefinition, Topology,
    evaluate_strategies, evaluate_strategies_parallel,
};

fn strategies() -> Vec<StrategyDefinition> {
    (0..16)
        .map(|i| {
            let schema = Schema::new(vec![
                SchemaField::scalar("IDP", ScalarType::Integer),
                SchemaField::scalar("IDW", ScalarType::Integer),
                SchemaField::scalar("location", ScalarType::String).with_average_length(20 + i),
            ])
            .unwrap();
            let population = PopulationParameters::new(20_000_000).with_cardinality("IDP", 100_000).with_cardinality("IDW", 200);
            StrategyDefinition::new(format!("S{i}")).with_collection(
                CollectionDefinition::new("stock", schema, population)
                    .with_index(IndexSpec::single("IDP"))
                    .with_index(IndexSpec::single("IDW"))
                    .with_shard_key(ShardKeySpec::new(if i % 2 == 0 { "IDP" } else { "IDW" }, if i % 2 == 0 { 100_000 } else { 200 })),
            )
        })
        .collect()
}

fn queries() -> Vec<QuerySpec> {
    AccessAlgorithm::ALL
        .iter()
        .map(|&algorithm| QuerySpec::new(format!("by_product_{algorithm}"), "stock", algorithm).filtered_on("IDP"))
        .collect()
}

fn benchmark_strategy_evaluation(c: &mut Criterion) {
    let strategies = strategies();
    let queries = queries();
    let topology = Topology::new(1000).unwrap();

    c.bench_function("evaluate_sequential", |b| {
        b.iter(|| evaluate_strategies(&strategies, &queries, topology, CostRates::default()));
    });
    c.bench_function("evaluate_parallel", |b| {
        b.iter(|| evaluate_strategies_parallel(&strategies, &queries, topology, CostRates::default()));
    });
}

criterion_group!(estimation_benches, benchmark_strategy_evaluation);
criterion_main!(estimation_benches);
