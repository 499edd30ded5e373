//! Performance benchmarks for counter maintenance.

use counter_cache::{
    Attributes, Catalog, CounterDef, CounterEngine, Datastore, FixOptions, ModelDef,
    RegistryBuilder, SqliteStore, Value,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

const SCHEMA: &str = r#"
CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    reviews_count INTEGER NOT NULL DEFAULT 0,
    review_value_sum REAL NOT NULL DEFAULT 0,
    images_count INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE companies (id INTEGER PRIMARY KEY, images_count INTEGER NOT NULL DEFAULT 0);
CREATE TABLE reviews (id INTEGER PRIMARY KEY, user_id INTEGER, value REAL);
CREATE TABLE images (id INTEGER PRIMARY KEY, owner_id INTEGER, owner_type TEXT);
"#;

fn create_engine() -> CounterEngine {
    let catalog = Catalog::new()
        .model(ModelDef::new("User", "users"))
        .model(ModelDef::new("Company", "companies"))
        .model(ModelDef::new("Review", "reviews").belongs_to("user", "user_id", "User"))
        .model(ModelDef::new("Image", "images").polymorphic("owner", "owner_id", "owner_type"));
    let registry = RegistryBuilder::new(Arc::new(catalog))
        .counter("Review", CounterDef::new(["user"]))
        .unwrap()
        .counter(
            "Review",
            CounterDef::new(["user"]).column("review_value_sum").delta_column("value"),
        )
        .unwrap()
        .counter("Image", CounterDef::new(["owner"]))
        .unwrap()
        .build();
    CounterEngine::new(registry)
}

fn create_store(engine: &CounterEngine, users: usize) -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    store.execute_batch(SCHEMA).unwrap();
    engine.registry().install_hooks(&store);
    for _ in 0..users {
        store.execute("INSERT INTO users DEFAULT VALUES", &[]).unwrap();
        store.execute("INSERT INTO companies DEFAULT VALUES", &[]).unwrap();
    }
    store
}

/// Benchmark create + commit with counter updates
fn bench_create_and_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_and_commit");

    for per_transaction in [1, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("records", per_transaction),
            &per_transaction,
            |b, &n| {
                let engine = create_engine();
                let store = create_store(&engine, 100);
                let mut i = 0i64;

                b.iter(|| {
                    let mut session = store.session(&engine).unwrap();
                    for _ in 0..n {
                        i += 1;
                        session
                            .insert(
                                "Review",
                                Attributes::new().with("user_id", i % 100 + 1).with("value", 1.5),
                            )
                            .unwrap();
                    }
                    black_box(session.commit().unwrap());
                });
            },
        );
    }

    group.finish();
}

/// Benchmark polymorphic resolution of image owners
fn bench_polymorphic_create(c: &mut Criterion) {
    let engine = create_engine();
    let store = create_store(&engine, 100);
    let mut i = 0i64;

    c.bench_function("polymorphic_create", |b| {
        b.iter(|| {
            i += 1;
            let owner_type = if i % 2 == 0 { "User" } else { "Company" };
            let mut session = store.session(&engine).unwrap();
            session
                .insert(
                    "Image",
                    Attributes::new().with("owner_id", i % 100 + 1).with("owner_type", owner_type),
                )
                .unwrap();
            black_box(session.commit().unwrap());
        });
    });
}

/// Benchmark reconciliation with varying dependent counts
fn bench_fix_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("fix_counts");
    group.sample_size(20);

    for reviews in [1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("reviews", reviews), &reviews, |b, &n| {
            let engine = create_engine();
            let store = create_store(&engine, 500);
            store.execute("BEGIN", &[]).unwrap();
            for i in 0..n as i64 {
                store
                    .execute(
                        "INSERT INTO reviews (user_id, value) VALUES (?, ?)",
                        &[Value::Integer(i % 500 + 1), Value::Real(2.0)],
                    )
                    .unwrap();
            }
            store.execute("COMMIT", &[]).unwrap();

            b.iter(|| {
                // Every pass after the first finds nothing to fix.
                black_box(
                    engine
                        .fix_counts(&store, "Review", &FixOptions::new().batch_size(100))
                        .unwrap(),
                );
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_create_and_commit,
    bench_polymorphic_create,
    bench_fix_counts,
);
criterion_main!(benches);
