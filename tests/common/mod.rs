//! Shared fixture: a small review site with plain, multi-hop, self-referential
//! and polymorphic counters.

#![allow(dead_code)]

use counter_cache::{
    Attributes, Catalog, CounterDef, CounterEngine, Datastore, ModelDef, RegistryBuilder,
    SqliteStore, Value,
};
use std::sync::Arc;
use tempfile::TempDir;

pub const SCHEMA: &str = r#"
CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name TEXT,
    reviews_count INTEGER NOT NULL DEFAULT 0,
    using_count INTEGER NOT NULL DEFAULT 0,
    tried_count INTEGER NOT NULL DEFAULT 0,
    review_value_sum REAL NOT NULL DEFAULT 0,
    images_count INTEGER NOT NULL DEFAULT 0,
    videos_count INTEGER NOT NULL DEFAULT 0,
    marks_count INTEGER NOT NULL DEFAULT 0,
    photos_count INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT
);
CREATE TABLE companies (
    id INTEGER PRIMARY KEY,
    name TEXT,
    parent_id INTEGER,
    children_count INTEGER NOT NULL DEFAULT 0,
    grandchildren_count INTEGER NOT NULL DEFAULT 0,
    images_count INTEGER NOT NULL DEFAULT 0,
    videos_count INTEGER NOT NULL DEFAULT 0,
    marks_count INTEGER NOT NULL DEFAULT 0,
    photos_count INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT
);
CREATE TABLE categories (
    slug TEXT PRIMARY KEY,
    products_count INTEGER NOT NULL DEFAULT 0,
    reviews_count INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE products (
    id INTEGER PRIMARY KEY,
    name TEXT,
    category_slug TEXT,
    reviews_count INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE reviews (
    id INTEGER PRIMARY KEY,
    user_id INTEGER,
    product_id INTEGER,
    review_type TEXT,
    value REAL,
    body TEXT
);
CREATE TABLE images (id INTEGER PRIMARY KEY, owner_id INTEGER, owner_type TEXT);
CREATE TABLE videos (id INTEGER PRIMARY KEY, owner_id INTEGER, owner_type TEXT);
CREATE TABLE marks (id INTEGER PRIMARY KEY, mark_out_id INTEGER, mark_out_type TEXT);
CREATE TABLE albums (id INTEGER PRIMARY KEY, owner_id INTEGER, owner_type TEXT);
CREATE TABLE photos (id INTEGER PRIMARY KEY, album_id INTEGER);
"#;

pub fn catalog() -> Catalog {
    Catalog::new()
        .model(ModelDef::new("User", "users").timestamps(["updated_at"]))
        .model(
            ModelDef::new("Company", "companies")
                .timestamps(["updated_at"])
                .belongs_to("parent", "parent_id", "Company"),
        )
        .model(ModelDef::new("Category", "categories").primary_key("slug"))
        .model(ModelDef::new("Product", "products").belongs_to("category", "category_slug", "Category"))
        .model(
            ModelDef::new("Review", "reviews")
                .belongs_to("user", "user_id", "User")
                .belongs_to("product", "product_id", "Product"),
        )
        .model(ModelDef::new("Image", "images").polymorphic("owner", "owner_id", "owner_type"))
        .model(ModelDef::new("Video", "videos").polymorphic("owner", "owner_id", "owner_type"))
        .model(ModelDef::new("Mark", "marks").polymorphic("mark_out", "mark_out_id", "mark_out_type"))
        .model(ModelDef::new("Album", "albums").polymorphic("owner", "owner_id", "owner_type"))
        .model(ModelDef::new("Photo", "photos").belongs_to("album", "album_id", "Album"))
}

pub fn engine() -> CounterEngine {
    let registry = RegistryBuilder::new(Arc::new(catalog()))
        // reviews_count on users, bumping updated_at
        .counter("Review", CounterDef::new(["user"]).touch(true))
        .unwrap()
        // reviews_count on products
        .counter("Review", CounterDef::new(["product"]))
        .unwrap()
        // using_count / tried_count on users
        .counter(
            "Review",
            CounterDef::new(["user"])
                .dynamic_column(|review| {
                    review
                        .get("review_type")
                        .as_str()
                        .map(|kind| format!("{}_count", kind))
                })
                .column_conditions([
                    (Some("\"reviews\".\"review_type\" = 'using'"), "using_count"),
                    (Some("\"reviews\".\"review_type\" = 'tried'"), "tried_count"),
                ]),
        )
        .unwrap()
        .counter(
            "Review",
            CounterDef::new(["user"]).column("review_value_sum").delta_column("value"),
        )
        .unwrap()
        // reviews_count on categories, through the product
        .counter("Review", CounterDef::new(["product", "category"]))
        .unwrap()
        // products_count on the product's category and on the "all" category
        .counter(
            "Product",
            CounterDef::new(["category"]).foreign_key_override(|slug| {
                slug.cloned()
                    .into_iter()
                    .chain(std::iter::once(Value::from("all")))
                    .collect()
            }),
        )
        .unwrap()
        .counter("Company", CounterDef::new(["parent"]).column("children_count"))
        .unwrap()
        .counter("Company", CounterDef::new(["parent", "parent"]).column("grandchildren_count"))
        .unwrap()
        .counter("Image", CounterDef::new(["owner"]))
        .unwrap()
        .counter("Video", CounterDef::new(["owner"]))
        .unwrap()
        .counter("Mark", CounterDef::new(["mark_out", "owner"]))
        .unwrap()
        // photos_count on the album's owner, whatever its type
        .counter("Photo", CounterDef::new(["album", "owner"]))
        .unwrap()
        .build();
    CounterEngine::new(registry)
}

/// Route engine logs to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn test_store(dir: &TempDir, engine: &CounterEngine) -> SqliteStore {
    init_tracing();
    let store = SqliteStore::open(dir.path().join("counters.db")).unwrap();
    store.execute_batch(SCHEMA).unwrap();
    engine.registry().install_hooks(&store);
    store
}

pub fn memory_store(engine: &CounterEngine) -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    store.execute_batch(SCHEMA).unwrap();
    engine.registry().install_hooks(&store);
    store
}

/// Insert a row in its own committed session.
pub fn create(store: &SqliteStore, engine: &CounterEngine, model: &str, attrs: Attributes) -> Value {
    let mut session = store.session(engine).unwrap();
    let row = session.insert(model, attrs).unwrap();
    session.commit().unwrap();
    let pk = engine.registry().catalog().get(model).unwrap().primary_key.clone();
    row.get(&pk).clone()
}

pub fn update(store: &SqliteStore, engine: &CounterEngine, model: &str, key: impl Into<Value>, changes: Attributes) {
    let mut session = store.session(engine).unwrap();
    session.update(model, key, changes).unwrap();
    session.commit().unwrap();
}

pub fn destroy(store: &SqliteStore, engine: &CounterEngine, model: &str, key: impl Into<Value>) {
    let mut session = store.session(engine).unwrap();
    assert!(session.delete(model, key).unwrap());
    session.commit().unwrap();
}

/// Stored value of `column` on the row of `table` keyed by `key`.
pub fn column(store: &SqliteStore, table: &str, pk: &str, key: impl Into<Value>, column: &str) -> Value {
    store
        .find(table, pk, &key.into())
        .unwrap()
        .unwrap_or_else(|| panic!("no {} row", table))
        .get(column)
        .clone()
}

pub fn count(store: &SqliteStore, table: &str, key: impl Into<Value>, col: &str) -> i64 {
    column(store, table, "id", key, col).as_i64().unwrap()
}

/// Overwrite a stored counter, bypassing the engine.
pub fn corrupt(store: &SqliteStore, table: &str, pk: &str, key: impl Into<Value>, col: &str, value: impl Into<Value>) {
    store
        .execute(
            &format!("UPDATE \"{}\" SET \"{}\" = ? WHERE \"{}\" = ?", table, col, pk),
            &[value.into(), key.into()],
        )
        .unwrap();
}

pub fn user(store: &SqliteStore, engine: &CounterEngine, name: &str) -> Value {
    create(store, engine, "User", Attributes::new().with("name", name))
}

pub fn review(store: &SqliteStore, engine: &CounterEngine, user: &Value, product: &Value) -> Value {
    create(
        store,
        engine,
        "Review",
        Attributes::new()
            .with("user_id", user.clone())
            .with("product_id", product.clone()),
    )
}
