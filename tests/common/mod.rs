//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use normgraph::{
    ident::{Ident, IdentRule},
    query::{Component, Query, QueryElement},
    value::{props_from_json, Keyword, Props},
};
use std::path::PathBuf;
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times. Subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[allow(dead_code)]
pub fn kw(name: &str) -> Keyword {
    Keyword::new(name).unwrap()
}

#[allow(dead_code)]
pub fn ident(table: &str, key: i64) -> Ident {
    Ident::new(kw(table), key)
}

#[allow(dead_code)]
pub fn props(json: serde_json::Value) -> Props {
    props_from_json(&json).unwrap()
}

/// `Person [id name]` keyed into the `person` table.
#[allow(dead_code)]
pub fn person() -> Component {
    Component::new("Person")
        .with_ident(IdentRule::property_in(kw("person"), kw("id")))
        .with_query(vec![
            QueryElement::prop(kw("id")),
            QueryElement::prop(kw("name")),
        ])
}

/// `Root [{people Person}]`
#[allow(dead_code)]
pub fn people_query() -> Query {
    Component::new("Root")
        .with_query(vec![person().join(kw("people"))])
        .query()
}

/// Write `content` to `normgraph.toml` in a fresh temp directory.
///
/// Returns the directory guard (keep it alive) and the file path.
#[allow(dead_code)]
pub fn write_config(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("normgraph.toml");
    std::fs::write(&path, content).unwrap();
    (dir, path)
}
