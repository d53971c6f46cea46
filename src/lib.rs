//! # normgraph
//!
//! A normalized client-side graph database: nested query responses go in, flat entity tables
//! joined by references come out, and later responses are deep-merged into what is already
//! there.
//!
//! ## Overview
//!
//! UI components declare the data they need as a [`query::Query`]. Components that stand for
//! an entity also carry an [`ident::IdentRule`] telling how to derive the entity's
//! [`ident::Ident`] (its table and primary key) from its props. That annotation travels with
//! the query fragment through composition and serialization, so a response tree fetched for
//! the composed root query can be taken apart again: each entity lands in its table exactly
//! once, and every place it appeared holds a reference instead.
//!
//! ### Key Features
//!
//! - **Annotated queries**: each query fragment carries its component's ident rule as part
//!   of its value, so the annotation survives composition and serialization
//! - **Normalization**: to-one, to-many, union and recursive joins, with cycle detection
//! - **Query-scoped merge**: fields the query asked for are replaced or removed; everything
//!   else is preserved
//! - **Targeting**: append, prepend, replace and remove references at a database path
//! - **Denormalization** and integrity checks over the reference graph
//! - **Error tolerance**: malformed data is reported as diagnostics under the default policy
//!
//! ## Architecture
//!
//! - **[`value`]**: [`value::Keyword`], [`value::Value`] and the JSON bridge
//! - **[`ident`]**: [`ident::Ident`] and [`ident::IdentRule`]
//! - **[`registry`]**: named computed ident rules, looked up when a query is deserialized
//! - **[`query`]**: annotated queries and [`query::Component`]
//! - **[`normalize`]**: the tree to graph [`normalize::Normalizer`] and its diagnostics
//! - **[`db`]**: [`db::NormalizedDb`], merge, targeting, denormalization and integrity
//! - **[`event`]**: [`event::MergeEvent`]s reporting what a merge changed
//! - **[`config`]**: TOML configuration
//!
//! ## Quick Start
//!
//! ```rust
//! use normgraph::{
//!     config::NormgraphConfig,
//!     db::NormalizedDb,
//!     ident::{Ident, IdentRule},
//!     query::{Component, QueryElement},
//!     value::{props_from_json, Keyword, Value},
//! };
//!
//! # fn main() -> Result<(), normgraph::NormgraphError> {
//! let person = Component::new("Person")
//!     .with_ident(IdentRule::property_in(Keyword::new("person")?, Keyword::new("id")?))
//!     .with_query(vec![
//!         QueryElement::prop(Keyword::new("id")?),
//!         QueryElement::prop(Keyword::new("name")?),
//!     ]);
//! let root = Component::new("Root")
//!     .with_query(vec![person.join(Keyword::new("people")?)])
//!     .query();
//!
//! let response = props_from_json(&serde_json::json!({
//!     "people": [{"id": 1, "name": "Alice"}, {"id": 2, "name": "Bob"}]
//! }))?;
//!
//! let mut db = NormalizedDb::new();
//! let report = db.merge_tree(&root, &response, &NormgraphConfig::default())?;
//! assert!(report.diagnostics.is_empty());
//!
//! let alice = Ident::new(Keyword::new("person")?, 1_i64);
//! assert_eq!(
//!     db.entity(&alice).and_then(|props| props.get(&Keyword::new("name").ok()?)),
//!     Some(&Value::from("Alice"))
//! );
//! assert_eq!(db.denormalize(&root), response);
//! # Ok(())
//! # }
//! ```
//!
//! ### Working with Diagnostics
//!
//! Problems in the response that do not stop the pass are returned alongside the result:
//!
//! ```rust
//! # use normgraph::{normalize::{NormalizeDiagnostic, Normalizer}, query::{Query, QueryElement}, value::{props_from_json, Keyword}};
//! # fn main() -> Result<(), normgraph::NormgraphError> {
//! let settings = Query::new(vec![QueryElement::prop(Keyword::new("theme")?)]);
//! let root = Query::new(vec![QueryElement::join(Keyword::new("settings")?, settings)]);
//! let tree = props_from_json(&serde_json::json!({"settings": {"theme": "dark"}}))?;
//!
//! let normalized = Normalizer::default().normalize(&root, &tree)?;
//! for diagnostic in normalized.diagnostics.iter() {
//!     match diagnostic {
//!         NormalizeDiagnostic::UnannotatedJoin { key, .. } => {
//!             println!("{key} has no ident annotation; left embedded");
//!         }
//!         other => println!("{other}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Query-scoped merge
//!
//! For every entity in a response, fields the query named and the response held are
//! written, fields the query named and the response lacked are removed, and fields outside
//! the query are left untouched. To-many reference lists keep their members unless
//! `merge.remove_missing` is set.
//!
//! ### Entities are never collected implicitly
//!
//! Dropping a reference never drops the entity. [`db::NormalizedDb::unreachable_entities`]
//! reports entities the root no longer leads to.

pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod ident;
pub mod normalize;
pub mod query;
pub mod registry;
#[cfg(test)]
mod tests;
pub mod value;

pub use error::*;
