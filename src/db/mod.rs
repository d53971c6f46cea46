//! The normalized database: entity tables keyed by [Ident] plus a root map.
//!
//! Entities are written by [NormalizedDb::merge_normalized] (see [merge]) and placed into
//! reference lists by the [targeting] operations. They are never removed implicitly;
//! [NormalizedDb::unreachable_entities] reports what an external collector could drop.

use petgraph::{
    graph::NodeIndex,
    visit::{depth_first_search, DfsEvent},
    Graph,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter},
};

use crate::{
    ident::{Ident, KeyValue},
    value::{props_to_json, Keyword, Props, Value},
    NormgraphError,
};

mod denormalize;
pub mod merge;
pub mod targeting;

pub use merge::MergeReport;
pub use targeting::Target;

/// Rows of one table, by primary key.
pub type Table = BTreeMap<KeyValue, Props>;

/// Where a set of fields lives.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Location {
    Root,
    Entity(Ident),
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Root => write!(f, "<root>"),
            Location::Entity(ident) => write!(f, "{ident}"),
        }
    }
}

/// A field at a [Location].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DbPath {
    pub location: Location,
    pub field: Keyword,
}

impl DbPath {
    pub fn root(field: Keyword) -> Self {
        DbPath {
            location: Location::Root,
            field,
        }
    }

    pub fn entity(ident: Ident, field: Keyword) -> Self {
        DbPath {
            location: Location::Entity(ident),
            field,
        }
    }
}

impl Display for DbPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.location, self.field)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedDb {
    tables: BTreeMap<Keyword, Table>,
    root: Props,
}

impl NormalizedDb {
    pub fn new() -> Self {
        NormalizedDb::default()
    }

    pub fn root(&self) -> &Props {
        &self.root
    }

    pub fn tables(&self) -> &BTreeMap<Keyword, Table> {
        &self.tables
    }

    pub fn table(&self, table: &Keyword) -> Option<&Table> {
        self.tables.get(table)
    }

    pub fn entity(&self, ident: &Ident) -> Option<&Props> {
        self.tables.get(&ident.table)?.get(&ident.key)
    }

    pub fn contains(&self, ident: &Ident) -> bool {
        self.entity(ident).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty() && self.tables.values().all(BTreeMap::is_empty)
    }

    pub fn entity_count(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn idents(&self) -> impl Iterator<Item = Ident> + '_ {
        self.tables.iter().flat_map(|(table, rows)| {
            rows.keys()
                .map(move |key| Ident::new(table.clone(), key.clone()))
        })
    }

    /// Store `props` as the entity's complete field set, returning what was there before.
    /// Merging is the normal way in; this is for seeding and tests.
    pub fn put_entity(&mut self, ident: Ident, props: Props) -> Option<Props> {
        self.tables
            .entry(ident.table)
            .or_default()
            .insert(ident.key, props)
    }

    pub fn set_root_field(&mut self, field: Keyword, value: Value) -> Option<Value> {
        self.root.insert(field, value)
    }

    pub fn props_at(&self, location: &Location) -> Option<&Props> {
        match location {
            Location::Root => Some(&self.root),
            Location::Entity(ident) => self.entity(ident),
        }
    }

    pub(crate) fn props_at_mut(&mut self, location: &Location) -> Option<&mut Props> {
        match location {
            Location::Root => Some(&mut self.root),
            Location::Entity(ident) => self.tables.get_mut(&ident.table)?.get_mut(&ident.key),
        }
    }

    pub fn get(&self, path: &DbPath) -> Option<&Value> {
        self.props_at(&path.location)?.get(&path.field)
    }

    fn locations(&self) -> impl Iterator<Item = (Location, &Props)> + '_ {
        std::iter::once((Location::Root, &self.root)).chain(self.tables.iter().flat_map(
            |(table, rows)| {
                rows.iter().map(move |(key, props)| {
                    (Location::Entity(Ident::new(table.clone(), key.clone())), props)
                })
            },
        ))
    }

    /// Every reference held by the root and the entities, with the field holding it.
    /// References nested inside lists and plain maps are reported under the top-level field.
    pub fn references(&self) -> Vec<(DbPath, Ident)> {
        let mut out = Vec::new();
        for (location, props) in self.locations() {
            for (field, value) in props.iter() {
                let mut refs = Vec::new();
                value.collect_refs(&mut refs);
                out.extend(refs.into_iter().map(|ident| {
                    (
                        DbPath {
                            location: location.clone(),
                            field: field.clone(),
                        },
                        ident.clone(),
                    )
                }));
            }
        }
        out
    }

    pub fn dangling_references(&self) -> Vec<(DbPath, Ident)> {
        self.references()
            .into_iter()
            .filter(|(_, ident)| !self.contains(ident))
            .collect()
    }

    /// Fails on the first reference without a table entry.
    pub fn check_integrity(&self) -> Result<(), NormgraphError> {
        match self.dangling_references().into_iter().next() {
            Some((path, ident)) => Err(NormgraphError::DanglingReference {
                path: path.to_string(),
                ident: ident.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// The reference graph: one node per location, one edge per reference to an existing
    /// entity.
    fn reference_graph(&self) -> (Graph<Location, Keyword>, BTreeMap<Location, NodeIndex>) {
        let mut graph = Graph::new();
        let mut index = BTreeMap::new();
        for (location, _) in self.locations() {
            index.insert(location.clone(), graph.add_node(location));
        }
        for (path, ident) in self.references() {
            let sink = Location::Entity(ident);
            if let (Some(source), Some(sink)) = (index.get(&path.location), index.get(&sink)) {
                graph.add_edge(*source, *sink, path.field);
            }
        }
        (graph, index)
    }

    /// Entities reachable from the root by following references.
    pub fn reachable_idents(&self) -> BTreeSet<Ident> {
        let (graph, index) = self.reference_graph();
        let mut reachable = BTreeSet::new();
        depth_first_search(&graph, Some(index[&Location::Root]), |event| {
            if let DfsEvent::Discover(node, _) = event {
                if let Location::Entity(ident) = &graph[node] {
                    reachable.insert(ident.clone());
                }
            }
        });
        reachable
    }

    /// Entities no chain of references from the root leads to.
    pub fn unreachable_entities(&self) -> Vec<Ident> {
        let reachable = self.reachable_idents();
        self.idents()
            .filter(|ident| !reachable.contains(ident))
            .collect()
    }

    /// Snapshot for inspection: `{"root": {...}, "tables": {":person": {"1": {...}}}}`.
    /// Primary keys are rendered with their display form.
    pub fn to_json(&self) -> serde_json::Value {
        let tables = self
            .tables
            .iter()
            .map(|(table, rows)| {
                let rows = rows
                    .iter()
                    .map(|(key, props)| (key.to_string(), props_to_json(props)))
                    .collect::<serde_json::Map<_, _>>();
                (table.to_string(), serde_json::Value::Object(rows))
            })
            .collect::<serde_json::Map<_, _>>();
        serde_json::json!({
            "root": props_to_json(&self.root),
            "tables": tables,
        })
    }
}

/// True for a list holding only references. The empty list qualifies.
pub(crate) fn all_refs(items: &[Value]) -> bool {
    items.iter().all(|item| matches!(item, Value::Ref(_)))
}
