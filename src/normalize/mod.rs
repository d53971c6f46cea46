//! Tree-to-graph normalization.
//!
//! [`Normalizer::normalize`] walks a response tree in lock-step with an annotated
//! [`Query`]. At every join into an annotated component with an ident rule, the entity is
//! normalized recursively, recorded in the table deltas under its [`Ident`], and replaced
//! in the output by a [`Value::Ref`]. The result is a [`Normalized`] delta ready for
//! [`NormalizedDb::merge_normalized`](crate::db::NormalizedDb::merge_normalized).
//!
//! ## Projection and missing fields
//!
//! The query defines the projection: tree fields the query does not name are dropped.
//! Query fields the tree does not hold are recorded in [`EntityDelta::missing`] so that a
//! merge can remove them from stored entities.
//!
//! ## Cycles and depth
//!
//! The idents on the current traversal path are kept on a stack. Meeting one of them again
//! emits a reference without recursing. Recursive joins may carry an explicit depth limit,
//! and every pass is bounded by [`NormalizeConfig::max_depth`].

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    config::{ErrorPolicy, NormalizeConfig},
    ident::{Ident, KeyValue},
    query::{Join, JoinTarget, Query, QueryElement, RecursionLimit, UnionQuery},
    value::{Keyword, Props, Value},
    NormgraphError,
};

pub mod diagnostic;

pub use diagnostic::{NormalizeDiagnostic, TreePath};

/// Normalized fields for one entity (or for the root).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityDelta {
    /// Queried fields present in the response, with joins replaced by references.
    pub fields: Props,
    /// Queried fields absent from the response.
    pub missing: BTreeSet<Keyword>,
    /// Missing-field records for inline components (annotated, without an ident rule)
    /// held by a to-one field of this delta.
    pub inline: BTreeMap<Keyword, InlineMissing>,
}

/// Queried keys an inline component lacked, and the same for inline components nested in
/// it. Lets a merge remove them from the stored map the way it removes entity fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineMissing {
    pub missing: BTreeSet<Keyword>,
    pub nested: BTreeMap<Keyword, InlineMissing>,
}

impl From<EntityDelta> for InlineMissing {
    fn from(delta: EntityDelta) -> Self {
        InlineMissing {
            missing: delta.missing,
            nested: delta.inline,
        }
    }
}

impl EntityDelta {
    /// Combine another occurrence of the same entity into this one. A field present in
    /// either occurrence beats "missing"; for fields present in both the later value wins.
    pub fn absorb(&mut self, other: EntityDelta) {
        for (key, value) in other.fields {
            self.missing.remove(&key);
            self.inline.remove(&key);
            self.fields.insert(key, value);
        }
        self.inline.extend(other.inline);
        for key in other.missing {
            if !self.fields.contains_key(&key) {
                self.missing.insert(key);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.missing.is_empty()
    }
}

pub type TableDeltas = BTreeMap<Keyword, BTreeMap<KeyValue, EntityDelta>>;

/// Output of one normalization pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub tables: TableDeltas,
    pub root: EntityDelta,
    pub diagnostics: Vec<NormalizeDiagnostic>,
}

impl Normalized {
    pub fn entity(&self, ident: &Ident) -> Option<&EntityDelta> {
        self.tables.get(&ident.table)?.get(&ident.key)
    }

    pub fn contains(&self, ident: &Ident) -> bool {
        self.entity(ident).is_some()
    }

    pub fn idents(&self) -> impl Iterator<Item = Ident> + '_ {
        self.tables.iter().flat_map(|(table, rows)| {
            rows.keys()
                .map(move |key| Ident::new(table.clone(), key.clone()))
        })
    }

    /// Every reference in the root delta and in the entity deltas.
    pub fn references(&self) -> Vec<&Ident> {
        let mut out = Vec::new();
        let entity_fields = self.tables.values().flat_map(|rows| rows.values());
        for delta in std::iter::once(&self.root).chain(entity_fields) {
            for value in delta.fields.values() {
                value.collect_refs(&mut out);
            }
        }
        out
    }

    /// References without an entity delta. Empty for any pass over a tree that held no
    /// references of its own.
    pub fn dangling_references(&self) -> Vec<Ident> {
        let dangling: BTreeSet<Ident> = self
            .references()
            .into_iter()
            .filter(|ident| !self.contains(ident))
            .cloned()
            .collect();
        dangling.into_iter().collect()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(NormalizeDiagnostic::is_error)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizeConfig,
}

impl Normalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Normalizer { config }
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    /// Normalize a response tree rooted at the database root.
    #[tracing::instrument(skip_all)]
    pub fn normalize(&self, query: &Query, tree: &Props) -> Result<Normalized, NormgraphError> {
        let mut pass = Pass::new(&self.config);
        let root = pass.normalize_props(query, tree, 0, 0)?;
        let normalized = pass.finish(root);
        tracing::debug!(
            "[Normalizer::normalize] {} tables, {} entities, {} diagnostics",
            normalized.tables.len(),
            normalized.tables.values().map(BTreeMap::len).sum::<usize>(),
            normalized.diagnostics.len()
        );
        Ok(normalized)
    }

    /// Normalize the props of a single entity described by `query`, which must be annotated
    /// with an ident rule. Returns the entity's ident and a delta with an empty root.
    pub fn normalize_component(
        &self,
        query: &Query,
        data: &Props,
    ) -> Result<(Ident, Normalized), NormgraphError> {
        let rule = query.ident_rule().ok_or_else(|| {
            let component = query.component().unwrap_or("<unannotated>");
            NormgraphError::MissingAnnotation(component.to_string())
        })?;
        let ident = rule.resolve(data)?;
        let mut pass = Pass::new(&self.config);
        pass.visited.push(ident.clone());
        let delta = pass.normalize_props(query, data, 1, 0)?;
        pass.visited.pop();
        pass.record(ident.clone(), delta);
        Ok((ident, pass.finish(EntityDelta::default())))
    }
}

#[derive(Clone, Copy)]
enum EntityTarget<'q> {
    Query(&'q Query),
    Union(&'q UnionQuery),
}

/// Mutable state of a single normalization pass.
struct Pass<'c> {
    config: &'c NormalizeConfig,
    tables: TableDeltas,
    diagnostics: Vec<NormalizeDiagnostic>,
    path: TreePath,
    /// Idents on the current traversal path.
    visited: Vec<Ident>,
}

impl<'c> Pass<'c> {
    fn new(config: &'c NormalizeConfig) -> Self {
        Pass {
            config,
            tables: TableDeltas::new(),
            diagnostics: Vec::new(),
            path: TreePath::new(),
            visited: Vec::new(),
        }
    }

    fn finish(self, root: EntityDelta) -> Normalized {
        Normalized {
            tables: self.tables,
            root,
            diagnostics: self.diagnostics,
        }
    }

    fn record(&mut self, ident: Ident, delta: EntityDelta) {
        let rows = self.tables.entry(ident.table).or_default();
        match rows.get_mut(&ident.key) {
            Some(existing) => existing.absorb(delta),
            None => {
                rows.insert(ident.key, delta);
            }
        }
    }

    fn normalize_props(
        &mut self,
        query: &Query,
        data: &Props,
        depth: usize,
        recursion: usize,
    ) -> Result<EntityDelta, NormgraphError> {
        let mut delta = EntityDelta::default();
        for element in query.elements.iter() {
            let key = element.key();
            let Some(value) = data.get(key) else {
                delta.missing.insert(key.clone());
                continue;
            };
            match element {
                QueryElement::Prop(_) => {
                    delta.fields.insert(key.clone(), value.clone());
                }
                QueryElement::Join(join) => {
                    self.path.push(key.as_str().to_string());
                    let normalized = self.normalize_join(join, query, value, depth, recursion);
                    self.path.pop();
                    if let Some((normalized, inline)) = normalized? {
                        if let Some(inline) = inline {
                            delta.inline.insert(key.clone(), inline);
                        }
                        delta.fields.insert(key.clone(), normalized);
                    }
                }
            }
        }
        Ok(delta)
    }

    /// `None` means the key is omitted: a recursive join past its depth limit.
    fn normalize_join(
        &mut self,
        join: &Join,
        parent: &Query,
        value: &Value,
        depth: usize,
        recursion: usize,
    ) -> Result<Option<(Value, Option<InlineMissing>)>, NormgraphError> {
        let (target, recursion) = match &join.target {
            JoinTarget::Query(q) => (EntityTarget::Query(q), 0),
            JoinTarget::Union(u) => (EntityTarget::Union(u), 0),
            JoinTarget::Recursive(RecursionLimit::Depth(limit)) => {
                if recursion >= *limit {
                    return Ok(None);
                }
                (EntityTarget::Query(parent), recursion + 1)
            }
            JoinTarget::Recursive(RecursionLimit::Unbounded) => {
                (EntityTarget::Query(parent), recursion + 1)
            }
        };

        match value {
            Value::Null | Value::Ref(_) => Ok(Some((value.clone(), None))),
            Value::Map(data) => self
                .normalize_entity(&join.key, target, data, depth, recursion)
                .map(Some),
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    self.path.push(idx.to_string());
                    let normalized = match item {
                        Value::Map(data) => self
                            .normalize_entity(&join.key, target, data, depth, recursion)
                            .map(|(value, _)| value),
                        other => Ok(other.clone()),
                    };
                    self.path.pop();
                    out.push(normalized?);
                }
                Ok(Some((Value::List(out), None)))
            }
            other => {
                tracing::warn!(
                    "[Normalizer] join {} at {:?} holds a scalar, passing it through",
                    join.key,
                    self.path
                );
                self.diagnostics
                    .push(NormalizeDiagnostic::UnexpectedJoinValue {
                        path: self.path.clone(),
                        key: join.key.clone(),
                    });
                Ok(Some((other.clone(), None)))
            }
        }
    }

    /// The second element is set for inline components only. Items of a to-many join
    /// drop it: a list of plain maps is replaced wholesale by a merge.
    fn normalize_entity(
        &mut self,
        key: &Keyword,
        target: EntityTarget<'_>,
        data: &Props,
        depth: usize,
        recursion: usize,
    ) -> Result<(Value, Option<InlineMissing>), NormgraphError> {
        let query = match target {
            EntityTarget::Query(q) => q,
            EntityTarget::Union(union) => match union.select_branch(data) {
                Ok(Some(q)) => q,
                Ok(None) => {
                    tracing::warn!(
                        "[Normalizer] no branch of union {} matches the data at {:?}",
                        key,
                        self.path
                    );
                    self.diagnostics.push(NormalizeDiagnostic::UnmatchedUnion {
                        path: self.path.clone(),
                        key: key.clone(),
                    });
                    return Ok((Value::Map(data.clone()), None));
                }
                Err(e) => return self.ident_failure(e, data),
            },
        };

        let Some(meta) = &query.meta else {
            tracing::warn!(
                "[Normalizer] join {} at {:?} has no ident annotation; leaving data embedded",
                key,
                self.path
            );
            self.diagnostics.push(NormalizeDiagnostic::UnannotatedJoin {
                path: self.path.clone(),
                key: key.clone(),
            });
            return Ok((Value::Map(data.clone()), None));
        };

        if depth >= self.config.max_depth {
            if self.config.error_policy == ErrorPolicy::FailFast {
                return Err(NormgraphError::DepthExceeded(self.config.max_depth));
            }
            tracing::warn!(
                "[Normalizer] depth limit {} reached at {:?}",
                self.config.max_depth,
                self.path
            );
            self.diagnostics.push(NormalizeDiagnostic::DepthLimit {
                path: self.path.clone(),
                depth: self.config.max_depth,
            });
            return Ok((Value::Map(data.clone()), None));
        }

        let Some(rule) = &meta.ident else {
            // No table for this component: keep it inline, but normalize its joins.
            let mut delta = self.normalize_props(query, data, depth + 1, recursion)?;
            let fields = std::mem::take(&mut delta.fields);
            return Ok((Value::Map(fields), Some(delta.into())));
        };

        let ident = match rule.resolve(data) {
            Ok(ident) => ident,
            Err(e) => return self.ident_failure(e, data),
        };

        if self.visited.contains(&ident) {
            tracing::debug!("[Normalizer] {} repeats at {:?}", ident, self.path);
            self.diagnostics.push(NormalizeDiagnostic::CycleDetected {
                path: self.path.clone(),
                ident: ident.clone(),
            });
            return Ok((Value::Ref(ident), None));
        }

        self.visited.push(ident.clone());
        let delta = self.normalize_props(query, data, depth + 1, recursion);
        self.visited.pop();
        self.record(ident.clone(), delta?);
        Ok((Value::Ref(ident), None))
    }

    fn ident_failure(
        &mut self,
        error: NormgraphError,
        data: &Props,
    ) -> Result<(Value, Option<InlineMissing>), NormgraphError> {
        if self.config.error_policy == ErrorPolicy::FailFast || !error.is_ident_error() {
            return Err(error);
        }
        tracing::warn!("[Normalizer] {} at {:?}", error, self.path);
        self.diagnostics.push(NormalizeDiagnostic::MalformedIdent {
            path: self.path.clone(),
            message: error.to_string(),
        });
        Ok((Value::Map(data.clone()), None))
    }
}

#[cfg(test)]
mod tests;
