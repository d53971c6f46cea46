//! Query-scoped deep merge of a [Normalized] delta into a [NormalizedDb].
//!
//! For every entity in the delta (and for the root), fields the query asked for and the
//! response held are written, fields the query asked for and the response lacked are
//! removed, and fields outside the query are left alone. Plain maps are merged key by key;
//! for inline components the same query scoping applies inside the map.
//! To-many reference lists keep their existing members and order, and gain the new
//! references at the end, unless [MergeOptions::remove_missing] asks for the list to
//! mirror the new result exactly.

use crate::{
    config::{MergeOptions, NormgraphConfig},
    event::MergeEvent,
    ident::Ident,
    normalize::{EntityDelta, InlineMissing, NormalizeDiagnostic, Normalized, Normalizer},
    query::Query,
    value::{Props, Value},
    NormgraphError,
};

use super::{all_refs, DbPath, Location, NormalizedDb, Target};

/// What a merge did, and what the normalization pass preceding it noticed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub events: Vec<MergeEvent>,
    pub diagnostics: Vec<NormalizeDiagnostic>,
}

impl NormalizedDb {
    /// Merge a normalized delta. Entities are merged independently of each other, so the
    /// order in which deltas for different idents arrive does not matter; for the same
    /// ident the last merge wins per field.
    ///
    /// Every reference in the delta must name an entity of the delta or of the database;
    /// otherwise nothing is written and [NormgraphError::DanglingReference] is returned.
    #[tracing::instrument(skip_all)]
    pub fn merge_normalized(
        &mut self,
        delta: &Normalized,
        options: &MergeOptions,
    ) -> Result<Vec<MergeEvent>, NormgraphError> {
        self.check_delta_references(delta)?;
        let mut events = Vec::new();
        for (table, rows) in delta.tables.iter() {
            let target = self.tables.entry(table.clone()).or_default();
            for (key, entity) in rows.iter() {
                let ident = Ident::new(table.clone(), key.clone());
                let props = target.entry(key.clone()).or_insert_with(|| {
                    events.push(MergeEvent::EntityCreated(ident.clone()));
                    Props::new()
                });
                merge_fields(Location::Entity(ident), props, entity, options, &mut events);
            }
        }
        merge_fields(Location::Root, &mut self.root, &delta.root, options, &mut events);
        tracing::debug!(
            "[NormalizedDb::merge_normalized] {} events, {} entities in db",
            events.len(),
            self.entity_count()
        );
        Ok(events)
    }

    fn check_delta_references(&self, delta: &Normalized) -> Result<(), NormgraphError> {
        let entities = delta.tables.iter().flat_map(|(table, rows)| {
            rows.iter().map(move |(key, entity)| {
                (Location::Entity(Ident::new(table.clone(), key.clone())), entity)
            })
        });
        for (location, entity) in std::iter::once((Location::Root, &delta.root)).chain(entities) {
            for (field, value) in entity.fields.iter() {
                let mut refs = Vec::new();
                value.collect_refs(&mut refs);
                let dangling = refs
                    .into_iter()
                    .find(|ident| !delta.contains(ident) && !self.contains(ident));
                if let Some(ident) = dangling {
                    let path = DbPath {
                        location: location.clone(),
                        field: field.clone(),
                    };
                    tracing::warn!(
                        "[NormalizedDb::merge_normalized] {} at {} has no entity",
                        ident,
                        path
                    );
                    return Err(NormgraphError::DanglingReference {
                        path: path.to_string(),
                        ident: ident.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Normalize `tree` against `query` and merge the result.
    pub fn merge_tree(
        &mut self,
        query: &Query,
        tree: &Props,
        config: &NormgraphConfig,
    ) -> Result<MergeReport, NormgraphError> {
        let normalized = Normalizer::new(config.normalize.clone()).normalize(query, tree)?;
        let events = self.merge_normalized(&normalized, &config.merge)?;
        Ok(MergeReport {
            events,
            diagnostics: normalized.diagnostics,
        })
    }

    /// Normalize and merge a single entity described by `query`, then place its ident at
    /// each of `targets` in order. If any target fails the database is left as it was.
    pub fn merge_component(
        &mut self,
        query: &Query,
        data: &Props,
        targets: &[Target],
        config: &NormgraphConfig,
    ) -> Result<(Ident, MergeReport), NormgraphError> {
        let normalizer = Normalizer::new(config.normalize.clone());
        let (ident, normalized) = normalizer.normalize_component(query, data)?;
        let mut next = self.clone();
        let mut events = next.merge_normalized(&normalized, &config.merge)?;
        events.extend(next.integrate_ident(&ident, targets)?);
        *self = next;
        Ok((
            ident,
            MergeReport {
                events,
                diagnostics: normalized.diagnostics,
            },
        ))
    }
}

fn merge_fields(
    location: Location,
    props: &mut Props,
    delta: &EntityDelta,
    options: &MergeOptions,
    events: &mut Vec<MergeEvent>,
) {
    let mut updated = Vec::new();
    for (field, value) in delta.fields.iter() {
        match props.get_mut(field) {
            Some(current) => {
                let pruned = merge_value(current, value, delta.inline.get(field), options);
                if !pruned.is_empty() {
                    let path = DbPath {
                        location: location.clone(),
                        field: field.clone(),
                    };
                    events.push(MergeEvent::ReferencesPruned(path, pruned));
                }
            }
            None => {
                props.insert(field.clone(), value.clone());
            }
        }
        updated.push(field.clone());
    }

    let removed = delta
        .missing
        .iter()
        .filter(|field| props.remove(*field).is_some())
        .cloned()
        .collect::<Vec<_>>();

    if !updated.is_empty() {
        events.push(MergeEvent::FieldsUpdated(location.clone(), updated));
    }
    if !removed.is_empty() {
        events.push(MergeEvent::FieldsRemoved(location, removed));
    }
}

/// Merge `new` into `current` in place. Returns references pruned from a to-many list.
///
/// `inline` names the queried keys an inline component lacked; they are removed from the
/// stored map.
fn merge_value(
    current: &mut Value,
    new: &Value,
    inline: Option<&InlineMissing>,
    options: &MergeOptions,
) -> Vec<Ident> {
    match (current, new) {
        (Value::List(existing), Value::List(incoming))
            if all_refs(existing.as_slice()) && all_refs(incoming.as_slice()) =>
        {
            if options.remove_missing {
                let pruned = existing
                    .iter()
                    .filter(|item| !incoming.contains(*item))
                    .filter_map(Value::as_ref_ident)
                    .cloned()
                    .collect();
                *existing = incoming.clone();
                pruned
            } else {
                for item in incoming.iter() {
                    if !existing.contains(item) {
                        existing.push(item.clone());
                    }
                }
                Vec::new()
            }
        }
        (Value::Map(existing), Value::Map(incoming)) => {
            let mut pruned = Vec::new();
            for (key, value) in incoming.iter() {
                match existing.get_mut(key) {
                    Some(current) => {
                        let nested = inline.and_then(|m| m.nested.get(key));
                        pruned.extend(merge_value(current, value, nested, options));
                    }
                    None => {
                        existing.insert(key.clone(), value.clone());
                    }
                }
            }
            if let Some(inline) = inline {
                for key in inline.missing.iter() {
                    existing.remove(key);
                }
            }
            pruned
        }
        (current, new) => {
            *current = new.clone();
            Vec::new()
        }
    }
}
