//! Reference editing at a [DbPath].
//!
//! Every operation checks its inputs before touching the database: the location must
//! exist, the field must hold a reference list where one is needed (an absent or null field
//! counts as the empty list), and every ident placed must already have an entity. Nothing
//! beyond that empty list is ever created.

use serde::{Deserialize, Serialize};

use crate::{
    event::MergeEvent,
    ident::Ident,
    value::{Props, Value},
    NormgraphError,
};

use super::{all_refs, DbPath, NormalizedDb};

/// Where [NormalizedDb::integrate_ident] places an ident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Append(DbPath),
    Prepend(DbPath),
    Replace(DbPath),
    ReplaceAt(DbPath, usize),
}

impl Target {
    pub fn path(&self) -> &DbPath {
        match self {
            Target::Append(path)
            | Target::Prepend(path)
            | Target::Replace(path)
            | Target::ReplaceAt(path, _) => path,
        }
    }
}

impl NormalizedDb {
    /// Overwrite the field with a to-one reference.
    pub fn replace_ref(
        &mut self,
        path: &DbPath,
        ident: &Ident,
    ) -> Result<MergeEvent, NormgraphError> {
        self.require_entities(path, std::slice::from_ref(ident))?;
        self.field_props_mut(path)?
            .insert(path.field.clone(), Value::Ref(ident.clone()));
        Ok(MergeEvent::ReferenceTargeted(path.clone()))
    }

    /// Overwrite the field with a to-many reference list.
    pub fn replace_refs(
        &mut self,
        path: &DbPath,
        idents: &[Ident],
    ) -> Result<MergeEvent, NormgraphError> {
        self.require_entities(path, idents)?;
        self.field_props_mut(path)?
            .insert(path.field.clone(), Value::refs(idents.iter().cloned()));
        Ok(MergeEvent::ReferenceTargeted(path.clone()))
    }

    /// Add idents to the end of the list, skipping those already in it.
    pub fn append_refs(
        &mut self,
        path: &DbPath,
        idents: &[Ident],
    ) -> Result<MergeEvent, NormgraphError> {
        self.require_entities(path, idents)?;
        let list = self.ref_list_mut(path)?;
        for ident in idents {
            let item = Value::Ref(ident.clone());
            if !list.contains(&item) {
                list.push(item);
            }
        }
        Ok(MergeEvent::ReferenceTargeted(path.clone()))
    }

    /// Add idents to the front of the list in the given order, skipping those already in it.
    pub fn prepend_refs(
        &mut self,
        path: &DbPath,
        idents: &[Ident],
    ) -> Result<MergeEvent, NormgraphError> {
        self.require_entities(path, idents)?;
        let list = self.ref_list_mut(path)?;
        let mut front: Vec<Value> = Vec::with_capacity(idents.len());
        for ident in idents {
            let item = Value::Ref(ident.clone());
            if !list.contains(&item) && !front.contains(&item) {
                front.push(item);
            }
        }
        list.splice(0..0, front);
        Ok(MergeEvent::ReferenceTargeted(path.clone()))
    }

    pub fn replace_ref_at(
        &mut self,
        path: &DbPath,
        index: usize,
        ident: &Ident,
    ) -> Result<MergeEvent, NormgraphError> {
        self.require_entities(path, std::slice::from_ref(ident))?;
        let props = self.field_props_mut(path)?;
        let list = match props.get_mut(&path.field) {
            None | Some(Value::Null) => {
                return Err(NormgraphError::OutOfBounds {
                    path: path.to_string(),
                    index,
                    len: 0,
                })
            }
            Some(Value::List(items)) if all_refs(items.as_slice()) => items,
            Some(_) => return Err(NormgraphError::NotAReferenceList(path.to_string())),
        };
        let len = list.len();
        let slot = list.get_mut(index).ok_or_else(|| NormgraphError::OutOfBounds {
            path: path.to_string(),
            index,
            len,
        })?;
        *slot = Value::Ref(ident.clone());
        Ok(MergeEvent::ReferenceTargeted(path.clone()))
    }

    /// Remove `ident` from a to-many list, or clear a to-one reference to it (the field
    /// becomes null). Returns `None` when the field did not refer to `ident`.
    pub fn remove_ref(
        &mut self,
        path: &DbPath,
        ident: &Ident,
    ) -> Result<Option<MergeEvent>, NormgraphError> {
        let props = self.field_props_mut(path)?;
        let item = Value::Ref(ident.clone());
        let removed = match props.get_mut(&path.field) {
            None | Some(Value::Null) => false,
            Some(value @ Value::Ref(_)) => {
                let matches = *value == item;
                if matches {
                    *value = Value::Null;
                }
                matches
            }
            Some(Value::List(items)) if all_refs(items.as_slice()) => {
                let before = items.len();
                items.retain(|v| *v != item);
                items.len() != before
            }
            Some(_) => return Err(NormgraphError::NotAReferenceList(path.to_string())),
        };
        Ok(removed.then(|| MergeEvent::ReferencesPruned(path.clone(), vec![ident.clone()])))
    }

    /// Place `ident` at each target in order. Either every target applies or the database
    /// is left as it was.
    pub fn integrate_ident(
        &mut self,
        ident: &Ident,
        targets: &[Target],
    ) -> Result<Vec<MergeEvent>, NormgraphError> {
        let saved = targets
            .iter()
            .map(|target| (target.path().clone(), self.get(target.path()).cloned()))
            .collect::<Vec<_>>();
        let mut events = Vec::with_capacity(targets.len());
        for target in targets {
            let applied = match target {
                Target::Append(path) => self.append_refs(path, std::slice::from_ref(ident)),
                Target::Prepend(path) => self.prepend_refs(path, std::slice::from_ref(ident)),
                Target::Replace(path) => self.replace_ref(path, ident),
                Target::ReplaceAt(path, index) => self.replace_ref_at(path, *index, ident),
            };
            match applied {
                Ok(event) => events.push(event),
                Err(e) => {
                    self.restore(saved);
                    return Err(e);
                }
            }
        }
        tracing::debug!(
            "[NormalizedDb::integrate_ident] placed {} at {} targets",
            ident,
            targets.len()
        );
        Ok(events)
    }

    fn restore(&mut self, saved: Vec<(DbPath, Option<Value>)>) {
        for (path, value) in saved.into_iter().rev() {
            let Some(props) = self.props_at_mut(&path.location) else {
                continue;
            };
            match value {
                Some(value) => props.insert(path.field, value),
                None => props.remove(&path.field),
            };
        }
    }

    fn require_entities(&self, path: &DbPath, idents: &[Ident]) -> Result<(), NormgraphError> {
        match idents.iter().find(|ident| !self.contains(ident)) {
            Some(ident) => Err(NormgraphError::DanglingReference {
                path: path.to_string(),
                ident: ident.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn field_props_mut(&mut self, path: &DbPath) -> Result<&mut Props, NormgraphError> {
        self.props_at_mut(&path.location)
            .ok_or_else(|| NormgraphError::PathNotFound(path.to_string()))
    }

    fn ref_list_mut(&mut self, path: &DbPath) -> Result<&mut Vec<Value>, NormgraphError> {
        let props = self.field_props_mut(path)?;
        let value = props
            .entry(path.field.clone())
            .or_insert_with(|| Value::List(Vec::new()));
        if value.is_null() {
            *value = Value::List(Vec::new());
        }
        match value {
            Value::List(items) if all_refs(items.as_slice()) => Ok(items),
            _ => Err(NormgraphError::NotAReferenceList(path.to_string())),
        }
    }
}
