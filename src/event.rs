use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{
    db::{DbPath, Location},
    ident::Ident,
    value::Keyword,
};

/// Changes applied to a [crate::db::NormalizedDb] by a merge or a targeting operation,
/// in the order they happened. Consumers use them to invalidate views of the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MergeEvent {
    /// The entity had no row in its table before this merge.
    EntityCreated(Ident),
    /// Fields written at a location (root or entity), whether or not the value changed.
    FieldsUpdated(Location, Vec<Keyword>),
    /// Queried fields absent from the response, removed from the location.
    FieldsRemoved(Location, Vec<Keyword>),
    /// References dropped from a to-many list by a `remove_missing` merge or by
    /// [crate::db::NormalizedDb::remove_ref].
    ReferencesPruned(DbPath, Vec<Ident>),
    /// A reference list or to-one reference was edited by a targeting operation.
    ReferenceTargeted(DbPath),
}

impl MergeEvent {
    /// The location the event touched.
    pub fn location(&self) -> Location {
        match self {
            MergeEvent::EntityCreated(ident) => Location::Entity(ident.clone()),
            MergeEvent::FieldsUpdated(location, _) | MergeEvent::FieldsRemoved(location, _) => {
                location.clone()
            }
            MergeEvent::ReferencesPruned(path, _) | MergeEvent::ReferenceTargeted(path) => {
                path.location.clone()
            }
        }
    }
}

impl Display for MergeEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            MergeEvent::EntityCreated(ident) => write!(f, "EntityCreated {ident}"),
            MergeEvent::FieldsUpdated(location, fields) => {
                write!(f, "FieldsUpdated {location} ({} fields)", fields.len())
            }
            MergeEvent::FieldsRemoved(location, fields) => {
                write!(f, "FieldsRemoved {location} ({} fields)", fields.len())
            }
            MergeEvent::ReferencesPruned(path, idents) => {
                write!(f, "ReferencesPruned {path} ({} refs)", idents.len())
            }
            MergeEvent::ReferenceTargeted(path) => write!(f, "ReferenceTargeted {path}"),
        }
    }
}
