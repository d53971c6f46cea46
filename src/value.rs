//! Values flowing through queries, response trees and the normalized database.
//!
//! Response trees are plain nested [`Value`]s whose maps are keyed by [`Keyword`]s. A
//! [`Value::Ref`] is a Reference: an [`Ident`] standing in for an entity stored in a table.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    str::FromStr,
};
use uuid::Uuid;

use crate::{ident::Ident, NormgraphError};

static KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_*+!?<>=-][\w*+!?<>=.-]*(?:/[A-Za-z_*+!?<>=-][\w*+!?<>=.-]*)?$")
        .expect("keyword pattern is a valid regex")
});

/// A stable symbolic name, optionally namespaced: `person/id`, displayed as `:person/id`.
///
/// Keywords name fields, root keys and tables. Construction validates the name, so any
/// `Keyword` value is a well-formed table name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Keyword(String);

impl Keyword {
    pub fn new(name: impl AsRef<str>) -> Result<Keyword, NormgraphError> {
        let name = name.as_ref();
        let name = name.strip_prefix(':').unwrap_or(name);
        if KEYWORD_RE.is_match(name) {
            Ok(Keyword(name.to_string()))
        } else {
            Err(NormgraphError::Serialization(format!(
                "'{name}' is not a valid keyword"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once('/').map(|(ns, _)| ns)
    }

    pub fn name(&self) -> &str {
        self.0.split_once('/').map(|(_, n)| n).unwrap_or(&self.0)
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, ":{}", self.0)
    }
}

impl FromStr for Keyword {
    type Err = NormgraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Keyword::new(s)
    }
}

impl TryFrom<&str> for Keyword {
    type Error = NormgraphError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Keyword::new(s)
    }
}

impl Serialize for Keyword {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Keyword {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Keyword::new(&s).map_err(de::Error::custom)
    }
}

/// Fields of an entity, of the root, or of any nested map.
pub type Props = BTreeMap<Keyword, Value>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Keyword(Keyword),
    Uuid(Uuid),
    List(Vec<Value>),
    Map(Props),
    Ref(Ident),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_ref_ident(&self) -> Option<&Ident> {
        match self {
            Value::Ref(ident) => Some(ident),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Props> {
        match self {
            Value::Map(props) => Some(props),
            _ => None,
        }
    }

    /// A list of references (an empty list counts).
    pub fn is_ref_list(&self) -> bool {
        match self {
            Value::List(items) => items.iter().all(|v| matches!(v, Value::Ref(_))),
            _ => false,
        }
    }

    pub fn refs<I: IntoIterator<Item = Ident>>(idents: I) -> Value {
        Value::List(idents.into_iter().map(Value::Ref).collect())
    }

    /// Collect every reference contained in this value, depth first.
    pub fn collect_refs<'a>(&'a self, out: &mut Vec<&'a Ident>) {
        match self {
            Value::Ref(ident) => out.push(ident),
            Value::List(items) => items.iter().for_each(|v| v.collect_refs(out)),
            Value::Map(props) => props.values().for_each(|v| v.collect_refs(out)),
            _ => {}
        }
    }

    /// Convert a JSON document into a value tree. Object keys must be valid keywords.
    pub fn from_json(json: &serde_json::Value) -> Result<Value, NormgraphError> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None if n.is_u64() => {
                    return Err(NormgraphError::Serialization(format!(
                        "integer {n} does not fit in a signed 64-bit value"
                    )))
                }
                None => Value::Float(n.as_f64().ok_or_else(|| {
                    NormgraphError::Serialization(format!("number {n} is not representable"))
                })?),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => Value::List(
                items
                    .iter()
                    .map(Value::from_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            serde_json::Value::Object(_) => Value::Map(props_from_json(json)?),
        })
    }

    /// Render the value as JSON. Keywords become `":ns/name"` strings and references
    /// become `[":table", key]` pairs.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(x) => serde_json::Value::from(*x),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Keyword(k) => serde_json::Value::String(k.to_string()),
            Value::Uuid(u) => serde_json::Value::String(u.to_string()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(props) => props_to_json(props),
            Value::Ref(ident) => ident.to_json(),
        }
    }
}

pub fn props_from_json(json: &serde_json::Value) -> Result<Props, NormgraphError> {
    let serde_json::Value::Object(map) = json else {
        return Err(NormgraphError::Serialization(format!(
            "expected a JSON object, found {json}"
        )));
    };
    map.iter()
        .map(|(k, v)| Ok((Keyword::new(k)?, Value::from_json(v)?)))
        .collect()
}

pub fn props_to_json(props: &Props) -> serde_json::Value {
    serde_json::Value::Object(
        props
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_json()))
            .collect(),
    )
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Keyword> for Value {
    fn from(k: Keyword) -> Self {
        Value::Keyword(k)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<Ident> for Value {
    fn from(ident: Ident) -> Self {
        Value::Ref(ident)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Props> for Value {
    fn from(props: Props) -> Self {
        Value::Map(props)
    }
}
