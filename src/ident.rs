//! [crate::ident] contains [Ident], the `(table, primary key)` pair addressing an entity in a
//! [crate::db::NormalizedDb], and [IdentRule], the per-component rule that derives an Ident
//! from the props found at an entity boundary.
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt::{Debug, Display, Formatter},
    str::FromStr,
    sync::Arc,
};
use uuid::Uuid;

use crate::{
    registry::{ComputedFn, IDENT_RULES},
    value::{Keyword, Props, Value},
    NormgraphError,
};

/// A primary key value. Totally ordered so tables can be kept sorted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyValue {
    Int(i64),
    Str(String),
    Uuid(Uuid),
    Keyword(Keyword),
    Composite(Vec<KeyValue>),
}

impl KeyValue {
    pub fn to_json(&self) -> serde_json::Value {
        Value::from(self.clone()).to_json()
    }
}

impl Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyValue::Int(i) => write!(f, "{i}"),
            KeyValue::Str(s) => write!(f, "{}", serde_json::Value::from(s.as_str())),
            KeyValue::Uuid(u) => write!(f, "#uuid \"{u}\""),
            KeyValue::Keyword(k) => write!(f, "{k}"),
            KeyValue::Composite(parts) => {
                write!(f, "[")?;
                for (idx, part) in parts.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl TryFrom<&Value> for KeyValue {
    type Error = NormgraphError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(i) => Ok(KeyValue::Int(*i)),
            Value::Str(s) => Ok(KeyValue::Str(s.clone())),
            Value::Uuid(u) => Ok(KeyValue::Uuid(*u)),
            Value::Keyword(k) => Ok(KeyValue::Keyword(k.clone())),
            Value::List(parts) if !parts.is_empty() => Ok(KeyValue::Composite(
                parts
                    .iter()
                    .map(KeyValue::try_from)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            other => Err(NormgraphError::MalformedIdent(format!(
                "{other:?} cannot be used as a primary key"
            ))),
        }
    }
}

impl From<KeyValue> for Value {
    fn from(key: KeyValue) -> Self {
        match key {
            KeyValue::Int(i) => Value::Int(i),
            KeyValue::Str(s) => Value::Str(s),
            KeyValue::Uuid(u) => Value::Uuid(u),
            KeyValue::Keyword(k) => Value::Keyword(k),
            KeyValue::Composite(parts) => {
                Value::List(parts.into_iter().map(Value::from).collect())
            }
        }
    }
}

impl From<i64> for KeyValue {
    fn from(i: i64) -> Self {
        KeyValue::Int(i)
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::Str(s.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(s: String) -> Self {
        KeyValue::Str(s)
    }
}

impl From<Uuid> for KeyValue {
    fn from(u: Uuid) -> Self {
        KeyValue::Uuid(u)
    }
}

impl From<Keyword> for KeyValue {
    fn from(k: Keyword) -> Self {
        KeyValue::Keyword(k)
    }
}

/// Identifies an entity: the table it lives in and its primary key within that table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ident {
    pub table: Keyword,
    pub key: KeyValue,
}

impl Ident {
    pub fn new(table: Keyword, key: impl Into<KeyValue>) -> Self {
        Ident {
            table,
            key: key.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(vec![
            serde_json::Value::String(self.table.to_string()),
            self.key.to_json(),
        ])
    }
}

impl Display for Ident {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {}]", self.table, self.key)
    }
}

/// Accepts a reference, or a two element list whose first element is a keyword.
impl TryFrom<&Value> for Ident {
    type Error = NormgraphError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Ref(ident) => Ok(ident.clone()),
            Value::List(pair) if pair.len() == 2 => {
                let Value::Keyword(table) = &pair[0] else {
                    return Err(NormgraphError::MalformedIdent(format!(
                        "ident table {:?} is not a keyword",
                        pair[0]
                    )));
                };
                Ok(Ident {
                    table: table.clone(),
                    key: KeyValue::try_from(&pair[1])?,
                })
            }
            other => Err(NormgraphError::MalformedIdent(format!(
                "expected a (table, key) pair, found {other:?}"
            ))),
        }
    }
}

/// Parses the display form: `[:person/id 1]`, `[:person/email "a@b.c"]`,
/// `[:ui/panel :main]` or `[:doc/id #uuid "..."]`. String keys are quoted with JSON
/// escapes. Composite keys are not supported here.
impl FromStr for Ident {
    type Err = NormgraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| NormgraphError::MalformedIdent(format!("'{s}' is not bracketed")))?;
        let (table, key) = inner
            .trim()
            .split_once(char::is_whitespace)
            .ok_or_else(|| NormgraphError::MalformedIdent(format!("'{s}' has no key")))?;
        let table = Keyword::new(table)
            .map_err(|_| NormgraphError::MalformedIdent(format!("'{table}' is not a table")))?;
        let key = key.trim();
        let key = if let Some(uuid) = key.strip_prefix("#uuid") {
            KeyValue::Uuid(Uuid::parse_str(uuid.trim().trim_matches('"'))?)
        } else if key.starts_with('"') {
            KeyValue::Str(serde_json::from_str::<String>(key).map_err(|e| {
                NormgraphError::MalformedIdent(format!("'{key}' is not a quoted string: {e}"))
            })?)
        } else if key.starts_with(':') {
            KeyValue::Keyword(Keyword::new(key)?)
        } else {
            KeyValue::Int(key.parse::<i64>().map_err(|_| {
                NormgraphError::MalformedIdent(format!("'{key}' is not a supported key"))
            })?)
        };
        Ok(Ident { table, key })
    }
}

/// A named ident function. Serialized by name only; deserialization looks the name up in
/// [IDENT_RULES], so the function must be registered before a persisted query is loaded.
#[derive(Clone)]
pub struct ComputedIdent {
    name: String,
    func: ComputedFn,
}

impl ComputedIdent {
    pub fn new(name: impl Into<String>, func: ComputedFn) -> Self {
        ComputedIdent {
            name: name.into(),
            func,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, props: &Props) -> Value {
        (self.func)(props)
    }
}

impl Debug for ComputedIdent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ComputedIdent").field(&self.name).finish()
    }
}

impl PartialEq for ComputedIdent {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Serialize for ComputedIdent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for ComputedIdent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        IDENT_RULES.get(&name).ok_or_else(|| {
            de::Error::custom(format!("computed ident rule '{name}' is not registered"))
        })
    }
}

/// How a component derives the Ident of the entity its props describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IdentRule {
    /// `(table, props[field])`. [IdentRule::property] uses the field name as the table.
    Property { table: Keyword, field: Keyword },
    /// A fixed ident, for singleton nodes such as UI panels.
    Constant(Ident),
    Computed(ComputedIdent),
}

impl IdentRule {
    pub fn property(field: Keyword) -> Self {
        IdentRule::Property {
            table: field.clone(),
            field,
        }
    }

    /// Key entities of `table` by the value of `field`.
    pub fn property_in(table: Keyword, field: Keyword) -> Self {
        IdentRule::Property { table, field }
    }

    pub fn constant(ident: Ident) -> Self {
        IdentRule::Constant(ident)
    }

    /// Register `func` under `name` in [IDENT_RULES] and return a rule that calls it.
    pub fn computed<F>(name: &str, func: F) -> Self
    where
        F: Fn(&Props) -> Value + Send + Sync + 'static,
    {
        IdentRule::Computed(IDENT_RULES.register(name, Arc::new(func)))
    }

    pub fn resolve(&self, props: &Props) -> Result<Ident, NormgraphError> {
        match self {
            IdentRule::Property { table, field } => match props.get(field) {
                None | Some(Value::Null) => Err(NormgraphError::MissingIdentField {
                    field: field.to_string(),
                }),
                Some(value) => Ok(Ident {
                    table: table.clone(),
                    key: KeyValue::try_from(value)?,
                }),
            },
            IdentRule::Constant(ident) => Ok(ident.clone()),
            IdentRule::Computed(computed) => {
                Ident::try_from(&computed.call(props)).map_err(|e| match e {
                    NormgraphError::MalformedIdent(msg) => NormgraphError::MalformedIdent(
                        format!("computed rule '{}': {msg}", computed.name()),
                    ),
                    other => other,
                })
            }
        }
    }
}
