//! Shared test utilities for normalization and merge testing

use crate::{
    ident::{Ident, IdentRule},
    query::{Component, Query, QueryElement, RecursionLimit},
    value::{props_from_json, Keyword, Props},
};

pub fn kw(name: &str) -> Keyword {
    Keyword::new(name).unwrap()
}

pub fn ident(table: &str, key: i64) -> Ident {
    Ident::new(kw(table), key)
}

pub fn props(json: serde_json::Value) -> Props {
    props_from_json(&json).unwrap()
}

pub fn props_query(keys: &[&str]) -> Vec<QueryElement> {
    keys.iter().map(|k| QueryElement::prop(kw(k))).collect()
}

/// `Person [id name]`, ident `property:id` in table `person`
pub fn person() -> Component {
    Component::new("Person")
        .with_ident(IdentRule::property_in(kw("person"), kw("id")))
        .with_query(props_query(&["id", "name"]))
}

/// `Root [{people Person}]`
pub fn people_query() -> Query {
    Component::new("Root")
        .with_query(vec![person().join(kw("people"))])
        .query()
}

/// Person with a self-referential `friends` join.
pub fn friends_query(limit: RecursionLimit) -> Query {
    let friend = Component::new("Friend")
        .with_ident(IdentRule::property(kw("person/id")))
        .with_query(vec![
            QueryElement::prop(kw("person/id")),
            QueryElement::prop(kw("person/name")),
            QueryElement::recursive(kw("person/friends"), limit),
        ]);
    Query::new(vec![friend.join(kw("me"))])
}
