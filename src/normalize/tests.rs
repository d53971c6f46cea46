use super::*;
use crate::{
    config::{ErrorPolicy, NormalizeConfig},
    ident::IdentRule,
    query::{Component, Query, QueryElement, RecursionLimit, UnionQuery},
    tests::helpers::*,
};
use serde_json::json;
use test_log::test;

fn normalize(query: &Query, tree: serde_json::Value) -> Normalized {
    Normalizer::default()
        .normalize(query, &props(tree))
        .unwrap()
}

fn refs(table: &str, keys: &[i64]) -> Value {
    Value::refs(keys.iter().map(|k| ident(table, *k)))
}

#[test]
fn test_people_scenario() {
    let normalized = normalize(
        &people_query(),
        json!({"people": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]}),
    );

    assert!(normalized.diagnostics.is_empty());
    let table = normalized.tables.get(&kw("person")).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(
        normalized.entity(&ident("person", 1)).unwrap().fields,
        props(json!({"id": 1, "name": "A"}))
    );
    assert_eq!(
        normalized.entity(&ident("person", 2)).unwrap().fields,
        props(json!({"id": 2, "name": "B"}))
    );
    assert_eq!(
        normalized.root.fields.get(&kw("people")),
        Some(&refs("person", &[1, 2]))
    );
    assert!(normalized.dangling_references().is_empty());
}

#[test]
fn test_to_many_order_follows_response() {
    let normalized = normalize(
        &people_query(),
        json!({"people": [{"id": 2}, {"id": 1}, {"id": 3}]}),
    );
    assert_eq!(
        normalized.root.fields.get(&kw("people")),
        Some(&refs("person", &[2, 1, 3]))
    );
}

#[test]
fn test_missing_and_extra_fields() {
    let normalized = normalize(
        &people_query(),
        json!({"people": [{"id": 1, "age": 40}], "ignored": true}),
    );
    let delta = normalized.entity(&ident("person", 1)).unwrap();
    assert_eq!(delta.fields, props(json!({"id": 1})));
    assert_eq!(delta.missing, BTreeSet::from([kw("name")]));
    assert!(!normalized.root.fields.contains_key(&kw("ignored")));

    let empty = normalize(&people_query(), json!({}));
    assert!(empty.tables.is_empty());
    assert_eq!(empty.root.missing, BTreeSet::from([kw("people")]));
}

#[test]
fn test_null_join_is_kept() {
    let normalized = normalize(&people_query(), json!({"people": null}));
    assert_eq!(normalized.root.fields.get(&kw("people")), Some(&Value::Null));
    assert!(normalized.tables.is_empty());
}

#[test]
fn test_three_level_composition() {
    let item = Component::new("Item")
        .with_ident(IdentRule::property(kw("item/id")))
        .with_query(props_query(&["item/id", "item/label"]));
    let list = Component::new("List")
        .with_ident(IdentRule::property(kw("list/id")))
        .with_query(vec![
            QueryElement::prop(kw("list/id")),
            item.join(kw("list/items")),
        ]);
    let root = Component::new("Root")
        .with_query(vec![list.join(kw("lists"))])
        .query();

    let normalized = normalize(
        &root,
        json!({"lists": [
            {"list/id": 10, "list/items": [{"item/id": 1, "item/label": "x"}]},
            {"list/id": 11, "list/items": [{"item/id": 1}, {"item/id": 2, "item/label": "y"}]}
        ]}),
    );

    assert!(normalized.diagnostics.is_empty());
    assert_eq!(
        normalized.root.fields.get(&kw("lists")),
        Some(&refs("list/id", &[10, 11]))
    );
    assert_eq!(
        normalized
            .entity(&ident("list/id", 11))
            .unwrap()
            .fields
            .get(&kw("list/items")),
        Some(&refs("item/id", &[1, 2]))
    );
    // Item 1 appears twice; the occurrence with a label wins over the one without.
    let item_one = normalized.entity(&ident("item/id", 1)).unwrap();
    assert_eq!(
        item_one.fields.get(&kw("item/label")),
        Some(&Value::from("x"))
    );
    assert!(item_one.missing.is_empty());
    assert!(normalized.dangling_references().is_empty());
}

#[test]
fn test_unannotated_join_passes_through() {
    let root = Query::new(vec![QueryElement::join(
        kw("settings"),
        Query::new(props_query(&["theme"])),
    )]);
    let normalized = normalize(&root, json!({"settings": {"theme": "dark", "x": 1}}));

    assert!(normalized.tables.is_empty());
    assert_eq!(
        normalized.root.fields.get(&kw("settings")),
        Some(&Value::Map(props(json!({"theme": "dark", "x": 1}))))
    );
    assert_eq!(normalized.diagnostics.len(), 1);
    assert!(normalized.diagnostics[0].is_unannotated_join());
    assert_eq!(normalized.diagnostics[0].path(), &vec!["settings".to_string()]);
}

#[test]
fn test_inline_component_normalizes_nested_joins() {
    let panel = Component::new("Panel").with_query(vec![
        QueryElement::prop(kw("title")),
        person().join(kw("owner")),
    ]);
    let root = Query::new(vec![panel.join(kw("panel"))]);
    let normalized = normalize(
        &root,
        json!({"panel": {"title": "T", "owner": {"id": 5, "name": "E"}}}),
    );

    assert!(normalized.diagnostics.is_empty());
    let mut expected = props(json!({"title": "T"}));
    expected.insert(kw("owner"), Value::Ref(ident("person", 5)));
    assert_eq!(
        normalized.root.fields.get(&kw("panel")),
        Some(&Value::Map(expected))
    );
    assert!(normalized.contains(&ident("person", 5)));
}

#[test]
fn test_malformed_ident_best_effort() {
    let normalized = normalize(
        &people_query(),
        json!({"people": [{"id": 1}, {"name": "no id"}, {"id": 3}]}),
    );

    assert!(normalized.has_errors());
    assert_eq!(normalized.diagnostics.len(), 1);
    assert_eq!(
        normalized.diagnostics[0].path(),
        &vec!["people".to_string(), "1".to_string()]
    );
    let Some(Value::List(people)) = normalized.root.fields.get(&kw("people")) else {
        panic!("people should be a list");
    };
    assert_eq!(people[0], Value::Ref(ident("person", 1)));
    assert_eq!(people[1], Value::Map(props(json!({"name": "no id"}))));
    assert_eq!(people[2], Value::Ref(ident("person", 3)));
}

#[test]
fn test_malformed_ident_fail_fast() {
    let normalizer = Normalizer::new(NormalizeConfig {
        error_policy: ErrorPolicy::FailFast,
        ..NormalizeConfig::default()
    });
    let result = normalizer.normalize(
        &people_query(),
        &props(json!({"people": [{"id": 1}, {"id": 1.5}]})),
    );
    assert!(matches!(result, Err(NormgraphError::MalformedIdent(_))));
}

#[test]
fn test_cycle_emits_reference() {
    let normalized = normalize(
        &friends_query(RecursionLimit::Unbounded),
        json!({"me": {
            "person/id": 1,
            "person/name": "A",
            "person/friends": [{
                "person/id": 2,
                "person/name": "B",
                "person/friends": [{"person/id": 1, "person/name": "A again"}]
            }]
        }}),
    );

    assert_eq!(
        normalized.root.fields.get(&kw("me")),
        Some(&Value::Ref(ident("person/id", 1)))
    );
    let two = normalized.entity(&ident("person/id", 2)).unwrap();
    assert_eq!(
        two.fields.get(&kw("person/friends")),
        Some(&refs("person/id", &[1]))
    );
    // The repeated occurrence is not recorded.
    let one = normalized.entity(&ident("person/id", 1)).unwrap();
    assert_eq!(one.fields.get(&kw("person/name")), Some(&Value::from("A")));
    assert!(normalized.diagnostics.iter().all(|d| d.is_info()));
    assert_eq!(normalized.diagnostics.len(), 1);
}

#[test]
fn test_recursion_depth_limit_omits_key() {
    let normalized = normalize(
        &friends_query(RecursionLimit::Depth(1)),
        json!({"me": {
            "person/id": 1,
            "person/friends": [{
                "person/id": 2,
                "person/friends": [{"person/id": 3}]
            }]
        }}),
    );

    assert!(normalized.contains(&ident("person/id", 2)));
    assert!(!normalized.contains(&ident("person/id", 3)));
    let two = normalized.entity(&ident("person/id", 2)).unwrap();
    assert!(!two.fields.contains_key(&kw("person/friends")));
    assert!(!two.missing.contains(&kw("person/friends")));
    assert!(normalized.diagnostics.is_empty());
}

#[test]
fn test_max_depth_cutoff() {
    let query = friends_query(RecursionLimit::Unbounded);
    let tree = props(json!({"me": {
        "person/id": 1,
        "person/friends": [{
            "person/id": 2,
            "person/friends": [{"person/id": 3}]
        }]
    }}));

    let config = NormalizeConfig {
        max_depth: 2,
        ..NormalizeConfig::default()
    };
    let normalized = Normalizer::new(config.clone()).normalize(&query, &tree).unwrap();
    assert!(normalized.contains(&ident("person/id", 2)));
    assert!(!normalized.contains(&ident("person/id", 3)));
    assert!(normalized.has_errors());
    assert!(matches!(
        normalized.diagnostics[0],
        NormalizeDiagnostic::DepthLimit { depth: 2, .. }
    ));

    let strict = Normalizer::new(NormalizeConfig {
        error_policy: ErrorPolicy::FailFast,
        ..config
    });
    assert_eq!(
        strict.normalize(&query, &tree),
        Err(NormgraphError::DepthExceeded(2))
    );
}

#[test]
fn test_union_normalization() {
    let image = Component::new("Image")
        .with_ident(IdentRule::property(kw("image/id")))
        .with_query(props_query(&["image/id", "image/url"]));
    let text = Component::new("Text")
        .with_ident(IdentRule::property(kw("text/id")))
        .with_query(props_query(&["text/id", "text/body"]));
    let union = UnionQuery::new(BTreeMap::from([
        (kw("image/id"), image.query()),
        (kw("text/id"), text.query()),
    ]));
    let root = Query::new(vec![QueryElement::union(kw("feed"), union)]);

    let normalized = normalize(
        &root,
        json!({"feed": [
            {"text/id": 1, "text/body": "hi"},
            {"image/id": 7, "image/url": "u"},
            {"video/id": 3}
        ]}),
    );

    assert_eq!(
        normalized.root.fields.get(&kw("feed")),
        Some(&Value::List(vec![
            Value::Ref(ident("text/id", 1)),
            Value::Ref(ident("image/id", 7)),
            Value::Map(props(json!({"video/id": 3}))),
        ]))
    );
    assert!(matches!(
        normalized.diagnostics[..],
        [NormalizeDiagnostic::UnmatchedUnion { .. }]
    ));
}

#[test]
fn test_existing_reference_passes_through() {
    let mut tree = Props::new();
    tree.insert(kw("people"), refs("person", &[4]));
    let normalized = Normalizer::default()
        .normalize(&people_query(), &tree)
        .unwrap();
    assert_eq!(normalized.dangling_references(), vec![ident("person", 4)]);
}

#[test]
fn test_normalize_component() {
    let (id, normalized) = Normalizer::default()
        .normalize_component(&person().query(), &props(json!({"id": 9, "name": "N"})))
        .unwrap();
    assert_eq!(id, ident("person", 9));
    assert!(normalized.root.is_empty());
    assert_eq!(
        normalized.entity(&id).unwrap().fields,
        props(json!({"id": 9, "name": "N"}))
    );

    let unannotated = Normalizer::default()
        .normalize_component(&Query::new(props_query(&["id"])), &props(json!({"id": 1})));
    assert!(matches!(
        unannotated,
        Err(NormgraphError::MissingAnnotation(_))
    ));
}
