//! Property-based tests for normalization and merge
//!
//! Uses proptest to check, over generated response trees:
//! 1. Merging the same response twice changes nothing the second time
//! 2. Every reference produced by normalization has an entity in the delta
//! 3. To-many reference order follows the response
//! 4. Denormalizing a merged response gives the response back

mod common;

use common::*;
use normgraph::{
    config::NormgraphConfig,
    db::NormalizedDb,
    ident::IdentRule,
    normalize::Normalizer,
    query::{Component, Query, QueryElement},
    value::Value,
};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;

// ============================================================================
// Strategies
// ============================================================================

fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,8}".prop_map(|s| s)
}

/// Distinct person ids in arbitrary order.
fn ids_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(0i64..50, 0..12)
        .prop_map(|ids| ids.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

/// People, each optionally pointing at a best friend drawn from the same id range.
fn people_strategy() -> impl Strategy<Value = Vec<serde_json::Value>> {
    ids_strategy().prop_flat_map(|ids| {
        let count = ids.len();
        (
            Just(ids),
            prop::collection::vec(name_strategy(), count),
            prop::collection::vec(prop::option::of(50i64..60), count),
        )
            .prop_map(|(ids, names, bests)| {
                ids.into_iter()
                    .zip(names)
                    .zip(bests)
                    .map(|((id, name), best)| match best {
                        Some(best) => json!({
                            "id": id,
                            "name": name,
                            "best": {"id": best, "name": format!("friend-{best}")}
                        }),
                        None => json!({"id": id, "name": name, "best": null}),
                    })
                    .collect()
            })
    })
}

fn social_query() -> Query {
    let friend = Component::new("Friend")
        .with_ident(IdentRule::property_in(kw("person"), kw("id")))
        .with_query(vec![
            QueryElement::prop(kw("id")),
            QueryElement::prop(kw("name")),
        ]);
    let member = Component::new("Member")
        .with_ident(IdentRule::property_in(kw("person"), kw("id")))
        .with_query(vec![
            QueryElement::prop(kw("id")),
            QueryElement::prop(kw("name")),
            friend.join(kw("best")),
        ]);
    Component::new("Root")
        .with_query(vec![member.join(kw("people"))])
        .query()
}

// ============================================================================
// Normalization and merge properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn merge_is_idempotent(people in people_strategy()) {
        let tree = props(json!({"people": people}));
        let config = NormgraphConfig::default();
        let mut db = NormalizedDb::new();
        db.merge_tree(&social_query(), &tree, &config).unwrap();
        let once = db.clone();
        db.merge_tree(&social_query(), &tree, &config).unwrap();
        prop_assert_eq!(db, once);
    }

    #[test]
    fn references_are_closed(people in people_strategy()) {
        let tree = props(json!({"people": people}));
        let normalized = Normalizer::default().normalize(&social_query(), &tree).unwrap();
        prop_assert!(normalized.dangling_references().is_empty());
        prop_assert!(normalized.diagnostics.is_empty());

        let mut db = NormalizedDb::new();
        db.merge_normalized(&normalized, &NormgraphConfig::default().merge).unwrap();
        prop_assert!(db.check_integrity().is_ok());
        prop_assert!(db.unreachable_entities().is_empty());
    }

    #[test]
    fn to_many_order_follows_response(ids in ids_strategy()) {
        let people: Vec<_> = ids.iter().map(|id| json!({"id": id})).collect();
        let tree = props(json!({"people": people}));
        let normalized = Normalizer::default().normalize(&people_query(), &tree).unwrap();
        let expected = Value::refs(ids.iter().map(|id| ident("person", *id)));
        prop_assert_eq!(normalized.root.fields.get(&kw("people")), Some(&expected));

        let tables: BTreeSet<_> = normalized.idents().collect();
        prop_assert_eq!(tables.len(), ids.len());
    }

    #[test]
    fn denormalize_returns_the_response(ids in ids_strategy(), names in prop::collection::vec(name_strategy(), 12)) {
        let people: Vec<_> = ids
            .iter()
            .zip(names.iter())
            .map(|(id, name)| json!({"id": id, "name": name}))
            .collect();
        let tree = props(json!({"people": people}));
        let mut db = NormalizedDb::new();
        db.merge_tree(&people_query(), &tree, &NormgraphConfig::default()).unwrap();
        prop_assert_eq!(db.denormalize(&people_query()), tree);
    }
}
