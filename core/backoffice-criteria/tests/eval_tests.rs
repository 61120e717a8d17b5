use backoffice_criteria::{Criteria, Operator, RangeBounds};
use serde_json::json;

fn product() -> serde_json::Value {
    json!({
        "name": "Blue Shirt",
        "stock": 12,
        "price": 19.5,
        "active": true,
        "releaseDate": "2021-06-01T00:00:00+00:00",
        "manufacturer": {"name": "Acme"},
        "categories": [{"id": "c1"}, {"id": "c2"}],
        "tagIds": ["t1", "t2"],
        "parentId": null
    })
}

// ── Leaves ───────────────────────────────────────────────────────

#[test]
fn equals_matches_scalars_and_numbers() {
    let p = product();
    assert!(Criteria::equals("name", "Blue Shirt").matches(&p));
    assert!(Criteria::equals("stock", 12.0).matches(&p));
    assert!(!Criteria::equals("name", "blue shirt").matches(&p));
}

#[test]
fn equals_null_matches_missing_and_null() {
    let p = product();
    assert!(Criteria::equals("parentId", serde_json::Value::Null).matches(&p));
    assert!(Criteria::equals("nonexistent", serde_json::Value::Null).matches(&p));
    assert!(!Criteria::equals("name", serde_json::Value::Null).matches(&p));
}

#[test]
fn nested_paths_resolve_through_objects_and_arrays() {
    let p = product();
    assert!(Criteria::equals("manufacturer.name", "Acme").matches(&p));
    assert!(Criteria::equals("categories.id", "c2").matches(&p));
    assert!(!Criteria::equals("categories.id", "c3").matches(&p));
    assert!(Criteria::equals("tagIds", "t1").matches(&p));
}

#[test]
fn equals_any_matches_any_candidate() {
    let p = product();
    assert!(Criteria::equals_any("categories.id", ["c9", "c1"]).matches(&p));
    assert!(!Criteria::equals_any("categories.id", Vec::<String>::new()).matches(&p));
}

#[test]
fn string_matchers_are_case_insensitive() {
    let p = product();
    assert!(Criteria::contains("name", "SHIRT").matches(&p));
    assert!(Criteria::prefix("name", "blue").matches(&p));
    assert!(Criteria::suffix("name", "irt").matches(&p));
    assert!(!Criteria::prefix("name", "shirt").matches(&p));
    assert!(!Criteria::contains("missing", "x").matches(&p));
}

#[test]
fn range_bounds_are_respected() {
    let p = product();
    assert!(Criteria::range("stock", RangeBounds::between(10, 12)).matches(&p));
    assert!(!Criteria::range("stock", RangeBounds { gt: Some(12.into()), ..Default::default() }).matches(&p));
    assert!(Criteria::range("price", RangeBounds::at_most(20)).matches(&p));
    assert!(Criteria::range("releaseDate", RangeBounds::at_least("2021-01-01")).matches(&p));
    assert!(!Criteria::range("name", RangeBounds::at_least(1)).matches(&p));
}

#[test]
fn unbounded_range_matches_any_present_value() {
    assert!(RangeBounds::default().is_unbounded());
    assert!(Criteria::range("stock", RangeBounds::default()).matches(&product()));
}

// ── Combinators ──────────────────────────────────────────────────

#[test]
fn multi_operators() {
    let p = product();
    let yes = Criteria::equals("active", true);
    let no = Criteria::equals("active", false);

    assert!(Criteria::multi(Operator::And, vec![yes.clone(), yes.clone()]).matches(&p));
    assert!(!Criteria::multi(Operator::And, vec![yes.clone(), no.clone()]).matches(&p));
    assert!(Criteria::multi(Operator::Or, vec![no.clone(), yes.clone()]).matches(&p));
    assert!(Criteria::multi(Operator::Xor, vec![no.clone(), yes.clone()]).matches(&p));
    assert!(!Criteria::multi(Operator::Xor, vec![yes.clone(), yes]).matches(&p));
}

#[test]
fn empty_combinators() {
    let p = product();
    assert!(Criteria::multi(Operator::And, vec![]).matches(&p));
    assert!(!Criteria::multi(Operator::Or, vec![]).matches(&p));
    assert!(!Criteria::not(Operator::And, vec![]).matches(&p));
    assert!(Criteria::not(Operator::Or, vec![]).matches(&p));
}

#[test]
fn not_negates_combination() {
    let p = product();
    let f = Criteria::not(
        Operator::Or,
        vec![Criteria::equals("name", "x"), Criteria::equals("stock", 12)],
    );
    assert!(!f.matches(&p));
}

#[test]
fn criteria_matches_ands_top_level_filters() {
    let p = product();
    let mut c = Criteria::new();
    assert!(c.matches(&p));
    c.add_filter(Criteria::equals("active", true));
    assert!(c.matches(&p));
    c.add_filter(Criteria::equals("stock", 0));
    assert!(!c.matches(&p));
    assert!(c.complement().matches(&p));
}

// ── Introspection ────────────────────────────────────────────────

#[test]
fn filter_introspection() {
    let f = Criteria::not(
        Operator::And,
        vec![
            Criteria::equals("a", 1),
            Criteria::multi(Operator::Or, vec![Criteria::contains("b", "x")]),
        ],
    );
    assert_eq!(f.kind(), "not");
    assert_eq!(f.field(), None);
    assert_eq!(f.children().len(), 2);
    assert_eq!(f.depth(), 3);
    assert_eq!(f.fields(), vec!["a", "b"]);
    assert_eq!(Criteria::equals_any("id", ["1"]).kind(), "equalsAny");
}
