//! The flat and document syntaxes compile to the same predicate trees

use pretty_assertions::assert_eq;
use serde_json::json;
use sqlm_filter::{FilterCompiler, QueryDocumentTranslator, QueryError};
use sqlm_ir::{Field, Op, Predicate, Schema};

fn people() -> Schema {
    Schema::new(
        "people",
        vec![
            Field::uuid("id").primary_key(),
            Field::text("name"),
            Field::int("age"),
            Field::bool("active"),
        ],
    )
    .unwrap()
}

#[test]
fn test_conjunction_matches() {
    let schema = people();

    let flat = FilterCompiler::new(&schema)
        .compile([("age[gt]", "18"), ("name", "Alice")])
        .unwrap()
        .predicate();
    let doc = QueryDocumentTranslator::new(&schema)
        .translate(Some(&json!({"age": {"$gt": 18}, "name": "Alice"})))
        .unwrap();

    assert_eq!(flat, doc);
}

#[test]
fn test_single_operator_matches() {
    let schema = people();
    let pairs = [
        ("age[gte]", "21", json!({"age": {"$gte": 21}})),
        ("age[lt]", "65", json!({"age": {"$lt": 65}})),
        ("age[lte]", "64", json!({"age": {"$lte": 64}})),
        ("name[neq]", "Bob", json!({"name": {"$ne": "Bob"}})),
        ("name[like]", "ob", json!({"name": {"$like": "ob"}})),
        ("active", "true", json!({"active": true})),
    ];

    for (key, value, doc) in pairs {
        let flat = FilterCompiler::new(&schema).compile([(key, value)]).unwrap().predicate();
        let nested = QueryDocumentTranslator::new(&schema).translate(Some(&doc)).unwrap();
        assert_eq!(flat, nested, "{} = {}", key, value);
    }
}

#[test]
fn test_uuid_values_normalized_by_both() {
    let schema = people();
    let upper = "67E55044-10B1-426F-9247-BB680E5FE0C8";

    let flat = FilterCompiler::new(&schema).compile([("id", upper)]).unwrap().predicate();
    let doc = QueryDocumentTranslator::new(&schema)
        .translate(Some(&json!({"id": upper})))
        .unwrap();

    let expected = Predicate::leaf("id", Op::Eq, "67e55044-10b1-426f-9247-bb680e5fe0c8");
    assert_eq!(flat, expected);
    assert_eq!(doc, expected);
}

#[test]
fn test_unknown_field_rejected_by_both() {
    let schema = people();

    let flat = FilterCompiler::new(&schema).compile([("email", "x")]).unwrap_err();
    let doc = QueryDocumentTranslator::new(&schema)
        .translate(Some(&json!({"$or": [{"name": "x"}, {"email": "x"}]})))
        .unwrap_err();

    assert!(matches!(flat, QueryError::Schema(_)));
    assert!(matches!(doc, QueryError::Schema(_)));
}

#[test]
fn test_compiled_trees_pass_schema_validation() {
    let schema = people();
    let tree = QueryDocumentTranslator::new(&schema)
        .translate(Some(&json!({
            "$or": [
                {"age": {"$in": [20, 30]}},
                {"$nor": [{"active": false}, {"name": {"$like": "x"}}]}
            ]
        })))
        .unwrap();

    assert!(tree.validate(&schema).is_ok());
    assert_eq!(tree.conditions().len(), 3);
}
