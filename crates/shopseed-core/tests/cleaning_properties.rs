use serde_json::{Value, json};
use shopseed_core::repair::{clean_response, close_truncated_array, strip_code_fences};
use shopseed_core::{FieldSpec, RecordSchema, parse_record_array, validate_batch};

fn product_schema() -> RecordSchema {
    RecordSchema::new("product")
        .field(FieldSpec::text("name"))
        .field(FieldSpec::text("category"))
        .field(FieldSpec::number("price"))
        .field(FieldSpec::number("rating"))
        .field(FieldSpec::number("quantity"))
        .field(FieldSpec::lenient("description"))
        .field(FieldSpec::lenient("prompt"))
}

const SAMPLES: &[&str] = &[
    r#"[{"name":"Lamp","category":"Home","price":12.5,"rating":4.1,"quantity":3,"description":"d","prompt":"p"}]"#,
    "```json\n[{\"name\":\"Lamp\"}]\n```",
    "```\n[1,2,3]\n```\ntrailing words",
    r#"[{"name":"Lamp"},{"name":"Desk","price":"#,
    "[",
    "{}",
    "plain prose",
    "",
];

#[test]
fn cleaning_twice_matches_cleaning_once() {
    for sample in SAMPLES {
        let once = clean_response(sample);
        let twice = clean_response(&once);
        assert_eq!(once, twice, "sample {sample:?}");
    }
}

#[test]
fn already_clean_json_is_left_alone() {
    let clean = r#"[{"a":1},{"a":2}]"#;
    assert_eq!(strip_code_fences(clean), clean);
    assert_eq!(close_truncated_array(clean), clean);
}

#[test]
fn truncated_output_keeps_complete_objects() {
    let parsed = parse_record_array(r#"[{"name":"Lamp"},{"name":"Desk","price":"#).expect("parse");
    assert_eq!(parsed.records, vec![json!({"name": "Lamp"})]);
}

#[test]
fn widget_missing_six_fields_validates_to_nothing() {
    let parsed = parse_record_array(r#"[{ "name": "Widget" }]"#).expect("parse");
    let outcome = validate_batch(&product_schema(), parsed.records);
    assert!(outcome.accepted.is_empty());
    assert_eq!(outcome.rejected.len(), 1);
}

#[test]
fn every_accepted_record_satisfies_the_schema() {
    let raw = json!([
        {"name":"Lamp","category":"Home","price":12.5,"rating":4.1,"quantity":3,"description":"d","prompt":"p"},
        {"name":"","category":"Home","price":1,"rating":1,"quantity":1,"description":"d","prompt":"p"},
        {"name":"Desk","category":"Office","price":"99","rating":4,"quantity":1,"description":"d","prompt":"p"},
        {"name":"Chair","category":"Office","price":40,"rating":3.5,"quantity":7,"description":null,"prompt":"p"},
        [1, 2],
        "Stool",
        null
    ]);
    let Value::Array(items) = raw else {
        unreachable!()
    };
    let schema = product_schema();
    let outcome = validate_batch(&schema, items);

    assert_eq!(outcome.accepted.len(), 2);
    for record in &outcome.accepted {
        for field in schema.fields() {
            let value = record.fields.get(&field.name).expect("field present");
            match field.name.as_str() {
                "price" | "rating" | "quantity" => assert!(value.is_number()),
                _ => assert!(value.is_string()),
            }
        }
    }
    assert_eq!(outcome.accepted[1].fields["description"], json!(""));
}
