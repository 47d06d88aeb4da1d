use serde_json::{Value, json};

use intake_spec::{
    ErrorKind, FieldDefinition, FieldId, FieldType, FormDocument, RawValues, validate,
};

fn fixture() -> FormDocument {
    serde_json::from_str(include_str!("fixtures/student_application.json")).expect("deserialize")
}

fn values(entries: &[(i64, Value)]) -> RawValues {
    entries
        .iter()
        .map(|(id, value)| (FieldId(*id), value.clone()))
        .collect()
}

#[test]
fn missing_required_email_is_reported() {
    let doc = fixture();
    let report = validate(&doc.fields, &values(&[(1, json!("Ana"))]));
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.kind_for(FieldId(2)), Some(ErrorKind::MissingRequired));
    assert_eq!(report.errors[0].field_name.as_deref(), Some("email"));
}

#[test]
fn complete_application_passes() {
    let doc = fixture();
    let report = validate(
        &doc.fields,
        &values(&[
            (1, json!("Ana")),
            (2, json!("ana@example.com")),
            (3, json!("Middle")),
        ]),
    );
    assert!(report.valid, "{:?}", report);
    assert!(report.error_kinds().is_empty());
}

#[test]
fn whitespace_only_counts_as_missing() {
    let doc = fixture();
    let report = validate(
        &doc.fields,
        &values(&[(1, json!("   ")), (2, json!("ana@example.com"))]),
    );
    assert_eq!(report.kind_for(FieldId(1)), Some(ErrorKind::MissingRequired));
}

#[test]
fn email_requires_single_at_and_dotted_domain() {
    let field = FieldDefinition {
        field_id: FieldId(9),
        ..FieldDefinition::new("Contact", FieldType::Email).named("contact")
    };
    let fields = vec![field];
    for bad in ["ana", "ana@example", "ana@@example.com", "a@b@c.com", "@example.com", "ana@.com"] {
        let report = validate(&fields, &values(&[(9, json!(bad))]));
        assert_eq!(
            report.kind_for(FieldId(9)),
            Some(ErrorKind::InvalidFormat),
            "expected '{}' to be rejected",
            bad
        );
    }
    for good in ["ana@example.com", "first.last@school.edu.ng"] {
        let report = validate(&fields, &values(&[(9, json!(good))]));
        assert!(report.valid, "expected '{}' to pass", good);
    }
}

#[test]
fn numbers_accept_numeric_strings_and_apply_bounds() {
    let doc = fixture();
    let base = [(1, json!("Ana")), (2, json!("ana@example.com"))];

    let mut ok = base.to_vec();
    ok.push((4, json!("12")));
    assert!(validate(&doc.fields, &values(&ok)).valid);

    let mut not_numeric = base.to_vec();
    not_numeric.push((4, json!("twelve")));
    let report = validate(&doc.fields, &values(&not_numeric));
    assert_eq!(report.kind_for(FieldId(4)), Some(ErrorKind::InvalidFormat));

    let mut too_old = base.to_vec();
    too_old.push((4, json!(40)));
    let report = validate(&doc.fields, &values(&too_old));
    assert_eq!(report.kind_for(FieldId(4)), Some(ErrorKind::AboveMaximum));
}

#[test]
fn select_values_must_be_listed_options() {
    let doc = fixture();
    let report = validate(
        &doc.fields,
        &values(&[
            (1, json!("Ana")),
            (2, json!("ana@example.com")),
            (3, json!("University")),
        ]),
    );
    assert_eq!(report.kind_for(FieldId(3)), Some(ErrorKind::InvalidOption));
}

#[test]
fn pattern_rules_apply_to_text() {
    let field = FieldDefinition {
        field_id: FieldId(1),
        ..FieldDefinition::new("Student code", FieldType::Text)
            .named("student_code")
            .with_rules("^[A-Z]{3}-[0-9]{4}$")
    };
    let fields = vec![field];
    assert!(validate(&fields, &values(&[(1, json!("ABC-1234"))])).valid);
    let report = validate(&fields, &values(&[(1, json!("abc-12"))]));
    assert_eq!(report.kind_for(FieldId(1)), Some(ErrorKind::PatternMismatch));
}

#[test]
fn unchecked_required_checkbox_is_missing() {
    let mut doc = fixture();
    doc.fields[4].is_required = true;
    let report = validate(
        &doc.fields,
        &values(&[
            (1, json!("Ana")),
            (2, json!("ana@example.com")),
            (5, json!(false)),
        ]),
    );
    assert_eq!(report.kind_for(FieldId(5)), Some(ErrorKind::MissingRequired));
}

#[test]
fn posted_checkbox_strings_are_read_as_flags() {
    let mut doc = fixture();
    doc.fields[4].is_required = true;
    let with_consent = |consent: Value| {
        validate(
            &doc.fields,
            &values(&[(1, json!("Ana")), (2, json!("ana@example.com")), (5, consent)]),
        )
    };

    for unchecked in [json!("false"), json!("off"), json!("0"), json!(0)] {
        let report = with_consent(unchecked.clone());
        assert_eq!(
            report.kind_for(FieldId(5)),
            Some(ErrorKind::MissingRequired),
            "{unchecked}"
        );
    }
    for checked in [json!("true"), json!("on"), json!("1"), json!(true)] {
        assert!(with_consent(checked.clone()).valid, "{checked}");
    }
    assert_eq!(
        with_consent(json!("banana")).kind_for(FieldId(5)),
        Some(ErrorKind::InvalidFormat)
    );
}

#[test]
fn text_fields_accept_any_scalar() {
    let field = FieldDefinition {
        field_id: FieldId(1),
        ..FieldDefinition::new("Student Number", FieldType::Text).required()
    };
    let fields = vec![field];

    assert!(validate(&fields, &values(&[(1, json!(12345))])).valid);
    assert!(validate(&fields, &values(&[(1, json!(true))])).valid);
    assert_eq!(
        validate(&fields, &values(&[(1, json!({ "nested": 1 }))])).kind_for(FieldId(1)),
        Some(ErrorKind::InvalidFormat)
    );
}

#[test]
fn values_for_unknown_fields_invalidate_the_report() {
    let doc = fixture();
    let report = validate(
        &doc.fields,
        &values(&[
            (1, json!("Ana")),
            (2, json!("ana@example.com")),
            (77, json!("stray")),
        ]),
    );
    assert!(!report.valid);
    assert!(report.errors.is_empty());
    assert_eq!(report.unknown_fields, vec![FieldId(77)]);
    let errors = report.into_field_errors();
    assert_eq!(errors[0].code, ErrorKind::UnknownField);
}

#[test]
fn errors_follow_display_order() {
    let mut doc = fixture();
    doc.fields.reverse();
    let report = validate(&doc.fields, &RawValues::new());
    let ids: Vec<_> = report.errors.iter().filter_map(|e| e.field_id).collect();
    assert_eq!(ids, vec![FieldId(1), FieldId(2)]);
}
