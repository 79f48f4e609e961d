use ormlet::{
    ClassMetadata, Column, Filter, Model, Operator, OrmletError, Properties, Query, Value, describe,
};

struct Person;
impl Model for Person {
    fn declare(class: &mut ClassMetadata) {
        class
            .model_name("person")
            .field("name", Column::text())
            .field("age", Column::number())
            .field("active", Column::boolean())
            .field("profile", Column::object());
    }
}

fn person(name: &str, age: f64, active: bool) -> Properties {
    let mut properties = Properties::new();
    properties.insert("name".to_string(), Value::from(name));
    properties.insert("age".to_string(), Value::from(age));
    properties.insert("active".to_string(), Value::from(active));
    properties
}

#[test]
fn push_and_where_serialize_the_same() {
    let mut pushed = Query::new();
    pushed.push("age", ">", 5).push("name", "=", "John");
    let mut chained = Query::new();
    chained.where_("age").gt(5).where_("name").is("John");

    let expected = [Filter::new("age", Operator::Gt, 5), Filter::new("name", Operator::Eq, "John")];
    assert_eq!(pushed.serialize(), &expected);
    assert_eq!(chained.serialize(), &expected);
    assert_eq!(pushed, chained);
}

#[test]
fn clause_names_are_tokens_too() {
    let mut by_name = Query::new();
    by_name.push("name", "isNot", "Ann").push("name", "isLike", "o").push("age", "lte", 3);
    let mut by_clause = Query::new();
    by_clause.where_("name").is_not("Ann").where_("name").is_like("o").where_("age").lte(3);
    assert_eq!(by_name, by_clause);
}

#[test]
fn unknown_operator_is_dropped() {
    let mut query = Query::new();
    query.push("age", "between", 5).push("name", "=", "John");
    assert_eq!(query.len(), 1);
    assert_eq!(query.serialize()[0].field, "name");
}

#[test]
fn unknown_operator_constrains_nothing() {
    let descriptor = describe::<Person>().unwrap();
    let mut query = Query::new();
    query.push("age", "~~", 1000);
    let bound = query.bind(&descriptor).unwrap();
    assert!(bound.matches(&person("Ann", 30.0, true)));
    assert!(bound.matches(&person("Bob", 3.0, false)));
}

#[test]
fn evaluation_follows_column_types() {
    let descriptor = describe::<Person>().unwrap();
    let john = person("John", 40.0, true);
    let cases: &[(&str, &str, Value, bool)] = &[
        ("age", ">", Value::from(5), true),
        ("age", "<", Value::from(5), false),
        ("age", ">=", Value::from(40), true),
        ("age", "<=", Value::from(39.5), false),
        ("age", "=", Value::from("40"), true),
        ("name", "=", Value::from("John"), true),
        ("name", "!=", Value::from("John"), false),
        ("name", "like", Value::from("oh"), true),
        ("name", "like", Value::from("OH"), false),
        ("name", ">", Value::from("Jim"), true),
        ("active", "=", Value::from(true), true),
        ("active", "!=", Value::from(true), false),
    ];
    for (field, token, value, expected) in cases {
        let mut query = Query::new();
        query.push(field, token, value.clone());
        let bound = query.bind(&descriptor).unwrap();
        assert_eq!(bound.matches(&john), *expected, "{} {} {}", field, token, value);
    }
}

#[test]
fn filters_are_conjunctive() {
    let descriptor = describe::<Person>().unwrap();
    let mut query = Query::new();
    query.where_("age").gt(18).where_("active").is(true);
    let bound = query.bind(&descriptor).unwrap();
    assert!(bound.matches(&person("Ann", 30.0, true)));
    assert!(!bound.matches(&person("Bob", 30.0, false)));
    assert!(!bound.matches(&person("Cid", 12.0, true)));
}

#[test]
fn missing_stored_value_never_matches() {
    let descriptor = describe::<Person>().unwrap();
    let mut query = Query::new();
    query.where_("age").is_not(1);
    let bound = query.bind(&descriptor).unwrap();
    let mut nameless = Properties::new();
    nameless.insert("name".to_string(), Value::from("Dee"));
    assert!(!bound.matches(&nameless));
}

#[test]
fn binding_rejects_what_cannot_be_filtered() {
    let descriptor = describe::<Person>().unwrap();
    let bind = |field: &str, token: &str, value: Value| {
        let mut query = Query::new();
        query.push(field, token, value);
        query.bind(&descriptor)
    };
    assert!(matches!(bind("height", "=", Value::from(1)), Err(OrmletError::Config(_))));
    assert!(matches!(bind("profile", "=", Value::from("x")), Err(OrmletError::Config(_))));
    assert!(matches!(bind("age", "like", Value::from("4")), Err(OrmletError::Config(_))));
    assert!(matches!(bind("age", ">", Value::from("old")), Err(OrmletError::Config(_))));
    assert!(matches!(bind("name", "=", Value::Null), Err(OrmletError::Config(_))));
}

#[test]
fn parse_reads_the_textual_form() {
    let parsed = Query::parse(r#"age > 5 and name = "John" && active != false"#).unwrap();
    let mut built = Query::new();
    built.where_("age").gt(5).where_("name").is("John").where_("active").is_not(false);
    assert_eq!(parsed, built);

    let liked: Query = "name LIKE 'Jo'".parse().unwrap();
    assert_eq!(liked.serialize(), &[Filter::new("name", Operator::Like, "Jo")]);

    assert!(Query::parse("").unwrap().is_empty());
    assert!(Query::parse("age >= -1.5").unwrap().serialize()[0].value == Value::Number(-1.5));
}

#[test]
fn display_parses_back() {
    let mut query = Query::new();
    query
        .where_("age")
        .gte(21)
        .where_("name")
        .is_like(r#"say "hi""#)
        .where_("active")
        .is(true);
    let text = query.to_string();
    assert_eq!(Query::parse(&text).unwrap(), query);
}

#[test]
fn parse_errors_carry_a_position() {
    match Query::parse("age >> 5") {
        Err(OrmletError::Parse { line, col, .. }) => {
            assert_eq!(line, Some(1));
            assert!(col.is_some());
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn text_with_both_quotes_parses_back() {
    let mut query = Query::new();
    query.where_("name").is(r#"it's "quoted" \ here"#);
    let text = query.to_string();
    assert_eq!(text, r#"name = "it's \"quoted\" \\ here""#);
    assert_eq!(Query::parse(&text).unwrap(), query);

    let single = Query::parse(r"name = 'it\'s'").unwrap();
    assert_eq!(single.serialize()[0].value, Value::from("it's"));
}

#[test]
fn numbers_past_the_i64_range_keep_their_digits() {
    assert_eq!(ormlet::datatype::format_number(9_007_199_254_740_992.0), "9007199254740992");
    assert_eq!(ormlet::datatype::format_number(-9_223_372_036_854_775_808.0), "-9223372036854775808");
    // 2^63 does not fit an i64 and must not saturate to i64::MAX
    assert_eq!(ormlet::datatype::format_number(9_223_372_036_854_775_808.0), "9223372036854775808");
}
