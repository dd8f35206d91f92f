use proptest::prelude::*;
use sqlstream_dialect::{presets, ColumnRef, DialectDescriptor};
use sqlstream_ir::{
    count_placeholders, CompareOp, DeclaredType, FieldPredicate, Inclusion, PredicateOp, TextOp,
    Value,
};

fn arb_compare_op() -> impl Strategy<Value = CompareOp> {
    prop_oneof![
        Just(CompareOp::Eq),
        Just(CompareOp::Ne),
        Just(CompareOp::Gt),
        Just(CompareOp::Ge),
        Just(CompareOp::Lt),
        Just(CompareOp::Le),
    ]
}

fn arb_inclusion() -> impl Strategy<Value = Inclusion> {
    prop_oneof![
        Just(Inclusion::Exclusive),
        Just(Inclusion::StartInclusive),
        Just(Inclusion::EndInclusive),
        Just(Inclusion::Inclusive),
    ]
}

fn arb_text_op() -> impl Strategy<Value = TextOp> {
    prop_oneof![
        Just(TextOp::EqualIgnoreCase),
        Just(TextOp::StartsWith),
        Just(TextOp::StartsWithIgnoreCase),
        Just(TextOp::EndsWith),
        Just(TextOp::EndsWithIgnoreCase),
        Just(TextOp::Contains),
        Just(TextOp::ContainsIgnoreCase),
    ]
}

// Includes quote, wildcard and placeholder characters on purpose
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_%'?\\\\]{0,8}"
}

fn arb_int_predicate() -> impl Strategy<Value = FieldPredicate> {
    let op = prop_oneof![
        (arb_compare_op(), any::<i64>())
            .prop_map(|(cmp, v)| PredicateOp::Compare { cmp, value: Value::Int(v) }),
        (any::<i64>(), any::<i64>(), arb_inclusion()).prop_map(|(lo, hi, inclusion)| {
            PredicateOp::Between {
                low: Value::Int(lo),
                high: Value::Int(hi),
                inclusion,
            }
        }),
        prop::collection::vec(any::<i64>(), 1..6).prop_map(|vs| PredicateOp::In {
            values: vs.into_iter().map(Value::Int).collect(),
        }),
        Just(PredicateOp::IsNull),
    ];
    (op, any::<bool>()).prop_map(|(op, negated)| FieldPredicate {
        field: "age".into(),
        op,
        negated,
    })
}

fn arb_text_predicate() -> impl Strategy<Value = FieldPredicate> {
    let op = prop_oneof![
        (arb_compare_op(), arb_text())
            .prop_map(|(cmp, v)| PredicateOp::Compare { cmp, value: Value::Text(v) }),
        (arb_text(), arb_text(), arb_inclusion()).prop_map(|(lo, hi, inclusion)| {
            PredicateOp::Between {
                low: Value::Text(lo),
                high: Value::Text(hi),
                inclusion,
            }
        }),
        prop::collection::vec(arb_text(), 1..6).prop_map(|vs| PredicateOp::In {
            values: vs.into_iter().map(Value::Text).collect(),
        }),
        (arb_text_op(), arb_text()).prop_map(|(text_op, value)| PredicateOp::Text { text_op, value }),
        Just(PredicateOp::IsEmpty),
        Just(PredicateOp::IsNull),
        any::<bool>().prop_map(|value| PredicateOp::Constant { value }),
    ];
    (op, any::<bool>()).prop_map(|(op, negated)| FieldPredicate {
        field: "name".into(),
        op,
        negated,
    })
}

fn render(d: &DialectDescriptor, p: &FieldPredicate) -> (String, Vec<Value>) {
    let (column, declared) = if p.field.as_str() == "name" {
        (d.quote_identifier("name"), DeclaredType::Varchar(Some(32)))
    } else {
        (d.quote_identifier("age"), DeclaredType::BigInt)
    };
    let fragment = d
        .render_predicate(
            p,
            ColumnRef {
                sql: &column,
                declared: &declared,
            },
        )
        .expect("supported predicate");
    let (sql, params) = fragment.into_parts();
    (sql, params)
}

fn balanced(sql: &str) -> bool {
    let mut depth = 0i32;
    let mut quote = None;
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                _ => {}
            },
        }
    }
    depth == 0 && quote.is_none()
}

fn arb_predicate() -> impl Strategy<Value = FieldPredicate> {
    prop_oneof![arb_int_predicate(), arb_text_predicate()]
}

proptest! {
    #[test]
    fn fragments_are_well_formed(p in arb_predicate()) {
        for d in presets::all() {
            let (sql, params) = render(&d, &p);
            prop_assert_eq!(count_placeholders(&sql), params.len(), "{}: {}", d.name(), sql);
            prop_assert!(sql.starts_with('(') && sql.ends_with(')'), "{}: {}", d.name(), sql);
            prop_assert!(balanced(&sql), "{}: {}", d.name(), sql);
        }
    }

    #[test]
    fn negation_wraps_or_flips(p in arb_predicate()) {
        for d in presets::all() {
            let (sql, params) = render(&d, &p);
            let (neg_sql, neg_params) = render(&d, &p.clone().negate());
            prop_assert_eq!(params.len(), neg_params.len());
            match &p.op {
                // flipped in place rather than wrapped
                PredicateOp::Compare { .. } | PredicateOp::Constant { .. } | PredicateOp::IsNull => {}
                _ if p.negated => prop_assert_eq!(format!("(NOT {neg_sql})"), sql),
                _ => prop_assert_eq!(neg_sql, format!("(NOT {sql})")),
            }
        }
    }

    #[test]
    fn double_negation_is_identity(p in arb_predicate()) {
        for d in presets::all() {
            prop_assert_eq!(render(&d, &p), render(&d, &p.clone().negate().negate()));
        }
    }
}

#[test]
fn negated_starts_with_matches_not_starts_with_for_every_dialect() {
    let p = FieldPredicate::text("name", TextOp::StartsWith, "ab");
    for d in presets::all() {
        let (sql, params) = render(&d, &p);
        let (neg_sql, neg_params) = render(&d, &p.clone().negate());
        assert_eq!(neg_sql, format!("(NOT {sql})"), "{}", d.name());
        assert_eq!(params, neg_params);
    }
}

#[test]
fn unsupported_text_operator_on_integer_column() {
    let d = presets::duckdb();
    let p = FieldPredicate::text("age", TextOp::EndsWith, "0");
    let err = d
        .render_predicate(
            &p,
            ColumnRef {
                sql: "\"age\"",
                declared: &DeclaredType::Integer,
            },
        )
        .unwrap_err();
    assert!(err.to_string().contains("EndsWith"));
}
