//! Property checks for value cleaning and literal coercion.

use proptest::prelude::*;

use csv_reconcile::{mapping::FieldKind, normalize::clean, sql};

fn digits(count: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(0u8..=9, count)
        .prop_map(|ds| ds.into_iter().map(|d| (b'0' + d) as char).collect())
}

fn date_prefixed_strategy() -> impl Strategy<Value = String> {
    (digits(4), digits(2), digits(2), "[ a-zA-Z0-9:,-]{0,12}")
        .prop_map(|(y, m, d, suffix)| format!("{y}-{m}-{d}{suffix}"))
}

proptest! {
    #[test]
    fn date_coercion_keeps_exactly_the_first_ten_characters(
        value in date_prefixed_strategy()
    ) {
        let rendered = sql::literal(FieldKind::Date, Some(&value));
        prop_assert_eq!(rendered, format!("'{}'", &value[..10]));
    }

    #[test]
    fn date_coercion_rejects_unshaped_values(value in "[0-9/.]{0,9}") {
        // Anything shorter than ten characters cannot carry the prefix.
        prop_assert_eq!(sql::literal(FieldKind::Date, Some(&value)), "NULL");
    }

    #[test]
    fn decimal_coercion_ignores_currency_formatting(
        whole in 0u64..=999_999,
        cents in 1u32..=99,
    ) {
        let grouped = whole
            .to_string()
            .as_bytes()
            .rchunks(3)
            .rev()
            .map(|chunk| std::str::from_utf8(chunk).unwrap())
            .collect::<Vec<_>>()
            .join(",");
        let value = format!("${grouped}.{cents:02}");
        let rendered = sql::literal(FieldKind::Decimal, Some(&value));
        let expected = if cents % 10 == 0 {
            format!("{whole}.{}", cents / 10)
        } else {
            format!("{whole}.{cents:02}")
        };
        prop_assert_eq!(rendered, expected);
    }

    #[test]
    fn integer_coercion_strips_one_trailing_percent(count in 0i64..=100_000) {
        let rendered = sql::literal(FieldKind::Integer, Some(&format!("{count}%")));
        prop_assert_eq!(rendered, count.to_string());
    }

    #[test]
    fn boolean_coercion_is_false_for_arbitrary_text(value in "[a-z]{1,12}") {
        prop_assume!(value != "yes" && value != "true");
        prop_assert_eq!(sql::literal(FieldKind::Boolean, Some(&value)), "FALSE");
    }

    #[test]
    fn clean_never_returns_empty_text(value in ".*") {
        if let Some(kept) = clean(&value) {
            prop_assert!(!kept.is_empty());
            prop_assert_eq!(kept, kept.trim());
        }
    }
}

#[test]
fn clean_treats_all_sentinel_spellings_as_null() {
    for sentinel in ["", "-", "N/A", "n/a", "N/a", "  -  "] {
        assert_eq!(clean(sentinel), None, "sentinel {sentinel:?}");
    }
}
