//! SQL literal rendering and statement builders.
//!
//! Output is plain statement text intended for manual execution; no database
//! connection is ever opened. A malformed cell degrades to `NULL` for that
//! one field so a single bad value never aborts a batch, and all builders
//! are deterministic: identical input records in identical order produce
//! byte-identical statement text.

use std::collections::{BTreeSet, HashSet};

use itertools::Itertools;
use rust_decimal::Decimal;

use crate::{
    mapping::{FieldKind, FieldMapping},
    normalize::CanonicalRecord,
};

pub const NULL: &str = "NULL";

/// Double embedded single quotes for safe inclusion in a quoted literal.
pub fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

fn quoted(value: &str) -> String {
    format!("'{}'", escape(value))
}

/// Render one cleaned field value as a SQL literal. `None` is the upstream
/// null from normalization; every parse failure also renders `NULL`.
pub fn literal(kind: FieldKind, value: Option<&str>) -> String {
    let Some(value) = value else {
        return NULL.to_string();
    };
    match kind {
        FieldKind::Text | FieldKind::Timestamp => quoted(value),
        FieldKind::Decimal => {
            let stripped: String = value
                .chars()
                .filter(|c| !matches!(c, '$' | ','))
                .collect();
            match stripped.trim().parse::<Decimal>() {
                Ok(amount) => render_decimal(amount),
                Err(_) => NULL.to_string(),
            }
        }
        FieldKind::Integer => {
            let digits = value.strip_suffix('%').unwrap_or(value).trim_end();
            match digits.parse::<i64>() {
                Ok(count) => count.to_string(),
                Err(_) => NULL.to_string(),
            }
        }
        FieldKind::Boolean => {
            if value.eq_ignore_ascii_case("yes") || value.eq_ignore_ascii_case("true") {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        FieldKind::Date => {
            // Lossy shape check: YYYY-MM-DD prefix, no month/day validation.
            if value.len() >= 10 && value.as_bytes()[4] == b'-' && value.is_char_boundary(10) {
                quoted(&value[..10])
            } else {
                NULL.to_string()
            }
        }
        FieldKind::EmptyArray => "'{}'".to_string(),
    }
}

fn render_decimal(amount: Decimal) -> String {
    let amount = amount.normalize();
    if amount.is_integer() {
        format!("{amount}.0")
    } else {
        amount.to_string()
    }
}

/// Lexicographically sorted union of the canonical fields actually present
/// across the records. Fields never populated in any record do not appear.
pub fn column_union(records: &[CanonicalRecord]) -> Vec<String> {
    let mut columns = BTreeSet::new();
    for record in records {
        columns.extend(record.keys().cloned());
    }
    columns.into_iter().collect()
}

/// One multi-row idempotent INSERT over the given column list. Records
/// missing a column render `NULL` in that position.
pub fn insert_statement(
    records: &[CanonicalRecord],
    columns: &[String],
    mapping: &FieldMapping,
    table: &str,
    conflict_column: &str,
) -> String {
    let rows = records
        .iter()
        .map(|record| {
            let values = columns
                .iter()
                .map(|column| {
                    literal(
                        mapping.kind_of(column),
                        record.get(column).map(String::as_str),
                    )
                })
                .join(", ");
            format!("({values})")
        })
        .join(", ");
    format!(
        "INSERT INTO {table} ({columns}) VALUES {rows} ON CONFLICT ({conflict_column}) DO NOTHING;",
        columns = columns.join(", ")
    )
}

/// Chunk records into statements of at most `batch_size` rows. The column
/// union is computed once over the whole record set so every batch of a run
/// shares an identical column list.
pub fn insert_batches(
    records: &[CanonicalRecord],
    mapping: &FieldMapping,
    table: &str,
    conflict_column: &str,
    batch_size: usize,
) -> Vec<String> {
    if records.is_empty() {
        return Vec::new();
    }
    let columns = column_union(records);
    records
        .chunks(batch_size.max(1))
        .map(|chunk| insert_statement(chunk, &columns, mapping, table, conflict_column))
        .collect()
}

fn id_list(ids: &BTreeSet<String>) -> String {
    ids.iter().map(|id| quoted(id)).join(", ")
}

pub fn select_statement(table: &str, columns: &[&str], ids: &BTreeSet<String>) -> String {
    format!(
        "SELECT {} FROM {table} WHERE id IN ({});",
        columns.join(", "),
        id_list(ids)
    )
}

pub fn delete_statement(table: &str, ids: &BTreeSet<String>) -> String {
    format!("DELETE FROM {table} WHERE id IN ({});", id_list(ids))
}

/// Guard against identity collisions before building a batch; the records
/// are assumed disjoint in the conflict column.
pub fn distinct_ids(records: &[CanonicalRecord], conflict_column: &str) -> bool {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|record| record.get(conflict_column))
        .all(|id| seen.insert(id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FieldMapping;

    fn record(pairs: &[(&str, &str)]) -> CanonicalRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn literal_renders_null_for_absent_values() {
        assert_eq!(literal(FieldKind::Text, None), "NULL");
        assert_eq!(literal(FieldKind::Decimal, None), "NULL");
    }

    #[test]
    fn literal_strips_currency_formatting_from_decimals() {
        assert_eq!(literal(FieldKind::Decimal, Some("$1,234.50")), "1234.5");
        assert_eq!(literal(FieldKind::Decimal, Some("$1,000")), "1000.0");
        assert_eq!(literal(FieldKind::Decimal, Some("250")), "250.0");
        assert_eq!(literal(FieldKind::Decimal, Some("twelve")), "NULL");
    }

    #[test]
    fn literal_strips_trailing_percent_from_integers() {
        assert_eq!(literal(FieldKind::Integer, Some("12%")), "12");
        assert_eq!(literal(FieldKind::Integer, Some("7")), "7");
        assert_eq!(literal(FieldKind::Integer, Some("lots")), "NULL");
    }

    #[test]
    fn literal_maps_booleans_case_insensitively() {
        assert_eq!(literal(FieldKind::Boolean, Some("Yes")), "TRUE");
        assert_eq!(literal(FieldKind::Boolean, Some("TRUE")), "TRUE");
        assert_eq!(literal(FieldKind::Boolean, Some("no")), "FALSE");
        assert_eq!(literal(FieldKind::Boolean, Some("whatever")), "FALSE");
    }

    #[test]
    fn literal_takes_the_date_prefix_or_nothing() {
        assert_eq!(
            literal(FieldKind::Date, Some("2024-05-06T14:30:00")),
            "'2024-05-06'"
        );
        assert_eq!(literal(FieldKind::Date, Some("2024-99-99")), "'2024-99-99'");
        assert_eq!(literal(FieldKind::Date, Some("06/05/2024")), "NULL");
        assert_eq!(literal(FieldKind::Date, Some("2024-05")), "NULL");
    }

    #[test]
    fn literal_escapes_quotes_in_text_and_timestamps() {
        assert_eq!(literal(FieldKind::Text, Some("O'Brien")), "'O''Brien'");
        assert_eq!(
            literal(FieldKind::Timestamp, Some("2024-05-06 10:00 o'clock")),
            "'2024-05-06 10:00 o''clock'"
        );
    }

    #[test]
    fn literal_always_renders_empty_array_override() {
        assert_eq!(literal(FieldKind::EmptyArray, Some("[1, 2, 3]")), "'{}'");
        assert_eq!(literal(FieldKind::EmptyArray, None), "NULL");
    }

    #[test]
    fn insert_statement_sorts_columns_and_pads_missing_fields() {
        let mapping = FieldMapping::leads_default();
        let records = vec![
            record(&[("id", "a"), ("seats", "12%"), ("payment_amount", "$1,000")]),
            record(&[("id", "b"), ("paid_full", "Yes")]),
        ];
        let columns = column_union(&records);
        assert_eq!(columns, ["id", "paid_full", "payment_amount", "seats"]);

        let statement = insert_statement(&records, &columns, &mapping, "public.leads", "id");
        assert_eq!(
            statement,
            "INSERT INTO public.leads (id, paid_full, payment_amount, seats) \
             VALUES ('a', NULL, 1000.0, 12), ('b', TRUE, NULL, NULL) \
             ON CONFLICT (id) DO NOTHING;"
        );
    }

    #[test]
    fn insert_statement_is_deterministic() {
        let mapping = FieldMapping::leads_default();
        let records = vec![
            record(&[("id", "a"), ("notes", "first")]),
            record(&[("id", "b"), ("company_name", "Acme")]),
        ];
        let columns = column_union(&records);
        let first = insert_statement(&records, &columns, &mapping, "public.leads", "id");
        let second = insert_statement(&records, &columns, &mapping, "public.leads", "id");
        assert_eq!(first, second);
    }

    #[test]
    fn insert_batches_share_one_column_list() {
        let mapping = FieldMapping::leads_default();
        let records = vec![
            record(&[("id", "a"), ("notes", "x")]),
            record(&[("id", "b")]),
            record(&[("id", "c"), ("seats", "3")]),
        ];
        let statements = insert_batches(&records, &mapping, "public.leads", "id", 2);
        assert_eq!(statements.len(), 2);
        for statement in &statements {
            assert!(statement.starts_with("INSERT INTO public.leads (id, notes, seats) VALUES "));
            assert!(statement.ends_with("ON CONFLICT (id) DO NOTHING;"));
        }
    }

    #[test]
    fn select_and_delete_quote_sorted_ids() {
        let ids: BTreeSet<String> = ["y", "x"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            select_statement("leads", &["id", "full_name"], &ids),
            "SELECT id, full_name FROM leads WHERE id IN ('x', 'y');"
        );
        assert_eq!(
            delete_statement("leads", &ids),
            "DELETE FROM leads WHERE id IN ('x', 'y');"
        );
    }

    #[test]
    fn distinct_ids_flags_collisions() {
        let unique = vec![record(&[("id", "a")]), record(&[("id", "b")])];
        let dup = vec![record(&[("id", "a")]), record(&[("id", "a")])];
        assert!(distinct_ids(&unique, "id"));
        assert!(!distinct_ids(&dup, "id"));
    }
}
