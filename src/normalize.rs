//! Raw CSV rows to canonical records.
//!
//! A canonical record holds only the fields that survived cleaning; a null
//! field is simply absent, never an empty string.

use std::collections::BTreeMap;

use crate::mapping::FieldMapping;

/// Canonical field name → retained (trimmed, non-empty) raw text.
pub type CanonicalRecord = BTreeMap<String, String>;

/// Empty-value sentinels written by the export tool.
const EMPTY_SENTINELS: &[&str] = &["-", "N/A"];

/// Trim a raw cell and collapse blank or sentinel values to `None`.
pub fn clean(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if EMPTY_SENTINELS
        .iter()
        .any(|s| trimmed.eq_ignore_ascii_case(s))
    {
        return None;
    }
    Some(trimmed)
}

/// Mapping entries resolved against one file's header row. Column positions
/// are computed once and reused for every row.
pub struct RowNormalizer<'m> {
    mapping: &'m FieldMapping,
    positions: Vec<(usize, &'m str)>,
}

impl<'m> RowNormalizer<'m> {
    pub fn new(mapping: &'m FieldMapping, headers: &[String]) -> Self {
        let mut positions = Vec::new();
        for spec in &mapping.fields {
            if let Some(idx) = headers.iter().position(|h| h == &spec.source) {
                positions.push((idx, spec.field.as_str()));
            }
            // A mapped column absent from this file yields null for every
            // row; unmapped file columns are ignored outright.
        }
        for spec in &mapping.ordinals {
            let mut occurrences = headers
                .iter()
                .enumerate()
                .filter(|(_, h)| h.trim() == spec.header)
                .map(|(idx, _)| idx);
            if let Some(idx) = occurrences.nth(spec.occurrence) {
                positions.push((idx, spec.field.as_str()));
            }
        }
        Self { mapping, positions }
    }

    pub fn mapping(&self) -> &'m FieldMapping {
        self.mapping
    }

    /// Normalize one decoded row into a canonical record.
    pub fn normalize(&self, fields: &[String]) -> CanonicalRecord {
        let mut record = CanonicalRecord::new();
        for (idx, field) in &self.positions {
            if let Some(value) = fields.get(*idx).map(String::as_str).and_then(clean) {
                record.insert((*field).to_string(), value.to_string());
            }
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{FieldKind, FieldMapping, FieldSpec, OrdinalSpec};

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn clean_collapses_blanks_and_sentinels() {
        assert_eq!(clean(""), None);
        assert_eq!(clean("   "), None);
        assert_eq!(clean("-"), None);
        assert_eq!(clean("N/A"), None);
        assert_eq!(clean("n/a"), None);
        assert_eq!(clean("  kept  "), Some("kept"));
    }

    #[test]
    fn normalize_maps_named_columns_and_ignores_the_rest() {
        let mapping = FieldMapping {
            fields: vec![
                FieldSpec {
                    source: "Entry ID".to_string(),
                    field: "id".to_string(),
                    kind: FieldKind::Text,
                },
                FieldSpec {
                    source: "Payment ".to_string(),
                    field: "payment_amount".to_string(),
                    kind: FieldKind::Decimal,
                },
            ],
            ordinals: Vec::new(),
        };
        let headers = headers(&["Entry ID", "Unmapped", "Payment "]);
        let normalizer = RowNormalizer::new(&mapping, &headers);

        let record = normalizer.normalize(&fields(&["abc-123", "noise", "$1,000"]));
        assert_eq!(record.get("id").map(String::as_str), Some("abc-123"));
        assert_eq!(
            record.get("payment_amount").map(String::as_str),
            Some("$1,000")
        );
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn normalize_drops_sentinel_cells() {
        let mapping = FieldMapping {
            fields: vec![FieldSpec {
                source: "Seats".to_string(),
                field: "seats".to_string(),
                kind: FieldKind::Integer,
            }],
            ordinals: Vec::new(),
        };
        let headers = headers(&["Seats"]);
        let normalizer = RowNormalizer::new(&mapping, &headers);

        assert!(normalizer.normalize(&fields(&["-"])).is_empty());
        assert!(normalizer.normalize(&fields(&["N/A"])).is_empty());
        assert!(normalizer.normalize(&fields(&[""])).is_empty());
    }

    #[test]
    fn normalize_resolves_duplicate_headers_by_ordinal() {
        let mapping = FieldMapping {
            fields: Vec::new(),
            ordinals: vec![
                OrdinalSpec {
                    header: "Balance".to_string(),
                    occurrence: 0,
                    field: "balance".to_string(),
                    kind: FieldKind::Decimal,
                },
                OrdinalSpec {
                    header: "Balance".to_string(),
                    occurrence: 1,
                    field: "balance_2".to_string(),
                    kind: FieldKind::Decimal,
                },
            ],
        };
        let headers = headers(&["Balance", "Other", "Balance "]);
        let normalizer = RowNormalizer::new(&mapping, &headers);

        let record = normalizer.normalize(&fields(&["100", "x", "250"]));
        assert_eq!(record.get("balance").map(String::as_str), Some("100"));
        assert_eq!(record.get("balance_2").map(String::as_str), Some("250"));
    }

    #[test]
    fn normalize_yields_null_for_missing_mapped_column() {
        let mapping = FieldMapping {
            fields: vec![FieldSpec {
                source: "Notes".to_string(),
                field: "notes".to_string(),
                kind: FieldKind::Text,
            }],
            ordinals: Vec::new(),
        };
        let headers = headers(&["Entry ID"]);
        let normalizer = RowNormalizer::new(&mapping, &headers);
        assert!(normalizer.normalize(&fields(&["abc"])).is_empty());
    }
}
