//! The field-mapping table: raw CSV column names to canonical database
//! fields, each with a type kind driving SQL literal rendering.
//!
//! Mappings are ordinary JSON documents saved/loaded with serde, so a file
//! with a different header layout only needs a different mapping file, not a
//! code change. Repeated raw headers (the export carries two `Balance`
//! columns) cannot be resolved by name, so the table also holds ordinal
//! entries that index the Nth occurrence of a header within the header row.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Type class of a canonical field, deciding how its value renders into a
/// SQL literal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    #[default]
    Text,
    Decimal,
    Integer,
    Boolean,
    Date,
    Timestamp,
    /// History column that always renders as the empty-array literal `'{}'`,
    /// whatever the export contains.
    EmptyArray,
}

/// Name-keyed mapping entry. Every raw column name appears at most once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSpec {
    /// Raw CSV header, verbatim (embedded spaces and quotes included)
    pub source: String,
    /// Canonical field name
    pub field: String,
    #[serde(default)]
    pub kind: FieldKind,
}

/// Ordinal mapping entry for a repeated raw header: resolved by the
/// occurrence's position in the header row, never by name lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrdinalSpec {
    /// Trimmed raw header text shared by the repeated columns
    pub header: String,
    /// Zero-based occurrence among columns with that header
    pub occurrence: usize,
    /// Canonical field name
    pub field: String,
    #[serde(default)]
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldMapping {
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub ordinals: Vec<OrdinalSpec>,
}

impl FieldMapping {
    /// Built-in mapping for the leads master-sheet export.
    pub fn leads_default() -> Self {
        use FieldKind::*;
        let fields = [
            ("Entry ID", "id", Text),
            ("Record ID", "record_id", Text),
            ("Record", "full_name", Text),
            ("Priority ", "priority", Text),
            ("\"Priority \" Changed At", "priority_changed_at", Timestamp),
            (
                "\"Priority \" Previous Values",
                "priority_previous_values",
                EmptyArray,
            ),
            ("Company name", "company_name", Text),
            ("Parent Record > Email addresses", "email", Text),
            ("Parent Record > Phone numbers", "phone", Text),
            ("Parent Record > Instagram", "instagram", Text),
            ("Parent Record > Description", "description", Text),
            (
                "Parent Record > Primary location > Country",
                "country",
                Text,
            ),
            ("Parent Record > Primary location > City", "city", Text),
            ("Parent Record > Job title", "job_title", Text),
            ("Discovery Call Date", "discovery_call_date", Date),
            ("Offering Type ", "offering_type", Text),
            ("Session Type", "session_type", Text),
            ("Payment ", "payment_amount", Decimal),
            ("Seats", "seats", Integer),
            ("Coupon %", "coupon_percent", Integer),
            ("Coupon Code", "coupon_code", Text),
            ("Paid Desposit", "paid_deposit", Boolean),
            ("Amount Paid 2", "amount_paid_2", Decimal),
            ("DOP", "date_of_payment", Date),
            ("Payment Plan", "payment_plan", Text),
            ("Amount Paid", "amount_paid", Decimal),
            ("DOP 2", "date_of_payment_2", Date),
            ("Balance DOP", "balance_dop", Date),
            ("Paid Full", "paid_full", Boolean),
            ("DOP 3", "date_of_payment_3", Date),
            ("Day Slot", "day_slot", Text),
            ("Time Slot", "time_slot", Text),
            ("START DATE", "start_date", Date),
            ("END DATE", "end_date", Date),
            ("Sessions Done", "sessions_done", Integer),
            ("Booked Support", "booked_support", Text),
            ("Support Date Booked", "support_date_booked", Date),
            ("Notes", "notes", Text),
        ]
        .into_iter()
        .map(|(source, field, kind)| FieldSpec {
            source: source.to_string(),
            field: field.to_string(),
            kind,
        })
        .collect();

        // The export repeats the `Balance` header; the first occurrence is
        // the running balance, the second the post-plan balance.
        let ordinals = vec![
            OrdinalSpec {
                header: "Balance".to_string(),
                occurrence: 0,
                field: "balance".to_string(),
                kind: Decimal,
            },
            OrdinalSpec {
                header: "Balance".to_string(),
                occurrence: 1,
                field: "balance_2".to_string(),
                kind: Decimal,
            },
        ];

        FieldMapping { fields, ordinals }
    }

    /// Load the mapping at `path`, or fall back to the built-in leads
    /// mapping when no path is given.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::leads_default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Opening mapping file {path:?}"))?;
        let reader = BufReader::new(file);
        let mapping = serde_json::from_reader(reader)
            .with_context(|| format!("Parsing mapping JSON {path:?}"))?;
        Ok(mapping)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating mapping file {path:?}"))?;
        serde_json::to_writer_pretty(file, self).context("Writing mapping JSON")
    }

    /// Type kind of a canonical field. Unknown fields render as free text.
    pub fn kind_of(&self, field: &str) -> FieldKind {
        self.fields
            .iter()
            .find(|spec| spec.field == field)
            .map(|spec| spec.kind)
            .or_else(|| {
                self.ordinals
                    .iter()
                    .find(|spec| spec.field == field)
                    .map(|spec| spec.kind)
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leads_default_keys_are_unique() {
        let mapping = FieldMapping::leads_default();
        let mut sources: Vec<&str> = mapping.fields.iter().map(|s| s.source.as_str()).collect();
        sources.sort_unstable();
        let before = sources.len();
        sources.dedup();
        assert_eq!(before, sources.len(), "duplicate raw column key");
    }

    #[test]
    fn kind_of_covers_named_and_ordinal_fields() {
        let mapping = FieldMapping::leads_default();
        assert_eq!(mapping.kind_of("payment_amount"), FieldKind::Decimal);
        assert_eq!(mapping.kind_of("balance_2"), FieldKind::Decimal);
        assert_eq!(mapping.kind_of("paid_full"), FieldKind::Boolean);
        assert_eq!(
            mapping.kind_of("priority_previous_values"),
            FieldKind::EmptyArray
        );
        assert_eq!(mapping.kind_of("never_mapped"), FieldKind::Text);
    }

    #[test]
    fn mapping_round_trips_through_json() {
        let mapping = FieldMapping::leads_default();
        let json = serde_json::to_string(&mapping).expect("serialize");
        let restored: FieldMapping = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(mapping, restored);
    }

    #[test]
    fn kind_defaults_to_text_when_omitted() {
        let json = r#"{"fields":[{"source":"Name","field":"name"}]}"#;
        let mapping: FieldMapping = serde_json::from_str(json).expect("parse");
        assert_eq!(mapping.fields[0].kind, FieldKind::Text);
        assert!(mapping.ordinals.is_empty());
    }
}
