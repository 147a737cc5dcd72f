//! Identifier reconciliation between a CSV export and a database snapshot:
//! the three-way diff, the missing-row INSERT generator, and the ghost-row
//! SELECT/DELETE workflow.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use itertools::Itertools;
use log::{info, warn};

use crate::{
    cli::{DiffArgs, GhostPolicy, GhostsArgs, MissingArgs},
    io_utils,
    mapping::FieldMapping,
    normalize::RowNormalizer,
    snapshot::{self, GhostRecord},
    sql,
};

/// One CSV row projected down to its identifier and display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub id: String,
    pub name: Option<String>,
}

/// Read the identifier (and optionally name) column of a CSV file. Rows with
/// a blank identifier are skipped; exports routinely end in empty lines.
pub fn read_id_rows(
    path: &Path,
    id_column: &str,
    name_column: Option<&str>,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Vec<CsvRow>> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let id_idx = headers
        .iter()
        .position(|h| h == id_column)
        .ok_or_else(|| anyhow!("Column '{id_column}' not found in {path:?}"))?;
    let name_idx = name_column.and_then(|name| headers.iter().position(|h| h == name));

    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let decoded = io_utils::decode_record(&record, encoding)?;
        let id = decoded.get(id_idx).map(|s| s.trim()).unwrap_or("");
        if id.is_empty() {
            continue;
        }
        let name = name_idx
            .and_then(|idx| decoded.get(idx))
            .map(|s| s.trim().to_string());
        rows.push(CsvRow {
            id: id.to_string(),
            name,
        });
    }
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport {
    pub common: BTreeSet<String>,
    pub missing: BTreeSet<String>,
    pub ghosts: BTreeSet<String>,
}

/// Three-way identifier diff: `missing` exists only in the CSV, `ghosts`
/// only in the snapshot.
pub fn diff(csv_ids: &BTreeSet<String>, db_ids: &BTreeSet<String>) -> DiffReport {
    DiffReport {
        common: csv_ids.intersection(db_ids).cloned().collect(),
        missing: csv_ids.difference(db_ids).cloned().collect(),
        ghosts: db_ids.difference(csv_ids).cloned().collect(),
    }
}

pub fn execute_diff(args: &DiffArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let rows = read_id_rows(
        &args.input,
        &args.id_column,
        Some(&args.name_column),
        delimiter,
        encoding,
    )?;
    let csv_ids: BTreeSet<String> = rows.iter().map(|row| row.id.clone()).collect();
    let names: HashMap<&str, &str> = rows
        .iter()
        .filter_map(|row| row.name.as_deref().map(|name| (row.id.as_str(), name)))
        .collect();

    let text = io_utils::read_text(&args.snapshot, UTF_8)?;
    let db_ids = snapshot::extract_ids(&text, args.strategy);
    let report = diff(&csv_ids, &db_ids);

    println!("CSV identifiers:      {}", csv_ids.len());
    println!("Snapshot identifiers: {}", db_ids.len());
    println!("Common:               {}", report.common.len());
    println!("Only in CSV (missing from database): {}", report.missing.len());
    println!("Only in database (ghost rows):       {}", report.ghosts.len());

    print_examples("missing", &report.missing, &names, args.examples);
    print_examples("ghost", &report.ghosts, &names, args.examples);

    if let Some(path) = &args.write_missing {
        let listing: Vec<&String> = report.missing.iter().collect();
        let json = serde_json::to_string_pretty(&listing).context("Serializing missing ids")?;
        io_utils::write_text(Some(path.as_path()), &json)?;
        info!(
            "{} missing identifier(s) written to {:?}",
            report.missing.len(),
            path
        );
    }
    Ok(())
}

fn print_examples(
    label: &str,
    ids: &BTreeSet<String>,
    names: &HashMap<&str, &str>,
    limit: usize,
) {
    for id in ids.iter().take(limit) {
        match names.get(id.as_str()) {
            Some(name) => println!("  {label} example: {id} ({name})"),
            None => println!("  {label} example: {id}"),
        }
    }
    if ids.len() > limit && limit > 0 {
        println!("  ... and {} more {label} identifier(s)", ids.len() - limit);
    }
}

pub fn execute_missing(args: &MissingArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let mapping = FieldMapping::resolve(args.mapping.as_deref())?;

    let mut reader = io_utils::open_csv_reader_from_path(&args.input, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let id_idx = headers
        .iter()
        .position(|h| h == &args.id_column)
        .ok_or_else(|| anyhow!("Column '{}' not found in {:?}", args.id_column, args.input))?;

    let mut rows_read = 0usize;
    let mut decoded_rows: Vec<Vec<String>> = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        decoded_rows.push(io_utils::decode_record(&record, encoding)?);
        rows_read += 1;
    }

    let csv_ids: BTreeSet<String> = decoded_rows
        .iter()
        .filter_map(|row| row.get(id_idx))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();

    let wanted: BTreeSet<String> = match (&args.ids, &args.snapshot) {
        (Some(ids_path), _) => {
            let text = io_utils::read_text(ids_path, UTF_8)?;
            snapshot::parse_id_list(&text)?.into_iter().collect()
        }
        (None, Some(snapshot_path)) => {
            let text = io_utils::read_text(snapshot_path, UTF_8)?;
            let db_ids = snapshot::extract_ids(&text, args.strategy);
            diff(&csv_ids, &db_ids).missing
        }
        (None, None) => {
            return Err(anyhow!(
                "Either --snapshot or --ids is required to determine the missing rows"
            ));
        }
    };

    let unmatched: Vec<&String> = wanted.difference(&csv_ids).collect();
    if !unmatched.is_empty() {
        warn!(
            "{} requested identifier(s) have no CSV row (example: {})",
            unmatched.len(),
            unmatched[0]
        );
    }

    let normalizer = RowNormalizer::new(&mapping, &headers);
    let records: Vec<_> = decoded_rows
        .iter()
        .filter(|row| {
            row.get(id_idx)
                .map(|id| wanted.contains(id.trim()))
                .unwrap_or(false)
        })
        .map(|row| normalizer.normalize(row))
        .collect();

    info!(
        "{} row(s) read, {} missing record(s) normalized",
        rows_read,
        records.len()
    );
    if records.is_empty() {
        info!("No CSV rows match the missing identifier set; nothing written");
        return Ok(());
    }
    if !sql::distinct_ids(&records, &args.conflict_column) {
        warn!(
            "Duplicate '{}' values within the selected rows; the conflict clause will drop repeats",
            args.conflict_column
        );
    }

    let statements = sql::insert_batches(
        &records,
        &mapping,
        &args.table,
        &args.conflict_column,
        args.batch_size,
    );
    let contents = statements.iter().join("\n\n") + "\n";
    io_utils::write_text(Some(args.output.as_path()), &contents)?;
    info!(
        "{} INSERT statement(s) for {} record(s) written to {:?}",
        statements.len(),
        records.len(),
        args.output
    );
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedGhost {
    pub ghost_id: String,
    pub name: String,
    pub csv_id: String,
}

#[derive(Debug, Default)]
pub struct GhostAnalysis {
    /// Ghosts whose name matches a CSV row carrying a different identifier
    pub confirmed: Vec<ConfirmedGhost>,
    /// Ghosts whose name appears nowhere in the CSV
    pub unmatched: Vec<GhostRecord>,
}

/// Classify ghost rows against the CSV by display name. The first CSV row
/// with a given name wins, matching how the export is de-duplicated by hand.
pub fn classify_ghosts(ghosts: &[GhostRecord], rows: &[CsvRow]) -> GhostAnalysis {
    let mut by_name: BTreeMap<&str, &str> = BTreeMap::new();
    for row in rows {
        if let Some(name) = row.name.as_deref() {
            by_name.entry(name).or_insert(row.id.as_str());
        }
    }

    let mut analysis = GhostAnalysis::default();
    for ghost in ghosts {
        match by_name.get(ghost.full_name.as_str()) {
            Some(csv_id) if *csv_id != ghost.id => analysis.confirmed.push(ConfirmedGhost {
                ghost_id: ghost.id.clone(),
                name: ghost.full_name.clone(),
                csv_id: (*csv_id).to_string(),
            }),
            Some(_) => warn!(
                "Ghost '{}' ({}) matches the CSV row with the same identifier; not a ghost",
                ghost.full_name, ghost.id
            ),
            None => analysis.unmatched.push(ghost.clone()),
        }
    }
    analysis
}

/// Delete candidates under the chosen policy.
pub fn delete_candidates(analysis: &GhostAnalysis, policy: GhostPolicy) -> BTreeSet<String> {
    let mut ids: BTreeSet<String> = analysis
        .confirmed
        .iter()
        .map(|ghost| ghost.ghost_id.clone())
        .collect();
    if policy == GhostPolicy::All {
        ids.extend(analysis.unmatched.iter().map(|ghost| ghost.id.clone()));
    }
    ids
}

pub fn execute_ghosts(args: &GhostsArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let rows = read_id_rows(
        &args.input,
        &args.id_column,
        Some(&args.name_column),
        delimiter,
        encoding,
    )?;

    if let Some(ghost_data) = &args.ghost_data {
        let text = io_utils::read_text(ghost_data, UTF_8)?;
        let ghosts = snapshot::parse_ghost_records(&text)?;
        info!("Loaded {} ghost record(s) from {:?}", ghosts.len(), ghost_data);

        let analysis = classify_ghosts(&ghosts, &rows);
        println!(
            "Confirmed ghosts (name match, id mismatch): {}",
            analysis.confirmed.len()
        );
        println!(
            "Unmatched ghosts (name absent from CSV):    {}",
            analysis.unmatched.len()
        );
        for ghost in analysis.confirmed.iter().take(args.examples) {
            println!(
                "  confirmed example: {} '{}' (CSV row {})",
                ghost.ghost_id, ghost.name, ghost.csv_id
            );
        }
        for ghost in analysis.unmatched.iter().take(args.examples) {
            println!("  unmatched example: {} '{}'", ghost.id, ghost.full_name);
        }

        let candidates = delete_candidates(&analysis, args.policy);
        if candidates.is_empty() {
            info!("No delete candidates under policy {:?}; nothing written", args.policy);
            return Ok(());
        }
        let statement = sql::delete_statement(&args.table, &candidates) + "\n";
        io_utils::write_text(Some(args.output.as_path()), &statement)?;
        info!(
            "DELETE for {} record(s) written to {:?}",
            candidates.len(),
            args.output
        );
        return Ok(());
    }

    let snapshot_path = args.snapshot.as_ref().ok_or_else(|| {
        anyhow!("Either --snapshot or --ghost-data is required for ghost analysis")
    })?;
    let text = io_utils::read_text(snapshot_path, UTF_8)?;
    let db_ids = snapshot::extract_ids(&text, args.strategy);
    let csv_ids: BTreeSet<String> = rows.iter().map(|row| row.id.clone()).collect();
    let ghost_ids = diff(&csv_ids, &db_ids).ghosts;

    if ghost_ids.is_empty() {
        info!("Snapshot holds no identifiers absent from the CSV; nothing written");
        return Ok(());
    }
    let statement =
        sql::select_statement(&args.table, &["id", "full_name", "company_name"], &ghost_ids)
            + "\n";
    io_utils::write_text(Some(args.output.as_path()), &statement)?;
    info!(
        "SELECT for {} ghost identifier(s) written to {:?}; run it and rerun with --ghost-data",
        ghost_ids.len(),
        args.output
    );
    Ok(())
}
