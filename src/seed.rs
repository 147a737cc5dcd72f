//! Full-export seeding: normalize every CSV row and emit batched idempotent
//! INSERT statements, one file per batch.

use std::fs;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{cli::SeedArgs, io_utils, mapping::FieldMapping, normalize::RowNormalizer, sql};

pub fn execute(args: &SeedArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let mapping = FieldMapping::resolve(args.mapping.as_deref())?;
    info!(
        "Seeding '{}' into {} (delimiter '{}', batch size {})",
        args.input.display(),
        args.table,
        crate::printable_delimiter(delimiter),
        args.batch_size
    );

    let mut reader = io_utils::open_csv_reader_from_path(&args.input, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let normalizer = RowNormalizer::new(&mapping, &headers);

    let mut rows_read = 0usize;
    let mut skipped_empty = 0usize;
    let mut records = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let decoded = io_utils::decode_record(&record, encoding)?;
        rows_read += 1;
        let canonical = normalizer.normalize(&decoded);
        if canonical.is_empty() {
            // Exports routinely trail off into fully blank rows.
            skipped_empty += 1;
            continue;
        }
        records.push(canonical);
    }
    debug!("{} row(s) decoded, {} blank", rows_read, skipped_empty);

    if !sql::distinct_ids(&records, &args.conflict_column) {
        warn!(
            "Duplicate '{}' values in the export; the conflict clause will drop repeats",
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

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Creating output directory {:?}", args.output_dir))?;
    for (batch_idx, statement) in statements.iter().enumerate() {
        let path = args
            .output_dir
            .join(format!("{}_{batch_idx:04}.sql", args.prefix));
        io_utils::write_text(Some(path.as_path()), &format!("{statement}\n"))?;
    }

    info!(
        "{} row(s) read, {} record(s) normalized, {} batch(es) written to {:?}",
        rows_read,
        records.len(),
        statements.len(),
        args.output_dir
    );
    Ok(())
}
