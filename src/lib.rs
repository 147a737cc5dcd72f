pub mod cli;
pub mod io_utils;
pub mod mapping;
pub mod normalize;
pub mod reconcile;
pub mod seed;
pub mod snapshot;
pub mod sql;

use std::{collections::HashMap, env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands, DuplicatesArgs, IdsArgs};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_reconcile", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Seed(args) => seed::execute(&args),
        Commands::Diff(args) => reconcile::execute_diff(&args),
        Commands::Missing(args) => reconcile::execute_missing(&args),
        Commands::Ghosts(args) => reconcile::execute_ghosts(&args),
        Commands::Duplicates(args) => handle_duplicates(&args),
        Commands::Ids(args) => handle_ids(&args),
    }
}

fn handle_ids(args: &IdsArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let rows = reconcile::read_id_rows(&args.input, &args.id_column, None, delimiter, encoding)?;
    let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
    let json = serde_json::to_string(&ids).context("Serializing identifier list")?;
    io_utils::write_text(args.output.as_deref(), &format!("{json}\n"))?;
    info!("{} identifier(s) emitted from {:?}", ids.len(), args.input);
    Ok(())
}

fn handle_duplicates(args: &DuplicatesArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let rows = reconcile::read_id_rows(
        &args.input,
        &args.id_column,
        Some(&args.name_column),
        delimiter,
        encoding,
    )?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in &rows {
        *counts.entry(row.id.as_str()).or_insert(0) += 1;
    }
    let mut duplicates: Vec<&str> = Vec::new();
    for row in &rows {
        if counts[row.id.as_str()] > 1 && !duplicates.contains(&row.id.as_str()) {
            duplicates.push(row.id.as_str());
        }
    }

    println!("Rows with identifier: {}", rows.len());
    println!("Unique identifiers:   {}", counts.len());
    println!("Duplicate identifiers: {}", duplicates.len());
    for dup_id in &duplicates {
        println!("--- duplicate: {dup_id}");
        for (entry, row) in rows.iter().filter(|row| row.id == *dup_id).enumerate() {
            println!(
                "  entry {}: {}",
                entry + 1,
                row.name.as_deref().unwrap_or("<no name>")
            );
        }
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
