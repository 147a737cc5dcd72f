use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Reconcile CSV exports against database snapshots", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate batched idempotent INSERT statements for every CSV row
    Seed(SeedArgs),
    /// Compare CSV identifiers against a snapshot and report the difference
    Diff(DiffArgs),
    /// Generate INSERT statements for CSV rows absent from a snapshot
    Missing(MissingArgs),
    /// Inspect database rows absent from the CSV and emit SELECT/DELETE SQL
    Ghosts(GhostsArgs),
    /// Report duplicate identifier values within a CSV file
    Duplicates(DuplicatesArgs),
    /// Dump the CSV identifier column as a JSON array
    Ids(IdsArgs),
}

/// Strategy for pulling identifiers out of a snapshot file. `auto` tries
/// each variant in declaration order and settles for the first that yields
/// anything.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum ExtractionStrategy {
    Auto,
    StrictJson,
    DelimitedJson,
    Pattern,
}

impl Default for ExtractionStrategy {
    fn default() -> Self {
        ExtractionStrategy::Auto
    }
}

/// Which ghost rows become DELETE candidates.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum GhostPolicy {
    /// Delete every ghost, name-matched or not
    All,
    /// Delete only ghosts whose name matches a CSV row under a different id
    NameMatched,
}

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// Input CSV file to seed from
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Directory receiving one .sql file per batch
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: PathBuf,
    /// File name prefix for generated batches
    #[arg(long, default_value = "batch")]
    pub prefix: String,
    /// Target table for INSERT statements
    #[arg(long, default_value = "public.leads")]
    pub table: String,
    /// Column named in the ON CONFLICT clause
    #[arg(long = "conflict-column", default_value = "id")]
    pub conflict_column: String,
    /// Rows per INSERT statement
    #[arg(long = "batch-size", default_value_t = 5)]
    pub batch_size: usize,
    /// JSON field-mapping file (built-in leads mapping if omitted)
    #[arg(short, long)]
    pub mapping: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Input CSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Snapshot file containing current database identifiers
    #[arg(short = 's', long = "snapshot")]
    pub snapshot: PathBuf,
    /// Identifier extraction strategy for the snapshot
    #[arg(long, value_enum, default_value = "auto")]
    pub strategy: ExtractionStrategy,
    /// CSV column holding the identifier
    #[arg(long = "id-column", default_value = "Entry ID")]
    pub id_column: String,
    /// CSV column holding the display name
    #[arg(long = "name-column", default_value = "Record")]
    pub name_column: String,
    /// Maximum examples to print per category
    #[arg(long, default_value_t = 3)]
    pub examples: usize,
    /// Write the missing identifier list to this JSON file
    #[arg(long = "write-missing")]
    pub write_missing: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct MissingArgs {
    /// Input CSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Snapshot file containing current database identifiers
    #[arg(short = 's', long = "snapshot")]
    pub snapshot: Option<PathBuf>,
    /// JSON array of identifiers to insert, bypassing the snapshot diff
    #[arg(long)]
    pub ids: Option<PathBuf>,
    /// Output SQL file ('-' for stdout)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Target table for INSERT statements
    #[arg(long, default_value = "public.leads")]
    pub table: String,
    /// Column named in the ON CONFLICT clause
    #[arg(long = "conflict-column", default_value = "id")]
    pub conflict_column: String,
    /// Rows per INSERT statement
    #[arg(long = "batch-size", default_value_t = 5)]
    pub batch_size: usize,
    /// JSON field-mapping file (built-in leads mapping if omitted)
    #[arg(short, long)]
    pub mapping: Option<PathBuf>,
    /// Identifier extraction strategy for the snapshot
    #[arg(long, value_enum, default_value = "auto")]
    pub strategy: ExtractionStrategy,
    /// CSV column holding the identifier
    #[arg(long = "id-column", default_value = "Entry ID")]
    pub id_column: String,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct GhostsArgs {
    /// Input CSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Snapshot file containing current database identifiers
    #[arg(short = 's', long = "snapshot")]
    pub snapshot: Option<PathBuf>,
    /// JSON ghost rows (id + full_name) fetched with the emitted SELECT
    #[arg(long = "ghost-data")]
    pub ghost_data: Option<PathBuf>,
    /// Output SQL file ('-' for stdout)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Target table
    #[arg(long, default_value = "public.leads")]
    pub table: String,
    /// Deletion policy applied when ghost data is supplied
    #[arg(long, value_enum, default_value = "all")]
    pub policy: GhostPolicy,
    /// Identifier extraction strategy for the snapshot
    #[arg(long, value_enum, default_value = "auto")]
    pub strategy: ExtractionStrategy,
    /// CSV column holding the identifier
    #[arg(long = "id-column", default_value = "Entry ID")]
    pub id_column: String,
    /// CSV column holding the display name
    #[arg(long = "name-column", default_value = "Record")]
    pub name_column: String,
    /// Maximum examples to print per category
    #[arg(long, default_value_t = 3)]
    pub examples: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct DuplicatesArgs {
    /// Input CSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV column holding the identifier
    #[arg(long = "id-column", default_value = "Entry ID")]
    pub id_column: String,
    /// CSV column holding the display name
    #[arg(long = "name-column", default_value = "Record")]
    pub name_column: String,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct IdsArgs {
    /// Input CSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output JSON file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV column holding the identifier
    #[arg(long = "id-column", default_value = "Entry ID")]
    pub id_column: String,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
