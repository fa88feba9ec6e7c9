use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::{config::StrategyChoice, schema::DatasetKind};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Canonicalize client and supplier registries against a municipality reference",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve columns, fill gaps from the reference and rewrite fields canonically
    Clean(CleanArgs),
    /// Show how the headers of a table map onto the logical schema
    Columns(ColumnsArgs),
    /// Score the columns of a headerless reference table and report their roles
    Detect(DetectArgs),
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Registry kind (defaults to client, or the settings file's kind)
    #[arg(short = 'k', long)]
    pub kind: Option<DatasetKind>,
    /// Input CSV table with a header row
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Headerless municipality reference table
    #[arg(short = 'r', long = "reference")]
    pub reference: Option<PathBuf>,
    /// Output CSV file (defaults to `<input stem>_canonical.csv`; `-` for stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Change log path (defaults to `<input stem>_canonical_log.csv`)
    #[arg(long = "change-log")]
    pub change_log: Option<PathBuf>,
    /// Write the run summary as JSON to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,
    /// YAML settings file providing defaults for every option below
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
    /// Persist the merged settings to this YAML file after a successful run
    #[arg(long = "save-config")]
    pub save_config: Option<PathBuf>,
    #[command(flatten)]
    pub defaults: DefaultArgs,
    #[command(flatten)]
    pub reference_layout: ReferenceLayoutArgs,
    /// Minimum digits for a phone number to be masked
    #[arg(long = "phone-min-digits")]
    pub phone_min_digits: Option<usize>,
    /// CSV delimiter of the input table
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter of the reference table (tries ',' then ';' when omitted)
    #[arg(long = "reference-delimiter", value_parser = parse_delimiter)]
    pub reference_delimiter: Option<u8>,
    /// Delimiter for output (defaults to the input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input table (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Character encoding of the reference table (defaults to utf-8)
    #[arg(long = "reference-encoding")]
    pub reference_encoding: Option<String>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Print the first N canonical rows as a table
    #[arg(long)]
    pub preview: Option<usize>,
}

#[derive(Debug, Args)]
pub struct DefaultArgs {
    /// Two-letter region used when neither the row nor the reference has one
    #[arg(long = "default-region")]
    pub region: Option<String>,
    /// City used when the row has none and its code is unknown
    #[arg(long = "default-city")]
    pub city: Option<String>,
    /// Municipality code used when the city is not in the reference
    #[arg(long = "default-city-code")]
    pub city_code: Option<String>,
    /// Postal code used for rows without one
    #[arg(long = "default-postal-code")]
    pub postal_code: Option<String>,
    /// Area code given to 8 and 9 digit phone numbers
    #[arg(long = "default-area-code")]
    pub area_code: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReferenceLayoutArgs {
    /// How reference columns are assigned: fixed positions or content scoring
    #[arg(long = "reference-strategy")]
    pub strategy: Option<StrategyChoice>,
    /// Zero-based column holding municipality names (fixed strategy)
    #[arg(long = "reference-name-column")]
    pub name_column: Option<usize>,
    /// Zero-based column holding municipality codes (fixed strategy)
    #[arg(long = "reference-code-column")]
    pub code_column: Option<usize>,
    /// Zero-based column holding region codes (fixed strategy)
    #[arg(long = "reference-region-column")]
    pub region_column: Option<usize>,
    /// Strip trailing region qualifiers such as `(MG)` from reference names
    /// (`--strip-region-suffix false` turns a saved setting off)
    #[arg(
        long = "strip-region-suffix",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub strip_region_suffix: Option<bool>,
    /// Number of leading columns scored by the auto strategy
    #[arg(long = "scan-width")]
    pub scan_width: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Registry kind whose schema the headers are resolved against
    #[arg(short = 'k', long, default_value = "client")]
    pub kind: DatasetKind,
    /// Input CSV table with a header row
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter of the input table
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input table (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Headerless municipality reference table
    #[arg(short = 'r', long = "reference")]
    pub reference: PathBuf,
    /// Number of leading columns to score
    #[arg(long = "scan-width", default_value_t = crate::reference::DEFAULT_SCAN_WIDTH)]
    pub scan_width: usize,
    /// Delimiter of the reference table (tries ',' then ';' when omitted)
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the reference table (defaults to utf-8)
    #[arg(long = "encoding")]
    pub encoding: Option<String>,
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
