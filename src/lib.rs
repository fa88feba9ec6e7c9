pub mod canon;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod io_utils;
pub mod pipeline;
pub mod reference;
pub mod report;
pub mod resolve;
pub mod schema;
pub mod text;

use std::{
    env,
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{CleanArgs, Cli, ColumnsArgs, Commands, DetectArgs},
    config::{Settings, override_with},
    reference::{ReferenceSource, load_reference},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("registry_canon", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Clean(args) => handle_clean(&args),
        Commands::Columns(args) => handle_columns(&args),
        Commands::Detect(args) => handle_detect(&args),
    }
}

/// Folds the command-line flags over the settings file.
fn merge_clean_args(settings: &mut Settings, args: &CleanArgs) {
    override_with(&mut settings.kind, args.kind);
    override_with(&mut settings.reference.path, args.reference.clone().map(Some));
    let layout = &args.reference_layout;
    override_with(&mut settings.reference.strategy, layout.strategy);
    override_with(&mut settings.reference.name_column, layout.name_column.map(Some));
    override_with(&mut settings.reference.code_column, layout.code_column.map(Some));
    override_with(&mut settings.reference.region_column, layout.region_column.map(Some));
    override_with(&mut settings.reference.scan_width, layout.scan_width.map(Some));
    override_with(
        &mut settings.reference.strip_region_suffix,
        layout.strip_region_suffix.map(Some),
    );
    let defaults = &args.defaults;
    override_with(&mut settings.defaults.region, defaults.region.clone());
    override_with(&mut settings.defaults.city, defaults.city.clone());
    override_with(&mut settings.defaults.city_code, defaults.city_code.clone());
    override_with(&mut settings.defaults.postal_code, defaults.postal_code.clone());
    override_with(&mut settings.defaults.area_code, defaults.area_code.clone());
    override_with(&mut settings.phone_min_digits, args.phone_min_digits.map(Some));
}

/// `<dir>/<stem><suffix>` next to `input`, or `None` when reading stdin.
fn sibling_path(input: &Path, suffix: &str) -> Option<PathBuf> {
    if io_utils::is_dash(input) {
        return None;
    }
    let stem = input.file_stem()?.to_string_lossy();
    Some(input.with_file_name(format!("{stem}{suffix}")))
}

fn handle_clean(args: &CleanArgs) -> Result<()> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    merge_clean_args(&mut settings, args);
    let reference_path = settings.reference.path.clone().ok_or_else(|| {
        anyhow!("No reference table given; pass --reference or set reference.path in the settings file")
    })?;

    let input_encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let reference_encoding = io_utils::resolve_encoding(args.reference_encoding.as_deref())?;
    let output_encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    info!(
        "Cleaning {} registry '{}' with delimiter '{}'",
        settings.kind,
        args.input.display(),
        printable_delimiter(delimiter)
    );

    let table = io_utils::read_table(&args.input, delimiter, input_encoding)?;
    debug!("Loaded {} row(s) across {} column(s)", table.len(), table.width());
    let strategy = settings.reference.strategy();
    debug!("Reference strategy: {:?}", strategy);
    let index = load_reference(
        &ReferenceSource {
            path: reference_path,
            delimiter: args.reference_delimiter,
            encoding: reference_encoding,
        },
        &strategy,
    )?;

    let output = pipeline::run_pipeline(table, index, &settings.pipeline_options());

    let output_path = args
        .output
        .clone()
        .or_else(|| sibling_path(&args.input, "_canonical.csv"));
    let output_delimiter =
        io_utils::resolve_output_delimiter(output_path.as_deref(), args.output_delimiter, delimiter);
    io_utils::write_table(
        &output.table,
        output_path.as_deref(),
        output_delimiter,
        output_encoding,
    )
    .with_context(|| format!("Writing canonical table for {:?}", args.input))?;
    match &output_path {
        Some(path) if !io_utils::is_dash(path) => {
            info!("Canonical table written to {:?}", path)
        }
        _ => debug!("Canonical table written to stdout"),
    }

    if !output.change_log.is_empty() {
        let log_path = args
            .change_log
            .clone()
            .or_else(|| sibling_path(&args.input, "_canonical_log.csv"));
        match log_path {
            Some(path) => {
                io_utils::write_change_log(&path, &output.change_log.created_columns)?;
                info!("Change log written to {:?}", path);
            }
            None => warn!("Input read from stdin; pass --change-log to keep the created column list"),
        }
    }

    if let Some(path) = &args.summary {
        let file =
            File::create(path).with_context(|| format!("Creating summary file {path:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &output.summary)
            .with_context(|| format!("Writing summary to {path:?}"))?;
        info!("Run summary written to {:?}", path);
    }

    if let Some(limit) = args.preview {
        let preview = report::render_preview(&output.table, limit);
        // stdout carries only the CSV when the table is written there.
        if output_path.as_deref().is_none_or(io_utils::is_dash) {
            eprint!("{preview}");
        } else {
            print!("{preview}");
        }
    }

    if let Some(path) = &args.save_config {
        settings
            .save(path)
            .with_context(|| format!("Saving settings to {path:?}"))?;
        info!("Settings saved to {:?}", path);
    }
    Ok(())
}

fn handle_columns(args: &ColumnsArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let table = io_utils::read_table(&args.input, delimiter, encoding)?;
    let schema = args.kind.schema();
    let resolution = resolve::resolve_columns(&table.headers, &schema);
    print!("{}", report::render_column_map(&schema, &resolution.map));
    info!(
        "{} of {} field(s) would be created",
        resolution.synthesized.len(),
        schema.fields.len()
    );
    Ok(())
}

fn handle_detect(args: &DetectArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.encoding.as_deref())?;
    let source = ReferenceSource {
        path: args.reference.clone(),
        delimiter: args.delimiter,
        encoding,
    };
    let strategy = reference::ReferenceStrategy::AutoDetect {
        scan_width: args.scan_width,
    };
    let rows = reference::read_reference_rows(&source, strategy.min_columns())?;
    let scores = reference::score_columns(&rows, args.scan_width);
    let roles = reference::detect_roles(&rows, args.scan_width);
    print!("{}", report::render_detection(&scores, roles.as_ref().ok()));
    let roles = roles?;
    info!(
        "Detected code column {}, name column {}, region column {}",
        roles.code,
        roles.name,
        roles
            .region
            .map_or_else(|| "none".to_string(), |column| column.to_string())
    );
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
