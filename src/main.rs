//! Tallyline - group, aggregate, sort and transpose plain-text tables.

mod config;
mod logger;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tallyline_core::storage::{CsvSink, CsvSource, PipeSink, PipeSource};
use tallyline_core::{
    AggregateConfig, Table, TableSink, TableSource, TransposeConfig, aggregate, transpose_table,
};
use tallyline_engine::builtins::{BUILTINS, Function};

#[derive(Parser)]
#[command(name = "tallyline")]
#[command(about = "Group, aggregate, sort and transpose plain-text tables", long_about = None)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where the input table comes from and how it is written back.
#[derive(clap::Args)]
struct InputArgs {
    /// Document holding the table (`-` reads stdin)
    file: PathBuf,

    /// Name of the table (`#+NAME:`); the first table when omitted
    #[arg(short, long, default_value = "")]
    table: String,

    /// Treat the input as CSV (implied by a .csv extension)
    #[arg(long)]
    csv: bool,

    /// CSV input has no header line
    #[arg(long)]
    no_header: bool,

    /// Only rows for which this expression is true are used
    #[arg(long)]
    cond: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Group rows by key columns and compute one row per group
    Aggregate {
        #[command(flatten)]
        input: InputArgs,

        /// Column specs, e.g. "Day mean(Level);f1 sum(Quantity);^N"
        #[arg(short, long)]
        cols: String,

        /// Insert separators where the first N sort keys change
        #[arg(long)]
        hline: Option<usize>,

        /// Config file (default: <config dir>/tallyline/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Turn columns into rows
    Transpose {
        #[command(flatten)]
        input: InputArgs,

        /// Columns to keep, in output order (default: all)
        #[arg(short, long)]
        cols: Option<String>,
    },

    /// List the functions available in column formulas
    Functions,
}

enum Format {
    Pipe,
    Csv,
}

fn input_format(input: &InputArgs) -> Format {
    let is_csv_file = input
        .file
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if input.csv || is_csv_file {
        Format::Csv
    } else {
        Format::Pipe
    }
}

fn read_stdin() -> Result<String> {
    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read stdin")?;
    Ok(content)
}

fn load_table(input: &InputArgs, format: &Format) -> Result<Table> {
    let path = input.file.as_path();
    let from_stdin = path == Path::new("-");
    let failed = || format!("Failed to read {}", path.display());
    let has_header = !input.no_header;

    let source: Box<dyn TableSource> = match format {
        Format::Csv if from_stdin => Box::new(CsvSource::new(&read_stdin()?, has_header)?),
        Format::Csv => Box::new(CsvSource::from_path(path, has_header).with_context(failed)?),
        Format::Pipe => {
            let source = if from_stdin {
                PipeSource::new(&read_stdin()?)
            } else {
                PipeSource::from_path(path).with_context(failed)?
            };
            log::debug!("named tables: {:?}", source.names().collect::<Vec<_>>());
            Box::new(source)
        }
    };
    Ok(source.resolve(&input.table)?)
}

fn render(table: &Table, format: &Format) -> String {
    match format {
        Format::Csv => CsvSink.render(table),
        Format::Pipe => PipeSink.render(table),
    }
}

fn run_aggregate(
    input: &InputArgs,
    cols: String,
    hline: Option<usize>,
    config: Option<&Path>,
) -> Result<String> {
    let (settings, warnings) = config::load_settings(config);
    for warning in &warnings {
        log::warn!("{}", warning);
    }

    let format = input_format(input);
    let table = load_table(input, &format)?;
    let config = AggregateConfig {
        column_specs: cols,
        row_filter: input.cond.clone(),
        separator_depth: hline.or(settings.separator_depth),
        format: settings.format,
    };
    let result = aggregate(&table, &config)?;
    Ok(render(&result, &format))
}

fn run_transpose(input: &InputArgs, cols: Option<String>) -> Result<String> {
    let format = input_format(input);
    let table = load_table(input, &format)?;
    let config = TransposeConfig {
        columns: cols,
        row_filter: input.cond.clone(),
    };
    let result = transpose_table(&table, &config)?;
    Ok(render(&result, &format))
}

fn list_functions() -> String {
    let mut out = String::new();
    for builtin in BUILTINS {
        let kind = match builtin.function {
            Function::Aggregate(_) => "aggregate",
            Function::Math(_) => "math",
        };
        out.push_str(&format!(
            "{:<8} {:<10} {}\n",
            builtin.name, kind, builtin.description
        ));
    }
    out
}

fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let result = match cli.command {
        Commands::Aggregate {
            input,
            cols,
            hline,
            config,
        } => run_aggregate(&input, cols, hline, config.as_deref()),
        Commands::Transpose { input, cols } => run_transpose(&input, cols),
        Commands::Functions => Ok(list_functions()),
    };

    match result {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
