mod commands;
mod schema;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use commands::check::cmd_check;
use commands::query::{cmd_query, QueryOptions};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// What an expression passed to `check` is compiled as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ExpressionKind {
    Predicate,
    Projection,
    Ordering,
}

/// Compile and run dynamic query expressions over JSON rows.
#[derive(Parser)]
#[command(
    name = "dynq",
    version,
    about = "Compile and run dynamic query expressions over JSON rows"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log compiler activity to stderr (-v debug, -vv trace); DYNQ_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query over the rows of a JSON file
    Query {
        /// TOML schema describing the row type
        #[arg(long)]
        schema: PathBuf,
        /// JSON file holding an array of rows
        #[arg(long)]
        data: PathBuf,
        /// Predicate rows must satisfy; repeat to combine
        #[arg(long = "where")]
        filters: Vec<String>,
        /// Ordering keys, e.g. "Age desc, Name"
        #[arg(long)]
        order_by: Option<String>,
        /// Group rows by this key
        #[arg(long)]
        group_by: Option<String>,
        /// Element selector for each group
        #[arg(long, requires = "group_by")]
        group_select: Option<String>,
        /// Projection applied after filtering, ordering and grouping
        #[arg(long)]
        select: Option<String>,
        #[arg(long)]
        skip: Option<usize>,
        #[arg(long)]
        take: Option<usize>,
        /// Print the number of resulting rows instead of the rows
        #[arg(long)]
        count: bool,
        /// Positional argument (JSON), referenced as @0, @1, ...
        #[arg(long = "arg")]
        args: Vec<String>,
        /// Named argument as name=JSON
        #[arg(long = "named")]
        named: Vec<String>,
    },

    /// Compile an expression against a schema and report its type
    Check {
        /// TOML schema describing the row type
        #[arg(long)]
        schema: PathBuf,
        /// Expression text
        expression: String,
        #[arg(long, value_enum, default_value = "predicate")]
        kind: ExpressionKind,
        /// Positional argument (JSON), referenced as @0, @1, ...
        #[arg(long = "arg")]
        args: Vec<String>,
        /// Named argument as name=JSON
        #[arg(long = "named")]
        named: Vec<String>,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("DYNQ_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Query {
            schema,
            data,
            filters,
            order_by,
            group_by,
            group_select,
            select,
            skip,
            take,
            count,
            args,
            named,
        } => {
            cmd_query(QueryOptions {
                schema: &schema,
                data: &data,
                filters: &filters,
                order_by: order_by.as_deref(),
                group_by: group_by.as_deref(),
                group_select: group_select.as_deref(),
                select: select.as_deref(),
                skip,
                take,
                count,
                args: &args,
                named: &named,
                output: cli.output,
                quiet: cli.quiet,
            });
        }
        Commands::Check {
            schema,
            expression,
            kind,
            args,
            named,
        } => {
            cmd_check(
                &schema,
                &expression,
                kind,
                &args,
                &named,
                cli.output,
                cli.quiet,
            );
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
