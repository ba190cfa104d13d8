use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use serde_json::Value;
use sift_search::{Builder, HttpClient, Operator, SearchConfig, SearchError};
use tracing::info;

/// Connection settings come from SIFT_HOSTS, SIFT_TYPE and SIFT_TIMEOUT_SECS.
#[derive(Parser)]
#[command(name = "sift", about = "Query a search backend", long_about = None)]
struct Cli {
    /// Print the compiled request instead of sending it
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print matching documents
    Search {
        index: String,
        /// field=value, field~value, field!=value, field>=value (also >, <=, <), field?
        filters: Vec<Filter>,
    },

    /// Print the number of matches
    Count { index: String, filters: Vec<Filter> },

    /// Print one document
    Get {
        index: String,
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Delete one document
    Delete {
        index: String,
        #[arg(value_name = "ID")]
        id: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("cannot render output: {0}")]
    Output(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt::init();

    let config = SearchConfig::from_env();
    info!(host = config.primary_host(), "connecting");
    let mut builder = Builder::connect(config);

    match run(&mut builder, cli.command, cli.dry_run) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(
    builder: &mut Builder<HttpClient>,
    command: Command,
    dry_run: bool,
) -> Result<String, CliError> {
    match command {
        Command::Search { index, filters } | Command::Count { index, filters }
            if dry_run =>
        {
            builder.index(index);
            apply_filters(builder, &filters);
            pretty(&builder.to_request()?.to_document())
        }
        Command::Get { index, id } | Command::Delete { index, id } if dry_run => {
            builder.index(index).where_term("_id", id).limit(1);
            pretty(&builder.to_request()?.to_document())
        }
        Command::Search { index, filters } => {
            builder.index(index);
            apply_filters(builder, &filters);
            let records: Vec<Value> = builder
                .get()?
                .into_iter()
                .map(|r| Value::Object(r.into_inner()))
                .collect();
            pretty(&Value::from(records))
        }
        Command::Count { index, filters } => {
            builder.index(index);
            apply_filters(builder, &filters);
            Ok(builder.count()?.to_string())
        }
        Command::Get { index, id } => {
            let record = builder.index(index).by_id_or_fail(&id)?;
            pretty(&Value::Object(record.into_inner()))
        }
        Command::Delete { index, id } => {
            builder.index(index).delete(&id)?;
            Ok(format!("deleted {id}"))
        }
    }
}

/// One command-line filter such as `age>=18` or `title?`.
#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Exists(String),
    Term(String, Value),
    Match(String, Value),
    Compare(String, Operator, Value),
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(arg: &str) -> Result<Self, Self::Err> {
        if let Some(field) = arg.strip_suffix('?').filter(|f| !f.is_empty()) {
            return Ok(Filter::Exists(field.to_string()));
        }

        let (field, op, raw) =
            split_filter(arg).ok_or_else(|| format!("cannot parse filter `{arg}`"))?;
        let field = field.to_string();
        let value = parse_value(raw);
        Ok(match op {
            "=" => Filter::Term(field, value),
            "~" => Filter::Match(field, value),
            "!=" => Filter::Compare(field, Operator::Ne, value),
            ">" => Filter::Compare(field, Operator::Gt, value),
            ">=" => Filter::Compare(field, Operator::Gte, value),
            "<" => Filter::Compare(field, Operator::Lt, value),
            _ => Filter::Compare(field, Operator::Lte, value),
        })
    }
}

fn apply_filters(builder: &mut Builder<HttpClient>, filters: &[Filter]) {
    for filter in filters {
        match filter.clone() {
            Filter::Exists(field) => builder.where_exists(field),
            Filter::Term(field, value) => builder.where_term(field, value),
            Filter::Match(field, value) => builder.where_match(field, value),
            Filter::Compare(field, Operator::Ne, value) => {
                builder.where_op(field, Operator::Ne, value)
            }
            Filter::Compare(field, op, value) => builder.where_range(field, op, value),
        };
    }
}

/// Splits at the leftmost operator; `>=` wins over `>` at the same spot.
fn split_filter(arg: &str) -> Option<(&str, &str, &str)> {
    const OPERATORS: [&str; 7] = ["!=", ">=", "<=", "~", "=", ">", "<"];
    OPERATORS
        .iter()
        .filter_map(|op| arg.find(op).map(|at| (at, *op)))
        .min_by_key(|(at, _)| *at)
        .filter(|(at, _)| *at > 0)
        .map(|(at, op)| (&arg[..at], op, &arg[at + op.len()..]))
}

/// Numbers, booleans and quoted strings are read as JSON; anything else is
/// a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw))
}

fn pretty(value: &Value) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}
