use anyhow::Result;
use clap::{Parser, Subcommand};
use indrix::config::{Config, LogFormat, LoggingConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::index::DocumentSource;
use commands::run::RunOptions;

#[derive(Parser, Debug)]
#[command(name = "indrix")]
#[command(about = "Indrix CLI - structured retrieval with Indri-style queries")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "INDRIX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index a JSONL corpus into a tantivy index directory
    Index {
        /// Index directory (created when missing)
        #[arg(short, long)]
        index: PathBuf,

        /// JSONL input file (reads stdin when omitted)
        #[arg(short = 'f', long)]
        input: Option<PathBuf>,

        /// JSON key holding the document identifier
        #[arg(long, default_value = "id")]
        id_field: String,

        /// Text fields to index (comma-separated, defaults to the query default field)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Disable progress output
        #[arg(long)]
        no_progress: bool,
    },

    /// Parse a query and print its tree as JSON
    Parse {
        /// Query in Indri prefix syntax
        query: String,
    },

    /// Evaluate a query against an index directory
    Search {
        /// Index directory
        #[arg(short, long)]
        index: PathBuf,

        /// Query in Indri prefix syntax
        query: String,

        /// Number of results to print
        #[arg(short = 'k', long, default_value = "10")]
        limit: usize,

        /// Print one JSON object per result
        #[arg(long)]
        json: bool,

        /// Fail on fields missing from the index schema
        #[arg(long)]
        strict: bool,
    },

    /// Run a file of numbered queries and print TREC run lines
    Run {
        /// Query file (JSON or TOML) with `number` and `text` entries
        queries: PathBuf,

        /// Index directory (overrides `index` in the query file)
        #[arg(short, long)]
        index: Option<PathBuf>,

        /// Results per query (overrides `count`, default 1000)
        #[arg(short = 'k', long)]
        count: Option<usize>,

        /// Retrieval rule such as `dirichlet:2500` or `jm:0.4` (overrides `rule` and [scoring])
        #[arg(short, long)]
        rule: Option<String>,

        /// Tag written in the last column
        #[arg(long, default_value = "indrix")]
        runtag: String,

        /// Fail queries naming fields missing from the index schema
        #[arg(long)]
        strict: bool,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Index {
            index,
            input,
            id_field,
            fields,
            no_progress,
        } => {
            let source = match input {
                Some(path) => DocumentSource::FromFile(path),
                None => DocumentSource::FromStdin,
            };
            let fields = if fields.is_empty() {
                vec![config.query.default_field.clone()]
            } else {
                fields
            };
            commands::run_index(&config, &index, source, &id_field, &fields, no_progress)?;
        }
        Commands::Parse { query } => {
            commands::run_parse(&config, &query)?;
        }
        Commands::Search {
            index,
            query,
            limit,
            json,
            strict,
        } => {
            commands::run_search(&config, &index, &query, limit, json, strict)?;
        }
        Commands::Run {
            queries,
            index,
            count,
            rule,
            runtag,
            strict,
        } => {
            let options = RunOptions {
                index,
                count,
                rule,
                run_tag: runtag,
                strict,
            };
            commands::run_batch(&config, &queries, &options)?;
        }
    }

    Ok(())
}
