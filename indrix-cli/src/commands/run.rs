use anyhow::{bail, Context, Result};
use indrix::Config;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::search::IndexSession;

/// Results per query when neither the command line nor the query file sets a count
pub const DEFAULT_COUNT: usize = 1000;

/// Query identifier, written as given. Files may use numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum QueryNumber {
    Number(u64),
    Text(String),
}

impl fmt::Display for QueryNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNumber::Number(number) => write!(f, "{}", number),
            QueryNumber::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NumberedQuery {
    pub number: QueryNumber,
    pub text: String,
}

/// Batch parameters: the queries plus optional index, count and retrieval rule
///
/// JSON files list queries under `queries`; TOML files may use `[[query]]` tables.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryFile {
    #[serde(default)]
    pub index: Option<PathBuf>,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub rule: Option<String>,
    #[serde(default, alias = "query")]
    pub queries: Vec<NumberedQuery>,
}

impl QueryFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read query file {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse query file {:?}", path))
    }

    /// JSON when the content opens with `{`, TOML otherwise
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim_start().starts_with('{') {
            Ok(serde_json::from_str(content)?)
        } else {
            Ok(toml::from_str(content)?)
        }
    }
}

/// Command line settings; each one overrides the query file
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub index: Option<PathBuf>,
    pub count: Option<usize>,
    pub rule: Option<String>,
    pub run_tag: String,
    pub strict: bool,
}

/// Write one TREC run line `qid Q0 docid rank score tag` per hit. Queries that fail to parse
/// or evaluate are logged and skipped. Returns the number of lines written.
pub fn write_run<W: Write>(
    config: &Config,
    file: &QueryFile,
    options: &RunOptions,
    out: &mut W,
) -> Result<usize> {
    if options.run_tag.is_empty() || options.run_tag.contains(char::is_whitespace) {
        bail!("Run tag {:?} must be a single non-empty word", options.run_tag);
    }
    let index_dir = options
        .index
        .as_ref()
        .or(file.index.as_ref())
        .context("No index given: pass --index or set `index` in the query file")?;
    let count = options.count.or(file.count).unwrap_or(DEFAULT_COUNT);

    let mut config = config.clone();
    if let Some(rule) = options.rule.as_deref().or(file.rule.as_deref()) {
        config
            .scoring
            .apply_rule(rule)
            .with_context(|| format!("Invalid retrieval rule {:?}", rule))?;
    }

    let session = IndexSession::open(&config, index_dir)?;
    let mut lines = 0;
    for query in &file.queries {
        let hits = match session.search(&query.text, count, options.strict) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(query = %query.number, error = %e, "Query skipped");
                continue;
            }
        };
        for hit in &hits {
            writeln!(
                out,
                "{} Q0 {} {} {} {}",
                query.number, hit.id, hit.rank, hit.score, options.run_tag
            )?;
        }
        lines += hits.len();
    }
    Ok(lines)
}

/// Run batch command
pub fn run_batch(config: &Config, queries: &Path, options: &RunOptions) -> Result<()> {
    let file = QueryFile::load(queries)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let lines = write_run(config, &file, options, &mut out)?;
    out.flush()?;
    info!(queries = file.queries.len(), lines, "Run written");
    Ok(())
}
