use anyhow::{Context, Result};
use indrix::analysis::text_field_options;
use indrix::{Analyzer, Config};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tantivy::directory::MmapDirectory;
use tantivy::schema::{Field, Schema, STORED, STRING};
use tantivy::{Index, IndexWriter, TantivyDocument};

use super::ID_FIELD;

const WRITER_MEMORY_BYTES: usize = 50_000_000;
const PROGRESS_EVERY: usize = 10_000;

/// Source for documents to index
pub enum DocumentSource {
    FromFile(PathBuf),
    FromStdin,
}

impl DocumentSource {
    pub fn reader(&self) -> io::Result<Box<dyn BufRead>> {
        match self {
            DocumentSource::FromFile(path) => {
                let file = File::open(path)?;
                Ok(Box::new(BufReader::new(file)))
            }
            DocumentSource::FromStdin => Ok(Box::new(BufReader::new(io::stdin()))),
        }
    }
}

/// Progress tracking for indexing
struct IndexProgress {
    docs: usize,
    skipped: usize,
    bytes: usize,
    start_time: Instant,
    enabled: bool,
}

impl IndexProgress {
    fn new(enabled: bool) -> Self {
        Self {
            docs: 0,
            skipped: 0,
            bytes: 0,
            start_time: Instant::now(),
            enabled,
        }
    }

    fn add(&mut self, bytes: usize) {
        self.docs += 1;
        self.bytes += bytes;
        if self.enabled && self.docs % PROGRESS_EVERY == 0 {
            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                eprint!(
                    "\r  Indexed {} docs ({:.1} docs/s)    ",
                    self.docs,
                    self.docs as f64 / elapsed
                );
            }
        }
    }

    fn finish(&self) {
        if !self.enabled {
            return;
        }
        let elapsed = self.start_time.elapsed();
        eprintln!();
        println!("Indexing completed:");
        println!("  Documents: {}", self.docs);
        println!("  Skipped:   {}", self.skipped);
        println!("  Bytes:     {:.2} MB", self.bytes as f64 / 1_000_000.0);
        println!("  Time:      {:.2}s", elapsed.as_secs_f64());
    }
}

fn build_schema(fields: &[String]) -> Result<Schema> {
    let mut builder = Schema::builder();
    builder.add_text_field(ID_FIELD, STRING | STORED);
    for name in fields {
        if name == ID_FIELD {
            anyhow::bail!("'{}' is reserved for document identifiers", ID_FIELD);
        }
        builder.add_text_field(name, text_field_options(false));
    }
    Ok(builder.build())
}

fn document_id(value: &Value, id_field: &str, line_number: usize) -> String {
    match value.get(id_field) {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => line_number.to_string(),
    }
}

/// Run index command. Returns the number of documents added.
pub fn run_index(
    config: &Config,
    index_dir: &Path,
    source: DocumentSource,
    id_field: &str,
    fields: &[String],
    no_progress: bool,
) -> Result<usize> {
    fs::create_dir_all(index_dir)
        .with_context(|| format!("Failed to create index directory {:?}", index_dir))?;
    let schema = build_schema(fields)?;
    let directory = MmapDirectory::open(index_dir)
        .with_context(|| format!("Failed to open index directory {:?}", index_dir))?;
    let index = Index::open_or_create(directory, schema.clone())
        .with_context(|| format!("Index at {:?} has a different schema", index_dir))?;

    let analyzer = Analyzer::new(config.analysis.clone())?;
    analyzer.register(&index);

    let id = schema.get_field(ID_FIELD)?;
    let mut text_fields: Vec<(&str, Field)> = Vec::with_capacity(fields.len());
    for name in fields {
        text_fields.push((name.as_str(), schema.get_field(name)?));
    }

    let mut writer: IndexWriter = index.writer(WRITER_MEMORY_BYTES)?;
    let mut progress = IndexProgress::new(!no_progress);
    let reader = source.reader()?;

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(line = line_number + 1, error = %e, "Skipping malformed JSON line");
                progress.skipped += 1;
                continue;
            }
        };

        let mut document = TantivyDocument::default();
        document.add_text(id, document_id(&value, id_field, line_number));
        for (name, field) in &text_fields {
            if let Some(text) = value.get(*name).and_then(Value::as_str) {
                document.add_text(*field, text);
            }
        }
        writer.add_document(document)?;
        progress.add(line.len());
    }

    writer.commit()?;
    progress.finish();
    tracing::info!(
        index = ?index_dir,
        docs = progress.docs,
        skipped = progress.skipped,
        "Index committed"
    );
    Ok(progress.docs)
}
