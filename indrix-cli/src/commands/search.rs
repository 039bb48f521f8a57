use anyhow::{Context, Result};
use indrix::postings::TermPostingSource;
use indrix::{Config, QueryEvaluator, Score, TantivySegmentSource};
use serde_json::json;
use std::path::Path;
use tantivy::schema::OwnedValue;
use tantivy::{DocAddress, Index, Searcher, TantivyDocument};

use super::ID_FIELD;

/// One ranked result with its stored identifier
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub rank: usize,
    pub id: String,
    pub score: Score,
}

fn stored_id(searcher: &Searcher, address: DocAddress) -> Result<String> {
    let Ok(id_field) = searcher.schema().get_field(ID_FIELD) else {
        return Ok(format!("{}:{}", address.segment_ord, address.doc_id));
    };
    let document: TantivyDocument = searcher.doc(address)?;
    Ok(match document.get_first(id_field) {
        Some(OwnedValue::Str(id)) => id.clone(),
        _ => format!("{}:{}", address.segment_ord, address.doc_id),
    })
}

/// An opened index and the evaluator configured for it
pub struct IndexSession {
    evaluator: QueryEvaluator,
    searcher: Searcher,
}

impl IndexSession {
    pub fn open(config: &Config, index_dir: &Path) -> Result<Self> {
        let index = Index::open_in_dir(index_dir)
            .with_context(|| format!("Failed to open index at {:?}", index_dir))?;
        let evaluator = QueryEvaluator::from_config(config)?;
        evaluator.analyzer().register(&index);
        let searcher = index.reader()?.searcher();
        Ok(Self {
            evaluator,
            searcher,
        })
    }

    /// Evaluate `query` over every segment and resolve stored ids
    pub fn search(&self, query: &str, limit: usize, strict: bool) -> Result<Vec<SearchHit>> {
        let segments = TantivySegmentSource::segments(&self.searcher);

        if strict {
            let tree = self.evaluator.parse(query)?;
            if let Some(segment) = segments.first() {
                segment.check_fields(&tree)?;
            }
        }

        let sources: Vec<&dyn TermPostingSource> = segments
            .iter()
            .map(|segment| segment as &dyn TermPostingSource)
            .collect();
        let results = self.evaluator.search(query, &sources, limit)?;

        let mut hits = Vec::with_capacity(results.hits.len());
        for (rank, hit) in results.hits.iter().enumerate() {
            let address = DocAddress::new(hit.segment as u32, hit.doc);
            hits.push(SearchHit {
                rank: rank + 1,
                id: stored_id(&self.searcher, address)?,
                score: hit.score,
            });
        }
        Ok(hits)
    }
}

/// Evaluate `query` over every segment of the index at `index_dir`
pub fn search_index(
    config: &Config,
    index_dir: &Path,
    query: &str,
    limit: usize,
    strict: bool,
) -> Result<Vec<SearchHit>> {
    IndexSession::open(config, index_dir)?.search(query, limit, strict)
}

/// Run search command
pub fn run_search(
    config: &Config,
    index_dir: &Path,
    query: &str,
    limit: usize,
    as_json: bool,
    strict: bool,
) -> Result<()> {
    let hits = search_index(config, index_dir, query, limit, strict)?;

    if as_json {
        for hit in &hits {
            println!(
                "{}",
                json!({ "rank": hit.rank, "id": hit.id, "score": hit.score })
            );
        }
        return Ok(());
    }

    if hits.is_empty() {
        println!("No matching documents");
        return Ok(());
    }
    println!("{:>5}  {:<32}  {:>12}", "Rank", "Id", "Score");
    println!("--------------------------------------------------------");
    for hit in &hits {
        println!("{:>5}  {:<32}  {:>12.6}", hit.rank, hit.id, hit.score);
    }
    Ok(())
}
