use anyhow::Result;
use indrix::{Config, QueryEvaluator};

/// Run parse command: print the analyzed tree, then its JSON form
pub fn run_parse(config: &Config, query: &str) -> Result<()> {
    let evaluator = QueryEvaluator::from_config(config)?;
    let tree = evaluator.parse(query)?;

    println!("{}", tree);
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}
