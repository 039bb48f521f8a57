//! Text analysis shared by indexing and query parsing.
//!
//! The same [`Analyzer`] must tokenize documents and query terms, otherwise stemmed index
//! terms never meet unstemmed query terms. For tantivy indexes it is registered under
//! [`TOKENIZER_NAME`].

use serde::{Deserialize, Serialize};
use tantivy::schema::{IndexRecordOption, TextFieldIndexing, TextOptions};
use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, StopWordFilter,
    TextAnalyzer, Token, TokenStream,
};

use crate::{Error, Result};

/// Name the analyzer is registered under in a tantivy index.
pub const TOKENIZER_NAME: &str = "indrix";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default = "default_true")]
    pub remove_stopwords: bool,
    /// Explicit stopword list. The stemmer language's list is used when absent.
    #[serde(default)]
    pub stopwords: Option<Vec<String>>,
    /// Stemmer language, or `"none"`.
    #[serde(default = "default_stemmer")]
    pub stemmer: String,
    #[serde(default = "default_max_token_length")]
    pub max_token_length: usize,
}

fn default_true() -> bool {
    true
}

fn default_stemmer() -> String {
    "english".to_string()
}

fn default_max_token_length() -> usize {
    40
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            remove_stopwords: true,
            stopwords: None,
            stemmer: default_stemmer(),
            max_token_length: default_max_token_length(),
        }
    }
}

impl AnalyzerConfig {
    /// Lowercasing only: no stopwords, no stemming.
    pub fn plain() -> Self {
        Self {
            remove_stopwords: false,
            stemmer: "none".to_string(),
            ..Self::default()
        }
    }

    fn language(&self) -> Result<Option<Language>> {
        parse_language(&self.stemmer)
    }
}

fn parse_language(name: &str) -> Result<Option<Language>> {
    let language = match name.to_ascii_lowercase().as_str() {
        "none" | "" => return Ok(None),
        "arabic" => Language::Arabic,
        "danish" => Language::Danish,
        "dutch" => Language::Dutch,
        "english" => Language::English,
        "finnish" => Language::Finnish,
        "french" => Language::French,
        "german" => Language::German,
        "greek" => Language::Greek,
        "hungarian" => Language::Hungarian,
        "italian" => Language::Italian,
        "norwegian" => Language::Norwegian,
        "portuguese" => Language::Portuguese,
        "romanian" => Language::Romanian,
        "russian" => Language::Russian,
        "spanish" => Language::Spanish,
        "swedish" => Language::Swedish,
        "tamil" => Language::Tamil,
        "turkish" => Language::Turkish,
        other => {
            return Err(Error::Config(format!(
                "unknown stemmer language: {}",
                other
            )))
        }
    };
    Ok(Some(language))
}

/// A token and its position in the analyzed stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedToken {
    pub text: String,
    pub position: u32,
}

/// A configured tokenizer chain.
#[derive(Clone)]
pub struct Analyzer {
    config: AnalyzerConfig,
    analyzer: TextAnalyzer,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::plain()
    }
}

impl Analyzer {
    /// Build the chain `SimpleTokenizer -> RemoveLong -> LowerCaser -> StopWords -> Stemmer`,
    /// skipping the stages the config disables.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        let language = config.language()?;

        let mut builder = TextAnalyzer::builder(SimpleTokenizer::default())
            .dynamic()
            .filter_dynamic(RemoveLongFilter::limit(config.max_token_length));
        if config.lowercase {
            builder = builder.filter_dynamic(LowerCaser);
        }
        if config.remove_stopwords {
            let filter = match (&config.stopwords, language) {
                (Some(words), _) => StopWordFilter::remove(words.iter().cloned()),
                (None, Some(language)) => StopWordFilter::new(language).ok_or_else(|| {
                    Error::Config(format!(
                        "no stopword list for language {:?}",
                        language
                    ))
                })?,
                (None, None) => StopWordFilter::new(Language::English).ok_or_else(|| {
                    Error::Config("no English stopword list".to_string())
                })?,
            };
            builder = builder.filter_dynamic(filter);
        }
        if let Some(language) = language {
            builder = builder.filter_dynamic(Stemmer::new(language));
        }

        Ok(Self {
            config,
            analyzer: builder.build(),
        })
    }

    /// Lowercasing tokenizer without stopwords or stemming.
    pub fn plain() -> Self {
        let config = AnalyzerConfig::plain();
        let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(config.max_token_length))
            .filter(LowerCaser)
            .build();
        Self { config, analyzer }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn tokens(&self, text: &str) -> Vec<AnalyzedToken> {
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        let mut add_token = |token: &Token| {
            tokens.push(AnalyzedToken {
                text: token.text.clone(),
                position: token.position as u32,
            });
        };
        stream.process(&mut add_token);
        tokens
    }

    pub fn terms(&self, text: &str) -> Vec<String> {
        self.tokens(text).into_iter().map(|token| token.text).collect()
    }

    /// The tokenizer chain, for registration on a tantivy index.
    pub fn text_analyzer(&self) -> TextAnalyzer {
        self.analyzer.clone()
    }

    pub fn register(&self, index: &tantivy::Index) {
        index
            .tokenizers()
            .register(TOKENIZER_NAME, self.text_analyzer());
    }
}

/// Field options for a text field scored by the engine: positions, fieldnorms and this
/// crate's tokenizer.
pub fn text_field_options(stored: bool) -> TextOptions {
    let indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER_NAME)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions)
        .set_fieldnorms(true);
    let options = TextOptions::default().set_indexing_options(indexing);
    if stored {
        options.set_stored()
    } else {
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_analyzer() {
        let analyzer = Analyzer::plain();
        assert_eq!(analyzer.terms("The Running DOGS"), vec!["the", "running", "dogs"]);
    }

    #[test]
    fn test_english_analyzer_stems_and_drops_stopwords() {
        let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
        assert_eq!(analyzer.terms("the dogs are running"), vec!["dog", "run"]);
    }

    #[test]
    fn test_positions_keep_stopword_gaps() {
        let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
        let tokens = analyzer.tokens("cat and dog");
        assert_eq!(
            tokens,
            vec![
                AnalyzedToken {
                    text: "cat".to_string(),
                    position: 0
                },
                AnalyzedToken {
                    text: "dog".to_string(),
                    position: 2
                },
            ]
        );
    }

    #[test]
    fn test_custom_stopwords() {
        let config = AnalyzerConfig {
            stopwords: Some(vec!["cat".to_string()]),
            stemmer: "none".to_string(),
            ..AnalyzerConfig::default()
        };
        let analyzer = Analyzer::new(config).unwrap();
        assert_eq!(analyzer.terms("the cat sat"), vec!["the", "sat"]);
    }

    #[test]
    fn test_long_tokens_are_removed() {
        let config = AnalyzerConfig {
            max_token_length: 5,
            ..AnalyzerConfig::plain()
        };
        let analyzer = Analyzer::new(config).unwrap();
        assert_eq!(analyzer.terms("tiny enormous"), vec!["tiny"]);
    }

    #[test]
    fn test_unknown_language() {
        let config = AnalyzerConfig {
            stemmer: "klingon".to_string(),
            ..AnalyzerConfig::default()
        };
        match Analyzer::new(config) {
            Err(Error::Config(message)) => assert!(message.contains("klingon")),
            other => panic!("Expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_config_defaults_from_empty_toml() {
        let config: AnalyzerConfig = toml::from_str("").unwrap();
        assert_eq!(config, AnalyzerConfig::default());
    }
}
