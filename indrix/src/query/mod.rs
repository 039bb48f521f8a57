//! Indri query language: tree model and prefix-notation parser.

pub mod ast;
pub mod parser;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Parse error: {message} (at `{fragment}`)")]
    Parse { message: String, fragment: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),
}

impl QueryError {
    pub fn parse(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        QueryError::Parse {
            message: message.into(),
            fragment: fragment.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_parse_error_carries_fragment() {
        let err = QueryError::parse("unbalanced parentheses", "#and(a b");
        assert_eq!(
            err.to_string(),
            "Parse error: unbalanced parentheses (at `#and(a b`)"
        );
    }

    #[test]
    fn test_unknown_field_error() {
        let err = QueryError::UnknownField("title".to_string());
        assert!(err.to_string().contains("title"));
    }
}
