use thiserror::Error;

use crate::query::QueryError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_is_transparent() {
        let err: Error = QueryError::InvalidQuery("empty #band".to_string()).into();
        assert_eq!(err.to_string(), "Invalid query: empty #band");
    }

    #[test]
    fn test_config_error() {
        let err = Error::Config("unknown stemmer language: klingon".to_string());
        assert!(err.to_string().contains("klingon"));
    }
}
