pub mod index;
pub mod parse;
pub mod run;
pub mod search;

pub use index::run_index;
pub use parse::run_parse;
pub use run::run_batch;
pub use search::run_search;

/// Stored identifier field added to every index this tool builds.
pub const ID_FIELD: &str = "id";
