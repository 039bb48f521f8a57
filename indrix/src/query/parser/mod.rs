mod indri;
mod tokenizer;

pub use indri::{IndriParser, DEFAULT_FIELD};
