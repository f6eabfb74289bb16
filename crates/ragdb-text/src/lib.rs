//! ragdb-text
//!
//! Keyword relevance for hybrid search: a script-agnostic tokenizer and a
//! BM25 ranker over an in-RAM tantivy index. See `scorer` for the training
//! contract.

pub mod tantivy_utils;
pub mod tokenize;
pub mod scorer;

pub use scorer::{LexicalHit, LexicalScorer};
pub use tokenize::tokenize;
