use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, STORED};
use tantivy::tokenizer::{TextAnalyzer, WhitespaceTokenizer};
use tantivy::Index;

/// Name of the analyzer registered on every lexical index.
pub const TERMS_TOKENIZER: &str = "ragdb_terms";

pub const TERMS_FIELD: &str = "terms";
pub const TEXT_FIELD: &str = "text";
pub const ORDINAL_FIELD: &str = "ordinal";

/// Schema of the lexical index.
///
/// `terms` holds the output of [`crate::tokenize`] joined by spaces, so the
/// analyzer only needs to split on whitespace. `text` keeps the original
/// chunk and `ordinal` its insertion order for tie-breaking.
pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    let terms_indexing = TextFieldIndexing::default()
        .set_tokenizer(TERMS_TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqs);
    let terms_options = TextOptions::default().set_indexing_options(terms_indexing);
    let _terms_field = schema_builder.add_text_field(TERMS_FIELD, terms_options);
    let _text_field = schema_builder.add_text_field(TEXT_FIELD, STORED);
    let _ordinal_field = schema_builder.add_u64_field(ORDINAL_FIELD, STORED | FAST);
    schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
    let tokenizer = TextAnalyzer::builder(WhitespaceTokenizer::default()).build();
    index.tokenizers().register(TERMS_TOKENIZER, tokenizer);
}
