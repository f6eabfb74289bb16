use std::cmp::Ordering;
use std::collections::HashSet;

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use ragdb_core::error::{Error, Result};

use crate::tantivy_utils::{build_schema, register_tokenizer, ORDINAL_FIELD, TERMS_FIELD, TEXT_FIELD};
use crate::tokenize::tokenize;

const WRITER_MEMORY_BYTES: usize = 50_000_000;

/// One entry of a lexical ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub text: String,
    pub score: f32,
}

/// Keyword relevance model over the indexed chunks.
///
/// `add` only stages a training example. The model that `rank` answers from
/// changes when `train` is called, so callers must train after every batch
/// of additions; until then `rank` reflects the previous model and
/// [`LexicalScorer::is_stale`] reports `true`.
pub struct LexicalScorer {
    writer: IndexWriter<TantivyDocument>,
    reader: IndexReader,
    terms_field: Field,
    text_field: Field,
    ordinal_field: Field,
    added: u64,
    trained: u64,
}

fn lexical_err(e: tantivy::TantivyError) -> Error { Error::Lexical(e.to_string()) }

impl LexicalScorer {
    pub fn new() -> Result<Self> {
        let schema = build_schema();
        let index = Index::create_in_ram(schema.clone());
        register_tokenizer(&index);
        let writer = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES).map_err(lexical_err)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(lexical_err)?;
        let terms_field = schema.get_field(TERMS_FIELD).map_err(lexical_err)?;
        let text_field = schema.get_field(TEXT_FIELD).map_err(lexical_err)?;
        let ordinal_field = schema.get_field(ORDINAL_FIELD).map_err(lexical_err)?;
        Ok(Self { writer, reader, terms_field, text_field, ordinal_field, added: 0, trained: 0 })
    }

    /// Stage `text` as a training example. Not visible to `rank` until `train`.
    pub fn add(&mut self, text: &str) -> Result<()> {
        let terms = tokenize(text);
        let document = doc!(
            self.terms_field => terms.join(" "),
            self.text_field => text.to_string(),
            self.ordinal_field => self.added,
        );
        self.writer.add_document(document).map_err(lexical_err)?;
        self.added += 1;
        Ok(())
    }

    /// Fold every staged example into the model.
    pub fn train(&mut self) -> Result<()> {
        if !self.is_stale() { return Ok(()); }
        self.writer.commit().map_err(lexical_err)?;
        self.reader.reload().map_err(lexical_err)?;
        tracing::debug!(examples = self.added, staged = self.added - self.trained, "lexical model trained");
        self.trained = self.added;
        Ok(())
    }

    /// True when examples were added since the last `train`.
    pub fn is_stale(&self) -> bool { self.added != self.trained }

    /// Number of examples the current model was trained on.
    pub fn trained_len(&self) -> usize { self.trained as usize }

    /// Rank trained documents by BM25 relevance to `query`.
    ///
    /// Sorted by descending score; equal scores keep insertion order. A query
    /// with no terms yields an empty ranking.
    pub fn rank(&self, query: &str) -> Result<Vec<LexicalHit>> {
        let mut seen = HashSet::new();
        let clauses: Vec<(Occur, Box<dyn Query>)> = tokenize(query)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .map(|t| {
                let term = Term::from_field_text(self.terms_field, &t);
                (Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
            })
            .collect();
        if clauses.is_empty() { return Ok(vec![]); }

        let searcher = self.reader.searcher();
        let num_docs = searcher.num_docs() as usize;
        if num_docs == 0 { return Ok(vec![]); }

        let query = BooleanQuery::new(clauses);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(num_docs)).map_err(lexical_err)?;
        let mut ranked = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let document: TantivyDocument = searcher.doc(addr).map_err(lexical_err)?;
            let ordinal = document.get_first(self.ordinal_field).and_then(|v| v.as_u64()).unwrap_or(u64::MAX);
            let text = document.get_first(self.text_field).and_then(|v| v.as_str()).unwrap_or("").to_string();
            ranked.push((ordinal, LexicalHit { text, score }));
        }
        ranked.sort_by(|(oa, a), (ob, b)| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then(oa.cmp(ob)));
        Ok(ranked.into_iter().map(|(_, hit)| hit).collect())
    }

    /// Number of documents in the current model's index.
    pub fn num_docs(&self) -> u64 { self.reader.searcher().num_docs() }
}
