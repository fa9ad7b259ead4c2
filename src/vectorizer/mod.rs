pub mod corpus;
pub mod tfidf;
pub mod token;

use std::marker::PhantomData;

use indexmap::IndexSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    utils::math::vector::{SparseMatrix, SparseVec},
    vectorizer::{
        corpus::Corpus,
        tfidf::{DefaultTfIdfEngine, TfIdfEngine},
        token::TermFrequency,
    },
};

/// Ordered, immutable term -> column mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    terms: IndexSet<Box<str>>,
}

impl Vocabulary {
    pub fn from_terms<I>(terms: I) -> Self
    where
        I: IntoIterator<Item = Box<str>>,
    {
        Vocabulary {
            terms: terms.into_iter().collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Column of `term`, if it is in the vocabulary.
    #[inline]
    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.terms.get_index_of(term)
    }

    /// Term at column `index`.
    #[inline]
    pub fn term(&self, index: usize) -> Option<&str> {
        self.terms.get_index(index).map(|t| t.as_ref())
    }

    /// Terms in column order.
    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ {
        self.terms.iter().map(|t| t.as_ref())
    }
}

/// IDF weights frozen at fit time, one per vocabulary column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdfVector {
    /// IDF per column
    pub idf_vec: Vec<f64>,
    /// document frequency per column, as counted at fit
    pub doc_counts: Vec<u64>,
    /// number of documents at fit
    pub doc_num: u64,
}

/// Vocabulary size limits applied at fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorizerParams {
    pub max_features: usize,
    pub min_document_frequency: usize,
}

/// Fitted TF-IDF vectorizer.
///
/// `fit` builds the vocabulary and IDF from a corpus; `transform` maps new
/// text onto the same columns with the frozen IDF. Terms outside the
/// vocabulary are dropped silently. Every output row is L2-normalized.
///
/// `E` is the weighting engine, see [`TfIdfEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TfIdfVectorizer<E = DefaultTfIdfEngine>
where
    E: TfIdfEngine,
{
    vocabulary: Vocabulary,
    idf: IdfVector,
    #[serde(skip)]
    _marker: PhantomData<E>,
}

impl<E> TfIdfVectorizer<E>
where
    E: TfIdfEngine,
{
    /// Fit on already-normalized texts and return the lexical matrix of the
    /// same texts.
    ///
    /// # Errors
    /// [`Error::Configuration`] for an empty corpus or when no term survives
    /// the frequency filter.
    pub fn fit<S>(texts: &[S], params: VectorizerParams) -> Result<(Self, SparseMatrix)>
    where
        S: AsRef<str> + Sync,
    {
        if texts.is_empty() {
            return Err(Error::config("cannot fit the vectorizer on zero documents"));
        }
        if params.max_features == 0 || params.min_document_frequency == 0 {
            return Err(Error::config("max_features and min_document_frequency must be positive"));
        }

        // tokenization is independent per document; folding stays in input order
        let freqs: Vec<TermFrequency> = texts
            .par_iter()
            .map(|t| TermFrequency::from_text(t.as_ref()))
            .collect();
        let mut corpus = Corpus::new();
        for freq in &freqs {
            corpus.add_doc(freq);
        }
        debug!(documents = corpus.doc_num(), distinct_terms = corpus.term_num(), "corpus counted");

        let terms = corpus.select_terms(params.min_document_frequency as u64, params.max_features);
        if terms.is_empty() {
            return Err(Error::config(format!(
                "no term occurs in at least {} documents; vocabulary would be empty",
                params.min_document_frequency
            )));
        }

        let vocabulary = Vocabulary::from_terms(terms);
        let doc_counts: Vec<u64> = vocabulary.terms().map(|t| corpus.stats(t).doc_count).collect();
        let idf_vec = doc_counts.iter().map(|&df| E::idf(corpus.doc_num(), df)).collect();
        let vectorizer = TfIdfVectorizer {
            vocabulary,
            idf: IdfVector {
                idf_vec,
                doc_counts,
                doc_num: corpus.doc_num(),
            },
            _marker: PhantomData,
        };

        let rows = freqs.par_iter().map(|f| vectorizer.vectorize(f)).collect();
        let matrix = SparseMatrix::from_rows(vectorizer.vocab_size(), rows);
        info!(
            documents = matrix.n_rows(),
            vocab_size = matrix.n_cols(),
            nnz = matrix.nnz(),
            "tf-idf fitted"
        );
        Ok((vectorizer, matrix))
    }

    /// Map texts onto the fitted columns.
    pub fn transform<S>(&self, texts: &[S]) -> SparseMatrix
    where
        S: AsRef<str> + Sync,
    {
        let rows = texts.par_iter().map(|t| self.transform_one(t.as_ref())).collect();
        SparseMatrix::from_rows(self.vocab_size(), rows)
    }

    /// Single-text [`transform`](Self::transform).
    pub fn transform_one(&self, text: &str) -> SparseVec {
        self.vectorize(&TermFrequency::from_text(text))
    }

    fn vectorize(&self, freq: &TermFrequency) -> SparseVec {
        let term_sum = freq.term_sum();
        let pairs = freq.iter().filter_map(|(term, count)| {
            self.vocabulary
                .index_of(term)
                .map(|idx| (idx, E::tf(count, term_sum) * self.idf.idf_vec[idx]))
        });
        let mut row = SparseVec::from_pairs(self.vocab_size(), pairs);
        row.normalize_l2();
        row
    }

    #[inline]
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    #[inline]
    pub fn idf(&self) -> &IdfVector {
        &self.idf
    }

    #[inline]
    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Structural check used after loading from disk.
    pub fn is_consistent(&self) -> bool {
        let n = self.vocabulary.len();
        n > 0 && self.idf.idf_vec.len() == n && self.idf.doc_counts.len() == n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: VectorizerParams = VectorizerParams {
        max_features: 100,
        min_document_frequency: 1,
    };

    #[test]
    fn fit_builds_sorted_vocabulary_and_unit_rows() {
        let texts = ["noise residential", "noise street sidewalk", "illegal parking blocked driveway"];
        let (vectorizer, matrix): (TfIdfVectorizer, _) = TfIdfVectorizer::fit(&texts, PARAMS).unwrap();

        let terms: Vec<&str> = vectorizer.vocabulary().terms().collect();
        assert_eq!(
            terms,
            vec!["blocked", "driveway", "illegal", "noise", "parking", "residential", "sidewalk", "street"]
        );
        assert_eq!(matrix.shape(), (3, 8));
        for row in matrix.rows() {
            assert!((row.norm() - 1.0).abs() < 1e-12);
        }
        // "noise" is shared, so it weighs less than "residential" in row 0
        let noise = vectorizer.vocabulary().index_of("noise").unwrap();
        let residential = vectorizer.vocabulary().index_of("residential").unwrap();
        assert!(matrix.row(0).get(noise) < matrix.row(0).get(residential));
    }

    #[test]
    fn transform_matches_fit_rows_and_drops_unknown_terms() {
        let texts = ["noise residential", "noise street"];
        let (vectorizer, matrix): (TfIdfVectorizer, _) = TfIdfVectorizer::fit(&texts, PARAMS).unwrap();

        assert_eq!(&vectorizer.transform_one("noise residential"), matrix.row(0));
        assert_eq!(
            vectorizer.transform_one("noise residential helicopter"),
            vectorizer.transform_one("noise residential")
        );
        assert!(vectorizer.transform_one("helicopter").is_zero());
        assert!(vectorizer.transform_one("").is_zero());
    }

    #[test]
    fn idf_is_frozen_at_fit() {
        let texts = ["noise", "noise street"];
        let (vectorizer, _): (TfIdfVectorizer, _) = TfIdfVectorizer::fit(&texts, PARAMS).unwrap();
        let before = vectorizer.idf().clone();
        let _ = vectorizer.transform(&["street street street", "noise"]);
        assert_eq!(vectorizer.idf(), &before);
        assert_eq!(before.doc_num, 2);
    }

    #[test]
    fn empty_corpus_is_a_configuration_error() {
        let texts: [&str; 0] = [];
        let err = TfIdfVectorizer::<DefaultTfIdfEngine>::fit(&texts, PARAMS).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn empty_vocabulary_is_a_configuration_error() {
        let texts = ["alpha", "beta"];
        let params = VectorizerParams { min_document_frequency: 2, ..PARAMS };
        let err = TfIdfVectorizer::<DefaultTfIdfEngine>::fit(&texts, params).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn serde_round_trip_keeps_transform() {
        let texts = ["noise residential", "heat hot water"];
        let (vectorizer, _): (TfIdfVectorizer, _) = TfIdfVectorizer::fit(&texts, PARAMS).unwrap();
        let bytes = serde_cbor::to_vec(&vectorizer).unwrap();
        let back: TfIdfVectorizer = serde_cbor::from_slice(&bytes).unwrap();
        assert_eq!(back.transform_one("hot noise"), vectorizer.transform_one("hot noise"));
    }

    /// Binary tf, plain idf.
    struct PresenceEngine;

    impl TfIdfEngine for PresenceEngine {
        fn idf(doc_num: u64, doc_count: u64) -> f64 {
            (doc_num as f64 / doc_count as f64).ln() + 1.0
        }

        fn tf(_count: u32, _term_sum: u64) -> f64 {
            1.0
        }
    }

    #[test]
    fn custom_engine_runs_the_parallel_paths() {
        let texts = ["noise noise noise residential", "noise street"];
        let (vectorizer, matrix) = TfIdfVectorizer::<PresenceEngine>::fit(&texts, PARAMS).unwrap();
        assert_eq!(vectorizer.transform(&texts), matrix);
        // repeated terms do not count twice
        assert_eq!(
            vectorizer.transform_one("noise residential"),
            vectorizer.transform_one("noise noise noise residential")
        );
    }
}
