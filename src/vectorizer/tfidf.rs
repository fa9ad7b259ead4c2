/// TF-IDF weighting strategy.
///
/// Plugged into [`TfIdfVectorizer`](super::TfIdfVectorizer) as a type
/// parameter. Both functions must be pure: the vectorizer calls them at fit
/// time and again for every transform, from rayon workers.
pub trait TfIdfEngine: Send + Sync {
    /// IDF of a term that appears in `doc_count` of `doc_num` documents.
    fn idf(doc_num: u64, doc_count: u64) -> f64;
    /// Term-frequency weight of a term seen `count` times in a document of
    /// `term_sum` terms.
    fn tf(count: u32, term_sum: u64) -> f64;
}

/// Default engine: raw counts with smoothed log IDF.
///
/// `idf = ln((1 + n) / (1 + df)) + 1`, `tf = count`. Rows are L2-normalized
/// afterwards by the vectorizer, so the document length cancels out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultTfIdfEngine;

impl TfIdfEngine for DefaultTfIdfEngine {
    #[inline]
    fn idf(doc_num: u64, doc_count: u64) -> f64 {
        ((1.0 + doc_num as f64) / (1.0 + doc_count as f64)).ln() + 1.0
    }

    #[inline]
    fn tf(count: u32, _term_sum: u64) -> f64 {
        count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idf_is_one_for_terms_in_every_document() {
        assert!((DefaultTfIdfEngine::idf(10, 10) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn idf_grows_as_terms_get_rarer() {
        let common = DefaultTfIdfEngine::idf(100, 50);
        let rare = DefaultTfIdfEngine::idf(100, 1);
        assert!(rare > common);
        assert!((rare - ((101.0f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
    }
}
