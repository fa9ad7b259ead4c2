use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::vectorizer::token::TermFrequency;

/// Corpus-wide statistics of one term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TermStats {
    /// Number of documents containing the term.
    pub doc_count: u64,
    /// Occurrences across the whole corpus.
    pub total_count: u64,
}

/// Document count and per-term statistics of the fit corpus.
///
/// Does not keep document text or ids. Terms are kept in first-seen order
/// (document order, then position inside the document), which is the
/// tie-break order for vocabulary selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    doc_num: u64,
    #[serde(with = "indexmap::map::serde_seq")]
    term_stats: IndexMap<Box<str>, TermStats>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one document's term counts.
    pub fn add_doc(&mut self, freq: &TermFrequency) {
        self.doc_num += 1;
        for (term, count) in freq.iter() {
            if let Some(stats) = self.term_stats.get_mut(term) {
                stats.doc_count += 1;
                stats.total_count += count as u64;
            } else {
                self.term_stats.insert(
                    term.into(),
                    TermStats {
                        doc_count: 1,
                        total_count: count as u64,
                    },
                );
            }
        }
    }

    /// Number of documents in the corpus.
    #[inline]
    pub fn doc_num(&self) -> u64 {
        self.doc_num
    }

    /// Number of distinct terms seen.
    #[inline]
    pub fn term_num(&self) -> usize {
        self.term_stats.len()
    }

    /// Statistics of `term`, zeros if unseen.
    #[inline]
    pub fn stats(&self, term: &str) -> TermStats {
        self.term_stats.get(term).copied().unwrap_or_default()
    }

    /// (first-seen rank, term, stats), in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, TermStats)> + '_ {
        self.term_stats
            .iter()
            .enumerate()
            .map(|(rank, (term, stats))| (rank, term.as_ref(), *stats))
    }

    /// Pick the vocabulary.
    ///
    /// Terms below `min_doc_count` are dropped. If more than `max_terms`
    /// remain, the ones with the highest corpus-wide count win, ties going to
    /// the term seen first. The result is returned in lexicographic order.
    pub fn select_terms(&self, min_doc_count: u64, max_terms: usize) -> Vec<Box<str>> {
        let mut candidates: Vec<(usize, &str, u64)> = self
            .iter()
            .filter(|(_, _, stats)| stats.doc_count >= min_doc_count)
            .map(|(rank, term, stats)| (rank, term, stats.total_count))
            .collect();

        if candidates.len() > max_terms {
            candidates.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
            candidates.truncate(max_terms);
        }

        let mut terms: Vec<Box<str>> = candidates.into_iter().map(|(_, t, _)| t.into()).collect();
        terms.sort_unstable();
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus_of(texts: &[&str]) -> Corpus {
        let mut corpus = Corpus::new();
        for text in texts {
            corpus.add_doc(&TermFrequency::from_text(text));
        }
        corpus
    }

    #[test]
    fn counts_documents_and_occurrences() {
        let corpus = corpus_of(&["noise noise street", "noise park"]);
        assert_eq!(corpus.doc_num(), 2);
        assert_eq!(corpus.stats("noise"), TermStats { doc_count: 2, total_count: 3 });
        assert_eq!(corpus.stats("park"), TermStats { doc_count: 1, total_count: 1 });
        assert_eq!(corpus.stats("absent"), TermStats::default());
    }

    #[test]
    fn min_doc_count_filters_rare_terms() {
        let corpus = corpus_of(&["noise street", "noise park", "heat"]);
        assert_eq!(corpus.select_terms(2, 100), vec![Box::<str>::from("noise")]);
        assert_eq!(corpus.select_terms(1, 100).len(), 4);
    }

    #[test]
    fn cap_prefers_frequent_then_first_seen() {
        // zebra and apple tie on count; zebra was seen first
        let corpus = corpus_of(&["zebra heat heat", "apple heat"]);
        let terms = corpus.select_terms(1, 2);
        assert_eq!(terms, vec![Box::<str>::from("heat"), Box::<str>::from("zebra")]);
    }
}
