use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Split text into terms.
///
/// A term is a maximal run of word characters (alphanumeric or `_`) made up
/// only of `a..=z`. Runs containing anything else (digits, capitals,
/// non-ASCII letters) are skipped whole. The same rule applies at fit and at
/// transform time.
///
/// # Examples
/// ```
/// use incident_lsi::vectorizer::token::tokenize;
/// assert_eq!(tokenize("noise street x9 ok_go sidewalk"), vec!["noise", "street", "sidewalk"]);
/// ```
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut start: Option<usize> = None;
    let mut pure = true;
    for (pos, c) in text.char_indices() {
        if c.is_alphanumeric() || c == '_' {
            if start.is_none() {
                start = Some(pos);
                pure = true;
            }
            pure &= c.is_ascii_lowercase();
        } else if let Some(s) = start.take() {
            if pure {
                terms.push(&text[s..pos]);
            }
        }
    }
    if let Some(s) = start {
        if pure {
            terms.push(&text[s..]);
        }
    }
    terms
}

/// Term occurrence counts of one document.
///
/// Terms keep their first-occurrence order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TermFrequency {
    #[serde(with = "indexmap::map::serde_seq")]
    term_count: IndexMap<Box<str>, u32>,
    total_term_count: u64,
}

impl TermFrequency {
    pub fn new() -> Self {
        TermFrequency {
            term_count: IndexMap::new(),
            total_term_count: 0,
        }
    }

    /// Count the terms of `text` (see [`tokenize`]).
    pub fn from_text(text: &str) -> Self {
        let mut freq = Self::new();
        freq.add_terms(&tokenize(text));
        freq
    }

    #[inline]
    pub fn add_term(&mut self, term: &str) -> &mut Self {
        if let Some(count) = self.term_count.get_mut(term) {
            *count += 1;
        } else {
            self.term_count.insert(term.into(), 1);
        }
        self.total_term_count += 1;
        self
    }

    #[inline]
    pub fn add_terms<T>(&mut self, terms: &[T]) -> &mut Self
    where
        T: AsRef<str>,
    {
        for term in terms {
            self.add_term(term.as_ref());
        }
        self
    }

    /// Count of `term`, 0 if absent.
    #[inline]
    pub fn term_count(&self, term: &str) -> u32 {
        self.term_count.get(term).copied().unwrap_or(0)
    }

    /// (term, count) in first-occurrence order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.term_count.iter().map(|(t, c)| (t.as_ref(), *c))
    }

    /// Total number of term occurrences.
    #[inline]
    pub fn term_sum(&self) -> u64 {
        self.total_term_count
    }

    /// Number of distinct terms.
    #[inline]
    pub fn term_num(&self) -> usize {
        self.term_count.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.term_count.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_keeps_only_pure_lowercase_runs() {
        assert_eq!(tokenize("noise residential"), vec!["noise", "residential"]);
        assert_eq!(tokenize("Noise abc1 a_b x-ray"), vec!["x", "ray"]);
        assert_eq!(tokenize("café bar"), vec!["bar"]);
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn tokenizer_handles_trailing_run() {
        assert_eq!(tokenize("blocked driveway"), vec!["blocked", "driveway"]);
        assert_eq!(tokenize("driveway!"), vec!["driveway"]);
    }

    #[test]
    fn counts_preserve_first_occurrence_order() {
        let freq = TermFrequency::from_text("street noise street light");
        let order: Vec<(&str, u32)> = freq.iter().collect();
        assert_eq!(order, vec![("street", 2), ("noise", 1), ("light", 1)]);
        assert_eq!(freq.term_sum(), 4);
        assert_eq!(freq.term_num(), 3);
        assert_eq!(freq.term_count("missing"), 0);
    }
}
