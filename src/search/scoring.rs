use std::{
    collections::BTreeMap,
    fmt::{self, Debug, Display},
};

use ndarray::ArrayView1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    document::Document,
    utils::math::dense::{cosine, DenseMatrix},
};

/// One ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitEntry {
    /// Row of the document in the snapshot.
    pub index: usize,
    pub document_id: String,
    pub score: f64,
    /// Raw text of the document.
    pub text: String,
    /// Metadata entries that are present and non-blank.
    pub fields: BTreeMap<String, String>,
}

impl HitEntry {
    pub(crate) fn from_document(index: usize, score: f64, document: &Document) -> Self {
        let fields = document
            .metadata()
            .keys()
            .filter_map(|k| document.field(k).map(|v| (k.clone(), v.to_string())))
            .collect();
        HitEntry {
            index,
            document_id: document.id().to_string(),
            score,
            text: document.raw_text().to_string(),
            fields,
        }
    }

    /// Display field, `None` when the document has no usable value.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Ranked search results, best first.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Hits {
    pub list: Vec<HitEntry>,
}

impl Hits {
    pub fn new(list: Vec<HitEntry>) -> Self {
        Hits { list }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HitEntry> {
        self.list.iter()
    }
}

impl<'a> IntoIterator for &'a Hits {
    type Item = &'a HitEntry;
    type IntoIter = std::slice::Iter<'a, HitEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.iter()
    }
}

impl Debug for Hits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Hits [")?;
            for hit in &self.list {
                writeln!(f, "    {:?} (#{}): {:.6}", hit.document_id, hit.index, hit.score)?;
            }
            write!(f, "]")
        } else {
            f.debug_list()
                .entries(self.list.iter().map(|h| (&h.document_id, h.score)))
                .finish()
        }
    }
}

impl Display for Hits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (rank, hit) in self.list.iter().enumerate() {
            writeln!(f, "{:>3}. [{:.4}] {}  {}", rank + 1, hit.score, hit.document_id, hit.text)?;
            for (key, value) in &hit.fields {
                writeln!(f, "       {key}: {value}")?;
            }
        }
        Ok(())
    }
}

/// Cosine of `query` against every row, best `top_k` first.
///
/// Ties keep the lower row index first. A zero query scores 0 everywhere.
pub(crate) fn rank_by_cosine(latent: &DenseMatrix, query: ArrayView1<f64>, top_k: usize) -> Vec<(usize, f64)> {
    let mut scored: Vec<(usize, f64)> = (0..latent.nrows())
        .into_par_iter()
        .map(|i| (i, cosine(latent.row(i), query)))
        .collect();
    scored.retain(|(_, s)| !s.is_nan());
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    scored.truncate(top_k);
    scored
}
