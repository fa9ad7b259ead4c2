use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    cluster::ClusterAssignment,
    document::Document,
    utils::math::vector::SparseMatrix,
    vectorizer::Vocabulary,
};

/// A term and its mean tf-idf weight over a cluster's members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermScore {
    pub term: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterExample {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster: usize,
    pub size: usize,
    /// Percentage of all documents.
    pub share: f64,
    /// First members in document order.
    pub examples: Vec<ClusterExample>,
    pub top_terms: Vec<TermScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    pub document_count: usize,
    pub clusters: Vec<ClusterSummary>,
}

/// Describe every cluster id in `0..n_clusters`.
///
/// Terms rank by mean weight over members (descending, ties by column
/// ascending). Terms with a zero mean are left out, so a cluster may list
/// fewer than `top_terms` terms, and an empty cluster lists none.
pub fn summarize_clusters(
    assignment: &ClusterAssignment,
    documents: &[Document],
    lexical: &SparseMatrix,
    vocabulary: &Vocabulary,
    top_terms: usize,
    examples_per_cluster: usize,
) -> ClusterReport {
    let total = documents.len();
    let clusters = (0..assignment.n_clusters())
        .into_par_iter()
        .map(|cluster| {
            let members = assignment.members(cluster);
            let size = members.len();

            let examples = members
                .iter()
                .take(examples_per_cluster)
                .map(|&i| ClusterExample {
                    id: documents[i].id().to_string(),
                    text: documents[i].raw_text().to_string(),
                })
                .collect();

            let mut sums = vec![0.0; lexical.n_cols()];
            for &i in &members {
                for (col, v) in lexical.row(i).iter() {
                    sums[col] += v;
                }
            }
            let mut ranked: Vec<(usize, f64)> = sums
                .into_iter()
                .enumerate()
                .filter(|(_, s)| *s > 0.0)
                .map(|(col, s)| (col, s / size as f64))
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            ranked.truncate(top_terms);
            let top_terms = ranked
                .into_iter()
                .filter_map(|(col, score)| {
                    vocabulary.term(col).map(|term| TermScore {
                        term: term.to_string(),
                        score,
                    })
                })
                .collect();

            ClusterSummary {
                cluster,
                size,
                share: if total == 0 { 0.0 } else { 100.0 * size as f64 / total as f64 },
                examples,
                top_terms,
            }
        })
        .collect();

    ClusterReport {
        document_count: total,
        clusters,
    }
}

impl fmt::Display for ClusterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cluster distribution ({} documents):", self.document_count)?;
        for c in &self.clusters {
            writeln!(f, "  cluster {}: {} ({:.1}%)", c.cluster, c.size, c.share)?;
        }
        for c in &self.clusters {
            writeln!(f)?;
            writeln!(f, "CLUSTER {} ({} documents)", c.cluster, c.size)?;
            writeln!(f, "  examples:")?;
            for e in &c.examples {
                writeln!(f, "    - [{}] {}", e.id, e.text)?;
            }
            writeln!(f, "  top terms:")?;
            for t in &c.top_terms {
                writeln!(f, "    {}: {:.4}", t.term, t.score)?;
            }
        }
        Ok(())
    }
}
