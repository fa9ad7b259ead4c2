//! Query path: free text in, ranked documents out.
//!
//! A query runs through the same normalizer, vectorizer and projector that
//! built the snapshot, then is compared by cosine against every stored
//! latent row. Nothing here mutates the snapshot.

pub mod location;
mod scoring;

pub use location::{summarize_locations, CategoryCount, LocationDimension, LocationSummary};
pub use scoring::{HitEntry, Hits};

use tracing::debug;

use crate::{
    error::{Error, Result},
    model::Snapshot,
    utils::normalizer::normalize,
};

/// Rank the snapshot's documents against `text`.
///
/// Returns at most `top_k` hits, best first, ties in document order. A query
/// with no known terms is not an error: every document scores 0.
///
/// # Errors
/// [`Error::Configuration`] when `top_k` is 0.
pub fn query(snapshot: &Snapshot, text: &str, top_k: usize) -> Result<Hits> {
    if top_k == 0 {
        return Err(Error::config("top_k must be positive"));
    }
    let model = snapshot.model();
    let lexical = model.vectorizer().transform_one(&normalize(text));
    let projected = model.projector().transform_row(&lexical);
    let ranked = scoring::rank_by_cosine(snapshot.latent(), projected.view(), top_k);
    debug!(
        known_terms = lexical.nnz(),
        returned = ranked.len(),
        "query scored"
    );

    let documents = snapshot.documents();
    Ok(Hits::new(
        ranked
            .into_iter()
            .map(|(i, score)| HitEntry::from_document(i, score, &documents[i]))
            .collect(),
    ))
}
