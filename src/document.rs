use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::{Error, Result},
    utils::normalizer::normalize,
};

/// Record as handed over by the ingestion side.
///
/// `text` may be absent in raw input; such records never reach the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Immutable incident record.
///
/// `normalized_text` is derived once at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: String,
    raw_text: String,
    normalized_text: String,
    metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(id: impl Into<String>, raw_text: impl Into<String>, metadata: BTreeMap<String, String>) -> Self {
        let raw_text = raw_text.into();
        let normalized_text = normalize(&raw_text);
        Self {
            id: id.into(),
            raw_text,
            normalized_text,
            metadata,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    #[inline]
    pub fn normalized_text(&self) -> &str {
        &self.normalized_text
    }

    #[inline]
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Metadata value, treating blank strings as absent.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Turn upstream records into documents.
///
/// Records without text are skipped with a warning. Duplicate ids are a
/// configuration error, since ids must stay unique for the whole run.
pub fn documents_from_records<I>(records: I) -> Result<Vec<Document>>
where
    I: IntoIterator<Item = DocumentRecord>,
{
    let mut seen = HashSet::new();
    let mut documents = Vec::new();
    let mut skipped = 0usize;
    for record in records {
        let Some(text) = record.text else {
            skipped += 1;
            continue;
        };
        if !seen.insert(record.id.clone()) {
            return Err(Error::config(format!("duplicate document id `{}`", record.id)));
        }
        documents.push(Document::new(record.id, text, record.metadata));
    }
    if skipped > 0 {
        warn!(skipped, "records without text were excluded");
    }
    Ok(documents)
}
