use crate::{DocId, Offset};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::cmp::Ordering;

/// One document's occurrence record for a term: the document id, the token
/// positions at which the term occurs (strictly increasing), and a transient
/// relevance score used only during ranked retrieval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostingsEntry {
    pub doc_id: DocId,
    pub offsets: Vec<Offset>,
    #[serde(skip_serializing_if = "score_is_zero")]
    pub score: f64,
}

fn score_is_zero(score: &f64) -> bool {
    *score == 0.0
}

impl PostingsEntry {
    pub fn new(doc_id: DocId) -> Self {
        Self { doc_id, offsets: Vec::new(), score: 0.0 }
    }

    pub fn with_offsets(doc_id: DocId, offsets: Vec<Offset>) -> Self {
        Self { doc_id, offsets, score: 0.0 }
    }

    pub fn add_offset(&mut self, offset: Offset) {
        self.offsets.push(offset);
    }

    /// Text form: `Document ID: <docID>, Offsets: [<o1>, <o2>, ...]`
    pub fn encode(&self) -> String {
        let offsets = self
            .offsets
            .iter()
            .map(|o| o.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("Document ID: {}, Offsets: [{}]", self.doc_id, offsets)
    }

    /// Parses the exact literal structure produced by [`encode`](Self::encode);
    /// anything else is rejected.
    pub fn decode(line: &str) -> Result<Self> {
        let rest = line
            .strip_prefix("Document ID: ")
            .context("postings entry missing document id prefix")?;
        let (id_part, offsets_part) = rest
            .split_once(", Offsets: ")
            .context("postings entry missing offsets separator")?;
        let doc_id = id_part
            .parse::<DocId>()
            .with_context(|| format!("invalid document id {id_part:?}"))?;
        let inner = offsets_part
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .context("postings offsets not bracketed")?;
        let mut offsets = Vec::new();
        for tok in inner.split(", ") {
            let offset = tok
                .parse::<Offset>()
                .with_context(|| format!("invalid offset {tok:?}"))?;
            offsets.push(offset);
        }
        Ok(Self { doc_id, offsets, score: 0.0 })
    }
}

/// An ordered sequence of [`PostingsEntry`], ascending by document id when
/// produced by an index, descending by score when produced by ranked
/// retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PostingsList {
    pub entries: Vec<PostingsEntry>,
}

impl PostingsList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, i: usize) -> &PostingsEntry {
        &self.entries[i]
    }

    pub fn push(&mut self, entry: PostingsEntry) {
        self.entries.push(entry);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PostingsEntry> {
        self.entries.iter()
    }

    /// Re-orders the list by descending score. Ties keep their current order
    /// (the sort is stable).
    pub fn sort_by_score(&mut self) {
        self.entries
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    }

    /// The serialized blob: one encoded entry per line, newline-terminated.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.encode());
            out.push('\n');
        }
        out
    }

    pub fn decode(blob: &str) -> Result<Self> {
        let mut list = PostingsList::new();
        for line in blob.lines() {
            list.push(PostingsEntry::decode(line)?);
        }
        if list.is_empty() {
            bail!("postings blob contains no entries");
        }
        Ok(list)
    }
}

impl FromIterator<PostingsEntry> for PostingsList {
    fn from_iter<T: IntoIterator<Item = PostingsEntry>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}
