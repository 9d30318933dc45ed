use crate::docs::DocInfo;
use crate::postings::{PostingsEntry, PostingsList};
use crate::{DocId, Offset};
use std::collections::HashMap;

/// Read-side contract shared by the in-memory and the persistent index.
/// A missing term is `None`, distinct from an empty list.
pub trait Index {
    fn get_postings(&self, term: &str) -> Option<PostingsList>;
    fn docs(&self) -> &DocInfo;
}

/// The build-time accumulator: a hash map from term to postings list,
/// populated incrementally as tokens stream in. Insert-only; the caller scans
/// documents in order and emits all tokens of a document contiguously, so the
/// entry for the current document is always the last one in a term's list.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    terms: HashMap<String, PostingsList>,
    pub docs: DocInfo,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, term: &str, doc_id: DocId, offset: Offset) {
        match self.terms.get_mut(term) {
            Some(list) => match list.entries.last_mut() {
                Some(last) if last.doc_id == doc_id => last.add_offset(offset),
                _ => list.push(PostingsEntry::with_offsets(doc_id, vec![offset])),
            },
            None => {
                let entry = PostingsEntry::with_offsets(doc_id, vec![offset]);
                let list: PostingsList = std::iter::once(entry).collect();
                self.terms.insert(term.to_string(), list);
            }
        }
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Iteration order is unspecified.
    pub fn terms(&self) -> impl Iterator<Item = (&str, &PostingsList)> {
        self.terms.iter().map(|(t, l)| (t.as_str(), l))
    }
}

impl Index for MemoryIndex {
    fn get_postings(&self, term: &str) -> Option<PostingsList> {
        self.terms.get(term).cloned()
    }

    fn docs(&self) -> &DocInfo {
        &self.docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_document_extends_last_entry() {
        let mut index = MemoryIndex::new();
        index.insert("cat", 0, 1);
        index.insert("cat", 0, 4);
        index.insert("cat", 2, 0);

        let list = index.get_postings("cat").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).doc_id, 0);
        assert_eq!(list.get(0).offsets, vec![1, 4]);
        assert_eq!(list.get(1).doc_id, 2);
        assert_eq!(list.get(1).offsets, vec![0]);
    }

    #[test]
    fn doc_ids_stay_ascending() {
        let mut index = MemoryIndex::new();
        for doc_id in [0u32, 1, 3, 7] {
            index.insert("term", doc_id, 0);
        }
        let list = index.get_postings("term").unwrap();
        let docs: Vec<_> = list.iter().map(|e| e.doc_id).collect();
        assert_eq!(docs, vec![0, 1, 3, 7]);
    }

    #[test]
    fn missing_term_is_none() {
        let index = MemoryIndex::new();
        assert!(index.get_postings("absent").is_none());
    }
}
