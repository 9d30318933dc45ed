use crate::TermId;
use std::collections::{HashMap, HashSet};

/// An in-memory index from k-character substrings to sorted term-id lists,
/// used for partial-term lookup. Terms are wrapped with `^`/`$` boundary
/// markers before their k-grams are extracted, so `^th` and `he$` both exist
/// for the term "the" with k = 3.
///
/// Term ids are assigned by a monotonic counter, so each k-gram's list stays
/// sorted by term id without any explicit sorting. Not persisted; rebuilt
/// from the committed term list when needed.
#[derive(Debug)]
pub struct KGramIndex {
    k: usize,
    term_ids: HashMap<String, TermId>,
    terms: Vec<String>,
    grams: HashMap<String, Vec<TermId>>,
}

impl KGramIndex {
    /// Panics when `k` is zero; a zero-width gram index is a configuration
    /// error, not a recoverable condition.
    pub fn new(k: usize) -> Self {
        assert!(k > 0, "k-gram width must be positive");
        Self {
            k,
            term_ids: HashMap::new(),
            terms: Vec::new(),
            grams: HashMap::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of distinct terms inserted.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Registers a term and all its k-grams. A repeated insert of the same
    /// term is a no-op; ids are never reused.
    pub fn insert(&mut self, term: &str) {
        if self.term_ids.contains_key(term) {
            return;
        }
        let id = self.terms.len() as TermId;
        self.term_ids.insert(term.to_string(), id);
        self.terms.push(term.to_string());

        let wrapped: Vec<char> = format!("^{term}$").chars().collect();
        if wrapped.len() < self.k {
            return;
        }
        let mut seen: HashSet<String> = HashSet::new();
        for window in wrapped.windows(self.k) {
            let gram: String = window.iter().collect();
            if seen.insert(gram.clone()) {
                self.grams.entry(gram).or_default().push(id);
            }
        }
    }

    /// Term ids containing the given k-gram, ascending; `None` when the
    /// k-gram occurs in no term.
    pub fn get_postings(&self, kgram: &str) -> Option<&[TermId]> {
        self.grams.get(kgram).map(|ids| ids.as_slice())
    }

    /// Sorted two-pointer merge of two ascending id lists.
    pub fn intersect(a: &[TermId], b: &[TermId]) -> Vec<TermId> {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
            }
        }
        out
    }

    /// Folds `intersect` across a conjunctive set of k-grams; any absent
    /// operand short-circuits to an empty result.
    pub fn get_intersection(&self, kgrams: &[&str]) -> Vec<TermId> {
        let mut iter = kgrams.iter();
        let mut acc = match iter.next().and_then(|kg| self.get_postings(kg)) {
            Some(ids) => ids.to_vec(),
            None => return Vec::new(),
        };
        for kg in iter {
            let ids = match self.get_postings(kg) {
                Some(ids) => ids,
                None => return Vec::new(),
            };
            acc = Self::intersect(&acc, ids);
            if acc.is_empty() {
                return acc;
            }
        }
        acc
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.term_ids.get(term).copied()
    }

    pub fn term_by_id(&self, id: TermId) -> Option<&str> {
        self.terms.get(id as usize).map(|t| t.as_str())
    }
}
