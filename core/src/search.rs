use crate::index::Index;
use crate::kgram::KGramIndex;
use crate::postings::{PostingsEntry, PostingsList};
use crate::DocId;
use std::collections::{HashMap, HashSet};

/// One query term with its weight. Weights are 1 for plain queries and only
/// diverge under relevance feedback, which happens upstream.
#[derive(Debug, Clone)]
pub struct QueryTerm {
    pub term: String,
    pub weight: f64,
}

/// A query as a list of weighted terms.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub terms: Vec<QueryTerm>,
}

impl Query {
    /// Splits a query string on whitespace; every term gets weight 1.
    pub fn parse(query: &str) -> Self {
        let terms = query
            .split_whitespace()
            .map(|t| QueryTerm { term: t.to_string(), weight: 1.0 })
            .collect();
        Self { terms }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Intersection,
    Phrase,
    Ranked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingType {
    TfIdf,
    PageRank,
    Combination,
}

/// Evaluates queries against an index and a k-gram index. Holds only
/// references; stateless across calls.
pub struct Searcher<'a, I: Index> {
    index: &'a I,
    kgrams: &'a KGramIndex,
}

impl<'a, I: Index> Searcher<'a, I> {
    pub fn new(index: &'a I, kgrams: &'a KGramIndex) -> Self {
        Self { index, kgrams }
    }

    /// Evaluates `query` under the given semantics. `None` means no match:
    /// a term absent from the index, or an intersection that ran empty.
    /// The ranking type is only consulted for ranked queries.
    pub fn search(
        &self,
        query: &Query,
        query_type: QueryType,
        ranking: RankingType,
    ) -> Option<PostingsList> {
        if query.is_empty() {
            return None;
        }
        match query_type {
            QueryType::Intersection if query.len() == 1 => {
                self.index.get_postings(&query.terms[0].term)
            }
            QueryType::Intersection => self.intersection_query(query),
            QueryType::Phrase => self.phrase_query(query),
            QueryType::Ranked => {
                let result = match ranking {
                    RankingType::TfIdf => self.ranked_retrieval(query, 1.0, 0.0),
                    RankingType::PageRank => self.pagerank_retrieval(query),
                    RankingType::Combination => self.ranked_retrieval(query, 1.0, 1.0),
                };
                if result.is_empty() {
                    None
                } else {
                    Some(result)
                }
            }
        }
    }

    /// Multi-term conjunction: fetches every term's postings (any miss is a
    /// miss for the whole query), orders the lists smallest-first to bound
    /// merge cost, then folds pairwise docID merges, bailing out as soon as
    /// the running intersection is empty.
    fn intersection_query(&self, query: &Query) -> Option<PostingsList> {
        let mut lists = Vec::with_capacity(query.len());
        for qt in &query.terms {
            lists.push(self.index.get_postings(&qt.term)?);
        }
        lists.sort_by_key(|l| l.len());

        let mut iter = lists.into_iter();
        let mut acc = iter.next()?;
        for next in iter {
            acc = intersect(&acc, &next);
            if acc.is_empty() {
                return None;
            }
        }
        Some(acc)
    }

    fn phrase_query(&self, query: &Query) -> Option<PostingsList> {
        let mut acc = self.index.get_postings(&query.terms[0].term)?;
        for qt in &query.terms[1..] {
            let next = self.index.get_postings(&qt.term)?;
            acc = positional_intersect(&acc, &next);
            if acc.is_empty() {
                return None;
            }
        }
        Some(acc)
    }

    /// TF-IDF accumulation with an optional authority component. Per query
    /// term: `idf = ln(N / df)`, each posting contributes
    /// `idf * idf_w * weight * tf / doc_length` to its document's running
    /// score; `rank * rank_w` is injected once per newly-seen document.
    /// Terms absent from the index contribute nothing.
    pub fn ranked_retrieval(&self, query: &Query, idf_w: f64, rank_w: f64) -> PostingsList {
        let docs = self.index.docs();
        let total_docs = docs.total_docs() as f64;
        let mut slots: HashMap<DocId, usize> = HashMap::new();
        let mut answer = PostingsList::new();

        for qt in &query.terms {
            let Some(list) = self.index.get_postings(&qt.term) else {
                continue;
            };
            let idf = (total_docs / list.len() as f64).ln();
            for entry in list.iter() {
                let doc_length =
                    docs.lengths.get(&entry.doc_id).copied().unwrap_or(1).max(1) as f64;
                let contrib =
                    idf * idf_w * qt.weight * entry.offsets.len() as f64 / doc_length;
                match slots.get(&entry.doc_id) {
                    Some(&at) => answer.entries[at].score += contrib,
                    None => {
                        let mut scored = entry.clone();
                        scored.score = contrib + docs.rank(entry.doc_id) * rank_w;
                        slots.insert(entry.doc_id, answer.len());
                        answer.push(scored);
                    }
                }
            }
        }
        answer.sort_by_score();
        answer
    }

    /// Pure authority ranking: a document's score is its precomputed rank,
    /// independent of which query term matched it, so each document is taken
    /// once.
    pub fn pagerank_retrieval(&self, query: &Query) -> PostingsList {
        let docs = self.index.docs();
        let mut seen: HashSet<DocId> = HashSet::new();
        let mut answer = PostingsList::new();

        for qt in &query.terms {
            let Some(list) = self.index.get_postings(&qt.term) else {
                continue;
            };
            for entry in list.iter() {
                if seen.insert(entry.doc_id) {
                    let mut scored = entry.clone();
                    scored.score = docs.rank(entry.doc_id);
                    answer.push(scored);
                }
            }
        }
        answer.sort_by_score();
        answer
    }

    /// Resolves a conjunctive set of k-grams to the terms containing all of
    /// them, ascending by term id.
    pub fn kgram_terms(&self, kgrams: &[&str]) -> Vec<&str> {
        self.kgrams
            .get_intersection(kgrams)
            .into_iter()
            .filter_map(|id| self.kgrams.term_by_id(id))
            .collect()
    }
}

/// Two-pointer merge over ascending docIDs. Offset payloads are discarded:
/// result entries carry only the shared document id.
pub fn intersect(a: &PostingsList, b: &PostingsList) -> PostingsList {
    let mut out = PostingsList::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (da, db) = (a.get(i).doc_id, b.get(j).doc_id);
        match da.cmp(&db) {
            std::cmp::Ordering::Equal => {
                out.push(PostingsEntry::new(da));
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    out
}

/// Like [`intersect`], but inside a shared document the offset cursors must
/// witness strict adjacency: an offset of `b` exactly one past an offset of
/// `a`. Matched `b` offsets become the output entry's offsets, so phrase
/// folding can chain left to right.
pub fn positional_intersect(a: &PostingsList, b: &PostingsList) -> PostingsList {
    let mut out = PostingsList::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (ea, eb) = (a.get(i), b.get(j));
        match ea.doc_id.cmp(&eb.doc_id) {
            std::cmp::Ordering::Equal => {
                let mut matched = Vec::new();
                let (mut pi, mut pj) = (0, 0);
                while pi < ea.offsets.len() && pj < eb.offsets.len() {
                    let (oa, ob) = (ea.offsets[pi], eb.offsets[pj]);
                    if oa >= ob {
                        pj += 1;
                    } else if ob - oa == 1 {
                        matched.push(ob);
                        pi += 1;
                        pj += 1;
                    } else {
                        pi += 1;
                    }
                }
                if !matched.is_empty() {
                    out.push(PostingsEntry::with_offsets(ea.doc_id, matched));
                }
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;

    fn index_documents(docs: &[&str]) -> MemoryIndex {
        let mut index = MemoryIndex::new();
        for (doc_id, text) in docs.iter().enumerate() {
            let tokens: Vec<&str> = text.split_whitespace().collect();
            for (pos, token) in tokens.iter().enumerate() {
                index.insert(token, doc_id as DocId, pos as u32);
            }
            index.docs.add(doc_id as DocId, format!("doc{doc_id}"), tokens.len() as u32);
        }
        index
    }

    fn doc_ids(list: &PostingsList) -> Vec<DocId> {
        list.iter().map(|e| e.doc_id).collect()
    }

    #[test]
    fn intersection_finds_shared_documents() {
        let index = index_documents(&["the cat sat", "the dog sat", "a bird"]);
        let kgrams = KGramIndex::new(3);
        let searcher = Searcher::new(&index, &kgrams);

        let result = searcher
            .search(&Query::parse("the sat"), QueryType::Intersection, RankingType::TfIdf)
            .unwrap();
        assert_eq!(doc_ids(&result), vec![0, 1]);
    }

    #[test]
    fn intersection_is_commutative_and_associative() {
        let index = index_documents(&[
            "a b c",
            "a b",
            "a c",
            "b c",
            "a b c d",
        ]);
        let a = index.get_postings("a").unwrap();
        let b = index.get_postings("b").unwrap();
        let c = index.get_postings("c").unwrap();

        assert_eq!(doc_ids(&intersect(&a, &b)), doc_ids(&intersect(&b, &a)));

        let left = intersect(&intersect(&a, &b), &c);
        let right = intersect(&a, &intersect(&b, &c));
        assert_eq!(doc_ids(&left), doc_ids(&right));
        assert_eq!(doc_ids(&left), vec![0, 4]);
    }

    #[test]
    fn missing_term_short_circuits_intersection() {
        let index = index_documents(&["the cat sat"]);
        let kgrams = KGramIndex::new(3);
        let searcher = Searcher::new(&index, &kgrams);

        let result =
            searcher.search(&Query::parse("cat unicorn"), QueryType::Intersection, RankingType::TfIdf);
        assert!(result.is_none());
    }

    #[test]
    fn phrase_requires_strict_adjacency() {
        let index = index_documents(&["the cat sat on the mat", "sat the cat"]);
        let kgrams = KGramIndex::new(3);
        let searcher = Searcher::new(&index, &kgrams);

        // "cat sat" is adjacent only in doc 0; doc 1 has the words reversed.
        let result = searcher
            .search(&Query::parse("cat sat"), QueryType::Phrase, RankingType::TfIdf)
            .unwrap();
        assert_eq!(doc_ids(&result), vec![0]);
        assert_eq!(result.get(0).offsets, vec![2]);

        // "cat on" has a one-token gap, so no match anywhere.
        let gap = searcher.search(&Query::parse("cat on"), QueryType::Phrase, RankingType::TfIdf);
        assert!(gap.is_none());
    }

    #[test]
    fn phrase_chains_across_three_terms() {
        let index = index_documents(&["one two three", "one three two", "zero one two three"]);
        let kgrams = KGramIndex::new(3);
        let searcher = Searcher::new(&index, &kgrams);

        let result = searcher
            .search(&Query::parse("one two three"), QueryType::Phrase, RankingType::TfIdf)
            .unwrap();
        assert_eq!(doc_ids(&result), vec![0, 2]);
        assert_eq!(result.get(0).offsets, vec![2]);
        assert_eq!(result.get(1).offsets, vec![3]);
    }

    #[test]
    fn rarer_terms_score_higher() {
        // "common" is in all three documents, "rare" in one. Same tf and
        // document length, so the rare term's idf dominates.
        let index = index_documents(&["common rare x", "common y z", "common u v"]);
        let kgrams = KGramIndex::new(3);
        let searcher = Searcher::new(&index, &kgrams);

        let common = searcher
            .ranked_retrieval(&Query::parse("common"), 1.0, 0.0);
        let rare = searcher.ranked_retrieval(&Query::parse("rare"), 1.0, 0.0);
        assert!(rare.get(0).score > common.get(0).score);
        assert!(common.iter().all(|e| e.score >= 0.0));

        // A term in every document has idf = ln(1) = 0.
        assert!(common.iter().all(|e| e.score == 0.0));
    }

    #[test]
    fn ranked_accumulates_across_terms() {
        let index = index_documents(&["cat dog", "cat fish", "dog bird"]);
        let kgrams = KGramIndex::new(3);
        let searcher = Searcher::new(&index, &kgrams);

        let result = searcher
            .search(&Query::parse("cat dog"), QueryType::Ranked, RankingType::TfIdf)
            .unwrap();
        // Doc 0 matches both terms and must outrank the single-term docs.
        assert_eq!(result.get(0).doc_id, 0);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn pagerank_orders_by_rank_and_deduplicates() {
        let mut index = index_documents(&["cat dog", "cat", "dog"]);
        index.docs.ranks.insert("doc0".into(), 0.1);
        index.docs.ranks.insert("doc1".into(), 0.9);
        index.docs.ranks.insert("doc2".into(), 0.5);
        let kgrams = KGramIndex::new(3);
        let searcher = Searcher::new(&index, &kgrams);

        let result = searcher
            .search(&Query::parse("cat dog"), QueryType::Ranked, RankingType::PageRank)
            .unwrap();
        assert_eq!(doc_ids(&result), vec![1, 2, 0]);
    }

    #[test]
    fn combination_injects_rank_once() {
        let mut index = index_documents(&["cat dog", "cat fish"]);
        index.docs.ranks.insert("doc1".into(), 10.0);
        let kgrams = KGramIndex::new(3);
        let searcher = Searcher::new(&index, &kgrams);

        let combined = searcher.ranked_retrieval(&Query::parse("cat fish"), 1.0, 1.0);
        let content_only = searcher.ranked_retrieval(&Query::parse("cat fish"), 1.0, 0.0);

        let score_of = |list: &PostingsList, doc: DocId| {
            list.iter().find(|e| e.doc_id == doc).map(|e| e.score).unwrap()
        };
        let delta = score_of(&combined, 1) - score_of(&content_only, 1);
        assert!((delta - 10.0).abs() < 1e-9);
    }

    #[test]
    fn empty_query_is_no_match() {
        let index = index_documents(&["cat"]);
        let kgrams = KGramIndex::new(3);
        let searcher = Searcher::new(&index, &kgrams);
        assert!(searcher
            .search(&Query::default(), QueryType::Intersection, RankingType::TfIdf)
            .is_none());
    }

    #[test]
    fn kgram_terms_resolve_through_searcher() {
        let index = index_documents(&["the cat"]);
        let mut kgrams = KGramIndex::new(3);
        for term in ["the", "there", "other"] {
            kgrams.insert(term);
        }
        let searcher = Searcher::new(&index, &kgrams);
        assert_eq!(searcher.kgram_terms(&["^th"]), vec!["the", "there"]);
    }
}
