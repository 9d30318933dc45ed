pub mod docs;
pub mod index;
pub mod kgram;
pub mod persist;
pub mod postings;
pub mod search;
pub mod tokenizer;

pub use docs::DocInfo;
pub use index::{Index, MemoryIndex};
pub use kgram::KGramIndex;
pub use persist::PersistentHashedIndex;
pub use postings::{PostingsEntry, PostingsList};
pub use search::{Query, QueryType, RankingType, Searcher};

pub type DocId = u32;
pub type TermId = u32;
pub type Offset = u32;
