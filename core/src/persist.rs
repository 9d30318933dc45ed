use crate::docs::DocInfo;
use crate::index::{Index, MemoryIndex};
use crate::postings::PostingsList;
use crate::{DocId, Offset};
use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

pub const DICTIONARY_FNAME: &str = "dictionary";
pub const DATA_FNAME: &str = "data";
pub const TERMS_FNAME: &str = "terms";
pub const DOCINFO_FNAME: &str = "docInfo";

/// Slot count of the on-disk dictionary hash table. Chosen well above the
/// expected vocabulary size so linear probing stays short.
pub const TABLESIZE: u64 = 611_953;

/// One dictionary record: start address (8, big-endian), blob size (4,
/// big-endian), checksum length prefix (2, big-endian), 64 hex characters.
const RECORD_SIZE: u64 = 78;
const CHECKSUM_LEN: usize = 64;

/// SHA-256 of the term as 64 lowercase hex characters. Disambiguates
/// dictionary slots claimed through collision probing.
pub fn compute_checksum(term: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(term.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Multiplicative string hash; reduced modulo the table size to pick the home
/// slot. Must stay identical between the write and read paths.
pub fn multiplicative_hash(term: &str) -> u64 {
    term.chars()
        .fold(0u64, |h, c| h.wrapping_mul(31).wrapping_add(c as u64))
}

#[derive(Debug, PartialEq)]
struct DictEntry {
    start: u64,
    size: u32,
    checksum: String,
}

impl DictEntry {
    fn to_bytes(&self) -> [u8; RECORD_SIZE as usize] {
        debug_assert_eq!(self.checksum.len(), CHECKSUM_LEN);
        let mut buf = [0u8; RECORD_SIZE as usize];
        buf[0..8].copy_from_slice(&self.start.to_be_bytes());
        buf[8..12].copy_from_slice(&self.size.to_be_bytes());
        buf[12..14].copy_from_slice(&(CHECKSUM_LEN as u16).to_be_bytes());
        buf[14..].copy_from_slice(self.checksum.as_bytes());
        buf
    }

    fn from_bytes(buf: &[u8; RECORD_SIZE as usize]) -> Option<Self> {
        let start = u64::from_be_bytes(buf[0..8].try_into().ok()?);
        let size = u32::from_be_bytes(buf[8..12].try_into().ok()?);
        let len = u16::from_be_bytes(buf[12..14].try_into().ok()?);
        if len as usize != CHECKSUM_LEN {
            return None;
        }
        let checksum = std::str::from_utf8(&buf[14..]).ok()?.to_string();
        Some(Self { start, size, checksum })
    }
}

fn is_empty_record(buf: &[u8; RECORD_SIZE as usize]) -> bool {
    buf.iter().all(|b| *b == 0)
}

/// An inverted index as a hash table on disk: a fixed-slot dictionary file
/// mapping term checksums to data-file locations, and an append-only data
/// file holding the serialized postings lists.
///
/// Tokens are first inserted into an in-memory accumulator; `write_index`
/// commits everything to disk. A later process opens the same directory and
/// serves `get_postings` lookups directly from the files. Single writer only;
/// the files are safe for concurrent readers once committed.
pub struct PersistentHashedIndex {
    dir: PathBuf,
    dictionary_file: File,
    data_file: File,
    /// First free byte in the data file.
    free: u64,
    table_size: u64,
    cache: MemoryIndex,
}

impl PersistentHashedIndex {
    /// Opens (creating if needed) the index files under `dir` with the
    /// default table size, and reads `docInfo` if present.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::with_table_size(dir, TABLESIZE)
    }

    /// Same as [`open`](Self::open) with an explicit dictionary slot count.
    /// The slot count must match between the process that wrote the index and
    /// any process reading it.
    pub fn with_table_size<P: AsRef<Path>>(dir: P, table_size: u64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create index directory {}", dir.display()))?;
        let dictionary_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(DICTIONARY_FNAME))
            .context("open dictionary file")?;
        let data_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(DATA_FNAME))
            .context("open data file")?;
        let free = data_file.metadata().context("stat data file")?.len();

        let mut cache = MemoryIndex::new();
        let doc_info_path = dir.join(DOCINFO_FNAME);
        if doc_info_path.exists() {
            cache.docs = DocInfo::read(&doc_info_path)?;
        }

        Ok(Self { dir, dictionary_file, data_file, free, table_size, cache })
    }

    /// Inserts a token into the in-memory accumulator (build phase only).
    pub fn insert(&mut self, term: &str, doc_id: DocId, offset: Offset) {
        self.cache.insert(term, doc_id, offset);
    }

    pub fn docs_mut(&mut self) -> &mut DocInfo {
        &mut self.cache.docs
    }

    fn home_slot(&self, term: &str) -> u64 {
        multiplicative_hash(term) % self.table_size
    }

    /// One probe step. Probing wraps modulo the table size; a full table is
    /// a hard error on write.
    fn next_slot(&self, slot: u64) -> u64 {
        (slot + 1) % self.table_size
    }

    /// Reads the fixed-size record at `slot`. A slot past the end of the
    /// dictionary file has never been written and reads as all zeros.
    fn read_record(&self, slot: u64) -> Result<[u8; RECORD_SIZE as usize]> {
        let mut buf = [0u8; RECORD_SIZE as usize];
        match self.dictionary_file.read_exact_at(&mut buf, slot * RECORD_SIZE) {
            Ok(()) => Ok(buf),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok([0u8; RECORD_SIZE as usize]),
            Err(e) => Err(e).context("read dictionary record"),
        }
    }

    fn write_record(&self, slot: u64, entry: &DictEntry) -> Result<()> {
        self.dictionary_file
            .write_all_at(&entry.to_bytes(), slot * RECORD_SIZE)
            .context("write dictionary record")
    }

    /// Probes forward from the term's home slot for the first empty record.
    /// Returns the claimed slot and the number of occupied slots passed over.
    fn claim_slot(&self, term: &str) -> Result<(u64, u64)> {
        let mut slot = self.home_slot(term);
        let mut collisions = 0;
        for _ in 0..self.table_size {
            if is_empty_record(&self.read_record(slot)?) {
                return Ok((slot, collisions));
            }
            collisions += 1;
            slot = self.next_slot(slot);
        }
        bail!("dictionary hash table is full ({} slots)", self.table_size);
    }

    fn read_data(&self, start: u64, size: u32) -> Result<String> {
        let mut buf = vec![0u8; size as usize];
        self.data_file
            .read_exact_at(&mut buf, start)
            .context("read postings blob")?;
        String::from_utf8(buf).context("postings blob is not valid UTF-8")
    }

    /// Commits the accumulated index: writes `docInfo` and the `terms` list,
    /// then appends each term's serialized postings to the data file and
    /// records its location in the dictionary, resolving collisions by
    /// forward probing. Iteration order over terms is unspecified.
    pub fn write_index(&mut self) -> Result<()> {
        self.cache.docs.write(&self.dir.join(DOCINFO_FNAME))?;
        self.write_terms_file()?;

        let mut free = self.free;
        let mut collisions: u64 = 0;
        for (term, list) in self.cache.terms() {
            let blob = list.encode();
            let bytes = blob.as_bytes();
            self.data_file
                .write_all_at(bytes, free)
                .with_context(|| format!("append postings for term {term:?}"))?;
            let entry = DictEntry {
                start: free,
                size: bytes.len() as u32,
                checksum: compute_checksum(term),
            };
            let (slot, c) = self.claim_slot(term)?;
            collisions += c;
            self.write_record(slot, &entry)?;
            free += bytes.len() as u64;
        }
        self.free = free;

        tracing::info!(
            terms = self.cache.len(),
            collisions,
            "index committed to disk"
        );
        Ok(())
    }

    fn write_terms_file(&self) -> Result<()> {
        let file = File::create(self.dir.join(TERMS_FNAME)).context("create terms file")?;
        let mut out = BufWriter::new(file);
        for (term, _) in self.cache.terms() {
            writeln!(out, "{term}")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Looks up a term's dictionary entry by probing the same slot sequence
    /// the write path uses, comparing the stored checksum at each occupied
    /// slot. The first empty slot ends the scan: entries are never deleted,
    /// so the term cannot be further along.
    fn lookup(&self, term: &str) -> Result<Option<DictEntry>> {
        let checksum = compute_checksum(term);
        let mut slot = self.home_slot(term);
        for _ in 0..self.table_size {
            let record = self.read_record(slot)?;
            if is_empty_record(&record) {
                return Ok(None);
            }
            if let Some(entry) = DictEntry::from_bytes(&record) {
                if entry.checksum == checksum {
                    return Ok(Some(entry));
                }
            }
            slot = self.next_slot(slot);
        }
        Ok(None)
    }
}

impl Index for PersistentHashedIndex {
    /// Reads a term's postings from disk. Any I/O failure or malformed blob
    /// is logged and reported as a miss, never as a partial list.
    fn get_postings(&self, term: &str) -> Option<PostingsList> {
        let entry = match self.lookup(term) {
            Ok(found) => found?,
            Err(e) => {
                tracing::warn!(term, error = %e, "dictionary lookup failed");
                return None;
            }
        };
        let blob = match self.read_data(entry.start, entry.size) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(term, error = %e, "postings read failed");
                return None;
            }
        };
        match PostingsList::decode(&blob) {
            Ok(list) => Some(list),
            Err(e) => {
                tracing::warn!(term, error = %e, "postings blob is malformed");
                None
            }
        }
    }

    fn docs(&self) -> &DocInfo {
        &self.cache.docs
    }
}

/// Reads the committed term list, one term per line. Used to rebuild the
/// in-memory k-gram index on the read side.
pub fn load_terms<P: AsRef<Path>>(dir: P) -> Result<Vec<String>> {
    let path = dir.as_ref().join(TERMS_FNAME);
    let file = File::open(&path)
        .with_context(|| format!("open terms file {}", path.display()))?;
    let mut terms = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.is_empty() {
            terms.push(line);
        }
    }
    Ok(terms)
}
