use crate::DocId;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Document bookkeeping: names and token lengths per document id, plus
/// precomputed authority ranks keyed by document name. Populated during the
/// build phase, or read back from the `docInfo` file on the read side.
#[derive(Debug, Clone, Default)]
pub struct DocInfo {
    pub names: HashMap<DocId, String>,
    pub lengths: HashMap<DocId, u32>,
    pub ranks: HashMap<String, f64>,
}

impl DocInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, doc_id: DocId, name: impl Into<String>, length: u32) {
        self.names.insert(doc_id, name.into());
        self.lengths.insert(doc_id, length);
    }

    pub fn total_docs(&self) -> usize {
        self.names.len()
    }

    /// Authority rank of a document, 0 when no rank is known.
    pub fn rank(&self, doc_id: DocId) -> f64 {
        self.names
            .get(&doc_id)
            .and_then(|name| self.ranks.get(name))
            .copied()
            .unwrap_or(0.0)
    }

    /// Writes one `docID;docName;docLength` line per document.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("create doc info file {}", path.display()))?;
        let mut out = BufWriter::new(file);
        for (doc_id, name) in &self.names {
            let length = self.lengths.get(doc_id).copied().unwrap_or(0);
            writeln!(out, "{doc_id};{name};{length}")?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("open doc info file {}", path.display()))?;
        let mut info = DocInfo::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let (id_part, rest) = line
                .split_once(';')
                .with_context(|| format!("malformed doc info line {line:?}"))?;
            let (name, len_part) = rest
                .rsplit_once(';')
                .with_context(|| format!("malformed doc info line {line:?}"))?;
            let doc_id = id_part
                .parse::<DocId>()
                .with_context(|| format!("invalid doc id {id_part:?}"))?;
            let length = len_part
                .parse::<u32>()
                .with_context(|| format!("invalid doc length {len_part:?}"))?;
            info.add(doc_id, name, length);
        }
        Ok(info)
    }

    /// Loads `docName;rank` lines from an external rank source.
    pub fn load_ranks(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)
            .with_context(|| format!("open rank file {}", path.display()))?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let (name, rank_part) = line
                .rsplit_once(';')
                .with_context(|| format!("malformed rank line {line:?}"))?;
            let rank = rank_part
                .parse::<f64>()
                .with_context(|| format!("invalid rank {rank_part:?}"))?;
            self.ranks.insert(name.to_string(), rank);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_info_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docInfo");

        let mut info = DocInfo::new();
        info.add(0, "davisWiki/a.txt", 12);
        info.add(3, "davisWiki/b;semi.txt", 7);
        info.write(&path).unwrap();

        let back = DocInfo::read(&path).unwrap();
        assert_eq!(back.names, info.names);
        assert_eq!(back.lengths, info.lengths);
    }

    #[test]
    fn rank_defaults_to_zero() {
        let mut info = DocInfo::new();
        info.add(0, "a.txt", 3);
        assert_eq!(info.rank(0), 0.0);
        info.ranks.insert("a.txt".into(), 0.25);
        assert_eq!(info.rank(0), 0.25);
        assert_eq!(info.rank(99), 0.0);
    }
}
