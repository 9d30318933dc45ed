use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hashdex_core::persist::load_terms;
use hashdex_core::tokenizer::tokenize;
use hashdex_core::{
    DocId, Index, KGramIndex, PersistentHashedIndex, PostingsList, Query, QueryType, RankingType,
    Searcher,
};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a persistent hashed inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a directory of plain-text documents
    Build {
        /// Input directory (indexed recursively, .txt files only)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
    },
    /// Run a query against a committed index
    Query {
        /// Index directory
        #[arg(long)]
        index: String,
        /// The query string (whitespace-separated terms)
        #[arg(long)]
        query: String,
        #[arg(long, value_enum, default_value = "intersection")]
        mode: Mode,
        #[arg(long, value_enum, default_value = "tf-idf")]
        ranking: Ranking,
        /// Optional rank source (docName;rank lines), used by the pagerank
        /// and combination rankings
        #[arg(long)]
        ranks: Option<String>,
    },
    /// Look up terms containing all given k-grams
    Kgram {
        /// Index directory
        #[arg(long)]
        index: String,
        /// Space-separated k-grams, e.g. "^th he$"
        #[arg(long)]
        kgrams: String,
        #[arg(long, default_value_t = 3)]
        k: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Intersection,
    Phrase,
    Ranked,
}

#[derive(Clone, Copy, ValueEnum)]
enum Ranking {
    TfIdf,
    Pagerank,
    Combination,
}

impl From<Mode> for QueryType {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Intersection => QueryType::Intersection,
            Mode::Phrase => QueryType::Phrase,
            Mode::Ranked => QueryType::Ranked,
        }
    }
}

impl From<Ranking> for RankingType {
    fn from(ranking: Ranking) -> Self {
        match ranking {
            Ranking::TfIdf => RankingType::TfIdf,
            Ranking::Pagerank => RankingType::PageRank,
            Ranking::Combination => RankingType::Combination,
        }
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output } => build_index(&input, &output),
        Commands::Query { index, query, mode, ranking, ranks } => {
            run_query(&index, &query, mode.into(), ranking.into(), ranks.as_deref())
        }
        Commands::Kgram { index, kgrams, k } => run_kgram(&index, &kgrams, k),
    }
}

fn build_index(input: &str, output: &str) -> Result<()> {
    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_file()
                && e.path().extension().and_then(|s| s.to_str()) == Some("txt")
        })
        .map(|e| e.into_path())
        .collect();
    if files.is_empty() {
        bail!("no .txt files under {input}");
    }
    // Deterministic document ids across rebuilds.
    files.sort();

    let mut index = PersistentHashedIndex::open(output)?;
    for (doc_id, file) in files.iter().enumerate() {
        let doc_id = doc_id as DocId;
        let text = fs::read_to_string(file)
            .with_context(|| format!("read document {}", file.display()))?;
        let tokens = tokenize(&text);
        let length = tokens.len() as u32;
        for (term, pos) in tokens {
            index.insert(&term, doc_id, pos);
        }
        index.docs_mut().add(doc_id, file.to_string_lossy(), length);
    }

    tracing::info!(num_docs = files.len(), "documents ingested, committing");
    index.write_index()?;
    tracing::info!(output, "index build complete");
    Ok(())
}

#[derive(Serialize)]
struct Hit<'a> {
    doc_id: DocId,
    name: &'a str,
    score: f64,
    offsets: &'a [u32],
}

fn run_query(
    index_dir: &str,
    query: &str,
    query_type: QueryType,
    ranking: RankingType,
    ranks: Option<&str>,
) -> Result<()> {
    let mut index = PersistentHashedIndex::open(index_dir)?;
    if let Some(rank_file) = ranks {
        index.docs_mut().load_ranks(Path::new(rank_file))?;
    }
    let kgrams = build_kgram_index(index_dir, 3)?;
    let searcher = Searcher::new(&index, &kgrams);

    let query = Query::parse(query);
    match searcher.search(&query, query_type, ranking) {
        Some(result) => print_hits(&index, &result)?,
        None => tracing::info!("no matching documents"),
    }
    Ok(())
}

fn print_hits(index: &PersistentHashedIndex, result: &PostingsList) -> Result<()> {
    for entry in result.iter() {
        let name = index
            .docs()
            .names
            .get(&entry.doc_id)
            .map(|n| n.as_str())
            .unwrap_or("?");
        let hit = Hit {
            doc_id: entry.doc_id,
            name,
            score: entry.score,
            offsets: &entry.offsets,
        };
        println!("{}", serde_json::to_string(&hit)?);
    }
    Ok(())
}

fn run_kgram(index_dir: &str, kgrams: &str, k: usize) -> Result<()> {
    let index = PersistentHashedIndex::open(index_dir)?;
    let kgram_index = build_kgram_index(index_dir, k)?;
    let searcher = Searcher::new(&index, &kgram_index);

    let grams: Vec<&str> = kgrams.split_whitespace().collect();
    for gram in &grams {
        if gram.chars().count() != k {
            bail!("{gram:?} is not a {k}-gram");
        }
    }
    for term in searcher.kgram_terms(&grams) {
        println!("{term}");
    }
    Ok(())
}

/// Rebuilds the in-memory k-gram index from the committed term list.
fn build_kgram_index(index_dir: &str, k: usize) -> Result<KGramIndex> {
    let mut kgrams = KGramIndex::new(k);
    for term in load_terms(index_dir)? {
        kgrams.insert(&term);
    }
    tracing::debug!(terms = kgrams.len(), k, "k-gram index rebuilt");
    Ok(kgrams)
}
