mod collection;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use collection::{discover, parse_queries, read_collection};
use smart_core::persist::{load_index, load_meta, load_ranker, save_all, IndexPaths};
use smart_core::run::{RunName, RunWriter};
use smart_core::{
    Alphabet, Bm25Params, CollectionStatistics, InvertedIndex, Normalizer, NormalizerConfig, StopWords, Weighting,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a term index over a tagged collection and rank documents against queries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a collection file or directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// Newline-delimited stop-word list
        #[arg(long, conflicts_with = "english_stop_words")]
        stop_words: Option<PathBuf>,
        /// Use the built-in English stop-word list
        #[arg(long, default_value_t = false)]
        english_stop_words: bool,
        /// Apply Porter-family stemming
        #[arg(long, default_value_t = false)]
        stem: bool,
        /// Characters kept by the filter step: ascii or unicode
        #[arg(long, default_value = "ascii")]
        alphabet: Alphabet,
        /// Index documents on a single thread
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Print collection statistics for a built index
    Stats {
        #[arg(long)]
        index: PathBuf,
    },
    /// Rank documents against a free-text query
    Search {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        query: String,
        #[command(flatten)]
        scoring: ScoringArgs,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
    /// Print the weight of one term in one document
    Weight {
        #[arg(long)]
        index: PathBuf,
        /// Raw term; it is normalized with the index's pipeline
        #[arg(long)]
        term: String,
        #[arg(long)]
        doc: String,
        #[command(flatten)]
        scoring: ScoringArgs,
    },
    /// Rank every query of a topics file and append a TREC run file
    Run {
        #[arg(long)]
        index: PathBuf,
        /// Lines of `<query_id> <text>`
        #[arg(long)]
        queries: PathBuf,
        #[command(flatten)]
        scoring: ScoringArgs,
        #[arg(long, default_value_t = 1500)]
        top_k: usize,
        /// Run tag written on every line and used as file name prefix
        #[arg(long)]
        team: String,
        /// Directory receiving run files
        #[arg(long, default_value = "runs")]
        out_dir: PathBuf,
        /// Run number; defaults to the number of files already in out_dir
        #[arg(long)]
        run_id: Option<usize>,
        /// Extra trailing field, e.g. /article[1]
        #[arg(long)]
        suffix: Option<String>,
    },
    /// Delete the persisted cosine norms of an index
    ClearCache {
        #[arg(long)]
        index: PathBuf,
    },
}

#[derive(Args)]
struct ScoringArgs {
    /// Weighting scheme: ltn, ltc or bm25
    #[arg(long, default_value = "ltn")]
    scheme: String,
    #[arg(long, default_value_t = smart_core::config::BM25_K1)]
    k1: f64,
    #[arg(long, default_value_t = smart_core::config::BM25_B)]
    b: f64,
}

impl ScoringArgs {
    fn weighting(&self) -> Result<Weighting> {
        Ok(Weighting::parse(&self.scheme, Bm25Params { k1: self.k1, b: self.b })?)
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, stop_words, english_stop_words, stem, alphabet, sequential } => {
            let mut config = NormalizerConfig::new().with_alphabet(alphabet).with_stemming(stem);
            if let Some(path) = stop_words {
                let words = StopWords::load(&path).with_context(|| format!("reading stop words from {}", path.display()))?;
                config = config.with_stop_words(words);
            } else if english_stop_words {
                config = config.with_stop_words(StopWords::english());
            }
            build_index(&input, &output, Normalizer::new(config), sequential)
        }
        Commands::Stats { index } => print_stats(&index),
        Commands::Search { index, query, scoring, top_k } => search(&index, &query, &scoring, top_k),
        Commands::Weight { index, term, doc, scoring } => weight(&index, &term, &doc, &scoring),
        Commands::Run { index, queries, scoring, top_k, team, out_dir, run_id, suffix } => {
            write_run(&index, &queries, &scoring, top_k, &team, &out_dir, run_id, suffix)
        }
        Commands::ClearCache { index } => {
            let paths = IndexPaths::new(&index);
            let meta = load_meta(&paths)?;
            let removed = paths.norm_cache().clear(meta.fingerprint)?;
            tracing::info!(fingerprint = %meta.fingerprint, removed, "cleared norm cache");
            Ok(())
        }
    }
}

fn build_index(input: &Path, output: &Path, normalizer: Normalizer, sequential: bool) -> Result<()> {
    let start = Instant::now();
    let files = discover(input);
    if files.is_empty() {
        bail!("no collection files found under {}", input.display());
    }

    let mut docs = Vec::new();
    for file in &files {
        docs.extend(read_collection(file)?.into_iter().map(|d| (d.doc_id, d.text)));
    }
    tracing::info!(files = files.len(), num_docs = docs.len(), "ingested documents");

    let index = if sequential {
        let mut index = InvertedIndex::new(normalizer);
        for (id, text) in docs {
            index.add_document(id, &text)?;
        }
        index
    } else {
        InvertedIndex::build_parallel(&normalizer, &docs)?
    };

    let out_paths = IndexPaths::new(output);
    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".into());
    let meta = save_all(&out_paths, &index, &created_at)?;

    let elapsed = start.elapsed();
    tracing::info!(
        output = %output.display(),
        num_docs = meta.num_docs,
        vocabulary = meta.vocabulary_size,
        fingerprint = %meta.fingerprint,
        took_s = elapsed.as_secs_f64(),
        "index build complete"
    );
    println!("Indexing time: {:.2} s", elapsed.as_secs_f64());
    print_statistics(&CollectionStatistics::from_index(&index));
    Ok(())
}

fn print_stats(index_dir: &Path) -> Result<()> {
    let index = load_index(&IndexPaths::new(index_dir))?;
    print_statistics(&CollectionStatistics::from_index(&index));
    Ok(())
}

fn print_statistics(stats: &CollectionStatistics) {
    println!("Documents:                 {}", stats.doc_count);
    println!("Token occurrences:         {}", stats.total_tokens);
    println!("Distinct tokens:           {}", stats.distinct_tokens);
    println!("Average token length:      {:.2} chars", stats.avg_token_length);
    println!("Term occurrences:          {}", stats.total_terms);
    println!("Vocabulary size:           {}", stats.vocabulary_size);
    println!("Average document length:   {:.2} terms", stats.avg_doc_length);
    println!("Average term length:       {:.2} chars", stats.avg_term_length);
}

fn search(index_dir: &Path, query: &str, scoring: &ScoringArgs, top_k: usize) -> Result<()> {
    let ranker = load_ranker(&IndexPaths::new(index_dir))?;
    let weighting = scoring.weighting()?;
    let start = Instant::now();
    let hits = ranker.search_with(query, weighting, top_k);
    tracing::info!(query, terms = ?ranker.query_terms(query), took_s = start.elapsed().as_secs_f64(), "search complete");
    for (rank, hit) in hits.iter().enumerate() {
        println!("{:>4}. {:<12} {:.6}", rank + 1, hit.doc_id, hit.score);
    }
    Ok(())
}

fn weight(index_dir: &Path, term: &str, doc: &str, scoring: &ScoringArgs) -> Result<()> {
    let ranker = load_ranker(&IndexPaths::new(index_dir))?;
    let weighting = scoring.weighting()?;
    let params = match weighting {
        Weighting::Bm25(p) => p,
        _ => Bm25Params::default(),
    };
    if !ranker.index().contains_document(doc) {
        tracing::warn!(doc, "document not in index");
    }
    let terms = ranker.query_terms(term);
    let mut total = 0.0;
    for t in &terms {
        let w = ranker.term_weight(t, doc, weighting.scheme(), params)?;
        println!("{t}\t{w:.6}");
        total += w;
    }
    if terms.len() > 1 {
        println!("total\t{total:.6}");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_run(
    index_dir: &Path,
    queries: &Path,
    scoring: &ScoringArgs,
    top_k: usize,
    team: &str,
    out_dir: &Path,
    run_id: Option<usize>,
    suffix: Option<String>,
) -> Result<()> {
    let topics = parse_queries(&fs::read_to_string(queries)?);
    if topics.is_empty() {
        bail!("no queries in {}", queries.display());
    }
    let ranker = load_ranker(&IndexPaths::new(index_dir))?;
    let weighting = scoring.weighting()?;

    let run_id = match run_id {
        Some(id) => id,
        None => count_files(out_dir)?,
    };
    let config = ranker.index().normalizer().config();
    let name = RunName {
        team,
        run_id,
        weighting,
        stop_words: config.stop_words_enabled(),
        stemming: config.stemming,
    };
    let path = out_dir.join(name.to_string());
    let mut writer = RunWriter::append(&path, team)?;
    if let Some(suffix) = suffix {
        writer = writer.with_suffix(suffix);
    }

    let start = Instant::now();
    for (query_id, text) in &topics {
        let hits = ranker.search_with(text, weighting, top_k);
        let lines = writer.write_query(query_id, &hits)?;
        tracing::info!(query_id = %query_id, lines, "ranked query");
    }
    writer.flush()?;
    tracing::info!(
        path = %path.display(),
        queries = topics.len(),
        took_s = start.elapsed().as_secs_f64(),
        "run written"
    );
    Ok(())
}

fn count_files(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut n = 0;
    for entry in fs::read_dir(dir)? {
        if entry?.file_type()?.is_file() {
            n += 1;
        }
    }
    Ok(n)
}
