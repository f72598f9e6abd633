use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use scholar_core::dump::{into_corpus, read_jsonl, CrawlRecord};
use scholar_core::index::{IdfMode, IndexConfig, DEFAULT_TITLE_BOOST};
use scholar_core::pagerank::PageRankParams;
use scholar_core::persist::{load_meta, load_snapshot, write_snapshot, IndexPaths, Snapshot};
use scholar_core::ranker::{ContextPassage, Ranker, RankerConfig, SearchHit};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query the academic search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IdfArg {
    /// ln(N/df)
    Standard,
    /// ln(1 + N/df)
    Smoothed,
}

impl From<IdfArg> for IdfMode {
    fn from(a: IdfArg) -> Self {
        match a {
            IdfArg::Standard => IdfMode::Standard,
            IdfArg::Smoothed => IdfMode::Smoothed,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the snapshot from crawl dumps (a JSONL/JSON file or a directory of them)
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Weight multiplier for terms that appear in the title
        #[arg(long, default_value_t = DEFAULT_TITLE_BOOST)]
        title_boost: f32,
        #[arg(long, value_enum, default_value_t = IdfArg::Smoothed)]
        idf: IdfArg,
        #[arg(long, default_value_t = 0.85)]
        damping: f64,
        #[arg(long, default_value_t = 100)]
        max_iterations: usize,
        #[arg(long, default_value_t = 1e-9)]
        tolerance: f64,
    },
    /// Run one query against a built snapshot and print JSON
    Search {
        /// Index directory
        #[arg(long)]
        index: String,
        /// Query text
        #[arg(long)]
        q: String,
        /// Number of results
        #[arg(long, default_value_t = 10)]
        k: usize,
        /// Relevance weight; 1 - alpha goes to PageRank
        #[arg(long, default_value_t = 0.85)]
        alpha: f64,
        /// Also emit up to this many chars of raw text across the hits
        #[arg(long)]
        context_chars: Option<usize>,
    },
    /// Print the snapshot's build metadata
    Info {
        #[arg(long)]
        index: String,
    },
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    hits: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<Vec<ContextPassage>>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, title_boost, idf, damping, max_iterations, tolerance } => {
            let index_config = IndexConfig { title_boost, idf: idf.into() };
            let params = PageRankParams { damping, max_iterations, tolerance };
            build(&input, &output, &index_config, &params)
        }
        Commands::Search { index, q, k, alpha, context_chars } => search(&index, &q, k, alpha, context_chars),
        Commands::Info { index } => {
            let meta = load_meta(&IndexPaths::new(&index)).with_context(|| format!("reading metadata in {index}"))?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            Ok(())
        }
    }
}

fn collect_inputs(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

fn read_records(file: &Path) -> Result<Vec<CrawlRecord>> {
    let reader = BufReader::new(File::open(file).with_context(|| format!("opening {}", file.display()))?);
    if file.extension().and_then(|s| s.to_str()) == Some("json") {
        let json: serde_json::Value = serde_json::from_reader(reader)?;
        return Ok(match json {
            serde_json::Value::Array(arr) => arr.into_iter().map(serde_json::from_value).collect::<Result<Vec<CrawlRecord>, _>>()?,
            obj @ serde_json::Value::Object(_) => vec![serde_json::from_value(obj)?],
            _ => Vec::new(),
        });
    }
    Ok(read_jsonl(reader)?)
}

fn build(input: &str, output: &str, index_config: &IndexConfig, params: &PageRankParams) -> Result<()> {
    let files = collect_inputs(Path::new(input));
    if files.is_empty() { return Err(anyhow!("no crawl dumps found at {input}")); }

    let mut records = Vec::new();
    for file in &files {
        records.extend(read_records(file)?);
    }
    let (documents, edges) = into_corpus(records);
    tracing::info!(files = files.len(), num_docs = documents.len(), num_edges = edges.len(), "ingested crawl dumps");

    let snapshot = Snapshot::build(documents, &edges, index_config, params)?;
    if !snapshot.meta.pagerank_converged {
        tracing::warn!(iterations = snapshot.meta.pagerank_iterations, "PageRank hit the iteration cap before converging");
    }
    write_snapshot(&IndexPaths::new(output), &snapshot)?;
    tracing::info!(output, num_terms = snapshot.meta.num_terms, "index build complete");
    Ok(())
}

fn search(index: &str, query: &str, k: usize, alpha: f64, context_chars: Option<usize>) -> Result<()> {
    let snapshot = match load_snapshot(&IndexPaths::new(index)) {
        Ok(s) => s,
        Err(e) if e.is_index_unavailable() => {
            return Err(anyhow!("{e}; rebuild it with `indexer build --input <dump> --output {index}`"));
        }
        Err(e) => return Err(e.into()),
    };
    let ranker = Ranker::new(&snapshot, RankerConfig { alpha, ..RankerConfig::default() })?;
    let hits = ranker.search(query, k);
    let context = context_chars.map(|max| ranker.gather_context(&hits, max));
    let out = SearchOutput { query, hits, context };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
