use anyhow::{anyhow, Context, Result};
use clap::Parser;
use scholar_core::catalog::{DomainCatalog, DEFAULT_DOMAIN_QUOTA};
use scholar_core::dump::{write_jsonl, CrawlRecord, CrawlState};
use scholar_crawler::{CrawlConfig, CrawlLimits, CrawlOutput, Crawler, DEFAULT_USER_AGENT};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl trusted academic sources to JSONL, respecting robots.txt")]
struct Cli {
    /// Optional file with seed URLs (one per line); defaults to the catalog's seeds
    #[arg(long)]
    seeds: Option<String>,
    /// Optional JSON catalog of allowed domains; defaults to the built-in list
    #[arg(long)]
    catalog: Option<String>,
    /// Output JSONL file path
    #[arg(long, default_value = "./data/crawl.jsonl")]
    output: String,
    /// Where the frontier and visited set are saved after every run
    #[arg(long, default_value = "./data/crawl_state.json")]
    state: String,
    /// Continue from the saved state and append to the output instead of
    /// starting over
    #[arg(long)]
    resume: bool,
    /// Maximum number of documents to keep
    #[arg(long, default_value_t = 150)]
    max_pages: usize,
    /// Maximum link depth from a seed
    #[arg(long, default_value_t = 2)]
    max_depth: u32,
    /// Seconds between any two requests
    #[arg(long, default_value_t = 1.0)]
    delay: f64,
    /// Per-domain page quota for the built-in catalog
    #[arg(long, default_value_t = DEFAULT_DOMAIN_QUOTA)]
    quota: usize,
    /// Request timeout seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
    /// Stop after this many seconds and keep what was collected
    #[arg(long)]
    time_budget_secs: Option<u64>,
    /// Discard pages with less extracted text than this
    #[arg(long, default_value_t = 512)]
    min_text_chars: usize,
    /// User-Agent string to use for robots.txt and crawling
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,
}

fn load_seeds(path: &str) -> Result<Vec<String>> {
    let mut seeds = Vec::new();
    for line in BufReader::new(File::open(path).with_context(|| format!("opening seeds {path}"))?).lines() {
        let s = line?.trim().to_string();
        if s.is_empty() || s.starts_with('#') { continue; }
        if s.contains("://") { seeds.push(s) } else { seeds.push(format!("https://{s}")) }
    }
    Ok(seeds)
}

fn url_id(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn to_records(output: CrawlOutput) -> Vec<CrawlRecord> {
    let mut links: HashMap<String, Vec<String>> = HashMap::new();
    for e in output.edges {
        links.entry(e.source).or_default().push(e.target);
    }
    let ts = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    output
        .documents
        .into_iter()
        .map(|d| CrawlRecord {
            id: url_id(&d.url),
            links: links.remove(&d.url).unwrap_or_default(),
            url: d.url,
            title: d.title,
            text: d.text,
            depth: d.depth,
            domain: d.domain,
            fetched_at: Some(ts.clone()),
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Cli::parse();

    let catalog = match &args.catalog {
        Some(path) => DomainCatalog::from_json_file(path).with_context(|| format!("loading catalog {path}"))?,
        None => DomainCatalog::builtin_with_quota(args.quota),
    };
    let seeds = match &args.seeds {
        Some(path) => load_seeds(path)?,
        None => catalog.seed_urls(),
    };
    if seeds.is_empty() { return Err(anyhow!("no seeds")); }

    let config = CrawlConfig {
        user_agent: args.user_agent.clone(),
        request_timeout: Duration::from_secs(args.timeout_secs),
        min_text_chars: args.min_text_chars,
        ..CrawlConfig::default()
    };
    let mut limits = CrawlLimits::new(args.max_pages, args.max_depth, args.delay);
    limits.time_budget = args.time_budget_secs.map(Duration::from_secs);

    info!(
        seeds = seeds.len(),
        domains = catalog.entries().len(),
        output = %args.output,
        "crawler configured"
    );
    let state = if args.resume {
        let state = CrawlState::load(&args.state).with_context(|| format!("loading crawl state {}", args.state))?;
        info!(visited = state.visited.len(), frontier = state.frontier.len(), path = %args.state, "resuming");
        state
    } else {
        CrawlState::default()
    };

    let crawler = Crawler::http(catalog, config)?;
    let mut output = crawler.crawl_from(&seeds, &limits, state).await;
    let stats = output.stats.clone();
    let next_state = std::mem::take(&mut output.state);

    if let Some(dir) = Path::new(&args.output).parent() {
        fs::create_dir_all(dir).ok();
    }
    let records = to_records(output);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(args.resume)
        .truncate(!args.resume)
        .open(&args.output)
        .with_context(|| format!("opening {}", args.output))?;
    write_jsonl(BufWriter::new(file), &records)?;
    next_state.save(&args.state).with_context(|| format!("saving crawl state {}", args.state))?;

    info!(
        emitted = records.len(),
        output = %args.output,
        pending = next_state.frontier.len(),
        stats = %serde_json::to_string(&stats)?,
        "done"
    );
    Ok(())
}
