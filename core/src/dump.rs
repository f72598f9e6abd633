//! JSONL crawl dump: one record per crawled page with its outbound links.
//! Written by the crawler, read back by the indexer.
//!
//! [`CrawlState`] is the crawler's resume point, kept next to the dump.

use crate::persist::write_atomic;
use crate::{Document, Result, UrlEdge};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{BufRead, ErrorKind, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRecord {
    /// SHA-1 hex of the canonical URL.
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub fetched_at: Option<String>,
}

pub fn write_jsonl<W: Write>(mut out: W, records: &[CrawlRecord]) -> Result<()> {
    for rec in records {
        serde_json::to_writer(&mut out, rec)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

pub fn read_jsonl<R: BufRead>(reader: R) -> Result<Vec<CrawlRecord>> {
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUrl {
    pub url: String,
    pub depth: u32,
}

/// What a crawl leaves behind for the next run: every URL already queued or
/// fetched, the entries still waiting, and documents kept per domain so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlState {
    #[serde(default)]
    pub visited: Vec<String>,
    #[serde(default)]
    pub frontier: Vec<PendingUrl>,
    #[serde(default)]
    pub per_domain: BTreeMap<String, usize>,
}

impl CrawlState {
    pub fn is_empty(&self) -> bool { self.visited.is_empty() && self.frontier.is_empty() }

    /// A missing file is a fresh start.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        match fs::read(path.as_ref()) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path.as_ref(), &json)
    }
}

/// Split records into documents and link edges. A URL seen twice keeps its
/// first record.
pub fn into_corpus(records: Vec<CrawlRecord>) -> (Vec<Document>, Vec<UrlEdge>) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut documents = Vec::with_capacity(records.len());
    let mut edges = Vec::new();
    for rec in records {
        if !seen.insert(rec.url.clone()) { continue; }
        edges.extend(rec.links.iter().map(|l| UrlEdge::new(rec.url.clone(), l.clone())));
        documents.push(Document { url: rec.url, title: rec.title, text: rec.text, depth: rec.depth, domain: rec.domain });
    }
    (documents, edges)
}
