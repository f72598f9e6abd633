//! On-disk snapshot of a full build.
//!
//! Layout of `snapshot.bin`:
//!
//! ```text
//! +----------+-------------+-------------+-------------------+
//! | SCHOLAR1 | version u32 | crc32 u32   | bincode payload   |
//! +----------+-------------+-------------+-------------------+
//! ```
//!
//! The file is written to a temporary sibling, fsynced and renamed over the
//! previous snapshot, so readers see either the old build or the new one.
//! `meta.json` is an informational sidecar replaced the same way after the
//! snapshot.

use crate::graph::LinkGraph;
use crate::index::{build_index, IndexConfig, InvertedIndex};
use crate::pagerank::{compute_pagerank, PageRankParams};
use crate::{Document, Error, Result, UrlEdge};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

pub const SNAPSHOT_MAGIC: &[u8; 8] = b"SCHOLAR1";
pub const SNAPSHOT_VERSION: u32 = 1;
const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub created_at: String,
    pub num_docs: u32,
    pub num_terms: u32,
    pub num_edges: u32,
    pub pagerank_iterations: u32,
    pub pagerank_converged: bool,
}

/// Everything a query session needs: documents, postings, link graph and
/// PageRank vector, all addressed by `DocId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: MetaFile,
    pub documents: Vec<Document>,
    pub index: InvertedIndex,
    pub graph: LinkGraph,
    pub pagerank: Vec<f64>,
}

impl Snapshot {
    /// Run the index and PageRank stages over a finished crawl.
    pub fn build(
        documents: Vec<Document>,
        edges: &[UrlEdge],
        index_config: &IndexConfig,
        pagerank_params: &PageRankParams,
    ) -> Result<Self> {
        let index = build_index(&documents, index_config)?;
        let graph = LinkGraph::from_edges(&documents, edges);
        let pr = compute_pagerank(&graph, pagerank_params)?;
        let meta = MetaFile {
            version: SNAPSHOT_VERSION,
            created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            num_docs: documents.len() as u32,
            num_terms: index.num_terms() as u32,
            num_edges: graph.edges().len() as u32,
            pagerank_iterations: pr.iterations as u32,
            pagerank_converged: pr.converged,
        };
        Ok(Self { meta, documents, index, graph, pagerank: pr.scores })
    }

    pub fn document(&self, doc_id: crate::DocId) -> Option<&Document> {
        self.documents.get(doc_id as usize)
    }

    fn check_consistency(&self) -> std::result::Result<(), String> {
        let n = self.documents.len();
        if self.index.num_docs as usize != n
            || self.index.doc_norms.len() != n
            || self.graph.num_docs() as usize != n
            || self.pagerank.len() != n
        {
            return Err(format!(
                "table sizes disagree: documents={} index={} graph={} pagerank={}",
                n,
                self.index.num_docs,
                self.graph.num_docs(),
                self.pagerank.len()
            ));
        }
        Ok(())
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn snapshot(&self) -> PathBuf { self.root.join("snapshot.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// `path` with a leading dot and a `.tmp` suffix, in the same directory.
fn tmp_sibling(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Replace `path` with `bytes` via a fsynced temporary sibling and a rename.
/// A crash leaves either the previous file or the new one, never a mix.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    create_dir_all(&dir)?;
    let tmp = tmp_sibling(path);
    let mut f = OpenOptions::new().create(true).write(true).truncate(true).open(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    drop(f);
    fs::rename(&tmp, path)?;
    sync_dir(&dir)
}

pub fn write_snapshot(paths: &IndexPaths, snapshot: &Snapshot) -> Result<()> {
    create_dir_all(&paths.root)?;
    let payload = bincode::serialize(snapshot)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(SNAPSHOT_MAGIC);
    bytes.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    bytes.extend_from_slice(&payload);

    write_atomic(&paths.snapshot(), &bytes)?;
    save_meta(paths, &snapshot.meta)?;
    tracing::info!(
        path = %paths.snapshot().display(),
        bytes = bytes.len(),
        num_docs = snapshot.meta.num_docs,
        "snapshot written"
    );
    Ok(())
}

/// Load and verify the snapshot. A missing, truncated, corrupt or
/// inconsistent file is reported as [`Error::IndexUnavailable`].
pub fn load_snapshot(paths: &IndexPaths) -> Result<Snapshot> {
    let path = paths.snapshot();
    let mut f = File::open(&path).map_err(|e| Error::unavailable(&path, e.to_string()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf).map_err(|e| Error::unavailable(&path, e.to_string()))?;

    if buf.len() < HEADER_LEN {
        return Err(Error::unavailable(&path, "truncated header"));
    }
    if &buf[..8] != SNAPSHOT_MAGIC {
        return Err(Error::unavailable(&path, "bad magic"));
    }
    let version = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    if version != SNAPSHOT_VERSION {
        return Err(Error::unavailable(&path, format!("unsupported version {version}")));
    }
    let expected = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
    let payload = &buf[HEADER_LEN..];
    if crc32fast::hash(payload) != expected {
        return Err(Error::unavailable(&path, "checksum mismatch"));
    }
    let snapshot: Snapshot =
        bincode::deserialize(payload).map_err(|e| Error::unavailable(&path, e.to_string()))?;
    snapshot.check_consistency().map_err(|reason| Error::unavailable(&path, reason))?;
    Ok(snapshot)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let json = serde_json::to_string_pretty(meta)?;
    write_atomic(&paths.meta(), json.as_bytes())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
