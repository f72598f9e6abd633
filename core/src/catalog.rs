//! Curated allowlist of trusted academic, reference and government sources.
//!
//! The catalog is static configuration: the crawler only ever asks it which
//! domains are allowed, how many pages each may contribute, and where to start.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_DOMAIN_QUOTA: usize = 35;

fn default_quota() -> usize { DEFAULT_DOMAIN_QUOTA }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub domain: String,
    pub category: String,
    #[serde(default = "default_quota")]
    pub max_pages: usize,
    #[serde(default)]
    pub seeds: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    domains: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct DomainCatalog {
    entries: Vec<CatalogEntry>,
    by_domain: HashMap<String, usize>,
}

impl DomainCatalog {
    /// Builds a catalog, normalizing domain names. Duplicate or empty domains
    /// are configuration errors.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut catalog = Self::default();
        for mut entry in entries {
            entry.domain = normalize_domain(&entry.domain);
            if entry.domain.is_empty() {
                return Err(Error::InvalidConfig("catalog entry with empty domain".into()));
            }
            if catalog.by_domain.contains_key(&entry.domain) {
                return Err(Error::InvalidConfig(format!("duplicate catalog domain {}", entry.domain)));
            }
            catalog.by_domain.insert(entry.domain.clone(), catalog.entries.len());
            catalog.entries.push(entry);
        }
        Ok(catalog)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&raw)?;
        Self::new(file.domains)
    }

    /// The built-in list of trusted sources, one entry per domain with the
    /// default quota.
    pub fn builtin() -> Self {
        Self::builtin_with_quota(DEFAULT_DOMAIN_QUOTA)
    }

    pub fn builtin_with_quota(max_pages: usize) -> Self {
        let mut entries: Vec<CatalogEntry> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (category, seeds) in BUILTIN_SOURCES {
            for seed in seeds.iter() {
                let domain = match seed_host(seed) {
                    Some(h) => normalize_domain(h),
                    None => continue,
                };
                match index.get(&domain) {
                    Some(&i) => {
                        if !entries[i].seeds.iter().any(|s| s == seed) {
                            entries[i].seeds.push(seed.to_string());
                        }
                    }
                    None => {
                        index.insert(domain.clone(), entries.len());
                        entries.push(CatalogEntry {
                            domain,
                            category: category.to_string(),
                            max_pages,
                            seeds: vec![seed.to_string()],
                        });
                    }
                }
            }
        }
        let by_domain = index;
        Self { entries, by_domain }
    }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn entries(&self) -> &[CatalogEntry] { &self.entries }

    pub fn allowed_domains(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.domain.as_str())
    }

    /// Page quota for a catalog domain; unknown domains get 0.
    pub fn quota_for(&self, domain: &str) -> usize {
        self.entry(domain).map_or(0, |e| e.max_pages)
    }

    pub fn category_for(&self, domain: &str) -> Option<&str> {
        self.entry(domain).map(|e| e.category.as_str())
    }

    /// Seeds in catalog order, first occurrence wins.
    pub fn seed_urls(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for e in &self.entries {
            for s in &e.seeds {
                if !out.contains(s) { out.push(s.clone()); }
            }
        }
        out
    }

    /// Resolves a host to the most specific catalog domain it belongs to:
    /// `www.nasa.gov` and `nasa.gov` map to `nasa.gov`, while
    /// `science.nasa.gov` maps to itself when listed.
    pub fn match_domain(&self, host: &str) -> Option<&str> {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() { return None; }
        let mut candidate: &str = &host;
        loop {
            if let Some(&i) = self.by_domain.get(candidate) {
                return Some(self.entries[i].domain.as_str());
            }
            match candidate.split_once('.') {
                Some((_, rest)) if !rest.is_empty() => candidate = rest,
                _ => return None,
            }
        }
    }

    fn entry(&self, domain: &str) -> Option<&CatalogEntry> {
        self.by_domain.get(&normalize_domain(domain)).map(|&i| &self.entries[i])
    }
}

fn normalize_domain(raw: &str) -> String {
    let d = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    match d.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => d,
    }
}

fn seed_host(seed: &str) -> Option<&str> {
    let rest = seed.split_once("://").map_or(seed, |(_, r)| r);
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.rsplit_once('@').map_or(host, |(_, h)| h);
    let host = host.split(':').next()?;
    if host.is_empty() { None } else { Some(host) }
}

const BUILTIN_SOURCES: &[(&str, &[&str])] = &[
    ("Reference & Encyclopedias", &[
        "https://www.wikipedia.org",
        "https://en.wikipedia.org",
        "https://www.britannica.com",
        "https://www.newworldencyclopedia.org",
        "https://www.worldhistory.org",
        "https://www.metmuseum.org/toah",
        "https://www.poetryfoundation.org",
        "https://plato.stanford.edu",
        "https://iep.utm.edu",
        "https://www.loc.gov",
    ]),
    ("Academic Journals & Publishers", &[
        "https://www.nature.com",
        "https://www.sciencedirect.com",
        "https://link.springer.com",
        "https://academic.oup.com",
        "https://journals.sagepub.com",
        "https://www.tandfonline.com",
        "https://www.jstor.org",
        "https://www.cell.com",
        "https://www.pnas.org",
        "https://www.annualreviews.org",
        "https://www.mdpi.com",
        "https://www.frontiersin.org",
        "https://www.rsc.org/journals-books-databases",
        "https://dl.acm.org",
        "https://ieeexplore.ieee.org",
    ]),
    ("Preprint Servers & Scholarly Networks", &[
        "https://arxiv.org",
        "https://www.biorxiv.org",
        "https://www.medrxiv.org",
        "https://osf.io/preprints",
        "https://hal.science",
        "https://www.researchgate.net",
    ]),
    ("Education & Open Courseware", &[
        "https://ocw.mit.edu",
        "https://www.khanacademy.org",
        "https://www.edx.org",
        "https://www.coursera.org",
        "https://openstax.org",
        "https://www.open.edu/openlearn",
        "https://www.futurelearn.com",
        "https://www.saylor.org",
        "https://cs50.harvard.edu",
    ]),
    ("Medical & Health Authorities", &[
        "https://www.who.int",
        "https://www.cdc.gov",
        "https://www.nih.gov",
        "https://www.ncbi.nlm.nih.gov",
        "https://www.mayoclinic.org",
        "https://www.bmj.com",
        "https://www.nhs.uk",
        "https://www.cochranelibrary.com",
        "https://pubmed.ncbi.nlm.nih.gov",
        "https://clinicaltrials.gov",
    ]),
    ("Government & Official Statistics", &[
        "https://www.usa.gov",
        "https://data.gov",
        "https://www.congress.gov",
        "https://www.gao.gov",
        "https://www.gov.uk",
        "https://www.ons.gov.uk",
        "https://www.parliament.uk",
        "https://www.canada.ca",
        "https://www.statcan.gc.ca",
        "https://www.abs.gov.au",
        "https://data.europa.eu",
        "https://www.worldbank.org",
        "https://unstats.un.org",
        "https://www.imf.org",
        "https://www.oecd.org",
        "https://www.un.org",
    ]),
    ("Science & Technology Agencies", &[
        "https://www.nasa.gov",
        "https://science.nasa.gov",
        "https://www.jpl.nasa.gov",
        "https://www.nsf.gov",
        "https://www.nist.gov",
        "https://www.energy.gov",
        "https://www.esa.int",
        "https://www.noaa.gov",
        "https://www.usgs.gov",
    ]),
    ("Libraries & Archives", &[
        "https://www.gutenberg.org",
        "https://www.hathitrust.org",
        "https://www.archives.gov",
        "https://www.britishmuseum.org",
        "https://digitalcommons.unl.edu",
        "https://library.si.edu",
        "https://www.loc.gov/collections",
    ]),
    ("Data Portals & Repositories", &[
        "https://ourworldindata.org",
        "https://datahub.io",
        "https://catalog.data.gov",
        "https://data.unicef.org",
        "https://data.worldbank.org",
        "https://zenodo.org",
        "https://figshare.com",
        "https://datadryad.org",
    ]),
    ("Fact-Checking & Verification", &[
        "https://www.factcheck.org",
        "https://www.politifact.com",
        "https://www.snopes.com",
    ]),
];
