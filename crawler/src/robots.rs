//! robots.txt rules for a single origin.
//!
//! Groups addressed to our product token win over the `*` group. Within the
//! chosen group the longest matching pattern decides, and `Allow` wins ties.
//! Patterns support `*` wildcards and a trailing `$` anchor.

use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    allows: Vec<String>,
    disallows: Vec<String>,
    crawl_delay: Option<Duration>,
}

#[derive(Default)]
struct Group {
    allows: Vec<String>,
    disallows: Vec<String>,
    crawl_delay: Option<Duration>,
}

impl Group {
    fn apply(&mut self, key: &str, val: &str) {
        match key {
            "allow" if !val.is_empty() => self.allows.push(val.to_string()),
            // an empty Disallow allows everything
            "disallow" if !val.is_empty() => self.disallows.push(val.to_string()),
            "crawl-delay" => {
                if let Ok(secs) = val.parse::<f64>() {
                    if let Ok(d) = Duration::try_from_secs_f64(secs) {
                        self.crawl_delay = Some(d);
                    }
                }
            }
            _ => {}
        }
    }
}

/// `AcademicSearchBot/2.0 (+https://...)` -> `academicsearchbot`
pub fn product_token(user_agent: &str) -> String {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

impl RobotsRules {
    /// Used when robots.txt is missing or unreachable.
    pub fn allow_all() -> Self { Self::default() }

    pub fn parse(txt: &str, user_agent: &str) -> Self {
        let token = product_token(user_agent);
        let mut specific = Group::default();
        let mut star = Group::default();
        let mut found_specific = false;
        let (mut in_specific, mut in_star) = (false, false);
        let mut last_was_agent = false;

        for raw in txt.lines() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() { continue; }
            let Some((k, v)) = line.split_once(':') else { continue };
            let key = k.trim().to_ascii_lowercase();
            let val = v.trim();

            if key == "user-agent" {
                // consecutive agent lines share one group
                if !last_was_agent {
                    in_specific = false;
                    in_star = false;
                }
                let agent = val.to_ascii_lowercase();
                if agent == "*" {
                    in_star = true;
                } else if !token.is_empty() && agent == token {
                    in_specific = true;
                    found_specific = true;
                }
                last_was_agent = true;
                continue;
            }
            last_was_agent = false;
            if in_specific { specific.apply(&key, val); }
            if in_star { star.apply(&key, val); }
        }

        let chosen = if found_specific { specific } else { star };
        Self { allows: chosen.allows, disallows: chosen.disallows, crawl_delay: chosen.crawl_delay }
    }

    pub fn is_allowed(&self, path: &str) -> bool {
        let longest = |patterns: &[String]| {
            patterns.iter().filter(|p| pattern_matches(path, p)).map(|p| p.len()).max()
        };
        match (longest(&self.allows), longest(&self.disallows)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(d)) => a >= d,
        }
    }

    pub fn crawl_delay(&self) -> Option<Duration> { self.crawl_delay }
}

fn pattern_matches(path: &str, pattern: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return if anchored { path == pattern } else { path.starts_with(pattern) };
    }

    let first = parts[0];
    if !path.starts_with(first) { return false; }
    let mut pos = first.len();
    let last = parts[parts.len() - 1];
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() { continue; }
        match path[pos..].find(part) {
            Some(i) => pos += i + part.len(),
            None => return false,
        }
    }
    if anchored {
        path.len() >= pos + last.len() && path.ends_with(last)
    } else {
        path[pos..].contains(last)
    }
}
