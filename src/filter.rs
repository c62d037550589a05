//! Label/annotation filters deciding which entities make it into discovery.
//!
//! A filter string is a comma separated list of `key: regex` entries. A key
//! prefixed with `!` excludes entities whose value matches; any other key
//! requires the value to match. Entities that lack a key are never rejected
//! by the filter for that key.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

fn entry_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^!?[\w.-]+/[\w.-]+\s*:\s*.+$").expect("static filter pattern"))
}

#[derive(Debug, Clone)]
pub struct FilterExpression {
    key: String,
    exclude: bool,
    pattern: Regex,
}

impl FilterExpression {
    /// Build a filter from a key (optionally `!`-prefixed) and a pattern.
    pub fn new(key: &str, pattern: &str) -> Result<Self, regex::Error> {
        let (key, exclude) = match key.strip_prefix('!') {
            Some(stripped) => (stripped, true),
            None => (key, false),
        };
        Ok(Self {
            key: key.to_string(),
            exclude,
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_exclusion(&self) -> bool {
        self.exclude
    }

    /// Whether this filter alone rules out an entity with `data`.
    fn rejects(&self, data: &BTreeMap<String, String>) -> bool {
        match data.get(&self.key) {
            None => false,
            Some(value) => self.pattern.is_match(value) == self.exclude,
        }
    }
}

impl std::fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bang = if self.exclude { "!" } else { "" };
        write!(f, "{}{}: {}", bang, self.key, self.pattern.as_str())
    }
}

pub type FilterSet = Vec<FilterExpression>;

/// Parse a filter string. Entries that are not `prefix/name: regex`, or whose
/// regex does not compile, are dropped with a warning.
pub fn parse_filters(filter: &str) -> FilterSet {
    filter
        .split(',')
        .map(str::trim)
        .filter(|kv| !kv.is_empty())
        .filter_map(|kv| {
            if !entry_pattern().is_match(kv) {
                warn!("Cannot parse filter from: \"{}\"", kv);
                return None;
            }
            let (key, expression) = kv.split_once(':')?;
            match FilterExpression::new(key.trim(), expression.trim()) {
                Ok(f) => Some(f),
                Err(e) => {
                    warn!("Cannot compile filter \"{}\": {}", kv, e);
                    None
                }
            }
        })
        .collect()
}

/// Admit `name` unless one of `filters` rejects it. A missing map admits.
pub fn admits(name: &str, data: Option<&BTreeMap<String, String>>, filters: &[FilterExpression]) -> bool {
    let Some(data) = data else {
        return true;
    };

    match filters.iter().find(|f| f.rejects(data)) {
        Some(f) => {
            debug!("Discarded \"{}\" by filter \"{}\"", name, f);
            false
        }
        None => true,
    }
}
