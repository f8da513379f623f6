//! Symbol-level repository summary.
//!
//! Lists each file with its top-level definitions, found with a
//! language-agnostic regex, and truncates the result to the token budget.
//! The last rendering is cached until [`RepoMapper::refresh`].

use std::path::Path;
use std::sync::{Mutex, OnceLock};

use regex::Regex;

use crate::engine::estimate_tokens;

const MAX_FILE_BYTES: u64 = 256 * 1024;

fn symbol_regex() -> Option<&'static Regex> {
    static SYMBOL: OnceLock<Option<Regex>> = OnceLock::new();
    SYMBOL
        .get_or_init(|| {
            Regex::new(
                r"^\s*(?:pub(?:\([^)]*\))?\s+|export\s+(?:default\s+)?|async\s+)*(?:fn|struct|enum|trait|impl|mod|class|def|function|interface|type|const)\s+([A-Za-z_][A-Za-z0-9_]*)",
            )
            .ok()
        })
        .as_ref()
}

/// Top-level symbol names declared in `source`, in order.
#[must_use]
pub fn symbols(source: &str) -> Vec<String> {
    let Some(re) = symbol_regex() else {
        return Vec::new();
    };
    source
        .lines()
        .filter(|line| !line.starts_with(char::is_whitespace) || line.starts_with("    def "))
        .filter_map(|line| re.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_owned()))
        .collect()
}

#[derive(Debug)]
struct Cached {
    files: Vec<String>,
    budget: usize,
    text: String,
}

/// Renders and caches repository summaries.
#[derive(Debug, Default)]
pub struct RepoMapper {
    cache: Mutex<Option<Cached>>,
}

impl RepoMapper {
    /// Create an empty mapper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary of `files` under `root` within `budget` tokens.
    ///
    /// Reuses the cached text when the file list and budget are unchanged.
    pub fn render(&self, root: &Path, files: &[String], budget: usize) -> String {
        if let Ok(cache) = self.cache.lock() {
            if let Some(cached) = cache.as_ref() {
                if cached.budget == budget && cached.files == files {
                    return cached.text.clone();
                }
            }
        }

        let text = render_map(root, files, budget);
        if let Ok(mut cache) = self.cache.lock() {
            *cache = Some(Cached {
                files: files.to_vec(),
                budget,
                text: text.clone(),
            });
        }
        text
    }

    /// Forget the cached summary.
    pub fn refresh(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = None;
        }
    }
}

fn render_map(root: &Path, files: &[String], budget: usize) -> String {
    let mut map = String::new();
    let mut used = 0;

    for rel in files {
        let path = root.join(rel);
        let readable = std::fs::metadata(&path).is_ok_and(|m| m.is_file() && m.len() <= MAX_FILE_BYTES);
        let names = if readable {
            std::fs::read_to_string(&path)
                .map(|source| symbols(&source))
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut section = format!("{rel}:\n");
        for name in names {
            section.push_str("│ ");
            section.push_str(&name);
            section.push('\n');
        }

        let cost = estimate_tokens(&section);
        if used + cost > budget {
            break;
        }
        used += cost;
        map.push_str(&section);
    }

    map
}
