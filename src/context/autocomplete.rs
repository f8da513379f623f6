//! Autocompletion vocabulary and its background tokenizer pool.
//!
//! Tokenization reads every tracked file, so it runs on blocking threads
//! behind a semaphore sized by `tokenize_workers`. Each submission cancels
//! the previous job; a cancelled job never reports its words.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use futures_util::FutureExt;
use regex::Regex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::io::is_image_file;

const MAX_FILE_BYTES: u64 = 1024 * 1024;

fn identifier_regex() -> Option<&'static Regex> {
    static IDENT: OnceLock<Option<Regex>> = OnceLock::new();
    IDENT
        .get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]{2,}").ok())
        .as_ref()
}

/// File names (last path segment) of `files`, the immediate vocabulary.
#[must_use]
pub fn initial_words(files: &[String]) -> Vec<String> {
    files
        .iter()
        .map(|path| path.rsplit('/').next().unwrap_or(path).to_owned())
        .collect()
}

/// Identifiers found in `files` under `root`, sorted and de-duplicated.
///
/// Checks `cancel` between files and returns what it has so far once set.
/// Images, oversized and unreadable files are skipped.
#[must_use]
pub fn tokenize_files(root: &Path, files: &[String], cancel: &CancellationToken) -> Vec<String> {
    let Some(re) = identifier_regex() else {
        return Vec::new();
    };
    let mut words = BTreeSet::new();

    for rel in files {
        if cancel.is_cancelled() {
            break;
        }
        let path = root.join(rel);
        if is_image_file(&path) {
            continue;
        }
        if std::fs::metadata(&path).map_or(true, |m| m.len() > MAX_FILE_BYTES) {
            continue;
        }
        let Ok(source) = std::fs::read_to_string(&path) else {
            continue;
        };
        words.extend(re.find_iter(&source).map(|m| m.as_str().to_owned()));
    }

    words.into_iter().collect()
}

/// Bounded, cancellable tokenizer pool.
#[derive(Debug)]
pub struct TokenizePool {
    permits: Arc<Semaphore>,
    current: Option<CancellationToken>,
    tasks: JoinSet<()>,
}

impl TokenizePool {
    /// Create a pool running at most `workers` jobs at once.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            current: None,
            tasks: JoinSet::new(),
        }
    }

    /// Tokenize `files` in the background and pass the words to `on_done`.
    ///
    /// Cancels the previous job first. `on_done` is not called when this
    /// job is superseded before it finishes.
    pub fn submit<F>(&mut self, root: PathBuf, files: Vec<String>, on_done: F)
    where
        F: FnOnce(Vec<String>) + Send + 'static,
    {
        self.cancel_current();

        let token = CancellationToken::new();
        self.current = Some(token.clone());
        let permits = Arc::clone(&self.permits);

        self.tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            if token.is_cancelled() {
                return;
            }

            let job_token = token.clone();
            let words = match tokio::task::spawn_blocking(move || {
                tokenize_files(&root, &files, &job_token)
            })
            .await
            {
                Ok(words) => words,
                Err(err) => {
                    warn!(error = %err, "tokenization task failed");
                    return;
                }
            };

            if token.is_cancelled() {
                debug!("tokenization superseded, dropping result");
                return;
            }
            on_done(words);
        });
    }

    /// Cancel the in-flight job, if any, so its words are never delivered.
    pub fn cancel_current(&mut self) {
        self.reap();
        if let Some(previous) = self.current.take() {
            debug!("cancelling superseded tokenization");
            previous.cancel();
        }
    }

    /// Jobs spawned and not yet reaped.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel outstanding work and wait for running jobs to finish.
    pub async fn shutdown(&mut self) {
        if let Some(current) = self.current.take() {
            current.cancel();
        }
        self.permits.close();
        while let Some(result) = self.tasks.join_next().await {
            if let Err(err) = result {
                warn!(error = %err, "tokenization task ended abnormally");
            }
        }
        debug!("tokenizer pool shut down");
    }

    fn reap(&mut self) {
        while let Some(Some(result)) = self.tasks.join_next().now_or_never() {
            if let Err(err) = result {
                warn!(error = %err, "tokenization task ended abnormally");
            }
        }
    }
}
