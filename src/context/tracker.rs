//! Derived-artifact broadcasts for the tracked file set.

use std::collections::BTreeMap;
use std::ops::BitOr;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::context::autocomplete::{initial_words, TokenizePool};
use crate::engine::Engine;
use crate::io::{is_image_file, ConnectorIo};
use crate::models::{ChatMessage, ModelRegistry, Session};
use crate::protocol::{ModelsUpdate, OutboundMessage, TokenCost, TokensInfo};

/// Connector-level reasoning settings used when the model carries none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelOverrides {
    /// Reasoning effort fallback.
    pub reasoning_effort: Option<String>,
    /// Thinking tokens fallback.
    pub thinking_tokens: Option<String>,
}

/// Which derived artifacts to rebroadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recompute {
    /// `update-context-files`.
    pub context_files: bool,
    /// `tokens-info`.
    pub tokens: bool,
    /// `update-repo-map`.
    pub repo_map: bool,
    /// `update-autocompletion`.
    pub autocompletion: bool,
    /// `set-models`.
    pub models: bool,
}

impl Recompute {
    /// Nothing.
    pub const NONE: Self = Self {
        context_files: false,
        tokens: false,
        repo_map: false,
        autocompletion: false,
        models: false,
    };
    /// Context files only.
    pub const CONTEXT_FILES: Self = Self {
        context_files: true,
        ..Self::NONE
    };
    /// Tokens info only.
    pub const TOKENS: Self = Self {
        tokens: true,
        ..Self::NONE
    };
    /// Repo map only.
    pub const REPO_MAP: Self = Self {
        repo_map: true,
        ..Self::NONE
    };
    /// Autocompletion only.
    pub const AUTOCOMPLETION: Self = Self {
        autocompletion: true,
        ..Self::NONE
    };
    /// Models only.
    pub const MODELS: Self = Self {
        models: true,
        ..Self::NONE
    };

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self == Self::NONE
    }
}

impl BitOr for Recompute {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            context_files: self.context_files || rhs.context_files,
            tokens: self.tokens || rhs.tokens,
            repo_map: self.repo_map || rhs.repo_map,
            autocompletion: self.autocompletion || rhs.autocompletion,
            models: self.models || rhs.models,
        }
    }
}

/// Recomputes and broadcasts what the controller derives from a session.
pub struct ContextTracker {
    engine: Arc<dyn Engine>,
    io: Arc<ConnectorIo>,
    models: Arc<ModelRegistry>,
    pool: TokenizePool,
}

impl std::fmt::Debug for ContextTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextTracker")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl ContextTracker {
    /// Create a tracker with a tokenizer pool of `workers`.
    #[must_use]
    pub fn new(
        engine: Arc<dyn Engine>,
        io: Arc<ConnectorIo>,
        models: Arc<ModelRegistry>,
        workers: usize,
    ) -> Self {
        Self {
            engine,
            io,
            models,
            pool: TokenizePool::new(workers),
        }
    }

    /// Broadcast the selected artifacts in a fixed order.
    pub async fn recompute(&mut self, session: &Session, what: Recompute, overrides: &ModelOverrides) {
        if what.context_files {
            self.send_context_files(session);
        }
        if what.models {
            self.send_models(session, overrides);
        }
        if what.tokens {
            self.send_tokens_info(session).await;
        }
        if what.repo_map {
            self.send_repo_map(session).await;
        }
        if what.autocompletion {
            self.send_autocompletion(session).await;
        }
    }

    /// `update-context-files`: editable files then read-only files.
    pub fn send_context_files(&self, session: &Session) {
        self.io.outbound().message(&OutboundMessage::UpdateContextFiles {
            files: session.context_entries(),
        });
    }

    /// `set-models` for the session's main model.
    pub fn send_models(&self, session: &Session, overrides: &ModelOverrides) {
        let model = &session.model;
        let error = (!model.missing_keys.is_empty())
            .then(|| format!("Missing keys for the model: {}", model.missing_keys.join(", ")));

        self.io.outbound().message(&OutboundMessage::SetModels(ModelsUpdate {
            main_model: model.name.clone(),
            weak_model: model.weak_model_name.clone(),
            reasoning_effort: model
                .reasoning_effort()
                .or_else(|| overrides.reasoning_effort.clone()),
            thinking_tokens: model
                .thinking_tokens()
                .or_else(|| overrides.thinking_tokens.clone()),
            edit_format: session.edit_format.clone(),
            info: model.info.clone(),
            error,
        }));
    }

    /// `update-repo-map`, without the prompt prefix. Nothing is sent when
    /// the engine produces no map.
    pub async fn send_repo_map(&self, session: &Session) {
        let Some(map) = self.engine.repo_map(session, &[]).await else {
            debug!("no repo map to send");
            return;
        };
        let prefix = self.engine.repo_content_prefix();
        let map = map.strip_prefix(prefix).unwrap_or(&map).to_owned();
        self.io
            .outbound()
            .message(&OutboundMessage::UpdateRepoMap { repo_map: map });
    }

    /// `tokens-info`: system prompt, history, repo map and every tracked file.
    #[instrument(skip_all, fields(session = %session.id))]
    pub async fn send_tokens_info(&self, session: &Session) {
        let info = self.tokens_info(session).await;
        self.io
            .outbound()
            .message(&OutboundMessage::TokensInfo { info });
    }

    /// Compute the breakdown sent by [`ContextTracker::send_tokens_info`].
    pub async fn tokens_info(&self, session: &Session) -> TokensInfo {
        let model = &session.model;
        let priced = |tokens: usize| TokenCost {
            tokens,
            cost: model.input_cost(tokens),
        };

        let system = self.engine.system_prompt(session);
        let system_messages = priced(self.engine.token_count(model, &system));

        let history: Vec<&ChatMessage> = session.all_messages().collect();
        let history_tokens = history
            .iter()
            .map(|message| self.engine.token_count(model, &message.content))
            .sum();
        let chat_history = priced(history_tokens);

        let editable = session.editable().to_vec();
        let repo_map = match self.engine.repo_map(session, &editable).await {
            Some(map) => priced(self.engine.token_count(model, &map)),
            None => priced(0),
        };

        let mut files = BTreeMap::new();
        for rel in session.editable() {
            let path = session.abs_path(rel);
            let tokens = if is_image_file(&path) {
                self.engine.image_token_count(&path)
            } else {
                match tokio::fs::read_to_string(&path).await {
                    Ok(content) => self.engine.token_count(model, &fenced(rel, &content)),
                    Err(_) => 0,
                }
            };
            files.insert(rel.clone(), priced(tokens));
        }
        for rel in session.read_only() {
            let path = session.abs_path(rel);
            if is_image_file(&path) {
                continue;
            }
            if let Ok(content) = tokio::fs::read_to_string(&path).await {
                let tokens = self.engine.token_count(model, &fenced(rel, &content));
                files.insert(rel.clone(), priced(tokens));
            }
        }

        TokensInfo {
            system_messages,
            chat_history,
            repo_map,
            files,
        }
    }

    /// `update-autocompletion`: file names now, identifiers once the pool
    /// finishes.
    pub async fn send_autocompletion(&mut self, session: &Session) {
        self.pool.cancel_current();
        let tracked = session.tracked_paths();
        let all_files = self.engine.all_files(session.root()).await;
        let models = self.models.names();
        let words = initial_words(&tracked);

        let outbound = self.io.outbound().clone();
        outbound.message(&OutboundMessage::UpdateAutocompletion {
            words: words.clone(),
            all_files: all_files.clone(),
            models: models.clone(),
        });

        if tracked.is_empty() {
            return;
        }

        self.pool
            .submit(session.root().to_path_buf(), tracked, move |tokens| {
                let mut merged = words;
                merged.extend(tokens);
                outbound.message(&OutboundMessage::UpdateAutocompletion {
                    words: merged,
                    all_files,
                    models,
                });
            });
    }

    /// Tokenizer jobs not yet reaped.
    #[must_use]
    pub fn pending_tokenizations(&self) -> usize {
        self.pool.in_flight()
    }

    /// Stop the tokenizer pool.
    pub async fn shutdown(&mut self) {
        self.pool.shutdown().await;
    }
}

fn fenced(rel: &str, content: &str) -> String {
    format!("{rel}\n```\n{content}```\n")
}
