//! Static model registry, merged once at startup with configured extras.

use std::env;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::models::model::{ModelDescriptor, ModelInfo};

fn default_edit_format() -> String {
    "diff".into()
}

fn default_true() -> bool {
    true
}

/// Settings for one model, as listed in the built-in table or `[[models]]`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ModelSettings {
    /// Model name.
    pub name: String,
    /// Default edit format.
    #[serde(default = "default_edit_format")]
    pub edit_format: String,
    /// Weak model paired with this one.
    #[serde(default)]
    pub weak_model_name: Option<String>,
    /// Editor model used in architect mode.
    #[serde(default)]
    pub editor_model_name: Option<String>,
    /// Edit format of the editor pass.
    #[serde(default)]
    pub editor_edit_format: Option<String>,
    /// Stream replies incrementally.
    #[serde(default = "default_true")]
    pub use_streaming: bool,
    /// Extra request parameters.
    #[serde(default)]
    pub extra_params: Option<Map<String, Value>>,
    /// Enable prompt caching.
    #[serde(default)]
    pub cache_control: bool,
    /// Dollars per prompt token.
    #[serde(default)]
    pub input_cost_per_token: f64,
    /// Dollars per completion token.
    #[serde(default)]
    pub output_cost_per_token: f64,
    /// Context window.
    #[serde(default)]
    pub max_input_tokens: Option<u64>,
    /// Output limit.
    #[serde(default)]
    pub max_output_tokens: Option<u64>,
    /// API key variable; falls back to the engine default.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl ModelSettings {
    fn builtin(
        name: &str,
        weak: &str,
        editor: Option<&str>,
        costs: (f64, f64),
        max_input_tokens: u64,
        api_key_env: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            edit_format: default_edit_format(),
            weak_model_name: Some(weak.into()),
            editor_model_name: editor.map(str::to_owned),
            editor_edit_format: Some("editor-diff".into()),
            use_streaming: true,
            extra_params: None,
            cache_control: false,
            input_cost_per_token: costs.0,
            output_cost_per_token: costs.1,
            max_input_tokens: Some(max_input_tokens),
            max_output_tokens: None,
            api_key_env: api_key_env.map(str::to_owned),
        }
    }
}

fn builtin_settings() -> Vec<ModelSettings> {
    vec![
        ModelSettings::builtin(
            "gpt-4o",
            "gpt-4o-mini",
            None,
            (2.5e-6, 1.0e-5),
            128_000,
            None,
        ),
        ModelSettings::builtin(
            "gpt-4o-mini",
            "gpt-4o-mini",
            None,
            (1.5e-7, 6.0e-7),
            128_000,
            None,
        ),
        ModelSettings::builtin(
            "gpt-4.1",
            "gpt-4.1-mini",
            None,
            (2.0e-6, 8.0e-6),
            1_047_576,
            None,
        ),
        ModelSettings::builtin(
            "gpt-4.1-mini",
            "gpt-4.1-mini",
            None,
            (4.0e-7, 1.6e-6),
            1_047_576,
            None,
        ),
        ModelSettings::builtin(
            "o3-mini",
            "gpt-4o-mini",
            Some("gpt-4o"),
            (1.1e-6, 4.4e-6),
            200_000,
            None,
        ),
        ModelSettings::builtin(
            "deepseek/deepseek-chat",
            "deepseek/deepseek-chat",
            None,
            (2.7e-7, 1.1e-6),
            64_000,
            Some("DEEPSEEK_API_KEY"),
        ),
        ModelSettings::builtin(
            "claude-3-7-sonnet-20250219",
            "claude-3-5-haiku-20241022",
            None,
            (3.0e-6, 1.5e-5),
            200_000,
            Some("ANTHROPIC_API_KEY"),
        ),
    ]
}

/// Immutable model registry.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    settings: Vec<ModelSettings>,
    default_key_env: String,
}

impl ModelRegistry {
    /// Build the registry from the built-in table plus configured extras.
    ///
    /// Unknown names are appended; known names only gain `cache_control`
    /// when the extra entry enables it.
    #[must_use]
    pub fn new(extra: &[ModelSettings], default_key_env: &str) -> Self {
        let mut settings = builtin_settings();

        for entry in extra {
            match settings.iter_mut().find(|known| known.name == entry.name) {
                Some(known) => {
                    if entry.cache_control && !known.cache_control {
                        known.cache_control = true;
                        info!(model = %entry.name, "enabled caching for existing model");
                    }
                }
                None => {
                    info!(model = %entry.name, "added model");
                    settings.push(entry.clone());
                }
            }
        }

        Self {
            settings,
            default_key_env: default_key_env.to_owned(),
        }
    }

    /// Settings for `name`, if registered.
    #[must_use]
    pub fn settings(&self, name: &str) -> Option<&ModelSettings> {
        self.settings.iter().find(|entry| entry.name == name)
    }

    /// Sorted, de-duplicated model names for autocompletion.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.settings.iter().map(|s| s.name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    /// Resolve a main model with optional weak and editor overrides.
    #[must_use]
    pub fn resolve(&self, name: &str, weak: Option<&str>, editor: Option<&str>) -> ModelDescriptor {
        let mut descriptor = self.describe(name);

        if let Some(weak) = weak.filter(|w| !w.is_empty()) {
            weak.clone_into(&mut descriptor.weak_model_name);
        }

        let editor_name = editor
            .filter(|e| !e.is_empty())
            .map(str::to_owned)
            .or_else(|| self.settings(name).and_then(|s| s.editor_model_name.clone()));
        descriptor.editor = editor_name.map(|editor| Box::new(self.describe(&editor)));

        descriptor
    }

    /// Warnings worth surfacing for `model`.
    #[must_use]
    pub fn sanity_warnings(&self, model: &ModelDescriptor) -> Vec<String> {
        let mut warnings = Vec::new();

        if !model.known {
            warnings.push(format!(
                "Warning for {}: Unknown context window size and costs, using sane defaults.",
                model.name
            ));
        }

        if !model.missing_keys.is_empty() {
            let keys: Vec<String> = model
                .missing_keys
                .iter()
                .map(|key| format!("- {key}: Not set"))
                .collect();
            warnings.push(format!(
                "Warning: {} expects these environment variables\n{}",
                model.name,
                keys.join("\n")
            ));
        }

        warnings
    }

    fn describe(&self, name: &str) -> ModelDescriptor {
        let settings = self.settings(name);

        let api_key_env = settings
            .and_then(|s| s.api_key_env.clone())
            .unwrap_or_else(|| self.default_key_env.clone());
        let missing_keys = match env::var(&api_key_env) {
            Ok(value) if !value.trim().is_empty() => Vec::new(),
            _ => vec![api_key_env.clone()],
        };

        match settings {
            Some(s) => ModelDescriptor {
                name: s.name.clone(),
                weak_model_name: s.weak_model_name.clone().unwrap_or_else(|| s.name.clone()),
                editor: None,
                edit_format: s.edit_format.clone(),
                editor_edit_format: s
                    .editor_edit_format
                    .clone()
                    .unwrap_or_else(|| "editor-diff".into()),
                info: ModelInfo {
                    input_cost_per_token: s.input_cost_per_token,
                    output_cost_per_token: s.output_cost_per_token,
                    max_input_tokens: s.max_input_tokens,
                    max_output_tokens: s.max_output_tokens,
                },
                extra_params: s.extra_params.clone().unwrap_or_default(),
                missing_keys,
                api_key_env,
                use_streaming: s.use_streaming,
                known: true,
            },
            None => ModelDescriptor {
                name: name.to_owned(),
                weak_model_name: name.to_owned(),
                editor: None,
                edit_format: default_edit_format(),
                editor_edit_format: "editor-diff".into(),
                info: ModelInfo::default(),
                extra_params: Map::new(),
                missing_keys,
                api_key_env,
                use_streaming: true,
                known: false,
            },
        }
    }
}
