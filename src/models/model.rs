//! Resolved model descriptor and its tunable extra parameters.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{AppError, Result};

/// Reasoning effort values accepted by `/reasoning-effort`.
pub const REASONING_EFFORTS: [&str; 4] = ["high", "medium", "low", "none"];

/// Pricing and capacity facts reported to the controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    /// Dollars per prompt token.
    pub input_cost_per_token: f64,
    /// Dollars per completion token.
    pub output_cost_per_token: f64,
    /// Context window, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_input_tokens: Option<u64>,
    /// Output limit, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
}

/// Model resolved from the registry for use by a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    /// Model name sent to the API.
    pub name: String,
    /// Cheaper model used for summaries and commit messages.
    pub weak_model_name: String,
    /// Editor model used by the second phase of architect mode.
    pub editor: Option<Box<ModelDescriptor>>,
    /// Default edit format.
    pub edit_format: String,
    /// Edit format used by the editor sub-session.
    pub editor_edit_format: String,
    /// Pricing and capacity.
    pub info: ModelInfo,
    /// Extra request parameters merged into every API call.
    pub extra_params: Map<String, Value>,
    /// Environment variables the model needs but which are unset.
    pub missing_keys: Vec<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Stream replies incrementally.
    pub use_streaming: bool,
    /// Whether the registry knew this model.
    pub known: bool,
}

impl ModelDescriptor {
    /// Current reasoning effort override, if any.
    #[must_use]
    pub fn reasoning_effort(&self) -> Option<String> {
        self.extra_params
            .get("extra_body")
            .and_then(|body| body.get("reasoning_effort"))
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    /// Set `extra_body.reasoning_effort`.
    pub fn set_reasoning_effort(&mut self, effort: &str) {
        let body = self
            .extra_params
            .entry("extra_body")
            .or_insert_with(|| Value::Object(Map::new()));
        if !body.is_object() {
            *body = Value::Object(Map::new());
        }
        if let Some(body) = body.as_object_mut() {
            body.insert("reasoning_effort".into(), Value::String(effort.to_owned()));
        }
    }

    /// Remove the reasoning effort override, keeping the rest of `extra_body`.
    pub fn clear_reasoning_effort(&mut self) {
        if let Some(body) = self
            .extra_params
            .get_mut("extra_body")
            .and_then(Value::as_object_mut)
        {
            body.remove("reasoning_effort");
        }
    }

    /// Raw thinking token budget; `None` when unset.
    #[must_use]
    pub fn raw_thinking_tokens(&self) -> Option<u64> {
        self.extra_params
            .get("thinking")
            .and_then(|thinking| thinking.get("budget_tokens"))
            .and_then(Value::as_u64)
    }

    /// Thinking token budget formatted for display (`8k`, `1.5M`).
    #[must_use]
    pub fn thinking_tokens(&self) -> Option<String> {
        self.raw_thinking_tokens()
            .filter(|budget| *budget > 0)
            .map(format_token_count)
    }

    /// Set the thinking budget from a user value such as `8k` or `2048`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if the value cannot be parsed.
    pub fn set_thinking_tokens(&mut self, raw: &str) -> Result<()> {
        let budget = parse_token_value(raw)?;
        self.extra_params.insert(
            "thinking".into(),
            json!({ "type": "enabled", "budget_tokens": budget }),
        );
        Ok(())
    }

    /// Remove thinking and reasoning parameters entirely.
    pub fn clear_thinking(&mut self) {
        self.extra_params.remove("reasoning");
        self.extra_params.remove("thinking");
    }

    /// Price of `tokens` prompt tokens.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn input_cost(&self, tokens: usize) -> f64 {
        tokens as f64 * self.info.input_cost_per_token
    }

    /// Price of a completed request.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn request_cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        prompt_tokens as f64 * self.info.input_cost_per_token
            + completion_tokens as f64 * self.info.output_cost_per_token
    }
}

/// Parse `8k`, `1.5M`, `2048` into a token count.
///
/// # Errors
///
/// Returns `AppError::InvalidInput` for empty, negative, or non-numeric values.
pub fn parse_token_value(raw: &str) -> Result<u64> {
    let value = raw.trim();
    let invalid = || AppError::InvalidInput(format!("invalid token value: {raw}"));

    let (number, multiplier) = match value.chars().last() {
        Some('k' | 'K') => (&value[..value.len() - 1], 1_024.0),
        Some('m' | 'M') => (&value[..value.len() - 1], 1_048_576.0),
        Some(_) => (value, 1.0),
        None => return Err(invalid()),
    };

    let parsed: f64 = number.trim().parse().map_err(|_| invalid())?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(invalid());
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok((parsed * multiplier).round() as u64)
}

/// Render a token count the way the controller displays it.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_token_count(count: u64) -> String {
    if count < 1_024 {
        return count.to_string();
    }
    if count < 1_048_576 {
        let value = count as f64 / 1_024.0;
        return trim_fraction(value, "k");
    }
    trim_fraction(count as f64 / 1_048_576.0, "M")
}

fn trim_fraction(value: f64, suffix: &str) -> String {
    if (value - value.round()).abs() < f64::EPSILON {
        format!("{value:.0}{suffix}")
    } else {
        format!("{value:.1}{suffix}")
    }
}
