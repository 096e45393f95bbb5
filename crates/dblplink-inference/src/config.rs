//! Scoring model configuration.
//!
//! Loaded from environment variables with defaults from
//! [`dblplink_core::defaults`].
//!
//! | Variable | Default |
//! |----------|---------|
//! | `SCORER_MODEL` | `Qwen/Qwen2.5-3B-Instruct` |
//! | `SCORER_REVISION` | `main` |
//! | `SCORER_MODEL_DIR` | unset (download from the Hub) |
//! | `SCORER_DTYPE` | `f32` |
//! | `SCORER_PAD_TOKEN` | `<\|endoftext\|>` |
//! | `SCORER_MAX_TOKENS` | `128` |

use std::env;
use std::path::PathBuf;

use tracing::debug;

use dblplink_core::defaults;

/// Configuration for the evidence scoring model.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerConfig {
    /// HuggingFace Hub repository id of the causal language model.
    pub model: String,
    /// Hub revision (branch, tag or commit).
    pub revision: String,
    /// Local directory holding `config.json`, `tokenizer.json` and the
    /// safetensors weights. When set, the Hub is not contacted.
    pub model_dir: Option<PathBuf>,
    /// Weight precision: `f32`, `f16` or `bf16`.
    pub dtype: String,
    /// Token used to right-pad batches.
    pub pad_token: String,
    /// Per-prompt token budget; longer prompts are truncated.
    pub max_tokens: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            model: defaults::SCORER_MODEL.to_string(),
            revision: defaults::SCORER_REVISION.to_string(),
            model_dir: None,
            dtype: defaults::SCORER_DTYPE.to_string(),
            pad_token: defaults::SCORER_PAD_TOKEN.to_string(),
            max_tokens: defaults::SCORER_MAX_TOKENS,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl ScorerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let config = Self {
            model: env_or("SCORER_MODEL", defaults::SCORER_MODEL),
            revision: env_or("SCORER_REVISION", defaults::SCORER_REVISION),
            model_dir: env::var("SCORER_MODEL_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            dtype: env_or("SCORER_DTYPE", defaults::SCORER_DTYPE),
            pad_token: env_or("SCORER_PAD_TOKEN", defaults::SCORER_PAD_TOKEN),
            max_tokens: env_parse("SCORER_MAX_TOKENS", defaults::SCORER_MAX_TOKENS),
        };
        debug!(?config, "Scorer configuration loaded");
        config
    }

    /// Read the model from a local directory instead of the Hub.
    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = Some(dir.into());
        self
    }

    /// Set the per-prompt token budget.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}
