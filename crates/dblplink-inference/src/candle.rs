//! In-process causal language model logits backend.
//!
//! Loads a Qwen2-architecture model with candle, from a local directory or
//! the HuggingFace Hub, once per process. Each call returns the
//! full-vocabulary logits at one requested position per sequence.
//!
//! Sequences are grouped by read position and every group runs as one
//! unpadded forward pass over its first `position + 1` tokens. Under causal
//! attention the hidden state at a position depends only on the tokens
//! before it, so this equals reading a right-padded batch at that position.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::qwen2::{Config, ModelForCausalLM};
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use dblplink_core::{Error, LogitsBackend, Result, TokenBatch};

use crate::config::ScorerConfig;

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
const SINGLE_WEIGHTS_FILE: &str = "model.safetensors";
const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";

fn model_err(e: candle_core::Error) -> Error {
    Error::Inference(format!("Scoring model failed: {}", e))
}

// =============================================================================
// MODEL FILES
// =============================================================================

/// Paths of everything needed to load the scoring model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Vec<PathBuf>,
}

#[derive(Deserialize)]
struct WeightIndex {
    weight_map: BTreeMap<String, String>,
}

/// Shard file names listed by a `model.safetensors.index.json`, sorted and
/// deduplicated.
pub fn weight_shards(index_json: &str) -> Result<Vec<String>> {
    let index: WeightIndex = serde_json::from_str(index_json)?;
    let shards: BTreeSet<String> = index.weight_map.into_values().collect();
    if shards.is_empty() {
        return Err(Error::Inference(
            "Weight index lists no safetensors shards".to_string(),
        ));
    }
    Ok(shards.into_iter().collect())
}

impl ModelFiles {
    /// Resolve files from `model_dir` when configured, the Hub otherwise.
    pub fn resolve(config: &ScorerConfig) -> Result<Self> {
        match &config.model_dir {
            Some(dir) => Self::from_dir(dir),
            None => Self::from_hub(&config.model, &config.revision),
        }
    }

    /// Files of a model stored in a local directory.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let index = dir.join(WEIGHTS_INDEX_FILE);
        let weights = if index.is_file() {
            weight_shards(&std::fs::read_to_string(&index)?)?
                .into_iter()
                .map(|shard| dir.join(shard))
                .collect()
        } else {
            vec![dir.join(SINGLE_WEIGHTS_FILE)]
        };

        let files = Self {
            config: dir.join(CONFIG_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            weights,
        };
        for path in [&files.config, &files.tokenizer]
            .into_iter()
            .chain(files.weights.iter())
        {
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "Model file not found: {}",
                    path.display()
                )));
            }
        }
        Ok(files)
    }

    /// Download (or reuse from the local HuggingFace cache) a Hub model.
    pub fn from_hub(model: &str, revision: &str) -> Result<Self> {
        let api = Api::new().map_err(|e| {
            Error::Inference(format!("Failed to create HuggingFace API client: {}", e))
        })?;
        let repo = api.repo(Repo::with_revision(
            model.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));
        let fetch = |name: &str| {
            repo.get(name).map_err(|e| {
                Error::Inference(format!("Failed to download {} from {}: {}", name, model, e))
            })
        };

        let config = fetch(CONFIG_FILE)?;
        let tokenizer = fetch(TOKENIZER_FILE)?;
        let weights = match repo.get(WEIGHTS_INDEX_FILE) {
            Ok(index) => weight_shards(&std::fs::read_to_string(index)?)?
                .iter()
                .map(|shard| fetch(shard.as_str()))
                .collect::<Result<Vec<_>>>()?,
            Err(_) => vec![fetch(SINGLE_WEIGHTS_FILE)?],
        };

        debug!(
            model,
            revision,
            shard_count = weights.len(),
            "Model files available in cache"
        );
        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }
}

/// Parse a precision name into a candle dtype.
pub fn parse_dtype(name: &str) -> Result<DType> {
    match name.trim().to_ascii_lowercase().as_str() {
        "f32" => Ok(DType::F32),
        "f16" => Ok(DType::F16),
        "bf16" => Ok(DType::BF16),
        other => Err(Error::Config(format!(
            "Unsupported dtype '{}' (expected f32, f16 or bf16)",
            other
        ))),
    }
}

/// Sequence indices grouped by read position, positions ascending.
pub fn group_by_position(positions: &[usize]) -> Vec<(usize, Vec<usize>)> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &position) in positions.iter().enumerate() {
        groups.entry(position).or_default().push(row);
    }
    groups.into_iter().collect()
}

/// Reject positions outside the real (unpadded) part of their sequence.
fn check_positions(batch: &TokenBatch, positions: &[usize]) -> Result<()> {
    if positions.len() != batch.len() {
        return Err(Error::InvalidInput(format!(
            "{} positions for a batch of {}",
            positions.len(),
            batch.len()
        )));
    }
    for (row, &position) in positions.iter().enumerate() {
        if batch.attention_mask[row].get(position) != Some(&1) {
            return Err(Error::InvalidInput(format!(
                "Position {} is not a real token of sequence {}",
                position, row
            )));
        }
    }
    Ok(())
}

// =============================================================================
// BACKEND
// =============================================================================

/// Qwen2 causal language model running in-process.
pub struct CandleLogitsBackend {
    model: Arc<Mutex<ModelForCausalLM>>,
    device: Device,
    vocab_size: usize,
    name: String,
}

impl CandleLogitsBackend {
    /// Load the model weights named by `files`.
    pub fn load(files: &ModelFiles, name: impl Into<String>, dtype: DType) -> Result<Self> {
        let name = name.into();
        let device = Device::cuda_if_available(0).map_err(model_err)?;
        info!(
            "Loading scoring model: name={}, shards={}, dtype={:?}, device={:?}",
            name,
            files.weights.len(),
            dtype,
            device
        );

        let config: Config = serde_json::from_str(&std::fs::read_to_string(&files.config)?)?;
        let start = Instant::now();
        // SAFETY: the weight files are memory-mapped read-only and must not
        // change while the model is alive.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&files.weights, dtype, &device).map_err(model_err)?
        };
        let model = ModelForCausalLM::new(&config, vb).map_err(model_err)?;

        info!(
            vocab_size = config.vocab_size,
            layers = config.num_hidden_layers,
            duration_ms = start.elapsed().as_millis() as u64,
            "Scoring model loaded"
        );
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            device,
            vocab_size: config.vocab_size,
            name,
        })
    }

    /// Load the model described by a scorer configuration.
    pub fn from_config(config: &ScorerConfig, files: &ModelFiles) -> Result<Self> {
        Self::load(files, config.model.clone(), parse_dtype(&config.dtype)?)
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}

fn forward_groups(
    model: &Mutex<ModelForCausalLM>,
    device: &Device,
    batch: &TokenBatch,
    positions: &[usize],
) -> Result<Vec<Vec<f32>>> {
    let mut model = model
        .lock()
        .map_err(|_| Error::Internal("Scoring model lock poisoned".to_string()))?;

    let mut rows: Vec<Option<Vec<f32>>> = vec![None; batch.len()];
    for (position, members) in group_by_position(positions) {
        let len = position + 1;
        let mut ids = Vec::with_capacity(members.len() * len);
        for &row in &members {
            ids.extend_from_slice(&batch.input_ids[row][..len]);
        }
        let input = Tensor::from_vec(ids, (members.len(), len), device).map_err(model_err)?;

        model.clear_kv_cache();
        // (group, 1, vocab): the prediction after the last input token.
        let logits = model
            .forward(&input, 0)
            .and_then(|t| t.squeeze(1))
            .and_then(|t| t.to_dtype(DType::F32))
            .and_then(|t| t.to_vec2::<f32>())
            .map_err(model_err)?;

        for (row, values) in members.into_iter().zip(logits) {
            rows[row] = Some(values);
        }
    }
    model.clear_kv_cache();

    rows.into_iter()
        .enumerate()
        .map(|(row, values)| {
            values.ok_or_else(|| Error::Inference(format!("No logits produced for sequence {}", row)))
        })
        .collect()
}

#[async_trait]
impl LogitsBackend for CandleLogitsBackend {
    #[instrument(skip(self, batch, positions), fields(subsystem = "inference", component = "candle", op = "next_token_logits", model = %self.name, input_count = batch.len()))]
    async fn next_token_logits(
        &self,
        batch: &TokenBatch,
        positions: &[usize],
    ) -> Result<Vec<Vec<f32>>> {
        if batch.is_empty() {
            return Ok(vec![]);
        }
        check_positions(batch, positions)?;

        let start = Instant::now();
        let model = Arc::clone(&self.model);
        let device = self.device.clone();
        let owned_batch = batch.clone();
        let owned_positions = positions.to_vec();
        let logits = tokio::task::spawn_blocking(move || {
            forward_groups(&model, &device, &owned_batch, &owned_positions)
        })
        .await
        .map_err(|e| Error::Internal(format!("Scoring task failed: {}", e)))??;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            padded_len = batch.padded_len(),
            group_count = group_by_position(positions).len(),
            duration_ms = elapsed,
            "Forward pass complete"
        );
        if elapsed > 10000 {
            warn!(
                duration_ms = elapsed,
                input_count = batch.len(),
                slow = true,
                "Slow forward pass"
            );
        }
        Ok(logits)
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"{}").unwrap();
    }

    #[test]
    fn test_group_by_position() {
        let groups = group_by_position(&[4, 2, 4, 7, 2]);
        assert_eq!(groups, vec![(2, vec![1, 4]), (4, vec![0, 2]), (7, vec![3])]);
        assert!(group_by_position(&[]).is_empty());
    }

    #[test]
    fn test_weight_shards_sorted_and_deduplicated() {
        let index = json!({
            "metadata": {"total_size": 6171877376u64},
            "weight_map": {
                "lm_head.weight": "model-00002-of-00002.safetensors",
                "model.embed_tokens.weight": "model-00001-of-00002.safetensors",
                "model.norm.weight": "model-00002-of-00002.safetensors"
            }
        });
        let shards = weight_shards(&index.to_string()).unwrap();
        assert_eq!(
            shards,
            vec![
                "model-00001-of-00002.safetensors",
                "model-00002-of-00002.safetensors"
            ]
        );
    }

    #[test]
    fn test_weight_shards_rejects_empty_or_malformed() {
        assert!(matches!(
            weight_shards(r#"{"weight_map": {}}"#),
            Err(Error::Inference(_))
        ));
        assert!(matches!(
            weight_shards("not json"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_parse_dtype() {
        assert_eq!(parse_dtype("f32").unwrap(), DType::F32);
        assert_eq!(parse_dtype("BF16").unwrap(), DType::BF16);
        assert_eq!(parse_dtype(" f16 ").unwrap(), DType::F16);
        assert!(matches!(parse_dtype("int4"), Err(Error::Config(_))));
    }

    #[test]
    fn test_model_dir_single_file() {
        let dir = tempfile::tempdir().unwrap();
        for name in [CONFIG_FILE, TOKENIZER_FILE, SINGLE_WEIGHTS_FILE] {
            touch(dir.path(), name);
        }
        let files = ModelFiles::from_dir(dir.path()).unwrap();
        assert_eq!(files.config, dir.path().join(CONFIG_FILE));
        assert_eq!(files.tokenizer, dir.path().join(TOKENIZER_FILE));
        assert_eq!(files.weights, vec![dir.path().join(SINGLE_WEIGHTS_FILE)]);
    }

    #[test]
    fn test_model_dir_sharded() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), CONFIG_FILE);
        touch(dir.path(), TOKENIZER_FILE);
        touch(dir.path(), "a.safetensors");
        touch(dir.path(), "b.safetensors");
        let index = json!({"weight_map": {"x": "b.safetensors", "y": "a.safetensors"}});
        std::fs::write(dir.path().join(WEIGHTS_INDEX_FILE), index.to_string()).unwrap();

        let files = ModelFiles::from_dir(dir.path()).unwrap();
        assert_eq!(
            files.weights,
            vec![dir.path().join("a.safetensors"), dir.path().join("b.safetensors")]
        );
    }

    #[test]
    fn test_model_dir_missing_weights_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), CONFIG_FILE);
        touch(dir.path(), TOKENIZER_FILE);
        let err = ModelFiles::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains(SINGLE_WEIGHTS_FILE)));
    }

    #[test]
    fn test_resolve_prefers_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        for name in [CONFIG_FILE, TOKENIZER_FILE, SINGLE_WEIGHTS_FILE] {
            touch(dir.path(), name);
        }
        let config = ScorerConfig::default().with_model_dir(dir.path());
        let files = ModelFiles::resolve(&config).unwrap();
        assert_eq!(files.config, dir.path().join(CONFIG_FILE));
    }

    #[test]
    fn test_positions_must_be_real_tokens() {
        let batch = TokenBatch::from_sequences(vec![vec![5, 6, 7], vec![8]], 0);
        assert!(check_positions(&batch, &[2, 0]).is_ok());
        assert!(matches!(
            check_positions(&batch, &[2, 1]),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            check_positions(&batch, &[2]),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            check_positions(&batch, &[3, 0]),
            Err(Error::InvalidInput(_))
        ));
    }
}
