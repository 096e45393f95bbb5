//! HuggingFace tokenizer adapter.
//!
//! Truncation and padding are done here rather than inside the
//! `tokenizers` pipeline, so the batch layout (right padding, real length
//! per row) is explicit and independent of what `tokenizer.json` configures.

use std::path::Path;

use tokenizers::utils::truncation::TruncationDirection;
use tokenizers::PostProcessor;
use tracing::info;

use dblplink_core::{Error, Result, TokenBatch, Tokenizer};

/// Tokenizer loaded from a HuggingFace `tokenizer.json`.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    pad_id: u32,
    name: String,
}

impl HfTokenizer {
    /// Load a tokenizer file, padding with `pad_token` (id 0 if unknown).
    pub fn from_file(path: &Path, pad_token: &str) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            Error::Inference(format!(
                "Failed to load tokenizer {}: {}",
                path.display(),
                e
            ))
        })?;
        let name = path
            .parent()
            .and_then(|dir| dir.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or("tokenizer")
            .to_string();

        let tokenizer = Self::from_tokenizer(inner, pad_token, name)?;
        info!(
            "Loaded tokenizer: path={}, vocab_size={}, pad_id={}",
            path.display(),
            tokenizer.inner.get_vocab_size(true),
            tokenizer.pad_id
        );
        Ok(tokenizer)
    }

    /// Wrap an already built tokenizer, clearing its own truncation and padding.
    pub fn from_tokenizer(
        mut inner: tokenizers::Tokenizer,
        pad_token: &str,
        name: impl Into<String>,
    ) -> Result<Self> {
        inner
            .with_truncation(None)
            .map_err(|e| Error::Inference(format!("Failed to disable truncation: {}", e)))?;
        inner.with_padding(None);

        let pad_id = inner.token_to_id(pad_token).unwrap_or(0);
        Ok(Self {
            inner,
            pad_id,
            name: name.into(),
        })
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }
}

impl Tokenizer for HfTokenizer {
    fn encode_batch(&self, texts: &[String], max_length: usize) -> Result<TokenBatch> {
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self
            .inner
            .encode_batch(inputs, false)
            .map_err(|e| Error::Inference(format!("Tokenization failed: {}", e)))?;

        // Room is left for the special tokens the post-processor adds, so a
        // suffix token survives truncation.
        let added = self
            .inner
            .get_post_processor()
            .map_or(0, |processor| processor.added_tokens(false));
        let budget = max_length.saturating_sub(added);

        let mut sequences = Vec::with_capacity(encodings.len());
        for mut encoding in encodings {
            encoding.truncate(budget, 0, TruncationDirection::Right);
            let encoding = self
                .inner
                .post_process(encoding, None, true)
                .map_err(|e| Error::Inference(format!("Post-processing failed: {}", e)))?;
            let ids = encoding.get_ids();
            sequences.push(ids[..ids.len().min(max_length)].to_vec());
        }

        Ok(TokenBatch::from_sequences(sequences, self.pad_id))
    }

    fn token_id(&self, text: &str) -> Result<u32> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| Error::Inference(format!("Tokenization failed: {}", e)))?;
        encoding
            .get_ids()
            .first()
            .copied()
            .ok_or_else(|| Error::Inference(format!("'{}' encodes to no tokens", text)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
