//! Tokenization abstractions for the scoring model.
//!
//! A [`Tokenizer`] turns a batch of prompts into a rectangular, right-padded
//! [`TokenBatch`]. The batch keeps the attention mask so the scorer can
//! recover each sequence's true length and read the prediction at the last
//! real token rather than at a padding position.

use crate::error::Result;

/// Right-padded token ids and attention mask for a batch of sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenBatch {
    pub input_ids: Vec<Vec<u32>>,
    pub attention_mask: Vec<Vec<u32>>,
}

impl TokenBatch {
    /// Build a batch from unpadded sequences, right-padding with `pad_id`.
    pub fn from_sequences(sequences: Vec<Vec<u32>>, pad_id: u32) -> Self {
        let padded_len = sequences.iter().map(Vec::len).max().unwrap_or(0);
        let mut input_ids = Vec::with_capacity(sequences.len());
        let mut attention_mask = Vec::with_capacity(sequences.len());

        for mut ids in sequences {
            let real = ids.len();
            let mut mask = vec![1u32; real];
            ids.resize(padded_len, pad_id);
            mask.resize(padded_len, 0);
            input_ids.push(ids);
            attention_mask.push(mask);
        }

        Self {
            input_ids,
            attention_mask,
        }
    }

    /// Number of sequences in the batch.
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Length every sequence is padded to.
    pub fn padded_len(&self) -> usize {
        self.input_ids.first().map(Vec::len).unwrap_or(0)
    }

    /// Number of real (unpadded) tokens in each sequence.
    pub fn sequence_lengths(&self) -> Vec<usize> {
        self.attention_mask
            .iter()
            .map(|mask| mask.iter().map(|&m| m as usize).sum())
            .collect()
    }

    /// Index of the last real token of each sequence; the model's output at
    /// this position predicts the token that follows the sequence.
    pub fn last_token_positions(&self) -> Vec<usize> {
        self.sequence_lengths()
            .into_iter()
            .map(|len| len.saturating_sub(1))
            .collect()
    }
}

/// Trait for tokenization operations.
///
/// Implementations must be thread-safe; one instance is loaded at startup
/// and shared read-only across requests.
pub trait Tokenizer: Send + Sync {
    /// Encode a batch of texts, truncating each to `max_length` tokens and
    /// right-padding to the longest sequence.
    fn encode_batch(&self, texts: &[String], max_length: usize) -> Result<TokenBatch>;

    /// First token id of `text` encoded without special tokens.
    fn token_id(&self, text: &str) -> Result<u32>;

    /// Get the name/identifier of this tokenizer.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sequences_pads_right() {
        let batch = TokenBatch::from_sequences(vec![vec![5, 6, 7], vec![8]], 0);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.padded_len(), 3);
        assert_eq!(batch.input_ids[1], vec![8, 0, 0]);
        assert_eq!(batch.attention_mask[0], vec![1, 1, 1]);
        assert_eq!(batch.attention_mask[1], vec![1, 0, 0]);
    }

    #[test]
    fn test_sequence_lengths_and_positions() {
        let batch = TokenBatch::from_sequences(vec![vec![1, 2, 3, 4], vec![1, 2]], 99);
        assert_eq!(batch.sequence_lengths(), vec![4, 2]);
        assert_eq!(batch.last_token_positions(), vec![3, 1]);
    }

    #[test]
    fn test_empty_batch() {
        let batch = TokenBatch::from_sequences(vec![], 0);
        assert!(batch.is_empty());
        assert_eq!(batch.padded_len(), 0);
        assert!(batch.last_token_positions().is_empty());
    }
}
