//! Thin wrapper around the HuggingFace `tokenizers` crate for BERT-style
//! encoder models, producing input IDs and attention masks for ONNX.

use std::path::Path;

use anyhow::Result;
use tokenizers::Tokenizer;

const MAX_SEQUENCE_LENGTH: usize = 512;

pub struct EncoderTokenizer {
    inner: Tokenizer,
}

/// Output of one tokenization.
#[derive(Debug, Clone)]
pub struct TokenizedText {
    pub input_ids: Vec<i64>,
    /// 1 for real tokens, 0 for padding.
    pub attention_mask: Vec<i64>,
}

impl EncoderTokenizer {
    /// Load `tokenizer.json` from the model directory.
    pub fn from_dir(model_dir: &Path) -> Result<Self> {
        let tokenizer_path = model_dir.join("tokenizer.json");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {}",
            model_dir.display()
        );

        let mut inner = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        let _ = inner.with_truncation(Some(tokenizers::TruncationParams {
            max_length: MAX_SEQUENCE_LENGTH,
            ..Default::default()
        }));

        Ok(Self { inner })
    }

    pub fn tokenize(&self, text: &str) -> Result<TokenizedText> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("failed to encode text: {e}"))?;

        Ok(TokenizedText {
            input_ids: encoding.get_ids().iter().map(|&id| id as i64).collect(),
            attention_mask: encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect(),
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tokenizer_file() {
        assert!(EncoderTokenizer::from_dir(Path::new("/nonexistent")).is_err());
    }

    /// Requires real model files; run with `cargo test -- --ignored`.
    #[test]
    #[ignore]
    fn test_tokenize_with_real_model() {
        let model_dir = Path::new("models/multilingual-e5-small");
        if !model_dir.join("tokenizer.json").exists() {
            return;
        }

        let tokenizer = EncoderTokenizer::from_dir(model_dir).unwrap();
        let output = tokenizer.tokenize("Hello, world!").unwrap();
        assert!(!output.input_ids.is_empty());
        assert_eq!(output.input_ids.len(), output.attention_mask.len());
    }
}
