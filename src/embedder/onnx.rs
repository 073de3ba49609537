//! In-process embedder backed by ONNX Runtime. Loads a sentence-transformer
//! encoder (e.g. multilingual-e5-small exported to ONNX), runs inference,
//! applies attention-masked mean pooling, and L2-normalizes the result.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;

use super::tokenizer::EncoderTokenizer;
use super::EmbedderError;

pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: EncoderTokenizer,
    model_name: String,
    dimension: usize,
}

impl OnnxEmbedder {
    /// Load `model.onnx` + `tokenizer.json` from the given directory.
    pub fn new(model_dir: &Path, dimension: usize) -> Result<Self, EmbedderError> {
        let model_path = model_dir.join("model.onnx");
        if !model_path.exists() {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "model.onnx not found in {}",
                model_dir.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("session builder: {e}")))?
            .with_intra_threads(4)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("model load: {e}")))?;

        let tokenizer = EncoderTokenizer::from_dir(model_dir)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("tokenizer: {e}")))?;

        let model_name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::info!(
            "ONNX embedder ready: {} (dim={dimension}, vocab={})",
            model_path.display(),
            tokenizer.vocab_size()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model_name,
            dimension,
        })
    }

    /// Model directory name, used to pick embedding task prefixes.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let tokens = self
            .tokenizer
            .tokenize(text)
            .map_err(|e| EmbedderError::InferenceFailed(format!("tokenization: {e}")))?;
        let seq_len = tokens.input_ids.len();

        let input_ids = Tensor::from_array(([1usize, seq_len], tokens.input_ids.clone()))
            .map_err(|e| EmbedderError::InferenceFailed(format!("input_ids: {e}")))?;
        let attention_mask =
            Tensor::from_array(([1usize, seq_len], tokens.attention_mask.clone()))
                .map_err(|e| EmbedderError::InferenceFailed(format!("attention_mask: {e}")))?;
        let token_type_ids = Tensor::from_array(([1usize, seq_len], vec![0i64; seq_len]))
            .map_err(|e| EmbedderError::InferenceFailed(format!("token_type_ids: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbedderError::InferenceFailed(format!("lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ])
            .map_err(|e| EmbedderError::InferenceFailed(format!("inference: {e}")))?;

        // Output shape [1, seq_len, hidden_size], flattened.
        let (_shape, hidden_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("output extraction: {e}")))?;

        let pooled = mean_pooling(hidden_data, &tokens.attention_mask, seq_len, self.dimension);
        Ok(l2_normalize(&pooled))
    }

    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Mean pooling over hidden states weighted by the attention mask.
/// `hidden_data` is flat with shape `[1, seq_len, hidden_size]`.
fn mean_pooling(
    hidden_data: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut result = vec![0.0f32; hidden_size];
    let mut mask_sum = 0.0f32;

    for t in 0..seq_len {
        let mask = attention_mask[t] as f32;
        mask_sum += mask;

        for h in 0..hidden_size {
            result[h] += hidden_data[t * hidden_size + h] * mask;
        }
    }

    if mask_sum > 0.0 {
        for v in &mut result {
            *v /= mask_sum;
        }
    }

    result
}

fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm_sq: f32 = vec.iter().map(|v| v * v).sum();
    if norm_sq == 0.0 {
        return vec.to_vec();
    }
    let inv_norm = 1.0 / norm_sq.sqrt();
    vec.iter().map(|v| v * inv_norm).collect()
}
