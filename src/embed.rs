//! The embedding boundary (§1, §6): `embed(text) -> vector[D]`, a pure
//! function. `OnnxEmbedder` runs ONNX Runtime + HuggingFace tokenizers
//! locally (all-MiniLM-L6-v2, 384 dims, mean-pooled and L2-normalized)
//! for production, with a deterministic mock for tests and offline
//! pipelines.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub const EMBEDDING_DIM: usize = 384;
const MAX_SEQ_LEN: usize = 256;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dim(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Cosine similarity between two equal-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vec.iter().map(|x| x / norm).collect()
    } else {
        vec.to_vec()
    }
}

/// Local ONNX embedding model (all-MiniLM-L6-v2). Downloads the model
/// and tokenizer from HuggingFace on first use, then runs entirely on
/// CPU - no network calls once cached.
pub struct OnnxEmbedder {
    session: std::sync::Mutex<ort::session::Session>,
    tokenizer: tokenizers::Tokenizer,
}

impl OnnxEmbedder {
    pub fn load(model_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(model_dir)?;
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() || !tokenizer_path.exists() {
            Self::download_model(model_dir)?;
        }

        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer: {e}"))?;

        Ok(Self {
            session: std::sync::Mutex::new(session),
            tokenizer,
        })
    }

    fn download_model(model_dir: &Path) -> Result<()> {
        use hf_hub::api::sync::Api;

        let api = Api::new()?;
        let repo = api.model("sentence-transformers/all-MiniLM-L6-v2".to_string());

        let model_path = repo.get("onnx/model.onnx")?;
        std::fs::copy(&model_path, model_dir.join("model.onnx"))?;

        let tokenizer_path = repo.get("tokenizer.json")?;
        std::fs::copy(&tokenizer_path, model_dir.join("tokenizer.json"))?;

        Ok(())
    }

    fn mean_pool_flat(data: &[f32], seq_len: usize, embed_dim: usize) -> Vec<f32> {
        let mut result = vec![0.0f32; EMBEDDING_DIM];
        let dim = embed_dim.min(EMBEDDING_DIM);
        for i in 0..seq_len {
            for j in 0..dim {
                let idx = i * embed_dim + j;
                if idx < data.len() {
                    result[j] += data[idx];
                }
            }
        }
        for v in result.iter_mut() {
            *v /= seq_len.max(1) as f32;
        }
        result
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("tokenization failed: {e}"))?;

        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = vec![0i64; ids.len()];

        let len = ids.len().min(MAX_SEQ_LEN).max(1);
        let ids = &ids[..len];
        let attention_mask = &attention_mask[..len];
        let token_type_ids = &token_type_ids[..len];

        let input_ids = ndarray::Array2::from_shape_vec((1, len), ids.to_vec())?;
        let attention = ndarray::Array2::from_shape_vec((1, len), attention_mask.to_vec())?;
        let token_types = ndarray::Array2::from_shape_vec((1, len), token_type_ids.to_vec())?;

        let mut session = self.session.lock().unwrap();
        let outputs = session.run(ort::inputs![
            "input_ids" => ort::value::Tensor::from_array(input_ids)?,
            "attention_mask" => ort::value::Tensor::from_array(attention)?,
            "token_type_ids" => ort::value::Tensor::from_array(token_types)?,
        ])?;

        let output = outputs
            .get("last_hidden_state")
            .or_else(|| outputs.get("token_embeddings"))
            .ok_or_else(|| anyhow!("no embedding output found"))?;

        let (shape, data) = output.try_extract_tensor::<f32>()?;
        let embed_dim = if shape.len() >= 3 {
            shape[2] as usize
        } else {
            EMBEDDING_DIM
        };
        let data_vec: Vec<f32> = data.to_vec();
        drop(outputs);

        let pooled = Self::mean_pool_flat(&data_vec, len, embed_dim);
        Ok(l2_normalize(&pooled))
    }
}

/// Deterministic hash-based embedder for tests and offline pipelines:
/// same text always yields the same vector, unrelated texts yield
/// near-orthogonal vectors often enough to exercise ranking logic.
pub struct MockEmbedder {
    dim: usize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self { dim: EMBEDDING_DIM }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vec = vec![0.0f32; self.dim];
        let hash = crate::hash::stable_hash(text);
        let bytes = hash.as_bytes();
        for (i, slot) in vec.iter_mut().enumerate() {
            let b = bytes[i % bytes.len()] as f32;
            *slot = (b / 255.0) * 2.0 - 1.0;
        }
        Ok(l2_normalize(&vec))
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

pub fn get_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("counsel-engine")
        .join("models")
        .join("minilm")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[tokio::test]
    async fn mock_embedder_is_deterministic() {
        let e = MockEmbedder::new();
        let v1 = e.embed("hello world").await.unwrap();
        let v2 = e.embed("hello world").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn mock_embedder_differs_across_texts() {
        let e = MockEmbedder::new();
        let v1 = e.embed("hello").await.unwrap();
        let v2 = e.embed("goodbye").await.unwrap();
        assert_ne!(v1, v2);
    }
}
