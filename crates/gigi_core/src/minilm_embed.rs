use anyhow::{bail, Context, Result};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{LayerNorm, Linear, VarBuilder};
use serde::Deserialize;
use std::path::Path;

use crate::embed::EmbeddingProvider;

// ---------------------------------------------------------------------------
// Config (read from config.json, defaults match paraphrase-multilingual-MiniLM-L12-v2)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct MiniLmConfig {
    hidden_size: usize,
    intermediate_size: usize,
    num_attention_heads: usize,
    num_hidden_layers: usize,
    vocab_size: usize,
    max_position_embeddings: usize,
    type_vocab_size: usize,
    layer_norm_eps: f64,
}

impl Default for MiniLmConfig {
    fn default() -> Self {
        Self {
            hidden_size: 384,
            intermediate_size: 1536,
            num_attention_heads: 12,
            num_hidden_layers: 12,
            vocab_size: 250037,
            max_position_embeddings: 512,
            type_vocab_size: 2,
            layer_norm_eps: 1e-12,
        }
    }
}

impl MiniLmConfig {
    /// Uses `config.json` beside the weights when present.
    fn for_model(model_path: &Path) -> Result<Self> {
        let config_path = model_path.with_file_name("config.json");
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("read {}", config_path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("parse {}", config_path.display()))?;
        if config.num_attention_heads == 0 || config.hidden_size % config.num_attention_heads != 0
        {
            bail!(
                "hidden_size {} is not divisible by num_attention_heads {}",
                config.hidden_size,
                config.num_attention_heads
            );
        }
        Ok(config)
    }

    fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }
}

const BATCH_SIZE: usize = 32;
/// Sentence-transformers `max_seq_length` for the multilingual MiniLM.
const MAX_SEQ_LENGTH: usize = 128;

/// Cuts `ids` to `max_len` tokens, keeping the closing special token.
fn truncate_ids(mut ids: Vec<u32>, max_len: usize) -> Vec<u32> {
    if ids.len() > max_len && max_len > 0 {
        if let Some(&last) = ids.last() {
            ids.truncate(max_len - 1);
            ids.push(last);
        }
    }
    ids
}

// ---------------------------------------------------------------------------
// Encoder layer: masked self-attention + FFN, both post-norm
// ---------------------------------------------------------------------------

struct EncoderLayer {
    query: Linear,
    key: Linear,
    value: Linear,
    attn_output: Linear,
    attn_norm: LayerNorm,
    up: Linear,
    down: Linear,
    ffn_norm: LayerNorm,
    num_heads: usize,
    head_dim: usize,
}

impl EncoderLayer {
    fn load(vb: VarBuilder, config: &MiniLmConfig) -> Result<Self> {
        let h = config.hidden_size;
        let eps = config.layer_norm_eps;
        let attn = vb.pp("attention");

        Ok(Self {
            query: candle_nn::linear(h, h, attn.pp("self").pp("query"))?,
            key: candle_nn::linear(h, h, attn.pp("self").pp("key"))?,
            value: candle_nn::linear(h, h, attn.pp("self").pp("value"))?,
            attn_output: candle_nn::linear(h, h, attn.pp("output").pp("dense"))?,
            attn_norm: candle_nn::layer_norm(h, eps, attn.pp("output").pp("LayerNorm"))?,
            up: candle_nn::linear(h, config.intermediate_size, vb.pp("intermediate").pp("dense"))?,
            down: candle_nn::linear(config.intermediate_size, h, vb.pp("output").pp("dense"))?,
            ffn_norm: candle_nn::layer_norm(h, eps, vb.pp("output").pp("LayerNorm"))?,
            num_heads: config.num_attention_heads,
            head_dim: config.head_dim(),
        })
    }

    fn heads(&self, x: &Tensor, proj: &Linear) -> Result<Tensor> {
        let (batch, seq_len, _) = x.dims3()?;
        Ok(proj
            .forward(x)?
            .reshape((batch, seq_len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?)
    }

    /// `attn_bias` is (batch, 1, 1, seq): 0 for tokens, a large negative
    /// value for padding.
    fn forward(&self, x: &Tensor, attn_bias: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, hidden) = x.dims3()?;

        let q = self.heads(x, &self.query)?;
        let k = self.heads(x, &self.key)?;
        let v = self.heads(x, &self.value)?;

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let scores = q
            .matmul(&k.t()?.contiguous()?)?
            .affine(scale, 0.0)?
            .broadcast_add(attn_bias)?;
        let probs = candle_nn::ops::softmax_last_dim(&scores)?;
        let context = probs
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, seq_len, hidden))?;

        let x = self.attn_norm.forward(&(x + self.attn_output.forward(&context)?)?)?;
        let ffn = self.down.forward(&self.up.forward(&x)?.gelu_erf()?)?;
        Ok(self.ffn_norm.forward(&(x + ffn)?)?)
    }
}

// ---------------------------------------------------------------------------
// Full model
// ---------------------------------------------------------------------------

struct MiniLmModel {
    word_embeddings: Tensor,
    position_embeddings: Tensor,
    token_type_embedding: Tensor,
    embedding_norm: LayerNorm,
    layers: Vec<EncoderLayer>,
    config: MiniLmConfig,
}

impl MiniLmModel {
    fn load(path: &Path, device: &Device) -> Result<Self> {
        let config = MiniLmConfig::for_model(path)?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device) }
            .with_context(|| format!("map weights {}", path.display()))?;

        let emb_vb = vb.pp("embeddings");
        let word_embeddings = emb_vb
            .pp("word_embeddings")
            .get((config.vocab_size, config.hidden_size), "weight")?;
        let position_embeddings = emb_vb.pp("position_embeddings").get(
            (config.max_position_embeddings, config.hidden_size),
            "weight",
        )?;
        // Single-segment input: only token type 0 is ever used.
        let token_type_embedding = emb_vb
            .pp("token_type_embeddings")
            .get((config.type_vocab_size, config.hidden_size), "weight")?
            .get(0)?;
        let embedding_norm = candle_nn::layer_norm(
            config.hidden_size,
            config.layer_norm_eps,
            emb_vb.pp("LayerNorm"),
        )?;

        let layers = (0..config.num_hidden_layers)
            .map(|i| EncoderLayer::load(vb.pp("encoder").pp("layer").pp(i.to_string()), &config))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            word_embeddings,
            position_embeddings,
            token_type_embedding,
            embedding_norm,
            layers,
            config,
        })
    }

    /// Encodes a batch of token sequences into L2-normalized sentence vectors
    /// (mean pooling over non-padding tokens).
    fn forward(&self, sequences: &[&[u32]]) -> Result<Vec<Vec<f32>>> {
        let device = self.word_embeddings.device();
        let batch = sequences.len();
        let seq_len = sequences
            .iter()
            .map(|ids| ids.len())
            .max()
            .unwrap_or(0)
            .min(self.config.max_position_embeddings);
        if batch == 0 || seq_len == 0 {
            return Ok(Vec::new());
        }

        let mut ids = vec![0u32; batch * seq_len];
        let mut mask = vec![0f32; batch * seq_len];
        for (row, seq) in sequences.iter().enumerate() {
            for (col, &id) in seq.iter().take(seq_len).enumerate() {
                ids[row * seq_len + col] = id;
                mask[row * seq_len + col] = 1.0;
            }
        }
        let ids = Tensor::from_vec(ids, batch * seq_len, device)?;
        let mask = Tensor::from_vec(mask, (batch, seq_len), device)?;

        let positions = Tensor::arange(0u32, seq_len as u32, device)?;
        let embeddings = self
            .word_embeddings
            .index_select(&ids, 0)?
            .reshape((batch, seq_len, self.config.hidden_size))?
            .broadcast_add(&self.position_embeddings.index_select(&positions, 0)?)?
            .broadcast_add(&self.token_type_embedding)?;
        let mut hidden = self.embedding_norm.forward(&embeddings)?;

        let attn_bias = mask
            .affine(10_000.0, -10_000.0)?
            .reshape((batch, 1, 1, seq_len))?;
        for layer in &self.layers {
            hidden = layer.forward(&hidden, &attn_bias)?;
        }

        let token_mask = mask.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&token_mask)?.sum(1)?;
        let counts = token_mask.sum(1)?.maximum(1.0)?;
        let pooled = summed.broadcast_div(&counts)?;
        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(1e-12)?;

        Ok(pooled.broadcast_div(&norms)?.to_vec2::<f32>()?)
    }
}

// ---------------------------------------------------------------------------
// Public MiniLmEmbeddingProvider
// ---------------------------------------------------------------------------

/// Sentence encoder for BERT-shaped MiniLM checkpoints (safetensors).
pub struct MiniLmEmbeddingProvider {
    model: MiniLmModel,
    tokenizer: tokenizers::Tokenizer,
}

impl MiniLmEmbeddingProvider {
    pub fn load(model_path: &Path, tokenizer_path: &Path) -> Result<Self> {
        let device = Device::Cpu;
        let model = MiniLmModel::load(model_path, &device)?;

        let tokenizer = tokenizers::Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer {}: {e}", tokenizer_path.display()))?;

        tracing::info!(
            model = %model_path.display(),
            layers = model.config.num_hidden_layers,
            hidden = model.config.hidden_size,
            "loaded sentence encoder"
        );

        Ok(Self { model, tokenizer })
    }

    pub fn dim(&self) -> usize {
        self.model.config.hidden_size
    }

    fn token_ids(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;

        if encoding.get_special_tokens_mask().iter().all(|&special| special != 0) {
            bail!("nothing to embed in {text:?}");
        }

        let max_len = MAX_SEQ_LENGTH.min(self.model.config.max_position_embeddings);
        Ok(truncate_ids(encoding.get_ids().to_vec(), max_len))
    }
}

impl EmbeddingProvider for MiniLmEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .context("encoder returned no vector")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let ids = chunk
                .iter()
                .map(|text| self.token_ids(text))
                .collect::<Result<Vec<_>>>()?;
            let sequences: Vec<&[u32]> = ids.iter().map(Vec::as_slice).collect();
            out.extend(self.model.forward(&sequences)?);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "models/paraphrase-multilingual-MiniLM-L12-v2/model.safetensors";
    const TOKENIZER: &str = "models/paraphrase-multilingual-MiniLM-L12-v2/tokenizer.json";

    fn load_provider() -> Option<MiniLmEmbeddingProvider> {
        let base = Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .unwrap()
            .parent()
            .unwrap()
            .to_path_buf();
        let model_path = base.join(MODEL);
        let tokenizer_path = base.join(TOKENIZER);
        if !model_path.exists() || !tokenizer_path.exists() {
            eprintln!("Skipping: multilingual MiniLM model or tokenizer not found");
            return None;
        }
        Some(MiniLmEmbeddingProvider::load(&model_path, &tokenizer_path).unwrap())
    }

    #[test]
    fn default_config_is_multilingual_l12() {
        let config = MiniLmConfig::default();
        assert_eq!(config.num_hidden_layers, 12);
        assert_eq!(config.head_dim(), 32);
        assert_eq!(config.vocab_size, 250037);
    }

    #[test]
    fn config_json_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"num_hidden_layers": 6, "vocab_size": 30522, "model_type": "bert"}"#,
        )
        .unwrap();
        let config = MiniLmConfig::for_model(&dir.path().join("model.safetensors")).unwrap();
        assert_eq!(config.num_hidden_layers, 6);
        assert_eq!(config.vocab_size, 30522);
        assert_eq!(config.hidden_size, 384);
    }

    #[test]
    fn long_sequences_keep_the_closing_token() {
        // [CLS]=0, words 5.., [SEP]=2
        let mut ids = vec![0u32];
        ids.extend(5..305);
        ids.push(2);

        let cut = truncate_ids(ids, MAX_SEQ_LENGTH);
        assert_eq!(cut.len(), 128);
        assert_eq!(cut[0], 0);
        assert_eq!(cut[126], 130);
        assert_eq!(cut[127], 2);
    }

    #[test]
    fn short_sequences_are_untouched() {
        let ids = vec![0, 17, 42, 2];
        assert_eq!(truncate_ids(ids.clone(), MAX_SEQ_LENGTH), ids);
        assert_eq!(truncate_ids(ids.clone(), 4), ids);
    }

    #[test]
    fn config_rejects_uneven_heads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"hidden_size": 100, "num_attention_heads": 12}"#,
        )
        .unwrap();
        assert!(MiniLmConfig::for_model(&dir.path().join("model.safetensors")).is_err());
    }

    #[test]
    fn test_minilm_embed_basic() {
        let Some(provider) = load_provider() else {
            return;
        };
        let embedding = provider.embed("Qual o email do credenciamento?").unwrap();

        assert_eq!(embedding.len(), provider.dim());

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 0.01,
            "L2 norm should be ~1.0, got {norm}"
        );
    }

    #[test]
    fn test_minilm_embed_similarity() {
        let Some(provider) = load_provider() else {
            return;
        };

        let e1 = provider.embed("qual o email do credenciamento").unwrap();
        let e2 = provider.embed("qual e o email do credenciamento").unwrap();
        let e3 = provider.embed("vai chover amanha em lisboa").unwrap();

        let sim_related = provider.similarity(&e1, &e2);
        let sim_unrelated = provider.similarity(&e1, &e3);

        println!("sim(email, email)  = {sim_related:.4}");
        println!("sim(email, weather) = {sim_unrelated:.4}");

        assert!(
            sim_related > sim_unrelated,
            "related questions should have higher similarity"
        );
        assert!(sim_related > 0.7, "related questions should be > 0.7");
    }
}
