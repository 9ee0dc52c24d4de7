use anyhow::Result;
use model2vec_rs::model::StaticModel;

/// One embedding; length fixed per model.
pub type EmbeddingVector = Vec<f32>;

const DIMENSION_PROBE: &str = "dimension probe";

/// Anything that turns text into a fixed-dimension vector.
///
/// Implementations must be deterministic: the dataset cache relies on the
/// same text always producing the same vector.
pub trait Encoder: Send + Sync {
    fn dimension(&self) -> usize;

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;

    fn encode(&self, text: &str) -> Result<EmbeddingVector> {
        self.encode_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Failed to generate embedding for single text: {}", text))
    }
}

/// Static (model2vec) embeddings loaded from a Hugging Face repo or a local directory.
pub struct StaticModelEncoder {
    model: StaticModel,
    dimension: usize,
}

impl StaticModelEncoder {
    pub fn from_pretrained(
        repo_or_path: &str,
        hf_token: Option<&str>,
        normalize: Option<bool>,
        subfolder: Option<&str>,
    ) -> Result<Self> {
        let model = StaticModel::from_pretrained(repo_or_path, hf_token, normalize, subfolder)?;
        // model2vec-rs does not expose the output width, so ask the model.
        let dimension = model
            .encode(&[DIMENSION_PROBE.to_string()])
            .into_iter()
            .next()
            .map(|v| v.len())
            .ok_or_else(|| anyhow::anyhow!("Model '{}' returned no embedding for probe text", repo_or_path))?;
        Ok(Self { model, dimension })
    }
}

impl Encoder for StaticModelEncoder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.model.encode(texts))
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

/// Signed feature hashing over lowercased word tokens, L2-normalized.
///
/// Needs no model files. Text without any word token maps to the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dimension: usize,
}

impl HashingEncoder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Hashing encoder dimension must be positive");
        }
        Ok(Self { dimension })
    }

    fn embed_text(&self, text: &str) -> EmbeddingVector {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let hash = fnv1a(token.as_bytes());
            let slot = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Encoder for HashingEncoder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
