//! CLIP projection heads backed by ONNX Runtime.
//!
//! A model directory holds the text and vision towers exported separately
//! (`text_model.onnx`, `vision_model.onnx`, optionally under `onnx/`), the
//! `tokenizer.json` and an optional `preprocessor_config.json`.
//!
//! Outputs are returned exactly as the projection heads emit them, flattened
//! to one vector. No re-normalization is applied: the stored index vectors
//! were produced the same way.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::{Array2, Array4};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationDirection, TruncationParams, TruncationStrategy};
use tracing::{debug, info};

use crate::config::EncoderConfig;
use crate::errors::EncodeError;
use crate::preprocess::PreprocessConfig;
use crate::query::EmbeddingVector;

/// CLIP text context length.
pub const MAX_TEXT_TOKENS: usize = 77;

const TEXT_MODEL_FILE: &str = "text_model.onnx";
const VISION_MODEL_FILE: &str = "vision_model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";
const PREPROCESSOR_FILE: &str = "preprocessor_config.json";

/// The two projection heads of a joint text/image embedding model.
///
/// Implementations are synchronous and may block; callers run them on a
/// blocking thread.
pub trait Projection: Send + Sync + 'static {
    /// Embeds already validated, non-empty text.
    fn embed_text(&self, text: &str) -> Result<EmbeddingVector, EncodeError>;

    /// Embeds a preprocessed `[1, 3, H, W]` pixel tensor.
    fn embed_pixels(&self, pixels: Array4<f32>) -> Result<EmbeddingVector, EncodeError>;
}

/// ONNX-backed CLIP model: tokenizer plus text and vision sessions.
pub struct ClipModel {
    model_id: String,
    tokenizer: Tokenizer,
    // `Session::run` needs `&mut self`.
    text: Mutex<Session>,
    vision: Mutex<Session>,
    preprocess: PreprocessConfig,
}

impl ClipModel {
    /// Loads every model artifact for `cfg.model_id`. Fails fast on any missing file.
    pub fn load(cfg: &EncoderConfig) -> Result<Self, EncodeError> {
        let dir = cfg.model_dir();
        info!(model = %cfg.model_id, dir = %dir.display(), "clip_model.load: start");

        let text_path = locate(&dir, TEXT_MODEL_FILE)?;
        let vision_path = locate(&dir, VISION_MODEL_FILE)?;
        let tokenizer_path = locate(&dir, TOKENIZER_FILE)?;

        let tokenizer = load_tokenizer(&tokenizer_path)?;
        let text = build_session(&text_path, cfg.inference_threads)?;
        let vision = build_session(&vision_path, cfg.inference_threads)?;
        let preprocess = PreprocessConfig::load_or_default(&dir.join(PREPROCESSOR_FILE))?;

        info!(
            model = %cfg.model_id,
            crop = preprocess.crop_width,
            "clip_model.load: ready"
        );

        Ok(Self {
            model_id: cfg.model_id.clone(),
            tokenizer,
            text: Mutex::new(text),
            vision: Mutex::new(vision),
            preprocess,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Pixel preprocessing read from the model directory.
    pub fn preprocess_config(&self) -> &PreprocessConfig {
        &self.preprocess
    }
}

impl Projection for ClipModel {
    fn embed_text(&self, text: &str) -> Result<EmbeddingVector, EncodeError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EncodeError::Inference(format!("tokenization failed: {e}")))?;

        let ids: Vec<i64> = encoding.get_ids().iter().map(|id| *id as i64).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|m| *m as i64)
            .collect();
        let len = ids.len();
        if len == 0 {
            return Err(EncodeError::InvalidInput("text produced no tokens".into()));
        }

        let ids = Array2::from_shape_vec((1, len), ids)
            .map_err(|e| EncodeError::Inference(e.to_string()))?;
        let mask = Array2::from_shape_vec((1, len), mask)
            .map_err(|e| EncodeError::Inference(e.to_string()))?;
        let ids = Tensor::from_array(ids).map_err(|e| EncodeError::Inference(e.to_string()))?;
        let mask = Tensor::from_array(mask).map_err(|e| EncodeError::Inference(e.to_string()))?;

        let mut session = self
            .text
            .lock()
            .map_err(|_| EncodeError::Inference("text session lock poisoned".into()))?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_name = pick_output(&session, "text_embeds")?;
        let ids_name = input_names
            .iter()
            .find(|n| n.contains("input_ids"))
            .cloned()
            .unwrap_or_else(|| "input_ids".to_string());
        let mask_name = input_names.iter().find(|n| n.contains("attention_mask")).cloned();

        let outputs = match mask_name {
            Some(mask_name) => session.run(ort::inputs![ids_name => ids, mask_name => mask]),
            None => session.run(ort::inputs![ids_name => ids]),
        }
        .map_err(|e| EncodeError::Inference(format!("text tower: {e}")))?;

        let output = outputs
            .get(&output_name)
            .ok_or_else(|| EncodeError::Inference(format!("missing output '{output_name}'")))?;
        let (_shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| EncodeError::Inference(format!("text output: {e}")))?;

        let embedding = finite(data.to_vec())?;
        debug!(tokens = len, dim = embedding.len(), "clip_model.embed_text: done");
        Ok(embedding)
    }

    fn embed_pixels(&self, pixels: Array4<f32>) -> Result<EmbeddingVector, EncodeError> {
        let pixels =
            Tensor::from_array(pixels).map_err(|e| EncodeError::Inference(e.to_string()))?;

        let mut session = self
            .vision
            .lock()
            .map_err(|_| EncodeError::Inference("vision session lock poisoned".into()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "pixel_values".to_string());
        let output_name = pick_output(&session, "image_embeds")?;

        let outputs = session
            .run(ort::inputs![input_name => pixels])
            .map_err(|e| EncodeError::Inference(format!("vision tower: {e}")))?;

        let output = outputs
            .get(&output_name)
            .ok_or_else(|| EncodeError::Inference(format!("missing output '{output_name}'")))?;
        let (_shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| EncodeError::Inference(format!("vision output: {e}")))?;

        let embedding = finite(data.to_vec())?;
        debug!(dim = embedding.len(), "clip_model.embed_pixels: done");
        Ok(embedding)
    }
}

/// Finds `file` directly in `dir` or in its `onnx/` sub-directory.
fn locate(dir: &Path, file: &str) -> Result<PathBuf, EncodeError> {
    let candidates = [dir.join(file), dir.join("onnx").join(file)];
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| {
            EncodeError::ModelLoad(format!("{file} not found under {}", dir.display()))
        })
}

fn load_tokenizer(path: &Path) -> Result<Tokenizer, EncodeError> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| EncodeError::ModelLoad(format!("tokenizer {}: {e}", path.display())))?;

    // Single queries are never padded; long ones are cut at the context length.
    tokenizer.with_padding(None);
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_TEXT_TOKENS,
            strategy: TruncationStrategy::LongestFirst,
            stride: 0,
            direction: TruncationDirection::Right,
        }))
        .map_err(|e| EncodeError::ModelLoad(format!("tokenizer truncation: {e}")))?;

    Ok(tokenizer)
}

fn build_session(path: &Path, threads: usize) -> Result<Session, EncodeError> {
    debug!(path = %path.display(), threads, "clip_model.build_session");
    Session::builder()
        .map_err(|e| EncodeError::ModelLoad(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| EncodeError::ModelLoad(e.to_string()))?
        .with_intra_threads(threads)
        .map_err(|e| EncodeError::ModelLoad(e.to_string()))?
        .commit_from_file(path)
        .map_err(|e| EncodeError::ModelLoad(format!("{}: {e}", path.display())))
}

/// Prefers the named projection output, else the session's first output.
fn pick_output(session: &Session, preferred: &str) -> Result<String, EncodeError> {
    if session.outputs.iter().any(|o| o.name == preferred) {
        return Ok(preferred.to_string());
    }
    session
        .outputs
        .first()
        .map(|o| o.name.clone())
        .ok_or_else(|| EncodeError::Inference("model has no outputs".into()))
}

fn finite(v: Vec<f32>) -> Result<EmbeddingVector, EncodeError> {
    if v.is_empty() {
        return Err(EncodeError::Inference("empty embedding".into()));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(EncodeError::Inference(
            "embedding contains non-finite values".into(),
        ));
    }
    Ok(v)
}
