use std::fs;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use ndarray::Array2;
use serde::Deserialize;
use tokenizers::Tokenizer as WordPieceTokenizer;

use super::ContextEncoder;
use crate::error::{DataError, Result};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

#[derive(Deserialize)]
struct HiddenSize {
    hidden_size: usize,
}

fn encoder_error(err: candle_core::Error) -> DataError {
    DataError::Encoder(err.to_string())
}

/// BERT encoder running on the CPU with `candle`.
/// The model directory must hold `config.json`, `tokenizer.json` and `model.safetensors`,
/// as published for `bert-base-uncased`.
pub struct BertEncoder {
    model: BertModel,
    tokenizer: WordPieceTokenizer,
    device: Device,
    hidden_size: usize,
    model_id: String,
}

impl BertEncoder {
    /// Loads the encoder from a local model directory.
    ///
    /// # Errors
    /// Returns an error if a model file is missing or cannot be parsed.
    pub fn from_dir(model_dir: &Path) -> Result<Self> {
        let config_path = model_dir.join(CONFIG_FILE);
        let config_text =
            fs::read_to_string(&config_path).map_err(|e| DataError::io(&config_path, e))?;
        let json_error = |source: serde_json::Error| DataError::Json {
            path: config_path.clone(),
            source,
        };
        let config: Config = serde_json::from_str(&config_text).map_err(json_error)?;
        let HiddenSize { hidden_size } = serde_json::from_str(&config_text).map_err(json_error)?;

        let tokenizer_path = model_dir.join(TOKENIZER_FILE);
        let tokenizer = WordPieceTokenizer::from_file(&tokenizer_path).map_err(|e| {
            DataError::Encoder(format!(
                "cannot load tokenizer from '{}': {}",
                tokenizer_path.display(),
                e
            ))
        })?;

        let device = Device::Cpu;
        let weights_path = model_dir.join(WEIGHTS_FILE);
        if !weights_path.exists() {
            return Err(DataError::io(
                &weights_path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "model weights not found"),
            ));
        }
        // SAFETY: the weights file is memory-mapped read-only and is not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device) }
            .map_err(encoder_error)?;
        let model = BertModel::load(vb, &config).map_err(encoder_error)?;

        log::info!("loaded encoder from {}", model_dir.display());
        Ok(BertEncoder {
            model,
            tokenizer,
            device,
            hidden_size,
            model_id: model_dir.display().to_string(),
        })
    }
}

impl ContextEncoder for BertEncoder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn encode(&self, text: &str) -> Result<Array2<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| DataError::Encoder(e.to_string()))?;

        let to_batch = |values: &[u32]| -> candle_core::Result<Tensor> {
            Tensor::new(values, &self.device)?.unsqueeze(0)
        };
        let input_ids = to_batch(encoding.get_ids()).map_err(encoder_error)?;
        let type_ids = to_batch(encoding.get_type_ids()).map_err(encoder_error)?;
        let attention_mask = to_batch(encoding.get_attention_mask()).map_err(encoder_error)?;

        let hidden_states = self
            .model
            .forward(&input_ids, &type_ids, Some(&attention_mask))
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec2::<f32>())
            .map_err(encoder_error)?;

        let num_tokens = hidden_states.len();
        let flat: Vec<f32> = hidden_states.into_iter().flatten().collect();
        Array2::from_shape_vec((num_tokens, self.hidden_size), flat)
            .map_err(|e| DataError::Encoder(e.to_string()))
    }
}
