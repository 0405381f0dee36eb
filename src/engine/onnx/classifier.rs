//! ONNX-based text classification pipeline.
//!
//! Wraps Candle ONNX runtime for classification tasks like sentiment analysis.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device as CandleDevice, Tensor};
use candle_onnx::onnx::ModelProto;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use super::OnnxOptions;
use crate::engine::output::{softmax, Prediction};
use crate::engine::pipeline::{Pipeline, PipelineSpec};
use crate::engine::{Device, InferenceError, Task};
use crate::models::loader::LoadError;

/// Graph inputs fed from the tokenizer encoding.
const ENCODED_INPUTS: &[&str] = &["input_ids", "attention_mask", "token_type_ids"];

/// ONNX classification model using Candle.
pub struct OnnxClassifier {
    task: Task,
    model: ModelProto,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    inputs: Vec<&'static str>,
    output_name: String,
    device: CandleDevice,
    commit_hash: Option<String>,
}

impl OnnxClassifier {
    /// Parse the graph and tokenizer for `spec`.
    pub fn load(spec: &PipelineSpec, weights: &Path, options: &OnnxOptions) -> Result<Self, LoadError> {
        let device = candle_device(spec.device)?;

        let model = candle_onnx::read_file(weights)
            .map_err(|e| LoadError::InvalidFormat(format!("{}: {}", weights.display(), e)))?;
        let graph = model
            .graph
            .as_ref()
            .ok_or_else(|| LoadError::InvalidFormat("ONNX model has no graph".into()))?;

        let inputs: Vec<&'static str> = ENCODED_INPUTS
            .iter()
            .copied()
            .filter(|name| graph.input.iter().any(|i| i.name == *name))
            .collect();
        if !inputs.contains(&"input_ids") {
            return Err(LoadError::InvalidFormat(
                "ONNX graph has no input_ids input".into(),
            ));
        }
        let output_name = graph
            .output
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| LoadError::InvalidFormat("ONNX graph has no outputs".into()))?;

        let tokenizer_path = spec.tokenizer_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            LoadError::InvalidFormat(format!("tokenizer {}: {}", tokenizer_path.display(), e))
        })?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: options.max_length,
                ..Default::default()
            }))
            .map_err(|e| LoadError::Pipeline(e.to_string()))?;

        let manifest = spec.model.manifest();
        Ok(Self {
            task: spec.task,
            model,
            tokenizer,
            labels: manifest.labels(),
            inputs,
            output_name,
            device,
            commit_hash: manifest.commit_hash.clone(),
        })
    }

    fn encode(&self, texts: &[String]) -> Result<HashMap<String, Tensor>, InferenceError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| InferenceError::ModelError(format!("tokenization failed: {}", e)))?;
        let batch = encodings.len();
        let seq_len = encodings.first().map(|e| e.len()).unwrap_or(0);

        let mut feeds = HashMap::new();
        for name in &self.inputs {
            let values: Vec<i64> = encodings
                .iter()
                .flat_map(|e| {
                    let ids = match *name {
                        "input_ids" => e.get_ids(),
                        "attention_mask" => e.get_attention_mask(),
                        _ => e.get_type_ids(),
                    };
                    ids.iter().map(|&v| i64::from(v))
                })
                .collect();
            let tensor = Tensor::from_vec(values, (batch, seq_len), &self.device)
                .map_err(|e| InferenceError::ModelError(e.to_string()))?;
            feeds.insert((*name).to_string(), tensor);
        }
        Ok(feeds)
    }

    fn scores(&self, logits: &[f32]) -> Vec<f32> {
        // Single-logit heads are binary: sigmoid instead of softmax.
        if logits.len() == 1 {
            return vec![1.0 / (1.0 + (-logits[0]).exp())];
        }
        softmax(logits)
    }
}

impl Pipeline for OnnxClassifier {
    fn task(&self) -> Task {
        self.task
    }

    fn commit_hash(&self) -> Option<&str> {
        self.commit_hash.as_deref()
    }

    fn predict(
        &self,
        texts: &[String],
        top_k: Option<usize>,
    ) -> Result<Vec<Prediction>, InferenceError> {
        let feeds = self.encode(texts)?;
        let mut outputs = candle_onnx::simple_eval(&self.model, feeds)
            .map_err(|e| InferenceError::ModelError(e.to_string()))?;
        let logits = outputs.remove(&self.output_name).ok_or_else(|| {
            InferenceError::ModelError(format!("graph produced no '{}' output", self.output_name))
        })?;
        let rows = logits
            .to_dtype(DType::F32)
            .and_then(|t| t.to_vec2::<f32>())
            .map_err(|e| InferenceError::ModelError(e.to_string()))?;

        rows.iter()
            .map(|row| {
                if row.len() != self.labels.len() {
                    return Err(InferenceError::ModelError(format!(
                        "model produced {} logits but config declares {} labels",
                        row.len(),
                        self.labels.len()
                    )));
                }
                Ok(Prediction::from_scores(&self.labels, &self.scores(row), top_k))
            })
            .collect()
    }
}

fn candle_device(device: Device) -> Result<CandleDevice, LoadError> {
    match device {
        Device::Cpu => Ok(CandleDevice::Cpu),
        Device::Cuda(ordinal) => {
            CandleDevice::new_cuda(ordinal).map_err(|e| LoadError::Device(format!("{}: {}", device, e)))
        }
    }
}
