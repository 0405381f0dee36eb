//! Pipeline configuration types: task, compute device, and extra kwargs.
//!
//! Everything here is parsed from caller or environment strings and rejected
//! early when unknown.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::InferenceError;

/// Extra keyword arguments forwarded to pipeline construction.
pub type ModelKwargs = serde_json::Map<String, serde_json::Value>;

/// What a pipeline does. Only text classification is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Task {
    TextClassification,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextClassification => "text-classification",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text-classification" => Ok(Self::TextClassification),
            other => Err(InferenceError::UnsupportedTask(other.to_string())),
        }
    }
}

/// Compute device a pipeline is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    /// CUDA device by ordinal.
    Cuda(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "cpu" {
            return Ok(Self::Cpu);
        }
        if s == "cuda" {
            return Ok(Self::Cuda(0));
        }
        match s.strip_prefix("cuda:") {
            Some(ordinal) => ordinal
                .parse::<usize>()
                .map(Self::Cuda)
                .map_err(|_| format!("invalid CUDA ordinal in '{}'", s)),
            None => Err(format!("unknown device '{}'; expected cpu or cuda:<n>", s)),
        }
    }
}

impl Serialize for Device {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Device {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
