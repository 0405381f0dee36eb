//! MLflow model URI parsing.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::models::loader::LoadError;

/// How a registered model version is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    /// Explicit version number.
    Version(String),
    /// Latest version in a stage (e.g. "Production").
    Stage(String),
    /// Latest version regardless of stage.
    Latest,
    /// Version an alias points to.
    Alias(String),
}

/// A parsed model URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelUri {
    /// `models:/<name>/<version|stage|latest>` or `models:/<name>@<alias>`.
    Registered {
        name: String,
        selector: VersionSelector,
    },
    /// `runs:/<run_id>/<path>`.
    Run { run_id: String, path: String },
    /// `mlflow-artifacts:/<path>`, served by the tracking server's artifact proxy.
    Artifacts(String),
    /// `s3://<bucket>/<key>`, read straight from the artifact bucket.
    S3 { bucket: String, key: String },
    /// `file://<path>` or an absolute path.
    Local(PathBuf),
}

impl ModelUri {
    pub fn parse(raw: &str) -> Result<Self, LoadError> {
        let raw = raw.trim();
        let invalid = |why: &str| LoadError::UnsupportedUri(format!("{} ({})", raw, why));

        if let Some(rest) = raw.strip_prefix("models:/") {
            let rest = rest.trim_start_matches('/');
            if let Some((name, alias)) = rest.split_once('@') {
                if name.is_empty() || alias.is_empty() || alias.contains('/') {
                    return Err(invalid("expected models:/<name>@<alias>"));
                }
                return Ok(Self::Registered {
                    name: name.to_string(),
                    selector: VersionSelector::Alias(alias.to_string()),
                });
            }
            let (name, version) = rest
                .split_once('/')
                .ok_or_else(|| invalid("expected models:/<name>/<version>"))?;
            if name.is_empty() || version.is_empty() || version.contains('/') {
                return Err(invalid("expected models:/<name>/<version>"));
            }
            let selector = if version.chars().all(|c| c.is_ascii_digit()) {
                VersionSelector::Version(version.to_string())
            } else if version.eq_ignore_ascii_case("latest") {
                VersionSelector::Latest
            } else {
                VersionSelector::Stage(version.to_string())
            };
            return Ok(Self::Registered {
                name: name.to_string(),
                selector,
            });
        }

        if let Some(rest) = raw.strip_prefix("runs:/") {
            let rest = rest.trim_start_matches('/');
            let (run_id, path) = rest.split_once('/').unwrap_or((rest, ""));
            if run_id.is_empty() {
                return Err(invalid("expected runs:/<run_id>/<path>"));
            }
            return Ok(Self::Run {
                run_id: run_id.to_string(),
                path: path.trim_matches('/').to_string(),
            });
        }

        if let Some(rest) = raw.strip_prefix("mlflow-artifacts:") {
            // Accept both mlflow-artifacts:/path and mlflow-artifacts://host:port/path.
            let path = match rest.strip_prefix("//") {
                Some(with_host) => with_host.split_once('/').map(|(_, p)| p).unwrap_or(""),
                None => rest,
            };
            let path = path.trim_matches('/');
            if path.is_empty() {
                return Err(invalid("empty artifact path"));
            }
            return Ok(Self::Artifacts(path.to_string()));
        }

        if let Some(rest) = raw.strip_prefix("s3://") {
            let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                return Err(invalid("expected s3://<bucket>/<key>"));
            }
            return Ok(Self::S3 {
                bucket: bucket.to_string(),
                key: key.trim_matches('/').to_string(),
            });
        }

        if let Some(path) = raw.strip_prefix("file://") {
            return Ok(Self::Local(PathBuf::from(path)));
        }

        if raw.starts_with('/') {
            return Ok(Self::Local(PathBuf::from(raw)));
        }

        Err(invalid(
            "supported schemes: models:/, runs:/, mlflow-artifacts:/, s3://, file://",
        ))
    }
}

impl FromStr for ModelUri {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ModelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered { name, selector } => match selector {
                VersionSelector::Version(v) | VersionSelector::Stage(v) => {
                    write!(f, "models:/{}/{}", name, v)
                }
                VersionSelector::Latest => write!(f, "models:/{}/latest", name),
                VersionSelector::Alias(a) => write!(f, "models:/{}@{}", name, a),
            },
            Self::Run { run_id, path } => write!(f, "runs:/{}/{}", run_id, path),
            Self::Artifacts(path) => write!(f, "mlflow-artifacts:/{}", path),
            Self::S3 { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
            Self::Local(path) => write!(f, "file://{}", path.display()),
        }
    }
}

/// Registry URI for a registered model name and version.
pub fn registered_model_uri(name: &str, version: &str) -> String {
    format!("models:/{}/{}", name, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_forms() {
        assert_eq!(
            ModelUri::parse("models:/sentiment/3").unwrap(),
            ModelUri::Registered {
                name: "sentiment".into(),
                selector: VersionSelector::Version("3".into())
            }
        );
        assert_eq!(
            ModelUri::parse("models:/sentiment/Production").unwrap(),
            ModelUri::Registered {
                name: "sentiment".into(),
                selector: VersionSelector::Stage("Production".into())
            }
        );
        assert_eq!(
            ModelUri::parse("models:/sentiment/latest").unwrap(),
            ModelUri::Registered {
                name: "sentiment".into(),
                selector: VersionSelector::Latest
            }
        );
        assert_eq!(
            ModelUri::parse("models:/sentiment@champion").unwrap(),
            ModelUri::Registered {
                name: "sentiment".into(),
                selector: VersionSelector::Alias("champion".into())
            }
        );
    }

    #[test]
    fn test_run_and_artifact_forms() {
        assert_eq!(
            ModelUri::parse("runs:/abc123/model").unwrap(),
            ModelUri::Run {
                run_id: "abc123".into(),
                path: "model".into()
            }
        );
        assert_eq!(
            ModelUri::parse("mlflow-artifacts:/1/abc/artifacts/model").unwrap(),
            ModelUri::Artifacts("1/abc/artifacts/model".into())
        );
        assert_eq!(
            ModelUri::parse("mlflow-artifacts://mlflow:5000/1/abc/artifacts/model").unwrap(),
            ModelUri::Artifacts("1/abc/artifacts/model".into())
        );
        assert_eq!(
            ModelUri::parse("s3://mlflow/1/abc/artifacts/model/").unwrap(),
            ModelUri::S3 {
                bucket: "mlflow".into(),
                key: "1/abc/artifacts/model".into()
            }
        );
        assert_eq!(
            ModelUri::parse("file:///srv/models/m").unwrap(),
            ModelUri::Local(PathBuf::from("/srv/models/m"))
        );
        assert_eq!(
            ModelUri::parse("/srv/models/m").unwrap(),
            ModelUri::Local(PathBuf::from("/srv/models/m"))
        );
    }

    #[test]
    fn test_rejected_forms() {
        for raw in ["s3:///model", "gs://bucket/model", "models:/only-name", "models:/@x", "runs:/", "relative/path"] {
            assert!(
                matches!(ModelUri::parse(raw), Err(LoadError::UnsupportedUri(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_display() {
        let uri = ModelUri::parse("models:/sentiment@champion").unwrap();
        assert_eq!(uri.to_string(), "models:/sentiment@champion");
        assert_eq!(registered_model_uri("sentiment", "3"), "models:/sentiment/3");
    }
}
