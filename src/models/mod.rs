//! Model management module.
//!
//! Handles model sources (local directory, hub, registry), config parsing,
//! and the single-slot lifecycle manager.

pub mod hub;
pub mod loader;
pub mod manifest;
pub mod registry;

mod manager;
mod metadata;

pub use hub::{HttpHub, HubClient, HubRequest, HubSnapshot};
pub use loader::{LoadError, ModelDirectory, ModelLoader};
pub use manager::{ModelManager, ModelSource, RegistryRequest};
pub use manifest::ModelManifest;
pub use metadata::{ModelDescriptor, ModelMetadata, SourceKind};
pub use registry::{MlflowConfig, MlflowRegistry, RegistryClient, RegistryTier, S3Config};
