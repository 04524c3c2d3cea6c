//! Model registration port.

use super::TRACING_TARGET;
use crate::errors::{PipelineError, Result};
use crate::storage::ArtifactStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How the serving container hosts models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContainerMode {
    /// One model per container.
    #[default]
    SingleModel,
    /// Several models behind one container.
    MultiModel,
}

/// A model to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Unique model name.
    pub model_name: String,
    /// Serving image.
    pub image: String,
    /// Location of the trained model archive.
    pub model_data_url: String,
    /// Role the model executes under.
    pub execution_role: String,
    /// Hosting mode.
    #[serde(default)]
    pub mode: ContainerMode,
}

/// A published model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHandle {
    /// The model name.
    pub model_name: String,
    /// The registry's identifier for the model.
    pub model_id: String,
    /// When the model was registered.
    pub created_at: DateTime<Utc>,
}

/// Publishes trained models.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Registers a model.
    ///
    /// # Errors
    ///
    /// Returns `Submission` if the registry refuses the model.
    async fn register(&self, spec: &ModelSpec) -> Result<ModelHandle>;
}

/// Keeps registered models in memory.
///
/// With a store attached, registration fails unless the model archive exists.
#[derive(Default)]
pub struct InMemoryModelRegistry {
    models: DashMap<String, ModelSpec>,
    store: Option<Arc<dyn ArtifactStore>>,
}

impl fmt::Debug for InMemoryModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryModelRegistry")
            .field("models", &self.models.len())
            .field("verifies_artifacts", &self.store.is_some())
            .finish()
    }
}

impl InMemoryModelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies model archives against `store` before registering.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Returns a registered model by name.
    #[must_use]
    pub fn get(&self, model_name: &str) -> Option<ModelSpec> {
        self.models.get(model_name).map(|m| m.value().clone())
    }

    /// Returns the number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns true if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[async_trait]
impl ModelRegistry for InMemoryModelRegistry {
    async fn register(&self, spec: &ModelSpec) -> Result<ModelHandle> {
        if self.models.contains_key(&spec.model_name) {
            return Err(PipelineError::submission(&spec.model_name, "model already exists"));
        }

        if let Some(store) = &self.store {
            store.read(&spec.model_data_url).await.map_err(|e| {
                PipelineError::submission(&spec.model_name, format!("model data unavailable: {e}"))
            })?;
        }

        self.models.insert(spec.model_name.clone(), spec.clone());
        tracing::info!(
            target: TRACING_TARGET,
            model_name = %spec.model_name,
            model_data_url = %spec.model_data_url,
            "Model registered"
        );

        Ok(ModelHandle {
            model_name: spec.model_name.clone(),
            model_id: format!("arn:pipewright:model/{}", spec.model_name),
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryArtifactStore;

    fn spec() -> ModelSpec {
        ModelSpec {
            model_name: "XGBoost-Fraud-Detector-07-04-05-09-a1b2c3d4".to_string(),
            image: "xgboost:1.0-1".to_string(),
            model_data_url: "s3://b/p/xgboost/job/output/model.tar.gz".to_string(),
            execution_role: "role".to_string(),
            mode: ContainerMode::SingleModel,
        }
    }

    #[tokio::test]
    async fn test_register_once() {
        let registry = InMemoryModelRegistry::new();
        let handle = registry.register(&spec()).await.unwrap();

        assert_eq!(handle.model_name, spec().model_name);
        assert_eq!(registry.get(&spec().model_name), Some(spec()));
        assert_eq!(registry.register(&spec()).await.unwrap_err().code(), "JOB-SUBMISSION");
    }

    #[tokio::test]
    async fn test_missing_archive_rejected() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let registry = InMemoryModelRegistry::new().with_store(store.clone());

        assert!(registry.register(&spec()).await.is_err());

        store.put(&spec().model_data_url, b"archive".to_vec()).await.unwrap();
        registry.register(&spec()).await.unwrap();
        assert_eq!(registry.len(), 1);
    }
}
