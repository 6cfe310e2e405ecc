//! Residency bookkeeping for the models a host application loads at runtime.
//!
//! The manager never touches model weights itself: fetching and loading go
//! through a [`ModelLoader`] supplied by the host. What it owns is policy:
//! how many models may be resident at once, whether missing ones may be
//! fetched, and which model currently serves each kind.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::models::registry::{ModelInfo, ModelState, Registry};
use crate::models::{ModelKind, ModelsSettings};
use crate::settings::Settings;

#[async_trait::async_trait]
pub trait ModelLoader: Send + Sync {
    type Handle: Send + Sync + 'static;

    /// Whether the model's files are already on local storage.
    async fn is_present(&self, model: &ModelInfo) -> anyhow::Result<bool>;

    async fn fetch(&self, model: &ModelInfo) -> anyhow::Result<()>;

    async fn load(&self, model: &ModelInfo) -> anyhow::Result<Self::Handle>;
}

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("model `{0}` is not registered")]
    NotRegistered(String),

    #[error("runtime model management is disabled, `{0}` is not a default model")]
    Disabled(String),

    #[error("model `{0}` is not available locally and automatic download is off")]
    Unavailable(String),

    #[error("model `{id}` is a {actual} model, not {expected}")]
    KindMismatch {
        id: String,
        expected: ModelKind,
        actual: ModelKind,
    },

    #[error("all {capacity} model slots are held by active models")]
    CapacityExhausted { capacity: usize },

    #[error("failed to fetch model `{id}`")]
    Fetch {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to load model `{id}`")]
    Load {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Ticket for an explicit [`ModelManager::download`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DownloadId(u64);

impl std::fmt::Display for DownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "download-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Downloading,
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub model_id: String,
    pub status: DownloadStatus,
}

struct Policy {
    enabled: bool,
    capacity: usize,
    auto_download: bool,
    defaults: Vec<(ModelKind, String)>,
}

impl Policy {
    fn new(settings: &Settings) -> Self {
        let ModelsSettings {
            enabled,
            max_loaded_models,
            auto_download,
            ..
        } = settings.models;

        let defaults = [ModelKind::Llm, ModelKind::Embedding]
            .into_iter()
            .filter_map(|kind| settings.default_model(kind).map(|id| (kind, id)))
            .collect();

        Self {
            enabled,
            capacity: usize::try_from(max_loaded_models).unwrap_or(usize::MAX),
            auto_download,
            defaults,
        }
    }

    fn is_default(&self, id: &str) -> bool {
        self.defaults.iter().any(|(_, default)| default == id)
    }
}

struct Resident<H> {
    handles: HashMap<String, Arc<H>>,
    /// Least recently used first.
    recency: VecDeque<String>,
    active: HashMap<ModelKind, String>,
}

impl<H> Resident<H> {
    fn touch(&mut self, id: &str) {
        self.recency.retain(|resident| resident != id);
        self.recency.push_back(id.to_string());
    }

    fn drop_model(&mut self, id: &str) -> bool {
        self.recency.retain(|resident| resident != id);
        self.active.retain(|_, active| active != id);
        self.handles.remove(id).is_some()
    }

    /// Least recently used model that no kind is actively using, except `replacing`'s current one.
    fn eviction_candidate(&self, replacing: Option<ModelKind>) -> Option<String> {
        self.recency
            .iter()
            .find(|id| {
                !self
                    .active
                    .iter()
                    .any(|(kind, active)| active == *id && Some(*kind) != replacing)
            })
            .cloned()
    }
}

pub struct ModelManager<L: ModelLoader> {
    loader: L,
    registry: Registry,
    policy: Policy,
    resident: RwLock<Resident<L::Handle>>,
    downloads: DashMap<DownloadId, Download>,
    next_download: AtomicU64,
}

impl<L: ModelLoader> ModelManager<L> {
    pub fn new(settings: &Settings, loader: L) -> Self {
        Self {
            loader,
            registry: Registry::from_settings(settings),
            policy: Policy::new(settings),
            resident: RwLock::new(Resident {
                handles: HashMap::new(),
                recency: VecDeque::new(),
                active: HashMap::new(),
            }),
            downloads: DashMap::new(),
            next_download: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn available(&self) -> Vec<ModelInfo> {
        self.registry.list()
    }

    pub fn loaded(&self) -> Vec<ModelInfo> {
        self.registry
            .list()
            .into_iter()
            .filter(|info| info.state == ModelState::Loaded)
            .collect()
    }

    /// Load the configured default models and make them active.
    pub async fn activate_defaults(&self) -> Result<(), ManagerError> {
        let mut resident = self.resident.write().await;
        for (kind, id) in &self.policy.defaults {
            self.load_locked(&mut resident, id, Some(*kind)).await?;
            resident.active.insert(*kind, id.clone());
            tracing::info!(model = %id, %kind, "default model active");
        }
        Ok(())
    }

    pub async fn load(&self, id: &str) -> Result<Arc<L::Handle>, ManagerError> {
        let mut resident = self.resident.write().await;
        self.load_locked(&mut resident, id, None).await
    }

    /// Returns whether the model was resident.
    pub async fn unload(&self, id: &str) -> bool {
        let mut resident = self.resident.write().await;
        let unloaded = resident.drop_model(id);
        if unloaded {
            self.registry.set_state(id, ModelState::Available);
            tracing::info!(model = %id, "model unloaded");
        }
        unloaded
    }

    /// Make `id` the model serving `kind`, loading it first if needed.
    pub async fn switch_active(
        &self,
        kind: ModelKind,
        id: &str,
    ) -> Result<Arc<L::Handle>, ManagerError> {
        if !self.policy.enabled {
            return Err(ManagerError::Disabled(id.to_string()));
        }

        let info = self
            .registry
            .get(id)
            .ok_or_else(|| ManagerError::NotRegistered(id.to_string()))?;
        if info.kind != kind {
            return Err(ManagerError::KindMismatch {
                id: id.to_string(),
                expected: kind,
                actual: info.kind,
            });
        }

        let mut resident = self.resident.write().await;
        let handle = self.load_locked(&mut resident, id, Some(kind)).await?;
        resident.active.insert(kind, id.to_string());
        tracing::info!(model = %id, %kind, "switched active model");

        Ok(handle)
    }

    pub async fn active(&self, kind: ModelKind) -> Option<Arc<L::Handle>> {
        let resident = self.resident.read().await;
        let id = resident.active.get(&kind)?;
        resident.handles.get(id).cloned()
    }

    pub async fn active_id(&self, kind: ModelKind) -> Option<String> {
        self.resident.read().await.active.get(&kind).cloned()
    }

    /// Register `info` and fetch its files ahead of any load.
    ///
    /// A failed fetch is not an error here: it is recorded on the returned
    /// ticket, see [`Self::download_status`]. Models already resident are
    /// reported completed without fetching.
    pub async fn download(&self, info: ModelInfo) -> Result<DownloadId, ManagerError> {
        if !self.policy.enabled {
            return Err(ManagerError::Disabled(info.id));
        }

        let ticket = DownloadId(self.next_download.fetch_add(1, Ordering::Relaxed));

        if self.resident.read().await.handles.contains_key(&info.id) {
            self.downloads.insert(
                ticket,
                Download {
                    model_id: info.id,
                    status: DownloadStatus::Completed,
                },
            );
            return Ok(ticket);
        }

        self.registry.register(ModelInfo {
            state: ModelState::Downloading,
            ..info.clone()
        });
        self.downloads.insert(
            ticket,
            Download {
                model_id: info.id.clone(),
                status: DownloadStatus::Downloading,
            },
        );
        tracing::info!(model = %info.id, %ticket, repo = ?info.repo_id, "downloading model");

        let status = match self.loader.fetch(&info).await {
            Ok(()) => {
                tracing::info!(model = %info.id, %ticket, "download completed");
                DownloadStatus::Completed
            }
            Err(error) => {
                tracing::warn!(model = %info.id, %ticket, "download failed: {error:#}");
                DownloadStatus::Failed(format!("{error:#}"))
            }
        };

        self.registry.set_state(&info.id, ModelState::Available);
        if let Some(mut download) = self.downloads.get_mut(&ticket) {
            download.status = status;
        }

        Ok(ticket)
    }

    pub fn download_status(&self, ticket: DownloadId) -> Option<Download> {
        self.downloads.get(&ticket).map(|entry| entry.value().clone())
    }

    /// Every download started through [`Self::download`], oldest first.
    pub fn downloads(&self) -> Vec<(DownloadId, Download)> {
        let mut downloads: Vec<(DownloadId, Download)> = self
            .downloads
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        downloads.sort_by_key(|(ticket, _)| *ticket);
        downloads
    }

    /// Unload and forget a model. Returns whether it was registered.
    pub async fn remove(&self, id: &str) -> bool {
        self.unload(id).await;
        self.registry.remove(id).is_some()
    }

    async fn load_locked(
        &self,
        resident: &mut Resident<L::Handle>,
        id: &str,
        replacing: Option<ModelKind>,
    ) -> Result<Arc<L::Handle>, ManagerError> {
        if let Some(handle) = resident.handles.get(id).cloned() {
            resident.touch(id);
            return Ok(handle);
        }

        let info = self
            .registry
            .get(id)
            .ok_or_else(|| ManagerError::NotRegistered(id.to_string()))?;

        if !self.policy.enabled && !self.policy.is_default(id) {
            return Err(ManagerError::Disabled(id.to_string()));
        }

        let evict = if resident.handles.len() >= self.policy.capacity {
            Some(resident.eviction_candidate(replacing).ok_or(
                ManagerError::CapacityExhausted {
                    capacity: self.policy.capacity,
                },
            )?)
        } else {
            None
        };

        self.ensure_present(&info).await?;

        // the victim stays resident until its replacement has loaded
        let handle = self
            .loader
            .load(&info)
            .await
            .map(Arc::new)
            .map_err(|source| ManagerError::Load {
                id: id.to_string(),
                source,
            })?;

        if let Some(evicted) = evict {
            resident.drop_model(&evicted);
            self.registry.set_state(&evicted, ModelState::Available);
            tracing::info!(model = %evicted, "evicted least recently used model");
        }

        resident.handles.insert(id.to_string(), handle.clone());
        resident.touch(id);
        self.registry.set_state(id, ModelState::Loaded);
        tracing::info!(model = %id, kind = %info.kind, "model loaded");

        Ok(handle)
    }

    async fn ensure_present(&self, info: &ModelInfo) -> Result<(), ManagerError> {
        let present = self
            .loader
            .is_present(info)
            .await
            .map_err(|source| ManagerError::Load {
                id: info.id.clone(),
                source,
            })?;
        if present {
            return Ok(());
        }

        if !self.policy.auto_download {
            return Err(ManagerError::Unavailable(info.id.clone()));
        }

        self.registry.set_state(&info.id, ModelState::Downloading);
        tracing::info!(model = %info.id, repo = ?info.repo_id, "downloading model");

        let fetched = self.loader.fetch(info).await;
        self.registry.set_state(&info.id, ModelState::Available);

        fetched.map_err(|source| ManagerError::Fetch {
            id: info.id.clone(),
            source,
        })
    }
}
