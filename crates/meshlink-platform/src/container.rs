//! `ContainerRuntime` / `CorrosionRuntime` / `StatusProber` (§6): lifecycle
//! of the support containers the agent depends on. Every lookup returns
//! an `exists: false` info value rather than an error — only operations
//! that require the object to already exist (stop/remove/logs) surface a
//! typed `NotFound`.

use std::collections::HashMap;

use crate::error::{PlatformError, Result};

/// The desired shape of a container to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub labels: HashMap<String, String>,
    pub env: HashMap<String, String>,
}

/// A lookup result. `exists: false` is not an error — it's the normal
/// answer for "does this container exist yet".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub exists: bool,
    pub running: bool,
    pub labels: HashMap<String, String>,
}

impl ContainerInfo {
    pub fn missing() -> Self {
        Self {
            id: String::new(),
            exists: false,
            running: false,
            labels: HashMap::new(),
        }
    }
}

/// Shared lifecycle for both the container and Corrosion support
/// runtimes — they differ only in which process they manage, not in the
/// shape of the operations.
pub trait SupportContainerRuntime: Send + Sync {
    async fn ensure_ready(&self) -> Result<()>;
    async fn create(&self, spec: &ContainerSpec) -> Result<String>;
    async fn start(&self, id: &str) -> Result<()>;
    async fn stop(&self, id: &str) -> Result<()>;
    async fn remove(&self, id: &str) -> Result<()>;
    async fn inspect(&self, id: &str) -> Result<ContainerInfo>;
    async fn list_by_labels(&self, labels: &HashMap<String, String>) -> Result<Vec<ContainerInfo>>;
    async fn ensure_network(&self, name: &str) -> Result<()>;
    async fn remove_network(&self, name: &str) -> Result<()>;
    async fn logs(&self, id: &str) -> Result<String>;
}

/// Marker distinguishing the workload container runtime from the
/// Corrosion gossip sidecar runtime at the type level, so callers can't
/// accidentally pass one where the other is expected.
pub trait ContainerRuntime: SupportContainerRuntime {}

pub trait CorrosionRuntime: SupportContainerRuntime {}

/// Readiness of a probed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Ready,
    NotReady,
    Unknown,
}

pub trait StatusProber: Send + Sync {
    async fn probe(&self, target: &str) -> Result<ProbeStatus>;
}

/// In-memory runtime that tracks containers in a map. Used by tests and
/// as the simulator's stand-in for a real Docker/Corrosion backend.
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    containers: std::sync::Mutex<HashMap<String, ContainerInfo>>,
    networks: std::sync::Mutex<std::collections::HashSet<String>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SupportContainerRuntime for InMemoryRuntime {
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            .to_string();
        let info = ContainerInfo {
            id: id.clone(),
            exists: true,
            running: false,
            labels: spec.labels.clone(),
        };
        self.containers
            .lock()
            .expect("runtime mutex poisoned")
            .insert(id.clone(), info);
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        let mut containers = self.containers.lock().expect("runtime mutex poisoned");
        let info = containers
            .get_mut(id)
            .ok_or_else(|| PlatformError::NotFound {
                kind: "container",
                name: id.to_string(),
            })?;
        info.running = true;
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<()> {
        let mut containers = self.containers.lock().expect("runtime mutex poisoned");
        let info = containers
            .get_mut(id)
            .ok_or_else(|| PlatformError::NotFound {
                kind: "container",
                name: id.to_string(),
            })?;
        info.running = false;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.containers
            .lock()
            .expect("runtime mutex poisoned")
            .remove(id);
        Ok(())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInfo> {
        Ok(self
            .containers
            .lock()
            .expect("runtime mutex poisoned")
            .get(id)
            .cloned()
            .unwrap_or_else(ContainerInfo::missing))
    }

    async fn list_by_labels(&self, labels: &HashMap<String, String>) -> Result<Vec<ContainerInfo>> {
        Ok(self
            .containers
            .lock()
            .expect("runtime mutex poisoned")
            .values()
            .filter(|info| labels.iter().all(|(k, v)| info.labels.get(k) == Some(v)))
            .cloned()
            .collect())
    }

    async fn ensure_network(&self, name: &str) -> Result<()> {
        self.networks
            .lock()
            .expect("runtime mutex poisoned")
            .insert(name.to_string());
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        self.networks
            .lock()
            .expect("runtime mutex poisoned")
            .remove(name);
        Ok(())
    }

    async fn logs(&self, id: &str) -> Result<String> {
        if self
            .containers
            .lock()
            .expect("runtime mutex poisoned")
            .contains_key(id)
        {
            Ok(String::new())
        } else {
            Err(PlatformError::NotFound {
                kind: "container",
                name: id.to_string(),
            })
        }
    }
}

impl ContainerRuntime for InMemoryRuntime {}
impl CorrosionRuntime for InMemoryRuntime {}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: "meshlink/helper:latest".to_string(),
            labels: HashMap::new(),
            env: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn inspect_missing_container_reports_exists_false() {
        let runtime = InMemoryRuntime::new();
        let info = runtime.inspect("nope").await.unwrap();
        assert!(!info.exists);
    }

    #[tokio::test]
    async fn create_start_stop_remove_round_trip() {
        let runtime = InMemoryRuntime::new();
        let id = runtime.create(&spec("helper")).await.unwrap();
        runtime.start(&id).await.unwrap();
        assert!(runtime.inspect(&id).await.unwrap().running);
        runtime.stop(&id).await.unwrap();
        assert!(!runtime.inspect(&id).await.unwrap().running);
        runtime.remove(&id).await.unwrap();
        assert!(!runtime.inspect(&id).await.unwrap().exists);
    }

    #[tokio::test]
    async fn start_on_missing_container_is_not_found() {
        let runtime = InMemoryRuntime::new();
        let err = runtime.start("missing").await.unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));
    }
}
