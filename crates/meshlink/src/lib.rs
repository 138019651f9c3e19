//! # Meshlink
//!
//! A distributed control-plane for a multi-node WireGuard overlay mesh.
//!
//! Every node runs an agent that maintains a cluster-wide, eventually
//! consistent registry of member machines and their liveness, reconciles
//! its local data-plane to match that registry, and supervises
//! deployments owned by a single node at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             meshlink                                │
//! │  ┌────────┐   ┌───────────┐   ┌────────────┐   ┌───────────────┐ │
//! │  │ Config │ → │ Registry  │ → │ Reconciler │ → │ Platform ops  │ │
//! │  │(layered)│   │(replicated)│   │(worker)   │   │(WG/Docker)    │ │
//! │  └────────┘   └───────────┘   └────────────┘   └───────────────┘ │
//! │                      ↓                                              │
//! │                 Ownership (deployment leases)                       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use meshlink::Node;
//! use meshlink_config::NetworkConfig;
//! use meshlink_types::{Keypair, NodeState};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> meshlink::Result<()> {
//! let mut config = NetworkConfig::default();
//! config.normalize();
//!
//! let keypair = Keypair::generate();
//! let state = NodeState::new(
//!     "node-a",
//!     keypair,
//!     "10.210.1.0/24".parse().unwrap(),
//!     config.wg_interface.clone(),
//!     config.wg_port,
//! );
//!
//! let node = Node::new(config, state);
//! let cidr = node.ensure_network_identity().await?;
//! node.run(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - **Facade**: [`Node`] — the single entry point gluing the layers below
//!   together.
//! - **Foundation**: [`meshlink_types`] (replicated data model),
//!   [`meshlink_config`] (layered configuration), [`meshlink_state`]
//!   (local persistence).
//! - **Data plane**: [`meshlink_registry`] (the replicated `Registry`
//!   port), [`meshlink_platform`] (`PlatformOps`, container runtimes,
//!   clock).
//! - **Orchestration**: [`meshlink_reconciler`] (the reconciliation
//!   engine), [`meshlink_ownership`] (deployment ownership leases).

mod error;
mod node;
mod subnet;

pub use error::{MeshlinkError, Result};
pub use node::Node;
pub use subnet::allocate_subnet;

// Re-export the foundation layer.
pub use meshlink_types::{
    apply_delta, default_network_cidr, nth_subnet, subnet_first_host, Change, ContainerRow,
    DeletedRef, DeploymentRow, DeploymentStatus, HeartbeatRow, Keypair, MachineRow, ManagementIp,
    NodeId, NodeState, PublicKey, Version,
};
pub use meshlink_config::{load as load_config, NetworkConfig};
pub use meshlink_state::{FileStateStore, StateError, StateStore};

// Re-export the data-plane layer.
pub use meshlink_platform::{
    Clock, ContainerInfo, ContainerRuntime, ContainerSpec, CorrosionRuntime, InMemoryRuntime,
    LoggingPlatformOps, PeerConfig, PlatformError, PlatformOps, ProbeStatus, StatusProber,
    SupportContainerRuntime, SystemClock, VirtualClock,
};
pub use meshlink_registry::{LocalRegistry, Registry, RegistryError};

// Re-export the orchestration layer.
pub use meshlink_ownership::{
    supervise, DeploymentStore, LocalDeploymentStore, OwnershipError, SweeperConfig,
};
pub use meshlink_reconciler::{
    reconcile_peers, DialFn, FreshnessTracker, NtpChecker, NtpStatus, PeerFreshness, PingTracker,
    ReconcilerError, ReconcilerWorker, TcpDialer, WorkerEvent,
};
