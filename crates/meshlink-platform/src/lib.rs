//! The data-plane ports (§6): `Clock`, `PlatformOps`, and the support
//! container runtimes. The actual WireGuard/iptables/Docker system calls
//! are out of scope (§1) — these traits are the narrow seam the
//! reconciler talks through, with trivial/logging/in-memory
//! implementations standing in for a real backend.

mod clock;
mod container;
mod error;
mod platform_ops;

pub use clock::{Clock, SystemClock, VirtualClock};
pub use container::{
    ContainerInfo, ContainerRuntime, ContainerSpec, CorrosionRuntime, InMemoryRuntime,
    ProbeStatus, StatusProber, SupportContainerRuntime,
};
pub use error::{PlatformError, Result};
pub use platform_ops::{LoggingPlatformOps, PeerConfig, PlatformOps};
