//! The reconciler worker (§4.2): the per-node orchestrator. Owns the
//! machine/heartbeat subscriptions, the heartbeat writer, the optional
//! ping/NTP tickers, and dispatches to the peer reconciler on every
//! observed change.

use std::sync::Arc;
use std::time::Duration;

use meshlink_config::NetworkConfig;
use meshlink_platform::{Clock, PlatformOps};
use meshlink_registry::Registry;
use meshlink_types::{apply_delta, Change, MachineRow, NodeId, NodeState, subnet_first_host};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::{ReconcilerError, Result};
use crate::freshness::FreshnessTracker;
use crate::ntp::NtpChecker;
use crate::peer_reconciler::reconcile_peers;
use crate::ping::PingTracker;

/// How often the heartbeat writer bumps this node's own row (§4.2 step 3).
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// The catch-up tick that re-lists and re-reconciles even without an
/// observed delta (§4.2 step 9, last bullet).
pub const FULL_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// How often the ping runner re-probes peer reachability (§4.2 step 5).
pub const PING_INTERVAL: Duration = Duration::from_secs(1);

const MACHINE_SUBSCRIBE_RETRIES: u32 = 30;
const MACHINE_SUBSCRIBE_RETRY_DELAY: Duration = Duration::from_secs(1);
const HEARTBEAT_SUBSCRIBE_RETRIES: u32 = 3;
const CONSECUTIVE_HEARTBEAT_FAILURE_WARNING: u32 = 10;

/// Events the worker emits for observability. Never load-bearing for
/// correctness — purely informational (§4.2 step 7: "Emit `subscribe.ready`").
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    SubscribeReady,
    Reconciled { peer_count: usize },
}

pub type EventSink = Arc<dyn Fn(WorkerEvent) + Send + Sync>;
pub type FailureSink = Arc<dyn Fn(&ReconcilerError) + Send + Sync>;

fn noop_event_sink() -> EventSink {
    Arc::new(|_event| {})
}

fn noop_failure_sink() -> FailureSink {
    Arc::new(|_err| {})
}

/// Everything the worker needs to run one node's reconciliation loop.
pub struct ReconcilerWorker {
    registry: Arc<dyn Registry>,
    platform: Arc<dyn PlatformOps>,
    clock: Arc<dyn Clock>,
    config: NetworkConfig,
    state: NodeState,
    freshness: Arc<FreshnessTracker>,
    ping: Option<Arc<PingTracker>>,
    ntp: Option<Arc<NtpChecker>>,
    on_event: EventSink,
    on_failure: FailureSink,
}

impl ReconcilerWorker {
    pub fn new(
        registry: Arc<dyn Registry>,
        platform: Arc<dyn PlatformOps>,
        clock: Arc<dyn Clock>,
        config: NetworkConfig,
        state: NodeState,
    ) -> Self {
        Self {
            registry,
            platform,
            clock,
            config,
            state,
            freshness: Arc::new(FreshnessTracker::default()),
            ping: None,
            ntp: None,
            on_event: noop_event_sink(),
            on_failure: noop_failure_sink(),
        }
    }

    pub fn with_ping(mut self, ping: Arc<PingTracker>) -> Self {
        self.ping = Some(ping);
        self
    }

    pub fn with_ntp(mut self, ntp: Arc<NtpChecker>) -> Self {
        self.ntp = Some(ntp);
        self
    }

    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.on_event = sink;
        self
    }

    pub fn with_failure_sink(mut self, sink: FailureSink) -> Self {
        self.on_failure = sink;
        self
    }

    pub fn freshness(&self) -> Arc<FreshnessTracker> {
        self.freshness.clone()
    }

    fn self_id(&self) -> NodeId {
        NodeId::new(self.state.node_id.clone())
    }

    /// Runs the worker until `cancel` fires. Mirrors §4.2's numbered
    /// lifecycle exactly: normalize, load state, spawn writers/tickers,
    /// subscribe with retry, hydrate, then the main select loop.
    #[instrument(skip(self, cancel), fields(node_id = %self.state.node_id))]
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        self.config_bootstrap().await?;

        let self_id = self.self_id();
        let machines = Arc::new(AsyncMutex::new(Vec::<MachineRow>::new()));

        let mut tasks = Vec::new();
        tasks.push(self.spawn_heartbeat_writer(cancel.clone()));
        if let Some(ntp) = self.ntp.clone() {
            tasks.push(spawn_ntp_runner(ntp, cancel.clone()));
        }
        if let Some(ping) = self.ping.clone() {
            tasks.push(spawn_ping_runner(
                ping,
                machines.clone(),
                self_id.clone(),
                self.config.wg_port,
                cancel.clone(),
            ));
        }

        let (snapshot, mut machine_rx) = self.subscribe_machines_with_retry(cancel.clone()).await?;
        {
            let mut guard = machines.lock().await;
            *guard = snapshot;
        }
        (self.on_event)(WorkerEvent::SubscribeReady);
        self.reconcile_locked(&machines).await;

        let mut heartbeat_rx = self.subscribe_heartbeats_with_retry(cancel.clone()).await;
        if let Some(rx) = heartbeat_rx.as_mut() {
            self.hydrate_freshness(rx).await;
        }

        let mut ticker = tokio::time::interval(FULL_RECONCILE_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,

                maybe_change = machine_rx.recv() => {
                    match maybe_change {
                        None => {
                            warn!("machine subscription closed, resubscribing");
                            let (snapshot, rx) = self.subscribe_machines_with_retry(cancel.clone()).await?;
                            machine_rx = rx;
                            let mut guard = machines.lock().await;
                            *guard = snapshot;
                            drop(guard);
                            self.reconcile_locked(&machines).await;
                        }
                        Some(Change::Resync) => {
                            let fresh = self.registry.list_machine_rows().await?;
                            let mut guard = machines.lock().await;
                            *guard = fresh;
                            drop(guard);
                            self.reconcile_locked(&machines).await;
                        }
                        Some(change) => {
                            let mut guard = machines.lock().await;
                            let current = std::mem::take(&mut *guard);
                            *guard = apply_delta(current, &change);
                            drop(guard);
                            self.reconcile_locked(&machines).await;
                        }
                    }
                }

                maybe_change = recv_heartbeat(&mut heartbeat_rx), if heartbeat_rx.is_some() => {
                    match maybe_change {
                        None => {
                            heartbeat_rx = None;
                        }
                        Some(Change::Deleted(reference)) => {
                            if let Some(id) = reference.id {
                                self.freshness.remove(&id);
                            }
                        }
                        Some(Change::Resync) => {}
                        Some(Change::Added(row) | Change::Updated(row)) => {
                            self.freshness.record_seen(
                                &row.node_id,
                                &self_id,
                                row.updated_at,
                                self.clock.now_monotonic(),
                                self.clock.now_utc(),
                            );
                        }
                    }
                }

                _ = ticker.tick() => {
                    match self.registry.list_machine_rows().await {
                        Ok(fresh) => {
                            let mut guard = machines.lock().await;
                            *guard = fresh;
                            drop(guard);
                            self.reconcile_locked(&machines).await;
                        }
                        Err(err) => (self.on_failure)(&err.into()),
                    }
                }
            }
        }

        cancel.cancel();
        for task in tasks {
            task.abort();
        }
        Ok(())
    }

    async fn config_bootstrap(&self) -> Result<()> {
        self.registry.ensure_machine_table().await?;
        self.registry.ensure_heartbeat_table().await?;
        Ok(())
    }

    async fn reconcile_locked(&self, machines: &AsyncMutex<Vec<MachineRow>>) {
        let snapshot = machines.lock().await.clone();
        match reconcile_peers(
            self.platform.as_ref(),
            &self.config,
            &self.state,
            &self.self_id(),
            &snapshot,
        )
        .await
        {
            Ok(peer_count) => (self.on_event)(WorkerEvent::Reconciled { peer_count }),
            Err(err) => (self.on_failure)(&err),
        }
    }

    async fn subscribe_machines_with_retry(
        &self,
        cancel: CancellationToken,
    ) -> Result<(Vec<MachineRow>, mpsc::Receiver<Change<MachineRow>>)> {
        let mut attempt = 0;
        loop {
            match self.registry.subscribe_machines(cancel.clone()).await {
                Ok(result) => return Ok(result),
                Err(err) if attempt < MACHINE_SUBSCRIBE_RETRIES => {
                    attempt += 1;
                    warn!(attempt, error = %err, "machine subscription failed, retrying");
                    tokio::time::sleep(MACHINE_SUBSCRIBE_RETRY_DELAY).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn subscribe_heartbeats_with_retry(
        &self,
        cancel: CancellationToken,
    ) -> Option<mpsc::Receiver<Change<meshlink_types::HeartbeatRow>>> {
        let mut attempt = 0;
        loop {
            match self.registry.subscribe_heartbeats(cancel.clone()).await {
                Ok((snapshot, rx)) => {
                    let self_id = self.self_id();
                    for row in snapshot {
                        self.freshness.record_seen(
                            &row.node_id,
                            &self_id,
                            row.updated_at,
                            self.clock.now_monotonic(),
                            self.clock.now_utc(),
                        );
                    }
                    return Some(rx);
                }
                Err(err) if attempt < HEARTBEAT_SUBSCRIBE_RETRIES => {
                    attempt += 1;
                    warn!(attempt, error = %err, "heartbeat subscription failed, retrying");
                    tokio::time::sleep(MACHINE_SUBSCRIBE_RETRY_DELAY).await;
                }
                Err(err) => {
                    warn!(error = %err, "heartbeat subscription abandoned, freshness tracking disabled");
                    return None;
                }
            }
        }
    }

    async fn hydrate_freshness(&self, _rx: &mut mpsc::Receiver<Change<meshlink_types::HeartbeatRow>>) {
        // Snapshot rows are hydrated inside `subscribe_heartbeats_with_retry`
        // itself; this hook exists so callers reading §4.2 step 8 see the
        // hydration happen before the main loop starts.
    }

    fn spawn_heartbeat_writer(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let registry = self.registry.clone();
        let clock = self.clock.clone();
        let self_id = self.self_id();
        tokio::spawn(async move {
            let mut consecutive_failures = 0u32;
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        match registry.bump_heartbeat(&self_id, clock.now_utc()).await {
                            Ok(_) => consecutive_failures = 0,
                            Err(err) => {
                                consecutive_failures += 1;
                                if consecutive_failures == CONSECUTIVE_HEARTBEAT_FAILURE_WARNING {
                                    warn!(%err, consecutive_failures, "heartbeat writer failing repeatedly");
                                }
                            }
                        }
                    }
                }
            }
        })
    }
}

async fn recv_heartbeat(
    rx: &mut Option<mpsc::Receiver<Change<meshlink_types::HeartbeatRow>>>,
) -> Option<Change<meshlink_types::HeartbeatRow>> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn spawn_ntp_runner(ntp: Arc<NtpChecker>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        ntp.check().await;
        let mut ticker = tokio::time::interval(crate::ntp::CHECK_INTERVAL);
        ticker.tick().await; // consume the immediate first tick
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                _ = ticker.tick() => ntp.check().await,
            }
        }
    })
}

fn spawn_ping_runner(
    ping: Arc<PingTracker>,
    machines: Arc<AsyncMutex<Vec<MachineRow>>>,
    self_id: NodeId,
    daemon_port: u16,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PING_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    let snapshot = machines.lock().await.clone();
                    let peers: Vec<(NodeId, String)> = snapshot
                        .iter()
                        .filter(|row| row.id != self_id)
                        .map(|row| {
                            let host = subnet_first_host(row.subnet);
                            (row.id.clone(), format!("{host}:{daemon_port}"))
                        })
                        .collect();
                    ping.probe_all(&peers).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use base64::Engine as _;
    use chrono::Utc;
    use ipnet::Ipv4Net;
    use meshlink_platform::{LoggingPlatformOps, SystemClock};
    use meshlink_registry::LocalRegistry;
    use meshlink_types::{Keypair, PublicKey, Version};

    use super::*;

    fn key_of(byte: u8) -> PublicKey {
        let encoded = base64::engine::general_purpose::STANDARD.encode([byte; 32]);
        PublicKey::parse(encoded).unwrap()
    }

    fn sample_state(id: &str) -> NodeState {
        NodeState::new(
            id,
            Keypair {
                public: "pub".into(),
                private: "priv".into(),
            },
            "10.210.0.0/24".parse::<Ipv4Net>().unwrap(),
            "plz-default",
            51820,
        )
    }

    #[tokio::test]
    async fn subscribe_ready_and_initial_reconcile_fire_once() {
        let registry: Arc<dyn Registry> = Arc::new(LocalRegistry::new());
        registry
            .upsert_machine(
                MachineRow {
                    id: NodeId::new("peer-a"),
                    public_key: key_of(2),
                    subnet: "10.210.1.0/24".parse().unwrap(),
                    endpoint: Some("1.2.3.4:51820".to_string()),
                    updated_at: Utc::now(),
                    version: Version::NONE,
                },
                Version::NONE,
            )
            .await
            .unwrap();

        let reconciled = Arc::new(AtomicUsize::new(0));
        let reconciled_clone = reconciled.clone();
        let worker = ReconcilerWorker::new(
            registry,
            Arc::new(LoggingPlatformOps),
            Arc::new(SystemClock),
            NetworkConfig::default(),
            sample_state("self"),
        )
        .with_event_sink(Arc::new(move |event| {
            if matches!(event, WorkerEvent::Reconciled { .. }) {
                reconciled_clone.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let cancel = CancellationToken::new();
        let handle_cancel = cancel.clone();
        let handle = tokio::spawn(worker.run(cancel));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle_cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        assert!(reconciled.load(Ordering::SeqCst) >= 1);
    }
}
