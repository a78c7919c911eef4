//! Runtime context.
//!
//! # Responsibilities
//! - Build every adapter from configuration, disabled ones included
//! - Own the orchestrator, the health monitors and the status publisher
//! - Start and stop the background loops
//! - Apply reloaded fallback sections while running
//!
//! # Design Decisions
//! - Fail fast: an adapter that cannot be built aborts startup
//! - Disabled backends get no health monitor
//! - Shutdown stops the loops before closing adapter connections

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backends::{
    BackendAdapter, BackendError, BackendId, CloudFunctionAdapter, DisabledAdapter, LocalBridgeAdapter,
    PrimaryAdapter, SpecialistAdapter,
};
use crate::config::validation::{validate_fallback_config, ValidationError};
use crate::config::{FallbackConfig, HealthCheckConfig, OrchestratorConfig};
use crate::health::HealthMonitor;
use crate::lifecycle::schedule::RecurringTask;
use crate::lifecycle::Shutdown;
use crate::orchestrator::{AiRequest, AiResponse, FallbackOrchestrator};
use crate::resilience::BreakerSnapshot;
use crate::status::{StatusMap, StatusPublisher, Subscription};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build {backend} adapter: {source}")]
    Adapter {
        backend: BackendId,
        #[source]
        source: BackendError,
    },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// An adapter plus the health settings its monitor runs with.
/// `None` means the adapter is not monitored.
pub type MonitoredAdapter = (Arc<dyn BackendAdapter>, Option<HealthCheckConfig>);

fn build<A, F>(backend: BackendId, enabled: bool, health: &HealthCheckConfig, make: F) -> Result<MonitoredAdapter, StartupError>
where
    A: BackendAdapter + 'static,
    F: FnOnce() -> Result<A, BackendError>,
{
    if !enabled {
        tracing::info!(backend = %backend, "Backend disabled by configuration");
        let disabled: Arc<dyn BackendAdapter> = Arc::new(DisabledAdapter::new(backend));
        return Ok((disabled, None));
    }
    let adapter: Arc<dyn BackendAdapter> = Arc::new(make().map_err(|source| StartupError::Adapter { backend, source })?);
    Ok((adapter, Some(health.clone())))
}

fn apply_fallback(orchestrator: &FallbackOrchestrator, fallback: FallbackConfig) -> Result<bool, Vec<ValidationError>> {
    validate_fallback_config(&fallback)?;
    if *orchestrator.fallback_config() == fallback {
        return Ok(false);
    }
    orchestrator.update_fallback(fallback);
    Ok(true)
}

/// Owning context for the whole orchestrator.
pub struct AssistantRuntime {
    adapters: Vec<MonitoredAdapter>,
    orchestrator: Arc<FallbackOrchestrator>,
    publisher: Arc<StatusPublisher>,
    status_interval: Duration,
    shutdown: Shutdown,
    tasks: Mutex<Vec<(BackendId, RecurringTask)>>,
    publisher_task: Mutex<Option<RecurringTask>>,
}

impl AssistantRuntime {
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self, StartupError> {
        let adapters = vec![
            build(BackendId::Primary, config.primary.enabled, &config.primary.health, || {
                PrimaryAdapter::new(&config.primary)
            })?,
            build(BackendId::LocalBridge, config.local_bridge.enabled, &config.local_bridge.health, || {
                Ok(LocalBridgeAdapter::new(&config.local_bridge))
            })?,
            build(BackendId::CloudFunction, config.cloud_function.enabled, &config.cloud_function.health, || {
                CloudFunctionAdapter::new(&config.cloud_function)
            })?,
            build(BackendId::Specialist, config.specialist.enabled, &config.specialist.health, || {
                SpecialistAdapter::new(&config.specialist)
            })?,
        ];

        Ok(Self::with_adapters(
            adapters,
            config.fallback.clone(),
            Duration::from_millis(config.status.interval_ms),
        ))
    }

    /// Assemble a runtime from prebuilt adapters.
    pub fn with_adapters(adapters: Vec<MonitoredAdapter>, fallback: FallbackConfig, status_interval: Duration) -> Self {
        let handles: Vec<Arc<dyn BackendAdapter>> = adapters.iter().map(|(adapter, _)| adapter.clone()).collect();
        Self {
            orchestrator: Arc::new(FallbackOrchestrator::new(handles.clone(), fallback)),
            publisher: Arc::new(StatusPublisher::new(handles)),
            adapters,
            status_interval,
            shutdown: Shutdown::new(),
            tasks: Mutex::new(Vec::new()),
            publisher_task: Mutex::new(None),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<(BackendId, RecurringTask)>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publisher_task(&self) -> MutexGuard<'_, Option<RecurringTask>> {
        self.publisher_task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn one health monitor per enabled adapter and the status publisher.
    /// Calling it again while running does nothing.
    pub fn start(&self) {
        let mut tasks = self.tasks();
        let mut publisher_task = self.publisher_task();
        if publisher_task.is_some() {
            return;
        }

        for (adapter, health) in &self.adapters {
            let Some(health) = health else { continue };
            let monitor = HealthMonitor::new(adapter.clone(), health);
            tasks.push((adapter.id(), monitor.spawn(self.shutdown.subscribe())));
        }
        *publisher_task = Some(self.publisher.spawn(self.status_interval, self.shutdown.subscribe()));

        tracing::info!(
            monitors = tasks.len(),
            chain = ?self.orchestrator.chain(),
            status_interval_ms = self.status_interval.as_millis() as u64,
            "Assistant runtime started"
        );
    }

    /// Answer a request. Never fails.
    pub async fn submit(&self, request: &AiRequest) -> AiResponse {
        self.orchestrator.query(request).await
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatusMap) + Send + Sync + 'static,
    {
        self.publisher.subscribe(callback)
    }

    pub fn current_status(&self) -> StatusMap {
        self.publisher.current_status()
    }

    /// Breaker diagnostics for every adapter that owns one.
    pub fn circuit_breaker_snapshot(&self) -> BTreeMap<BackendId, BreakerSnapshot> {
        self.adapters
            .iter()
            .filter_map(|(adapter, _)| adapter.circuit_breaker().map(|cb| (adapter.id(), cb.snapshot())))
            .collect()
    }

    pub fn best_backend(&self) -> BackendId {
        self.orchestrator.best_backend()
    }

    /// Swap in a new fallback section. Returns whether anything changed.
    pub fn apply_fallback_config(&self, fallback: FallbackConfig) -> Result<bool, Vec<ValidationError>> {
        apply_fallback(&self.orchestrator, fallback)
    }

    /// Apply the fallback section of every reloaded configuration until
    /// shutdown or until the sender goes away.
    pub fn follow_config_updates(&self, mut updates: mpsc::UnboundedReceiver<OrchestratorConfig>) -> JoinHandle<()> {
        let orchestrator = self.orchestrator.clone();
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    next = updates.recv() => match next {
                        Some(next) => next,
                        None => break,
                    },
                    _ = shutdown.recv() => break,
                };

                match apply_fallback(&orchestrator, next.fallback) {
                    Ok(true) => {}
                    Ok(false) => tracing::debug!("Reloaded configuration leaves the fallback section unchanged"),
                    Err(errors) => {
                        for error in &errors {
                            tracing::error!(error = %error, "Reloaded fallback section rejected");
                        }
                    }
                }
            }
            tracing::debug!("Config update loop stopped");
        })
    }

    pub fn orchestrator(&self) -> &Arc<FallbackOrchestrator> {
        &self.orchestrator
    }

    pub fn publisher(&self) -> &Arc<StatusPublisher> {
        &self.publisher
    }

    /// Current probe period of each running health monitor.
    pub fn probe_intervals(&self) -> BTreeMap<BackendId, Duration> {
        self.tasks().iter().map(|(id, task)| (*id, task.period())).collect()
    }

    pub fn shutdown_signal(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Stop background loops and close adapter connections.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();
        let stopped = {
            let mut tasks = self.tasks();
            let stopped = tasks.len();
            for (_, task) in tasks.drain(..) {
                tracing::debug!(task = task.name(), "Stopping health monitor");
                task.cancel();
            }
            if let Some(task) = self.publisher_task().take() {
                task.cancel();
            }
            stopped
        };

        for (adapter, _) in &self.adapters {
            adapter.close().await;
        }
        tracing::info!(monitors = stopped, "Assistant runtime stopped");
    }
}

impl std::fmt::Debug for AssistantRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantRuntime")
            .field("adapters", &self.adapters.len())
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}
