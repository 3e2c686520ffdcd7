//! Stack lifecycle control.
//!
//! The controller drives every service through its run-state machine:
//! Pending -> Starting -> Running -> (Stopped | Failed). Dependency waves
//! start in parallel; a wave only begins once the previous wave is fully
//! Running, which is how Pending -> Starting stays gated on dependency
//! readiness. All RunState mutation happens here, one lock per service.

use crate::config::Config;
use crate::error::{Result, SkiffError};
use crate::events::{Event, EventBus, EventType};
use crate::graph::DependencyGraph;
use crate::paths;
use crate::resources::{NetworkManager, VolumeManager};
use crate::runtime::ContainerRuntime;
use crate::state::StateManager;
use crate::types::{
    Bind, ContainerHandle, LaunchSpec, NetworkMode, RunState, ServiceRecord, ServiceSource,
    ServiceSpec, StackRecord, StackSpec,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Options for `up`.
#[derive(Debug, Clone, Default)]
pub struct UpOptions {
    /// Force image rebuilds, bypassing the engine's layer cache.
    pub build: bool,
}

/// Per-service run state plus the container handle once launched.
#[derive(Debug)]
struct ServiceRun {
    state: RunState,
    handle: Option<ContainerHandle>,
}

/// Everything a start task needs, cloned out of the controller so tasks
/// own their data.
struct StartContext {
    service: ServiceSpec,
    container_name: String,
    network: String,
    binds: Vec<Bind>,
    run: Arc<Mutex<ServiceRun>>,
    runtime: Arc<dyn ContainerRuntime>,
    events: EventBus,
    no_cache: bool,
    readiness_timeout: Duration,
    readiness_interval: Duration,
}

/// Stack lifecycle controller.
pub struct LifecycleController {
    state: Arc<StateManager>,
    runtime: Arc<dyn ContainerRuntime>,
    volumes: VolumeManager,
    networks: NetworkManager,
    events: EventBus,
    run_states: RwLock<HashMap<String, Arc<Mutex<ServiceRun>>>>,
    readiness_timeout: Duration,
    readiness_interval: Duration,
    stop_timeout: Duration,
}

impl LifecycleController {
    /// Create a controller using the default volume root.
    pub fn new(
        state: Arc<StateManager>,
        runtime: Arc<dyn ContainerRuntime>,
        config: &Config,
    ) -> Self {
        Self::with_volume_root(state, runtime, config, paths::volumes_dir())
    }

    /// Create a controller with an explicit volume backing root.
    pub fn with_volume_root(
        state: Arc<StateManager>,
        runtime: Arc<dyn ContainerRuntime>,
        config: &Config,
        volume_root: PathBuf,
    ) -> Self {
        Self {
            volumes: VolumeManager::new(Arc::clone(&state), volume_root),
            networks: NetworkManager::new(Arc::clone(&state)),
            state,
            runtime,
            events: EventBus::new(),
            run_states: RwLock::new(HashMap::new()),
            readiness_timeout: config.readiness_timeout(),
            readiness_interval: config.readiness_interval(),
            stop_timeout: config.stop_timeout(),
        }
    }

    /// Event bus handle for progress consumers.
    pub fn events(&self) -> EventBus {
        self.events.clone()
    }

    /// Current run state of a service, if the controller has seen it.
    pub async fn service_state(&self, name: &str) -> Option<RunState> {
        let states = self.run_states.read().await;
        let run = states.get(name)?;
        let state = run.lock().await.state;
        Some(state)
    }

    /// Deploy a stack: validate the dependency graph, ensure resources,
    /// start services wave by wave, and persist the result.
    ///
    /// Validation failures (cycles, dangling dependencies) abort before any
    /// side effect. A start or readiness failure rolls back every service
    /// already started, in reverse order, and surfaces the root cause.
    #[instrument(skip(self, spec, opts), fields(stack = %spec.name))]
    pub async fn up(&self, spec: &StackSpec, opts: &UpOptions) -> Result<StackRecord> {
        info!(services = spec.services.len(), "Deploying stack");

        // No side effect happens before the graph is known to be sound.
        let graph = DependencyGraph::build(&spec.services)?;
        let waves = graph.waves();
        let order = graph.order();

        match self.state.get_stack(&spec.name).await {
            Ok(_) => {
                return Err(SkiffError::StackAlreadyDeployed { stack: spec.name.clone() })
            }
            Err(SkiffError::StackNotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        {
            let mut states = self.run_states.write().await;
            states.clear();
            for service in &spec.services {
                states.insert(
                    service.name.clone(),
                    Arc::new(Mutex::new(ServiceRun { state: RunState::Pending, handle: None })),
                );
            }
        }

        let network_names = self.ensure_networks(spec).await?;
        let volume_paths = self.ensure_volumes(spec).await?;

        let start_index: HashMap<String, i64> =
            order.iter().enumerate().map(|(i, name)| (name.clone(), i as i64)).collect();

        let mut failure: Option<SkiffError> = None;

        'waves: for wave in &waves {
            let mut tasks = JoinSet::new();

            for name in wave {
                // Wave membership comes from the graph over spec.services.
                let service = spec.service(name).expect("wave member exists in spec").clone();
                let run = Arc::clone(&self.run_states.read().await[name]);
                tasks.spawn(Self::start_service(StartContext {
                    container_name: format!("{}_{}", spec.name, service.name),
                    network: service
                        .networks
                        .first()
                        .cloned()
                        .unwrap_or_else(|| spec.default_network()),
                    binds: Self::resolve_binds(&service, &volume_paths),
                    service,
                    run,
                    runtime: Arc::clone(&self.runtime),
                    events: self.events.clone(),
                    no_cache: opts.build,
                    readiness_timeout: self.readiness_timeout,
                    readiness_interval: self.readiness_interval,
                }));
            }

            while let Some(joined) = tasks.join_next().await {
                let result = joined
                    .unwrap_or_else(|e| Err(SkiffError::Internal(format!("start task: {}", e))));
                if let Err(e) = result {
                    // First failure is the root cause; the rest of the wave
                    // is allowed to finish so rollback sees settled states.
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }

            if failure.is_some() {
                break 'waves;
            }
        }

        if let Some(root_cause) = failure {
            error!(error = %root_cause, "Stack deployment failed, rolling back");
            self.rollback(spec, &start_index).await;
            self.events.publish(Event::new(
                EventType::StackFailed,
                &spec.name,
                &format!("stack {} failed: {}", spec.name, root_cause),
            ));
            return Err(root_cause);
        }

        let record = self.persist(spec, &order, &network_names).await?;
        self.events.publish(Event::new(
            EventType::StackUp,
            &spec.name,
            &format!("stack {} up ({} services)", spec.name, order.len()),
        ));
        info!("Stack deployed");
        Ok(record)
    }

    /// Tear down a stack in reverse start order.
    ///
    /// A stack that was never deployed is a no-op success. Services already
    /// Stopped or Failed are skipped idempotently.
    pub async fn down(&self, stack: &str, purge: bool) -> Result<()> {
        // Dummy signal: hold the sender so the channel never closes or fires.
        let (_tx, rx) = broadcast::channel(1);
        self.down_with_signal(stack, purge, rx).await
    }

    /// Tear down with a cancellation signal.
    ///
    /// Cancellation stops scheduling further services, but a stop already
    /// begun completes before the controller returns.
    #[instrument(skip(self, cancel), fields(stack = %stack))]
    pub async fn down_with_signal(
        &self,
        stack: &str,
        purge: bool,
        mut cancel: broadcast::Receiver<()>,
    ) -> Result<()> {
        let record = match self.state.get_stack(stack).await {
            Ok(record) => record,
            Err(SkiffError::StackNotFound { .. }) => {
                info!("Stack not deployed; nothing to do");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        info!(services = record.services.len(), "Tearing down stack");

        let mut interrupted = false;
        for service in record.services.iter().rev() {
            if cancel.try_recv().is_ok() {
                warn!(pending = %service.name, "Teardown cancelled; remaining services left as-is");
                interrupted = true;
                break;
            }

            if service.status == RunState::Stopped.to_string()
                || service.status == RunState::Failed.to_string()
            {
                debug!(service = %service.name, status = %service.status, "Already down, skipping");
                continue;
            }
            let Some(container_id) = &service.container_id else {
                debug!(service = %service.name, "No container, skipping");
                continue;
            };

            let handle = ContainerHandle {
                id: container_id.clone(),
                name: format!("{}_{}", stack, service.name),
            };

            info!(service = %service.name, container = %handle.id, "Stopping service");
            if let Err(e) = self.runtime.stop(&handle, self.stop_timeout).await {
                warn!(service = %service.name, error = %e, "Graceful stop failed, removing anyway");
            }
            if let Err(e) = self.runtime.remove(&handle).await {
                warn!(service = %service.name, error = %e, "Failed to remove container");
            }

            self.state
                .update_service(stack, &service.name, Some(container_id), "stopped")
                .await?;
            self.set_known_state(&service.name, RunState::Stopped).await;
            self.events.publish(Event::new(
                EventType::ServiceStopped,
                &service.name,
                &format!("service {} stopped", service.name),
            ));
        }

        if interrupted {
            return Err(SkiffError::Interrupted {
                operation: format!("teardown of stack '{}'", stack),
            });
        }

        self.release_resources(stack, purge).await?;
        self.state.delete_stack(stack).await?;
        self.run_states.write().await.clear();

        self.events.publish(Event::new(
            EventType::StackDown,
            stack,
            &format!("stack {} down", stack),
        ));
        info!("Stack torn down");
        Ok(())
    }

    /// Start one service and wait for its readiness probe.
    async fn start_service(ctx: StartContext) -> Result<()> {
        let name = ctx.service.name.clone();

        Self::transition(&ctx.run, RunState::Starting).await;
        ctx.events.publish(Event::new(
            EventType::ServiceStarting,
            &name,
            &format!("service {} starting", name),
        ));

        let image = match &ctx.service.source {
            ServiceSource::Image(image) => image.clone(),
            ServiceSource::Build(build) => {
                info!(service = %name, context = %build.context.display(), "Building image");
                match ctx.runtime.build(build, ctx.no_cache).await {
                    Ok(image) => image,
                    Err(e) => {
                        return Self::fail(&ctx, SkiffError::Start {
                            service: name,
                            reason: format!("build failed: {}", e),
                        })
                        .await
                    }
                }
            }
        };

        let launch = LaunchSpec {
            name: ctx.container_name.clone(),
            env: ctx.service.environment.clone(),
            ports: ctx.service.ports.clone(),
            network: Some(ctx.network.clone()),
            binds: ctx.binds.clone(),
        };

        let handle = match ctx.runtime.run(&image, &launch).await {
            Ok(handle) => handle,
            Err(e) => {
                return Self::fail(&ctx, SkiffError::Start {
                    service: name,
                    reason: e.to_string(),
                })
                .await
            }
        };
        ctx.run.lock().await.handle = Some(handle.clone());

        info!(service = %name, container = %handle.id, "Waiting for readiness");
        let started = Instant::now();
        loop {
            match ctx.runtime.readiness(&handle).await {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => warn!(service = %name, error = %e, "Readiness probe error"),
            }

            if started.elapsed() >= ctx.readiness_timeout {
                return Self::fail(&ctx, SkiffError::ReadinessTimeout {
                    service: name,
                    waited_secs: ctx.readiness_timeout.as_secs(),
                })
                .await;
            }
            tokio::time::sleep(ctx.readiness_interval).await;
        }

        Self::transition(&ctx.run, RunState::Running).await;
        ctx.events.publish(Event::new(
            EventType::ServiceStarted,
            &ctx.service.name,
            &format!("service {} running", ctx.service.name),
        ));
        Ok(())
    }

    async fn fail(ctx: &StartContext, err: SkiffError) -> Result<()> {
        Self::transition(&ctx.run, RunState::Failed).await;
        ctx.events.publish(Event::new(
            EventType::ServiceFailed,
            &ctx.service.name,
            &format!("service {} failed: {}", ctx.service.name, err),
        ));
        Err(err)
    }

    async fn transition(run: &Arc<Mutex<ServiceRun>>, next: RunState) {
        let mut run = run.lock().await;
        debug!(from = %run.state, to = %next, "Run state transition");
        run.state = next;
    }

    /// Roll back after a failed deployment: stop and remove everything that
    /// reached the runtime, in reverse start order. Pending services are
    /// untouched; the failed service keeps its Failed state.
    async fn rollback(&self, spec: &StackSpec, start_index: &HashMap<String, i64>) {
        warn!(stack = %spec.name, "Rolling back started services");

        let mut names: Vec<&ServiceSpec> = spec.services.iter().collect();
        names.sort_by_key(|s| std::cmp::Reverse(start_index.get(&s.name).copied().unwrap_or(0)));

        for service in names {
            let run = {
                let states = self.run_states.read().await;
                match states.get(&service.name) {
                    Some(run) => Arc::clone(run),
                    None => continue,
                }
            };

            let (state, handle) = {
                let run = run.lock().await;
                (run.state, run.handle.clone())
            };

            let Some(handle) = handle else { continue };
            if state != RunState::Running && state != RunState::Failed {
                continue;
            }

            info!(service = %service.name, container = %handle.id, "Rolling back");
            if let Err(e) = self.runtime.stop(&handle, Duration::from_secs(5)).await {
                warn!(service = %service.name, error = %e, "Rollback stop failed");
            }
            if let Err(e) = self.runtime.remove(&handle).await {
                warn!(service = %service.name, error = %e, "Rollback remove failed");
            }

            // The root-cause service stays Failed for post-mortem queries.
            if state == RunState::Running {
                Self::transition(&run, RunState::Stopped).await;
                self.events.publish(Event::new(
                    EventType::ServiceStopped,
                    &service.name,
                    &format!("service {} rolled back", service.name),
                ));
            }
        }
    }

    /// Ensure every network the stack references, default first so it
    /// exists before any member service starts.
    async fn ensure_networks(&self, spec: &StackSpec) -> Result<Vec<String>> {
        let mut names = vec![spec.default_network()];
        for network in &spec.networks {
            names.push(network.name.clone());
        }
        for service in &spec.services {
            for name in &service.networks {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }

        for name in &names {
            let declared_mode = spec
                .networks
                .iter()
                .find(|n| &n.name == name)
                .map(|n| n.mode)
                .unwrap_or(NetworkMode::Bridge);

            let fresh = self.networks.get(name).await?.is_none();
            self.networks.ensure(name, declared_mode).await?;
            if fresh {
                self.events.publish(Event::new(
                    EventType::NetworkCreated,
                    name,
                    &format!("network {} created", name),
                ));
            }
        }

        Ok(names)
    }

    /// Ensure declared volumes and return name -> backing path for bind
    /// resolution.
    async fn ensure_volumes(&self, spec: &StackSpec) -> Result<HashMap<String, PathBuf>> {
        let mut paths = HashMap::new();
        for volume in &spec.volumes {
            let fresh = self.volumes.get(&volume.name).await?.is_none();
            let ensured = self.volumes.ensure(&volume.name, volume.persistent).await?;
            if fresh {
                self.events.publish(Event::new(
                    EventType::VolumeCreated,
                    &volume.name,
                    &format!("volume {} created", volume.name),
                ));
            }
            paths.insert(ensured.name.clone(), ensured.path);
        }
        Ok(paths)
    }

    fn resolve_binds(service: &ServiceSpec, volume_paths: &HashMap<String, PathBuf>) -> Vec<Bind> {
        service
            .volumes
            .iter()
            .map(|mount| {
                let source = if mount.is_named() {
                    volume_paths
                        .get(&mount.source)
                        .cloned()
                        .unwrap_or_else(|| PathBuf::from(&mount.source))
                } else {
                    PathBuf::from(&mount.source)
                };
                Bind { source, target: mount.target.clone(), readonly: mount.readonly }
            })
            .collect()
    }

    /// Persist the deployed stack with per-service container ids in start
    /// order, so teardown can walk the exact reverse.
    async fn persist(
        &self,
        spec: &StackSpec,
        order: &[String],
        network_names: &[String],
    ) -> Result<StackRecord> {
        let states = self.run_states.read().await;
        let mut services = Vec::with_capacity(order.len());

        for (index, name) in order.iter().enumerate() {
            let run = states[name].lock().await;
            services.push(ServiceRecord {
                name: name.clone(),
                container_id: run.handle.as_ref().map(|h| h.id.clone()),
                status: run.state.to_string(),
                start_order: index as i64,
            });
        }

        let record = StackRecord {
            id: format!("stack_{}", Uuid::new_v4().as_simple()),
            name: spec.name.clone(),
            services,
            created_at: SystemTime::now(),
        };

        let volume_names: Vec<String> = spec.volumes.iter().map(|v| v.name.clone()).collect();
        self.state.insert_stack(&record, &volume_names, network_names).await?;
        Ok(record)
    }

    /// Drop stack-scoped resources: scratch volumes always, everything the
    /// stack declared when `purge` asks for explicit removal.
    async fn release_resources(&self, stack: &str, purge: bool) -> Result<()> {
        for name in self.state.stack_volumes(stack).await? {
            if let Some(volume) = self.volumes.get(&name).await? {
                if purge || !volume.persistent {
                    self.volumes.remove(&name).await?;
                    self.events.publish(Event::new(
                        EventType::VolumeRemoved,
                        &name,
                        &format!("volume {} removed", name),
                    ));
                }
            }
        }

        if purge {
            for name in self.state.stack_networks(stack).await? {
                if self.networks.get(&name).await?.is_some() {
                    self.networks.remove(&name).await?;
                    self.events.publish(Event::new(
                        EventType::NetworkRemoved,
                        &name,
                        &format!("network {} removed", name),
                    ));
                }
            }
        }

        Ok(())
    }

    async fn set_known_state(&self, service: &str, next: RunState) {
        let states = self.run_states.read().await;
        if let Some(run) = states.get(service) {
            Self::transition(run, next).await;
        }
    }
}

/// Create a shutdown signal receiver.
///
/// Returns a broadcast receiver that fires when SIGTERM or SIGINT is
/// received.
pub fn shutdown_signal() -> broadcast::Receiver<()> {
    let (tx, rx) = broadcast::channel(1);

    tokio::spawn(async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C)");
            }
            _ = terminate => {
                info!("Received SIGTERM");
            }
        }

        let _ = tx.send(());
    });

    rx
}
