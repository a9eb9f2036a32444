pub mod cache;
pub mod detector;
pub mod recreate;
pub mod self_guard;
pub mod settings;
pub mod update_log;

use chrono::Utc;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::docker::{DockerEngine, LogLine, demux, plain_lines};
use crate::domain::{
    BatchOutcome, ContainerCheck, ContainerSummary, DaemonInfo, RecreateOutcome, Settings,
    UpdateLogEntry,
};
use crate::errors::DockerUpdateMgrError;
use crate::ports::{DockerPort, RegistryPort, SettingsStore, UpdateLogStore};
use crate::registry::{ImageReference, RegistryClient};

use cache::UpdateCache;
use detector::UpdateDetector;
use recreate::Recreator;
use self_guard::SelfGuard;
use settings::InMemorySettings;
use update_log::InMemoryUpdateLog;

/// Runtime configuration of the composition root.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub docker_socket: PathBuf,
    pub cgroup_path: PathBuf,
    pub cache_ttl: chrono::Duration,
    pub registry_timeout: Duration,
    pub concurrency: usize,
    pub settings: Settings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            docker_socket: PathBuf::from(crate::docker::DEFAULT_SOCKET_PATH),
            cgroup_path: PathBuf::from(self_guard::DEFAULT_CGROUP_PATH),
            cache_ttl: chrono::Duration::seconds(cache::DEFAULT_TTL_SECS),
            registry_timeout: crate::registry::client::DEFAULT_TIMEOUT,
            concurrency: 1,
            settings: Settings::default(),
        }
    }
}

/// What one scheduled pass saw and did.
#[derive(Debug)]
pub struct PassReport {
    pub checks: Vec<ContainerCheck>,
    pub batch: Option<BatchOutcome>,
}

pub struct AppCore {
    docker: Arc<dyn DockerPort>,
    registry: Arc<dyn RegistryPort>,
    detector: Arc<UpdateDetector>,
    guard: Arc<SelfGuard>,
    recreator: Recreator,
    log: Arc<dyn UpdateLogStore>,
    settings: Arc<dyn SettingsStore>,
}

impl AppCore {
    /// Wire the core from its collaborators.
    pub fn new(
        docker: Arc<dyn DockerPort>,
        registry: Arc<dyn RegistryPort>,
        guard: Arc<SelfGuard>,
        config: &AppConfig,
    ) -> Self {
        let cache = Arc::new(UpdateCache::new(config.cache_ttl));
        let detector = Arc::new(UpdateDetector::new(
            Arc::clone(&docker),
            Arc::clone(&registry),
            cache,
        ));
        let log: Arc<dyn UpdateLogStore> = Arc::new(InMemoryUpdateLog::new());
        let recreator = Recreator::new(
            Arc::clone(&docker),
            Arc::clone(&detector),
            Arc::clone(&guard),
            Arc::clone(&log),
        )
        .with_concurrency(config.concurrency);

        Self {
            docker,
            registry,
            detector,
            guard,
            recreator,
            log,
            settings: Arc::new(InMemorySettings::new(config.settings.clone())),
        }
    }

    /// Build the core against the local daemon socket and real registries.
    ///
    /// # Errors
    /// Returns an error if the registry HTTP client cannot be built.
    pub fn connect(config: &AppConfig) -> Result<Self, DockerUpdateMgrError> {
        let docker: Arc<dyn DockerPort> = Arc::new(DockerEngine::new(&config.docker_socket));
        let registry: Arc<dyn RegistryPort> =
            Arc::new(RegistryClient::new(config.registry_timeout)?);
        let guard = Arc::new(SelfGuard::new(Arc::clone(&docker), &config.cgroup_path));
        Ok(Self::new(docker, registry, guard, config))
    }

    pub async fn info(&self) -> Result<DaemonInfo, DockerUpdateMgrError> {
        Ok(self.docker.info().await?)
    }

    pub async fn list_containers(
        &self,
        all: bool,
    ) -> Result<Vec<ContainerSummary>, DockerUpdateMgrError> {
        Ok(self.docker.list_containers(all).await?)
    }

    /// Detection pass over the listed containers. Per-container registry
    /// failures are reported in each result, never as an error.
    ///
    /// # Errors
    /// Returns an error if the daemon cannot list containers.
    pub async fn check(&self, all: bool) -> Result<Vec<ContainerCheck>, DockerUpdateMgrError> {
        let containers = self.docker.list_containers(all).await?;
        let checks = self.detector.check_containers(&containers).await;
        let mut settings = self.settings.get();
        settings.last_check = Some(Utc::now());
        self.settings.set(settings);
        Ok(checks)
    }

    pub async fn tags(&self, image: &str) -> Vec<String> {
        self.registry.list_tags(&ImageReference::parse(image)).await
    }

    pub async fn update(
        &self,
        container: &str,
        target_tag: Option<&str>,
    ) -> Result<RecreateOutcome, DockerUpdateMgrError> {
        Ok(self.recreator.update_container(container, target_tag).await?)
    }

    pub async fn update_all(&self) -> Result<BatchOutcome, DockerUpdateMgrError> {
        Ok(self.recreator.update_all().await?)
    }

    pub async fn start(&self, container: &str) -> Result<(), DockerUpdateMgrError> {
        match self.docker.start_container(container).await {
            Err(e) if !e.is_not_modified() => Err(e.into()),
            _ => Ok(()),
        }
    }

    pub async fn stop(&self, container: &str) -> Result<(), DockerUpdateMgrError> {
        if self.guard.is_self(container).await {
            warn!(container, "stopping the updater's own container");
        }
        match self.docker.stop_container(container).await {
            Err(e) if !e.is_not_modified() => Err(e.into()),
            _ => Ok(()),
        }
    }

    pub async fn restart(&self, container: &str) -> Result<(), DockerUpdateMgrError> {
        Ok(self.docker.restart_container(container).await?)
    }

    /// Combined stdout/stderr of a container, split into lines.
    pub async fn logs(
        &self,
        container: &str,
        tail: Option<u64>,
        since: Option<i64>,
    ) -> Result<Vec<LogLine>, DockerUpdateMgrError> {
        let snapshot = self.docker.inspect_container(container).await?;
        let raw = self.docker.container_logs(&snapshot.id, tail, since).await?;
        if snapshot.config.tty {
            Ok(plain_lines(&raw))
        } else {
            Ok(demux(&raw))
        }
    }

    /// Drop every cached update check; the next pass recomputes all.
    pub fn clear_cache(&self) {
        self.detector.cache().clear();
    }

    #[must_use]
    pub fn journal(&self) -> Vec<UpdateLogEntry> {
        self.log.list()
    }

    pub fn clear_journal(&self) {
        self.log.clear();
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        self.settings.get()
    }

    /// One scheduled pass: detect, then update everything if auto-update is on.
    ///
    /// # Errors
    /// Returns an error if the daemon cannot list containers.
    pub async fn scheduled_pass(&self) -> Result<PassReport, DockerUpdateMgrError> {
        let checks = self.check(false).await?;
        let pending = checks.iter().filter(|c| c.check.has_update).count();
        info!(containers = checks.len(), pending, "detection pass finished");

        let batch = if self.settings.get().auto_update && pending > 0 {
            Some(self.update_all().await?)
        } else {
            None
        };
        Ok(PassReport { checks, batch })
    }

    /// Run [`Self::scheduled_pass`] every `check_interval_minutes` until
    /// `shutdown` resolves. A pass in flight is allowed to finish.
    pub async fn watch<F>(&self, shutdown: impl Future<Output = ()>, mut on_pass: F)
    where
        F: FnMut(PassReport),
    {
        let minutes = self.settings.get().check_interval_minutes.max(1);
        let mut interval = tokio::time::interval(Duration::from_secs(minutes * 60));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_minutes = minutes, "watching for updates");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("watch stopped");
                    return;
                }
                _ = interval.tick() => {
                    match self.scheduled_pass().await {
                        Ok(report) => on_pass(report),
                        Err(e) => warn!(error = %e, "scheduled pass failed"),
                    }
                }
            }
        }
    }
}
