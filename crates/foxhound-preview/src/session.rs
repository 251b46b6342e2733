//! Preview session
//!
//! Wires the pieces together for one customizer preview: the settings bus
//! feeds changes to the change router (post fields) and the partial
//! registry (site title, featured image, menus), both of which update the
//! shared store.
//!
//! ## Usage
//!
//! ```ignore
//! let session = Arc::new(PreviewSession::from_config(PreviewConfig::load()?)?);
//! let handle = session.clone().spawn();
//!
//! session.bus().set("blogname", json!("New title"));
//! handle.shutdown().await;
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::{SettingChange, SettingsBus};
use crate::config::PreviewConfig;
use crate::dedup::{RefreshScheduler, RequestDeduplicator};
use crate::error::PreviewResult;
use crate::partials::{PartialContext, PartialRefresh, PartialRegistry};
use crate::rest::RestClient;
use crate::router::{ChangeRouter, PostChange};
use crate::source::SourceTable;
use crate::store::Store;
use crate::updater::TwoPhaseUpdater;

/// What a single setting change did
#[derive(Debug, Default)]
pub struct ChangeReport {
    /// Set when the change router accepted the change
    pub post: Option<PostChange>,
    /// One entry per region that watched the setting
    pub partials: Vec<PartialRefresh>,
}

impl ChangeReport {
    /// Regions that rejected the change and need the default refresh
    pub fn fallbacks(&self) -> impl Iterator<Item = &PartialRefresh> {
        self.partials.iter().filter(|p| p.needs_fallback())
    }
}

/// Commands sent to a running session
#[derive(Debug)]
pub enum SessionCommand {
    Shutdown,
}

/// Handle for a session running in the background
pub struct SessionHandle {
    pub command_tx: mpsc::Sender<SessionCommand>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Stop the session and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.command_tx.send(SessionCommand::Shutdown).await;
        let _ = self.task.await;
    }
}

/// One customizer preview
pub struct PreviewSession {
    config: PreviewConfig,
    store: Arc<Store>,
    bus: Arc<SettingsBus>,
    sources: SourceTable,
    scheduler: Arc<RefreshScheduler>,
    updater: Arc<TwoPhaseUpdater>,
    router: ChangeRouter,
    partials: PartialRegistry,
}

impl PreviewSession {
    /// Session fetching from the site's REST API
    pub fn from_config(config: PreviewConfig) -> PreviewResult<Self> {
        let sources = RestClient::new(&config)?.source_table();
        Ok(Self::new(config, sources))
    }

    /// Session with the given fetch capabilities and the default regions
    pub fn new(config: PreviewConfig, sources: SourceTable) -> Self {
        let partials = PartialRegistry::with_defaults(&config.menu_locations);
        Self::with_partials(config, sources, partials)
    }

    /// Session with a custom set of regions
    pub fn with_partials(
        config: PreviewConfig,
        sources: SourceTable,
        partials: PartialRegistry,
    ) -> Self {
        let store = Arc::new(Store::new());
        let dedup = RequestDeduplicator::new(Arc::clone(&store), sources.clone());
        let scheduler = Arc::new(RefreshScheduler::new(dedup, config.debounce()));
        let updater = Arc::new(TwoPhaseUpdater::new(
            Arc::clone(&store),
            Arc::clone(&scheduler),
        ));
        let router = ChangeRouter::new(Arc::clone(&updater), sources.clone());

        Self {
            config,
            store,
            bus: Arc::new(SettingsBus::new()),
            sources,
            scheduler,
            updater,
            router,
            partials,
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<SettingsBus> {
        &self.bus
    }

    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    pub fn partials(&self) -> &PartialRegistry {
        &self.partials
    }

    /// Process one setting change
    ///
    /// Instant projections are in the store when this returns; deferred
    /// refreshes are scheduled. Must run inside a tokio runtime.
    pub fn handle_change(&self, change: &SettingChange) -> ChangeReport {
        let post = self.router.handle(change);

        let ctx = PartialContext {
            store: &self.store,
            settings: &self.bus,
            sources: &self.sources,
        };
        let partials = self.partials.refresh(&ctx, &self.updater, change);

        let report = ChangeReport { post, partials };
        for fallback in report.fallbacks() {
            if let Err(reason) = &fallback.result {
                debug!("{} falls back to default refresh: {}", fallback.selector, reason);
            }
        }
        report
    }

    /// Listen to the settings bus in a background task
    pub fn spawn(self: Arc<Self>) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(4);
        let changes = self.bus.subscribe();
        let task = tokio::spawn(session_task(self, changes, command_rx));

        SessionHandle { command_tx, task }
    }

    /// Cancel pending debounced refreshes
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}

async fn session_task(
    session: Arc<PreviewSession>,
    mut changes: broadcast::Receiver<SettingChange>,
    mut command_rx: mpsc::Receiver<SessionCommand>,
) {
    info!("Preview session started for {}", session.config.site_url);

    loop {
        tokio::select! {
            change = changes.recv() => {
                match change {
                    Ok(change) => {
                        session.handle_change(&change);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Preview fell behind, {} setting changes dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            cmd = command_rx.recv() => {
                if matches!(cmd, Some(SessionCommand::Shutdown) | None) {
                    break;
                }
            }
        }
    }

    session.shutdown();
    info!("Preview session stopped");
}
