//! Two-phase updates
//!
//! A change is applied twice. First an instant projection computed locally
//! is dispatched into the store, synchronously, so the page reacts within a
//! frame. Then an authoritative refresh is scheduled and replaces the
//! projection once the server has rendered the real value.
//!
//! Handlers describe this as a [`RefreshPlan`]; the [`TwoPhaseUpdater`]
//! carries it out.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::trace;

use crate::autop::autop;
use crate::dedup::{RefreshOutcome, RefreshRequest, RefreshScheduler};
use crate::models::{escape_html, EntityRecord, EntityType, PostSettingValue, SiteTitle};
use crate::store::{Store, StoreAction};

/// How the authoritative half of a plan runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred {
    /// Debounced per key: bursts collapse into one trailing fetch
    Debounced(RefreshRequest),
    /// Issued at once, once per change
    Immediate(RefreshRequest),
}

/// Instant actions plus an optional deferred refresh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshPlan {
    pub instant: Vec<StoreAction>,
    pub deferred: Option<Deferred>,
}

impl RefreshPlan {
    /// A plan that changes nothing
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.instant.is_empty() && self.deferred.is_none()
    }
}

/// Project a post setting onto a copy of the stored record
///
/// The title is taken verbatim; content and excerpt go through [`autop`].
pub fn project_post_change(record: &EntityRecord, value: &PostSettingValue) -> EntityRecord {
    let mut projected = record.clone();
    projected.title.rendered = value.post_title.clone();
    projected.content.rendered = autop(&value.post_content);
    projected.excerpt.rendered = autop(&value.post_excerpt);
    projected
}

/// Plan for a `post[<type>][<id>]` change
///
/// `None` when the entity was never loaded: there is nothing to project onto.
pub fn plan_post_change(
    store: &Store,
    entity_type: EntityType,
    entity_id: u64,
    value: &PostSettingValue,
) -> Option<RefreshPlan> {
    let current = store.entity(entity_type, entity_id)?;
    let projected = project_post_change(&current, value);
    let request = RefreshRequest::Entity {
        entity_type,
        entity_id,
        slug: projected.slug.clone(),
    };

    Some(RefreshPlan {
        instant: vec![StoreAction::entity_success(projected)],
        deferred: Some(Deferred::Debounced(request)),
    })
}

/// Plan for a featured image change: no projection, immediate refresh
pub fn plan_featured_image_change(
    store: &Store,
    entity_type: EntityType,
    entity_id: u64,
) -> Option<RefreshPlan> {
    let current = store.entity(entity_type, entity_id)?;
    Some(RefreshPlan {
        instant: Vec::new(),
        deferred: Some(Deferred::Immediate(RefreshRequest::Entity {
            entity_type,
            entity_id,
            slug: current.slug.clone(),
        })),
    })
}

/// Plan for a site title change
pub fn plan_site_title_change(raw: &str) -> RefreshPlan {
    let title = SiteTitle {
        raw: raw.to_string(),
        rendered: escape_html(raw),
    };
    RefreshPlan {
        instant: vec![StoreAction::SiteTitleReceive { title }],
        deferred: Some(Deferred::Debounced(RefreshRequest::SiteTitle)),
    }
}

/// Carries out refresh plans against the store
pub struct TwoPhaseUpdater {
    store: Arc<Store>,
    scheduler: Arc<RefreshScheduler>,
}

impl TwoPhaseUpdater {
    pub fn new(store: Arc<Store>, scheduler: Arc<RefreshScheduler>) -> Self {
        Self { store, scheduler }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Dispatch the instant actions, then start the deferred refresh
    ///
    /// Returns the task handle for an immediate refresh.
    pub fn apply(&self, plan: RefreshPlan) -> Option<JoinHandle<RefreshOutcome>> {
        for action in plan.instant {
            self.store.dispatch(action);
        }

        match plan.deferred? {
            Deferred::Debounced(request) => {
                self.scheduler.schedule(request);
                None
            }
            Deferred::Immediate(request) => Some(self.scheduler.refresh_now(request)),
        }
    }

    /// Apply a post setting change; `false` if the entity isn't loaded
    pub fn apply_post_change(
        &self,
        entity_type: EntityType,
        entity_id: u64,
        value: &PostSettingValue,
    ) -> bool {
        match plan_post_change(&self.store, entity_type, entity_id, value) {
            Some(plan) => {
                self.apply(plan);
                true
            }
            None => {
                trace!("{} {} not loaded, skipping projection", entity_type, entity_id);
                false
            }
        }
    }

    /// Apply a featured image change
    pub fn apply_featured_image_change(
        &self,
        entity_type: EntityType,
        entity_id: u64,
    ) -> Option<JoinHandle<RefreshOutcome>> {
        let plan = plan_featured_image_change(&self.store, entity_type, entity_id)?;
        self.apply(plan)
    }

    /// Apply a site title change
    pub fn apply_site_title_change(&self, raw: &str) {
        self.apply(plan_site_title_change(raw));
    }
}
