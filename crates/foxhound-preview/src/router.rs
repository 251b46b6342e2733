//! Change router
//!
//! Decomposes `post[...]` and `postmeta[...]` setting changes and hands
//! post changes to the [`TwoPhaseUpdater`]. Every other setting kind is
//! left to the partial registry. Unsupported shapes are dropped without a
//! trace above `trace` level.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::bus::SettingChange;
use crate::models::{EntityType, PostSettingValue};
use crate::setting_id::SettingRoute;
use crate::source::SourceTable;
use crate::updater::TwoPhaseUpdater;

/// A change the router accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostChange {
    /// A post field change; the entity was projected if loaded
    Post {
        entity_type: EntityType,
        entity_id: u64,
        projected: bool,
    },
    /// A post meta change (applied by partials, if any)
    Meta {
        entity_type: EntityType,
        entity_id: u64,
        meta_key: String,
    },
}

/// Routes post and postmeta changes
pub struct ChangeRouter {
    updater: Arc<TwoPhaseUpdater>,
    sources: SourceTable,
}

impl ChangeRouter {
    pub fn new(updater: Arc<TwoPhaseUpdater>, sources: SourceTable) -> Self {
        Self { updater, sources }
    }

    /// Handle a setting change
    ///
    /// Returns `None` when the identifier isn't a supported post or
    /// postmeta shape, or the payload couldn't be read.
    pub fn handle(&self, change: &SettingChange) -> Option<PostChange> {
        let route = SettingRoute::parse(&change.id)?;

        match route {
            SettingRoute::Post {
                entity_type,
                entity_id,
                ..
            } => {
                if !self.sources.supports(entity_type) {
                    trace!("{} has no fetch capability, ignoring {}", entity_type, change.id);
                    return None;
                }

                let value: PostSettingValue = match serde_json::from_value(change.get().clone()) {
                    Ok(value) => value,
                    Err(e) => {
                        debug!("Unreadable value for {}: {}", change.id, e);
                        return None;
                    }
                };

                let projected = self
                    .updater
                    .apply_post_change(entity_type, entity_id, &value);
                Some(PostChange::Post {
                    entity_type,
                    entity_id,
                    projected,
                })
            }
            SettingRoute::PostMeta {
                entity_type,
                entity_id,
                meta_key,
            } => {
                if !self.sources.supports(entity_type) {
                    return None;
                }
                Some(PostChange::Meta {
                    entity_type,
                    entity_id,
                    meta_key,
                })
            }
            SettingRoute::UnsupportedPost { .. }
            | SettingRoute::UnsupportedPostMeta { .. }
            | SettingRoute::NavMenuItem { .. }
            | SettingRoute::NavMenuLocation { .. }
            | SettingRoute::SiteTitle => None,
        }
    }
}
