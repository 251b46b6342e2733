//! Client-side store
//!
//! The `Store` holds everything the rendered page reads: posts and pages by
//! id, navigation menus by location, and the site title. All mutation goes
//! through [`Store::dispatch`]; records are stored behind `Arc` and replaced
//! wholesale, never edited in place, so a reader holding an old record keeps
//! seeing the old value.
//!
//! ## Request epochs
//!
//! Each refreshable slot (an entity, or the site title) carries an epoch
//! next to its data. Starting a refresh bumps the epoch and captures it;
//! applying the response succeeds only if the epoch is still the captured
//! one. The compare and the apply happen under one lock, so the last
//! request issued wins regardless of completion order.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::new();
//! store.dispatch(StoreAction::entity_success(record));
//!
//! let post = store.entity(EntityType::Post, 42);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::trace;

use crate::models::{EntityRecord, EntityType, MenuItemNode, SiteTitle};

/// Actions accepted by the store
///
/// The serialized shape matches what the page's own data-loading path
/// produces, so views never need to know where a record came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum StoreAction {
    /// An entity was fetched (or projected) successfully
    #[serde(rename = "ENTITY_REQUEST_SUCCESS", rename_all = "camelCase")]
    EntityRequestSuccess {
        entity_id: u64,
        slug: String,
        entity: EntityRecord,
    },

    /// A menu location received a new item tree
    #[serde(rename = "MENU_RECEIVE", rename_all = "camelCase")]
    MenuReceive {
        location: String,
        items: Vec<MenuItemNode>,
    },

    /// The site title changed
    #[serde(rename = "SITE_TITLE_RECEIVE", rename_all = "camelCase")]
    SiteTitleReceive { title: SiteTitle },
}

impl StoreAction {
    /// Build the fetch-success action for a record
    pub fn entity_success(entity: EntityRecord) -> Self {
        StoreAction::EntityRequestSuccess {
            entity_id: entity.id,
            slug: entity.slug.clone(),
            entity,
        }
    }
}

/// Slot a refresh can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshKey {
    Entity(EntityType, u64),
    SiteTitle,
}

#[derive(Debug, Default)]
struct EntitySlice {
    records: HashMap<u64, Arc<EntityRecord>>,
    epochs: HashMap<u64, u64>,
}

#[derive(Debug, Default)]
struct StoreState {
    posts: EntitySlice,
    pages: EntitySlice,
    menus: HashMap<String, Arc<Vec<MenuItemNode>>>,
    site_title: Option<SiteTitle>,
    site_title_epoch: u64,
}

impl StoreState {
    fn slice(&self, entity_type: EntityType) -> &EntitySlice {
        match entity_type {
            EntityType::Post => &self.posts,
            EntityType::Page => &self.pages,
        }
    }

    fn slice_mut(&mut self, entity_type: EntityType) -> &mut EntitySlice {
        match entity_type {
            EntityType::Post => &mut self.posts,
            EntityType::Page => &mut self.pages,
        }
    }

    fn epoch(&self, key: RefreshKey) -> u64 {
        match key {
            RefreshKey::Entity(entity_type, id) => {
                self.slice(entity_type).epochs.get(&id).copied().unwrap_or(0)
            }
            RefreshKey::SiteTitle => self.site_title_epoch,
        }
    }

    fn epoch_mut(&mut self, key: RefreshKey) -> &mut u64 {
        match key {
            RefreshKey::Entity(entity_type, id) => {
                self.slice_mut(entity_type).epochs.entry(id).or_insert(0)
            }
            RefreshKey::SiteTitle => &mut self.site_title_epoch,
        }
    }

    fn apply(&mut self, action: StoreAction) {
        match action {
            StoreAction::EntityRequestSuccess {
                entity_id, entity, ..
            } => {
                let slice = self.slice_mut(entity.entity_type);
                slice.records.insert(entity_id, Arc::new(entity));
            }
            StoreAction::MenuReceive { location, items } => {
                self.menus.insert(location, Arc::new(items));
            }
            StoreAction::SiteTitleReceive { title } => {
                self.site_title = Some(title);
            }
        }
    }
}

/// Shared client-side store
#[derive(Debug)]
pub struct Store {
    state: Mutex<StoreState>,
    revision: watch::Sender<u64>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Mutex::new(StoreState::default()),
            revision,
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply an action and notify subscribers
    pub fn dispatch(&self, action: StoreAction) {
        trace!("dispatch {:?}", action);
        self.state().apply(action);
        self.bump_revision();
    }

    /// Start a refresh for `key`, returning the epoch to check on completion
    pub fn begin_request(&self, key: RefreshKey) -> u64 {
        let mut state = self.state();
        let epoch = state.epoch_mut(key);
        *epoch += 1;
        *epoch
    }

    /// Current epoch of `key` (0 if no refresh was ever issued)
    pub fn current_epoch(&self, key: RefreshKey) -> u64 {
        self.state().epoch(key)
    }

    /// Apply `action` only if no refresh for `key` started after `epoch`
    ///
    /// Returns `false` when the response was superseded and dropped.
    pub fn dispatch_if_current(&self, key: RefreshKey, epoch: u64, action: StoreAction) -> bool {
        {
            let mut state = self.state();
            if state.epoch(key) != epoch {
                return false;
            }
            state.apply(action);
        }
        self.bump_revision();
        true
    }

    /// Look up an entity by type and id
    pub fn entity(&self, entity_type: EntityType, id: u64) -> Option<Arc<EntityRecord>> {
        self.state().slice(entity_type).records.get(&id).cloned()
    }

    /// Menu tree assigned to a location
    pub fn menu(&self, location: &str) -> Option<Arc<Vec<MenuItemNode>>> {
        self.state().menus.get(location).cloned()
    }

    /// Current site title, if one was ever received
    pub fn site_title(&self) -> Option<SiteTitle> {
        self.state().site_title.clone()
    }

    /// Number of dispatches applied so far
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Subscribe to revision changes
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(entity_type: EntityType, id: u64, title: &str) -> EntityRecord {
        let mut record = EntityRecord::new(entity_type, id, format!("slug-{}", id));
        record.title.rendered = title.to_string();
        record
    }

    #[test]
    fn test_dispatch_and_select() {
        let store = Store::new();
        store.dispatch(StoreAction::entity_success(record(EntityType::Post, 1, "One")));

        let post = store.entity(EntityType::Post, 1).unwrap();
        assert_eq!(post.title.rendered, "One");
        assert!(store.entity(EntityType::Page, 1).is_none());
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_dispatch_replaces_without_mutating_old_record() {
        let store = Store::new();
        store.dispatch(StoreAction::entity_success(record(EntityType::Page, 5, "Old")));
        let before = store.entity(EntityType::Page, 5).unwrap();

        store.dispatch(StoreAction::entity_success(record(EntityType::Page, 5, "New")));
        let after = store.entity(EntityType::Page, 5).unwrap();

        assert_eq!(before.title.rendered, "Old");
        assert_eq!(after.title.rendered, "New");
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_epoch_suppresses_stale_apply() {
        let store = Store::new();
        let key = RefreshKey::Entity(EntityType::Post, 9);

        let first = store.begin_request(key);
        let second = store.begin_request(key);
        assert_eq!((first, second), (1, 2));

        let stale = StoreAction::entity_success(record(EntityType::Post, 9, "stale"));
        assert!(!store.dispatch_if_current(key, first, stale));
        assert!(store.entity(EntityType::Post, 9).is_none());
        assert_eq!(store.revision(), 0);

        let fresh = StoreAction::entity_success(record(EntityType::Post, 9, "fresh"));
        assert!(store.dispatch_if_current(key, second, fresh));
        assert_eq!(store.entity(EntityType::Post, 9).unwrap().title.rendered, "fresh");
    }

    #[test]
    fn test_epochs_are_per_slot() {
        let store = Store::new();
        store.begin_request(RefreshKey::Entity(EntityType::Post, 1));
        store.begin_request(RefreshKey::Entity(EntityType::Post, 1));

        assert_eq!(store.current_epoch(RefreshKey::Entity(EntityType::Post, 1)), 2);
        assert_eq!(store.current_epoch(RefreshKey::Entity(EntityType::Post, 2)), 0);
        assert_eq!(store.current_epoch(RefreshKey::SiteTitle), 0);
    }

    #[test]
    fn test_action_shape() {
        let action = StoreAction::entity_success(record(EntityType::Post, 3, "Three"));
        let value = serde_json::to_value(&action).unwrap();

        assert_eq!(value["type"], "ENTITY_REQUEST_SUCCESS");
        assert_eq!(value["entityId"], 3);
        assert_eq!(value["slug"], "slug-3");
        assert_eq!(value["entity"]["title"], json!({ "rendered": "Three" }));
    }

    #[tokio::test]
    async fn test_subscribe_sees_dispatch() {
        let store = Store::new();
        let mut rx = store.subscribe();

        store.dispatch(StoreAction::SiteTitleReceive {
            title: SiteTitle {
                raw: "Foxhound".to_string(),
                rendered: "Foxhound".to_string(),
            },
        });

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
        assert_eq!(store.site_title().unwrap().raw, "Foxhound");
    }
}
