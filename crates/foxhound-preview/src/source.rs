//! Fetch capabilities
//!
//! The preview never talks to the network directly. Each entity type it
//! can refresh registers an [`EntitySource`] in a [`SourceTable`]; the site
//! title comes from a [`TitleSource`]. Entity types without a registered
//! source are left alone.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PreviewResult;
use crate::models::{EntityRecord, EntityType, SiteTitle};

/// Fetches authoritative entity records by slug
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn fetch_by_slug(&self, slug: &str) -> PreviewResult<EntityRecord>;
}

/// Fetches the rendered site title
#[async_trait]
pub trait TitleSource: Send + Sync {
    async fn fetch_title(&self) -> PreviewResult<SiteTitle>;
}

/// Registered fetch capabilities, keyed by entity type
#[derive(Clone, Default)]
pub struct SourceTable {
    entities: HashMap<EntityType, Arc<dyn EntitySource>>,
    title: Option<Arc<dyn TitleSource>>,
}

impl SourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the source for an entity type (replacing any previous one)
    pub fn with_entity(mut self, entity_type: EntityType, source: Arc<dyn EntitySource>) -> Self {
        self.entities.insert(entity_type, source);
        self
    }

    /// Register the site title source
    pub fn with_title(mut self, source: Arc<dyn TitleSource>) -> Self {
        self.title = Some(source);
        self
    }

    /// Source for an entity type, if registered
    pub fn entity(&self, entity_type: EntityType) -> Option<Arc<dyn EntitySource>> {
        self.entities.get(&entity_type).cloned()
    }

    /// Whether an entity type can be refreshed
    pub fn supports(&self, entity_type: EntityType) -> bool {
        self.entities.contains_key(&entity_type)
    }

    /// Site title source, if registered
    pub fn title(&self) -> Option<Arc<dyn TitleSource>> {
        self.title.clone()
    }
}

impl std::fmt::Debug for SourceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceTable")
            .field("entities", &self.entities.keys().collect::<Vec<_>>())
            .field("title", &self.title.is_some())
            .finish()
    }
}
