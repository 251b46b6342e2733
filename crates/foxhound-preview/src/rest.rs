//! REST API fetch capabilities
//!
//! Fetches authoritative posts, pages and the site title from the site's
//! REST API. When a changeset is configured every request carries it, so
//! the server renders the customizer's unsaved state.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::config::PreviewConfig;
use crate::error::{PreviewError, PreviewResult};
use crate::models::{EntityRecord, EntityType, SiteTitle};
use crate::source::{EntitySource, SourceTable, TitleSource};

/// Query parameter naming the customizer changeset
const CHANGESET_PARAM: &str = "customize_changeset_uuid";

/// HTTP client for the site's REST API
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    rest_root: String,
    namespace: String,
    changeset_uuid: Option<Uuid>,
}

impl RestClient {
    pub fn new(config: &PreviewConfig) -> PreviewResult<Self> {
        let rest_root = config.rest_root();
        if !(rest_root.starts_with("http://") || rest_root.starts_with("https://")) {
            return Err(PreviewError::InvalidUrl {
                url: config.site_url.clone(),
                details: "expected an http(s) URL".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent("Mozilla/5.0 (compatible; Foxhound-Preview/0.3)")
            .build()
            .map_err(|source| PreviewError::Http {
                url: rest_root.clone(),
                source,
            })?;

        Ok(Self {
            http,
            rest_root,
            namespace: config.rest_namespace.clone(),
            changeset_uuid: config.changeset_uuid,
        })
    }

    /// URL of an entity collection, e.g. `<root>/wp/v2/pages`
    pub fn collection_url(&self, entity_type: EntityType) -> String {
        format!("{}/wp/v2/{}", self.rest_root, entity_type.rest_collection())
    }

    /// URL of the site title endpoint
    pub fn title_url(&self) -> String {
        format!("{}/{}/v1/title/", self.rest_root, self.namespace)
    }

    /// Fetch one entity by slug
    pub async fn fetch_entity(
        &self,
        entity_type: EntityType,
        slug: &str,
    ) -> PreviewResult<EntityRecord> {
        let url = self.collection_url(entity_type);
        let query = [("slug", slug.to_string()), ("_embed", "true".to_string())];

        let records: Vec<EntityRecord> = self.get_json(&url, &query).await?;
        records
            .into_iter()
            .next()
            .ok_or_else(|| PreviewError::NotFound {
                entity_type,
                slug: slug.to_string(),
            })
    }

    /// Fetch the raw and rendered site title
    pub async fn fetch_site_title(&self) -> PreviewResult<SiteTitle> {
        self.get_json(&self.title_url(), &[]).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> PreviewResult<T> {
        let mut request = self.http.get(url).query(query);
        if let Some(uuid) = self.changeset_uuid {
            request = request.query(&[(CHANGESET_PARAM, uuid.to_string())]);
        }

        debug!("GET {}", url);
        let http_err = |source: reqwest::Error| PreviewError::Http {
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(PreviewError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(http_err)?;
        serde_json::from_slice(&body).map_err(|e| PreviewError::MalformedResponse {
            url: url.to_string(),
            details: e.to_string(),
        })
    }

    /// Fetch capability for one entity type
    pub fn entity_source(&self, entity_type: EntityType) -> Arc<dyn EntitySource> {
        Arc::new(RestEntitySource {
            client: self.clone(),
            entity_type,
        })
    }

    /// Capability table with posts, pages and the site title
    pub fn source_table(&self) -> SourceTable {
        SourceTable::new()
            .with_entity(EntityType::Post, self.entity_source(EntityType::Post))
            .with_entity(EntityType::Page, self.entity_source(EntityType::Page))
            .with_title(Arc::new(self.clone()))
    }
}

#[async_trait]
impl TitleSource for RestClient {
    async fn fetch_title(&self) -> PreviewResult<SiteTitle> {
        self.fetch_site_title().await
    }
}

struct RestEntitySource {
    client: RestClient,
    entity_type: EntityType,
}

#[async_trait]
impl EntitySource for RestEntitySource {
    async fn fetch_by_slug(&self, slug: &str) -> PreviewResult<EntityRecord> {
        self.client.fetch_entity(self.entity_type, slug).await
    }
}
