#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use foxhound_preview::{
    EntityRecord, EntitySource, EntityType, PreviewError, PreviewResult, SiteTitle, TitleSource,
};
use tokio::sync::oneshot;

pub fn record(entity_type: EntityType, id: u64, slug: &str, title: &str) -> EntityRecord {
    let mut record = EntityRecord::new(entity_type, id, slug);
    record.title.rendered = title.to_string();
    record.content.rendered = format!("<p>{} content</p>", title);
    record
}

/// Entity source answering from a fixed map
pub struct FakeSource {
    entity_type: EntityType,
    records: Mutex<HashMap<String, EntityRecord>>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(entity_type: EntityType) -> Arc<Self> {
        Arc::new(Self {
            entity_type,
            records: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn insert(&self, record: EntityRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.slug.clone(), record);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntitySource for FakeSource {
    async fn fetch_by_slug(&self, slug: &str) -> PreviewResult<EntityRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .get(slug)
            .cloned()
            .ok_or_else(|| PreviewError::NotFound {
                entity_type: self.entity_type,
                slug: slug.to_string(),
            })
    }
}

/// Entity source whose responses are released by the test, one per call
pub struct GatedSource {
    gates: Mutex<VecDeque<oneshot::Receiver<EntityRecord>>>,
}

impl GatedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gates: Mutex::new(VecDeque::new()),
        })
    }

    /// Queue a gate for the next call; send on the returned sender to answer it
    pub fn gate(&self) -> oneshot::Sender<EntityRecord> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }
}

#[async_trait]
impl EntitySource for GatedSource {
    async fn fetch_by_slug(&self, slug: &str) -> PreviewResult<EntityRecord> {
        let gate = self.gates.lock().unwrap().pop_front();
        match gate {
            Some(rx) => rx.await.map_err(|_| PreviewError::MalformedResponse {
                url: slug.to_string(),
                details: "gate dropped".to_string(),
            }),
            None => Err(PreviewError::NotFound {
                entity_type: EntityType::Post,
                slug: slug.to_string(),
            }),
        }
    }
}

/// Entity source that always returns a malformed-response error
pub struct BrokenSource;

#[async_trait]
impl EntitySource for BrokenSource {
    async fn fetch_by_slug(&self, slug: &str) -> PreviewResult<EntityRecord> {
        Err(PreviewError::MalformedResponse {
            url: format!("http://example.test/wp-json/wp/v2/posts?slug={}", slug),
            details: "missing field `title`".to_string(),
        })
    }
}

/// Title source returning a fixed title
pub struct FakeTitle {
    title: SiteTitle,
    calls: AtomicUsize,
}

impl FakeTitle {
    pub fn new(raw: &str, rendered: &str) -> Arc<Self> {
        Arc::new(Self {
            title: SiteTitle {
                raw: raw.to_string(),
                rendered: rendered.to_string(),
            },
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TitleSource for FakeTitle {
    async fn fetch_title(&self) -> PreviewResult<SiteTitle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.title.clone())
    }
}
