//! Foxhound Preview
//!
//! Keeps the theme's client-side store in step with in-progress edits in
//! the customizer preview, without reloading the page.
//!
//! # Architecture
//!
//! Every setting change is applied in two phases:
//!
//! - **Instant**: a cheap local projection is dispatched into the store
//!   immediately (title verbatim, content auto-paragraphed).
//! - **Authoritative**: a debounced fetch of the server-rendered record
//!   replaces the projection. Only the most recently issued fetch per
//!   entity may apply its response.
//!
//! # Quick Start
//!
//! ```text
//! let session = Arc::new(PreviewSession::from_config(PreviewConfig::load()?)?);
//! let handle = session.clone().spawn();
//!
//! session.bus().set("post[page][42]", json!({ "post_title": "About us", ... }));
//! ```
//!
//! # Modules
//!
//! - `session`: Wires the bus, router, partials and store (main entry point)
//! - `router`: Routes `post` / `postmeta` changes
//! - `updater`: Instant projections and refresh plans
//! - `dedup`: Debouncing and stale-response suppression
//! - `menu`: Navigation menu tree reconstruction
//! - `partials`: Live-updatable page regions
//! - `store`: Client-side store
//! - `rest`: REST API fetch capabilities
//! - `config`: Preview configuration

pub mod autop;
pub mod bus;
pub mod config;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod menu;
pub mod models;
pub mod partials;
pub mod rest;
pub mod router;
pub mod session;
pub mod setting_id;
pub mod source;
pub mod store;
pub mod updater;

pub use bus::{SettingChange, SettingsBus};
pub use config::PreviewConfig;
pub use dedup::{RefreshOutcome, RefreshRequest, RequestDeduplicator};
pub use error::{PreviewError, PreviewResult, RefreshRejected};
pub use models::{EntityRecord, EntityType, MenuItemNode, PostSettingValue, SiteTitle};
pub use partials::{PartialKind, PartialRegistry};
pub use rest::RestClient;
pub use session::PreviewSession;
pub use setting_id::SettingRoute;
pub use source::{EntitySource, SourceTable, TitleSource};
pub use store::{Store, StoreAction};
