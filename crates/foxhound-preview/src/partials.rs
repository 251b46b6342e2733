//! Partial registry
//!
//! A partial is a live-updatable region of the page. Each registered
//! [`PartialHandler`] names the settings it reacts to and, when one of them
//! changes, returns a [`RefreshPlan`] built from the current store and
//! setting values. The registry hands accepted plans to the
//! [`TwoPhaseUpdater`] and reports rejections so the caller can fall back
//! to the customizer's default refresh.
//!
//! Handlers never wait on the network: a refresh resolves as soon as the
//! client-side update is applied. The customizer's own edit shortcuts and
//! server-rendered partial refresh are turned off for every region here.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::bus::{SettingChange, SettingsBus};
use crate::error::RefreshRejected;
use crate::menu::build_location_menu;
use crate::models::EntityType;
use crate::setting_id::{post_field_control_id, SettingRoute, THUMBNAIL_META_KEY};
use crate::source::SourceTable;
use crate::store::{Store, StoreAction};
use crate::updater::{plan_featured_image_change, plan_site_title_change, RefreshPlan, TwoPhaseUpdater};

/// Region types that can be refreshed in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartialKind {
    SiteTitle,
    PostField,
    FeaturedImage,
    NavMenu,
}

/// Framework behaviors a partial keeps or turns off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartialOverrides {
    /// Let the customizer insert its own edit shortcut buttons
    pub framework_edit_shortcuts: bool,
    /// Let the customizer re-render the region on the server
    pub server_render: bool,
}

/// Read-only view handed to handlers when planning
///
/// Handlers that need other settings read them from the bus themselves,
/// so a change only pays for the lookups its regions make.
pub struct PartialContext<'a> {
    pub store: &'a Store,
    pub settings: &'a SettingsBus,
    pub sources: &'a SourceTable,
}

/// A live-updatable region
pub trait PartialHandler: Send + Sync {
    fn kind(&self) -> PartialKind;

    /// Selector of the region in the page
    fn selector(&self) -> &str;

    /// Whether a setting change concerns this region
    fn watches(&self, route: &SettingRoute) -> bool;

    /// Compute the update for a change to a watched setting
    fn plan(
        &self,
        ctx: &PartialContext<'_>,
        change: &SettingChange,
        route: &SettingRoute,
    ) -> Result<RefreshPlan, RefreshRejected>;

    fn overrides(&self) -> PartialOverrides {
        PartialOverrides::default()
    }
}

/// Site title (`blogname`)
pub struct SiteTitlePartial {
    selector: String,
}

impl SiteTitlePartial {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

impl PartialHandler for SiteTitlePartial {
    fn kind(&self) -> PartialKind {
        PartialKind::SiteTitle
    }

    fn selector(&self) -> &str {
        &self.selector
    }

    fn watches(&self, route: &SettingRoute) -> bool {
        matches!(route, SettingRoute::SiteTitle)
    }

    fn plan(
        &self,
        _ctx: &PartialContext<'_>,
        change: &SettingChange,
        _route: &SettingRoute,
    ) -> Result<RefreshPlan, RefreshRejected> {
        let raw = change
            .get()
            .as_str()
            .ok_or_else(|| RefreshRejected::UnhandledSetting(change.id.clone()))?;
        Ok(plan_site_title_change(raw))
    }
}

/// Which rendered field of a post a region shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostField {
    Title,
    Content,
    Excerpt,
}

impl PostField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostField::Title => "title",
            PostField::Content => "content",
            PostField::Excerpt => "excerpt",
        }
    }
}

/// A post title, content or excerpt region
///
/// The store is updated by the change router; this region only re-reads
/// it, and checks the entity type is one the preview can handle.
pub struct PostFieldPartial {
    selector: String,
    field: PostField,
}

impl PostFieldPartial {
    pub fn new(selector: impl Into<String>, field: PostField) -> Self {
        Self {
            selector: selector.into(),
            field,
        }
    }

    pub fn field(&self) -> PostField {
        self.field
    }

    /// Control focused by this region's edit shortcut
    pub fn control_id(&self, entity_type: EntityType, entity_id: u64) -> String {
        post_field_control_id(entity_type, entity_id, self.field.as_str())
    }

    /// Current rendered markup of the field
    pub fn render(&self, store: &Store, entity_type: EntityType, entity_id: u64) -> Option<String> {
        let record = store.entity(entity_type, entity_id)?;
        let field = match self.field {
            PostField::Title => &record.title,
            PostField::Content => &record.content,
            PostField::Excerpt => &record.excerpt,
        };
        Some(field.rendered.clone())
    }
}

impl PartialHandler for PostFieldPartial {
    fn kind(&self) -> PartialKind {
        PartialKind::PostField
    }

    fn selector(&self) -> &str {
        &self.selector
    }

    fn watches(&self, route: &SettingRoute) -> bool {
        matches!(
            route,
            SettingRoute::Post { .. } | SettingRoute::UnsupportedPost { .. }
        )
    }

    fn plan(
        &self,
        ctx: &PartialContext<'_>,
        _change: &SettingChange,
        route: &SettingRoute,
    ) -> Result<RefreshPlan, RefreshRejected> {
        match route {
            SettingRoute::Post { entity_type, .. } if ctx.sources.supports(*entity_type) => {
                Ok(RefreshPlan::none())
            }
            SettingRoute::Post { entity_type, .. } => Err(
                RefreshRejected::UnsupportedEntityType(entity_type.to_string()),
            ),
            SettingRoute::UnsupportedPost { type_name, .. } => {
                Err(RefreshRejected::UnsupportedEntityType(type_name.clone()))
            }
            _ => Err(RefreshRejected::UnhandledSetting(format!("{:?}", route))),
        }
    }
}

/// Featured image of a post (`postmeta[<type>][<id>][_thumbnail_id]`)
pub struct FeaturedImagePartial {
    selector: String,
}

impl FeaturedImagePartial {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

impl PartialHandler for FeaturedImagePartial {
    fn kind(&self) -> PartialKind {
        PartialKind::FeaturedImage
    }

    fn selector(&self) -> &str {
        &self.selector
    }

    fn watches(&self, route: &SettingRoute) -> bool {
        match route {
            SettingRoute::PostMeta { meta_key, .. }
            | SettingRoute::UnsupportedPostMeta { meta_key, .. } => meta_key == THUMBNAIL_META_KEY,
            _ => false,
        }
    }

    fn plan(
        &self,
        ctx: &PartialContext<'_>,
        change: &SettingChange,
        route: &SettingRoute,
    ) -> Result<RefreshPlan, RefreshRejected> {
        let (entity_type, entity_id) = match route {
            SettingRoute::PostMeta {
                entity_type,
                entity_id,
                ..
            } => (entity_type, entity_id),
            SettingRoute::UnsupportedPostMeta { type_name, .. } => {
                return Err(RefreshRejected::UnsupportedEntityType(type_name.clone()));
            }
            _ => return Err(RefreshRejected::UnhandledSetting(change.id.clone())),
        };

        if !ctx.sources.supports(*entity_type) {
            return Err(RefreshRejected::UnsupportedEntityType(
                entity_type.to_string(),
            ));
        }

        // Not loaded means not on screen: nothing to refresh
        Ok(plan_featured_image_change(ctx.store, *entity_type, *entity_id)
            .unwrap_or_else(RefreshPlan::none))
    }
}

/// Navigation menu shown at a theme location
pub struct NavMenuPartial {
    selector: String,
    location: String,
}

impl NavMenuPartial {
    pub fn new(selector: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            location: location.into(),
        }
    }

    /// Default region for a location
    pub fn for_location(location: &str) -> Self {
        let selector = if location == "primary" {
            "#site-navigation".to_string()
        } else {
            format!("#{}-navigation", location)
        };
        Self::new(selector, location)
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl PartialHandler for NavMenuPartial {
    fn kind(&self) -> PartialKind {
        PartialKind::NavMenu
    }

    fn selector(&self) -> &str {
        &self.selector
    }

    fn watches(&self, route: &SettingRoute) -> bool {
        match route {
            SettingRoute::NavMenuItem { .. } => true,
            SettingRoute::NavMenuLocation { location } => *location == self.location,
            _ => false,
        }
    }

    fn plan(
        &self,
        ctx: &PartialContext<'_>,
        _change: &SettingChange,
        _route: &SettingRoute,
    ) -> Result<RefreshPlan, RefreshRejected> {
        let items = build_location_menu(&ctx.settings.snapshot(), &self.location)?;
        Ok(RefreshPlan {
            instant: vec![StoreAction::MenuReceive {
                location: self.location.clone(),
                items,
            }],
            deferred: None,
        })
    }
}

/// Outcome of refreshing one region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRefresh {
    pub kind: PartialKind,
    pub selector: String,
    pub result: Result<(), RefreshRejected>,
}

impl PartialRefresh {
    /// Whether the customizer should fall back to its default refresh
    pub fn needs_fallback(&self) -> bool {
        self.result.is_err()
    }
}

/// Registered region handlers, kept in registration order
#[derive(Default)]
pub struct PartialRegistry {
    handlers: Vec<Arc<dyn PartialHandler>>,
}

impl PartialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the theme's standard regions
    pub fn with_defaults(menu_locations: &[String]) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SiteTitlePartial::new(".site-title a")));
        registry.register(Arc::new(PostFieldPartial::new(".entry-title", PostField::Title)));
        registry.register(Arc::new(PostFieldPartial::new(".entry-content", PostField::Content)));
        registry.register(Arc::new(PostFieldPartial::new(".entry-summary", PostField::Excerpt)));
        registry.register(Arc::new(FeaturedImagePartial::new(".entry-image")));
        for location in menu_locations {
            registry.register(Arc::new(NavMenuPartial::for_location(location)));
        }
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn PartialHandler>) {
        self.handlers.push(handler);
    }

    /// Handlers registered for a region type, in registration order
    pub fn handlers(&self, kind: PartialKind) -> impl Iterator<Item = &Arc<dyn PartialHandler>> {
        self.handlers.iter().filter(move |h| h.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refresh every region that watches the changed setting
    ///
    /// Results come back in registration order.
    pub fn refresh(
        &self,
        ctx: &PartialContext<'_>,
        updater: &TwoPhaseUpdater,
        change: &SettingChange,
    ) -> Vec<PartialRefresh> {
        let Some(route) = SettingRoute::parse(&change.id) else {
            return Vec::new();
        };

        let mut results = Vec::new();
        for handler in &self.handlers {
            if !handler.watches(&route) {
                continue;
            }

            let result = handler.plan(ctx, change, &route).map(|plan| {
                if !plan.is_empty() {
                    updater.apply(plan);
                }
            });
            match &result {
                Ok(()) => trace!("Refreshed {}", handler.selector()),
                Err(reason) => debug!("Partial {} rejected: {}", handler.selector(), reason),
            }

            results.push(PartialRefresh {
                kind: handler.kind(),
                selector: handler.selector().to_string(),
                result,
            });
        }
        results
    }
}
