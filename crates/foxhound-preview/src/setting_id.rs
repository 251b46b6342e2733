//! Setting identifier parsing
//!
//! Customizer settings are named with bracketed keys such as
//! `post[page][42]`, `postmeta[post][7][_thumbnail_id]` or
//! `nav_menu_item[-12]`. The first segment is the setting kind, the rest
//! are qualifiers consumed left to right.
//!
//! Identifiers that do not match a known shape produce no route at all.
//! That is a filter, not an error: the preview only reacts to settings it
//! understands and lets the customizer handle everything else. A well-formed
//! post or postmeta id naming an entity type the preview doesn't know still
//! gets a route, so the regions showing it can ask for a fallback.

use crate::models::EntityType;

/// Setting id of the site title
pub const SITE_TITLE_SETTING: &str = "blogname";

/// Meta key holding the featured image attachment id
pub const THUMBNAIL_META_KEY: &str = "_thumbnail_id";

/// A setting identifier split into its bracketed segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingId {
    segments: Vec<String>,
}

impl SettingId {
    /// Split `kind[a][b]` into `["kind", "a", "b"]`
    pub fn parse(id: &str) -> Self {
        let segments = id.replace(']', "").split('[').map(str::to_string).collect();
        Self { segments }
    }

    /// The setting kind (first segment)
    pub fn kind(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or_default()
    }

    /// Qualifier segments after the kind
    pub fn qualifiers(&self) -> &[String] {
        self.segments.get(1..).unwrap_or_default()
    }
}

/// Typed routes for the setting shapes the preview understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingRoute {
    /// `post[<type>][<id>]`, optionally followed by a field name
    Post {
        entity_type: EntityType,
        entity_id: u64,
        field: Option<String>,
    },
    /// `postmeta[<type>][<id>][<meta_key>]`
    PostMeta {
        entity_type: EntityType,
        entity_id: u64,
        meta_key: String,
    },
    /// `post[<type>][<id>]` for a type other than post or page
    UnsupportedPost { type_name: String, entity_id: u64 },
    /// `postmeta[<type>][<id>][<meta_key>]` for a type other than post or page
    UnsupportedPostMeta {
        type_name: String,
        entity_id: u64,
        meta_key: String,
    },
    /// `nav_menu_item[<id>]` (placeholder items have negative ids)
    NavMenuItem { item_id: i64 },
    /// `nav_menu_locations[<location>]`
    NavMenuLocation { location: String },
    /// `blogname`
    SiteTitle,
}

impl SettingRoute {
    /// Parse a raw setting id into a route
    ///
    /// Returns `None` for unsupported kinds, non-numeric ids and missing
    /// qualifiers. Unknown entity types map to the `Unsupported*` routes.
    pub fn parse(id: &str) -> Option<Self> {
        let setting = SettingId::parse(id);
        let mut rest = setting.qualifiers().iter().map(String::as_str);

        match setting.kind() {
            "post" | "postmeta" => {
                let type_name = rest.next().filter(|t| !t.is_empty())?;
                let entity_id = rest.next()?.parse::<u64>().ok()?;
                let entity_type = type_name.parse::<EntityType>().ok();

                if setting.kind() == "post" {
                    let field = rest.next().filter(|f| !f.is_empty()).map(str::to_string);
                    return Some(match entity_type {
                        Some(entity_type) => SettingRoute::Post {
                            entity_type,
                            entity_id,
                            field,
                        },
                        None => SettingRoute::UnsupportedPost {
                            type_name: type_name.to_string(),
                            entity_id,
                        },
                    });
                }

                let meta_key = rest.next().filter(|k| !k.is_empty())?.to_string();
                Some(match entity_type {
                    Some(entity_type) => SettingRoute::PostMeta {
                        entity_type,
                        entity_id,
                        meta_key,
                    },
                    None => SettingRoute::UnsupportedPostMeta {
                        type_name: type_name.to_string(),
                        entity_id,
                        meta_key,
                    },
                })
            }
            "nav_menu_item" => {
                let item_id = rest.next()?.parse::<i64>().ok()?;
                Some(SettingRoute::NavMenuItem { item_id })
            }
            "nav_menu_locations" => {
                let location = rest.next().filter(|l| !l.is_empty())?;
                Some(SettingRoute::NavMenuLocation {
                    location: location.to_string(),
                })
            }
            SITE_TITLE_SETTING if setting.qualifiers().is_empty() => Some(SettingRoute::SiteTitle),
            _ => None,
        }
    }
}

/// Setting id of a menu location assignment
pub fn menu_location_setting(location: &str) -> String {
    format!("nav_menu_locations[{}]", location)
}

/// Control id focused when a post field's edit shortcut is clicked
pub fn post_field_control_id(entity_type: EntityType, entity_id: u64, field: &str) -> String {
    format!("post[{}][{}][post_{}]", entity_type, entity_id, field)
}
