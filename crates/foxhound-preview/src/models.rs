//! Data models for the preview engine
//!
//! Defines the entity records held by the store, the raw setting payloads
//! sent by the customizer, and the menu tree nodes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Entity types the preview knows how to update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Post,
    Page,
}

impl EntityType {
    /// Name used in setting identifiers and REST routes
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Post => "post",
            EntityType::Page => "page",
        }
    }

    /// REST collection the entity is fetched from (`wp/v2/<collection>`)
    pub fn rest_collection(&self) -> &'static str {
        match self {
            EntityType::Post => "posts",
            EntityType::Page => "pages",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(EntityType::Post),
            "page" => Ok(EntityType::Page),
            other => Err(other.to_string()),
        }
    }
}

/// A rendered field as returned by the REST API (`{ rendered, raw? }`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rendered {
    pub rendered: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Rendered {
    pub fn new(rendered: impl Into<String>) -> Self {
        Self {
            rendered: rendered.into(),
            raw: None,
        }
    }
}

/// A post or page as held in the store
///
/// Fields the preview never touches are kept in `extra` so a record
/// survives a projection unchanged apart from the edited fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: u64,
    pub slug: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub title: Rendered,
    pub content: Rendered,
    pub excerpt: Rendered,
    /// Attachment id of the featured image (0 when unset)
    #[serde(default)]
    pub featured_media: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityRecord {
    /// Create a record with empty rendered fields
    pub fn new(entity_type: EntityType, id: u64, slug: impl Into<String>) -> Self {
        Self {
            id,
            slug: slug.into(),
            entity_type,
            title: Rendered::default(),
            content: Rendered::default(),
            excerpt: Rendered::default(),
            featured_media: 0,
            extra: Map::new(),
        }
    }
}

/// Raw value of a `post[<type>][<id>]` setting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostSettingValue {
    #[serde(default)]
    pub post_title: String,
    #[serde(default)]
    pub post_content: String,
    #[serde(default)]
    pub post_excerpt: String,
}

/// Raw value of a `nav_menu_item[<id>]` setting
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MenuItemSetting {
    /// Parent menu item id, 0 for top level
    #[serde(default)]
    pub menu_item_parent: i64,
    /// Sort order among siblings
    #[serde(default)]
    pub position: i64,
    /// Id of the menu this item belongs to
    #[serde(default)]
    pub nav_menu_term_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub object_id: i64,
    #[serde(default)]
    pub target: String,
    #[serde(default, deserialize_with = "deserialize_classes")]
    pub classes: Vec<String>,
}

/// Menu item classes arrive either as a space separated string or an array
fn deserialize_classes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Classes {
        Joined(String),
        List(Vec<String>),
        Missing(Option<()>),
    }

    let classes = match Classes::deserialize(deserializer)? {
        Classes::Joined(s) => s.split_whitespace().map(str::to_string).collect(),
        Classes::List(list) => list.into_iter().filter(|c| !c.is_empty()).collect(),
        Classes::Missing(_) => Vec::new(),
    };
    Ok(classes)
}

/// A node in a reconstructed navigation menu
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuItemNode {
    pub id: i64,
    pub parent: i64,
    pub order: i64,
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub object: String,
    pub object_id: i64,
    pub target: String,
    pub classes: Vec<String>,
    pub children: Vec<MenuItemNode>,
}

impl MenuItemNode {
    /// Build a childless node from a setting value
    pub fn from_setting(id: i64, setting: MenuItemSetting) -> Self {
        Self {
            id,
            parent: setting.menu_item_parent,
            order: setting.position,
            title: setting.title,
            url: setting.url,
            item_type: setting.item_type,
            object: setting.object,
            object_id: setting.object_id,
            target: setting.target,
            classes: setting.classes,
            children: Vec::new(),
        }
    }
}

/// Site title as returned by the title endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteTitle {
    pub raw: String,
    pub rendered: String,
}

/// Escape text for insertion into HTML
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
