//! Navigation menu reconstruction
//!
//! The customizer holds a menu as a flat set of `nav_menu_item[<id>]`
//! settings, each naming its parent and position. The page wants a tree.
//!
//! The build is a single pass: siblings under a parent are taken out of
//! the working set, sorted by position, and each one recurses into its own
//! id. Every item is consumed at most once, so cyclic parent links cannot
//! loop. Items whose parent is never reached (missing, deleted, or part of
//! a cycle) are dropped rather than promoted to the top level.

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

use crate::error::RefreshRejected;
use crate::models::{MenuItemNode, MenuItemSetting};
use crate::setting_id::{menu_location_setting, SettingRoute};

/// Menu id assigned to a location, if any
///
/// An unset location, or one set to 0, has no menu.
pub fn assigned_menu(settings: &HashMap<String, Value>, location: &str) -> Option<i64> {
    settings
        .get(&menu_location_setting(location))
        .and_then(Value::as_i64)
        .filter(|id| *id != 0)
}

/// Collect the items of one menu from the full setting set
///
/// Deleted items (value `false`) and unreadable values are skipped. The
/// result is ordered by item id.
pub fn collect_menu_items(settings: &HashMap<String, Value>, menu_id: i64) -> Vec<MenuItemNode> {
    let mut items: Vec<MenuItemNode> = settings
        .iter()
        .filter_map(|(id, value)| {
            let Some(SettingRoute::NavMenuItem { item_id }) = SettingRoute::parse(id) else {
                return None;
            };
            if !value.is_object() {
                return None;
            }
            match serde_json::from_value::<MenuItemSetting>(value.clone()) {
                Ok(setting) if setting.nav_menu_term_id == menu_id => {
                    Some(MenuItemNode::from_setting(item_id, setting))
                }
                Ok(_) => None,
                Err(e) => {
                    trace!("Skipping unreadable menu item {}: {}", id, e);
                    None
                }
            }
        })
        .collect();

    items.sort_by_key(|item| item.id);
    items
}

/// Build a forest from flat items, starting at parent 0
pub fn build_tree(mut items: Vec<MenuItemNode>) -> Vec<MenuItemNode> {
    take_children(&mut items, 0)
}

fn take_children(items: &mut Vec<MenuItemNode>, parent: i64) -> Vec<MenuItemNode> {
    let (mut siblings, rest): (Vec<_>, Vec<_>) =
        std::mem::take(items).into_iter().partition(|item| item.parent == parent);
    *items = rest;

    if siblings.is_empty() {
        return siblings;
    }

    // Stable: equal positions keep their incoming order
    siblings.sort_by_key(|item| item.order);
    for sibling in &mut siblings {
        sibling.children = take_children(items, sibling.id);
    }
    siblings
}

/// Build the menu tree shown at `location`
pub fn build_location_menu(
    settings: &HashMap<String, Value>,
    location: &str,
) -> Result<Vec<MenuItemNode>, RefreshRejected> {
    let menu_id = assigned_menu(settings, location)
        .ok_or_else(|| RefreshRejected::NoMenuAssigned(location.to_string()))?;
    Ok(build_tree(collect_menu_items(settings, menu_id)))
}
