//! Resolved overlays and preview selection
//!
//! A `ResolvedOverlay` is the flat field mapping handed to the compositor,
//! plus bookkeeping fields (`_original_name`, `_template` or `_direct`).

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::Serialize;

use crate::value::{Mapping, Value};

pub const ORIGINAL_NAME_FIELD: &str = "_original_name";
pub const TEMPLATE_FIELD: &str = "_template";
pub const DIRECT_FIELD: &str = "_direct";

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ResolvedOverlay {
    fields: Mapping,
}

impl ResolvedOverlay {
    /// Overlay produced by one or more template calls.
    pub fn from_templates(original_name: &str, mut fields: Mapping, templates: &[String]) -> Self {
        fields.insert(ORIGINAL_NAME_FIELD.to_string(), Value::from(original_name));
        fields.insert(TEMPLATE_FIELD.to_string(), Value::from(templates.join(", ")));
        Self { fields }
    }

    /// Overlay declared directly, without templates.
    pub fn direct(original_name: &str, mut fields: Mapping) -> Self {
        fields.insert(ORIGINAL_NAME_FIELD.to_string(), Value::from(original_name));
        fields.insert(DIRECT_FIELD.to_string(), Value::Bool(true));
        Self { fields }
    }

    pub fn fields(&self) -> &Mapping {
        &self.fields
    }

    pub fn into_fields(self) -> Mapping {
        self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn original_name(&self) -> Option<&str> {
        self.get(ORIGINAL_NAME_FIELD).and_then(Value::as_str)
    }

    pub fn is_direct(&self) -> bool {
        self.get(DIRECT_FIELD).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Template names used to build this overlay, in call order.
    pub fn template_names(&self) -> Vec<&str> {
        self.get(TEMPLATE_FIELD)
            .and_then(Value::as_str)
            .map(|s| s.split(", ").filter(|n| !n.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn group(&self) -> Option<String> {
        self.get("group")
            .filter(|v| !v.is_null())
            .map(Value::to_display_string)
            .filter(|g| !g.is_empty())
    }

    /// Tie-break weight inside a group; missing or non-numeric counts as 0.
    pub fn weight(&self) -> f64 {
        self.get("weight").and_then(Value::as_f64).unwrap_or(0.0)
    }

    /// Best available label: original entry name, then `display_name`, then `name`.
    pub fn display_name(&self) -> String {
        [ORIGINAL_NAME_FIELD, "display_name", "name"]
            .iter()
            .filter_map(|field| self.get(field))
            .map(Value::to_display_string)
            .find(|label| !label.is_empty())
            .unwrap_or_default()
    }
}

fn is_rating_group(group: &str) -> bool {
    group.starts_with("rating") && group.ends_with("_group")
}

fn is_fresh(overlay: &ResolvedOverlay) -> bool {
    overlay.display_name().contains("Fresh")
}

/// Keep one representative overlay per `group` for a single-poster preview.
///
/// Ungrouped overlays keep their order; group representatives follow in
/// first-seen group order. Rating groups prefer a `Fresh` variant, other
/// groups the strictly highest weight.
pub fn select_for_preview(overlays: Vec<ResolvedOverlay>) -> Vec<ResolvedOverlay> {
    let mut ungrouped = Vec::new();
    let mut groups: IndexMap<String, ResolvedOverlay> = IndexMap::new();

    for overlay in overlays {
        let Some(group) = overlay.group() else {
            ungrouped.push(overlay);
            continue;
        };
        match groups.entry(group) {
            Entry::Vacant(slot) => {
                slot.insert(overlay);
            }
            Entry::Occupied(mut slot) => {
                let replace = if is_rating_group(slot.key()) {
                    is_fresh(&overlay) && !is_fresh(slot.get())
                } else {
                    overlay.weight() > slot.get().weight()
                };
                if replace {
                    slot.insert(overlay);
                }
            }
        }
    }

    ungrouped.extend(groups.into_values());
    ungrouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(name: &str, yaml: &str) -> ResolvedOverlay {
        let fields = serde_yaml::from_str::<Value>(yaml)
            .ok()
            .and_then(|v| v.as_mapping().cloned())
            .unwrap_or_default();
        ResolvedOverlay::from_templates(name, fields, &["standard".to_string()])
    }

    fn names(list: &[ResolvedOverlay]) -> Vec<&str> {
        list.iter().filter_map(ResolvedOverlay::original_name).collect()
    }

    #[test]
    fn bookkeeping_fields() {
        let o = ResolvedOverlay::from_templates("4K-HDR", Mapping::new(), &["standard".to_string(), "extra".to_string()]);
        assert_eq!(o.original_name(), Some("4K-HDR"));
        assert_eq!(o.template_names(), ["standard", "extra"]);
        assert!(!o.is_direct());

        let d = ResolvedOverlay::direct("logo", Mapping::new());
        assert!(d.is_direct());
        assert!(d.get(TEMPLATE_FIELD).is_none());
    }

    #[test]
    fn serializes_as_flat_mapping() {
        let o = overlay("x", "name: x\nweight: 5");
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["weight"], 5);
        assert_eq!(json["_original_name"], "x");
    }

    #[test]
    fn highest_weight_wins_outside_rating_groups() {
        let picked = select_for_preview(vec![
            overlay("720p", "group: resolution\nweight: 10"),
            overlay("plain", "name: plain"),
            overlay("4K", "group: resolution\nweight: 50"),
            overlay("1080p", "group: resolution\nweight: 50"),
        ]);
        assert_eq!(names(&picked), ["plain", "4K"]);
    }

    #[test]
    fn rating_groups_prefer_fresh() {
        let picked = select_for_preview(vec![
            overlay("Rotten", "group: rating1_group\nweight: 90"),
            overlay("Fresh", "group: rating1_group\nweight: 1"),
            overlay("Certified-Fresh", "group: rating1_group\nweight: 100"),
        ]);
        assert_eq!(names(&picked), ["Fresh"]);
    }

    #[test]
    fn groups_follow_first_seen_order() {
        let picked = select_for_preview(vec![
            overlay("a", "group: b_group"),
            overlay("b", "group: a_group"),
            overlay("c", "name: c"),
        ]);
        assert_eq!(names(&picked), ["c", "a", "b"]);
    }

    #[test]
    fn display_name_fallbacks() {
        let mut fields = Mapping::new();
        fields.insert("display_name".into(), "Shown".into());
        fields.insert("name".into(), "raw".into());
        let o = ResolvedOverlay { fields };
        assert_eq!(o.display_name(), "Shown");
        assert_eq!(o.weight(), 0.0);
    }

    #[test]
    fn display_name_skips_empty_labels() {
        let mut fields = Mapping::new();
        fields.insert("display_name".into(), Value::Null);
        fields.insert("name".into(), "raw".into());
        let o = ResolvedOverlay::from_templates("", fields, &["standard".to_string()]);
        assert_eq!(o.display_name(), "raw");
    }
}
