//! Overlay file expansion
//!
//! Drives the engine for one overlay file:
//! 1. load the file and expand shorthand user variables
//! 2. load the external template library and its `template_variables`
//! 3. merge local templates over external ones
//! 4. resolve every overlay entry through its template calls, or directly
//!
//! Every failure is fail-soft: a broken file yields no overlays.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::conditional::{parse_conditionals, Conditionals};
use crate::config::EngineConfig;
use crate::library::{read_yaml_file, TemplateLibrary, DEFAULT_SOURCE};
use crate::limits::ResolveLimits;
use crate::overlay::ResolvedOverlay;
use crate::template::{TemplateDefinition, TemplateProcessor};
use crate::value::{Mapping, Value, Variables};

/// Template name used by a mapping call that omits `name`
const DEFAULT_TEMPLATE_NAME: &str = "standard";

/// One entry of an overlay's `template:` field
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateCall {
    pub name: String,
    pub overrides: Variables,
}

impl TemplateCall {
    /// Normalize a `template:` field (name, mapping, or a list of either).
    pub fn parse_all(raw: &Value) -> Vec<Self> {
        match raw {
            Value::Sequence(items) => items.iter().filter_map(Self::parse).collect(),
            other => Self::parse(other).into_iter().collect(),
        }
    }

    fn parse(raw: &Value) -> Option<Self> {
        match raw {
            Value::String(name) => Some(Self {
                name: name.clone(),
                overrides: Variables::new(),
            }),
            Value::Mapping(map) => {
                let name = map
                    .get("name")
                    .filter(|v| !v.is_null())
                    .map(Value::to_display_string)
                    .unwrap_or_else(|| DEFAULT_TEMPLATE_NAME.to_string());
                let overrides = map
                    .iter()
                    .filter(|(k, _)| k.as_str() != "name")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Some(Self { name, overrides })
            }
            _ => None,
        }
    }
}

/// Expand `ratingN: "<type> / <image>"` shorthand into `ratingN` and
/// `ratingN_image` for the first `count` rating slots.
pub fn expand_shorthand(vars: &Variables, count: usize) -> Variables {
    let mut expanded = vars.clone();
    for index in 1..=count {
        let key = format!("rating{index}");
        let Some((kind, image)) = expanded
            .get(&key)
            .and_then(Value::as_str)
            .and_then(|raw| raw.split_once(" / "))
            .map(|(kind, image)| (kind.trim().to_string(), image.trim().to_string()))
        else {
            continue;
        };
        info!(variable = %key, kind = %kind, image = %image, "expanded rating shorthand");
        expanded.insert(format!("{key}_image"), Value::from(image));
        expanded.insert(key, Value::from(kind));
    }
    expanded
}

/// Split an `external_templates.template_variables` block into plain
/// variables and conditionals. Entries of the nested `default` mapping only
/// fill variables not declared directly.
pub fn split_template_variables(raw: &Mapping) -> (Variables, Conditionals) {
    let mut variables = Variables::new();
    let mut conditionals = Conditionals::new();

    for (key, value) in raw {
        match (key.as_str(), value) {
            ("default", Value::Mapping(_)) => {}
            ("conditionals", Value::Mapping(conds)) => {
                conditionals.extend(parse_conditionals(conds));
            }
            _ => {
                variables.insert(key.clone(), value.clone());
            }
        }
    }
    if let Some(defaults) = raw.get("default").and_then(Value::as_mapping) {
        for (key, value) in defaults {
            variables.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    (variables, conditionals)
}

/// Derive the `key` variable from an overlay name: the text after the last `-`.
pub fn key_from_name(name: &str) -> &str {
    name.rsplit('-').next().unwrap_or(name)
}

/// Declared overlay names of a file, in order. Empty on any load failure.
pub fn overlay_keys(path: impl AsRef<Path>) -> Vec<String> {
    match read_yaml_file(path.as_ref()) {
        Ok(doc) => doc
            .get("overlays")
            .and_then(Value::as_mapping)
            .map(|overlays| overlays.keys().cloned().collect())
            .unwrap_or_default(),
        Err(e) => {
            warn!(path = %path.as_ref().display(), error = %e, "failed to read overlay file");
            Vec::new()
        }
    }
}

/// Overlay file expander sharing one template library cache
#[derive(Debug, Clone)]
pub struct OverlayExpander {
    library: Arc<TemplateLibrary>,
    processor: TemplateProcessor,
    limits: ResolveLimits,
}

impl OverlayExpander {
    pub fn new(library: Arc<TemplateLibrary>, limits: ResolveLimits) -> Self {
        Self {
            library,
            processor: TemplateProcessor::new(&limits),
            limits,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(Arc::new(TemplateLibrary::new(&config.defaults_dir)), config.limits)
    }

    pub fn library(&self) -> &TemplateLibrary {
        &self.library
    }

    /// Expand every overlay declared in `path`.
    #[instrument(skip_all, fields(file = %path.as_ref().display()))]
    pub fn expand(&self, path: impl AsRef<Path>, user_vars: &Variables) -> Vec<ResolvedOverlay> {
        match read_yaml_file(path.as_ref()) {
            Ok(doc) => self.expand_document(&doc, user_vars),
            Err(e) => {
                warn!(error = %e, "failed to load overlay file");
                Vec::new()
            }
        }
    }

    /// Expand an already parsed overlay document.
    pub fn expand_document(&self, doc: &Value, user_vars: &Variables) -> Vec<ResolvedOverlay> {
        let Some(doc) = doc.as_mapping() else {
            return Vec::new();
        };

        let mut user_vars = expand_shorthand(user_vars, self.limits.shorthand_ratings);

        let mut templates = Mapping::new();
        let mut external_conditionals = Conditionals::new();
        if let Some(external) = doc.get("external_templates").and_then(Value::as_mapping) {
            let source = external
                .get("default")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_SOURCE);
            templates.extend(
                self.library
                    .load(source)
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );

            if let Some(raw) = external.get("template_variables").and_then(Value::as_mapping) {
                let (variables, conditionals) = split_template_variables(raw);
                for (key, value) in variables {
                    user_vars.entry(key).or_insert(value);
                }
                external_conditionals = conditionals;
            }
        }

        if let Some(local) = doc.get("templates").and_then(Value::as_mapping) {
            templates.extend(local.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let Some(overlays) = doc.get("overlays").and_then(Value::as_mapping) else {
            return Vec::new();
        };

        let mut expanded = Vec::with_capacity(overlays.len());
        for (name, entry) in overlays {
            let Some(entry) = entry.as_mapping() else {
                continue;
            };
            let resolved = if let Some(calls) = entry.get("template") {
                self.expand_templated(name, entry, calls, &templates, &external_conditionals, &user_vars)
            } else if let Some(Value::Mapping(direct)) = entry.get("overlay") {
                Some(self.expand_direct(name, direct, &user_vars))
            } else {
                None
            };
            if let Some(overlay) = resolved {
                expanded.push(overlay);
            }
        }
        expanded
    }

    fn expand_templated(
        &self,
        name: &str,
        entry: &Mapping,
        calls: &Value,
        templates: &Mapping,
        external_conditionals: &Conditionals,
        user_vars: &Variables,
    ) -> Option<ResolvedOverlay> {
        let mut seed = user_vars.clone();
        for block in ["variables", "template_variables"] {
            if let Some(vars) = entry.get(block).and_then(Value::as_mapping) {
                seed.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        seed.entry("key".to_string())
            .or_insert_with(|| Value::from(key_from_name(name)));

        let mut merged = Mapping::new();
        let mut used = Vec::new();
        for call in TemplateCall::parse_all(calls) {
            let Some(template) = templates.get(&call.name).and_then(TemplateDefinition::from_value) else {
                debug!(overlay = name, template = %call.name, "template not found, skipping call");
                continue;
            };
            let template = if external_conditionals.is_empty() {
                template
            } else {
                template.with_fallback_conditionals(external_conditionals)
            };

            let mut vars = seed.clone();
            vars.extend(call.overrides);
            let key = vars.get("key").map(Value::to_display_string).unwrap_or_default();

            let resolved = self.processor.process(&template, &vars, &key);
            merged.extend(
                resolved
                    .into_iter()
                    .filter(|(k, v)| !k.starts_with('_') && !v.is_null()),
            );
            used.push(call.name);
        }

        if merged.is_empty() {
            return None;
        }
        debug!(
            overlay = name,
            templates = %used.join(", "),
            resolved_name = %merged.get("name").map(|v| v.to_display_string()).unwrap_or_default(),
            "expanded overlay"
        );
        Some(ResolvedOverlay::from_templates(name, merged, &used))
    }

    fn expand_direct(&self, name: &str, direct: &Mapping, user_vars: &Variables) -> ResolvedOverlay {
        let resolver = self.processor.resolver();
        let fields = direct
            .iter()
            .map(|(k, v)| (k.clone(), resolver.resolve(v, user_vars)))
            .filter(|(_, v)| !v.is_null())
            .collect();
        ResolvedOverlay::direct(name, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn yaml(src: &str) -> Value {
        serde_yaml::from_str(src).unwrap()
    }

    fn vars(src: &str) -> Variables {
        yaml(src).as_mapping().cloned().unwrap_or_default()
    }

    fn expander() -> (TempDir, OverlayExpander) {
        let dir = TempDir::new().unwrap();
        let library = Arc::new(TemplateLibrary::new(dir.path()));
        (dir, OverlayExpander::new(library, ResolveLimits::default()))
    }

    #[test]
    fn shorthand_expands_rating_slots() {
        let out = expand_shorthand(&vars("rating1: user / rt_tomato\nrating2: critic\nrating4: a / b"), 3);
        assert_eq!(out.get("rating1"), Some(&Value::from("user")));
        assert_eq!(out.get("rating1_image"), Some(&Value::from("rt_tomato")));
        assert_eq!(out.get("rating2"), Some(&Value::from("critic")));
        assert!(!out.contains_key("rating2_image"));
        assert_eq!(out.get("rating4"), Some(&Value::from("a / b")));
    }

    #[test]
    fn shorthand_splits_on_first_separator() {
        let out = expand_shorthand(&vars("rating1: audience / imdb / extra"), 3);
        assert_eq!(out.get("rating1"), Some(&Value::from("audience")));
        assert_eq!(out.get("rating1_image"), Some(&Value::from("imdb / extra")));
    }

    #[test]
    fn template_variables_split() {
        let (vars, conds) = split_template_variables(&vars(
            "default:\n  font: Arial\n  size: 10\nsize: 20\nconditionals:\n  color:\n    default: red\nstyle: dark\n",
        ));
        assert_eq!(vars.get("font"), Some(&Value::from("Arial")));
        assert_eq!(vars.get("size"), Some(&Value::from(20i64)));
        assert_eq!(vars.get("style"), Some(&Value::from("dark")));
        assert!(!vars.contains_key("conditionals"));
        assert!(conds.contains_key("color"));
    }

    #[test]
    fn key_is_text_after_last_dash() {
        assert_eq!(key_from_name("Dolby-TrueHD-Atmos"), "Atmos");
        assert_eq!(key_from_name("4K"), "4K");
    }

    #[test]
    fn template_calls_normalize() {
        let calls = TemplateCall::parse_all(&yaml("[standard, {name: extra, size: 5}, {size: 1}, 3]"));
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].name, "standard");
        assert_eq!(calls[1].overrides.get("size"), Some(&Value::from(5i64)));
        assert_eq!(calls[2].name, "standard");
        assert_eq!(TemplateCall::parse_all(&yaml("solo")).len(), 1);
    }

    #[test]
    fn later_template_calls_override_earlier_keys() {
        let (_dir, expander) = expander();
        let doc = yaml(
            r#"
templates:
  first:
    overlay:
      name: <<key>>
      color: red
      size: 10
  second:
    overlay:
      color: blue
overlays:
  Badge-HDR:
    template: [first, second, missing]
"#,
        );
        let out = expander.expand_document(&doc, &Variables::new());
        assert_eq!(out.len(), 1);
        let overlay = &out[0];
        assert_eq!(overlay.get("name"), Some(&Value::from("HDR")));
        assert_eq!(overlay.get("color"), Some(&Value::from("blue")));
        assert_eq!(overlay.get("size"), Some(&Value::from(10i64)));
        assert_eq!(overlay.template_names(), ["first", "second"]);
        assert_eq!(overlay.original_name(), Some("Badge-HDR"));
    }

    #[test]
    fn underscore_fields_never_reach_the_overlay() {
        let (_dir, expander) = expander();
        let doc = yaml(
            r#"
templates:
  standard:
    overlay:
      name: <<key>>
      _internal: x
      _template: <<_template>>
      _original_name: spoofed
overlays:
  Badge-DV:
    template: standard
"#,
        );
        let out = expander.expand_document(&doc, &vars("_template: user-supplied"));
        assert_eq!(out.len(), 1);
        let overlay = &out[0];
        assert_eq!(overlay.get("name"), Some(&Value::from("DV")));
        assert!(overlay.get("_internal").is_none());
        assert_eq!(overlay.get("_template"), Some(&Value::from("standard")));
        assert_eq!(overlay.original_name(), Some("Badge-DV"));
    }

    #[test]
    fn direct_overlays_only_substitute() {
        let (_dir, expander) = expander();
        let doc = yaml(
            r#"
overlays:
  logo:
    overlay:
      name: <<brand>>
      file: <<missing>>
      nothing: null
"#,
        );
        let out = expander.expand_document(&doc, &vars("brand: acme"));
        assert_eq!(out.len(), 1);
        assert!(out[0].is_direct());
        assert_eq!(out[0].get("name"), Some(&Value::from("acme")));
        assert_eq!(out[0].get("file"), Some(&Value::from("<<missing>>")));
        assert!(out[0].get("nothing").is_none());
    }

    #[test]
    fn entry_variables_and_call_overrides_layer() {
        let (_dir, expander) = expander();
        let doc = yaml(
            r#"
templates:
  standard:
    overlay:
      name: <<key>>
      size: <<size>>
      color: <<color>>
overlays:
  res-4K:
    variables:
      size: 1
      color: red
    template_variables:
      size: 2
    template:
      name: standard
      color: green
"#,
        );
        let out = expander.expand_document(&doc, &vars("size: 0\ncolor: black"));
        assert_eq!(out[0].get("size"), Some(&Value::from(2i64)));
        assert_eq!(out[0].get("color"), Some(&Value::from("green")));
        assert_eq!(out[0].get("name"), Some(&Value::from("4K")));
    }

    #[test]
    fn entries_without_result_are_skipped() {
        let (_dir, expander) = expander();
        let doc = yaml(
            r#"
templates:
  empty:
    default:
      a: 1
overlays:
  nothing: {template: empty}
  unknown: {template: nope}
  neither: {weight: 3}
  scalar: 5
"#,
        );
        assert!(expander.expand_document(&doc, &Variables::new()).is_empty());
    }

    #[test]
    fn non_mapping_document_is_empty() {
        let (_dir, expander) = expander();
        assert!(expander.expand_document(&yaml("- a\n- b"), &Variables::new()).is_empty());
        assert!(expander.expand("/definitely/not/here.yml", &Variables::new()).is_empty());
    }
}
