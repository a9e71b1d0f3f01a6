//! Template definitions and the staged template processor
//!
//! A template combines three blocks:
//! - `default`: fallback variables, whose keys may be parametrized
//! - `conditionals`: rule sets that compute further variables
//! - `overlay`: the overlay shape resolved against the final environment
//!
//! Defaults and conditionals may reference each other, so the processor
//! merges defaults twice around conditional evaluation and runs bounded
//! fixed-point passes after each merge.

use tracing::{debug, instrument, trace};

use crate::conditional::{evaluate_all, parse_conditionals, Conditionals};
use crate::limits::ResolveLimits;
use crate::resolver::Resolver;
use crate::value::{has_placeholder, Mapping, Value, Variables};

/// Overlay field kept even when it still carries placeholders (literal overlay text)
const NAME_FIELD: &str = "name";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemplateDefinition {
    pub default: Mapping,
    pub conditionals: Conditionals,
    pub overlay: Mapping,
}

impl TemplateDefinition {
    /// Parse a stored template. A one-element sequence wrapping the mapping is
    /// accepted and degenerates to its first element.
    pub fn from_value(raw: &Value) -> Option<Self> {
        let map = match raw {
            Value::Mapping(map) => map,
            Value::Sequence(items) => items.first()?.as_mapping()?,
            _ => return None,
        };

        let section = |name: &str| map.get(name).and_then(Value::as_mapping);

        Some(Self {
            default: section("default").cloned().unwrap_or_default(),
            conditionals: section("conditionals").map(parse_conditionals).unwrap_or_default(),
            overlay: section("overlay").cloned().unwrap_or_default(),
        })
    }

    /// Copy of this template with `fallback` conditionals added underneath its
    /// own. Same-named conditionals declared by the template win.
    pub fn with_fallback_conditionals(&self, fallback: &Conditionals) -> Self {
        let mut merged = fallback.clone();
        merged.extend(self.conditionals.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            conditionals: merged,
            ..self.clone()
        }
    }
}

/// Expands one template against call-site variables
#[derive(Debug, Clone, Copy)]
pub struct TemplateProcessor {
    resolver: Resolver,
    passes: usize,
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new(&ResolveLimits::default())
    }
}

impl TemplateProcessor {
    pub fn new(limits: &ResolveLimits) -> Self {
        Self {
            resolver: Resolver::from_limits(limits),
            passes: limits.fixed_point_passes,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve `template.overlay` for one overlay entry.
    ///
    /// Returns an empty mapping when the template declares no overlay.
    #[instrument(level = "debug", skip_all, fields(key = %key_hint))]
    pub fn process(&self, template: &TemplateDefinition, call_vars: &Variables, key_hint: &str) -> Mapping {
        if template.overlay.is_empty() {
            return Mapping::new();
        }
        let env = self.environment(template, call_vars, key_hint);
        self.resolve_overlay(&template.overlay, &env)
    }

    /// Build the final variable environment for `template`.
    pub fn environment(&self, template: &TemplateDefinition, call_vars: &Variables, key_hint: &str) -> Variables {
        let mut env = call_vars.clone();
        env.entry("key".to_string())
            .or_insert_with(|| Value::from(key_hint));

        // Explicit variables always win over template defaults.
        for (raw_key, default) in &template.default {
            let key = self.resolver.resolve_key(raw_key, &env);
            env.entry(key).or_insert_with(|| default.clone());
        }

        self.fixed_point(&mut env);

        if !template.conditionals.is_empty() {
            let computed = evaluate_all(&template.conditionals, &env, &self.resolver);
            env.extend(computed);
        }

        // Defaults may reference conditional outputs: upgrade the ones that
        // were unset or are still unresolved.
        for (raw_key, default) in &template.default {
            if !default.is_unresolved() {
                continue;
            }
            let key = self.resolver.resolve_key(raw_key, &env);
            let resolved = self.resolver.resolve(default, &env);
            if resolved.is_null() {
                continue;
            }
            let upgrade = env
                .get(&key)
                .map_or(true, |current| current.is_null() || current.is_unresolved());
            if upgrade {
                env.insert(key, resolved);
            }
        }

        self.fixed_point(&mut env);
        env
    }

    /// Re-resolve unresolved values and parametrized keys until nothing
    /// changes or the pass cap is reached.
    fn fixed_point(&self, env: &mut Variables) {
        for pass in 0..self.passes {
            let before = env.clone();

            for index in 0..env.len() {
                let Some((_, value)) = env.get_index(index) else {
                    continue;
                };
                if !value.is_unresolved() {
                    continue;
                }
                let resolved = self.resolver.resolve(value, env);
                if let Some((_, slot)) = env.get_index_mut(index) {
                    *slot = resolved;
                }
            }

            if env.keys().any(|k| has_placeholder(k)) {
                *env = self.rekey(env);
            }

            if *env == before {
                trace!(pass, "variable environment reached a fixed point");
                return;
            }
        }
    }

    /// Resolve placeholder keys. A re-keyed entry never displaces a variable
    /// that already exists under the resolved name.
    fn rekey(&self, env: &Variables) -> Variables {
        let mut rekeyed = Variables::with_capacity(env.len());
        for (key, value) in env {
            let key = if has_placeholder(key) {
                let resolved = self.resolver.resolve_key(key, env);
                if resolved != *key && env.contains_key(&resolved) {
                    continue;
                }
                resolved
            } else {
                key.clone()
            };
            rekeyed.entry(key).or_insert_with(|| value.clone());
        }
        rekeyed
    }

    fn resolve_overlay(&self, overlay: &Mapping, env: &Variables) -> Mapping {
        let mut resolved = Mapping::with_capacity(overlay.len());
        for (raw_key, raw_value) in overlay {
            let key = self.resolver.resolve_key(raw_key, env);
            let value = self.resolver.resolve(raw_value, env);
            if value.is_null() {
                continue;
            }
            if raw_key != NAME_FIELD && value.is_unresolved() {
                debug!(field = %key, value = %value.to_display_string(), "dropping unresolved overlay field");
                continue;
            }
            resolved.insert(key, value);
        }
        resolved
    }
}
