//! Conditional evaluation
//!
//! A conditional picks one value from an ordered list of clauses:
//!
//! ```yaml
//! conditionals:
//!   color:
//!     default: white
//!     conditions:
//!       - style: dark
//!         value: black
//!       - rating1_image.exists: true
//!         source.not: [imdb, tmdb]
//!         value: gold
//! ```
//!
//! The first clause whose checks all pass wins; otherwise the default is used.

use indexmap::IndexMap;

use crate::resolver::Resolver;
use crate::value::{Mapping, Value, Variables};

/// Named conditionals in declaration order
pub type Conditionals = IndexMap<String, ConditionalSpec>;

/// One `<name>.<suffix>: expected` entry of a clause
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub key: String,
    pub expected: Value,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionClause {
    /// Value selected when every check passes (`null` when omitted)
    pub value: Value,
    pub checks: Vec<Check>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionalSpec {
    pub default: Value,
    pub conditions: Vec<ConditionClause>,
}

impl Check {
    /// Evaluate against `env`. The key may itself carry placeholders.
    pub fn passes(&self, env: &Variables, resolver: &Resolver) -> bool {
        let key = resolver.resolve_key(&self.key, env);

        if let Some(name) = key.strip_suffix(".exists") {
            let name = resolver.resolve_key(name, env);
            let exists = env
                .get(&name)
                .is_some_and(|v| !v.is_null() && !v.is_unresolved());
            return exists == self.expected.truthy_flag();
        }

        if let Some(name) = key.strip_suffix(".not") {
            return match env.get(name) {
                Some(current) => !current.matches_expected(&self.expected),
                None => true,
            };
        }

        match env.get(&key) {
            Some(current) => current.matches_expected(&self.expected),
            None => false,
        }
    }
}

impl ConditionClause {
    pub fn from_mapping(map: &Mapping) -> Self {
        let mut clause = ConditionClause::default();
        for (key, expected) in map {
            if key == "value" {
                clause.value = expected.clone();
            } else {
                clause.checks.push(Check {
                    key: key.clone(),
                    expected: expected.clone(),
                });
            }
        }
        clause
    }

    pub fn matches(&self, env: &Variables, resolver: &Resolver) -> bool {
        self.checks.iter().all(|check| check.passes(env, resolver))
    }
}

impl ConditionalSpec {
    /// Build from a raw `{default, conditions}` mapping.
    ///
    /// Returns `None` for anything that is not a mapping. A single un-wrapped
    /// clause is treated as a one-element list; non-mapping clauses are ignored.
    pub fn from_value(raw: &Value) -> Option<Self> {
        let map = raw.as_mapping()?;
        let default = map.get("default").cloned().unwrap_or_default();
        let conditions = match map.get("conditions") {
            Some(Value::Mapping(single)) => vec![ConditionClause::from_mapping(single)],
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(Value::as_mapping)
                .map(ConditionClause::from_mapping)
                .collect(),
            _ => Vec::new(),
        };
        Some(Self {
            default,
            conditions,
        })
    }

    /// Select the first matching clause's value (or the default) and resolve it.
    pub fn evaluate(&self, env: &Variables, resolver: &Resolver) -> Value {
        let selected = self
            .conditions
            .iter()
            .find(|clause| clause.matches(env, resolver))
            .map(|clause| &clause.value)
            .unwrap_or(&self.default);
        resolver.resolve(selected, env)
    }
}

/// Parse a raw `conditionals:` mapping, skipping malformed entries.
pub fn parse_conditionals(raw: &Mapping) -> Conditionals {
    raw.iter()
        .filter_map(|(name, entry)| ConditionalSpec::from_value(entry).map(|c| (name.clone(), c)))
        .collect()
}

/// Evaluate every conditional against the same environment.
///
/// Conditional names may be parametrized (`rating<<rating_num>>_align`) and
/// are resolved before being used as result keys.
pub fn evaluate_all(conditionals: &Conditionals, env: &Variables, resolver: &Resolver) -> Variables {
    conditionals
        .iter()
        .map(|(name, cond)| (resolver.resolve_key(name, env), cond.evaluate(env, resolver)))
        .collect()
}
