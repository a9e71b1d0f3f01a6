//! Placeholder resolver
//!
//! Substitutes `<<name>>` placeholders against a variable environment:
//! - only innermost placeholders match a scan, so `<<rating<<n>>_font>>`
//!   resolves inside-out over successive scans
//! - a string that is exactly one resolvable placeholder yields the variable's
//!   value with its native type
//! - unknown or null variables leave the placeholder untouched, and so does
//!   a variable whose value contains its own placeholder
//! - scans stop at a fixed point or after `max_depth` passes
//! - a substitution that would push the string past `max_len` bytes is skipped

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::limits::ResolveLimits;
use crate::value::{Value, Variables};

/// Innermost placeholder: `<<name>>` where name holds no angle brackets
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<<([^<>]+)>>").unwrap());

/// A string made of exactly one innermost placeholder
static WHOLE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<<([^<>]+)>>$").unwrap());

fn lookup<'a>(env: &'a Variables, name: &str) -> Option<&'a Value> {
    env.get(name)
        .filter(|v| !v.is_null() && !refers_to_itself(name, v))
}

fn refers_to_itself(name: &str, value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains("<<") && s.contains(&format!("<<{name}>>")),
        _ => false,
    }
}

/// Placeholder resolver bounded by a scan depth and a result length
#[derive(Debug, Clone, Copy)]
pub struct Resolver {
    max_depth: usize,
    max_len: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::from_limits(&ResolveLimits::default())
    }
}

impl Resolver {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            max_len: ResolveLimits::default().max_resolved_len,
        }
    }

    pub fn from_limits(limits: &ResolveLimits) -> Self {
        Self::new(limits.max_resolve_depth).with_max_len(limits.max_resolved_len)
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Resolve every string inside `value`. Mapping keys are left as-is.
    pub fn resolve(&self, value: &Value, env: &Variables) -> Value {
        match value {
            Value::String(s) => self.resolve_str(s, env),
            Value::Mapping(map) => Value::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve(v, env)))
                    .collect(),
            ),
            Value::Sequence(items) => {
                Value::Sequence(items.iter().map(|item| self.resolve(item, env)).collect())
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        }
    }

    /// Resolve a single string, preserving the native type of a whole-string
    /// placeholder.
    pub fn resolve_str(&self, input: &str, env: &Variables) -> Value {
        if !input.contains("<<") {
            return Value::String(input.to_string());
        }

        let mut current = input.to_string();
        for _ in 0..self.max_depth {
            if let Some(caps) = WHOLE_PLACEHOLDER.captures(&current) {
                match lookup(env, &caps[1]) {
                    // A string value may itself hold placeholders: keep scanning it.
                    Some(Value::String(next)) => {
                        if *next == current {
                            break;
                        }
                        current = next.clone();
                        continue;
                    }
                    Some(value) => return value.clone(),
                    None => {}
                }
            }

            let mut budget = self.max_len.saturating_sub(current.len());
            let mut capped = false;
            let next = PLACEHOLDER.replace_all(&current, |caps: &Captures| {
                let Some(value) = lookup(env, &caps[1]) else {
                    return caps[0].to_string();
                };
                let text = value.to_display_string();
                let growth = text.len().saturating_sub(caps[0].len());
                if growth > budget {
                    capped = true;
                    return caps[0].to_string();
                }
                budget -= growth;
                text
            });
            if capped {
                debug!(max_len = self.max_len, "placeholder substitution hit the length cap");
            }
            if next == current {
                break;
            }
            current = next.into_owned();
        }

        Value::String(current)
    }

    /// Resolve a dynamic mapping key such as `rating<<rating_num>>_font`.
    ///
    /// Keys always come back as text, even when the placeholder names a
    /// non-string variable.
    pub fn resolve_key(&self, key: &str, env: &Variables) -> String {
        match self.resolve_str(key, env) {
            Value::String(s) => s,
            other => other.to_display_string(),
        }
    }
}

/// Resolve `value` with the default depth cap.
pub fn resolve(value: &Value, env: &Variables) -> Value {
    Resolver::default().resolve(value, env)
}

/// Resolve a mapping key with the default depth cap.
pub fn resolve_key(key: &str, env: &Variables) -> String {
    Resolver::default().resolve_key(key, env)
}
