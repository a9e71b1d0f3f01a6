//! Overlay engine - template resolution for poster overlay previews

pub mod conditional;
pub mod config;
pub mod error;
pub mod expander;
pub mod library;
pub mod limits;
pub mod overlay;
pub mod resolver;
pub mod template;
pub mod value;

pub use conditional::{ConditionClause, ConditionalSpec, Conditionals};
pub use config::EngineConfig;
pub use error::{EngineError, FixSuggestion};
pub use expander::{expand_shorthand, overlay_keys, OverlayExpander, TemplateCall};
pub use library::TemplateLibrary;
pub use limits::ResolveLimits;
pub use overlay::{select_for_preview, ResolvedOverlay};
pub use resolver::{resolve, resolve_key, Resolver};
pub use template::{TemplateDefinition, TemplateProcessor};
pub use value::{Mapping, Value, Variables};
