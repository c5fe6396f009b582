//! Vista View - Template views backed by the Minijinja templating engine.
//!
//! A [`View`] owns an engine, configures it from a small whitelist of
//! options and forwards render, block render and filter registration calls
//! to it.
//!
//! ```no_run
//! use vista_view::{Options, View};
//!
//! let view = View::new("./templates", Options::new())?;
//! let html = view.render("test", serde_json::json!({ "name": "Ada" }))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(rust_2024_compatibility, missing_docs, missing_debug_implementations)]

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod option;
pub mod view;

pub use config::{ConfigError, ViewConfig};
pub use engine::{Engine, FilterFn, JinjaEngine};
pub use error::{Result, ViewError};
pub use loader::FileLoader;
pub use minijinja;
pub use option::{OptionPolicy, Options, ViewOption};
pub use view::View;

/// Re-export common types for convenience.
pub mod prelude {
    pub use crate::{Engine, OptionPolicy, Options, Result, View, ViewError};
}
