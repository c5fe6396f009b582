//! The view adapter.

use std::path::PathBuf;
use std::sync::Arc;

use minijinja::{Error, Value};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::ViewConfig;
use crate::engine::{Engine, JinjaEngine};
use crate::error::Result;
use crate::option::{OptionPolicy, Options, apply_options};

/// Renders templates through an owned engine.
///
/// A `View` is built once from a template root and an option map and is then
/// ready for rendering for its whole lifetime. Anything the option whitelist
/// does not cover can be configured through [`View::engine_mut`].
///
/// The default engine is not `Sync`; share a view across threads only behind
/// external synchronization.
#[derive(Debug)]
pub struct View<E: Engine = JinjaEngine> {
    engine: E,
}

impl View<JinjaEngine> {
    /// Create a view over the templates below `root`.
    ///
    /// Options are applied in map order. Recognized names are `cacheDir`,
    /// `refresh` and `contentType`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::InvalidConfiguration`](crate::ViewError::InvalidConfiguration)
    /// for an unknown option name, or
    /// [`ViewError::InvalidOptionValue`](crate::ViewError::InvalidOptionValue)
    /// when a value has the wrong type.
    pub fn new(root: impl Into<PathBuf>, options: Options) -> Result<Self> {
        Self::with_policy(root, options, OptionPolicy::Strict)
    }

    /// Create a view with an explicit option policy.
    ///
    /// # Errors
    ///
    /// Same as [`View::new`]; unknown names are only an error under
    /// [`OptionPolicy::Strict`].
    #[instrument(skip_all, fields(policy = ?policy))]
    pub fn with_policy(
        root: impl Into<PathBuf>,
        options: Options,
        policy: OptionPolicy,
    ) -> Result<Self> {
        let root = root.into();
        debug!("Creating view for {}", root.display());
        Self::with_engine_and_policy(JinjaEngine::new(root), &options, policy)
    }

    /// Create a view from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Same as [`View::with_policy`].
    pub fn from_config(config: &ViewConfig) -> Result<Self> {
        Self::with_policy(&config.root, config.options.clone(), config.policy)
    }
}

impl<E: Engine> View<E> {
    /// Create a view around an existing engine using the strict policy.
    ///
    /// # Errors
    ///
    /// Same as [`View::new`].
    pub fn with_engine(engine: E, options: &Options) -> Result<Self> {
        Self::with_engine_and_policy(engine, options, OptionPolicy::Strict)
    }

    /// Create a view around an existing engine.
    ///
    /// # Errors
    ///
    /// Same as [`View::with_policy`].
    pub fn with_engine_and_policy(
        mut engine: E,
        options: &Options,
        policy: OptionPolicy,
    ) -> Result<Self> {
        apply_options(&mut engine, options, policy)?;
        Ok(Self { engine })
    }

    /// Render a whole template.
    ///
    /// # Errors
    ///
    /// Returns the engine's error unchanged.
    pub fn render<S: Serialize>(
        &self,
        template: &str,
        data: S,
    ) -> std::result::Result<String, Error> {
        self.engine
            .render_to_string(template, &Value::from_serialize(data), None)
    }

    /// Render a single named block of a template.
    ///
    /// # Errors
    ///
    /// Returns the engine's error unchanged, including when the block does
    /// not exist.
    pub fn render_block<S: Serialize>(
        &self,
        template: &str,
        block: &str,
        data: S,
    ) -> std::result::Result<String, Error> {
        self.engine
            .render_to_string(template, &Value::from_serialize(data), Some(block))
    }

    /// Register a filter.
    ///
    /// With a name the filter is used as `{{ value|name }}`. With `None` it
    /// runs on every interpolated value before escaping. Registering the same
    /// name again replaces the previous filter.
    pub fn add_filter<F>(&mut self, name: Option<&str>, callback: F)
    where
        F: Fn(Value) -> std::result::Result<Value, Error> + Send + Sync + 'static,
    {
        self.engine.add_filter(name, Arc::new(callback));
    }

    /// The engine's loader.
    #[must_use]
    pub fn loader(&self) -> &E::Loader {
        self.engine.loader()
    }

    /// The underlying engine.
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable access to the underlying engine.
    pub const fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Consume the view and return its engine.
    #[must_use]
    pub fn into_engine(self) -> E {
        self.engine
    }
}
