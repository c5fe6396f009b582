//! Template engine contract and its Minijinja implementation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use minijinja::{AutoEscape, Environment, Error, Value, escape_formatter};
use tracing::debug;

use crate::cache::SourceCache;
use crate::loader::FileLoader;

/// Filter callback stored in an engine's filter registry.
pub type FilterFn = Arc<dyn Fn(Value) -> Result<Value, Error> + Send + Sync + 'static>;

/// Operations a template engine provides to a [`View`](crate::View).
pub trait Engine {
    /// The component that resolves template identifiers to sources.
    type Loader;

    /// Set the directory used for the engine's template cache.
    fn set_cache_directory(&mut self, path: PathBuf);

    /// Enable or disable recompiling templates whose source changed.
    fn set_auto_refresh(&mut self, refresh: bool);

    /// Set the output content type, which drives escaping.
    fn set_content_type(&mut self, content_type: &str);

    /// Render a template, or only one of its blocks, to a string.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the template or block cannot be found,
    /// compiled or rendered.
    fn render_to_string(
        &self,
        template: &str,
        data: &Value,
        block: Option<&str>,
    ) -> Result<String, Error>;

    /// Register a filter under `name`, or as the output filter when `None`.
    fn add_filter(&mut self, name: Option<&str>, filter: FilterFn);

    /// The engine's loader.
    fn loader(&self) -> &Self::Loader;
}

/// Minijinja backed engine loading templates from a directory.
pub struct JinjaEngine {
    env: RefCell<Environment<'static>>,
    loader: Arc<FileLoader>,
    cache: Arc<SourceCache>,
    content_type: Option<String>,
    generation: Cell<u64>,
}

impl JinjaEngine {
    /// Create an engine reading templates below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_loader(Arc::new(FileLoader::new(root)))
    }

    /// Create an engine around an existing loader.
    #[must_use]
    pub fn with_loader(loader: Arc<FileLoader>) -> Self {
        let cache = Arc::new(SourceCache::new());
        let mut env = Environment::new();
        {
            let loader = Arc::clone(&loader);
            let cache = Arc::clone(&cache);
            env.set_loader(move |name| cache.fetch(&loader, name));
        }

        Self {
            env: RefCell::new(env),
            generation: Cell::new(loader.generation()),
            loader,
            cache,
            content_type: None,
        }
    }

    /// Current cache directory, if any.
    #[must_use]
    pub fn cache_directory(&self) -> Option<PathBuf> {
        self.cache.dir()
    }

    /// Whether auto-refresh is enabled.
    #[must_use]
    pub fn auto_refresh(&self) -> bool {
        self.cache.refresh()
    }

    /// The configured content type, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Direct access to the Minijinja environment.
    ///
    /// Anything configured here (globals, tests, syntax) applies to
    /// subsequent renders.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        self.env.get_mut()
    }

    /// Drop compiled templates that can no longer be trusted.
    fn revalidate(&self) {
        let generation = self.loader.generation();
        let moved = generation != self.generation.get();
        let changed = self.cache.refresh() && self.loader.has_expired();

        if moved || changed {
            debug!(moved, changed, "Dropping compiled templates");
            self.env.borrow_mut().clear_templates();
            self.loader.forget();
            self.generation.set(generation);
        }
    }
}

impl Engine for JinjaEngine {
    type Loader = Arc<FileLoader>;

    fn set_cache_directory(&mut self, path: PathBuf) {
        debug!("Template cache directory set to {}", path.display());
        self.cache.set_dir(Some(path));
        self.env.get_mut().clear_templates();
    }

    fn set_auto_refresh(&mut self, refresh: bool) {
        // Templates compiled while refresh was off may come from stale
        // cache entries that never recorded a stamp.
        if refresh && !self.cache.refresh() {
            debug!("Auto refresh enabled, dropping compiled templates");
            self.env.get_mut().clear_templates();
            self.loader.forget();
        }
        self.cache.set_refresh(refresh);
    }

    fn set_content_type(&mut self, content_type: &str) {
        let escape = auto_escape_for(content_type);
        self.env
            .get_mut()
            .set_auto_escape_callback(move |_name| escape.clone());
        self.env.get_mut().clear_templates();
        self.content_type = Some(content_type.to_string());
    }

    fn render_to_string(
        &self,
        template: &str,
        data: &Value,
        block: Option<&str>,
    ) -> Result<String, Error> {
        self.revalidate();

        let env = self.env.borrow();
        let tmpl = env.get_template(template)?;
        let output = match block {
            None => tmpl.render(data)?,
            Some(block) => {
                let mut state = tmpl.eval_to_state(data)?;
                state.render_block(block)?
            }
        };
        Ok(output)
    }

    fn add_filter(&mut self, name: Option<&str>, filter: FilterFn) {
        let env = self.env.get_mut();
        match name {
            Some(name) => {
                debug!(filter = name, "Registering filter");
                env.add_filter(name.to_string(), move |value: Value| filter(value));
            }
            None => {
                debug!("Registering output filter");
                env.set_formatter(move |out, state, value| {
                    escape_formatter(out, state, &filter(value.clone())?)
                });
            }
        }
    }

    fn loader(&self) -> &Self::Loader {
        &self.loader
    }
}

impl fmt::Debug for JinjaEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JinjaEngine")
            .field("root", &self.loader.root())
            .field("cache_directory", &self.cache.dir())
            .field("auto_refresh", &self.cache.refresh())
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Map a content type onto Minijinja's escaping modes.
fn auto_escape_for(content_type: &str) -> AutoEscape {
    match content_type.to_ascii_lowercase().as_str() {
        "html" | "xhtml" | "xml" | "text/html" | "application/xml" => AutoEscape::Html,
        "json" | "js" | "application/json" => AutoEscape::Json,
        _ => AutoEscape::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn engine_with(files: &[(&str, &str)]) -> (tempfile::TempDir, JinjaEngine) {
        let dir = tempfile::tempdir().unwrap();
        for (name, source) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, source).unwrap();
        }
        let engine = JinjaEngine::new(dir.path());
        (dir, engine)
    }

    fn ctx(name: &str) -> Value {
        Value::from_serialize(serde_json::json!({ "name": name }))
    }

    #[test]
    fn test_render_and_block() {
        let (_dir, engine) = engine_with(&[(
            "page.txt",
            "{% block hello %}Hello, {{ name }}{% endblock %}\n{% block bye %}Bye{% endblock %}",
        )]);

        assert_eq!(
            engine.render_to_string("page.txt", &ctx("Ada"), None).unwrap(),
            "Hello, Ada\nBye"
        );
        assert_eq!(
            engine
                .render_to_string("page.txt", &ctx("Ada"), Some("hello"))
                .unwrap(),
            "Hello, Ada"
        );
    }

    #[test]
    fn test_missing_template_and_block() {
        let (_dir, engine) = engine_with(&[("page.txt", "{% block a %}A{% endblock %}")]);

        let err = engine
            .render_to_string("nope.txt", &ctx("x"), None)
            .unwrap_err();
        assert_eq!(err.kind(), minijinja::ErrorKind::TemplateNotFound);

        let err = engine
            .render_to_string("page.txt", &ctx("x"), Some("b"))
            .unwrap_err();
        assert_eq!(err.kind(), minijinja::ErrorKind::UnknownBlock);
    }

    #[test]
    fn test_auto_escape_for() {
        assert!(matches!(auto_escape_for("html"), AutoEscape::Html));
        assert!(matches!(auto_escape_for("XML"), AutoEscape::Html));
        assert!(matches!(auto_escape_for("js"), AutoEscape::Json));
        assert!(matches!(auto_escape_for("text"), AutoEscape::None));
        assert!(matches!(auto_escape_for("css"), AutoEscape::None));
    }

    #[test]
    fn test_content_type_controls_escaping() {
        let (_dir, mut engine) = engine_with(&[("page.txt", "{{ name }}")]);

        assert_eq!(
            engine.render_to_string("page.txt", &ctx("<b>"), None).unwrap(),
            "<b>"
        );

        engine.set_content_type("html");
        assert_eq!(engine.content_type(), Some("html"));
        assert_eq!(
            engine.render_to_string("page.txt", &ctx("<b>"), None).unwrap(),
            "&lt;b&gt;"
        );

        engine.set_content_type("text");
        assert_eq!(
            engine.render_to_string("page.txt", &ctx("<b>"), None).unwrap(),
            "<b>"
        );
    }

    #[test]
    fn test_loader_root_change_drops_templates() {
        let (_dir, engine) = engine_with(&[("page.txt", "first")]);
        let other = tempfile::tempdir().unwrap();
        fs::write(other.path().join("page.txt"), "second").unwrap();

        assert_eq!(engine.render_to_string("page.txt", &ctx("x"), None).unwrap(), "first");
        engine.loader().set_root(other.path());
        assert_eq!(engine.render_to_string("page.txt", &ctx("x"), None).unwrap(), "second");
    }

    #[test]
    fn test_debug_lists_settings() {
        let (_dir, mut engine) = engine_with(&[]);
        engine.set_auto_refresh(true);
        let debug = format!("{engine:?}");
        assert!(debug.contains("JinjaEngine"));
        assert!(debug.contains("auto_refresh: true"));
    }
}
