//! Command logic for Vista CLI.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};
use vista_view::{OptionPolicy, Options, View, ViewConfig};

use crate::cli::Args;

/// Build the view described by the global arguments.
///
/// # Errors
///
/// Returns an error if the configuration file cannot be loaded or the view
/// rejects its options.
#[instrument(skip(args))]
pub fn build_view(args: &Args) -> Result<View> {
    let config = match &args.config {
        Some(path) => ViewConfig::load_from_file(path)
            .with_context(|| format!("Failed to load view configuration from {}", path.display()))?,
        None => ViewConfig {
            root: args.root.display().to_string(),
            policy: OptionPolicy::default(),
            options: parse_options(&args.options),
        },
    };

    let config = if args.lenient {
        ViewConfig {
            policy: OptionPolicy::Lenient,
            ..config
        }
    } else {
        config
    };

    info!(root = %config.root, policy = ?config.policy, "Building view");
    View::from_config(&config).context("Failed to build view")
}

/// Turn `name=value` pairs into an option map.
///
/// Values that parse as JSON keep their type (`true`, `3`), anything else is
/// taken as a string.
#[must_use]
pub fn parse_options(pairs: &[(String, String)]) -> Options {
    pairs
        .iter()
        .map(|(name, raw)| {
            let value = serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.clone()));
            (name.clone(), value)
        })
        .collect()
}

/// Load render data from a JSON or YAML file, or an empty map.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_data(path: Option<&Path>) -> Result<serde_json::Value> {
    let Some(path) = path else {
        return Ok(serde_json::Value::Object(Options::new()));
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read data file {}", path.display()))?;
    debug!("Loaded data file {}", path.display());

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));

    if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML data in {}", path.display()))
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON data in {}", path.display()))
    }
}

/// Render a whole template.
///
/// # Errors
///
/// Returns an error if the data cannot be loaded or rendering fails.
pub fn render(view: &View, template: &str, data: Option<&Path>) -> Result<String> {
    let data = load_data(data)?;
    view.render(template, &data)
        .with_context(|| format!("Failed to render template '{template}'"))
}

/// Render one block of a template.
///
/// # Errors
///
/// Returns an error if the data cannot be loaded or rendering fails.
pub fn render_block(
    view: &View,
    template: &str,
    block: &str,
    data: Option<&Path>,
) -> Result<String> {
    let data = load_data(data)?;
    view.render_block(template, block, &data)
        .with_context(|| format!("Failed to render block '{block}' of template '{template}'"))
}
