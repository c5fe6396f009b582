//! Whitelisted view options and the dispatch table that applies them.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::{Result, ViewError};

/// Ordered option map passed to view construction.
///
/// Iteration order is insertion order (or document order when deserialized).
pub type Options = serde_json::Map<String, Json>;

/// Directory name used under the system temp dir by [`OptionPolicy::Lenient`].
pub const DEFAULT_CACHE_DIR_NAME: &str = "vista-view";

/// The recognized option names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewOption {
    /// `cacheDir`: directory for the engine's template cache.
    CacheDir,
    /// `refresh`: recompile templates when their source changes.
    Refresh,
    /// `contentType`: output content type, which selects escaping.
    ContentType,
}

/// Setter invoked for one option against the engine.
type Setter<E> = fn(&mut E, &Json) -> Result<()>;

impl ViewOption {
    /// Every recognized option.
    pub const ALL: [Self; 3] = [Self::CacheDir, Self::Refresh, Self::ContentType];

    /// The name used in option maps.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CacheDir => "cacheDir",
            Self::Refresh => "refresh",
            Self::ContentType => "contentType",
        }
    }

    /// Look up an option by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|option| option.name() == name)
    }

    fn setter<E: Engine>(self) -> Setter<E> {
        match self {
            Self::CacheDir => apply_cache_dir::<E>,
            Self::Refresh => apply_refresh::<E>,
            Self::ContentType => apply_content_type::<E>,
        }
    }
}

impl fmt::Display for ViewOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ViewOption {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| ViewError::invalid_configuration(s))
    }
}

fn apply_cache_dir<E: Engine>(engine: &mut E, value: &Json) -> Result<()> {
    let path = value
        .as_str()
        .ok_or(ViewError::invalid_value(ViewOption::CacheDir, "a directory path string"))?;
    engine.set_cache_directory(PathBuf::from(path));
    Ok(())
}

fn apply_refresh<E: Engine>(engine: &mut E, value: &Json) -> Result<()> {
    let refresh = value
        .as_bool()
        .ok_or(ViewError::invalid_value(ViewOption::Refresh, "a boolean"))?;
    engine.set_auto_refresh(refresh);
    Ok(())
}

fn apply_content_type<E: Engine>(engine: &mut E, value: &Json) -> Result<()> {
    let content_type = value
        .as_str()
        .ok_or(ViewError::invalid_value(ViewOption::ContentType, "a string"))?;
    engine.set_content_type(content_type);
    Ok(())
}

/// How construction treats the option map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionPolicy {
    /// Unknown names abort construction. Nothing is defaulted.
    #[default]
    Strict,
    /// Unknown names are skipped and `cacheDir` defaults to a directory under
    /// the system temp dir. A defaulted cache directory also turns `refresh`
    /// on unless the options set it.
    Lenient,
}

impl OptionPolicy {
    /// Default cache directory applied by the lenient policy.
    #[must_use]
    pub fn default_cache_dir() -> PathBuf {
        std::env::temp_dir().join(DEFAULT_CACHE_DIR_NAME)
    }
}

/// Apply `options` to `engine` in iteration order.
///
/// Under [`OptionPolicy::Strict`] the first unknown name stops the loop with
/// [`ViewError::InvalidConfiguration`]; entries after it are never applied.
pub(crate) fn apply_options<E: Engine>(
    engine: &mut E,
    options: &Options,
    policy: OptionPolicy,
) -> Result<()> {
    let mut cache_dir_set = false;
    let mut refresh_set = false;

    for (name, value) in options {
        let Some(option) = ViewOption::from_name(name) else {
            match policy {
                OptionPolicy::Strict => return Err(ViewError::invalid_configuration(name)),
                OptionPolicy::Lenient => {
                    warn!(option = %name, "Ignoring unknown view option");
                    continue;
                }
            }
        };

        debug!(%option, %value, "Applying view option");
        (option.setter::<E>())(engine, value)?;
        cache_dir_set |= option == ViewOption::CacheDir;
        refresh_set |= option == ViewOption::Refresh;
    }

    if policy == OptionPolicy::Lenient && !cache_dir_set {
        let dir = OptionPolicy::default_cache_dir();
        debug!("Defaulting cache directory to {}", dir.display());
        engine.set_cache_directory(dir);
        if !refresh_set {
            engine.set_auto_refresh(true);
        }
    }

    Ok(())
}
