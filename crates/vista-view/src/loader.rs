//! File system template loader.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use minijinja::{Error, ErrorKind};
use tracing::{debug, instrument};

#[cfg(windows)]
const SEPARATORS: &[char] = &['/', '\\'];
#[cfg(not(windows))]
const SEPARATORS: &[char] = &['/'];

/// Modification stamp of a loaded template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl Stamp {
    fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

/// Resolves template identifiers to sources below a root directory.
///
/// Identifiers are `/`-separated paths relative to the root (`\` also
/// separates on Windows). The root can be
/// re-pointed at runtime; engines notice through [`FileLoader::generation`].
#[derive(Debug)]
pub struct FileLoader {
    root: ArcSwap<PathBuf>,
    generation: AtomicU64,
    stamps: DashMap<String, Stamp>,
}

impl FileLoader {
    /// Create a loader for the given root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: ArcSwap::from_pointee(root.into()),
            generation: AtomicU64::new(0),
            stamps: DashMap::new(),
        }
    }

    /// Current root directory.
    #[must_use]
    pub fn root(&self) -> PathBuf {
        (**self.root.load()).clone()
    }

    /// Point the loader at a different root directory.
    pub fn set_root(&self, root: impl Into<PathBuf>) {
        let root = root.into();
        debug!("Template root changed to {}", root.display());
        self.root.store(Arc::new(root));
        self.stamps.clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Counter bumped every time the root changes.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Resolve an identifier to a path below the root.
    ///
    /// Returns `None` for empty identifiers and for identifiers that would
    /// escape the root through `..`.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let mut path = self.root();
        let mut segments = 0;
        for segment in name.split(SEPARATORS) {
            match segment {
                "" | "." => {}
                ".." => return None,
                segment => {
                    path.push(segment);
                    segments += 1;
                }
            }
        }
        (segments > 0).then_some(path)
    }

    /// Load the source of a template.
    ///
    /// Missing templates yield `Ok(None)` so that the engine reports them as
    /// not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    #[instrument(skip(self))]
    pub fn load(&self, name: &str) -> Result<Option<String>, Error> {
        let Some(path) = self.resolve(name) else {
            return Ok(None);
        };

        match fs::read_to_string(&path) {
            Ok(source) => {
                if let Some(stamp) = Stamp::of(&path) {
                    self.stamps.insert(name.to_string(), stamp);
                }
                debug!("Loaded template source from {}", path.display());
                Ok(Some(source))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("could not read template {}", path.display()),
            )
            .with_source(err)),
        }
    }

    /// Record the current on-disk stamp of `name`.
    ///
    /// Used when a source is served from somewhere other than the root, so
    /// that later changes to the root file still expire it.
    pub fn stamp(&self, name: &str) {
        if let Some(stamp) = self.current_stamp(name) {
            self.stamps.insert(name.to_string(), stamp);
        }
    }

    /// Whether a previously loaded template changed on disk since it was read.
    ///
    /// Templates never loaded through this loader are not considered expired.
    #[must_use]
    pub fn is_expired(&self, name: &str) -> bool {
        self.stamps
            .get(name)
            .is_some_and(|stamp| self.current_stamp(name) != Some(*stamp))
    }

    /// Whether any loaded template changed or disappeared.
    #[must_use]
    pub fn has_expired(&self) -> bool {
        self.stamps
            .iter()
            .any(|entry| self.current_stamp(entry.key()) != Some(*entry.value()))
    }

    /// Drop all recorded stamps.
    pub fn forget(&self) {
        self.stamps.clear();
    }

    fn current_stamp(&self, name: &str) -> Option<Stamp> {
        self.resolve(name).and_then(|path| Stamp::of(&path))
    }
}
