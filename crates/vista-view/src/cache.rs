//! On-disk cache of resolved template sources.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use minijinja::{Error, ErrorKind};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::loader::FileLoader;

const ENTRY_EXTENSION: &str = "jinja";

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a, so entry names stay the same across builds.
fn fnv1a(parts: &[&[u8]]) -> u64 {
    parts.iter().fold(FNV_OFFSET, |hash, part| {
        part.iter()
            .chain(std::iter::once(&0))
            .fold(hash, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME))
    })
}

/// Cache directory and refresh flag shared with the engine's loader callback.
///
/// When a directory is set, every source fetched from the loader is written
/// into it. With refresh off, existing entries are served without touching
/// the template root.
#[derive(Debug, Default)]
pub struct SourceCache {
    dir: ArcSwapOption<PathBuf>,
    refresh: AtomicBool,
}

impl SourceCache {
    /// Create a cache with no directory and refresh off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cache directory.
    #[must_use]
    pub fn dir(&self) -> Option<PathBuf> {
        self.dir.load_full().map(|dir| (*dir).clone())
    }

    /// Set or clear the cache directory.
    pub fn set_dir(&self, dir: Option<PathBuf>) {
        self.dir.store(dir.map(Arc::new));
    }

    /// Whether sources are re-read from the root on every fetch.
    #[must_use]
    pub fn refresh(&self) -> bool {
        self.refresh.load(Ordering::Relaxed)
    }

    /// Toggle refresh.
    pub fn set_refresh(&self, refresh: bool) {
        self.refresh.store(refresh, Ordering::Relaxed);
    }

    /// Path of the cache entry for `name` below `dir`.
    #[must_use]
    pub fn entry_path(dir: &Path, root: &Path, name: &str) -> PathBuf {
        let hash = fnv1a(&[root.as_os_str().as_encoded_bytes(), name.as_bytes()]);
        let stem: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
            .collect();
        dir.join(format!(
            "{}--{:016x}.{ENTRY_EXTENSION}",
            stem.trim_matches('-'),
            hash
        ))
    }

    /// Fetch the source of `name`, going through the cache directory if set.
    ///
    /// # Errors
    ///
    /// Returns an error if the source or a cache entry cannot be read, or the
    /// entry cannot be written.
    #[instrument(skip(self, loader))]
    pub fn fetch(&self, loader: &FileLoader, name: &str) -> Result<Option<String>, Error> {
        let Some(dir) = self.dir.load_full() else {
            return loader.load(name);
        };
        let entry = Self::entry_path(&dir, &loader.root(), name);

        if !self.refresh() {
            match fs::read_to_string(&entry) {
                Ok(source) => {
                    debug!("Serving cached source from {}", entry.display());
                    loader.stamp(name);
                    return Ok(Some(source));
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(cache_error("read", &entry, err)),
            }
        }

        let source = loader.load(name)?;
        if let Some(source) = &source {
            write_entry(&dir, &entry, source)?;
            debug!("Cached source at {}", entry.display());
        }
        Ok(source)
    }
}

/// Write through a temporary file in `dir` so readers never see a partial
/// entry.
fn write_entry(dir: &Path, entry: &Path, source: &str) -> Result<(), Error> {
    fs::create_dir_all(dir).map_err(|err| cache_error("create", dir, err))?;
    let mut file = NamedTempFile::new_in(dir).map_err(|err| cache_error("create", dir, err))?;
    file.write_all(source.as_bytes())
        .map_err(|err| cache_error("write", entry, err))?;
    file.persist(entry)
        .map_err(|err| cache_error("write", entry, err.error))?;
    Ok(())
}

fn cache_error(action: &str, path: &Path, err: io::Error) -> Error {
    Error::new(
        ErrorKind::InvalidOperation,
        format!("could not {action} template cache {}", path.display()),
    )
    .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_path_is_stable_and_sanitized() {
        let dir = Path::new("/cache");
        let a = SourceCache::entry_path(dir, Path::new("/views"), "parent/test.html");
        let b = SourceCache::entry_path(dir, Path::new("/views"), "parent/test.html");
        let c = SourceCache::entry_path(dir, Path::new("/other"), "parent/test.html");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with(dir));
        let file = a.file_name().unwrap().to_str().unwrap();
        assert!(file.starts_with("parent-test.html--"));
        assert!(file.ends_with(".jinja"));
    }

    #[test]
    fn test_entry_hash_is_fixed() {
        assert_eq!(fnv1a(&[]), FNV_OFFSET);
        assert_eq!(fnv1a(&["a".as_bytes()]), 0x089b_e207_b544_f1e4);
        assert_ne!(
            fnv1a(&["ab".as_bytes(), "c".as_bytes()]),
            fnv1a(&["a".as_bytes(), "bc".as_bytes()])
        );

        let entry = SourceCache::entry_path(Path::new("/cache"), Path::new("/views"), "test.html");
        let expected = format!(
            "test.html--{:016x}.jinja",
            fnv1a(&["/views".as_bytes(), "test.html".as_bytes()])
        );
        assert_eq!(entry, Path::new("/cache").join(expected));
    }

    #[test]
    fn test_fetch_without_dir_reads_root() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("a.txt"), "A").unwrap();

        let cache = SourceCache::new();
        let loader = FileLoader::new(root.path());
        assert_eq!(cache.fetch(&loader, "a.txt").unwrap().as_deref(), Some("A"));
        assert!(cache.dir().is_none());
    }

    #[test]
    fn test_fetch_writes_and_trusts_entry() {
        let root = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let nested = cache_dir.path().join("views");
        fs::write(root.path().join("a.txt"), "first").unwrap();

        let cache = SourceCache::new();
        cache.set_dir(Some(nested.clone()));
        let loader = FileLoader::new(root.path());

        assert_eq!(cache.fetch(&loader, "a.txt").unwrap().as_deref(), Some("first"));
        let entry = SourceCache::entry_path(&nested, root.path(), "a.txt");
        assert_eq!(fs::read_to_string(&entry).unwrap(), "first");

        fs::write(root.path().join("a.txt"), "second").unwrap();
        assert_eq!(cache.fetch(&loader, "a.txt").unwrap().as_deref(), Some("first"));

        cache.set_refresh(true);
        assert_eq!(cache.fetch(&loader, "a.txt").unwrap().as_deref(), Some("second"));
        assert_eq!(fs::read_to_string(&entry).unwrap(), "second");
        assert_eq!(fs::read_dir(&nested).unwrap().count(), 1);
    }

    #[test]
    fn test_cache_hit_records_stamp() {
        let root = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        fs::write(root.path().join("a.txt"), "first").unwrap();

        let cache = SourceCache::new();
        cache.set_dir(Some(cache_dir.path().to_path_buf()));
        cache.fetch(&FileLoader::new(root.path()), "a.txt").unwrap();

        let loader = FileLoader::new(root.path());
        assert_eq!(cache.fetch(&loader, "a.txt").unwrap().as_deref(), Some("first"));
        fs::write(root.path().join("a.txt"), "second, longer").unwrap();
        assert!(loader.is_expired("a.txt"));
    }

    #[test]
    fn test_fetch_missing_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();

        let cache = SourceCache::new();
        cache.set_dir(Some(cache_dir.path().to_path_buf()));
        let loader = FileLoader::new(root.path());

        assert!(cache.fetch(&loader, "missing.txt").unwrap().is_none());
        assert_eq!(fs::read_dir(cache_dir.path()).unwrap().count(), 0);
    }
}
