//! Discovery and parsing of launchable items on disk.
//!
//! The synchronization engine only needs three things from a scanner, captured
//! by the [`Scanner`] trait:
//!
//! - [`discover`](Scanner::discover) every item path currently on disk
//! - [`parse`](Scanner::parse) one path into a [`CatalogEntry`]
//! - a [`default_icon_path`](Scanner::default_icon_path) for entries without one
//!
//! [`FsScanner`] implements it for any [`LaunchableShape`]; [`FakeScanner`]
//! serves items from memory for tests. Parsing of
//! platform metadata is deliberately shallow: names come from desktop entries
//! or file stems.
//!
//! # Examples
//!
//! ```no_run
//! use lc_core::{DesktopEntryShape, LaunchableShape};
//! use lc_scanner::{FsScanner, Scanner};
//!
//! let shape = DesktopEntryShape;
//! let scanner = FsScanner::new(shape, shape.default_watch_dirs());
//!
//! for path in scanner.discover()? {
//!     match scanner.parse(&path) {
//!         Ok(entry) => println!("{}: {}", entry.name, entry.path),
//!         Err(err) => eprintln!("skipped: {err}"),
//!     }
//! }
//! # Ok::<(), lc_scanner::ScanError>(())
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod desktop;
pub mod error;
pub mod testing;
pub mod walker;

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use lc_core::{CatalogEntry, EntryId, LaunchableShape, PathKey, path_key_set_with_capacity};

pub use desktop::DesktopEntry;
pub use error::ScanError;
pub use testing::FakeScanner;
pub use walker::ItemWalker;

/// Discovers and parses launchable items.
///
/// Implementations perform blocking filesystem I/O; async callers run them
/// on a blocking thread.
pub trait Scanner: Send + Sync + 'static {
    /// Returns the path of every launchable item currently on disk.
    fn discover(&self) -> Result<Vec<Utf8PathBuf>, ScanError>;

    /// Parses one item into a fresh entry with a newly generated id.
    ///
    /// Returns [`ScanError::NotFound`] if the item is gone and
    /// [`ScanError::Unparseable`] if it exists but is not usable.
    fn parse(&self, path: &Utf8Path) -> Result<CatalogEntry, ScanError>;

    /// Icon used for entries that do not declare one.
    fn default_icon_path(&self) -> Utf8PathBuf;
}

impl<T: Scanner> Scanner for Arc<T> {
    fn discover(&self) -> Result<Vec<Utf8PathBuf>, ScanError> {
        self.as_ref().discover()
    }

    fn parse(&self, path: &Utf8Path) -> Result<CatalogEntry, ScanError> {
        self.as_ref().parse(path)
    }

    fn default_icon_path(&self) -> Utf8PathBuf {
        self.as_ref().default_icon_path()
    }
}

/// Filesystem [`Scanner`] for one [`LaunchableShape`].
#[derive(Debug)]
pub struct FsScanner<S> {
    shape: Arc<S>,
    roots: Vec<Utf8PathBuf>,
    default_icon: Utf8PathBuf,
    max_depth: Option<usize>,
}

impl<S: LaunchableShape> FsScanner<S> {
    /// Creates a scanner discovering items below `roots`.
    #[must_use]
    pub fn new(shape: S, roots: Vec<Utf8PathBuf>) -> Self {
        Self {
            shape: Arc::new(shape),
            roots,
            default_icon: Utf8PathBuf::from(platform_default_icon()),
            max_depth: None,
        }
    }

    /// Overrides the default icon.
    #[must_use]
    pub fn with_default_icon(mut self, icon: impl Into<Utf8PathBuf>) -> Self {
        self.default_icon = icon.into();
        self
    }

    /// Limits discovery depth below each root.
    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Returns the discovery roots.
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &[Utf8PathBuf] {
        &self.roots
    }

    fn parse_desktop_entry(
        &self,
        path: &Utf8Path,
        entry: CatalogEntry,
    ) -> Result<CatalogEntry, ScanError> {
        let text = std::fs::read_to_string(path).map_err(|e| ScanError::from_io(path, e))?;
        let desktop = DesktopEntry::parse(&text);

        if desktop.hidden {
            return Err(ScanError::unparseable(path, "entry is hidden"));
        }
        if !desktop.is_application() {
            return Err(ScanError::unparseable(path, "entry is not an application"));
        }
        let Some(name) = desktop.name else {
            return Err(ScanError::unparseable(path, "missing Name key"));
        };

        let mut entry = CatalogEntry { name, ..entry };
        entry.description = desktop.comment;
        entry.icon_path = desktop.icon.map(Utf8PathBuf::from);
        Ok(entry)
    }
}

impl<S: LaunchableShape> Scanner for FsScanner<S> {
    fn discover(&self) -> Result<Vec<Utf8PathBuf>, ScanError> {
        let mut seen = path_key_set_with_capacity(64);
        let mut items = Vec::new();

        for root in &self.roots {
            if !root.is_dir() {
                tracing::debug!(root = %root, "discovery root missing, skipping");
                continue;
            }
            let found = ItemWalker::new(root, Arc::clone(&self.shape))
                .with_max_depth(self.max_depth)
                .collect_items();
            tracing::debug!(root = %root, count = found.len(), "discovered items");
            items.extend(
                found
                    .into_iter()
                    .filter(|path| seen.insert(PathKey::new(path))),
            );
        }

        Ok(items)
    }

    fn parse(&self, path: &Utf8Path) -> Result<CatalogEntry, ScanError> {
        let modified = lc_core::fs::modified_at(path).map_err(|e| ScanError::from_io(path, e))?;

        if !self.shape.is_item(path) {
            return Err(ScanError::unparseable(
                path,
                format!("not a {} item", self.shape.name()),
            ));
        }

        let stem = path.file_stem().unwrap_or(path.as_str());
        let entry = CatalogEntry::new(EntryId::generate(), stem, path, modified);

        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("desktop"))
        {
            self.parse_desktop_entry(path, entry)
        } else {
            Ok(entry)
        }
    }

    fn default_icon_path(&self) -> Utf8PathBuf {
        self.default_icon.clone()
    }
}

#[cfg(target_os = "macos")]
fn platform_default_icon() -> String {
    "/System/Library/CoreServices/CoreTypes.bundle/Contents/Resources/GenericApplicationIcon.icns"
        .to_owned()
}

#[cfg(windows)]
fn platform_default_icon() -> String {
    let root = std::env::var("SystemRoot").unwrap_or_else(|_| "C:/Windows".to_owned());
    format!("{root}/System32/shell32.dll")
}

#[cfg(not(any(target_os = "macos", windows)))]
fn platform_default_icon() -> String {
    "application-x-executable".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc_core::{BundleShape, DesktopEntryShape};
    use std::fs;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("Invalid path")
    }

    #[test]
    fn test_parse_bundle_uses_stem() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8(&dir);
        fs::create_dir_all(root.join("Foo.bundle/Contents")).unwrap();

        let scanner = FsScanner::new(BundleShape::with_extension("bundle"), vec![root.clone()]);
        let entry = scanner.parse(&root.join("Foo.bundle")).unwrap();

        assert_eq!(entry.name, "Foo");
        assert_eq!(entry.path, root.join("Foo.bundle"));
        assert!(entry.icon_path.is_none());
    }

    #[test]
    fn test_parse_generates_fresh_ids() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8(&dir);
        fs::create_dir_all(root.join("Foo.app")).unwrap();

        let scanner = FsScanner::new(BundleShape::default(), vec![root.clone()]);
        let a = scanner.parse(&root.join("Foo.app")).unwrap();
        let b = scanner.parse(&root.join("Foo.app")).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_parse_missing_is_not_found() {
        let scanner = FsScanner::new(BundleShape::default(), Vec::new());
        let err = scanner
            .parse(Utf8Path::new("/definitely/missing/Foo.app"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parse_wrong_shape_is_unparseable() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8(&dir);
        fs::write(root.join("notes.txt"), "x").unwrap();

        let scanner = FsScanner::new(DesktopEntryShape, Vec::new());
        let err = scanner.parse(&root.join("notes.txt")).unwrap_err();
        assert!(matches!(err, ScanError::Unparseable { .. }));
    }

    #[test]
    fn test_parse_desktop_entry() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8(&dir);
        fs::write(
            root.join("editor.desktop"),
            "[Desktop Entry]\nType=Application\nName=Editor\nComment=Edit text\nIcon=/icons/editor.png\n",
        )
        .unwrap();

        let scanner = FsScanner::new(DesktopEntryShape, Vec::new());
        let entry = scanner.parse(&root.join("editor.desktop")).unwrap();

        assert_eq!(entry.name, "Editor");
        assert_eq!(entry.description.as_deref(), Some("Edit text"));
        assert_eq!(entry.icon_path.as_deref(), Some(Utf8Path::new("/icons/editor.png")));
    }

    #[test]
    fn test_parse_hidden_desktop_entry() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8(&dir);
        fs::write(root.join("x.desktop"), "[Desktop Entry]\nName=X\nNoDisplay=true\n").unwrap();

        let scanner = FsScanner::new(DesktopEntryShape, Vec::new());
        assert!(matches!(
            scanner.parse(&root.join("x.desktop")),
            Err(ScanError::Unparseable { .. })
        ));
    }

    #[test]
    fn test_discover_dedups_overlapping_roots() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8(&dir);
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/a.desktop"), "").unwrap();

        let scanner = FsScanner::new(
            DesktopEntryShape,
            vec![root.clone(), root.join("sub"), root.join("missing")],
        );
        let items = scanner.discover().unwrap();
        assert_eq!(items, vec![root.join("sub/a.desktop")]);
    }

    #[test]
    fn test_default_icon_override() {
        let scanner =
            FsScanner::new(DesktopEntryShape, Vec::new()).with_default_icon("/icons/generic.png");
        assert_eq!(scanner.default_icon_path(), "/icons/generic.png");
    }
}
