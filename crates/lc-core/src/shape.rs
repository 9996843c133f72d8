//! Launchable shapes: what a launchable item looks like on disk.
//!
//! Each platform stores installed applications differently. A
//! [`LaunchableShape`] captures one convention:
//!
//! - which raw filesystem paths belong to a launchable item, and which item
//! - how directories holding such items must be watched
//! - where those directories live by default
//!
//! | Shape                 | Items                                   | Platform  |
//! |-----------------------|-----------------------------------------|-----------|
//! | [`BundleShape`]       | `*.app` bundle directories              | macOS     |
//! | [`ShortcutShape`]     | `*.lnk` / `*.exe` files                 | Windows   |
//! | [`DesktopEntryShape`] | `*.desktop` files                       | Linux/BSD |
//!
//! [`PlatformShape`] names the shape for the build target.
//!
//! # Examples
//!
//! ```
//! use lc_core::{BundleShape, LaunchableShape};
//! use camino::Utf8Path;
//!
//! let shape = BundleShape::default();
//!
//! // A path inside a bundle resolves to the bundle root
//! assert_eq!(
//!     shape.resolve(Utf8Path::new("/Applications/Foo.app/Contents/Info.plist")).as_deref(),
//!     Some(Utf8Path::new("/Applications/Foo.app")),
//! );
//!
//! // Unrelated files are not launchable
//! assert!(shape.resolve(Utf8Path::new("/Applications/readme.txt")).is_none());
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use smallvec::SmallVec;

/// How the directories holding launchable items must be watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchStrategy {
    /// One recursive watch per configured directory.
    Recursive,
    /// One non-recursive watch per configured directory.
    TopLevel,
    /// One non-recursive watch for the configured directory and for every
    /// subdirectory below it, for platforms whose native API cannot watch
    /// recursively.
    EveryDirectory,
}

impl WatchStrategy {
    /// Returns `true` if native recursive watching is used.
    #[inline]
    #[must_use]
    pub const fn is_recursive(self) -> bool {
        matches!(self, Self::Recursive)
    }
}

/// A platform convention for launchable items.
///
/// Shapes are consulted from the native notification callback, so they must
/// be cheap, non-blocking and [`Send`] + [`Sync`].
pub trait LaunchableShape: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Maps a raw filesystem path to the launchable item it belongs to.
    ///
    /// Returns `None` when the path is irrelevant. A path inside a bundle
    /// resolves to the bundle root.
    fn resolve(&self, path: &Utf8Path) -> Option<Utf8PathBuf>;

    /// How directories of this shape are watched.
    fn watch_strategy(&self) -> WatchStrategy;

    /// Directories that hold items of this shape on a typical system.
    ///
    /// Directories that do not exist are included; callers skip them.
    fn default_watch_dirs(&self) -> Vec<Utf8PathBuf> {
        Vec::new()
    }

    /// Returns `true` if `path` is itself a launchable item (not merely
    /// inside one).
    fn is_item(&self, path: &Utf8Path) -> bool {
        self.resolve(path).is_some_and(|item| item.as_path() == path)
    }
}

/// Bundle directories (`Foo.app`) as used on macOS.
///
/// Any path at or below a bundle resolves to the outermost bundle root, so a
/// write to `Foo.app/Contents/Info.plist` is reported as a change of
/// `Foo.app`.
#[derive(Debug, Clone)]
pub struct BundleShape {
    extension: &'static str,
}

impl BundleShape {
    /// Creates a bundle shape for the given extension (without the dot).
    #[must_use]
    pub const fn with_extension(extension: &'static str) -> Self {
        Self { extension }
    }
}

impl Default for BundleShape {
    fn default() -> Self {
        Self::with_extension("app")
    }
}

impl LaunchableShape for BundleShape {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn resolve(&self, path: &Utf8Path) -> Option<Utf8PathBuf> {
        // ancestors() yields the longest path first; the last hit is the
        // outermost bundle.
        path.ancestors()
            .filter(|ancestor| has_extension(ancestor, self.extension))
            .last()
            .map(Utf8Path::to_path_buf)
    }

    fn watch_strategy(&self) -> WatchStrategy {
        WatchStrategy::Recursive
    }

    fn default_watch_dirs(&self) -> Vec<Utf8PathBuf> {
        let mut dirs: Vec<Utf8PathBuf> = [
            "/Applications",
            "/System/Applications",
            "/System/Applications/Utilities",
            "/System/Library/CoreServices",
        ]
        .into_iter()
        .map(Utf8PathBuf::from)
        .collect();
        if let Some(home) = home_dir() {
            dirs.push(home.join("Applications"));
        }
        dirs
    }
}

/// Shortcut and executable files (`*.lnk`, `*.exe`) as used on Windows.
///
/// Extensions match case-insensitively. The native Windows watcher is driven
/// one directory at a time, so every subdirectory gets its own watch.
#[derive(Debug, Clone)]
pub struct ShortcutShape {
    extensions: SmallVec<[&'static str; 4]>,
}

impl ShortcutShape {
    /// Adds an accepted extension (without the dot).
    #[must_use]
    pub fn with_extension(mut self, ext: &'static str) -> Self {
        if !self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            self.extensions.push(ext);
        }
        self
    }
}

impl Default for ShortcutShape {
    fn default() -> Self {
        Self {
            extensions: SmallVec::from_slice(&["lnk", "exe"]),
        }
    }
}

impl LaunchableShape for ShortcutShape {
    fn name(&self) -> &'static str {
        "shortcut"
    }

    fn resolve(&self, path: &Utf8Path) -> Option<Utf8PathBuf> {
        self.extensions
            .iter()
            .any(|ext| has_extension(path, ext))
            .then(|| path.to_path_buf())
    }

    fn watch_strategy(&self) -> WatchStrategy {
        WatchStrategy::EveryDirectory
    }

    fn default_watch_dirs(&self) -> Vec<Utf8PathBuf> {
        const START_MENU: &str = "Microsoft/Windows/Start Menu/Programs";

        let mut dirs = Vec::with_capacity(2);
        if let Some(roaming) = directories::BaseDirs::new()
            .and_then(|base| Utf8PathBuf::from_path_buf(base.data_dir().to_path_buf()).ok())
        {
            dirs.push(roaming.join(START_MENU));
        }
        let program_data =
            std::env::var("ProgramData").unwrap_or_else(|_| "C:/ProgramData".to_owned());
        dirs.push(Utf8PathBuf::from(program_data).join(START_MENU));
        dirs
    }
}

/// Freedesktop desktop entries (`*.desktop`) as used on Linux and the BSDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopEntryShape;

impl LaunchableShape for DesktopEntryShape {
    fn name(&self) -> &'static str {
        "desktop-entry"
    }

    fn resolve(&self, path: &Utf8Path) -> Option<Utf8PathBuf> {
        has_extension(path, "desktop").then(|| path.to_path_buf())
    }

    fn watch_strategy(&self) -> WatchStrategy {
        WatchStrategy::Recursive
    }

    fn default_watch_dirs(&self) -> Vec<Utf8PathBuf> {
        let mut dirs: Vec<Utf8PathBuf> = [
            "/usr/share/applications",
            "/usr/local/share/applications",
            "/var/lib/flatpak/exports/share/applications",
        ]
        .into_iter()
        .map(Utf8PathBuf::from)
        .collect();
        if let Some(data) = directories::BaseDirs::new()
            .and_then(|base| Utf8PathBuf::from_path_buf(base.data_dir().to_path_buf()).ok())
        {
            dirs.push(data.join("applications"));
        }
        dirs
    }
}

/// The launchable shape of the build target.
#[cfg(target_os = "macos")]
pub type PlatformShape = BundleShape;

/// The launchable shape of the build target.
#[cfg(windows)]
pub type PlatformShape = ShortcutShape;

/// The launchable shape of the build target.
#[cfg(not(any(target_os = "macos", windows)))]
pub type PlatformShape = DesktopEntryShape;

fn has_extension(path: &Utf8Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn home_dir() -> Option<Utf8PathBuf> {
    directories::BaseDirs::new()
        .and_then(|base| Utf8PathBuf::from_path_buf(base.home_dir().to_path_buf()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_resolves_root() {
        let shape = BundleShape::default();
        assert_eq!(
            shape.resolve(Utf8Path::new("/Applications/Foo.app")).as_deref(),
            Some(Utf8Path::new("/Applications/Foo.app"))
        );
        assert!(shape.is_item(Utf8Path::new("/Applications/Foo.app")));
    }

    #[test]
    fn test_bundle_inner_path_maps_to_outermost_root() {
        let shape = BundleShape::default();
        let inner = Utf8Path::new("/Applications/Foo.app/Contents/Helpers/Bar.app/Contents/x");
        assert_eq!(
            shape.resolve(inner).as_deref(),
            Some(Utf8Path::new("/Applications/Foo.app"))
        );
        assert!(!shape.is_item(inner));
    }

    #[test]
    fn test_bundle_custom_extension() {
        let shape = BundleShape::with_extension("bundle");
        assert!(shape.is_item(Utf8Path::new("/Apps/Foo.bundle")));
        assert!(shape.resolve(Utf8Path::new("/Apps/Foo.app")).is_none());
    }

    #[test]
    fn test_bundle_ignores_lookalikes() {
        let shape = BundleShape::default();
        assert!(shape.resolve(Utf8Path::new("/Applications/apps.txt")).is_none());
        assert!(shape.resolve(Utf8Path::new("/Applications/Foo.application")).is_none());
    }

    #[test]
    fn test_shortcut_case_insensitive() {
        let shape = ShortcutShape::default();
        assert!(shape.is_item(Utf8Path::new("C:/Start Menu/Programs/Foo.LNK")));
        assert!(shape.is_item(Utf8Path::new("C:/Start Menu/Programs/foo.Exe")));
        assert!(!shape.is_item(Utf8Path::new("C:/Start Menu/Programs/readme.txt")));
        assert_eq!(shape.watch_strategy(), WatchStrategy::EveryDirectory);
    }

    #[test]
    fn test_shortcut_extra_extension() {
        let shape = ShortcutShape::default().with_extension("url").with_extension("LNK");
        assert_eq!(shape.extensions.len(), 3);
        assert!(shape.is_item(Utf8Path::new("C:/x/site.url")));
    }

    #[test]
    fn test_desktop_entry() {
        let shape = DesktopEntryShape;
        assert!(shape.is_item(Utf8Path::new("/usr/share/applications/firefox.desktop")));
        assert!(shape.resolve(Utf8Path::new("/usr/share/applications/mimeinfo.cache")).is_none());
        assert!(shape.watch_strategy().is_recursive());
    }

    #[test]
    fn test_default_watch_dirs_not_empty() {
        assert!(!BundleShape::default().default_watch_dirs().is_empty());
        assert!(!ShortcutShape::default().default_watch_dirs().is_empty());
        assert!(!DesktopEntryShape.default_watch_dirs().is_empty());
    }
}
