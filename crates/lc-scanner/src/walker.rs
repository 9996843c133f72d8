//! Directory traversal for launchable items.
//!
//! [`ItemWalker`] walks one discovery root with the `ignore` crate and yields
//! every path the configured [`LaunchableShape`] accepts as an item.
//!
//! # Features
//!
//! - Does not descend into items (the inside of a `.app` bundle is never
//!   walked)
//! - Skips hidden files and directories
//! - Logs and skips unreadable entries and non-UTF-8 paths instead of failing
//!   the whole walk

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ignore::WalkBuilder;
use lc_core::LaunchableShape;

/// Directory names that never contain launchable items.
const SKIP_DIRECTORIES: &[&str] = &["__MACOSX", "node_modules", "$RECYCLE.BIN"];

/// Walks one discovery root for launchable items.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use lc_core::DesktopEntryShape;
/// use lc_scanner::ItemWalker;
/// use camino::Utf8Path;
///
/// let walker = ItemWalker::new(Utf8Path::new("/usr/share/applications"), Arc::new(DesktopEntryShape));
/// for item in walker.collect_items() {
///     println!("Found: {item}");
/// }
/// ```
#[derive(Debug)]
pub struct ItemWalker<S> {
    root: Utf8PathBuf,
    shape: Arc<S>,
    follow_links: bool,
    max_depth: Option<usize>,
}

impl<S: LaunchableShape> ItemWalker<S> {
    /// Creates a walker for `root`.
    #[must_use]
    pub fn new(root: &Utf8Path, shape: Arc<S>) -> Self {
        Self {
            root: root.to_owned(),
            shape,
            follow_links: true,
            max_depth: None,
        }
    }

    /// Configures whether to follow symbolic links. Defaults to `true`, since
    /// application directories commonly hold symlinked entries.
    #[must_use]
    pub const fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Limits how deep below the root the walk goes.
    #[must_use]
    pub const fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Returns the root directory being walked.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Collects every launchable item below the root.
    ///
    /// Entries that cannot be read are logged at `debug` level and skipped.
    #[must_use]
    pub fn collect_items(&self) -> Vec<Utf8PathBuf> {
        let mut items = Vec::new();

        for result in self.build_walker() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(root = %self.root, error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            let Some(path) = Utf8Path::from_path(entry.path()) else {
                tracing::debug!(path = %entry.path().display(), "skipping non-UTF-8 path");
                continue;
            };

            if self.shape.is_item(path) {
                items.push(path.to_owned());
            }
        }

        items
    }

    fn build_walker(&self) -> ignore::Walk {
        let shape = Arc::clone(&self.shape);
        WalkBuilder::new(&self.root)
            // Only hidden-file filtering; .gitignore and friends are
            // meaningless in application directories.
            .standard_filters(false)
            .hidden(true)
            .follow_links(self.follow_links)
            .max_depth(self.max_depth)
            .filter_entry(move |entry| keep_entry(shape.as_ref(), entry))
            .build()
    }
}

/// Decides whether an entry is yielded and, for directories, descended into.
fn keep_entry<S: LaunchableShape>(shape: &S, entry: &ignore::DirEntry) -> bool {
    let Some(path) = Utf8Path::from_path(entry.path()) else {
        return false;
    };
    if path
        .file_name()
        .is_some_and(|name| SKIP_DIRECTORIES.contains(&name))
    {
        return false;
    }
    // Anything whose parent is already an item (or inside one) is bundle
    // content and must not be walked.
    path.parent()
        .is_none_or(|parent| shape.resolve(parent).is_none())
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
    fn test_collects_desktop_entries_recursively() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8(&dir);
        fs::create_dir_all(root.join("kde")).unwrap();
        fs::write(root.join("firefox.desktop"), "").unwrap();
        fs::write(root.join("kde/konsole.desktop"), "").unwrap();
        fs::write(root.join("mimeinfo.cache"), "").unwrap();
        fs::write(root.join(".hidden.desktop"), "").unwrap();

        let mut items = ItemWalker::new(&root, Arc::new(DesktopEntryShape)).collect_items();
        items.sort();

        assert_eq!(
            items,
            vec![root.join("firefox.desktop"), root.join("kde/konsole.desktop")]
        );
    }

    #[test]
    fn test_does_not_descend_into_bundles() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8(&dir);
        fs::create_dir_all(root.join("Foo.app/Contents/Helpers/Inner.app")).unwrap();
        fs::create_dir_all(root.join("Utilities/Bar.app/Contents")).unwrap();

        let mut items = ItemWalker::new(&root, Arc::new(BundleShape::default())).collect_items();
        items.sort();

        assert_eq!(
            items,
            vec![root.join("Foo.app"), root.join("Utilities/Bar.app")]
        );
    }

    #[test]
    fn test_max_depth() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8(&dir);
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("top.desktop"), "").unwrap();
        fs::write(root.join("a/b/deep.desktop"), "").unwrap();

        let items = ItemWalker::new(&root, Arc::new(DesktopEntryShape))
            .with_max_depth(Some(1))
            .collect_items();

        assert_eq!(items, vec![root.join("top.desktop")]);
    }

    #[test]
    fn test_skip_directories() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = utf8(&dir);
        fs::create_dir_all(root.join("__MACOSX")).unwrap();
        fs::write(root.join("__MACOSX/ghost.desktop"), "").unwrap();

        let items = ItemWalker::new(&root, Arc::new(DesktopEntryShape)).collect_items();
        assert!(items.is_empty());
    }
}
