//! Change events and their classification.
//!
//! # Event Flow
//!
//! ```text
//! notify::Event (raw kind + paths)
//!        │  RawOp::from_notify, LaunchableShape::resolve
//!        ▼
//!   (item path, RawOp)
//!        │  per-path debounce
//!        ▼
//!   classify(): stat when ambiguous
//!        │
//!        ▼
//!   ChangeEvent { kind, path } ──► bounded queue
//! ```

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use lc_core::PathKey;
use notify::EventKind;
use notify::event::ModifyKind;
use serde::{Deserialize, Serialize};

/// What happened to a launchable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The item appeared.
    Added,
    /// The item is gone.
    Removed,
    /// The item changed in place.
    Modified,
}

impl ChangeKind {
    /// All kinds, in display order.
    pub const ALL: [Self; 3] = [Self::Added, Self::Removed, Self::Modified];

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A debounced, classified change of one launchable item.
///
/// # Examples
///
/// ```
/// use lc_watcher::{ChangeEvent, ChangeKind};
///
/// let event = ChangeEvent::added("/Applications/Foo.app");
/// assert_eq!(event.kind, ChangeKind::Added);
/// assert_eq!(event.to_string(), "added /Applications/Foo.app");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    /// What happened.
    pub kind: ChangeKind,
    /// The item it happened to (a bundle root, never a path inside it).
    pub path: Utf8PathBuf,
}

impl ChangeEvent {
    /// Creates an event.
    #[inline]
    #[must_use]
    pub fn new(kind: ChangeKind, path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Creates an [`ChangeKind::Added`] event.
    #[inline]
    #[must_use]
    pub fn added(path: impl Into<Utf8PathBuf>) -> Self {
        Self::new(ChangeKind::Added, path)
    }

    /// Creates a [`ChangeKind::Removed`] event.
    #[inline]
    #[must_use]
    pub fn removed(path: impl Into<Utf8PathBuf>) -> Self {
        Self::new(ChangeKind::Removed, path)
    }

    /// Creates a [`ChangeKind::Modified`] event.
    #[inline]
    #[must_use]
    pub fn modified(path: impl Into<Utf8PathBuf>) -> Self {
        Self::new(ChangeKind::Modified, path)
    }

    /// Normalized key of the event path.
    #[inline]
    #[must_use]
    pub fn path_key(&self) -> PathKey {
        PathKey::new(&self.path)
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)
    }
}

/// A native operation, reduced to what classification needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawOp {
    /// Something was created.
    Create,
    /// Something was removed.
    Remove,
    /// Contents were written.
    Write,
    /// Permissions or other metadata changed.
    Metadata,
    /// Something was renamed (from or to this path).
    Rename,
}

impl RawOp {
    /// Maps a notify event kind. Access and unknown notifications map to
    /// `None` and are ignored.
    #[must_use]
    pub const fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Create),
            EventKind::Remove(_) => Some(Self::Remove),
            EventKind::Modify(ModifyKind::Name(_)) => Some(Self::Rename),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(Self::Metadata),
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other) => {
                Some(Self::Write)
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }

    /// Folds a newer operation on the same path into a pending one.
    ///
    /// The newer operation wins, except that writes following a creation are
    /// still a creation.
    #[must_use]
    pub const fn merge(self, newer: Self) -> Self {
        match (self, newer) {
            (Self::Create, Self::Write | Self::Metadata) => Self::Create,
            (_, newer) => newer,
        }
    }
}

/// Classifies a debounced operation on an item.
///
/// - `Remove` is always `Removed`
/// - anything else whose path no longer exists is `Removed`
/// - `Create` of an existing path is `Added`
/// - `Write`, `Metadata` and `Rename` of an existing path are `Modified`
#[must_use]
pub fn classify(op: RawOp, path: &Utf8Path) -> ChangeKind {
    match op {
        RawOp::Remove => ChangeKind::Removed,
        _ if !lc_core::fs::exists(path) => ChangeKind::Removed,
        RawOp::Create => ChangeKind::Added,
        RawOp::Write | RawOp::Metadata | RawOp::Rename => ChangeKind::Modified,
    }
}
