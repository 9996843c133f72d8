//! Minimal freedesktop desktop-entry reader.
//!
//! Only the keys the catalog needs are read from the `[Desktop Entry]`
//! group. Localized keys (`Name[de]=...`) are ignored.

/// The catalog-relevant keys of a desktop entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesktopEntry {
    /// `Name`
    pub name: Option<String>,
    /// `Comment`
    pub comment: Option<String>,
    /// `Icon`
    pub icon: Option<String>,
    /// `Type`
    pub kind: Option<String>,
    /// `NoDisplay` or `Hidden` set to `true`.
    pub hidden: bool,
}

impl DesktopEntry {
    /// Parses the `[Desktop Entry]` group of `text`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut entry = Self::default();
        let mut in_group = false;

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                in_group = line == "[Desktop Entry]";
                continue;
            }
            if !in_group {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "Name" => entry.name = non_empty(value),
                "Comment" => entry.comment = non_empty(value),
                "Icon" => entry.icon = non_empty(value),
                "Type" => entry.kind = non_empty(value),
                "NoDisplay" | "Hidden" => entry.hidden |= value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        entry
    }

    /// Returns `true` if the entry describes a launchable application.
    #[must_use]
    pub fn is_application(&self) -> bool {
        self.kind.as_deref().is_none_or(|kind| kind == "Application")
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}
