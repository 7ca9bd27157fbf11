//! Normalized keys: the common key space shared by folder scans and catalog rows.

use std::path::{Component, Path, PathBuf};

/// Separator used in display areas (`"Science / Physics"`).
pub const AREA_SEPARATOR: &str = " / ";

/// Canonicalize a relative path into a normalized key.
///
/// Separators are unified to `/` and empty, `.` or whitespace-only segments
/// are dropped. `..` collapses against the preceding segment, surrounding
/// whitespace is stripped and the root maps to `""`. On Windows the key is
/// lowercased to match the filesystem's case-insensitivity.
///
/// Leading `..` segments survive so callers can detect paths that climb above
/// their base. A leading `/` is kept for absolute inputs.
pub fn normalize_key(raw: &str) -> String {
    let unified = raw.trim().replace('\\', "/");
    let absolute = unified.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            // Whitespace-only segments would vanish in the final trim.
            blank if blank.trim().is_empty() => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                // Nothing above the root of an absolute path.
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    let key = if absolute {
        format!("/{joined}")
    } else {
        joined
    };
    let key = key.trim();

    if cfg!(windows) {
        key.to_lowercase()
    } else {
        key.to_string()
    }
}

/// Key of a path relative to the library root.
pub fn key_from_relative(path: &Path) -> String {
    normalize_key(&path.to_string_lossy())
}

/// Convert a display area (`"A / B"`) back to a relative path (`"A/B"`).
pub fn area_to_path(area: &str) -> String {
    area.trim()
        .replace(AREA_SEPARATOR, "/")
        .replace('\\', "/")
}

/// Key a file with this area and title would have: `area_to_path(area)/title`.
pub fn key_from_metadata(area: &str, title: &str) -> String {
    let area = area_to_path(area);
    let title = title.trim();

    if area.is_empty() {
        normalize_key(title)
    } else {
        normalize_key(&format!("{area}/{title}"))
    }
}

/// Build the display area for a directory relative to the library root.
pub fn area_from_relative_dir(dir: &Path) -> String {
    dir.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(AREA_SEPARATOR)
}

/// Lexically clean a path: drop `.`, resolve `..` against earlier segments.
///
/// Unlike `canonicalize` this never touches the filesystem, so it works for
/// paths that no longer exist.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    parts.iter().map(|c| c.as_os_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key_collapses_segments() {
        assert_eq!(normalize_key("A/./b//c.pdf"), "A/b/c.pdf");
        assert_eq!(normalize_key("A/x/../b.pdf"), "A/b.pdf");
        assert_eq!(normalize_key("  A/b.pdf  "), "A/b.pdf");
        assert_eq!(normalize_key("A\\B\\c.epub"), "A/B/c.epub");
        assert_eq!(normalize_key("a/b/ /"), "a/b");
        assert_eq!(normalize_key("a/ /b.pdf"), "a/b.pdf");
    }

    #[test]
    fn test_normalize_key_root() {
        assert_eq!(normalize_key(""), "");
        assert_eq!(normalize_key("."), "");
        assert_eq!(normalize_key("./"), "");
        assert_eq!(normalize_key("A/.."), "");
    }

    #[test]
    fn test_normalize_key_keeps_escape() {
        assert_eq!(normalize_key("../outside/x.pdf"), "../outside/x.pdf");
        assert_eq!(normalize_key("A/../../x.pdf"), "../x.pdf");
        assert_eq!(normalize_key("/../x.pdf"), "/x.pdf");
        assert_eq!(normalize_key("/srv/books/a.pdf"), "/srv/books/a.pdf");
    }

    #[test]
    fn test_key_from_metadata() {
        assert_eq!(key_from_metadata("Science / Physics", "qm.pdf"), "Science/Physics/qm.pdf");
        assert_eq!(key_from_metadata("", " a.pdf "), "a.pdf");
        assert_eq!(key_from_metadata("", ""), "");
    }

    #[test]
    fn test_normalize_key_idempotent() {
        let samples = [
            "",
            ".",
            "A/b.pdf",
            " ./A//B/../c.pdf ",
            "..\\x\\..\\..\\y.azw",
            "./ ../x",
            "a/b/ /",
            " / /a/ /b.pdf",
            "/a/./b/",
            "Área / Sub/Livro.epub",
        ];
        for sample in samples {
            let once = normalize_key(sample);
            assert_eq!(normalize_key(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[cfg(not(windows))]
    #[test]
    fn test_normalize_key_preserves_case() {
        assert_eq!(normalize_key("Fisica/Livro.PDF"), "Fisica/Livro.PDF");
    }

    #[test]
    fn test_area_conversions() {
        assert_eq!(area_to_path("Science / Physics"), "Science/Physics");
        assert_eq!(area_to_path("Science\\Physics"), "Science/Physics");
        assert_eq!(area_to_path(""), "");
        assert_eq!(
            area_from_relative_dir(Path::new("Science/Physics")),
            "Science / Physics"
        );
        assert_eq!(area_from_relative_dir(Path::new("")), "");
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean_path(Path::new("/a/./b")), PathBuf::from("/a/b"));
        assert_eq!(clean_path(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(clean_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }
}
