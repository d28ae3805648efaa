//! Relative path arithmetic between a document directory and the anchor.
//!
//! The result is embedded verbatim into directive text, so it always uses `/`
//! separators regardless of the host convention.
use std::path::{Component, Path, PathBuf};

/// Shortest `..`/segment path from `from_dir` to `to_dir`.
///
/// Both paths are made absolute and normalized lexically first. When no
/// common root exists (distinct drive prefixes), the absolute path of
/// `to_dir` is returned instead.
pub fn resolve(from_dir: &Path, to_dir: &Path) -> String {
    let from = normalize_lexically(&absolutize(from_dir));
    let to = normalize_lexically(&absolutize(to_dir));

    let from_parts: Vec<Component<'_>> = from.components().collect();
    let to_parts: Vec<Component<'_>> = to.components().collect();

    if root_of(&from_parts) != root_of(&to_parts) {
        return to_forward_slashes(&to);
    }

    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments = vec!["..".to_string(); from_parts.len() - common];
    segments.extend(
        to_parts[common..]
            .iter()
            .map(|part| part.as_os_str().to_string_lossy().into_owned()),
    );

    if segments.is_empty() {
        ".".to_string()
    } else {
        segments.join("/")
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn root_of<'a>(parts: &[Component<'a>]) -> Vec<Component<'a>> {
    parts
        .iter()
        .take_while(|part| matches!(part, Component::Prefix(_) | Component::RootDir))
        .copied()
        .collect()
}

/// Drop `.` and fold `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
