//! Document discovery under the base directory.
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursively collect files named `document_name` under `base`.
///
/// Traversal is sorted by file name so two passes over an unchanged tree
/// produce the same order. Documents whose path below `base` contains any
/// `excluded` substring are dropped; unreadable entries are logged and
/// skipped. Symlinked documents are kept when they point at a file; a
/// document reachable through more than one path is kept once.
pub fn discover_documents(
    base: &Path,
    document_name: &str,
    excluded: &[String],
) -> Vec<PathBuf> {
    let mut documents = Vec::new();
    let mut seen = HashSet::new();
    let walker = WalkDir::new(base)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| base.display().to_string());
                tracing::warn!(path = %path, error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_name() != document_name {
            continue;
        }
        let file_type = entry.file_type();
        if file_type.is_symlink() && !entry.path().is_file() {
            tracing::warn!(
                path = %entry.path().display(),
                "skipping symlink that does not point at a file"
            );
            continue;
        }
        if !file_type.is_file() && !file_type.is_symlink() {
            continue;
        }
        let path = entry.into_path();
        let rel = path.strip_prefix(base).unwrap_or(&path);
        if is_excluded(rel, excluded) {
            tracing::debug!(path = %path.display(), "excluded from discovery");
            continue;
        }
        let target = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !seen.insert(target) {
            tracing::warn!(
                path = %path.display(),
                "document already discovered through another path"
            );
            continue;
        }
        documents.push(path);
    }
    documents
}

fn is_excluded(path: &Path, excluded: &[String]) -> bool {
    let rendered = path.to_string_lossy();
    excluded
        .iter()
        .filter(|needle| !needle.is_empty())
        .any(|needle| rendered.contains(needle.as_str()))
}
