use std::path::{Path, PathBuf};

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

pub fn display_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `$HOME/projects`, the historical base directory.
pub fn default_base_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("projects"))
}
