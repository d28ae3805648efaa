//! Change application: dry-run previews and backed-up overwrites.
//!
//! Each document is read, transformed and (in apply mode) written as one
//! unit. File handles never outlive a call, and any I/O failure is returned as
//! a `DocumentError` for that document alone.
use crate::error::DocumentError;
use crate::rules::{ChangeRecord, Rewrite};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Lifecycle of one document within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Preview,
    Confirmed,
    Applied,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    DryRun,
    Apply,
}

/// Successful outcome for one document.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub path: PathBuf,
    pub state: DocumentState,
    pub changes: Vec<ChangeRecord>,
    /// Proposed content, kept only for previews.
    pub proposed: Option<String>,
    /// Backup written before the overwrite, for applied documents.
    pub backup: Option<PathBuf>,
}

impl DocumentOutcome {
    pub fn change_count(&self) -> usize {
        self.changes.iter().map(|change| change.count).sum()
    }
}

/// `Err` is the `FAILED` terminal state.
pub type DocumentResult = Result<DocumentOutcome, DocumentError>;

pub fn state_of(result: &DocumentResult) -> DocumentState {
    match result {
        Ok(outcome) => outcome.state,
        Err(_) => DocumentState::Failed,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChangeApplier {
    mode: Mode,
}

impl ChangeApplier {
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Run `transform` over the current on-disk content of `path`.
    pub fn process<F>(&self, path: &Path, transform: F) -> DocumentResult
    where
        F: FnOnce(&str) -> Rewrite,
    {
        match self.mode {
            Mode::DryRun => preview(path, transform),
            Mode::Apply => apply(path, transform),
        }
    }
}

fn preview<F>(path: &Path, transform: F) -> DocumentResult
where
    F: FnOnce(&str) -> Rewrite,
{
    let (_, content) = read_document(path)?;
    let rewrite = transform(&content);
    if rewrite.total() == 0 {
        return Ok(skipped(path));
    }
    tracing::debug!(
        path = %path.display(),
        state = ?DocumentState::Preview,
        changes = rewrite.total()
    );
    Ok(DocumentOutcome {
        path: path.to_path_buf(),
        state: DocumentState::Preview,
        changes: rewrite.changes,
        proposed: Some(rewrite.content),
        backup: None,
    })
}

fn apply<F>(path: &Path, transform: F) -> DocumentResult
where
    F: FnOnce(&str) -> Rewrite,
{
    tracing::debug!(path = %path.display(), state = ?DocumentState::Confirmed);
    // Always recompute from disk; a preview snapshot may be stale.
    let (bytes, content) = read_document(path)?;
    let rewrite = transform(&content);
    if rewrite.total() == 0 {
        return Ok(skipped(path));
    }
    let permissions = writable_permissions(path)?;
    let backup = write_backup(path, &bytes)?;
    overwrite(path, &rewrite.content, permissions)?;
    tracing::info!(
        path = %path.display(),
        backup = %backup.display(),
        changes = rewrite.total(),
        "document updated"
    );
    Ok(DocumentOutcome {
        path: path.to_path_buf(),
        state: DocumentState::Applied,
        changes: rewrite.changes,
        proposed: None,
        backup: Some(backup),
    })
}

fn skipped(path: &Path) -> DocumentOutcome {
    tracing::debug!(path = %path.display(), state = ?DocumentState::Skipped);
    DocumentOutcome {
        path: path.to_path_buf(),
        state: DocumentState::Skipped,
        changes: Vec::new(),
        proposed: None,
        backup: None,
    }
}

fn read_document(path: &Path) -> Result<(Vec<u8>, String), DocumentError> {
    let bytes = fs::read(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let content = std::str::from_utf8(&bytes)
        .map_err(|_| DocumentError::Decode {
            path: path.to_path_buf(),
        })?
        .to_string();
    Ok((bytes, content))
}

/// `<file>.backup.<YYYYMMDD_HHMMSS>` next to `path`.
pub fn backup_name(path: &Path, timestamp: &str) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    format!("{file_name}.backup.{timestamp}")
}

/// Write `bytes` to a fresh backup file; an existing backup is never reused.
fn write_backup(path: &Path, bytes: &[u8]) -> Result<PathBuf, DocumentError> {
    let timestamp = chrono::Local::now()
        .format(BACKUP_TIMESTAMP_FORMAT)
        .to_string();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base_name = backup_name(path, &timestamp);
    let backup_err = |source: std::io::Error| DocumentError::Backup {
        path: path.to_path_buf(),
        source,
    };

    let mut attempt = 0usize;
    loop {
        let candidate = if attempt == 0 {
            dir.join(&base_name)
        } else {
            dir.join(format!("{base_name}_{attempt}"))
        };
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(mut file) => {
                let written = file.write_all(bytes).and_then(|_| file.sync_all());
                if let Err(source) = written {
                    let _ = fs::remove_file(&candidate);
                    return Err(backup_err(source));
                }
                return Ok(candidate);
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => return Err(backup_err(source)),
        }
    }
}

/// Current permissions of `path`; a read-only document fails before any write.
fn writable_permissions(path: &Path) -> Result<fs::Permissions, DocumentError> {
    let write_err = |source: std::io::Error| DocumentError::Write {
        path: path.to_path_buf(),
        source,
    };
    let permissions = fs::metadata(path).map_err(write_err)?.permissions();
    if permissions.readonly() {
        return Err(write_err(std::io::Error::new(
            ErrorKind::PermissionDenied,
            "document is read-only",
        )));
    }
    Ok(permissions)
}

/// Replace `path` by writing a hidden sibling and renaming it into place.
///
/// A symlinked document is written through to its target, and the target
/// keeps `permissions`.
fn overwrite(
    path: &Path,
    content: &str,
    permissions: fs::Permissions,
) -> Result<(), DocumentError> {
    let write_err = |source: std::io::Error| DocumentError::Write {
        path: path.to_path_buf(),
        source,
    };
    let target = fs::canonicalize(path).map_err(write_err)?;
    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document");
    let tmp_path = target
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{file_name}.tmp"));
    let staged = fs::write(&tmp_path, content.as_bytes())
        .and_then(|_| fs::set_permissions(&tmp_path, permissions))
        .and_then(|_| fs::rename(&tmp_path, &target));
    if let Err(source) = staged {
        if tmp_path.is_file() {
            let _ = fs::remove_file(&tmp_path);
        }
        return Err(write_err(source));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ChangeSource;

    fn renew_prefix(content: &str) -> Rewrite {
        if content.starts_with("@old") {
            Rewrite {
                content: content.replacen("@old", "@new", 1),
                changes: vec![ChangeRecord {
                    source: ChangeSource::Rule("test"),
                    count: 1,
                }],
            }
        } else {
            Rewrite::unchanged(content)
        }
    }

    fn backups_in(dir: &Path) -> Vec<PathBuf> {
        let mut found: Vec<_> = fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").path())
            .filter(|path| path.to_string_lossy().contains(".backup."))
            .collect();
        found.sort();
        found
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let doc = dir.path().join("CLAUDE.md");
        fs::write(&doc, "@old/x.md\n").expect("write doc");
        let before = fs::metadata(&doc).expect("metadata").modified().expect("mtime");

        let outcome = ChangeApplier::new(Mode::DryRun)
            .process(&doc, renew_prefix)
            .expect("preview");

        assert_eq!(outcome.state, DocumentState::Preview);
        assert_eq!(outcome.change_count(), 1);
        assert_eq!(outcome.proposed.as_deref(), Some("@new/x.md\n"));
        assert_eq!(fs::read_to_string(&doc).expect("read"), "@old/x.md\n");
        let after = fs::metadata(&doc).expect("metadata").modified().expect("mtime");
        assert_eq!(before, after);
        assert!(backups_in(dir.path()).is_empty());
    }

    #[test]
    fn apply_writes_backup_of_pre_write_content() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let doc = dir.path().join("CLAUDE.md");
        fs::write(&doc, "@old/x.md\n").expect("write doc");

        let outcome = ChangeApplier::new(Mode::Apply)
            .process(&doc, renew_prefix)
            .expect("apply");

        assert_eq!(outcome.state, DocumentState::Applied);
        let backup = outcome.backup.expect("backup path");
        assert_eq!(fs::read_to_string(&backup).expect("read backup"), "@old/x.md\n");
        assert_eq!(fs::read_to_string(&doc).expect("read doc"), "@new/x.md\n");
        let name = backup.file_name().expect("name").to_string_lossy().into_owned();
        let pattern = regex::Regex::new(r"^CLAUDE\.md\.backup\.\d{8}_\d{6}$").expect("regex");
        assert!(pattern.is_match(&name), "unexpected backup name {name}");
        assert!(!dir.path().join(".CLAUDE.md.tmp").exists());
    }

    #[test]
    fn unchanged_document_is_skipped_without_backup() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let doc = dir.path().join("CLAUDE.md");
        fs::write(&doc, "@new/x.md\n").expect("write doc");

        let outcome = ChangeApplier::new(Mode::Apply)
            .process(&doc, renew_prefix)
            .expect("apply");
        assert_eq!(outcome.state, DocumentState::Skipped);
        assert!(backups_in(dir.path()).is_empty());
    }

    #[test]
    fn existing_backup_is_never_overwritten() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let doc = dir.path().join("CLAUDE.md");

        fs::write(&doc, "@old/first\n").expect("write doc");
        ChangeApplier::new(Mode::Apply)
            .process(&doc, renew_prefix)
            .expect("first apply");
        fs::write(&doc, "@old/second\n").expect("rewrite doc");
        ChangeApplier::new(Mode::Apply)
            .process(&doc, renew_prefix)
            .expect("second apply");

        let backups = backups_in(dir.path());
        assert_eq!(backups.len(), 2);
        let contents: Vec<_> = backups
            .iter()
            .map(|path| fs::read_to_string(path).expect("read backup"))
            .collect();
        assert!(contents.contains(&"@old/first\n".to_string()));
        assert!(contents.contains(&"@old/second\n".to_string()));
    }

    #[test]
    fn invalid_utf8_fails_only_that_document() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let doc = dir.path().join("CLAUDE.md");
        fs::write(&doc, [0x40, 0xff, 0xfe]).expect("write doc");

        let result = ChangeApplier::new(Mode::Apply).process(&doc, renew_prefix);
        assert_eq!(state_of(&result), DocumentState::Failed);
        match result {
            Err(DocumentError::Decode { path }) => assert_eq!(path, doc),
            other => panic!("expected decode error, got {other:?}"),
        }
        assert!(backups_in(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn apply_keeps_document_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("create temp dir");
        let doc = dir.path().join("CLAUDE.md");
        fs::write(&doc, "@old/x.md\n").expect("write doc");
        fs::set_permissions(&doc, fs::Permissions::from_mode(0o600)).expect("chmod doc");

        ChangeApplier::new(Mode::Apply)
            .process(&doc, renew_prefix)
            .expect("apply");

        let mode = fs::metadata(&doc).expect("metadata").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(fs::read_to_string(&doc).expect("read doc"), "@new/x.md\n");
    }

    #[test]
    fn read_only_document_fails_untouched() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let doc = dir.path().join("CLAUDE.md");
        fs::write(&doc, "@old/x.md\n").expect("write doc");
        let mut permissions = fs::metadata(&doc).expect("metadata").permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&doc, permissions).expect("make read-only");

        let result = ChangeApplier::new(Mode::Apply).process(&doc, renew_prefix);

        assert_eq!(state_of(&result), DocumentState::Failed);
        assert!(matches!(result, Err(DocumentError::Write { .. })));
        assert_eq!(fs::read_to_string(&doc).expect("read doc"), "@old/x.md\n");
        assert!(backups_in(dir.path()).is_empty());
        assert!(fs::metadata(&doc).expect("metadata").permissions().readonly());
    }

    #[test]
    fn blocked_temp_path_is_a_write_failure() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let doc = dir.path().join("CLAUDE.md");
        fs::write(&doc, "@old/x.md\n").expect("write doc");
        let tmp = dir.path().join(".CLAUDE.md.tmp");
        fs::create_dir(&tmp).expect("occupy temp path");

        let result = ChangeApplier::new(Mode::Apply).process(&doc, renew_prefix);

        assert_eq!(state_of(&result), DocumentState::Failed);
        match &result {
            Err(DocumentError::Write { path, .. }) => assert_eq!(path, &doc),
            other => panic!("expected write error, got {other:?}"),
        }
        assert_eq!(fs::read(&doc).expect("read doc"), b"@old/x.md\n");
        assert!(tmp.is_dir());
        assert!(!tmp.join("CLAUDE.md").exists());
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_directory_is_a_backup_failure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("create temp dir");
        let docs = dir.path().join("locked");
        fs::create_dir(&docs).expect("create dir");
        let doc = docs.join("CLAUDE.md");
        fs::write(&doc, "@old/x.md\n").expect("write doc");
        fs::set_permissions(&docs, fs::Permissions::from_mode(0o500)).expect("lock dir");
        // Privileged users can still create files here.
        let writable = fs::write(docs.join("canary"), "").is_ok();

        let result = ChangeApplier::new(Mode::Apply).process(&doc, renew_prefix);
        fs::set_permissions(&docs, fs::Permissions::from_mode(0o700)).expect("unlock dir");
        if writable {
            return;
        }

        assert_eq!(state_of(&result), DocumentState::Failed);
        assert!(matches!(result, Err(DocumentError::Backup { .. })));
        assert_eq!(fs::read(&doc).expect("read doc"), b"@old/x.md\n");
        assert!(!docs.join(".CLAUDE.md.tmp").exists());
        assert!(backups_in(&docs).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_document_is_written_through_to_its_target() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let target = dir.path().join("real.md");
        fs::write(&target, "@old/x.md\n").expect("write target");
        let link = dir.path().join("CLAUDE.md");
        std::os::unix::fs::symlink(&target, &link).expect("create symlink");

        let outcome = ChangeApplier::new(Mode::Apply)
            .process(&link, renew_prefix)
            .expect("apply");

        assert!(fs::symlink_metadata(&link)
            .expect("link metadata")
            .file_type()
            .is_symlink());
        assert_eq!(fs::read_to_string(&target).expect("read target"), "@new/x.md\n");
        let backup = outcome.backup.expect("backup path");
        assert_eq!(backup.parent(), Some(dir.path()));
        assert_eq!(fs::read_to_string(&backup).expect("read backup"), "@old/x.md\n");
    }

    #[test]
    fn missing_document_is_a_read_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let result =
            ChangeApplier::new(Mode::DryRun).process(&dir.path().join("gone.md"), renew_prefix);
        assert!(matches!(result, Err(DocumentError::Read { .. })));
    }
}
