//! Two-pass normalization run.
//!
//! A dry-run pass computes and reports every change, the confirmation gate
//! decides, and only then does a fresh apply pass re-discover and recompute
//! each document before writing it.
use crate::apply::{state_of, ChangeApplier, DocumentResult, DocumentState, Mode};
use crate::config::NormalizeConfig;
use crate::confirm::Confirm;
use crate::discover::discover_documents;
use crate::error::{ConfigError, RunError};
use crate::normalize::Normalizer;
use crate::principles::PrincipleUpdater;
use crate::util::{display_file_name, display_path};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Reported entries for one pass; skipped documents are omitted.
#[derive(Debug, Default)]
pub struct PassSummary {
    pub entries: Vec<DocumentResult>,
}

impl PassSummary {
    pub fn total_changes(&self) -> usize {
        self.entries
            .iter()
            .filter_map(|entry| entry.as_ref().ok())
            .map(|outcome| outcome.change_count())
            .sum()
    }

    pub fn files_changed(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_ok()).count()
    }

    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_err()).count()
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The preview found nothing to change.
    UpToDate(PassSummary),
    /// The preview found nothing to change but some documents failed.
    Unprocessed(PassSummary),
    /// Preview only; nothing was asked or written.
    Previewed(PassSummary),
    Cancelled(PassSummary),
    Applied(PassSummary),
}

impl RunOutcome {
    pub fn summary(&self) -> &PassSummary {
        match self {
            RunOutcome::UpToDate(summary)
            | RunOutcome::Unprocessed(summary)
            | RunOutcome::Previewed(summary)
            | RunOutcome::Cancelled(summary)
            | RunOutcome::Applied(summary) => summary,
        }
    }
}

pub struct Orchestrator {
    base: PathBuf,
    document_name: String,
    excluded: Vec<String>,
    normalizer: Normalizer,
    principles: Option<(PathBuf, PrincipleUpdater)>,
}

impl Orchestrator {
    /// Resolve the base and anchor directories.
    ///
    /// This is the only fatal check; it runs before any document is read.
    pub fn new(config: &NormalizeConfig, base: &Path) -> Result<Self, ConfigError> {
        let base = base
            .canonicalize()
            .ok()
            .filter(|path| path.is_dir())
            .ok_or_else(|| ConfigError::BaseMissing(base.to_path_buf()))?;
        let anchor = base.join(&config.anchor);
        if !anchor.is_dir() {
            return Err(ConfigError::AnchorMissing(anchor));
        }
        let normalizer = Normalizer::new(config, &anchor)?;
        tracing::debug!(
            anchor = %anchor.display(),
            rules = ?normalizer.rules().rules().iter().map(|rule| rule.id).collect::<Vec<_>>(),
            "anchor resolved"
        );
        let principles = config
            .principles
            .as_ref()
            .map(|principles| (anchor.join(&principles.file), PrincipleUpdater::new(principles)));
        Ok(Self {
            base,
            document_name: config.document_name.clone(),
            excluded: config.excluded.clone(),
            normalizer,
            principles,
        })
    }

    /// Run one full pass: fresh discovery, per-document recomputation.
    pub fn run_pass(&self, mode: Mode) -> PassSummary {
        let applier = ChangeApplier::new(mode);
        let mut summary = PassSummary::default();

        if let Some((path, updater)) = &self.principles {
            if path.is_file() {
                let result = applier.process(path, |content| updater.rewrite(content));
                self.record(&mut summary, result);
            } else {
                tracing::warn!(path = %path.display(), "principles file not found; skipping");
            }
        }

        let documents = discover_documents(&self.base, &self.document_name, &self.excluded);
        tracing::info!(
            mode = ?applier.mode(),
            count = documents.len(),
            "discovered {} files",
            self.document_name
        );
        for document in documents {
            if matches!(&self.principles, Some((path, _)) if *path == document) {
                continue;
            }
            let result =
                applier.process(&document, |content| self.normalizer.normalize(&document, content));
            self.record(&mut summary, result);
        }
        summary
    }

    fn record(&self, summary: &mut PassSummary, result: DocumentResult) {
        match state_of(&result) {
            DocumentState::Skipped => {}
            DocumentState::Failed => {
                if let Err(err) = &result {
                    tracing::error!(path = %err.path().display(), error = %err, "document failed");
                }
                summary.entries.push(result);
            }
            _ => summary.entries.push(result),
        }
    }

    /// Preview, confirm, then apply.
    ///
    /// `preview_only` stops after the summary without prompting.
    pub fn run<C, W>(
        &self,
        confirm: &mut C,
        out: &mut W,
        preview_only: bool,
    ) -> Result<RunOutcome, RunError>
    where
        C: Confirm + ?Sized,
        W: Write + ?Sized,
    {
        writeln!(
            out,
            "Scanning {} for {} files (dry run)...",
            self.base.display(),
            self.document_name
        )?;
        let preview = self.run_pass(Mode::DryRun);
        self.report_preview(out, &preview)?;

        if preview.total_changes() == 0 && preview.failures() > 0 {
            writeln!(
                out,
                "No changes to apply; {} file(s) could not be checked.",
                preview.failures()
            )?;
            return Ok(RunOutcome::Unprocessed(preview));
        }
        if preview.total_changes() == 0 {
            writeln!(out, "All directives already normalized.")?;
            return Ok(RunOutcome::UpToDate(preview));
        }
        if preview_only {
            writeln!(out, "Dry run only; no files were written.")?;
            return Ok(RunOutcome::Previewed(preview));
        }
        if !confirm.confirm(&preview)? {
            writeln!(out, "Operation cancelled; no files were written.")?;
            return Ok(RunOutcome::Cancelled(preview));
        }

        writeln!(out, "\nApplying changes...")?;
        let applied = self.run_pass(Mode::Apply);
        self.report_apply(out, &applied)?;
        Ok(RunOutcome::Applied(applied))
    }

    fn report_preview<W: Write + ?Sized>(
        &self,
        out: &mut W,
        summary: &PassSummary,
    ) -> std::io::Result<()> {
        for entry in &summary.entries {
            match entry {
                Ok(outcome) => {
                    let sources: Vec<_> = outcome
                        .changes
                        .iter()
                        .map(|change| change.source.label())
                        .collect();
                    tracing::debug!(path = %outcome.path.display(), ?sources, "changes planned");
                    if let Some(proposed) = &outcome.proposed {
                        tracing::trace!(
                            path = %outcome.path.display(),
                            %proposed,
                            "proposed content"
                        );
                    }
                    writeln!(
                        out,
                        "  Would update {} directive(s) in: {}",
                        outcome.change_count(),
                        display_path(&outcome.path, Some(self.base.as_path()))
                    )?;
                }
                Err(err) => self.report_failure(out, err)?,
            }
        }
        writeln!(
            out,
            "Found {} file(s) with {} change(s) to apply",
            summary.files_changed(),
            summary.total_changes()
        )?;
        if summary.failures() > 0 {
            writeln!(out, "{} file(s) could not be processed", summary.failures())?;
        }
        Ok(())
    }

    fn report_apply<W: Write + ?Sized>(
        &self,
        out: &mut W,
        summary: &PassSummary,
    ) -> std::io::Result<()> {
        for entry in &summary.entries {
            match entry {
                Ok(outcome) => {
                    writeln!(
                        out,
                        "  Updated {} directive(s) in: {}",
                        outcome.change_count(),
                        display_path(&outcome.path, Some(self.base.as_path()))
                    )?;
                    if let Some(backup) = &outcome.backup {
                        writeln!(out, "    Backup created: {}", display_file_name(backup))?;
                    }
                }
                Err(err) => self.report_failure(out, err)?,
            }
        }
        writeln!(
            out,
            "Applied {} change(s) across {} file(s); {} failed",
            summary.total_changes(),
            summary.files_changed(),
            summary.failures()
        )
    }

    fn report_failure<W: Write + ?Sized>(
        &self,
        out: &mut W,
        err: &crate::error::DocumentError,
    ) -> std::io::Result<()> {
        writeln!(
            out,
            "  Failed: {}: {}",
            display_path(err.path(), Some(self.base.as_path())),
            err
        )
    }
}

/// Resolve the anchor and run the full preview/confirm/apply sequence.
pub fn run<C, W>(
    config: &NormalizeConfig,
    base: &Path,
    preview_only: bool,
    confirm: &mut C,
    out: &mut W,
) -> Result<RunOutcome, RunError>
where
    C: Confirm + ?Sized,
    W: Write + ?Sized,
{
    let orchestrator = Orchestrator::new(config, base)?;
    orchestrator.run(confirm, out, preview_only)
}
