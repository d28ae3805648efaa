//! Baseline directive insertion.
//!
//! A document opts in by already containing at least one directive; only then
//! is a missing baseline directive added.
use crate::config::NormalizeConfig;
use crate::rules::{ChangeRecord, ChangeSource};

#[derive(Debug, Clone)]
pub struct BaselineInserter {
    marker: String,
    resource_dir: String,
    baseline: String,
    baseline_name: String,
    base_marker: String,
}

/// Where and what to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub line_index: usize,
    pub line: String,
}

impl BaselineInserter {
    /// `None` when the config disables baseline insertion.
    pub fn new(config: &NormalizeConfig) -> Option<Self> {
        let baseline = config.baseline.as_deref()?;
        Some(Self {
            marker: config.marker.clone(),
            resource_dir: config.resource_dir.trim_matches('/').to_string(),
            baseline: baseline.trim_matches('/').to_string(),
            baseline_name: config.baseline_name()?.to_string(),
            base_marker: config.base_marker.clone(),
        })
    }

    /// Decide whether `content` needs the baseline directive.
    ///
    /// The line goes right after the last directive pointing at the base
    /// location, or at the top when there is none.
    pub fn plan(&self, content: &str, rel: &str) -> Option<Insertion> {
        if !content.contains(&self.marker) || content.contains(&self.baseline_name) {
            return None;
        }
        let line_index = content
            .split('\n')
            .enumerate()
            .filter(|(_, line)| {
                line.starts_with(&self.marker) && line.contains(&self.base_marker)
            })
            .map(|(idx, _)| idx + 1)
            .last()
            .unwrap_or(0);
        Some(Insertion {
            line_index,
            line: format!(
                "{}{rel}/{}/{}",
                self.marker, self.resource_dir, self.baseline
            ),
        })
    }

    /// Insert the baseline directive when planned; returns its change record.
    pub fn apply(&self, content: &mut String, rel: &str) -> Option<ChangeRecord> {
        let insertion = self.plan(content, rel)?;
        *content = insert_line(content, insertion.line_index, &insertion.line);
        tracing::debug!(line = insertion.line_index, "baseline directive inserted");
        Some(ChangeRecord {
            source: ChangeSource::Insertion,
            count: 1,
        })
    }
}

/// Insert `line` before the `index`th `\n`-separated line.
pub fn insert_line(content: &str, index: usize, line: &str) -> String {
    let mut lines: Vec<&str> = content.split('\n').collect();
    let index = index.min(lines.len());
    lines.insert(index, line);
    lines.join("\n")
}
