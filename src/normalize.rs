//! Per-document normalization: resolve the anchor path for the document's
//! directory, run the rule set, then the baseline inserter.
use crate::config::NormalizeConfig;
use crate::error::ConfigError;
use crate::insert::BaselineInserter;
use crate::resolve::resolve;
use crate::rules::{Rewrite, RuleSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Normalizer {
    anchor: PathBuf,
    marker: String,
    rules: RuleSet,
    inserter: Option<BaselineInserter>,
}

impl Normalizer {
    pub fn new(config: &NormalizeConfig, anchor: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            anchor: anchor.to_path_buf(),
            marker: config.marker.clone(),
            rules: RuleSet::for_anchor(config, anchor)?,
            inserter: BaselineInserter::new(config),
        })
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Relative path from the document's directory to the anchor.
    pub fn relative_anchor(&self, document: &Path) -> String {
        let dir = document.parent().unwrap_or_else(|| Path::new("."));
        resolve(dir, &self.anchor)
    }

    /// Compute the normalized content for a document at `document`.
    ///
    /// Documents without any directive marker are returned unchanged.
    pub fn normalize(&self, document: &Path, content: &str) -> Rewrite {
        if !content.contains(&self.marker) {
            return Rewrite::unchanged(content);
        }
        let rel = self.relative_anchor(document);
        let mut rewrite = self.rules.rewrite(content, &rel);
        if let Some(inserter) = &self.inserter {
            if let Some(record) = inserter.apply(&mut rewrite.content, &rel) {
                rewrite.changes.push(record);
            }
        }
        rewrite
    }
}
