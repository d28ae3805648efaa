//! Ordered rewrite rules for historically malformed directives.
//!
//! Each rule recognizes one legacy spelling of an anchor directive and
//! rewrites every occurrence to the canonical `<marker><relative>/<resource>/`
//! form. A rule counts once per document no matter how many occurrences it
//! touched.
use crate::config::NormalizeConfig;
use crate::error::ConfigError;
use regex::{Captures, Regex};
use std::path::Path;

/// Placeholder for the resolved relative path inside replacement templates.
const REL: &str = "{rel}";

/// How a match that already equals its replacement is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    /// Any match is a legacy form; a match that changes nothing is an anomaly.
    Legacy,
    /// Matches equal to the canonical text are correct directives, not drift.
    Drift,
}

#[derive(Debug, Clone)]
pub struct DirectiveRule {
    pub id: &'static str,
    pattern: Regex,
    template: String,
    kind: RuleKind,
}

/// Whether a rule fired on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeRecord {
    pub source: ChangeSource,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    Rule(&'static str),
    Insertion,
    Principle,
}

impl ChangeSource {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeSource::Rule(id) => *id,
            ChangeSource::Insertion => "baseline-insertion",
            ChangeSource::Principle => "principle-insertion",
        }
    }
}

impl DirectiveRule {
    fn new(
        id: &'static str,
        pattern: &str,
        template: String,
        kind: RuleKind,
    ) -> Result<Self, ConfigError> {
        let pattern = Regex::new(pattern)
            .map_err(|err| ConfigError::Invalid(format!("rule {id}: {err}")))?;
        Ok(Self {
            id,
            pattern,
            template,
            kind,
        })
    }

    /// Rewrite `content` in place; returns whether the rule fired.
    fn apply(&self, content: &mut String, rel: &str) -> bool {
        let replacement = self.template.replace(REL, rel);
        let mut matched = false;
        let mut differs = false;
        let rewritten = self.pattern.replace_all(content, |caps: &Captures<'_>| {
            let found = &caps[0];
            matched = true;
            if found == replacement {
                return found.to_string();
            }
            differs = true;
            replacement.clone()
        });
        if !differs {
            if matched && self.kind == RuleKind::Legacy {
                tracing::warn!(
                    rule = self.id,
                    "pattern matched but replacement left the text unchanged"
                );
            }
            return false;
        }
        let rewritten = rewritten.into_owned();
        *content = rewritten;
        true
    }
}

/// Result of running the rule set (and optionally the inserter) on a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub content: String,
    pub changes: Vec<ChangeRecord>,
}

impl Rewrite {
    pub fn unchanged(content: &str) -> Self {
        Self {
            content: content.to_string(),
            changes: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.changes.iter().map(|change| change.count).sum()
    }
}

#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<DirectiveRule>,
}

impl RuleSet {
    /// Build the rule list for one anchor.
    ///
    /// `anchor_abs` is the resolved absolute anchor directory; its spelling is
    /// always recognized as a legacy absolute form.
    pub fn for_anchor(
        config: &NormalizeConfig,
        anchor_abs: &Path,
    ) -> Result<Self, ConfigError> {
        let marker = regex::escape(&config.marker);
        let resource = regex::escape(config.resource_dir.trim_matches('/'));
        let anchor = regex::escape(config.anchor.trim_matches('/'));
        let anchor_name = regex::escape(config.anchor_name());
        let legacy = regex::escape(config.legacy_dir.trim_matches('/'));
        let home = regex::escape(config.home_anchor.trim_end_matches('/'));
        let canonical = format!(
            "{}{REL}/{}/",
            config.marker,
            config.resource_dir.trim_matches('/')
        );

        let mut absolutes = vec![anchor_abs.to_string_lossy().replace('\\', "/")];
        absolutes.extend(config.absolute_prefixes.iter().cloned());
        let absolutes = absolutes
            .iter()
            .map(|prefix| regex::escape(prefix.trim_end_matches('/')))
            .collect::<Vec<_>>()
            .join("|");

        let rules = vec![
            DirectiveRule::new(
                "home-absolute",
                &format!("{marker}{home}/+{resource}/"),
                canonical.clone(),
                RuleKind::Legacy,
            )?,
            DirectiveRule::new(
                "absolute",
                &format!("{marker}(?:{absolutes})/+{resource}/"),
                canonical.clone(),
                RuleKind::Legacy,
            )?,
            DirectiveRule::new(
                "single-dot",
                &format!("{marker}(?:\\./)?{legacy}/+{resource}/"),
                canonical.clone(),
                RuleKind::Legacy,
            )?,
            DirectiveRule::new(
                "double-dot",
                &format!("{marker}(?:\\.\\./)+{legacy}/+{resource}/"),
                canonical.clone(),
                RuleKind::Legacy,
            )?,
            DirectiveRule::new(
                "stale-depth",
                &format!("{marker}(?:\\.\\./)*{anchor}/+{resource}/"),
                canonical,
                RuleKind::Drift,
            )?,
            DirectiveRule::new(
                "double-slash",
                &format!("{anchor_name}//+{resource}/"),
                format!(
                    "{}/{}/",
                    config.anchor_name(),
                    config.resource_dir.trim_matches('/')
                ),
                RuleKind::Legacy,
            )?,
        ];
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[DirectiveRule] {
        &self.rules
    }

    /// Apply every rule in order; later rules see earlier output.
    pub fn rewrite(&self, content: &str, rel: &str) -> Rewrite {
        let mut current = content.to_string();
        let mut changes = Vec::new();
        for rule in &self.rules {
            if rule.apply(&mut current, rel) {
                tracing::debug!(rule = rule.id, "rule fired");
                changes.push(ChangeRecord {
                    source: ChangeSource::Rule(rule.id),
                    count: 1,
                });
            }
        }
        Rewrite {
            content: current,
            changes,
        }
    }
}
