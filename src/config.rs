//! Normalization configuration.
//!
//! Defaults describe the historical workspace layout; a JSON file passed with
//! `--config` overrides any subset of fields.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// What to look for, where the anchor lives, and which legacy forms to rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeConfig {
    pub schema_version: u32,
    /// File name of the documents to normalize.
    pub document_name: String,
    /// Anchor directory, relative to the base directory, `/`-separated.
    pub anchor: String,
    /// Path substrings that exclude a document from discovery.
    pub excluded: Vec<String>,
    /// Character that starts a directive.
    pub marker: String,
    /// Subdirectory of the anchor that directives point into.
    pub resource_dir: String,
    /// Legacy per-project directory that directives used to target.
    pub legacy_dir: String,
    /// Home-relative spelling of the anchor, e.g. `~/claude-workspace`.
    pub home_anchor: String,
    /// Additional absolute anchor spellings to rewrite.
    pub absolute_prefixes: Vec<String>,
    /// Baseline directive target, relative to `resource_dir`. `None` disables
    /// insertion.
    pub baseline: Option<String>,
    /// Substring identifying directives that point at the base location.
    pub base_marker: String,
    pub principles: Option<PrinciplesConfig>,
}

/// Numbered principle that must be present in a file inside the anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrinciplesConfig {
    /// File path relative to the anchor directory.
    pub file: String,
    /// Substring whose presence means the principle is already there.
    pub marker: String,
    /// Full line to insert.
    pub line: String,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            document_name: "CLAUDE.md".to_string(),
            anchor: "claude-workspace".to_string(),
            excluded: vec!["archive".to_string(), "claude-workspace".to_string()],
            marker: "@".to_string(),
            resource_dir: "memories".to_string(),
            legacy_dir: ".claude".to_string(),
            home_anchor: "~/claude-workspace".to_string(),
            absolute_prefixes: Vec::new(),
            baseline: Some("base/claude-code-agents.md".to_string()),
            base_marker: "base/".to_string(),
            principles: Some(PrinciplesConfig {
                file: "memories/base/core-principles.md".to_string(),
                marker: "Claude Code Agents".to_string(),
                line: "12. **Claude Code Agents**: Leverage specialized sub-agents and output styles for focused development workflows".to_string(),
            }),
        }
    }
}

impl NormalizeConfig {
    /// File name used to detect an existing baseline directive.
    pub fn baseline_name(&self) -> Option<&str> {
        let baseline = self.baseline.as_deref()?;
        baseline.trim_end_matches('/').rsplit('/').next()
    }

    /// Last segment of the anchor path.
    pub fn anchor_name(&self) -> &str {
        self.anchor
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.anchor)
    }
}

/// Load a config file; absent fields keep their defaults.
pub fn load_config(path: &Path) -> Result<NormalizeConfig, ConfigError> {
    let bytes = fs::read(path).map_err(|err| ConfigError::Load {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let config: NormalizeConfig =
        serde_json::from_slice(&bytes).map_err(|err| ConfigError::Load {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject configs that would make rewriting ambiguous or non-idempotent.
pub fn validate_config(config: &NormalizeConfig) -> Result<(), ConfigError> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(ConfigError::Invalid(format!(
            "unsupported schema_version {}",
            config.schema_version
        )));
    }
    let required = [
        ("document_name", &config.document_name),
        ("anchor", &config.anchor),
        ("marker", &config.marker),
        ("resource_dir", &config.resource_dir),
        ("legacy_dir", &config.legacy_dir),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{field} must not be empty")));
        }
    }
    if matches!(config.baseline_name(), Some(name) if name.trim().is_empty()) {
        return Err(ConfigError::Invalid("baseline must name a file".to_string()));
    }
    if config.document_name.contains('/') {
        return Err(ConfigError::Invalid("document_name must be a bare file name".to_string()));
    }
    if config.legacy_dir.trim_matches('/') == config.anchor.trim_matches('/') {
        return Err(ConfigError::Invalid("legacy_dir must differ from anchor".to_string()));
    }
    if config.anchor.starts_with('/') || config.anchor.split('/').any(|seg| seg == "..") {
        return Err(ConfigError::Invalid(
            "anchor must be a relative path inside the base directory".to_string(),
        ));
    }
    if let Some(principles) = &config.principles {
        if principles.file.trim().is_empty() || principles.marker.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "principles.file and principles.marker must not be empty".to_string(),
            ));
        }
        if !principles.line.contains(&principles.marker) {
            return Err(ConfigError::Invalid(
                "principles.line must contain principles.marker".to_string(),
            ));
        }
    }
    Ok(())
}
