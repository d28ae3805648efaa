//! Principle insertion for the numbered principles file inside the anchor.
use crate::config::PrinciplesConfig;
use crate::insert::insert_line;
use crate::rules::{ChangeRecord, ChangeSource, Rewrite};
use regex::Regex;
use std::sync::OnceLock;

fn numbered_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.").expect("valid numbered-line regex"))
}

#[derive(Debug, Clone)]
pub struct PrincipleUpdater {
    marker: String,
    line: String,
}

impl PrincipleUpdater {
    pub fn new(config: &PrinciplesConfig) -> Self {
        Self {
            marker: config.marker.clone(),
            line: config.line.clone(),
        }
    }

    /// Add the principle after the last numbered line.
    ///
    /// Content that already mentions the marker, or has no numbered list to
    /// extend, is returned unchanged.
    pub fn rewrite(&self, content: &str) -> Rewrite {
        if content.contains(&self.marker) {
            return Rewrite::unchanged(content);
        }
        let Some(index) = content
            .split('\n')
            .enumerate()
            .filter(|(_, line)| numbered_line().is_match(line))
            .map(|(idx, _)| idx + 1)
            .last()
        else {
            return Rewrite::unchanged(content);
        };
        Rewrite {
            content: insert_line(content, index, &self.line),
            changes: vec![ChangeRecord {
                source: ChangeSource::Principle,
                count: 1,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizeConfig;

    fn updater() -> PrincipleUpdater {
        let config = NormalizeConfig::default();
        PrincipleUpdater::new(config.principles.as_ref().expect("default principles"))
    }

    #[test]
    fn appends_after_last_numbered_principle() {
        let content = "# Core\n1. **Clarity**: be clear\n2. **Tests**: write them\n\nFooter\n";
        let out = updater().rewrite(content);
        assert_eq!(out.total(), 1);
        let lines: Vec<_> = out.content.split('\n').collect();
        assert_eq!(lines[2], "2. **Tests**: write them");
        assert!(lines[3].starts_with("12. **Claude Code Agents**"));
        assert_eq!(lines[5], "Footer");
    }

    #[test]
    fn present_principle_is_not_duplicated() {
        let content = "1. a\n12. **Claude Code Agents**: already here\n";
        let out = updater().rewrite(content);
        assert_eq!(out.total(), 0);
        assert_eq!(out.content, content);
    }

    #[test]
    fn file_without_numbered_list_is_unchanged() {
        let out = updater().rewrite("# Core\n- bullet\n");
        assert_eq!(out.total(), 0);
    }
}
