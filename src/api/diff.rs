//! Line diff between two prompt versions.

use serde::Serialize;
use similar::{ChangeTag, TextDiff};

const CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Context,
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub kind: LineKind,
    pub content: String,
    /// 1-based line number in the old text.
    pub old_line: Option<usize>,
    /// 1-based line number in the new text.
    pub new_line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffHunk {
    pub header: String,
    pub lines: Vec<DiffLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptDiff {
    pub hunks: Vec<DiffHunk>,
    pub additions: usize,
    pub deletions: usize,
}

impl PromptDiff {
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Render as unified diff text.
    pub fn to_unified(&self) -> String {
        let mut out = String::new();
        for hunk in &self.hunks {
            out.push_str(&hunk.header);
            out.push('\n');
            for line in &hunk.lines {
                let sign = match line.kind {
                    LineKind::Context => ' ',
                    LineKind::Added => '+',
                    LineKind::Removed => '-',
                };
                out.push(sign);
                out.push_str(&line.content);
                out.push('\n');
            }
        }
        out
    }
}

pub fn prompt_diff(old: &str, new: &str) -> PromptDiff {
    let diff = TextDiff::from_lines(old, new);
    let mut hunks = Vec::new();
    let mut additions = 0;
    let mut deletions = 0;

    for group in diff.grouped_ops(CONTEXT_LINES) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let header = format!(
            "@@ -{},{} +{},{} @@",
            first.old_range().start + 1,
            last.old_range().end - first.old_range().start,
            first.new_range().start + 1,
            last.new_range().end - first.new_range().start
        );

        let mut lines = Vec::new();
        for op in &group {
            for change in diff.iter_changes(op) {
                let value = change.value();
                let content = value.strip_suffix('\n').unwrap_or(value).to_string();
                let kind = match change.tag() {
                    ChangeTag::Equal => LineKind::Context,
                    ChangeTag::Delete => {
                        deletions += 1;
                        LineKind::Removed
                    }
                    ChangeTag::Insert => {
                        additions += 1;
                        LineKind::Added
                    }
                };
                lines.push(DiffLine {
                    kind,
                    content,
                    old_line: change.old_index().map(|i| i + 1),
                    new_line: change.new_index().map(|i| i + 1),
                });
            }
        }
        hunks.push(DiffHunk { header, lines });
    }

    PromptDiff {
        hunks,
        additions,
        deletions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_prompts() {
        let diff = prompt_diff("You are a sales agent.\n", "You are a sales agent.\n");
        assert!(diff.is_empty());
        assert_eq!(diff.to_unified(), "");
    }

    #[test]
    fn test_changed_line() {
        let old = "Greet the lead.\nAsk about budget.\nBook a demo.\n";
        let new = "Greet the lead by name.\nAsk about budget.\nBook a demo.\n";
        let diff = prompt_diff(old, new);

        assert_eq!(diff.additions, 1);
        assert_eq!(diff.deletions, 1);
        assert_eq!(diff.hunks.len(), 1);
        assert_eq!(diff.hunks[0].header, "@@ -1,3 +1,3 @@");
        assert_eq!(
            diff.to_unified(),
            "@@ -1,3 +1,3 @@\n-Greet the lead.\n+Greet the lead by name.\n Ask about budget.\n Book a demo.\n"
        );
    }

    #[test]
    fn test_line_numbers() {
        let diff = prompt_diff("a\nb\n", "a\nb\nc\n");
        let added = diff.hunks[0]
            .lines
            .iter()
            .find(|l| l.kind == LineKind::Added)
            .unwrap();
        assert_eq!(added.content, "c");
        assert_eq!(added.new_line, Some(3));
        assert_eq!(added.old_line, None);
    }
}
